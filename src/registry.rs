//! Maps protocol identifiers to packet factories.
//!
//! A [`Registry`] is built once at startup from an explicit list of packet
//! types and never changes afterwards. It is shared by reference (usually
//! inside an `Arc`) with every connection, so lookups take no locks.

use crate::protocol::packet::{self, Direction, DynPacket, Packet, PacketId};
use ahash::AHashMap;
use std::collections::hash_map::Entry;

/// An error while building a [`Registry`].
///
/// These indicate a broken packet set and should abort startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("packet identifier {id} is declared by both {existing} and {rejected}")]
    DuplicateIdentifier {
        id: PacketId,
        existing: &'static str,
        rejected: &'static str,
    },
    #[error("factory for {name} (packet {id}) {mismatch}")]
    FactoryInstantiationFailure {
        id: PacketId,
        name: &'static str,
        mismatch: FactoryMismatch,
    },
}

/// How a factory's packets disagree with what it was registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FactoryMismatch {
    #[error("creates packets with identifier {0}")]
    Identifier(PacketId),
    #[error("declares {declared} but creates {created} packets")]
    Direction {
        declared: Direction,
        created: Direction,
    },
}

/// Produces fresh, unpopulated instances of one packet type.
#[derive(Copy, Clone, Debug)]
pub struct PacketFactory {
    id: PacketId,
    direction: Direction,
    name: &'static str,
    create: fn() -> Box<dyn DynPacket>,
}

impl PacketFactory {
    /// Factory for a type implementing [`Packet`].
    pub fn of<P: Packet>() -> Self {
        Self {
            id: P::ID,
            direction: P::DIRECTION,
            name: P::NAME,
            create: packet::create_packet::<P>,
        }
    }

    /// Factory with a hand-written constructor.
    ///
    /// The instances `create` returns must report `id` and `direction`,
    /// which is checked when the registry is built.
    pub fn new(
        id: PacketId,
        direction: Direction,
        name: &'static str,
        create: fn() -> Box<dyn DynPacket>,
    ) -> Self {
        Self {
            id,
            direction,
            name,
            create,
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Creates a fresh instance, ready to be decoded into.
    pub fn create(&self) -> Box<dyn DynPacket> {
        (self.create)()
    }
}

/// Collects packet types before a [`Registry`] is built.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    factories: Vec<PacketFactory>,
    strict: bool,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes duplicate identifiers a build error instead of
    /// keeping the first registration.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn register<P: Packet>(self) -> Self {
        self.register_factory(PacketFactory::of::<P>())
    }

    pub fn register_factory(mut self, factory: PacketFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Builds the registry.
    ///
    /// Types are considered in registration order. When two types share an
    /// identifier, the first one wins and the later one is dropped with a
    /// warning, unless the builder is strict.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut entries: Vec<PacketFactory> = Vec::with_capacity(self.factories.len());
        let mut index: AHashMap<PacketId, usize> = AHashMap::with_capacity(self.factories.len());

        for factory in self.factories {
            let prototype = factory.create();
            let mismatch = if prototype.identifier() != factory.id {
                Some(FactoryMismatch::Identifier(prototype.identifier()))
            } else if prototype.direction() != factory.direction {
                Some(FactoryMismatch::Direction {
                    declared: factory.direction,
                    created: prototype.direction(),
                })
            } else {
                None
            };
            if let Some(mismatch) = mismatch {
                return Err(RegistryError::FactoryInstantiationFailure {
                    id: factory.id,
                    name: factory.name,
                    mismatch,
                });
            }
            let id = factory.id;

            match index.entry(id) {
                Entry::Occupied(slot) => {
                    let existing = entries[*slot.get()].name;
                    if self.strict {
                        return Err(RegistryError::DuplicateIdentifier {
                            id,
                            existing,
                            rejected: factory.name,
                        });
                    }
                    tracing::warn!(
                        "Packet identifier {id} is already taken by {existing}; ignoring {}",
                        factory.name
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(entries.len());
                    entries.push(factory);
                }
            }
        }

        tracing::debug!("Built packet registry with {} types", entries.len());
        Ok(Registry { entries, index })
    }
}

/// Immutable mapping from protocol identifier to packet factory.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Factories in registration order.
    entries: Vec<PacketFactory>,
    index: AHashMap<PacketId, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry of every packet the backend defines.
    ///
    /// Built strictly: a shared identifier in the standard set is a bug.
    pub fn standard() -> Result<Self, RegistryError> {
        packet::register_all(RegistryBuilder::new().strict()).build()
    }

    pub fn lookup(&self, id: PacketId) -> Option<&PacketFactory> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// Creates a fresh instance of the type registered under `id`.
    pub fn create(&self, id: PacketId) -> Option<Box<dyn DynPacket>> {
        self.lookup(id).map(PacketFactory::create)
    }

    pub fn contains(&self, id: PacketId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the factories in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PacketFactory> + '_ {
        self.entries.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = PacketId> + '_ {
        self.entries.iter().map(PacketFactory::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{
        client::{JoinLobby, LogoutRequest, PingRequest},
        internal::SessionHandoff,
        server::PingResponse,
    };
    use backend_protocol_macros::{Decode, Encode, Packet};

    /// Deliberately reuses the identifier of `PingRequest`.
    #[derive(Debug, Default, Encode, Decode, Packet)]
    #[packet(id = 1, direction = "server_to_client")]
    struct ImpostorPing;

    fn create_join_lobby() -> Box<dyn DynPacket> {
        Box::new(JoinLobby::default())
    }

    #[test]
    fn lookup_returns_matching_factory() {
        let registry = Registry::standard().unwrap();
        for factory in registry.iter() {
            let found = registry.lookup(factory.id()).unwrap();
            assert_eq!(found.id(), factory.id());
            assert_eq!(found.create().identifier(), factory.id());
            assert_eq!(found.create().direction(), factory.direction());
        }
    }

    #[test]
    fn standard_registry_contents() {
        let registry = Registry::standard().unwrap();
        assert_eq!(registry.len(), 11);
        assert!(!registry.is_empty());

        let mut ids: Vec<_> = registry.ids().map(|id| id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=11).collect::<Vec<_>>());

        assert_eq!(registry.lookup(PacketId(10)).unwrap().name(), "SessionHandoff");
        assert!(registry.create(PacketId(10)).unwrap().is::<SessionHandoff>());
    }

    #[test]
    fn unknown_identifier_is_absent() {
        let registry = Registry::standard().unwrap();
        assert!(registry.lookup(PacketId(0)).is_none());
        assert!(registry.create(PacketId(12)).is_none());
        assert!(!registry.contains(PacketId(u32::MAX)));
    }

    #[test]
    fn create_returns_independent_instances() {
        let registry = Registry::builder().register::<JoinLobby>().build().unwrap();
        let mut first = registry.create(JoinLobby::ID).unwrap();
        let second = registry.create(JoinLobby::ID).unwrap();

        first
            .as_any_mut()
            .downcast_mut::<JoinLobby>()
            .unwrap()
            .lobby_id = 3;
        assert_eq!(second.downcast_ref::<JoinLobby>().unwrap().lobby_id, 0);
    }

    #[test]
    fn first_registration_wins_on_duplicate() {
        let registry = Registry::builder()
            .register::<PingRequest>()
            .register::<ImpostorPing>()
            .register::<LogoutRequest>()
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        let factory = registry.lookup(PacketId(1)).unwrap();
        assert_eq!(factory.name(), "PingRequest");
        assert!(factory.create().is::<PingRequest>());
    }

    #[test]
    fn registration_order_decides_duplicates() {
        let registry = Registry::builder()
            .register::<ImpostorPing>()
            .register::<PingRequest>()
            .build()
            .unwrap();
        assert!(registry.create(PacketId(1)).unwrap().is::<ImpostorPing>());
    }

    #[test]
    fn strict_builder_rejects_duplicates() {
        let err = Registry::builder()
            .strict()
            .register::<PingRequest>()
            .register::<PingResponse>()
            .register::<ImpostorPing>()
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::DuplicateIdentifier {
                id: PacketId(1),
                existing: "PingRequest",
                rejected: "ImpostorPing",
            }
        ));
    }

    #[test]
    fn hand_written_factory() {
        let registry = Registry::builder()
            .register_factory(PacketFactory::new(
                JoinLobby::ID,
                JoinLobby::DIRECTION,
                "JoinLobby",
                create_join_lobby,
            ))
            .build()
            .unwrap();
        assert!(registry.create(PacketId(7)).unwrap().is::<JoinLobby>());
    }

    #[test]
    fn mismatched_factory_aborts_build() {
        let err = Registry::builder()
            .register::<PingRequest>()
            .register_factory(PacketFactory::new(
                PacketId(70),
                Direction::ClientToServer,
                "JoinLobby",
                create_join_lobby,
            ))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::FactoryInstantiationFailure {
                id: PacketId(70),
                mismatch: FactoryMismatch::Identifier(PacketId(7)),
                ..
            }
        ));
    }

    #[test]
    fn factory_with_wrong_direction_aborts_build() {
        let err = Registry::builder()
            .register_factory(PacketFactory::new(
                JoinLobby::ID,
                Direction::Internal,
                "JoinLobby",
                create_join_lobby,
            ))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::FactoryInstantiationFailure {
                id: PacketId(7),
                mismatch: FactoryMismatch::Direction {
                    declared: Direction::Internal,
                    created: Direction::ClientToServer,
                },
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "factory for JoinLobby (packet 7) declares internal but creates client_to_server packets"
        );
    }
}
