//! The contract every packet type implements.
//!
//! A packet type is a plain struct deriving `Encode`, `Decode` and `Packet`.
//! The `#[packet(...)]` attribute assigns its protocol identifier and the
//! logical channel it travels on:
//!
//! ```ignore
//! #[derive(Debug, Default, Encode, Decode, Packet)]
//! #[packet(id = 7, direction = "client_to_server")]
//! pub struct JoinLobby {
//!     pub lobby_id: u32,
//! }
//! ```
//!
//! Because encode and decode are generated from the same field list, the
//! two are always symmetric. Identifiers are assigned by hand and must never
//! be reused for a different message, since peers built from older versions
//! still speak them.
//!
//! At runtime packets travel as `Box<dyn DynPacket>`, which handlers
//! downcast back to the concrete type.

use crate::{
    protocol::{Decode, DecodeError, Decoder, Encode, Encoder},
    registry::RegistryBuilder,
};
use bitflags::bitflags;
use std::{
    any::Any,
    fmt::{self, Debug},
};

pub mod client;
pub mod internal;
pub mod server;

/// Numeric protocol identifier of a packet type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u32);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PacketId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Logical channel a packet type belongs to.
///
/// Only used to validate traffic. Identifier resolution never looks at it.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    /// Server-to-server traffic between backend processes.
    Internal,
}

bitflags! {
    /// A set of directions accepted on one channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Directions: u8 {
        const CLIENT_TO_SERVER = 0x01;
        const SERVER_TO_CLIENT = 0x02;
        const INTERNAL = 0x04;
        /// What a backend process receives: client traffic and internal traffic.
        const SERVER_INBOUND = Self::CLIENT_TO_SERVER.bits() | Self::INTERNAL.bits();
    }
}

impl From<Direction> for Directions {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::ClientToServer => Self::CLIENT_TO_SERVER,
            Direction::ServerToClient => Self::SERVER_TO_CLIENT,
            Direction::Internal => Self::INTERNAL,
        }
    }
}

impl Directions {
    pub fn accepts(self, direction: Direction) -> bool {
        self.contains(direction.into())
    }
}

/// A message type that can be sent over the backend protocol.
///
/// Implemented through `#[derive(Packet)]`. `Default` provides the fresh,
/// unpopulated instance that the registry hands out before decoding.
pub trait Packet: Encode + Decode + Default + Debug + Send + 'static {
    /// Identifier of this type on the wire. Unique across the registry.
    const ID: PacketId;
    /// Channel this type travels on.
    const DIRECTION: Direction;
    /// Name used in logs.
    const NAME: &'static str;
}

/// Object-safe view of a [`Packet`], used wherever the concrete type
/// is only known at runtime.
pub trait DynPacket: Debug + Send + 'static {
    fn identifier(&self) -> PacketId;

    fn direction(&self) -> Direction;

    fn name(&self) -> &'static str;

    /// Writes the payload (without identifier or framing).
    fn encode_payload(&self, encoder: &mut Encoder);

    /// Replaces the contents of `self` with a packet read from `decoder`.
    ///
    /// On error, `self` is left unchanged.
    fn decode_payload(&mut self, decoder: &mut Decoder) -> Result<(), DecodeError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<P: Packet> DynPacket for P {
    fn identifier(&self) -> PacketId {
        P::ID
    }

    fn direction(&self) -> Direction {
        P::DIRECTION
    }

    fn name(&self) -> &'static str {
        P::NAME
    }

    fn encode_payload(&self, encoder: &mut Encoder) {
        Encode::encode(self, encoder);
    }

    fn decode_payload(&mut self, decoder: &mut Decoder) -> Result<(), DecodeError> {
        *self = P::decode(decoder)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn DynPacket {
    /// Returns whether this packet is of type `P`.
    pub fn is<P: Packet>(&self) -> bool {
        self.as_any().is::<P>()
    }

    pub fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.as_any().downcast_ref()
    }

    /// Takes the concrete packet out of the box, or gives the box
    /// back if it holds a different type.
    pub fn downcast<P: Packet>(mut self: Box<Self>) -> Result<P, Box<Self>> {
        match self.as_any_mut().downcast_mut::<P>() {
            Some(packet) => Ok(std::mem::take(packet)),
            None => Err(self),
        }
    }
}

/// Creates a fresh, unpopulated instance of `P`.
pub(crate) fn create_packet<P: Packet>() -> Box<dyn DynPacket> {
    Box::new(P::default())
}

/// Adds every packet type the backend defines.
///
/// This is the single list of known packets. A new message type is not
/// reachable from the wire until it is added here.
pub fn register_all(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .register::<client::PingRequest>()
        .register::<client::LogoutRequest>()
        .register::<server::PingResponse>()
        .register::<client::LoginRequest>()
        .register::<server::LoginResponse>()
        .register::<server::Disconnect>()
        .register::<client::JoinLobby>()
        .register::<server::LobbyUpdate>()
        .register::<client::ChatMessage>()
        .register::<internal::SessionHandoff>()
        .register::<internal::SessionRevoked>()
}
