//! Turns frames into typed packets and back.

use crate::{
    protocol::{
        packet::{Direction, Directions, DynPacket, Packet, PacketId},
        DecodeError, Decoder, Encoder,
    },
    registry::Registry,
};
use bytes::Bytes;
use std::sync::Arc;

/// One unit of wire data: a protocol identifier and the payload
/// that belongs to it, with any framing already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: PacketId,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(id: PacketId, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Encodes a packet into a frame.
    pub fn from_packet(packet: &dyn DynPacket) -> Self {
        let mut payload = Vec::new();
        packet.encode_payload(&mut Encoder::new(&mut payload));
        Self::new(packet.identifier(), payload)
    }
}

/// A frame that could not be turned into a packet.
///
/// None of these are fatal for the process. The owner of the
/// connection decides whether the peer gets disconnected.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown protocol identifier {0}")]
    UnknownProtocol(PacketId),
    #[error("malformed payload for packet {id}: {source}")]
    MalformedPayload {
        id: PacketId,
        #[source]
        source: DecodeError,
    },
    #[error("packet {id} travels {direction}, which is not accepted here")]
    UnexpectedDirection { id: PacketId, direction: Direction },
}

impl DispatchError {
    /// Identifier of the offending frame.
    pub fn id(&self) -> PacketId {
        match self {
            Self::UnknownProtocol(id)
            | Self::MalformedPayload { id, .. }
            | Self::UnexpectedDirection { id, .. } => *id,
        }
    }
}

/// Resolves frames against a shared [`Registry`].
///
/// Cloning is cheap and every clone sees the same registry. Dispatching
/// holds no state of its own, so any number of connections can use
/// dispatchers concurrently.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    accepted: Directions,
}

impl Dispatcher {
    /// Creates a dispatcher accepting packets of every direction.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            accepted: Directions::all(),
        }
    }

    /// Restricts inbound frames to packet types of the given directions.
    pub fn accepting(mut self, directions: Directions) -> Self {
        self.accepted = directions;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn accepted_directions(&self) -> Directions {
        self.accepted
    }

    /// Decodes one inbound frame into a fresh packet.
    ///
    /// The whole payload must be consumed; leftover bytes make the
    /// frame malformed.
    pub fn decode(&self, id: PacketId, payload: &[u8]) -> Result<Box<dyn DynPacket>, DispatchError> {
        let factory = self
            .registry
            .lookup(id)
            .ok_or(DispatchError::UnknownProtocol(id))?;

        if !self.accepted.accepts(factory.direction()) {
            return Err(DispatchError::UnexpectedDirection {
                id,
                direction: factory.direction(),
            });
        }

        let mut packet = factory.create();
        let mut decoder = Decoder::new(payload);
        packet
            .decode_payload(&mut decoder)
            .and_then(|()| decoder.finish())
            .map_err(|source| DispatchError::MalformedPayload { id, source })?;
        Ok(packet)
    }

    /// Decodes one inbound frame and hands the packet to `handler`.
    ///
    /// Whatever the handler returns is passed back unchanged. The handler
    /// only runs if the frame decoded completely.
    pub fn dispatch<R>(
        &self,
        id: PacketId,
        payload: &[u8],
        handler: impl FnOnce(Box<dyn DynPacket>) -> R,
    ) -> Result<R, DispatchError> {
        let packet = self.decode(id, payload)?;
        tracing::trace!("Dispatching {} ({id})", packet.name());
        Ok(handler(packet))
    }

    /// Same as [`dispatch`](Self::dispatch), taking a whole frame.
    pub fn dispatch_frame<R>(
        &self,
        frame: &Frame,
        handler: impl FnOnce(Box<dyn DynPacket>) -> R,
    ) -> Result<R, DispatchError> {
        self.dispatch(frame.id, &frame.payload, handler)
    }

    /// Encodes an outbound packet for the transport.
    pub fn encode_for_send(&self, packet: &dyn DynPacket) -> Frame {
        debug_assert!(
            self.registry.contains(packet.identifier()),
            "sending unregistered packet {}",
            packet.name()
        );
        Frame::from_packet(packet)
    }

    pub fn encode_packet<P: Packet>(&self, packet: &P) -> Frame {
        self.encode_for_send(packet)
    }
}
