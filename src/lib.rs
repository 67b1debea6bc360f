//! Message layer shared by the authentication, lobby and game server
//! processes of the backend.
//!
//! Every message is a packet type with a fixed numeric identifier and a
//! declared direction (client to server, server to client, or internal
//! server-to-server traffic). On the wire a packet is a _frame_: the
//! identifier followed by the packet's payload.
//!
//! # Receiving
//! At startup each process builds a [`Registry`] of all packet types it
//! knows. The registry is immutable from then on and shared by every
//! connection through a [`Dispatcher`]. For each inbound frame the
//! dispatcher looks up the identifier, creates a fresh packet, decodes
//! the payload into it and hands it to the caller's handler. Unknown
//! identifiers and malformed payloads are reported back as
//! [`DispatchError`]s; they never take the process down.
//!
//! # Sending
//! Outbound packets are encoded into a [`Frame`], which the transport
//! prefixes with its length and writes out. [`Connection`] implements
//! this transport for any tokio byte stream.

pub mod connection;
pub mod dispatcher;
pub mod protocol;
pub mod registry;

pub use connection::{Connection, ConnectionConfig, Outbox, PacketHandler, PacketSender};
pub use dispatcher::{DispatchError, Dispatcher, Frame};
pub use protocol::packet::{Direction, Directions, DynPacket, Packet, PacketId};
pub use registry::{FactoryMismatch, PacketFactory, Registry, RegistryBuilder, RegistryError};
