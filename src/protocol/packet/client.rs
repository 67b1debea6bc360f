//! Packets sent by game clients to the authentication, lobby and game servers.

use backend_protocol_macros::{Decode, Encode, Packet};

/// Keep-alive probe, answered with a `PingResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 1, direction = "client_to_server")]
pub struct PingRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 2, direction = "client_to_server")]
pub struct LogoutRequest;

/// First packet on an authentication server connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 4, direction = "client_to_server")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[encoding(varint)]
    pub client_version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 7, direction = "client_to_server")]
pub struct JoinLobby {
    pub lobby_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 9, direction = "client_to_server")]
pub struct ChatMessage {
    pub channel: ChatChannel,
    pub text: String,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum ChatChannel {
    #[default]
    #[encoding(id = 0)]
    Global,
    #[encoding(id = 1)]
    Lobby,
    #[encoding(id = 2)]
    Team,
}
