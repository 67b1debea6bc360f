//! Packets sent by backend servers to game clients.

use backend_protocol_macros::{Decode, Encode, Packet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 3, direction = "server_to_client")]
pub struct PingResponse;

/// Answer to a `LoginRequest`. The session token is only
/// present when `result` is `Success`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 5, direction = "server_to_client")]
pub struct LoginResponse {
    pub result: LoginResult,
    #[encoding(bool_prefixed)]
    pub session_token: Option<String>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum LoginResult {
    #[default]
    #[encoding(id = 0)]
    Success,
    #[encoding(id = 1)]
    InvalidCredentials,
    #[encoding(id = 2)]
    AccountLocked,
    #[encoding(id = 3)]
    AccountBanned,
    #[encoding(id = 4)]
    VersionMismatch,
    #[encoding(id = 5)]
    ServerFull,
}

/// Sent right before the server closes the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 6, direction = "server_to_client")]
pub struct Disconnect {
    pub reason: DisconnectReason,
    #[encoding(bool_prefixed)]
    pub message: Option<String>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum DisconnectReason {
    #[default]
    #[encoding(id = 0)]
    Logout,
    #[encoding(id = 1)]
    Kicked,
    #[encoding(id = 2)]
    Timeout,
    #[encoding(id = 3)]
    ProtocolError,
    #[encoding(id = 4)]
    ServerShutdown,
    #[encoding(id = 5)]
    DuplicateLogin,
}

/// Full roster of a lobby, sent whenever it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 8, direction = "server_to_client")]
pub struct LobbyUpdate {
    pub lobby_id: u32,
    #[encoding(length_prefix = "varint")]
    pub players: Vec<LobbyPlayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct LobbyPlayer {
    pub account_id: u64,
    pub display_name: String,
    pub ready: bool,
}
