//! Server-to-server packets exchanged between the authentication,
//! lobby and game processes.

use backend_protocol_macros::{Decode, Encode, Packet};

/// Hands an authenticated session over to the server that
/// will host the player next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 10, direction = "internal")]
pub struct SessionHandoff {
    pub account_id: u64,
    pub session_token: String,
    pub target_server: String,
}

/// Tells every process to drop the sessions of an account,
/// e.g. after it was locked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode, Packet)]
#[packet(id = 11, direction = "internal")]
pub struct SessionRevoked {
    pub account_id: u64,
}
