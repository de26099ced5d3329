//! Per-connection gateway state.

use crate::hub::{ClientHandle, Deliverable};

/// One authenticated socket.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    /// `cli_` prefixed ULID, the client's key in the hub.
    pub client_id: String,
    pub user_id: String,
}

impl GatewaySession {
    pub fn for_client(handle: &ClientHandle) -> Self {
        Self {
            client_id: handle.id().to_string(),
            user_id: handle.user_id().to_string(),
        }
    }
}
