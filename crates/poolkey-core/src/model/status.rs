// ── Backend status ──

use serde::Serialize;

use crate::config::BackendId;

/// Reachability and load of one backend, as reported by a status sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub id: BackendId,
    pub name: String,
    pub region: String,
    pub enabled: bool,
    pub is_default: bool,
    /// Login succeeded within the status timeout.
    pub online: bool,
    /// Clients on the configured inbound, when the probe succeeded.
    pub clients: Option<usize>,
    pub error: Option<String>,
}
