// ── Usage records ──

use serde::Serialize;

use crate::config::BackendId;
use crate::model::credential::Expiry;

/// Traffic and quota of one credential, read live from its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub client_id: String,
    pub label: String,
    pub backend: BackendId,
    pub backend_name: String,
    pub inbound_id: u32,
    pub up_bytes: u64,
    pub down_bytes: u64,
    /// `0` is unlimited.
    pub quota_bytes: u64,
    pub expiry: Expiry,
    pub enabled: bool,
}

impl UsageRecord {
    pub fn used_bytes(&self) -> u64 {
        self.up_bytes.saturating_add(self.down_bytes)
    }

    /// Bytes left before the quota is hit; `None` for unlimited quotas.
    pub fn remaining_bytes(&self) -> Option<u64> {
        (self.quota_bytes > 0).then(|| self.quota_bytes.saturating_sub(self.used_bytes()))
    }
}
