// ── Usage queries ──
//
// Finds a credential by id by walking the pool in registry order. Nothing
// is cached: each lookup reads live counters from the backends.

use std::sync::Arc;

use poolkey_api::Inbound;
use tracing::{debug, warn};

use crate::config::BackendDescriptor;
use crate::error::CoreError;
use crate::model::{Expiry, UsageRecord};
use crate::registry::ServerRegistry;
use crate::session::SessionManager;

pub struct UsageQueryService {
    registry: Arc<ServerRegistry>,
    sessions: Arc<SessionManager>,
}

impl UsageQueryService {
    pub fn new(registry: Arc<ServerRegistry>, sessions: Arc<SessionManager>) -> Self {
        Self { registry, sessions }
    }

    /// Usage of the client with `client_id`, or `None` if no enabled
    /// backend knows it.
    ///
    /// Backends that fail are logged and skipped; the scan stops at the
    /// first match.
    pub async fn lookup(&self, client_id: &str) -> Result<Option<UsageRecord>, CoreError> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "client id must not be empty".into(),
            });
        }

        let snapshot = self.registry.snapshot();
        for backend in snapshot.eligible(None, true) {
            let inbounds = match self
                .sessions
                .call(&backend, |client| async move { client.list_inbounds().await })
                .await
            {
                Ok(inbounds) => inbounds,
                Err(e) => {
                    warn!(backend = %backend.id, error = %e, "skipping backend in usage scan");
                    continue;
                }
            };

            if let Some(record) = find_in(&backend, &inbounds, client_id) {
                debug!(backend = %backend.id, client_id, "client found");
                return Ok(Some(record));
            }
        }

        debug!(client_id, "client not found on any backend");
        Ok(None)
    }
}

fn find_in(backend: &BackendDescriptor, inbounds: &[Inbound], client_id: &str) -> Option<UsageRecord> {
    inbounds.iter().find_map(|inbound| {
        let clients = match inbound.clients() {
            Ok(clients) => clients,
            Err(e) => {
                warn!(backend = %backend.id, inbound = inbound.id, error = %e, "unreadable client list");
                return None;
            }
        };
        let client = clients
            .into_iter()
            .find(|c| c.id.eq_ignore_ascii_case(client_id))?;

        // Live counters are keyed by label and win over the static fields.
        let live = inbound.traffic_for(&client.email);
        Some(UsageRecord {
            client_id: client.id.clone(),
            label: client.email.clone(),
            backend: backend.id.clone(),
            backend_name: backend.name.clone(),
            inbound_id: inbound.id,
            up_bytes: live.map_or(client.up.unwrap_or_default(), |t| t.up),
            down_bytes: live.map_or(client.down.unwrap_or_default(), |t| t.down),
            quota_bytes: client.total_gb,
            expiry: Expiry::from_panel_millis(client.expiry_time),
            enabled: live.map_or(client.enable, |t| t.enable && client.enable),
        })
    })
}
