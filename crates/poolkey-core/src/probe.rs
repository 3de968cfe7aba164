// ── Load probe ──
//
// Asks a backend how many clients its configured inbound carries, and under
// which labels. Every failure mode collapses into `ProbeFailed`; the
// balancer decides what a failed probe means.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::BackendDescriptor;
use crate::error::CoreError;
use crate::session::SessionManager;

/// Live view of one backend's inbound.
#[derive(Debug, Clone, Default)]
pub struct InboundLoad {
    /// Configured clients.
    pub clients: usize,
    labels: HashSet<String>,
}

impl InboundLoad {
    /// One entry per configured client, by label.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        Self {
            clients: labels.len(),
            labels: labels.into_iter().collect(),
        }
    }

    /// Whether a client with this label already exists.
    pub fn holds(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Reports the current load of a backend.
pub trait LoadProbe: Send + Sync {
    fn load(
        &self,
        backend: &BackendDescriptor,
    ) -> impl Future<Output = Result<InboundLoad, CoreError>> + Send;
}

/// Counts clients by reading the inbound over the panel API.
#[derive(Clone)]
pub struct PanelLoadProbe {
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl PanelLoadProbe {
    pub fn new(sessions: Arc<SessionManager>, timeout: Duration) -> Self {
        Self { sessions, timeout }
    }
}

impl LoadProbe for PanelLoadProbe {
    async fn load(&self, backend: &BackendDescriptor) -> Result<InboundLoad, CoreError> {
        let inbound_id = backend.inbound_id;
        let fetch = self.sessions.call(backend, move |client| async move {
            client.get_inbound(inbound_id).await
        });

        let probe_failed = |reason: String| CoreError::ProbeFailed {
            backend: backend.id.to_string(),
            reason,
        };

        let inbound = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| probe_failed(format!("no answer within {:?}", self.timeout)))?
            .map_err(|e| probe_failed(e.to_string()))?;
        let clients = inbound
            .clients()
            .map_err(|e| probe_failed(e.to_string()))?;

        debug!(backend = %backend.id, clients = clients.len(), "probed load");
        Ok(InboundLoad::from_labels(clients.into_iter().map(|c| c.email)))
    }
}
