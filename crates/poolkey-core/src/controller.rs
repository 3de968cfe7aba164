// ── Pool controller ──
//
// Facade over the registry, sessions, balancer, provisioning and usage
// services. Every public operation takes a cancellation token; cancelling
// drops the in-flight work and surfaces `Cancelled`, except for logins,
// which run on their own task and finish regardless.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balancer::LoadBalancer;
use crate::config::{BackendDescriptor, PoolSettings};
use crate::error::CoreError;
use crate::model::{BackendStatus, ProvisionRequest, ProvisionResult, UsageRecord};
use crate::probe::{LoadProbe, PanelLoadProbe};
use crate::provision::ProvisioningClient;
use crate::registry::{RegistrySnapshot, ServerRegistry};
use crate::session::SessionManager;
use crate::usage::UsageQueryService;

// ── PoolController ───────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<PoolInner>`. Holds no background tasks:
/// each call does its own work and returns.
#[derive(Clone)]
pub struct PoolController {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    settings: PoolSettings,
    registry: Arc<ServerRegistry>,
    sessions: Arc<SessionManager>,
    balancer: LoadBalancer<PanelLoadProbe>,
    provisioner: ProvisioningClient,
    usage: UsageQueryService,
    /// Provisioning gates keyed by label.
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl PoolController {
    /// Build a controller over `snapshot`. Does not contact any backend.
    pub fn new(settings: PoolSettings, snapshot: RegistrySnapshot) -> Self {
        let registry = Arc::new(ServerRegistry::new(snapshot));
        let sessions = Arc::new(SessionManager::new(&settings));
        let probe = PanelLoadProbe::new(Arc::clone(&sessions), settings.probe_timeout);

        Self {
            inner: Arc::new(PoolInner {
                balancer: LoadBalancer::new(probe, settings.probe_failure),
                provisioner: ProvisioningClient::new(Arc::clone(&sessions), settings.limit_ip),
                usage: UsageQueryService::new(Arc::clone(&registry), Arc::clone(&sessions)),
                registry,
                sessions,
                settings,
                inflight: DashMap::new(),
            }),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.inner.registry
    }

    /// Swap in a new backend list and drop sessions for removed backends.
    pub fn reload(&self, snapshot: RegistrySnapshot) {
        self.inner.sessions.prune(&snapshot);
        self.inner.registry.reload(snapshot);
    }

    // ── Provisioning ─────────────────────────────────────────────

    /// Issue a credential on the least-loaded enabled backend in `region`
    /// (any region when `None`). A backend that already holds the label is
    /// chosen regardless of load, so the repeat comes back `existed = true`.
    pub async fn provision(
        &self,
        region: Option<&str>,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionResult, CoreError> {
        request.validate()?;
        cancellable(cancel, async {
            let _lease = self.lease(&request.label).await;

            let snapshot = self.inner.registry.snapshot();
            let candidates = snapshot.eligible(region, true);
            if candidates.is_empty() {
                return Err(CoreError::NoBackendsAvailable {
                    region: region.map(str::to_owned),
                });
            }
            debug!(candidates = candidates.len(), ?region, "selecting backend");

            let chosen = self.inner.balancer.select(&candidates, &request.label).await?;
            self.inner.provisioner.provision(&chosen, request).await
        })
        .await
    }

    /// Issue a credential on a specific backend, or on the registry
    /// default when `backend_id` is `None`. An explicit id may name a
    /// disabled backend.
    pub async fn provision_on(
        &self,
        backend_id: Option<&str>,
        request: &ProvisionRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionResult, CoreError> {
        request.validate()?;
        let snapshot = self.inner.registry.snapshot();
        let backend = match backend_id {
            Some(id) => snapshot
                .get(id)
                .ok_or_else(|| CoreError::BackendNotFound { id: id.to_owned() })?,
            None => snapshot.default_backend()?,
        };
        if !backend.enabled {
            warn!(backend = %backend.id, "provisioning on a disabled backend by request");
        }

        cancellable(cancel, async {
            let _lease = self.lease(&request.label).await;
            self.inner.provisioner.provision(backend, request).await
        })
        .await
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Usage of the credential with `client_id`; `None` when no enabled
    /// backend has it.
    pub async fn lookup(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UsageRecord>, CoreError> {
        cancellable(cancel, self.inner.usage.lookup(client_id)).await
    }

    /// Reachability and load of every configured backend, enabled or not.
    ///
    /// Individual failures end up in the per-backend entries; only
    /// cancellation fails the sweep as a whole.
    pub async fn status(&self, cancel: &CancellationToken) -> Result<Vec<BackendStatus>, CoreError> {
        let snapshot = self.inner.registry.snapshot();
        let checks = snapshot
            .backends()
            .iter()
            .map(|backend| self.check(backend, snapshot.is_default(backend.id.as_str())));
        cancellable(cancel, async { Ok(join_all(checks).await) }).await
    }

    async fn check(&self, backend: &BackendDescriptor, is_default: bool) -> BackendStatus {
        let mut status = BackendStatus {
            id: backend.id.clone(),
            name: backend.name.clone(),
            region: backend.region.clone(),
            enabled: backend.enabled,
            is_default,
            online: false,
            clients: None,
            error: None,
        };

        let timeout = self.inner.settings.probe_timeout;
        match tokio::time::timeout(timeout, self.inner.sessions.ensure_session(backend)).await {
            Err(_) => {
                status.error = Some(format!("login timed out after {timeout:?}"));
                return status;
            }
            Ok(Err(e)) => {
                status.error = Some(e.to_string());
                return status;
            }
            Ok(Ok(())) => status.online = true,
        }

        match self.inner.balancer.probe().load(backend).await {
            Ok(load) => status.clients = Some(load.clients),
            Err(e) => status.error = Some(e.to_string()),
        }
        status
    }

    // ── Label gates ──────────────────────────────────────────────

    /// Serialise provisioning per label, so two concurrent requests for
    /// the same label cannot both create a client.
    async fn lease(&self, label: &str) -> LabelLease<'_> {
        let gate = Arc::clone(self.inner.inflight.entry(label.to_owned()).or_default().value());
        let guard = gate.lock_owned().await;
        LabelLease {
            inflight: &self.inner.inflight,
            label: label.to_owned(),
            guard: Some(guard),
        }
    }
}

struct LabelLease<'a> {
    inflight: &'a DashMap<String, Arc<Mutex<()>>>,
    label: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LabelLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still holds the gate: nobody is queued behind us.
        self.inflight
            .remove_if(&self.label, |_, gate| Arc::strong_count(gate) == 1);
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, CoreError>>,
) -> Result<T, CoreError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            info!("operation cancelled");
            Err(CoreError::Cancelled)
        }
        result = work => result,
    }
}
