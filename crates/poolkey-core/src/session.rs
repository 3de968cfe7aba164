// ── Session manager ──
//
// One authenticated panel client per backend, created lazily and keyed by
// backend id. Logins are single-flight per backend: the login gate is an
// async mutex plus a generation counter, so callers that saw the same
// stale session trigger one re-login between them. Logins run on their
// own task and finish even if the caller that started them goes away.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use poolkey_api::{PanelClient, TlsMode, TransportConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{BackendDescriptor, BackendId, PoolSettings, TlsVerification};
use crate::error::CoreError;
use crate::registry::RegistrySnapshot;

/// Authenticated panel clients for every backend in the pool.
pub struct SessionManager {
    transport: TransportConfig,
    api_prefix: String,
    sessions: DashMap<BackendId, Arc<BackendSession>>,
}

struct BackendSession {
    backend: BackendDescriptor,
    client: Arc<PanelClient>,
    state: Mutex<LoginState>,
}

#[derive(Debug, Default)]
struct LoginState {
    authenticated: bool,
    /// Bumped on every successful login.
    generation: u64,
}

impl SessionManager {
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            transport: build_transport(settings),
            api_prefix: settings.api_prefix.clone(),
            sessions: DashMap::new(),
        }
    }

    /// Log in to `backend` unless a session is already cached.
    pub async fn ensure_session(&self, backend: &BackendDescriptor) -> Result<(), CoreError> {
        let session = self.session_for(backend)?;
        session.ensure().await.map(|_| ())
    }

    /// Run `op` against `backend`'s panel client with the default error
    /// translation.
    pub async fn call<T, F, Fut>(&self, backend: &BackendDescriptor, op: F) -> Result<T, CoreError>
    where
        F: Fn(Arc<PanelClient>) -> Fut,
        Fut: Future<Output = Result<T, poolkey_api::Error>>,
    {
        self.call_with(backend, op, CoreError::for_backend).await
    }

    /// Run `op` against `backend`'s panel client.
    ///
    /// If the panel answers with a session-invalid signal, the session is
    /// re-established once and `op` retried once. A second explicit
    /// rejection in a row is `BackendUnavailable`; an ambiguous refusal that
    /// survives a fresh login is genuine and goes through `map_err`, like
    /// any other API error.
    pub async fn call_with<T, F, Fut, M>(
        &self,
        backend: &BackendDescriptor,
        op: F,
        map_err: M,
    ) -> Result<T, CoreError>
    where
        F: Fn(Arc<PanelClient>) -> Fut,
        Fut: Future<Output = Result<T, poolkey_api::Error>>,
        M: Fn(&BackendId, poolkey_api::Error) -> CoreError,
    {
        let session = self.session_for(backend)?;
        let generation = session.ensure().await?;

        match op(Arc::clone(&session.client)).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_auth_expired() => {
                warn!(backend = %backend.id, "session rejected, logging in again");
            }
            Err(e) => return Err(map_err(&backend.id, e)),
        }

        let generation = session.relogin(generation).await?;

        match op(Arc::clone(&session.client)).await {
            Ok(value) => Ok(value),
            Err(poolkey_api::Error::SessionExpired) => {
                session.mark_stale(generation).await;
                Err(CoreError::BackendUnavailable {
                    backend: backend.id.to_string(),
                    reason: "session rejected again right after re-login".into(),
                })
            }
            Err(e) => Err(map_err(&backend.id, e)),
        }
    }

    /// Drop cached sessions for backends no longer in `snapshot`.
    pub fn prune(&self, snapshot: &RegistrySnapshot) {
        self.sessions
            .retain(|id, _| snapshot.get(id.as_str()).is_some());
    }

    /// Number of backends with a cached client.
    pub fn cached(&self) -> usize {
        self.sessions.len()
    }

    /// The cached session for `backend`, replaced if its login details
    /// changed since it was created.
    fn session_for(&self, backend: &BackendDescriptor) -> Result<Arc<BackendSession>, CoreError> {
        if let Some(existing) = self.sessions.get(&backend.id) {
            if existing.backend.same_login(backend) {
                return Ok(Arc::clone(existing.value()));
            }
        }

        match self.sessions.entry(backend.id.clone()) {
            Entry::Occupied(entry) if entry.get().backend.same_login(backend) => {
                Ok(Arc::clone(entry.get()))
            }
            Entry::Occupied(mut entry) => {
                debug!(backend = %backend.id, "login details changed, replacing session");
                let session = Arc::new(self.open(backend)?);
                entry.insert(Arc::clone(&session));
                Ok(session)
            }
            Entry::Vacant(entry) => {
                let session = Arc::new(self.open(backend)?);
                entry.insert(Arc::clone(&session));
                Ok(session)
            }
        }
    }

    fn open(&self, backend: &BackendDescriptor) -> Result<BackendSession, CoreError> {
        let client = PanelClient::new(backend.panel_url.clone(), &self.api_prefix, &self.transport)
            .map_err(|e| CoreError::for_backend(&backend.id, e))?;
        Ok(BackendSession {
            backend: backend.clone(),
            client: Arc::new(client),
            state: Mutex::new(LoginState::default()),
        })
    }
}

impl BackendSession {
    /// Current generation, logging in first if needed.
    async fn ensure(self: &Arc<Self>) -> Result<u64, CoreError> {
        {
            let state = self.state.lock().await;
            if state.authenticated {
                return Ok(state.generation);
            }
        }
        self.spawn_login(None).await
    }

    /// Log in again unless someone already did since `seen`.
    async fn relogin(self: &Arc<Self>, seen: u64) -> Result<u64, CoreError> {
        self.spawn_login(Some(seen)).await
    }

    async fn spawn_login(self: &Arc<Self>, seen: Option<u64>) -> Result<u64, CoreError> {
        let session = Arc::clone(self);
        tokio::spawn(async move { session.login(seen).await })
            .await
            .map_err(|e| CoreError::Internal(format!("login task failed: {e}")))?
    }

    async fn login(&self, seen: Option<u64>) -> Result<u64, CoreError> {
        let mut state = self.state.lock().await;
        let fresh = match seen {
            None => state.authenticated,
            Some(seen) => state.authenticated && state.generation != seen,
        };
        if fresh {
            return Ok(state.generation);
        }

        let id = &self.backend.id;
        state.authenticated = false;
        match self
            .client
            .login(&self.backend.username, &self.backend.password)
            .await
        {
            Ok(()) => {
                state.authenticated = true;
                state.generation += 1;
                info!(backend = %id, generation = state.generation, "logged in to panel");
                Ok(state.generation)
            }
            Err(e) => {
                warn!(backend = %id, error = %e, "panel login failed");
                Err(login_error(id, e))
            }
        }
    }

    async fn mark_stale(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.authenticated = false;
        }
    }
}

/// A refused or timed-out login is an authentication failure; anything
/// else (refused connection, TLS) keeps its usual translation.
fn login_error(id: &BackendId, err: poolkey_api::Error) -> CoreError {
    match err {
        poolkey_api::Error::Authentication { message } => CoreError::AuthenticationFailed {
            backend: id.to_string(),
            message,
        },
        e if e.is_timeout() => CoreError::AuthenticationFailed {
            backend: id.to_string(),
            message: "login timed out".into(),
        },
        e => CoreError::for_backend(id, e),
    }
}

fn build_transport(settings: &PoolSettings) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&settings.tls),
        timeout: settings.request_timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
