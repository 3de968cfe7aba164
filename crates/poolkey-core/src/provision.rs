// ── Provisioning client ──
//
// Issues a credential on one chosen backend. The label is the idempotency
// key: when the panel refuses a duplicate, the client already stored
// under that label is returned instead of a new one.

use std::sync::Arc;

use chrono::Utc;
use poolkey_api::{Inbound, InboundClient, PanelClient};
use tracing::{debug, info, warn};

use crate::config::{BackendDescriptor, BackendId};
use crate::error::CoreError;
use crate::model::{ClientCredential, ProvisionRequest, ProvisionResult, Transport};
use crate::session::SessionManager;
use crate::uri::{Endpoint, connection_uri};

/// What the panel made of an `addClient` call.
enum AddOutcome {
    Created,
    Duplicate(String),
}

/// The parts of an inbound provisioning needs, decoded once.
struct InboundView {
    port: u16,
    transport: Transport,
    clients: Vec<InboundClient>,
}

impl InboundView {
    fn parse(backend: &BackendId, inbound: &Inbound) -> Self {
        let clients = inbound.clients().unwrap_or_else(|e| {
            warn!(backend = %backend, error = %e, "unreadable client list, treating as empty");
            Vec::new()
        });
        Self {
            port: inbound.port,
            transport: Transport::from_stream_settings(inbound.stream_settings().as_ref()),
            clients,
        }
    }
}

/// Creates (or recovers) client credentials on a single backend.
pub struct ProvisioningClient {
    sessions: Arc<SessionManager>,
    limit_ip: u32,
}

impl ProvisioningClient {
    pub fn new(sessions: Arc<SessionManager>, limit_ip: u32) -> Self {
        Self { sessions, limit_ip }
    }

    /// Issue a credential for `request` on `backend`.
    ///
    /// Returns `existed = true` with the stored credential when the label
    /// is already taken on this backend.
    pub async fn provision(
        &self,
        backend: &BackendDescriptor,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResult, CoreError> {
        let credential = ClientCredential::mint(request, Utc::now())?;
        let host = backend.connect_host().ok_or_else(|| CoreError::Config {
            message: format!("backend {} has no host to put in links", backend.id),
        })?;

        let inbound_id = backend.inbound_id;
        let inbound = self
            .sessions
            .call_with(
                backend,
                move |client| async move { client.get_inbound(inbound_id).await },
                provisioning_error,
            )
            .await?;
        let view = InboundView::parse(&backend.id, &inbound);
        debug!(
            backend = %backend.id,
            transport = view.transport.kind(),
            clients = view.clients.len(),
            "inbound loaded"
        );

        let entry = credential.to_panel(view.transport.client_flow(), self.limit_ip);
        let outcome = self
            .sessions
            .call_with(
                backend,
                |client| add_one(client, inbound_id, entry.clone()),
                provisioning_error,
            )
            .await?;

        let endpoint = Endpoint {
            host: &host,
            port: view.port,
        };
        match outcome {
            AddOutcome::Created => {
                info!(backend = %backend.id, label = %request.label, "issued new credential");
                Ok(ProvisionResult {
                    uri: connection_uri(&credential.id, endpoint, &view.transport, &request.label),
                    existed: false,
                    backend: backend.id.clone(),
                    credential,
                })
            }
            AddOutcome::Duplicate(message) => {
                let existing = view
                    .clients
                    .iter()
                    .find(|c| c.email == request.label)
                    .ok_or_else(|| CoreError::ProvisioningFailed {
                        backend: backend.id.to_string(),
                        message: format!(
                            "{message} (no client labelled '{}' on inbound {inbound_id})",
                            request.label
                        ),
                    })?;
                let existing = ClientCredential::from_panel(existing).map_err(|e| {
                    CoreError::ProvisioningFailed {
                        backend: backend.id.to_string(),
                        message: e.to_string(),
                    }
                })?;
                info!(backend = %backend.id, label = %request.label, "label already issued, returning existing credential");
                Ok(ProvisionResult {
                    uri: connection_uri(&existing.id, endpoint, &view.transport, &request.label),
                    existed: true,
                    backend: backend.id.clone(),
                    credential: existing,
                })
            }
        }
    }
}

async fn add_one(
    client: Arc<PanelClient>,
    inbound_id: u32,
    entry: InboundClient,
) -> Result<AddOutcome, poolkey_api::Error> {
    match client.add_clients(inbound_id, std::slice::from_ref(&entry)).await {
        Ok(()) => Ok(AddOutcome::Created),
        Err(poolkey_api::Error::DuplicateClient { message }) => Ok(AddOutcome::Duplicate(message)),
        Err(e) => Err(e),
    }
}

/// Everything but a bad login, a config problem or a timeout is a
/// provisioning failure from the caller's point of view.
///
/// Timeouts are the one transport failure that does not become
/// `ProvisioningFailed`: that variant promises nothing was issued, while a
/// timed-out `addClient` may still have landed on the panel. They surface
/// as `Timeout` so the caller knows to retry with the same label, which
/// returns the credential if it exists.
fn provisioning_error(backend: &BackendId, err: poolkey_api::Error) -> CoreError {
    match CoreError::for_backend(backend, err) {
        e @ (CoreError::AuthenticationFailed { .. }
        | CoreError::Config { .. }
        | CoreError::Timeout { .. }) => e,
        other => CoreError::ProvisioningFailed {
            backend: backend.to_string(),
            message: match other {
                CoreError::BackendUnavailable { reason, .. } => reason,
                CoreError::Backend { message, .. } => message,
                e => e.to_string(),
            },
        },
    }
}
