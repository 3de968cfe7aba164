// poolkey-core: Backend pool orchestration between poolkey-api and consumers (CLI).

pub mod balancer;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod probe;
pub mod provision;
pub mod registry;
pub mod session;
pub mod uri;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use balancer::LoadBalancer;
pub use config::{BackendDescriptor, BackendId, PoolSettings, ProbeFailurePolicy, TlsVerification};
pub use controller::PoolController;
pub use error::CoreError;
pub use probe::{InboundLoad, LoadProbe, PanelLoadProbe};
pub use provision::ProvisioningClient;
pub use registry::{RegistrySnapshot, ServerRegistry};
pub use session::SessionManager;
pub use usage::UsageQueryService;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BackendStatus, ClientCredential, Expiry, ProvisionRequest, ProvisionResult, Transport,
    UsageRecord,
};

// Cancellation tokens are part of every controller call.
pub use tokio_util::sync::CancellationToken;
