// ── Domain model ──
//
// Canonical representations of what the pool hands out and reports on.
// Panel wire shapes stay in poolkey-api; these types are what the CLI and
// any other front-end depend on.

pub mod credential;
pub mod status;
pub mod transport;
pub mod usage;

pub use credential::{ClientCredential, Expiry, ProvisionRequest, ProvisionResult};
pub use status::BackendStatus;
pub use transport::Transport;
pub use usage::UsageRecord;
