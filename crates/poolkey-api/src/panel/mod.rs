// Panel API client modules
//
// Hand-written client for the 3x-ui panel's JSON endpoints: cookie login,
// inbound reads, and client creation, all wrapped in the standard
// `{ success, msg, obj }` envelope.

pub mod auth;
pub mod client;
pub mod inbounds;
pub mod models;

pub use client::{DEFAULT_API_PREFIX, PanelClient};
