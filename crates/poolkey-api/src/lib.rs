// poolkey-api: Async Rust client for the 3x-ui VPN panel management API

pub mod error;
pub mod panel;
pub mod transport;

pub use error::Error;
pub use panel::models::{ClientTraffic, Inbound, InboundClient, PanelResponse};
pub use panel::{DEFAULT_API_PREFIX, PanelClient};
pub use transport::{TlsMode, TransportConfig};
