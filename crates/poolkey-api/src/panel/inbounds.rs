// Panel inbound endpoints
//
// Inbound reads (single + list) and client creation. Client lists live
// inside each inbound's JSON-encoded `settings`, so there is no separate
// "list clients" endpoint.

use serde_json::json;
use tracing::{debug, warn};

use crate::error::{Error, is_duplicate_message};
use crate::panel::client::PanelClient;
use crate::panel::models::{AddClientRequest, Inbound, InboundClient};

impl PanelClient {
    /// Fetch one inbound by id.
    ///
    /// `GET {base}/{prefix}/inbounds/get/{id}`
    pub async fn get_inbound(&self, inbound_id: u32) -> Result<Inbound, Error> {
        let url = self.api_url(&format!("inbounds/get/{inbound_id}"))?;
        debug!(inbound_id, "fetching inbound");
        self.get(url).await
    }

    /// List every inbound on the panel.
    ///
    /// `GET {base}/{prefix}/inbounds/list`
    pub async fn list_inbounds(&self) -> Result<Vec<Inbound>, Error> {
        let url = self.api_url("inbounds/list")?;
        debug!("listing inbounds");
        self.get(url).await
    }

    /// Add clients to an inbound.
    ///
    /// `POST {base}/{prefix}/inbounds/addClient` with
    /// `{"id": N, "settings": "{\"clients\": [...]}"}`
    ///
    /// A refusal because the email is already in use comes back as
    /// [`Error::DuplicateClient`]; any other refusal as [`Error::PanelApi`].
    pub async fn add_clients(
        &self,
        inbound_id: u32,
        clients: &[InboundClient],
    ) -> Result<(), Error> {
        let url = self.api_url("inbounds/addClient")?;
        debug!(inbound_id, count = clients.len(), "adding clients");

        let settings = serde_json::to_string(&json!({ "clients": clients })).map_err(|e| {
            Error::Deserialization {
                message: format!("failed to encode client settings: {e}"),
                body: String::new(),
            }
        })?;
        let body = AddClientRequest {
            id: inbound_id,
            settings,
        };

        let envelope = self.post_json::<serde_json::Value>(url, &body).await?;
        if envelope.success {
            return Ok(());
        }

        let message = envelope
            .msg
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "addClient refused".into());
        if is_duplicate_message(&message) {
            debug!(inbound_id, %message, "panel reports duplicate client");
            Err(Error::DuplicateClient { message })
        } else {
            warn!(inbound_id, %message, "panel refused addClient");
            Err(Error::PanelApi { message })
        }
    }
}
