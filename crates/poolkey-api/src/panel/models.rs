// Panel API response types
//
// Models for the 3x-ui panel JSON API. All responses are wrapped in the
// `PanelResponse<T>` envelope. Fields use `#[serde(default)]` liberally
// because panel versions disagree about which fields they emit, and the
// inbound `settings` / `streamSettings` are JSON documents encoded as strings.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard panel response envelope.
///
/// ```json
/// { "success": true, "msg": "optional", "obj": ... }
/// ```
#[derive(Debug, Deserialize)]
pub struct PanelResponse<T> {
    pub success: bool,
    pub msg: Option<String>,
    pub obj: Option<T>,
}

// ── Inbound ──────────────────────────────────────────────────────────

/// An inbound as returned by `inbounds/get/{id}` and `inbounds/list`.
///
/// `settings` and `stream_settings` stay as raw strings here; use
/// [`clients()`](Self::clients) and [`stream_settings()`](Self::stream_settings)
/// to decode them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub id: u32,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub settings: String,
    #[serde(default)]
    pub stream_settings: String,
    /// Live traffic counters, one per client email. The panel sends `null`
    /// for an inbound that has never had clients.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub client_stats: Vec<ClientTraffic>,
}

impl Inbound {
    /// Decode the client list from the JSON-encoded `settings` field.
    ///
    /// An empty settings string is treated as an inbound with no clients.
    pub fn clients(&self) -> Result<Vec<InboundClient>, Error> {
        if self.settings.trim().is_empty() {
            return Ok(Vec::new());
        }
        let decoded: InboundSettings =
            serde_json::from_str(&self.settings).map_err(|e| Error::Deserialization {
                message: format!("inbound {} settings: {e}", self.id),
                body: self.settings.clone(),
            })?;
        Ok(decoded.clients)
    }

    /// Decode `streamSettings` into a loose JSON value.
    ///
    /// Returns `None` when the field is empty or not valid JSON; callers
    /// fall back to a plain transport in that case.
    pub fn stream_settings(&self) -> Option<serde_json::Value> {
        if self.stream_settings.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.stream_settings).ok()
    }

    /// Live traffic counters for the client with the given email.
    pub fn traffic_for(&self, email: &str) -> Option<&ClientTraffic> {
        self.client_stats.iter().find(|s| s.email == email)
    }
}

/// The decoded `settings` document of an inbound.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InboundSettings {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clients: Vec<InboundClient>,
}

/// One client entry inside an inbound's `settings.clients`.
///
/// Also the shape posted to `addClient`. Note that the panel names the byte
/// quota `totalGB` even though the value is in bytes.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboundClient {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub flow: String,
    #[serde(default, rename = "totalGB")]
    pub total_gb: u64,
    /// Epoch milliseconds; `0` means never, negative means "duration
    /// starting at first use".
    #[serde(default)]
    pub expiry_time: i64,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub tg_id: serde_json::Value,
    #[serde(default)]
    pub sub_id: String,
    #[serde(default)]
    pub limit_ip: u32,
    /// Static counters some panel builds keep inside the client record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<u64>,
}

/// Live traffic counters from `clientStats`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientTraffic {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub expiry_time: i64,
    #[serde(default)]
    pub enable: bool,
}

/// Body of `POST inbounds/addClient`.
#[derive(Debug, Serialize)]
pub struct AddClientRequest {
    pub id: u32,
    /// JSON-encoded `{"clients": [...]}`.
    pub settings: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    fn inbound_with_settings(settings: &str) -> Inbound {
        serde_json::from_value(json!({
            "id": 3,
            "port": 443,
            "settings": settings,
            "streamSettings": "",
            "clientStats": null
        }))
        .unwrap()
    }

    #[test]
    fn clients_decode_from_encoded_settings() {
        let inbound = inbound_with_settings(
            r#"{"clients":[{"id":"u-1","email":"alice","totalGB":1024,"expiryTime":0,"enable":true,"subId":"abc"}],"decryption":"none"}"#,
        );
        let clients = inbound.clients().unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].email, "alice");
        assert_eq!(clients[0].total_gb, 1024);
        assert!(inbound.client_stats.is_empty());
    }

    #[test]
    fn empty_settings_means_no_clients() {
        assert!(inbound_with_settings("").clients().unwrap().is_empty());
        assert!(inbound_with_settings(r#"{"clients":null}"#).clients().unwrap().is_empty());
    }

    #[test]
    fn malformed_settings_is_a_deserialization_error() {
        let err = inbound_with_settings("{not json").clients().unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn stream_settings_tolerates_garbage() {
        let mut inbound = inbound_with_settings("");
        assert!(inbound.stream_settings().is_none());
        inbound.stream_settings = "{oops".into();
        assert!(inbound.stream_settings().is_none());
        inbound.stream_settings = r#"{"network":"ws"}"#.into();
        assert_eq!(inbound.stream_settings().unwrap()["network"], "ws");
    }
}
