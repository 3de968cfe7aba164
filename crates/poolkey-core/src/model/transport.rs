// ── Inbound transport ──
//
// The stream/security shape of an inbound, resolved once from its
// `streamSettings` document. Resolution never fails: anything incomplete
// degrades to the next simpler transport.

use serde::Serialize;
use serde_json::Value;

/// Flow control required by reality inbounds.
pub const REALITY_FLOW: &str = "xtls-rprx-vision";

/// How clients connect to an inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Transport {
    /// TCP with reality security; all three parameters are non-empty.
    Reality {
        public_key: String,
        server_name: String,
        short_id: String,
    },
    /// WebSocket without transport security.
    WebSocket { path: String, host: Option<String> },
    /// Bare TCP.
    Plain,
}

impl Transport {
    /// Resolve from a decoded `streamSettings` value.
    ///
    /// Priority: a complete reality triple, then a `ws` network, then plain.
    pub fn from_stream_settings(stream: Option<&Value>) -> Self {
        let Some(stream) = stream else {
            return Self::Plain;
        };
        reality(stream)
            .or_else(|| websocket(stream))
            .unwrap_or(Self::Plain)
    }

    /// The `flow` value a new client on this transport needs.
    pub fn client_flow(&self) -> Option<&'static str> {
        match self {
            Self::Reality { .. } => Some(REALITY_FLOW),
            Self::WebSocket { .. } | Self::Plain => None,
        }
    }

    /// Short name for listings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reality { .. } => "reality",
            Self::WebSocket { .. } => "ws",
            Self::Plain => "tcp",
        }
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn first_non_empty(value: Option<&Value>) -> Option<String> {
    value?
        .as_array()?
        .iter()
        .find_map(|v| non_empty(Some(v)))
}

fn reality(stream: &Value) -> Option<Transport> {
    // Panels keep `realitySettings` around only while security is reality,
    // but older builds omit the `security` key entirely.
    if stream
        .get("security")
        .and_then(Value::as_str)
        .is_some_and(|security| security != "reality")
    {
        return None;
    }
    let settings = stream.get("realitySettings")?;
    Some(Transport::Reality {
        public_key: non_empty(settings.pointer("/settings/publicKey"))?,
        server_name: first_non_empty(settings.get("serverNames"))?,
        short_id: first_non_empty(settings.get("shortIds"))?,
    })
}

fn websocket(stream: &Value) -> Option<Transport> {
    if stream.get("network").and_then(Value::as_str) != Some("ws") {
        return None;
    }
    let ws = stream.get("wsSettings");
    let path = non_empty(ws.and_then(|w| w.get("path"))).unwrap_or_else(|| "/".into());
    let host = ws.and_then(|w| {
        non_empty(w.get("host"))
            .or_else(|| non_empty(w.pointer("/headers/Host")))
            .or_else(|| non_empty(w.pointer("/headers/host")))
    });
    Some(Transport::WebSocket { path, host })
}
