// ── Connection URIs ──
//
// Renders the `vless://` link a client imports. The three shapes match
// the transport resolved from the inbound; every value taken from panel
// settings, and the label, is percent-encoded.

use uuid::Uuid;

use crate::model::Transport;
use crate::model::transport::REALITY_FLOW;

/// Browser fingerprint advertised in reality links.
const REALITY_FINGERPRINT: &str = "chrome";

/// Where a client connects: host and port of the inbound.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
}

/// Build the connection URI for `client_id` on `endpoint`.
pub fn connection_uri(
    client_id: &Uuid,
    endpoint: Endpoint<'_>,
    transport: &Transport,
    label: &str,
) -> String {
    let authority = authority(endpoint);
    let fragment = urlencoding::encode(label);
    match transport {
        Transport::Reality {
            public_key,
            server_name,
            short_id,
        } => format!(
            "vless://{client_id}@{authority}?type=tcp&security=reality&pbk={}\
             &fp={REALITY_FINGERPRINT}&sni={}&sid={}&spx=%2F\
             &flow={REALITY_FLOW}#{fragment}",
            urlencoding::encode(public_key),
            urlencoding::encode(server_name),
            urlencoding::encode(short_id),
        ),
        Transport::WebSocket { path, host } => {
            let host_param = host
                .as_deref()
                .map(|h| format!("&host={}", urlencoding::encode(h)))
                .unwrap_or_default();
            format!(
                "vless://{client_id}@{authority}?type=ws&security=none&path={}{host_param}#{fragment}",
                urlencoding::encode(path)
            )
        }
        Transport::Plain => {
            format!("vless://{client_id}@{authority}?type=tcp&security=none#{fragment}")
        }
    }
}

fn authority(endpoint: Endpoint<'_>) -> String {
    let Endpoint { host, port } = endpoint;
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn id() -> Uuid {
        Uuid::parse_str("6c1f9a4e-0000-4000-8000-000000000001").unwrap()
    }

    const EP: Endpoint<'static> = Endpoint {
        host: "203.0.113.7",
        port: 443,
    };

    #[test]
    fn reality_link() {
        let transport = Transport::Reality {
            public_key: "PUBKEY".into(),
            server_name: "www.example.com".into(),
            short_id: "0a1b".into(),
        };
        assert_eq!(
            connection_uri(&id(), EP, &transport, "bob"),
            "vless://6c1f9a4e-0000-4000-8000-000000000001@203.0.113.7:443?type=tcp\
             &security=reality&pbk=PUBKEY&fp=chrome&sni=www.example.com&sid=0a1b&spx=%2F\
             &flow=xtls-rprx-vision#bob"
        );
    }

    #[test]
    fn reality_parameters_are_encoded() {
        let transport = Transport::Reality {
            public_key: "abc+/=".into(),
            server_name: "odd&name=1".into(),
            short_id: "0a 1b".into(),
        };
        let uri = connection_uri(&id(), EP, &transport, "bob");
        assert!(
            uri.contains("&pbk=abc%2B%2F%3D&fp=chrome&sni=odd%26name%3D1&sid=0a%201b&spx=%2F"),
            "{uri}"
        );
    }

    #[test]
    fn websocket_link_encodes_path_and_host() {
        let transport = Transport::WebSocket {
            path: "/ws path".into(),
            host: Some("cdn.example.com".into()),
        };
        assert_eq!(
            connection_uri(&id(), EP, &transport, "bob"),
            "vless://6c1f9a4e-0000-4000-8000-000000000001@203.0.113.7:443?type=ws\
             &security=none&path=%2Fws%20path&host=cdn.example.com#bob"
        );
    }

    #[test]
    fn websocket_link_without_host() {
        let transport = Transport::WebSocket {
            path: "/".into(),
            host: None,
        };
        let uri = connection_uri(&id(), EP, &transport, "bob");
        assert!(uri.ends_with("?type=ws&security=none&path=%2F#bob"), "{uri}");
    }

    #[test]
    fn plain_link_encodes_label() {
        assert_eq!(
            connection_uri(&id(), EP, &Transport::Plain, "user 42#x"),
            "vless://6c1f9a4e-0000-4000-8000-000000000001@203.0.113.7:443?type=tcp\
             &security=none#user%2042%23x"
        );
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let ep = Endpoint {
            host: "2001:db8::1",
            port: 8443,
        };
        let uri = connection_uri(&id(), ep, &Transport::Plain, "a");
        assert!(uri.contains("@[2001:db8::1]:8443?"), "{uri}");
    }
}
