#![allow(dead_code, clippy::unwrap_used)]
// Stateful fake 3x-ui panel for integration tests.
//
// Login always succeeds; one inbound (id 1) holds whatever clients the test
// seeds plus anything added through `addClient`, which refuses duplicate
// labels the way the real panel does.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use poolkey_core::{BackendDescriptor, PoolSettings, RegistrySnapshot};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const INBOUND_PORT: u16 = 443;

pub fn reality_stream() -> Value {
    json!({
        "network": "tcp",
        "security": "reality",
        "realitySettings": {
            "serverNames": ["www.example.com"],
            "shortIds": ["0a1b"],
            "settings": { "publicKey": "PUBKEY" }
        }
    })
}

pub fn ws_stream() -> Value {
    json!({ "network": "ws", "security": "none", "wsSettings": { "path": "/ws" } })
}

#[derive(Default)]
struct PanelState {
    clients: Vec<Value>,
    stats: Vec<Value>,
    stream: Value,
}

impl PanelState {
    fn inbound(&self) -> Value {
        json!({
            "id": 1,
            "remark": "main",
            "enable": true,
            "port": INBOUND_PORT,
            "protocol": "vless",
            "settings": json!({ "clients": self.clients, "decryption": "none" }).to_string(),
            "streamSettings": self.stream.to_string(),
            "clientStats": self.stats,
        })
    }
}

fn ok(obj: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "msg": "", "obj": obj }))
}

struct GetInbound {
    state: Arc<Mutex<PanelState>>,
    delay: Option<Duration>,
}

impl Respond for GetInbound {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let response = ok(self.state.lock().unwrap().inbound());
        match self.delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        }
    }
}

struct ListInbounds(Arc<Mutex<PanelState>>);

impl Respond for ListInbounds {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        ok(json!([self.0.lock().unwrap().inbound()]))
    }
}

struct AddClient(Arc<Mutex<PanelState>>);

impl Respond for AddClient {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let settings: Value = serde_json::from_str(body["settings"].as_str().unwrap()).unwrap();
        let mut state = self.0.lock().unwrap();
        for client in settings["clients"].as_array().unwrap() {
            let email = client["email"].as_str().unwrap();
            if state.clients.iter().any(|c| c["email"] == email) {
                return ResponseTemplate::new(200).set_body_json(json!({
                    "success": false,
                    "msg": format!("Something went wrong! Failed: Duplicate email: {email}"),
                    "obj": null
                }));
            }
            state.clients.push(client.clone());
        }
        ResponseTemplate::new(200)
            .set_body_json(json!({ "success": true, "msg": "Client(s) added", "obj": null }))
    }
}

pub struct FakePanel {
    pub server: MockServer,
    state: Arc<Mutex<PanelState>>,
}

impl FakePanel {
    pub async fn start(stream: Value) -> Self {
        Self::start_with_delay(stream, None).await
    }

    /// Like [`start`](Self::start), but inbound reads answer after `delay`.
    pub async fn start_with_delay(stream: Value, delay: Option<Duration>) -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(PanelState {
            stream,
            ..PanelState::default()
        }));

        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "3x-ui=session; Path=/")
                    .set_body_json(json!({ "success": true, "msg": "Login successfully", "obj": null })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/panel/api/inbounds/get/1"))
            .respond_with(GetInbound {
                state: Arc::clone(&state),
                delay,
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/panel/api/inbounds/list"))
            .respond_with(ListInbounds(Arc::clone(&state)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/panel/api/inbounds/addClient"))
            .respond_with(AddClient(Arc::clone(&state)))
            .mount(&server)
            .await;

        Self { server, state }
    }

    /// Add `n` filler clients.
    pub fn seed_load(&self, n: usize) {
        let mut state = self.state.lock().unwrap();
        for i in 0..n {
            state.clients.push(json!({
                "id": format!("00000000-0000-4000-8000-{i:012}"),
                "email": format!("filler-{i}"),
                "totalGB": 0,
                "expiryTime": 0,
                "enable": true,
                "subId": "fillerfillerfill"
            }));
        }
    }

    /// Add one client with live traffic counters.
    pub fn seed_client(&self, id: &str, label: &str, quota: u64, up: u64, down: u64) {
        let mut state = self.state.lock().unwrap();
        state.clients.push(json!({
            "id": id,
            "email": label,
            "totalGB": quota,
            "expiryTime": 0,
            "enable": true,
            "subId": "abcdefghijklmnop",
            "up": 1,
            "down": 1
        }));
        state.stats.push(json!({
            "email": label, "up": up, "down": down, "total": quota, "expiryTime": 0, "enable": true
        }));
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }

    pub fn client(&self, label: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .clients
            .iter()
            .find(|c| c["email"] == label)
            .cloned()
    }

    /// Answer the next inbound read with 404, the way a restarted panel
    /// treats a cookie from before the restart.
    pub async fn expire_session_once(&self) {
        Mock::given(method("GET"))
            .and(path("/panel/api/inbounds/get/1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("404 page not found"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    pub fn url(&self) -> Url {
        Url::parse(&self.server.uri()).unwrap()
    }

    pub async fn requests_to(&self, route: &str) -> usize {
        count_requests(&self.server, route).await
    }
}

pub async fn count_requests(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

pub fn backend(id: &str, url: &Url, region: &str) -> BackendDescriptor {
    BackendDescriptor {
        id: id.into(),
        name: id.to_uppercase(),
        panel_url: url.clone(),
        username: "admin".into(),
        password: SecretString::from("pw".to_string()),
        inbound_id: 1,
        region: region.into(),
        enabled: true,
        public_host: None,
    }
}

pub fn snapshot(backends: Vec<BackendDescriptor>) -> RegistrySnapshot {
    RegistrySnapshot::new(backends, None).unwrap()
}

pub fn settings() -> PoolSettings {
    PoolSettings {
        request_timeout: Duration::from_secs(5),
        probe_timeout: Duration::from_secs(2),
        ..PoolSettings::default()
    }
}
