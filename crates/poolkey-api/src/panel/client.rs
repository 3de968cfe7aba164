// Panel API HTTP client
//
// Wraps `reqwest::Client` with panel-specific URL construction and envelope
// unwrapping. Endpoint groups (auth, inbounds) are implemented as inherent
// methods in separate files to keep this module focused on transport mechanics.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::panel::models::PanelResponse;
use crate::transport::TransportConfig;

/// API path prefix used by current 3x-ui releases.
pub const DEFAULT_API_PREFIX: &str = "panel/api";

/// Raw HTTP client for one panel's management API.
///
/// Handles the `{ success, msg, obj }` envelope and URL construction under
/// the panel's (optional) web base path. Each instance owns its own cookie
/// jar, so a session never leaks between panels.
pub struct PanelClient {
    http: reqwest::Client,
    base_url: Url,
    api_prefix: String,
    cookie_jar: Arc<Jar>,
}

impl PanelClient {
    /// Create a client with a fresh cookie jar. `base_url` is the panel root
    /// including any web base path, e.g. `https://1.2.3.4:2053/secret/`.
    pub fn new(base_url: Url, api_prefix: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let cookie_jar = Arc::new(Jar::default());
        let http = transport.build_client(Arc::clone(&cookie_jar))?;
        Ok(Self {
            http,
            base_url,
            api_prefix: api_prefix.trim_matches('/').to_owned(),
            cookie_jar,
        })
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The panel base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether the cookie jar currently holds anything for this panel.
    pub fn has_session_cookie(&self) -> bool {
        self.cookie_jar.cookies(&self.base_url).is_some()
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a URL relative to the panel root: `{base}/{path}`.
    pub(crate) fn panel_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Build an API URL: `{base}/{prefix}/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        if self.api_prefix.is_empty() {
            self.panel_url(path)
        } else {
            self.panel_url(&format!("{}/{path}", self.api_prefix))
        }
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and return the envelope's `obj`.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;

        let envelope: PanelResponse<T> = self.parse_envelope(resp).await?;
        envelope.obj.ok_or_else(|| Error::PanelApi {
            message: "response carried no payload".into(),
        })
    }

    /// Send a POST request with JSON body and return the raw envelope.
    ///
    /// `success: false` is NOT turned into an error here; mutating
    /// endpoints need to inspect `msg` first.
    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<PanelResponse<T>, Error> {
        debug!("POST {}", url);

        let resp = self.http.post(url).json(body).send().await?;

        self.decode(resp).await
    }

    /// Check the HTTP status and decode the envelope, rejecting
    /// `success: false` as [`Error::Refused`]: a read the panel turns down
    /// is how some releases answer a stale session.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<PanelResponse<T>, Error> {
        let envelope: PanelResponse<T> = self.decode(resp).await?;
        if envelope.success {
            Ok(envelope)
        } else {
            Err(Error::Refused {
                message: envelope
                    .msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "success=false".into()),
            })
        }
    }

    /// Map session-level HTTP failures and decode the body as an envelope.
    async fn decode<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<PanelResponse<T>, Error> {
        let status = resp.status();

        // The panel redirects to its login page (or answers 401/403) once the
        // session cookie is gone or stale.
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || status.is_redirection()
        {
            return Err(Error::SessionExpired);
        }

        // Current 3x-ui hides its API routes behind 404 without a session.
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Refused {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::PanelApi {
                message: format!("HTTP {status}: {}", preview(&body)),
            });
        }

        let body = resp.text().await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
