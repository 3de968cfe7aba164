// Panel authentication
//
// Cookie-based session login. The login endpoint sets a session cookie in
// the client's jar; subsequent API requests use that cookie automatically.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;
use crate::panel::client::PanelClient;
use crate::panel::models::PanelResponse;

impl PanelClient {
    /// Authenticate with the panel using username/password.
    ///
    /// `POST {base}/login` with a form body. The panel answers HTTP 200
    /// either way; `success: false` means the credentials were refused.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.panel_url("login")?;

        debug!("logging in at {}", url);

        let resp = self
            .http()
            .post(url)
            .form(&[("username", username), ("password", password.expose_secret())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {}", body.trim()),
            });
        }

        let body = resp.text().await?;
        let envelope: PanelResponse<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| Error::Authentication {
                message: format!("unexpected login response: {e}"),
            })?;

        if !envelope.success {
            return Err(Error::Authentication {
                message: envelope
                    .msg
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "credentials rejected".into()),
            });
        }

        debug!("login successful");
        Ok(())
    }
}
