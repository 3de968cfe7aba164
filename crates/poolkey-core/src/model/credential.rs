// ── Client credentials ──
//
// A credential exists only on its backend; these types describe one
// being minted or recovered, and the result handed back to the caller.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use poolkey_api::InboundClient;
use rand::Rng;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::config::BackendId;
use crate::error::CoreError;

const SUB_ID_LEN: usize = 16;
const SUB_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// When a credential stops working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
    /// Countdown that starts when the client first connects.
    AfterFirstUse(Duration),
}

impl Expiry {
    /// Decode the panel's `expiryTime`: `0` never, positive epoch
    /// milliseconds, negative a duration starting at first use.
    pub fn from_panel_millis(millis: i64) -> Self {
        match millis {
            0 => Self::Never,
            m if m < 0 => Self::AfterFirstUse(Duration::from_millis(m.unsigned_abs())),
            m => DateTime::from_timestamp_millis(m).map_or(Self::Never, Self::At),
        }
    }

    /// Encode as the panel's `expiryTime`.
    pub fn to_panel_millis(self) -> i64 {
        match self {
            Self::Never => 0,
            Self::At(at) => at.timestamp_millis(),
            Self::AfterFirstUse(d) => -i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Whether a fixed expiry lies in the past.
    pub fn is_past(self, now: DateTime<Utc>) -> bool {
        matches!(self, Self::At(at) if at <= now)
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::At(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M UTC")),
            Self::AfterFirstUse(d) => write!(f, "{} after first use", compact_duration(*d)),
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Never => serializer.serialize_none(),
            Self::At(at) => at.serialize(serializer),
            Self::AfterFirstUse(_) => serializer.collect_str(self),
        }
    }
}

fn compact_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs != 0 && secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs != 0 && secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else {
        format!("{secs}s")
    }
}

/// What the caller wants issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Unique per backend; the panel stores it as the client "email".
    pub label: String,
    /// Traffic quota in bytes; `0` is unlimited.
    pub quota_bytes: u64,
    /// Lifetime from now; `None` is unlimited.
    pub ttl: Option<Duration>,
}

impl ProvisionRequest {
    pub fn new(label: impl Into<String>, quota_bytes: u64, ttl: Option<Duration>) -> Self {
        Self {
            label: label.into(),
            quota_bytes,
            ttl,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let label = self.label.as_str();
        if label.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "label must not be empty".into(),
            });
        }
        if label.trim() != label {
            return Err(CoreError::ValidationFailed {
                message: format!("label '{label}' has leading or trailing whitespace"),
            });
        }
        if label.chars().any(char::is_control) {
            return Err(CoreError::ValidationFailed {
                message: "label must not contain control characters".into(),
            });
        }
        Ok(())
    }

    fn expiry(&self, now: DateTime<Utc>) -> Result<Expiry, CoreError> {
        let Some(ttl) = self.ttl.filter(|t| !t.is_zero()) else {
            return Ok(Expiry::Never);
        };
        let delta = TimeDelta::from_std(ttl).map_err(|e| CoreError::ValidationFailed {
            message: format!("ttl out of range: {e}"),
        })?;
        now.checked_add_signed(delta)
            .map(Expiry::At)
            .ok_or_else(|| CoreError::ValidationFailed {
                message: "ttl out of range".into(),
            })
    }
}

/// A client credential as it lives on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientCredential {
    pub id: Uuid,
    pub label: String,
    pub quota_bytes: u64,
    pub expiry: Expiry,
    pub enabled: bool,
    pub sub_id: String,
}

impl ClientCredential {
    /// Mint a fresh credential for `request` with a random UUID and sub id.
    pub fn mint(request: &ProvisionRequest, now: DateTime<Utc>) -> Result<Self, CoreError> {
        request.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            label: request.label.clone(),
            quota_bytes: request.quota_bytes,
            expiry: request.expiry(now)?,
            enabled: true,
            sub_id: generate_sub_id(),
        })
    }

    /// Recover a credential from a panel client entry.
    pub fn from_panel(client: &InboundClient) -> Result<Self, CoreError> {
        let id = Uuid::parse_str(client.id.trim()).map_err(|e| CoreError::Internal(format!(
            "client '{}' has a malformed id '{}': {e}",
            client.email, client.id
        )))?;
        Ok(Self {
            id,
            label: client.email.clone(),
            quota_bytes: client.total_gb,
            expiry: Expiry::from_panel_millis(client.expiry_time),
            enabled: client.enable,
            sub_id: client.sub_id.clone(),
        })
    }

    /// The entry posted to `addClient`.
    pub fn to_panel(&self, flow: Option<&str>, limit_ip: u32) -> InboundClient {
        InboundClient {
            id: self.id.to_string(),
            email: self.label.clone(),
            flow: flow.unwrap_or_default().to_owned(),
            total_gb: self.quota_bytes,
            expiry_time: self.expiry.to_panel_millis(),
            enable: self.enabled,
            tg_id: serde_json::Value::String(String::new()),
            sub_id: self.sub_id.clone(),
            limit_ip,
            up: None,
            down: None,
        }
    }
}

/// 16 random characters from `[a-z0-9]`.
pub fn generate_sub_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SUB_ID_LEN)
        .map(|_| char::from(SUB_ID_CHARSET[rng.gen_range(0..SUB_ID_CHARSET.len())]))
        .collect()
}

/// Outcome of a provisioning call.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionResult {
    /// Ready-to-import connection link.
    pub uri: String,
    /// `true` when the label was already taken and the existing credential
    /// was returned instead of a new one.
    pub existed: bool,
    pub backend: BackendId,
    pub credential: ClientCredential,
}
