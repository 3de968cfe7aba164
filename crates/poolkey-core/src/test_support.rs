// Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use crate::config::BackendDescriptor;

/// An enabled `sg` backend with dummy credentials.
pub(crate) fn descriptor(id: &str, url: &str) -> BackendDescriptor {
    BackendDescriptor {
        id: id.into(),
        name: id.to_uppercase(),
        panel_url: url.parse().unwrap(),
        username: "admin".into(),
        password: SecretString::from("pw".to_string()),
        inbound_id: 1,
        region: "sg".into(),
        enabled: true,
        public_host: None,
    }
}

/// Like [`descriptor`], in the given region.
pub(crate) fn regional(id: &str, region: &str) -> BackendDescriptor {
    BackendDescriptor {
        region: region.into(),
        ..descriptor(id, &format!("https://{id}.example.net:2053/"))
    }
}
