// ── Server registry ──
//
// Immutable snapshots of the backend list behind an atomic pointer.
// Readers grab the current snapshot and work from it for the rest of the
// request; `reload` swaps in a new one without disturbing them.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::config::BackendDescriptor;
use crate::error::CoreError;

/// One consistent view of the pool.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    backends: Vec<BackendDescriptor>,
    default_index: Option<usize>,
}

impl RegistrySnapshot {
    /// Build a snapshot, rejecting duplicate ids and a default index that
    /// points past the end of the list.
    pub fn new(
        backends: Vec<BackendDescriptor>,
        default_index: Option<usize>,
    ) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(CoreError::Config {
                    message: format!("duplicate backend id '{}'", backend.id),
                });
            }
        }
        if let Some(index) = default_index.filter(|i| *i >= backends.len()) {
            return Err(CoreError::Config {
                message: format!(
                    "default server index {index} is out of range ({} servers)",
                    backends.len()
                ),
            });
        }
        Ok(Self {
            backends,
            default_index,
        })
    }

    /// All backends in insertion order.
    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id.as_str() == id)
    }

    /// Backends matching `region` (any region when `None`), in insertion
    /// order. Disabled backends are dropped when `require_enabled`.
    pub fn eligible(&self, region: Option<&str>, require_enabled: bool) -> Vec<BackendDescriptor> {
        self.backends
            .iter()
            .filter(|b| !require_enabled || b.enabled)
            .filter(|b| region.is_none_or(|r| b.in_region(r)))
            .cloned()
            .collect()
    }

    /// The configured default when it is enabled, else the first enabled
    /// backend.
    pub fn default_backend(&self) -> Result<&BackendDescriptor, CoreError> {
        self.default_index
            .and_then(|i| self.backends.get(i))
            .filter(|b| b.enabled)
            .or_else(|| self.backends.iter().find(|b| b.enabled))
            .ok_or(CoreError::NoBackendsAvailable { region: None })
    }

    /// Whether `id` is the backend `default_backend` would return.
    pub fn is_default(&self, id: &str) -> bool {
        self.default_backend()
            .is_ok_and(|b| b.id.as_str() == id)
    }

    /// Distinct region tags, in first-seen order, skipping untagged backends.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        for backend in self.backends.iter().filter(|b| b.enabled) {
            let region = backend.region.trim();
            if !region.is_empty() && !regions.iter().any(|r| r.eq_ignore_ascii_case(region)) {
                regions.push(region.to_owned());
            }
        }
        regions
    }
}

/// Shared, hot-swappable handle on the current snapshot.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    current: ArcSwap<RegistrySnapshot>,
}

impl ServerRegistry {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
        }
    }

    /// The snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// Atomically replace the snapshot.
    pub fn reload(&self, snapshot: RegistrySnapshot) {
        info!(backends = snapshot.backends.len(), "registry reloaded");
        self.current.store(Arc::new(snapshot));
    }
}
