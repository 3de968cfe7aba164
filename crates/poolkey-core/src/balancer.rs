// ── Load balancer ──
//
// Probes every candidate concurrently and picks the least-loaded one.
// A candidate that already holds the requested label wins outright, so a
// repeated request lands where the first one did. Failed probes drop out of
// the comparison; ties go to the earlier candidate so the registry order
// acts as a preference.

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::config::{BackendDescriptor, ProbeFailurePolicy};
use crate::error::CoreError;
use crate::probe::{InboundLoad, LoadProbe};

pub struct LoadBalancer<P> {
    probe: P,
    policy: ProbeFailurePolicy,
}

impl<P: LoadProbe> LoadBalancer<P> {
    pub fn new(probe: P, policy: ProbeFailurePolicy) -> Self {
        Self { probe, policy }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Pick the candidate already holding `label`, else the one with the
    /// fewest clients.
    ///
    /// When every probe fails the outcome follows the configured policy:
    /// the first candidate, or `NoBackendsAvailable`.
    pub async fn select(
        &self,
        candidates: &[BackendDescriptor],
        label: &str,
    ) -> Result<BackendDescriptor, CoreError> {
        let first = candidates.first().ok_or(CoreError::NoCandidates)?;

        let loads: Vec<Option<InboundLoad>> = join_all(candidates.iter().map(|backend| async move {
            match self.probe.load(backend).await {
                Ok(load) => Some(load),
                Err(e) => {
                    warn!(backend = %backend.id, error = %e, "skipping backend, probe failed");
                    None
                }
            }
        }))
        .await;

        if let Some(holder) = candidates
            .iter()
            .zip(&loads)
            .find_map(|(backend, load)| load.as_ref().filter(|l| l.holds(label)).map(|_| backend))
        {
            debug!(backend = %holder.id, label, "label already issued here");
            return Ok(holder.clone());
        }

        let counts: Vec<Option<usize>> = loads.iter().map(|l| l.as_ref().map(|l| l.clients)).collect();
        if let Some(chosen) = least_loaded(&counts).and_then(|i| candidates.get(i)) {
            debug!(backend = %chosen.id, loads = ?counts, "selected least-loaded backend");
            return Ok(chosen.clone());
        }

        match self.policy {
            ProbeFailurePolicy::FirstCandidate => {
                warn!(backend = %first.id, "all probes failed, using first candidate");
                Ok(first.clone())
            }
            ProbeFailurePolicy::FailClosed => Err(CoreError::NoBackendsAvailable {
                region: Some(first.region.clone()).filter(|r| !r.is_empty()),
            }),
        }
    }
}

/// Index of the smallest successful load; the first one wins a tie.
pub fn least_loaded(loads: &[Option<usize>]) -> Option<usize> {
    loads
        .iter()
        .enumerate()
        .filter_map(|(i, load)| load.map(|n| (i, n)))
        .min_by_key(|&(_, n)| n)
        .map(|(i, _)| i)
}
