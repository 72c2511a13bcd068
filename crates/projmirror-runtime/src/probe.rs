//! Capability and metrics probes.
//!
//! Probe failures never escape: capabilities fall back to
//! `Capabilities::none()` on an ordinary transport error and to
//! `Capabilities::all()` only when the probe task itself dies, so the UI
//! is not left blocked. Metrics failures yield `None` (keep the cached
//! value).

use std::sync::Arc;

use projmirror_core::Capabilities;

use crate::transport::ProjectTransport;

/// Which probe a generation counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Capabilities,
    Metrics,
}

/// Issued-generation counters, one per probe kind.
///
/// A completion is applied only if it carries the latest generation of
/// its kind; anything older lost the race to a newer probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeGenerations {
    capabilities: u64,
    metrics: u64,
}

impl ProbeGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation for `kind`.
    pub fn next(&mut self, kind: ProbeKind) -> u64 {
        let slot = self.slot(kind);
        *slot += 1;
        *slot
    }

    pub fn is_current(&self, kind: ProbeKind, generation: u64) -> bool {
        match kind {
            ProbeKind::Capabilities => self.capabilities == generation,
            ProbeKind::Metrics => self.metrics == generation,
        }
    }

    fn slot(&mut self, kind: ProbeKind) -> &mut u64 {
        match kind {
            ProbeKind::Capabilities => &mut self.capabilities,
            ProbeKind::Metrics => &mut self.metrics,
        }
    }
}

pub async fn probe_capabilities<T: ProjectTransport>(
    transport: Arc<T>,
    project_id: String,
) -> Capabilities {
    let id = project_id.clone();
    let task = tokio::spawn(async move { transport.get_capabilities(&id).await });
    match task.await {
        Ok(Ok(payload)) => {
            let (capabilities, rejected) = Capabilities::from_payload(&payload);
            for e in rejected {
                tracing::warn!(project_id = %project_id, "capability probe: {e}");
            }
            capabilities
        }
        Ok(Err(e)) => {
            tracing::warn!(project_id = %project_id, "capability probe failed: {e}");
            Capabilities::none()
        }
        Err(e) => {
            tracing::error!(project_id = %project_id, "capability probe aborted: {e}");
            Capabilities::all()
        }
    }
}

pub async fn probe_metrics<T: ProjectTransport>(
    transport: Arc<T>,
    project_id: String,
) -> Option<bool> {
    match transport.are_metrics_available(&project_id).await {
        Ok(available) => Some(available),
        Err(e) => {
            tracing::warn!(project_id = %project_id, "metrics probe failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use projmirror_core::CapabilitiesPayload;

    struct Failing;

    impl ProjectTransport for Failing {
        async fn get_capabilities(&self, _: &str) -> Result<CapabilitiesPayload, TransportError> {
            Err(TransportError::Unreachable("down".into()))
        }
        async fn are_metrics_available(&self, _: &str) -> Result<bool, TransportError> {
            Err(TransportError::Unreachable("down".into()))
        }
        async fn request_unbind(&self, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct Panicking;

    impl ProjectTransport for Panicking {
        async fn get_capabilities(&self, _: &str) -> Result<CapabilitiesPayload, TransportError> {
            panic!("probe bug")
        }
        async fn are_metrics_available(&self, _: &str) -> Result<bool, TransportError> {
            Ok(true)
        }
        async fn request_unbind(&self, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn generations_are_per_kind() {
        let mut generations = ProbeGenerations::new();
        let first = generations.next(ProbeKind::Capabilities);
        let second = generations.next(ProbeKind::Capabilities);
        assert!(!generations.is_current(ProbeKind::Capabilities, first));
        assert!(generations.is_current(ProbeKind::Capabilities, second));
        assert!(generations.is_current(ProbeKind::Metrics, 0));
    }

    #[tokio::test]
    async fn transport_error_falls_back_to_none() {
        let caps = probe_capabilities(Arc::new(Failing), "p1".into()).await;
        assert_eq!(caps, Capabilities::none());
        assert_eq!(probe_metrics(Arc::new(Failing), "p1".into()).await, None);
    }

    #[tokio::test]
    async fn aborted_probe_falls_back_to_all() {
        let caps = probe_capabilities(Arc::new(Panicking), "p1".into()).await;
        assert_eq!(caps, Capabilities::all());
    }
}
