//! Outbound calls the session makes into the daemon.
//!
//! The wire protocol lives outside this crate; implementors adapt it to
//! this trait. `StaticTransport` serves fixed answers for replay and tests.

use std::future::Future;

use projmirror_core::CapabilitiesPayload;

use crate::error::TransportError;

/// Remote queries and commands keyed by project id.
pub trait ProjectTransport: Send + Sync + 'static {
    fn get_capabilities(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<CapabilitiesPayload, TransportError>> + Send;

    fn are_metrics_available(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;

    /// Ask the daemon to unbind the project. Completion is confirmed later
    /// by a deletion-result event.
    fn request_unbind(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Transport answering every call from fixed data.
#[derive(Debug, Clone, Default)]
pub struct StaticTransport {
    capabilities: CapabilitiesPayload,
    metrics_available: bool,
}

impl StaticTransport {
    pub fn new(capabilities: CapabilitiesPayload, metrics_available: bool) -> Self {
        Self {
            capabilities,
            metrics_available,
        }
    }
}

impl ProjectTransport for StaticTransport {
    async fn get_capabilities(&self, _project_id: &str) -> Result<CapabilitiesPayload, TransportError> {
        Ok(self.capabilities.clone())
    }

    async fn are_metrics_available(&self, _project_id: &str) -> Result<bool, TransportError> {
        Ok(self.metrics_available)
    }

    async fn request_unbind(&self, _project_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_transport_echoes_fixture() {
        let payload = CapabilitiesPayload {
            start_modes: vec!["run".into()],
            control_commands: vec![],
        };
        let transport = StaticTransport::new(payload.clone(), true);
        assert_eq!(transport.get_capabilities("p1").await.unwrap(), payload);
        assert!(transport.are_metrics_available("p1").await.unwrap());
        assert!(transport.request_unbind("p1").await.is_ok());
    }
}
