//! Collaborators notified of lifecycle transitions.

use projmirror_core::ProjectModel;

/// Side effects outside the model: log streams, debug sessions, UI
/// resources. Every method defaults to a no-op.
pub trait ProjectHooks: Send + Sync + 'static {
    /// Project became enabled; reinitialize dependent collaborators.
    fn on_enable(&self, _model: &ProjectModel) {}

    /// Project became disabled; tear down dependent collaborators.
    fn on_disable(&self, _model: &ProjectModel) {}

    /// Connection to the daemon came back.
    fn on_reconnect(&self, _model: &ProjectModel) {}

    /// Connection lost or project disabled; stop log streams.
    fn on_disconnect_or_disable(&self, _model: &ProjectModel) {}

    /// Project is being deleted; drop any launch/debug configuration.
    fn release_debug_config(&self, _model: &ProjectModel) {}

    /// Final teardown after a confirmed deletion.
    fn teardown(&self, _model: &ProjectModel) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ProjectHooks for NoopHooks {}
