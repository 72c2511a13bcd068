//! Async runtime for projmirror.
//!
//! One [`session::ProjectSession`] task per project owns the
//! [`projmirror_core::ProjectModel`] and serializes every inbound daemon
//! event, restart and deletion request, and probe completion. Callers talk
//! to it through a cloneable [`session::ProjectHandle`] and observe it
//! through [`notifier::ChangeNotifier`] subscriptions.

pub mod cli;
pub mod error;
pub mod hooks;
pub mod notifier;
pub mod probe;
pub mod replay;
pub mod session;
pub mod transport;

pub use error::{RestartRefused, SessionError, TransportError};
pub use hooks::{NoopHooks, ProjectHooks};
pub use notifier::{ChangeNotifier, ChangeReason, ProjectChange};
pub use session::{DeletionOutcome, PendingDeletion, PendingRestart, ProjectHandle, ProjectSession};
pub use transport::{ProjectTransport, StaticTransport};
