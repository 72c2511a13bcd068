//! Change fan-out to any number of subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

use projmirror_core::{ProjectField, ProjectModel, RestartOutcome};

/// What triggered a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChangeReason {
    Initialized,
    Snapshot,
    Settings { error: Option<String> },
    RestartResolved(RestartOutcome),
    Capabilities,
    Metrics,
    Disconnected,
    Reconnected,
    Deleted,
}

/// Notification sent after the model was touched.
///
/// Subscribers must tolerate `changed` being empty: every reconcile
/// notifies, whether or not a field moved.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectChange {
    pub project_id: String,
    pub reason: ChangeReason,
    pub changed: Vec<ProjectField>,
    pub model: ProjectModel,
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ProjectChange>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn notify(
        &self,
        model: &ProjectModel,
        reason: ChangeReason,
        changed: impl IntoIterator<Item = ProjectField>,
    ) {
        let change = ProjectChange {
            project_id: model.id().to_owned(),
            reason,
            changed: changed.into_iter().collect(),
            model: model.clone(),
        };
        // No subscribers is fine.
        let _ = self.tx.send(change);
    }
}
