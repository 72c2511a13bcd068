//! Offline replay: drive a session from recorded daemon events.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;

use projmirror_core::{
    CapabilitiesPayload, DaemonEvent, EngineConfig, ProjectDescriptor, ProjectModel,
};

use crate::hooks::NoopHooks;
use crate::notifier::ProjectChange;
use crate::session::ProjectSession;
use crate::transport::StaticTransport;

/// Final state printed by `projmirror replay`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub events_applied: usize,
    pub app_url: Option<String>,
    pub debug_address: Option<String>,
    pub debug_type: Option<String>,
    pub model: ProjectModel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<ProjectChange>,
}

pub fn load_descriptor(path: &Path) -> anyhow::Result<ProjectDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid project descriptor {}", path.display()))
}

pub fn load_capabilities(path: &Path) -> anyhow::Result<CapabilitiesPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid capabilities {}", path.display()))
}

/// Parse a JSONL event log. Blank lines and `#` comments are skipped.
pub fn parse_events(content: &str) -> anyhow::Result<Vec<DaemonEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: invalid event", idx + 1))
        })
        .collect()
}

/// Every start mode plus restart.
pub fn permissive_capabilities() -> CapabilitiesPayload {
    CapabilitiesPayload {
        start_modes: vec!["run".into(), "debug".into(), "debugNoInit".into()],
        control_commands: vec!["restart".into()],
    }
}

/// Spawn a session, apply `events` in order and report the final model.
pub async fn replay(
    descriptor: ProjectDescriptor,
    events: Vec<DaemonEvent>,
    transport: StaticTransport,
    config: EngineConfig,
    collect_changes: bool,
) -> anyhow::Result<ReplayReport> {
    let project_id = descriptor.id.clone();
    let handle = ProjectSession::spawn(
        descriptor,
        None,
        Arc::new(transport),
        Arc::new(NoopHooks),
        config.clone(),
    )
    .await;
    let mut rx = handle.subscribe();

    let mut events_applied = 0;
    for event in events {
        if event.project_id() != project_id {
            tracing::warn!(
                project_id = %project_id,
                event_project = %event.project_id(),
                "skipping event for another project"
            );
            continue;
        }
        handle.dispatch(event).await?;
        events_applied += 1;
    }

    let model = handle.model().await?;
    handle.shutdown();

    let mut changes = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(change) => {
                tracing::debug!(reason = ?change.reason, changed = ?change.changed, "change");
                if collect_changes {
                    changes.push(change);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "change log overflowed; raise notify_buffer");
            }
            Err(_) => break,
        }
    }

    Ok(ReplayReport {
        events_applied,
        app_url: model.app_url(),
        debug_address: model.debug_address(),
        debug_type: model.debug_type(&config).map(str::to_owned),
        model,
        changes,
    })
}
