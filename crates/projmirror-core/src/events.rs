//! Inbound daemon payloads.
//!
//! Field names follow the daemon's camelCase wire format. Everything except
//! the project id is optional: a snapshot is a partial merge.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ports::PortUpdate;
use crate::types::RunStateUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    #[serde(alias = "failed")]
    Fail,
}

impl EventStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

// ─── Snapshot ─────────────────────────────────────────────────────

/// Partial or full description of a project's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(rename = "projectID", alias = "id")]
    pub id: String,
    /// Optional monotonic sequence number.
    pub version: Option<u64>,
    pub container_id: Option<String>,
    #[serde(default, rename = "lastbuild", alias = "lastBuild", deserialize_with = "epoch_ms")]
    pub last_build: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "appImageLastBuild",
        alias = "lastImageBuild",
        deserialize_with = "epoch_ms"
    )]
    pub last_image_build: Option<DateTime<Utc>>,
    pub auto_build: Option<bool>,
    pub inject_metrics: Option<bool>,
    pub is_https: Option<bool>,
    pub context_root: Option<String>,
    #[serde(rename = "appBaseURL", alias = "appBaseUrl")]
    pub app_base_url: Option<String>,
    pub capabilities_ready: Option<bool>,
    /// `"open"` or `"closed"`.
    pub state: Option<String>,
    #[serde(alias = "runState")]
    pub app_status: Option<String>,
    pub build_status: Option<String>,
    pub detailed_app_status: Option<String>,
    pub detailed_build_status: Option<String>,
    pub start_mode: Option<String>,
    pub ports: Option<PortUpdate>,
}

impl ProjectSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Extract the run-state fields.
    pub fn run_state_update(&self) -> RunStateUpdate {
        let enabled = self.state.as_deref().and_then(|s| match s {
            "open" => Some(true),
            "closed" => Some(false),
            other => {
                tracing::warn!(project_id = %self.id, state = %other, "unrecognized project state");
                None
            }
        });
        RunStateUpdate {
            enabled,
            app_status: self.app_status.clone(),
            build_status: self.build_status.clone(),
            detailed_app_status: self.detailed_app_status.clone(),
            detailed_build_status: self.detailed_build_status.clone(),
            start_mode: self.start_mode.clone(),
        }
    }
}

/// Accepts epoch milliseconds as a number or numeric string.
fn epoch_ms<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let millis = match &value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let parsed = millis.and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    if parsed.is_none() && value.as_ref().is_some_and(|v| !v.is_null()) {
        tracing::warn!(value = ?value, "ignoring malformed build timestamp");
    }
    Ok(parsed)
}

// ─── Settings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPorts {
    pub internal_port: Option<String>,
    pub internal_debug_port: Option<String>,
}

impl From<&SettingsPorts> for PortUpdate {
    fn from(p: &SettingsPorts) -> Self {
        PortUpdate {
            internal_port: p.internal_port.clone(),
            internal_debug_port: p.internal_debug_port.clone(),
            ..Default::default()
        }
    }
}

/// Result of a settings change the user requested.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsEvent {
    #[serde(rename = "projectID", alias = "id")]
    pub id: String,
    pub status: EventStatus,
    pub error: Option<String>,
    pub context_root: Option<String>,
    pub ports: Option<SettingsPorts>,
}

// ─── Restart Result ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartResultEvent {
    #[serde(rename = "projectID", alias = "id")]
    pub id: String,
    pub status: EventStatus,
    pub error_msg: Option<String>,
    pub ports: Option<PortUpdate>,
    pub start_mode: Option<String>,
    pub container_id: Option<String>,
}

// ─── Deletion Result ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResultEvent {
    #[serde(rename = "projectID", alias = "id")]
    pub id: String,
    pub status: EventStatus,
}

// ─── Envelope ─────────────────────────────────────────────────────

/// Any inbound event, tagged by its daemon event name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DaemonEvent {
    #[serde(alias = "projectChanged")]
    ProjectStatusChanged(ProjectSnapshot),
    ProjectSettingsChanged(SettingsEvent),
    ProjectRestartResult(RestartResultEvent),
    ProjectDeletion(DeletionResultEvent),
}

impl DaemonEvent {
    pub fn project_id(&self) -> &str {
        match self {
            Self::ProjectStatusChanged(e) => &e.id,
            Self::ProjectSettingsChanged(e) => &e.id,
            Self::ProjectRestartResult(e) => &e.id,
            Self::ProjectDeletion(e) => &e.id,
        }
    }
}
