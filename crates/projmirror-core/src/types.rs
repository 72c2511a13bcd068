use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

// ─── Start Mode ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StartMode {
    Run,
    Debug,
    DebugNoInit,
}

impl StartMode {
    pub const ALL: [Self; 3] = [Self::Run, Self::Debug, Self::DebugNoInit];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Debug => "debug",
            Self::DebugNoInit => "debugNoInit",
        }
    }

    pub fn is_debug(self) -> bool {
        matches!(self, Self::Debug | Self::DebugNoInit)
    }
}

impl fmt::Display for StartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Self::Run),
            "debug" => Ok(Self::Debug),
            "debugNoInit" => Ok(Self::DebugNoInit),
            _ => Err(ValidationError::UnknownStartMode(s.to_owned())),
        }
    }
}

// ─── Control Command ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlCommand {
    Restart,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restart => "restart",
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(Self::Restart),
            _ => Err(ValidationError::UnknownStatus {
                field: "controlCommand",
                value: s.to_owned(),
            }),
        }
    }
}

// ─── Raw Status ───────────────────────────────────────────────────

/// Application status as reported by the daemon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppStatus {
    Started,
    Starting,
    Stopping,
    Stopped,
    #[default]
    Unknown,
}

impl AppStatus {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "started" => Some(Self::Started),
            "starting" => Some(Self::Starting),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Build status as reported by the daemon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStatus {
    Success,
    InProgress,
    Queued,
    Failed,
    #[default]
    Unknown,
}

impl BuildStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "inProgress" => Some(Self::InProgress),
            "queued" => Some(Self::Queued),
            "failed" => Some(Self::Failed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

// ─── Derived App State ────────────────────────────────────────────

/// Display-level application state, derived from the raw status,
/// start mode and enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Started,
    Starting,
    Stopping,
    Stopped,
    Debugging,
    DebugStarting,
    Disabled,
    Unknown,
}

impl AppState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Started => "Running",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Debugging => "Debugging",
            Self::DebugStarting => "Starting - Debug",
            Self::Disabled => "Disabled",
            Self::Unknown => "Unknown",
        }
    }

    /// Started in any mode.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started | Self::Debugging)
    }

    pub fn is_starting(self) -> bool {
        matches!(self, Self::Starting | Self::DebugStarting)
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Run State ────────────────────────────────────────────────────

/// Run-state fields carried by a snapshot, still in wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStateUpdate {
    pub enabled: Option<bool>,
    pub app_status: Option<String>,
    pub build_status: Option<String>,
    pub detailed_app_status: Option<String>,
    pub detailed_build_status: Option<String>,
    pub start_mode: Option<String>,
}

/// Composite run/build state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub enabled: bool,
    pub app_status: AppStatus,
    pub build_status: BuildStatus,
    pub detailed_app_status: Option<String>,
    pub detailed_build_status: Option<String>,
    pub start_mode: Option<StartMode>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            enabled: true,
            app_status: AppStatus::Unknown,
            build_status: BuildStatus::Unknown,
            detailed_app_status: None,
            detailed_build_status: None,
            start_mode: None,
        }
    }
}

impl RunState {
    /// Merge the present fields of `update`.
    ///
    /// Returns whether the composite state changed, plus any fields that
    /// were unrecognized. An unrecognized status degrades to `Unknown`.
    pub fn apply(&mut self, update: &RunStateUpdate) -> (bool, Vec<ValidationError>) {
        let before = self.clone();
        let mut rejected = Vec::new();

        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(raw) = &update.app_status {
            self.app_status = AppStatus::parse(raw).unwrap_or_else(|| {
                rejected.push(ValidationError::UnknownStatus {
                    field: "appStatus",
                    value: raw.clone(),
                });
                AppStatus::Unknown
            });
        }
        if let Some(raw) = &update.build_status {
            self.build_status = BuildStatus::parse(raw).unwrap_or_else(|| {
                rejected.push(ValidationError::UnknownStatus {
                    field: "buildStatus",
                    value: raw.clone(),
                });
                BuildStatus::Unknown
            });
        }
        if let Some(detail) = &update.detailed_app_status {
            self.detailed_app_status = non_empty(detail);
        }
        if let Some(detail) = &update.detailed_build_status {
            self.detailed_build_status = non_empty(detail);
        }
        if let Some(raw) = &update.start_mode {
            match raw.parse::<StartMode>() {
                Ok(mode) => self.start_mode = Some(mode),
                Err(e) => rejected.push(e),
            }
        }

        (*self != before, rejected)
    }

    pub fn app_state(&self) -> AppState {
        if !self.enabled {
            return AppState::Disabled;
        }
        let debug = self.start_mode.is_some_and(StartMode::is_debug);
        match (self.app_status, debug) {
            (AppStatus::Started, true) => AppState::Debugging,
            (AppStatus::Started, false) => AppState::Started,
            (AppStatus::Starting, true) => AppState::DebugStarting,
            (AppStatus::Starting, false) => AppState::Starting,
            (AppStatus::Stopping, _) => AppState::Stopping,
            (AppStatus::Stopped, _) => AppState::Stopped,
            (AppStatus::Unknown, _) => AppState::Unknown,
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(
            self.build_status,
            BuildStatus::InProgress | BuildStatus::Queued
        )
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_owned()) }
}

// ─── Descriptor ───────────────────────────────────────────────────

/// Immutable description of a project, fixed at bind time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    #[serde(alias = "projectID")]
    pub id: String,
    pub name: String,
    pub project_type: String,
    pub language: String,
    /// On-disk location of the project sources.
    #[serde(default, alias = "locOnDisk")]
    pub local_path: Option<std::path::PathBuf>,
    /// Host the daemon exposes application ports on.
    #[serde(default)]
    pub host: Option<String>,
}
