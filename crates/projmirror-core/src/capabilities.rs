//! Operations a project currently supports.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{ControlCommand, StartMode};

/// Capability probe response in wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesPayload {
    #[serde(default)]
    pub start_modes: Vec<String>,
    #[serde(default)]
    pub control_commands: Vec<String>,
}

/// Supported start modes and control commands.
///
/// Always replaced wholesale; never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub start_modes: BTreeSet<StartMode>,
    pub control_commands: BTreeSet<ControlCommand>,
}

impl Capabilities {
    /// Conservative value for disabled or not-yet-ready projects.
    pub fn none() -> Self {
        Self::default()
    }

    /// Last-resort value when a probe dies unexpectedly.
    pub fn all() -> Self {
        Self {
            start_modes: StartMode::ALL.into_iter().collect(),
            control_commands: [ControlCommand::Restart].into_iter().collect(),
        }
    }

    /// Parse a probe payload. Unknown entries are skipped and reported.
    pub fn from_payload(payload: &CapabilitiesPayload) -> (Self, Vec<ValidationError>) {
        let mut rejected = Vec::new();
        let start_modes = payload
            .start_modes
            .iter()
            .filter_map(|raw| {
                raw.parse::<StartMode>()
                    .map_err(|e| rejected.push(e))
                    .ok()
            })
            .collect();
        let control_commands = payload
            .control_commands
            .iter()
            .filter_map(|raw| {
                raw.parse::<ControlCommand>()
                    .map_err(|e| rejected.push(e))
                    .ok()
            })
            .collect();
        (
            Self {
                start_modes,
                control_commands,
            },
            rejected,
        )
    }

    pub fn supports_start_mode(&self, mode: StartMode) -> bool {
        self.start_modes.contains(&mode)
    }

    pub fn supports_debug(&self) -> bool {
        self.start_modes.iter().any(|m| m.is_debug())
    }

    /// A debugger can be attached to a running app (debug or debugNoInit).
    pub fn supports_attach_debugger(&self) -> bool {
        self.supports_debug()
    }

    /// The app can be launched suspended, waiting for a debugger.
    pub fn supports_debug_no_init(&self) -> bool {
        self.start_modes.contains(&StartMode::DebugNoInit)
    }

    pub fn supports_restart(&self) -> bool {
        self.control_commands.contains(&ControlCommand::Restart)
    }
}
