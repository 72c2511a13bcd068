//! Restart request state machine.
//!
//! Pure and deterministic: time is passed in as epoch milliseconds and the
//! caller owns the timer. A machine exists only while a restart is
//! `Awaiting`; every terminal transition yields exactly one
//! [`RestartOutcome`] and the owner drops the machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::events::RestartResultEvent;
use crate::ports::{PortField, PortUpdate};
use crate::types::{AppState, StartMode};

const GENERIC_FAILURE: &str = "restart failed";

/// Terminal result of a restart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum RestartOutcome {
    Succeeded { start_mode: StartMode },
    Failed(String),
    Cancelled(String),
}

impl RestartOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

impl fmt::Display for RestartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded { start_mode } => write!(f, "restarted in {start_mode} mode"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
        }
    }
}

/// Why an awaiting restart was cancelled from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Disconnected,
    Disabled,
    Shutdown,
}

impl CancelReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::Disconnected => "connection lost",
            Self::Disabled => "project disabled",
            Self::Shutdown => "project session closed",
        }
    }
}

/// One in-flight restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartMachine {
    start_mode: StartMode,
    timeout: Duration,
    deadline_ms: u64,
    /// App observed leaving its running state since the request.
    seen_progress: bool,
    /// App observed starting since the request.
    seen_starting: bool,
}

impl RestartMachine {
    pub fn new(start_mode: StartMode, timeout: Duration, now_ms: u64) -> Self {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Self {
            start_mode,
            timeout,
            deadline_ms: now_ms.saturating_add(timeout_ms),
            seen_progress: false,
            seen_starting: false,
        }
    }

    pub fn start_mode(&self) -> StartMode {
        self.start_mode
    }

    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Outcome for an explicit restart-result event.
    ///
    /// Success needs the success flag, a fully valid port set (with a debug
    /// port for debug modes) and a known start mode. Anything else fails.
    pub fn on_result(&self, event: &RestartResultEvent) -> RestartOutcome {
        if !event.status.is_success() {
            return RestartOutcome::Failed(
                event
                    .error_msg
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_owned()),
            );
        }
        match self.check_success_payload(event) {
            Ok(start_mode) => {
                if start_mode != self.start_mode {
                    tracing::debug!(
                        requested = %self.start_mode,
                        reported = %start_mode,
                        "restart reported a different start mode"
                    );
                }
                RestartOutcome::Succeeded { start_mode }
            }
            Err(detail) => RestartOutcome::Failed(format!("{GENERIC_FAILURE}: {detail}")),
        }
    }

    fn check_success_payload(&self, event: &RestartResultEvent) -> Result<StartMode, String> {
        let ports: &PortUpdate = event.ports.as_ref().ok_or("no ports reported")?;
        if let Err(errors) = ports.validate() {
            let detail: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(detail.join("; "));
        }
        if !ports.has(PortField::App) {
            return Err("no app port reported".to_owned());
        }
        let raw_mode = event.start_mode.as_deref().ok_or("no start mode reported")?;
        let start_mode: StartMode = raw_mode.parse().map_err(|e| format!("{e}"))?;
        if start_mode.is_debug() && !ports.has(PortField::Debug) {
            return Err("no debug port reported for debug mode".to_owned());
        }
        Ok(start_mode)
    }

    /// Feed the latest derived app state. Returns an outcome once the app
    /// has gone through a restart cycle and settled.
    pub fn on_app_state(&mut self, state: AppState) -> Option<RestartOutcome> {
        match state {
            AppState::Stopping | AppState::Stopped => self.seen_progress = true,
            AppState::Starting | AppState::DebugStarting => {
                self.seen_progress = true;
                self.seen_starting = true;
            }
            _ => {}
        }
        if !self.seen_progress {
            return None;
        }
        let target = if self.start_mode.is_debug() {
            AppState::Debugging
        } else {
            AppState::Started
        };
        if state == target {
            return Some(RestartOutcome::Succeeded {
                start_mode: self.start_mode,
            });
        }
        if self.seen_starting && state == AppState::Stopped {
            return Some(RestartOutcome::Failed(
                "application failed to start".to_owned(),
            ));
        }
        None
    }

    /// Timeout outcome once `now_ms` has reached the deadline.
    pub fn check_deadline(&self, now_ms: u64) -> Option<RestartOutcome> {
        (now_ms >= self.deadline_ms).then(|| {
            RestartOutcome::Failed(format!(
                "timeout after {}s",
                self.timeout.as_secs_f64()
            ))
        })
    }

    pub fn cancel(&self, reason: CancelReason) -> RestartOutcome {
        RestartOutcome::Cancelled(reason.message().to_owned())
    }
}
