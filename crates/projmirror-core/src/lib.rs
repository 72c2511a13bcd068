//! projmirror-core: local model of a project running under a remote
//! build/run daemon.
//!
//! Merges daemon snapshots and push events into one `ProjectModel`, tracks
//! restart requests, and tells the caller which follow-up probes and hooks
//! to run. Pure and single-threaded: no async, no clock, no IO besides
//! config loading.

pub mod capabilities;
pub mod change;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod ports;
pub mod restart;
pub mod types;

pub use capabilities::{Capabilities, CapabilitiesPayload};
pub use change::{ChangeSet, Effect, ProjectField};
pub use config::EngineConfig;
pub use error::{ConfigError, ProtocolAnomaly, ValidationError};
pub use events::{
    DaemonEvent, DeletionResultEvent, EventStatus, ProjectSnapshot, RestartResultEvent,
    SettingsEvent, SettingsPorts,
};
pub use model::{ProjectModel, SettingsResult};
pub use ports::{PortField, PortSet, PortUpdate};
pub use restart::{CancelReason, RestartMachine, RestartOutcome};
pub use types::{AppState, ProjectDescriptor, RunState, StartMode};
