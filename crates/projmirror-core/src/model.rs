//! The project aggregate and its reconciliation algorithm.
//!
//! `ProjectModel` is an owned mutable struct confined to one thread of
//! control. Every mutation goes through an apply method that returns a
//! [`ChangeSet`]: which fields actually changed, what was rejected, which
//! protocol anomalies were seen, and which follow-up [`Effect`]s the owner
//! must carry out (probes, enable/disable hooks, restart resolution).
//!
//! Inbound events carry no ordering guarantee. Without a snapshot
//! `version`, the last write observed wins per field.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::capabilities::Capabilities;
use crate::change::{ChangeSet, Effect, ProjectField};
use crate::config::EngineConfig;
use crate::error::{ProtocolAnomaly, ValidationError};
use crate::events::{ProjectSnapshot, RestartResultEvent, SettingsEvent};
use crate::ports::{PortSet, PortUpdate};
use crate::restart::{CancelReason, RestartMachine, RestartOutcome};
use crate::types::{AppState, ProjectDescriptor, RunState, StartMode};

/// Result of applying a settings-changed event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsResult {
    pub changes: ChangeSet,
    /// Daemon-reported failure, for the UI to surface.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectModel {
    #[serde(flatten)]
    descriptor: ProjectDescriptor,
    run_state: RunState,
    ports: PortSet,
    container_id: Option<String>,
    context_root: Option<String>,
    auto_build_enabled: bool,
    inject_metrics_enabled: bool,
    metrics_available: bool,
    capabilities_ready: bool,
    capabilities: Capabilities,
    last_build_time: Option<DateTime<Utc>>,
    last_image_build_time: Option<DateTime<Utc>>,
    app_base_url: Option<String>,
    uses_https: bool,
    applied_version: Option<u64>,
    #[serde(skip)]
    restart: Option<RestartMachine>,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn strip_context_root(raw: &str) -> String {
    raw.strip_prefix('/').unwrap_or(raw).to_owned()
}

impl ProjectModel {
    pub fn new(descriptor: ProjectDescriptor) -> Self {
        Self {
            descriptor,
            run_state: RunState::default(),
            ports: PortSet::default(),
            container_id: None,
            context_root: None,
            auto_build_enabled: false,
            inject_metrics_enabled: false,
            metrics_available: false,
            capabilities_ready: false,
            capabilities: Capabilities::none(),
            last_build_time: None,
            last_image_build_time: None,
            app_base_url: None,
            uses_https: false,
            applied_version: None,
            restart: None,
        }
    }

    // ─── Getters ──────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    pub fn app_state(&self) -> AppState {
        self.run_state.app_state()
    }

    pub fn is_enabled(&self) -> bool {
        self.run_state.enabled
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    pub fn context_root(&self) -> Option<&str> {
        self.context_root.as_deref()
    }

    pub fn auto_build_enabled(&self) -> bool {
        self.auto_build_enabled
    }

    pub fn inject_metrics_enabled(&self) -> bool {
        self.inject_metrics_enabled
    }

    pub fn metrics_available(&self) -> bool {
        self.metrics_available
    }

    pub fn capabilities_ready(&self) -> bool {
        self.capabilities_ready
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn last_build_time(&self) -> Option<DateTime<Utc>> {
        self.last_build_time
    }

    pub fn last_image_build_time(&self) -> Option<DateTime<Utc>> {
        self.last_image_build_time
    }

    pub fn app_base_url(&self) -> Option<&str> {
        self.app_base_url.as_deref()
    }

    pub fn uses_https(&self) -> bool {
        self.uses_https
    }

    pub fn applied_version(&self) -> Option<u64> {
        self.applied_version
    }

    pub fn pending_restart(&self) -> Option<&RestartMachine> {
        self.restart.as_ref()
    }

    // ─── Derived views ────────────────────────────────────────────

    /// URL the running application is served at.
    pub fn app_url(&self) -> Option<String> {
        let context_root = self.context_root.as_deref().unwrap_or("");
        if let Some(base) = self.app_base_url.as_deref()
            && let Ok(mut url) = Url::parse(base)
            && url.has_host()
        {
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            return url.join(context_root).ok().map(String::from);
        }
        let host = self.descriptor.host.as_deref()?;
        let port = self.ports.app_port?;
        let scheme = if self.uses_https { "https" } else { "http" };
        Some(format!("{scheme}://{host}:{port}/{context_root}"))
    }

    /// `host:port` a debugger should attach to.
    pub fn debug_address(&self) -> Option<String> {
        let host = self.descriptor.host.as_deref()?;
        let port = self.ports.debug_port?;
        Some(format!("{host}:{port}"))
    }

    pub fn debug_type<'a>(&self, config: &'a EngineConfig) -> Option<&'a str> {
        config.debug_type(&self.descriptor.language, &self.descriptor.project_type)
    }

    /// Whether capabilities should be fetched from the daemon right now.
    pub fn wants_capability_probe(&self) -> bool {
        self.run_state.enabled && self.capabilities_ready
    }

    /// Precondition for issuing a restart in `mode`.
    pub fn check_restart(&self, mode: StartMode) -> Result<(), String> {
        if !self.run_state.enabled {
            return Err(format!("project {} is disabled", self.descriptor.name));
        }
        if !self.capabilities.supports_restart() {
            return Err(format!("project {} does not support restart", self.descriptor.name));
        }
        if !self.capabilities.supports_start_mode(mode) {
            return Err(format!(
                "project {} does not support {mode} mode",
                self.descriptor.name
            ));
        }
        Ok(())
    }

    // ─── Reconcile ────────────────────────────────────────────────

    fn check_id(&self, got: &str, changes: &mut ChangeSet) -> bool {
        if got == self.descriptor.id {
            return true;
        }
        let anomaly = ProtocolAnomaly::IdMismatch {
            expected: self.descriptor.id.clone(),
            got: got.to_owned(),
        };
        tracing::warn!("protocol anomaly: {anomaly}");
        changes.rejected.push(ValidationError::IdMismatch {
            expected: self.descriptor.id.clone(),
            got: got.to_owned(),
        });
        changes.anomalies.push(anomaly);
        false
    }

    /// Merge a partial snapshot. Never fails; malformed fields are skipped.
    pub fn reconcile(&mut self, snapshot: &ProjectSnapshot) -> ChangeSet {
        let mut changes = ChangeSet::default();
        if !self.check_id(&snapshot.id, &mut changes) {
            return changes;
        }

        if let Some(version) = snapshot.version {
            if let Some(applied) = self.applied_version
                && version < applied
            {
                let anomaly = ProtocolAnomaly::StaleSnapshot { version, applied };
                tracing::warn!(project_id = %self.descriptor.id, "protocol anomaly: {anomaly}");
                changes.anomalies.push(anomaly);
                return changes;
            }
            let changed = replace(&mut self.applied_version, Some(version));
            changes.mark(ProjectField::Version, changed);
        }

        // 1. plain fields
        if let Some(container_id) = &snapshot.container_id {
            let changed = replace(&mut self.container_id, Some(container_id.clone()));
            changes.mark(ProjectField::ContainerId, changed);
        }
        if let Some(ts) = snapshot.last_build {
            let changed = replace(&mut self.last_build_time, Some(ts));
            changes.mark(ProjectField::LastBuildTime, changed);
        }
        if let Some(ts) = snapshot.last_image_build {
            let changed = replace(&mut self.last_image_build_time, Some(ts));
            changes.mark(ProjectField::LastImageBuildTime, changed);
        }
        if let Some(auto_build) = snapshot.auto_build {
            let changed = replace(&mut self.auto_build_enabled, auto_build);
            changes.mark(ProjectField::AutoBuild, changed);
        }
        if let Some(inject) = snapshot.inject_metrics {
            let changed = replace(&mut self.inject_metrics_enabled, inject);
            changes.mark(ProjectField::InjectMetrics, changed);
            if changed {
                changes.push_effect(Effect::ProbeMetrics);
            }
        }

        // 2. https
        if let Some(https) = snapshot.is_https {
            let changed = replace(&mut self.uses_https, https);
            changes.mark(ProjectField::UsesHttps, changed);
        }

        // 3. context root
        if let Some(raw) = snapshot.context_root.as_deref()
            && !raw.is_empty()
        {
            self.set_context_root(raw, &mut changes);
        }

        // 4. base URL, stored even when invalid
        if let Some(raw) = &snapshot.app_base_url {
            if let Err(e) = validate_base_url(raw) {
                tracing::warn!(project_id = %self.descriptor.id, "{e}");
                changes.rejected.push(e);
            }
            let changed = replace(&mut self.app_base_url, Some(raw.clone()));
            changes.mark(ProjectField::AppBaseUrl, changed);
        }

        // 5. capabilities readiness
        if let Some(ready) = snapshot.capabilities_ready {
            let changed = replace(&mut self.capabilities_ready, ready);
            changes.mark(ProjectField::CapabilitiesReady, changed);
            if changed {
                changes.push_effect(Effect::ProbeCapabilities);
            }
        }

        // 6. run state
        let was_enabled = self.run_state.enabled;
        let (state_changed, rejected) = self.run_state.apply(&snapshot.run_state_update());
        for e in &rejected {
            tracing::warn!(project_id = %self.descriptor.id, "{e}");
        }
        changes.rejected.extend(rejected);
        changes.mark(ProjectField::RunState, state_changed);
        if state_changed {
            tracing::debug!(
                project_id = %self.descriptor.id,
                state = %self.app_state(),
                build = ?self.run_state.build_status,
                "run state changed"
            );
        }

        // 7. enable / disable
        match (was_enabled, self.run_state.enabled) {
            (true, false) => self.on_disable(&mut changes),
            (false, true) => {
                tracing::info!(project_id = %self.descriptor.id, "project enabled");
                changes.push_effect(Effect::Enabled);
                changes.push_effect(Effect::ProbeCapabilities);
                changes.push_effect(Effect::ProbeMetrics);
            }
            _ => {}
        }

        // 8. ports
        match &snapshot.ports {
            Some(update) => self.apply_ports(update, &mut changes),
            None if self.app_state().is_started() => {
                let anomaly = ProtocolAnomaly::StartedWithoutPorts;
                tracing::warn!(project_id = %self.descriptor.id, "protocol anomaly: {anomaly}");
                changes.anomalies.push(anomaly);
            }
            None => {}
        }

        // 9. restart progression
        let app_state = self.app_state();
        if let Some(machine) = self.restart.as_mut()
            && let Some(outcome) = machine.on_app_state(app_state)
        {
            self.finish_restart(outcome, &mut changes);
        }

        changes
    }

    fn set_context_root(&mut self, raw: &str, changes: &mut ChangeSet) {
        let changed = replace(&mut self.context_root, Some(strip_context_root(raw)));
        changes.mark(ProjectField::ContextRoot, changed);
    }

    fn apply_ports(&mut self, update: &PortUpdate, changes: &mut ChangeSet) {
        let applied = self.ports.apply(update);
        for field in applied.changed {
            changes.mark(ProjectField::Port(field), true);
        }
        changes.rejected.extend(applied.rejected);
    }

    fn on_disable(&mut self, changes: &mut ChangeSet) {
        tracing::info!(project_id = %self.descriptor.id, "project disabled");
        if let Some(outcome) = self.take_cancelled(CancelReason::Disabled) {
            changes.push_effect(Effect::RestartResolved(outcome));
        }
        let changed = replace(&mut self.capabilities, Capabilities::none());
        changes.mark(ProjectField::Capabilities, changed);
        // Supersedes any capability probe still in flight.
        changes.push_effect(Effect::ProbeCapabilities);
        changes.push_effect(Effect::Disabled);
    }

    // ─── Settings ─────────────────────────────────────────────────

    pub fn apply_settings(&mut self, event: &SettingsEvent) -> SettingsResult {
        let mut result = SettingsResult::default();
        if !self.check_id(&event.id, &mut result.changes) {
            return result;
        }
        if !event.status.is_success() {
            let error = event
                .error
                .clone()
                .unwrap_or_else(|| "settings change failed".to_owned());
            tracing::warn!(project_id = %self.descriptor.id, "settings change failed: {error}");
            result.error = Some(error);
            return result;
        }
        if let Some(raw) = event.context_root.as_deref()
            && !raw.is_empty()
        {
            self.set_context_root(raw, &mut result.changes);
        }
        if let Some(ports) = &event.ports {
            self.apply_ports(&PortUpdate::from(ports), &mut result.changes);
        }
        result
    }

    // ─── Probes ───────────────────────────────────────────────────

    /// Replace capabilities wholesale.
    pub fn apply_capabilities(&mut self, capabilities: Capabilities) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let changed = replace(&mut self.capabilities, capabilities);
        changes.mark(ProjectField::Capabilities, changed);
        changes
    }

    pub fn apply_metrics_availability(&mut self, available: bool) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let changed = replace(&mut self.metrics_available, available);
        changes.mark(ProjectField::MetricsAvailable, changed);
        changes
    }

    // ─── Restart ──────────────────────────────────────────────────

    /// Start tracking a restart. Returns `false` if one is already awaiting.
    pub fn request_restart(&mut self, mode: StartMode, timeout: Duration, now_ms: u64) -> bool {
        if let Some(pending) = &self.restart {
            tracing::warn!(
                project_id = %self.descriptor.id,
                pending = %pending.start_mode(),
                requested = %mode,
                "restart already in progress"
            );
            return false;
        }
        tracing::info!(project_id = %self.descriptor.id, mode = %mode, "restart requested");
        self.restart = Some(RestartMachine::new(mode, timeout, now_ms));
        true
    }

    pub fn on_restart_result(&mut self, event: &RestartResultEvent) -> ChangeSet {
        let mut changes = ChangeSet::default();
        if !self.check_id(&event.id, &mut changes) {
            return changes;
        }
        let Some(machine) = &self.restart else {
            let anomaly = ProtocolAnomaly::UnexpectedRestartResult;
            tracing::warn!(project_id = %self.descriptor.id, "protocol anomaly: {anomaly}");
            changes.anomalies.push(anomaly);
            return changes;
        };
        let outcome = machine.on_result(event);
        if outcome.is_success() {
            if let Some(ports) = &event.ports {
                self.apply_ports(ports, &mut changes);
            }
            if let Some(container_id) = &event.container_id {
                let changed = replace(&mut self.container_id, Some(container_id.clone()));
                changes.mark(ProjectField::ContainerId, changed);
            }
        }
        self.finish_restart(outcome, &mut changes);
        changes
    }

    /// Fail the pending restart if its deadline has passed.
    pub fn expire_restart(&mut self, now_ms: u64) -> Option<RestartOutcome> {
        let outcome = self.restart.as_ref()?.check_deadline(now_ms)?;
        self.restart = None;
        tracing::info!(project_id = %self.descriptor.id, "restart {outcome}");
        Some(outcome)
    }

    /// Cancel the pending restart, if any.
    pub fn cancel_restart(&mut self, reason: CancelReason) -> Option<RestartOutcome> {
        self.take_cancelled(reason)
    }

    fn take_cancelled(&mut self, reason: CancelReason) -> Option<RestartOutcome> {
        let outcome = self.restart.take()?.cancel(reason);
        tracing::info!(project_id = %self.descriptor.id, "restart {outcome}");
        Some(outcome)
    }

    fn finish_restart(&mut self, outcome: RestartOutcome, changes: &mut ChangeSet) {
        self.restart = None;
        tracing::info!(project_id = %self.descriptor.id, "restart {outcome}");
        changes.push_effect(Effect::RestartResolved(outcome));
    }
}

fn validate_base_url(raw: &str) -> Result<(), ValidationError> {
    let invalid = |detail: &str| ValidationError::InvalidUrl {
        url: raw.to_owned(),
        detail: detail.to_owned(),
    };
    let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if !url.has_host() {
        return Err(invalid("missing authority"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventStatus, SettingsPorts};
    use crate::ports::PortField;

    fn model() -> ProjectModel {
        ProjectModel::new(ProjectDescriptor {
            id: "p1".into(),
            name: "orders".into(),
            project_type: "liberty".into(),
            language: "java".into(),
            local_path: None,
            host: Some("127.0.0.1".into()),
        })
    }

    fn full_snapshot() -> ProjectSnapshot {
        serde_json::from_str(
            r#"{
                "projectID": "p1",
                "containerId": "c0ffee",
                "lastbuild": 1580000000000,
                "autoBuild": true,
                "injectMetrics": false,
                "isHttps": false,
                "contextRoot": "/orders",
                "appBaseURL": "http://127.0.0.1:32768",
                "capabilitiesReady": true,
                "state": "open",
                "appStatus": "started",
                "buildStatus": "success",
                "startMode": "run",
                "ports": {"exposedPort": "32768", "internalPort": "9080"}
            }"#,
        )
        .unwrap()
    }

    fn all_caps(m: &mut ProjectModel) {
        m.apply_capabilities(Capabilities::all());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut m = model();
        let first = m.reconcile(&full_snapshot());
        assert!(first.contains(ProjectField::ContainerId));
        assert!(first.contains(ProjectField::Port(PortField::App)));
        assert!(first.has_effect(&Effect::ProbeCapabilities));

        let second = m.reconcile(&full_snapshot());
        assert!(second.is_empty(), "second apply changed {:?}", second.changed);
        assert!(second.effects.is_empty());
    }

    #[test]
    fn absent_fields_are_untouched() {
        let mut m = model();
        m.reconcile(&full_snapshot());
        let mut partial = ProjectSnapshot::new("p1");
        partial.container_id = Some("beef".into());
        let changes = m.reconcile(&partial);
        assert_eq!(
            changes.changed.iter().copied().collect::<Vec<_>>(),
            vec![ProjectField::ContainerId]
        );
        assert_eq!(m.ports().app_port, Some(32768));
        assert_eq!(m.context_root(), Some("orders"));
    }

    #[test]
    fn foreign_id_is_rejected_without_mutation() {
        let mut m = model();
        let mut snap = full_snapshot();
        snap.id = "p2".into();
        let changes = m.reconcile(&snap);
        assert!(changes.is_empty());
        assert_eq!(changes.anomalies.len(), 1);
        assert_eq!(m.container_id(), None);
        assert_eq!(m.id(), "p1");
    }

    #[test]
    fn context_root_strips_one_leading_slash() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.context_root = Some("//double".into());
        m.reconcile(&snap);
        assert_eq!(m.context_root(), Some("/double"));
        snap.context_root = Some(String::new());
        assert!(m.reconcile(&snap).is_empty());
        assert_eq!(m.context_root(), Some("/double"));
    }

    #[test]
    fn invalid_base_url_is_stored_and_reported() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.app_base_url = Some("localhost:9080".into());
        let changes = m.reconcile(&snap);
        assert!(changes.contains(ProjectField::AppBaseUrl));
        assert!(matches!(
            changes.rejected.as_slice(),
            [ValidationError::InvalidUrl { .. }]
        ));
        assert_eq!(m.app_base_url(), Some("localhost:9080"));
    }

    #[test]
    fn bad_port_keeps_previous_and_rest_applies() {
        let mut m = model();
        m.reconcile(&full_snapshot());
        let mut snap = ProjectSnapshot::new("p1");
        snap.container_id = Some("new".into());
        snap.ports = Some(PortUpdate {
            app_port: Some("65536".into()),
            ..Default::default()
        });
        let changes = m.reconcile(&snap);
        assert_eq!(m.ports().app_port, Some(32768));
        assert_eq!(m.container_id(), Some("new"));
        assert_eq!(changes.rejected.len(), 1);
    }

    #[test]
    fn started_without_ports_is_an_anomaly() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.app_status = Some("started".into());
        let changes = m.reconcile(&snap);
        assert_eq!(changes.anomalies, vec![ProtocolAnomaly::StartedWithoutPorts]);
        assert!(changes.contains(ProjectField::RunState));
    }

    #[test]
    fn capabilities_ready_toggle_requests_probe_both_ways() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.capabilities_ready = Some(true);
        assert!(m.reconcile(&snap).has_effect(&Effect::ProbeCapabilities));
        snap.capabilities_ready = Some(false);
        assert!(m.reconcile(&snap).has_effect(&Effect::ProbeCapabilities));
        assert!(!m.reconcile(&snap).has_effect(&Effect::ProbeCapabilities));
    }

    #[test]
    fn inject_metrics_toggle_requests_metrics_probe() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.inject_metrics = Some(true);
        let changes = m.reconcile(&snap);
        assert!(changes.has_effect(&Effect::ProbeMetrics));
        assert!(!changes.has_effect(&Effect::ProbeCapabilities));
    }

    #[test]
    fn disable_cancels_restart_and_clears_capabilities() {
        let mut m = model();
        m.reconcile(&full_snapshot());
        all_caps(&mut m);
        assert!(m.request_restart(StartMode::Run, Duration::from_secs(60), 0));

        let mut snap = ProjectSnapshot::new("p1");
        snap.state = Some("closed".into());
        let changes = m.reconcile(&snap);
        assert_eq!(
            changes.restart_outcome(),
            Some(&RestartOutcome::Cancelled("project disabled".into()))
        );
        assert!(changes.has_effect(&Effect::Disabled));
        assert!(changes.has_effect(&Effect::ProbeCapabilities));
        assert!(changes.contains(ProjectField::Capabilities));
        assert_eq!(m.capabilities(), &Capabilities::none());
        assert!(m.pending_restart().is_none());
        assert_eq!(m.app_state(), AppState::Disabled);
    }

    #[test]
    fn enable_requests_both_probes_once() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.state = Some("closed".into());
        m.reconcile(&snap);
        snap.state = Some("open".into());
        snap.capabilities_ready = Some(true);
        let changes = m.reconcile(&snap);
        let probes = changes
            .effects
            .iter()
            .filter(|e| **e == Effect::ProbeCapabilities)
            .count();
        assert_eq!(probes, 1);
        assert!(changes.has_effect(&Effect::Enabled));
        assert!(changes.has_effect(&Effect::ProbeMetrics));
    }

    #[test]
    fn second_restart_request_is_refused() {
        let mut m = model();
        assert!(m.request_restart(StartMode::Run, Duration::from_secs(60), 0));
        assert!(!m.request_restart(StartMode::Debug, Duration::from_secs(60), 0));
        assert_eq!(m.pending_restart().unwrap().start_mode(), StartMode::Run);
    }

    #[test]
    fn restart_result_without_pending_is_dropped() {
        let mut m = model();
        let event = RestartResultEvent {
            id: "p1".into(),
            status: EventStatus::Success,
            error_msg: None,
            ports: None,
            start_mode: Some("run".into()),
            container_id: Some("x".into()),
        };
        let changes = m.on_restart_result(&event);
        assert_eq!(
            changes.anomalies,
            vec![ProtocolAnomaly::UnexpectedRestartResult]
        );
        assert_eq!(m.container_id(), None);
    }

    #[test]
    fn successful_restart_result_applies_ports_and_container() {
        let mut m = model();
        m.request_restart(StartMode::Run, Duration::from_secs(60), 0);
        let event = RestartResultEvent {
            id: "p1".into(),
            status: EventStatus::Success,
            error_msg: None,
            ports: Some(PortUpdate {
                app_port: Some("40000".into()),
                ..Default::default()
            }),
            start_mode: Some("run".into()),
            container_id: Some("fresh".into()),
        };
        let changes = m.on_restart_result(&event);
        assert!(changes.restart_outcome().unwrap().is_success());
        assert_eq!(m.ports().app_port, Some(40000));
        assert_eq!(m.container_id(), Some("fresh"));
        assert!(m.pending_restart().is_none());
    }

    #[test]
    fn restart_resolves_from_state_progression() {
        let mut m = model();
        m.reconcile(&full_snapshot());
        m.request_restart(StartMode::Run, Duration::from_secs(60), 0);
        let mut snap = ProjectSnapshot::new("p1");
        snap.app_status = Some("stopped".into());
        assert!(m.reconcile(&snap).restart_outcome().is_none());
        snap.app_status = Some("starting".into());
        assert!(m.reconcile(&snap).restart_outcome().is_none());
        snap.app_status = Some("started".into());
        snap.ports = Some(PortUpdate {
            app_port: Some("32770".into()),
            ..Default::default()
        });
        let changes = m.reconcile(&snap);
        assert_eq!(
            changes.restart_outcome(),
            Some(&RestartOutcome::Succeeded {
                start_mode: StartMode::Run
            })
        );
    }

    #[test]
    fn expire_restart_only_after_deadline() {
        let mut m = model();
        m.request_restart(StartMode::Run, Duration::from_millis(100), 1_000);
        assert_eq!(m.expire_restart(1_050), None);
        assert!(matches!(
            m.expire_restart(1_100),
            Some(RestartOutcome::Failed(reason)) if reason.starts_with("timeout")
        ));
        assert!(m.pending_restart().is_none());
    }

    #[test]
    fn stale_versioned_snapshot_is_rejected() {
        let mut m = model();
        let mut newer = ProjectSnapshot::new("p1");
        newer.version = Some(5);
        newer.container_id = Some("new".into());
        m.reconcile(&newer);

        let mut older = ProjectSnapshot::new("p1");
        older.version = Some(4);
        older.container_id = Some("old".into());
        let changes = m.reconcile(&older);
        assert!(changes.is_empty());
        assert_eq!(m.container_id(), Some("new"));

        // Unversioned snapshots still apply.
        let changes = m.reconcile(&ProjectSnapshot {
            container_id: Some("unversioned".into()),
            ..ProjectSnapshot::new("p1")
        });
        assert!(changes.contains(ProjectField::ContainerId));
    }

    #[test]
    fn settings_then_snapshot_end_to_end() {
        let mut m = model();
        let snap: ProjectSnapshot = serde_json::from_str(
            r#"{"id": "p1", "runState": "started", "ports": {"appPort": "8080"}}"#,
        )
        .unwrap();
        m.reconcile(&snap);
        let state_before = m.run_state().clone();

        let settings: SettingsEvent =
            serde_json::from_str(r#"{"projectID": "p1", "status": "success", "contextRoot": "/api"}"#)
                .unwrap();
        let result = m.apply_settings(&settings);
        assert!(result.error.is_none());
        assert_eq!(m.ports().app_port, Some(8080));
        assert_eq!(m.context_root(), Some("api"));
        assert_eq!(m.run_state(), &state_before);
    }

    #[test]
    fn failed_settings_change_mutates_nothing() {
        let mut m = model();
        let event = SettingsEvent {
            id: "p1".into(),
            status: EventStatus::Fail,
            error: Some("port in use".into()),
            context_root: Some("/x".into()),
            ports: Some(SettingsPorts {
                internal_port: Some("9999".into()),
                internal_debug_port: None,
            }),
        };
        let result = m.apply_settings(&event);
        assert_eq!(result.error.as_deref(), Some("port in use"));
        assert!(result.changes.is_empty());
        assert_eq!(m.context_root(), None);
    }

    #[test]
    fn check_restart_requires_capabilities() {
        let mut m = model();
        assert!(m.check_restart(StartMode::Run).is_err());
        all_caps(&mut m);
        assert!(m.check_restart(StartMode::Debug).is_ok());
    }

    #[test]
    fn app_url_joins_base_and_context_root() {
        let mut m = model();
        m.reconcile(&full_snapshot());
        assert_eq!(
            m.app_url().as_deref(),
            Some("http://127.0.0.1:32768/orders")
        );
    }

    #[test]
    fn app_url_falls_back_to_host_and_port() {
        let mut m = model();
        let mut snap = ProjectSnapshot::new("p1");
        snap.is_https = Some(true);
        snap.ports = Some(PortUpdate {
            app_port: Some("9443".into()),
            debug_port: Some("7777".into()),
            ..Default::default()
        });
        m.reconcile(&snap);
        assert_eq!(m.app_url().as_deref(), Some("https://127.0.0.1:9443/"));
        assert_eq!(m.debug_address().as_deref(), Some("127.0.0.1:7777"));
    }

    #[test]
    fn debug_type_uses_injected_table() {
        let m = model();
        assert_eq!(m.debug_type(&EngineConfig::default()), Some("java"));
    }
}
