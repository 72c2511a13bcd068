//! Field-level change summaries and follow-up effects.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{ProtocolAnomaly, ValidationError};
use crate::ports::PortField;
use crate::restart::RestartOutcome;

/// Observable field of a [`ProjectModel`](crate::model::ProjectModel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectField {
    ContainerId,
    LastBuildTime,
    LastImageBuildTime,
    AutoBuild,
    InjectMetrics,
    UsesHttps,
    ContextRoot,
    AppBaseUrl,
    CapabilitiesReady,
    RunState,
    Port(PortField),
    Capabilities,
    MetricsAvailable,
    Version,
}

/// Follow-up the owner of the model must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Re-query capabilities.
    ProbeCapabilities,
    /// Re-query metrics availability.
    ProbeMetrics,
    /// Project went from disabled to enabled.
    Enabled,
    /// Project went from enabled to disabled.
    Disabled,
    /// The in-flight restart reached a terminal outcome.
    RestartResolved(RestartOutcome),
}

/// What one apply call did to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changed: BTreeSet<ProjectField>,
    pub rejected: Vec<ValidationError>,
    pub anomalies: Vec<ProtocolAnomaly>,
    pub effects: Vec<Effect>,
}

impl ChangeSet {
    /// No observable field changed.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn contains(&self, field: ProjectField) -> bool {
        self.changed.contains(&field)
    }

    pub(crate) fn mark(&mut self, field: ProjectField, changed: bool) {
        if changed {
            self.changed.insert(field);
        }
    }

    /// Queue an effect once per call.
    pub(crate) fn push_effect(&mut self, effect: Effect) {
        if !self.effects.contains(&effect) {
            self.effects.push(effect);
        }
    }

    pub fn has_effect(&self, effect: &Effect) -> bool {
        self.effects.contains(effect)
    }

    pub fn restart_outcome(&self) -> Option<&RestartOutcome> {
        self.effects.iter().find_map(|e| match e {
            Effect::RestartResolved(outcome) => Some(outcome),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effects_are_deduplicated() {
        let mut set = ChangeSet::default();
        set.push_effect(Effect::ProbeCapabilities);
        set.push_effect(Effect::ProbeCapabilities);
        set.push_effect(Effect::ProbeMetrics);
        assert_eq!(set.effects.len(), 2);
    }

    #[test]
    fn unchanged_marks_are_ignored() {
        let mut set = ChangeSet::default();
        set.mark(ProjectField::ContainerId, false);
        assert!(set.is_empty());
        set.mark(ProjectField::Port(PortField::App), true);
        assert!(set.contains(ProjectField::Port(PortField::App)));
    }
}
