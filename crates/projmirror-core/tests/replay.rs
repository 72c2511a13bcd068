use std::fs;
use std::path::PathBuf;

use projmirror_core::{
    AppState, DaemonEvent, Effect, ProjectDescriptor, ProjectModel, ProtocolAnomaly,
};

fn fixtures_dir() -> PathBuf {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../fixtures")
}

fn load_descriptor() -> ProjectDescriptor {
    let path = fixtures_dir().join("project.json");
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {:?}: {}", path, e));
    serde_json::from_str(&content).unwrap()
}

fn load_events() -> Vec<DaemonEvent> {
    let path = fixtures_dir().join("events.jsonl");
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {:?}: {}", path, e));
    content
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|l| {
            serde_json::from_str(l).unwrap_or_else(|e| panic!("failed to parse {l}: {e}"))
        })
        .collect()
}

#[test]
fn fixture_stream_converges() {
    let mut model = ProjectModel::new(load_descriptor());
    let mut anomalies = Vec::new();
    let mut settings_errors = Vec::new();
    let mut effects = Vec::new();

    for event in load_events() {
        match event {
            DaemonEvent::ProjectStatusChanged(snapshot) => {
                let changes = model.reconcile(&snapshot);
                anomalies.extend(changes.anomalies);
                effects.extend(changes.effects);
            }
            DaemonEvent::ProjectSettingsChanged(settings) => {
                let result = model.apply_settings(&settings);
                settings_errors.extend(result.error);
            }
            other => panic!("unexpected event in fixture: {other:?}"),
        }
    }

    assert_eq!(model.app_state(), AppState::Started);
    assert_eq!(model.applied_version(), Some(4));
    assert_eq!(model.container_id(), Some("3f1c9a"));
    assert_eq!(model.context_root(), Some("api"));
    assert_eq!(model.ports().app_port, Some(32768));
    assert_eq!(model.ports().internal_port, Some(8080));
    assert_eq!(
        model.last_build_time().map(|t| t.timestamp_millis()),
        Some(1_718_000_000_000)
    );
    assert_eq!(
        model.last_image_build_time().map(|t| t.timestamp_millis()),
        Some(1_717_990_000_000)
    );
    assert_eq!(model.app_url().as_deref(), Some("http://127.0.0.1:32768/api"));

    assert_eq!(
        anomalies,
        vec![ProtocolAnomaly::StaleSnapshot {
            version: 2,
            applied: 4
        }]
    );
    assert_eq!(settings_errors, vec!["internal port 99999 is out of range".to_owned()]);
    assert_eq!(
        effects.iter().filter(|e| **e == Effect::ProbeCapabilities).count(),
        1
    );
}

#[test]
fn replaying_the_stream_twice_changes_nothing() {
    let events = load_events();
    let mut model = ProjectModel::new(load_descriptor());
    for event in &events {
        if let DaemonEvent::ProjectStatusChanged(snapshot) = event {
            model.reconcile(snapshot);
        }
    }
    for event in &events {
        if let DaemonEvent::ProjectStatusChanged(snapshot) = event {
            let changes = model.reconcile(snapshot);
            assert!(changes.is_empty(), "replay changed {:?}", changes.changed);
        }
    }
}
