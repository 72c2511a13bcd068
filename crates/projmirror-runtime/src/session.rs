//! Project session: one tokio task owning one `ProjectModel`.
//!
//! All mutation happens on the session task, one message at a time, so
//! the model needs no locking. Probes and the unbind call run in spawned
//! tasks that post their results back to the session. The restart
//! deadline is the only timer. Restart and deletion requesters hold a
//! one-shot receiver that is resolved exactly once, including when the
//! session shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use projmirror_core::{
    CancelReason, Capabilities, ChangeSet, DaemonEvent, DeletionResultEvent, Effect,
    EngineConfig, ProjectDescriptor, ProjectModel, ProjectSnapshot,
    ProtocolAnomaly, RestartOutcome, StartMode,
};

use crate::error::{RestartRefused, SessionError, TransportError};
use crate::hooks::ProjectHooks;
use crate::notifier::{ChangeNotifier, ChangeReason, ProjectChange};
use crate::probe::{self, ProbeGenerations, ProbeKind};
use crate::transport::ProjectTransport;

// ─── Outcomes ─────────────────────────────────────────────────────

/// Settled result of a deletion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Daemon confirmed the deletion and local teardown ran.
    Deleted { files_removed: bool },
    /// Daemon reported failure; the project is intact and may be retried.
    Failed,
    /// The request never reached a confirmation.
    Rejected(String),
}

/// Handle on an accepted restart.
#[derive(Debug)]
pub struct PendingRestart {
    mode: StartMode,
    rx: oneshot::Receiver<RestartOutcome>,
}

impl PendingRestart {
    pub fn mode(&self) -> StartMode {
        self.mode
    }

    /// Wait for the terminal outcome.
    pub async fn outcome(self) -> RestartOutcome {
        self.rx.await.unwrap_or_else(|_| {
            RestartOutcome::Cancelled(CancelReason::Shutdown.message().to_owned())
        })
    }
}

/// Handle on a submitted deletion.
#[derive(Debug)]
pub struct PendingDeletion {
    rx: oneshot::Receiver<DeletionOutcome>,
}

impl PendingDeletion {
    pub async fn outcome(self) -> DeletionOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| DeletionOutcome::Rejected(CancelReason::Shutdown.message().to_owned()))
    }
}

// ─── Messages ─────────────────────────────────────────────────────

enum Command {
    Event(DaemonEvent),
    Restart {
        mode: StartMode,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<PendingRestart, RestartRefused>>,
    },
    Delete {
        delete_files: bool,
        reply: oneshot::Sender<DeletionOutcome>,
    },
    Disconnect,
    Reconnect,
    Model {
        reply: oneshot::Sender<ProjectModel>,
    },
}

enum Internal {
    CapabilitiesProbed {
        generation: u64,
        capabilities: Capabilities,
    },
    MetricsProbed {
        generation: u64,
        available: Option<bool>,
    },
    UnbindFinished(Result<(), TransportError>),
}

struct DeletionRequest {
    delete_files: bool,
    reply: oneshot::Sender<DeletionOutcome>,
}

enum Flow {
    Continue,
    Stop,
}

// ─── Handle ───────────────────────────────────────────────────────

/// Cloneable client side of a running session.
#[derive(Debug, Clone)]
pub struct ProjectHandle {
    id: String,
    commands: mpsc::Sender<Command>,
    notifier: ChangeNotifier,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event(e) => f.debug_tuple("Event").field(e).finish(),
            Self::Restart { mode, .. } => f.debug_struct("Restart").field("mode", mode).finish(),
            Self::Delete { delete_files, .. } => f
                .debug_struct("Delete")
                .field("delete_files", delete_files)
                .finish(),
            Self::Disconnect => f.write_str("Disconnect"),
            Self::Reconnect => f.write_str("Reconnect"),
            Self::Model { .. } => f.write_str("Model"),
        }
    }
}

impl ProjectHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProjectChange> {
        self.notifier.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed(self.id.clone()))
    }

    /// Queue an inbound daemon event.
    pub async fn dispatch(&self, event: DaemonEvent) -> Result<(), SessionError> {
        self.send(Command::Event(event)).await
    }

    pub async fn reconcile(&self, snapshot: ProjectSnapshot) -> Result<(), SessionError> {
        self.dispatch(DaemonEvent::ProjectStatusChanged(snapshot))
            .await
    }

    /// Start tracking a restart into `mode`. `timeout` defaults to the
    /// configured restart timeout.
    pub async fn request_restart(
        &self,
        mode: StartMode,
        timeout: Option<Duration>,
    ) -> Result<PendingRestart, RestartRefused> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Restart {
            mode,
            timeout,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| RestartRefused::Session(SessionError::Closed(self.id.clone())))?
    }

    /// Ask the daemon to delete the project. The returned handle settles
    /// when the daemon confirms, reports failure, or the unbind call fails.
    pub async fn request_deletion(&self, delete_files: bool) -> Result<PendingDeletion, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Delete {
            delete_files,
            reply,
        })
        .await?;
        Ok(PendingDeletion { rx })
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(Command::Disconnect).await
    }

    pub async fn reconnect(&self) -> Result<(), SessionError> {
        self.send(Command::Reconnect).await
    }

    /// Current model, after every previously queued message was applied.
    pub async fn model(&self) -> Result<ProjectModel, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Model { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed(self.id.clone()))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

// ─── Session ──────────────────────────────────────────────────────

pub struct ProjectSession<T, H> {
    model: ProjectModel,
    transport: Arc<T>,
    hooks: Arc<H>,
    config: EngineConfig,
    notifier: ChangeNotifier,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    /// Requester of the in-flight restart, paired with the model's machine.
    restart_reply: Option<oneshot::Sender<RestartOutcome>>,
    deletion: Option<DeletionRequest>,
    probes: ProbeGenerations,
    epoch: Instant,
    cancel: CancellationToken,
}

impl<T: ProjectTransport, H: ProjectHooks> ProjectSession<T, H> {
    /// Build the model, run the initial probes in parallel, then start the
    /// session task. The handle is returned once both probes completed.
    pub async fn spawn(
        descriptor: ProjectDescriptor,
        initial: Option<ProjectSnapshot>,
        transport: Arc<T>,
        hooks: Arc<H>,
        config: EngineConfig,
    ) -> ProjectHandle {
        let (commands_tx, commands) = mpsc::channel(config.event_buffer);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let notifier = ChangeNotifier::new(config.notify_buffer);
        let cancel = CancellationToken::new();

        let mut model = ProjectModel::new(descriptor);
        let initial_changes = match &initial {
            Some(snapshot) => {
                let changes = model.reconcile(snapshot);
                debug!(project_id = %model.id(), changed = changes.changed.len(), "initial snapshot applied");
                changes
            }
            None => ChangeSet::default(),
        };

        let mut session = Self {
            model,
            transport,
            hooks,
            config,
            notifier: notifier.clone(),
            commands,
            internal_tx,
            internal_rx,
            restart_reply: None,
            deletion: None,
            probes: ProbeGenerations::new(),
            epoch: Instant::now(),
            cancel: cancel.clone(),
        };
        session.initialize().await;
        // Probes already ran; only lifecycle hooks remain from the baseline.
        for effect in &initial_changes.effects {
            session.run_hook(effect);
        }

        let handle = ProjectHandle {
            id: session.model.id().to_owned(),
            commands: commands_tx,
            notifier,
            cancel,
        };
        tokio::spawn(async move { session.run().await });
        handle
    }

    async fn initialize(&mut self) {
        let cap_generation = self.probes.next(ProbeKind::Capabilities);
        let metrics_generation = self.probes.next(ProbeKind::Metrics);
        let wants_capabilities = self.model.wants_capability_probe();
        let id = self.model.id().to_owned();

        let capabilities = async {
            if wants_capabilities {
                probe::probe_capabilities(Arc::clone(&self.transport), id.clone()).await
            } else {
                Capabilities::none()
            }
        };
        let metrics = probe::probe_metrics(Arc::clone(&self.transport), id.clone());
        let (capabilities, available) = tokio::join!(capabilities, metrics);

        self.on_capabilities(cap_generation, capabilities, false);
        self.on_metrics(metrics_generation, available, false);
        info!(project_id = %id, name = %self.model.name(), "project session initialized");
        self.notifier
            .notify(&self.model, ChangeReason::Initialized, []);
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn restart_deadline(&self) -> Option<Instant> {
        self.model
            .pending_restart()
            .map(|m| self.epoch + Duration::from_millis(m.deadline_ms()))
    }

    /// Main loop. Runs until shutdown, deletion, or all handles dropped.
    async fn run(mut self) {
        info!(project_id = %self.model.id(), "project session started");
        loop {
            let deadline = self.restart_deadline();
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(project_id = %self.model.id(), "project session cancelled");
                    break;
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => {
                            if let Flow::Stop = self.handle_command(command).await {
                                break;
                            }
                        }
                        None => {
                            info!(project_id = %self.model.id(), "all handles dropped");
                            break;
                        }
                    }
                }
                Some(message) = self.internal_rx.recv() => self.handle_internal(message),
                () = sleep_until(deadline) => self.expire_restart(),
            }
        }
        self.close();
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Event(event) => return self.handle_event(event).await,
            Command::Restart {
                mode,
                timeout,
                reply,
            } => {
                let _ = reply.send(self.start_restart(mode, timeout));
            }
            Command::Delete {
                delete_files,
                reply,
            } => self.start_deletion(delete_files, reply),
            Command::Disconnect => {
                info!(project_id = %self.model.id(), "connection lost");
                if let Some(outcome) = self.model.cancel_restart(CancelReason::Disconnected) {
                    self.resolve_restart(outcome);
                }
                self.hooks.on_disconnect_or_disable(&self.model);
                self.notifier
                    .notify(&self.model, ChangeReason::Disconnected, []);
            }
            Command::Reconnect => {
                info!(project_id = %self.model.id(), "connection restored");
                self.hooks.on_reconnect(&self.model);
                self.notifier
                    .notify(&self.model, ChangeReason::Reconnected, []);
            }
            Command::Model { reply } => {
                let _ = reply.send(self.model.clone());
            }
        }
        Flow::Continue
    }

    async fn handle_event(&mut self, event: DaemonEvent) -> Flow {
        match event {
            DaemonEvent::ProjectStatusChanged(snapshot) => {
                let changes = self.model.reconcile(&snapshot);
                self.dispatch_effects(&changes);
                self.notify(ChangeReason::Snapshot, &changes);
            }
            DaemonEvent::ProjectSettingsChanged(settings) => {
                let result = self.model.apply_settings(&settings);
                self.notify(
                    ChangeReason::Settings {
                        error: result.error.clone(),
                    },
                    &result.changes,
                );
            }
            DaemonEvent::ProjectRestartResult(result) => {
                let changes = self.model.on_restart_result(&result);
                self.dispatch_effects(&changes);
                let reason = changes
                    .restart_outcome()
                    .cloned()
                    .map_or(ChangeReason::Snapshot, ChangeReason::RestartResolved);
                self.notify(reason, &changes);
            }
            DaemonEvent::ProjectDeletion(result) => return self.finish_deletion(result).await,
        }
        Flow::Continue
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::CapabilitiesProbed {
                generation,
                capabilities,
            } => self.on_capabilities(generation, capabilities, true),
            Internal::MetricsProbed {
                generation,
                available,
            } => self.on_metrics(generation, available, true),
            Internal::UnbindFinished(Ok(())) => {
                debug!(project_id = %self.model.id(), "unbind accepted, awaiting confirmation");
            }
            Internal::UnbindFinished(Err(e)) => {
                if let Some(request) = self.deletion.take() {
                    warn!(project_id = %self.model.id(), "unbind failed: {e}");
                    let _ = request.reply.send(DeletionOutcome::Rejected(e.to_string()));
                }
            }
        }
    }

    fn notify(&self, reason: ChangeReason, changes: &ChangeSet) {
        self.notifier
            .notify(&self.model, reason, changes.changed.iter().copied());
    }

    fn run_hook(&self, effect: &Effect) {
        match effect {
            Effect::Enabled => self.hooks.on_enable(&self.model),
            Effect::Disabled => {
                self.hooks.on_disable(&self.model);
                self.hooks.on_disconnect_or_disable(&self.model);
            }
            _ => {}
        }
    }

    fn dispatch_effects(&mut self, changes: &ChangeSet) {
        for effect in &changes.effects {
            match effect {
                Effect::ProbeCapabilities => self.start_capability_probe(),
                Effect::ProbeMetrics => self.start_metrics_probe(),
                Effect::Enabled | Effect::Disabled => self.run_hook(effect),
                Effect::RestartResolved(outcome) => self.resolve_restart(outcome.clone()),
            }
        }
    }

    // ─── Probes ───────────────────────────────────────────────────

    fn start_capability_probe(&mut self) {
        let generation = self.probes.next(ProbeKind::Capabilities);
        if !self.model.wants_capability_probe() {
            self.on_capabilities(generation, Capabilities::none(), true);
            return;
        }
        let transport = Arc::clone(&self.transport);
        let id = self.model.id().to_owned();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let capabilities = probe::probe_capabilities(transport, id).await;
            let _ = tx.send(Internal::CapabilitiesProbed {
                generation,
                capabilities,
            });
        });
    }

    fn start_metrics_probe(&mut self) {
        let generation = self.probes.next(ProbeKind::Metrics);
        let transport = Arc::clone(&self.transport);
        let id = self.model.id().to_owned();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let available = probe::probe_metrics(transport, id).await;
            let _ = tx.send(Internal::MetricsProbed {
                generation,
                available,
            });
        });
    }

    fn on_capabilities(&mut self, generation: u64, capabilities: Capabilities, notify: bool) {
        if !self.probes.is_current(ProbeKind::Capabilities, generation) {
            debug!(project_id = %self.model.id(), generation, "dropping stale capability probe");
            return;
        }
        let changes = self.model.apply_capabilities(capabilities);
        if notify && !changes.is_empty() {
            debug!(project_id = %self.model.id(), "capabilities updated");
            self.notify(ChangeReason::Capabilities, &changes);
        }
    }

    fn on_metrics(&mut self, generation: u64, available: Option<bool>, notify: bool) {
        if !self.probes.is_current(ProbeKind::Metrics, generation) {
            debug!(project_id = %self.model.id(), generation, "dropping stale metrics probe");
            return;
        }
        let Some(available) = available else {
            return;
        };
        let changes = self.model.apply_metrics_availability(available);
        if notify && !changes.is_empty() {
            self.notify(ChangeReason::Metrics, &changes);
        }
    }

    // ─── Restart ──────────────────────────────────────────────────

    fn start_restart(
        &mut self,
        mode: StartMode,
        timeout: Option<Duration>,
    ) -> Result<PendingRestart, RestartRefused> {
        if self.model.pending_restart().is_some() {
            return Err(RestartRefused::AlreadyPending);
        }
        self.model
            .check_restart(mode)
            .map_err(RestartRefused::NotAllowed)?;
        let timeout = timeout.unwrap_or_else(|| self.config.restart_timeout());
        let now_ms = self.now_ms();
        if !self.model.request_restart(mode, timeout, now_ms) {
            return Err(RestartRefused::AlreadyPending);
        }
        let (tx, rx) = oneshot::channel();
        self.restart_reply = Some(tx);
        Ok(PendingRestart { mode, rx })
    }

    fn expire_restart(&mut self) {
        let now_ms = self.now_ms();
        if let Some(outcome) = self.model.expire_restart(now_ms) {
            self.resolve_restart(outcome.clone());
            self.notifier
                .notify(&self.model, ChangeReason::RestartResolved(outcome), []);
        }
    }

    fn resolve_restart(&mut self, outcome: RestartOutcome) {
        match self.restart_reply.take() {
            Some(reply) => {
                let _ = reply.send(outcome);
            }
            None => debug!(project_id = %self.model.id(), "restart resolved with no requester"),
        }
    }

    // ─── Deletion ─────────────────────────────────────────────────

    fn start_deletion(&mut self, delete_files: bool, reply: oneshot::Sender<DeletionOutcome>) {
        if self.deletion.is_some() {
            let _ = reply.send(DeletionOutcome::Rejected(
                "deletion already in progress".to_owned(),
            ));
            return;
        }
        info!(project_id = %self.model.id(), delete_files, "requesting project deletion");
        self.deletion = Some(DeletionRequest {
            delete_files,
            reply,
        });
        let transport = Arc::clone(&self.transport);
        let id = self.model.id().to_owned();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = transport.request_unbind(&id).await;
            let _ = tx.send(Internal::UnbindFinished(result));
        });
    }

    async fn finish_deletion(&mut self, event: DeletionResultEvent) -> Flow {
        if event.id != self.model.id() {
            let anomaly = ProtocolAnomaly::IdMismatch {
                expected: self.model.id().to_owned(),
                got: event.id,
            };
            warn!("protocol anomaly: {anomaly}");
            return Flow::Continue;
        }
        let Some(request) = self.deletion.take() else {
            warn!(project_id = %self.model.id(), "protocol anomaly: {}", ProtocolAnomaly::UnexpectedDeletionResult);
            return Flow::Continue;
        };
        if !event.status.is_success() {
            warn!(project_id = %self.model.id(), "daemon failed to delete project");
            let _ = request.reply.send(DeletionOutcome::Failed);
            return Flow::Continue;
        }

        self.hooks.release_debug_config(&self.model);
        let files_removed = if request.delete_files {
            self.remove_local_files().await
        } else {
            false
        };
        if let Some(outcome) = self.model.cancel_restart(CancelReason::Shutdown) {
            self.resolve_restart(outcome);
        }
        self.hooks.teardown(&self.model);
        info!(project_id = %self.model.id(), files_removed, "project deleted");
        self.notifier
            .notify(&self.model, ChangeReason::Deleted, []);
        let _ = request
            .reply
            .send(DeletionOutcome::Deleted { files_removed });
        Flow::Stop
    }

    async fn remove_local_files(&self) -> bool {
        let Some(path) = self.model.descriptor().local_path.as_deref() else {
            warn!(project_id = %self.model.id(), "no local path to delete");
            return false;
        };
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(project_id = %self.model.id(), path = %path.display(), "failed to delete project files: {e}");
                false
            }
        }
    }

    /// Settle everything still outstanding.
    fn close(&mut self) {
        if let Some(outcome) = self.model.cancel_restart(CancelReason::Shutdown) {
            self.resolve_restart(outcome);
        }
        if let Some(request) = self.deletion.take() {
            let _ = request.reply.send(DeletionOutcome::Rejected(
                CancelReason::Shutdown.message().to_owned(),
            ));
        }
        info!(project_id = %self.model.id(), "project session stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
