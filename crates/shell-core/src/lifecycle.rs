// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Lifecycle coordinator
//!
//! [`Shell`] owns the registry, router, supervisor and monitor and drives
//! them from a single event queue. Handlers run to completion one at a time;
//! anything that waits (timers, pickers, file I/O, HTTP) runs in a task that
//! posts its result back as a [`ShellEvent`].

use anyhow::{Context, Result};
use freedata_common::{ConfigSnapshot, Platform, ProcessRole, SurfaceName};
use semver::Version;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::events::{
    outbound, EventReceiver, EventSender, InboundEvent, OutboundEvent, ShellEvent, ShutdownReason,
};
use crate::files::{self, FilePicker, NoPicker, PickRequest};
use crate::monitor::{ConnectionMonitor, Connector, TcpConnector};
use crate::registry::{CloseOutcome, SurfaceFactory, SurfaceSpec, WindowRegistry};
use crate::router::{dispatch_for, Command, Dispatch, FileCommand, MessageRouter};
use crate::settings::ShellSettings;
use crate::supervisor::{locate_binary, OsSweeper, ProcessSupervisor, ProcessSweeper};
use crate::updater::{self, UpdateCheck, UpdaterEvent, STABLE_CHANNEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

/// The shell: one event loop over every component
pub struct Shell {
    settings: ShellSettings,
    config: Arc<ConfigSnapshot>,
    version: String,
    platform: Platform,
    registry: WindowRegistry,
    router: MessageRouter,
    supervisor: ProcessSupervisor,
    monitor: ConnectionMonitor,
    picker: Arc<dyn FilePicker>,
    events: EventSender,
    inbox: EventReceiver,
    pending_install: Option<PathBuf>,
    phase: Phase,
}

impl Shell {
    /// Build a shell around an existing event queue.
    ///
    /// The queue is passed in because surface backends usually need the
    /// sender before the shell exists.
    pub fn new(
        settings: ShellSettings,
        config: ConfigSnapshot,
        version: impl Into<String>,
        (events, inbox): (EventSender, EventReceiver),
        factory: Box<dyn SurfaceFactory>,
    ) -> Self {
        let platform = Platform::current();
        let supervisor = ProcessSupervisor::new(platform, events.clone(), Box::new(OsSweeper));
        let monitor = ConnectionMonitor::new(Box::new(TcpConnector::new(
            events.clone(),
            settings.connect_timeout(),
        )));

        Self {
            settings,
            config: Arc::new(config),
            version: version.into(),
            platform,
            registry: WindowRegistry::new(factory),
            router: MessageRouter::new(),
            supervisor,
            monitor,
            picker: Arc::new(NoPicker),
            events,
            inbox,
            pending_install: None,
            phase: Phase::Created,
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn FilePicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_sweeper(mut self, sweeper: Box<dyn ProcessSweeper>) -> Self {
        self.supervisor = ProcessSupervisor::new(self.platform, self.events.clone(), sweeper);
        self
    }

    pub fn with_connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.monitor = ConnectionMonitor::new(connector);
        self
    }

    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.config)
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// Splash, hidden surfaces, daemon, version broadcast, update check
    pub fn startup(&mut self) -> Result<()> {
        info!("Starting FreeDATA shell {}", self.version);

        let mut specs = SurfaceSpec::defaults(&self.config);
        if let Some(pos) = specs.iter().position(|s| s.name == SurfaceName::Splash) {
            let splash = specs.remove(pos);
            if let Err(e) = self.registry.create(splash) {
                warn!("Could not show splash: {}", e);
            }
        }
        for spec in specs {
            let name = spec.name;
            self.registry
                .create(spec)
                .with_context(|| format!("Failed to create surface {}", name))?;
        }

        let delay = self.settings.splash_delay();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ShellEvent::SplashElapsed);
        });

        self.start_daemon();

        let version = OutboundEvent::new(outbound::SET_APP_VERSION, Value::String(self.version.clone()));
        self.registry.send(SurfaceName::Main, &version);

        if self.settings.check_for_updates {
            self.start_update_check();
        } else {
            debug!("Update check disabled");
        }

        self.phase = Phase::Running;
        Ok(())
    }

    fn start_daemon(&mut self) {
        let Some(path) = locate_binary(ProcessRole::Daemon, self.platform, &self.settings.resources_dir)
        else {
            info!("Daemon binary doesn't exist, normal for dev environments");
            self.supervisor.mark_not_found(ProcessRole::Daemon);
            return;
        };

        let cwd = path.parent().map(Path::to_path_buf);
        self.supervisor
            .start(ProcessRole::Daemon, &path, &[], cwd.as_deref());
    }

    fn start_update_check(&mut self) {
        let current = match Version::parse(&self.version) {
            Ok(version) => version,
            Err(e) => {
                warn!("Not checking for updates, version {} is not semver: {}", self.version, e);
                return;
            }
        };
        let channel = self
            .config
            .get_str("update_channel")
            .unwrap_or_else(|| STABLE_CHANNEL.to_string());

        updater::spawn_check(
            UpdateCheck {
                feed_url: self.settings.update_feed_url.clone(),
                channel,
                current,
                platform: self.platform,
                download_dir: self.settings.download_dir(),
            },
            self.events.clone(),
        );
    }

    /// Wait for the next queued event
    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        self.inbox.recv().await
    }

    /// Process one event to completion
    pub fn handle(&mut self, event: ShellEvent) {
        if self.phase == Phase::Stopped {
            debug!("Shell stopped, dropping {:?}", event);
            return;
        }

        match event {
            ShellEvent::Inbound(inbound) => self.on_inbound(inbound),
            ShellEvent::CloseRequested(name) => self.on_close_requested(name),
            ShellEvent::Process(process) => self.supervisor.ingest(process, &mut self.registry),
            ShellEvent::Socket { socket_id, event } => {
                if let Some(notification) = self.monitor.on_socket_event(socket_id, event) {
                    self.registry
                        .send(ConnectionMonitor::notify_target(), &notification);
                }
            }
            ShellEvent::Updater(update) => self.on_updater(update),
            ShellEvent::SplashElapsed => {
                self.registry.destroy(SurfaceName::Splash);
                self.registry.show(SurfaceName::Main);
            }
            ShellEvent::Picked { request, path } => self.on_picked(request, path),
            ShellEvent::Deliver { target, event } => {
                self.registry.send(target, &event);
            }
            ShellEvent::Shutdown(reason) => {
                self.shutdown(reason);
            }
        }
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        match dispatch_for(event.kind) {
            Dispatch::Relay(_) => {
                self.router.relay(&event, &mut self.registry);
            }
            Dispatch::Command(command) => self.execute(command, &event),
        }
    }

    fn on_close_requested(&mut self, name: SurfaceName) {
        if name == SurfaceName::Splash {
            self.registry.destroy(name);
            return;
        }

        match self.registry.request_close(name) {
            CloseOutcome::Hidden => debug!("Surface {} hidden", name),
            CloseOutcome::Teardown => {
                info!("Surface {} closed, closing all windows", name);
                self.shutdown(ShutdownReason::MainClosed);
            }
            CloseOutcome::Absent => debug!("Close request for missing surface {}", name),
        }
    }

    fn on_updater(&mut self, update: UpdaterEvent) {
        if let UpdaterEvent::Downloaded { path, .. } = &update {
            self.pending_install = Some(path.clone());
        }
        let notification = update.to_outbound(&self.version);
        self.registry.send(SurfaceName::Main, &notification);
    }

    fn execute(&mut self, command: Command, event: &InboundEvent) {
        let payload = &event.payload;
        match command {
            Command::SetConfig => match ConfigSnapshot::from_value(payload.clone()) {
                Ok(snapshot) => {
                    self.config = Arc::new(snapshot);
                    let update = OutboundEvent::new(outbound::UPDATE_CONFIG, payload.clone());
                    self.registry
                        .broadcast(&[SurfaceName::Main, SurfaceName::Chat], &update);
                }
                Err(e) => warn!("Ignoring set-config-global from {}: {}", event.source, e),
            },
            Command::SetProgress => match number(payload) {
                Some(percent) => {
                    self.registry.set_progress(SurfaceName::Main, percent / 100.0);
                }
                None => debug!("Progress payload is not a number: {}", payload),
            },
            Command::ShowSurface(name) => {
                self.registry.show(name);
            }
            Command::File(file_command) => self.file_command(file_command, payload),
            Command::RestartAndInstall => self.restart_and_install(),
            Command::StartRigctld => self.start_rigctld(payload),
            Command::StopRigctld => self.supervisor.stop(ProcessRole::Rigctld),
            Command::CheckRigctld => {
                let host = payload
                    .get("ip")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| self.config.get_str("hamlib_rigctld_ip"))
                    .unwrap_or_else(|| "127.0.0.1".to_string());
                let port = payload
                    .get("port")
                    .and_then(number)
                    .or_else(|| self.config.get_u64("hamlib_rigctld_port").map(|p| p as f64))
                    .unwrap_or(4532.0);
                if !(1.0..=65535.0).contains(&port) {
                    warn!("Invalid rigctld port {}", port);
                    return;
                }
                self.monitor.check(&host, port as u16);
            }
        }
    }

    fn start_rigctld(&mut self, payload: &Value) {
        let path = payload
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                locate_binary(ProcessRole::Rigctld, self.platform, &self.settings.resources_dir)
            });
        let Some(path) = path else {
            warn!("No rigctld binary to start");
            return;
        };

        let args: Vec<String> = match payload.get("parameters") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            _ => Vec::new(),
        };

        self.supervisor
            .start(ProcessRole::Rigctld, &path, &args, None);
    }

    fn restart_and_install(&mut self) {
        let Some(path) = self.pending_install.take() else {
            warn!("Restart and install requested but no update was downloaded");
            return;
        };

        if !self.shutdown(ShutdownReason::RestartForUpdate) {
            return;
        }
        if let Err(e) = updater::launch_installer(&path) {
            error!("{:#}", e);
        }
    }

    fn file_command(&mut self, command: FileCommand, payload: &Value) {
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

        match command {
            FileCommand::PickFilePath | FileCommand::PickFolderPath => {
                let Some(action) = text("action") else {
                    warn!("Picker request without an action name");
                    return;
                };
                self.open_picker(PickRequest::ForAction {
                    action,
                    folder: command == FileCommand::PickFolderPath,
                });
            }
            FileCommand::OpenFolder => match text("path") {
                Some(path) => {
                    if let Err(e) = files::reveal_in_folder(Path::new(&path)) {
                        warn!("{:#}", e);
                    }
                }
                None => warn!("open-folder without a path"),
            },
            FileCommand::SelectFile => self.open_picker(PickRequest::SelectFile),
            FileCommand::SelectUserImage => self.open_picker(PickRequest::SelectUserImage),
            FileCommand::ReadSharedFolder => {
                let folder = text("folder")
                    .or_else(|| self.config.get_str("shared_folder_path"))
                    .unwrap_or_else(|| ".".to_string());
                let enabled = self.config.flag("enable_request_shared_folder");
                self.spawn_delivery(SurfaceName::Chat, outbound::SHARED_FOLDER_FILES, async move {
                    files::list_shared_folder(Path::new(&folder), enabled).await
                });
            }
            FileCommand::SaveFile => {
                let (Some(filename), Some(data_b64)) = (text("filename"), text("file")) else {
                    warn!("save-file-to-folder without filename or data");
                    return;
                };
                self.open_picker(PickRequest::SaveFile { filename, data_b64 });
            }
        }
    }

    fn open_picker(&self, request: PickRequest) {
        let picker = Arc::clone(&self.picker);
        let events = self.events.clone();
        tokio::task::spawn_blocking(move || {
            let path = picker.pick(&request.kind());
            let _ = events.send(ShellEvent::Picked { request, path });
        });
    }

    fn on_picked(&mut self, request: PickRequest, path: Option<PathBuf>) {
        let Some(path) = path else {
            debug!("Picker cancelled for {:?}", request);
            return;
        };

        match request {
            PickRequest::ForAction { action, .. } => {
                let reply = OutboundEvent::new(action, files::picked_path_payload(&path));
                self.registry.send(SurfaceName::Main, &reply);
            }
            PickRequest::SelectFile => {
                self.spawn_delivery(SurfaceName::Chat, outbound::SELECTED_FILES, async move {
                    files::read_selected_file(&path).await
                });
            }
            PickRequest::SelectUserImage => {
                self.spawn_delivery(SurfaceName::Chat, outbound::SELECTED_USER_IMAGE, async move {
                    files::read_user_image(&path).await
                });
            }
            PickRequest::SaveFile { data_b64, .. } => {
                tokio::spawn(async move {
                    if let Err(e) = files::save_base64_file(&path, &data_b64).await {
                        warn!("{:#}", e);
                    }
                });
            }
        }
    }

    /// Run file I/O in a task and queue the payload for `target`
    fn spawn_delivery<F>(&self, target: SurfaceName, name: &'static str, work: F)
    where
        F: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            match work.await {
                Ok(payload) => {
                    let event = OutboundEvent::new(name, payload);
                    let _ = events.send(ShellEvent::Deliver { target, event });
                }
                Err(e) => warn!("{}: {:#}", name, e),
            }
        });
    }

    /// Stop every child and destroy every surface.
    ///
    /// Returns false when a shutdown already ran.
    pub fn shutdown(&mut self, reason: ShutdownReason) -> bool {
        if matches!(self.phase, Phase::ShuttingDown | Phase::Stopped) {
            debug!("Shutdown ({:?}) already done", reason);
            return false;
        }

        info!("Shutting down: {:?}", reason);
        self.phase = Phase::ShuttingDown;
        self.supervisor.stop_all();
        let destroyed = self.registry.destroy_all();
        debug!("Destroyed {} surface(s)", destroyed);
        info!(
            "Relayed {} event(s), dropped {}",
            self.router.delivered_total(),
            self.router.dropped_total()
        );
        self.phase = Phase::Stopped;
        true
    }

    /// Start up and process events until shutdown
    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.startup() {
            self.shutdown(ShutdownReason::MainClosed);
            return Err(e);
        }

        while let Some(event) = self.inbox.recv().await {
            self.handle(event);
            if self.phase == Phase::Stopped {
                break;
            }
        }

        info!("FreeDATA shell stopped");
        Ok(())
    }
}

/// Numbers may arrive as JSON numbers or numeric strings
fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{event_channel, EventSource, InboundKind, ProcessEvent};
    use crate::files::PickKind;
    use crate::monitor::SocketEvent;
    use crate::supervisor::sweep_commands;
    use crate::testing::{Record, Recorder, RecordingConnector, RecordingSweeper};
    use crate::updater::ReleaseInfo;
    use freedata_common::{ProcessState, StreamKind};
    use serde_json::json;
    use tempfile::TempDir;

    struct FixedPicker(Option<PathBuf>);

    impl FilePicker for FixedPicker {
        fn pick(&self, _kind: &PickKind) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    struct Harness {
        shell: Shell,
        recorder: Recorder,
        sweeper: RecordingSweeper,
        connector: RecordingConnector,
        _resources: TempDir,
    }

    fn harness() -> Harness {
        let resources = TempDir::new().unwrap();
        let settings = ShellSettings {
            resources_dir: resources.path().to_path_buf(),
            splash_delay_ms: 0,
            check_for_updates: false,
            ..Default::default()
        };
        let recorder = Recorder::default();
        let sweeper = RecordingSweeper::default();
        let connector = RecordingConnector::default();
        let shell = Shell::new(
            settings,
            ConfigSnapshot::default(),
            "0.6.10",
            event_channel(),
            recorder.factory(),
        )
        .with_sweeper(Box::new(sweeper.clone()))
        .with_connector(Box::new(connector.clone()));

        Harness {
            shell,
            recorder,
            sweeper,
            connector,
            _resources: resources,
        }
    }

    fn inbound(kind: InboundKind, payload: Value) -> ShellEvent {
        ShellEvent::Inbound(InboundEvent::new(
            EventSource::Surface(SurfaceName::Main),
            kind,
            payload,
        ))
    }

    /// Handle queued events until `done` holds
    async fn drain_until(h: &mut Harness, done: impl Fn(&Recorder) -> bool) {
        while !done(&h.recorder) {
            let event = h.shell.next_event().await.unwrap();
            h.shell.handle(event);
        }
    }

    #[tokio::test]
    async fn test_startup_without_daemon() {
        let mut h = harness();
        h.shell.startup().unwrap();

        assert_eq!(h.shell.phase(), Phase::Running);
        assert_eq!(
            h.shell.supervisor().state(ProcessRole::Daemon),
            Some(ProcessState::NotFound)
        );
        assert!(h.shell.registry().is_visible(SurfaceName::Splash));
        for name in SurfaceName::PRIMARY {
            assert!(h.shell.registry().contains(name));
            assert!(!h.shell.registry().is_visible(name));
        }
        assert_eq!(
            h.recorder.delivered_to(SurfaceName::Main),
            vec![("action-set-app-version".to_string(), json!("0.6.10"))]
        );

        let event = h.shell.next_event().await.unwrap();
        assert!(matches!(event, ShellEvent::SplashElapsed));
        h.shell.handle(event);

        assert!(!h.shell.registry().contains(SurfaceName::Splash));
        assert!(h.shell.registry().is_visible(SurfaceName::Main));
    }

    #[tokio::test]
    async fn test_tnc_state_reaches_main_and_mesh() {
        let mut h = harness();
        h.shell.startup().unwrap();

        h.shell
            .handle(inbound(InboundKind::UpdateTncState, json!({"tncState": "busy"})));

        assert_eq!(
            h.recorder.delivered_to(SurfaceName::Mesh),
            vec![("action-update-mesh-table".to_string(), json!({"tncState": "busy"}))]
        );
        assert!(h
            .recorder
            .delivered_to(SurfaceName::Main)
            .contains(&("action-update-tnc-state".to_string(), json!({"tncState": "busy"}))));
    }

    #[tokio::test]
    async fn test_set_config_broadcasts_and_replaces_snapshot() {
        let mut h = harness();
        h.shell.startup().unwrap();
        let before = h.shell.config();

        let mut config = freedata_common::default_settings();
        config.insert("theme".to_string(), json!("dark"));
        let payload = Value::Object(config);
        h.shell.handle(inbound(InboundKind::SetConfigGlobal, payload.clone()));

        assert_eq!(h.shell.config().get_str("theme").as_deref(), Some("dark"));
        assert_eq!(before.get_str("theme").as_deref(), Some("default"));
        for name in [SurfaceName::Main, SurfaceName::Chat] {
            assert!(h
                .recorder
                .delivered_to(name)
                .contains(&("update-config".to_string(), payload.clone())));
        }
        assert!(h.recorder.delivered_to(SurfaceName::Log).is_empty());
    }

    #[tokio::test]
    async fn test_set_config_rejects_non_object() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(inbound(InboundKind::SetConfigGlobal, json!("dark")));
        assert_eq!(h.shell.config().get_str("theme").as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_progress_bar_is_scaled() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(inbound(InboundKind::ShowProgressBar, json!(42)));
        assert!(h
            .recorder
            .records()
            .contains(&Record::Progress(SurfaceName::Main, 0.42)));
    }

    #[tokio::test]
    async fn test_log_close_hides_and_reopens_same_instance() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(inbound(InboundKind::OpenTncLog, Value::Null));
        let instance = h.shell.registry().instance_id(SurfaceName::Log);
        assert!(h.shell.registry().is_visible(SurfaceName::Log));

        h.shell.handle(ShellEvent::CloseRequested(SurfaceName::Log));
        assert!(!h.shell.registry().is_visible(SurfaceName::Log));
        assert_eq!(h.shell.phase(), Phase::Running);

        h.shell.handle(inbound(InboundKind::OpenTncLog, Value::Null));
        assert!(h.shell.registry().is_visible(SurfaceName::Log));
        assert_eq!(h.shell.registry().instance_id(SurfaceName::Log), instance);
        assert_eq!(h.recorder.created_count(SurfaceName::Log), 1);
    }

    #[tokio::test]
    async fn test_main_close_shuts_everything_down() {
        let mut h = harness();
        h.shell.startup().unwrap();

        h.shell.handle(ShellEvent::CloseRequested(SurfaceName::Main));

        assert_eq!(h.shell.phase(), Phase::Stopped);
        assert!(h.shell.registry().is_empty());
        for name in SurfaceName::PRIMARY {
            assert_eq!(h.recorder.destroyed_count(name), 1);
        }
        let platform = Platform::current();
        let mut expected = sweep_commands(ProcessRole::Daemon, platform);
        expected.extend(sweep_commands(ProcessRole::Rigctld, platform));
        assert_eq!(h.sweeper.commands(), expected);
    }

    #[tokio::test]
    async fn test_shutdown_runs_once() {
        let mut h = harness();
        h.shell.startup().unwrap();

        assert!(h.shell.shutdown(ShutdownReason::Signal));
        assert!(!h.shell.shutdown(ShutdownReason::AllSurfacesClosed));
        h.shell.handle(ShellEvent::Shutdown(ShutdownReason::MainClosed));

        for name in SurfaceName::PRIMARY {
            assert_eq!(h.recorder.destroyed_count(name), 1);
        }
    }

    #[tokio::test]
    async fn test_events_after_shutdown_are_dropped() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.shutdown(ShutdownReason::Signal);
        let before = h.recorder.records().len();

        h.shell
            .handle(inbound(InboundKind::NewMsgReceived, json!({"uuid": "1"})));
        h.shell.handle(ShellEvent::Process(ProcessEvent::Output {
            role: ProcessRole::Daemon,
            stream: StreamKind::Stderr,
            line: "late".to_string(),
        }));

        assert_eq!(h.recorder.records().len(), before);
    }

    #[tokio::test]
    async fn test_check_rigctld_uses_payload_and_notifies_main() {
        let mut h = harness();
        h.shell.startup().unwrap();

        h.shell.handle(inbound(
            InboundKind::CheckRigctld,
            json!({"ip": "192.168.1.20", "port": "4533"}),
        ));
        assert_eq!(
            h.connector.opened(),
            vec![(1, "192.168.1.20".to_string(), 4533)]
        );

        h.shell.handle(ShellEvent::Socket {
            socket_id: 1,
            event: SocketEvent::Connected,
        });
        assert!(h.recorder.delivered_to(SurfaceName::Main).contains(&(
            "action-check-rigctld".to_string(),
            json!({"state": "Connected", "active": true})
        )));
    }

    #[tokio::test]
    async fn test_stop_rigctld_sweeps() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(inbound(InboundKind::StopRigctld, Value::Null));
        assert_eq!(
            h.sweeper.commands(),
            sweep_commands(ProcessRole::Rigctld, Platform::current())
        );
    }

    #[tokio::test]
    async fn test_get_folder_path_replies_on_action() {
        let mut h = harness();
        h.shell = h
            .shell
            .with_picker(Arc::new(FixedPicker(Some(PathBuf::from("/tmp/received")))));
        h.shell.startup().unwrap();

        h.shell.handle(inbound(
            InboundKind::GetFolderPath,
            json!({"action": "return-received-files-folder"}),
        ));
        drain_until(&mut h, |r| {
            r.delivered_to(SurfaceName::Main)
                .iter()
                .any(|(name, _)| name == "return-received-files-folder")
        })
        .await;

        assert!(h.recorder.delivered_to(SurfaceName::Main).contains(&(
            "return-received-files-folder".to_string(),
            json!({"path": {"canceled": false, "filePaths": ["/tmp/received"]}})
        )));
    }

    #[tokio::test]
    async fn test_select_file_delivers_to_chat() {
        let files_dir = TempDir::new().unwrap();
        let path = files_dir.path().join("qso.txt");
        std::fs::write(&path, b"73").unwrap();

        let mut h = harness();
        h.shell = h.shell.with_picker(Arc::new(FixedPicker(Some(path))));
        h.shell.startup().unwrap();

        h.shell.handle(inbound(InboundKind::SelectFile, Value::Null));
        drain_until(&mut h, |r| !r.delivered_to(SurfaceName::Chat).is_empty()).await;

        assert_eq!(
            h.recorder.delivered_to(SurfaceName::Chat),
            vec![(
                "return-selected-files".to_string(),
                json!({"data": "73", "mime": "text/plain", "filename": "qso.txt"})
            )]
        );
    }

    #[tokio::test]
    async fn test_shared_folder_disabled_by_default() {
        let mut h = harness();
        h.shell.startup().unwrap();

        h.shell
            .handle(inbound(InboundKind::ReadFilesInFolder, json!({"folder": "."})));
        drain_until(&mut h, |r| !r.delivered_to(SurfaceName::Chat).is_empty()).await;

        assert_eq!(
            h.recorder.delivered_to(SurfaceName::Chat),
            vec![("return-shared-folder-files".to_string(), json!({"files": []}))]
        );
    }

    #[tokio::test]
    async fn test_restart_without_download_keeps_running() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(inbound(InboundKind::RestartAndInstall, Value::Null));
        assert_eq!(h.shell.phase(), Phase::Running);
        assert!(h.sweeper.commands().is_empty());
    }

    #[tokio::test]
    async fn test_restart_and_install_stops_processes_once() {
        let mut h = harness();
        h.shell.startup().unwrap();
        let installer = h._resources.path().join("missing-installer.AppImage");
        h.shell.handle(ShellEvent::Updater(UpdaterEvent::Downloaded {
            info: ReleaseInfo {
                version: "0.7.0".to_string(),
                release_name: None,
                release_notes: None,
                release_date: None,
                asset: None,
            },
            path: installer,
        }));

        h.shell.handle(inbound(InboundKind::RestartAndInstall, Value::Null));

        assert_eq!(h.shell.phase(), Phase::Stopped);
        let platform = Platform::current();
        let mut expected = sweep_commands(ProcessRole::Daemon, platform);
        expected.extend(sweep_commands(ProcessRole::Rigctld, platform));
        assert_eq!(h.sweeper.commands(), expected);
    }

    #[tokio::test]
    async fn test_updater_events_forwarded_to_main() {
        let mut h = harness();
        h.shell.startup().unwrap();
        h.shell.handle(ShellEvent::Updater(UpdaterEvent::Checking));
        assert!(h.recorder.delivered_to(SurfaceName::Main).contains(&(
            "action-updater".to_string(),
            json!({"status": "checking-for-update", "version": "0.6.10"})
        )));
    }
}
