// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Process supervisor for the FreeDATA daemon and rigctld
//!
//! Children are spawned with piped output. One task per stream forwards
//! lines into the shell's event queue, one waiter task per child reports the
//! exit. Stopping a role is a two-step protocol: terminate the tracked handle,
//! then sweep the OS for leftover instances by name. Both steps always run,
//! and both are issued before `stop` returns so a runtime torn down right
//! after shutdown still delivers them.

use freedata_common::{Platform, ProcessRole, ProcessState, StreamKind, SurfaceName};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::events::{outbound, EventSender, OutboundEvent, ProcessEvent, ShellEvent};
use crate::registry::WindowRegistry;

/// How long a terminated child gets before the waiter force-kills it
#[cfg(unix)]
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
#[cfg(not(unix))]
const TERMINATE_GRACE: Duration = Duration::ZERO;

/// Resolve the packaged binary for a role.
///
/// Returns `None` when the file does not exist, which is the normal case in
/// a development checkout.
pub fn locate_binary(role: ProcessRole, platform: Platform, resources_dir: &Path) -> Option<PathBuf> {
    let path = resources_dir
        .join("tnc")
        .join(platform.binary_file_name(role));
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// One OS-level kill command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

/// Name-based force-kill commands for a role on a platform
pub fn sweep_commands(role: ProcessRole, platform: Platform) -> Vec<SweepCommand> {
    role.sweep_names()
        .iter()
        .filter_map(|name| match platform {
            Platform::Windows => Some(SweepCommand {
                program: "taskkill",
                args: vec!["/IM".to_string(), format!("{}.exe", name), "/F".to_string()],
            }),
            Platform::Linux | Platform::MacOs => Some(SweepCommand {
                program: "pkill",
                args: vec!["-9".to_string(), name.to_string()],
            }),
            Platform::Other => None,
        })
        .collect()
}

/// Runs sweep commands
pub trait ProcessSweeper {
    fn sweep(&self, command: &SweepCommand) -> std::io::Result<()>;
}

/// Spawns the sweep commands without waiting for them
#[derive(Debug, Default)]
pub struct OsSweeper;

impl ProcessSweeper for OsSweeper {
    fn sweep(&self, command: &SweepCommand) -> std::io::Result<()> {
        let mut child = Command::new(command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let label = format!("{} {}", command.program, command.args.join(" "));
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Sweep `{}` finished: {}", label, status),
                Err(e) => debug!("Sweep `{}` not awaited: {}", label, e),
            }
        });
        Ok(())
    }
}

/// A supervised child process
#[derive(Debug)]
pub struct ManagedProcess {
    pub role: ProcessRole,
    pub binary_path: Option<PathBuf>,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    /// Last spawn error, if any
    pub last_error: Option<String>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ManagedProcess {
    fn new(role: ProcessRole, binary_path: Option<PathBuf>, state: ProcessState) -> Self {
        Self {
            role,
            binary_path,
            pid: None,
            state,
            exit_code: None,
            last_error: None,
            kill_tx: None,
        }
    }
}

/// Spawns, tracks and stops the daemon and helper processes
pub struct ProcessSupervisor {
    platform: Platform,
    events: EventSender,
    sweeper: Box<dyn ProcessSweeper>,
    processes: HashMap<ProcessRole, ManagedProcess>,
}

impl ProcessSupervisor {
    pub fn new(platform: Platform, events: EventSender, sweeper: Box<dyn ProcessSweeper>) -> Self {
        Self {
            platform,
            events,
            sweeper,
            processes: HashMap::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn process(&self, role: ProcessRole) -> Option<&ManagedProcess> {
        self.processes.get(&role)
    }

    pub fn state(&self, role: ProcessRole) -> Option<ProcessState> {
        self.processes.get(&role).map(|p| p.state)
    }

    /// Record that a role's binary is absent; not an error
    pub fn mark_not_found(&mut self, role: ProcessRole) {
        self.processes
            .insert(role, ManagedProcess::new(role, None, ProcessState::NotFound));
    }

    /// Spawn a role's binary.
    ///
    /// A live process for the role is kept and returned unchanged. A spawn
    /// failure is logged and leaves the role in `NotFound`.
    pub fn start(
        &mut self,
        role: ProcessRole,
        path: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> &ManagedProcess {
        if self.processes.get(&role).is_some_and(|p| p.state.is_live()) {
            warn!("{} is already running, not starting a second instance", role);
            return &self.processes[&role];
        }

        info!("Starting {} binary: {}", role, path.display());
        let mut command = Command::new(path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut record = ManagedProcess::new(role, Some(path.to_path_buf()), ProcessState::Starting);
        match command.spawn() {
            Ok(mut child) => {
                record.pid = child.id();
                if let Some(stdout) = child.stdout.take() {
                    forward_lines(role, StreamKind::Stdout, stdout, self.events.clone());
                }
                if let Some(stderr) = child.stderr.take() {
                    forward_lines(role, StreamKind::Stderr, stderr, self.events.clone());
                }

                let (kill_tx, kill_rx) = oneshot::channel();
                record.kill_tx = Some(kill_tx);
                watch_exit(role, child, kill_rx, self.events.clone());

                record.state = ProcessState::Running;
                info!("{} started with pid {:?}", role, record.pid);
            }
            Err(e) => {
                error!("Error when starting {}: {}", role, e);
                record.state = ProcessState::NotFound;
                record.last_error = Some(e.to_string());
            }
        }

        self.processes.insert(role, record);
        &self.processes[&role]
    }

    /// Stop a role: terminate the tracked handle, then sweep by name.
    ///
    /// Failures of either step are logged and never returned.
    pub fn stop(&mut self, role: ProcessRole) {
        warn!("Closing {}", role);

        match self.processes.get_mut(&role) {
            Some(process) => {
                if process.state.is_live() {
                    if let Some(pid) = process.pid {
                        if let Err(e) = terminate_pid(pid) {
                            warn!("Terminate of {} (pid {}) failed: {}", role, pid, e);
                        }
                    }
                }
                if let Some(kill_tx) = process.kill_tx.take() {
                    if kill_tx.send(()).is_err() {
                        debug!("{} waiter already finished", role);
                    }
                }
                if process.state.is_live() {
                    process.state = ProcessState::Exited;
                }
            }
            None => debug!("No tracked handle for {}", role),
        }

        for command in sweep_commands(role, self.platform) {
            if let Err(e) = self.sweeper.sweep(&command) {
                error!(
                    "Sweep `{} {}` failed: {}",
                    command.program,
                    command.args.join(" "),
                    e
                );
            }
        }
    }

    /// Stop every role, tracked or not
    pub fn stop_all(&mut self) {
        warn!("Closing sub processes");
        for role in ProcessRole::ALL {
            self.stop(role);
        }
    }

    /// Apply a process event: log output, mirror stderr to the log surface,
    /// record exits.
    pub fn ingest(&mut self, event: ProcessEvent, registry: &mut WindowRegistry) {
        match event {
            ProcessEvent::Output { role, stream, line } => {
                info!(process = %role, stream = ?stream, "{}", line);
                if stream == StreamKind::Stderr {
                    let entry = OutboundEvent::new(outbound::UPDATE_LOG, json!({ "entry": line }));
                    registry.send(SurfaceName::Log, &entry);
                }
            }
            ProcessEvent::Exited { role, pid, code } => self.on_exit(role, pid, code),
        }
    }

    fn on_exit(&mut self, role: ProcessRole, pid: Option<u32>, code: Option<i32>) {
        let Some(process) = self.processes.get_mut(&role) else {
            debug!("Exit of untracked {} ignored", role);
            return;
        };
        if process.pid != pid {
            debug!("Exit of superseded {} (pid {:?}) ignored", role, pid);
            return;
        }

        process.state = ProcessState::Exited;
        process.exit_code = code;
        process.kill_tx = None;
        match code {
            Some(code) => warn!("{} exited with code {}", role, code),
            None => warn!("{} exited by signal", role),
        }
    }
}

/// Forward each line of a child stream to the event queue
fn forward_lines<R>(role: ProcessRole, stream: StreamKind, reader: R, events: EventSender)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let event = ProcessEvent::Output { role, stream, line };
                    if events.send(ShellEvent::Process(event)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Error reading {} {:?}: {}", role, stream, e);
                    break;
                }
            }
        }
    });
}

/// Wait for the child to exit or for a kill request, then report the exit.
///
/// The terminate signal is sent by `stop` itself. After a kill request the
/// child gets `TERMINATE_GRACE` to exit before it is force-killed.
fn watch_exit(role: ProcessRole, mut child: Child, mut kill_rx: oneshot::Receiver<()>, events: EventSender) {
    tokio::spawn(async move {
        let pid = child.id();
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            Ok(()) = &mut kill_rx => None,
        };

        let status = match waited {
            Some(status) => status,
            None => match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    debug!("{} still running after terminate, killing", role);
                    if let Err(e) = child.start_kill() {
                        warn!("Kill of {} failed: {}", role, e);
                    }
                    child.wait().await
                }
            },
        };

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                debug!("Failed to wait for {}: {}", role, e);
                None
            }
        };
        let _ = events.send(ShellEvent::Process(ProcessEvent::Exited { role, pid, code }));
    });
}

#[cfg(unix)]
fn terminate_pid(pid: u32) -> std::io::Result<()> {
    // SIGTERM lets the daemon close its audio and TNC children
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate_pid(pid: u32) -> std::io::Result<()> {
    std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::testing::{registry_with_primaries, Recorder, RecordingSweeper};
    use tempfile::TempDir;

    #[test]
    fn test_locate_binary_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(locate_binary(ProcessRole::Daemon, Platform::Linux, dir.path()), None);
    }

    #[test]
    fn test_locate_binary_per_platform() {
        let dir = TempDir::new().unwrap();
        let tnc = dir.path().join("tnc");
        std::fs::create_dir_all(&tnc).unwrap();
        std::fs::write(tnc.join("freedata-daemon.exe"), b"").unwrap();

        assert_eq!(
            locate_binary(ProcessRole::Daemon, Platform::Windows, dir.path()),
            Some(tnc.join("freedata-daemon.exe"))
        );
        assert_eq!(locate_binary(ProcessRole::Daemon, Platform::Linux, dir.path()), None);
    }

    #[test]
    fn test_sweep_commands() {
        assert_eq!(
            sweep_commands(ProcessRole::Daemon, Platform::Linux),
            vec![
                SweepCommand {
                    program: "pkill",
                    args: vec!["-9".to_string(), "freedata-tnc".to_string()],
                },
                SweepCommand {
                    program: "pkill",
                    args: vec!["-9".to_string(), "freedata-daemon".to_string()],
                },
            ]
        );
        assert_eq!(
            sweep_commands(ProcessRole::Rigctld, Platform::Windows),
            vec![SweepCommand {
                program: "taskkill",
                args: vec!["/IM".to_string(), "rigctld.exe".to_string(), "/F".to_string()],
            }]
        );
        assert!(sweep_commands(ProcessRole::Rigctld, Platform::Other).is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_handle_still_sweeps() {
        let (tx, _rx) = event_channel();
        let sweeper = RecordingSweeper::failing();
        let mut supervisor = ProcessSupervisor::new(Platform::Linux, tx, Box::new(sweeper.clone()));

        supervisor.stop(ProcessRole::Daemon);
        supervisor.stop_all();

        // 2 for the daemon, then 2 + 1 from stop_all, failures do not short-circuit
        assert_eq!(sweeper.commands().len(), 5);
    }

    #[tokio::test]
    async fn test_spawn_failure_records_not_found() {
        let (tx, _rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        let dir = TempDir::new().unwrap();

        let process = supervisor.start(
            ProcessRole::Rigctld,
            &dir.path().join("missing-rigctld"),
            &[],
            None,
        );

        assert_eq!(process.state, ProcessState::NotFound);
        assert!(process.last_error.is_some());
        assert!(process.pid.is_none());
    }

    #[test]
    fn test_mark_not_found() {
        let (tx, _rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        supervisor.mark_not_found(ProcessRole::Daemon);
        assert_eq!(supervisor.state(ProcessRole::Daemon), Some(ProcessState::NotFound));
        assert!(supervisor.process(ProcessRole::Daemon).unwrap().last_error.is_none());
    }

    #[test]
    fn test_stderr_is_mirrored_to_log_surface() {
        let (tx, _rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);

        supervisor.ingest(
            ProcessEvent::Output {
                role: ProcessRole::Daemon,
                stream: StreamKind::Stdout,
                line: "stdout only".to_string(),
            },
            &mut registry,
        );
        supervisor.ingest(
            ProcessEvent::Output {
                role: ProcessRole::Daemon,
                stream: StreamKind::Stderr,
                line: "[DMN] started".to_string(),
            },
            &mut registry,
        );

        assert_eq!(
            recorder.delivered(),
            vec![(
                SurfaceName::Log,
                "action-update-log".to_string(),
                json!({"entry": "[DMN] started"})
            )]
        );
    }

    #[test]
    fn test_stderr_after_log_destroyed_is_swallowed() {
        let (tx, _rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);
        registry.destroy_all();

        supervisor.ingest(
            ProcessEvent::Output {
                role: ProcessRole::Daemon,
                stream: StreamKind::Stderr,
                line: "late line".to_string(),
            },
            &mut registry,
        );

        assert!(recorder.delivered().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_output_and_exit_are_reported() {
        let (tx, mut rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);

        let args = vec![
            "-c".to_string(),
            "echo hello; echo oops 1>&2; exit 3".to_string(),
        ];
        let state = supervisor
            .start(ProcessRole::Daemon, Path::new("/bin/sh"), &args, None)
            .state;
        assert_eq!(state, ProcessState::Running);

        let mut lines = Vec::new();
        let mut exit_code = None;
        while let Some(event) = rx.recv().await {
            if let ShellEvent::Process(event) = event {
                match &event {
                    ProcessEvent::Output { line, .. } => lines.push(line.clone()),
                    ProcessEvent::Exited { code, .. } => exit_code = Some(*code),
                }
                supervisor.ingest(event, &mut registry);
            }
            if exit_code.is_some() && lines.len() == 2 {
                break;
            }
        }

        assert!(lines.contains(&"hello".to_string()));
        assert!(lines.contains(&"oops".to_string()));
        assert_eq!(exit_code, Some(Some(3)));
        let process = supervisor.process(ProcessRole::Daemon).unwrap();
        assert_eq!(process.state, ProcessState::Exited);
        assert_eq!(process.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_second_start_keeps_live_process() {
        let (tx, mut rx) = event_channel();
        let mut supervisor =
            ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
        let args = vec!["-c".to_string(), "sleep 30".to_string()];

        let first = supervisor
            .start(ProcessRole::Rigctld, Path::new("/bin/sh"), &args, None)
            .pid;
        let second = supervisor
            .start(ProcessRole::Rigctld, Path::new("/bin/sh"), &args, None)
            .pid;
        assert_eq!(first, second);

        supervisor.stop(ProcessRole::Rigctld);
        assert_eq!(supervisor.state(ProcessRole::Rigctld), Some(ProcessState::Exited));

        // the waiter reports the terminated child
        loop {
            match rx.recv().await {
                Some(ShellEvent::Process(ProcessEvent::Exited { pid, .. })) => {
                    assert_eq!(pid, first);
                    break;
                }
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    /// Process state letter from /proc, `None` once the pid is gone
    #[cfg(target_os = "linux")]
    fn proc_state(pid: u32) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        let after_name = stat.rsplit_once(')')?.1;
        after_name.trim_start().chars().next()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stop_terminates_before_runtime_exits() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let pid = runtime.block_on(async {
            let (tx, _rx) = event_channel();
            let mut supervisor =
                ProcessSupervisor::new(Platform::Linux, tx, Box::new(RecordingSweeper::default()));
            let pid = supervisor
                .start(
                    ProcessRole::Daemon,
                    Path::new("/bin/sleep"),
                    &["30".to_string()],
                    None,
                )
                .pid
                .unwrap();
            supervisor.stop(ProcessRole::Daemon);
            pid
        });
        // no await point between stop and teardown, the waiter never runs
        drop(runtime);

        let mut state = proc_state(pid);
        for _ in 0..50 {
            if matches!(state, None | Some('Z')) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
            state = proc_state(pid);
        }
        assert!(matches!(state, None | Some('Z')), "pid {} state {:?}", pid, state);
    }
}
