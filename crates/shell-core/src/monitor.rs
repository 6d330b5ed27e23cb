// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! rigctld connection monitor
//!
//! Each check that is not already connected allocates a new socket with a new
//! [`ConnectionState`]. Watchers report back through the event queue tagged
//! with their socket id, so reports from a superseded socket are recognized
//! and ignored.

use freedata_common::{RigctldStatus, SurfaceName};
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{outbound, EventSender, OutboundEvent, ShellEvent};

/// Default bound for one connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// What a socket watcher observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Connected,
    Error(String),
    Ended,
}

/// State of one socket instance; replaced, never mutated across sockets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub socket_id: Option<u64>,
    pub status: RigctldStatus,
    pub listeners_wired: bool,
}

/// Aborts the watcher task when dropped
#[derive(Debug, Default)]
pub struct SocketHandle {
    task: Option<JoinHandle<()>>,
}

impl SocketHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Handle with no task behind it
    pub fn detached() -> Self {
        Self::default()
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens a socket and wires exactly one watcher to it
pub trait Connector {
    fn open(&mut self, socket_id: u64, host: &str, port: u16) -> SocketHandle;
}

/// Plain TCP connect with a timeout; no data is exchanged
pub struct TcpConnector {
    events: EventSender,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(events: EventSender, timeout: Duration) -> Self {
        Self { events, timeout }
    }
}

impl Connector for TcpConnector {
    fn open(&mut self, socket_id: u64, host: &str, port: u16) -> SocketHandle {
        let events = self.events.clone();
        let timeout = self.timeout;
        let address = format!("{}:{}", host, port);

        let task = tokio::spawn(async move {
            let report = |event: SocketEvent| {
                let _ = events.send(ShellEvent::Socket { socket_id, event });
            };

            let mut stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    report(SocketEvent::Error(e.to_string()));
                    return;
                }
                Err(_) => {
                    report(SocketEvent::Error(format!(
                        "connect to {} timed out after {:?}",
                        address, timeout
                    )));
                    return;
                }
            };
            report(SocketEvent::Connected);

            // rigctld never talks first; we only wait for the close
            let mut buf = [0u8; 512];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) => {
                        report(SocketEvent::Ended);
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        report(SocketEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
        });

        SocketHandle::new(task)
    }
}

/// Outcome of a connectivity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Already connected, nothing done
    Reused,
    /// A new socket with this id is connecting
    Allocated(u64),
}

pub struct ConnectionMonitor {
    connector: Box<dyn Connector>,
    state: ConnectionState,
    handle: Option<SocketHandle>,
    handler_count: usize,
    next_socket_id: u64,
}

impl ConnectionMonitor {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            state: ConnectionState::default(),
            handle: None,
            handler_count: 0,
            next_socket_id: 1,
        }
    }

    /// Check rigctld connectivity, opening a fresh socket unless connected
    pub fn check(&mut self, host: &str, port: u16) -> CheckOutcome {
        if self.state.status.is_connected() && self.state.socket_id.is_some() {
            debug!("rigctld already connected, reusing socket {:?}", self.state.socket_id);
            return CheckOutcome::Reused;
        }

        let socket_id = self.next_socket_id;
        self.next_socket_id += 1;

        // the old watcher goes away with its handle
        self.handle = None;
        self.state = ConnectionState {
            socket_id: Some(socket_id),
            status: RigctldStatus::Unknown,
            listeners_wired: false,
        };

        debug!("Checking rigctld at {}:{} (socket {})", host, port, socket_id);
        self.handle = Some(self.connector.open(socket_id, host, port));
        self.handler_count = 1;
        self.state.listeners_wired = true;

        CheckOutcome::Allocated(socket_id)
    }

    /// Apply a watcher report; returns the notification for the main surface
    pub fn on_socket_event(&mut self, socket_id: u64, event: SocketEvent) -> Option<OutboundEvent> {
        if self.state.socket_id != Some(socket_id) {
            debug!("Ignoring {:?} from stale socket {}", event, socket_id);
            return None;
        }

        match event {
            SocketEvent::Connected => {
                info!("rigctld connected");
                self.state.status = RigctldStatus::Connected;
                Some(status_event(self.state.status))
            }
            SocketEvent::Error(e) => {
                warn!("rigctld connection error: {}", e);
                self.state.status = RigctldStatus::NotConnected;
                self.handle = None;
                self.handler_count = 0;
                Some(status_event(self.state.status))
            }
            SocketEvent::Ended => {
                info!("rigctld connection ended");
                self.state.status = RigctldStatus::NotConnected;
                None
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Watchers attached to the current socket
    pub fn handler_count(&self) -> usize {
        self.handler_count
    }

    pub fn sockets_allocated(&self) -> u64 {
        self.next_socket_id - 1
    }

    /// Surface the status notification goes to
    pub fn notify_target() -> SurfaceName {
        SurfaceName::Main
    }
}

fn status_event(status: RigctldStatus) -> OutboundEvent {
    OutboundEvent::new(
        outbound::CHECK_RIGCTLD,
        json!({ "state": status.label(), "active": status.is_connected() }),
    )
}
