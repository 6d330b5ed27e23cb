// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

// IPC bridge between the shell and UI surface processes
//
// Each surface process connects to the shell socket and attaches as a named
// surface. The registry's backends write to whichever client is attached;
// events to a surface without a client are dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use freedata_common::{ClientMessage, ShellMessage, SurfaceName};
use freedata_shell_core::{
    EventSender, EventSource, InboundEvent, OutboundEvent, ShellEvent, ShellSettings,
    ShutdownReason, SurfaceBackend, SurfaceError, SurfaceFactory, SurfaceSpec,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound for one JSON line; file payloads travel inline
const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;

struct Client {
    id: Uuid,
    tx: mpsc::UnboundedSender<ShellMessage>,
}

#[derive(Default)]
struct Slot {
    load: Option<ShellMessage>,
    visible: bool,
    client: Option<Client>,
}

impl Slot {
    fn push(&self, message: ShellMessage) -> bool {
        match &self.client {
            Some(client) => client.tx.send(message).is_ok(),
            None => false,
        }
    }
}

/// Surfaces known to the bridge and the clients attached to them
#[derive(Clone)]
pub struct IpcHub {
    slots: Arc<Mutex<HashMap<SurfaceName, Slot>>>,
    /// Set once a primary surface has attached
    armed: Arc<AtomicBool>,
    events: EventSender,
}

impl IpcHub {
    pub fn new(events: EventSender) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            armed: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<SurfaceName, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bind a client to a surface and replay its load and visibility
    fn attach(
        &self,
        name: SurfaceName,
        tx: mpsc::UnboundedSender<ShellMessage>,
    ) -> Option<Uuid> {
        let mut slots = self.slots();
        let slot = slots.get_mut(&name)?;

        if slot.client.is_some() {
            warn!("Surface {} already has a client, replacing it", name);
        }
        let id = Uuid::new_v4();
        slot.client = Some(Client { id, tx });

        if let Some(load) = slot.load.clone() {
            slot.push(load);
        }
        slot.push(ShellMessage::Visibility {
            visible: slot.visible,
        });
        if name != SurfaceName::Splash {
            self.armed.store(true, Ordering::SeqCst);
        }
        Some(id)
    }

    /// Drop a client; the last primary one leaving means every window is closed.
    ///
    /// The splash never counts, and nothing fires before a primary surface
    /// has attached at least once.
    fn detach(&self, name: SurfaceName, id: Uuid) {
        let remaining = {
            let mut slots = self.slots();
            if let Some(slot) = slots.get_mut(&name) {
                if slot.client.as_ref().is_some_and(|c| c.id == id) {
                    slot.client = None;
                }
            }
            slots
                .iter()
                .filter(|(name, s)| **name != SurfaceName::Splash && s.client.is_some())
                .count()
        };

        if name == SurfaceName::Splash || !self.armed.load(Ordering::SeqCst) {
            return;
        }
        if remaining == 0 {
            info!("Last surface client disconnected");
            let _ = self
                .events
                .send(ShellEvent::Shutdown(ShutdownReason::AllSurfacesClosed));
        }
    }

    pub fn attached_count(&self) -> usize {
        self.slots()
            .values()
            .filter(|s| s.client.is_some())
            .count()
    }
}

/// Creates an [`IpcSurface`] per registry surface
pub struct IpcSurfaceFactory {
    hub: IpcHub,
}

impl IpcSurfaceFactory {
    pub fn new(hub: IpcHub) -> Self {
        Self { hub }
    }
}

impl SurfaceFactory for IpcSurfaceFactory {
    fn create(&mut self, spec: &SurfaceSpec) -> Result<Box<dyn SurfaceBackend>, SurfaceError> {
        self.hub.slots().entry(spec.name).or_default();
        Ok(Box::new(IpcSurface {
            name: spec.name,
            hub: self.hub.clone(),
        }))
    }
}

pub struct IpcSurface {
    name: SurfaceName,
    hub: IpcHub,
}

impl IpcSurface {
    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> T) -> Result<T, SurfaceError> {
        let mut slots = self.hub.slots();
        let slot = slots
            .get_mut(&self.name)
            .ok_or(SurfaceError::Closed(self.name))?;
        Ok(f(slot))
    }
}

impl SurfaceBackend for IpcSurface {
    fn load(&mut self, spec: &SurfaceSpec) -> Result<(), SurfaceError> {
        let load = ShellMessage::Load {
            content: spec.content.clone(),
            preload: spec.preload.clone(),
            width: spec.geometry.width,
            height: spec.geometry.height,
            frameless: spec.geometry.frameless,
            menu_bar: false,
        };
        self.with_slot(|slot| {
            slot.push(load.clone());
            slot.load = Some(load);
        })
    }

    fn deliver(&mut self, event: &OutboundEvent) -> Result<(), SurfaceError> {
        let message = ShellMessage::Event {
            event: event.name.clone(),
            payload: event.payload.clone(),
        };
        if self.with_slot(|slot| slot.push(message))? {
            Ok(())
        } else {
            Err(SurfaceError::Detached(self.name))
        }
    }

    fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError> {
        self.with_slot(|slot| {
            slot.visible = visible;
            slot.push(ShellMessage::Visibility { visible });
        })
    }

    fn set_progress(&mut self, fraction: f64) -> Result<(), SurfaceError> {
        self.with_slot(|slot| {
            slot.push(ShellMessage::Progress { fraction });
        })
    }

    fn destroy(&mut self) {
        if let Some(slot) = self.hub.slots().remove(&self.name) {
            slot.push(ShellMessage::Destroy);
        }
    }
}

/// Serve one client connection until it closes
pub async fn serve_connection<S>(stream: S, hub: IpcHub)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    let (tx, mut rx) = mpsc::unbounded_channel::<ShellMessage>();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(line).await {
                debug!("Client write failed: {}", e);
                break;
            }
            if matches!(message, ShellMessage::Destroy) {
                break;
            }
        }
    });

    // first message must attach the connection to a surface
    let (surface, client_id) = match lines.next().await {
        Some(Ok(line)) => match serde_json::from_str::<ClientMessage>(&line) {
            Ok(ClientMessage::Attach { surface }) => match hub.attach(surface, tx) {
                Some(id) => (surface, id),
                None => {
                    warn!("Client tried to attach to unavailable surface {}", surface);
                    writer_task.abort();
                    return;
                }
            },
            Ok(other) => {
                warn!("Expected attach, got {:?}", other);
                writer_task.abort();
                return;
            }
            Err(e) => {
                warn!("Invalid attach message: {}", e);
                writer_task.abort();
                return;
            }
        },
        Some(Err(e)) => {
            debug!("Client closed before attaching: {}", e);
            writer_task.abort();
            return;
        }
        None => {
            writer_task.abort();
            return;
        }
    };
    info!("Surface {} attached ({})", surface, client_id);

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Read from surface {} failed: {}", surface, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<ClientMessage>(&line) {
            Ok(ClientMessage::Event { event, payload }) => {
                match InboundEvent::parse(EventSource::Surface(surface), &event, payload) {
                    Ok(inbound) => ShellEvent::Inbound(inbound),
                    Err(e) => {
                        warn!("Surface {} sent {}", surface, e);
                        continue;
                    }
                }
            }
            Ok(ClientMessage::CloseRequested) => ShellEvent::CloseRequested(surface),
            Ok(ClientMessage::Attach { .. }) => {
                warn!("Surface {} is already attached", surface);
                continue;
            }
            Err(e) => {
                warn!("Invalid message from surface {}: {}", surface, e);
                continue;
            }
        };

        if hub.events.send(event).is_err() {
            debug!("Shell event loop gone");
            break;
        }
    }

    info!("Surface {} detached ({})", surface, client_id);
    hub.detach(surface, client_id);
}

/// Listening socket for surface clients
pub enum IpcListener {
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        path: PathBuf,
    },
    Tcp(tokio::net::TcpListener),
}

impl IpcListener {
    /// Bind the Unix socket (or loopback TCP where Unix sockets are unavailable)
    pub async fn bind(settings: &ShellSettings) -> Result<Self> {
        #[cfg(unix)]
        {
            let path = settings.ipc_socket.clone();
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove existing socket file")?;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
            }
            let listener = tokio::net::UnixListener::bind(&path)
                .with_context(|| format!("Failed to bind to socket: {}", path.display()))?;
            info!("Surfaces attach on Unix socket: {}", path.display());
            Ok(IpcListener::Unix { listener, path })
        }

        #[cfg(not(unix))]
        {
            let address = format!("127.0.0.1:{}", settings.ipc_tcp_port);
            let listener = tokio::net::TcpListener::bind(&address)
                .await
                .with_context(|| format!("Failed to bind to {}", address))?;
            info!("Surfaces attach on TCP: {}", address);
            Ok(IpcListener::Tcp(listener))
        }
    }

    /// Socket file to remove on exit, if any
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            #[cfg(unix)]
            IpcListener::Unix { path, .. } => Some(path),
            IpcListener::Tcp(_) => None,
        }
    }

    /// Accept clients until the task is aborted
    pub fn spawn(self, hub: IpcHub) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match &self {
                    #[cfg(unix)]
                    IpcListener::Unix { listener, .. } => match listener.accept().await {
                        Ok((stream, _addr)) => {
                            tokio::spawn(serve_connection(stream, hub.clone()));
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    },
                    IpcListener::Tcp(listener) => match listener.accept().await {
                        Ok((stream, addr)) => {
                            if !addr.ip().is_loopback() {
                                warn!("Rejecting non-loopback client {}", addr);
                                continue;
                            }
                            tokio::spawn(serve_connection(stream, hub.clone()));
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    },
                }
            }
        })
    }
}

/// Remove the socket file left by [`IpcListener::bind`]
pub fn cleanup_socket(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
