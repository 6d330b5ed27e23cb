// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Event catalog and the shell's event queue types
//!
//! Inbound events arrive from UI surfaces under their historical wire names
//! (`request-update-tnc-state`, `select-file`, ...). They are parsed into the
//! typed [`InboundKind`] so the routing table can be matched exhaustively.

use freedata_common::{Error, ProcessRole, StreamKind, SurfaceName};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::mpsc;

use crate::files::PickRequest;
use crate::monitor::SocketEvent;
use crate::updater::UpdaterEvent;

/// Declares the inbound catalog: variant, wire name, and lookup helpers
macro_rules! inbound_catalog {
    ( $( $(#[$meta:meta])* $variant:ident => $wire:literal, )* ) => {
        /// Every event name a surface may send to the shell
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum InboundKind {
            $( $(#[$meta])* $variant, )*
        }

        impl InboundKind {
            /// The whole catalog in declaration order
            pub const ALL: &'static [InboundKind] = &[ $( InboundKind::$variant, )* ];

            /// Wire name used on the IPC channel
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( InboundKind::$variant => $wire, )*
                }
            }
        }

        impl FromStr for InboundKind {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(InboundKind::$variant), )*
                    other => Err(Error::UnknownEvent(other.to_string())),
                }
            }
        }
    };
}

inbound_catalog! {
    /// Replace the global config snapshot
    SetConfigGlobal => "set-config-global",
    /// Task bar progress, payload is a percentage
    ShowProgressBar => "request-show-electron-progressbar",
    ShowChatWindow => "request-show-chat-window",
    OpenTncLog => "request-open-tnc-log",
    OpenMeshModule => "request-open-mesh-module",

    // UI state relays
    ClearChatConnected => "request-clear-chat-connected",
    UpdateDbCleanSpinner => "request-update-dbclean-spinner",
    UpdateTncIp => "request-update-tnc-ip",
    UpdateDaemonIp => "request-update-daemon-ip",
    UpdateTncState => "request-update-tnc-state",
    UpdateDaemonState => "request-update-daemon-state",
    UpdateHamlibTest => "request-update-hamlib-test",
    UpdateTncConnection => "request-update-tnc-connection",
    UpdateDaemonConnection => "request-update-daemon-connection",
    RunTncCommand => "run-tnc-command",
    TncFecIsWriting => "tnc-fec-iswriting",
    UpdateRxBuffer => "request-update-rx-buffer",
    UpdateHeardStations => "request-update-heard-stations",

    // Chat relays
    NewMsgReceived => "request-new-msg-received",
    UpdateTransmissionStatus => "request-update-transmission-status",
    UpdateReceptionStatus => "request-update-reception-status",
    UpdateRxMsgBuffer => "request-update-rx-msg-buffer",
    /// Main asks chat whether there are unread messages
    UpdateUnreadMessages => "request-update-unread-messages",
    /// Chat answers main
    UpdateUnreadMessagesMain => "request-update-unread-messages-main",
    CleanDb => "request-clean-db",

    // File services
    GetFilePath => "get-file-path",
    GetFolderPath => "get-folder-path",
    OpenFolder => "open-folder",
    SelectFile => "select-file",
    SelectUserImage => "select-user-image",
    ReadFilesInFolder => "read-files-in-folder",
    SaveFileToFolder => "save-file-to-folder",

    // Protocol toasts
    FecToastIsWriting => "request-show-fec-toast-iswriting",
    CqToastTransmitting => "request-show-cq-toast-transmitting",
    CqToastReceived => "request-show-cq-toast-received",
    QrvToastTransmitting => "request-show-qrv-toast-transmitting",
    QrvToastReceived => "request-show-qrv-toast-received",
    BeaconToastTransmitting => "request-show-beacon-toast-transmitting",
    BeaconToastReceived => "request-show-beacon-toast-received",
    PingToastTransmitting => "request-show-ping-toast-transmitting",
    PingToastReceived => "request-show-ping-toast-received",
    PingToastReceivedAck => "request-show-ping-toast-received-ack",
    ArqToastDatachannelOpening => "request-show-arq-toast-datachannel-opening",
    ArqToastDatachannelWaiting => "request-show-arq-toast-datachannel-waiting",
    ArqToastDatachannelOpened => "request-show-arq-toast-datachannel-opened",
    ArqToastDatachannelReceivedOpener => "request-show-arq-toast-datachannel-received-opener",
    ArqToastTransmissionFailed => "request-show-arq-toast-transmission-failed",
    ArqToastTransmissionFailedVer => "request-show-arq-toast-transmission-failed-ver",
    ArqToastTransmissionReceiving => "request-show-arq-toast-transmission-receiving",
    ArqToastTransmissionReceived => "request-show-arq-toast-transmission-received",
    ArqToastTransmissionTransmitting => "request-show-arq-toast-transmission-transmitting",
    ArqToastTransmissionTransmitted => "request-show-arq-toast-transmission-transmitted",
    ArqToastSessionConnecting => "request-show-arq-toast-session-connecting",
    ArqToastSessionWaiting => "request-show-arq-toast-session-waiting",
    ArqToastSessionConnected => "request-show-arq-toast-session-connected",
    ArqToastSessionClose => "request-show-arq-toast-session-close",
    ArqToastSessionFailed => "request-show-arq-toast-session-failed",

    // Updater
    RestartAndInstall => "request-restart-and-install",

    // Rig control
    StartRigctld => "request-start-rigctld",
    StopRigctld => "request-stop-rigctld",
    CheckRigctld => "request-check-rigctld",
}

impl fmt::Display for InboundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an inbound event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Surface(SurfaceName),
    System,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Surface(name) => write!(f, "{}", name),
            EventSource::System => f.write_str("system"),
        }
    }
}

/// A named message from a surface or the shell itself
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub source: EventSource,
    pub kind: InboundKind,
    pub payload: Value,
}

impl InboundEvent {
    pub fn new(source: EventSource, kind: InboundKind, payload: Value) -> Self {
        Self {
            source,
            kind,
            payload,
        }
    }

    /// Parse a wire name; unknown names are an error for the caller to log
    pub fn parse(source: EventSource, name: &str, payload: Value) -> freedata_common::Result<Self> {
        Ok(Self::new(source, name.parse()?, payload))
    }
}

/// Outbound event names that are not plain route renames
pub mod outbound {
    pub const UPDATE_CONFIG: &str = "update-config";
    pub const UPDATE_LOG: &str = "action-update-log";
    pub const CHECK_RIGCTLD: &str = "action-check-rigctld";
    pub const SET_APP_VERSION: &str = "action-set-app-version";
    pub const UPDATER: &str = "action-updater";
    pub const SELECTED_FILES: &str = "return-selected-files";
    pub const SELECTED_USER_IMAGE: &str = "return-select-user-image";
    pub const SHARED_FOLDER_FILES: &str = "return-shared-folder-files";
}

/// A named message delivered to a surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    pub name: String,
    pub payload: Value,
}

impl OutboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Why the shell is shutting down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The main surface was closed
    MainClosed,
    /// No surface is left attached
    AllSurfacesClosed,
    /// The user asked to restart and install a downloaded update
    RestartForUpdate,
    /// SIGINT/SIGTERM or Ctrl+C
    Signal,
}

/// Output and exit notifications from supervised children
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Output {
        role: ProcessRole,
        stream: StreamKind,
        line: String,
    },
    Exited {
        role: ProcessRole,
        pid: Option<u32>,
        code: Option<i32>,
    },
}

/// Everything the shell's event loop processes
#[derive(Debug)]
pub enum ShellEvent {
    /// Event sent by a surface
    Inbound(InboundEvent),
    /// A surface asked for its window to close
    CloseRequested(SurfaceName),
    /// Child process output or exit
    Process(ProcessEvent),
    /// rigctld socket watcher report
    Socket { socket_id: u64, event: SocketEvent },
    /// Update checker progress
    Updater(UpdaterEvent),
    /// Splash grace delay elapsed
    SplashElapsed,
    /// A picker dialog finished (None when cancelled)
    Picked {
        request: PickRequest,
        path: Option<PathBuf>,
    },
    /// Result of background I/O, ready for delivery
    Deliver {
        target: SurfaceName,
        event: OutboundEvent,
    },
    /// Start the shutdown sequence
    Shutdown(ShutdownReason),
}

pub type EventSender = mpsc::UnboundedSender<ShellEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ShellEvent>;

/// Create the shell's event queue
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
