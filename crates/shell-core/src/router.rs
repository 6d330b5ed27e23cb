// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Static routing table and relay dispatch
//!
//! Every [`InboundKind`] maps either to a list of relay routes (deliver the
//! payload unchanged to one or more surfaces, usually renaming `request-*` to
//! `action-*`) or to a [`Command`] the lifecycle coordinator executes.

use freedata_common::SurfaceName;
use tracing::{debug, trace};

use crate::events::{InboundEvent, InboundKind, OutboundEvent};
use crate::registry::WindowRegistry;

/// One relay target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub target: SurfaceName,
    /// Outbound event name delivered to the target
    pub event: &'static str,
}

// Struct literals keep the slices below promotable to 'static
macro_rules! route {
    ($target:expr, $event:literal) => {
        Route {
            target: $target,
            event: $event,
        }
    };
}

/// File-service operation requested by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCommand {
    /// `get-file-path`: pick a file, reply on the caller's action name
    PickFilePath,
    /// `get-folder-path`: pick a folder, reply on the caller's action name
    PickFolderPath,
    /// Reveal a path in the OS file manager
    OpenFolder,
    /// Pick and read an attachment for chat
    SelectFile,
    /// Pick and read a profile image for chat
    SelectUserImage,
    /// List the shared folder for chat
    ReadSharedFolder,
    /// Ask for a destination and write a received file
    SaveFile,
}

/// Inbound events handled by the shell instead of relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetConfig,
    SetProgress,
    ShowSurface(SurfaceName),
    File(FileCommand),
    RestartAndInstall,
    StartRigctld,
    StopRigctld,
    CheckRigctld,
}

/// What to do with an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Relay(&'static [Route]),
    Command(Command),
}

use SurfaceName::{Chat, Main, Mesh};

const TNC_STATE: &[Route] = &[
    route!(Main, "action-update-tnc-state"),
    route!(Mesh, "action-update-mesh-table"),
];
const TRANSMISSION_STATUS: &[Route] = &[
    route!(Chat, "action-update-transmission-status"),
    route!(Main, "action-update-transmission-status"),
];
const RECEPTION_STATUS: &[Route] = &[
    route!(Main, "action-update-reception-status"),
    route!(Chat, "action-update-reception-status"),
];
const FEC_IS_WRITING: &[Route] = &[
    route!(Main, "action-show-fec-toast-iswriting"),
    route!(Chat, "action-show-feciswriting"),
];

/// Look up the dispatch rule for an inbound kind
pub fn dispatch_for(kind: InboundKind) -> Dispatch {
    use InboundKind::*;

    let routes: &'static [Route] = match kind {
        SetConfigGlobal => return Dispatch::Command(Command::SetConfig),
        ShowProgressBar => return Dispatch::Command(Command::SetProgress),
        ShowChatWindow => return Dispatch::Command(Command::ShowSurface(Chat)),
        OpenTncLog => return Dispatch::Command(Command::ShowSurface(SurfaceName::Log)),
        OpenMeshModule => return Dispatch::Command(Command::ShowSurface(Mesh)),
        GetFilePath => return Dispatch::Command(Command::File(FileCommand::PickFilePath)),
        GetFolderPath => return Dispatch::Command(Command::File(FileCommand::PickFolderPath)),
        OpenFolder => return Dispatch::Command(Command::File(FileCommand::OpenFolder)),
        SelectFile => return Dispatch::Command(Command::File(FileCommand::SelectFile)),
        SelectUserImage => return Dispatch::Command(Command::File(FileCommand::SelectUserImage)),
        ReadFilesInFolder => return Dispatch::Command(Command::File(FileCommand::ReadSharedFolder)),
        SaveFileToFolder => return Dispatch::Command(Command::File(FileCommand::SaveFile)),
        RestartAndInstall => return Dispatch::Command(Command::RestartAndInstall),
        StartRigctld => return Dispatch::Command(Command::StartRigctld),
        StopRigctld => return Dispatch::Command(Command::StopRigctld),
        CheckRigctld => return Dispatch::Command(Command::CheckRigctld),

        UpdateTncState => TNC_STATE,
        UpdateTransmissionStatus => TRANSMISSION_STATUS,
        UpdateReceptionStatus => RECEPTION_STATUS,
        FecToastIsWriting => FEC_IS_WRITING,

        ClearChatConnected => &[route!(Chat, "action-clear-reception-status")],
        NewMsgReceived => &[route!(Chat, "action-new-msg-received")],
        UpdateRxMsgBuffer => &[route!(Chat, "action-update-rx-msg-buffer")],
        UpdateUnreadMessages => &[route!(Chat, "action-update-unread-messages")],
        CleanDb => &[route!(Chat, "action-clean-db")],

        UpdateDbCleanSpinner => &[route!(Main, "action-update-dbclean-spinner")],
        UpdateTncIp => &[route!(Main, "action-update-tnc-ip")],
        UpdateDaemonIp => &[route!(Main, "action-update-daemon-ip")],
        UpdateDaemonState => &[route!(Main, "action-update-daemon-state")],
        UpdateHamlibTest => &[route!(Main, "action-update-hamlib-test")],
        UpdateTncConnection => &[route!(Main, "action-update-tnc-connection")],
        UpdateDaemonConnection => &[route!(Main, "action-update-daemon-connection")],
        RunTncCommand => &[route!(Main, "run-tnc-command")],
        TncFecIsWriting => &[route!(Main, "run-tnc-command-fec-iswriting")],
        UpdateRxBuffer => &[route!(Main, "action-update-rx-buffer")],
        UpdateHeardStations => &[route!(Main, "action-update-heard-stations")],
        UpdateUnreadMessagesMain => &[route!(Main, "action-update-unread-messages-main")],

        CqToastTransmitting => &[route!(Main, "action-show-cq-toast-transmitting")],
        CqToastReceived => &[route!(Main, "action-show-cq-toast-received")],
        QrvToastTransmitting => &[route!(Main, "action-show-qrv-toast-transmitting")],
        QrvToastReceived => &[route!(Main, "action-show-qrv-toast-received")],
        BeaconToastTransmitting => &[route!(Main, "action-show-beacon-toast-transmitting")],
        BeaconToastReceived => &[route!(Main, "action-show-beacon-toast-received")],
        PingToastTransmitting => &[route!(Main, "action-show-ping-toast-transmitting")],
        PingToastReceived => &[route!(Main, "action-show-ping-toast-received")],
        PingToastReceivedAck => &[route!(Main, "action-show-ping-toast-received-ack")],
        ArqToastDatachannelOpening => {
            &[route!(Main, "action-show-arq-toast-datachannel-opening")]
        }
        ArqToastDatachannelWaiting => {
            &[route!(Main, "action-show-arq-toast-datachannel-waiting")]
        }
        ArqToastDatachannelOpened => &[route!(Main, "action-show-arq-toast-datachannel-opened")],
        ArqToastDatachannelReceivedOpener => {
            &[route!(Main, "action-show-arq-toast-datachannel-received-opener")]
        }
        ArqToastTransmissionFailed => {
            &[route!(Main, "action-show-arq-toast-transmission-failed")]
        }
        ArqToastTransmissionFailedVer => {
            &[route!(Main, "action-show-arq-toast-transmission-failed-ver")]
        }
        ArqToastTransmissionReceiving => {
            &[route!(Main, "action-show-arq-toast-transmission-receiving")]
        }
        ArqToastTransmissionReceived => {
            &[route!(Main, "action-show-arq-toast-transmission-received")]
        }
        ArqToastTransmissionTransmitting => {
            &[route!(Main, "action-show-arq-toast-transmission-transmitting")]
        }
        ArqToastTransmissionTransmitted => {
            &[route!(Main, "action-show-arq-toast-transmission-transmitted")]
        }
        ArqToastSessionConnecting => &[route!(Main, "action-show-arq-toast-session-connecting")],
        ArqToastSessionWaiting => &[route!(Main, "action-show-arq-toast-session-waiting")],
        ArqToastSessionConnected => &[route!(Main, "action-show-arq-toast-session-connected")],
        ArqToastSessionClose => &[route!(Main, "action-show-arq-toast-session-close")],
        ArqToastSessionFailed => &[route!(Main, "action-show-arq-toast-session-failed")],
    };

    Dispatch::Relay(routes)
}

/// Result of relaying one inbound event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

/// Relays inbound events through the static table
#[derive(Debug, Default)]
pub struct MessageRouter {
    delivered_total: u64,
    dropped_total: u64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relay an event to its routes.
    ///
    /// Returns `None` for events that map to a [`Command`]; those are left to
    /// the caller. Delivery to a missing surface counts as dropped.
    pub fn relay(
        &mut self,
        event: &InboundEvent,
        registry: &mut WindowRegistry,
    ) -> Option<RelayOutcome> {
        let routes = match dispatch_for(event.kind) {
            Dispatch::Relay(routes) => routes,
            Dispatch::Command(_) => return None,
        };

        let mut outcome = RelayOutcome::default();
        for route in routes {
            let outbound = OutboundEvent::new(route.event, event.payload.clone());
            if registry.send(route.target, &outbound) {
                outcome.delivered += 1;
            } else {
                outcome.dropped += 1;
            }
        }

        self.delivered_total += outcome.delivered as u64;
        self.dropped_total += outcome.dropped as u64;

        if outcome.dropped > 0 {
            debug!(
                "{} from {}: {} delivered, {} dropped",
                event.kind, event.source, outcome.delivered, outcome.dropped
            );
        } else {
            trace!("{} from {} relayed to {} surface(s)", event.kind, event.source, outcome.delivered);
        }

        Some(outcome)
    }

    /// Deliveries since startup
    pub fn delivered_total(&self) -> u64 {
        self.delivered_total
    }

    /// Drops since startup
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSource;
    use crate::testing::{registry_with_primaries, Recorder};
    use serde_json::json;

    fn relay_routes(kind: InboundKind) -> &'static [Route] {
        match dispatch_for(kind) {
            Dispatch::Relay(routes) => routes,
            Dispatch::Command(cmd) => panic!("{} is a command: {:?}", kind, cmd),
        }
    }

    #[test]
    fn test_every_relay_has_a_target() {
        for kind in InboundKind::ALL {
            if let Dispatch::Relay(routes) = dispatch_for(*kind) {
                assert!(!routes.is_empty(), "{} has no routes", kind);
            }
        }
    }

    #[test]
    fn test_request_prefix_becomes_action() {
        // renames that do not follow the request-/action- convention
        let irregular = [
            "action-update-mesh-table",
            "action-show-feciswriting",
            "action-clear-reception-status",
            "run-tnc-command",
            "run-tnc-command-fec-iswriting",
        ];
        for kind in InboundKind::ALL {
            if let Dispatch::Relay(routes) = dispatch_for(*kind) {
                for route in routes {
                    if irregular.contains(&route.event) {
                        continue;
                    }
                    let expected = kind.as_str().replacen("request-", "action-", 1);
                    assert_eq!(route.event, expected, "route for {}", kind);
                }
            }
        }
    }

    #[test]
    fn test_toasts_go_to_main_only() {
        for kind in InboundKind::ALL {
            let name = kind.as_str();
            if !name.contains("-toast-") || *kind == InboundKind::FecToastIsWriting {
                continue;
            }
            let routes = relay_routes(*kind);
            assert_eq!(routes.len(), 1, "{}", name);
            assert_eq!(routes[0].target, SurfaceName::Main, "{}", name);
        }
    }

    #[test]
    fn test_chat_relevant_events_fan_out() {
        let targets: Vec<_> = relay_routes(InboundKind::UpdateTransmissionStatus)
            .iter()
            .map(|r| r.target)
            .collect();
        assert!(targets.contains(&SurfaceName::Main));
        assert!(targets.contains(&SurfaceName::Chat));

        let targets: Vec<_> = relay_routes(InboundKind::NewMsgReceived)
            .iter()
            .map(|r| r.target)
            .collect();
        assert_eq!(targets, vec![SurfaceName::Chat]);
    }

    #[test]
    fn test_station_and_buffer_relays() {
        assert_eq!(
            relay_routes("request-update-heard-stations".parse().unwrap()),
            &[route!(Main, "action-update-heard-stations")]
        );
        assert_eq!(
            relay_routes("request-update-rx-msg-buffer".parse().unwrap()),
            &[route!(Chat, "action-update-rx-msg-buffer")]
        );
    }

    #[test]
    fn test_window_requests_are_commands() {
        assert_eq!(
            dispatch_for(InboundKind::OpenTncLog),
            Dispatch::Command(Command::ShowSurface(SurfaceName::Log))
        );
        assert_eq!(
            dispatch_for(InboundKind::CheckRigctld),
            Dispatch::Command(Command::CheckRigctld)
        );
    }

    #[test]
    fn test_every_route_delivers_payload_unchanged() {
        for kind in InboundKind::ALL {
            let Dispatch::Relay(routes) = dispatch_for(*kind) else {
                continue;
            };
            let recorder = Recorder::default();
            let mut registry = registry_with_primaries(&recorder);
            let mut router = MessageRouter::new();
            let payload = json!({"kind": kind.as_str(), "n": 7});
            let event = InboundEvent::new(EventSource::System, *kind, payload.clone());

            let outcome = router.relay(&event, &mut registry).unwrap();

            assert_eq!(outcome.delivered, routes.len(), "{}", kind);
            let delivered = recorder.delivered();
            assert_eq!(delivered.len(), routes.len(), "{}", kind);
            for route in routes {
                assert!(
                    delivered.contains(&(route.target, route.event.to_string(), payload.clone())),
                    "{} missing delivery to {}",
                    kind,
                    route.target
                );
            }
        }
    }

    #[test]
    fn test_tnc_state_fans_out_to_main_and_mesh() {
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);
        let mut router = MessageRouter::new();
        let payload = json!({"tncState": "busy"});
        let event = InboundEvent::parse(
            EventSource::Surface(SurfaceName::Main),
            "request-update-tnc-state",
            payload.clone(),
        )
        .unwrap();

        router.relay(&event, &mut registry);

        assert_eq!(
            recorder.delivered(),
            vec![
                (SurfaceName::Main, "action-update-tnc-state".to_string(), payload.clone()),
                (SurfaceName::Mesh, "action-update-mesh-table".to_string(), payload),
            ]
        );
    }

    #[test]
    fn test_relay_to_destroyed_surface_is_dropped() {
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);
        registry.destroy(SurfaceName::Mesh);
        let mut router = MessageRouter::new();
        let event = InboundEvent::new(
            EventSource::System,
            InboundKind::UpdateTncState,
            json!({"tncState": "idle"}),
        );

        let outcome = router.relay(&event, &mut registry).unwrap();

        assert_eq!(outcome, RelayOutcome { delivered: 1, dropped: 1 });
        assert_eq!(router.dropped_total(), 1);
        assert_eq!(router.delivered_total(), 1);
    }

    #[test]
    fn test_relay_preserves_arrival_order() {
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);
        let mut router = MessageRouter::new();
        for n in 0..5 {
            let event = InboundEvent::new(
                EventSource::System,
                InboundKind::UpdateRxBuffer,
                json!(n),
            );
            router.relay(&event, &mut registry);
        }

        let payloads: Vec<_> = recorder.delivered().into_iter().map(|(_, _, p)| p).collect();
        assert_eq!(payloads, (0..5).map(|n| json!(n)).collect::<Vec<_>>());
    }

    #[test]
    fn test_commands_are_not_relayed() {
        let recorder = Recorder::default();
        let mut registry = registry_with_primaries(&recorder);
        let mut router = MessageRouter::new();
        let event = InboundEvent::new(EventSource::System, InboundKind::SetConfigGlobal, json!({}));

        assert!(router.relay(&event, &mut registry).is_none());
        assert!(recorder.delivered().is_empty());
    }
}
