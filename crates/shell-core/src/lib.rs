// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! FreeDATA shell core
//!
//! Host-agnostic core of the desktop shell: the window registry, the message
//! router, the process supervisor, the rigctld connection monitor and the
//! lifecycle coordinator that drives them from one event queue. Hosts plug
//! in real windows through [`registry::SurfaceFactory`].

pub mod events;
pub mod files;
pub mod lifecycle;
pub mod monitor;
pub mod registry;
pub mod router;
pub mod settings;
pub mod supervisor;
pub mod updater;

#[cfg(test)]
mod testing;

pub use events::{
    event_channel, EventReceiver, EventSender, EventSource, InboundEvent, InboundKind,
    OutboundEvent, ShellEvent, ShutdownReason,
};
pub use files::{FilePicker, PickKind};
pub use lifecycle::{Phase, Shell};
pub use registry::{SurfaceBackend, SurfaceError, SurfaceFactory, SurfaceSpec, WindowRegistry};
pub use settings::ShellSettings;
