// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

// FreeDATA Shell - Common Library
// Shared types, configuration store and IPC wire messages

#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod ipc;
pub mod types;

pub use config::{
    app_data_dir, config_path, default_settings, load_or_init, save_config, ConfigSnapshot,
    LoadReport,
};
pub use error::{Error, Result};
pub use ipc::{ClientMessage, ShellMessage};
pub use types::{Platform, ProcessRole, ProcessState, RigctldStatus, StreamKind, SurfaceName};
