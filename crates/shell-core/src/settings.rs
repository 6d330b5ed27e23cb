// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Shell settings (`shell.toml`)
//!
//! Settings of the shell process itself, separate from the user's
//! `config.json` which belongs to the surfaces and the daemon.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::updater::DEFAULT_FEED_URL;

pub const SETTINGS_FILE: &str = "shell.toml";

/// Default settings location: `<config_dir>/FreeDATA/shell.toml`
pub fn default_settings_path() -> Result<PathBuf> {
    Ok(freedata_common::app_data_dir()?.join(SETTINGS_FILE))
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ShellSettings {
    /// Directory holding `tnc/` with the daemon and rigctld binaries
    #[serde(default = "default_resources_dir")]
    pub resources_dir: PathBuf,

    /// How long the splash stays up before main is shown
    #[serde(default = "default_splash_delay_ms")]
    pub splash_delay_ms: u64,

    #[serde(default = "default_check_for_updates")]
    pub check_for_updates: bool,

    /// GitHub style releases endpoint
    #[serde(default = "default_update_feed_url")]
    pub update_feed_url: String,

    #[serde(default = "default_rigctld_connect_timeout_secs")]
    pub rigctld_connect_timeout_secs: u64,

    /// IPC socket surfaces attach to (Unix)
    #[serde(default = "default_ipc_socket")]
    pub ipc_socket: PathBuf,

    /// Loopback port surfaces attach to where Unix sockets are unavailable
    #[serde(default = "default_ipc_tcp_port")]
    pub ipc_tcp_port: u16,
}

fn default_resources_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("resources")))
        .unwrap_or_else(|| PathBuf::from("resources"))
}

fn default_splash_delay_ms() -> u64 {
    3000
}

fn default_check_for_updates() -> bool {
    true
}

fn default_update_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_rigctld_connect_timeout_secs() -> u64 {
    3
}

fn default_ipc_socket() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("freedata-shell.sock")
}

fn default_ipc_tcp_port() -> u16 {
    3050
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            resources_dir: default_resources_dir(),
            splash_delay_ms: default_splash_delay_ms(),
            check_for_updates: default_check_for_updates(),
            update_feed_url: default_update_feed_url(),
            rigctld_connect_timeout_secs: default_rigctld_connect_timeout_secs(),
            ipc_socket: default_ipc_socket(),
            ipc_tcp_port: default_ipc_tcp_port(),
        }
    }
}

impl ShellSettings {
    pub fn validate(&self) -> Result<()> {
        if self.rigctld_connect_timeout_secs == 0 {
            anyhow::bail!("rigctld_connect_timeout_secs must be at least 1");
        }
        if self.check_for_updates && self.update_feed_url.trim().is_empty() {
            anyhow::bail!("update_feed_url is empty but check_for_updates is enabled");
        }
        Ok(())
    }

    /// Load settings, writing the defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No shell settings found, using defaults");
            info!("Settings will be saved to: {}", path.display());
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path).context("Failed to read shell settings")?;
        let settings: Self = toml::from_str(&contents).context("Failed to parse shell settings")?;
        settings
            .validate()
            .context("Shell settings validation failed")?;

        info!("Loaded shell settings from: {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize shell settings")?;
        fs::write(path, contents).context("Failed to write shell settings")?;
        Ok(())
    }

    pub fn splash_delay(&self) -> Duration {
        Duration::from_millis(self.splash_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.rigctld_connect_timeout_secs)
    }

    /// Where downloaded installers are kept
    pub fn download_dir(&self) -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(freedata_common::config::APP_FOLDER)
            .join("updates")
    }
}
