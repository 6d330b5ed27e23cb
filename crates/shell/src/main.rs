// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

// FreeDATA Shell
// Starts the daemon, hosts the UI surfaces and routes events between them

mod ipc;
mod picker;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use freedata_common::Platform;
use freedata_shell_core::settings::default_settings_path;
use freedata_shell_core::{event_channel, EventSender, Shell, ShellEvent, ShellSettings, ShutdownReason};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ipc::{IpcHub, IpcListener, IpcSurfaceFactory};
use picker::TerminalPicker;

#[derive(Parser, Debug)]
#[command(name = "freedata-shell")]
#[command(about = "FreeDATA desktop shell", long_about = None)]
#[command(version)]
struct Cli {
    /// Shell settings file (default: <config_dir>/FreeDATA/shell.toml)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// User config file (default: <config_dir>/FreeDATA/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory containing tnc/ with the daemon binaries
    #[arg(long)]
    resources_dir: Option<PathBuf>,

    /// Socket surfaces attach to
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Skip the update check
    #[arg(long)]
    no_update_check: bool,

    /// Splash screen duration in milliseconds
    #[arg(long)]
    splash_delay_ms: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freedata_shell=debug,freedata_shell_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("FreeDATA shell starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "System: {} ({}, {})",
        Platform::current(),
        std::env::consts::ARCH,
        std::env::consts::FAMILY
    );

    // Every handler runs on this one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let settings_path = match cli.settings {
        Some(path) => path,
        None => default_settings_path()?,
    };
    let mut settings = ShellSettings::load(&settings_path)?;
    if let Some(dir) = cli.resources_dir {
        settings.resources_dir = dir;
    }
    if let Some(socket) = cli.socket {
        settings.ipc_socket = socket;
    }
    if let Some(delay) = cli.splash_delay_ms {
        settings.splash_delay_ms = delay;
    }
    if cli.no_update_check {
        settings.check_for_updates = false;
    }
    info!("Resources: {}", settings.resources_dir.display());

    let config_path = match cli.config {
        Some(path) => path,
        None => freedata_common::config_path()?,
    };
    let report = freedata_common::load_or_init(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if report.created {
        info!("Created default config at {}", config_path.display());
    }
    if !report.backfilled.is_empty() {
        warn!("Config was missing {} setting(s)", report.backfilled.len());
    }

    let (events, inbox) = event_channel();
    let hub = IpcHub::new(events.clone());
    let listener = IpcListener::bind(&settings).await?;
    let socket_path = listener.socket_path().map(|p| p.to_path_buf());
    let server = listener.spawn(hub.clone());

    tokio::spawn(forward_signals(events.clone()));

    let mut shell = Shell::new(
        settings,
        report.snapshot,
        env!("CARGO_PKG_VERSION"),
        (events, inbox),
        Box::new(IpcSurfaceFactory::new(hub)),
    );
    if std::io::stdin().is_terminal() {
        shell = shell.with_picker(Arc::new(TerminalPicker));
    }

    let result = shell.run().await;

    server.abort();
    if let Some(path) = socket_path {
        ipc::cleanup_socket(&path);
    }
    info!("FreeDATA shell exited");
    result
}

/// Turn Ctrl+C and SIGTERM into a shutdown event
async fn forward_signals(events: EventSender) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                info!("Received Ctrl+C, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Received Ctrl+C, shutting down");
    }

    let _ = events.send(ShellEvent::Shutdown(ShutdownReason::Signal));
}
