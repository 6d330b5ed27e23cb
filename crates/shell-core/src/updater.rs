// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! Update checker
//!
//! Reads a GitHub style releases feed, picks the newest release for the
//! configured channel and downloads the installer for this platform. Progress
//! is posted to the event queue and forwarded to main as `action-updater`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use freedata_common::Platform;
use futures_util::StreamExt;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{outbound, EventSender, OutboundEvent, ShellEvent};

pub const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/DJ2LS/FreeDATA/releases";

/// Channel that only follows stable releases
pub const STABLE_CHANNEL: &str = "latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// One entry of the releases feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// The release selected for this installation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub version: String,
    pub release_name: Option<String>,
    pub release_notes: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    /// Installer for this platform, if the release ships one
    pub asset: Option<ReleaseAsset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    pub transferred: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some(self.transferred as f64 * 100.0 / total as f64),
            _ => None,
        }
    }
}

/// Updater progress reported through the event queue
#[derive(Debug, Clone, PartialEq)]
pub enum UpdaterEvent {
    Checking,
    Available(ReleaseInfo),
    NotAvailable,
    Progress(DownloadProgress),
    Downloaded { info: ReleaseInfo, path: PathBuf },
    Error(String),
}

impl UpdaterEvent {
    /// `action-updater` payload for the main surface
    pub fn to_outbound(&self, app_version: &str) -> OutboundEvent {
        let payload = match self {
            UpdaterEvent::Checking => json!({
                "status": "checking-for-update",
                "version": app_version,
            }),
            UpdaterEvent::Available(info) => json!({
                "status": "update-available",
                "info": info,
            }),
            UpdaterEvent::NotAvailable => json!({
                "status": "update-not-available",
                "info": { "version": app_version },
            }),
            UpdaterEvent::Progress(progress) => json!({
                "status": "download-progress",
                "progress": {
                    "transferred": progress.transferred,
                    "total": progress.total,
                    "percent": progress.percent(),
                },
            }),
            UpdaterEvent::Downloaded { info, .. } => json!({
                "status": "update-downloaded",
                "info": info,
            }),
            UpdaterEvent::Error(message) => json!({
                "status": "error",
                "progress": message,
            }),
        };
        OutboundEvent::new(outbound::UPDATER, payload)
    }
}

/// Installer file suffix per platform
pub fn asset_suffix(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::Linux => Some(".AppImage"),
        Platform::Windows => Some(".exe"),
        Platform::MacOs => Some(".dmg"),
        Platform::Other => None,
    }
}

fn parse_tag(tag: &str) -> Option<Version> {
    Version::parse(tag.trim().trim_start_matches('v')).ok()
}

/// Pick the newest release newer than `current` for `channel`.
///
/// Drafts are never considered; prereleases only outside the stable channel.
/// Tags that are not semver are skipped.
pub fn select_release(
    releases: &[Release],
    channel: &str,
    current: &Version,
    platform: Platform,
) -> Option<ReleaseInfo> {
    let allow_prerelease = channel != STABLE_CHANNEL;

    let (version, release) = releases
        .iter()
        .filter(|r| !r.draft)
        .filter(|r| allow_prerelease || !r.prerelease)
        .filter_map(|r| match parse_tag(&r.tag_name) {
            Some(v) => Some((v, r)),
            None => {
                debug!("Skipping release with tag {}", r.tag_name);
                None
            }
        })
        .filter(|(v, _)| allow_prerelease || v.pre.is_empty())
        .filter(|(v, _)| v > current)
        .max_by(|(a, _), (b, _)| a.cmp(b))?;

    let asset = asset_suffix(platform).and_then(|suffix| {
        release
            .assets
            .iter()
            .find(|a| a.name.ends_with(suffix))
            .cloned()
    });

    Some(ReleaseInfo {
        version: version.to_string(),
        release_name: release.name.clone(),
        release_notes: release.body.clone(),
        release_date: release.published_at,
        asset,
    })
}

/// Everything one update check needs
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    pub feed_url: String,
    pub channel: String,
    pub current: Version,
    pub platform: Platform,
    pub download_dir: PathBuf,
}

/// Run the check in the background; every outcome becomes an [`UpdaterEvent`]
pub fn spawn_check(check: UpdateCheck, events: EventSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_check(&check, &events).await {
            warn!("Update check failed: {:#}", e);
            let _ = events.send(ShellEvent::Updater(UpdaterEvent::Error(format!("{:#}", e))));
        }
    })
}

fn report(events: &EventSender, event: UpdaterEvent) {
    let _ = events.send(ShellEvent::Updater(event));
}

async fn run_check(check: &UpdateCheck, events: &EventSender) -> Result<()> {
    info!(
        "Checking for updates on channel {} (current {})",
        check.channel, check.current
    );
    report(events, UpdaterEvent::Checking);

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("freedata-shell/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let releases: Vec<Release> = client
        .get(&check.feed_url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}", check.feed_url))?
        .error_for_status()?
        .json()
        .await
        .context("Invalid releases feed")?;

    let Some(info) = select_release(&releases, &check.channel, &check.current, check.platform)
    else {
        info!("No update available");
        report(events, UpdaterEvent::NotAvailable);
        return Ok(());
    };

    info!("Update available: {}", info.version);
    report(events, UpdaterEvent::Available(info.clone()));

    let Some(asset) = info.asset.clone() else {
        warn!("Release {} has no installer for {}", info.version, check.platform);
        return Ok(());
    };

    let path = download_asset(&client, &asset, &check.download_dir, events).await?;
    info!("Update downloaded to {}", path.display());
    report(events, UpdaterEvent::Downloaded { info, path });
    Ok(())
}

async fn download_asset(
    client: &reqwest::Client,
    asset: &ReleaseAsset,
    dir: &Path,
    events: &EventSender,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let file_name = Path::new(&asset.name)
        .file_name()
        .ok_or_else(|| anyhow!("Invalid asset name {}", asset.name))?;
    let path = dir.join(file_name);
    let partial = path.with_extension("part");

    let response = client
        .get(&asset.browser_download_url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", asset.name))?
        .error_for_status()?;

    let total = response
        .content_length()
        .or(if asset.size > 0 { Some(asset.size) } else { None });
    let mut file = tokio::fs::File::create(&partial)
        .await
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut stream = response.bytes_stream();
    let mut progress = DownloadProgress {
        transferred: 0,
        total,
    };
    let mut last_percent = -1i64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Download interrupted")?;
        file.write_all(&chunk).await?;
        progress.transferred += chunk.len() as u64;

        let percent = progress.percent().map(|p| p as i64).unwrap_or(-1);
        if percent != last_percent {
            last_percent = percent;
            report(events, UpdaterEvent::Progress(progress));
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, &path)
        .await
        .with_context(|| format!("Failed to move download to {}", path.display()))?;
    Ok(path)
}

/// Start the downloaded installer detached from the shell
pub fn launch_installer(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if path.extension().is_some_and(|e| e == "AppImage") {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to mark {} executable", path.display()))?;
        }
    }

    let mut command = if cfg!(target_os = "macos") {
        let mut c = tokio::process::Command::new("open");
        c.arg(path);
        c
    } else {
        tokio::process::Command::new(path)
    };

    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch installer {}", path.display()))?;

    info!("Launched installer {}", path.display());
    Ok(())
}
