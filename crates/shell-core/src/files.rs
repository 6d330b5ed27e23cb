// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

//! File services requested by the main and chat surfaces
//!
//! Pickers are host provided and may block, so the coordinator runs them on
//! the blocking pool. Everything here returns the payload to deliver; the
//! caller decides where it goes.

use anyhow::{Context, Result};
use base64::Engine;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// MIME type used when the extension is unknown
pub const FALLBACK_MIME: &str = "plain/text";

/// Which kind of dialog to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickKind {
    File,
    Folder,
    Save { default_name: String },
}

/// Why a picker was opened, carried until the answer arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickRequest {
    /// Reply to main on the caller-supplied action name
    ForAction { action: String, folder: bool },
    SelectFile,
    SelectUserImage,
    SaveFile { filename: String, data_b64: String },
}

impl PickRequest {
    pub fn kind(&self) -> PickKind {
        match self {
            PickRequest::ForAction { folder: true, .. } => PickKind::Folder,
            PickRequest::ForAction { folder: false, .. }
            | PickRequest::SelectFile
            | PickRequest::SelectUserImage => PickKind::File,
            PickRequest::SaveFile { filename, .. } => PickKind::Save {
                default_name: filename.clone(),
            },
        }
    }
}

/// Host file dialog; `None` means cancelled
pub trait FilePicker: Send + Sync {
    fn pick(&self, kind: &PickKind) -> Option<PathBuf>;
}

/// Picker that always cancels, for hosts without dialogs
#[derive(Debug, Default)]
pub struct NoPicker;

impl FilePicker for NoPicker {
    fn pick(&self, kind: &PickKind) -> Option<PathBuf> {
        debug!("No picker available for {:?}", kind);
        None
    }
}

/// Reply payload for `get-file-path` / `get-folder-path`
pub fn picked_path_payload(path: &Path) -> Value {
    json!({
        "path": {
            "canceled": false,
            "filePaths": [path.to_string_lossy()],
        }
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

/// One byte per char, the encoding the chat surface expects for attachments
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

/// Read an attachment for `return-selected-files`
pub async fn read_selected_file(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!("Selected file {} ({} bytes)", path.display(), bytes.len());

    Ok(json!({
        "data": latin1(&bytes),
        "mime": mime_for(path),
        "filename": file_name(path),
    }))
}

/// Read a profile image for `return-select-user-image`
pub async fn read_user_image(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(json!({
        "data": base64::engine::general_purpose::STANDARD.encode(&bytes),
        "mime": mime_for(path),
        "filename": file_name(path),
    }))
}

/// List regular files of the shared folder for `return-shared-folder-files`.
///
/// Sharing disabled yields an empty list without touching the folder.
pub async fn list_shared_folder(folder: &Path, enabled: bool) -> Result<Value> {
    if !enabled {
        debug!("Shared folder disabled, not listing {}", folder.display());
        return Ok(json!({ "files": [] }));
    }

    let mut entries = tokio::fs::read_dir(folder)
        .await
        .with_context(|| format!("Failed to read folder {}", folder.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let path = entry.path();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(json!({
            "name": file_name(&path),
            "extension": extension,
            "size": metadata.len(),
        }));
    }

    files.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    Ok(json!({ "files": files }))
}

/// Decode a base64 payload and write it to `path`
pub async fn save_base64_file(path: &Path, data_b64: &str) -> Result<usize> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data_b64.trim())
        .context("File payload is not valid base64")?;
    tokio::fs::write(path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len())
}

/// Reveal a path in the OS file manager
pub fn reveal_in_folder(path: &Path) -> Result<()> {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("explorer");
        c.arg(format!("/select,{}", path.display()));
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg("-R").arg(path);
        c
    } else {
        // xdg-open cannot select a file, open its folder instead
        let target = if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.to_path_buf())
        };
        let mut c = Command::new("xdg-open");
        c.arg(target);
        c
    };

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to open file manager for {}", path.display()))?;
    tokio::spawn(async move {
        if let Err(e) = child.wait().await {
            warn!("File manager did not finish: {}", e);
        }
    });
    Ok(())
}
