// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 FreeDATA Shell Contributors

// Terminal file picker
//
// Used when the shell runs attached to a terminal. Prompts for a path and
// checks it matches the requested kind; an empty answer cancels.

use std::path::{Path, PathBuf};

use dialoguer::Input;
use freedata_shell_core::{FilePicker, PickKind};
use tracing::warn;

#[derive(Debug, Default)]
pub struct TerminalPicker;

impl TerminalPicker {
    fn prompt(kind: &PickKind) -> &'static str {
        match kind {
            PickKind::File => "Select file (empty to cancel)",
            PickKind::Folder => "Select folder (empty to cancel)",
            PickKind::Save { .. } => "Save file as (empty to cancel)",
        }
    }
}

impl FilePicker for TerminalPicker {
    fn pick(&self, kind: &PickKind) -> Option<PathBuf> {
        let mut input = Input::<String>::new()
            .with_prompt(Self::prompt(kind))
            .allow_empty(true);
        if let PickKind::Save { default_name } = kind {
            input = input.with_initial_text(default_name.clone());
        }

        let answer = match input.interact_text() {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Picker prompt failed: {}", e);
                return None;
            }
        };

        accept(kind, answer.trim())
    }
}

/// Validate a typed path against the requested kind
fn accept(kind: &PickKind, answer: &str) -> Option<PathBuf> {
    if answer.is_empty() {
        return None;
    }

    let path = PathBuf::from(answer);
    let valid = match kind {
        PickKind::File => path.is_file(),
        PickKind::Folder => path.is_dir(),
        PickKind::Save { .. } => path
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.is_dir())
            .unwrap_or(false),
    };

    if valid {
        Some(path)
    } else {
        warn!("{} is not a valid {}", Path::new(answer).display(), describe(kind));
        None
    }
}

fn describe(kind: &PickKind) -> &'static str {
    match kind {
        PickKind::File => "file",
        PickKind::Folder => "folder",
        PickKind::Save { .. } => "save location",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_accept_checks_kind() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let file_str = file.to_str().unwrap();
        let dir_str = dir.path().to_str().unwrap();

        assert_eq!(accept(&PickKind::File, file_str), Some(file.clone()));
        assert_eq!(accept(&PickKind::File, dir_str), None);
        assert_eq!(accept(&PickKind::Folder, dir_str), Some(dir.path().to_path_buf()));
        assert_eq!(accept(&PickKind::Folder, ""), None);
    }

    #[test]
    fn test_accept_save_needs_existing_parent() {
        let dir = TempDir::new().unwrap();
        let save = PickKind::Save {
            default_name: "qso.txt".to_string(),
        };
        let target = dir.path().join("new.bin");

        assert_eq!(accept(&save, target.to_str().unwrap()), Some(target.clone()));
        assert_eq!(accept(&save, "qso.txt"), Some(PathBuf::from("qso.txt")));
        let missing = dir.path().join("missing").join("new.bin");
        assert_eq!(accept(&save, missing.to_str().unwrap()), None);
    }
}
