//! Collaborators backed by the local machine

use std::path::Path;
use std::process::Command;

use super::traits::{FileEngine, Shell};
use crate::types::DownloadId;

/// File engine that manages directories and files on the local disk
///
/// Bytes are written by the embedder's transfer code; this side only
/// creates directories, deletes files and keeps a log of name changes.
pub struct LocalFileEngine;

impl FileEngine for LocalFileEngine {
    fn create_directory(&self, path: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn on_final_download_name(&self, id: DownloadId, path: &Path) {
        tracing::debug!(download_id = id.0, path = %path.display(), "final download name");
    }

    fn cancel_download(&self, id: DownloadId) {
        tracing::debug!(download_id = id.0, "transfer cancelled");
    }

    fn delete_file(&self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn remove_download(&self, id: DownloadId) {
        tracing::debug!(download_id = id.0, "transfer removed");
    }
}

/// Shell integration through the platform's opener command
pub struct SystemShell;

impl SystemShell {
    fn opener() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        }
    }
}

impl Shell for SystemShell {
    fn open_item(&self, path: &Path) -> std::io::Result<()> {
        Command::new(Self::opener()).arg(path).spawn().map(|_| ())
    }

    fn show_item_in_folder(&self, path: &Path) -> std::io::Result<()> {
        if cfg!(target_os = "macos") {
            return Command::new("open").arg("-R").arg(path).spawn().map(|_| ());
        }
        if cfg!(target_os = "windows") {
            let mut select = std::ffi::OsString::from("/select,");
            select.push(path.as_os_str());
            return Command::new("explorer").arg(select).spawn().map(|_| ());
        }
        let dir = path.parent().unwrap_or(path);
        Command::new(Self::opener()).arg(dir).spawn().map(|_| ())
    }
}
