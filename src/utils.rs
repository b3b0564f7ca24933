//! Blocking path probing and renaming, run on the file-I/O context
//!
//! Nothing in here may be called from the UI context: every function touches
//! the filesystem.

use rand::Rng;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::safety::SafetyPolicy;
use crate::types::{DbHandle, DownloadCreateInfo};

/// Highest " (n)" suffix tried before giving up on a name
pub const MAX_UNIQUE_FILES: u32 = 100;

/// Insert ` (n)` before the extension: `report.pdf` → `report (3).pdf`
pub fn append_number_to_path(path: &Path, number: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({number}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({number})"),
    };
    path.with_file_name(name)
}

/// Find the suffix that makes `path` unique
///
/// `Some(0)` when the path itself is free, `Some(n)` for the first free
/// ` (n)` variant, `None` once [`MAX_UNIQUE_FILES`] variants are all taken.
pub fn unique_path_number(path: &Path) -> Option<u32> {
    if !path.exists() {
        return Some(0);
    }
    (1..=MAX_UNIQUE_FILES).find(|n| !append_number_to_path(path, *n).exists())
}

/// Whether new files can be created inside `dir`
pub fn path_is_writable(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let marker = dir.join(format!(".browser-dl-write-test-{}", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(_) => {
            let _ = fs::remove_file(&marker);
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => true,
        Err(_) => false,
    }
}

/// Random draws tried before giving up on a temporary name
pub const MAX_UNCONFIRMED_ATTEMPTS: u32 = 100;

/// Temporary name a dangerous download is written under until approved
///
/// `None` when [`MAX_UNCONFIRMED_ATTEMPTS`] draws all hit existing files.
pub fn unconfirmed_download_path(dir: &Path) -> Option<PathBuf> {
    let mut rng = rand::thread_rng();
    free_unconfirmed_path(dir, MAX_UNCONFIRMED_ATTEMPTS, || rng.gen_range(0..=100_000))
}

fn free_unconfirmed_path(
    dir: &Path,
    attempts: u32,
    mut next_number: impl FnMut() -> u32,
) -> Option<PathBuf> {
    (0..attempts)
        .map(|_| dir.join(format!("unconfirmed {}.download", next_number())))
        .find(|candidate| !candidate.exists())
}

/// Resolve where a new download goes on disk
///
/// Falls back to `documents_dir` (forcing save-as) when the suggested
/// directory is not writable, uniquifies the name, hides executable-class
/// files behind a temporary name, and reserves the final path with an empty
/// placeholder file unless the user still has to choose.
pub fn check_if_suggested_path_exists(
    mut info: DownloadCreateInfo,
    documents_dir: &Path,
    policy: &SafetyPolicy,
) -> DownloadCreateInfo {
    let mut dir = info
        .suggested_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let filename = info
        .suggested_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_default();

    if !path_is_writable(&dir) {
        tracing::debug!(
            download_id = info.download_id.0,
            dir = %dir.display(),
            "download directory not writable, falling back to documents"
        );
        info.save_as = true;
        dir = documents_dir.to_path_buf();
        info.suggested_path = dir.join(&filename);
    }

    let uniquifier = unique_path_number(&info.suggested_path);

    let temporary = if !info.save_as && policy.is_executable_file(&filename) {
        let temporary = unconfirmed_download_path(&dir);
        if temporary.is_none() {
            tracing::debug!(
                download_id = info.download_id.0,
                dir = %dir.display(),
                "no free temporary name, prompting"
            );
            info.save_as = true;
        }
        temporary
    } else {
        None
    };

    if let Some(temporary) = temporary {
        info.original_name = filename;
        info.path_uniquifier = uniquifier.unwrap_or(0);
        info.suggested_path = temporary;
        info.is_dangerous = true;
    } else {
        match uniquifier {
            Some(0) => {}
            Some(n) => {
                info.suggested_path = append_number_to_path(&info.suggested_path, n);
            }
            None => {
                tracing::debug!(
                    download_id = info.download_id.0,
                    path = %info.suggested_path.display(),
                    "no unique name found, prompting"
                );
                info.save_as = true;
            }
        }
    }

    if !info.save_as
        && let Err(e) = fs::write(&info.suggested_path, b"")
    {
        tracing::warn!(
            download_id = info.download_id.0,
            path = %info.suggested_path.display(),
            error = %e,
            "failed to reserve download path"
        );
    }

    info
}

/// Outcome of moving an approved dangerous download to its real name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DangerousRename {
    /// Download the rename belongs to
    pub db_handle: DbHandle,
    /// Whether the file was moved
    pub success: bool,
    /// Path the file was moved to
    pub new_path: PathBuf,
    /// " (n)" suffix that was applied (0 = none)
    pub uniquifier: u32,
}

/// Move a finished, approved dangerous download from its temporary name to
/// its true name, re-probing for collisions first
pub fn proceed_with_finished_dangerous_download(
    db_handle: DbHandle,
    path: &Path,
    original_name: &Path,
) -> DangerousRename {
    let target = path
        .parent()
        .map(|dir| dir.join(original_name))
        .unwrap_or_else(|| original_name.to_path_buf());

    let Some(uniquifier) = unique_path_number(&target) else {
        tracing::warn!(
            handle = db_handle.0,
            path = %target.display(),
            "no unique name left for validated download"
        );
        return DangerousRename {
            db_handle,
            success: false,
            new_path: target,
            uniquifier: 0,
        };
    };

    let new_path = if uniquifier > 0 {
        append_number_to_path(&target, uniquifier)
    } else {
        target
    };

    let success = match move_file(path, &new_path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                handle = db_handle.0,
                from = %path.display(),
                to = %new_path.display(),
                error = %e,
                "failed to rename validated download"
            );
            false
        }
    };

    DangerousRename {
        db_handle,
        success,
        new_path,
        uniquifier,
    }
}

// rename() fails across filesystems; fall back to copy + delete
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DownloadId;
    use tempfile::TempDir;

    fn info_for(path: PathBuf) -> DownloadCreateInfo {
        let mut info = DownloadCreateInfo::new(DownloadId(1), "http://x/file", "text/plain");
        info.suggested_path = path;
        info
    }

    #[test]
    fn test_append_number_keeps_extension() {
        assert_eq!(
            append_number_to_path(Path::new("/d/report.pdf"), 3),
            PathBuf::from("/d/report (3).pdf")
        );
        assert_eq!(
            append_number_to_path(Path::new("/d/README"), 1),
            PathBuf::from("/d/README (1)")
        );
        assert_eq!(
            append_number_to_path(Path::new("/d/a.tar.gz"), 2),
            PathBuf::from("/d/a.tar (2).gz")
        );
    }

    #[test]
    fn test_unique_number_skips_existing_variants() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("report.pdf");
        assert_eq!(unique_path_number(&base), Some(0));

        fs::write(&base, b"x").unwrap();
        for n in 1..=5 {
            fs::write(dir.path().join(format!("report ({n}).pdf")), b"x").unwrap();
        }

        assert_eq!(unique_path_number(&base), Some(6));
        assert_eq!(
            append_number_to_path(&base, 6),
            dir.path().join("report (6).pdf")
        );
    }

    #[test]
    fn test_unique_number_gives_up_after_max_attempts() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("report.pdf");
        fs::write(&base, b"x").unwrap();
        for n in 1..MAX_UNIQUE_FILES {
            fs::write(append_number_to_path(&base, n), b"x").unwrap();
        }
        assert_eq!(unique_path_number(&base), Some(MAX_UNIQUE_FILES));

        fs::write(append_number_to_path(&base, MAX_UNIQUE_FILES), b"x").unwrap();
        assert_eq!(unique_path_number(&base), None);
    }

    #[test]
    fn test_writable_directory_is_detected() {
        let dir = TempDir::new().unwrap();
        assert!(path_is_writable(dir.path()));
        assert!(!path_is_writable(&dir.path().join("missing")));
        // No marker file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_safe_download_reserves_uniquified_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), b"old").unwrap();

        let info = check_if_suggested_path_exists(
            info_for(dir.path().join("notes.txt")),
            dir.path(),
            &SafetyPolicy::default(),
        );

        assert!(!info.save_as);
        assert!(!info.is_dangerous);
        assert_eq!(info.suggested_path, dir.path().join("notes (1).txt"));
        assert_eq!(fs::metadata(&info.suggested_path).unwrap().len(), 0);
    }

    #[test]
    fn test_dangerous_download_gets_temporary_name() {
        let dir = TempDir::new().unwrap();

        let info = check_if_suggested_path_exists(
            info_for(dir.path().join("a.exe")),
            dir.path(),
            &SafetyPolicy::default(),
        );

        assert!(info.is_dangerous);
        assert_eq!(info.original_name, PathBuf::from("a.exe"));
        assert_eq!(info.path_uniquifier, 0);
        let name = info.suggested_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("unconfirmed "), "got {name}");
        assert!(name.ends_with(".download"), "got {name}");
        assert!(info.suggested_path.exists());
        assert!(!dir.path().join("a.exe").exists());
    }

    #[test]
    fn test_unwritable_directory_forces_save_as_in_documents() {
        let docs = TempDir::new().unwrap();
        let missing = docs.path().join("gone").join("a.exe");

        let info =
            check_if_suggested_path_exists(info_for(missing), docs.path(), &SafetyPolicy::default());

        assert!(info.save_as);
        // The user picks the name, so nothing is hidden or reserved
        assert!(!info.is_dangerous);
        assert_eq!(info.suggested_path, docs.path().join("a.exe"));
        assert!(!info.suggested_path.exists());
    }

    #[test]
    fn test_exhausted_names_force_save_as() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("r.txt");
        fs::write(&base, b"x").unwrap();
        for n in 1..=MAX_UNIQUE_FILES {
            fs::write(append_number_to_path(&base, n), b"x").unwrap();
        }

        let info =
            check_if_suggested_path_exists(info_for(base.clone()), dir.path(), &SafetyPolicy::default());

        assert!(info.save_as);
        assert_eq!(info.suggested_path, base);
        assert_eq!(fs::read(&base).unwrap(), b"x");
    }

    #[test]
    fn test_temporary_name_search_is_bounded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("unconfirmed 7.download"), b"x").unwrap();

        let mut draws = 0;
        let found = free_unconfirmed_path(dir.path(), MAX_UNCONFIRMED_ATTEMPTS, || {
            draws += 1;
            7
        });
        assert_eq!(found, None);
        assert_eq!(draws, MAX_UNCONFIRMED_ATTEMPTS);

        let mut numbers = [7, 7, 8].into_iter();
        let found = free_unconfirmed_path(dir.path(), 3, || numbers.next().unwrap());
        assert_eq!(found, Some(dir.path().join("unconfirmed 8.download")));
    }

    #[test]
    fn test_validated_download_moves_to_unique_true_name() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("unconfirmed 42.download");
        fs::write(&temp, b"payload").unwrap();
        fs::write(dir.path().join("a.exe"), b"other").unwrap();

        let rename = proceed_with_finished_dangerous_download(DbHandle(9), &temp, Path::new("a.exe"));

        assert!(rename.success);
        assert_eq!(rename.db_handle, DbHandle(9));
        assert_eq!(rename.uniquifier, 1);
        assert_eq!(rename.new_path, dir.path().join("a (1).exe"));
        assert_eq!(fs::read(&rename.new_path).unwrap(), b"payload");
        assert!(!temp.exists());
    }

    #[test]
    fn test_failed_move_is_reported() {
        let dir = TempDir::new().unwrap();
        let rename = proceed_with_finished_dangerous_download(
            DbHandle(1),
            &dir.path().join("unconfirmed 1.download"),
            Path::new("a.exe"),
        );
        assert!(!rename.success);
    }
}
