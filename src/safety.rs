//! Executable-file classification and the auto-open policy

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::config::SafetyConfig;
use crate::error::{DownloadError, Result};
use crate::mime;

/// Decides which file names are executable-class
#[derive(Clone, Debug)]
pub struct SafetyPolicy {
    executable_extensions: HashSet<String>,
}

impl SafetyPolicy {
    /// Build the policy from configuration
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            executable_extensions: config
                .executable_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether an extension (no leading dot) is executable-class
    pub fn is_executable_extension(&self, extension: &str) -> bool {
        !extension.is_empty()
            && self
                .executable_extensions
                .contains(&extension.to_ascii_lowercase())
    }

    /// Whether a file name carries an executable-class extension
    pub fn is_executable_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.is_executable_extension(ext))
    }

    /// Whether content of this MIME type can run code when opened
    pub fn is_executable_mime_type(&self, mime_type: &str) -> bool {
        mime::is_executable_mime_type(mime_type)
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::new(&SafetyConfig::default())
    }
}

/// Whether the host shell acts on this extension as soon as the file appears
///
/// `local`, `lnk` and class-id (`{...}`) extensions are never kept.
pub fn is_shell_integrated_extension(extension: &str) -> bool {
    let extension = extension.to_ascii_lowercase();
    extension == "local"
        || extension == "lnk"
        || (extension.len() > 2 && extension.starts_with('{') && extension.ends_with('}'))
}

/// Extensions opened automatically once a download completes
///
/// Stored lowercase without the leading dot. Executable-class extensions are
/// refused so a crafted page can never get code run without a prompt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutoOpenSet {
    extensions: BTreeSet<String>,
}

impl AutoOpenSet {
    /// Build the set, silently dropping entries the policy refuses
    pub fn from_extensions<I, S>(extensions: I, policy: &SafetyPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for ext in extensions {
            let _ = set.insert(ext.as_ref(), policy);
        }
        set
    }

    /// Register an extension. Returns whether it was newly added.
    pub fn insert(&mut self, extension: &str, policy: &SafetyPolicy) -> Result<bool> {
        let extension = normalize_extension(extension);
        if extension.is_empty() || policy.is_executable_extension(&extension) {
            return Err(DownloadError::ExtensionNotAllowed { extension }.into());
        }
        Ok(self.extensions.insert(extension))
    }

    /// Unregister an extension. Returns whether it was present.
    pub fn remove(&mut self, extension: &str) -> bool {
        self.extensions.remove(&normalize_extension(extension))
    }

    /// Whether files with this extension are opened automatically
    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&normalize_extension(extension))
    }

    /// Whether a finished file should be handed to the shell
    pub fn should_open(&self, path: &Path, policy: &SafetyPolicy) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self.contains(ext) && !policy.is_executable_extension(ext),
            None => false,
        }
    }

    /// Forget every registration
    pub fn clear(&mut self) {
        self.extensions.clear();
    }

    /// Registered extensions in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Number of registered extensions
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_executable_extensions_are_case_insensitive() {
        let policy = SafetyPolicy::default();

        assert!(policy.is_executable_extension("exe"));
        assert!(policy.is_executable_extension("EXE"));
        assert!(policy.is_executable_file(Path::new("/tmp/setup.Exe")));
        assert!(!policy.is_executable_file(Path::new("/tmp/photo.jpg")));
        assert!(!policy.is_executable_file(Path::new("/tmp/README")));
        assert!(!policy.is_executable_extension(""));
    }

    #[test]
    fn test_shell_integrated_extensions() {
        assert!(is_shell_integrated_extension("local"));
        assert!(is_shell_integrated_extension("LNK"));
        assert!(is_shell_integrated_extension(
            "{20d04fe0-3aea-1069-a2d8-08002b30309d}"
        ));
        assert!(!is_shell_integrated_extension("{}"));
        assert!(!is_shell_integrated_extension("pdf"));
    }

    #[test]
    fn test_auto_open_refuses_executables() {
        let policy = SafetyPolicy::default();
        let mut set = AutoOpenSet::default();

        assert!(set.insert(".PDF", &policy).unwrap());
        assert!(!set.insert("pdf", &policy).unwrap());
        assert!(matches!(
            set.insert("exe", &policy),
            Err(Error::Download(DownloadError::ExtensionNotAllowed { .. }))
        ));
        assert!(set.insert("", &policy).is_err());

        assert!(set.should_open(Path::new("/d/report.pdf"), &policy));
        assert!(!set.should_open(Path::new("/d/report.txt"), &policy));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["pdf"]);
    }

    #[test]
    fn test_from_extensions_drops_refused_entries() {
        let policy = SafetyPolicy::default();
        let set = AutoOpenSet::from_extensions(["txt", "bat", "png"], &policy);

        assert_eq!(set.len(), 2);
        assert!(set.contains("txt"));
        assert!(!set.contains("bat"));
    }
}
