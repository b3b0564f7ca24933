//! Configuration types for browser-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Download placement and prompting behavior
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory new downloads go to (default: the platform download folder)
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Fallback directory when the download directory is not writable
    /// (default: the platform documents folder)
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Ask where to save every download (default: false)
    #[serde(default)]
    pub prompt_for_download: bool,

    /// Private browsing: nothing is written to the history store
    #[serde(default)]
    pub off_the_record: bool,

    /// How often in-progress items are re-announced so speed and
    /// remaining time stay current (default: 1000 ms)
    #[serde(default = "default_progress_update_interval", with = "duration_serde")]
    pub progress_update_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            documents_dir: default_documents_dir(),
            prompt_for_download: false,
            off_the_record: false,
            progress_update_interval: default_progress_update_interval(),
        }
    }
}

/// Safety classification and auto-open policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Extensions treated as executable-class (lowercase, no leading dot)
    #[serde(default = "default_executable_extensions")]
    pub executable_extensions: Vec<String>,

    /// Extensions opened automatically when a download completes.
    ///
    /// Only seeds the set on first start; afterwards the set stored by the
    /// history store wins.
    #[serde(default)]
    pub auto_open_extensions: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            executable_extensions: default_executable_extensions(),
            auto_open_extensions: Vec::new(),
        }
    }
}

/// Data storage
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite history database (default: "./browser-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for browser-dl
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Placement and prompting
    #[serde(default)]
    pub download: DownloadConfig,

    /// Dangerous-file classification and auto-open
    #[serde(default)]
    pub safety: SafetyConfig,

    /// History store
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check settings that would make the manager misbehave
    pub fn validate(&self) -> Result<()> {
        if self.download.download_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "download directory must not be empty".into(),
                key: Some("download_dir".into()),
            });
        }

        if self.download.progress_update_interval.is_zero() {
            return Err(Error::Config {
                message: "progress update interval must be greater than zero".into(),
                key: Some("progress_update_interval".into()),
            });
        }

        if let Some(ext) = self
            .safety
            .executable_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(Error::Config {
                message: format!("invalid executable extension {ext:?}"),
                key: Some("executable_extensions".into()),
            });
        }

        Ok(())
    }
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("downloads"))
}

fn default_documents_dir() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from("documents"))
}

fn default_progress_update_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("browser-dl.db")
}

fn default_executable_extensions() -> Vec<String> {
    [
        "ade", "adp", "app", "asp", "asx", "bas", "bat", "chm", "cmd", "com", "cpl", "crt", "dll",
        "exe", "fxp", "hlp", "hta", "htt", "inf", "ins", "isp", "jar", "js", "jse", "lnk", "mad",
        "maf", "mag", "mam", "maq", "mar", "mas", "mat", "mau", "mav", "maw", "mda", "mdb", "mde",
        "mdt", "mdw", "mdz", "msc", "msh", "mshxml", "msi", "msp", "mst", "ops", "pcd", "pif",
        "plg", "prf", "prg", "ps1", "pst", "reg", "scf", "scr", "sct", "shb", "shs", "shtm",
        "shtml", "url", "vb", "vbe", "vbs", "vsd", "vsmacros", "vss", "vst", "vsw", "ws", "wsc",
        "wsf", "wsh", "xbap", "xht", "xhtm", "xhtml", "xml", "xsl", "xslt",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

// Durations are stored as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
