//! # browser-dl
//!
//! Download manager subsystem for a web browser.
//!
//! The manager receives transfers from the browser's byte-transfer engine,
//! decides where each file goes on disk, keeps a persistent history, and
//! walks the user through approving potentially dangerous (executable-class)
//! files before they get their real names.
//!
//! ## Design
//!
//! - **Single-owner state** - one [`DownloadManager`] owns every
//!   [`DownloadItem`] and runs on a dedicated UI task; nothing is shared
//! - **Message passing** - filesystem work, history writes, request control
//!   and save-as prompts run on their own contexts and answer with messages
//! - **Pluggable collaborators** - the transfer engine's disk side, the
//!   history store, the network layer, dialogs, pages and the desktop shell
//!   are traits ([`collaborators`])
//! - **Event-driven** - consumers subscribe to [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use browser_dl::{Config, DownloadCreateInfo, DownloadId, DownloadService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = DownloadService::open(Config::default()).await?;
//!
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Reported by the transfer engine
//!     let info = DownloadCreateInfo::new(DownloadId(1), "https://example.com/report.pdf", "application/pdf");
//!     service.start_download(info)?;
//!     service.download_finished(DownloadId(1), 4096)?;
//!
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// External components behind traits
pub mod collaborators;
/// Configuration types
pub mod config;
/// SQLite history store
pub mod db;
/// Error types
pub mod error;
/// Download file name and extension generation
pub mod filename;
/// A single download
pub mod item;
/// The UI-context orchestrator
pub mod manager;
/// MIME type to extension mapping
pub mod mime;
/// Executable classification and auto-open policy
pub mod safety;
/// Execution contexts and the public async handle
pub mod service;
/// Core types and events
pub mod types;
/// Path probing and renaming
pub mod utils;

// Re-export commonly used types
pub use collaborators::{
    Collaborators, FileEngine, HistoryStore, PageDelegate, RequestController, SaveAsDialog, Shell,
};
pub use config::{Config, DownloadConfig, PersistenceConfig, SafetyConfig};
pub use db::Database;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use item::DownloadItem;
pub use manager::{DownloadManager, ShutdownReport};
pub use service::DownloadService;
pub use types::{
    DbHandle, DownloadCreateInfo, DownloadId, DownloadRecord, DownloadSnapshot, DownloadState,
    Event, ItemKey, RequestOwner, SafetyState,
};

/// Run the service until the process is asked to stop, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use browser_dl::{Config, DownloadService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = DownloadService::open(Config::default()).await?;
///     let report = run_with_shutdown(service).await?;
///     println!("cancelled {} downloads", report.cancelled);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: DownloadService) -> Result<ShutdownReport> {
    wait_for_signal().await;
    service.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
