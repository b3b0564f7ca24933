//! External components the download manager depends on
//!
//! The manager never talks to the transfer engine, the history store, the
//! network layer, dialogs, pages or the desktop shell directly. Each one sits
//! behind a trait so embedders (and tests) can supply their own:
//!
//! - [`FileEngine`]: disk side of the transfer engine
//! - [`HistoryStore`]: persistent download history ([`crate::db::Database`]
//!   is the SQLite implementation)
//! - [`RequestController`]: cancel/pause of live requests
//! - [`SaveAsDialog`]: the "save as" prompt
//! - [`PageDelegate`]: pages that show new downloads
//! - [`Shell`]: opening files and folders

mod local;
mod noop;
mod traits;

use std::sync::Arc;

pub use local::{LocalFileEngine, SystemShell};
pub use noop::{NoOpHistoryStore, NoOpPageDelegate, NoOpRequestController, NoOpSaveAsDialog, NoOpShell};
pub use traits::{FileEngine, HistoryStore, PageDelegate, RequestController, SaveAsDialog, Shell};

/// The full set of collaborators a service runs with
#[derive(Clone)]
pub struct Collaborators {
    /// Disk side of the transfer engine
    pub file_engine: Arc<dyn FileEngine>,
    /// Persistent history
    pub history: Arc<dyn HistoryStore>,
    /// Live request control
    pub requests: Arc<dyn RequestController>,
    /// Save-as prompt
    pub dialog: Arc<dyn SaveAsDialog>,
    /// Pages showing downloads
    pub pages: Arc<dyn PageDelegate>,
    /// Desktop shell
    pub shell: Arc<dyn Shell>,
}

impl Collaborators {
    /// Local disk and shell, given history, nothing else
    pub fn local(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            file_engine: Arc::new(LocalFileEngine),
            history,
            requests: Arc::new(NoOpRequestController),
            dialog: Arc::new(NoOpSaveAsDialog),
            pages: Arc::new(NoOpPageDelegate),
            shell: Arc::new(SystemShell),
        }
    }

    /// Fully inert set: local disk, no history, no shell
    pub fn headless() -> Self {
        Self {
            shell: Arc::new(NoOpShell),
            ..Self::local(Arc::new(NoOpHistoryStore::default()))
        }
    }
}
