//! Event and state waiting helpers

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

use browser_dl::{DbHandle, Event, ItemKey};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for the first event matching `pred`
///
/// Returns `None` on timeout or when the channel closes.
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<Event>, mut pred: F) -> Option<Event>
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    eprintln!("Warning: lagged {} events", n);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Completed download as announced by the manager
#[derive(Debug, Clone)]
pub struct Completed {
    pub key: ItemKey,
    pub db_handle: DbHandle,
    pub path: PathBuf,
}

/// Wait for the next `DownloadCompleted` event
pub async fn wait_for_completed(events: &mut broadcast::Receiver<Event>) -> Completed {
    match wait_for_event(events, |e| matches!(e, Event::DownloadCompleted { .. })).await {
        Some(Event::DownloadCompleted {
            key,
            db_handle,
            path,
        }) => Completed {
            key,
            db_handle,
            path,
        },
        other => panic!("download did not complete: {other:?}"),
    }
}

/// Poll `check` until it returns true or the timeout expires
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
