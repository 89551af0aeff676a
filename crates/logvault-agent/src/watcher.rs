//! Filesystem watch adapter.
//!
//! Wraps a `notify` watcher on one directory (non-recursive) and turns its
//! callbacks into a channel of [`WatchSignal`]s. Only `.log` files directly
//! inside the directory are forwarded.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use logvault_core::codec::has_log_suffix;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::error::{AgentError, Result};

/// Capacity of the signal channel. When it fills up, events are dropped and
/// an [`WatchSignal::Overflow`] is delivered instead.
pub const WATCH_CHANNEL_CAPACITY: usize = 1024;

/// Kind of change seen on a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// The file appeared (created or renamed into place).
    Created,
    /// The file's content or metadata changed.
    Modified,
}

/// One notification from the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// A log file changed.
    Changed {
        /// Kind of change.
        kind: WatchEventKind,
        /// Full path of the file.
        path: PathBuf,
    },
    /// Events were lost; the directory should be rescanned to catch up.
    Overflow,
    /// The watch backend reported an error.
    Error(String),
}

/// A subscription to one directory.
///
/// Dropping the stream, or calling [`WatchStream::close`], releases the
/// underlying watch.
pub struct WatchStream {
    rx: mpsc::Receiver<WatchSignal>,
    watcher: Option<RecommendedWatcher>,
}

impl WatchStream {
    /// Subscribes to create and modify notifications on `dir`.
    pub fn subscribe(dir: &Path) -> Result<Self> {
        let dir = dir
            .canonicalize()
            .map_err(|_| AgentError::NotADirectory(dir.to_path_buf()))?;
        if !dir.is_dir() {
            return Err(AgentError::NotADirectory(dir));
        }

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let lost = Arc::new(AtomicBool::new(false));
        let watched = dir.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            for signal in map_event(res, &watched) {
                forward(&tx, &lost, signal);
            }
        })
        .map_err(|e| AgentError::Watch {
            path: dir.clone(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| AgentError::Watch {
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        debug!(directory = %dir.display(), "watching directory");
        Ok(Self {
            rx,
            watcher: Some(watcher),
        })
    }

    /// Builds a stream fed by an arbitrary channel instead of a filesystem
    /// watch.
    #[must_use]
    pub fn from_channel(rx: mpsc::Receiver<WatchSignal>) -> Self {
        Self { rx, watcher: None }
    }

    /// Waits for the next signal. Returns `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<WatchSignal> {
        self.rx.recv().await
    }

    /// Releases the watch. Signals already queued can still be read.
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            debug!("released directory watch");
        }
        self.rx.close();
    }

    /// Returns true while a filesystem watch is held.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.watcher.is_some()
    }
}

impl fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchStream")
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn forward(tx: &mpsc::Sender<WatchSignal>, lost: &AtomicBool, signal: WatchSignal) {
    if lost.load(Ordering::Acquire) {
        // The marker and the event go out together or not at all.
        if let Ok(mut permits) = tx.try_reserve_many(2) {
            if let Some(permit) = permits.next() {
                permit.send(WatchSignal::Overflow);
            }
            if let Some(permit) = permits.next() {
                permit.send(signal);
            }
            lost.store(false, Ordering::Release);
        }
        return;
    }
    match tx.try_send(signal) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            if !lost.swap(true, Ordering::AcqRel) {
                warn!("watch channel full, dropping events");
            }
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

/// Maps one backend callback onto zero or more signals for files in `dir`.
fn map_event(res: notify::Result<Event>, dir: &Path) -> Vec<WatchSignal> {
    let event = match res {
        Ok(event) => event,
        Err(e) => return vec![WatchSignal::Error(e.to_string())],
    };
    if event.need_rescan() {
        return vec![WatchSignal::Overflow];
    }

    let changed: Vec<(WatchEventKind, PathBuf)> = match event.kind {
        EventKind::Create(_) => tag(event.paths, WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => tag(event.paths, WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .into_iter()
            .nth(1)
            .map(|to| vec![(WatchEventKind::Created, to)])
            .unwrap_or_default(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .filter(|p| p.exists())
            .map(|p| (WatchEventKind::Created, p))
            .collect(),
        EventKind::Modify(_) => tag(event.paths, WatchEventKind::Modified),
        _ => Vec::new(),
    };

    changed
        .into_iter()
        .filter(|(_, path)| is_watched_log(path, dir))
        .map(|(kind, path)| WatchSignal::Changed { kind, path })
        .collect()
}

fn tag(paths: Vec<PathBuf>, kind: WatchEventKind) -> Vec<(WatchEventKind, PathBuf)> {
    paths.into_iter().map(|p| (kind, p)).collect()
}

fn is_watched_log(path: &Path, dir: &Path) -> bool {
    path.parent() == Some(dir)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(has_log_suffix)
}
