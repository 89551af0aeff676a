//! Upload gate.
//!
//! Decides when a file that produced filesystem events is quiet enough to be
//! uploaded. Each file is either idle or pending with a deadline:
//!
//! - the first event arms the gate: the file is due `quiescence` later;
//! - further events less than `coalesce` after the previous one belong to the
//!   same burst and leave the deadline alone;
//! - an event after a longer gap re-arms the gate from that moment.
//!
//! Files are returned to idle when they are taken, whatever the outcome of
//! the upload that follows.
//!
//! Known limitation: this is a timing heuristic. A writer that keeps
//! appending in a steady burst can still have its file uploaded before it
//! finishes; the next event after the upload simply arms the gate again.
//!
//! Time is passed in explicitly so the state machine needs no real timers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

/// What an observed event did to a file's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The file was idle and is now pending.
    Armed,
    /// The event was absorbed into the current burst.
    Coalesced,
    /// The file was pending and its deadline moved.
    Rearmed,
}

/// State of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// No upload scheduled.
    Idle,
    /// Upload scheduled.
    PendingUpload {
        /// When the gate was first armed.
        armed_at: Instant,
        /// Most recent event.
        last_event: Instant,
        /// When the file becomes due.
        due_at: Instant,
    },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    armed_at: Instant,
    last_event: Instant,
    due_at: Instant,
}

/// Per-file debounce state.
#[derive(Debug, Clone)]
pub struct UploadGate {
    quiescence: Duration,
    coalesce: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl UploadGate {
    /// Creates a gate with the given windows.
    #[must_use]
    pub fn new(quiescence: Duration, coalesce: Duration) -> Self {
        Self {
            quiescence,
            coalesce,
            pending: HashMap::new(),
        }
    }

    /// Quiescence window.
    #[must_use]
    pub const fn quiescence(&self) -> Duration {
        self.quiescence
    }

    /// Records an event for `path` at `now`.
    pub fn observe(&mut self, path: &Path, now: Instant) -> GateDecision {
        let due_at = now + self.quiescence;
        match self.pending.get_mut(path) {
            None => {
                self.pending.insert(
                    path.to_path_buf(),
                    Pending {
                        armed_at: now,
                        last_event: now,
                        due_at,
                    },
                );
                GateDecision::Armed
            }
            Some(p) => {
                let gap = now.saturating_duration_since(p.last_event);
                p.last_event = now;
                if gap <= self.coalesce {
                    GateDecision::Coalesced
                } else {
                    p.due_at = due_at;
                    GateDecision::Rearmed
                }
            }
        }
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due_at).min()
    }

    /// Removes and returns every file due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<(Instant, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due_at <= now)
            .map(|(path, p)| (p.due_at, path.clone()))
            .collect();
        due.sort();

        for (_, path) in &due {
            self.pending.remove(path);
        }
        due.into_iter().map(|(_, path)| path).collect()
    }

    /// Removes and returns every pending file, ordered by path.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.pending.drain().map(|(path, _)| path).collect();
        paths.sort();
        paths
    }

    /// Current state of `path`.
    #[must_use]
    pub fn state(&self, path: &Path) -> FileState {
        self.pending
            .get(path)
            .map_or(FileState::Idle, |p| FileState::PendingUpload {
                armed_at: p.armed_at,
                last_event: p.last_event,
                due_at: p.due_at,
            })
    }

    /// Number of pending files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
