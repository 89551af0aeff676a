//! Directory ingestor.
//!
//! Both the startup scan and the live watch feed the [`UploadGate`]; files
//! leaving the gate are uploaded one at a time by the same loop. Nothing runs
//! concurrently: while an upload is in flight, watch signals queue up in the
//! channel.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use logvault_core::ObjectStorage;
use logvault_core::codec::has_log_suffix;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::gate::{GateDecision, UploadGate};
use crate::host::HostId;
use crate::uploader::{UploadOutcome, Uploader};
use crate::watcher::{WatchSignal, WatchStream};

/// Counters for one ingestor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Files stored.
    pub uploaded: u64,
    /// Files skipped for their name or date.
    pub skipped: u64,
    /// Files whose read or upload failed.
    pub failed: u64,
    /// Lost-event notifications received.
    pub overflows: u64,
}

/// Ships the log files of one directory.
pub struct Ingestor {
    directory: PathBuf,
    gate: UploadGate,
    uploader: Uploader,
    rescan_on_overflow: bool,
    stats: IngestStats,
}

impl Ingestor {
    /// Creates an ingestor for `directory`.
    pub fn new(directory: impl Into<PathBuf>, uploader: Uploader, gate: UploadGate) -> Self {
        Self {
            directory: directory.into(),
            gate,
            uploader,
            rescan_on_overflow: false,
            stats: IngestStats::default(),
        }
    }

    /// Builds an ingestor from a validated configuration.
    pub fn from_config(config: &AgentConfig, storage: Arc<dyn ObjectStorage>, host_id: HostId) -> Self {
        let uploader = Uploader::new(storage, &config.environment, &config.app_name, host_id);
        let gate = UploadGate::new(config.gate.quiescence(), config.gate.coalesce());
        Self::new(&config.log_directory, uploader, gate)
            .with_rescan_on_overflow(config.rescan_on_overflow)
    }

    /// Re-scans the directory whenever the watch reports lost events.
    #[must_use]
    pub const fn with_rescan_on_overflow(mut self, enabled: bool) -> Self {
        self.rescan_on_overflow = enabled;
        self
    }

    /// Watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Pending upload state.
    #[must_use]
    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Arms the gate for every `.log` file currently in the directory.
    ///
    /// Returns the number of files found. An unreadable directory is logged
    /// and counts as empty.
    pub async fn scan_directory(&mut self, now: Instant) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(directory = %self.directory.display(), error = %e, "failed to scan log directory");
                return 0;
            }
        };

        let mut found = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(directory = %self.directory.display(), error = %e, "error while scanning log directory");
                    break;
                }
            };
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            let is_log = entry.file_name().to_str().is_some_and(has_log_suffix);
            if is_file && is_log {
                self.gate.observe(&entry.path(), now);
                found += 1;
            }
        }

        info!(directory = %self.directory.display(), files = found, "scanned log directory");
        found
    }

    /// Uploads every pending file immediately.
    pub async fn flush_pending(&mut self) -> IngestStats {
        let pending = self.gate.drain();
        self.upload_all(pending).await;
        self.stats
    }

    /// Runs the watch loop until `cancel` fires or the watch closes.
    ///
    /// The watch is released before this returns, on every path.
    pub async fn run(&mut self, mut watch: WatchStream, cancel: CancellationToken) -> IngestStats {
        info!(directory = %self.directory.display(), "watching for log files");

        loop {
            let next_due = self.gate.next_due();
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!("shutdown requested, stopping watch loop");
                    break;
                }

                () = sleep_until_due(next_due) => {
                    let due = self.gate.take_due(Instant::now());
                    self.upload_all(due).await;
                }

                signal = watch.next() => match signal {
                    Some(WatchSignal::Changed { kind, path }) => {
                        let decision = self.gate.observe(&path, Instant::now());
                        if decision != GateDecision::Coalesced {
                            debug!(path = %path.display(), kind = ?kind, decision = ?decision, "file event");
                        }
                    }
                    Some(WatchSignal::Overflow) => {
                        self.stats.overflows += 1;
                        warn!(directory = %self.directory.display(), "watch overflow, some file events were lost");
                        if self.rescan_on_overflow {
                            self.scan_directory(Instant::now()).await;
                        }
                    }
                    Some(WatchSignal::Error(e)) => {
                        warn!(directory = %self.directory.display(), error = %e, "watch backend error");
                    }
                    None => {
                        info!("watch channel closed, stopping watch loop");
                        break;
                    }
                },
            }
        }

        watch.close();
        drop(watch);
        info!(
            uploaded = self.stats.uploaded,
            skipped = self.stats.skipped,
            failed = self.stats.failed,
            "watch loop stopped"
        );
        self.stats
    }

    async fn upload_all(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            let still_there = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file());
            if !still_there {
                debug!(path = %path.display(), "file vanished before upload");
                continue;
            }
            match self.uploader.upload(&path).await {
                UploadOutcome::Uploaded { .. } => self.stats.uploaded += 1,
                UploadOutcome::Skipped(_) => self.stats.skipped += 1,
                UploadOutcome::Failed(_) => self.stats.failed += 1,
            }
        }
    }
}

async fn sleep_until_due(due: Option<Instant>) {
    match due {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cancels `cancel` once `signal` resolves.
///
/// If the listener itself fails, the error is logged and the token is left
/// alone: the ingestor keeps running until something else stops it.
pub async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("received interrupt");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "failed to listen for interrupt, running without it"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::WatchEventKind;
    use logvault_core::InMemoryStorage;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const Q: Duration = Duration::from_millis(2000);
    const C: Duration = Duration::from_millis(500);

    fn ingestor(dir: &Path, store: Arc<InMemoryStorage>) -> Ingestor {
        let uploader = Uploader::new(store, "prod", "payments", HostId::new("10.0.0.5"));
        Ingestor::new(dir, uploader, UploadGate::new(Q, C))
    }

    fn changed(path: &Path) -> WatchSignal {
        WatchSignal::Changed {
            kind: WatchEventKind::Modified,
            path: path.to_path_buf(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_only_arms_log_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("payments-05-03-2024-1.log"), "a\n").expect("write");
        std::fs::write(dir.path().join("notes.txt"), "a\n").expect("write");
        std::fs::create_dir(dir.path().join("archive.log")).expect("mkdir");

        let mut ingestor = ingestor(dir.path(), Arc::new(InMemoryStorage::new("logs")));
        assert_eq!(ingestor.scan_directory(Instant::now()).await, 1);
        assert_eq!(ingestor.gate().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_arms_names_the_watcher_forwards() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(".log"), "a\n").expect("write");
        std::fs::write(dir.path().join("payments-05-03-2024-1.log.gz"), "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        assert_eq!(ingestor.scan_directory(Instant::now()).await, 1);

        let stats = ingestor.flush_pending().await;
        assert_eq!(stats.skipped, 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_of_missing_directory_is_empty() {
        let mut ingestor = ingestor(
            Path::new("/nonexistent/logvault"),
            Arc::new(InMemoryStorage::new("logs")),
        );
        assert_eq!(ingestor.scan_directory(Instant::now()).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pending_uploads_and_skips() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("payments-05-03-2024-1.log"), "a\n").expect("write");
        std::fs::write(dir.path().join("payments-31-02-2024-1.log"), "a\n").expect("write");
        std::fs::write(dir.path().join("payments.log"), "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        ingestor.scan_directory(Instant::now()).await;
        let stats = ingestor.flush_pending().await;

        assert_eq!(stats.uploaded, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(
            store.keys(),
            vec!["prod/payments/10.0.0.5/2024-03-05/payments-05-03-2024-1.log"]
        );
        assert!(ingestor.gate().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_wait_for_quiescence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payments-05-03-2024-2.log");
        std::fs::write(&path, "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { ingestor.run(WatchStream::from_channel(rx), cancel).await }
        });

        tx.send(changed(&path)).await.expect("send");
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(changed(&path)).await.expect("send");

        tokio::time::sleep(Duration::from_millis(1800)).await;
        assert_eq!(store.request_counts().puts, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.request_counts().puts, 1);

        cancel.cancel();
        let stats = task.await.expect("join");
        assert_eq!(stats.uploaded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_event_uploads_again() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payments-05-03-2024-3.log");
        std::fs::write(&path, "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        let (tx, rx) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            ingestor
                .run(WatchStream::from_channel(rx), CancellationToken::new())
                .await
        });

        tx.send(changed(&path)).await.expect("send");
        tokio::time::sleep(Duration::from_secs(3)).await;
        std::fs::write(&path, "a\nb\n").expect("append");
        tx.send(changed(&path)).await.expect("send");
        tokio::time::sleep(Duration::from_secs(3)).await;

        drop(tx);
        let stats = task.await.expect("join");
        assert_eq!(stats.uploaded, 2);
        assert_eq!(
            store
                .object("prod/payments/10.0.0.5/2024-03-05/payments-05-03-2024-3.log")
                .as_deref(),
            Some(&b"a\nb\n"[..])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_stops_loop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ingestor = ingestor(dir.path(), Arc::new(InMemoryStorage::new("logs")));
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        let stats = ingestor
            .run(WatchStream::from_channel(rx), CancellationToken::new())
            .await;
        assert_eq!(stats, IngestStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_file_is_not_uploaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payments-05-03-2024-4.log");
        std::fs::write(&path, "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        ingestor.scan_directory(Instant::now()).await;
        std::fs::remove_file(&path).expect("remove");

        let stats = ingestor.flush_pending().await;
        assert_eq!(stats, IngestStats::default());
        assert_eq!(store.request_counts().puts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_rescans_when_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("payments-05-03-2024-5.log"), "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone()).with_rescan_on_overflow(true);
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            ingestor
                .run(WatchStream::from_channel(rx), CancellationToken::new())
                .await
        });

        tx.send(WatchSignal::Overflow).await.expect("send");
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(tx);

        let stats = task.await.expect("join");
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.uploaded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_only_warns_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("payments-05-03-2024-6.log"), "a\n").expect("write");

        let store = Arc::new(InMemoryStorage::new("logs"));
        let mut ingestor = ingestor(dir.path(), store.clone());
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(async move {
            ingestor
                .run(WatchStream::from_channel(rx), CancellationToken::new())
                .await
        });

        tx.send(WatchSignal::Overflow).await.expect("send");
        tx.send(WatchSignal::Error("backend hiccup".to_string())).await.expect("send");
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(tx);

        let stats = task.await.expect("join");
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.uploaded, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_cancels_ingestor() {
        let cancel = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, cancel.clone()).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_signal_listener_keeps_ingestor_running() {
        let cancel = CancellationToken::new();
        cancel_on_signal(
            async { Err(io::Error::other("signal handler unavailable")) },
            cancel.clone(),
        )
        .await;
        assert!(!cancel.is_cancelled());
    }
}
