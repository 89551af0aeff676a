//! Ingest flow tests for the agent.
//!
//! These tests verify:
//! 1. A config file on disk drives the partition of uploaded keys
//! 2. Files present at startup go through the upload gate, not straight out
//! 3. Invalid dates and foreign names never reach storage
//! 4. Uploaded files are visible through the catalog and search

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logvault_agent::{AgentConfig, HostId, Ingestor, WatchEventKind, WatchSignal, WatchStream};
use logvault_core::{CatalogReader, InMemoryStorage, SearchEngine};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

fn create_temp_config(log_directory: &Path) -> NamedTempFile {
    let config = format!(
        r#"{{
            "log_directory": "{}",
            "app_name": "payments",
            "environment": "prod",
            "host_id": "10.0.0.5",
            "s3": {{
                "endpoint": "http://127.0.0.1:9000",
                "bucket": "app-logs",
                "access_key": "minio",
                "secret_key": "minio123"
            }}
        }}"#,
        log_directory.display()
    );
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(config.as_bytes()).expect("write config");
    file
}

fn write_log(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).expect("write log");
}

fn ingestor_for(dir: &Path, store: Arc<InMemoryStorage>) -> Ingestor {
    let config_file = create_temp_config(dir);
    let config = AgentConfig::load(config_file.path()).expect("config loads");
    let host_id = HostId::detect(config.host_id.as_deref());
    Ingestor::from_config(&config, store, host_id)
}

// ============================================================================
// Startup Scan
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_startup_scan_waits_for_quiescence() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "payments-05-03-2024-7.log", "charge ok\n");

    let store = Arc::new(InMemoryStorage::new("app-logs"));
    let mut ingestor = ingestor_for(dir.path(), store.clone());
    assert_eq!(ingestor.scan_directory(tokio::time::Instant::now()).await, 1);

    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { ingestor.run(WatchStream::from_channel(rx), cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(store.is_empty(), "nothing is uploaded before the quiescence window");

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(
        store.keys(),
        vec!["prod/payments/10.0.0.5/2024-03-05/payments-05-03-2024-7.log"]
    );

    cancel.cancel();
    let stats = task.await.expect("join");
    assert_eq!(stats.uploaded, 1);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_and_foreign_names_never_reach_storage() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "payments-31-02-2024-1.log", "x\n");
    write_log(dir.path(), "payments.log", "x\n");
    write_log(dir.path(), "payments-05-03-2024-1.log.gz", "x\n");

    let store = Arc::new(InMemoryStorage::new("app-logs"));
    let mut ingestor = ingestor_for(dir.path(), store.clone());
    ingestor.scan_directory(tokio::time::Instant::now()).await;
    let stats = ingestor.flush_pending().await;

    assert_eq!(stats.uploaded, 0);
    assert_eq!(stats.skipped, 2);
    assert_eq!(store.request_counts().total(), 0);
}

// ============================================================================
// Live Events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rotation_burst_uploads_each_file_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(InMemoryStorage::new("app-logs"));
    let mut ingestor = ingestor_for(dir.path(), store.clone());

    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(async move {
        ingestor
            .run(WatchStream::from_channel(rx), CancellationToken::new())
            .await
    });

    for seq in 1..=3 {
        let name = format!("payments-05-03-2024-{seq}.log");
        write_log(dir.path(), &name, "line\n");
        for kind in [WatchEventKind::Created, WatchEventKind::Modified, WatchEventKind::Modified] {
            tx.send(WatchSignal::Changed {
                kind,
                path: dir.path().join(&name),
            })
            .await
            .expect("send");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    drop(tx);
    let stats = task.await.expect("join");

    assert_eq!(stats.uploaded, 3);
    assert_eq!(store.request_counts().puts, 3);
}

// ============================================================================
// Round Trip Through The Query Side
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_uploaded_files_are_listed_and_searchable() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_log(dir.path(), "payments-05-03-2024-10.log", "refund issued\n");
    write_log(dir.path(), "payments-05-03-2024-2.log", "charge ok\r\nERROR card declined\r\n");
    write_log(dir.path(), "payments-06-03-2024-1.log", "ERROR next day\n");

    let store = Arc::new(InMemoryStorage::new("app-logs"));
    let mut ingestor = ingestor_for(dir.path(), store.clone());
    ingestor.scan_directory(tokio::time::Instant::now()).await;
    assert_eq!(ingestor.flush_pending().await.uploaded, 3);

    let files = CatalogReader::new(store.clone())
        .list_files("prod", "payments", "2024-03-05")
        .await;
    let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["payments-05-03-2024-2.log", "payments-05-03-2024-10.log"]
    );

    let matches = SearchEngine::new(store)
        .search("prod", "payments", "2024-03-05", "ERROR")
        .await;
    assert_eq!(matches, vec!["payments-05-03-2024-2.log"]);
}
