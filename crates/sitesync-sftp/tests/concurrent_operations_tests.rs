//! Concurrent operation tests
//!
//! Many callers sharing one executor, one session per site, one channel per
//! operation.

mod common;

use common::{SITE, harness, harness_with, test_site};
use sitesync_core::SiteId;
use sitesync_sftp::{ClientConfig, UploadOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_share_one_session() {
    let h = harness();
    h.server.state().handshake_delay = Duration::from_millis(20);
    h.server.add_dir("/incoming");
    let executor = Arc::new(h.executor);

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let executor = Arc::clone(&executor);
        tasks.spawn(async move {
            let data = format!("payload {i}").into_bytes();
            executor
                .upload_file(
                    SITE,
                    &format!("/incoming/file-{i:02}.txt"),
                    data,
                    UploadOptions::verified(),
                )
                .await
        });
    }

    while let Some(result) = tasks.join_next().await {
        let outcome = result.unwrap().unwrap();
        assert!(outcome.verified);
    }

    assert_eq!(h.server.handshakes(SITE), 1);
    assert_eq!(executor.connections().connection_count(SITE).await, 1);
    assert_eq!(h.server.state().channels_opened, 20);
    assert_eq!(h.recorder.records().len(), 20);

    let entries = executor.list_files(SITE, "/incoming").await.unwrap();
    assert_eq!(entries.len(), 20);
    assert_eq!(entries[0].name, "file-00.txt");
    assert_eq!(entries[19].name, "file-19.txt");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mixed_operations_across_sites() {
    let sites = vec![test_site(1), test_site(2), test_site(3)];
    let h = harness_with(ClientConfig::default(), sites);
    for id in 1..=3 {
        h.server.add_file(&format!("/site-{id}/seed.txt"), b"seed");
    }
    let executor = Arc::new(h.executor);

    let mut tasks = JoinSet::new();
    for id in 1..=3u64 {
        for round in 0..5 {
            let executor = Arc::clone(&executor);
            tasks.spawn(async move {
                let site = SiteId(id);
                let dir = format!("/site-{id}");
                executor.list_files(site, &dir).await?;
                executor
                    .download_file(site, &format!("{dir}/seed.txt"))
                    .await?;
                executor
                    .create_directory(site, &format!("{dir}/round-{round}/nested"), true)
                    .await
            });
        }
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    for id in 1..=3u64 {
        assert_eq!(h.server.handshakes(SiteId(id)), 1);
        for round in 0..5 {
            assert!(h.server.exists(&format!("/site-{id}/round-{round}/nested")));
        }
    }
    assert_eq!(h.recorder.records().len(), 45);
    assert_eq!(executor.metrics().snapshot().operation_failures, 0);
}

/// Overlapping recursive mkdirs of the same tree all succeed
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recursive_mkdir_same_path() {
    let h = harness();
    let executor = Arc::new(h.executor);

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let executor = Arc::clone(&executor);
        tasks.spawn(async move { executor.create_directory(SITE, "/x/y/z", true).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert!(h.server.exists("/x/y/z"));
}

/// Closing sessions under load only ever surfaces transport faults
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_all_during_operations() {
    let h = harness();
    h.server.add_file("/a.txt", b"a");
    let executor = Arc::new(h.executor);

    let mut tasks = JoinSet::new();
    for i in 0..30 {
        let executor = Arc::clone(&executor);
        tasks.spawn(async move {
            if i % 10 == 5 {
                executor.close_all_sessions().await;
                return Ok(());
            }
            executor.get_file_info(SITE, "/a.txt").await.map(|_| ())
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result.unwrap() {
            assert!(e.is_transport_fault(), "unexpected error {e}");
        }
    }

    // The cache recovers on the next call
    executor.get_file_info(SITE, "/a.txt").await.unwrap();
}
