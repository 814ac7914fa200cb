//! Download manager integration tests against a real filesystem and an
//! in-memory database.

mod common;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{DownloadStream, HttpClient};
use bridge_traits::time::FixedClock;
use common::*;
use core_library::db::create_test_pool;
use core_library::models::{ContentId, ContentType};
use core_library::repositories::{DownloadRepository, SqliteDownloadRepository};
use core_offline::{
    ContentCipher, DownloadHandle, DownloadManager, DownloadOutcome, DownloadState,
    EncryptionKey, OfflineConfig, StorageLayout,
};
use core_runtime::events::{
    ContentEvent, CoreEvent, DownloadEvent, DownloadFailureKind, DownloadProgress,
};
use futures::TryStreamExt;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

async fn wait_for_percent(handle: &DownloadHandle, at_least: u8) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|state| match state {
            DownloadState::Running {
                progress: Some(progress),
            } => progress.percent().is_some_and(|p| p >= at_least),
            _ => false,
        }),
    )
    .await
    .expect("progress never reached target")
    .unwrap();
}

async fn wait_for_running(handle: &DownloadHandle) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|state| matches!(state, DownloadState::Running { .. })),
    )
    .await
    .expect("job never started")
    .unwrap();
}

fn progress_events(events: &[CoreEvent], id: &str) -> Vec<DownloadProgress> {
    events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Download(DownloadEvent::Progress {
                content_id,
                progress,
            }) if content_id == id => Some(*progress),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Successful downloads
// ============================================================================

#[core_async::test]
async fn test_large_pdf_reports_monotonic_progress_then_completes() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    let data = payload(10 * 1024 * 1024);
    harness.http.body(&url("pdf-1"), data.clone());

    let handle = harness
        .manager
        .download_content(item("pdf-1", ContentType::Pdf), course())
        .await
        .unwrap();
    let outcome = handle.wait().await;

    let record = match outcome {
        DownloadOutcome::Completed { record } => record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert!(record.is_downloaded);
    assert_eq!(record.total_bytes, Some(data.len() as i64));
    let path = record.encrypted_path().unwrap().to_path_buf();
    assert!(path.exists());
    assert!(path.to_string_lossy().ends_with("content_pdf-1_encrypted.pdf"));
    // IV prefix plus ciphertext of equal length.
    assert_eq!(
        std::fs::metadata(&path).unwrap().len(),
        data.len() as u64 + 16
    );

    let events = drain(&mut events);
    let percents: Vec<u8> = progress_events(&events, "pdf-1")
        .iter()
        .map(|p| p.percent().unwrap())
        .collect();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] < w[1]));

    let completed: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, CoreEvent::Download(DownloadEvent::Completed { .. })))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(completed.len(), 1);
    let last_progress = events
        .iter()
        .rposition(|e| matches!(e, CoreEvent::Download(DownloadEvent::Progress { .. })))
        .unwrap();
    assert!(completed[0] > last_progress);
    assert!(matches!(
        &events[completed[0]],
        CoreEvent::Download(DownloadEvent::Completed { bytes, .. }) if *bytes == data.len() as u64
    ));

    let stored = harness
        .repository
        .find_by_id(&ContentId::new("pdf-1"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_downloaded);
    assert_eq!(stored.downloaded_at, Some(NOW));
    assert_eq!(stored.course_name, "Organic Chemistry");
    assert_eq!(stored.tags, vec!["chemistry", "exam-prep"]);
    assert!(stored.content_hash.is_some());
    assert!(harness
        .manager
        .is_content_downloaded(&ContentId::new("pdf-1"))
        .await
        .unwrap());
    assert!(!harness.manager.is_downloading(&ContentId::new("pdf-1")));
}

#[core_async::test]
async fn test_unknown_length_reports_indeterminate_progress() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    harness.http.body_without_length(&url("audio-1"), payload(20_000));

    let handle = harness
        .manager
        .download_content(item("audio-1", ContentType::Audio), course())
        .await
        .unwrap();
    assert!(handle.wait().await.is_completed());

    let progress = progress_events(&drain(&mut events), "audio-1");
    assert!(!progress.is_empty());
    assert!(progress
        .iter()
        .all(|p| matches!(p, DownloadProgress::Indeterminate { .. })));
    assert_eq!(
        progress.last(),
        Some(&DownloadProgress::Indeterminate {
            bytes_downloaded: 20_000
        })
    );
}

#[core_async::test]
async fn test_empty_body_completes() {
    let harness = Harness::new().await;
    harness.http.body(&url("empty"), Vec::new());

    let handle = harness
        .manager
        .download_content(item("empty", ContentType::Other), course())
        .await
        .unwrap();

    match handle.wait().await {
        DownloadOutcome::Completed { record } => {
            assert_eq!(record.total_bytes, Some(0));
            assert!(record
                .encrypted_file_path
                .unwrap()
                .ends_with("content_empty_encrypted.bin"));
        }
        other => panic!("expected completion, got {:?}", other),
    }
}

// ============================================================================
// Cancellation and failures
// ============================================================================

#[core_async::test]
async fn test_cancel_midway_leaves_nothing_behind() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    let mut source = harness.http.controlled(&url("video-1"), Some(100_000));
    let id = ContentId::new("video-1");

    let handle = harness
        .manager
        .download_content(item("video-1", ContentType::Video), course())
        .await
        .unwrap();
    assert!(harness.manager.is_downloading(&id));

    source.write_all(&payload(40_000)).await.unwrap();
    wait_for_percent(&handle, 40).await;

    assert!(harness.manager.cancel_download(&id).await.unwrap());
    assert!(matches!(handle.wait().await, DownloadOutcome::Cancelled));
    assert!(handle.is_cancelled());

    assert!(!harness.manager.is_downloading(&id));
    assert!(harness.repository.find_by_id(&id).await.unwrap().is_none());
    assert!(!harness
        .layout
        .encrypted_path(&id, "mp4")
        .exists());
    assert!(harness.secure_files().is_empty());

    let events = drain(&mut events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, CoreEvent::Download(DownloadEvent::Failed { .. }))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, CoreEvent::Download(DownloadEvent::Completed { .. }))));
    drop(source);
}

#[core_async::test]
async fn test_cancel_unknown_download_returns_false() {
    let harness = Harness::new().await;
    assert!(!harness
        .manager
        .cancel_download(&ContentId::new("nothing"))
        .await
        .unwrap());
}

#[core_async::test]
async fn test_one_failure_does_not_affect_other_downloads() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    harness
        .http
        .failing(&url("broken"), payload(10_000), Some(50_000));
    harness.http.body(&url("fine"), payload(30_000));

    let broken = harness
        .manager
        .download_content(item("broken", ContentType::Video), course())
        .await
        .unwrap();
    let fine = harness
        .manager
        .download_content(item("fine", ContentType::Audio), course())
        .await
        .unwrap();

    match broken.wait().await {
        DownloadOutcome::Failed { kind, reason } => {
            assert_eq!(kind, DownloadFailureKind::Network);
            assert!(!reason.is_empty());
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(fine.wait().await.is_completed());

    let broken_id = ContentId::new("broken");
    assert!(harness
        .repository
        .find_by_id(&broken_id)
        .await
        .unwrap()
        .is_none());
    assert!(!harness.layout.encrypted_path(&broken_id, "mp4").exists());
    assert!(harness
        .manager
        .is_content_downloaded(&ContentId::new("fine"))
        .await
        .unwrap());

    let failed: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::Download(DownloadEvent::Failed { .. })))
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].content_id(), Some("broken"));
}

#[core_async::test]
async fn test_http_status_error_fails_with_network_kind() {
    let harness = Harness::new().await;
    harness.http.status(&url("gone"), 410);

    let handle = harness
        .manager
        .download_content(item("gone", ContentType::Pdf), course())
        .await
        .unwrap();

    match handle.wait().await {
        DownloadOutcome::Failed { kind, reason } => {
            assert_eq!(kind, DownloadFailureKind::Network);
            assert!(reason.contains("410"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[core_async::test]
async fn test_short_body_is_a_network_failure() {
    let harness = Harness::new().await;
    let mut source = harness.http.controlled(&url("short"), Some(10_000));

    let handle = harness
        .manager
        .download_content(item("short", ContentType::Pdf), course())
        .await
        .unwrap();
    source.write_all(&payload(4_000)).await.unwrap();
    drop(source);

    match handle.wait().await {
        DownloadOutcome::Failed { kind, reason } => {
            assert_eq!(kind, DownloadFailureKind::Network);
            assert!(reason.contains("4000 of 10000"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(harness.secure_files().is_empty());
}

#[core_async::test]
async fn test_invalid_requests_are_rejected_up_front() {
    let harness = Harness::new().await;

    let mut bad_url = item("bad", ContentType::Video);
    bad_url.content_url = "ftp://cdn.example.com/bad".to_string();
    let err = harness
        .manager
        .download_content(bad_url, course())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), DownloadFailureKind::InvalidRequest);

    let err = harness
        .manager
        .download_content(item("", ContentType::Video), course())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), DownloadFailureKind::InvalidRequest);

    assert_eq!(harness.repository.count().await.unwrap(), 0);
    assert!(harness.manager.active_downloads().is_empty());
}

// ============================================================================
// Supersession
// ============================================================================

#[core_async::test]
async fn test_second_request_supersedes_active_job() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    let id = ContentId::new("lecture");
    let mut first_source = harness.http.controlled(&url("lecture"), Some(100_000));
    let data = payload(64_000);
    harness.http.body(&url("lecture"), data.clone());

    let first = harness
        .manager
        .download_content(item("lecture", ContentType::Video), course())
        .await
        .unwrap();
    first_source.write_all(&payload(20_000)).await.unwrap();
    wait_for_percent(&first, 20).await;

    let second = harness
        .manager
        .download_content(item("lecture", ContentType::Video), course())
        .await
        .unwrap();
    assert_ne!(first.job_id(), second.job_id());

    assert!(matches!(first.wait().await, DownloadOutcome::Cancelled));
    let record = match second.wait().await {
        DownloadOutcome::Completed { record } => record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(record.total_bytes, Some(data.len() as i64));
    assert_eq!(harness.http.calls(&url("lecture")), 2);

    let stored = harness.repository.find_by_id(&id).await.unwrap().unwrap();
    assert!(stored.is_downloaded);
    assert!(stored.encrypted_path().unwrap().exists());
    assert_eq!(harness.secure_files().len(), 1);

    let completed = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::Download(DownloadEvent::Completed { .. })))
        .count();
    assert_eq!(completed, 1);
    drop(first_source);
}

// ============================================================================
// Queries and deletion
// ============================================================================

#[core_async::test]
async fn test_stale_downloaded_flag_is_not_trusted() {
    let harness = Harness::new().await;
    let id = ContentId::new("notes");
    harness.http.body(&url("notes"), payload(5_000));

    let record = match harness
        .manager
        .download_content(item("notes", ContentType::Pdf), course())
        .await
        .unwrap()
        .wait()
        .await
    {
        DownloadOutcome::Completed { record } => record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert!(harness.manager.is_content_downloaded(&id).await.unwrap());

    std::fs::remove_file(record.encrypted_path().unwrap()).unwrap();
    assert!(!harness.manager.is_content_downloaded(&id).await.unwrap());
    assert!(!harness
        .manager
        .is_content_downloaded(&ContentId::new("never"))
        .await
        .unwrap());
}

#[core_async::test]
async fn test_get_all_downloads_lists_downloaded_and_active() {
    let harness = Harness::new().await;
    harness.http.body(&url("done"), payload(1_000));
    let source = harness.http.controlled(&url("running"), Some(10_000));

    let done = harness
        .manager
        .download_content(item("done", ContentType::Audio), course())
        .await
        .unwrap();
    assert!(done.wait().await.is_completed());

    // Flagged downloaded, but the artifact was removed behind our back.
    harness.http.body(&url("stale"), payload(1_000));
    let stale = harness
        .manager
        .download_content(item("stale", ContentType::Pdf), course())
        .await
        .unwrap();
    match stale.wait().await {
        DownloadOutcome::Completed { record } => {
            std::fs::remove_file(record.encrypted_path().unwrap()).unwrap();
        }
        other => panic!("expected completion, got {:?}", other),
    }

    let running = harness
        .manager
        .download_content(item("running", ContentType::Video), course())
        .await
        .unwrap();
    wait_for_running(&running).await;

    // Pending row with no job behind it, left over from an earlier run.
    let mut leftover = core_library::models::ContentDownloadRecord::pending(
        &item("leftover", ContentType::Pdf),
        &course(),
        NOW,
    );
    leftover.updated_at = NOW;
    harness.repository.upsert(&leftover).await.unwrap();

    let mut ids: Vec<String> = harness
        .manager
        .get_all_downloads()
        .map_ok(|record| record.id.to_string())
        .try_collect()
        .await
        .unwrap();
    ids.sort();
    assert_eq!(ids, vec!["done".to_string(), "running".to_string()]);
    assert!(harness
        .repository
        .find_by_id(&ContentId::new("stale"))
        .await
        .unwrap()
        .is_some_and(|record| record.is_downloaded));

    // A second call restarts from the first record.
    let again: Vec<_> = harness
        .manager
        .get_all_downloads()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(again.len(), 2);

    running.cancel();
    running.wait().await;
    drop(source);
}

#[core_async::test]
async fn test_lookalike_ids_keep_separate_artifacts() {
    let harness = Harness::new().await;
    harness.http.body(&url("a.b"), payload(3_000));
    harness.http.body(&url("a_b"), payload(5_000));

    let mut records = Vec::new();
    for id in ["a.b", "a_b"] {
        let outcome = harness
            .manager
            .download_content(item(id, ContentType::Pdf), course())
            .await
            .unwrap()
            .wait()
            .await;
        match outcome {
            DownloadOutcome::Completed { record } => records.push(record),
            other => panic!("expected completion of {}, got {:?}", id, other),
        }
    }
    assert_ne!(records[0].encrypted_path(), records[1].encrypted_path());
    assert_eq!(harness.secure_files().len(), 2);

    for (record, len) in records.iter().zip([3_000, 5_000]) {
        let file = harness.reader.get_decrypted_file(record).await.unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), payload(len));
        file.release().await.unwrap();
    }

    harness.manager.delete_download(&records[0]).await.unwrap();
    assert!(!harness
        .manager
        .is_content_downloaded(&ContentId::new("a.b"))
        .await
        .unwrap());
    assert!(harness
        .manager
        .is_content_downloaded(&ContentId::new("a_b"))
        .await
        .unwrap());

    let file = harness.reader.get_decrypted_file(&records[1]).await.unwrap();
    assert_eq!(std::fs::read(file.path()).unwrap(), payload(5_000));
    file.release().await.unwrap();
}

#[core_async::test]
async fn test_delete_download_removes_file_and_record() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();
    let id = ContentId::new("slides");
    harness.http.body(&url("slides"), payload(8_000));

    let record = match harness
        .manager
        .download_content(item("slides", ContentType::Pdf), course())
        .await
        .unwrap()
        .wait()
        .await
    {
        DownloadOutcome::Completed { record } => record,
        other => panic!("expected completion, got {:?}", other),
    };
    let path = record.encrypted_path().unwrap().to_path_buf();

    harness.manager.delete_download(&record).await.unwrap();

    assert!(!path.exists());
    assert!(harness.repository.find_by_id(&id).await.unwrap().is_none());
    assert!(!harness.manager.is_content_downloaded(&id).await.unwrap());
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        CoreEvent::Content(ContentEvent::Deleted { content_id }) if content_id == "slides"
    )));

    // Deleting again is harmless.
    harness.manager.delete_download(&record).await.unwrap();
}

#[core_async::test]
async fn test_delete_download_cancels_active_job() {
    let harness = Harness::new().await;
    let mut source = harness.http.controlled(&url("stream"), Some(50_000));
    let id = ContentId::new("stream");

    let handle = harness
        .manager
        .download_content(item("stream", ContentType::Video), course())
        .await
        .unwrap();
    source.write_all(&payload(10_000)).await.unwrap();
    wait_for_percent(&handle, 20).await;

    let record = harness.repository.find_by_id(&id).await.unwrap().unwrap();
    harness.manager.delete_download(&record).await.unwrap();

    assert!(matches!(handle.wait().await, DownloadOutcome::Cancelled));
    assert!(harness.repository.find_by_id(&id).await.unwrap().is_none());
    assert!(harness.secure_files().is_empty());
    drop(source);
}

// ============================================================================
// Orphan cleanup
// ============================================================================

#[core_async::test]
async fn test_cleanup_orphans_removes_broken_state_only() {
    let harness = Harness::new().await;
    let mut events = harness.event_bus.subscribe();

    harness.http.body(&url("keep"), payload(2_000));
    harness.http.body(&url("lost"), payload(2_000));
    for id in ["keep", "lost"] {
        assert!(harness
            .manager
            .download_content(item(id, ContentType::Audio), course())
            .await
            .unwrap()
            .wait()
            .await
            .is_completed());
    }

    // Artifact deleted behind the manager's back.
    std::fs::remove_file(harness.layout.encrypted_path(&ContentId::new("lost"), "mp3")).unwrap();
    // Pending row from a crashed run.
    let crashed = core_library::models::ContentDownloadRecord::pending(
        &item("crashed", ContentType::Video),
        &course(),
        NOW,
    );
    harness.repository.upsert(&crashed).await.unwrap();
    // Artifact without a record.
    let stray = harness
        .layout
        .encrypted_path(&ContentId::new("stray"), "mp4");
    std::fs::write(&stray, b"not referenced").unwrap();

    let removed = harness.manager.cleanup_orphans().await.unwrap();
    assert_eq!(removed, 3);

    let remaining: Vec<_> = harness
        .repository
        .find_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    assert_eq!(remaining, vec!["keep".to_string()]);
    assert!(!stray.exists());
    assert_eq!(harness.secure_files().len(), 1);
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        CoreEvent::Content(ContentEvent::OrphansCleaned { count: 3 })
    )));

    assert_eq!(harness.manager.cleanup_orphans().await.unwrap(), 0);
}

#[core_async::test]
async fn test_cleanup_orphans_spares_active_jobs() {
    let harness = Harness::new().await;
    let mut source = harness.http.controlled(&url("live"), Some(20_000));
    let id = ContentId::new("live");

    let handle = harness
        .manager
        .download_content(item("live", ContentType::Video), course())
        .await
        .unwrap();
    source.write_all(&payload(5_000)).await.unwrap();
    wait_for_percent(&handle, 25).await;

    assert_eq!(harness.manager.cleanup_orphans().await.unwrap(), 0);
    assert!(harness.repository.find_by_id(&id).await.unwrap().is_some());
    assert!(harness.layout.encrypted_path(&id, "mp4").exists());

    source.write_all(&payload(15_000)).await.unwrap();
    drop(source);
    assert!(handle.wait().await.is_completed());
}

#[core_async::test]
async fn test_purge_all_removes_everything() {
    let harness = Harness::new().await;
    harness.http.body(&url("a"), payload(1_000));
    harness.http.body(&url("b"), payload(1_000));
    for id in ["a", "b"] {
        harness
            .manager
            .download_content(item(id, ContentType::Pdf), course())
            .await
            .unwrap()
            .wait()
            .await;
    }

    assert_eq!(harness.manager.purge_all().await.unwrap(), 2);
    assert_eq!(harness.repository.count().await.unwrap(), 0);
    assert!(harness.secure_files().is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrency_cap_queues_extra_jobs() {
    let harness =
        Harness::with_config(OfflineConfig::default().with_max_concurrent_downloads(Some(1)))
            .await;
    let mut first_source = harness.http.controlled(&url("first"), Some(1_000));
    harness.http.body(&url("second"), payload(1_000));

    let first = harness
        .manager
        .download_content(item("first", ContentType::Audio), course())
        .await
        .unwrap();
    let second = harness
        .manager
        .download_content(item("second", ContentType::Audio), course())
        .await
        .unwrap();

    wait_for_running(&first).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(second.state(), DownloadState::Queued));
    assert_eq!(harness.http.calls(&url("second")), 0);

    first_source.write_all(&payload(1_000)).await.unwrap();
    drop(first_source);

    assert!(first.wait().await.is_completed());
    assert!(second.wait().await.is_completed());
    assert_eq!(harness.http.calls(&url("second")), 1);
}

#[core_async::test]
async fn test_cancelling_queued_job_releases_nothing() {
    let harness =
        Harness::with_config(OfflineConfig::default().with_max_concurrent_downloads(Some(1)))
            .await;
    let mut first_source = harness.http.controlled(&url("holder"), Some(100));
    harness.http.body(&url("waiting"), payload(100));

    let first = harness
        .manager
        .download_content(item("holder", ContentType::Pdf), course())
        .await
        .unwrap();
    wait_for_running(&first).await;

    let waiting = harness
        .manager
        .download_content(item("waiting", ContentType::Pdf), course())
        .await
        .unwrap();
    assert!(harness
        .manager
        .cancel_download(&ContentId::new("waiting"))
        .await
        .unwrap());
    assert!(matches!(waiting.wait().await, DownloadOutcome::Cancelled));
    assert_eq!(harness.http.calls(&url("waiting")), 0);

    first_source.write_all(&payload(100)).await.unwrap();
    drop(first_source);
    assert!(first.wait().await.is_completed());
}

// ============================================================================
// Mocked HTTP
// ============================================================================

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn download_stream(&self, url: String) -> BridgeResult<DownloadStream>;
    }
}

#[core_async::test]
async fn test_transport_error_from_client_is_reported() {
    let root = scratch_root();
    let fs = scratch_fs(&root);
    let config = OfflineConfig::default();
    let layout = StorageLayout::resolve(fs.as_ref(), &config).await.unwrap();
    let repository = Arc::new(SqliteDownloadRepository::new(
        create_test_pool().await.unwrap(),
    ));

    let mut http = MockHttp::new();
    http.expect_download_stream()
        .withf(|url| url == "https://cdn.example.com/content/offline")
        .times(1)
        .returning(|_| Err(BridgeError::Network("connection refused".to_string())));

    let manager = DownloadManager::new(
        config,
        repository.clone(),
        Arc::new(http),
        fs,
        ContentCipher::new(EncryptionKey::from_bytes(&[7u8; 32]).unwrap()),
        layout,
    )
    .with_clock(Arc::new(FixedClock::at_unix(NOW)));
    manager.initialize().await.unwrap();

    let handle = manager
        .download_content(item("offline", ContentType::Video), course())
        .await
        .unwrap();

    match handle.wait().await {
        DownloadOutcome::Failed { kind, reason } => {
            assert_eq!(kind, DownloadFailureKind::Network);
            assert!(reason.contains("connection refused"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(repository.count().await.unwrap(), 0);

    std::fs::remove_dir_all(&root).ok();
}
