//! Session persistence across restarts.

mod common;

use tokio_util::sync::CancellationToken;

use common::*;
use metagen::record::GeneratedFields;
use metagen::{JobState, ProcessedRecord, SessionSnapshot};

#[tokio::test]
async fn test_quota_limited_session_resumes_after_restart() {
    let harness = TestHarness::new(vec![Reply::Echo, Reply::Quota]);
    harness.open(products(17));
    harness
        .orchestrator
        .start(INSTRUCTIONS, CancellationToken::new())
        .await
        .unwrap();

    let restarted = harness.restart(vec![]);
    let session = restarted.orchestrator.restore().unwrap().unwrap();
    assert_eq!(session.file_name, "catalog.csv");
    assert_eq!(session.processed, 15);
    assert_eq!(session.total, 17);
    assert!(session.resumable);
    assert_eq!(session.orphaned, 0);
    assert_eq!(restarted.orchestrator.state(), JobState::Idle);

    let report = restarted
        .orchestrator
        .resume(INSTRUCTIONS, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(restarted.service.calls(), vec![vec!["P16", "P17"]]);
    assert_eq!(restarted.ordered().len(), 17);
    assert!(!restarted.saved().unwrap().resumable);
}

#[tokio::test]
async fn test_restore_without_saved_session() {
    let harness = TestHarness::new(vec![]);
    assert!(harness.orchestrator.restore().unwrap().is_none());
}

#[tokio::test]
async fn test_restore_drops_rows_with_unknown_skus() {
    let harness = TestHarness::new(vec![]);
    let original = keyed(&["A", "B"]);
    let processed = vec![
        ProcessedRecord::new(original[0].clone(), GeneratedFields::default()),
        ProcessedRecord::new(product("GHOST"), GeneratedFields::default()),
    ];
    harness
        .store
        .save(&SessionSnapshot::new("catalog.csv", original, processed, true))
        .unwrap();

    let session = harness.orchestrator.restore().unwrap().unwrap();

    assert_eq!(session.orphaned, 1);
    assert_eq!(session.processed, 1);
    assert_eq!(harness.ordered_keys(), vec!["A"]);
}

#[tokio::test]
async fn test_opening_a_new_upload_supersedes_saved_session() {
    let harness = TestHarness::new(vec![Reply::Quota]);
    harness.open(keyed(&["A", "B"]));
    harness
        .orchestrator
        .start(INSTRUCTIONS, CancellationToken::new())
        .await
        .unwrap();
    assert!(harness.saved().unwrap().resumable);

    harness
        .orchestrator
        .open("next.csv", keyed(&["X", "Y", "Z"]))
        .unwrap();

    let saved = harness.saved().unwrap();
    assert_eq!(saved.file_name, "next.csv");
    assert_eq!(saved.total(), 3);
    assert_eq!(saved.processed_count(), 0);
    assert!(!saved.resumable);
}

#[tokio::test]
async fn test_dismiss_clears_saved_session() {
    let harness = TestHarness::new(vec![]);
    harness.open(keyed(&["A"]));
    assert!(harness.saved().is_some());

    harness.orchestrator.dismiss().unwrap();

    assert!(harness.saved().is_none());
    assert!(harness.ordered().is_empty());
    assert!(harness.orchestrator.restore().unwrap().is_none());
}

#[tokio::test]
async fn test_snapshots_are_saved_after_every_chunk() {
    let harness = TestHarness::with_chunk_size(vec![], 2);
    harness.open(keyed(&["A", "B", "C", "D", "E"]));
    let after_open = harness.blob.writes();

    harness
        .orchestrator
        .start(INSTRUCTIONS, CancellationToken::new())
        .await
        .unwrap();

    // Three chunk merges plus the settled snapshot.
    assert_eq!(harness.blob.writes() - after_open, 4);
}
