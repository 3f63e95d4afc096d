//! Integration tests for the database-backed mirror store.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled
//! and use an in-memory SQLite database.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use feedsync::channel::RemoteStatus;
use feedsync::connect_and_migrate;
use feedsync::entity::sync_status::SyncStatus;
use feedsync::mirror::{DbMirrorStore, MirrorStore};
use feedsync::sync::{ActionKind, ActionOutcome, CycleOutcome, CycleSummary, Reconciler};

use common::{CHANNEL, FakeChannel, SwitchableFeed, item, options, published};

/// Create an in-memory SQLite database with migrations applied.
async fn setup_store() -> DbMirrorStore {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    DbMirrorStore::new(Arc::new(db))
}

#[tokio::test]
async fn upsert_load_and_delete_round_trip() {
    let store = setup_store().await;

    let mut record = published("A", "L-1");
    record.last_synced_at = Some(Utc::now());
    store.upsert(&record).await.expect("insert");
    store
        .upsert(&published("B", "L-2"))
        .await
        .expect("insert second");

    let mut other_channel = published("A", "X-1");
    other_channel.channel = "auction".into();
    store.upsert(&other_channel).await.expect("other channel");

    let snapshot = store.load(CHANNEL).await.expect("load");
    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    let loaded = &snapshot["A"];
    assert_eq!(loaded.remote_id.as_deref(), Some("L-1"));
    assert_eq!(loaded.sync_status, SyncStatus::Published);
    assert_eq!(loaded.attributes, record.attributes);
    assert!(loaded.last_synced_at.is_some());

    assert!(store.delete(CHANNEL, "B").await.expect("delete"));
    assert!(!store.delete(CHANNEL, "B").await.expect("second delete"));
    assert_eq!(store.load(CHANNEL).await.unwrap().len(), 1);
    assert_eq!(store.load("auction").await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_replaces_in_place_and_keeps_created_at() {
    let store = setup_store().await;

    let mut record = published("A", "L-1");
    record.created_at = Utc::now() - Duration::days(3);
    store.upsert(&record).await.expect("insert");
    let created = store.load(CHANNEL).await.unwrap()["A"].created_at;

    let mut changed = record.clone();
    changed.created_at = Utc::now();
    changed.sync_status = SyncStatus::PublishFailed;
    changed.last_error = Some("Rejected by channel: HTTP 422".into());
    changed.attributes.insert("price".into(), "9000".into());
    store.upsert(&changed).await.expect("update");

    let snapshot = store.load(CHANNEL).await.unwrap();
    assert_eq!(snapshot.len(), 1);
    let loaded = &snapshot["A"];
    assert_eq!(loaded.created_at, created);
    assert_eq!(loaded.sync_status, SyncStatus::PublishFailed);
    assert_eq!(loaded.last_error.as_deref(), Some("Rejected by channel: HTTP 422"));
    assert_eq!(loaded.attributes.get("price").map(String::as_str), Some("9000"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_upserts_of_one_sku_both_succeed() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("mirror.db").display());
    let db = connect_and_migrate(&url).await.expect("file database");
    let store = DbMirrorStore::new(Arc::new(db));

    for i in 0..20 {
        let sku = format!("SKU-{i:02}");
        let mut pending = published(&sku, "L-1");
        pending.sync_status = SyncStatus::WaitingPublish;
        pending.remote_id = None;
        let done = published(&sku, "L-1");

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.upsert(&pending).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.upsert(&done).await }
        });
        first.await.unwrap().expect("first writer");
        second.await.unwrap().expect("second writer");
    }

    let snapshot = store.load(CHANNEL).await.unwrap();
    assert_eq!(snapshot.len(), 20);
}

#[tokio::test]
async fn cycle_journal_is_newest_first_and_limited() {
    let store = setup_store().await;

    for (offset, sku) in [(30, "A"), (20, "B"), (10, "C")] {
        let mut summary = CycleSummary::start(CHANNEL, None, false);
        summary.started_at = Utc::now() - Duration::minutes(offset);
        summary.record(sku, ActionKind::Insert, ActionOutcome::Applied);
        summary.finished_at = summary.started_at + Duration::seconds(5);
        store.record_cycle(&summary).await.expect("journal");
    }

    let mut aborted = CycleSummary::start("auction", None, false);
    aborted.outcome = CycleOutcome::Aborted {
        reason: "30 deactivations exceed the limit of 25".into(),
    };
    store.record_cycle(&aborted).await.expect("journal");

    let cycles = store.recent_cycles(CHANNEL, 2).await.expect("history");
    assert_eq!(cycles.len(), 2);
    assert!(cycles[0].started_at > cycles[1].started_at);
    assert!(cycles.iter().all(|c| c.outcome == "completed" && c.inserted == 1));

    let auction = store.recent_cycles("auction", 10).await.expect("history");
    assert_eq!(auction.len(), 1);
    assert_eq!(auction[0].outcome, "aborted");
    assert_eq!(
        auction[0].detail.as_deref(),
        Some("30 deactivations exceed the limit of 25")
    );
}

#[tokio::test]
async fn reconciler_runs_against_database_mirror() {
    let store = Arc::new(setup_store().await);
    store.upsert(&published("A", "L-A")).await.unwrap();
    store.upsert(&published("B", "L-B")).await.unwrap();

    let channel = FakeChannel::new()
        .seed("L-A", Some("A"), RemoteStatus::Active)
        .seed("L-B", Some("B"), RemoteStatus::Active);
    let reconciler = Reconciler::builder()
        .channel(channel)
        .feed(SwitchableFeed::new(vec![item("A"), item("C")]))
        .store(store.clone())
        .options(options())
        .build()
        .expect("builder");

    let summary = reconciler.run_cycle().await.expect("cycle");
    assert_eq!(summary.inserted, vec!["C"]);
    assert_eq!(summary.deactivated, vec!["B"]);

    let snapshot = store.load(CHANNEL).await.unwrap();
    assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["A", "C"]);
    assert_eq!(snapshot["C"].sync_status, SyncStatus::Published);

    let history = store.recent_cycles(CHANNEL, 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].deactivated, 1);
}
