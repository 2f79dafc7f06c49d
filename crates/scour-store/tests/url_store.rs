use chrono::Duration;
use scour_store::{DbPool, UrlStore};
use scour_types::{AddOutcome, UrlStatus};
use sqlx::sqlite::SqlitePoolOptions;

async fn memory_store() -> UrlStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = DbPool::Sqlite(pool);
    db.init_schema().await.unwrap();
    UrlStore::new(db)
}

#[tokio::test]
async fn add_is_idempotent_while_pending() {
    let store = memory_store().await;
    let threshold = Duration::days(7);
    assert_eq!(
        store.add("https://a.test/", 10.0, None, threshold).await.unwrap(),
        AddOutcome::Inserted
    );
    assert_eq!(
        store.add("https://a.test/", 20.0, None, threshold).await.unwrap(),
        AddOutcome::NoOp
    );
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn claim_batch_moves_to_crawling_and_is_exhaustive() {
    let store = memory_store().await;
    let threshold = Duration::days(7);
    for i in 0..5 {
        store
            .add(&format!("https://a.test/{i}"), i as f64, None, threshold)
            .await
            .unwrap();
    }
    let claimed = store.claim_batch(3).await.unwrap();
    assert_eq!(claimed.len(), 3);
    // Highest priority first.
    assert_eq!(claimed[0].url, "https://a.test/4");
    assert!(claimed.iter().all(|r| r.status == UrlStatus::Crawling));

    let remaining = store.claim_batch(10).await.unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn recover_stale_crawling_resets_all() {
    let store = memory_store().await;
    let threshold = Duration::days(7);
    store.add("https://a.test/", 1.0, None, threshold).await.unwrap();
    store.claim_batch(10).await.unwrap();
    assert_eq!(store.stats().await.unwrap().crawling, 1);

    let recovered = store.recover_stale_crawling().await.unwrap();
    assert_eq!(recovered, 1);
    assert_eq!(store.stats().await.unwrap().pending, 1);
}

#[tokio::test]
async fn recrawl_gate_respects_threshold() {
    let store = memory_store().await;
    let threshold = Duration::days(7);
    store.add("https://a.test/", 1.0, None, threshold).await.unwrap();
    store.claim_batch(10).await.unwrap();
    store.record("https://a.test/", UrlStatus::Done).await.unwrap();

    // Freshly done: re-adding is a no-op.
    let outcome = store.add("https://a.test/", 99.0, None, threshold).await.unwrap();
    assert_eq!(outcome, AddOutcome::NoOp);

    // With a zero threshold everything done is immediately eligible again.
    let outcome = store
        .add("https://a.test/", 99.0, None, Duration::seconds(-1))
        .await
        .unwrap();
    assert_eq!(outcome, AddOutcome::Restored);
}

#[tokio::test]
async fn record_on_unknown_url_inserts_terminal_row() {
    let store = memory_store().await;
    store.record("https://unknown.test/", UrlStatus::Failed).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.failed, 1);
}
