use scour_index::IndexStore;
use scour_store::DbPool;
use sqlx::sqlite::SqlitePoolOptions;

async fn memory_store() -> IndexStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = DbPool::Sqlite(pool);
    db.init_schema().await.unwrap();
    IndexStore::new(db)
}

#[tokio::test]
async fn indexing_a_new_document_bumps_total_docs() {
    let store = memory_store().await;
    store
        .index_document("https://a.test/", "Rust Crawler", "a fast web crawler written in rust")
        .await
        .unwrap();

    let stats = store.global_stats().await.unwrap();
    assert_eq!(stats.total_docs, 1);
    assert!(stats.avg_doc_length > 0.0);

    let postings = store.postings_for_token("rust").await.unwrap();
    assert_eq!(postings.len(), 2, "rust appears in both title and content");
}

#[tokio::test]
async fn reindexing_does_not_double_count_total_docs() {
    let store = memory_store().await;
    store.index_document("https://a.test/", "Rust", "rust rust rust").await.unwrap();
    store.index_document("https://a.test/", "Rust", "rust guide").await.unwrap();

    let stats = store.global_stats().await.unwrap();
    assert_eq!(stats.total_docs, 1);

    let postings = store.postings_for_token("rust").await.unwrap();
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].term_freq, 1);

    // "guide" should now have doc_freq 1, but a token that was dropped on
    // reindex should have its doc_freq cleaned up entirely.
    let guide_stats = store.token_stats("guide").await.unwrap().unwrap();
    assert_eq!(guide_stats.doc_freq, 1);
}

#[tokio::test]
async fn deleting_a_document_clears_its_postings_and_doc_freq() {
    let store = memory_store().await;
    store.index_document("https://a.test/", "Rust", "rust programming").await.unwrap();
    store.index_document("https://b.test/", "Rust Two", "rust programming again").await.unwrap();

    let removed = store.delete_document("https://a.test/").await.unwrap();
    assert!(removed);
    assert!(store.document("https://a.test/").await.unwrap().is_none());

    let rust_stats = store.token_stats("rust").await.unwrap().unwrap();
    assert_eq!(rust_stats.doc_freq, 1, "only b.test still contains rust");

    let stats = store.global_stats().await.unwrap();
    assert_eq!(stats.total_docs, 1);
}

#[tokio::test]
async fn deleting_unknown_document_is_a_no_op() {
    let store = memory_store().await;
    assert!(!store.delete_document("https://never-indexed.test/").await.unwrap());
}
