use scour_queue::{IndexJobQueue, QueuePolicy};
use scour_store::DbPool;
use scour_types::IndexJobStatus;
use sqlx::sqlite::SqlitePoolOptions;

async fn memory_queue(policy: QueuePolicy) -> IndexJobQueue {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let db = DbPool::Sqlite(pool);
    db.init_schema().await.unwrap();
    IndexJobQueue::new(db, policy)
}

#[tokio::test]
async fn enqueue_dedupes_by_url_and_content() {
    let queue = memory_queue(QueuePolicy::default()).await;
    let a = queue.enqueue("https://a.test/", "T", "same content", &[]).await.unwrap();
    assert!(a.created);
    let b = queue.enqueue("https://a.test/", "T", "same content", &[]).await.unwrap();
    assert!(!b.created);
    assert_eq!(a.job_id, b.job_id);

    let c = queue.enqueue("https://a.test/", "T", "different content", &[]).await.unwrap();
    assert!(c.created);
    assert_ne!(c.job_id, a.job_id);
}

#[tokio::test]
async fn claim_transitions_pending_to_processing() {
    let queue = memory_queue(QueuePolicy::default()).await;
    let enq = queue.enqueue("https://a.test/", "T", "c", &[]).await.unwrap();
    let claimed = queue.claim(10, 300, "worker-1").await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].job_id, enq.job_id);
    assert_eq!(claimed[0].status, IndexJobStatus::Processing);

    // Not claimable again until the lease expires.
    let none = queue.claim(10, 300, "worker-2").await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn mark_done_is_idempotent() {
    let queue = memory_queue(QueuePolicy::default()).await;
    let enq = queue.enqueue("https://a.test/", "T", "c", &[]).await.unwrap();
    queue.claim(10, 300, "w").await.unwrap();
    queue.mark_done(&enq.job_id).await.unwrap();
    queue.mark_done(&enq.job_id).await.unwrap();
    let job = queue.get(&enq.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, IndexJobStatus::Done);
}

#[tokio::test]
async fn failure_retries_then_goes_permanent() {
    let policy = QueuePolicy {
        max_retries: 2,
        retry_base_secs: 0.0,
        retry_max_secs: 0.0,
    };
    let queue = memory_queue(policy).await;
    let enq = queue.enqueue("https://a.test/", "T", "c", &[]).await.unwrap();

    queue.claim(10, 300, "w").await.unwrap();
    queue.mark_failure(&enq.job_id, "boom").await.unwrap();
    let job = queue.get(&enq.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, IndexJobStatus::FailedRetry);
    assert_eq!(job.retry_count, 1);

    queue.claim(10, 300, "w").await.unwrap();
    queue.mark_failure(&enq.job_id, "boom again").await.unwrap();
    let job = queue.get(&enq.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, IndexJobStatus::FailedPermanent);
    assert_eq!(job.retry_count, 2);
}

#[tokio::test]
async fn expired_lease_is_recovered_as_failure() {
    let queue = memory_queue(QueuePolicy::default()).await;
    let enq = queue.enqueue("https://a.test/", "T", "c", &[]).await.unwrap();
    queue.claim(10, -1, "w").await.unwrap(); // already-expired lease

    let recovered = queue.recover_expired_leases(chrono::Utc::now()).await.unwrap();
    assert_eq!(recovered, 1);
    let job = queue.get(&enq.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, IndexJobStatus::FailedRetry);
}
