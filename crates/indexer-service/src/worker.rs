//! The indexer side of the Index Job Queue state diagram (§4.5): a
//! fixed-interval poll loop that claims jobs, hands each to the Index
//! Writer (§4.7), and reports success or failure back to the queue.

use std::sync::Arc;
use std::time::Duration;

use scour_index::IndexStore;
use scour_queue::IndexJobQueue;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct IndexWorkerConfig {
    pub batch_size: i64,
    pub lease_secs: i64,
    pub poll_interval: Duration,
}

pub struct IndexWorker {
    index: IndexStore,
    queue: IndexJobQueue,
    worker_id: String,
    config: IndexWorkerConfig,
}

impl IndexWorker {
    pub fn new(index: IndexStore, queue: IndexJobQueue, worker_id: String, config: IndexWorkerConfig) -> Self {
        Self { index, queue, worker_id, config }
    }

    /// Runs until `shutdown` resolves. Claims are bounded by
    /// `batch_size`; an empty claim sleeps for `poll_interval` before
    /// retrying rather than busy-polling the database (§5 suspension
    /// points).
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(worker_id = %self.worker_id, "index worker starting");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.queue.claim(self.config.batch_size, self.config.lease_secs, &self.worker_id).await {
                Ok(jobs) if jobs.is_empty() => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Ok(jobs) => {
                    for job in jobs {
                        self.process(job).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to claim index jobs");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
        info!(worker_id = %self.worker_id, "index worker stopped");
    }

    async fn process(&self, job: scour_types::IndexJob) {
        match self.index.index_document(&job.url, &job.title, &job.content).await {
            Ok(doc) => {
                if let Err(e) = self.queue.mark_done(&job.job_id).await {
                    error!(job_id = %job.job_id, error = %e, "failed to mark job done");
                }
                info!(job_id = %job.job_id, url = %job.url, word_count = doc.word_count, "indexed document");
            }
            Err(e) => {
                warn!(job_id = %job.job_id, url = %job.url, error = %e, "index_document failed, marking job failure");
                if let Err(mark_err) = self.queue.mark_failure(&job.job_id, &e.to_string()).await {
                    error!(job_id = %job.job_id, error = %mark_err, "failed to mark job failure");
                }
            }
        }
    }
}

/// Spawns the worker loop on the current Tokio runtime, returning a
/// shutdown sender the caller can flip at process shutdown.
pub fn spawn(index: IndexStore, queue: IndexJobQueue, config: IndexWorkerConfig) -> (tokio::task::JoinHandle<()>, tokio::sync::watch::Sender<bool>) {
    let (tx, rx) = tokio::sync::watch::channel(false);
    let worker = Arc::new(IndexWorker::new(index, queue, format!("indexer-{}", uuid::Uuid::new_v4()), config));
    let handle = tokio::spawn(async move { worker.run(rx).await });
    (handle, tx)
}
