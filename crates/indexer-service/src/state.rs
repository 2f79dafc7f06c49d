use scour_config::IndexerConfig;
use scour_index::IndexStore;
use scour_queue::{IndexJobQueue, QueuePolicy};
use scour_rank::RankStore;
use scour_store::{DbPool, LinkStore};

pub struct AppState {
    pub index: IndexStore,
    pub queue: IndexJobQueue,
    pub links: LinkStore,
    pub ranks: RankStore,
    pub config: IndexerConfig,
}

impl AppState {
    pub fn new(pool: DbPool, config: IndexerConfig) -> Self {
        let policy = QueuePolicy {
            max_retries: config.job_max_retries,
            retry_base_secs: config.job_retry_base_secs,
            retry_max_secs: config.job_retry_max_secs,
        };
        Self {
            index: IndexStore::new(pool.clone()),
            queue: IndexJobQueue::new(pool.clone(), policy),
            links: LinkStore::new(pool.clone()),
            ranks: RankStore::new(pool),
            config,
        }
    }
}
