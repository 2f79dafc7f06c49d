use scour_analytics::AnalyticsStore;
use scour_config::FrontendConfig;
use scour_index::IndexStore;
use scour_rank::{NoopEmbeddingProvider, QueryEngine, RankStore};
use scour_store::DbPool;

use crate::predict::CrawlerClient;

pub struct AppState {
    pub engine: QueryEngine,
    pub analytics: AnalyticsStore,
    pub crawler: CrawlerClient,
    pub config: FrontendConfig,
}

impl AppState {
    pub fn new(pool: DbPool, config: FrontendConfig) -> Self {
        let index = IndexStore::new(pool.clone());
        let ranks = RankStore::new(pool.clone());
        let analytics = AnalyticsStore::new(pool);
        let engine = QueryEngine::new(index, ranks, config.ranking.clone(), Box::new(NoopEmbeddingProvider));
        let crawler = CrawlerClient::new(config.crawler_service_url.clone());
        Self { engine, analytics, crawler, config }
    }
}
