//! The Query Engine (§4.9): BM25, semantic, and hybrid RRF search modes
//! over the Index Writer's postings and the PageRank store's scores.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use scour_analyzer::analyze;
use scour_config::RankingConfig;
use scour_index::IndexStore;
use scour_types::{Result, ScourError};
use tokio::sync::Mutex;

use crate::bm25::{idf, length_norm, tf_term};
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::hybrid;
use crate::snippet;
use crate::store::RankStore;

const CACHE_TTL: Duration = Duration::from_secs(60);
const SNIPPET_WINDOW: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Bm25,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
    pub hits: Vec<Hit>,
}

struct SemanticCache {
    refreshed_at: Option<Instant>,
    entries: Vec<(String, Vec<f32>)>,
}

pub struct QueryEngine {
    index: IndexStore,
    ranks: RankStore,
    config: RankingConfig,
    embedder: Box<dyn EmbeddingProvider>,
    semantic_cache: Mutex<SemanticCache>,
}

impl QueryEngine {
    pub fn new(index: IndexStore, ranks: RankStore, config: RankingConfig, embedder: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            index,
            ranks,
            config,
            embedder,
            semantic_cache: Mutex::new(SemanticCache { refreshed_at: None, entries: Vec::new() }),
        }
    }

    pub async fn search(&self, query: &str, mode: QueryMode, page: i64, per_page: i64) -> Result<SearchResult> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        match mode {
            QueryMode::Bm25 => self.bm25_search(query, page, per_page).await,
            QueryMode::Semantic => self.semantic_search(query, page, per_page).await,
            QueryMode::Hybrid => self.hybrid_search(query, page, per_page).await,
        }
    }

    async fn bm25_search(&self, query: &str, page: i64, per_page: i64) -> Result<SearchResult> {
        let tokens: Vec<String> = analyze(query).into_iter().filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Ok(empty_result(query, page, per_page));
        }

        let ranked = self.rank_bm25(&tokens).await?;
        self.paginate(query, ranked, &tokens, page, per_page).await
    }

    /// Returns candidates in descending `score` order, ties broken by URL
    /// ascending (§4.9 step 3). Candidate selection is AND-only: a query
    /// term absent from the corpus yields an empty result rather than
    /// falling back to OR (§4.9, §9 design note).
    async fn rank_bm25(&self, tokens: &[String]) -> Result<Vec<(String, f64)>> {
        let unique_tokens: Vec<&str> = {
            let mut seen = HashSet::new();
            tokens.iter().map(|t| t.as_str()).filter(|t| seen.insert(*t)).collect()
        };

        let mut postings_by_token: HashMap<&str, HashMap<String, HashMap<scour_types::Field, i64>>> =
            HashMap::new();
        let mut doc_freq: HashMap<&str, i64> = HashMap::new();
        for &token in &unique_tokens {
            let postings = self.index.postings_for_token(token).await?;
            doc_freq.insert(token, postings.iter().map(|p| &p.url).collect::<HashSet<_>>().len() as i64);
            let mut by_url: HashMap<String, HashMap<scour_types::Field, i64>> = HashMap::new();
            for p in postings {
                by_url.entry(p.url).or_default().insert(p.field, p.term_freq);
            }
            postings_by_token.insert(token, by_url);
        }

        let mut candidates: Option<HashSet<String>> = None;
        for &token in &unique_tokens {
            let urls: HashSet<String> = postings_by_token[token].keys().cloned().collect();
            candidates = Some(match candidates {
                None => urls,
                Some(existing) => existing.intersection(&urls).cloned().collect(),
            });
        }
        let candidates = candidates.unwrap_or_default();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let global = self.index.global_stats().await?;
        let mut scored = Vec::with_capacity(candidates.len());
        for url in candidates {
            let doc = self.index.document(&url).await?.ok_or_else(|| ScourError::NotFound(url.clone()))?;
            let norm = length_norm(doc.word_count, global.avg_doc_length, self.config.b);
            let mut bm25 = 0.0;
            for token in tokens {
                let Some(&df) = doc_freq.get(token.as_str()) else { continue };
                let token_idf = idf(global.total_docs, df);
                let tf_by_field = &postings_by_token[token.as_str()][&url];
                let title_tf = tf_by_field.get(&scour_types::Field::Title).copied().unwrap_or(0);
                let content_tf = tf_by_field.get(&scour_types::Field::Content).copied().unwrap_or(0);
                bm25 += token_idf * tf_term(title_tf, self.config.k1, norm, self.config.title_boost);
                bm25 += token_idf * tf_term(content_tf, self.config.k1, norm, self.config.content_boost);
            }
            let pagerank = self.ranks.page_rank(&url).await?;
            let score = bm25 + self.config.pagerank_weight * pagerank;
            scored.push((url, score));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        Ok(scored)
    }

    async fn semantic_search(&self, query: &str, page: i64, per_page: i64) -> Result<SearchResult> {
        let tokens: Vec<String> = analyze(query).into_iter().filter(|t| !t.is_empty()).collect();
        let ranked = self.rank_semantic(query).await?;
        self.paginate(query, ranked, &tokens, page, per_page).await
    }

    async fn rank_semantic(&self, query: &str) -> Result<Vec<(String, f64)>> {
        self.refresh_semantic_cache_if_stale().await?;
        let query_vector = self.embedder.embed(query).await?;
        let cache = self.semantic_cache.lock().await;
        let mut scored: Vec<(String, f64)> = cache
            .entries
            .iter()
            .map(|(url, vector)| (url.clone(), cosine_similarity(&query_vector, vector) as f64))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        Ok(scored)
    }

    async fn refresh_semantic_cache_if_stale(&self) -> Result<()> {
        let needs_refresh = {
            let cache = self.semantic_cache.lock().await;
            match cache.refreshed_at {
                Some(t) => t.elapsed() >= CACHE_TTL,
                None => true,
            }
        };
        if needs_refresh {
            let entries = self.ranks.all_embeddings().await?;
            let mut cache = self.semantic_cache.lock().await;
            cache.entries = entries;
            cache.refreshed_at = Some(Instant::now());
        }
        Ok(())
    }

    async fn hybrid_search(&self, query: &str, page: i64, per_page: i64) -> Result<SearchResult> {
        let tokens: Vec<String> = analyze(query).into_iter().filter(|t| !t.is_empty()).collect();
        let k = per_page.max(1) as usize;
        let take = k * 3;

        let bm25_ranked = self.rank_bm25(&tokens).await?;
        let bm25_list: Vec<String> = bm25_ranked.into_iter().take(take).map(|(u, _)| u).collect();

        let semantic_list: Vec<String> = match self.rank_semantic(query).await {
            Ok(ranked) => ranked.into_iter().take(take).map(|(u, _)| u).collect(),
            Err(ScourError::Unavailable(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        let fused = hybrid::fuse(&[bm25_list, semantic_list], self.config.rrf_k);
        self.paginate(query, fused, &tokens, page, per_page).await
    }

    async fn paginate(
        &self,
        query: &str,
        ranked: Vec<(String, f64)>,
        query_tokens: &[String],
        page: i64,
        per_page: i64,
    ) -> Result<SearchResult> {
        let total = ranked.len() as i64;
        let last_page = if total == 0 { 1 } else { (total + per_page - 1) / per_page };
        let offset = ((page - 1) * per_page).max(0) as usize;
        let slice = ranked.into_iter().skip(offset).take(per_page as usize);

        let mut hits = Vec::new();
        for (url, score) in slice {
            let Some(doc) = self.index.document(&url).await? else { continue };
            let snippet = snippet::generate(&doc.content, query_tokens, SNIPPET_WINDOW);
            hits.push(Hit { url, title: doc.title, snippet, score });
        }

        Ok(SearchResult {
            query: query.to_string(),
            total,
            page,
            per_page,
            last_page,
            hits,
        })
    }
}

fn empty_result(query: &str, page: i64, per_page: i64) -> SearchResult {
    SearchResult { query: query.to_string(), total: 0, page, per_page, last_page: 1, hits: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::NoopEmbeddingProvider;
    use scour_store::DbPool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_engine() -> (QueryEngine, IndexStore) {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        let index = IndexStore::new(db.clone());
        let ranks = RankStore::new(db);
        let engine = QueryEngine::new(index.clone(), ranks, RankingConfig::default(), Box::new(NoopEmbeddingProvider));
        (engine, index)
    }

    #[tokio::test]
    async fn and_logic_excludes_documents_missing_any_term() {
        let (engine, index) = memory_engine().await;
        index.index_document("https://a.test/", "Rust Guide", "a guide to rust programming").await.unwrap();
        index.index_document("https://b.test/", "Python Guide", "a guide to python programming").await.unwrap();

        let result = engine.search("rust guide", QueryMode::Bm25, 1, 10).await.unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].url, "https://a.test/");
    }

    #[tokio::test]
    async fn empty_query_returns_no_hits() {
        let (engine, _index) = memory_engine().await;
        let result = engine.search("", QueryMode::Bm25, 1, 10).await.unwrap();
        assert_eq!(result.total, 0);
    }

    #[tokio::test]
    async fn title_match_outranks_content_only_match() {
        let (engine, index) = memory_engine().await;
        index.index_document("https://a.test/", "rust", "nothing relevant here at all").await.unwrap();
        index.index_document("https://b.test/", "unrelated", "this page just mentions rust once").await.unwrap();

        let result = engine.search("rust", QueryMode::Bm25, 1, 10).await.unwrap();
        assert_eq!(result.hits[0].url, "https://a.test/");
    }

    #[tokio::test]
    async fn semantic_mode_without_provider_errors_explicitly() {
        let (engine, _index) = memory_engine().await;
        let err = engine.search("rust", QueryMode::Semantic, 1, 10).await.unwrap_err();
        assert!(matches!(err, ScourError::Unavailable(_)));
    }

    #[tokio::test]
    async fn pagerank_weight_zero_drops_pagerank_contribution() {
        let (engine, index) = memory_engine().await;
        index.index_document("https://a.test/", "rust", "rust rust rust").await.unwrap();
        engine.ranks.write_page_ranks(&HashMap::from([("https://a.test/".to_string(), 0.9)])).await.unwrap();

        let with_pr = engine.search("rust", QueryMode::Bm25, 1, 10).await.unwrap();

        let mut zero_weight_config = RankingConfig::default();
        zero_weight_config.pagerank_weight = 0.0;
        let engine_zero = QueryEngine::new(
            engine.index.clone(),
            engine.ranks.clone(),
            zero_weight_config,
            Box::new(NoopEmbeddingProvider),
        );
        let without_pr = engine_zero.search("rust", QueryMode::Bm25, 1, 10).await.unwrap();

        assert!(with_pr.hits[0].score > without_pr.hits[0].score);
    }
}
