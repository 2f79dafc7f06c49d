//! The two periodic PageRank jobs (§4.8): each reads the link graph,
//! recomputes scores, and atomically rewrites its output table. A failure
//! partway through leaves the previous snapshot intact because the write
//! happens in one transaction (`RankStore::write_page_ranks` /
//! `write_domain_ranks`).

use scour_store::LinkStore;
use scour_types::Result;
use tracing::info;

use crate::pagerank::{domain_edges, power_iteration};
use crate::store::RankStore;

/// Page-level PageRank: nodes are document URLs, edges are the stored
/// link table. Returns the number of nodes scored.
pub async fn run_page_rank_job(links: &LinkStore, ranks: &RankStore) -> Result<usize> {
    let edges: Vec<(String, String)> =
        links.all_edges().await?.into_iter().map(|e| (e.src_url, e.dst_url)).collect();
    let scores = power_iteration(&edges);
    let count = scores.len();
    ranks.write_page_ranks(&scores).await?;
    info!(nodes = count, "page-rank job completed");
    Ok(count)
}

/// Domain-level PageRank: nodes are hosts, edges are distinct
/// cross-domain `(src_host, dst_host)` pairs derived from the page graph.
pub async fn run_domain_rank_job(links: &LinkStore, ranks: &RankStore) -> Result<usize> {
    let page_edges: Vec<(String, String)> =
        links.all_edges().await?.into_iter().map(|e| (e.src_url, e.dst_url)).collect();
    let edges = domain_edges(&page_edges);
    let scores = power_iteration(&edges);
    let count = scores.len();
    ranks.write_domain_ranks(&scores).await?;
    info!(nodes = count, "domain-rank job completed");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scour_store::{DbPool, LinkStore};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> DbPool {
        let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
        let db = DbPool::Sqlite(pool);
        db.init_schema().await.unwrap();
        db
    }

    #[tokio::test]
    async fn page_rank_job_writes_scores_for_linked_urls() {
        let db = memory_pool().await;
        let links = LinkStore::new(db.clone());
        let ranks = RankStore::new(db);
        links
            .record_edges("https://a.test/", &["https://b.test/".to_string()])
            .await
            .unwrap();

        let count = run_page_rank_job(&links, &ranks).await.unwrap();
        assert_eq!(count, 2);
        let a_score = ranks.page_rank("https://a.test/").await.unwrap();
        let b_score = ranks.page_rank("https://b.test/").await.unwrap();
        assert!(b_score >= a_score, "b is linked to, should outrank or tie a");
    }

    #[tokio::test]
    async fn empty_graph_leaves_empty_tables() {
        let db = memory_pool().await;
        let links = LinkStore::new(db.clone());
        let ranks = RankStore::new(db);
        let count = run_page_rank_job(&links, &ranks).await.unwrap();
        assert_eq!(count, 0);
    }
}
