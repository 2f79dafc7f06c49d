//! Drives the two PageRank jobs (§4.8) on the indexer service's process,
//! alongside the index-job worker loop, since both read/write state the
//! Index Writer produces.

use std::sync::Arc;
use std::time::Duration;

use scour_rank::{run_domain_rank_job, run_page_rank_job, PeriodicRunner, RankStore};
use scour_store::LinkStore;

pub fn spawn(links: LinkStore, ranks: RankStore, interval: Duration) -> (tokio::task::JoinHandle<()>, Arc<PeriodicRunner>) {
    let runner = Arc::new(PeriodicRunner::new(interval));
    let runner_clone = runner.clone();
    let handle = tokio::spawn(async move {
        runner_clone
            .run("pagerank", || {
                let links = links.clone();
                let ranks = ranks.clone();
                async move {
                    let page_count = run_page_rank_job(&links, &ranks).await?;
                    run_domain_rank_job(&links, &ranks).await?;
                    Ok(page_count)
                }
            })
            .await;
    });
    (handle, runner)
}
