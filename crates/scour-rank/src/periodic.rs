//! Drives the PageRank jobs on a fixed interval. Runs on a plain
//! `tokio::time::interval` rather than a cron schedule, with a simple
//! run/stop-flag and per-tick logging.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};

pub struct PeriodicRunner {
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl PeriodicRunner {
    pub fn new(interval: Duration) -> Self {
        Self { interval, running: Arc::new(AtomicBool::new(false)) }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Runs `job` on every tick until [`PeriodicRunner::stop`] is called.
    /// A job error is logged and the loop continues — one bad iteration
    /// never kills the runner.
    pub async fn run<F, Fut>(&self, name: &str, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = scour_types::Result<usize>>,
    {
        self.running.store(true, Ordering::Relaxed);
        let mut ticker = tokio::time::interval(self.interval);
        while self.running.load(Ordering::Relaxed) {
            ticker.tick().await;
            let started = Instant::now();
            match job().await {
                Ok(count) => {
                    info!(job = name, nodes = count, elapsed_ms = started.elapsed().as_millis() as u64, "periodic job completed");
                }
                Err(e) => {
                    error!(job = name, error = %e, "periodic job failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn stop_ends_the_loop() {
        let runner = Arc::new(PeriodicRunner::new(Duration::from_millis(5)));
        let runs = Arc::new(AtomicUsize::new(0));

        let runner_clone = runner.clone();
        let runs_clone = runs.clone();
        let handle = tokio::spawn(async move {
            runner_clone
                .run("test-job", || {
                    let runs = runs_clone.clone();
                    async move {
                        runs.fetch_add(1, Ordering::Relaxed);
                        Ok(1)
                    }
                })
                .await;
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        runner.stop();
        handle.await.unwrap();
        assert!(runs.load(Ordering::Relaxed) > 0);
    }
}
