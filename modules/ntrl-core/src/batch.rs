use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{info, warn};

use ntrl_common::{ArticleInput, BatchResult, Config, NtrlError, PipelineResult};

use crate::budget::{BudgetTracker, OperationCost};
use crate::pipeline::Pipeline;

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// N requests per rolling one-second window, reset when the window rolls
/// over. One mutex guards the counter; callers over the limit sleep until
/// the window resets.
pub struct RateLimiter {
    max_per_window: u32,
    state: Mutex<WindowState>,
}

struct WindowState {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_window: max_per_second.max(1),
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let Ok(mut state) = self.state.lock() else {
                    // Poisoned lock: degrade to unlimited rather than deadlock.
                    return;
                };
                let now = Instant::now();
                if now.duration_since(state.started) >= RATE_WINDOW {
                    state.started = now;
                    state.count = 0;
                }
                if state.count < self.max_per_window {
                    state.count += 1;
                    None
                } else {
                    Some(RATE_WINDOW.saturating_sub(now.duration_since(state.started)))
                }
            };
            match wait {
                None => return,
                Some(d) => sleep(d.max(Duration::from_millis(5))).await,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Batch configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_concurrent: usize,
    pub chunk_size: usize,
    pub requests_per_second: u32,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub article_timeout: Duration,
    pub batch_timeout: Duration,
    pub chunk_pause: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            chunk_size: 20,
            requests_per_second: 5,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            article_timeout: Duration::from_secs(120),
            batch_timeout: Duration::from_secs(600),
            chunk_pause: Duration::from_secs(1),
        }
    }
}

impl BatchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            chunk_size: config.chunk_size,
            requests_per_second: config.requests_per_second,
            max_retries: config.max_item_retries,
            article_timeout: Duration::from_secs(config.article_timeout_secs),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Batcher
// ---------------------------------------------------------------------------

/// Batch front door for the pipeline. Strategy by batch size: one article is
/// called directly, small batches fan out in parallel under the shared rate
/// limiter, large batches run as sequential chunks with a pause between them.
/// One article's failure never aborts its siblings.
#[derive(Clone)]
pub struct NtrlBatcher {
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiter>,
    budget: Arc<BudgetTracker>,
    config: Arc<BatchConfig>,
}

impl NtrlBatcher {
    pub fn new(pipeline: Arc<Pipeline>, config: BatchConfig, budget: Arc<BudgetTracker>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.requests_per_second));
        Self {
            pipeline,
            limiter,
            budget,
            config: Arc::new(config),
        }
    }

    pub fn from_config(pipeline: Arc<Pipeline>, config: &Config) -> Self {
        Self::new(
            pipeline,
            BatchConfig::from_config(config),
            Arc::new(BudgetTracker::new(config.daily_budget_cents)),
        )
    }

    /// Process one article under the rate limiter, with retries and a
    /// per-article timeout.
    pub async fn process_one(
        &self,
        article: &ArticleInput,
        force: bool,
    ) -> Result<PipelineResult> {
        if !self.budget.can_afford(OperationCost::PIPELINE) {
            return Err(NtrlError::BudgetExhausted.into());
        }

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                sleep(self.config.retry_backoff).await;
            }
            self.limiter.acquire().await;
            self.budget.charge(OperationCost::PIPELINE);

            match timeout(
                self.config.article_timeout,
                self.pipeline.process(
                    &article.body,
                    &article.title,
                    article.deck.as_deref(),
                    force,
                ),
            )
            .await
            {
                Ok(result) => return Ok(result),
                Err(_) => {
                    warn!(
                        article_id = %article.article_id,
                        attempt,
                        timeout_secs = self.config.article_timeout.as_secs(),
                        "Article processing timed out"
                    );
                }
            }
        }
        Err(NtrlError::Timeout(self.config.article_timeout.as_secs()).into())
    }

    pub async fn process_batch(&self, articles: Vec<ArticleInput>, force: bool) -> BatchResult {
        let started = Instant::now();
        let mut result = BatchResult {
            total_articles: articles.len(),
            ..Default::default()
        };

        if articles.is_empty() {
            info!("Empty batch, nothing to do");
            return result;
        }

        info!(articles = articles.len(), "Batch started");
        let deadline = Instant::now() + self.config.batch_timeout;

        if articles.len() == 1 {
            let article = &articles[0];
            match self.process_one(article, force).await {
                Ok(r) => {
                    result.results.insert(article.article_id.clone(), r);
                }
                Err(e) => {
                    result
                        .failures
                        .insert(article.article_id.clone(), failure_string(&e));
                }
            }
        } else if articles.len() <= self.config.max_concurrent {
            self.run_chunk(articles, force, deadline, &mut result).await;
        } else {
            let chunks: Vec<Vec<ArticleInput>> = articles
                .chunks(self.config.chunk_size.max(1))
                .map(|c| c.to_vec())
                .collect();
            let total_chunks = chunks.len();
            for (i, chunk) in chunks.into_iter().enumerate() {
                self.run_chunk(chunk, force, deadline, &mut result).await;
                if i + 1 < total_chunks && Instant::now() < deadline {
                    sleep(self.config.chunk_pause).await;
                }
            }
        }

        result.successful = result.results.len();
        result.failed = result.failures.len();
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        self.budget.log_status();

        info!(
            total = result.total_articles,
            successful = result.successful,
            failed = result.failed,
            elapsed_ms = result.elapsed_ms,
            "Batch complete"
        );
        result
    }

    /// Fan one chunk out in parallel and collect until done or the batch
    /// deadline hits; on deadline, cancel what is still pending and mark it
    /// timed out.
    async fn run_chunk(
        &self,
        articles: Vec<ArticleInput>,
        force: bool,
        deadline: Instant,
        out: &mut BatchResult,
    ) {
        let mut pending: HashSet<String> =
            articles.iter().map(|a| a.article_id.clone()).collect();
        let mut tasks = JoinSet::new();

        for article in articles {
            let batcher = self.clone();
            tasks.spawn(async move {
                let outcome = batcher.process_one(&article, force).await;
                (article.article_id, outcome)
            });
        }

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((id, Ok(r))))) => {
                    pending.remove(&id);
                    out.results.insert(id, r);
                }
                Ok(Some(Ok((id, Err(e))))) => {
                    pending.remove(&id);
                    out.failures.insert(id, failure_string(&e));
                }
                Ok(Some(Err(join_err))) => {
                    warn!(error = %join_err, "Batch task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    warn!(
                        cancelled = pending.len(),
                        "Batch timeout, cancelling remaining articles"
                    );
                    for id in pending.drain() {
                        out.failures.insert(id, "Timeout".to_string());
                    }
                    return;
                }
            }
        }

        // Tasks that panicked completed without reporting an outcome.
        for id in pending.drain() {
            out.failures.insert(id, "task panicked".to_string());
        }
    }
}

fn failure_string(e: &anyhow::Error) -> String {
    match e.downcast_ref::<NtrlError>() {
        Some(NtrlError::Timeout(_)) => "Timeout".to_string(),
        Some(NtrlError::BudgetExhausted) => "Budget exhausted".to_string(),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{article, scan_only_pipeline};

    fn batcher(config: BatchConfig) -> NtrlBatcher {
        NtrlBatcher::new(
            Arc::new(scan_only_pipeline()),
            config,
            Arc::new(BudgetTracker::unlimited()),
        )
    }

    fn fast_config() -> BatchConfig {
        BatchConfig {
            retry_backoff: Duration::from_millis(1),
            chunk_pause: Duration::from_millis(1),
            requests_per_second: 1000,
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn empty_batch_returns_zero_totals() {
        let result = batcher(fast_config()).process_batch(vec![], false).await;
        assert_eq!(result.total_articles, 0);
        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 0);
        assert!(result.results.is_empty());
        assert!(result.failures.is_empty());
    }

    #[tokio::test]
    async fn all_articles_succeed_and_appear_by_id() {
        let articles: Vec<ArticleInput> = (0..3).map(|i| article(&format!("a-{i}"))).collect();
        let result = batcher(fast_config()).process_batch(articles, false).await;

        assert_eq!(result.total_articles, 3);
        assert_eq!(result.successful, 3);
        assert_eq!(result.failed, 0);
        for i in 0..3 {
            assert!(result.results.contains_key(&format!("a-{i}")));
        }
    }

    #[tokio::test]
    async fn single_article_takes_the_direct_path() {
        let result = batcher(fast_config())
            .process_batch(vec![article("only")], false)
            .await;
        assert_eq!(result.successful, 1);
        assert!(result.results.contains_key("only"));
    }

    #[tokio::test]
    async fn large_batches_run_in_chunks() {
        let config = BatchConfig {
            max_concurrent: 2,
            chunk_size: 2,
            ..fast_config()
        };
        let articles: Vec<ArticleInput> = (0..5).map(|i| article(&format!("c-{i}"))).collect();
        let result = batcher(config).process_batch(articles, false).await;
        assert_eq!(result.successful, 5);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn budget_exhaustion_fails_later_items_without_aborting_batch() {
        // Sequential chunks of one make the charge order deterministic.
        let config = BatchConfig {
            max_concurrent: 0,
            chunk_size: 1,
            ..fast_config()
        };
        let b = NtrlBatcher::new(
            Arc::new(scan_only_pipeline()),
            config,
            Arc::new(BudgetTracker::new(OperationCost::PIPELINE)),
        );
        let result = b
            .process_batch(vec![article("first"), article("second")], false)
            .await;

        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert!(result.results.contains_key("first"));
        assert_eq!(
            result.failures.get("second").map(String::as_str),
            Some("Budget exhausted")
        );
    }

    #[tokio::test]
    async fn article_timeout_becomes_a_failure_string() {
        let config = BatchConfig {
            article_timeout: Duration::ZERO,
            max_retries: 0,
            ..fast_config()
        };
        let result = batcher(config)
            .process_batch(vec![article("slow-1"), article("slow-2")], false)
            .await;

        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 2);
        for id in ["slow-1", "slow-2"] {
            assert_eq!(result.failures.get(id).map(String::as_str), Some("Timeout"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_spreads_requests_across_windows() {
        let limiter = RateLimiter::new(2);
        let started = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // 5 acquisitions at 2 per window need at least 2 full window rolls.
        assert!(started.elapsed() >= RATE_WINDOW * 2);
    }

    #[tokio::test]
    async fn rate_limiter_is_immediate_under_the_limit() {
        let limiter = RateLimiter::new(100);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
