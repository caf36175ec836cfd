use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub anthropic_api_key: String,
    /// Model used for semantic detection (cheap, high-volume).
    pub detector_model: String,
    /// Model used for rewrite generation.
    pub rewrite_model: String,

    // Scanner
    pub scan_timeout_secs: u64,
    pub overlap_threshold: f64,
    pub semantic_char_budget: usize,

    // Fixer
    pub max_fix_retries: u32,
    pub strict_validation: bool,

    // Pipeline
    pub scan_only: bool,
    pub cache_capacity: usize,

    // Batcher
    pub max_concurrent: usize,
    pub chunk_size: usize,
    pub requests_per_second: u32,
    pub max_item_retries: u32,
    pub article_timeout_secs: u64,
    pub batch_timeout_secs: u64,

    /// Daily LLM spend limit in cents. 0 = unlimited.
    pub daily_budget_cents: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            detector_model: env_or("NTRL_DETECTOR_MODEL", "claude-haiku-4-5-20251001"),
            rewrite_model: env_or("NTRL_REWRITE_MODEL", "claude-sonnet-4-5-20250929"),
            scan_timeout_secs: parsed_env("NTRL_SCAN_TIMEOUT_SECS", 30),
            overlap_threshold: parsed_env("NTRL_OVERLAP_THRESHOLD", 0.5),
            semantic_char_budget: parsed_env("NTRL_SEMANTIC_CHAR_BUDGET", 12_000),
            max_fix_retries: parsed_env("NTRL_MAX_FIX_RETRIES", 2),
            strict_validation: parsed_env("NTRL_STRICT_VALIDATION", false),
            scan_only: parsed_env("NTRL_SCAN_ONLY", false),
            cache_capacity: parsed_env("NTRL_CACHE_CAPACITY", 1000),
            max_concurrent: parsed_env("NTRL_MAX_CONCURRENT", 8),
            chunk_size: parsed_env("NTRL_CHUNK_SIZE", 20),
            requests_per_second: parsed_env("NTRL_REQUESTS_PER_SECOND", 5),
            max_item_retries: parsed_env("NTRL_MAX_ITEM_RETRIES", 2),
            article_timeout_secs: parsed_env("NTRL_ARTICLE_TIMEOUT_SECS", 120),
            batch_timeout_secs: parsed_env("NTRL_BATCH_TIMEOUT_SECS", 600),
            daily_budget_cents: parsed_env("NTRL_DAILY_BUDGET_CENTS", 0),
        }
    }

    /// Log the active configuration without secrets.
    pub fn log_redacted(&self) {
        info!(
            detector_model = %self.detector_model,
            rewrite_model = %self.rewrite_model,
            scan_timeout_secs = self.scan_timeout_secs,
            scan_only = self.scan_only,
            max_concurrent = self.max_concurrent,
            requests_per_second = self.requests_per_second,
            daily_budget_cents = self.daily_budget_cents,
            api_key_set = !self.anthropic_api_key.is_empty(),
            "NTRL configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
