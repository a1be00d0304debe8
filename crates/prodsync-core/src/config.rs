//! Configuration types for prodsync components.
//!
//! Every type has sensible defaults and a `from_env()` constructor that
//! overrides individual values from environment variables. Unparseable values
//! fall back to the default.

use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}

// =============================================================================
// Remote Source Configuration
// =============================================================================

/// Where the remote product catalogue lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the catalogue API.
    pub base_url: String,
    /// Path (with query) returning the full catalogue in one page.
    pub all_products_path: String,
    /// Path template for a single product; `{id}` is substituted.
    pub product_by_id_path: String,
    /// Cheap path used by the availability probe.
    pub probe_path: String,
    /// TCP connect timeout. Also bounds the availability probe.
    pub connect_timeout: Duration,
    /// Read timeout applied by the HTTP client to a whole response.
    pub read_timeout: Duration,
    /// Overall deadline of one guarded call attempt.
    pub call_timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dummyjson.com".to_string(),
            all_products_path: "/products?limit=0".to_string(),
            product_by_id_path: "/products/{id}".to_string(),
            probe_path: "/products?limit=1".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(30),
            user_agent: concat!("prodsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SourceConfig {
    /// Creates config from environment variables with fallback to defaults.
    ///
    /// Reads `SOURCE_BASE_URL`, `SOURCE_CONNECT_TIMEOUT_MS`,
    /// `SOURCE_READ_TIMEOUT_MS` and `SOURCE_CALL_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SOURCE_BASE_URL").unwrap_or(defaults.base_url),
            connect_timeout: env_millis("SOURCE_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            read_timeout: env_millis("SOURCE_READ_TIMEOUT_MS").unwrap_or(defaults.read_timeout),
            call_timeout: env_millis("SOURCE_CALL_TIMEOUT_MS").unwrap_or(defaults.call_timeout),
            ..defaults
        }
    }

    /// Overrides the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the per-call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Returns the single-product path for the given external id.
    pub fn product_path(&self, external_id: i64) -> String {
        self.product_by_id_path
            .replace("{id}", &external_id.to_string())
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Bounded retry with exponential backoff for idempotent source calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt. Doubles on every further attempt.
    pub base_delay: Duration,
    /// Upper bound for any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Creates config from `RETRY_MAX_ATTEMPTS` and `RETRY_BASE_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse::<u32>("RETRY_MAX_ATTEMPTS")
                .map(|n| n.max(1))
                .unwrap_or(defaults.max_attempts),
            base_delay: env_millis("RETRY_BASE_DELAY_MS").unwrap_or(defaults.base_delay),
            ..defaults
        }
    }

    /// Backoff to wait after the given failed attempt (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use prodsync_core::config::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
    /// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(10));
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }
}

// =============================================================================
// Ingestion Configuration
// =============================================================================

/// Tunables of the batch-upsert pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of products written per store round-trip.
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl IngestConfig {
    /// Creates config from `INGEST_BATCH_SIZE`.
    pub fn from_env() -> Self {
        Self {
            batch_size: env_parse::<usize>("INGEST_BATCH_SIZE")
                .map(|n| n.max(1))
                .unwrap_or(Self::default().batch_size),
        }
    }

    /// Creates a new IngestConfig with a custom batch size (at least 1).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}
