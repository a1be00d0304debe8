//! Circuit breaker guarding calls to the remote product source.
//!
//! Failures are counted inside a sliding time window. Once the count reaches
//! the threshold the breaker opens and every call fails fast without touching
//! the network. After the recovery timeout a single trial call is let through.
//!
//! # Circuit States
//!
//! ```text
//! CLOSED --[N failures within window]--> OPEN --[recovery timeout]--> HALF_OPEN
//!                                         ^                              |
//!                                         +-------[trial fails]----------+
//!                                                                        |
//! CLOSED <-------------------------[trial succeeds]----------------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use prodsync_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
//!
//! let cb = CircuitBreaker::new("products", CircuitBreakerConfig::default());
//!
//! match cb.call(|| client.fetch_page()).await {
//!     Ok(page) => { /* success */ }
//!     Err(CircuitBreakerError::Open { .. }) => { /* rejected without a request */ }
//!     Err(CircuitBreakerError::Inner(e)) => { /* the request itself failed */ }
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::AppError;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - requests flow normally.
    Closed,
    /// Circuit is open - requests are rejected immediately.
    Open,
    /// Circuit is half-open - one trial request is allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures inside `sliding_window` that opens the circuit.
    pub failure_threshold: u32,

    /// Failures older than this no longer count toward the threshold.
    pub sliding_window: Duration,

    /// Time to wait before transitioning from Open to Half-Open.
    pub recovery_timeout: Duration,

    /// When the source answers 429, multiply recovery_timeout by this factor.
    pub rate_limit_backoff_multiplier: f32,

    /// Maximum recovery timeout after rate limit backoffs.
    pub max_recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            sliding_window: Duration::from_secs(60),
            recovery_timeout: Duration::from_secs(30),
            rate_limit_backoff_multiplier: 2.0,
            max_recovery_timeout: Duration::from_secs(300),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates config from environment variables with fallback to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: std::env::var("CB_FAILURE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.failure_threshold),
            sliding_window: std::env::var("CB_SLIDING_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sliding_window),
            recovery_timeout: std::env::var("CB_RECOVERY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_timeout),
            ..defaults
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    /// Timestamps of failures still inside the sliding window.
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    last_error_message: Option<String>,
    current_recovery_timeout: Duration,
}

impl CircuitBreakerInner {
    fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: VecDeque::new(),
            opened_at: None,
            trial_in_flight: false,
            last_error_message: None,
            current_recovery_timeout: config.recovery_timeout,
        }
    }

    fn remaining_cooldown(&self) -> Duration {
        self.opened_at
            .map(|t| self.current_recovery_timeout.saturating_sub(t.elapsed()))
            .unwrap_or(self.current_recovery_timeout)
    }

    fn prune(&mut self, window: Duration) {
        while let Some(oldest) = self.failures.front() {
            if oldest.elapsed() > window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Statistics about circuit breaker state for monitoring.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Name of the circuit breaker.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures currently inside the sliding window.
    pub failure_count: u32,
    /// Whether a half-open trial call is running.
    pub trial_in_flight: bool,
    /// Last error message if any.
    pub last_error: Option<String>,
    /// Time until circuit may transition to half-open (if currently open).
    pub time_until_half_open: Option<Duration>,
}

/// Error type for circuit breaker operations.
#[derive(Debug)]
pub enum CircuitBreakerError {
    /// Circuit is open - request was rejected without calling the service.
    Open {
        /// Name of the circuit breaker.
        name: String,
        /// Time until the circuit may transition to half-open.
        retry_after: Duration,
    },
    /// The inner operation failed.
    Inner(AppError),
}

impl std::fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::Open { name, retry_after } => {
                write!(
                    f,
                    "Circuit breaker '{}' is open. Retry after {} seconds.",
                    name,
                    retry_after.as_secs()
                )
            }
            CircuitBreakerError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CircuitBreakerError {}

impl From<CircuitBreakerError> for AppError {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::Open { .. } => AppError::SourceUnavailable(err.to_string()),
            CircuitBreakerError::Inner(e) => e,
        }
    }
}

/// Thread-safe circuit breaker for protecting external API calls.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitBreakerInner>>,
}

/// Releases the half-open trial slot if the trial future is dropped before
/// reporting an outcome.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.breaker.lock();
            inner.trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given name and configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let inner = CircuitBreakerInner::new(&config);
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the name of this circuit breaker.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, CircuitBreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current state of the circuit.
    ///
    /// Note: This also handles lazy state transitions from Open to HalfOpen
    /// when the recovery timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    /// Returns circuit breaker statistics for monitoring.
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.prune(self.config.sliding_window);

        let time_until_half_open =
            (inner.state == CircuitState::Open).then(|| inner.remaining_cooldown());

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failures.len() as u32,
            trial_in_flight: inner.trial_in_flight,
            last_error: inner.last_error_message.clone(),
            time_until_half_open,
        }
    }

    /// Executes the given operation through the circuit breaker.
    ///
    /// - Closed: executes the operation and tracks the outcome
    /// - Open: returns `CircuitBreakerError::Open` immediately
    /// - HalfOpen: the first caller runs the trial, concurrent callers are
    ///   rejected as if the circuit were open
    ///
    /// Errors for which [`AppError::should_trip_circuit`] is false mean the
    /// source did answer, so they count as a success for the breaker.
    pub async fn call<F, T, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut slot = TrialSlot {
            breaker: self,
            armed: false,
        };

        {
            let mut inner = self.lock();
            self.maybe_transition_to_half_open(&mut inner);

            match inner.state {
                CircuitState::Closed => {}
                CircuitState::HalfOpen if !inner.trial_in_flight => {
                    inner.trial_in_flight = true;
                    slot.armed = true;
                    tracing::debug!(circuit = %self.name, "Allowing half-open trial call");
                }
                CircuitState::HalfOpen | CircuitState::Open => {
                    return Err(CircuitBreakerError::Open {
                        name: self.name.clone(),
                        retry_after: inner.remaining_cooldown(),
                    });
                }
            }
        }

        let result = operation().await;

        // The outcome is recorded below, which releases the slot itself
        slot.armed = false;
        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.should_trip_circuit() => self.record_failure(e),
            Err(_) => self.record_success(),
        }

        result.map_err(CircuitBreakerError::Inner)
    }

    /// Records a successful operation.
    pub fn record_success(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                tracing::info!(
                    circuit = %self.name,
                    "Circuit breaker closing after successful trial call"
                );
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.opened_at = None;
                inner.trial_in_flight = false;
                inner.last_error_message = None;
                inner.current_recovery_timeout = self.config.recovery_timeout;
            }
            CircuitState::Closed => {
                inner.failures.clear();
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late
            }
        }
    }

    /// Records a failed operation.
    pub fn record_failure(&self, error: &AppError) {
        let mut inner = self.lock();
        let is_rate_limit = error.is_rate_limit();

        match inner.state {
            CircuitState::Closed => {
                inner.prune(self.config.sliding_window);
                inner.failures.push_back(Instant::now());
                inner.last_error_message = Some(error.to_string());

                let failures = inner.failures.len() as u32;
                if failures >= self.config.failure_threshold {
                    tracing::warn!(
                        circuit = %self.name,
                        failures,
                        window_secs = self.config.sliding_window.as_secs(),
                        error = %error,
                        "Circuit breaker opening after {} failures within window",
                        failures
                    );
                    self.open(&mut inner, is_rate_limit);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    circuit = %self.name,
                    error = %error,
                    "Circuit breaker trial call failed, returning to open state"
                );
                inner.last_error_message = Some(error.to_string());
                inner.trial_in_flight = false;
                self.open(&mut inner, is_rate_limit);
            }
            CircuitState::Open => {
                inner.last_error_message = Some(error.to_string());
            }
        }
    }

    fn open(&self, inner: &mut CircuitBreakerInner, is_rate_limit: bool) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());

        if is_rate_limit {
            inner.current_recovery_timeout = std::cmp::min(
                Duration::from_secs_f32(
                    inner.current_recovery_timeout.as_secs_f32()
                        * self.config.rate_limit_backoff_multiplier,
                ),
                self.config.max_recovery_timeout,
            );
            tracing::info!(
                circuit = %self.name,
                recovery_timeout_secs = inner.current_recovery_timeout.as_secs(),
                "Extended recovery timeout due to rate limit"
            );
        }
    }

    /// Manually resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.lock();
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
        *inner = CircuitBreakerInner::new(&self.config);
    }

    fn maybe_transition_to_half_open(&self, inner: &mut CircuitBreakerInner) {
        if inner.state == CircuitState::Open && inner.remaining_cooldown().is_zero() {
            tracing::info!(
                circuit = %self.name,
                "Circuit breaker transitioning to half-open state"
            );
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }
}
