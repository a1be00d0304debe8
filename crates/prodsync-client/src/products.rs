//! HTTP client for the remote product catalogue.
//!
//! Every catalogue call goes through a [`ResiliencePolicy`]: a per-attempt
//! deadline, bounded retries for transient failures, and a circuit breaker
//! shared by all calls of one client. Transport failures are classified into
//! the catalogue error kinds of [`AppError`] before the policy sees them.

use prodsync_core::circuit_breaker::CircuitBreakerStats;
use prodsync_core::config::{RetryPolicy, SourceConfig};
use prodsync_core::models::{ProductPage, RemoteProduct};
use prodsync_core::{AppError, CircuitBreakerConfig, ResiliencePolicy};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// Name of the circuit breaker guarding the catalogue.
pub const CIRCUIT_NAME: &str = "product-api";

/// Longest response body kept in an [`AppError::HttpError`].
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the remote product catalogue.
///
/// Cloning is cheap and clones share the connection pool and circuit breaker.
///
/// # Examples
///
/// ```no_run
/// use prodsync_client::ProductApiClient;
/// use prodsync_core::SourceConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ProductApiClient::from_config(SourceConfig::default())?;
/// let page = client.fetch_all_products().await?;
/// println!("Fetched {} of {} products", page.products.len(), page.total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProductApiClient {
    client: Client,
    probe_client: Client,
    base_url: Url,
    config: SourceConfig,
    policy: ResiliencePolicy,
}

impl ProductApiClient {
    /// Creates a client with retry and circuit breaker settings read from
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the base URL is malformed.
    /// Returns `AppError::ConfigError` if the HTTP client cannot be built.
    pub fn from_config(config: SourceConfig) -> Result<Self, AppError> {
        let policy = ResiliencePolicy::new(
            CIRCUIT_NAME,
            CircuitBreakerConfig::from_env(),
            RetryPolicy::from_env(),
            config.call_timeout,
        );
        Self::new(config, policy)
    }

    /// Creates a client guarded by the given policy.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the base URL is malformed.
    /// Returns `AppError::ConfigError` if the HTTP client cannot be built.
    pub fn new(config: SourceConfig, policy: ResiliencePolicy) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|_| AppError::InvalidUrl(config.base_url.clone()))?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        // The probe is bounded by the connect timeout end to end
        let probe_client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            probe_client,
            base_url,
            config,
            policy,
        })
    }

    /// Base URL of the catalogue.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Current circuit breaker statistics, for monitoring.
    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.policy.breaker().stats()
    }

    /// Forces the circuit breaker closed.
    pub fn reset_breaker(&self) {
        self.policy.breaker().reset();
    }

    /// Fetches the whole catalogue in one page.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SourceUnavailable` if the circuit is open, otherwise
    /// the error of the last attempt.
    pub async fn fetch_all_products(&self) -> Result<ProductPage, AppError> {
        let endpoint = self.config.all_products_path.as_str();
        let url = &self.endpoint_url(endpoint)?;

        let page: ProductPage = self
            .policy
            .execute(endpoint, || self.get_json(url, endpoint))
            .await?;

        tracing::debug!(
            received = page.products.len(),
            total = page.total,
            "Fetched product catalogue"
        );
        Ok(page)
    }

    /// Fetches one product by its external id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ProductNotFound` on a 404 from the catalogue.
    pub async fn fetch_product(&self, external_id: i64) -> Result<RemoteProduct, AppError> {
        let path = self.config.product_path(external_id);
        let url = &self.endpoint_url(&path)?;
        let endpoint = path.as_str();

        self.policy
            .execute(endpoint, || async move {
                match self.get_json(url, endpoint).await {
                    Err(AppError::HttpError { status: 404, .. }) => {
                        Err(AppError::ProductNotFound(external_id))
                    }
                    other => other,
                }
            })
            .await
    }

    /// Best-effort reachability check.
    ///
    /// Bypasses retries and the circuit breaker and never fails: any error,
    /// including a non-success status, yields `false`.
    pub async fn is_available(&self) -> bool {
        let url = match self.endpoint_url(&self.config.probe_path) {
            Ok(url) => url,
            Err(_) => return false,
        };

        match self.probe_client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::debug!(status = resp.status().as_u16(), "Catalogue probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Catalogue probe failed");
                false
            }
        }
    }

    /// Resolves a path (with optional query) against the base URL, keeping
    /// any path prefix of the base.
    fn endpoint_url(&self, path: &str) -> Result<Url, AppError> {
        let raw = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|_| AppError::InvalidUrl(raw))
    }

    /// One GET attempt, classified into catalogue error kinds.
    async fn get_json<T: DeserializeOwned>(&self, url: &Url, endpoint: &str) -> Result<T, AppError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(e, endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(http_error(status, endpoint, body));
        }

        let bytes = resp.bytes().await.map_err(|e| classify(e, endpoint))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn classify(error: reqwest::Error, endpoint: &str) -> AppError {
    if error.is_timeout() {
        AppError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        AppError::ConnectionError {
            endpoint: endpoint.to_string(),
            cause: error.to_string(),
        }
    }
}

fn http_error(status: StatusCode, endpoint: &str, mut body: String) -> AppError {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    AppError::HttpError {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    }
}

// =============================================================================
// Trait Implementation: ProductSource
// =============================================================================

impl prodsync_core::traits::ProductSource for ProductApiClient {
    async fn fetch_all(&self) -> Result<ProductPage, AppError> {
        self.fetch_all_products().await
    }

    async fn fetch_one(&self, external_id: i64) -> Result<RemoteProduct, AppError> {
        self.fetch_product(external_id).await
    }

    async fn probe(&self) -> bool {
        self.is_available().await
    }
}
