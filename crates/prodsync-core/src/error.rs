use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents every failure the ingestion pipeline can surface.
/// It uses the `thiserror` crate for ergonomic error handling and automatic
/// conversion from underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # External source failures
///
/// The remote catalogue client reports exactly four kinds of failure:
/// [`AppError::Timeout`], [`AppError::ConnectionError`], [`AppError::HttpError`]
/// and [`AppError::SourceUnavailable`]. See [`AppError::is_external`].
///
/// # Examples
///
/// ```no_run
/// use prodsync_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures, query errors
    /// and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The remote call exceeded its configured duration.
    #[error("Request timeout while calling external API: {endpoint}")]
    Timeout {
        /// The endpoint that was being called.
        endpoint: String,
    },

    /// The remote host could not be reached.
    #[error("Connection error while calling external API: {endpoint}")]
    ConnectionError {
        /// The endpoint that was being called.
        endpoint: String,
        /// Transport-level cause.
        cause: String,
    },

    /// The remote source answered with a non-success status.
    #[error("HTTP error {status} while calling external API: {endpoint}. Response: {body}")]
    HttpError {
        /// The endpoint that was being called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The source is considered unavailable (circuit open or fallback path).
    #[error("External API is currently unavailable. Please try again later. ({0})")]
    SourceUnavailable(String),

    /// The remote source has no product with this external identifier.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A single record could not be mapped or stored.
    #[error("Failed to process product {external_id}: {reason}")]
    RecordProcessing {
        /// External identifier of the offending record.
        external_id: i64,
        /// Why it was rejected.
        reason: String,
    },

    /// A full ingestion run is already executing.
    #[error("Data loading is already in progress")]
    IngestionInProgress,

    /// Rebuilding the store index failed.
    #[error("Index rebuild failed: {0}")]
    IndexRebuild(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for operators.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::Timeout { endpoint } => {
                format!(
                    "Request to {} timed out.\n   The product source may be overloaded. Try again later.",
                    endpoint
                )
            }
            AppError::ConnectionError { endpoint, .. } => {
                format!(
                    "Cannot connect to {}.\n   Check your network connection and SOURCE_BASE_URL.",
                    endpoint
                )
            }
            AppError::HttpError { status: 429, .. } => {
                "The product source is rate limiting requests. Please wait a moment and try again."
                    .to_string()
            }
            AppError::HttpError {
                endpoint, status, ..
            } => {
                format!("The product source returned HTTP {} for {}.", status, endpoint)
            }
            AppError::SourceUnavailable(_) => {
                "External API is currently unavailable. Please try again later.".to_string()
            }
            AppError::IngestionInProgress => {
                "Data loading is already in progress. Check /api/v1/data/status.".to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your environment variables.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is a failure of the remote product source.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            AppError::Timeout { .. }
                | AppError::ConnectionError { .. }
                | AppError::HttpError { .. }
                | AppError::SourceUnavailable(_)
        )
    }

    /// Returns true if this is a 429 answer from the source.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AppError::HttpError { status: 429, .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use prodsync_core::error::AppError;
    ///
    /// let err = AppError::Timeout { endpoint: "/products".to_string() };
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::HttpError {
    ///     endpoint: "/products".to_string(),
    ///     status: 503,
    ///     body: String::new(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// // A missing product will stay missing
    /// let err = AppError::ProductNotFound(42);
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Timeout { .. } | AppError::ConnectionError { .. } => true,
            AppError::HttpError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error should trip the circuit breaker.
    ///
    /// Transient errors (timeouts, refused connections, rate limits, server
    /// errors) trip the breaker. Client-side mistakes and missing products say
    /// nothing about the health of the source and must not.
    ///
    /// # Examples
    ///
    /// ```
    /// use prodsync_core::error::AppError;
    ///
    /// let err = AppError::ConnectionError {
    ///     endpoint: "/products".to_string(),
    ///     cause: "connection refused".to_string(),
    /// };
    /// assert!(err.should_trip_circuit());
    ///
    /// let err = AppError::HttpError {
    ///     endpoint: "/products/1".to_string(),
    ///     status: 400,
    ///     body: String::new(),
    /// };
    /// assert!(!err.should_trip_circuit());
    /// ```
    pub fn should_trip_circuit(&self) -> bool {
        match self {
            AppError::Timeout { .. } | AppError::ConnectionError { .. } => true,
            AppError::HttpError { status, .. } => *status == 429 || *status >= 500,

            AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::SourceUnavailable(_)
            | AppError::ProductNotFound(_)
            | AppError::InvalidUrl(_)
            | AppError::RecordProcessing { .. }
            | AppError::IngestionInProgress
            | AppError::IndexRebuild(_)
            | AppError::ConfigError(_)
            | AppError::Generic(_) => false,
        }
    }
}
