//! Prodsync Core - Domain types, resilience policies and the ingestion orchestrator.
//!
//! This crate provides the core functionality for prodsync, including:
//!
//! - **Domain models**: [`RemoteProduct`], [`Product`], [`ProductResponse`]
//! - **Mapping**: [`mapper`] converts remote records into validated entities
//! - **Resilience**: [`CircuitBreaker`] and [`ResiliencePolicy`] (retry, timeout, breaker)
//! - **Services**: [`IngestionService`] for full and single-product ingestion
//! - **Traits**: [`ProductStore`], [`ProductSource`] for dependency injection
//! - **Progress reporting**: [`ProgressReporter`] trait for decoupled logging and status
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits:
//!
//! - [`ProductStore`] - abstracts persistence (e.g., PostgreSQL)
//! - [`ProductSource`] - abstracts the remote catalogue (e.g., an HTTP JSON API)
//!
//! # Example
//!
//! ```ignore
//! use prodsync_core::IngestionService;
//!
//! let service = IngestionService::new(repository, client);
//! let result = service.start_full_ingestion().await;
//! println!("{} ({} skipped)", result.message, result.skipped_ids.len());
//!
//! let status = service.status();
//! println!("{}% - {}", status.percent, status.phase);
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod ingest;
pub mod mapper;
pub mod models;
pub mod progress;
pub mod resilience;
pub mod status;
pub mod traits;

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
};

// Configuration
pub use config::{IngestConfig, RetryPolicy, SourceConfig};

// Error handling
pub use error::AppError;

// Ingestion
pub use ingest::{IngestionHandle, IngestionResult, IngestionService, IngestStats, UpsertOutcome};

// Domain models
pub use models::{
    Dimensions, Meta, PageRequest, PagedProducts, Product, ProductFilter, ProductPage,
    ProductResponse, ProductSlice, RemoteMeta, RemoteProduct, RemoteReview, Review,
};

// Progress and status
pub use progress::{IngestEvent, ProgressReporter, SilentReporter, TracingReporter};
pub use status::{RunState, RunStatus, StatusTracker};

// Resilience
pub use resilience::ResiliencePolicy;

// Traits
pub use traits::{ProductSource, ProductStore};
