//! Prodsync Server - REST API over the prodsync ingestion orchestrator
//!
//! This crate provides an HTTP API for driving ingestion:
//!
//! - **Data**: Trigger full or single-product loads, clear the store, rebuild the index
//! - **Status**: Run progress and remote catalogue availability
//! - **Products**: Read back stored products
//!
//! # API Documentation
//!
//! When running the server, interactive API documentation is available
//! at `/swagger-ui`.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod startup;
pub mod state;

pub use config::{LoadOnStartup, ServerConfig};
pub use error::ApiError;
pub use router::create_router;
pub use startup::spawn_startup_load;
pub use state::AppState;
