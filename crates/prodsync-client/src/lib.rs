//! Prodsync Client - HTTP client for the remote product catalogue
//!
//! This crate provides:
//!
//! - [`products`] - the catalogue client, implementing
//!   [`prodsync_core::traits::ProductSource`]
//!
//! # Overview
//!
//! The client handles request building, response parsing and error
//! classification. Retries, per-call deadlines and circuit breaking come from
//! [`prodsync_core::ResiliencePolicy`].

pub mod products;

pub use products::ProductApiClient;
