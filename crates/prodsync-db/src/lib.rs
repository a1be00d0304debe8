//! Prodsync DB - Product repository for PostgreSQL
//!
//! This crate provides the repository pattern for product persistence.
//!
//! # Overview
//!
//! The main component is [`ProductRepository`], which implements
//! [`prodsync_core::traits::ProductStore`] on top of a `sqlx` connection pool
//! and owns the `products` schema ([`MIGRATIONS`]).

mod repository;

pub use repository::{MIGRATIONS, ProductRepository};
