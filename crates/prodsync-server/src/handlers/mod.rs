//! HTTP request handlers for API endpoints.

pub mod data;
pub mod health;
pub mod products;
