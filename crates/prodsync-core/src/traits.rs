//! Trait definitions for the orchestrator's collaborators.
//!
//! The ingestion service only talks to a product store and a product source
//! through these traits, enabling:
//!
//! - **Testability**: in-memory mocks for the orchestrator tests
//! - **Flexibility**: PostgreSQL today, anything that upholds the contract tomorrow
//! - **Decoupling**: core logic does not depend on sqlx or reqwest types
//!
//! # Example
//!
//! ```
//! use prodsync_core::traits::{ProductSource, ProductStore};
//!
//! async fn missing_locally<C, S>(source: &C, store: &S) -> Result<usize, prodsync_core::AppError>
//! where
//!     C: ProductSource,
//!     S: ProductStore,
//! {
//!     let page = source.fetch_all().await?;
//!     let mut missing = 0;
//!     for product in &page.products {
//!         if !store.exists_by_external_id(product.id).await? {
//!             missing += 1;
//!         }
//!     }
//!     Ok(missing)
//! }
//! ```

use std::future::Future;

use uuid::Uuid;

use crate::AppError;
use crate::models::{PageRequest, Product, ProductFilter, ProductPage, ProductSlice, RemoteProduct};

/// Local persistence of products, keyed by external identifier.
///
/// Implementations must guarantee at most one product per external id and
/// must tolerate concurrent `batch_upsert` calls on their own.
pub trait ProductStore: Send + Sync + Clone {
    /// Returns true if a product with this external id is stored.
    fn exists_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Loads the product with this external id, if any.
    fn find_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = Result<Option<Product>, AppError>> + Send;

    /// Loads the product with this local id, if any.
    fn find_by_id(&self, id: Uuid)
    -> impl Future<Output = Result<Option<Product>, AppError>> + Send;

    /// Loads the product with this SKU, if any.
    fn find_by_sku(
        &self,
        sku: &str,
    ) -> impl Future<Output = Result<Option<Product>, AppError>> + Send;

    /// Lists one page of products matching `filter`, ordered by title then
    /// external id.
    fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> impl Future<Output = Result<ProductSlice, AppError>> + Send;

    /// Distinct non-null categories, sorted.
    fn distinct_categories(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Distinct non-null brands, sorted.
    fn distinct_brands(&self) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;

    /// Inserts or overwrites every product in `products`, keyed by external id.
    ///
    /// The batch is all-or-nothing.
    ///
    /// # Returns
    ///
    /// The number of rows written.
    fn batch_upsert(
        &self,
        products: &[Product],
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Number of stored products.
    fn count(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Removes every stored product.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    fn delete_all(&self) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Rebuilds whatever search index backs the store.
    fn rebuild_index(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns true if the search index holds no products.
    fn is_index_empty(&self) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// The remote product catalogue.
///
/// Implementations own their retry, timeout and circuit-breaking policy.
/// Callers never retry these operations themselves.
pub trait ProductSource: Send + Sync + Clone {
    /// Fetches the full catalogue together with the source-reported total.
    fn fetch_all(&self) -> impl Future<Output = Result<ProductPage, AppError>> + Send;

    /// Fetches a single product.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ProductNotFound`] when the source has no such product.
    fn fetch_one(
        &self,
        external_id: i64,
    ) -> impl Future<Output = Result<RemoteProduct, AppError>> + Send;

    /// Best-effort availability check. Never fails and never touches the
    /// circuit breaker used by the other two operations.
    fn probe(&self) -> impl Future<Output = bool> + Send;
}
