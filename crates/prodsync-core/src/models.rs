//! Product representations: as delivered by the remote catalogue, as stored
//! locally, and as exposed to API consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Remote representation
// =============================================================================

/// One product exactly as the remote catalogue returns it.
///
/// Only `id` is required. Everything else may be missing from the payload,
/// so every other field is optional and absent collections stay `None` until
/// the mapper normalizes them.
///
/// # Examples
///
/// ```
/// use prodsync_core::models::RemoteProduct;
///
/// let json = r#"{
///     "id": 1,
///     "title": "Essence Mascara Lash Princess",
///     "price": 9.99,
///     "discountPercentage": 7.17,
///     "tags": ["beauty", "mascara"],
///     "dimensions": {"width": 23.17, "height": 14.43, "depth": 28.01}
/// }"#;
///
/// let product: RemoteProduct = serde_json::from_str(json).unwrap();
/// assert_eq!(product.id, 1);
/// assert_eq!(product.discount_percentage, Some(7.17));
/// assert!(product.reviews.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProduct {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
    pub tags: Option<Vec<String>>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<i32>,
    pub dimensions: Option<Dimensions>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Option<Vec<RemoteReview>>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: Option<i32>,
    pub meta: Option<RemoteMeta>,
    pub images: Option<Vec<String>>,
    pub thumbnail: Option<String>,
}

/// A customer review as delivered by the remote catalogue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteReview {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    /// ISO-8601 timestamp, parsed by the mapper.
    pub date: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
}

/// Catalogue bookkeeping metadata as delivered by the remote catalogue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMeta {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
}

/// One page of the remote product listing.
///
/// The all-products endpoint is called with `limit=0`, so a single page
/// carries the whole catalogue together with the source-reported total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<RemoteProduct>,
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

// =============================================================================
// Local entity
// =============================================================================

/// Physical package dimensions, shared by the remote and local shapes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<f64>,
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub rating: Option<i32>,
    pub comment: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
}

/// Stored catalogue metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meta {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub barcode: Option<String>,
    pub qr_code: Option<String>,
}

/// The locally persisted product.
///
/// `external_id` is the natural key: the store keeps at most one product per
/// external identifier. `id` and `created_at` are assigned when the product
/// is first seen and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub external_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
    pub tags: Vec<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<i32>,
    pub dimensions: Option<Dimensions>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Vec<Review>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: Option<i32>,
    pub meta: Option<Meta>,
    pub images: Vec<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Boundary projection
// =============================================================================

/// Read-only projection of a [`Product`] handed to API consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub external_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
    pub tags: Vec<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub weight: Option<i32>,
    pub dimensions: Option<Dimensions>,
    pub warranty_information: Option<String>,
    pub shipping_information: Option<String>,
    pub availability_status: Option<String>,
    pub reviews: Vec<Review>,
    pub return_policy: Option<String>,
    pub minimum_order_quantity: Option<i32>,
    pub meta: Option<Meta>,
    pub images: Vec<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Listing
// =============================================================================

/// Restricts a product listing. Unset fields match every product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub brand: Option<String>,
}

/// Zero-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    /// Creates a page request, clamping `size` to `1..=MAX_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// Products of one page, with the number of products matching the filter.
#[derive(Debug, Clone, Default)]
pub struct ProductSlice {
    pub products: Vec<Product>,
    pub total: u64,
}

/// A page of [`ProductResponse`] with paging metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedProducts {
    pub content: Vec<ProductResponse>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl PagedProducts {
    pub fn new(content: Vec<ProductResponse>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(u64::from(request.size)),
        }
    }

    pub fn is_first(&self) -> bool {
        self.page == 0
    }

    /// True on the final page, and on any page past the end.
    pub fn is_last(&self) -> bool {
        u64::from(self.page) + 1 >= self.total_pages
    }
}
