//! Pure conversions between the remote, stored and response shapes of a product.
//!
//! Nothing in here performs I/O or keeps state. Validation failures surface as
//! [`AppError::RecordProcessing`] so the ingestion pipeline can skip the record.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Meta, Product, ProductResponse, RemoteMeta, RemoteProduct, RemoteReview, Review};

/// Maximum accepted title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 500;

/// Converts a freshly fetched record into a new local product.
///
/// A new local identifier is generated and both timestamps are set to now.
/// Missing tag, image and review lists become empty lists.
///
/// # Examples
///
/// ```
/// use prodsync_core::mapper;
/// use prodsync_core::models::RemoteProduct;
///
/// let remote = RemoteProduct {
///     id: 12,
///     title: Some("Annibale Colombo Bed".to_string()),
///     price: Some(1899.99),
///     ..Default::default()
/// };
///
/// let product = mapper::to_entity(&remote).unwrap();
/// assert_eq!(product.external_id, 12);
/// assert!(product.tags.is_empty());
/// assert!(product.reviews.is_empty());
/// ```
pub fn to_entity(remote: &RemoteProduct) -> Result<Product, AppError> {
    let now = Utc::now();
    build(remote, Uuid::new_v4(), now, now)
}

/// Overwrites every mutable field of `existing` with the values of `incoming`.
///
/// This is a wholesale replacement: fields missing from `incoming` are cleared
/// and the review list is replaced, not appended to. The local identifier,
/// the external identifier and `created_at` are carried over unchanged, and
/// `updated_at` is refreshed.
///
/// # Errors
///
/// Returns [`AppError::RecordProcessing`] if `incoming` describes a different
/// external identifier or fails validation.
pub fn merge_into(existing: Product, incoming: &RemoteProduct) -> Result<Product, AppError> {
    if existing.external_id != incoming.id {
        return Err(AppError::RecordProcessing {
            external_id: incoming.id,
            reason: format!(
                "cannot merge into product with external id {}",
                existing.external_id
            ),
        });
    }

    build(incoming, existing.id, existing.created_at, Utc::now())
}

/// Projects a stored product for the API boundary. `None` in, `None` out.
pub fn to_response(product: Option<&Product>) -> Option<ProductResponse> {
    let p = product?;
    Some(ProductResponse {
        id: p.id,
        external_id: p.external_id,
        title: p.title.clone(),
        description: p.description.clone(),
        category: p.category.clone(),
        price: p.price,
        discount_percentage: p.discount_percentage,
        rating: p.rating,
        stock: p.stock,
        tags: p.tags.clone(),
        brand: p.brand.clone(),
        sku: p.sku.clone(),
        weight: p.weight,
        dimensions: p.dimensions,
        warranty_information: p.warranty_information.clone(),
        shipping_information: p.shipping_information.clone(),
        availability_status: p.availability_status.clone(),
        reviews: p.reviews.clone(),
        return_policy: p.return_policy.clone(),
        minimum_order_quantity: p.minimum_order_quantity,
        meta: p.meta.clone(),
        images: p.images.clone(),
        thumbnail: p.thumbnail.clone(),
        created_at: p.created_at,
        updated_at: p.updated_at,
    })
}

/// Projects a list of stored products. An absent list yields an empty one.
pub fn to_response_list(products: Option<&[Product]>) -> Vec<ProductResponse> {
    products
        .unwrap_or_default()
        .iter()
        .filter_map(|p| to_response(Some(p)))
        .collect()
}

fn build(
    remote: &RemoteProduct,
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<Product, AppError> {
    let title = validate(remote)?;

    Ok(Product {
        id,
        external_id: remote.id,
        title,
        description: remote.description.clone(),
        category: remote.category.clone(),
        price: remote.price,
        discount_percentage: remote.discount_percentage,
        rating: remote.rating,
        stock: remote.stock,
        tags: remote.tags.clone().unwrap_or_default(),
        brand: remote.brand.clone(),
        sku: remote.sku.clone(),
        weight: remote.weight,
        dimensions: remote.dimensions,
        warranty_information: remote.warranty_information.clone(),
        shipping_information: remote.shipping_information.clone(),
        availability_status: remote.availability_status.clone(),
        reviews: remote
            .reviews
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(to_review)
            .collect(),
        return_policy: remote.return_policy.clone(),
        minimum_order_quantity: remote.minimum_order_quantity,
        meta: remote.meta.as_ref().map(to_meta),
        images: remote.images.clone().unwrap_or_default(),
        thumbnail: remote.thumbnail.clone(),
        created_at,
        updated_at,
    })
}

/// Checks the constraints the store relies on and returns the trimmed title.
fn validate(remote: &RemoteProduct) -> Result<String, AppError> {
    let reject = |reason: String| AppError::RecordProcessing {
        external_id: remote.id,
        reason,
    };

    let title = remote.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(reject("title is blank".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(reject(format!(
            "title exceeds {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    if let Some(price) = remote.price {
        if price <= 0.0 {
            return Err(reject(format!("price must be positive, got {}", price)));
        }
    }
    if let Some(discount) = remote.discount_percentage {
        if !(0.0..=100.0).contains(&discount) {
            return Err(reject(format!(
                "discount percentage {} outside 0..=100",
                discount
            )));
        }
    }
    if let Some(rating) = remote.rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(reject(format!("rating {} outside 0..=5", rating)));
        }
    }
    if remote.stock.is_some_and(|s| s < 0) {
        return Err(reject("stock must not be negative".to_string()));
    }
    if remote.weight.is_some_and(|w| w < 0) {
        return Err(reject("weight must not be negative".to_string()));
    }
    if remote.minimum_order_quantity.is_some_and(|q| q < 1) {
        return Err(reject("minimum order quantity must be at least 1".to_string()));
    }

    Ok(title.to_string())
}

fn to_review(remote: &RemoteReview) -> Review {
    Review {
        rating: remote.rating,
        comment: remote.comment.clone(),
        review_date: remote.date.as_deref().and_then(parse_timestamp),
        reviewer_name: remote.reviewer_name.clone(),
        reviewer_email: remote.reviewer_email.clone(),
    }
}

fn to_meta(remote: &RemoteMeta) -> Meta {
    Meta {
        created_at: remote.created_at.as_deref().and_then(parse_timestamp),
        updated_at: remote.updated_at.as_deref().and_then(parse_timestamp),
        barcode: remote.barcode.clone(),
        qr_code: remote.qr_code.clone(),
    }
}

/// Parses RFC 3339 timestamps, falling back to a zone-less ISO-8601 form
/// interpreted as UTC. Unparseable values are dropped.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .inspect_err(|e| tracing::debug!(value = raw, error = %e, "Ignoring unparseable timestamp"))
        .ok()
}
