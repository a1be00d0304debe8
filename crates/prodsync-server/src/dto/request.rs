//! Request DTOs for API endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use prodsync_core::{PageRequest, ProductFilter};

/// Query parameters for triggering a full load.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LoadQuery {
    /// Return 202 immediately instead of waiting for the run to finish
    #[param(example = false)]
    #[serde(default)]
    pub background: bool,
}

/// Query parameters for listing stored products.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListQuery {
    /// Only products of this category
    #[param(example = "beauty")]
    pub category: Option<String>,
    /// Only products of this brand
    #[param(example = "Essence")]
    pub brand: Option<String>,
    /// Zero-based page number
    #[param(example = 0, minimum = 0)]
    pub page: Option<u32>,
    /// Page size (1-100, default 20)
    #[param(example = 20, minimum = 1, maximum = 100)]
    pub size: Option<u32>,
}

impl ProductListQuery {
    /// Splits the query into a filter and a page. Blank filter values are
    /// ignored. Fails with a message if `size` is outside `1..=100`.
    pub fn into_parts(self) -> Result<(ProductFilter, PageRequest), String> {
        let size = self.size.unwrap_or(PageRequest::DEFAULT_SIZE);
        if !(1..=PageRequest::MAX_SIZE).contains(&size) {
            return Err(format!(
                "size must be between 1 and {}, got {}",
                PageRequest::MAX_SIZE,
                size
            ));
        }

        let filter = ProductFilter {
            category: non_blank(self.category),
            brand: non_blank(self.brand),
        };
        Ok((filter, PageRequest::new(self.page.unwrap_or(0), size)))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
