//! Product repository for PostgreSQL.
//!
//! Products are keyed by `external_id`: the unique constraint on that column
//! is what makes `batch_upsert` idempotent. Collections and nested objects are
//! stored as JSONB.

use chrono::{DateTime, Utc};
use prodsync_core::error::AppError;
use prodsync_core::models::{
    Dimensions, Meta, PageRequest, Product, ProductFilter, ProductSlice, Review,
};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Schema statements, executed one by one by [`ProductRepository::migrate`].
pub const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        external_id BIGINT NOT NULL,
        title VARCHAR(500) NOT NULL,
        description TEXT,
        category VARCHAR(255),
        price DOUBLE PRECISION,
        discount_percentage DOUBLE PRECISION,
        rating DOUBLE PRECISION,
        stock INTEGER,
        tags JSONB NOT NULL DEFAULT '[]'::jsonb,
        brand VARCHAR(255),
        sku VARCHAR(255),
        weight INTEGER,
        dimensions JSONB,
        warranty_information TEXT,
        shipping_information TEXT,
        availability_status VARCHAR(100),
        reviews JSONB NOT NULL DEFAULT '[]'::jsonb,
        return_policy TEXT,
        minimum_order_quantity INTEGER,
        meta JSONB,
        images JSONB NOT NULL DEFAULT '[]'::jsonb,
        thumbnail TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT uk_products_external_id UNIQUE (external_id),
        CONSTRAINT uk_products_sku UNIQUE (sku)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)",
    "CREATE INDEX IF NOT EXISTS idx_products_title ON products(title)",
    "CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand)",
];

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const PRODUCT_COLUMNS: &str = "id, external_id, title, description, category, price, discount_percentage, rating, stock, tags, brand, sku, weight, dimensions, warranty_information, shipping_information, availability_status, reviews, return_policy, minimum_order_quantity, meta, images, thumbnail, created_at, updated_at";

/// Filter shared by the listing and its count. `$1` is the category and `$2`
/// the brand; NULL matches everything.
const LIST_FILTER: &str =
    "($1::text IS NULL OR category = $1::text) AND ($2::text IS NULL OR brand = $2::text)";

const UPSERT_QUERY: &str = r#"
    INSERT INTO products (
        id, external_id, title, description, category, price, discount_percentage,
        rating, stock, tags, brand, sku, weight, dimensions, warranty_information,
        shipping_information, availability_status, reviews, return_policy,
        minimum_order_quantity, meta, images, thumbnail, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
    ON CONFLICT (external_id)
    DO UPDATE SET
        title = EXCLUDED.title,
        description = EXCLUDED.description,
        category = EXCLUDED.category,
        price = EXCLUDED.price,
        discount_percentage = EXCLUDED.discount_percentage,
        rating = EXCLUDED.rating,
        stock = EXCLUDED.stock,
        tags = EXCLUDED.tags,
        brand = EXCLUDED.brand,
        sku = EXCLUDED.sku,
        weight = EXCLUDED.weight,
        dimensions = EXCLUDED.dimensions,
        warranty_information = EXCLUDED.warranty_information,
        shipping_information = EXCLUDED.shipping_information,
        availability_status = EXCLUDED.availability_status,
        reviews = EXCLUDED.reviews,
        return_policy = EXCLUDED.return_policy,
        minimum_order_quantity = EXCLUDED.minimum_order_quantity,
        meta = EXCLUDED.meta,
        images = EXCLUDED.images,
        thumbnail = EXCLUDED.thumbnail,
        updated_at = EXCLUDED.updated_at
"#;

/// Repository for product persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use prodsync_db::ProductRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/prodsync")
///     .await?;
///
/// let repo = ProductRepository::new(pool);
/// repo.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProductRepository {
    pool: Pool<Postgres>,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the schema if it does not exist yet. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), AppError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;
        }
        Ok(())
    }

    /// Checks database connectivity by executing a simple query.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    pub async fn exists_by_external_id(&self, external_id: i64) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE external_id = $1)")
                .bind(external_id)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;
        Ok(exists)
    }

    /// Retrieves a product by its external identifier.
    pub async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Product>, AppError> {
        let query = format!(
            "SELECT {} FROM products WHERE external_id = $1",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(Product::from))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let query = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(Product::from))
    }

    pub async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError> {
        let query = format!("SELECT {} FROM products WHERE sku = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(Product::from))
    }

    /// Lists one page of products matching `filter`, ordered by title then
    /// external id, together with the number of matching rows.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductSlice, AppError> {
        let category = filter.category.as_deref();
        let brand = filter.brand.as_deref();

        let count_query = format!("SELECT COUNT(*) FROM products WHERE {}", LIST_FILTER);
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(category)
            .bind(brand)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        let query = format!(
            "SELECT {} FROM products WHERE {} ORDER BY title, external_id LIMIT $3 OFFSET $4",
            PRODUCT_COLUMNS, LIST_FILTER
        );
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .bind(category)
            .bind(brand)
            .bind(i64::from(page.size))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(ProductSlice {
            products: rows.into_iter().map(Product::from).collect(),
            total: total.max(0) as u64,
        })
    }

    pub async fn distinct_categories(&self) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn distinct_brands(&self) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar(
            "SELECT DISTINCT brand FROM products WHERE brand IS NOT NULL ORDER BY brand",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    /// Inserts or updates every product in one transaction.
    ///
    /// On conflict the stored `id` and `created_at` are kept and every other
    /// column is overwritten. Any failing row rolls back the whole batch.
    ///
    /// # Returns
    ///
    /// The number of rows written.
    pub async fn batch_upsert(&self, products: &[Product]) -> Result<u64, AppError> {
        if products.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(AppError::DatabaseError)?;
        let mut written = 0u64;

        for product in products {
            let result = sqlx::query(UPSERT_QUERY)
                .bind(product.id)
                .bind(product.external_id)
                .bind(&product.title)
                .bind(&product.description)
                .bind(&product.category)
                .bind(product.price)
                .bind(product.discount_percentage)
                .bind(product.rating)
                .bind(product.stock)
                .bind(Json(&product.tags))
                .bind(&product.brand)
                .bind(&product.sku)
                .bind(product.weight)
                .bind(product.dimensions.map(Json))
                .bind(&product.warranty_information)
                .bind(&product.shipping_information)
                .bind(&product.availability_status)
                .bind(Json(&product.reviews))
                .bind(&product.return_policy)
                .bind(product.minimum_order_quantity)
                .bind(product.meta.as_ref().map(Json))
                .bind(Json(&product.images))
                .bind(&product.thumbnail)
                .bind(product.created_at)
                .bind(product.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(AppError::DatabaseError)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(AppError::DatabaseError)?;
        tracing::debug!(written, "Product batch committed");
        Ok(written)
    }

    pub async fn count(&self) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(count.max(0) as u64)
    }

    /// Deletes every product. Returns the number of rows removed.
    pub async fn delete_all(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM products")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Index Maintenance
    // =========================================================================

    /// Rebuilds every index of the products table.
    pub async fn rebuild_index(&self) -> Result<(), AppError> {
        sqlx::query("REINDEX TABLE products")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::IndexRebuild(e.to_string()))?;
        Ok(())
    }

    pub async fn is_index_empty(&self) -> Result<bool, AppError> {
        let empty: bool = sqlx::query_scalar("SELECT NOT EXISTS (SELECT 1 FROM products)")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(empty)
    }
}

/// Helper struct for deserializing product rows
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    external_id: i64,
    title: String,
    description: Option<String>,
    category: Option<String>,
    price: Option<f64>,
    discount_percentage: Option<f64>,
    rating: Option<f64>,
    stock: Option<i32>,
    tags: Json<Vec<String>>,
    brand: Option<String>,
    sku: Option<String>,
    weight: Option<i32>,
    dimensions: Option<Json<Dimensions>>,
    warranty_information: Option<String>,
    shipping_information: Option<String>,
    availability_status: Option<String>,
    reviews: Json<Vec<Review>>,
    return_policy: Option<String>,
    minimum_order_quantity: Option<i32>,
    meta: Option<Json<Meta>>,
    images: Json<Vec<String>>,
    thumbnail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            external_id: row.external_id,
            title: row.title,
            description: row.description,
            category: row.category,
            price: row.price,
            discount_percentage: row.discount_percentage,
            rating: row.rating,
            stock: row.stock,
            tags: row.tags.0,
            brand: row.brand,
            sku: row.sku,
            weight: row.weight,
            dimensions: row.dimensions.map(|d| d.0),
            warranty_information: row.warranty_information,
            shipping_information: row.shipping_information,
            availability_status: row.availability_status,
            reviews: row.reviews.0,
            return_policy: row.return_policy,
            minimum_order_quantity: row.minimum_order_quantity,
            meta: row.meta.map(|m| m.0),
            images: row.images.0,
            thumbnail: row.thumbnail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Trait Implementation: ProductStore
// =============================================================================

impl prodsync_core::traits::ProductStore for ProductRepository {
    async fn exists_by_external_id(&self, external_id: i64) -> Result<bool, AppError> {
        ProductRepository::exists_by_external_id(self, external_id).await
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Product>, AppError> {
        ProductRepository::find_by_external_id(self, external_id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        ProductRepository::find_by_id(self, id).await
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, AppError> {
        ProductRepository::find_by_sku(self, sku).await
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<ProductSlice, AppError> {
        ProductRepository::list(self, filter, page).await
    }

    async fn distinct_categories(&self) -> Result<Vec<String>, AppError> {
        ProductRepository::distinct_categories(self).await
    }

    async fn distinct_brands(&self) -> Result<Vec<String>, AppError> {
        ProductRepository::distinct_brands(self).await
    }

    async fn batch_upsert(&self, products: &[Product]) -> Result<u64, AppError> {
        ProductRepository::batch_upsert(self, products).await
    }

    async fn count(&self) -> Result<u64, AppError> {
        ProductRepository::count(self).await
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        ProductRepository::delete_all(self).await
    }

    async fn rebuild_index(&self) -> Result<(), AppError> {
        ProductRepository::rebuild_index(self).await
    }

    async fn is_index_empty(&self) -> Result<bool, AppError> {
        ProductRepository::is_index_empty(self).await
    }
}
