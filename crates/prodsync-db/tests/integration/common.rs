//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers
//! with the products schema for each test.

use prodsync_core::mapper;
use prodsync_core::models::{Dimensions, Product, RemoteMeta, RemoteProduct, RemoteReview};
use prodsync_db::ProductRepository;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Sets up a PostgreSQL container, applies the schema and returns a repository.
///
/// Each call creates a fresh, isolated database container. The container is
/// automatically cleaned up when the returned `ContainerAsync` is dropped.
///
/// # Returns
///
/// A tuple of (ProductRepository, PgPool, ContainerAsync) - keep the container
/// alive for the test duration.
pub async fn setup_test_db() -> (ProductRepository, PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once after initdb, so the first connects may fail
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    let repo = ProductRepository::new(pool.clone());
    repo.migrate().await.expect("Failed to run migrations");

    (repo, pool, container)
}

/// Builds a fully populated remote product.
pub fn sample_remote(external_id: i64) -> RemoteProduct {
    RemoteProduct {
        id: external_id,
        title: Some(format!("Test Product {}", external_id)),
        description: Some(format!("Description for product {}", external_id)),
        category: Some("groceries".to_string()),
        price: Some(4.99),
        discount_percentage: Some(12.5),
        rating: Some(4.2),
        stock: Some(30),
        tags: Some(vec!["fruits".to_string(), "fresh".to_string()]),
        brand: Some("Farm Co".to_string()),
        sku: Some(format!("SKU-{:05}", external_id)),
        weight: Some(2),
        dimensions: Some(Dimensions {
            width: Some(10.0),
            height: Some(5.5),
            depth: Some(3.25),
        }),
        warranty_information: Some("No warranty".to_string()),
        shipping_information: Some("Ships in 1 week".to_string()),
        availability_status: Some("In Stock".to_string()),
        reviews: Some(vec![RemoteReview {
            rating: Some(5),
            comment: Some("Great value!".to_string()),
            date: Some("2024-05-23T08:56:21.620Z".to_string()),
            reviewer_name: Some("Nolan Gonzalez".to_string()),
            reviewer_email: Some("nolan.gonzalez@x.dummyjson.com".to_string()),
        }]),
        return_policy: Some("30 days return policy".to_string()),
        minimum_order_quantity: Some(1),
        meta: Some(RemoteMeta {
            created_at: Some("2024-05-23T08:56:21.620Z".to_string()),
            updated_at: Some("2024-05-23T08:56:21.620Z".to_string()),
            barcode: Some("1234567890123".to_string()),
            qr_code: Some("https://cdn.dummyjson.com/qr.png".to_string()),
        }),
        images: Some(vec!["https://cdn.dummyjson.com/1.png".to_string()]),
        thumbnail: Some("https://cdn.dummyjson.com/thumb.png".to_string()),
    }
}

/// Builds a new entity from [`sample_remote`].
pub fn sample_product(external_id: i64) -> Product {
    mapper::to_entity(&sample_remote(external_id)).expect("sample product must be valid")
}
