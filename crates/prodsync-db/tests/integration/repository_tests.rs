//! Integration tests for ProductRepository.
//!
//! These tests verify the repository layer against a real PostgreSQL
//! database. Each test runs in an isolated container.

use prodsync_core::mapper;
use prodsync_core::models::{PageRequest, ProductFilter, RemoteProduct};

use crate::integration::common::{sample_product, sample_remote, setup_test_db};

/// Test 1: A new product is inserted and read back with all nested data.
#[tokio::test]
async fn test_batch_upsert_inserts_new_product() {
    let (repo, _pool, _container) = setup_test_db().await;
    let product = sample_product(1);

    let written = repo
        .batch_upsert(std::slice::from_ref(&product))
        .await
        .expect("upsert should succeed");
    assert_eq!(written, 1);

    let stored = repo
        .find_by_external_id(1)
        .await
        .expect("find should succeed")
        .expect("product should exist");

    assert_eq!(stored.id, product.id);
    assert_eq!(stored.title, "Test Product 1");
    assert_eq!(stored.price, Some(4.99));
    assert_eq!(stored.tags, vec!["fruits", "fresh"]);
    assert_eq!(stored.dimensions, product.dimensions);
    assert_eq!(stored.reviews.len(), 1);
    assert_eq!(stored.reviews[0].reviewer_name.as_deref(), Some("Nolan Gonzalez"));
    assert!(stored.reviews[0].review_date.is_some());
    assert_eq!(
        stored.meta.as_ref().and_then(|m| m.barcode.as_deref()),
        Some("1234567890123")
    );
}

/// Test 2: Upserting an existing external id overwrites it in place.
///
/// The local id and creation time survive; other columns are replaced.
#[tokio::test]
async fn test_batch_upsert_updates_existing_product() {
    let (repo, _pool, _container) = setup_test_db().await;
    repo.batch_upsert(&[sample_product(7)]).await.unwrap();
    let original = repo.find_by_external_id(7).await.unwrap().unwrap();

    let incoming = RemoteProduct {
        title: Some("Renamed Product".to_string()),
        tags: None,
        dimensions: None,
        ..sample_remote(7)
    };
    let merged = mapper::merge_into(original.clone(), &incoming).unwrap();
    repo.batch_upsert(&[merged]).await.unwrap();

    let stored = repo.find_by_external_id(7).await.unwrap().unwrap();
    assert_eq!(stored.id, original.id);
    assert_eq!(stored.created_at, original.created_at);
    assert!(stored.updated_at >= original.updated_at);
    assert_eq!(stored.title, "Renamed Product");
    assert!(stored.tags.is_empty());
    assert!(stored.dimensions.is_none());
    assert_eq!(repo.count().await.unwrap(), 1);
}

/// Test 3: Upserting a fresh entity for a stored external id keeps one row.
#[tokio::test]
async fn test_batch_upsert_keeps_one_row_per_external_id() {
    let (repo, _pool, _container) = setup_test_db().await;
    let first = sample_product(3);
    repo.batch_upsert(std::slice::from_ref(&first)).await.unwrap();

    // A second entity with a different local id for the same external id
    repo.batch_upsert(&[sample_product(3)]).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);
    let stored = repo.find_by_external_id(3).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id, "conflicting insert must not replace the local id");
}

/// Test 4: A failing row rolls back the whole batch.
#[tokio::test]
async fn test_batch_upsert_is_atomic() {
    let (repo, _pool, _container) = setup_test_db().await;
    let first = sample_product(10);
    let mut clash = sample_product(11);
    clash.sku = first.sku.clone();

    let result = repo.batch_upsert(&[first, clash]).await;

    assert!(result.is_err(), "duplicate sku must fail the batch");
    assert_eq!(repo.count().await.unwrap(), 0);
    assert!(!repo.exists_by_external_id(10).await.unwrap());
}

/// Test 5: Existence checks and lookups of unknown ids.
#[tokio::test]
async fn test_exists_and_find_unknown() {
    let (repo, _pool, _container) = setup_test_db().await;
    repo.batch_upsert(&[sample_product(1)]).await.unwrap();

    assert!(repo.exists_by_external_id(1).await.unwrap());
    assert!(!repo.exists_by_external_id(2).await.unwrap());
    assert!(repo.find_by_external_id(2).await.unwrap().is_none());
}

/// Test 6: Count and delete-all report the affected rows.
#[tokio::test]
async fn test_count_and_delete_all() {
    let (repo, _pool, _container) = setup_test_db().await;
    let products: Vec<_> = (1..=4).map(sample_product).collect();
    assert_eq!(repo.batch_upsert(&products).await.unwrap(), 4);
    assert_eq!(repo.count().await.unwrap(), 4);

    let removed = repo.delete_all().await.unwrap();

    assert_eq!(removed, 4);
    assert_eq!(repo.count().await.unwrap(), 0);
}

/// Test 7: Index maintenance on empty and populated tables.
#[tokio::test]
async fn test_rebuild_index_and_emptiness() {
    let (repo, _pool, _container) = setup_test_db().await;

    assert!(repo.is_index_empty().await.unwrap());
    repo.rebuild_index().await.expect("rebuild on empty table");

    repo.batch_upsert(&[sample_product(1)]).await.unwrap();
    assert!(!repo.is_index_empty().await.unwrap());
    repo.rebuild_index().await.expect("rebuild on populated table");
}

/// Test 8: Migrations can be applied repeatedly.
#[tokio::test]
async fn test_migrate_is_idempotent() {
    let (repo, pool, _container) = setup_test_db().await;

    repo.migrate().await.expect("second migration run should succeed");
    repo.health_check().await.expect("database should be reachable");

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'products'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 1);
}

/// Test 9: An empty batch is a no-op.
#[tokio::test]
async fn test_empty_batch_is_noop() {
    let (repo, _pool, _container) = setup_test_db().await;
    assert_eq!(repo.batch_upsert(&[]).await.unwrap(), 0);
}

/// Test 10: Lookups by local id and by SKU.
#[tokio::test]
async fn test_find_by_id_and_sku() {
    let (repo, _pool, _container) = setup_test_db().await;
    let product = sample_product(7);
    repo.batch_upsert(std::slice::from_ref(&product)).await.unwrap();

    let by_id = repo.find_by_id(product.id).await.unwrap().unwrap();
    assert_eq!(by_id.external_id, 7);

    let by_sku = repo.find_by_sku("SKU-00007").await.unwrap().unwrap();
    assert_eq!(by_sku.id, product.id);

    assert!(repo.find_by_id(uuid::Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.find_by_sku("SKU-99999").await.unwrap().is_none());
}

/// Test 11: Listing filters by category and brand, orders by title and pages.
#[tokio::test]
async fn test_list_filters_and_pages() {
    let (repo, _pool, _container) = setup_test_db().await;
    let mut products: Vec<_> = (1..=5).map(sample_product).collect();
    products[3].category = Some("beauty".to_string());
    products[4].category = Some("beauty".to_string());
    products[4].brand = Some("Essence".to_string());
    repo.batch_upsert(&products).await.unwrap();

    let first = repo
        .list(&ProductFilter::default(), PageRequest::new(0, 2))
        .await
        .unwrap();
    assert_eq!(first.total, 5);
    let ids: Vec<i64> = first.products.iter().map(|p| p.external_id).collect();
    assert_eq!(ids, vec![1, 2]);

    let last = repo
        .list(&ProductFilter::default(), PageRequest::new(2, 2))
        .await
        .unwrap();
    let ids: Vec<i64> = last.products.iter().map(|p| p.external_id).collect();
    assert_eq!(ids, vec![5]);

    let groceries = ProductFilter {
        category: Some("groceries".to_string()),
        brand: None,
    };
    let page = repo.list(&groceries, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 3);

    let essence = ProductFilter {
        category: Some("beauty".to_string()),
        brand: Some("Essence".to_string()),
    };
    let page = repo.list(&essence, PageRequest::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.products[0].external_id, 5);

    let beyond = repo
        .list(&ProductFilter::default(), PageRequest::new(10, 20))
        .await
        .unwrap();
    assert_eq!(beyond.total, 5);
    assert!(beyond.products.is_empty());
}

/// Test 12: Distinct categories and brands are sorted and skip NULLs.
#[tokio::test]
async fn test_distinct_categories_and_brands() {
    let (repo, _pool, _container) = setup_test_db().await;
    let mut products: Vec<_> = (1..=3).map(sample_product).collect();
    products[1].category = Some("beauty".to_string());
    products[1].brand = Some("Essence".to_string());
    products[2].category = None;
    products[2].brand = None;
    repo.batch_upsert(&products).await.unwrap();

    assert_eq!(
        repo.distinct_categories().await.unwrap(),
        vec!["beauty", "groceries"]
    );
    assert_eq!(repo.distinct_brands().await.unwrap(), vec!["Essence", "Farm Co"]);
}
