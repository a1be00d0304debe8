//! Integration tests for IngestionService.
//!
//! These tests verify the orchestration logic using mock implementations.

use std::time::Duration;

use crate::integration::common::{
    MockProductSource, MockProductStore, catalogue, remote, remote_in,
};
use prodsync_core::{IngestConfig, IngestionService, PageRequest, ProductFilter, RunState, mapper};

fn service(
    store: &MockProductStore,
    source: &MockProductSource,
    batch_size: usize,
) -> IngestionService<MockProductStore, MockProductSource> {
    IngestionService::with_config(
        store.clone(),
        source.clone(),
        IngestConfig::default().with_batch_size(batch_size),
    )
}

/// Waits until the spawned run has fetched the catalogue.
async fn wait_for_fetch(source: &MockProductSource) {
    for _ in 0..200 {
        if source.fetch_all_calls() > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run never fetched the catalogue");
}

/// Test 1: A first run creates every product.
#[tokio::test]
async fn test_full_ingestion_creates_all_products() {
    // Arrange
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(3));
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success);
    assert_eq!(result.new_count, 3);
    assert_eq!(result.updated_count, 0);
    assert_eq!(result.total, 3);
    assert_eq!(
        result.message,
        "Successfully processed 3 products (3 new, 0 updated)"
    );
    assert_eq!(store.external_ids(), vec![1, 2, 3]);
    assert_eq!(store.rebuilds(), 1);
}

/// Test 2: Running twice against an unchanged source converges.
///
/// The second run updates every product and leaves the store with the same
/// set of external ids.
#[tokio::test]
async fn test_full_ingestion_is_idempotent() {
    // Arrange
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(4));
    let service = service(&store, &source, 2);

    // Act
    let first = service.start_full_ingestion().await;
    let ids_after_first = store.external_ids();
    let local_id = store.get(2).unwrap().id;
    let second = service.start_full_ingestion().await;

    // Assert
    assert_eq!(first.new_count, 4);
    assert_eq!(second.new_count, 0);
    assert_eq!(second.updated_count, 4);
    assert_eq!(store.external_ids(), ids_after_first);
    assert_eq!(store.get(2).unwrap().id, local_id, "local id must survive updates");
}

/// Test 3: New and updated records are classified against the store.
///
/// Store holds {1, 2, 3}, source returns {2, 3, 4}: one new, two updated,
/// and product 1 is left alone.
#[tokio::test]
async fn test_full_ingestion_classifies_new_and_updated() {
    // Arrange
    let store = MockProductStore::new();
    for id in 1..=3 {
        store.insert(mapper::to_entity(&remote(id, "Old title")).unwrap());
    }
    let source = MockProductSource::new(vec![
        remote(2, "Fresh 2"),
        remote(3, "Fresh 3"),
        remote(4, "Fresh 4"),
    ]);
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert_eq!(result.new_count, 1);
    assert_eq!(result.updated_count, 2);
    assert_eq!(result.total, 3);
    assert_eq!(store.external_ids(), vec![1, 2, 3, 4]);
    assert_eq!(store.get(1).unwrap().title, "Old title");
    assert_eq!(store.get(3).unwrap().title, "Fresh 3");
}

/// Test 4: Records are written in batches of the configured size.
#[tokio::test]
async fn test_full_ingestion_flushes_in_batches() {
    // Arrange
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(7));
    let service = service(&store, &source, 3);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert_eq!(result.total, 7);
    assert_eq!(store.batch_sizes(), vec![3, 3, 1]);
}

/// Test 5: A record that fails mapping is skipped, the rest are stored.
#[tokio::test]
async fn test_invalid_record_is_skipped() {
    // Arrange
    let store = MockProductStore::new();
    let mut products = catalogue(3);
    products[1].title = Some("   ".to_string());
    let source = MockProductSource::new(products);
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success);
    assert_eq!(result.new_count, 2);
    assert_eq!(result.skipped_ids, vec![2]);
    assert_eq!(store.external_ids(), vec![1, 3]);
}

/// Test 6: A store lookup failure skips only that record.
#[tokio::test]
async fn test_lookup_failure_skips_record() {
    // Arrange
    let store = MockProductStore::new();
    store.fail_lookup_for(3);
    let source = MockProductSource::new(catalogue(4));
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success);
    assert_eq!(result.total, 3);
    assert_eq!(result.skipped_ids, vec![3]);
    assert_eq!(store.external_ids(), vec![1, 2, 4]);
}

/// Test 7: A failed batch write only skips the record that breaks it.
#[tokio::test]
async fn test_failed_batch_keeps_its_valid_records() {
    // Arrange
    let store = MockProductStore::new();
    store.fail_batch_containing(5);
    let source = MockProductSource::new(catalogue(6));
    let service = service(&store, &source, 6);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success, "a failed batch must not fail the run");
    assert_eq!(result.new_count, 5);
    assert_eq!(result.total, 5);
    assert_eq!(result.skipped_ids, vec![5]);
    assert_eq!(store.external_ids(), vec![1, 2, 3, 4, 6]);
    // One failed batch, then one write per record
    assert_eq!(store.batch_sizes(), vec![6, 1, 1, 1, 1, 1, 1]);
    assert_eq!(service.status().percent, 100);
}

/// Test 7b: Records of other batches are unaffected by a failed batch.
#[tokio::test]
async fn test_failed_batch_does_not_touch_other_batches() {
    // Arrange
    let store = MockProductStore::new();
    store.fail_batch_containing(5);
    let source = MockProductSource::new(catalogue(6));
    let service = service(&store, &source, 2);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success);
    assert_eq!(result.new_count, 5);
    assert_eq!(result.skipped_ids, vec![5]);
    assert_eq!(store.batch_sizes(), vec![2, 2, 2, 1, 1]);
}

/// Test 8: Duplicate ids in one payload keep the first occurrence.
#[tokio::test]
async fn test_duplicate_external_id_is_skipped() {
    // Arrange
    let store = MockProductStore::new();
    let source = MockProductSource::new(vec![
        remote(1, "First"),
        remote(1, "Second"),
        remote(2, "Other"),
    ]);
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert_eq!(result.new_count, 2);
    assert_eq!(result.skipped_ids, vec![1]);
    assert_eq!(store.get(1).unwrap().title, "First");
}

/// Test 9: A failed index rebuild turns into a warning.
#[tokio::test]
async fn test_index_rebuild_failure_is_a_warning() {
    // Arrange
    let store = MockProductStore::new();
    store.fail_rebuild();
    let source = MockProductSource::new(catalogue(2));
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(result.success);
    assert!(result.index_warning);
    assert_eq!(
        result.message,
        "Successfully processed 2 products (2 new, 0 updated) (Warning: Search index rebuild failed)"
    );
    let status = service.status();
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.phase, "Completed with warnings");
}

/// Test 10: An unavailable source fails the run and releases the guard.
#[tokio::test]
async fn test_fetch_failure_marks_run_failed() {
    // Arrange
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(2));
    source.fail_with_unavailable("circuit open");
    let service = service(&store, &source, 50);

    // Act
    let result = service.start_full_ingestion().await;

    // Assert
    assert!(!result.success);
    assert!(result.message.starts_with("Data loading failed: "));
    assert_eq!(store.len(), 0);
    assert_eq!(store.rebuilds(), 0);
    assert_eq!(service.run_state(), RunState::Failed);
    let status = service.status();
    assert!(!status.running);
    assert!(status.phase.starts_with("Failed: "));

    // A failed run does not block the next one
    source.recover();
    let retry = service.start_full_ingestion().await;
    assert!(retry.success);
    assert_eq!(retry.new_count, 2);
}

/// Test 11: An empty catalogue completes with zero counters.
#[tokio::test]
async fn test_empty_catalogue_completes() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(Vec::new());
    let service = service(&store, &source, 50);

    let result = service.start_full_ingestion().await;

    assert!(result.success);
    assert_eq!(result.total, 0);
    assert!(store.batch_sizes().is_empty());
    assert_eq!(service.status().percent, 100);
}

/// Test 12: A second request during a run is rejected immediately.
///
/// The rejected request must not touch the source and must not alter the
/// status published by the running pipeline.
#[tokio::test]
async fn test_concurrent_full_ingestion_is_rejected() {
    // Arrange
    let store = MockProductStore::new();
    store.hold_writes();
    let source = MockProductSource::new(catalogue(5));
    let service = service(&store, &source, 50);

    // Act
    let running = service.start_full_ingestion();
    wait_for_fetch(&source).await;
    let before = service.status();
    let rejected = service.clone().start_full_ingestion();

    // Assert
    assert!(!running.is_rejected());
    assert!(rejected.is_rejected());
    let rejected = rejected.await;
    assert!(!rejected.success);
    assert_eq!(rejected.message, "Data loading is already in progress");
    assert_eq!(service.status(), before);
    assert_eq!(service.run_state(), RunState::Running);
    assert_eq!(source.fetch_all_calls(), 1);

    store.release_writes();
    let result = running.await;
    assert!(result.success);
    assert_eq!(result.total, 5);
    assert_eq!(service.run_state(), RunState::Completed);
}

/// Test 13: Simultaneous requests start exactly one run.
#[tokio::test]
async fn test_only_one_of_many_requests_runs() {
    let store = MockProductStore::new();
    store.hold_writes();
    let source = MockProductSource::new(catalogue(3));
    let service = service(&store, &source, 50);

    let handles: Vec<_> = (0..8).map(|_| service.start_full_ingestion()).collect();
    let accepted = handles.iter().filter(|h| !h.is_rejected()).count();
    store.release_writes();
    let results = futures::future::join_all(handles).await;

    assert_eq!(accepted, 1);
    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert_eq!(source.fetch_all_calls(), 1);
}

/// Test 14: Status reports the run while it is in flight and after it ends.
#[tokio::test]
async fn test_status_tracks_run_lifecycle() {
    let store = MockProductStore::new();
    store.hold_writes();
    let source = MockProductSource::new(catalogue(4));
    let service = service(&store, &source, 2);

    assert_eq!(service.status().phase, "Ready");

    let handle = service.start_full_ingestion();
    wait_for_fetch(&source).await;
    let during = service.status();
    assert!(during.running);
    assert_eq!(during.state, RunState::Running);
    assert_eq!(during.percent, 0);

    store.release_writes();
    handle.await;

    let after = service.status();
    assert!(!after.running);
    assert_eq!(after.percent, 100);
    assert_eq!(after.phase, "Completed successfully");
}

/// Test 14b: A new run resets the status before its task is scheduled.
#[tokio::test]
async fn test_restart_resets_status_immediately() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(2));
    let service = service(&store, &source, 50);
    service.start_full_ingestion().await;
    assert_eq!(service.status().phase, "Completed successfully");

    let handle = service.start_full_ingestion();
    let status = service.status();

    assert!(!handle.is_rejected());
    assert_eq!(service.run_state(), RunState::Running);
    assert!(status.running);
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.percent, 0);
    assert_eq!(status.phase, "Starting data load...");

    let result = handle.await;
    assert!(result.success);
    assert_eq!(result.updated_count, 2);
}

/// Test 14c: Once the status shows the run finished, a new run is accepted.
#[tokio::test]
async fn test_finished_status_implies_guard_released() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(3));
    let service = service(&store, &source, 1);

    let handle = service.start_full_ingestion();
    while service.status().running {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_ne!(service.run_state(), RunState::Running);
    let again = service.start_full_ingestion();
    assert!(!again.is_rejected());

    assert!(handle.await.success);
    assert!(again.await.success);
}

/// Test 15: Single-product ingestion creates, then updates.
#[tokio::test]
async fn test_ingest_one_creates_then_updates() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(3));
    let service = service(&store, &source, 50);

    let created = service.ingest_one(2).await;
    assert!(created.success);
    assert_eq!(created.message, "Product created successfully");
    assert_eq!((created.total, created.new_count, created.updated_count), (1, 1, 0));

    source.set_products(vec![remote(2, "Renamed")]);
    let updated = service.ingest_one(2).await;
    assert_eq!(updated.message, "Product updated successfully");
    assert_eq!((updated.total, updated.new_count, updated.updated_count), (1, 0, 1));
    assert_eq!(store.get(2).unwrap().title, "Renamed");
    assert_eq!(store.len(), 1);
}

/// Test 16: Single-product ingestion of an unknown id reports a failure.
#[tokio::test]
async fn test_ingest_one_unknown_product() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(1));
    let service = service(&store, &source, 50);

    let result = service.ingest_one(99).await;

    assert!(!result.success);
    assert_eq!(result.message, "Failed to load product: Product not found: 99");
    assert_eq!(result.total, 0);
    assert_eq!(store.len(), 0);
}

/// Test 17: Clearing reports the number of removed products.
#[tokio::test]
async fn test_clear_all_reports_removed_count() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(4));
    let service = service(&store, &source, 50);
    service.start_full_ingestion().await;

    let result = service.clear_all().await;

    assert!(result.success);
    assert_eq!(result.message, "Successfully cleared 4 products");
    assert_eq!(result.total, 4);
    assert_eq!(store.len(), 0);
    assert_eq!(service.status().phase, "Database cleared");
}

/// Test 18: A failed clear leaves the store untouched.
#[tokio::test]
async fn test_clear_all_failure() {
    let store = MockProductStore::new();
    store.insert(mapper::to_entity(&remote(1, "Kept")).unwrap());
    store.fail_delete();
    let source = MockProductSource::new(Vec::new());
    let service = service(&store, &source, 50);

    let result = service.clear_all().await;

    assert!(!result.success);
    assert!(result.message.starts_with("Failed to clear products: "));
    assert_eq!(store.len(), 1);
}

/// Test 19: Clearing during a run is not coordinated with it.
///
/// The clear goes through immediately; batches written afterwards by the
/// running pipeline repopulate the store.
#[tokio::test]
async fn test_clear_during_run_is_not_coordinated() {
    let store = MockProductStore::new();
    store.insert(mapper::to_entity(&remote(100, "Stale")).unwrap());
    store.hold_writes();
    let source = MockProductSource::new(catalogue(3));
    let service = service(&store, &source, 50);

    let handle = service.start_full_ingestion();
    wait_for_fetch(&source).await;
    let cleared = service.clear_all().await;
    store.release_writes();
    let result = handle.await;

    assert!(cleared.success);
    assert_eq!(cleared.total, 1);
    assert!(result.success);
    assert_eq!(store.external_ids(), vec![1, 2, 3]);
}

/// Test 20: Probe, rebuild and lookup delegate to the collaborators.
#[tokio::test]
async fn test_probe_rebuild_and_lookup() {
    let store = MockProductStore::new();
    let source = MockProductSource::new(catalogue(1));
    let service = service(&store, &source, 50);

    assert!(service.probe().await);
    source.set_reachable(false);
    assert!(!service.probe().await);

    assert!(service.is_index_empty().await.unwrap());
    service.ingest_one(1).await;
    assert!(!service.is_index_empty().await.unwrap());

    let found = service.find_product(1).await.unwrap().unwrap();
    assert_eq!(found.external_id, 1);
    assert!(service.find_product(2).await.unwrap().is_none());

    assert!(service.rebuild_index().await);
    store.fail_rebuild();
    assert!(!service.rebuild_index().await);
}

/// Shop with two categories and three brands, loaded through a full run.
async fn stocked_service() -> IngestionService<MockProductStore, MockProductSource> {
    let store = MockProductStore::new();
    let source = MockProductSource::new(vec![
        remote_in(1, "Mascara", "beauty", "Essence"),
        remote_in(2, "Eyeshadow Palette", "beauty", "Glamour Beauty"),
        remote_in(3, "Powder Canister", "beauty", "Velvet Touch"),
        remote_in(4, "Dior J'adore", "fragrances", "Dior"),
        remote_in(5, "Chanel Coco Noir", "fragrances", "Chanel"),
        remote(6, "Unbranded Sponge"),
    ]);
    let service = service(&store, &source, 50);
    assert!(service.start_full_ingestion().await.success);
    service
}

/// Test 21: Lookups by local id and by SKU.
#[tokio::test]
async fn test_find_by_id_and_sku() {
    let service = stocked_service().await;

    let by_sku = service.find_product_by_sku("SKU-0004").await.unwrap().unwrap();
    assert_eq!(by_sku.external_id, 4);

    let by_id = service.find_product_by_id(by_sku.id).await.unwrap().unwrap();
    assert_eq!(by_id, by_sku);

    assert!(service.find_product_by_sku("SKU-9999").await.unwrap().is_none());
    assert!(
        service
            .find_product_by_id(uuid::Uuid::new_v4())
            .await
            .unwrap()
            .is_none()
    );
}

/// Test 22: Listings filter, order by title and page.
#[tokio::test]
async fn test_list_products_filters_and_pages() {
    let service = stocked_service().await;

    let all = service
        .list_products(&ProductFilter::default(), PageRequest::new(0, 4))
        .await
        .unwrap();
    assert_eq!(all.total_elements, 6);
    assert_eq!(all.total_pages, 2);
    assert_eq!(all.content.len(), 4);
    assert_eq!(all.content[0].title, "Chanel Coco Noir");
    assert!(all.is_first() && !all.is_last());

    let second = service
        .list_products(&ProductFilter::default(), PageRequest::new(1, 4))
        .await
        .unwrap();
    let titles: Vec<&str> = second.content.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Powder Canister", "Unbranded Sponge"]);
    assert!(second.is_last());

    let beauty = ProductFilter {
        category: Some("beauty".to_string()),
        brand: None,
    };
    let page = service.list_products(&beauty, PageRequest::default()).await.unwrap();
    assert_eq!(page.total_elements, 3);
    assert!(page.content.iter().all(|p| p.category.as_deref() == Some("beauty")));

    let dior = ProductFilter {
        category: None,
        brand: Some("Dior".to_string()),
    };
    let page = service.list_products(&dior, PageRequest::default()).await.unwrap();
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].external_id, 4);

    let mismatch = ProductFilter {
        category: Some("beauty".to_string()),
        brand: Some("Dior".to_string()),
    };
    let page = service.list_products(&mismatch, PageRequest::default()).await.unwrap();
    assert_eq!(page.total_elements, 0);
    assert!(page.content.is_empty());
}

/// Test 23: Distinct categories and brands skip products without one.
#[tokio::test]
async fn test_distinct_categories_and_brands() {
    let service = stocked_service().await;

    assert_eq!(
        service.categories().await.unwrap(),
        vec!["beauty", "fragrances"]
    );
    assert_eq!(
        service.brands().await.unwrap(),
        vec!["Chanel", "Dior", "Essence", "Glamour Beauty", "Velvet Touch"]
    );
}
