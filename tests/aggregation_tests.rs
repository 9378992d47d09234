/// Aggregation scenarios against the in-memory document store
/// Covers partial success within a record and within a batch, ordering and idempotence
use std::sync::Arc;
use std::time::{Duration, Instant};

use customer_360_api::aggregator::{AggregatorSettings, BatchCoordinator};
use customer_360_api::errors::AggregationError;
use customer_360_api::gateway::{DocumentKind, ProductCategory};
use customer_360_api::memory_store::{MemoryDocumentStore, SeedFile};
use serde_json::json;

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// Store with one fully populated customer (C3) and a few sparse ones.
fn seeded_store() -> Arc<MemoryDocumentStore> {
    let seed: SeedFile = serde_json::from_value(json!({
        "customers": [
            {
                "customer_id": "C1",
                "profile": {"name": "Hana Putri", "dob": "1990-02-11"},
                "accounts": [
                    {"account_no": "100-1", "balance": 2500},
                    {"account_no": "100-2", "balance": 10}
                ]
            },
            {
                "customer_id": "C3",
                "profile": {"name": "Irfan Hakim"},
                "address": {"city": "Yogyakarta", "type": "residential"},
                "contact": {"email": "irfan@example.com"},
                "segment": {"tier": "priority"},
                "behavior": {"logins_30d": 14},
                "preference": {"channel": "email"},
                "accounts": [{"account_no": "300-1"}],
                "deposits": [{"deposit_id": "D-1", "amount": 5000}],
                "loans": [{"loan_id": "L-1"}],
                "cards": [{"card_no": "5500"}],
                "investments": [{"fund": "MM-01"}, {"fund": "EQ-02"}]
            },
            {"customer_id": "C4", "profile": {"name": "Joko"}}
        ]
    }))
    .unwrap();

    Arc::new(MemoryDocumentStore::from_seed(seed))
}

fn coordinator(store: Arc<MemoryDocumentStore>) -> BatchCoordinator {
    BatchCoordinator::new(store, AggregatorSettings::default())
}

#[tokio::test]
async fn test_profile_with_accounts_and_missing_customer() {
    let result = coordinator(seeded_store())
        .aggregate(&ids(&["C1", "C2"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert!(!result.all_succeeded);

    let c1 = &result.records[0];
    assert_eq!(c1.id, "C1");
    assert_eq!(c1.accounts.len(), 2);
    assert_eq!(c1.accounts[0]["account_no"], json!("100-1"));
    assert!(c1.address.is_none());

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].customer_id, "C2");
    assert_eq!(
        result.failures[0].error,
        "customer not found: document customer::C2 does not exist"
    );
}

#[tokio::test]
async fn test_fully_populated_customer() {
    let result = coordinator(seeded_store())
        .aggregate(&ids(&["C3"]))
        .await
        .unwrap();

    assert!(result.all_succeeded);
    let c3 = &result.records[0];
    assert_eq!(c3.profile["name"], json!("Irfan Hakim"));
    assert_eq!(c3.address.as_ref().unwrap()["city"], json!("Yogyakarta"));
    assert_eq!(c3.contact.as_ref().unwrap()["email"], json!("irfan@example.com"));
    assert_eq!(c3.segment.as_ref().unwrap()["tier"], json!("priority"));
    assert_eq!(c3.behavior.as_ref().unwrap()["logins_30d"], json!(14));
    assert_eq!(c3.preference.as_ref().unwrap()["channel"], json!("email"));
    assert_eq!(c3.accounts.len(), 1);
    assert_eq!(c3.deposits.len(), 1);
    assert_eq!(c3.loans.len(), 1);
    assert_eq!(c3.cards.len(), 1);
    assert_eq!(c3.investments.len(), 2);
    assert_eq!(c3.investments[1]["fund"], json!("EQ-02"));
    // Product documents carry their owner
    assert_eq!(c3.deposits[0]["customer_id"], json!("C3"));
}

#[tokio::test]
async fn test_profile_only_customer_succeeds() {
    let result = coordinator(seeded_store())
        .aggregate(&ids(&["C4"]))
        .await
        .unwrap();

    assert!(result.all_succeeded);
    let c4 = &result.records[0];
    assert!(c4.address.is_none() && c4.contact.is_none());
    assert!(c4.segment.is_none() && c4.behavior.is_none() && c4.preference.is_none());
    assert!(c4.accounts.is_empty() && c4.deposits.is_empty() && c4.loans.is_empty());
    assert!(c4.cards.is_empty() && c4.investments.is_empty());
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let store = seeded_store();
    let err = coordinator(store.clone()).aggregate(&[]).await.unwrap_err();

    assert_eq!(err, AggregationError::EmptyBatch);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_store_outages_only_fail_profile_lookups() {
    let store = seeded_store();
    for kind in [
        DocumentKind::Address,
        DocumentKind::Contact,
        DocumentKind::Segment,
        DocumentKind::Behavior,
        DocumentKind::Preference,
    ] {
        store.fail_kind(kind, "partition offline");
    }
    for category in ProductCategory::ALL {
        store.fail_category(category, "query service offline");
    }

    let result = coordinator(store.clone())
        .aggregate(&ids(&["C3"]))
        .await
        .unwrap();
    assert!(result.all_succeeded);
    assert!(result.records[0].address.is_none());
    assert!(result.records[0].investments.is_empty());

    store.fail_kind(DocumentKind::Profile, "partition offline");
    let result = coordinator(store)
        .aggregate(&ids(&["C3"]))
        .await
        .unwrap();
    assert_eq!(result.success_count, 0);
    assert_eq!(
        result.failures[0].error,
        "customer not found: query failed: partition offline"
    );
}

#[tokio::test]
async fn test_rows_missing_category_object_are_skipped() {
    let store = seeded_store();
    store.insert_raw_row(ProductCategory::Loans, "C4", json!({"mortgages": {"id": 1}}));
    store.insert_raw_row(ProductCategory::Loans, "C4", json!({"loans": {"loan_id": "L-9"}}));

    let result = coordinator(store)
        .aggregate(&ids(&["C4"]))
        .await
        .unwrap();

    let loans = &result.records[0].loans;
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0]["loan_id"], json!("L-9"));
}

#[tokio::test]
async fn test_output_keeps_input_order_when_fetches_finish_out_of_order() {
    let store = seeded_store();
    // The first customers are the slowest ones
    store.delay_customer("C1", Duration::from_millis(120));
    store.delay_customer("C2", Duration::from_millis(80));
    store.delay_customer("C3", Duration::from_millis(40));

    let settings = AggregatorSettings {
        max_concurrent_customers: 4,
        ..AggregatorSettings::default()
    };
    let result = BatchCoordinator::new(store, settings)
        .aggregate(&ids(&["C1", "C2", "C3", "C5", "C4"]))
        .await
        .unwrap();

    let succeeded: Vec<_> = result.records.iter().map(|r| r.id.as_str()).collect();
    let failed: Vec<_> = result
        .failures
        .iter()
        .map(|f| f.customer_id.as_str())
        .collect();
    assert_eq!(succeeded, vec!["C1", "C3", "C4"]);
    assert_eq!(failed, vec!["C2", "C5"]);
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let coordinator = coordinator(seeded_store());
    let batch = ids(&["C3", "C2", "C1", "C3"]);

    let first = coordinator.aggregate(&batch).await.unwrap();
    let second = coordinator.aggregate(&batch).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.success_count, 3);
}

#[tokio::test]
async fn test_tight_fetch_limit_still_completes() {
    let settings = AggregatorSettings {
        max_concurrent_customers: 3,
        max_concurrent_fetches: 1,
        ..AggregatorSettings::default()
    };
    let result = BatchCoordinator::new(seeded_store(), settings)
        .aggregate(&ids(&["C1", "C3", "C4"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 3);
}

#[tokio::test]
async fn test_sub_fetches_of_one_customer_run_concurrently() {
    let store = seeded_store();
    store.delay_customer("C1", Duration::from_millis(100));

    let started = Instant::now();
    let result = coordinator(store).aggregate(&ids(&["C1"])).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.records[0].accounts.len(), 2);
    // Profile lookup, then one wave of ten concurrent sub-fetches.
    assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(500), "elapsed {:?}", elapsed);
}
