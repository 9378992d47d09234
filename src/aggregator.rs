//! Batch coordination across many customer identifiers.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::assembler::RecordAssembler;
use crate::errors::AggregationError;
use crate::gateway::DocumentStore;
use crate::models::BatchResult;

/// Tuning knobs for the aggregation core.
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Budget for a single point lookup or filter query.
    pub fetch_timeout: Duration,
    /// Customers assembled at once within a batch.
    pub max_concurrent_customers: usize,
    /// Store calls in flight at once, across all assemblies.
    pub max_concurrent_fetches: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            max_concurrent_customers: 8,
            max_concurrent_fetches: 32,
        }
    }
}

/// Applies the [`RecordAssembler`] to a list of identifiers, isolating
/// per-customer failures.
pub struct BatchCoordinator {
    assembler: RecordAssembler,
    max_concurrent_customers: usize,
}

impl BatchCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, settings: AggregatorSettings) -> Self {
        Self {
            assembler: RecordAssembler::new(store, &settings),
            max_concurrent_customers: settings.max_concurrent_customers.max(1),
        }
    }

    /// Assembles every identifier and partitions the outcomes.
    ///
    /// Records and failures keep the relative order of `customer_ids`,
    /// whatever order the assemblies finish in. Duplicates are assembled
    /// independently.
    pub async fn aggregate(&self, customer_ids: &[String]) -> Result<BatchResult, AggregationError> {
        if customer_ids.is_empty() {
            return Err(AggregationError::EmptyBatch);
        }

        tracing::info!("Aggregating {} customer(s)", customer_ids.len());

        // `buffered` yields in submission order
        let outcomes: Vec<_> = stream::iter(customer_ids.iter().cloned())
            .map(|customer_id: String| async move {
                let outcome = self.assembler.assemble(&customer_id).await;
                if let Err(ref e) = outcome {
                    tracing::warn!(customer_id = %customer_id, error = %e, "Customer assembly failed");
                }
                (customer_id, outcome)
            })
            .buffered(self.max_concurrent_customers)
            .collect()
            .await;

        let result = BatchResult::from_outcomes(outcomes);

        tracing::info!(
            "Aggregation complete: {} requested, {} assembled, {} failed",
            customer_ids.len(),
            result.success_count,
            result.failure_count()
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{DocumentKind, ProductCategory};
    use crate::memory_store::MemoryDocumentStore;
    use serde_json::json;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_before_any_fetch() {
        let store = MemoryDocumentStore::new_shared();
        let coordinator = BatchCoordinator::new(store.clone(), AggregatorSettings::default());

        let err = coordinator.aggregate(&[]).await.unwrap_err();

        assert_eq!(err, AggregationError::EmptyBatch);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_profile_does_not_block_other_customers() {
        let store = MemoryDocumentStore::new_shared();
        store.insert_document(DocumentKind::Profile, "C1", json!({"name": "Fajar"}));
        store.insert_product(ProductCategory::Accounts, "C1", json!({"account_no": "001"}));
        store.insert_product(ProductCategory::Accounts, "C1", json!({"account_no": "002"}));

        let coordinator = BatchCoordinator::new(store, AggregatorSettings::default());
        let result = coordinator.aggregate(&ids(&["C1", "C2"])).await.unwrap();

        assert_eq!(result.success_count, 1);
        assert!(!result.all_succeeded);
        assert_eq!(result.records[0].id, "C1");
        assert_eq!(result.records[0].accounts.len(), 2);
        assert!(result.records[0].address.is_none());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].customer_id, "C2");
        assert!(result.failures[0].error.starts_with("customer not found"));
    }

    #[tokio::test]
    async fn duplicates_are_assembled_independently() {
        let store = MemoryDocumentStore::new_shared();
        store.insert_document(DocumentKind::Profile, "C1", json!({"name": "Gita"}));

        let coordinator = BatchCoordinator::new(store, AggregatorSettings::default());
        let result = coordinator
            .aggregate(&ids(&["C1", "C1"]))
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert!(result.all_succeeded);
        assert_eq!(result.records[0], result.records[1]);
    }

    #[tokio::test]
    async fn aggregation_runs_on_a_spawned_task() {
        let store = MemoryDocumentStore::new_shared();
        store.insert_document(DocumentKind::Profile, "C1", json!({"name": "Hadi"}));

        let coordinator = Arc::new(BatchCoordinator::new(store, AggregatorSettings::default()));
        let batch = ids(&["C1", "C2"]);

        let result = tokio::spawn(async move { coordinator.aggregate(&batch).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.records[0].id, "C1");
        assert_eq!(result.failures[0].customer_id, "C2");
    }
}
