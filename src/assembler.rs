//! Record assembly: fan out to every partition of one customer and merge the
//! results into a [`CompositeCustomerRecord`].
//!
//! The profile is the only mandatory document. Every other sub-fetch is
//! best-effort: a miss, a decode failure, a transport error or a timeout
//! leaves that field absent (or empty for product lists).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::aggregator::AggregatorSettings;
use crate::errors::{AggregationError, StoreError, StoreResult};
use crate::gateway::{DocumentKind, DocumentStore, ProductCategory};
use crate::models::{CompositeCustomerRecord, Document, FetchOutcome};

pub struct RecordAssembler {
    store: Arc<dyn DocumentStore>,
    fetch_timeout: Duration,
    /// Caps in-flight store calls across every assembly sharing this assembler.
    fetch_permits: Arc<Semaphore>,
}

impl RecordAssembler {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &AggregatorSettings) -> Self {
        Self {
            store,
            fetch_timeout: settings.fetch_timeout,
            fetch_permits: Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1))),
        }
    }

    /// Assembles the composite record for one customer.
    ///
    /// Fails with `ProfileNotFound` when the profile document is missing,
    /// undecodable, unreachable or times out. Nothing else is fetched in
    /// that case.
    #[instrument(skip(self))]
    pub async fn assemble(
        &self,
        customer_id: &str,
    ) -> Result<CompositeCustomerRecord, AggregationError> {
        let profile_key = DocumentKind::Profile.key_for(customer_id);
        let profile = self
            .lookup(DocumentKind::Profile, &profile_key)
            .await
            .into_required(customer_id, &profile_key)?;

        let (
            address,
            contact,
            accounts,
            deposits,
            loans,
            cards,
            investments,
            segment,
            behavior,
            preference,
        ) = tokio::join!(
            self.optional_document(DocumentKind::Address, customer_id),
            self.optional_document(DocumentKind::Contact, customer_id),
            self.product_documents(ProductCategory::Accounts, customer_id),
            self.product_documents(ProductCategory::Deposits, customer_id),
            self.product_documents(ProductCategory::Loans, customer_id),
            self.product_documents(ProductCategory::Cards, customer_id),
            self.product_documents(ProductCategory::Investments, customer_id),
            self.optional_document(DocumentKind::Segment, customer_id),
            self.optional_document(DocumentKind::Behavior, customer_id),
            self.optional_document(DocumentKind::Preference, customer_id),
        );

        tracing::debug!(
            accounts = accounts.len(),
            deposits = deposits.len(),
            loans = loans.len(),
            cards = cards.len(),
            investments = investments.len(),
            "Assembled customer record"
        );

        Ok(CompositeCustomerRecord {
            id: customer_id.to_string(),
            profile,
            address,
            contact,
            accounts,
            deposits,
            loans,
            cards,
            investments,
            segment,
            behavior,
            preference,
        })
    }

    async fn lookup(&self, kind: DocumentKind, key: &str) -> FetchOutcome<Document> {
        let result = self.guarded(self.store.point_lookup(kind, key)).await;
        FetchOutcome::from_lookup(result)
    }

    async fn optional_document(&self, kind: DocumentKind, customer_id: &str) -> Option<Document> {
        let key = kind.key_for(customer_id);
        self.lookup(kind, &key)
            .await
            .into_optional(customer_id, kind.field())
    }

    async fn product_documents(
        &self,
        category: ProductCategory,
        customer_id: &str,
    ) -> Vec<Document> {
        let outcome = match self
            .guarded(self.store.filter_query(category, customer_id))
            .await
        {
            Ok(rows) => FetchOutcome::Present(extract_category_documents(category, rows)),
            Err(e) => FetchOutcome::Error(e),
        };

        outcome
            .into_optional(customer_id, category.as_str())
            .unwrap_or_default()
    }

    /// Runs one store call under a fetch permit and the per-fetch timeout.
    ///
    /// The budget covers the wait for a permit as well as the call itself.
    async fn guarded<T, F>(&self, fetch: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let permitted = async {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|_| StoreError::Unavailable("fetch limiter closed".to_string()))?;
            fetch.await
        };

        match tokio::time::timeout(self.fetch_timeout, permitted).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.fetch_timeout)),
        }
    }
}

/// Pulls the sub-object named after `category` out of each row.
///
/// Rows without it, or where it is not a JSON object, are skipped.
pub fn extract_category_documents(category: ProductCategory, rows: Vec<Value>) -> Vec<Document> {
    rows.into_iter()
        .filter_map(|row| match row {
            Value::Object(mut map) => match map.remove(category.as_str()) {
                Some(Value::Object(doc)) => Some(doc),
                _ => None,
            },
            _ => None,
        })
        .collect()
}
