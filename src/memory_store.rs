//! In-memory document store.
//!
//! Backs the `memory` store backend and the test suites. Besides plain
//! storage it can inject failures and latency per partition, which is how
//! the best-effort and ordering guarantees of the aggregator get exercised.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{StoreError, StoreResult};
use crate::gateway::{DocumentKind, DocumentStore, ProductCategory};

/// Seed file layout: one entry per customer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub customers: Vec<SeedCustomer>,
}

/// All partitions of one seeded customer. Missing entries stay absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedCustomer {
    pub customer_id: String,
    pub profile: Option<Value>,
    pub address: Option<Value>,
    pub contact: Option<Value>,
    pub segment: Option<Value>,
    pub behavior: Option<Value>,
    pub preference: Option<Value>,
    #[serde(default)]
    pub accounts: Vec<Value>,
    #[serde(default)]
    pub deposits: Vec<Value>,
    #[serde(default)]
    pub loans: Vec<Value>,
    #[serde(default)]
    pub cards: Vec<Value>,
    #[serde(default)]
    pub investments: Vec<Value>,
}

/// Stored product row together with its owning customer.
#[derive(Debug, Clone)]
struct ProductRow {
    customer_id: String,
    row: Value,
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<(DocumentKind, String), Value>,
    products: DashMap<ProductCategory, Vec<ProductRow>>,
    failing_kinds: DashMap<DocumentKind, String>,
    failing_categories: DashMap<ProductCategory, String>,
    /// Keyed by document key for lookups and by customer id for filter queries.
    lookup_latency: DashMap<String, Duration>,
    query_latency: DashMap<String, Duration>,
    calls: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_seed(seed: SeedFile) -> Self {
        let store = Self::new();
        for customer in seed.customers {
            store.seed_customer(customer);
        }
        store
    }

    /// Loads a JSON seed file from disk.
    pub async fn load_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read seed file {}: {}", path.display(), e))?;
        let seed: SeedFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid seed file {}: {}", path.display(), e))?;

        tracing::info!(
            "Loaded {} customer(s) from seed file {}",
            seed.customers.len(),
            path.display()
        );
        Ok(Self::from_seed(seed))
    }

    pub fn seed_customer(&self, customer: SeedCustomer) {
        let id = customer.customer_id;
        let singles = [
            (DocumentKind::Profile, customer.profile),
            (DocumentKind::Address, customer.address),
            (DocumentKind::Contact, customer.contact),
            (DocumentKind::Segment, customer.segment),
            (DocumentKind::Behavior, customer.behavior),
            (DocumentKind::Preference, customer.preference),
        ];
        for (kind, doc) in singles {
            if let Some(doc) = doc {
                self.insert_document(kind, &id, doc);
            }
        }

        let products = [
            (ProductCategory::Accounts, customer.accounts),
            (ProductCategory::Deposits, customer.deposits),
            (ProductCategory::Loans, customer.loans),
            (ProductCategory::Cards, customer.cards),
            (ProductCategory::Investments, customer.investments),
        ];
        for (category, docs) in products {
            for doc in docs {
                self.insert_product(category, &id, doc);
            }
        }
    }

    /// Stores `doc` under the key template of `kind` for `customer_id`.
    pub fn insert_document(&self, kind: DocumentKind, customer_id: &str, doc: Value) {
        self.documents.insert((kind, kind.key_for(customer_id)), doc);
    }

    /// Appends a product document owned by `customer_id`.
    pub fn insert_product(&self, category: ProductCategory, customer_id: &str, mut doc: Value) {
        if let Value::Object(ref mut map) = doc {
            map.entry("customer_id")
                .or_insert_with(|| Value::String(customer_id.to_string()));
        }
        let row = json!({ category.as_str(): doc });
        self.insert_raw_row(category, customer_id, row);
    }

    /// Appends a row exactly as given, without wrapping it under the category name.
    pub fn insert_raw_row(&self, category: ProductCategory, customer_id: &str, row: Value) {
        self.products.entry(category).or_default().push(ProductRow {
            customer_id: customer_id.to_string(),
            row,
        });
    }

    /// Makes every lookup in `kind` fail with a query error.
    pub fn fail_kind(&self, kind: DocumentKind, message: impl Into<String>) {
        self.failing_kinds.insert(kind, message.into());
    }

    /// Makes every filter query on `category` fail with a query error.
    pub fn fail_category(&self, category: ProductCategory, message: impl Into<String>) {
        self.failing_categories.insert(category, message.into());
    }

    /// Delays every lookup and query for `customer_id`.
    pub fn delay_customer(&self, customer_id: &str, delay: Duration) {
        for kind in DocumentKind::ALL {
            self.delay_lookup(kind, customer_id, delay);
        }
        self.query_latency.insert(customer_id.to_string(), delay);
    }

    /// Delays lookups of one partition for `customer_id`.
    pub fn delay_lookup(&self, kind: DocumentKind, customer_id: &str, delay: Duration) {
        self.lookup_latency.insert(kind.key_for(customer_id), delay);
    }

    /// Total number of point lookups and filter queries served.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn point_lookup(&self, kind: DocumentKind, key: &str) -> StoreResult<Option<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.lookup_latency.get(key).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failing_kinds.get(&kind) {
            return Err(StoreError::Query(message.value().clone()));
        }

        Ok(self
            .documents
            .get(&(kind, key.to_string()))
            .map(|doc| doc.value().clone()))
    }

    async fn filter_query(
        &self,
        category: ProductCategory,
        customer_id: &str,
    ) -> StoreResult<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.query_latency.get(customer_id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failing_categories.get(&category) {
            return Err(StoreError::Query(message.value().clone()));
        }

        let rows: Vec<Value> = self
            .products
            .get(&category)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.customer_id == customer_id)
                    .map(|r| r.row.clone())
                    .collect()
            })
            .unwrap_or_default();

        Ok(rows)
    }

    async fn count_profiles(&self) -> StoreResult<i64> {
        let total = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == DocumentKind::Profile)
            .count();
        Ok(total as i64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
