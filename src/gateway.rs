//! Document store gateway.
//!
//! The aggregation core only ever talks to a [`DocumentStore`]: a point
//! lookup by key and a filter query by product category. Connection
//! lifecycle, pooling and readiness belong to the implementation and to
//! whoever constructs it.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::errors::StoreResult;

/// Single-document partitions, each addressed by a deterministic key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Profile,
    Address,
    Contact,
    Segment,
    Behavior,
    Preference,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Profile,
        DocumentKind::Address,
        DocumentKind::Contact,
        DocumentKind::Segment,
        DocumentKind::Behavior,
        DocumentKind::Preference,
    ];

    /// Scope (namespace) holding the partition.
    pub fn scope(self) -> &'static str {
        match self {
            DocumentKind::Profile | DocumentKind::Address | DocumentKind::Contact => {
                "demographics"
            }
            DocumentKind::Segment | DocumentKind::Behavior | DocumentKind::Preference => {
                "analytics"
            }
        }
    }

    /// Collection name inside the scope.
    pub fn collection(self) -> &'static str {
        match self {
            DocumentKind::Profile => "customers",
            DocumentKind::Address => "addresses",
            DocumentKind::Contact => "contacts",
            DocumentKind::Segment => "segments",
            DocumentKind::Behavior => "behaviors",
            DocumentKind::Preference => "preferences",
        }
    }

    /// Document key for a customer, e.g. `customer::C1` or `address::C1::residential`.
    pub fn key_for(self, customer_id: &str) -> String {
        match self {
            DocumentKind::Profile => format!("customer::{}", customer_id),
            DocumentKind::Address => format!("address::{}::residential", customer_id),
            DocumentKind::Contact => format!("contact::{}", customer_id),
            DocumentKind::Segment => format!("segment::{}", customer_id),
            DocumentKind::Behavior => format!("behavior::{}", customer_id),
            DocumentKind::Preference => format!("preference::{}", customer_id),
        }
    }

    /// Field name on the composite record.
    pub fn field(self) -> &'static str {
        match self {
            DocumentKind::Profile => "profile",
            DocumentKind::Address => "address",
            DocumentKind::Contact => "contact",
            DocumentKind::Segment => "segment",
            DocumentKind::Behavior => "behavior",
            DocumentKind::Preference => "preference",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.scope(), self.collection())
    }
}

/// Financial product categories, each retrieved with a filter query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductCategory {
    Accounts,
    Deposits,
    Loans,
    Cards,
    Investments,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 5] = [
        ProductCategory::Accounts,
        ProductCategory::Deposits,
        ProductCategory::Loans,
        ProductCategory::Cards,
        ProductCategory::Investments,
    ];

    /// Category name; also the name of the sub-object carried by each row.
    pub fn as_str(self) -> &'static str {
        match self {
            ProductCategory::Accounts => "accounts",
            ProductCategory::Deposits => "deposits",
            ProductCategory::Loans => "loans",
            ProductCategory::Cards => "cards",
            ProductCategory::Investments => "investments",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "products.{}", self.as_str())
    }
}

/// Abstract read interface over the customer data partitions.
///
/// Implementations must be thread-safe (Send + Sync); the aggregator holds
/// one behind an `Arc` and calls it from many tasks at once.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches exactly one document by key. `Ok(None)` means not found.
    async fn point_lookup(&self, kind: DocumentKind, key: &str) -> StoreResult<Option<Value>>;

    /// Fetches every row of `category` owned by `customer_id`.
    ///
    /// Each row is shaped `{ "<category>": { ...document... } }`.
    async fn filter_query(
        &self,
        category: ProductCategory,
        customer_id: &str,
    ) -> StoreResult<Vec<Value>>;

    /// Number of stored customer profiles.
    async fn count_profiles(&self) -> StoreResult<i64>;

    /// Readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}
