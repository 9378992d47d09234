use crate::errors::{AggregationError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded sub-document: an arbitrary JSON object.
pub type Document = Map<String, Value>;

// ============ Aggregation Models ============

/// The merged, multi-source view of one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeCustomerRecord {
    /// The requested identifier, echoed back.
    #[serde(rename = "customer_id")]
    pub id: String,
    /// Customer profile. Always present on a successfully assembled record.
    #[serde(rename = "customer")]
    pub profile: Document,
    /// Residential address.
    pub address: Option<Document>,
    /// Contact details.
    pub contact: Option<Document>,
    pub accounts: Vec<Document>,
    pub deposits: Vec<Document>,
    pub loans: Vec<Document>,
    pub cards: Vec<Document>,
    pub investments: Vec<Document>,
    /// Analytics segment.
    pub segment: Option<Document>,
    /// Behavioral analytics.
    pub behavior: Option<Document>,
    /// Channel and product preferences.
    pub preference: Option<Document>,
}

impl CompositeCustomerRecord {
    /// Creates a record holding only the mandatory profile.
    pub fn with_profile(id: impl Into<String>, profile: Document) -> Self {
        Self {
            id: id.into(),
            profile,
            address: None,
            contact: None,
            accounts: Vec::new(),
            deposits: Vec::new(),
            loans: Vec::new(),
            cards: Vec::new(),
            investments: Vec::new(),
            segment: None,
            behavior: None,
            preference: None,
        }
    }
}

/// Outcome of a single sub-fetch.
///
/// Optional fields collapse every non-`Present` arm to absent through
/// [`FetchOutcome::into_optional`]; the profile goes through
/// [`FetchOutcome::into_required`] instead.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Present(T),
    Absent,
    Error(StoreError),
}

impl FetchOutcome<Document> {
    /// Classifies the raw result of a point lookup.
    ///
    /// A document that is not a JSON object is treated as undecodable.
    pub fn from_lookup(result: Result<Option<Value>, StoreError>) -> Self {
        match result {
            Ok(Some(Value::Object(doc))) => FetchOutcome::Present(doc),
            Ok(Some(other)) => FetchOutcome::Error(StoreError::Decode(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Ok(None) => FetchOutcome::Absent,
            Err(e) => FetchOutcome::Error(e),
        }
    }
}

impl<T> FetchOutcome<T> {
    /// Best-effort collapse: `Absent` and `Error` both become `None`.
    ///
    /// Errors are logged at warn, plain misses at debug.
    pub fn into_optional(self, customer_id: &str, field: &str) -> Option<T> {
        match self {
            FetchOutcome::Present(value) => Some(value),
            FetchOutcome::Absent => {
                tracing::debug!(customer_id, field, "sub-document not found");
                None
            }
            FetchOutcome::Error(e) => {
                tracing::warn!(customer_id, field, error = %e, "sub-fetch failed, leaving field absent");
                None
            }
        }
    }

    /// Strict collapse used for the mandatory profile.
    pub fn into_required(self, customer_id: &str, key: &str) -> Result<T, AggregationError> {
        match self {
            FetchOutcome::Present(value) => Ok(value),
            FetchOutcome::Absent => Err(AggregationError::ProfileNotFound {
                customer_id: customer_id.to_string(),
                reason: format!("document {} does not exist", key),
            }),
            FetchOutcome::Error(e) => Err(AggregationError::ProfileNotFound {
                customer_id: customer_id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One identifier that could not be assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerFailure {
    pub customer_id: String,
    pub error: String,
}

/// Combined outcome of a batch aggregation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    pub success_count: usize,
    /// Successfully assembled records, in input order.
    pub records: Vec<CompositeCustomerRecord>,
    /// Identifiers whose assembly failed, in input order.
    pub failures: Vec<CustomerFailure>,
    pub all_succeeded: bool,
}

impl BatchResult {
    /// Partitions ordered per-identifier outcomes into successes and failures.
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = (String, Result<CompositeCustomerRecord, AggregationError>)>,
    {
        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (customer_id, outcome) in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(e) => failures.push(CustomerFailure {
                    customer_id,
                    error: e.to_string(),
                }),
            }
        }

        Self {
            success_count: records.len(),
            all_succeeded: failures.is_empty(),
            records,
            failures,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

// ============ HTTP Models ============

/// Body of `POST /api/v1/customers`.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRequest {
    #[serde(rename = "customer_id")]
    pub customer_ids: Vec<String>,
}

/// Wire shape of a batch aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<CompositeCustomerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<CustomerFailure>>,
}

impl From<BatchResult> for BatchResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            success: result.all_succeeded,
            count: result.success_count,
            data: result.records,
            errors: (!result.failures.is_empty()).then_some(result.failures),
        }
    }
}
