use crate::aggregator::{AggregatorSettings, BatchCoordinator};
use crate::errors::AppError;
use crate::gateway::DocumentStore;
use crate::models::{BatchResponse, CustomerRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const SERVICE_NAME: &str = "customer-360-api";

/// Shared application state injected into handlers.
pub struct AppState {
    /// Document store, owned by the caller that built the state.
    pub store: Arc<dyn DocumentStore>,
    /// Aggregation core bound to `store`.
    pub coordinator: BatchCoordinator,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, settings: AggregatorSettings) -> Self {
        Self {
            coordinator: BatchCoordinator::new(store.clone(), settings),
            store,
        }
    }
}

/// Builds the API router.
///
/// Rate limiting and body limits are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/customers", post(get_customer_360))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "time": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /api/v1/stats
///
/// Reports the number of stored customer profiles. The count is omitted
/// when the store cannot answer.
pub async fn stats(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let mut body = json!({
        "service": SERVICE_NAME,
        "time": chrono::Utc::now().to_rfc3339(),
    });

    match state.store.count_profiles().await {
        Ok(total) => body["total_customers"] = json!(total),
        Err(e) => tracing::warn!("Failed to count customer profiles: {}", e),
    }

    (StatusCode::OK, Json(body))
}

/// POST /api/v1/customers
///
/// Assembles the 360-degree view of every requested customer.
/// Customers without a profile are reported under `errors` and never fail
/// the whole request.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - JSON body `{"customer_id": ["C1", ...]}`.
///
/// # Returns
///
/// * `Result<Json<BatchResponse>, AppError>` - The batch response or a 400 for an invalid body.
pub async fn get_customer_360(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CustomerRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!("Rejected customer request body: {}", rejection);
        AppError::InvalidRequest("customer_id array is required".to_string())
    })?;

    if request.customer_ids.is_empty() {
        return Err(AppError::InvalidRequest(
            "at least one customer_id is required".to_string(),
        ));
    }

    tracing::info!(
        "POST /customers - {} customer id(s)",
        request.customer_ids.len()
    );

    let result = state.coordinator.aggregate(&request.customer_ids).await?;

    Ok(Json(BatchResponse::from(result)))
}
