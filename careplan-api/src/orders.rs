use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use careplan_order::{CarePlanResult, OrderSubmission, ValidationReport};
use careplan_shared::OrderDetails;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub patient_mrn: String,
    pub provider_npi: String,
    pub primary_diagnosis: String,
    pub medication_name: String,
    pub care_plan: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        Self {
            id: details.order.id,
            patient_mrn: details.patient.mrn,
            provider_npi: details.provider.npi,
            primary_diagnosis: details.order.primary_diagnosis,
            medication_name: details.order.medication_name,
            care_plan: details.order.care_plan,
            created_at: details.order.created_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list_orders))
        .route("/api/orders/validate", post(validate_order))
        .route("/api/orders/generate", post(generate_order))
        .route("/api/orders/{id}", get(get_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// Field-level type problems come back as 400 like any other shape error.
fn parse_submission(body: Value) -> Result<OrderSubmission, AppError> {
    OrderSubmission::from_json(body).map_err(AppError::Validation)
}

/// POST /api/orders/validate
/// Shape validation plus duplicate checks; nothing is written.
pub async fn validate_order(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ValidationReport>), AppError> {
    let submission = parse_submission(body)?;
    tracing::info!(
        mrn = %submission.patient_mrn,
        npi = %submission.provider_npi,
        "Validation request received"
    );

    let report = state
        .orchestrator
        .validate(submission)
        .await
        .map_err(AppError::submission)?;

    let status = if report.valid {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(report)))
}

/// POST /api/orders/generate
/// Records the order and drafts its care plan.
pub async fn generate_order(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<CarePlanResult>), AppError> {
    let submission = parse_submission(body)?;
    tracing::info!(
        mrn = %submission.patient_mrn,
        medication = %submission.medication_name,
        "Generate order request received"
    );

    let result = state
        .orchestrator
        .submit(submission)
        .await
        .map_err(AppError::submission)?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let skip = page.skip.unwrap_or(0).max(0);
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).max(0);

    let orders = state.store.list_orders(skip, limit).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let not_found = || AppError::NotFound("Order not found".to_string());
    let order_id = Uuid::parse_str(&order_id).map_err(|_| not_found())?;

    let details = state.store.get_order(order_id).await?.ok_or_else(not_found)?;
    Ok(Json(details.into()))
}
