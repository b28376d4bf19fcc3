use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;

use careplan_core::OrderFilter;
use careplan_export::{export_filename, render, CarePlanDump, ExportParams, ExportStats};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders/export", get(export_orders))
        .route("/api/orders/export/stats", get(export_stats))
        .route("/api/orders/export/all", get(export_all_care_plans))
}

/// GET /api/orders/export
/// Download filtered orders as CSV or XLSX.
pub async fn export_orders(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let format = params.format().map_err(AppError::export)?;
    let range = params.date_range().map_err(AppError::export)?;
    let filter = params.filter().map_err(AppError::export)?;

    let orders = state.store.query_orders(&filter).await?;
    tracing::info!(
        orders = orders.len(),
        %format,
        start = ?range.start,
        end = ?range.end,
        provider_npi = ?filter.provider_npi,
        diagnosis = ?filter.diagnosis,
        "Export requested"
    );

    let bytes = tokio::task::spawn_blocking(move || render(&orders, format))
        .await?
        .map_err(AppError::export)?;

    let filename = export_filename(format, range.start, range.end, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/orders/export/stats
pub async fn export_stats(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Json<ExportStats>, AppError> {
    let filter = params.filter().map_err(AppError::export)?;
    let orders = state.store.query_orders(&filter).await?;
    Ok(Json(ExportStats::from_orders(&orders)))
}

/// GET /api/orders/export/all
/// Every order that has a care plan, as JSON.
pub async fn export_all_care_plans(
    State(state): State<AppState>,
) -> Result<Json<CarePlanDump>, AppError> {
    let filter = OrderFilter {
        care_plan_only: true,
        ..Default::default()
    };
    let orders = state.store.query_orders(&filter).await?;
    Ok(Json(CarePlanDump::from_orders(&orders)))
}
