use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::services::report_service;

/// GET /api/reports/dashboard - Top-line counts and money figures
pub async fn dashboard(State(state): State<AppState>) -> impl IntoResponse {
    match report_service::dashboard(&state.conn).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "summary": summary
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// GET /api/reports/sales - Daily sales over a date range, last 30 days by default
pub async fn sales_report(
    State(state): State<AppState>,
    Query(params): Query<SalesReportQuery>,
) -> impl IntoResponse {
    let today = Utc::now().date_naive();
    let date_to = params
        .date_to
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    let date_from = params
        .date_from
        .unwrap_or_else(|| (today - Duration::days(30)).format("%Y-%m-%d").to_string());

    match report_service::sales_report(&state.conn, &date_from, &date_to).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "report": report
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
