use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::services::order_service::{self, OrderFilter};

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// GET /api/orders - List orders with optional filters and paging
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersQuery>,
) -> impl IntoResponse {
    let filter = OrderFilter {
        status: params.status,
        customer_id: params.customer_id,
        date_from: params.date_from,
        date_to: params.date_to,
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(50),
    };

    match order_service::list_orders(&state.conn, filter).await {
        Ok((orders, total)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "orders": orders,
                "total": total
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/orders/:id - Order detail with line items
pub async fn get_order(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match order_service::get_order(&state.conn, id).await {
        Ok((order, items)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "order": order,
                "items": items
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PUT /api/orders/:id/status - Change an order's status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateStatusRequest>,
) -> impl IntoResponse {
    match order_service::update_status(&state.conn, id, &payload.status).await {
        Ok(order) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "order": order
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
