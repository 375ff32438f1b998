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
use crate::domain::AuthContext;
use crate::services::invoice_service::{
    self, InvoiceFilter, NewInvoice, NewPayment, UpdateInvoice,
};

/// Query parameters for listing invoices
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub customer_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// GET /api/invoices - List invoices with optional filters
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<ListInvoicesQuery>,
) -> impl IntoResponse {
    let filter = InvoiceFilter {
        status: params.status,
        payment_status: params.payment_status,
        customer_id: params.customer_id,
        date_from: params.date_from,
        date_to: params.date_to,
    };

    match invoice_service::list_invoices(&state.conn, filter).await {
        Ok(invoices) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "invoices": invoices,
                "count": invoices.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/invoices/:id - Full invoice view with items, payments and shop details
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match invoice_service::get_invoice_view(&state.conn, id).await {
        Ok(view) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "invoice": view.invoice,
                "items": view.items,
                "payments": view.payments,
                "settings": view.settings
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/invoices - Create an invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<NewInvoice>,
) -> impl IntoResponse {
    match invoice_service::create_invoice(&state.conn, payload).await {
        Ok(invoice) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Invoice created",
                "invoice": invoice
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/invoices/:id - Replace line items and header fields
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateInvoice>,
) -> impl IntoResponse {
    match invoice_service::update_invoice(&state.conn, id, payload).await {
        Ok(invoice) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Invoice updated",
                "invoice": invoice
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/invoices/:id - Hard delete (admin only)
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match invoice_service::delete_invoice(&state.conn, &auth, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Invoice deleted"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/invoices/:id/payments - Record a payment
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<NewPayment>,
) -> impl IntoResponse {
    match invoice_service::apply_payment(&state.conn, id, payload).await {
        Ok((invoice, payment)) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Payment recorded",
                "invoice": invoice,
                "payment": payment
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/invoices/:id/send - Mark the invoice sent
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match invoice_service::send_invoice(&state.conn, id).await {
        Ok(invoice) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "invoice": invoice
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/invoices/:id/view - Customer opened the invoice
pub async fn mark_viewed(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match invoice_service::mark_viewed(&state.conn, id).await {
        Ok(invoice) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "invoice": invoice
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/invoices/:id/cancel - Cancel the invoice
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match invoice_service::cancel_invoice(&state.conn, id).await {
        Ok(invoice) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "invoice": invoice
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
