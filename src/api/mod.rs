pub mod health;
pub mod imports;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod reports;
pub mod settings;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::db::AppState;
use crate::domain::{AuthContext, ServiceError};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Shop settings
        .route("/settings", get(settings::get_settings))
        .route("/settings", post(settings::update_settings))
        // Products
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id/image", post(products::upload_image))
        // Bulk import
        .route("/products/import", post(imports::import_products))
        // Orders
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", put(orders::update_status))
        // Invoices
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .route("/invoices/:id/payments", post(invoices::record_payment))
        .route("/invoices/:id/send", post(invoices::send_invoice))
        .route("/invoices/:id/view", post(invoices::mark_viewed))
        .route("/invoices/:id/cancel", post(invoices::cancel_invoice))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Reports
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/sales", get(reports::sales_report))
        .with_state(state)
}

/// Single place where service failures become HTTP responses. Storage
/// details never reach the client; they go to the log instead.
pub(crate) fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(msg) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": msg })),
        )
            .into_response(),
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "Resource not found" })),
        )
            .into_response(),
        ServiceError::Conflict(msg) => (
            StatusCode::CONFLICT,
            Json(json!({ "success": false, "message": msg })),
        )
            .into_response(),
        ServiceError::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(json!({ "success": false, "message": "Admin role required" })),
        )
            .into_response(),
        ServiceError::Storage(msg) => {
            tracing::error!("storage error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Internal server error" })),
            )
                .into_response()
        }
    }
}

// The session layer in front of this service resolves cookies and puts the
// caller's identity into headers. Absent headers just mean an anonymous
// caller; authorization is enforced per-operation.
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        Ok(AuthContext { user_id, role })
    }
}
