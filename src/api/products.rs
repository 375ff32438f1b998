use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::domain::ServiceError;
use crate::services::product_service::{self, ProductFilter, ProductInput};

/// Query parameters for listing products
#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// GET /api/products - List products with optional filters and paging
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListProductsQuery>,
) -> impl IntoResponse {
    let filter = ProductFilter {
        category: params.category,
        featured: params.featured,
        search: params.search,
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(50),
    };

    match product_service::list_products(&state.conn, filter).await {
        Ok((products, total)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "products": products,
                "total": total
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/products/:id - Get one product
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match product_service::get_product(&state.conn, id).await {
        Ok(product) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "product": product
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/products - Create a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductInput>,
) -> impl IntoResponse {
    match product_service::create_product(&state.conn, payload).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "product": product
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/products/:id - Update a product
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ProductInput>,
) -> impl IntoResponse {
    match product_service::update_product(&state.conn, id, payload).await {
        Ok(product) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "product": product
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/products/:id - Delete a product and its image file
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match product_service::delete_product(&state.conn, &state.assets, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Product deleted"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/products/:id/image - Upload a product image (multipart field "image")
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut bytes: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        if name == "image" || name == "file" {
            match field.bytes().await {
                Ok(data) => bytes = Some(data.to_vec()),
                Err(e) => {
                    return error_response(ServiceError::Validation(format!(
                        "could not read upload: {}",
                        e
                    )))
                }
            }
        }
    }

    let Some(bytes) = bytes else {
        return error_response(ServiceError::Validation(
            "multipart field 'image' is required".to_string(),
        ));
    };

    match product_service::set_product_image(&state.conn, &state.assets, id, &bytes).await {
        Ok(product) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "product": product
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
