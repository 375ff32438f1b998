use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::domain::AuthContext;
use crate::services::user_service::{self, NewUser, UpdateUser};

/// GET /api/users - List users (password hashes never leave the service layer)
pub async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    match user_service::list_users(&state.conn).await {
        Ok(users) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "users": users,
                "count": users.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/users/:id - Get one user
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match user_service::get_user(&state.conn, id).await {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "user": user
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/users - Create a user
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> impl IntoResponse {
    match user_service::create_user(&state.conn, payload).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "user": user
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /api/users/:id - Update email, password or role
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> impl IntoResponse {
    match user_service::update_user(&state.conn, id, payload).await {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "user": user
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /api/users/:id - Delete a user (admin only)
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match user_service::delete_user(&state.conn, &auth, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "User deleted"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
