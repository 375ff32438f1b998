use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::db::AppState;
use crate::domain::ServiceError;
use crate::models::shop_settings::{self, Entity as ShopSettings, ShopSettingsDto};

/// GET /api/settings - The single shop settings row (seeded at startup)
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    let settings = match ShopSettings::find().one(&state.conn).await {
        Ok(Some(s)) => s,
        Ok(None) => return error_response(ServiceError::NotFound),
        Err(e) => return error_response(e.into()),
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "settings": ShopSettingsDto::from(settings)
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub shop_name: String,
    pub address: Option<String>,
    pub default_tax_rate_percent: Decimal,
    pub currency_symbol: String,
}

/// POST /api/settings - Replace the shop settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> impl IntoResponse {
    if payload.shop_name.trim().is_empty() {
        return error_response(ServiceError::Validation(
            "shop name is required".to_string(),
        ));
    }
    if payload.default_tax_rate_percent < Decimal::ZERO {
        return error_response(ServiceError::Validation(
            "tax rate must not be negative".to_string(),
        ));
    }

    let existing = match ShopSettings::find().one(&state.conn).await {
        Ok(Some(s)) => s,
        Ok(None) => return error_response(ServiceError::NotFound),
        Err(e) => return error_response(e.into()),
    };

    let mut active: shop_settings::ActiveModel = existing.into();
    active.shop_name = Set(payload.shop_name);
    active.address = Set(payload.address);
    active.default_tax_rate_percent = Set(payload.default_tax_rate_percent.to_string());
    active.currency_symbol = Set(payload.currency_symbol);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    match active.update(&state.conn).await {
        Ok(saved) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "settings": ShopSettingsDto::from(saved)
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}
