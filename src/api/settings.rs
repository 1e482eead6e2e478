//! Platform settings API endpoints

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{PlatformSettings, SettingsQuery, UpdateSettingsRequest},
    services::{authorization, SettingsService},
    utils::AppError,
    AppState,
};

/// Readable without a token so clients can show the maintenance banner
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/", get(get_settings))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", put(update_settings))
}

/// GET /settings[?key=]
async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Response, AppError> {
    let service = SettingsService::new(state.db.clone());
    match query.key {
        Some(key) => Ok(Json(service.get_key(&key).await?).into_response()),
        None => Ok(Json(service.get().await?).into_response()),
    }
}

/// PUT /settings (Admin)
async fn update_settings(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<PlatformSettings>, AppError> {
    authorization::require_admin(&state.db, &auth_user).await?;
    let settings = SettingsService::new(state.db.clone())
        .update(&payload)
        .await?;

    tracing::info!(
        status = ?settings.status,
        registration = ?settings.registration,
        updated_by = %auth_user.id,
        "Platform settings updated"
    );
    Ok(Json(settings))
}
