//! Authentication API endpoints
//!
//! Login, registration and the caller's own profile.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use validator::Validate;

use crate::{
    middleware::auth::{create_access_token, AuthUser},
    models::{LoginRequest, RegisterRequest, UpdateProfileRequest, User, UserPublic},
    services::{AuthService, SettingsService},
    utils::AppError,
    AppState,
};

/// Routes reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
}

/// Routes requiring a token
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user).put(update_current_user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires
    pub expires_in: u64,
    pub user: UserPublic,
}

fn issue_token(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let auth = &state.config.auth;
    let access_token = create_access_token(
        &user.id,
        &user.name,
        &user.email,
        user.role,
        &auth.jwt_secret,
        auth.token_expiry_hours,
    )
    .map_err(|e| {
        tracing::error!("Failed to create access token: {}", e);
        AppError::internal("Failed to create access token")
    })?;

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer",
        expires_in: auth.token_expiry_hours * 3600,
        user: user.into(),
    })
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let user = AuthService::new(state.db.clone())
        .authenticate(&payload.email, &payload.password)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_token(&state, user)?))
}

/// POST /api/v1/auth/register
///
/// Creates a Student account and signs it in.
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.validate()?;

    let settings = SettingsService::new(state.db.clone()).get().await?;
    if !settings.registration_open() {
        return Err(AppError::forbidden("Registration is currently closed"));
    }

    let user = AuthService::new(state.db.clone())
        .register(&payload, state.config.auth.password_min_length)
        .await?;

    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserPublic>, AppError> {
    let user = AuthService::new(state.db.clone())
        .get_user(&auth_user.id)
        .await
        .map_err(|_| AppError::Unauthorized("Account no longer exists".to_string()))?;
    Ok(Json(user.into()))
}

/// PUT /api/v1/auth/me
async fn update_current_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserPublic>, AppError> {
    let user = AuthService::new(state.db.clone())
        .update_profile(
            &auth_user.id,
            &payload,
            state.config.auth.password_min_length,
        )
        .await?;
    Ok(Json(user.into()))
}
