//! Maintenance mode gate
//!
//! While the platform status is `maintenance`, every protected route
//! answers 503 unless the caller is a system administrator. Must run after
//! [`auth_middleware`](super::auth_middleware).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::auth::AuthUser;
use crate::db::{Collection, DocumentStore};
use crate::models::User;
use crate::services::SettingsService;
use crate::utils::AppError;
use crate::AppState;

const DEFAULT_MAINTENANCE_MESSAGE: &str =
    "The platform is undergoing maintenance. Please try again later.";

pub async fn maintenance_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let settings = SettingsService::new(state.db.clone()).get().await?;
    if !settings.in_maintenance() {
        return Ok(next.run(request).await);
    }

    let is_admin = match request.extensions().get::<AuthUser>() {
        Some(auth_user) => DocumentStore::new(&state.db)
            .find::<User>(Collection::Users, &auth_user.id)
            .await?
            .is_some_and(|user| user.is_admin()),
        None => false,
    };

    if is_admin {
        return Ok(next.run(request).await);
    }

    debug!(path = %request.uri().path(), "Request rejected during maintenance");
    let message = if settings.announcement.trim().is_empty() {
        DEFAULT_MAINTENANCE_MESSAGE.to_string()
    } else {
        settings.announcement
    };
    Err(AppError::ServiceUnavailable(message))
}
