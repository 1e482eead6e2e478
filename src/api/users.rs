//! User management API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{SetUserRoleRequest, UserPublic, UserWithMemberships},
    services::{authorization, AuthService, MembershipService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).delete(delete_user))
        .route("/{id}/role", put(set_user_role))
}

/// List every user with their memberships (Admin)
async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Vec<UserWithMemberships>>, AppError> {
    authorization::require_admin(&state.db, &auth_user).await?;
    let users = AuthService::new(state.db.clone()).list_users().await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserPublic>, AppError> {
    let user = AuthService::new(state.db.clone()).get_user(&id).await?;
    Ok(Json(user.into()))
}

/// Delete an account with its memberships and requests (Admin)
async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let admin = authorization::require_admin(&state.db, &auth_user).await?;
    if admin.id == id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    MembershipService::new(state.db.clone(), state.org_locks.clone())
        .delete_user(&id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a user's global role (Admin)
async fn set_user_role(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<SetUserRoleRequest>,
) -> Result<Json<UserPublic>, AppError> {
    authorization::require_admin(&state.db, &auth_user).await?;

    let user = MembershipService::new(state.db.clone(), state.org_locks.clone())
        .set_user_role(&id, &payload.role, payload.org_id.as_deref())
        .await?;

    tracing::info!(
        user_id = %id,
        role = %user.role,
        changed_by = %auth_user.id,
        "User role changed"
    );
    Ok(Json(user.into()))
}
