//! Activity API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{Activity, ActivityWithOrg, CreateActivityRequest, OrgScopedQuery, UpdateActivityRequest},
    services::{authorization, ContentService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route(
            "/{id}",
            get(get_activity)
                .put(update_activity)
                .delete(delete_activity),
        )
}

/// GET /activities?orgId=
async fn list_activities(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<OrgScopedQuery>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let org_id = query
        .org_id
        .ok_or_else(|| AppError::validation("orgId is required"))?;
    let activities = ContentService::new(state.db.clone())
        .list_activities(&org_id)
        .await?;
    Ok(Json(activities))
}

async fn get_activity(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ActivityWithOrg>, AppError> {
    let activity = ContentService::new(state.db.clone())
        .activity_with_org(&id)
        .await?;
    Ok(Json(activity))
}

async fn create_activity(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &payload.org_id).await?;
    let activity = ContentService::new(state.db.clone())
        .create_activity(&payload)
        .await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn update_activity(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateActivityRequest>,
) -> Result<Json<Activity>, AppError> {
    let service = ContentService::new(state.db.clone());
    let activity = service.get_activity(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &activity.org_id).await?;
    Ok(Json(service.update_activity(&id, &payload).await?))
}

async fn delete_activity(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = ContentService::new(state.db.clone());
    let activity = service.get_activity(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &activity.org_id).await?;
    service.delete_activity(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
