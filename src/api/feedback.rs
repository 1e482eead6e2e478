//! Member feedback API endpoints
//!
//! Any signed-in user may submit feedback; reading and triage belong to
//! the organization's administrators.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{
        CreateFeedbackRequest, Feedback, FeedbackWithUsers, OrgScopedQuery, ReplyFeedbackRequest,
        UpdateFeedbackRequest,
    },
    services::{authorization, ContentService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedback).post(create_feedback))
        .route(
            "/{id}",
            get(get_feedback)
                .put(update_feedback)
                .delete(delete_feedback),
        )
        .route("/{id}/replies", post(reply_to_feedback))
}

async fn list_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OrgScopedQuery>,
) -> Result<Json<Vec<FeedbackWithUsers>>, AppError> {
    let org_id = query
        .org_id
        .ok_or_else(|| AppError::validation("orgId is required"))?;
    authorization::require_org_admin(&state.db, &auth_user, &org_id).await?;
    let feedback = ContentService::new(state.db.clone())
        .list_feedback(&org_id)
        .await?;
    Ok(Json(feedback))
}

/// Visible to its author and the organization's administrators
async fn get_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FeedbackWithUsers>, AppError> {
    let service = ContentService::new(state.db.clone());
    let feedback = service.get_feedback(&id).await?;
    if feedback.user_id != auth_user.id {
        authorization::require_org_admin(&state.db, &auth_user, &feedback.org_id).await?;
    }
    Ok(Json(service.feedback_detail(&id).await?))
}

async fn create_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let feedback = ContentService::new(state.db.clone())
        .create_feedback(&auth_user.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

/// PUT /feedback/{id} with `{"status": "pending" | "reviewed" | "resolved"}`
async fn update_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateFeedbackRequest>,
) -> Result<Json<Feedback>, AppError> {
    let service = ContentService::new(state.db.clone());
    let feedback = service.get_feedback(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &feedback.org_id).await?;
    Ok(Json(service.set_feedback_status(&id, &payload.status).await?))
}

async fn reply_to_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ReplyFeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let service = ContentService::new(state.db.clone());
    let feedback = service.get_feedback(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &feedback.org_id).await?;

    let feedback = service
        .reply_to_feedback(&id, &auth_user.id, &payload.message)
        .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn delete_feedback(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = ContentService::new(state.db.clone());
    let feedback = service.get_feedback(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &feedback.org_id).await?;
    service.delete_feedback(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
