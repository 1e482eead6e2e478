//! Join request API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{
        CreateJoinRequest, JoinRequest, JoinRequestDetail, JoinRequestListQuery,
        ResolveJoinRequest,
    },
    services::{authorization, MembershipService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route(
            "/{id}",
            get(get_request).put(resolve_request).delete(delete_request),
        )
}

fn membership(state: &AppState) -> MembershipService {
    MembershipService::new(state.db.clone(), state.org_locks.clone())
}

/// POST /requests
///
/// Ask to join an organization. `userId` defaults to the caller; only an
/// Admin may file a request for someone else.
async fn create_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateJoinRequest>,
) -> Result<(StatusCode, Json<JoinRequest>), AppError> {
    let user_id = payload.user_id.unwrap_or_else(|| auth_user.id.clone());
    authorization::require_self_or_admin(&state.db, &auth_user, &user_id).await?;

    let request = membership(&state)
        .request_join(&user_id, &payload.org_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /requests?orgId= | ?userId=
///
/// By organization (org administrators, optional `status` filter) or by
/// user (that user or an Admin; defaults to the caller).
async fn list_requests(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<JoinRequestListQuery>,
) -> Result<Response, AppError> {
    let service = membership(&state);

    if let Some(org_id) = query.org_id {
        authorization::require_org_admin(&state.db, &auth_user, &org_id).await?;
        let requests = service
            .list_org_requests(&org_id, query.status.as_deref())
            .await?;
        return Ok(Json(requests).into_response());
    }

    let user_id = query.user_id.unwrap_or_else(|| auth_user.id.clone());
    authorization::require_self_or_admin(&state.db, &auth_user, &user_id).await?;
    let requests = service.list_user_requests(&user_id).await?;
    Ok(Json(requests).into_response())
}

async fn get_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<JoinRequestDetail>, AppError> {
    let detail = membership(&state).request_detail(&id).await?;
    if detail.request.user_id != auth_user.id {
        authorization::require_org_admin(&state.db, &auth_user, &detail.request.org_id).await?;
    }
    Ok(Json(detail))
}

/// PUT /requests/{id} with `{"status": "approved" | "rejected"}`
async fn resolve_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<ResolveJoinRequest>,
) -> Result<Json<JoinRequest>, AppError> {
    let service = membership(&state);
    let request = service.get_request(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &request.org_id).await?;

    let resolved = service.resolve_join_request(&id, &payload.status).await?;
    tracing::info!(
        request_id = %id,
        status = %resolved.status.as_str(),
        resolved_by = %auth_user.id,
        "Join request resolved"
    );
    Ok(Json(resolved))
}

/// DELETE /requests/{id}
///
/// The requester may withdraw their own request.
async fn delete_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = membership(&state);
    let request = service.get_request(&id).await?;
    if request.user_id != auth_user.id {
        authorization::require_org_admin(&state.db, &auth_user, &request.org_id).await?;
    }

    service.delete_request(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
