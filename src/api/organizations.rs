//! Organization API endpoints
//!
//! Directory, profiles and member management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{
        AddMemberRequest, CreateOrganizationRequest, Member, Organization, OrganizationDetail,
        OrganizationListQuery, UpdateMemberRequest, UpdateOrganizationRequest,
    },
    services::{authorization, MembershipService, OrganizationService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route(
            "/{id}",
            get(get_organization)
                .put(update_organization)
                .delete(delete_organization),
        )
        .route("/{id}/members", get(list_members).post(add_member))
        .route(
            "/{id}/members/{user_id}",
            put(update_member).delete(remove_member),
        )
}

fn membership(state: &AppState) -> MembershipService {
    MembershipService::new(state.db.clone(), state.org_locks.clone())
}

/// GET /organizations[?userId=]
///
/// Without `userId`: every organization with counts. With it: the
/// organizations that user belongs to or manages.
async fn list_organizations(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Query(query): Query<OrganizationListQuery>,
) -> Result<Response, AppError> {
    let service = OrganizationService::new(state.db.clone());
    match query.user_id {
        Some(user_id) => Ok(Json(service.list_for_user(&user_id).await?).into_response()),
        None => Ok(Json(service.list_with_counts().await?).into_response()),
    }
}

/// POST /organizations (Admin)
///
/// The creator becomes the first Admin member; it defaults to the caller.
async fn create_organization(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), AppError> {
    authorization::require_admin(&state.db, &auth_user).await?;

    let creator = payload
        .creator_user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or(&auth_user.id);

    let org = membership(&state)
        .create_organization(&payload, Some(creator))
        .await?;
    Ok((StatusCode::CREATED, Json(org)))
}

async fn get_organization(
    State(state): State<AppState>,
    _auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrganizationDetail>, AppError> {
    let detail = OrganizationService::new(state.db.clone()).detail(&id).await?;
    Ok(Json(detail))
}

async fn update_organization(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &id).await?;
    let org = OrganizationService::new(state.db.clone())
        .update(&id, &payload)
        .await?;
    Ok(Json(org))
}

/// DELETE /organizations/{id} (Admin)
async fn delete_organization(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorization::require_admin(&state.db, &auth_user).await?;
    membership(&state).delete_organization(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Member>>, AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &id).await?;
    let service = OrganizationService::new(state.db.clone());
    service.get(&id).await?;
    Ok(Json(authorization::org_members(&state.db, &id).await?))
}

/// POST /organizations/{id}/members
///
/// Adds the user, or overwrites the role of an existing member.
async fn add_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &id).await?;
    let member = membership(&state)
        .add_or_update_member(&id, &payload.user_id, payload.role.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    Json(payload): Json<UpdateMemberRequest>,
) -> Result<Json<Member>, AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &id).await?;
    let member = membership(&state)
        .change_member_role(&id, &user_id, &payload)
        .await?;
    Ok(Json(member))
}

async fn remove_member(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &id).await?;
    membership(&state).remove_member(&id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
