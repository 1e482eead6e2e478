//! Budget API endpoints (organization administrators only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{Budget, CreateBudgetRequest, OrgScopedQuery, UpdateBudgetRequest},
    services::{authorization, ContentService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_budgets).post(create_budget))
        .route(
            "/{id}",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
}

async fn list_budgets(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OrgScopedQuery>,
) -> Result<Json<Vec<Budget>>, AppError> {
    let org_id = query
        .org_id
        .ok_or_else(|| AppError::validation("orgId is required"))?;
    authorization::require_org_admin(&state.db, &auth_user, &org_id).await?;
    let budgets = ContentService::new(state.db.clone())
        .list_budgets(&org_id)
        .await?;
    Ok(Json(budgets))
}

async fn get_budget(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Budget>, AppError> {
    let budget = ContentService::new(state.db.clone()).get_budget(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &budget.org_id).await?;
    Ok(Json(budget))
}

async fn create_budget(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<Budget>), AppError> {
    authorization::require_org_admin(&state.db, &auth_user, &payload.org_id).await?;
    let budget = ContentService::new(state.db.clone())
        .create_budget(&payload)
        .await?;
    Ok((StatusCode::CREATED, Json(budget)))
}

async fn update_budget(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBudgetRequest>,
) -> Result<Json<Budget>, AppError> {
    let service = ContentService::new(state.db.clone());
    let budget = service.get_budget(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &budget.org_id).await?;
    Ok(Json(service.update_budget(&id, &payload).await?))
}

async fn delete_budget(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = ContentService::new(state.db.clone());
    let budget = service.get_budget(&id).await?;
    authorization::require_org_admin(&state.db, &auth_user, &budget.org_id).await?;
    service.delete_budget(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
