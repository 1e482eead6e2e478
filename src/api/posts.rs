//! Organization feed API endpoints
//!
//! Posts, likes and comments are visible to members of the organization.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::{
    middleware::AuthUser,
    models::{
        CommentWithAuthor, CreateCommentRequest, CreatePostRequest, PageQuery, Paginated, Post,
        PostWithDetails, Reaction, UpdatePostRequest,
    },
    services::{authorization, FeedService},
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
        .route("/{id}/like", post(like_post).delete(unlike_post))
        .route("/{id}/comments", get(list_comments).post(add_comment))
}

pub fn comment_routes() -> Router<AppState> {
    Router::new().route("/{id}", delete(delete_comment))
}

/// GET /posts?orgId=&page=&limit=
async fn list_posts(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<PostWithDetails>>, AppError> {
    let org_id = query
        .org_id
        .as_deref()
        .ok_or_else(|| AppError::validation("orgId is required"))?;
    authorization::require_member(&state.db, &auth_user, org_id).await?;

    let (page, limit) = query.resolve();
    let posts = FeedService::new(state.db.clone())
        .list_posts(org_id, &auth_user.id, page, limit)
        .await?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PostWithDetails>, AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_member(&state.db, &auth_user, &post.org_id).await?;
    Ok(Json(service.post_detail(&id, &auth_user.id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    authorization::require_member(&state.db, &auth_user, &payload.org_id).await?;
    let post = FeedService::new(state.db.clone())
        .create_post(&auth_user.id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_moderator(&state.db, &auth_user, &post.author_id, &post.org_id)
        .await?;
    Ok(Json(service.update_post(&id, &payload).await?))
}

/// DELETE /posts/{id}, together with its comments and likes
async fn delete_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_moderator(&state.db, &auth_user, &post.author_id, &post.org_id)
        .await?;
    service.delete_post(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Reaction>), AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_member(&state.db, &auth_user, &post.org_id).await?;
    let reaction = service.like(&id, &auth_user.id).await?;
    Ok((StatusCode::CREATED, Json(reaction)))
}

async fn unlike_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    FeedService::new(state.db.clone())
        .unlike(&id, &auth_user.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /posts/{id}/comments?page=&limit=
async fn list_comments(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<CommentWithAuthor>>, AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_member(&state.db, &auth_user, &post.org_id).await?;

    let (page, limit) = query.resolve();
    Ok(Json(service.list_comments(&id, page, limit).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentWithAuthor>), AppError> {
    let service = FeedService::new(state.db.clone());
    let post = service.get_post(&id).await?;
    authorization::require_member(&state.db, &auth_user, &post.org_id).await?;

    let comment = service
        .add_comment(&id, &auth_user.id, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /comments/{id}: the author or an administrator of the post's org
async fn delete_comment(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let service = FeedService::new(state.db.clone());
    let comment = service.get_comment(&id).await?;
    if comment.author_id != auth_user.id {
        let post = service.get_post(&comment.post_id).await?;
        authorization::require_org_admin(&state.db, &auth_user, &post.org_id).await?;
    }
    service.delete_comment(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
