//! Organization administration rights
//!
//! [`can_administer`] is the single rule deciding whether a user may manage
//! an organization. The async helpers load the caller's current user
//! document (never the role baked into the token) before applying it.

use crate::db::{Collection, DbPool, DocumentStore, Query};
use crate::middleware::AuthUser;
use crate::models::{Member, Role, User};
use crate::utils::{AppError, AppResult};

/// Whether `user` may administer `org_id`, given the org's member list.
pub fn can_administer(user: &User, org_id: &str, members: &[Member]) -> bool {
    match user.role {
        Role::Admin => true,
        Role::OrgAdmin => {
            user.managed_orgs.contains(org_id)
                || members
                    .iter()
                    .any(|m| m.user_id == user.id && m.org_id == org_id && m.is_admin())
        }
        Role::Student => false,
    }
}

/// Whether `user` may edit or delete content authored by `author_id` in
/// `org_id`: its author, an Admin member of the org, or a system Admin.
pub fn can_moderate(user: &User, author_id: &str, org_id: &str, members: &[Member]) -> bool {
    user.id == author_id
        || user.is_admin()
        || members
            .iter()
            .any(|m| m.user_id == user.id && m.org_id == org_id && m.is_admin())
}

/// Load the caller's user document; a deleted account is unauthorized.
pub async fn current_user(pool: &DbPool, auth_user: &AuthUser) -> AppResult<User> {
    DocumentStore::new(pool)
        .find::<User>(Collection::Users, &auth_user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
}

/// Members of an organization
pub async fn org_members(pool: &DbPool, org_id: &str) -> AppResult<Vec<Member>> {
    Ok(DocumentStore::new(pool)
        .query_as::<Member>(Collection::Members, &Query::new().eq("orgId", org_id))
        .await?)
}

/// Require a system administrator
pub async fn require_admin(pool: &DbPool, auth_user: &AuthUser) -> AppResult<User> {
    let user = current_user(pool, auth_user).await?;
    if !user.is_admin() {
        return Err(AppError::forbidden("Administrator role required"));
    }
    Ok(user)
}

/// Require administration rights over `org_id`
pub async fn require_org_admin(
    pool: &DbPool,
    auth_user: &AuthUser,
    org_id: &str,
) -> AppResult<User> {
    let user = current_user(pool, auth_user).await?;
    if user.is_admin() {
        return Ok(user);
    }
    let members = org_members(pool, org_id).await?;
    if !can_administer(&user, org_id, &members) {
        return Err(AppError::forbidden(
            "You do not have permission to manage this organization",
        ));
    }
    Ok(user)
}

/// Require a membership record in `org_id`, or administration rights over it
pub async fn require_member(
    pool: &DbPool,
    auth_user: &AuthUser,
    org_id: &str,
) -> AppResult<User> {
    let user = current_user(pool, auth_user).await?;
    let members = org_members(pool, org_id).await?;
    let is_member = members.iter().any(|m| m.user_id == user.id);
    if !is_member && !can_administer(&user, org_id, &members) {
        return Err(AppError::forbidden("You are not a member of this organization"));
    }
    Ok(user)
}

/// Require authorship of the content or moderation rights in `org_id`
pub async fn require_moderator(
    pool: &DbPool,
    auth_user: &AuthUser,
    author_id: &str,
    org_id: &str,
) -> AppResult<User> {
    let user = current_user(pool, auth_user).await?;
    if user.id == author_id || user.is_admin() {
        return Ok(user);
    }
    let members = org_members(pool, org_id).await?;
    if !can_moderate(&user, author_id, org_id, &members) {
        return Err(AppError::forbidden("You can only modify your own content"));
    }
    Ok(user)
}

/// Require that the caller is `user_id` or a system administrator
pub async fn require_self_or_admin(
    pool: &DbPool,
    auth_user: &AuthUser,
    user_id: &str,
) -> AppResult<User> {
    let user = current_user(pool, auth_user).await?;
    if user.id != user_id && !user.is_admin() {
        return Err(AppError::forbidden("You can only act on your own account"));
    }
    Ok(user)
}
