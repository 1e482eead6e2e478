//! API routes and handlers
//!
//! Every endpoint lives under `/api/v1`.

use axum::{routing::get, Router};

use crate::AppState;

mod activities;
mod auth;
mod budgets;
mod feedback;
mod health;
mod organizations;
mod posts;
mod requests;
mod settings;
mod users;

pub use auth::AuthResponse;
pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth::public_routes())
        .nest("/settings", settings::public_routes())
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::protected_routes())
        .nest("/users", users::routes())
        .nest("/organizations", organizations::routes())
        .nest("/requests", requests::routes())
        .nest("/activities", activities::routes())
        .nest("/budgets", budgets::routes())
        .nest("/feedback", feedback::routes())
        .nest("/posts", posts::routes())
        .nest("/comments", posts::comment_routes())
        .nest("/settings", settings::routes())
}
