//! OrgHub Library
//!
//! Core functionality for the OrgHub student organization platform:
//! accounts, organizations, memberships and their content.

pub mod api;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use middleware::{auth_middleware, maintenance_middleware, AuthUser, Claims};
use services::OrgLocks;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Per-organization locks serializing admin assignment
    pub org_locks: OrgLocks,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        Self {
            config,
            db,
            org_locks: OrgLocks::new(),
        }
    }
}
