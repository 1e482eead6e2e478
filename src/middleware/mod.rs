//! Middleware components
//!
//! - Authentication (JWT bearer tokens)
//! - Maintenance mode gate

pub mod auth;
pub mod maintenance;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use maintenance::maintenance_middleware;
