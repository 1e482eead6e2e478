//! Business logic services

pub mod auth;
pub mod authorization;
pub mod content;
pub mod feed;
pub mod membership;
pub mod org_locks;
pub mod organizations;
pub mod settings;

pub use auth::AuthService;
pub use content::ContentService;
pub use feed::FeedService;
pub use membership::MembershipService;
pub use org_locks::OrgLocks;
pub use organizations::OrganizationService;
pub use settings::SettingsService;
