//! Data models

mod activity;
mod budget;
mod feedback;
mod join_request;
mod member;
mod organization;
mod post;
mod settings;
mod user;

pub use activity::*;
pub use budget::*;
pub use feedback::*;
pub use join_request::*;
pub use member::*;
pub use organization::*;
pub use post::*;
pub use settings::*;
pub use user::*;
