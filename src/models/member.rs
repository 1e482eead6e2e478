//! Organization membership model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Member role that confers organization administration
pub const ADMIN_ROLE: &str = "Admin";
/// Default role for ordinary members
pub const MEMBER_ROLE: &str = "Member";

/// Membership of one user in one organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub role: String,
    pub joined_date: DateTime<Utc>,
    #[serde(default)]
    pub show_in_leaders: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(user_id: &str, org_id: &str, role: &str) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            role: role.to_string(),
            joined_date: Utc::now(),
            show_in_leaders: false,
            quote: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithUser {
    #[serde(flatten)]
    pub member: Member,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    pub role: Option<String>,
    pub show_in_leaders: Option<bool>,
    pub quote: Option<String>,
}
