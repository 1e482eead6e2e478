//! Join request model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OrganizationSummary, UserSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// A user's request to join an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub org_id: String,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JoinRequest {
    pub fn pending(user_id: &str, org_id: &str) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
            status: RequestStatus::Pending,
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJoinRequest {
    /// Defaults to the caller when omitted
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub org_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveJoinRequest {
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestListQuery {
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestWithUser {
    #[serde(flatten)]
    pub request: JoinRequest,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestWithOrg {
    #[serde(flatten)]
    pub request: JoinRequest,
    pub org: Option<OrganizationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRequestDetail {
    #[serde(flatten)]
    pub request: JoinRequest,
    pub user: Option<UserSummary>,
    pub org: Option<OrganizationSummary>,
}
