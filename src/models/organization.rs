//! Organization (club) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Activity, Budget, FeedbackWithUsers, JoinRequestWithUser, MemberWithUser};

pub const DEFAULT_STUDENT_FEE: u32 = 150;
pub const CBL_FILE_NAME: &str = "constitution_bylaws.pdf";

fn default_student_fee() -> u32 {
    DEFAULT_STUDENT_FEE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_data: Option<CollectionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbl: Option<CblDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Membership fee collection figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionData {
    #[serde(default)]
    pub total_students: u32,
    #[serde(default)]
    pub paid_students: u32,
    #[serde(default = "default_student_fee")]
    pub student_fee: u32,
}

impl CollectionData {
    pub fn collected(&self) -> u64 {
        u64::from(self.paid_students) * u64::from(self.student_fee)
    }
}

/// Uploaded constitution and by-laws
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CblDocument {
    pub data: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    /// Defaults to the caller when omitted
    #[serde(default)]
    pub creator_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub mission: Option<String>,
    pub logo: Option<String>,
    pub cover: Option<String>,
    pub collection_data: Option<CollectionData>,
    /// PDF data URL; an empty string removes the stored document
    pub cbl_data: Option<String>,
}

/// Compact organization reference embedded in other responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl From<&Organization> for OrganizationSummary {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            name: org.name.clone(),
            logo: org.logo.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct OrganizationCounts {
    pub members: usize,
    pub activities: usize,
}

/// Directory listing entry
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationListItem {
    #[serde(flatten)]
    pub organization: Organization,
    #[serde(rename = "_count")]
    pub count: OrganizationCounts,
}

/// Organization a given user belongs to or manages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOrganization {
    #[serde(flatten)]
    pub organization: Organization,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_requests: Option<usize>,
}

/// Organization with everything its dashboard shows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<MemberWithUser>,
    pub activities: Vec<Activity>,
    pub budgets: Vec<Budget>,
    pub feedback: Vec<FeedbackWithUsers>,
    pub requests: Vec<JoinRequestWithUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationListQuery {
    pub user_id: Option<String>,
}
