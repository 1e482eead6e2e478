//! Budget line model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    #[serde(default)]
    pub id: String,
    pub org_id: String,
    pub category: String,
    #[serde(default)]
    pub allocated: f64,
    pub limit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Budget {
    pub fn remaining(&self) -> f64 {
        self.limit - self.allocated
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBudgetRequest {
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub allocated: Option<f64>,
    pub limit: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBudgetRequest {
    pub category: Option<String>,
    pub allocated: Option<f64>,
    pub limit: Option<f64>,
}
