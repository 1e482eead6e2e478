//! Platform settings model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document id of the settings singleton
pub const PLATFORM_SETTINGS_ID: &str = "platform";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformStatus {
    #[default]
    Active,
    Maintenance,
}

impl std::str::FromStr for PlatformStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PlatformStatus::Active),
            "maintenance" => Ok(PlatformStatus::Maintenance),
            _ => Err(format!("Invalid platform status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationMode {
    #[default]
    Open,
    Closed,
}

impl std::str::FromStr for RegistrationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(RegistrationMode::Open),
            "closed" => Ok(RegistrationMode::Closed),
            _ => Err(format!("Invalid registration mode: {}", s)),
        }
    }
}

/// Global platform settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSettings {
    #[serde(default)]
    pub status: PlatformStatus,
    #[serde(default)]
    pub registration: RegistrationMode,
    #[serde(default)]
    pub announcement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlatformSettings {
    pub fn in_maintenance(&self) -> bool {
        self.status == PlatformStatus::Maintenance
    }

    pub fn registration_open(&self) -> bool {
        self.registration == RegistrationMode::Open
    }
}

/// Partial settings update; unknown values are rejected by the handler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub status: Option<String>,
    pub registration: Option<String>,
    pub announcement: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsQuery {
    pub key: Option<String>,
}
