//! Platform settings singleton

use serde_json::Value;

use crate::db::{to_fields, Collection, DbPool, DocumentStore};
use crate::models::{
    PlatformSettings, PlatformStatus, RegistrationMode, UpdateSettingsRequest,
    PLATFORM_SETTINGS_ID,
};
use crate::utils::{AppError, AppResult};

pub struct SettingsService {
    pool: DbPool,
}

impl SettingsService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Current settings, or the defaults when none were ever saved
    pub async fn get(&self) -> AppResult<PlatformSettings> {
        let settings = DocumentStore::new(&self.pool)
            .find::<PlatformSettings>(Collection::Settings, PLATFORM_SETTINGS_ID)
            .await?;
        Ok(settings.unwrap_or_default())
    }

    /// A single setting by key
    pub async fn get_key(&self, key: &str) -> AppResult<Value> {
        let settings = serde_json::to_value(self.get().await?)
            .map_err(|e| AppError::internal(e.to_string()))?;
        settings
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Unknown setting: {}", key)))
    }

    /// Apply a partial update, creating the document with defaults if needed
    pub async fn update(&self, req: &UpdateSettingsRequest) -> AppResult<PlatformSettings> {
        let mut settings = self.get().await?;

        if let Some(ref status) = req.status {
            settings.status = status.parse::<PlatformStatus>().map_err(AppError::Validation)?;
        }
        if let Some(ref registration) = req.registration {
            settings.registration = registration
                .parse::<RegistrationMode>()
                .map_err(AppError::Validation)?;
        }
        if let Some(ref announcement) = req.announcement {
            settings.announcement = announcement.clone();
        }

        let store = DocumentStore::new(&self.pool);
        let fields = to_fields(&settings)?;
        let doc = match store
            .update(Collection::Settings, PLATFORM_SETTINGS_ID, fields.clone())
            .await?
        {
            Some(doc) => doc,
            None => {
                store
                    .create(Collection::Settings, fields, Some(PLATFORM_SETTINGS_ID))
                    .await?
            }
        };

        Ok(doc.decode()?)
    }
}
