//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{AppError, AppResult};

/// Base64 data URL (`data:<mime>;base64,<payload>`)
static DATA_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:[a-zA-Z0-9.+-]+/[a-zA-Z0-9.+-]+(;[a-zA-Z0-9=.+-]+)*,").unwrap()
});

/// Prefix every constitution/by-laws upload must carry
pub const PDF_DATA_URL_PREFIX: &str = "data:application/pdf";

/// Check that a required text field is present and not blank
pub fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Check several required fields at once, reporting all missing names
pub fn require_all(fields: &[(&str, &str)]) -> AppResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Whether the value is an inline data URL
pub fn is_data_url(value: &str) -> bool {
    DATA_URL_REGEX.is_match(value)
}

/// Whether the value is an inline PDF data URL
pub fn is_pdf_data_url(value: &str) -> bool {
    value.starts_with(PDF_DATA_URL_PREFIX) && is_data_url(value)
}

/// Keep an image only when it is an inline data URL or an http(s) URL
pub fn accept_image(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if is_data_url(value) || value.starts_with("https://") || value.starts_with("http://") {
        Some(value.to_string())
    } else {
        None
    }
}
