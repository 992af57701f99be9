//! Settings service
//!
//! Persists user preferences in `settings.json` next to the database.

use crate::config::{
    ALLOWED_PAGE_SIZES, BASE_CURRENCY, DEFAULT_NOTIFICATION_CAP, DEFAULT_PAGE_SIZE,
    DEFAULT_RATE_ENDPOINT, DEFAULT_RATE_REFRESH_SCHEDULE, DEFAULT_RATE_TTL_MINUTES,
    DEFAULT_SCAN_SCHEDULE, MAX_RATE_TTL_MINUTES, MIN_RATE_TTL_MINUTES,
};
use crate::error::{AppError, Result};
use crate::services::currency::is_supported_currency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Notification scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Run the background scan at all
    #[serde(default = "default_true")]
    pub scan_enabled: bool,
    /// Six-field cron expression (seconds first)
    #[serde(default = "default_scan_schedule")]
    pub scan_schedule: String,
    /// Maximum notifications created per scan
    #[serde(default = "default_notification_cap")]
    pub cap: usize,
}

fn default_true() -> bool {
    true
}

fn default_scan_schedule() -> String {
    DEFAULT_SCAN_SCHEDULE.to_string()
}

fn default_notification_cap() -> usize {
    DEFAULT_NOTIFICATION_CAP
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            scan_enabled: true,
            scan_schedule: default_scan_schedule(),
            cap: default_notification_cap(),
        }
    }
}

/// Exchange rate source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSettings {
    #[serde(default = "default_rate_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_rate_ttl")]
    pub ttl_minutes: u32,
    #[serde(default = "default_refresh_schedule")]
    pub refresh_schedule: String,
}

fn default_rate_endpoint() -> String {
    DEFAULT_RATE_ENDPOINT.to_string()
}

fn default_rate_ttl() -> u32 {
    DEFAULT_RATE_TTL_MINUTES
}

fn default_refresh_schedule() -> String {
    DEFAULT_RATE_REFRESH_SCHEDULE.to_string()
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            endpoint: default_rate_endpoint(),
            ttl_minutes: default_rate_ttl(),
            refresh_schedule: default_refresh_schedule(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_display_currency")]
    pub display_currency: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub rates: RateSettings,
}

fn default_display_currency() -> String {
    BASE_CURRENCY.to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            display_currency: default_display_currency(),
            default_page_size: default_page_size(),
            notifications: NotificationSettings::default(),
            rates: RateSettings::default(),
        }
    }
}

fn validate_cron(expr: &str) -> Result<()> {
    let fields = expr.split_whitespace().count();
    if fields != 6 && fields != 7 {
        return Err(AppError::Validation(format!(
            "Schedule '{}' must be a cron expression with seconds (6 fields)",
            expr
        )));
    }
    Ok(())
}

impl NotificationSettings {
    pub fn validate(&self) -> Result<()> {
        if self.cap < 1 {
            return Err(AppError::Validation(
                "Notification cap must be at least 1".to_string(),
            ));
        }
        validate_cron(&self.scan_schedule)
    }
}

impl RateSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(AppError::Validation(format!(
                "Rate endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        if !(MIN_RATE_TTL_MINUTES..=MAX_RATE_TTL_MINUTES).contains(&self.ttl_minutes) {
            return Err(AppError::Validation(format!(
                "Rate TTL must be between {} and {} minutes",
                MIN_RATE_TTL_MINUTES, MAX_RATE_TTL_MINUTES
            )));
        }
        validate_cron(&self.refresh_schedule)
    }
}

fn validate_page_size(size: usize) -> Result<()> {
    if !ALLOWED_PAGE_SIZES.contains(&size) {
        return Err(AppError::Validation(format!(
            "Page size must be one of {:?}",
            ALLOWED_PAGE_SIZES
        )));
    }
    Ok(())
}

fn validate_currency(code: &str) -> Result<()> {
    if !is_supported_currency(code) {
        return Err(AppError::Validation(format!("Unsupported currency: {}", code)));
    }
    Ok(())
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join("settings.json"),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn update_display_currency(&self, code: &str) -> Result<AppSettings> {
        let code = code.trim().to_uppercase();
        validate_currency(&code)?;

        let mut settings = self.load().await?;
        settings.display_currency = code;
        self.save(&settings).await?;
        Ok(settings)
    }

    pub async fn update_default_page_size(&self, size: usize) -> Result<AppSettings> {
        validate_page_size(size)?;

        let mut settings = self.load().await?;
        settings.default_page_size = size;
        self.save(&settings).await?;
        Ok(settings)
    }

    pub async fn update_notifications(
        &self,
        notifications: NotificationSettings,
    ) -> Result<AppSettings> {
        notifications.validate()?;

        let mut settings = self.load().await?;
        settings.notifications = notifications;
        self.save(&settings).await?;
        Ok(settings)
    }

    pub async fn update_rates(&self, rates: RateSettings) -> Result<AppSettings> {
        rates.validate()?;

        let mut settings = self.load().await?;
        settings.rates = rates;
        self.save(&settings).await?;
        Ok(settings)
    }
}
