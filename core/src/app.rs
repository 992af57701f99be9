//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::client_view::ViewState;
use crate::services::settings::RateSettings;
use crate::services::{
    AppSettings, ClientsService, DashboardService, HttpRateSource, ImportService,
    NotificationService, RateCache, SchedulerService, SettingsService, TasksService,
};
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;

/// Database file name inside the app data directory
pub const DATABASE_FILE: &str = "clientdesk.db";

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub repo: Repository,
    pub clients: ClientsService,
    pub tasks: TasksService,
    pub imports: ImportService,
    pub notifications: NotificationService,
    pub dashboard: DashboardService,
    pub settings: SettingsService,
    pub rates: RateCache,
    pub scheduler: Arc<SchedulerService>,
}

impl AppState {
    /// Application setup - called once on startup
    pub async fn initialize(app_data_dir: PathBuf) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        std::fs::create_dir_all(&app_data_dir)?;

        let settings = SettingsService::new(app_data_dir.clone());
        let current = settings.load().await?;

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE)).await?;
        let repo = Repository::new(pool);

        let source = HttpRateSource::new(current.rates.endpoint.clone())?;
        let rates = RateCache::new(
            Arc::new(source),
            Duration::minutes(i64::from(current.rates.ttl_minutes)),
        );
        if let Err(e) = rates.set_display_currency(&current.display_currency).await {
            tracing::warn!("Ignoring stored display currency: {}", e);
        }

        let notifications = NotificationService::with_cap(repo.clone(), current.notifications.cap);
        let scheduler = SchedulerService::new(notifications.clone(), rates.clone()).await?;

        let state = Self {
            app_data_dir,
            clients: ClientsService::new(repo.clone()),
            tasks: TasksService::new(repo.clone()),
            imports: ImportService::new(repo.clone()),
            dashboard: DashboardService::new(repo.clone()),
            notifications,
            settings,
            rates,
            scheduler: Arc::new(scheduler),
            repo,
        };

        tracing::info!("Application initialized successfully");

        Ok(state)
    }

    /// Start the notification scan for a signed-in owner and the rate refresh
    pub async fn start_background_jobs(&self, owner_id: &str) -> Result<()> {
        let current = self.settings.load().await?;

        if current.notifications.scan_enabled {
            self.scheduler
                .schedule_notification_scan(owner_id, &current.notifications.scan_schedule)
                .await?;
        }
        self.scheduler
            .schedule_rate_refresh(&current.rates.refresh_schedule)
            .await?;
        self.scheduler.start().await
    }

    /// Persist the display currency and apply it to the live rate cache
    pub async fn set_display_currency(&self, code: &str) -> Result<AppSettings> {
        let updated = self.settings.update_display_currency(code).await?;
        self.rates
            .set_display_currency(&updated.display_currency)
            .await?;
        Ok(updated)
    }

    /// Persist rate settings, point the cache at the new source and
    /// reschedule the refresh job if one is running.
    pub async fn update_rate_settings(&self, rates: RateSettings) -> Result<AppSettings> {
        let updated = self.settings.update_rates(rates).await?;

        let source = HttpRateSource::new(updated.rates.endpoint.clone())?;
        self.rates
            .reconfigure(
                Arc::new(source),
                Duration::minutes(i64::from(updated.rates.ttl_minutes)),
            )
            .await;

        if self.scheduler.has_rate_refresh().await {
            self.scheduler
                .schedule_rate_refresh(&updated.rates.refresh_schedule)
                .await?;
        }
        Ok(updated)
    }

    /// Fresh list state using the configured default page size
    pub async fn new_view_state(&self) -> Result<ViewState> {
        let current = self.settings.load().await?;
        ViewState::with_page_size(current.default_page_size)
    }

    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application");
        self.scheduler.shutdown().await?;
        self.repo.close().await;
        Ok(())
    }
}
