/// Scheduler Service
/// Runs periodic notification scans and exchange-rate refreshes on cron schedules.
/// Job failures are logged; they never reach the caller.
use crate::error::{AppError, Result};
use crate::services::currency::RateCache;
use crate::services::notifications::NotificationService;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Scheduler service for background jobs
pub struct SchedulerService {
    scheduler: Arc<RwLock<JobScheduler>>,
    notifications: NotificationService,
    rates: RateCache,
    scan_jobs: Arc<RwLock<HashMap<String, Uuid>>>,
    rate_job: Arc<RwLock<Option<Uuid>>>,
}

impl SchedulerService {
    /// Create new scheduler service
    pub async fn new(notifications: NotificationService, rates: RateCache) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            notifications,
            rates,
            scan_jobs: Arc::new(RwLock::new(HashMap::new())),
            rate_job: Arc::new(RwLock::new(None)),
        })
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<()> {
        let scheduler = self.scheduler.read().await;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        tracing::info!("Background scheduler started");
        Ok(())
    }

    async fn add_job(&self, job: Job) -> Result<Uuid> {
        let scheduler = self.scheduler.write().await;
        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to schedule job: {}", e)))
    }

    async fn remove_job(&self, job_id: &Uuid) -> Result<()> {
        let scheduler = self.scheduler.write().await;
        scheduler
            .remove(job_id)
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to remove job: {}", e)))
    }

    /// Schedule the notification scan for one owner, replacing any existing schedule
    pub async fn schedule_notification_scan(&self, owner_id: &str, cron_expr: &str) -> Result<()> {
        self.cancel_notification_scan(owner_id).await?;

        let notifications = self.notifications.clone();
        let owner = owner_id.to_string();

        let job = Job::new_async(cron_expr.to_string(), move |_uuid, _l| {
            let notifications = notifications.clone();
            let owner = owner.clone();
            Box::pin(async move {
                tracing::debug!("Running scheduled notification scan for {}", owner);
                match notifications.scan(&owner).await {
                    Ok(report) => tracing::info!(
                        "Notification scan for {}: {} candidates, {} new",
                        owner,
                        report.candidates,
                        report.created.len()
                    ),
                    Err(e) => tracing::error!("Notification scan for {} failed: {}", owner, e),
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create scan job: {}", e)))?;

        let job_id = self.add_job(job).await?;
        self.scan_jobs
            .write()
            .await
            .insert(owner_id.to_string(), job_id);

        tracing::info!("Notification scan scheduled for {} ({})", owner_id, cron_expr);
        Ok(())
    }

    /// Cancel the scheduled scan for one owner
    pub async fn cancel_notification_scan(&self, owner_id: &str) -> Result<()> {
        let mut jobs = self.scan_jobs.write().await;

        if let Some(job_id) = jobs.remove(owner_id) {
            self.remove_job(&job_id).await?;
            tracing::info!("Notification scan cancelled for {}", owner_id);
        }

        Ok(())
    }

    /// Schedule the exchange-rate refresh, replacing any existing schedule
    pub async fn schedule_rate_refresh(&self, cron_expr: &str) -> Result<()> {
        self.cancel_rate_refresh().await?;

        let rates = self.rates.clone();

        let job = Job::new_async(cron_expr.to_string(), move |_uuid, _l| {
            let rates = rates.clone();
            Box::pin(async move {
                tracing::debug!("Running scheduled exchange rate refresh");
                // Failures already fall back inside the cache
                rates.refresh().await;
            })
        })
        .map_err(|e| AppError::Scheduler(format!("Failed to create rate job: {}", e)))?;

        let job_id = self.add_job(job).await?;
        *self.rate_job.write().await = Some(job_id);

        tracing::info!("Exchange rate refresh scheduled ({})", cron_expr);
        Ok(())
    }

    /// Cancel the scheduled rate refresh
    pub async fn cancel_rate_refresh(&self) -> Result<()> {
        let mut current_job = self.rate_job.write().await;

        if let Some(job_id) = current_job.take() {
            self.remove_job(&job_id).await?;
            tracing::info!("Exchange rate refresh cancelled");
        }

        Ok(())
    }

    /// Owners with an active scan schedule
    pub async fn scheduled_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.scan_jobs.read().await.keys().cloned().collect();
        owners.sort();
        owners
    }

    pub async fn has_rate_refresh(&self) -> bool {
        self.rate_job.read().await.is_some()
    }

    /// Shutdown scheduler gracefully
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Background scheduler shutdown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, Repository};
    use crate::services::currency::RateSource;
    use async_trait::async_trait;
    use chrono::Duration;

    struct NoRates;

    #[async_trait]
    impl RateSource for NoRates {
        async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
            Err(AppError::Generic("offline".to_string()))
        }
    }

    async fn create_test_scheduler() -> SchedulerService {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let rates = RateCache::new(Arc::new(NoRates), Duration::hours(1));
        SchedulerService::new(NotificationService::new(repo), rates)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_scan() {
        let scheduler = create_test_scheduler().await;

        scheduler
            .schedule_notification_scan("owner-1", "0 */15 * * * *")
            .await
            .unwrap();
        scheduler
            .schedule_notification_scan("owner-2", "0 0 * * * *")
            .await
            .unwrap();
        // Rescheduling replaces rather than duplicates
        scheduler
            .schedule_notification_scan("owner-1", "0 */5 * * * *")
            .await
            .unwrap();
        assert_eq!(scheduler.scheduled_owners().await, vec!["owner-1", "owner-2"]);

        scheduler.cancel_notification_scan("owner-1").await.unwrap();
        assert_eq!(scheduler.scheduled_owners().await, vec!["owner-2"]);

        // Cancelling an owner without a schedule is a no-op
        scheduler.cancel_notification_scan("owner-9").await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_rate_refresh() {
        let scheduler = create_test_scheduler().await;

        scheduler.schedule_rate_refresh("0 0 * * * *").await.unwrap();
        assert!(scheduler.has_rate_refresh().await);

        scheduler.cancel_rate_refresh().await.unwrap();
        assert!(!scheduler.has_rate_refresh().await);
    }

    #[tokio::test]
    async fn test_invalid_cron_is_rejected() {
        let scheduler = create_test_scheduler().await;

        let result = scheduler
            .schedule_notification_scan("owner-1", "not a schedule")
            .await;

        assert!(matches!(result, Err(AppError::Scheduler(_))));
        assert!(scheduler.scheduled_owners().await.is_empty());
    }
}
