//! Dashboard service
//!
//! Derived metrics for the dashboard screen. Amounts are canonical USD;
//! render them through the currency service.

use crate::database::{
    BillingFrequency, BillingType, ClientRecord, ClientStatus, ClientType, PipelineStage,
    Repository, Task,
};
use crate::error::Result;
use crate::services::notifications::{is_invoice_overdue, is_same_local_day};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

/// Task and follow-up counts for the current calendar day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TodayStats {
    pub tasks_due_today: usize,
    pub overdue_tasks: usize,
    pub open_tasks: usize,
    pub completed_tasks: usize,
    pub follow_ups_due_today: usize,
}

/// One kanban column's totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: PipelineStage,
    pub count: usize,
    pub deal_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_clients: usize,
    pub active_clients: usize,
    pub leads: usize,
    pub paying_clients: usize,
    pub data_clients: usize,
    pub pipeline: Vec<StageSummary>,
    /// Deal value still in play (stages other than Won and Lost)
    pub open_pipeline_value: f64,
    pub won_value: f64,
    /// Recurring billing normalised to a monthly amount
    pub monthly_recurring_revenue: f64,
    /// Clients that currently raise `invoice_overdue`
    pub overdue_invoices: usize,
    pub today: TodayStats,
}

/// Uses the same calendar-day predicate as the notification rules, so the
/// "due today" figure always matches the `task_due` alerts.
pub fn today_stats<Tz: TimeZone>(
    clients: &[ClientRecord],
    tasks: &[Task],
    now: &DateTime<Tz>,
) -> TodayStats {
    let now_utc = now.with_timezone(&Utc);
    let mut stats = TodayStats::default();

    for task in tasks {
        if task.completed {
            stats.completed_tasks += 1;
            continue;
        }
        stats.open_tasks += 1;

        if let Some(due_at) = task.due_at {
            if is_same_local_day(due_at, now) {
                stats.tasks_due_today += 1;
            } else if due_at < now_utc {
                stats.overdue_tasks += 1;
            }
        }
    }

    stats.follow_ups_due_today = clients
        .iter()
        .filter(|c| !c.pipeline_stage.is_closed())
        .filter_map(|c| c.next_follow_up)
        .filter(|follow_up| is_same_local_day(*follow_up, now))
        .count();

    stats
}

fn monthly_amount(client: &ClientRecord) -> f64 {
    if client.client_type != ClientType::Paying || client.billing_type != BillingType::Recurring {
        return 0.0;
    }
    let amount = client.recurring_amount.unwrap_or(0.0);
    match client.billing_frequency {
        Some(BillingFrequency::Weekly) => amount * 52.0 / 12.0,
        Some(BillingFrequency::Monthly) => amount,
        Some(BillingFrequency::Quarterly) => amount / 3.0,
        Some(BillingFrequency::Yearly) => amount / 12.0,
        None => 0.0,
    }
}

/// Compute every dashboard figure from the loaded collections
pub fn summarize<Tz: TimeZone>(
    clients: &[ClientRecord],
    tasks: &[Task],
    now: &DateTime<Tz>,
) -> DashboardSummary {
    let count_type = |ty: ClientType| clients.iter().filter(|c| c.client_type == ty).count();

    let pipeline: Vec<StageSummary> = PipelineStage::ALL
        .iter()
        .map(|stage| {
            let in_stage = clients
                .iter()
                .filter(|c| c.client_type != ClientType::Data && c.pipeline_stage == *stage);
            StageSummary {
                stage: *stage,
                count: in_stage.clone().count(),
                deal_value: in_stage.filter_map(|c| c.deal_value).sum(),
            }
        })
        .collect();

    let open_pipeline_value = pipeline
        .iter()
        .filter(|s| !s.stage.is_closed())
        .map(|s| s.deal_value)
        .sum();
    let won_value = pipeline
        .iter()
        .filter(|s| s.stage == PipelineStage::Won)
        .map(|s| s.deal_value)
        .sum();

    DashboardSummary {
        total_clients: clients.len(),
        active_clients: clients
            .iter()
            .filter(|c| c.status == ClientStatus::Active)
            .count(),
        leads: count_type(ClientType::Lead),
        paying_clients: count_type(ClientType::Paying),
        data_clients: count_type(ClientType::Data),
        pipeline,
        open_pipeline_value,
        won_value,
        monthly_recurring_revenue: clients.iter().map(monthly_amount).sum(),
        overdue_invoices: clients
            .iter()
            .filter(|c| is_invoice_overdue(c, now))
            .count(),
        today: today_stats(clients, tasks, now),
    }
}

/// Service that loads an owner's records and summarizes them
#[derive(Clone)]
pub struct DashboardService {
    repo: Repository,
}

impl DashboardService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn summary_at<Tz: TimeZone>(
        &self,
        owner_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<DashboardSummary> {
        let clients = self.repo.list_clients(owner_id).await?;
        let tasks = self.repo.list_tasks(owner_id).await?;
        Ok(summarize(&clients, &tasks, now))
    }

    pub async fn summary(&self, owner_id: &str) -> Result<DashboardSummary> {
        self.summary_at(owner_id, &Local::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        create_memory_pool, ClientDraft, CreateTaskRequest, InvoiceStatus, NotificationType,
    };
    use crate::services::client_view::tests::client;
    use crate::services::notifications::generate;
    use chrono::{Duration, NaiveDate};

    fn task(due_at: Option<DateTime<Utc>>, completed: bool) -> Task {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Task {
            id: "t".to_string(),
            owner_id: "owner-1".to_string(),
            title: "Task".to_string(),
            due_at,
            completed,
            client_id: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_today_stats_use_calendar_day() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();
        let tasks = vec![
            task(Some(Utc.with_ymd_and_hms(2026, 5, 10, 23, 59, 0).unwrap()), false),
            task(Some(Utc.with_ymd_and_hms(2026, 5, 10, 1, 0, 0).unwrap()), false),
            task(Some(now - Duration::hours(9)), false),
            task(Some(now + Duration::hours(20)), false),
            task(None, false),
            task(Some(now - Duration::days(3)), true),
        ];

        let mut follow = client("Follow", 0);
        follow.next_follow_up = Some(Utc.with_ymd_and_hms(2026, 5, 10, 18, 0, 0).unwrap());
        let mut closed = client("Closed", 0);
        closed.next_follow_up = follow.next_follow_up;
        closed.pipeline_stage = PipelineStage::Lost;

        let stats = today_stats(&[follow, closed], &tasks, &now);

        assert_eq!(
            stats,
            TodayStats {
                tasks_due_today: 2,
                overdue_tasks: 1,
                open_tasks: 5,
                completed_tasks: 1,
                follow_ups_due_today: 1,
            }
        );
    }

    #[test]
    fn test_summary_pipeline_and_revenue() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();

        let mut proposal = client("Proposal", 0);
        proposal.pipeline_stage = PipelineStage::Proposal;
        proposal.deal_value = Some(1000.0);

        let mut won = client("Won", 1);
        won.pipeline_stage = PipelineStage::Won;
        won.client_type = ClientType::Paying;
        won.deal_value = Some(500.0);
        won.billing_type = BillingType::Recurring;
        won.billing_frequency = Some(BillingFrequency::Quarterly);
        won.recurring_amount = Some(300.0);
        won.invoice_due_date = NaiveDate::from_ymd_opt(2026, 5, 1);

        let mut yearly = client("Yearly", 2);
        yearly.client_type = ClientType::Paying;
        yearly.billing_type = BillingType::Recurring;
        yearly.billing_frequency = Some(BillingFrequency::Yearly);
        yearly.recurring_amount = Some(1200.0);
        yearly.invoice_status = InvoiceStatus::Paid;
        yearly.invoice_due_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        yearly.status = ClientStatus::Inactive;

        let mut data = client("Data", 3);
        data.client_type = ClientType::Data;
        data.deal_value = Some(9999.0);

        let summary = summarize(&[proposal, won, yearly, data], &[], &now);

        assert_eq!(summary.total_clients, 4);
        assert_eq!(summary.active_clients, 3);
        assert_eq!(summary.leads, 1);
        assert_eq!(summary.paying_clients, 2);
        assert_eq!(summary.data_clients, 1);
        assert_eq!(summary.pipeline.len(), 5);
        assert_eq!(summary.pipeline[2].count, 1);
        assert_eq!(summary.open_pipeline_value, 1000.0);
        assert_eq!(summary.won_value, 500.0);
        assert_eq!(summary.monthly_recurring_revenue, 200.0);
        assert_eq!(summary.overdue_invoices, 1);
    }

    #[test]
    fn test_overdue_invoices_match_alerts() {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();

        let mut due_today = client("Today", 0);
        due_today.client_type = ClientType::Paying;
        due_today.invoice_due_date = NaiveDate::from_ymd_opt(2026, 5, 10);
        due_today.last_contact = Some(now);

        let mut lead = client("Lead", 1);
        lead.invoice_due_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        lead.last_contact = Some(now);

        let mut tomorrow = client("Tomorrow", 2);
        tomorrow.invoice_due_date = NaiveDate::from_ymd_opt(2026, 5, 11);
        tomorrow.last_contact = Some(now);

        let clients = [due_today, lead, tomorrow];
        let alerts = generate(&clients, &[], &now, 10)
            .iter()
            .filter(|n| n.notification_type == NotificationType::InvoiceOverdue)
            .count();

        assert_eq!(alerts, 2);
        assert_eq!(summarize(&clients, &[], &now).overdue_invoices, alerts);
    }

    #[tokio::test]
    async fn test_summary_from_store() {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        let service = DashboardService::new(repo.clone());

        repo.create_client("owner-1", &ClientDraft::new("Ada")).await.unwrap();
        repo.create_task(
            "owner-1",
            &CreateTaskRequest {
                title: "Call Ada".to_string(),
                due_at: Some(Utc::now() - Duration::days(2)),
                client_id: None,
            },
        )
        .await
        .unwrap();

        let summary = service.summary_at("owner-1", &Utc::now()).await.unwrap();
        assert_eq!(summary.total_clients, 1);
        assert_eq!(summary.today.overdue_tasks, 1);
        assert_eq!(summary.today.open_tasks, 1);
    }
}
