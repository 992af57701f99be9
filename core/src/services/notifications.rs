//! Notifications service
//!
//! Rule engine that scans clients and tasks for actionable conditions, and
//! the service that persists its candidates. The engine itself never
//! deduplicates; each candidate carries a natural key (type, entity, day)
//! that the store keeps unique, so a persisting condition alerts at most
//! once per calendar day.

use crate::config::{DEFAULT_NOTIFICATION_CAP, NO_CONTACT_THRESHOLD_DAYS};
use crate::database::{
    ClientRecord, InvoiceStatus, NewNotification, Notification, NotificationType, Repository, Task,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// True when `instant` falls on the same calendar day as `now` in `now`'s zone.
///
/// Dashboard "today" figures use this same predicate.
pub fn is_same_local_day<Tz: TimeZone>(instant: DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    instant.with_timezone(&now.timezone()).date_naive() == now.date_naive()
}

/// Start of `date` in `now`'s zone, as UTC
fn start_of_day<Tz: TimeZone>(date: NaiveDate, now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Unpaid invoice whose due date has started in `now`'s zone.
///
/// Shared by the `invoice_overdue` rule and the dashboard's overdue count.
pub fn is_invoice_overdue<Tz: TimeZone>(client: &ClientRecord, now: &DateTime<Tz>) -> bool {
    client.invoice_status != InvoiceStatus::Paid
        && client
            .invoice_due_date
            .is_some_and(|due| start_of_day(due, now) < now.with_timezone(&Utc))
}

fn dedupe_key<Tz: TimeZone>(
    kind: NotificationType,
    entity_id: &str,
    now: &DateTime<Tz>,
) -> String {
    format!("{}:{}:{}", kind, entity_id, now.date_naive().format("%Y-%m-%d"))
}

fn task_notification<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> Option<NewNotification> {
    if task.completed {
        return None;
    }
    let due_at = task.due_at?;

    let (kind, title) = if is_same_local_day(due_at, now) {
        (NotificationType::TaskDue, "Task due today")
    } else if due_at < now.with_timezone(&Utc) {
        (NotificationType::TaskOverdue, "Task overdue")
    } else {
        return None;
    };

    Some(NewNotification {
        notification_type: kind,
        title: title.to_string(),
        message: Some(task.title.clone()),
        client_id: task.client_id.clone(),
        task_id: Some(task.id.clone()),
        dedupe_key: dedupe_key(kind, &task.id, now),
    })
}

fn client_notifications<Tz: TimeZone>(
    client: &ClientRecord,
    now: &DateTime<Tz>,
) -> Vec<NewNotification> {
    let now_utc = now.with_timezone(&Utc);
    let mut found = Vec::new();

    let mut push = |kind: NotificationType, title: &str, message: String| {
        found.push(NewNotification {
            notification_type: kind,
            title: title.to_string(),
            message: Some(message),
            client_id: Some(client.id.clone()),
            task_id: None,
            dedupe_key: dedupe_key(kind, &client.id, now),
        });
    };

    if let Some(follow_up) = client.next_follow_up {
        if follow_up <= now_utc && !client.pipeline_stage.is_closed() {
            push(
                NotificationType::FollowUpDue,
                "Follow-up due",
                format!("Follow up with {}", client.name),
            );
        }
    }

    if let Some(due_date) = client.invoice_due_date {
        if is_invoice_overdue(client, now) {
            push(
                NotificationType::InvoiceOverdue,
                "Invoice overdue",
                format!("Invoice for {} was due {}", client.name, due_date),
            );
        }
    }

    match client.last_contact {
        None => push(
            NotificationType::NoContact,
            "No recent contact",
            format!("No contact logged with {}", client.name),
        ),
        Some(last) if now_utc - last >= Duration::days(NO_CONTACT_THRESHOLD_DAYS) => push(
            NotificationType::NoContact,
            "No recent contact",
            format!(
                "No contact with {} in {} days",
                client.name,
                (now_utc - last).num_days()
            ),
        ),
        Some(_) => {}
    }

    found
}

/// Evaluate every rule against `now` and return at most `cap` candidates.
///
/// Tasks are evaluated before clients, each in input order; within a client
/// the order is follow-up, invoice, then contact.
pub fn generate<Tz: TimeZone>(
    clients: &[ClientRecord],
    tasks: &[Task],
    now: &DateTime<Tz>,
    cap: usize,
) -> Vec<NewNotification> {
    tasks
        .iter()
        .filter_map(|task| task_notification(task, now))
        .chain(clients.iter().flat_map(|client| client_notifications(client, now)))
        .take(cap)
        .collect()
}

/// Result of one generation pass
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Candidates produced by the rules (after the cap)
    pub candidates: usize,
    /// Notifications actually stored; duplicates of today's alerts are skipped
    pub created: Vec<Notification>,
}

/// Service for generating and managing notifications
#[derive(Clone)]
pub struct NotificationService {
    repo: Repository,
    cap: usize,
}

impl NotificationService {
    pub fn new(repo: Repository) -> Self {
        Self::with_cap(repo, DEFAULT_NOTIFICATION_CAP)
    }

    pub fn with_cap(repo: Repository, cap: usize) -> Self {
        Self { repo, cap }
    }

    /// Run the rules for an owner at `now` and persist the candidates.
    ///
    /// A store failure is returned to the caller; nothing is retried.
    pub async fn generate_and_store<Tz: TimeZone>(
        &self,
        owner_id: &str,
        now: &DateTime<Tz>,
    ) -> Result<GenerationReport> {
        let clients = self.repo.list_clients(owner_id).await?;
        let tasks = self.repo.list_tasks(owner_id).await?;

        let candidates = generate(&clients, &tasks, now, self.cap);
        if candidates.is_empty() {
            tracing::debug!("No notification candidates for {}", owner_id);
            return Ok(GenerationReport {
                candidates: 0,
                created: Vec::new(),
            });
        }

        let created = self.repo.create_notifications(owner_id, &candidates).await?;

        tracing::info!(
            "Generated {} notifications for {} ({} candidates)",
            created.len(),
            owner_id,
            candidates.len()
        );
        Ok(GenerationReport {
            candidates: candidates.len(),
            created,
        })
    }

    /// Generation pass against the local wall clock
    pub async fn scan(&self, owner_id: &str) -> Result<GenerationReport> {
        self.generate_and_store(owner_id, &Local::now()).await
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<Notification>> {
        self.repo.list_notifications(owner_id).await
    }

    pub async fn unread_count(&self, owner_id: &str) -> Result<i64> {
        self.repo.count_unread_notifications(owner_id).await
    }

    pub async fn mark_read(&self, id: &str) -> Result<()> {
        self.repo.mark_notification_read(id).await
    }

    pub async fn mark_all_read(&self, owner_id: &str) -> Result<u64> {
        let changed = self.repo.mark_all_notifications_read(owner_id).await?;
        tracing::info!("Marked {} notifications read for {}", changed, owner_id);
        Ok(changed)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.repo.delete_notification(id).await
    }

    /// Notifications still pointing at a client, for a client detail screen
    pub async fn list_for_client(&self, owner_id: &str, client_id: &str) -> Result<Vec<Notification>> {
        if client_id.is_empty() {
            return Err(AppError::Validation("Client id is required".to_string()));
        }
        let all = self.list(owner_id).await?;
        Ok(all
            .into_iter()
            .filter(|n| n.client_id.as_deref() == Some(client_id))
            .collect())
    }
}
