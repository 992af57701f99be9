//! Repository layer for database operations
//!
//! This module implements the record store contract: CRUD operations for
//! clients, tasks and notifications, keyed by an opaque owner id.
//! Multi-row writes run inside a transaction.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

fn validate_client_fields(name: &str, deal_value: Option<f64>) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Client name is required".to_string()));
    }
    if let Some(value) = deal_value {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(format!(
                "Deal value must be a non-negative number, got {}",
                value
            )));
        }
    }
    Ok(())
}

fn validate_task_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Task title is required".to_string()));
    }
    Ok(())
}

async fn insert_client(
    conn: &mut SqliteConnection,
    owner_id: &str,
    draft: &ClientDraft,
    now: DateTime<Utc>,
) -> Result<ClientRecord> {
    let id = Uuid::new_v4().to_string();

    let client = sqlx::query_as::<_, ClientRecord>(
        r#"
        INSERT INTO clients (
            id, owner_id, name, email, phone, company, website, address,
            client_type, status, pipeline_stage, deal_value, next_follow_up,
            invoice_status, invoice_due_date, billing_type, billing_frequency,
            recurring_amount, next_billing_date, services, source, notes,
            last_contact, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(draft.name.trim())
    .bind(&draft.email)
    .bind(&draft.phone)
    .bind(&draft.company)
    .bind(&draft.website)
    .bind(&draft.address)
    .bind(draft.client_type)
    .bind(draft.status)
    .bind(draft.pipeline_stage)
    .bind(draft.deal_value)
    .bind(draft.next_follow_up)
    .bind(draft.invoice_status)
    .bind(draft.invoice_due_date)
    .bind(draft.billing_type)
    .bind(draft.billing_frequency)
    .bind(draft.recurring_amount)
    .bind(draft.next_billing_date)
    .bind(&draft.services)
    .bind(&draft.source)
    .bind(&draft.notes)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(client)
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Close the underlying pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Clients =====

    /// Create a single client
    pub async fn create_client(&self, owner_id: &str, draft: &ClientDraft) -> Result<ClientRecord> {
        validate_client_fields(&draft.name, draft.deal_value)?;

        let mut conn = self.pool.acquire().await?;
        let client = insert_client(&mut conn, owner_id, draft, Utc::now()).await?;

        tracing::debug!("Created client: {}", client.id);
        Ok(client)
    }

    /// Create many clients in one transaction.
    ///
    /// All-or-nothing: one invalid draft or failed insert rolls back the batch.
    pub async fn bulk_create_clients(
        &self,
        owner_id: &str,
        drafts: &[ClientDraft],
    ) -> Result<Vec<ClientRecord>> {
        for draft in drafts {
            validate_client_fields(&draft.name, draft.deal_value)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());

        for draft in drafts {
            created.push(insert_client(&mut tx, owner_id, draft, now).await?);
        }

        tx.commit().await?;

        tracing::debug!("Bulk created {} clients for owner {}", created.len(), owner_id);
        Ok(created)
    }

    /// Get a client by ID
    pub async fn get_client(&self, id: &str) -> Result<ClientRecord> {
        let client = sqlx::query_as::<_, ClientRecord>("SELECT * FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ClientNotFound(id.to_string()))?;

        Ok(client)
    }

    /// List an owner's clients, newest first
    pub async fn list_clients(&self, owner_id: &str) -> Result<Vec<ClientRecord>> {
        let clients = sqlx::query_as::<_, ClientRecord>(
            r#"
            SELECT * FROM clients
            WHERE owner_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    /// Apply a partial update to a client
    pub async fn update_client(&self, id: &str, req: UpdateClientRequest) -> Result<ClientRecord> {
        let mut client = self.get_client(id).await?;
        req.apply_to(&mut client);
        validate_client_fields(&client.name, client.deal_value)?;

        let updated = sqlx::query_as::<_, ClientRecord>(
            r#"
            UPDATE clients SET
                name = ?, email = ?, phone = ?, company = ?, website = ?, address = ?,
                client_type = ?, status = ?, pipeline_stage = ?, deal_value = ?,
                next_follow_up = ?, invoice_status = ?, invoice_due_date = ?,
                billing_type = ?, billing_frequency = ?, recurring_amount = ?,
                next_billing_date = ?, services = ?, source = ?, notes = ?,
                last_contact = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(client.name.trim())
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.company)
        .bind(&client.website)
        .bind(&client.address)
        .bind(client.client_type)
        .bind(client.status)
        .bind(client.pipeline_stage)
        .bind(client.deal_value)
        .bind(client.next_follow_up)
        .bind(client.invoice_status)
        .bind(client.invoice_due_date)
        .bind(client.billing_type)
        .bind(client.billing_frequency)
        .bind(client.recurring_amount)
        .bind(client.next_billing_date)
        .bind(&client.services)
        .bind(&client.source)
        .bind(&client.notes)
        .bind(client.last_contact)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(id.to_string()))?;

        tracing::debug!("Updated client: {}", id);
        Ok(updated)
    }

    /// Delete a client. Linked tasks and notifications are unlinked, not deleted.
    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::ClientNotFound(id.to_string()));
        }

        tracing::debug!("Deleted client: {}", id);
        Ok(())
    }

    // ===== Tasks =====

    /// Create a task
    pub async fn create_task(&self, owner_id: &str, req: &CreateTaskRequest) -> Result<Task> {
        validate_task_title(&req.title)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, owner_id, title, due_at, completed, client_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(owner_id)
        .bind(req.title.trim())
        .bind(req.due_at)
        .bind(&req.client_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created task: {}", id);
        Ok(task)
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: &str) -> Result<Task> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::TaskNotFound(id.to_string()))?;

        Ok(task)
    }

    /// List an owner's tasks, oldest first
    pub async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT * FROM tasks
            WHERE owner_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tasks)
    }

    /// Apply a partial update to a task
    pub async fn update_task(&self, id: &str, req: UpdateTaskRequest) -> Result<Task> {
        let mut task = self.get_task(id).await?;

        if let Some(title) = req.title {
            task.title = title;
        }
        if let Some(due_at) = req.due_at {
            task.due_at = due_at;
        }
        if let Some(client_id) = req.client_id {
            task.client_id = client_id;
        }
        if let Some(completed) = req.completed {
            task.completed = completed;
        }
        validate_task_title(&task.title)?;

        let updated = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks SET title = ?, due_at = ?, client_id = ?, completed = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(task.title.trim())
        .bind(task.due_at)
        .bind(&task.client_id)
        .bind(task.completed)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::TaskNotFound(id.to_string()))?;

        tracing::debug!("Updated task: {}", id);
        Ok(updated)
    }

    /// Delete a task
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::TaskNotFound(id.to_string()));
        }

        tracing::debug!("Deleted task: {}", id);
        Ok(())
    }

    // ===== Notifications =====

    /// Persist candidate notifications.
    ///
    /// Candidates whose `(owner_id, dedupe_key)` already exists are skipped;
    /// only newly stored rows are returned.
    pub async fn create_notifications(
        &self,
        owner_id: &str,
        candidates: &[NewNotification],
    ) -> Result<Vec<Notification>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();

        for candidate in candidates {
            let inserted = sqlx::query_as::<_, Notification>(
                r#"
                INSERT INTO notifications (
                    id, owner_id, notification_type, title, message, read,
                    client_id, task_id, dedupe_key, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
                ON CONFLICT(owner_id, dedupe_key) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(owner_id)
            .bind(candidate.notification_type)
            .bind(&candidate.title)
            .bind(&candidate.message)
            .bind(&candidate.client_id)
            .bind(&candidate.task_id)
            .bind(&candidate.dedupe_key)
            .bind(now)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(notification) => created.push(notification),
                None => tracing::debug!("Skipped duplicate notification: {}", candidate.dedupe_key),
            }
        }

        tx.commit().await?;

        tracing::debug!(
            "Stored {} of {} candidate notifications for owner {}",
            created.len(),
            candidates.len(),
            owner_id
        );
        Ok(created)
    }

    /// List an owner's notifications, newest first
    pub async fn list_notifications(&self, owner_id: &str) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE owner_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    /// Count unread notifications
    pub async fn count_unread_notifications(&self, owner_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE owner_id = ? AND read = 0")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Mark one notification as read
    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("UPDATE notifications SET read = 1, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotificationNotFound(id.to_string()));
        }

        tracing::debug!("Marked notification as read: {}", id);
        Ok(())
    }

    /// Mark every unread notification of an owner as read, returning how many changed
    pub async fn mark_all_notifications_read(&self, owner_id: &str) -> Result<u64> {
        let rows = sqlx::query(
            "UPDATE notifications SET read = 1, updated_at = ? WHERE owner_id = ? AND read = 0",
        )
        .bind(Utc::now())
        .bind(owner_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::debug!("Marked {} notifications as read for owner {}", rows, owner_id);
        Ok(rows)
    }

    /// Delete a notification
    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotificationNotFound(id.to_string()));
        }

        tracing::debug!("Deleted notification: {}", id);
        Ok(())
    }

    // ===== Accounts =====

    /// Remove every record owned by an account
    pub async fn delete_owner_data(&self, owner_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for table in ["notifications", "tasks", "clients"] {
            sqlx::query(&format!("DELETE FROM {} WHERE owner_id = ?", table))
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!("Deleted all records for owner {}", owner_id);
        Ok(())
    }
}
