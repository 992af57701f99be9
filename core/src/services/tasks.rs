//! Tasks service

use crate::config::NO_CLIENT_LABEL;
use crate::database::{CreateTaskRequest, Repository, Task, UpdateTaskRequest};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// A task with its client's display name resolved
#[derive(Debug, Clone, Serialize)]
pub struct TaskListItem {
    #[serde(flatten)]
    pub task: Task,
    pub client_name: Option<String>,
}

impl TaskListItem {
    pub fn client_label(&self) -> &str {
        self.client_name.as_deref().unwrap_or(NO_CLIENT_LABEL)
    }
}

#[derive(Clone)]
pub struct TasksService {
    repo: Repository,
}

impl TasksService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create_task(
        &self,
        owner_id: &str,
        title: String,
        due_at: Option<DateTime<Utc>>,
        client_id: Option<String>,
    ) -> Result<Task> {
        tracing::info!("Creating task: {}", title);

        let req = CreateTaskRequest {
            title,
            due_at,
            client_id,
        };
        let task = self.repo.create_task(owner_id, &req).await?;

        tracing::info!("Task created successfully: {}", task.id);
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        self.repo.get_task(id).await
    }

    pub async fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
        self.repo.list_tasks(owner_id).await
    }

    /// Tasks joined with client names. A missing or removed client yields `None`.
    pub async fn list_with_clients(&self, owner_id: &str) -> Result<Vec<TaskListItem>> {
        let tasks = self.repo.list_tasks(owner_id).await?;
        let names: HashMap<String, String> = self
            .repo
            .list_clients(owner_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        Ok(tasks
            .into_iter()
            .map(|task| {
                let client_name = task
                    .client_id
                    .as_ref()
                    .and_then(|id| names.get(id))
                    .cloned();
                TaskListItem { task, client_name }
            })
            .collect())
    }

    pub async fn update_task(&self, id: &str, req: UpdateTaskRequest) -> Result<Task> {
        tracing::debug!("Updating task: {}", id);
        self.repo.update_task(id, req).await
    }

    /// Flip the completed flag
    pub async fn toggle_completed(&self, id: &str) -> Result<Task> {
        let task = self.repo.get_task(id).await?;
        let req = UpdateTaskRequest {
            completed: Some(!task.completed),
            ..Default::default()
        };
        self.repo.update_task(id, req).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting task: {}", id);
        self.repo.delete_task(id).await
    }
}
