//! Clients service
//!
//! Client lifecycle: create, edit, pipeline moves, contact logging and
//! deletion. Listing for the table goes through `client_view`.

use crate::database::{
    ClientDraft, ClientRecord, ClientType, PipelineStage, Repository, UpdateClientRequest,
};
use crate::error::Result;
use crate::services::client_view::{pipeline_board, ClientFilter};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One kanban column with owned records
#[derive(Debug, Clone, Serialize)]
pub struct PipelineColumn {
    pub stage: PipelineStage,
    pub clients: Vec<ClientRecord>,
}

/// Service for managing clients
#[derive(Clone)]
pub struct ClientsService {
    repo: Repository,
}

impl ClientsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a new client
    pub async fn create_client(&self, owner_id: &str, draft: &ClientDraft) -> Result<ClientRecord> {
        tracing::info!("Creating client: {}", draft.name);

        let client = self.repo.create_client(owner_id, draft).await?;

        tracing::info!("Client created successfully: {}", client.id);
        Ok(client)
    }

    pub async fn get_client(&self, id: &str) -> Result<ClientRecord> {
        self.repo.get_client(id).await
    }

    /// All clients of an owner, newest first
    pub async fn list_clients(&self, owner_id: &str) -> Result<Vec<ClientRecord>> {
        self.repo.list_clients(owner_id).await
    }

    pub async fn update_client(&self, id: &str, req: UpdateClientRequest) -> Result<ClientRecord> {
        tracing::debug!("Updating client: {}", id);
        self.repo.update_client(id, req).await
    }

    /// Move a client on the pipeline board. Winning a deal makes the client paying.
    pub async fn move_to_stage(&self, id: &str, stage: PipelineStage) -> Result<ClientRecord> {
        let mut req = UpdateClientRequest {
            pipeline_stage: Some(stage),
            ..Default::default()
        };
        if stage == PipelineStage::Won {
            req.client_type = Some(ClientType::Paying);
        }

        let client = self.repo.update_client(id, req).await?;
        tracing::info!("Client {} moved to {}", id, stage);
        Ok(client)
    }

    /// Record a contact with the client at `at`
    pub async fn log_contact_at(&self, id: &str, at: DateTime<Utc>) -> Result<ClientRecord> {
        let req = UpdateClientRequest {
            last_contact: Some(Some(at)),
            ..Default::default()
        };
        self.repo.update_client(id, req).await
    }

    pub async fn log_contact(&self, id: &str) -> Result<ClientRecord> {
        self.log_contact_at(id, Utc::now()).await
    }

    pub async fn delete_client(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting client: {}", id);

        self.repo.delete_client(id).await?;

        tracing::info!("Client deleted successfully: {}", id);
        Ok(())
    }

    /// Search across name, email, phone, company and website
    pub async fn search_clients(&self, owner_id: &str, query: &str) -> Result<Vec<ClientRecord>> {
        let filter = ClientFilter {
            search: query.to_string(),
            ..Default::default()
        };

        let all = self.list_clients(owner_id).await?;
        Ok(all.into_iter().filter(|c| filter.matches(c)).collect())
    }

    /// Kanban columns in stage order; data-type clients are left off the board
    pub async fn pipeline(&self, owner_id: &str) -> Result<Vec<PipelineColumn>> {
        let all = self.list_clients(owner_id).await?;

        Ok(pipeline_board(&all)
            .into_iter()
            .map(|(stage, clients)| PipelineColumn {
                stage,
                clients: clients.into_iter().cloned().collect(),
            })
            .collect())
    }

    /// Remove every client, task and notification belonging to an owner
    pub async fn delete_account(&self, owner_id: &str) -> Result<()> {
        tracing::info!("Deleting all data for owner: {}", owner_id);
        self.repo.delete_owner_data(owner_id).await
    }
}
