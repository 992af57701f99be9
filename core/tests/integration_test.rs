//! Integration tests for ClientDesk
//!
//! End-to-end flows over an on-disk SQLite store:
//! - CSV import into the client table view
//! - Notification generation and de-duplication
//! - Dashboard figures and currency formatting

use chrono::{Duration, FixedOffset, TimeZone, Utc};
use clientdesk::database::{create_pool, ClientDraft, NotificationType, Repository};
use clientdesk::services::{
    ClientsService, DashboardService, HttpRateSource, ImportService, NotificationService,
    RateCache, SortField, TasksService, ViewState,
};
use clientdesk::AppState;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a test database with schema
async fn create_test_db() -> (Repository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let pool = create_pool(&db_path).await.unwrap();
    let repo = Repository::new(pool);

    (repo, temp_dir)
}

const CSV: &str = "\
Name,Email,Company,Type,Stage,Deal_Value
\"Smith, Jane\",jane@acme.test,Acme,paying,won,\"1,200\"
,nobody@example.test,Ghost,lead,inquiry,10
Bob,bob@example.test,Builders,lead,proposal,300
";

#[tokio::test]
async fn test_import_then_browse() {
    let (repo, _temp) = create_test_db().await;
    let imports = ImportService::new(repo.clone());

    let summary = imports.import_csv("owner-1", CSV).await.unwrap();
    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);

    let clients = repo.list_clients("owner-1").await.unwrap();
    let mut state = ViewState::default();
    state.sort_by(SortField::Name);

    let page = state.apply(&clients);
    let names: Vec<&str> = page.records.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Bob", "Smith, Jane"]);
    assert_eq!(page.total_pages, 1);

    state.set_search("acme");
    let page = state.apply(&clients);
    assert_eq!(page.total_filtered, 1);
    assert_eq!(page.records[0].deal_value, Some(1200.0));

    let exported = imports.export_csv("owner-1").await.unwrap();
    assert!(exported.starts_with("name,email"));
    assert!(exported.contains("\"Smith, Jane\""));
}

#[tokio::test]
async fn test_notifications_are_created_once_per_day() {
    let (repo, _temp) = create_test_db().await;
    let clients = ClientsService::new(repo.clone());
    let tasks = TasksService::new(repo.clone());
    let notifications = NotificationService::new(repo.clone());

    let zone = FixedOffset::east_opt(0).unwrap();
    let now = zone.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();

    let client = clients
        .create_client("owner-1", &ClientDraft::new("Acme"))
        .await
        .unwrap();
    clients
        .log_contact_at(&client.id, now.with_timezone(&Utc) - Duration::days(1))
        .await
        .unwrap();
    tasks
        .create_task(
            "owner-1",
            "Call back".to_string(),
            Some(Utc.with_ymd_and_hms(2026, 5, 10, 23, 59, 0).unwrap()),
            Some(client.id.clone()),
        )
        .await
        .unwrap();

    let first = notifications
        .generate_and_store("owner-1", &now)
        .await
        .unwrap();
    assert_eq!(first.candidates, 1);
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.created[0].notification_type, NotificationType::TaskDue);

    let later = now + Duration::hours(3);
    let second = notifications
        .generate_and_store("owner-1", &later)
        .await
        .unwrap();
    assert_eq!(second.candidates, 1);
    assert!(second.created.is_empty());

    assert_eq!(notifications.unread_count("owner-1").await.unwrap(), 1);
    assert_eq!(notifications.mark_all_read("owner-1").await.unwrap(), 1);
    assert_eq!(notifications.unread_count("owner-1").await.unwrap(), 0);

    let linked = notifications
        .list_for_client("owner-1", &client.id)
        .await
        .unwrap();
    assert_eq!(linked.len(), 1);
}

#[tokio::test]
async fn test_dashboard_with_offline_rates() {
    let (repo, _temp) = create_test_db().await;
    let imports = ImportService::new(repo.clone());
    let dashboard = DashboardService::new(repo.clone());

    imports.import_csv("owner-1", CSV).await.unwrap();
    let summary = dashboard.summary_at("owner-1", &Utc::now()).await.unwrap();

    assert_eq!(summary.total_clients, 2);
    assert_eq!(summary.paying_clients, 1);
    assert_eq!(summary.won_value, 1200.0);
    assert_eq!(summary.open_pipeline_value, 300.0);

    let source = HttpRateSource::new("http://127.0.0.1:9/latest/USD").unwrap();
    let rates = RateCache::new(Arc::new(source), Duration::hours(1));
    rates.set_display_currency("EUR").await.unwrap();

    assert_eq!(rates.format(Some(summary.won_value)).await, "€1,104");
    assert_eq!(rates.format(None).await, "—");
}

#[tokio::test]
async fn test_app_state_account_deletion() {
    let temp_dir = TempDir::new().unwrap();
    let state = AppState::initialize(temp_dir.path().to_path_buf())
        .await
        .unwrap();

    state.imports.import_csv("owner-1", CSV).await.unwrap();
    state.imports.import_csv("owner-2", CSV).await.unwrap();
    state.notifications.scan("owner-1").await.unwrap();

    state.clients.delete_account("owner-1").await.unwrap();

    assert!(state.clients.list_clients("owner-1").await.unwrap().is_empty());
    assert!(state.notifications.list("owner-1").await.unwrap().is_empty());
    assert_eq!(state.clients.list_clients("owner-2").await.unwrap().len(), 2);
}
