//! Services module
//!
//! Business logic services that coordinate between callers and the repository.

pub mod client_view;
pub mod clients;
pub mod csv_import;
pub mod currency;
pub mod dashboard;
pub mod notifications;
pub mod scheduler;
pub mod settings;
pub mod tasks;

pub use client_view::{ClientFilter, ClientPage, ClientSort, SortDirection, SortField, ViewState};
pub use clients::ClientsService;
pub use csv_import::{ImportService, ImportSummary};
pub use currency::{ExchangeRateSet, HttpRateSource, RateCache, RateSource};
pub use dashboard::{DashboardService, DashboardSummary};
pub use notifications::{GenerationReport, NotificationService};
pub use scheduler::SchedulerService;
pub use settings::{AppSettings, SettingsService};
pub use tasks::TasksService;
