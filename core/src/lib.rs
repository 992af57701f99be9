//! ClientDesk core library
//!
//! Data-processing core of a small-business client dashboard: CSV import,
//! client list views, notification rules, dashboard metrics and currency
//! conversion over a SQLite store.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod services;

pub use app::AppState;
pub use error::{AppError, Result};
