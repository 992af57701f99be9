//! Client list view engine
//!
//! Filtering, sorting and pagination over an in-memory client collection,
//! plus the view state transitions a list screen drives it with. [`view`] is
//! a total function: any filter, sort or page request produces a page.

use crate::config::{ALLOWED_PAGE_SIZES, DEFAULT_PAGE_SIZE};
use crate::database::{ClientRecord, ClientStatus, ClientType, PipelineStage};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which clients are visible
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientFilter {
    /// Case-insensitive substring over name, email, phone, company and website
    pub search: String,
    /// `None` shows every status
    pub status: Option<ClientStatus>,
    /// `None` shows every client type
    pub client_type: Option<ClientType>,
}

impl ClientFilter {
    /// All three predicates must hold
    pub fn matches(&self, client: &ClientRecord) -> bool {
        self.matches_search(client)
            && self.status.map_or(true, |status| client.status == status)
            && self.client_type.map_or(true, |ty| client.client_type == ty)
    }

    fn matches_search(&self, client: &ClientRecord) -> bool {
        let term = self.search.to_lowercase();
        if term.is_empty() {
            return true;
        }

        std::iter::once(Some(client.name.as_str()))
            .chain([
                client.email.as_deref(),
                client.phone.as_deref(),
                client.company.as_deref(),
                client.website.as_deref(),
            ])
            .flatten()
            .any(|value| value.to_lowercase().contains(&term))
    }
}

/// Sortable client columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Email,
    Company,
    Status,
    ClientType,
    CreatedAt,
}

/// Comparable key extracted from one client for one [`SortField`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Text(String),
    Time(DateTime<Utc>),
}

impl SortField {
    /// Text columns compare lowercased with a missing value as ""
    pub fn key(&self, client: &ClientRecord) -> SortKey {
        fn text(value: Option<&str>) -> SortKey {
            SortKey::Text(value.unwrap_or_default().to_lowercase())
        }

        match self {
            SortField::Name => text(Some(&client.name)),
            SortField::Email => text(client.email.as_deref()),
            SortField::Company => text(client.company.as_deref()),
            SortField::Status => text(Some(client.status.as_str())),
            SortField::ClientType => text(Some(client.client_type.as_str())),
            SortField::CreatedAt => SortKey::Time(client.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for ClientSort {
    /// Newest clients first
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl ClientSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn compare(&self, a: &ClientRecord, b: &ClientRecord) -> Ordering {
        let ordering = self.field.key(a).cmp(&self.field.key(b));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Requested page; `page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One display-ready page
#[derive(Debug, Clone, Serialize)]
pub struct ClientPage<'a> {
    pub records: Vec<&'a ClientRecord>,
    pub total_filtered: usize,
    /// `ceil(total_filtered / page_size)`; zero when nothing matches
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Filter, sort and slice a client collection.
///
/// The sort is stable, so clients with equal keys keep their input order.
/// A page past the end yields no rows; clamping is left to the caller.
pub fn view<'a>(
    records: &'a [ClientRecord],
    filter: &ClientFilter,
    sort: &ClientSort,
    page: &PageRequest,
) -> ClientPage<'a> {
    let mut visible: Vec<&ClientRecord> = records.iter().filter(|c| filter.matches(c)).collect();
    visible.sort_by(|a, b| sort.compare(a, b));

    let page_size = page.page_size.max(1);
    let total_filtered = visible.len();
    let total_pages = total_filtered.div_ceil(page_size);

    let start = page.page.saturating_sub(1).saturating_mul(page_size);
    let records = visible.into_iter().skip(start).take(page_size).collect();

    ClientPage {
        records,
        total_filtered,
        total_pages,
        page: page.page,
        page_size,
    }
}

/// Kanban columns: every pipeline stage in funnel order with its clients.
///
/// Data-type clients have no pipeline and are left off the board.
pub fn pipeline_board(records: &[ClientRecord]) -> Vec<(PipelineStage, Vec<&ClientRecord>)> {
    PipelineStage::ALL
        .iter()
        .map(|stage| {
            let column = records
                .iter()
                .filter(|c| c.client_type != ClientType::Data && c.pipeline_stage == *stage)
                .collect();
            (*stage, column)
        })
        .collect()
}

/// User-driven list state.
///
/// Filter, search and page-size changes return to page 1. Picking the
/// current sort field flips direction; picking a new one sorts ascending
/// from page 1. Navigation clamps into `1..=total_pages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub filter: ClientFilter,
    pub sort: ClientSort,
    pub page: PageRequest,
}

impl ViewState {
    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let mut state = Self::default();
        state.set_page_size(page_size)?;
        Ok(state)
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
        self.page.page = 1;
    }

    pub fn set_status_filter(&mut self, status: Option<ClientStatus>) {
        self.filter.status = status;
        self.page.page = 1;
    }

    pub fn set_type_filter(&mut self, client_type: Option<ClientType>) {
        self.filter.client_type = client_type;
        self.page.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if !ALLOWED_PAGE_SIZES.contains(&page_size) {
            return Err(AppError::Validation(format!(
                "Page size must be one of {:?}, got {}",
                ALLOWED_PAGE_SIZES, page_size
            )));
        }
        self.page.page_size = page_size;
        self.page.page = 1;
        Ok(())
    }

    pub fn sort_by(&mut self, field: SortField) {
        if self.sort.field == field {
            self.sort.direction = self.sort.direction.flipped();
        } else {
            self.sort = ClientSort::new(field, SortDirection::Asc);
            self.page.page = 1;
        }
    }

    pub fn go_to_page(&mut self, page: usize, total_pages: usize) {
        self.page.page = page.min(total_pages).max(1);
    }

    pub fn next_page(&mut self, total_pages: usize) {
        self.go_to_page(self.page.page + 1, total_pages);
    }

    pub fn prev_page(&mut self) {
        self.page.page = self.page.page.saturating_sub(1).max(1);
    }

    pub fn apply<'a>(&self, records: &'a [ClientRecord]) -> ClientPage<'a> {
        view(records, &self.filter, &self.sort, &self.page)
    }
}
