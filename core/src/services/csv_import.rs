//! CSV import and export
//!
//! Bulk import turns raw CSV text into client drafts and hands them to the
//! record store in a single bulk create. The parser is permissive: it never
//! fails on malformed quoting, it degrades to best-effort tokenization.
//!
//! Export produces the logical header/row projection of a client list and
//! renders it as CSV that the importer reads back.

use crate::database::{
    ClientDraft, ClientRecord, ClientStatus, ClientType, InvoiceStatus, PipelineStage, Repository,
};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

/// One data row keyed by lowercased, trimmed header name
pub type CsvRow = HashMap<String, String>;

/// Column order used by [`export_rows`]; every name is a header the importer recognises
pub const EXPORT_HEADERS: &[&str] = &[
    "name",
    "email",
    "phone",
    "company",
    "website",
    "address",
    "source",
    "notes",
    "status",
    "client_type",
    "pipeline_stage",
    "next_follow_up",
    "deal_value",
    "invoice_status",
    "invoice_due_date",
];

/// Parse CSV text into header-keyed rows.
///
/// Blank lines are discarded. Input with fewer than two remaining lines
/// (header plus one data row) yields no rows. Cells missing at the end of a
/// row read as empty strings.
pub fn parse_csv(text: &str) -> Vec<CsvRow> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Vec::new();
    }

    let headers: Vec<String> = split_line(lines[0])
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    lines[1..]
        .iter()
        .map(|line| {
            let mut values = split_line(line).into_iter();
            headers
                .iter()
                .map(|header| (header.clone(), values.next().unwrap_or_default()))
                .collect()
        })
        .collect()
}

/// Split one line into trimmed fields.
///
/// A quote toggles quoting; inside quotes `""` is a literal quote and commas
/// do not separate fields. An unterminated quote runs to the end of the line.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// First non-empty value among header aliases
fn field<'a>(row: &'a CsvRow, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn text(row: &CsvRow, aliases: &[&str]) -> Option<String> {
    field(row, aliases).map(str::to_string)
}

/// Parse a labelled enum, falling back to its default for missing or unknown values
fn labelled<T: FromStr + Default>(row: &CsvRow, aliases: &[&str]) -> T {
    field(row, aliases)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

/// Parse a money cell such as `$1,200.50`; negative or unreadable values are dropped
fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
}

/// Parse a timestamp cell. Values without an offset are read as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_date(value).and_then(|date| date.and_hms_opt(0, 0, 0)))
        .map(|naive| naive.and_utc())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Project a parsed row into a client draft.
///
/// Returns `None` when the row has no name.
pub fn draft_from_row(row: &CsvRow) -> Option<ClientDraft> {
    let name = field(row, &["name"])?.to_string();

    Some(ClientDraft {
        name,
        email: text(row, &["email"]),
        phone: text(row, &["phone"]),
        company: text(row, &["company"]),
        website: text(row, &["website"]),
        address: text(row, &["address"]),
        source: text(row, &["source"]),
        notes: text(row, &["notes"]),
        status: labelled::<ClientStatus>(row, &["status"]),
        client_type: labelled::<ClientType>(row, &["client_type", "type"]),
        pipeline_stage: labelled::<PipelineStage>(row, &["pipeline_stage", "stage"]),
        invoice_status: labelled::<InvoiceStatus>(row, &["invoice_status"]),
        next_follow_up: field(row, &["next_follow_up"]).and_then(parse_timestamp),
        deal_value: field(row, &["deal_value"]).and_then(parse_amount),
        invoice_due_date: field(row, &["invoice_due_date"]).and_then(parse_date),
        ..ClientDraft::default()
    })
}

/// Parse CSV text straight into drafts, dropping nameless rows
pub fn drafts_from_csv(text: &str) -> Vec<ClientDraft> {
    parse_csv(text).iter().filter_map(draft_from_row).collect()
}

/// Project clients into the export header plus one row per client
pub fn export_rows(clients: &[ClientRecord]) -> Vec<Vec<String>> {
    // The importer reads one record per line, so line breaks inside a cell become spaces
    fn single_line(text: &str) -> String {
        text.replace("\r\n", " ").replace(['\r', '\n'], " ")
    }

    fn opt(value: &Option<String>) -> String {
        value.as_deref().map(single_line).unwrap_or_default()
    }

    let mut rows = Vec::with_capacity(clients.len() + 1);
    rows.push(EXPORT_HEADERS.iter().map(|h| h.to_string()).collect());

    for client in clients {
        rows.push(vec![
            single_line(&client.name),
            opt(&client.email),
            opt(&client.phone),
            opt(&client.company),
            opt(&client.website),
            opt(&client.address),
            opt(&client.source),
            opt(&client.notes),
            client.status.to_string(),
            client.client_type.to_string(),
            client.pipeline_stage.to_string(),
            client
                .next_follow_up
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
            client
                .deal_value
                .map(|value| value.to_string())
                .unwrap_or_default(),
            client.invoice_status.to_string(),
            client
                .invoice_due_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ]);
    }

    rows
}

/// Render rows as CSV, quoting cells that contain separators or quotes
pub fn to_csv(rows: &[Vec<String>]) -> String {
    fn escape(cell: &str) -> String {
        if cell.contains([',', '"', '\n', '\r']) {
            format!("\"{}\"", cell.replace('"', "\"\""))
        } else {
            cell.to_string()
        }
    }

    rows.iter()
        .map(|row| row.iter().map(|cell| escape(cell)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Data rows found in the file
    pub rows_read: usize,
    /// Clients created
    pub imported: usize,
    /// Rows dropped for having no name
    pub skipped: usize,
}

/// Service for importing clients from CSV
#[derive(Clone)]
pub struct ImportService {
    repo: Repository,
}

impl ImportService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Import a CSV file for an owner.
    ///
    /// Surviving drafts go to the store as one bulk create; its failure is
    /// returned as a single error with nothing retried.
    pub async fn import_csv(&self, owner_id: &str, text: &str) -> Result<ImportSummary> {
        let rows = parse_csv(text);
        let drafts: Vec<ClientDraft> = rows.iter().filter_map(draft_from_row).collect();

        let summary = ImportSummary {
            rows_read: rows.len(),
            imported: drafts.len(),
            skipped: rows.len() - drafts.len(),
        };

        if drafts.is_empty() {
            tracing::info!("CSV import for {} found no importable rows", owner_id);
            return Ok(summary);
        }

        self.repo.bulk_create_clients(owner_id, &drafts).await?;

        tracing::info!(
            "Imported {} clients for {} ({} rows skipped)",
            summary.imported,
            owner_id,
            summary.skipped
        );
        Ok(summary)
    }

    /// Export an owner's clients as CSV text
    pub async fn export_csv(&self, owner_id: &str) -> Result<String> {
        let clients = self.repo.list_clients(owner_id).await?;
        Ok(to_csv(&export_rows(&clients)))
    }
}
