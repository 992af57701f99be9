//! Database models
//!
//! Rust structs representing database entities.
//! All models use serde for serialization to a UI host.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Implements `as_str`, `Display` and a case-insensitive `FromStr` over the
/// stored labels of a closed enum.
macro_rules! labelled_enum {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("Unknown {} value: {}", stringify!($ty), s))
            }
        }
    };
}

/// Commercial relationship with a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum ClientType {
    #[default]
    Lead,
    Data,
    Paying,
}

labelled_enum!(ClientType { Lead => "Lead", Data => "Data", Paying => "Paying" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

labelled_enum!(ClientStatus { Active => "Active", Inactive => "Inactive" });

/// Position in the sales funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum PipelineStage {
    #[default]
    Inquiry,
    Contacted,
    Proposal,
    Won,
    Lost,
}

labelled_enum!(PipelineStage {
    Inquiry => "Inquiry",
    Contacted => "Contacted",
    Proposal => "Proposal",
    Won => "Won",
    Lost => "Lost",
});

impl PipelineStage {
    /// Won and Lost end the sales workflow; follow-ups stop mattering.
    pub fn is_closed(&self) -> bool {
        matches!(self, PipelineStage::Won | PipelineStage::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Paid,
    Overdue,
}

labelled_enum!(InvoiceStatus { Unpaid => "Unpaid", Paid => "Paid", Overdue => "Overdue" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
pub enum BillingType {
    #[default]
    #[serde(rename = "One-time")]
    #[sqlx(rename = "One-time")]
    OneTime,
    Recurring,
}

labelled_enum!(BillingType { OneTime => "One-time", Recurring => "Recurring" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum BillingFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

labelled_enum!(BillingFrequency {
    Weekly => "Weekly",
    Monthly => "Monthly",
    Quarterly => "Quarterly",
    Yearly => "Yearly",
});

/// Kind of alert produced by the notification rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationType {
    TaskDue,
    TaskOverdue,
    FollowUpDue,
    InvoiceOverdue,
    NoContact,
}

labelled_enum!(NotificationType {
    TaskDue => "task_due",
    TaskOverdue => "task_overdue",
    FollowUpDue => "follow_up_due",
    InvoiceOverdue => "invoice_overdue",
    NoContact => "no_contact",
});

/// A business contact, lead or customer
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub client_type: ClientType,
    pub status: ClientStatus,
    pub pipeline_stage: PipelineStage,
    pub deal_value: Option<f64>,
    pub next_follow_up: Option<DateTime<Utc>>,
    /// Billing fields only carry meaning for `ClientType::Paying`
    pub invoice_status: InvoiceStatus,
    pub invoice_due_date: Option<NaiveDate>,
    pub billing_type: BillingType,
    pub billing_frequency: Option<BillingFrequency>,
    pub recurring_amount: Option<f64>,
    pub next_billing_date: Option<NaiveDate>,
    pub services: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub last_contact: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create client request, also produced by the CSV importer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub client_type: ClientType,
    pub status: ClientStatus,
    pub pipeline_stage: PipelineStage,
    pub deal_value: Option<f64>,
    pub next_follow_up: Option<DateTime<Utc>>,
    pub invoice_status: InvoiceStatus,
    pub invoice_due_date: Option<NaiveDate>,
    pub billing_type: BillingType,
    pub billing_frequency: Option<BillingFrequency>,
    pub recurring_amount: Option<f64>,
    pub next_billing_date: Option<NaiveDate>,
    pub services: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

impl ClientDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Reads a present field as `Some(value)`, so an explicit `null` becomes
/// `Some(None)`. Absent fields fall back to `None` via `#[serde(default)]`.
fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial client update.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub company: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub website: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    pub client_type: Option<ClientType>,
    pub status: Option<ClientStatus>,
    pub pipeline_stage: Option<PipelineStage>,
    #[serde(deserialize_with = "nullable")]
    pub deal_value: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub next_follow_up: Option<Option<DateTime<Utc>>>,
    pub invoice_status: Option<InvoiceStatus>,
    #[serde(deserialize_with = "nullable")]
    pub invoice_due_date: Option<Option<NaiveDate>>,
    pub billing_type: Option<BillingType>,
    #[serde(deserialize_with = "nullable")]
    pub billing_frequency: Option<Option<BillingFrequency>>,
    #[serde(deserialize_with = "nullable")]
    pub recurring_amount: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable")]
    pub next_billing_date: Option<Option<NaiveDate>>,
    #[serde(deserialize_with = "nullable")]
    pub services: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub source: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub last_contact: Option<Option<DateTime<Utc>>>,
}

impl UpdateClientRequest {
    /// Apply the set fields onto an existing record
    pub fn apply_to(self, client: &mut ClientRecord) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut client.name, self.name);
        set(&mut client.email, self.email);
        set(&mut client.phone, self.phone);
        set(&mut client.company, self.company);
        set(&mut client.website, self.website);
        set(&mut client.address, self.address);
        set(&mut client.client_type, self.client_type);
        set(&mut client.status, self.status);
        set(&mut client.pipeline_stage, self.pipeline_stage);
        set(&mut client.deal_value, self.deal_value);
        set(&mut client.next_follow_up, self.next_follow_up);
        set(&mut client.invoice_status, self.invoice_status);
        set(&mut client.invoice_due_date, self.invoice_due_date);
        set(&mut client.billing_type, self.billing_type);
        set(&mut client.billing_frequency, self.billing_frequency);
        set(&mut client.recurring_amount, self.recurring_amount);
        set(&mut client.next_billing_date, self.next_billing_date);
        set(&mut client.services, self.services);
        set(&mut client.source, self.source);
        set(&mut client.notes, self.notes);
        set(&mut client.last_contact, self.last_contact);
    }
}

/// A to-do item, optionally linked to a client
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub completed: bool,
    /// Set to NULL when the linked client is deleted
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create task request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub client_id: Option<String>,
}

/// Update task request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub due_at: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "nullable")]
    pub client_id: Option<Option<String>>,
    pub completed: Option<bool>,
}

/// A persisted alert
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: String,
    pub owner_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub read: bool,
    pub client_id: Option<String>,
    pub task_id: Option<String>,
    /// Natural key (type, entity, day) the store keeps unique per owner
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Candidate notification produced by the rule engine, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub client_id: Option<String>,
    pub task_id: Option<String>,
    pub dedupe_key: String,
}
