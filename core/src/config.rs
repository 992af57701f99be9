//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Client List View =====

/// Page sizes a user may pick for the client table
pub const ALLOWED_PAGE_SIZES: &[usize] = &[10, 25, 50, 100];

/// Page size used until the user picks another one
pub const DEFAULT_PAGE_SIZE: usize = 10;

// ===== Notification Rules =====

/// Maximum candidate notifications persisted per generation pass.
/// Acts as a rate limit on a single scan, not a completeness guarantee.
pub const DEFAULT_NOTIFICATION_CAP: usize = 10;

/// A client without contact for this many days (inclusive) raises `no_contact`
pub const NO_CONTACT_THRESHOLD_DAYS: i64 = 30;

/// Cron expression for the background notification scan (every 15 minutes)
pub const DEFAULT_SCAN_SCHEDULE: &str = "0 */15 * * * *";

// ===== Exchange Rates =====

/// Base (pivot) currency for all stored monetary amounts
pub const BASE_CURRENCY: &str = "USD";

/// Maximum age of a cached rate set before it is refreshed, in minutes
pub const DEFAULT_RATE_TTL_MINUTES: u32 = 60;

/// Lower bound for the configurable rate TTL
pub const MIN_RATE_TTL_MINUTES: u32 = 1;

/// Upper bound for the configurable rate TTL (one day)
pub const MAX_RATE_TTL_MINUTES: u32 = 1_440;

/// USD-based rate endpoint returning `{"rates": {"EUR": 0.92, ...}}`
pub const DEFAULT_RATE_ENDPOINT: &str = "https://open.er-api.com/v6/latest/USD";

/// HTTP timeout for a rate refresh in seconds
pub const RATE_FETCH_TIMEOUT_SECS: u64 = 10;

/// Cron expression for the background rate refresh (top of every hour)
pub const DEFAULT_RATE_REFRESH_SCHEDULE: &str = "0 0 * * * *";

/// Approximate baseline rates relative to USD, used whenever a refresh fails
pub const FALLBACK_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("INR", 83.0),
    ("CAD", 1.36),
    ("AUD", 1.52),
    ("JPY", 149.0),
    ("CNY", 7.24),
    ("CHF", 0.88),
    ("SGD", 1.34),
    ("AED", 3.67),
];

/// Display symbol for every supported currency
pub const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("INR", "₹"),
    ("CAD", "C$"),
    ("AUD", "A$"),
    ("JPY", "¥"),
    ("CNY", "CN¥"),
    ("CHF", "CHF "),
    ("SGD", "S$"),
    ("AED", "AED "),
];

/// Rendered in place of a missing monetary amount
pub const MISSING_AMOUNT_PLACEHOLDER: &str = "—";

/// Rendered for a task whose client link is empty or was removed
pub const NO_CLIENT_LABEL: &str = "No client";
