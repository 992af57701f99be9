//! Currency service
//!
//! Exchange rates are cached for a freshness window and refreshed from a
//! [`RateSource`]. A failed refresh falls back to the baseline table in
//! `config`, so conversion never fails. All stored amounts are USD; the
//! formatter converts into the user's display currency.
//!
//! The cache is an explicit object: build one per process and hand clones
//! to consumers. Clones share state, and the last refresh to finish wins.

use crate::config::{
    BASE_CURRENCY, CURRENCY_SYMBOLS, DEFAULT_RATE_ENDPOINT, DEFAULT_RATE_TTL_MINUTES,
    FALLBACK_RATES, MISSING_AMOUNT_PLACEHOLDER, RATE_FETCH_TIMEOUT_SECS,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// True for currency codes the dashboard can display
pub fn is_supported_currency(code: &str) -> bool {
    CURRENCY_SYMBOLS.iter().any(|(c, _)| *c == code)
}

/// Display symbol for a currency; unknown codes render with the code itself
pub fn currency_symbol(code: &str) -> String {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, symbol)| symbol.to_string())
        .unwrap_or_else(|| format!("{} ", code))
}

/// Rates relative to USD at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSet {
    pub rates: HashMap<String, f64>,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRateSet {
    pub fn new(mut rates: HashMap<String, f64>, fetched_at: DateTime<Utc>) -> Self {
        rates.insert(BASE_CURRENCY.to_string(), 1.0);
        Self { rates, fetched_at }
    }

    /// Baseline table used when no live rates are available
    pub fn fallback(now: DateTime<Utc>) -> Self {
        let rates = FALLBACK_RATES
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        Self::new(rates, now)
    }

    /// Rate of `code` per USD; the base is always 1
    pub fn rate(&self, code: &str) -> Option<f64> {
        if code == BASE_CURRENCY {
            return Some(1.0);
        }
        self.rates.get(code).copied()
    }

    fn rate_or_identity(&self, code: &str) -> f64 {
        match self.rate(code) {
            Some(rate) if rate.is_finite() && rate > 0.0 => rate,
            _ => {
                tracing::warn!("No usable exchange rate for {}, treating as 1", code);
                1.0
            }
        }
    }

    /// Convert through USD. Converting a currency to itself returns `amount` untouched.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        if from == to {
            return amount;
        }
        amount / self.rate_or_identity(from) * self.rate_or_identity(to)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// Render an amount with a symbol, grouped thousands and at most two decimals
pub fn format_money(amount: Option<f64>, currency: &str) -> String {
    let amount = match amount {
        Some(value) if value.is_finite() => value,
        _ => return MISSING_AMOUNT_PLACEHOLDER.to_string(),
    };

    let cents = (amount.abs() * 100.0).round() as u128;
    let (whole, fraction) = (cents / 100, cents % 100);

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let decimals = match fraction {
        0 => String::new(),
        f if f % 10 == 0 => format!(".{}", f / 10),
        f => format!(".{:02}", f),
    };

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}{}", sign, currency_symbol(currency), grouped, decimals)
}

/// Where fresh rates come from
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Rates per USD keyed by currency code
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>>;
}

#[derive(Deserialize)]
struct RateResponse {
    rates: HashMap<String, f64>,
}

/// JSON rate API returning `{"rates": {...}}` for base USD
pub struct HttpRateSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRateSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ClientDesk-Rates")
            .timeout(std::time::Duration::from_secs(RATE_FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
        tracing::info!("Fetching exchange rates from {}", self.endpoint);

        let response = self.client.get(&self.endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Generic(format!(
                "Rate API returned status: {}",
                status
            )));
        }

        let body: RateResponse = response.json().await?;

        // Only the supported display set is kept
        let rates: HashMap<String, f64> = body
            .rates
            .into_iter()
            .filter(|(code, rate)| is_supported_currency(code) && rate.is_finite() && *rate > 0.0)
            .collect();

        if rates.is_empty() {
            return Err(AppError::Generic(
                "Rate API response contained no usable rates".to_string(),
            ));
        }

        Ok(rates)
    }
}

struct CacheState {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    rates: Option<ExchangeRateSet>,
    display_currency: String,
}

/// Shared exchange-rate cache with a freshness window.
///
/// Source, TTL, cached rates and display currency all live behind one lock,
/// so every clone observes a reconfiguration.
#[derive(Clone)]
pub struct RateCache {
    state: Arc<RwLock<CacheState>>,
}

impl RateCache {
    pub fn new(source: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState {
                source,
                ttl,
                rates: None,
                display_currency: BASE_CURRENCY.to_string(),
            })),
        }
    }

    /// Cache backed by the default HTTP endpoint and TTL
    pub fn with_defaults() -> Result<Self> {
        let source = HttpRateSource::new(DEFAULT_RATE_ENDPOINT)?;
        Ok(Self::new(
            Arc::new(source),
            Duration::minutes(i64::from(DEFAULT_RATE_TTL_MINUTES)),
        ))
    }

    /// Swap the rate source and freshness window. Cached rates are dropped.
    pub async fn reconfigure(&self, source: Arc<dyn RateSource>, ttl: Duration) {
        let mut state = self.state.write().await;
        state.source = source;
        state.ttl = ttl;
        state.rates = None;
        tracing::info!("Exchange rate cache reconfigured (ttl {} min)", ttl.num_minutes());
    }

    pub async fn ttl(&self) -> Duration {
        self.state.read().await.ttl
    }

    /// Current rates: cached while fresh, otherwise refreshed.
    ///
    /// A failed refresh returns the baseline table without caching it, so
    /// the next call tries the source again.
    pub async fn get_rates(&self) -> ExchangeRateSet {
        let now = Utc::now();

        {
            let state = self.state.read().await;
            let ttl = state.ttl;
            if let Some(rates) = state.rates.as_ref().filter(|r| r.is_fresh(now, ttl)) {
                return rates.clone();
            }
        }

        self.refresh().await
    }

    /// Fetch from the source regardless of freshness
    pub async fn refresh(&self) -> ExchangeRateSet {
        let source = Arc::clone(&self.state.read().await.source);

        match source.fetch_rates().await {
            Ok(rates) => {
                let set = ExchangeRateSet::new(rates, Utc::now());
                let mut state = self.state.write().await;
                // A reconfiguration during the fetch wins over its result
                if Arc::ptr_eq(&state.source, &source) {
                    state.rates = Some(set.clone());
                }
                tracing::info!("Exchange rates refreshed ({} currencies)", set.rates.len());
                set
            }
            Err(e) => {
                tracing::warn!("Exchange rate refresh failed, using fallback rates: {}", e);
                ExchangeRateSet::fallback(Utc::now())
            }
        }
    }

    /// Time of the last successful refresh
    pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.rates.as_ref().map(|r| r.fetched_at)
    }

    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        if from == to {
            return amount;
        }
        self.get_rates().await.convert(amount, from, to)
    }

    pub async fn display_currency(&self) -> String {
        self.state.read().await.display_currency.clone()
    }

    pub async fn set_display_currency(&self, code: &str) -> Result<()> {
        let code = code.trim().to_uppercase();
        if !is_supported_currency(&code) {
            return Err(AppError::Validation(format!("Unsupported currency: {}", code)));
        }

        let mut state = self.state.write().await;
        tracing::info!("Display currency changed to {}", code);
        state.display_currency = code;
        Ok(())
    }

    /// Format a USD amount in the display currency; `None` renders as a placeholder
    pub async fn format(&self, amount_usd: Option<f64>) -> String {
        let currency = self.display_currency().await;
        match amount_usd {
            Some(amount) if amount.is_finite() => {
                let converted = self.convert(amount, BASE_CURRENCY, &currency).await;
                format_money(Some(converted), &currency)
            }
            _ => MISSING_AMOUNT_PLACEHOLDER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource {
        rates: HashMap<String, f64>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(pairs: &[(&str, f64)]) -> Arc<Self> {
            Arc::new(Self {
                rates: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RateSource for StaticSource {
        async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rates.clone())
        }
    }

    struct FailingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for FailingSource {
        async fn fetch_rates(&self) -> Result<HashMap<String, f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Generic("offline".to_string()))
        }
    }

    fn usd_eur() -> ExchangeRateSet {
        ExchangeRateSet::new(
            HashMap::from([("EUR".to_string(), 0.9), ("GBP".to_string(), 0.75)]),
            Utc::now(),
        )
    }

    #[test]
    fn test_convert_through_usd() {
        let rates = usd_eur();

        assert_eq!(rates.convert(100.0, "USD", "EUR"), 90.0);
        assert_eq!(rates.convert(90.0, "EUR", "USD"), 100.0);
        assert!((rates.convert(90.0, "EUR", "GBP") - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_same_currency_is_identity() {
        let rates = usd_eur();
        let amount = 0.1 + 0.2;

        assert_eq!(rates.convert(100.0, "EUR", "EUR"), 100.0);
        assert_eq!(rates.convert(amount, "GBP", "GBP"), amount);
    }

    #[test]
    fn test_unknown_currency_converts_at_par() {
        assert_eq!(usd_eur().convert(42.0, "USD", "XYZ"), 42.0);
    }

    #[test]
    fn test_fallback_table_has_base_and_supported_codes() {
        let rates = ExchangeRateSet::fallback(Utc::now());

        assert_eq!(rates.rate("USD"), Some(1.0));
        for (code, _) in CURRENCY_SYMBOLS {
            assert!(rates.rate(code).is_some(), "missing fallback for {}", code);
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(None, "USD"), "—");
        assert_eq!(format_money(Some(f64::NAN), "USD"), "—");
        assert_eq!(format_money(Some(0.0), "USD"), "$0");
        assert_eq!(format_money(Some(1000.0), "USD"), "$1,000");
        assert_eq!(format_money(Some(1234.5), "USD"), "$1,234.5");
        assert_eq!(format_money(Some(1234567.891), "EUR"), "€1,234,567.89");
        assert_eq!(format_money(Some(12.05), "GBP"), "£12.05");
        assert_eq!(format_money(Some(-250.0), "INR"), "-₹250");
    }

    #[tokio::test]
    async fn test_fresh_rates_are_not_refetched() {
        let source = StaticSource::new(&[("EUR", 0.9)]);
        let cache = RateCache::new(source.clone(), Duration::hours(1));

        let first = cache.get_rates().await;
        let second = cache.get_rates().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(cache.last_refreshed_at().await.is_some());
    }

    #[tokio::test]
    async fn test_stale_rates_are_refetched() {
        let source = StaticSource::new(&[("EUR", 0.9)]);
        let cache = RateCache::new(source.clone(), Duration::zero());

        cache.get_rates().await;
        cache.get_rates().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_the_cache() {
        let source = StaticSource::new(&[("EUR", 0.9)]);
        let cache = RateCache::new(source.clone(), Duration::hours(1));
        let other = cache.clone();

        cache.get_rates().await;
        other.get_rates().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconfigure_is_seen_by_clones() {
        let first = StaticSource::new(&[("EUR", 0.9)]);
        let second = StaticSource::new(&[("EUR", 0.5)]);
        let cache = RateCache::new(first.clone(), Duration::hours(1));
        let other = cache.clone();

        assert_eq!(other.convert(100.0, "USD", "EUR").await, 90.0);

        cache.reconfigure(second.clone(), Duration::minutes(5)).await;

        assert_eq!(other.ttl().await, Duration::minutes(5));
        assert_eq!(other.convert(100.0, "USD", "EUR").await, 50.0);
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_uses_fallback_and_retries() {
        let source = Arc::new(FailingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = RateCache::new(source.clone(), Duration::hours(1));

        let rates = cache.get_rates().await;
        assert_eq!(rates, ExchangeRateSet::fallback(rates.fetched_at));
        assert!(cache.last_refreshed_at().await.is_none());

        cache.get_rates().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        assert_eq!(cache.convert(100.0, "EUR", "EUR").await, 100.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let source = HttpRateSource::new("http://127.0.0.1:9/latest/USD").unwrap();
        let cache = RateCache::new(Arc::new(source), Duration::hours(1));

        let rates = cache.get_rates().await;

        assert_eq!(rates.rate("EUR"), Some(0.92));
    }

    #[tokio::test]
    async fn test_format_uses_display_currency() {
        let source = StaticSource::new(&[("EUR", 0.9)]);
        let cache = RateCache::new(source, Duration::hours(1));

        assert_eq!(cache.format(Some(1000.0)).await, "$1,000");
        assert_eq!(cache.format(None).await, "—");

        cache.set_display_currency("eur").await.unwrap();
        assert_eq!(cache.display_currency().await, "EUR");
        assert_eq!(cache.format(Some(1000.0)).await, "€900");

        assert!(matches!(
            cache.set_display_currency("XYZ").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(cache.display_currency().await, "EUR");
    }
}
