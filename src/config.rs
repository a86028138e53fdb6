use std::env;

use crate::error::{AppError, Result};
use crate::services::signals::IndicatorEngine;
use crate::types::{Interval, PriceReference};

/// Default moving-average periods, shortest first.
pub const DEFAULT_MA_PERIODS: [usize; 3] = [21, 50, 200];

/// Indicator settings shared by the classifier and the anchor locator.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    /// Moving-average periods, strictly ascending.
    pub ma_periods: Vec<usize>,
    /// RSI lookback.
    pub rsi_period: usize,
    /// Price compared against the shortest MA when promoting a trend.
    pub price_reference: PriceReference,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_periods: DEFAULT_MA_PERIODS.to_vec(),
            rsi_period: 14,
            price_reference: PriceReference::Close,
        }
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    /// Bot token; delivery falls back to the log when absent.
    pub bot_token: Option<String>,
    /// Chat receiving market-level trend changes.
    pub admin_chat_id: Option<i64>,
    /// Master switch for outgoing messages.
    pub notification_enabled: bool,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Binance API key (optional, klines are public).
    pub binance_api_key: Option<String>,
    /// Telegram delivery.
    pub telegram: TelegramConfig,
    /// Symbols evaluated every tick.
    pub symbols: Vec<String>,
    /// Intervals evaluated every tick.
    pub intervals: Vec<Interval>,
    /// Indicator settings.
    pub indicators: IndicatorConfig,
    /// Candles fetched per evaluation.
    pub fetch_price_limit: usize,
    /// Seconds between evaluation cycles.
    pub tick_interval_secs: u64,
    /// Lifetime of a pending selection session.
    pub session_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "trendwatch.db".to_string(),
            binance_api_url: "https://api.binance.com/api/v3".to_string(),
            binance_api_key: None,
            telegram: TelegramConfig::default(),
            symbols: vec!["SOLUSDT".to_string()],
            intervals: vec![Interval::FifteenMinutes],
            indicators: IndicatorConfig::default(),
            fetch_price_limit: 500,
            tick_interval_secs: 60,
            session_ttl_secs: 300,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let symbols = env::var("SYMBOLS")
            .ok()
            .map(|s| parse_symbols(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.symbols);

        let intervals = env::var("INTERVALS")
            .ok()
            .map(|s| parse_intervals(&s))
            .filter(|i| !i.is_empty())
            .unwrap_or(defaults.intervals);

        let ma_periods = env::var("MA_PERIODS")
            .ok()
            .map(|s| parse_periods(&s))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.indicators.ma_periods);

        let indicators = IndicatorConfig {
            ma_periods,
            rsi_period: env::var("RSI_PERIOD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.indicators.rsi_period),
            price_reference: env::var("PRICE_REFERENCE")
                .ok()
                .and_then(|v| PriceReference::from_str(&v))
                .unwrap_or_default(),
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            binance_api_url: env::var("BINANCE_API_URL").unwrap_or(defaults.binance_api_url),
            binance_api_key: env::var("BINANCE_API_KEY").ok().filter(|k| !k.is_empty()),
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.is_empty()),
                admin_chat_id: env::var("TELEGRAM_CHAT_ID")
                    .ok()
                    .and_then(|v| v.parse().ok()),
                notification_enabled: env::var("NOTIFICATION_ENABLED")
                    .map(|v| v == "true")
                    .unwrap_or(false),
            },
            symbols,
            intervals,
            indicators,
            fetch_price_limit: env::var("FETCH_PRICE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_price_limit),
            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.tick_interval_secs),
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.session_ttl_secs),
        }
    }

    /// Reject settings the evaluation pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(AppError::Config("no symbols configured".into()));
        }
        if self.intervals.is_empty() {
            return Err(AppError::Config("no intervals configured".into()));
        }

        let periods = &self.indicators.ma_periods;
        if periods.is_empty() {
            return Err(AppError::Config("no moving-average periods configured".into()));
        }
        if periods.iter().any(|p| *p == 0) || self.indicators.rsi_period == 0 {
            return Err(AppError::Config("indicator periods must be positive".into()));
        }
        if periods.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::Config(format!(
                "moving-average periods must be strictly ascending, got {:?}",
                periods
            )));
        }

        let required = IndicatorEngine::new(&self.indicators).min_periods();
        if self.fetch_price_limit < required {
            return Err(AppError::Config(format!(
                "FETCH_PRICE_LIMIT {} is below the {} candles the indicators need",
                self.fetch_price_limit, required
            )));
        }

        Ok(())
    }
}

/// Parse "BTCUSDT, solusdt" into upper-case symbols.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse "15m,1h"; unknown intervals are skipped.
pub fn parse_intervals(raw: &str) -> Vec<Interval> {
    raw.split(',')
        .filter_map(|s| Interval::from_str(s.trim()))
        .collect()
}

/// Parse "21,50,200"; the result keeps the given order so validation can reject bad input.
pub fn parse_periods(raw: &str) -> Vec<usize> {
    raw.split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}
