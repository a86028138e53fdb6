//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trendwatch::config::Config;
use trendwatch::error::{AppError, Result};
use trendwatch::services::{MemorySignalLog, MemoryUserDirectory, Notifier, TrendMonitor};
use trendwatch::sources::CandleSource;
use trendwatch::types::{Candle, Interval, MarketTrend, PriceReference, TrendVerdict, UserProfile};

pub const FAILING_SYMBOL: &str = "FAILUSDT";
pub const SHORT_SYMBOL: &str = "SHORTUSDT";

/// Index of the last flat candle in [`breakdown_closes`].
pub const ANCHOR_INDEX: usize = 29;

const FIFTEEN_MINUTES: i64 = 900_000;

pub fn candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let open_time = 1_700_000_000_000 + i as i64 * FIFTEEN_MINUTES;
            Candle {
                open_time,
                close_time: open_time + FIFTEEN_MINUTES - 1,
                open: *close,
                high: *close + 0.5,
                low: *close - 0.5,
                close: *close,
                volume: 1_000.0,
            }
        })
        .collect()
}

/// 30 flat closes at 100, a steady climb to 140, then one drop to 125.
///
/// With MA periods 5/10/20 the last window is Bearish on every count and the
/// last sideways window ends at [`ANCHOR_INDEX`].
pub fn breakdown_closes() -> Vec<f64> {
    let mut closes = vec![100.0; 30];
    closes.extend((1..=40).map(|i| 100.0 + i as f64));
    closes.push(125.0);
    closes
}

pub fn flat_closes(len: usize) -> Vec<f64> {
    vec![100.0; len]
}

/// In-memory candle feed. Unknown symbols get the default series.
pub struct FixtureSource {
    default: Mutex<Vec<Candle>>,
    by_symbol: Mutex<HashMap<String, Vec<Candle>>>,
}

impl FixtureSource {
    pub fn new(default: Vec<Candle>) -> Self {
        let mut by_symbol = HashMap::new();
        by_symbol.insert(SHORT_SYMBOL.to_string(), candles(&[1.0, 2.0, 3.0]));
        Self {
            default: Mutex::new(default),
            by_symbol: Mutex::new(by_symbol),
        }
    }

    pub fn set(&self, symbol: &str, series: Vec<Candle>) {
        self.by_symbol.lock().unwrap().insert(symbol.to_string(), series);
    }

    pub fn set_default(&self, series: Vec<Candle>) {
        *self.default.lock().unwrap() = series;
    }
}

#[async_trait]
impl CandleSource for FixtureSource {
    async fn fetch_candles(&self, symbol: &str, _interval: Interval, count: usize) -> Result<Vec<Candle>> {
        if symbol.eq_ignore_ascii_case(FAILING_SYMBOL) {
            return Err(AppError::DataSource("exchange unreachable".to_string()));
        }

        let series = match self.by_symbol.lock().unwrap().get(&symbol.to_uppercase()) {
            Some(series) => series.clone(),
            None => self.default.lock().unwrap().clone(),
        };
        let start = series.len().saturating_sub(count);
        Ok(series[start..].to_vec())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub user: Option<String>,
    pub symbol: String,
    pub interval: Interval,
    pub trend: MarketTrend,
}

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    /// Users whose deliveries fail.
    pub failing_users: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn market_messages(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user.is_none())
            .cloned()
            .collect()
    }

    pub fn messages_for(&self, user: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user.as_deref() == Some(user))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn on_verdict(&self, symbol: &str, interval: Interval, verdict: &TrendVerdict) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            user: None,
            symbol: symbol.to_string(),
            interval,
            trend: verdict.trend,
        });
        Ok(())
    }

    async fn on_user_notification(
        &self,
        user: &UserProfile,
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
    ) -> Result<()> {
        if self.failing_users.lock().unwrap().contains(&user.id.0) {
            return Err(AppError::Notify("chat blocked".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            user: Some(user.id.0.clone()),
            symbol: symbol.to_string(),
            interval,
            trend: verdict.trend,
        });
        Ok(())
    }
}

pub fn test_config(symbols: &[&str]) -> Config {
    let mut config = Config::default();
    config.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.intervals = vec![Interval::FifteenMinutes];
    config.indicators.ma_periods = vec![5, 10, 20];
    config.indicators.rsi_period = 14;
    config.indicators.price_reference = PriceReference::Close;
    config.fetch_price_limit = 100;
    config
}

pub struct Harness {
    pub config: Config,
    pub source: Arc<FixtureSource>,
    pub history: Arc<MemorySignalLog>,
    pub users: Arc<MemoryUserDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub monitor: Arc<TrendMonitor>,
}

impl Harness {
    pub fn new(symbols: &[&str], default: Vec<Candle>) -> Self {
        let config = test_config(symbols);
        let source = Arc::new(FixtureSource::new(default));
        let history = Arc::new(MemorySignalLog::new());
        let users = Arc::new(MemoryUserDirectory::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Arc::new(TrendMonitor::new(
            &config,
            source.clone(),
            history.clone(),
            users.clone(),
            notifier.clone(),
        ));

        Self {
            config,
            source,
            history,
            users,
            notifier,
            monitor,
        }
    }
}
