use crate::error::{body_excerpt, AppError, Result};
use crate::sources::CandleSource;
use crate::types::{Candle, Interval};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const BINANCE_API_URL: &str = "https://api.binance.com/api/v3";

/// Largest page the klines endpoint serves.
pub const MAX_KLINES_LIMIT: usize = 1000;

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("trendwatch/0.1")
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.unwrap_or_else(|| BINANCE_API_URL.to_string()),
            api_key,
        }
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(&self, symbol: &str, interval: Interval, count: usize) -> Result<Vec<Candle>> {
        let limit = count.clamp(1, MAX_KLINES_LIMIT);
        let url = format!("{}/klines", self.base_url);

        let mut request = self.client.get(&url).query(&[
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.as_str().to_string()),
            ("limit", limit.to_string()),
        ]);
        if let Some(ref key) = self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::DataSource(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {}: {}",
                status,
                body_excerpt(&text, 200)
            );
            return Err(AppError::DataSource(format!("Binance API error: {}", status)));
        }

        let rows: Vec<Vec<Value>> = response
            .json()
            .await
            .map_err(|e| AppError::DataSource(e.to_string()))?;

        let mut candles = rows
            .iter()
            .map(|row| parse_kline(row))
            .collect::<Result<Vec<_>>>()?;
        candles.sort_by_key(|c| c.close_time);

        debug!("Binance klines {} {}: {} candles", symbol, interval, candles.len());
        Ok(candles)
    }
}

fn number(value: Option<&Value>, field: &str) -> Result<f64> {
    match value {
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| AppError::DataSource(format!("kline {} is not a number: {}", field, s))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AppError::DataSource(format!("kline {} out of range", field))),
        _ => Err(AppError::DataSource(format!("kline {} missing", field))),
    }
}

fn timestamp(value: Option<&Value>, field: &str) -> Result<i64> {
    value
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::DataSource(format!("kline {} missing", field)))
}

/// One kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline(row: &[Value]) -> Result<Candle> {
    Ok(Candle {
        open_time: timestamp(row.first(), "open time")?,
        open: number(row.get(1), "open")?,
        high: number(row.get(2), "high")?,
        low: number(row.get(3), "low")?,
        close: number(row.get(4), "close")?,
        volume: number(row.get(5), "volume")?,
        close_time: timestamp(row.get(6), "close time")?,
    })
}
