pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Candle, Interval};

/// Supplier of candle history.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `count` of the most recent candles, oldest first.
    async fn fetch_candles(&self, symbol: &str, interval: Interval, count: usize) -> Result<Vec<Candle>>;
}
