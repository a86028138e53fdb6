//! Moving-average / RSI trend classifier.

use crate::config::IndicatorConfig;
use crate::error::{AppError, Result};
use crate::services::signals::IndicatorEngine;
use crate::types::{close_prices, Candle, MarketTrend, PriceReference, Trend, TrendVerdict};

/// Turns a candle window into a [`TrendVerdict`].
pub struct TrendClassifier {
    engine: IndicatorEngine,
    price_reference: PriceReference,
    min_candles: usize,
}

impl TrendClassifier {
    pub fn new(config: &IndicatorConfig) -> Self {
        let engine = IndicatorEngine::new(config);
        let min_candles = engine.min_periods();
        Self {
            engine,
            price_reference: config.price_reference,
            min_candles,
        }
    }

    /// Fewest candles a window needs to be classified.
    pub fn min_candles(&self) -> usize {
        self.min_candles
    }

    /// Classify the window. `last_sideway` is left empty.
    pub fn classify(&self, candles: &[Candle]) -> Result<TrendVerdict> {
        let insufficient = || AppError::InsufficientData {
            required: self.min_candles,
            available: candles.len(),
        };

        if candles.is_empty() || candles.len() < self.min_candles {
            return Err(insufficient());
        }

        let snapshot = self.engine.snapshot(&close_prices(candles));
        let last_ma = snapshot.last_ma().ok_or_else(insufficient)?;
        let last_rsi = snapshot.last_rsi().ok_or_else(insufficient)?;
        let last = candles.last().ok_or_else(insufficient)?;

        let last_trade_price = match self.price_reference {
            PriceReference::Close => last.close,
            PriceReference::Open => last.open,
        };

        let trend = market_trend(&last_ma, last_rsi, last_trade_price);

        Ok(TrendVerdict {
            trend: trend.trend,
            ma_trend: trend.ma_trend,
            rsi_trend: trend.rsi_trend,
            last_close_price: last.close,
            last_close_time: last.close_time,
            last_rsi,
            last_ma,
            last_sideway: None,
        })
    }
}

/// Ordering agreement of the latest MA values, shortest period first.
///
/// Each strictly lower successor adds one, each strictly higher one subtracts
/// one and ties add nothing. Only when every step moves the same way is the
/// result directional: all increasing is Bullish, all decreasing is Bearish.
pub fn ma_trend(last_ma: &[f64]) -> MarketTrend {
    if last_ma.len() < 2 {
        return MarketTrend::Sideway;
    }

    let score: i64 = last_ma
        .windows(2)
        .map(|pair| {
            if pair[1] < pair[0] {
                1
            } else if pair[1] > pair[0] {
                -1
            } else {
                0
            }
        })
        .sum();

    let steps = (last_ma.len() - 1) as i64;
    if score.abs() != steps {
        MarketTrend::Sideway
    } else if score < 0 {
        MarketTrend::Bullish
    } else {
        MarketTrend::Bearish
    }
}

pub fn rsi_trend(last_rsi: f64) -> MarketTrend {
    if last_rsi > 50.0 {
        MarketTrend::Bullish
    } else if last_rsi < 50.0 {
        MarketTrend::Bearish
    } else {
        MarketTrend::Sideway
    }
}

/// Composite trend: both sub-trends must agree and price must sit on the
/// matching side of the shortest MA, otherwise the market is Sideway.
pub fn market_trend(last_ma: &[f64], last_rsi: f64, last_trade_price: f64) -> Trend {
    let ma_trend = ma_trend(last_ma);
    let rsi_trend = rsi_trend(last_rsi);

    let trend = match (ma_trend, rsi_trend, last_ma.first()) {
        (MarketTrend::Bearish, MarketTrend::Bearish, Some(short)) if last_trade_price < *short => {
            MarketTrend::Bearish
        }
        (MarketTrend::Bullish, MarketTrend::Bullish, Some(short)) if last_trade_price > *short => {
            MarketTrend::Bullish
        }
        _ => MarketTrend::Sideway,
    };

    Trend {
        trend,
        ma_trend,
        rsi_trend,
    }
}
