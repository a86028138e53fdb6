//! Trend signal module.
//!
//! Provides the indicator calculations, the trend classifier, the backward
//! sideway-anchor scan and the notify/suppress rules built on top of them.

pub mod anchor;
pub mod classifier;
pub mod decision;
pub mod indicators;

pub use anchor::SidewayAnchorLocator;
pub use classifier::TrendClassifier;
pub use decision::{
    decide, should_append_system_entry, should_notify, Decision, NotifyReason, SuppressReason,
};

use std::collections::BTreeMap;

use crate::config::IndicatorConfig;
use indicators::{Rsi, SmoothedMa};

/// Trait for implementing technical indicators over close prices.
pub trait Indicator: Send + Sync {
    /// Lookback period.
    fn period(&self) -> usize;

    /// Minimum number of closes required to produce one value.
    fn min_periods(&self) -> usize;

    /// Full output series, oldest first. Empty if there is not enough data.
    fn series(&self, closes: &[f64]) -> Vec<f64>;
}

/// Indicator output for one close-price window. Derived and discarded after use.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub close_prices: Vec<f64>,
    /// Period -> smoothed MA series, iterated shortest period first.
    pub ma_series: BTreeMap<usize, Vec<f64>>,
    pub rsi_series: Vec<f64>,
}

impl IndicatorSnapshot {
    /// Last value of every MA series, shortest period first.
    /// `None` if any period lacked data.
    pub fn last_ma(&self) -> Option<Vec<f64>> {
        self.ma_series
            .values()
            .map(|series| series.last().copied())
            .collect()
    }

    pub fn last_rsi(&self) -> Option<f64> {
        self.rsi_series.last().copied()
    }
}

/// Computes the configured moving averages and RSI from close prices.
pub struct IndicatorEngine {
    averages: Vec<SmoothedMa>,
    rsi: Rsi,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            averages: config.ma_periods.iter().map(|p| SmoothedMa::new(*p)).collect(),
            rsi: Rsi::new(config.rsi_period),
        }
    }

    /// Fewest closes for which every indicator yields a value.
    pub fn min_periods(&self) -> usize {
        self.averages
            .iter()
            .map(|ma| ma.min_periods())
            .chain(std::iter::once(self.rsi.min_periods()))
            .max()
            .unwrap_or(0)
    }

    pub fn snapshot(&self, closes: &[f64]) -> IndicatorSnapshot {
        IndicatorSnapshot {
            close_prices: closes.to_vec(),
            ma_series: self
                .averages
                .iter()
                .map(|ma| (ma.period(), ma.series(closes)))
                .collect(),
            rsi_series: self.rsi.series(closes),
        }
    }
}
