//! Wilder smoothed moving average.

use crate::services::signals::Indicator;

/// Smoothed moving average (Wilder's MA).
///
/// Seeds with the simple average of the first `period` closes, then folds each
/// following close in as `(prev * (period - 1) + close) / period`. Reacts slower
/// than an EMA of the same period, which keeps the MA ordering stable.
pub struct SmoothedMa {
    period: usize,
}

impl SmoothedMa {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for SmoothedMa {
    fn period(&self) -> usize {
        self.period
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn series(&self, closes: &[f64]) -> Vec<f64> {
        let period = self.period;
        if period == 0 || closes.len() < period {
            return Vec::new();
        }

        let mut value = closes.iter().take(period).sum::<f64>() / period as f64;
        let mut values = Vec::with_capacity(closes.len() - period + 1);
        values.push(value);

        for close in &closes[period..] {
            value = (value * (period - 1) as f64 + close) / period as f64;
            values.push(value);
        }

        values
    }
}
