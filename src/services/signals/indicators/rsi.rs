//! Relative Strength Index (RSI) indicator.

use crate::services::signals::Indicator;

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses,
/// using Wilder smoothing for both averages. Values range from 0-100; the trend
/// classifier only cares which side of 50 the latest value falls on.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn period(&self) -> usize {
        self.period
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn series(&self, closes: &[f64]) -> Vec<f64> {
        let period = self.period;
        if period == 0 || closes.len() < period + 1 {
            return Vec::new();
        }

        let mut gains = Vec::with_capacity(closes.len() - 1);
        let mut losses = Vec::with_capacity(closes.len() - 1);

        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains.push(change);
                losses.push(0.0);
            } else {
                gains.push(0.0);
                losses.push(-change);
            }
        }

        // Initial averages
        let mut avg_gain: f64 = gains.iter().take(period).sum::<f64>() / period as f64;
        let mut avg_loss: f64 = losses.iter().take(period).sum::<f64>() / period as f64;

        let mut values = Vec::with_capacity(gains.len() - period + 1);
        values.push(Self::rsi_value(avg_gain, avg_loss));

        // Smoothed averages for remaining data
        for i in period..gains.len() {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
            values.push(Self::rsi_value(avg_gain, avg_loss));
        }

        values
    }
}
