//! Backward scan for the most recent sideways market.

use crate::config::IndicatorConfig;
use crate::services::signals::TrendClassifier;
use crate::types::{Candle, MarketTrend, TrendVerdict};

/// Finds the last window whose MA-trend was Sideway.
///
/// Each step drops the newest candle and reclassifies what is left, so the
/// worst case is quadratic in the window length. Windows are bounded by the
/// configured fetch depth and the scan runs once per evaluation.
pub struct SidewayAnchorLocator {
    classifier: TrendClassifier,
}

impl SidewayAnchorLocator {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            classifier: TrendClassifier::new(config),
        }
    }

    /// Verdict of the newest sideways window ending at or before the last
    /// candle. `verdict` must be the classification of the full `candles`.
    pub fn locate(&self, candles: &[Candle], verdict: &TrendVerdict) -> Option<TrendVerdict> {
        if verdict.ma_trend == MarketTrend::Sideway {
            return Some(verdict.clone());
        }

        let min = self.classifier.min_candles().max(1);
        for end in (min..candles.len()).rev() {
            match self.classifier.classify(&candles[..end]) {
                Ok(shorter) if shorter.ma_trend == MarketTrend::Sideway => return Some(shorter),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }

        None
    }

    /// Classify the whole window, then [`locate`](Self::locate).
    pub fn find_anchor(&self, candles: &[Candle]) -> Option<TrendVerdict> {
        let verdict = self.classifier.classify(candles).ok()?;
        self.locate(candles, &verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceReference;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                open_time: i as i64 * 60_000,
                close_time: i as i64 * 60_000 + 59_999,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1.0,
            })
            .collect()
    }

    fn config() -> IndicatorConfig {
        IndicatorConfig {
            ma_periods: vec![5, 10, 20],
            rsi_period: 14,
            price_reference: PriceReference::Close,
        }
    }

    fn rising_after_flat() -> Vec<Candle> {
        let mut closes = vec![100.0; 30];
        closes.extend((1..=40).map(|i| 100.0 + i as f64));
        closes.push(125.0);
        candles(&closes)
    }

    #[test]
    fn test_sideway_verdict_is_its_own_anchor() {
        let window = candles(&[100.0; 40]);
        let locator = SidewayAnchorLocator::new(&config());
        let verdict = TrendClassifier::new(&config()).classify(&window).unwrap();
        assert_eq!(verdict.ma_trend, MarketTrend::Sideway);

        let anchor = locator.locate(&window, &verdict).unwrap();
        assert_eq!(anchor, verdict);
        assert_eq!(anchor.last_close_time, window[39].close_time);
    }

    #[test]
    fn test_scan_finds_last_flat_window() {
        let window = rising_after_flat();
        let locator = SidewayAnchorLocator::new(&config());
        let verdict = TrendClassifier::new(&config()).classify(&window).unwrap();
        assert_eq!(verdict.ma_trend, MarketTrend::Bearish);

        let anchor = locator.locate(&window, &verdict).unwrap();
        assert_eq!(anchor.ma_trend, MarketTrend::Sideway);
        assert_eq!(anchor.last_close_price, 100.0);
        assert_eq!(anchor.last_close_time, window[29].close_time);
        assert_eq!(locator.find_anchor(&window), Some(anchor));
    }

    #[test]
    fn test_strict_trend_without_sideway_has_no_anchor() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let window = candles(&closes);
        let locator = SidewayAnchorLocator::new(&config());
        let verdict = TrendClassifier::new(&config()).classify(&window).unwrap();
        assert_ne!(verdict.ma_trend, MarketTrend::Sideway);
        assert_eq!(locator.locate(&window, &verdict), None);
    }

    #[test]
    fn test_window_shorter_than_shortest_period_has_no_anchor() {
        let window = candles(&[1.0, 2.0, 3.0, 4.0]);
        let locator = SidewayAnchorLocator::new(&config());
        assert_eq!(locator.find_anchor(&window), None);

        let trending = TrendVerdict {
            trend: MarketTrend::Bullish,
            ma_trend: MarketTrend::Bullish,
            rsi_trend: MarketTrend::Bullish,
            last_close_price: 4.0,
            last_close_time: window[3].close_time,
            last_rsi: 100.0,
            last_ma: vec![3.0, 2.0, 1.0],
            last_sideway: None,
        };
        assert_eq!(locator.locate(&window, &trending), None);
    }
}
