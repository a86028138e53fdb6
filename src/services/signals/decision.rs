//! Notify / suppress rules for fresh verdicts.

use serde::Serialize;

use crate::types::{MarketTrend, SignalLogEntry, TrendVerdict};

/// Why a verdict should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    /// Nothing was recorded before.
    FirstObservation,
    /// The moving-average structure changed.
    MaTrendChanged,
    /// Price climbed back to the short MA after a bearish entry.
    ShortMaReclaimed,
    /// Price fell back to the short MA after a bullish entry.
    ShortMaLost,
}

/// Why a verdict should be held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    Unchanged,
    NotConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Notify(NotifyReason),
    Suppress(SuppressReason),
}

impl Decision {
    pub fn is_notify(&self) -> bool {
        matches!(self, Decision::Notify(_))
    }
}

/// Compare a fresh verdict with the latest recorded entry. Rules apply in
/// order and the first match wins.
pub fn decide(new: &TrendVerdict, old: Option<&SignalLogEntry>) -> Decision {
    let Some(old) = old else {
        return Decision::Notify(NotifyReason::FirstObservation);
    };

    if new.trend == old.trend {
        return Decision::Suppress(SuppressReason::Unchanged);
    }

    if new.ma_trend != old.ma_trend {
        return Decision::Notify(NotifyReason::MaTrendChanged);
    }

    if let Some(short) = new.short_ma() {
        match old.trend {
            MarketTrend::Bearish if new.last_close_price >= short => {
                return Decision::Notify(NotifyReason::ShortMaReclaimed);
            }
            MarketTrend::Bullish if new.last_close_price <= short => {
                return Decision::Notify(NotifyReason::ShortMaLost);
            }
            _ => {}
        }
    }

    Decision::Suppress(SuppressReason::NotConfirmed)
}

pub fn should_notify(new: &TrendVerdict, old: Option<&SignalLogEntry>) -> bool {
    decide(new, old).is_notify()
}

/// A system entry is written when there is none yet or the trend moved.
pub fn should_append_system_entry(new: &TrendVerdict, latest: Option<&SignalLogEntry>) -> bool {
    latest.map_or(true, |entry| entry.trend != new.trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interval, TriggerSource};
    use MarketTrend::{Bearish, Bullish, Sideway};

    fn verdict(trend: MarketTrend, ma_trend: MarketTrend, close: f64, short_ma: f64) -> TrendVerdict {
        TrendVerdict {
            trend,
            ma_trend,
            rsi_trend: trend,
            last_close_price: close,
            last_close_time: 1_000,
            last_rsi: 50.0,
            last_ma: vec![short_ma, short_ma + 1.0, short_ma + 2.0],
            last_sideway: None,
        }
    }

    fn entry(trend: MarketTrend, ma_trend: MarketTrend) -> SignalLogEntry {
        SignalLogEntry::system(
            "BTCUSDT",
            Interval::FifteenMinutes,
            &verdict(trend, ma_trend, 100.0, 100.0),
            TriggerSource::ScheduleJob,
        )
    }

    #[test]
    fn test_first_observation_always_notifies() {
        for trend in [Bullish, Bearish, Sideway] {
            let new = verdict(trend, trend, 1.0, 1.0);
            assert_eq!(decide(&new, None), Decision::Notify(NotifyReason::FirstObservation));
            assert!(should_notify(&new, None));
        }
    }

    #[test]
    fn test_identical_trend_is_suppressed() {
        let new = verdict(Bearish, Bearish, 99.0, 100.0);
        let old = entry(Bearish, Bearish);
        assert_eq!(decide(&new, Some(&old)), Decision::Suppress(SuppressReason::Unchanged));
        assert!(!should_notify(&new, Some(&old)));
    }

    #[test]
    fn test_same_trend_wins_over_ma_change() {
        let new = verdict(Sideway, Bullish, 101.0, 100.0);
        let old = entry(Sideway, Bearish);
        assert!(!should_notify(&new, Some(&old)));
    }

    #[test]
    fn test_ma_trend_change_notifies() {
        let new = verdict(Sideway, Bullish, 101.0, 100.0);
        let old = entry(Bearish, Bearish);
        assert_eq!(decide(&new, Some(&old)), Decision::Notify(NotifyReason::MaTrendChanged));
    }

    #[test]
    fn test_reclaimed_short_ma_after_bearish() {
        let old = entry(Bearish, Bearish);
        let at = verdict(Sideway, Bearish, 100.0, 100.0);
        let above = verdict(Sideway, Bearish, 100.5, 100.0);
        assert_eq!(decide(&at, Some(&old)), Decision::Notify(NotifyReason::ShortMaReclaimed));
        assert_eq!(decide(&above, Some(&old)), Decision::Notify(NotifyReason::ShortMaReclaimed));
    }

    #[test]
    fn test_still_below_short_ma_after_bearish() {
        let old = entry(Bearish, Bearish);
        let new = verdict(Sideway, Bearish, 99.0, 100.0);
        assert_eq!(decide(&new, Some(&old)), Decision::Suppress(SuppressReason::NotConfirmed));
    }

    #[test]
    fn test_lost_short_ma_after_bullish() {
        let old = entry(Bullish, Bullish);
        let below = verdict(Sideway, Bullish, 99.0, 100.0);
        let above = verdict(Sideway, Bullish, 101.0, 100.0);
        assert_eq!(decide(&below, Some(&old)), Decision::Notify(NotifyReason::ShortMaLost));
        assert_eq!(decide(&above, Some(&old)), Decision::Suppress(SuppressReason::NotConfirmed));
    }

    #[test]
    fn test_sideway_old_without_ma_change_is_not_confirmed() {
        let old = entry(Sideway, Bearish);
        let new = verdict(Bearish, Bearish, 90.0, 100.0);
        assert_eq!(decide(&new, Some(&old)), Decision::Suppress(SuppressReason::NotConfirmed));
    }

    #[test]
    fn test_system_entry_policy() {
        let new = verdict(Bullish, Bullish, 101.0, 100.0);
        assert!(should_append_system_entry(&new, None));
        assert!(should_append_system_entry(&new, Some(&entry(Sideway, Bullish))));
        assert!(!should_append_system_entry(&new, Some(&entry(Bullish, Sideway))));
    }

    #[test]
    fn test_decision_serializes_with_reason() {
        let json = serde_json::to_value(Decision::Notify(NotifyReason::ShortMaLost)).unwrap();
        assert_eq!(json["decision"], "notify");
        assert_eq!(json["reason"], "short_ma_lost");
    }
}
