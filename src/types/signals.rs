use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way market direction used for every trend label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketTrend {
    Bullish,
    Bearish,
    Sideway,
}

impl MarketTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketTrend::Bullish => "Bullish",
            MarketTrend::Bearish => "Bearish",
            MarketTrend::Sideway => "Sideway",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bullish" => Some(MarketTrend::Bullish),
            "bearish" => Some(MarketTrend::Bearish),
            "sideway" | "sideways" => Some(MarketTrend::Sideway),
            _ => None,
        }
    }
}

impl fmt::Display for MarketTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which price of the latest candle is compared against the shortest MA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceReference {
    #[default]
    Close,
    Open,
}

impl PriceReference {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "close" => Some(PriceReference::Close),
            "open" => Some(PriceReference::Open),
            _ => None,
        }
    }
}

/// Composite trend together with the two sub-trends it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub trend: MarketTrend,
    pub ma_trend: MarketTrend,
    pub rsi_trend: MarketTrend,
}

/// Most recent point at which the MA-trend was sideways.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidewayAnchor {
    pub close: f64,
    pub close_time: i64,
}

/// Outcome of classifying one candle window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendVerdict {
    pub trend: MarketTrend,
    pub ma_trend: MarketTrend,
    pub rsi_trend: MarketTrend,
    pub last_close_price: f64,
    pub last_close_time: i64,
    #[serde(rename = "lastRSI")]
    pub last_rsi: f64,
    /// One value per configured period, shortest period first.
    #[serde(rename = "lastMA")]
    pub last_ma: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sideway: Option<SidewayAnchor>,
}

impl TrendVerdict {
    /// Value of the shortest-period moving average.
    pub fn short_ma(&self) -> Option<f64> {
        self.last_ma.first().copied()
    }

    /// This verdict's own close as an anchor point.
    pub fn as_anchor(&self) -> SidewayAnchor {
        SidewayAnchor {
            close: self.last_close_price,
            close_time: self.last_close_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_trend_parse() {
        assert_eq!(MarketTrend::from_str("Bullish"), Some(MarketTrend::Bullish));
        assert_eq!(MarketTrend::from_str("bearish"), Some(MarketTrend::Bearish));
        assert_eq!(MarketTrend::from_str("SIDEWAY"), Some(MarketTrend::Sideway));
        assert_eq!(MarketTrend::from_str("up"), None);
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let verdict = TrendVerdict {
            trend: MarketTrend::Bullish,
            ma_trend: MarketTrend::Bullish,
            rsi_trend: MarketTrend::Bullish,
            last_close_price: 103.0,
            last_close_time: 1_700_000_000_000,
            last_rsi: 61.5,
            last_ma: vec![100.0, 101.0, 102.0],
            last_sideway: None,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["trend"], "Bullish");
        assert_eq!(json["lastClosePrice"], 103.0);
        assert_eq!(json["lastRSI"], 61.5);
        assert_eq!(json["lastMA"][0], 100.0);
        assert!(json.get("lastSideway").is_none());

        let parsed: TrendVerdict = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, verdict);
    }

    #[test]
    fn test_short_ma_is_first_period() {
        let verdict = TrendVerdict {
            trend: MarketTrend::Sideway,
            ma_trend: MarketTrend::Sideway,
            rsi_trend: MarketTrend::Sideway,
            last_close_price: 1.0,
            last_close_time: 0,
            last_rsi: 50.0,
            last_ma: vec![3.0, 2.0, 1.0],
            last_sideway: None,
        };
        assert_eq!(verdict.short_ma(), Some(3.0));
        assert_eq!(verdict.as_anchor().close, 1.0);
    }
}
