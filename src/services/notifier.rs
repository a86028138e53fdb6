//! Delivery of verdicts to people.
//!
//! The monitor only produces structured verdicts; implementations of
//! [`Notifier`] turn them into text and push them to a transport.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::error::{body_excerpt, AppError, Result};
use crate::types::{Interval, TrendVerdict, UserProfile};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Market-level trend change.
    async fn on_verdict(&self, symbol: &str, interval: Interval, verdict: &TrendVerdict) -> Result<()>;

    /// Verdict addressed to a single user.
    async fn on_user_notification(
        &self,
        user: &UserProfile,
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
    ) -> Result<()>;
}

/// Plain-text message for a verdict. `periods` labels the MA values.
pub fn render_verdict(symbol: &str, interval: Interval, verdict: &TrendVerdict, periods: &[usize]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{} {}", symbol.to_uppercase(), interval);
    let _ = writeln!(
        text,
        "Trend: {} (MA {}, RSI {})",
        verdict.trend, verdict.ma_trend, verdict.rsi_trend
    );
    let _ = writeln!(text, "Close: {}", verdict.last_close_price);
    let _ = writeln!(text, "RSI: {:.2}", verdict.last_rsi);

    for (period, value) in periods.iter().zip(&verdict.last_ma) {
        let _ = writeln!(text, "MA{}: {:.4}", period, value);
    }

    if let Some(anchor) = verdict.last_sideway {
        let since = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(anchor.close_time)
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| anchor.close_time.to_string());
        let _ = writeln!(text, "Since: {} at {}", since, anchor.close);
    }

    text.trim_end().to_string()
}

/// Sends messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    admin_chat_id: Option<i64>,
    enabled: bool,
    periods: Vec<usize>,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, config: &TelegramConfig, periods: Vec<usize>) -> Self {
        let client = Client::builder()
            .user_agent("trendwatch/0.1")
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: TELEGRAM_API_URL.to_string(),
            bot_token,
            admin_chat_id: config.admin_chat_id,
            enabled: config.notification_enabled,
            periods,
        }
    }

    /// Point the client at another Bot API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        if !self.enabled {
            debug!("Notification is disabled. Skip sending message to {}", chat_id);
            return Ok(());
        }

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| AppError::Notify(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(
                "Telegram API returned {}: {}",
                status,
                body_excerpt(&body, 200)
            );
            return Err(AppError::Notify(format!("Telegram API error: {}", status)));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn on_verdict(&self, symbol: &str, interval: Interval, verdict: &TrendVerdict) -> Result<()> {
        match self.admin_chat_id {
            Some(chat_id) => {
                let text = render_verdict(symbol, interval, verdict, &self.periods);
                self.send(chat_id, &text).await
            }
            None => {
                debug!("No admin chat configured, {} {} change not sent", symbol, interval);
                Ok(())
            }
        }
    }

    async fn on_user_notification(
        &self,
        user: &UserProfile,
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
    ) -> Result<()> {
        let text = render_verdict(symbol, interval, verdict, &self.periods);
        self.send(user.chat_id, &text).await
    }
}

/// Writes every message to the log instead of a chat.
pub struct LogNotifier {
    periods: Vec<usize>,
}

impl LogNotifier {
    pub fn new(periods: Vec<usize>) -> Self {
        Self { periods }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_verdict(&self, symbol: &str, interval: Interval, verdict: &TrendVerdict) -> Result<()> {
        info!("{}", render_verdict(symbol, interval, verdict, &self.periods));
        Ok(())
    }

    async fn on_user_notification(
        &self,
        user: &UserProfile,
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
    ) -> Result<()> {
        info!(
            user = %user.id,
            "{}",
            render_verdict(symbol, interval, verdict, &self.periods)
        );
        Ok(())
    }
}
