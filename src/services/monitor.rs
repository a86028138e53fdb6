//! Trend Monitor Service
//!
//! Runs evaluation cycles over every configured symbol and interval, keeps
//! the system-wide signal history current and fans verdicts out to the
//! users following each market.

use futures_util::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::notifier::Notifier;
use crate::services::signal_log::SignalHistoryStore;
use crate::services::signals::{
    decide, should_append_system_entry, Decision, SidewayAnchorLocator, TrendClassifier,
};
use crate::services::users::UserDirectory;
use crate::sources::CandleSource;
use crate::types::{
    Interval, MarketTrend, SidewayAnchor, SignalLogEntry, TrendVerdict, TriggerSource, UserProfile,
    UserRef,
};

/// What the monitor evaluates and how often.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub symbols: Vec<String>,
    pub intervals: Vec<Interval>,
    /// Candles fetched per evaluation.
    pub history_depth: usize,
    pub tick_interval: Duration,
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            symbols: config.symbols.clone(),
            intervals: config.intervals.clone(),
            history_depth: config.fetch_price_limit,
            tick_interval: Duration::from_secs(config.tick_interval_secs.max(1)),
        }
    }
}

/// Outcome of one (symbol, interval) evaluation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub symbol: String,
    pub interval: Interval,
    pub verdict: TrendVerdict,
    pub system_entry_written: bool,
    pub notified_users: Vec<UserRef>,
}

/// Evaluation loop and notification fan-out.
pub struct TrendMonitor {
    source: Arc<dyn CandleSource>,
    history: Arc<dyn SignalHistoryStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    classifier: TrendClassifier,
    locator: SidewayAnchorLocator,
    settings: MonitorSettings,
    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
    running: AtomicBool,
}

impl TrendMonitor {
    pub fn new(
        config: &Config,
        source: Arc<dyn CandleSource>,
        history: Arc<dyn SignalHistoryStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            source,
            history,
            users,
            notifier,
            classifier: TrendClassifier::new(&config.indicators),
            locator: SidewayAnchorLocator::new(&config.indicators),
            settings: MonitorSettings::from(config),
            shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Every configured (symbol, interval) pair.
    fn units(&self) -> Vec<(String, Interval)> {
        self.settings
            .symbols
            .iter()
            .flat_map(|symbol| {
                self.settings
                    .intervals
                    .iter()
                    .map(move |interval| (symbol.to_uppercase(), *interval))
            })
            .collect()
    }

    /// Fetch candles and classify them. Non-sideways verdicts carry the last
    /// sideways anchor, from the candles or else from the history.
    pub async fn evaluate(&self, symbol: &str, interval: Interval) -> Result<TrendVerdict> {
        let candles = self
            .source
            .fetch_candles(symbol, interval, self.settings.history_depth)
            .await?;
        let mut verdict = self.classifier.classify(&candles)?;

        if verdict.trend != MarketTrend::Sideway {
            verdict.last_sideway = match self.locator.locate(&candles, &verdict) {
                Some(anchor) => Some(anchor.as_anchor()),
                None => self.recorded_sideway(symbol, interval),
            };
        }

        debug!(
            "{} {}: trend={} ma={} rsi={} close={}",
            symbol, interval, verdict.trend, verdict.ma_trend, verdict.rsi_trend, verdict.last_close_price
        );
        Ok(verdict)
    }

    fn recorded_sideway(&self, symbol: &str, interval: Interval) -> Option<SidewayAnchor> {
        match self.history.find_latest_sideway_system_entry(symbol, interval) {
            Ok(entry) => entry.map(|e| SidewayAnchor {
                close: e.last_close_price,
                close_time: e.last_close_at,
            }),
            Err(e) => {
                warn!("Sideway lookup failed for {} {}: {}", symbol, interval, e);
                None
            }
        }
    }

    /// Evaluate one market, update the system history and notify followers.
    pub async fn process(&self, symbol: &str, interval: Interval) -> Result<CycleReport> {
        let verdict = self.evaluate(symbol, interval).await?;

        let latest = match self.history.find_latest_system_entry(symbol, interval) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("System entry lookup failed for {} {}: {}", symbol, interval, e);
                None
            }
        };

        let mut system_entry_written = false;
        if should_append_system_entry(&verdict, latest.as_ref()) {
            let entry = SignalLogEntry::system(symbol, interval, &verdict, TriggerSource::ScheduleJob);
            match self.history.append(&entry) {
                Ok(()) => {
                    system_entry_written = true;
                    info!("{} {} trend is now {}", entry.symbol, interval, verdict.trend);
                    if let Err(e) = self.notifier.on_verdict(symbol, interval, &verdict).await {
                        warn!("Market notification failed for {} {}: {}", symbol, interval, e);
                    }
                }
                Err(e) => error!("Failed to record {} {} system entry: {}", symbol, interval, e),
            }
        }

        let followers = match self.users.list_subscribed_users(symbol, interval) {
            Ok(users) => users,
            Err(e) => {
                error!("Could not list followers of {} {}: {}", symbol, interval, e);
                Vec::new()
            }
        };

        let outcomes = join_all(
            followers
                .iter()
                .map(|user| self.notify_user(user, symbol, interval, &verdict)),
        )
        .await;

        let notified_users = followers
            .iter()
            .zip(outcomes)
            .filter_map(|(user, outcome)| match outcome {
                Ok(true) => Some(user.id.clone()),
                Ok(false) => None,
                Err(e) => {
                    error!("Notifying {} about {} {} failed: {}", user.id, symbol, interval, e);
                    None
                }
            })
            .collect();

        Ok(CycleReport {
            symbol: symbol.to_uppercase(),
            interval,
            verdict,
            system_entry_written,
            notified_users,
        })
    }

    /// Run the decision for one user. Returns whether a message went out.
    pub async fn notify_user(
        &self,
        user: &UserProfile,
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
    ) -> Result<bool> {
        let previous = match self.history.find_latest_user_entry(&user.id, symbol, interval) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("History lookup for {} failed, treating as first observation: {}", user.id, e);
                None
            }
        };

        let reason = match decide(verdict, previous.as_ref()) {
            Decision::Notify(reason) => reason,
            Decision::Suppress(reason) => {
                debug!("{} {} suppressed for {}: {:?}", symbol, interval, user.id, reason);
                return Ok(false);
            }
        };

        self.notifier
            .on_user_notification(user, symbol, interval, verdict)
            .await?;
        debug!("{} {} sent to {}: {:?}", symbol, interval, user.id, reason);

        let entry = SignalLogEntry::delivered_to(user.id.clone(), symbol, interval, verdict);
        if let Err(e) = self.history.append(&entry) {
            error!("Sent {} {} to {} but could not record it: {}", symbol, interval, user.id, e);
        }

        Ok(true)
    }

    async fn seed_baseline(&self, symbol: &str, interval: Interval) -> Result<bool> {
        let candles = self
            .source
            .fetch_candles(symbol, interval, self.settings.history_depth)
            .await?;

        let Some(anchor) = self.locator.find_anchor(&candles) else {
            debug!("No sideway anchor for {} {}", symbol, interval);
            return Ok(false);
        };

        let entry = SignalLogEntry::system(symbol, interval, &anchor, TriggerSource::AppStart);
        self.history.append_if_absent(&entry, &entry.key())
    }

    /// Write one start-up baseline per market unless an identical one exists.
    /// Returns the number of entries written.
    pub async fn seed_baselines(&self) -> usize {
        let units = self.units();
        let outcomes = join_all(
            units
                .iter()
                .map(|(symbol, interval)| self.seed_baseline(symbol, *interval)),
        )
        .await;

        let mut written = 0;
        for ((symbol, interval), outcome) in units.iter().zip(outcomes) {
            match outcome {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => error!("Baseline for {} {} failed: {}", symbol, interval, e),
            }
        }

        info!("Seeded {} baseline entries", written);
        written
    }

    /// One evaluation cycle over every market. Failed markets are logged and
    /// left out of the result.
    pub async fn tick(&self) -> Vec<CycleReport> {
        let units = self.units();
        let outcomes = join_all(
            units
                .iter()
                .map(|(symbol, interval)| self.process(symbol, *interval)),
        )
        .await;

        units
            .iter()
            .zip(outcomes)
            .filter_map(|((symbol, interval), outcome)| match outcome {
                Ok(report) => Some(report),
                Err(e @ AppError::InsufficientData { .. }) => {
                    warn!("Skipping {} {}: {}", symbol, interval, e);
                    None
                }
                Err(e) => {
                    error!("Evaluation of {} {} failed: {}", symbol, interval, e);
                    None
                }
            })
            .collect()
    }

    /// Seed baselines, then tick until [`stop`](Self::stop) is called.
    pub async fn run(&self) {
        // Subscribed before the flag flips, so any stop() that sees us running is heard.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(
            "Trend monitor started: {} symbols x {} intervals every {}s",
            self.settings.symbols.len(),
            self.settings.intervals.len(),
            self.settings.tick_interval.as_secs()
        );

        self.seed_baselines().await;

        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reports = self.tick().await;
                    debug!("Tick evaluated {} markets", reports.len());
                }
                _ = shutdown_rx.recv() => {
                    info!("Trend monitor received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        if self.is_running() {
            let _ = self.shutdown_tx.send(());
            info!("Trend monitor stopping");
        }
    }

    /// Send the user the current verdict for every market they follow,
    /// whatever the history says. Returns the number of messages sent.
    pub async fn status_for_user(&self, user: &UserProfile) -> usize {
        let mut sent = 0;

        for symbol in &user.symbols {
            for interval in &user.intervals {
                let verdict = match self.evaluate(symbol, *interval).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!("Status for {} {} unavailable: {}", symbol, interval, e);
                        continue;
                    }
                };

                match self
                    .notifier
                    .on_user_notification(user, symbol, *interval, &verdict)
                    .await
                {
                    Ok(()) => sent += 1,
                    Err(e) => error!("Status message to {} failed: {}", user.id, e),
                }
            }
        }

        sent
    }
}
