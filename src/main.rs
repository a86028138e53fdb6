use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trendwatch::config::Config;
use trendwatch::services::{
    LogNotifier, Notifier, SelectionSessions, SqliteStore, TelegramNotifier, TrendMonitor,
};
use trendwatch::sources::BinanceClient;
use trendwatch::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trendwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    config.validate()?;
    info!("Starting trendwatch on {}:{}", config.host, config.port);

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    let source = Arc::new(BinanceClient::new(
        Some(config.binance_api_url.clone()),
        config.binance_api_key.clone(),
    ));

    let periods = config.indicators.ma_periods.clone();
    let notifier: Arc<dyn Notifier> = match config.telegram.bot_token.clone() {
        Some(token) => {
            info!(
                "Telegram delivery configured (notifications {})",
                if config.telegram.notification_enabled { "enabled" } else { "disabled" }
            );
            Arc::new(TelegramNotifier::new(token, &config.telegram, periods))
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set, verdicts will only be logged");
            Arc::new(LogNotifier::new(periods))
        }
    };

    let monitor = Arc::new(TrendMonitor::new(
        &config,
        source,
        store.clone(),
        store.clone(),
        notifier,
    ));

    let sessions = Arc::new(SelectionSessions::new(
        Duration::from_secs(config.session_ttl_secs),
        config.symbols.clone(),
        config.intervals.clone(),
    ));

    // Purge expired selection sessions
    {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                sessions.cleanup();
            }
        });
    }

    // Start the evaluation loop
    {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run().await });
    }

    let state = AppState {
        config: config.clone(),
        monitor: monitor.clone(),
        history: store.clone(),
        users: store,
        sessions,
        started_at: chrono::Utc::now().timestamp_millis(),
    };

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("trendwatch listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    monitor.stop();
    Ok(())
}
