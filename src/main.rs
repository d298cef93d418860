// Main entry point - Dependency injection and client setup
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use terrarium_telemetry::application::connection_manager::ConnectionManager;
use terrarium_telemetry::application::dispatcher::MessageDispatcher;
use terrarium_telemetry::application::history_cache::HistoryCache;
use terrarium_telemetry::infrastructure::config::load_dashboard_config;
use terrarium_telemetry::infrastructure::http_history::HttpHistorySource;
use terrarium_telemetry::infrastructure::websocket::WebSocketConnector;
use terrarium_telemetry::presentation::consumers::{
    LoggingChartRenderer, LoggingLiveness, register_logging_consumers,
};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config()?;

    // Live channel
    let mut dispatcher = MessageDispatcher::new();
    register_logging_consumers(&mut dispatcher)?;
    let connector = Arc::new(WebSocketConnector::new(config.connection.url.clone()));
    let manager = ConnectionManager::new(connector, dispatcher, (&config.connection).into())
        .with_observer(Arc::new(LoggingLiveness));
    let connection = manager.handle();
    let session = tokio::spawn(manager.run());
    tracing::info!("Connecting to {}", config.connection.url);

    // History
    let history = Arc::new(HttpHistorySource::new(config.history.base_url.clone()));
    match history.fetch_door_events().await {
        Ok(events) => {
            for event in events {
                let at = Utc
                    .timestamp_millis_opt(event.time_ms)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| event.time_ms.to_string());
                tracing::info!("Door {} at {}", if event.open { "opened" } else { "closed" }, at);
            }
        }
        Err(e) => tracing::warn!("Door history unavailable: {}", e),
    }

    let cache = HistoryCache::new(
        history,
        Arc::new(LoggingChartRenderer),
        config.history.cache_settings(),
    );
    for chart in &config.history.charts {
        let source_url = chart.source_url(&config.history.base_url);
        cache.request(&chart.id, chart.kind.clone(), &source_url, false).await;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    cache.clear();
    connection.shutdown();
    session.await?;

    Ok(())
}
