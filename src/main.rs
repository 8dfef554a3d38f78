// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, routing::get};
use tokio::sync::{mpsc, watch};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::alerts::{AlertDispatcher, HumidityAlarm};
use crate::application::dashboard_session::DashboardSession;
use crate::application::history_loader::HistoryLoader;
use crate::application::live_feed::LiveFeedConsumer;
use crate::infrastructure::config::{LoggingSettings, load_dashboard_config};
use crate::infrastructure::http_history::HttpHistorySource;
use crate::infrastructure::mqtt_transport::MqttTransport;
use crate::infrastructure::telegram_sink::TelegramSink;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, latest, series, stream_updates};
use crate::presentation::live_view::LiveView;

const FEED_CHANNEL_CAPACITY: usize = 100;
const ALERT_CHANNEL_CAPACITY: usize = 8;

fn init_tracing(logging: &LoggingSettings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_dashboard_config()?;
    init_tracing(&config.logging);

    // View and session (application layer)
    let view = LiveView::new(config.buffer.capacity);
    let mut session = DashboardSession::new(config.buffer.capacity, Arc::new(view.clone()))?;
    session.render_initial();

    // High-humidity notifications, delivered off the feed task
    let dispatcher = if config.alert.enabled {
        let (alert_tx, alert_rx) = mpsc::channel(ALERT_CHANNEL_CAPACITY);
        let sink = TelegramSink::new(
            config.alert.telegram_api.clone(),
            config.alert.telegram_token.clone(),
            config.alert.telegram_chat_id.clone(),
        );
        tracing::info!(
            "Alerting above {:.1}% humidity (cooldown {:?})",
            config.alert.threshold,
            config.alert.cooldown()
        );
        session = session.with_alarm(
            HumidityAlarm::new(config.alert.threshold, config.alert.cooldown()),
            alert_tx,
        );
        Some(tokio::spawn(AlertDispatcher::new(Arc::new(sink)).run(alert_rx)))
    } else {
        None
    };

    let (feed_tx, feed_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_rx.clone();

    // Optional history bootstrap, racing the live feed
    let history = if config.history.enabled {
        let source = HttpHistorySource::new(config.history.endpoint.clone(), config.history.limit);
        Some(HistoryLoader::new(Arc::new(source)).spawn_bootstrap(feed_tx.clone()))
    } else {
        tracing::info!("History bootstrap disabled; starting live-only");
        None
    };

    // Live feed (infrastructure → application)
    let transport = tokio::spawn(MqttTransport::new(&config.broker).run(feed_tx, shutdown_rx.clone()));
    let consumer = tokio::spawn(LiveFeedConsumer::new(session).run(feed_rx));

    // Build router (presentation layer)
    let state = Arc::new(AppState {
        view,
        shutdown: shutdown_rx.clone(),
    });
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/latest", get(latest))
        .route("/api/series", get(series))
        .route("/api/stream", get(stream_updates))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind {:?}", config.server.bind))?;
    tracing::info!("Starting humidity dashboard on {}", addr);

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await?;

    // The consumer drains and exits once every sender is gone
    if let Some(history) = history {
        history.abort();
    }
    transport.await.context("MQTT transport task failed")?;
    let (session, stats) = consumer.await.context("live feed task failed")?;
    tracing::info!(
        "Session ended with {}/{} points in the chart ({} accepted, {} dropped, degraded: {})",
        session.buffer().len(),
        session.buffer().capacity(),
        stats.accepted,
        stats.dropped,
        session.is_degraded()
    );
    if session.buffer().is_empty() {
        tracing::warn!("No readings were received during this session");
    }

    // Dropping the session closes the alert queue
    drop(session);
    if let Some(dispatcher) = dispatcher {
        let stats = dispatcher.await.context("alert dispatcher task failed")?;
        tracing::info!("Alerts: {} sent, {} failed", stats.sent, stats.failed);
    }

    Ok(())
}
