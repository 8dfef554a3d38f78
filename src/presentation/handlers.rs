// HTTP request handlers
use crate::domain::connection::ConnectionState;
use crate::presentation::app_state::AppState;
use crate::presentation::live_view::{CurrentValues, SeriesView, SeverityBadge};
use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Local};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub current: Option<CurrentValues>,
    pub severity: Option<SeverityBadge>,
    pub connection: ConnectionState,
    pub degraded: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current values, status badge and feed health
pub async fn latest(State(state): State<Arc<AppState>>) -> Json<LatestResponse> {
    let view = state.view.state();
    Json(LatestResponse {
        current: view.current,
        severity: view.severity,
        connection: view.connection,
        degraded: view.degraded,
        updated_at: view.updated_at,
    })
}

/// Chart window, oldest first
pub async fn series(State(state): State<Arc<AppState>>) -> Json<SeriesView> {
    Json(state.view.state().series)
}

/// Server-sent events: the full state once, then every view update
pub async fn stream_updates(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.view.subscribe();
    let mut shutdown = state.shutdown.clone();
    let initial = state.view.state();

    let stream = async_stream::stream! {
        match Event::default().event("snapshot").json_data(&initial) {
            Ok(event) => yield Ok(event),
            Err(e) => tracing::error!("Failed to encode snapshot event: {}", e),
        }

        loop {
            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = rx.recv() => received,
            };
            match received {
                Ok(update) => match Event::default().event(update.name()).json_data(&update) {
                    Ok(event) => yield Ok(event),
                    Err(e) => tracing::error!("Failed to encode {} event: {}", update.name(), e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE client lagging, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::view_adapter::ViewAdapter;
    use crate::domain::severity::Severity;
    use crate::presentation::live_view::LiveView;

    fn state() -> Arc<AppState> {
        let (_, shutdown) = tokio::sync::watch::channel(false);
        Arc::new(AppState {
            view: LiveView::new(30),
            shutdown,
        })
    }

    #[tokio::test]
    async fn test_latest_before_any_data() {
        let Json(body) = latest(State(state())).await;
        assert!(body.current.is_none());
        assert!(body.severity.is_none());
        assert_eq!(body.connection, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_latest_reflects_view() {
        let state = state();
        state.view.set_current_values(23.4, 66.0);
        state.view.set_severity_badge(Severity::Danger);
        state.view.show_degraded("history endpoint answered with status 500");

        let Json(body) = latest(State(state.clone())).await;
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["current"]["humidity"], 66.0);
        assert_eq!(json["severity"]["level"], "DANGER");
        assert_eq!(json["severity"]["style"], "danger");
        assert_eq!(json["degraded"], "history endpoint answered with status 500");
    }

    #[tokio::test]
    async fn test_series_empty_window() {
        let Json(body) = series(State(state())).await;
        assert!(body.labels.is_empty());
        assert_eq!(body.capacity, 30);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "ok");
    }
}
