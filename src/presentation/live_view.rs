// Live view - ViewAdapter backed by shared state and an update broadcast
use crate::application::view_adapter::ViewAdapter;
use crate::domain::connection::ConnectionState;
use crate::domain::reading::time_label;
use crate::domain::series::SeriesSnapshot;
use crate::domain::severity::{Severity, classify};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentValues {
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeverityBadge {
    pub level: Severity,
    pub label: &'static str,
    pub style: &'static str,
}

impl From<Severity> for SeverityBadge {
    fn from(level: Severity) -> Self {
        Self {
            level,
            label: level.label(),
            style: level.style(),
        }
    }
}

/// Chart-ready columns. Every point carries its own severity so the history
/// portion of the chart is classified the same way as the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesView {
    pub labels: Vec<String>,
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
    pub severities: Vec<Severity>,
    pub capacity: usize,
}

impl SeriesView {
    fn from_snapshot(snapshot: &SeriesSnapshot, capacity: usize) -> Self {
        Self {
            labels: snapshot.timestamps.iter().map(time_label).collect(),
            temperatures: snapshot.temperatures.clone(),
            humidities: snapshot.humidities.clone(),
            severities: snapshot.humidities.iter().copied().map(classify).collect(),
            capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewState {
    pub current: Option<CurrentValues>,
    pub severity: Option<SeverityBadge>,
    pub connection: ConnectionState,
    pub degraded: Option<String>,
    pub series: SeriesView,
    pub updated_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ViewUpdate {
    CurrentValues(CurrentValues),
    Severity(SeverityBadge),
    Series(SeriesView),
    Connection(ConnectionState),
    Degraded(String),
}

impl ViewUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            ViewUpdate::CurrentValues(_) => "current_values",
            ViewUpdate::Severity(_) => "severity",
            ViewUpdate::Series(_) => "series",
            ViewUpdate::Connection(_) => "connection",
            ViewUpdate::Degraded(_) => "degraded",
        }
    }
}

#[derive(Clone)]
pub struct LiveView {
    state: Arc<RwLock<ViewState>>,
    updates: broadcast::Sender<ViewUpdate>,
    capacity: usize,
}

impl LiveView {
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let state = ViewState {
            current: None,
            severity: None,
            connection: ConnectionState::Disconnected,
            degraded: None,
            series: SeriesView {
                capacity,
                ..SeriesView::default()
            },
            updated_at: None,
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            updates,
            capacity,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewUpdate> {
        self.updates.subscribe()
    }

    fn apply(&self, update: ViewUpdate) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match &update {
                ViewUpdate::CurrentValues(values) => state.current = Some(*values),
                ViewUpdate::Severity(badge) => state.severity = Some(*badge),
                ViewUpdate::Series(series) => state.series = series.clone(),
                ViewUpdate::Connection(connection) => state.connection = *connection,
                ViewUpdate::Degraded(reason) => state.degraded = Some(reason.clone()),
            }
            state.updated_at = Some(Local::now());
        }

        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}

impl ViewAdapter for LiveView {
    fn set_current_values(&self, temperature: f64, humidity: f64) {
        self.apply(ViewUpdate::CurrentValues(CurrentValues {
            temperature,
            humidity,
        }));
    }

    fn set_severity_badge(&self, severity: Severity) {
        self.apply(ViewUpdate::Severity(severity.into()));
    }

    fn update_series(&self, snapshot: &SeriesSnapshot) {
        self.apply(ViewUpdate::Series(SeriesView::from_snapshot(snapshot, self.capacity)));
    }

    fn set_connection_state(&self, state: ConnectionState) {
        self.apply(ViewUpdate::Connection(state));
    }

    fn show_degraded(&self, reason: &str) {
        self.apply(ViewUpdate::Degraded(reason.to_string()));
    }
}
