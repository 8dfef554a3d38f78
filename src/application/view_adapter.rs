// Rendering surface the dashboard session drives
use crate::domain::connection::ConnectionState;
use crate::domain::series::SeriesSnapshot;
use crate::domain::severity::Severity;

/// Receives every visible change. Implementations render; they never reach
/// back into the session.
pub trait ViewAdapter: Send + Sync {
    fn set_current_values(&self, temperature: f64, humidity: f64);

    fn set_severity_badge(&self, severity: Severity);

    fn update_series(&self, snapshot: &SeriesSnapshot);

    fn set_connection_state(&self, state: ConnectionState);

    /// History is unavailable; the dashboard runs on live data only.
    fn show_degraded(&self, reason: &str);
}
