// Application state for HTTP handlers
use crate::presentation::live_view::LiveView;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub view: LiveView,
    /// Flips to true on shutdown so long-lived streams can finish.
    pub shutdown: watch::Receiver<bool>,
}
