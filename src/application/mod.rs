// Application layer - session, history bootstrap, alerts and the live feed loop
pub mod alerts;
pub mod dashboard_session;
pub mod history_loader;
pub mod live_feed;
pub mod view_adapter;
