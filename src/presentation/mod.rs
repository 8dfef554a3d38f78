// Presentation layer - the rendering surface served over HTTP
pub mod app_state;
pub mod handlers;
pub mod live_view;
