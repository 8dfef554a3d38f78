// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_history;
pub mod mqtt_transport;
pub mod telegram_sink;
