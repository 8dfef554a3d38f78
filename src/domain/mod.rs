// Domain layer - readings, severity, the chart window and link state
pub mod connection;
pub mod reading;
pub mod series;
pub mod severity;
