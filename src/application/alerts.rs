// High-humidity alerts - threshold crossing, notification cooldown, delivery
use crate::domain::reading::Reading;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub const DEFAULT_ALERT_THRESHOLD: f64 = 80.0;
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification endpoint answered with status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub humidity: f64,
    pub timestamp: DateTime<Local>,
}

impl Alert {
    pub fn message(&self) -> String {
        format!(
            "ALERT: high humidity detected: {}% at {}.",
            self.humidity,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTransition {
    Entered,
    Exited,
}

/// What one reading did to the alarm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmStep {
    pub transition: Option<AlarmTransition>,
    pub alert: Option<Alert>,
}

/// Tracks whether humidity is above the alert threshold and rate-limits
/// notifications. Every reading above the threshold asks for a notification;
/// one is granted once more than `cooldown` has passed since the last one,
/// measured on reading timestamps. The cooldown spans crossings.
#[derive(Debug, Clone)]
pub struct HumidityAlarm {
    threshold: f64,
    cooldown: chrono::Duration,
    active: bool,
    last_notified: Option<DateTime<Local>>,
}

impl HumidityAlarm {
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
            active: false,
            last_notified: None,
        }
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn observe(&mut self, reading: &Reading) -> AlarmStep {
        let above = reading.humidity() > self.threshold;
        let transition = match (self.active, above) {
            (false, true) => Some(AlarmTransition::Entered),
            (true, false) => Some(AlarmTransition::Exited),
            _ => None,
        };
        self.active = above;

        if !above {
            return AlarmStep {
                transition,
                alert: None,
            };
        }

        let now = reading.timestamp();
        let due = self
            .last_notified
            .is_none_or(|last| now.signed_duration_since(last) > self.cooldown);
        let alert = if due {
            self.last_notified = Some(now);
            Some(Alert {
                humidity: reading.humidity(),
                timestamp: now,
            })
        } else {
            tracing::debug!(
                "Alert suppressed at {:.1}% humidity; cooldown still running",
                reading.humidity()
            );
            None
        };

        AlarmStep { transition, alert }
    }
}

/// Where alerts end up.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub failed: u64,
}

/// Delivers queued alerts off the feed task so a slow sink never stalls ingestion.
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<Alert>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(alert) = rx.recv().await {
            match self.sink.notify(&alert).await {
                Ok(()) => {
                    stats.sent += 1;
                    tracing::info!("Alert sent via {}: {:.1}%", self.sink.describe(), alert.humidity);
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!("Failed to send alert via {}: {}", self.sink.describe(), e);
                }
            }
        }
        stats
    }
}
