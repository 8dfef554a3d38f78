// Live feed consumer - the single task that mutates the dashboard session
use crate::application::dashboard_session::{DashboardSession, SeedOutcome};
use crate::application::history_loader::{HistoryBatch, HistoryError};
use crate::domain::connection::{ConnectionTracker, LinkEvent};
use crate::domain::reading::Reading;
use bytes::Bytes;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;

/// Everything the consumer reacts to, in delivery order.
#[derive(Debug)]
pub enum FeedEvent {
    Link(LinkEvent),
    Message {
        payload: Bytes,
        received_at: DateTime<Local>,
    },
    History(Result<HistoryBatch, HistoryError>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: u64,
    pub dropped: u64,
}

pub struct LiveFeedConsumer {
    session: DashboardSession,
    connection: ConnectionTracker,
    stats: FeedStats,
}

impl LiveFeedConsumer {
    pub fn new(session: DashboardSession) -> Self {
        Self {
            session,
            connection: ConnectionTracker::default(),
            stats: FeedStats::default(),
        }
    }

    /// Drain events until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<FeedEvent>) -> (DashboardSession, FeedStats) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        tracing::info!(
            "Live feed closed: {} readings accepted, {} dropped, broker link {:?}",
            self.stats.accepted,
            self.stats.dropped,
            self.connection.state()
        );
        (self.session, self.stats)
    }

    pub fn handle(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Link(link) => self.on_link(link),
            FeedEvent::Message {
                payload,
                received_at,
            } => self.on_message(&payload, received_at),
            FeedEvent::History(outcome) => self.on_history(outcome),
        }
    }

    fn on_link(&mut self, event: LinkEvent) {
        if let Some(state) = self.connection.apply(event) {
            tracing::info!("Broker connection is now {:?}", state);
            self.session.set_connection_state(state);
        }
    }

    fn on_message(&mut self, payload: &[u8], received_at: DateTime<Local>) {
        match Reading::from_payload(payload, received_at) {
            Ok(reading) => match self.session.ingest(&reading) {
                Ok(severity) => {
                    self.stats.accepted += 1;
                    tracing::debug!(
                        "Reading at {}: T={:.1} H={:.1} ({})",
                        reading.time_label(),
                        reading.temperature(),
                        reading.humidity(),
                        severity.label()
                    );
                }
                Err(e) => {
                    self.stats.dropped += 1;
                    tracing::warn!("Dropping reading at {}: {}", reading.time_label(), e);
                }
            },
            Err(e) => {
                self.stats.dropped += 1;
                tracing::warn!(
                    "Dropping message {:?}: {}",
                    String::from_utf8_lossy(payload),
                    e
                );
            }
        }
    }

    fn on_history(&mut self, outcome: Result<HistoryBatch, HistoryError>) {
        let failure = match outcome {
            Ok(batch) => match self.session.apply_history(&batch) {
                Ok(SeedOutcome::Seeded(count)) => {
                    tracing::info!("Seeded chart with {} historical readings", count);
                    return;
                }
                Ok(SeedOutcome::SkippedLiveDataPresent) => {
                    tracing::info!("History arrived after live data; keeping live chart");
                    return;
                }
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        tracing::warn!("History unavailable, continuing live-only: {}", failure);
        self.session.raise_degraded(&failure);
    }

    #[cfg(test)]
    pub fn session(&self) -> &DashboardSession {
        &self.session
    }

    #[cfg(test)]
    pub fn stats(&self) -> FeedStats {
        self.stats
    }
}
