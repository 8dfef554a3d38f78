// History bootstrap - seeds the chart before live data arrives
use crate::application::live_feed::FeedEvent;
use crate::domain::reading::Reading;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history endpoint unreachable: {0}")]
    Transport(String),
    #[error("history endpoint answered with status {0}")]
    Status(u16),
    #[error("history response could not be decoded: {0}")]
    Decode(String),
    #[error("history endpoint returned no readings")]
    Empty,
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch recent readings, expected oldest first.
    async fn fetch_history(&self) -> Result<Vec<Reading>, HistoryError>;

    /// Where the history comes from, for logs.
    fn describe(&self) -> String;
}

/// Non-empty, chronologically ordered readings.
#[derive(Debug, Clone)]
pub struct HistoryBatch {
    readings: Vec<Reading>,
}

impl HistoryBatch {
    pub fn new(mut readings: Vec<Reading>) -> Result<Self, HistoryError> {
        if readings.is_empty() {
            return Err(HistoryError::Empty);
        }
        // Stable, so rows sharing a timestamp keep their delivered order
        readings.sort_by_key(|reading| reading.timestamp());
        Ok(Self { readings })
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn latest(&self) -> &Reading {
        // Non-empty by construction
        &self.readings[self.readings.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }
}

#[derive(Clone)]
pub struct HistoryLoader {
    source: Arc<dyn HistorySource>,
}

impl HistoryLoader {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self { source }
    }

    pub async fn load_history(&self) -> Result<HistoryBatch, HistoryError> {
        tracing::debug!("Loading history from {}", self.source.describe());
        let readings = self.source.fetch_history().await?;
        let batch = HistoryBatch::new(readings)?;
        tracing::info!("Loaded {} historical readings", batch.len());
        Ok(batch)
    }

    /// Load in the background and hand the outcome to the feed consumer, which
    /// decides whether it still applies.
    pub fn spawn_bootstrap(self, tx: mpsc::Sender<FeedEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let outcome = self.load_history().await;
            if tx.send(FeedEvent::History(outcome)).await.is_err() {
                tracing::debug!("Feed consumer gone before history arrived");
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StaticHistory;
    use super::*;
    use chrono::{Duration, Local};

    fn reading(offset_secs: i64, humidity: f64) -> Reading {
        Reading::new(Local::now() + Duration::seconds(offset_secs), 25.0, humidity).unwrap()
    }

    #[tokio::test]
    async fn test_load_history_orders_and_exposes_latest() {
        let source = StaticHistory::new(Ok(vec![reading(10, 52.0), reading(0, 48.0), reading(20, 63.0)]));
        let loader = HistoryLoader::new(Arc::new(source));

        let batch = loader.load_history().await.unwrap();
        let humidities: Vec<f64> = batch.readings().iter().map(|r| r.humidity()).collect();
        assert_eq!(humidities, vec![48.0, 52.0, 63.0]);
        assert_eq!(batch.latest().humidity(), 63.0);
    }

    #[tokio::test]
    async fn test_load_history_rejects_empty() {
        let loader = HistoryLoader::new(Arc::new(StaticHistory::new(Ok(Vec::new()))));
        assert!(matches!(loader.load_history().await, Err(HistoryError::Empty)));
    }

    #[tokio::test]
    async fn test_load_history_propagates_failure() {
        let source = StaticHistory::new(Err(HistoryError::Transport("connection refused".into())));
        let loader = HistoryLoader::new(Arc::new(source));
        assert!(matches!(loader.load_history().await, Err(HistoryError::Transport(_))));
    }

    #[tokio::test]
    async fn test_spawn_bootstrap_delivers_outcome() {
        let (tx, mut rx) = mpsc::channel(4);
        let loader = HistoryLoader::new(Arc::new(StaticHistory::new(Ok(vec![reading(0, 40.0)]))));

        loader.spawn_bootstrap(tx).await.unwrap();

        match rx.recv().await {
            Some(FeedEvent::History(Ok(batch))) => assert_eq!(batch.len(), 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
