// Dashboard session - owns the chart window and drives the view
use crate::application::alerts::{Alert, AlarmTransition, HumidityAlarm};
use crate::application::history_loader::HistoryBatch;
use crate::application::view_adapter::ViewAdapter;
use crate::domain::connection::ConnectionState;
use crate::domain::reading::Reading;
use crate::domain::series::{BoundedSeriesBuffer, SeriesError};
use crate::domain::severity::{Severity, classify};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(usize),
    /// Live readings were already absorbed; history would rewind the chart.
    SkippedLiveDataPresent,
}

pub struct DashboardSession {
    buffer: BoundedSeriesBuffer,
    view: Arc<dyn ViewAdapter>,
    live_pushes: u64,
    degraded: bool,
    alarm: Option<(HumidityAlarm, mpsc::Sender<Alert>)>,
}

impl DashboardSession {
    pub fn new(capacity: usize, view: Arc<dyn ViewAdapter>) -> Result<Self, SeriesError> {
        Ok(Self {
            buffer: BoundedSeriesBuffer::new(capacity)?,
            view,
            live_pushes: 0,
            degraded: false,
            alarm: None,
        })
    }

    /// Watch live readings for high humidity and queue alerts on `alerts`.
    pub fn with_alarm(mut self, alarm: HumidityAlarm, alerts: mpsc::Sender<Alert>) -> Self {
        self.alarm = Some((alarm, alerts));
        self
    }

    pub fn render_initial(&self) {
        self.view.update_series(&self.buffer.snapshot());
    }

    /// Absorb one live reading: one buffer mutation, one view refresh.
    pub fn ingest(&mut self, reading: &Reading) -> Result<Severity, SeriesError> {
        self.buffer
            .push(reading.timestamp(), reading.temperature(), reading.humidity())?;
        self.live_pushes += 1;

        let severity = classify(reading.humidity());
        self.view.set_current_values(reading.temperature(), reading.humidity());
        self.view.set_severity_badge(severity);
        self.view.update_series(&self.buffer.snapshot());

        self.check_alarm(reading);
        Ok(severity)
    }

    fn check_alarm(&mut self, reading: &Reading) {
        let Some((alarm, alerts)) = self.alarm.as_mut() else {
            return;
        };

        let step = alarm.observe(reading);
        match step.transition {
            Some(AlarmTransition::Entered) => {
                tracing::warn!("Humidity {:.1}% crossed the alert threshold", reading.humidity())
            }
            Some(AlarmTransition::Exited) => {
                tracing::info!("Humidity back to {:.1}%; alert cleared", reading.humidity())
            }
            None => {}
        }

        if let Some(alert) = step.alert {
            match alerts.try_send(alert) {
                Ok(()) => {}
                Err(TrySendError::Full(alert)) => {
                    tracing::warn!("Alert queue full; dropping alert at {:.1}%", alert.humidity)
                }
                Err(TrySendError::Closed(_)) => tracing::warn!("Alert dispatcher is gone"),
            }
        }
    }

    pub fn apply_history(&mut self, batch: &HistoryBatch) -> Result<SeedOutcome, SeriesError> {
        if self.live_pushes > 0 {
            return Ok(SeedOutcome::SkippedLiveDataPresent);
        }

        let seeded = self.buffer.seed(
            batch
                .readings()
                .iter()
                .map(|r| (r.timestamp(), r.temperature(), r.humidity())),
        )?;

        let latest = batch.latest();
        self.view.set_current_values(latest.temperature(), latest.humidity());
        self.view.set_severity_badge(classify(latest.humidity()));
        self.view.update_series(&self.buffer.snapshot());
        Ok(SeedOutcome::Seeded(seeded))
    }

    /// Latched; only the first call reaches the view.
    pub fn raise_degraded(&mut self, reason: &str) -> bool {
        if self.degraded {
            return false;
        }
        self.degraded = true;
        self.view.show_degraded(reason);
        true
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.view.set_connection_state(state);
    }

    pub fn buffer(&self) -> &BoundedSeriesBuffer {
        &self.buffer
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::view_adapter::testing::{RecordingView, ViewCall};
    use crate::domain::series::DEFAULT_CAPACITY;
    use chrono::{Duration, Local};

    fn session() -> (DashboardSession, Arc<RecordingView>) {
        let view = Arc::new(RecordingView::default());
        let session = DashboardSession::new(DEFAULT_CAPACITY, view.clone()).unwrap();
        (session, view)
    }

    fn history(count: usize) -> HistoryBatch {
        let base = Local::now() - Duration::hours(1);
        let readings = (0..count)
            .map(|i| {
                Reading::new(base + Duration::seconds(i as i64 * 60), i as f64, 40.0 + i as f64).unwrap()
            })
            .collect();
        HistoryBatch::new(readings).unwrap()
    }

    #[test]
    fn test_ingest_updates_view_once_per_reading() {
        let (mut session, view) = session();

        let severities: Vec<Severity> = [50.0, 56.0, 61.0, 70.0]
            .into_iter()
            .enumerate()
            .map(|(i, humidity)| {
                let reading = Reading::new(Local::now(), 20.0 + i as f64, humidity).unwrap();
                session.ingest(&reading).unwrap()
            })
            .collect();

        assert_eq!(
            severities,
            vec![Severity::Safe, Severity::Warning, Severity::Danger, Severity::Danger]
        );
        assert_eq!(view.severities(), severities);
        assert_eq!(view.series_updates(), 4);

        let snapshot = session.buffer().snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.temperatures, vec![20.0, 21.0, 22.0, 23.0]);
        assert_eq!(snapshot.humidities, vec![50.0, 56.0, 61.0, 70.0]);
    }

    #[test]
    fn test_apply_history_seeds_and_shows_latest() {
        let (mut session, view) = session();

        let outcome = session.apply_history(&history(35)).unwrap();
        assert_eq!(outcome, SeedOutcome::Seeded(30));

        let calls = view.calls();
        assert_eq!(calls[0], ViewCall::CurrentValues(34.0, 74.0));
        assert_eq!(calls[1], ViewCall::Severity(Severity::Danger));

        let snapshot = session.buffer().snapshot();
        assert_eq!(snapshot.temperatures.first(), Some(&5.0));
        assert_eq!(snapshot.temperatures.last(), Some(&34.0));
    }

    #[test]
    fn test_live_push_after_seed_evicts_oldest_seeded_row() {
        let (mut session, _view) = session();
        session.apply_history(&history(35)).unwrap();

        session.ingest(&Reading::new(Local::now(), 99.0, 45.0).unwrap()).unwrap();

        let snapshot = session.buffer().snapshot();
        assert_eq!(snapshot.len(), 30);
        assert_eq!(snapshot.temperatures.first(), Some(&6.0));
        assert_eq!(snapshot.temperatures.last(), Some(&99.0));
    }

    #[test]
    fn test_history_after_live_data_is_ignored() {
        let (mut session, _view) = session();
        session.ingest(&Reading::new(Local::now(), 21.0, 45.0).unwrap()).unwrap();

        let outcome = session.apply_history(&history(10)).unwrap();
        assert_eq!(outcome, SeedOutcome::SkippedLiveDataPresent);
        assert_eq!(session.buffer().snapshot().temperatures, vec![21.0]);
    }

    #[test]
    fn test_degraded_is_raised_once() {
        let (mut session, view) = session();

        assert!(session.raise_degraded("history unavailable"));
        assert!(!session.raise_degraded("history unavailable"));
        assert!(session.is_degraded());
        assert_eq!(view.degraded_count(), 1);
    }

    #[test]
    fn test_ingest_drives_alarm() {
        let (alerts_tx, mut alerts_rx) = mpsc::channel(4);
        let (session, _view) = session();
        let alarm = HumidityAlarm::new(80.0, std::time::Duration::from_secs(300));
        let mut session = session.with_alarm(alarm, alerts_tx);
        let base = Local::now();

        for (secs, humidity) in [(0, 75.0), (5, 82.0), (10, 90.0), (15, 70.0), (400, 81.0)] {
            let reading = Reading::new(base + Duration::seconds(secs), 24.0, humidity).unwrap();
            session.ingest(&reading).unwrap();
        }

        let first = alerts_rx.try_recv().unwrap();
        assert_eq!(first.humidity, 82.0);
        let second = alerts_rx.try_recv().unwrap();
        assert_eq!(second.humidity, 81.0);
        assert!(alerts_rx.try_recv().is_err());
        assert_eq!(session.buffer().len(), 5);
    }

    #[test]
    fn test_full_alert_queue_does_not_block_ingest() {
        let (alerts_tx, _alerts_rx) = mpsc::channel(1);
        let (session, view) = session();
        let alarm = HumidityAlarm::new(80.0, std::time::Duration::ZERO);
        let mut session = session.with_alarm(alarm, alerts_tx);
        let base = Local::now();

        for secs in 0..3 {
            let reading = Reading::new(base + Duration::seconds(secs), 24.0, 95.0).unwrap();
            assert_eq!(session.ingest(&reading).unwrap(), Severity::Danger);
        }
        assert_eq!(view.series_updates(), 3);
    }
}
