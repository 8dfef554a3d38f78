// Bounded time series for the dashboard chart
use super::reading::{ReadingError, ensure_finite};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("series capacity must be positive")]
    ZeroCapacity,
    #[error(transparent)]
    InvalidValue(#[from] ReadingError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Local>,
    pub temperature: f64,
    pub humidity: f64,
}

/// Column-oriented copy of the buffer, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSnapshot {
    pub timestamps: Vec<DateTime<Local>>,
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
}

impl SeriesSnapshot {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }
}

/// Fixed-capacity FIFO window over the most recent samples.
///
/// Points are stored as whole triples, so the timestamp, temperature and
/// humidity columns handed out by [`snapshot`](Self::snapshot) always have
/// the same length.
#[derive(Debug, Clone)]
pub struct BoundedSeriesBuffer {
    capacity: usize,
    points: VecDeque<SeriesPoint>,
}

impl BoundedSeriesBuffer {
    pub fn new(capacity: usize) -> Result<Self, SeriesError> {
        if capacity == 0 {
            return Err(SeriesError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        })
    }

    /// Append one sample, evicting the oldest when full. Returns the evicted point.
    pub fn push(
        &mut self,
        timestamp: DateTime<Local>,
        temperature: f64,
        humidity: f64,
    ) -> Result<Option<SeriesPoint>, SeriesError> {
        let point = SeriesPoint {
            timestamp,
            temperature: ensure_finite("temperature", temperature)?,
            humidity: ensure_finite("humidity", humidity)?,
        };

        let evicted = if self.points.len() == self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);
        Ok(evicted)
    }

    /// Replace the contents with the trailing `capacity` rows of `rows`
    /// (oldest first). Nothing changes if any row is rejected.
    pub fn seed<I>(&mut self, rows: I) -> Result<usize, SeriesError>
    where
        I: IntoIterator<Item = (DateTime<Local>, f64, f64)>,
    {
        let validated = rows
            .into_iter()
            .map(|(timestamp, temperature, humidity)| -> Result<SeriesPoint, SeriesError> {
                Ok(SeriesPoint {
                    timestamp,
                    temperature: ensure_finite("temperature", temperature)?,
                    humidity: ensure_finite("humidity", humidity)?,
                })
            })
            .collect::<Result<Vec<_>, SeriesError>>()?;

        let skip = validated.len().saturating_sub(self.capacity);
        self.points = validated.into_iter().skip(skip).collect();
        Ok(self.points.len())
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        let mut snapshot = SeriesSnapshot {
            timestamps: Vec::with_capacity(self.points.len()),
            temperatures: Vec::with_capacity(self.points.len()),
            humidities: Vec::with_capacity(self.points.len()),
        };
        for point in &self.points {
            snapshot.timestamps.push(point.timestamp);
            snapshot.temperatures.push(point.temperature);
            snapshot.humidities.push(point.humidity);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
