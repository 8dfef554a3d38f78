// Reading domain model - one timestamped temperature/humidity sample
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use thiserror::Error;

const TIME_LABEL_FORMAT: &str = "%H:%M:%S";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Error)]
pub enum ReadingError {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("{field} is not a finite number: {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },
    #[error("unparseable timestamp: {0:?}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    timestamp: DateTime<Local>,
    temperature: f64,
    humidity: f64,
}

/// Wire shape of a live sensor message: `{"temperature": 24.1, "humidity": 58.0}`
#[derive(Debug, Deserialize)]
struct LivePayload {
    temperature: f64,
    humidity: f64,
}

impl Reading {
    pub fn new(
        timestamp: DateTime<Local>,
        temperature: f64,
        humidity: f64,
    ) -> Result<Self, ReadingError> {
        Ok(Self {
            timestamp,
            temperature: ensure_finite("temperature", temperature)?,
            humidity: ensure_finite("humidity", humidity)?,
        })
    }

    /// Decode a live message; the arrival time becomes the reading's timestamp.
    pub fn from_payload(payload: &[u8], received_at: DateTime<Local>) -> Result<Self, ReadingError> {
        let decoded: LivePayload = serde_json::from_slice(payload)?;
        Self::new(received_at, decoded.temperature, decoded.humidity)
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn time_label(&self) -> String {
        time_label(&self.timestamp)
    }
}

pub fn time_label(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIME_LABEL_FORMAT).to_string()
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<f64, ReadingError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ReadingError::NonFinite { field, value })
    }
}

/// Parse a numeric field that may arrive as text (CSV-backed history rows do).
pub fn parse_numeric(field: &'static str, raw: &str) -> Result<f64, ReadingError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ReadingError::NotNumeric {
            field,
            value: raw.to_string(),
        })?;
    ensure_finite(field, value)
}

/// Accepts RFC 3339, or a naive date-time which is taken as local time.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, ReadingError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Local));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .ok_or_else(|| ReadingError::InvalidTimestamp(raw.to_string()))
}
