// HTTP history source - reads recent rows from the history endpoint
use crate::application::history_loader::{HistoryError, HistorySource};
use crate::domain::reading::{Reading, ReadingError, parse_numeric, parse_timestamp};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct HttpHistorySource {
    client: reqwest::Client,
    endpoint: String,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    timestamp: String,
    temperature: NumberOrText,
    humidity: NumberOrText,
}

/// CSV-backed endpoints serialise every column as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn parse(&self, field: &'static str) -> Result<f64, ReadingError> {
        match self {
            NumberOrText::Number(value) => Ok(*value),
            NumberOrText::Text(raw) => parse_numeric(field, raw),
        }
    }
}

impl HistoryRow {
    fn to_reading(&self) -> Result<Reading, ReadingError> {
        Reading::new(
            parse_timestamp(&self.timestamp)?,
            self.temperature.parse("temperature")?,
            self.humidity.parse("humidity")?,
        )
    }
}

impl HttpHistorySource {
    pub fn new(endpoint: String, limit: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            limit,
        }
    }
}

/// Rows that cannot become a reading are skipped, not fatal.
fn rows_to_readings(rows: Vec<HistoryRow>) -> Vec<Reading> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match row.to_reading() {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!("Skipping history row {}: {}", index, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch_history(&self) -> Result<Vec<Reading>, HistoryError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("limit", self.limit)])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| HistoryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HistoryError::Status(response.status().as_u16()));
        }

        let rows = response
            .json::<Option<Vec<HistoryRow>>>()
            .await
            .map_err(|e| HistoryError::Decode(e.to_string()))?
            .unwrap_or_default();

        tracing::debug!("History endpoint returned {} rows", rows.len());
        Ok(rows_to_readings(rows))
    }

    fn describe(&self) -> String {
        format!("{}?limit={}", self.endpoint, self.limit)
    }
}
