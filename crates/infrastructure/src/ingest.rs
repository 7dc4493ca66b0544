//! CSV event import and export.
//!
//! Event exports are CSV files with a header row:
//!
//! ```text
//! customer_id,timestamp,event_type,session_id,page_url,cart_value,converted
//! CUST0001,1704067200,purchase,S1,/checkout,299.99,true
//! ```
//!
//! Only `customer_id`, `timestamp` and `event_type` are required. Rows that
//! cannot be read as a record are counted as malformed and skipped; semantic
//! checks (negative values, unknown event types) are left to validation.

use customer_analytics_domain::EventRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::{Error, Result};

const REQUIRED_COLUMNS: [&str; 3] = ["customer_id", "timestamp", "event_type"];

/// Error messages kept per import
const MAX_REPORTED_ERRORS: usize = 20;

/// Outcome of parsing an event export
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub records: Vec<EventRecord>,
    /// Data rows read
    pub rows: u64,
    pub parsed: u64,
    pub malformed: u64,
    /// First few row errors, with line numbers
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CsvEventRow {
    customer_id: String,
    timestamp: String,
    event_type: String,
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    page_url: String,
    #[serde(default)]
    cart_value: String,
    #[serde(default)]
    converted: String,
}

impl CsvEventRow {
    fn into_record(self) -> std::result::Result<EventRecord, String> {
        let timestamp = self
            .timestamp
            .parse::<i64>()
            .map_err(|e| format!("invalid timestamp '{}': {}", self.timestamp, e))?;

        let cart_value = if self.cart_value.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from_str(&self.cart_value)
                .map_err(|e| format!("invalid cart_value '{}': {}", self.cart_value, e))?
        };

        let converted = match self.converted.to_ascii_lowercase().as_str() {
            "" => None,
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            other => return Err(format!("invalid converted flag '{}'", other)),
        };

        Ok(EventRecord {
            customer_id: self.customer_id,
            timestamp,
            event_type: self.event_type,
            session_id: self.session_id,
            page_url: self.page_url,
            cart_value,
            converted,
            sequence: 0,
        })
    }
}

impl From<&EventRecord> for CsvEventRow {
    fn from(record: &EventRecord) -> Self {
        Self {
            customer_id: record.customer_id.clone(),
            timestamp: record.timestamp.to_string(),
            event_type: record.event_type.clone(),
            session_id: record.session_id.clone(),
            page_url: record.page_url.clone(),
            cart_value: record.cart_value.to_string(),
            converted: record.converted.map(|c| c.to_string()).unwrap_or_default(),
        }
    }
}

/// Parse an event export.
///
/// Fails only when the header is unreadable or lacks a required column.
pub fn parse_events_csv<R: Read>(reader: R) -> Result<IngestReport> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::Configuration(format!(
                "event CSV is missing the '{}' column",
                column
            )));
        }
    }

    let mut report = IngestReport::default();
    for (index, row) in reader.deserialize::<CsvEventRow>().enumerate() {
        report.rows += 1;
        // Header is line 1
        let line = index + 2;

        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(CsvEventRow::into_record);
        match parsed {
            Ok(record) => {
                report.parsed += 1;
                report.records.push(record);
            }
            Err(message) => {
                report.malformed += 1;
                debug!(line, error = %message, "Skipping malformed CSV row");
                if report.errors.len() < MAX_REPORTED_ERRORS {
                    report.errors.push(format!("line {}: {}", line, message));
                }
            }
        }
    }

    if report.malformed > 0 {
        warn!(
            malformed = report.malformed,
            parsed = report.parsed,
            "Event CSV contained malformed rows"
        );
    }
    Ok(report)
}

/// Read and parse an event export from disk.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub async fn read_events_csv(path: impl AsRef<Path>) -> Result<IngestReport> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    parse_events_csv(bytes.as_slice())
}

/// Write records as an event export, header included.
pub fn write_events_csv<W: Write>(records: &[EventRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(CsvEventRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}
