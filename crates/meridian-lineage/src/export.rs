//! JSON and CSV export of lineage records
//!
//! CSV goes through the `csv` writer so quoting follows RFC 4180.

use crate::{LineageError, LineageRecord};
use serde::{Deserialize, Serialize};

/// Export format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON array of records
    #[default]
    Json,
    /// One CSV row per record
    Csv,
}

impl ExportFormat {
    /// Get the format name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// MIME type of the exported document
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(LineageError::UnsupportedFormat(other.to_string())),
        }
    }
}

const CSV_HEADER: [&str; 8] = [
    "tracking_id",
    "source_id",
    "data_type",
    "started_at",
    "finalized_at",
    "latency_ms",
    "success",
    "steps",
];

/// One exported CSV row; field order follows [`CSV_HEADER`]
#[derive(Serialize)]
struct CsvRow<'a> {
    tracking_id: String,
    source_id: &'a str,
    data_type: &'a str,
    started_at: u64,
    finalized_at: Option<u64>,
    latency_ms: Option<u64>,
    success: Option<bool>,
    steps: String,
}

impl<'a> From<&'a LineageRecord> for CsvRow<'a> {
    fn from(record: &'a LineageRecord) -> Self {
        Self {
            tracking_id: record.id.to_string(),
            source_id: &record.source_id,
            data_type: &record.data_type,
            started_at: record.started_at,
            finalized_at: record.finalized_at,
            latency_ms: record.latency_ms,
            success: record.success,
            steps: record.step_summary(),
        }
    }
}

/// Serialize `records` in `format`
pub fn export_records(records: &[LineageRecord], format: ExportFormat) -> Result<String, LineageError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => to_csv(records),
    }
}

fn to_csv(records: &[LineageRecord]) -> Result<String, LineageError> {
    // Header is written explicitly so an empty export still carries it
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    let bytes = writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
