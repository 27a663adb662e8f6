//! Usage ingestion: tabular uploads, column detection, timestamp parsing and
//! sampling-frequency inference.

pub mod columns;
pub mod csv_upload;
pub mod csv_validate;
pub mod frequency;
pub mod timestamp;

pub use columns::{detect_columns, ColumnRole, DetectedColumns};
pub use csv_upload::{DateRange, ParsedUsage, UsageCsvParser, UsageStatistics};
pub use csv_validate::{CsvPreview, PreviewRow, ValidationReport};
pub use frequency::infer_frequency;
pub use timestamp::parse_timestamp;

use tariff_client::SeriesError;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("Cannot detect {role} column. Expected one of: {aliases}")]
    Detection { role: ColumnRole, aliases: String },
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    EmptySeries(String),
    #[error("{0}")]
    UnsupportedFormat(String),
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl IngestError {
    pub fn detection(role: ColumnRole) -> Self {
        Self::Detection {
            role,
            aliases: role.aliases().join(", "),
        }
    }

    /// Stable name reported to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Detection { .. } => "DetectionError",
            Self::Parse(_) | Self::Csv(_) => "ParseError",
            Self::EmptySeries(_) => "EmptySeriesError",
            Self::UnsupportedFormat(_) => "UnsupportedFormatError",
        }
    }
}

impl From<SeriesError> for IngestError {
    fn from(e: SeriesError) -> Self {
        match e {
            SeriesError::Empty => Self::EmptySeries("usage data contains no values".to_string()),
            other => Self::Parse(other.to_string()),
        }
    }
}
