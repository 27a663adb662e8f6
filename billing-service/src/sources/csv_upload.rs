use serde::Serialize;
use tariff_client::{domain::iso_local, CanonicalFrequency, UsagePoint, UsageSeries};
use time::{macros::offset, PrimitiveDateTime, UtcOffset};

use super::{columns::detect_columns, frequency::infer_frequency, timestamp::parse_timestamp, IngestError};
use crate::rounding::round2;

/// Header plus data rows of a delimited upload. Rows may be ragged.
#[derive(Debug, Clone)]
pub(crate) struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Cell `idx` of `row`; missing cells read as empty.
    pub fn cell(row: &[String], idx: usize) -> &str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Decodes upload bytes as UTF-8 and strips a leading byte-order mark.
pub(crate) fn decode(content: &[u8]) -> Result<&str, IngestError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| IngestError::Parse(format!("Failed to parse CSV: file is not valid UTF-8 ({e})")))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

pub(crate) fn read_table(text: &str) -> Result<RawTable, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, rows })
}

/// Usage cell as a finite number; anything else is invalid.
pub(crate) fn parse_usage(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    #[serde(with = "iso_local")]
    pub start: PrimitiveDateTime,
    #[serde(with = "iso_local")]
    pub end: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStatistics {
    pub total_usage_kwh: f64,
    pub average_hourly: f64,
    pub peak_hourly: f64,
    /// `None` when no rows were dropped.
    pub dropped_rows: Option<usize>,
}

/// Result of ingesting an upload.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedUsage {
    pub data: Vec<f64>,
    #[serde(with = "iso_local")]
    pub start: PrimitiveDateTime,
    pub freq: CanonicalFrequency,
    pub record_count: usize,
    pub date_range: DateRange,
    pub statistics: UsageStatistics,
    /// The ingested rows with their own timestamps.
    #[serde(skip)]
    pub series: UsageSeries,
}

/// Turns delimited text with a timestamp and a usage column into a
/// canonical series.
#[derive(Debug, Clone, Copy)]
pub struct UsageCsvParser {
    local_offset: UtcOffset,
}

impl Default for UsageCsvParser {
    fn default() -> Self {
        Self::new(offset!(+8))
    }
}

impl UsageCsvParser {
    pub fn new(local_offset: UtcOffset) -> Self {
        Self { local_offset }
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.local_offset
    }

    pub fn parse(&self, content: &[u8]) -> Result<ParsedUsage, IngestError> {
        self.parse_str(decode(content)?)
    }

    pub fn parse_str(&self, text: &str) -> Result<ParsedUsage, IngestError> {
        let table = read_table(text)?;
        let cols = detect_columns(&table.headers)?;

        let mut rows = Vec::with_capacity(table.rows.len());
        for (idx, row) in table.rows.iter().enumerate() {
            let raw = RawTable::cell(row, cols.timestamp);
            let ts = parse_timestamp(raw, self.local_offset).ok_or_else(|| {
                IngestError::Parse(format!("Failed to parse timestamp '{raw}' in row {}", idx + 1))
            })?;
            rows.push((ts, RawTable::cell(row, cols.usage)));
        }
        // Stable: rows sharing a timestamp keep file order.
        rows.sort_by_key(|(ts, _)| *ts);

        let total_rows = rows.len();
        let points: Vec<UsagePoint> = rows
            .into_iter()
            .filter_map(|(timestamp, cell)| parse_usage(cell).map(|usage_kwh| UsagePoint { timestamp, usage_kwh }))
            .collect();
        let dropped = total_rows - points.len();

        if points.is_empty() {
            return Err(IngestError::EmptySeries(
                "No valid numeric usage values found in CSV".to_string(),
            ));
        }
        if dropped > 0 {
            metrics::counter!("usage_csv_rows_dropped_total").increment(dropped as u64);
            tracing::info!(dropped_rows = dropped, kept_rows = points.len(), "dropped rows without numeric usage");
        }

        let series = UsageSeries::new(points)?;
        Ok(summarize(series, dropped))
    }
}

fn summarize(series: UsageSeries, dropped: usize) -> ParsedUsage {
    let data = series.values();
    let total = series.total_kwh();
    let peak = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let count = series.len();

    ParsedUsage {
        start: series.start(),
        freq: infer_frequency(&series.timestamps()),
        record_count: count,
        date_range: DateRange {
            start: series.start(),
            end: series.end(),
        },
        statistics: UsageStatistics {
            total_usage_kwh: round2(total),
            average_hourly: round2(total / count as f64),
            peak_hourly: round2(peak),
            dropped_rows: (dropped > 0).then_some(dropped),
        },
        data,
        series,
    }
}
