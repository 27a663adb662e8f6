//! Usage normalization: every accepted payload shape becomes a
//! [`UsageSeries`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tariff_client::{CanonicalFrequency, UsagePoint, UsageSeries};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::sources::{parse_timestamp, IngestError, UsageCsvParser};

/// Usage as it arrives on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsagePayload {
    /// `list`, `dict`, `series` or `csv`. Inferred from `data` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub data: Value,
    /// Start of a plain value list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<CanonicalFrequency>,
}

/// The usage shapes the normalizer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageInput {
    /// Values on a regular grid.
    List {
        values: Vec<f64>,
        start: Option<PrimitiveDateTime>,
        freq: CanonicalFrequency,
    },
    /// Timestamp text → kWh, in payload order.
    Mapping(Vec<(String, f64)>),
    /// Already canonical.
    Series(UsageSeries),
    /// Raw delimited text.
    Csv(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Mapping,
    Series,
    Csv,
}

impl Shape {
    fn from_format(format: &str) -> Option<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "list" => Some(Self::List),
            "dict" | "mapping" => Some(Self::Mapping),
            "series" => Some(Self::Series),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    fn of(data: &Value) -> Option<Self> {
        match data {
            Value::Array(items) if items.iter().all(Value::is_number) => Some(Self::List),
            Value::Array(items) if items.iter().all(Value::is_object) => Some(Self::Series),
            Value::Object(_) => Some(Self::Mapping),
            Value::String(_) => Some(Self::Csv),
            _ => None,
        }
    }
}

fn describe(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "mixed array",
        Value::Object(_) => "object",
    }
}

fn unsupported(data: &Value) -> IngestError {
    IngestError::UnsupportedFormat(format!("Unsupported usage data format: {}", describe(data)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UsageNormalizer {
    parser: UsageCsvParser,
}

impl UsageNormalizer {
    pub fn new(parser: UsageCsvParser) -> Self {
        Self { parser }
    }

    pub fn local_offset(&self) -> UtcOffset {
        self.parser.local_offset()
    }

    /// Decides the payload's shape once. An explicit `format` must agree
    /// with the shape of `data`.
    pub fn decode(&self, payload: &UsagePayload) -> Result<UsageInput, IngestError> {
        let detected = Shape::of(&payload.data);
        let shape = match payload.format.as_deref() {
            None => detected.ok_or_else(|| unsupported(&payload.data))?,
            Some(format) => {
                let declared = Shape::from_format(format).ok_or_else(|| {
                    IngestError::UnsupportedFormat(format!("Unsupported usage data format: '{format}'"))
                })?;
                // An empty array fits every array shape.
                let empty_array = payload.data.as_array().is_some_and(|a| a.is_empty());
                let agrees = detected == Some(declared)
                    || (empty_array && matches!(declared, Shape::List | Shape::Series));
                if !agrees {
                    return Err(IngestError::UnsupportedFormat(format!(
                        "usage format '{format}' does not match the supplied data ({})",
                        describe(&payload.data)
                    )));
                }
                declared
            }
        };

        match shape {
            Shape::List => {
                let values = payload
                    .data
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_f64).collect())
                    .unwrap_or_default();
                let start = payload
                    .start
                    .as_deref()
                    .map(|s| {
                        parse_timestamp(s, self.local_offset())
                            .ok_or_else(|| IngestError::Parse(format!("invalid start timestamp '{s}'")))
                    })
                    .transpose()?;
                Ok(UsageInput::List {
                    values,
                    start,
                    freq: payload.freq.unwrap_or_default(),
                })
            }
            Shape::Mapping => {
                let entries = payload
                    .data
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(key, value)| {
                                value.as_f64().map(|v| (key.clone(), v)).ok_or_else(|| {
                                    IngestError::Parse(format!("usage value for '{key}' is not a number"))
                                })
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?
                    .unwrap_or_default();
                Ok(UsageInput::Mapping(entries))
            }
            Shape::Series => {
                let points: Vec<UsagePoint> = serde_json::from_value(payload.data.clone())
                    .map_err(|e| IngestError::Parse(format!("invalid usage series: {e}")))?;
                Ok(UsageInput::Series(UsageSeries::new(points)?))
            }
            Shape::Csv => match &payload.data {
                Value::String(text) => Ok(UsageInput::Csv(text.clone())),
                other => Err(unsupported(other)),
            },
        }
    }

    pub fn normalize(&self, input: UsageInput) -> Result<UsageSeries, IngestError> {
        match input {
            UsageInput::List { values, start, freq } => {
                if values.is_empty() {
                    return Err(IngestError::EmptySeries("usage data contains no values".to_string()));
                }
                let start = start.unwrap_or_else(|| self.default_start());
                Ok(UsageSeries::from_values(start, freq, &values)?)
            }
            UsageInput::Mapping(entries) => {
                if entries.is_empty() {
                    return Err(IngestError::EmptySeries("usage data contains no values".to_string()));
                }
                let points = entries
                    .into_iter()
                    .map(|(key, usage_kwh)| {
                        parse_timestamp(&key, self.local_offset())
                            .map(|timestamp| UsagePoint { timestamp, usage_kwh })
                            .ok_or_else(|| IngestError::Parse(format!("invalid timestamp key '{key}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(UsageSeries::from_unsorted(points)?)
            }
            UsageInput::Series(series) => Ok(series),
            UsageInput::Csv(text) => Ok(self.parser.parse_str(&text)?.series),
        }
    }

    pub fn normalize_payload(&self, payload: &UsagePayload) -> Result<UsageSeries, IngestError> {
        self.normalize(self.decode(payload)?)
    }

    /// Midnight on the first day of the current month, local time.
    fn default_start(&self) -> PrimitiveDateTime {
        let today = OffsetDateTime::now_utc().to_offset(self.local_offset()).date();
        let first = Date::from_calendar_date(today.year(), today.month(), 1).unwrap_or(today);
        PrimitiveDateTime::new(first, Time::MIDNIGHT)
    }
}
