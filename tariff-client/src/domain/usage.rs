use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Duration, PrimitiveDateTime};

/// Wire format for local wall-clock timestamps (`2025-07-01T00:00:00`).
pub const ISO_LOCAL: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Serde adapter rendering `PrimitiveDateTime` with [`ISO_LOCAL`].
pub mod iso_local {
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(ts: &PrimitiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = ts.format(super::ISO_LOCAL).map_err(ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PrimitiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        PrimitiveDateTime::parse(&text, super::ISO_LOCAL).map_err(de::Error::custom)
    }
}

/// Sampling interval of a usage series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalFrequency {
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "1D")]
    Daily,
}

impl CanonicalFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15min",
            Self::Hourly => "1h",
            Self::Daily => "1D",
        }
    }

    /// Distance between consecutive samples.
    pub fn step(&self) -> Duration {
        match self {
            Self::FifteenMinutes => Duration::minutes(15),
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::days(1),
        }
    }
}

impl fmt::Display for CanonicalFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalFrequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "15min" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::Hourly),
            "1D" => Ok(Self::Daily),
            other => Err(format!("unsupported frequency '{other}', expected 15min, 1h or 1D")),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("usage series is empty")]
    Empty,
    #[error("usage series timestamps must be non-decreasing (entry {index} goes back in time)")]
    Unordered { index: usize },
    #[error("usage series runs past the supported date range")]
    OutOfRange,
}

/// One sample: energy consumed in the interval starting at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsagePoint {
    #[serde(with = "iso_local")]
    pub timestamp: PrimitiveDateTime,
    #[serde(alias = "value")]
    pub usage_kwh: f64,
}

/// Canonical, time-ordered usage series.
///
/// Invariants, checked on every constructor:
/// - at least one point;
/// - timestamps are non-decreasing.
///
/// Values may be negative (export, meter corrections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<UsagePoint>", into = "Vec<UsagePoint>")]
pub struct UsageSeries {
    points: Vec<UsagePoint>,
}

impl UsageSeries {
    pub fn new(points: Vec<UsagePoint>) -> Result<Self, SeriesError> {
        if points.is_empty() {
            return Err(SeriesError::Empty);
        }
        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(SeriesError::Unordered { index: index + 1 });
        }
        Ok(Self { points })
    }

    /// Stable-sorts by timestamp before validating, so equal timestamps keep
    /// their input order.
    pub fn from_unsorted(mut points: Vec<UsagePoint>) -> Result<Self, SeriesError> {
        points.sort_by_key(|p| p.timestamp);
        Self::new(points)
    }

    /// Lays `values` on a regular grid `start, start+step, start+2·step, …`.
    pub fn from_values(
        start: PrimitiveDateTime,
        freq: CanonicalFrequency,
        values: &[f64],
    ) -> Result<Self, SeriesError> {
        let step = freq.step();
        let mut points = Vec::with_capacity(values.len());
        let mut ts = start;
        for (idx, &usage_kwh) in values.iter().enumerate() {
            if idx > 0 {
                ts = ts.checked_add(step).ok_or(SeriesError::OutOfRange)?;
            }
            points.push(UsagePoint { timestamp: ts, usage_kwh });
        }
        Self::new(points)
    }

    pub fn points(&self) -> &[UsagePoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UsagePoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> PrimitiveDateTime {
        self.points[0].timestamp
    }

    pub fn end(&self) -> PrimitiveDateTime {
        self.points[self.points.len() - 1].timestamp
    }

    pub fn timestamps(&self) -> Vec<PrimitiveDateTime> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.usage_kwh).collect()
    }

    pub fn total_kwh(&self) -> f64 {
        self.points.iter().map(|p| p.usage_kwh).sum()
    }

    /// Content digest of the series (timestamps and exact value bits).
    pub fn fingerprint(&self) -> String {
        let mut h = blake3::Hasher::new();
        h.update(&(self.points.len() as u64).to_le_bytes());
        for p in &self.points {
            h.update(&p.timestamp.assume_utc().unix_timestamp_nanos().to_le_bytes());
            h.update(&p.usage_kwh.to_bits().to_le_bytes());
        }
        h.finalize().to_hex().to_string()
    }
}

impl TryFrom<Vec<UsagePoint>> for UsageSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<UsagePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<UsageSeries> for Vec<UsagePoint> {
    fn from(series: UsageSeries) -> Self {
        series.points
    }
}

impl<'a> IntoIterator for &'a UsageSeries {
    type Item = &'a UsagePoint;
    type IntoIter = std::slice::Iter<'a, UsagePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn point(ts: PrimitiveDateTime, usage_kwh: f64) -> UsagePoint {
        UsagePoint { timestamp: ts, usage_kwh }
    }

    #[test]
    fn from_values_lays_out_regular_grid() {
        let series = UsageSeries::from_values(
            datetime!(2025-07-31 23:00),
            CanonicalFrequency::FifteenMinutes,
            &[1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.start(), datetime!(2025-07-31 23:00));
        assert_eq!(series.end(), datetime!(2025-08-01 00:00));
        assert_eq!(series.total_kwh(), 15.0);
    }

    #[test]
    fn empty_series_is_rejected() {
        assert_eq!(UsageSeries::new(vec![]), Err(SeriesError::Empty));
        assert_eq!(
            UsageSeries::from_values(datetime!(2025-01-01 00:00), CanonicalFrequency::Hourly, &[]),
            Err(SeriesError::Empty)
        );
    }

    #[test]
    fn unordered_points_are_rejected_but_can_be_sorted() {
        let points = vec![
            point(datetime!(2025-01-01 02:00), 2.0),
            point(datetime!(2025-01-01 01:00), 1.0),
            point(datetime!(2025-01-01 02:00), 3.0),
        ];
        assert_eq!(
            UsageSeries::new(points.clone()),
            Err(SeriesError::Unordered { index: 1 })
        );

        let sorted = UsageSeries::from_unsorted(points).unwrap();
        assert_eq!(sorted.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn negative_values_are_kept() {
        let series = UsageSeries::new(vec![
            point(datetime!(2025-01-01 00:00), 1.5),
            point(datetime!(2025-01-01 01:00), -0.5),
        ])
        .unwrap();
        assert_eq!(series.total_kwh(), 1.0);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = UsageSeries::from_values(datetime!(2025-01-01 00:00), CanonicalFrequency::Hourly, &[1.0, 2.0])
            .unwrap();
        let b = a.clone();
        let c = UsageSeries::from_values(datetime!(2025-01-01 00:00), CanonicalFrequency::Hourly, &[1.0, 2.5])
            .unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn series_serializes_as_point_list() {
        let series =
            UsageSeries::from_values(datetime!(2025-07-01 00:00), CanonicalFrequency::Hourly, &[1.25]).unwrap();
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "timestamp": "2025-07-01T00:00:00", "usage_kwh": 1.25 }])
        );

        let back: UsageSeries = serde_json::from_value(json).unwrap();
        assert_eq!(back, series);

        let unordered = serde_json::json!([
            { "timestamp": "2025-07-01T01:00:00", "usage_kwh": 1.0 },
            { "timestamp": "2025-07-01T00:00:00", "usage_kwh": 1.0 }
        ]);
        assert!(serde_json::from_value::<UsageSeries>(unordered).is_err());
    }

    #[test]
    fn frequency_round_trips_through_its_wire_names() {
        for freq in [
            CanonicalFrequency::FifteenMinutes,
            CanonicalFrequency::Hourly,
            CanonicalFrequency::Daily,
        ] {
            assert_eq!(freq.as_str().parse::<CanonicalFrequency>(), Ok(freq));
            assert_eq!(serde_json::to_value(freq).unwrap(), freq.as_str());
        }
        assert!("2h".parse::<CanonicalFrequency>().is_err());
    }
}
