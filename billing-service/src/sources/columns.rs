use std::fmt;

use super::IngestError;

/// Header names accepted for the timestamp column.
pub const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "datetime", "time", "date", "時間", "時戳", "日期時間"];

/// Header names accepted for the usage column.
pub const USAGE_ALIASES: &[&str] = &[
    "usage_kwh",
    "usage",
    "kwh",
    "consumption",
    "reading",
    "用電度數",
    "用量",
    "度數",
    "讀數",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Timestamp,
    Usage,
}

impl ColumnRole {
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Timestamp => TIMESTAMP_ALIASES,
            Self::Usage => USAGE_ALIASES,
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timestamp => "timestamp",
            Self::Usage => "usage",
        })
    }
}

/// Column indices of the detected roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedColumns {
    pub timestamp: usize,
    pub usage: usize,
}

/// Index of the first header matching one of the role's aliases
/// (trimmed, case-insensitive).
pub fn find_column<S: AsRef<str>>(headers: &[S], role: ColumnRole) -> Option<usize> {
    headers.iter().position(|h| {
        let name = h.as_ref().trim().to_lowercase();
        role.aliases().iter().any(|alias| *alias == name)
    })
}

/// Detects both roles. Timestamp is reported first when both are missing.
pub fn detect_columns<S: AsRef<str>>(headers: &[S]) -> Result<DetectedColumns, IngestError> {
    let lookup = |role| find_column(headers, role).ok_or_else(|| IngestError::detection(role));

    Ok(DetectedColumns {
        timestamp: lookup(ColumnRole::Timestamp)?,
        usage: lookup(ColumnRole::Usage)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_aliases_case_insensitively() {
        let cols = detect_columns(&[" Reading ", "DateTime", "usage"]).unwrap();
        assert_eq!(cols, DetectedColumns { timestamp: 1, usage: 0 });
    }

    #[test]
    fn first_matching_column_wins() {
        let cols = detect_columns(&["date", "kwh", "time", "usage_kwh"]).unwrap();
        assert_eq!(cols, DetectedColumns { timestamp: 0, usage: 1 });
    }

    #[test]
    fn accepts_chinese_headers() {
        let cols = detect_columns(&["時間", "用電度數"]).unwrap();
        assert_eq!(cols, DetectedColumns { timestamp: 0, usage: 1 });
    }

    #[test]
    fn does_not_match_substrings() {
        assert_eq!(find_column(&["timestamp_utc", "kwh_total"], ColumnRole::Timestamp), None);
        assert_eq!(find_column(&["timestamp_utc", "kwh_total"], ColumnRole::Usage), None);
    }

    #[test]
    fn timestamp_is_reported_before_usage() {
        let err = detect_columns(&["foo", "bar"]).unwrap_err();
        assert!(matches!(err, IngestError::Detection { role: ColumnRole::Timestamp, .. }));
        assert!(err.to_string().starts_with("Cannot detect timestamp column. Expected one of: timestamp"));

        let err = detect_columns(&["time", "bar"]).unwrap_err();
        assert!(matches!(err, IngestError::Detection { role: ColumnRole::Usage, .. }));
        assert!(err.to_string().contains("用電度數"));
    }
}
