use std::{collections::HashMap, ops::Index};

use serde::{ser::SerializeMap, Serialize, Serializer};

use super::{
    columns::detect_columns,
    csv_upload::{decode, parse_usage, read_table, RawTable, UsageCsvParser},
    timestamp::parse_timestamp,
};

const PREVIEW_ROWS: usize = 5;

/// Cell values read as "missing" rather than "not a number".
const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvPreview {
    /// Header names in file order; repeats are suffixed `.1`, `.2`, ...
    pub columns: Vec<String>,
    pub rows: Vec<PreviewRow>,
}

/// One preview row, serialized as a JSON object in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow(pub Vec<(String, String)>);

impl PreviewRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v.as_str())
    }
}

impl Index<&str> for PreviewRow {
    type Output = str;

    fn index(&self, column: &str) -> &str {
        self.get(column).unwrap_or_default()
    }
}

impl Serialize for PreviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Makes repeated header names unique: `a, a, a` becomes `a, a.1, a.2`.
fn unique_columns(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    headers
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_str()).or_insert(0);
            let unique = if *count == 0 {
                name.clone()
            } else {
                format!("{name}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

/// Outcome of a dry-run check of an upload. Problems are reported, never
/// raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub preview: Option<CsvPreview>,
}

impl ValidationReport {
    fn rejected(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
            preview: None,
        }
    }
}

impl UsageCsvParser {
    pub fn validate(&self, content: &[u8]) -> ValidationReport {
        let text = match decode(content) {
            Ok(text) => text,
            Err(e) => return ValidationReport::rejected(e.to_string()),
        };
        let table = match read_table(text) {
            Ok(table) => table,
            Err(e) => return ValidationReport::rejected(format!("Failed to parse CSV: {e}")),
        };
        if table.rows.is_empty() {
            return ValidationReport::rejected("CSV file is empty".to_string());
        }
        let cols = match detect_columns(&table.headers) {
            Ok(cols) => cols,
            Err(e) => return ValidationReport::rejected(e.to_string()),
        };

        let mut nulls = 0usize;
        let mut non_numeric = 0usize;
        let mut negative = false;
        let mut bad_timestamps = 0usize;
        for row in &table.rows {
            let cell = RawTable::cell(row, cols.usage).trim();
            if NULL_MARKERS.contains(&cell) {
                nulls += 1;
            } else {
                match parse_usage(cell) {
                    Some(v) if v < 0.0 => negative = true,
                    Some(_) => {}
                    None => non_numeric += 1,
                }
            }
            if parse_timestamp(RawTable::cell(row, cols.timestamp), self.local_offset()).is_none() {
                bad_timestamps += 1;
            }
        }

        let mut warnings = Vec::new();
        if nulls > 0 {
            warnings.push(format!("{nulls} rows with null usage values"));
        }
        if negative {
            warnings.push("Some rows have negative usage values".to_string());
        }
        if non_numeric > 0 {
            warnings.push(format!("{non_numeric} rows with non-numeric usage values will be dropped"));
        }
        if bad_timestamps > 0 {
            warnings.push(format!("{bad_timestamps} rows have unparseable timestamps"));
        }

        ValidationReport {
            valid: true,
            errors: Vec::new(),
            warnings,
            preview: Some(preview(&table)),
        }
    }
}

fn preview(table: &RawTable) -> CsvPreview {
    let columns = unique_columns(&table.headers);
    let rows = table
        .rows
        .iter()
        .take(PREVIEW_ROWS)
        .map(|row| {
            PreviewRow(
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, name)| (name.clone(), RawTable::cell(row, idx).to_string()))
                    .collect(),
            )
        })
        .collect();

    CsvPreview { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(csv: &str) -> ValidationReport {
        UsageCsvParser::default().validate(csv.as_bytes())
    }

    #[test]
    fn clean_file_is_valid_with_preview() {
        let mut csv = String::from("timestamp,usage_kwh\n");
        for h in 0..8 {
            csv.push_str(&format!("2025-07-01 {h:02}:00,1.0\n"));
        }
        let report = validate(&csv);

        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        let preview = report.preview.unwrap();
        assert_eq!(preview.columns, vec!["timestamp", "usage_kwh"]);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(&preview.rows[2]["timestamp"], "2025-07-01 02:00");
        assert_eq!(&preview.rows[2]["usage_kwh"], "1.0");
    }

    #[test]
    fn soft_problems_are_warnings() {
        let report = validate(
            "timestamp,usage_kwh\n\
             2025-07-01 00:00,\n\
             2025-07-01 01:00,NA\n\
             2025-07-01 02:00,-0.5\n\
             2025-07-01 03:00,lots\n\
             later,1.0\n",
        );

        assert!(report.valid);
        assert_eq!(
            report.warnings,
            vec![
                "2 rows with null usage values".to_string(),
                "Some rows have negative usage values".to_string(),
                "1 rows with non-numeric usage values will be dropped".to_string(),
                "1 rows have unparseable timestamps".to_string(),
            ]
        );
        assert!(report.preview.is_some());
    }

    #[test]
    fn hard_errors_invalidate_without_preview() {
        let empty = validate("timestamp,usage_kwh\n");
        assert!(!empty.valid);
        assert_eq!(empty.errors, vec!["CSV file is empty".to_string()]);
        assert!(empty.preview.is_none());

        let undetected = validate("when,value\n2025-07-01,1\n");
        assert!(!undetected.valid);
        assert!(undetected.errors[0].starts_with("Cannot detect timestamp column"));
        assert!(undetected.preview.is_none());

        let garbled = UsageCsvParser::default().validate(&[0xff, 0xfe, 0x00]);
        assert!(!garbled.valid);
        assert!(garbled.errors[0].starts_with("Failed to parse CSV"));
    }

    #[test]
    fn ragged_rows_preview_as_empty_cells() {
        let report = validate("timestamp,usage_kwh,note\n2025-07-01 00:00,1\n");
        let preview = report.preview.unwrap();
        assert_eq!(&preview.rows[0]["note"], "");
    }

    #[test]
    fn preview_keeps_file_column_order_and_repeated_headers() {
        let report = validate("usage_kwh,timestamp,note,note
1.5,2025-07-01 00:00,a,b
");
        let preview = report.preview.unwrap();

        assert_eq!(preview.columns, vec!["usage_kwh", "timestamp", "note", "note.1"]);
        assert_eq!(&preview.rows[0]["note"], "a");
        assert_eq!(&preview.rows[0]["note.1"], "b");

        let json = serde_json::to_string(&preview.rows[0]).unwrap();
        assert_eq!(
            json,
            r#"{"usage_kwh":"1.5","timestamp":"2025-07-01 00:00","note":"a","note.1":"b"}"#
        );
    }
}
