use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

const OFFSET_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day]T[hour]:[minute][offset_hour sign:mandatory]:[offset_minute]"
    ),
];

// Month, day and hour accept one or two digits.
const NAIVE_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!(
        "[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second].[subsecond]"
    ),
    format_description!("[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]:[second]"),
    format_description!("[year]-[month padding:none]-[day padding:none]T[hour padding:none]:[minute]"),
    format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second].[subsecond]"
    ),
    format_description!("[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]:[second]"),
    format_description!("[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute]"),
    format_description!(
        "[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]:[second]"
    ),
    format_description!("[year]/[month padding:none]/[day padding:none] [hour padding:none]:[minute]"),
];

const DATE_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]-[month padding:none]-[day padding:none]"),
    format_description!("[year]/[month padding:none]/[day padding:none]"),
];

/// Parses a timestamp cell into local wall-clock time.
///
/// Offset-aware values (RFC 3339, `Z` suffix) are shifted to `local_offset`;
/// naive values are taken as already local. Date-only values map to midnight.
pub fn parse_timestamp(text: &str, local_offset: UtcOffset) -> Option<PrimitiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let aware = OffsetDateTime::parse(text, &Rfc3339).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| OffsetDateTime::parse(text, fmt).ok())
    });
    if let Some(ts) = aware {
        let local = ts.to_offset(local_offset);
        return Some(PrimitiveDateTime::new(local.date(), local.time()));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| PrimitiveDateTime::parse(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| Date::parse(text, fmt).ok())
                .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    const TAIPEI: UtcOffset = offset!(+8);

    #[test]
    fn parses_naive_forms() {
        for (text, expected) in [
            ("2025-07-01T13:45:00", datetime!(2025-07-01 13:45)),
            ("2025-07-01 13:45:00", datetime!(2025-07-01 13:45)),
            ("2025-07-01 13:45", datetime!(2025-07-01 13:45)),
            ("2025-07-01T13:45:30.5", datetime!(2025-07-01 13:45:30.5)),
            ("2025/7/1 9:05", datetime!(2025-07-01 09:05)),
            ("2025/07/01 09:05:00", datetime!(2025-07-01 09:05)),
            ("2025-07-01", datetime!(2025-07-01 00:00)),
            ("2025/7/1", datetime!(2025-07-01 00:00)),
            ("2025-07-01 0:00", datetime!(2025-07-01 00:00)),
            ("2025-7-1 00:00", datetime!(2025-07-01 00:00)),
            ("2025-7-1T9:05:00", datetime!(2025-07-01 09:05)),
            ("2025-7-1", datetime!(2025-07-01 00:00)),
        ] {
            assert_eq!(parse_timestamp(text, TAIPEI), Some(expected), "{text}");
        }
    }

    #[test]
    fn offset_aware_values_shift_to_local_time() {
        assert_eq!(
            parse_timestamp("2025-06-30T16:00:00Z", TAIPEI),
            Some(datetime!(2025-07-01 00:00))
        );
        assert_eq!(
            parse_timestamp("2025-07-01T00:00:00+08:00", TAIPEI),
            Some(datetime!(2025-07-01 00:00))
        );
        assert_eq!(
            parse_timestamp("2025-07-01 01:00:00+09:00", TAIPEI),
            Some(datetime!(2025-07-01 00:00))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("", TAIPEI), None);
        assert_eq!(parse_timestamp("   ", TAIPEI), None);
        assert_eq!(parse_timestamp("yesterday", TAIPEI), None);
        assert_eq!(parse_timestamp("2025-13-01", TAIPEI), None);
    }
}
