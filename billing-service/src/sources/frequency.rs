use tariff_client::CanonicalFrequency;
use time::{Duration, PrimitiveDateTime};

/// Classifies the median spacing of `timestamps`.
///
/// - fewer than two timestamps: `1h`
/// - median delta ≤ 15 min: `15min`
/// - median delta ≤ 1 h: `1h`
/// - otherwise `1D`
///
/// For an even number of deltas the median is the mean of the two middle ones.
pub fn infer_frequency(timestamps: &[PrimitiveDateTime]) -> CanonicalFrequency {
    if timestamps.len() < 2 {
        return CanonicalFrequency::Hourly;
    }

    let mut deltas: Vec<Duration> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    deltas.sort();
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2
    } else {
        deltas[mid]
    };

    if median <= Duration::minutes(15) {
        CanonicalFrequency::FifteenMinutes
    } else if median <= Duration::hours(1) {
        CanonicalFrequency::Hourly
    } else {
        CanonicalFrequency::Daily
    }
}
