//! Aggregation helpers for sensor values.

/// Integer mean, `None` for an empty slice.
#[must_use]
pub fn average(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let sum: i128 = values.iter().map(|v| i128::from(*v)).sum();
    let count = i128::try_from(values.len()).ok()?;
    i64::try_from(sum / count).ok()
}

/// Median, averaging the two middle values for an even count.
///
/// `None` for an empty slice.
#[must_use]
pub fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        average(&sorted[middle - 1..=middle])
    } else {
        Some(sorted[middle])
    }
}
