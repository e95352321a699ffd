//! Small numeric helpers shared by the classifiers and detectors
//!
//! Every function here is total: empty slices and zero medians come back as
//! `None`/empty rather than NaN or a panic.

use chrono::NaiveDate;

/// Median of a slice, `None` when empty
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Day gaps between consecutive dates; input must already be sorted
pub fn day_gaps(dates: &[NaiveDate]) -> Vec<i64> {
    dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect()
}

/// Relative deviation of each value from a reference, `None` when the
/// reference is zero or not finite
pub fn relative_deviations(values: &[f64], reference: f64) -> Option<Vec<f64>> {
    if reference == 0.0 || !reference.is_finite() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|v| (v - reference).abs() / reference.abs())
            .collect(),
    )
}

/// True when every value sits within `tolerance` (relative) of the reference
pub fn all_within(values: &[f64], reference: f64, tolerance: f64) -> bool {
    match relative_deviations(values, reference) {
        Some(devs) => devs.iter().all(|d| *d <= tolerance),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_handles_empty_and_parity() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[1.0, 3.0]), Some(2.0));
        assert_eq!(median(&[1.0, 100.0, 3.0]), Some(3.0));
    }

    #[test]
    fn test_day_gaps() {
        let d = |s: &str| s.parse::<NaiveDate>().unwrap();
        let dates = vec![d("2024-01-01"), d("2024-01-31"), d("2024-03-01")];
        assert_eq!(day_gaps(&dates), vec![30, 30]);
        assert!(day_gaps(&dates[..1]).is_empty());
    }

    #[test]
    fn test_zero_reference_is_guarded() {
        assert_eq!(relative_deviations(&[1.0], 0.0), None);
        assert!(!all_within(&[1.0], 0.0, 0.1));
    }

    #[test]
    fn test_all_within() {
        assert!(all_within(&[95.0, 100.0, 105.0], 100.0, 0.10));
        assert!(!all_within(&[89.0, 100.0], 100.0, 0.10));
    }
}
