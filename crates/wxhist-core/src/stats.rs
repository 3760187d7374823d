//! Statistics kernels over one series window.
//!
//! Direct aggregates (max, min, mean, deviation) are computed by the store in
//! a single query; the helpers here cover what SQL does not give directly.

use std::collections::BTreeMap;

use wxhist_store::ValueFrequency;

/// Divisor turning a window maximum of strike counts into an hourly peak.
pub const HOURLY_MAX_FACTOR: f64 = 3.0;

/// Median of values sorted in ascending order.
///
/// Odd counts take the middle value; even counts average the two middle
/// values. Returns `None` for an empty slice.
///
/// ```
/// use wxhist_core::stats::median;
///
/// assert_eq!(median(&[1.0, 3.0, 7.0]), Some(3.0));
/// assert_eq!(median(&[1.0, 3.0, 5.0, 7.0]), Some(4.0));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Which end of the frequency distribution to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyPick {
    /// Value with the highest occurrence count.
    MostFrequent,
    /// Value with the lowest occurrence count.
    LeastFrequent,
}

/// Pick a value by occurrence count. Ties go to the lowest value.
///
/// ```
/// use wxhist_core::stats::{FrequencyPick, pick_by_frequency, value_frequencies};
///
/// let freqs = value_frequencies(&[10.0, 10.0, 10.0, 20.0, 20.0, 30.0]);
/// assert_eq!(pick_by_frequency(&freqs, FrequencyPick::MostFrequent), Some(10.0));
/// assert_eq!(pick_by_frequency(&freqs, FrequencyPick::LeastFrequent), Some(30.0));
/// ```
pub fn pick_by_frequency(frequencies: &[ValueFrequency], pick: FrequencyPick) -> Option<f64> {
    frequencies
        .iter()
        .min_by(|a, b| {
            let by_count = match pick {
                FrequencyPick::MostFrequent => b.count.cmp(&a.count),
                FrequencyPick::LeastFrequent => a.count.cmp(&b.count),
            };
            by_count.then_with(|| a.value.total_cmp(&b.value))
        })
        .map(|f| f.value)
}

/// Occurrence count of each distinct value, in ascending value order.
pub fn value_frequencies(values: &[f64]) -> Vec<ValueFrequency> {
    let mut counts: BTreeMap<u64, (f64, u64)> = BTreeMap::new();
    for &value in values {
        counts.entry(order_key(value)).or_insert((value, 0)).1 += 1;
    }
    counts
        .into_values()
        .map(|(value, count)| ValueFrequency { value, count })
        .collect()
}

// Bit pattern whose unsigned order matches the total order of f64.
fn order_key(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits >> 63 == 1 { !bits } else { bits | (1 << 63) }
}

/// Window maximum scaled to an hourly peak.
pub fn hourly_max(max: f64) -> f64 {
    max / HOURLY_MAX_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        assert_eq!(median(&[3.0]), Some(3.0));
        assert_eq!(median(&[1.0, 2.0, 9.0]), Some(2.0));
    }

    #[test]
    fn test_median_even_averages_middle_pair() {
        assert_eq!(median(&[14.0, 15.0, 18.0, 20.0]), Some(16.5));
        assert_eq!(median(&[1.0, 2.0]), Some(1.5));
    }

    #[test]
    fn test_median_small_runs() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(3.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
    }

    #[test]
    fn test_frequencies_in_value_order() {
        let freqs = value_frequencies(&[20.0, -1.5, 10.0, 20.0, 0.0, -1.5, 20.0]);
        let pairs: Vec<_> = freqs.iter().map(|f| (f.value, f.count)).collect();
        assert_eq!(pairs, vec![(-1.5, 2), (0.0, 1), (10.0, 1), (20.0, 3)]);
    }

    #[test]
    fn test_pick_by_frequency_tie_goes_to_lowest_value() {
        let freqs = value_frequencies(&[4.0, 4.0, 2.0, 2.0, 7.0]);
        assert_eq!(pick_by_frequency(&freqs, FrequencyPick::MostFrequent), Some(2.0));

        let freqs = value_frequencies(&[9.0, 3.0, 5.0, 5.0]);
        assert_eq!(pick_by_frequency(&freqs, FrequencyPick::LeastFrequent), Some(3.0));
    }

    #[test]
    fn test_pick_by_frequency_ignores_input_order() {
        let freqs = vec![
            ValueFrequency { value: 30.0, count: 2 },
            ValueFrequency { value: 10.0, count: 2 },
        ];
        assert_eq!(pick_by_frequency(&freqs, FrequencyPick::MostFrequent), Some(10.0));
    }

    #[test]
    fn test_pick_by_frequency_empty() {
        assert_eq!(pick_by_frequency(&[], FrequencyPick::MostFrequent), None);
    }

    #[test]
    fn test_hourly_max() {
        assert_eq!(hourly_max(12.0), 4.0);
        assert_eq!(hourly_max(0.0), 0.0);
    }

    #[test]
    fn test_hourly_max_of_readings() {
        let max = [3.0, 6.0, 9.0].into_iter().fold(f64::MIN, f64::max);
        assert_eq!(hourly_max(max), 3.0);
    }
}
