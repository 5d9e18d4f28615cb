// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Trailing, unweighted mean of the most recent `period` values:
//
//   SMA_i = (x_{i-period+1} + ... + x_i) / period     for i >= period - 1
//
// No partial-window averaging: the first `period - 1` positions are `None`.
// =============================================================================

/// Compute the trailing SMA for every position of `values`.
///
/// The output has exactly `values.len()` elements.
///
/// # Edge cases
/// - `period == 0` => every position is `None`
/// - `values.len() < period` => every position is `None`
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}
