//! Small numeric helpers shared by the engine.

/// Returns the `p`-th quantile of `values` using linear interpolation
/// between closest ranks.
///
/// With sorted values `x[0..n]`, the quantile sits at position `p * (n - 1)`.
/// NaN values are ignored. Returns `None` when fewer than one finite value
/// remains or `p` lies outside [0, 1].
///
/// # Example
///
/// ```rust
/// use fcindex_core::stats::quantile;
///
/// let q = quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.2).unwrap();
/// assert!((q - 1.8).abs() < 1e-12);
/// ```
#[must_use]
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if !(0.0..=1.0).contains(&p) {
        return None;
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Returns true if `a <= b + tolerance`.
#[must_use]
pub fn le_within(a: f64, b: f64, tolerance: f64) -> bool {
    a <= b + tolerance
}

/// Returns true if `|a - b| < tolerance`.
#[must_use]
pub fn close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}
