//! Period-over-period percent change.

/// `(current - previous) / previous * 100`.
///
/// `None` when the previous value is null, zero or non-finite, and when the
/// result is not finite.
pub fn compute_delta(current: f64, previous: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|p| p.is_finite() && *p != 0.0)?;
    let delta = (current - previous) / previous * 100.0;
    delta.is_finite().then_some(delta)
}
