/// Percentile over an ascending-sorted sample set, using linear interpolation between the
/// two closest ranks.
///
/// With `n` samples the fractional rank is `r = p / 100 * (n - 1)`; the result is
/// `v[floor(r)] + (v[ceil(r)] - v[floor(r)]) * (r - floor(r))`. `p` is clamped to `0..=100`.
/// Returns `None` for an empty sample set.
pub fn percentile_linear(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    if last == 0 {
        return sorted.first().copied();
    }

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = p / 100.0 * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;

    let lo_v = *sorted.get(lo.min(last))?;
    let hi_v = *sorted.get(hi.min(last))?;
    Some(lo_v + (hi_v - lo_v) * (rank - lo as f64))
}
