use std::time::Duration;

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.1}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r.is_finite() => format!("{:.2}%", r * 100.0),
        _ => "n/a".to_string(),
    }
}

/// Milliseconds, rendered in the largest unit that keeps them readable.
pub(crate) fn format_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return "n/a".to_string();
    }
    if ms >= 1000.0 {
        return format!("{:.2}s", ms / 1000.0);
    }
    if ms >= 1.0 {
        return format!("{ms:.2}ms");
    }
    format!("{:.0}us", ms * 1000.0)
}

pub(crate) fn format_ms_opt(ms: Option<f64>) -> String {
    ms.map_or_else(|| "-".to_string(), format_ms)
}

/// Single rounded component in one of: us, ms, s.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    // Ties round up.
    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    format!("{}us", round_div(total_ns, NS_PER_US))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_ms_picks_unit() {
        assert_eq!(format_ms(950.5), "950.50ms");
        assert_eq!(format_ms(95050.0), "95.05s");
        assert_eq!(format_ms(0.25), "250us");
        assert_eq!(format_ms_opt(None), "-");
    }

    #[test]
    fn format_duration_rounds_to_single_unit() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "2s");
        assert_eq!(format_duration(Duration::from_micros(2400)), "2ms");
        assert_eq!(format_duration(Duration::from_nanos(900)), "1us");
    }

    #[test]
    fn format_percent_handles_missing_rate() {
        assert_eq!(format_percent(Some(0.25)), "25.00%");
        assert_eq!(format_percent(None), "n/a");
    }
}
