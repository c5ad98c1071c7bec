//! G-code word formatting.
//!
//! Coordinates and feeds print the way the legacy emitter did: integral
//! values without a decimal point, fractional values with up to six places
//! and trailing zeros trimmed. Feeds convert units/second to units/minute.

/// Format a coordinate or parameter value.
pub fn num(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Format a feed word value: `speed` in units/second, emitted in units/minute.
pub fn feed(speed: f64) -> String {
    num(speed * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_values_have_no_decimal_point() {
        assert_eq!(num(10.0), "10");
        assert_eq!(num(0.0), "0");
        assert_eq!(num(-3.0), "-3");
    }

    #[test]
    fn fractional_values_trim_trailing_zeros() {
        assert_eq!(num(7.5), "7.5");
        assert_eq!(num(0.25), "0.25");
        assert_eq!(num(-0.125), "-0.125");
        assert_eq!(num(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn feed_converts_to_units_per_minute() {
        assert_eq!(feed(5.0), "300");
        assert_eq!(feed(0.5), "30");
        assert_eq!(feed(2.5), "150");
    }
}
