//! Number formatting shared by the model input and the output table.
//!
//! Rust's `{:e}` writes `1.5e-5`; the table and the `am` layer text use the
//! C-style `1.5e-05` with an explicit sign and at least two exponent digits.

/// Format `value` in scientific notation with `precision` mantissa digits.
pub fn format_sci(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => raw,
    }
}

/// [`format_sci`], right-aligned to `width` columns.
pub fn format_sci_width(value: f64, precision: usize, width: usize) -> String {
    format!("{:>width$}", format_sci(value, precision), width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_and_large_exponents() {
        assert_eq!(format_sci(7.6246e-2, 4), "7.6246e-02");
        assert_eq!(format_sci(23.999, 4), "2.3999e+01");
        assert_eq!(format_sci(5e-6, 3), "5.000e-06");
        assert_eq!(format_sci(1.5e120, 1), "1.5e+120");
    }

    #[test]
    fn test_zero_and_negative() {
        assert_eq!(format_sci(0.0, 4), "0.0000e+00");
        assert_eq!(format_sci(-276.55, 4), "-2.7655e+02");
    }

    #[test]
    fn test_width_padding() {
        assert_eq!(format_sci_width(0.0, 4, 12), "  0.0000e+00");
        assert_eq!(format_sci_width(f64::NAN, 4, 12), "         nan");
    }
}
