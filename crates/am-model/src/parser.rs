//! Extraction of physical quantities from the model's two output streams.
//!
//! stdout carries one spectrum line per frequency (`f tau Tb`). stderr
//! carries a commented summary of column densities in molecules cm^-2:
//!
//! ```text
//! #   h2o  6.6854e+21 cm^-2
//! #   lwp_abs_Rayleigh  3.3427e+20 cm^-2
//! #   o3  6.7170e+18 cm^-2
//! ```

use crate::error::{AmError, AmResult};

/// Column density of 1 mm of precipitable water, cm^-2.
pub const MM_PWV: f64 = 3.3427e21;
/// Column density of 1 kg m^-2 of condensed water, cm^-2.
pub const KG_ON_M2: f64 = 3.3427e21;
/// Column density of one Dobson unit of ozone, cm^-2.
pub const DOBSON_UNIT: f64 = 2.6868e16;

/// Calibrated model output for one forecast hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelResult {
    /// Zenith opacity at the reference frequency
    pub tau: f64,
    /// Brightness temperature, K
    pub tb: f64,
    /// Precipitable water vapour, mm
    pub pwv: f64,
    /// Liquid water path, kg m^-2
    pub lwp: f64,
    /// Ice water path, kg m^-2
    pub iwp: f64,
    /// Ozone column, DU
    pub o3: f64,
}

#[derive(Debug, Default)]
struct ColumnTotals {
    h2o: Option<f64>,
    lwp: Option<f64>,
    iwp: Option<f64>,
    o3: Option<f64>,
}

/// Parse the streams of a run that exited 0 or 1.
///
/// Missing condensate or ozone columns are zero. A missing or malformed
/// spectrum line or water vapour column means the run is unusable.
pub fn parse_output(stdout: &str, stderr: &str) -> AmResult<ModelResult> {
    let totals = scan_columns(stderr)?;
    let (tau, tb) = scan_spectrum(stdout)?;
    let h2o = totals
        .h2o
        .ok_or_else(|| AmError::OutputIncomplete("no h2o column in am stderr".to_string()))?;

    Ok(ModelResult {
        tau,
        tb,
        pwv: h2o / MM_PWV,
        lwp: totals.lwp.unwrap_or(0.0) / KG_ON_M2,
        iwp: totals.iwp.unwrap_or(0.0) / KG_ON_M2,
        o3: totals.o3.unwrap_or(0.0) / DOBSON_UNIT,
    })
}

fn scan_columns(stderr: &str) -> AmResult<ColumnTotals> {
    let mut totals = ColumnTotals::default();
    for line in stderr.lines().filter(|l| l.starts_with('#')) {
        // later summaries supersede earlier ones
        if line.contains("h2o") {
            totals.h2o = Some(column_value(line)?);
        }
        if line.contains("lwp_abs_Rayleigh") {
            totals.lwp = Some(column_value(line)?);
        }
        if line.contains("iwp_abs_Rayleigh") {
            totals.iwp = Some(column_value(line)?);
        }
        if line.contains("o3") {
            totals.o3 = Some(column_value(line)?);
        }
    }
    Ok(totals)
}

/// Third whitespace-separated token of a summary line.
fn column_value(line: &str) -> AmResult<f64> {
    line.split_whitespace()
        .nth(2)
        .and_then(|token| token.parse::<f64>().ok())
        .ok_or_else(|| AmError::OutputIncomplete(format!("unparseable column line: {line:?}")))
}

fn scan_spectrum(stdout: &str) -> AmResult<(f64, f64)> {
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| AmError::OutputIncomplete("empty am stdout".to_string()))?;
    let mut tokens = line.split_whitespace().skip(1);
    let mut next = |name: &str| {
        tokens
            .next()
            .and_then(|t| t.parse::<f64>().ok())
            .ok_or_else(|| AmError::OutputIncomplete(format!("no {name} in am stdout: {line:?}")))
    };
    let tau = next("tau")?;
    let tb = next("Tb")?;
    Ok((tau, tb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::am_output::{STDERR, STDERR_WITHOUT_H2O, STDOUT};
    use test_utils::{assert_approx_eq, assert_rel_eq};

    #[test]
    fn test_parse_fixture() {
        let result = parse_output(STDOUT, STDERR).unwrap();
        assert_approx_eq!(result.tau, 7.6246e-2, 1e-12);
        assert_approx_eq!(result.tb, 23.999, 1e-9);
        assert_rel_eq!(result.pwv, 2.0, 1e-9);
        assert_rel_eq!(result.lwp, 0.1, 1e-9);
        assert_eq!(result.iwp, 0.0);
        assert_rel_eq!(result.o3, 250.0, 1e-9);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let stderr = "#   h2o  1.0e+21 cm^-2\n\
                      #   iwp_abs_Rayleigh  1.0e+20 cm^-2\n\
                      # total\n\
                      #   h2o  3.3427e+21 cm^-2\n\
                      #   iwp_abs_Rayleigh  6.6854e+20 cm^-2\n";
        let result = parse_output(STDOUT, stderr).unwrap();
        assert_rel_eq!(result.pwv, 1.0, 1e-9);
        assert_rel_eq!(result.iwp, 0.2, 1e-9);
        assert_eq!(result.lwp, 0.0);
        assert_eq!(result.o3, 0.0);
    }

    #[test]
    fn test_uncommented_lines_ignored() {
        let stderr = "! Warning: h2o 1 2\n#   h2o  3.3427e+21 cm^-2\n";
        let result = parse_output(STDOUT, stderr).unwrap();
        assert_rel_eq!(result.pwv, 1.0, 1e-9);
    }

    #[test]
    fn test_missing_h2o_is_incomplete() {
        let err = parse_output(STDOUT, STDERR_WITHOUT_H2O).unwrap_err();
        assert!(matches!(err, AmError::OutputIncomplete(_)));
    }

    #[test]
    fn test_missing_spectrum_is_incomplete() {
        assert!(matches!(
            parse_output("", STDERR),
            Err(AmError::OutputIncomplete(_))
        ));
        assert!(matches!(
            parse_output("225 7.6e-02\n", STDERR),
            Err(AmError::OutputIncomplete(_))
        ));
        assert!(matches!(
            parse_output("225 nope 2.4e+01\n", STDERR),
            Err(AmError::OutputIncomplete(_))
        ));
    }

    #[test]
    fn test_malformed_column_is_incomplete() {
        let err = parse_output(STDOUT, "#   h2o\n").unwrap_err();
        assert!(err.to_string().contains("unparseable"));
    }
}
