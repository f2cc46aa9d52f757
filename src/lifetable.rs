//! Actuarial life table construction
//!
//! Converts a vector of per-age mortality rates into the full life table via
//! the standard recursion qx -> lx -> dx -> Lx -> Tx -> ex. Person-years in
//! each interval use the trapezoidal approximation, which assumes deaths are
//! uniformly distributed within the interval.

use serde::Serialize;

use crate::error::{EngineError, Result};

/// Default starting cohort size.
pub const DEFAULT_RADIX: f64 = 100_000.0;

/// One row of an actuarial life table.
#[derive(Debug, Clone, Serialize)]
pub struct LifeTableRow {
    /// Exact age at the start of the interval.
    pub age: f64,
    /// Probability of death in [age, age+1).
    pub qx: f64,
    /// Probability of surviving the interval (1 - qx).
    pub px: f64,
    /// Survivors reaching this age out of the starting cohort.
    pub lx: f64,
    /// Deaths within the interval: lx * qx.
    pub dx: f64,
    /// Person-years lived within the interval.
    #[serde(rename = "Lx")]
    pub cap_lx: f64,
    /// Person-years remaining above this age.
    #[serde(rename = "Tx")]
    pub cap_tx: f64,
    /// Life expectancy at this age: Tx / lx (0 once the cohort is exhausted).
    pub ex: f64,
}

/// Builds life tables from parallel age / mortality-rate arrays.
///
/// Preconditions: ages strictly increasing, qx in [0, 1] elementwise,
/// equal lengths. Violations are rejected with `InvalidInput`; callers that
/// read rates from files should rescale before building (see
/// `mortality::normalize_qx`).
#[derive(Debug, Clone)]
pub struct LifeTableBuilder {
    radix: f64,
}

impl LifeTableBuilder {
    /// Builder with the standard 100,000 radix.
    pub fn new() -> Self {
        Self { radix: DEFAULT_RADIX }
    }

    /// Builder with a custom starting cohort size.
    pub fn with_radix(radix: f64) -> Self {
        Self { radix }
    }

    /// Starting cohort size.
    pub fn radix(&self) -> f64 {
        self.radix
    }

    /// Build the life table, one row per input age, ascending.
    pub fn build(&self, ages: &[f64], qx: &[f64]) -> Result<Vec<LifeTableRow>> {
        if ages.len() != qx.len() {
            return Err(EngineError::InvalidInput(format!(
                "ages and qx must have equal length ({} vs {})",
                ages.len(),
                qx.len()
            )));
        }
        if ages.is_empty() {
            return Err(EngineError::InvalidInput("empty mortality series".into()));
        }
        if ages.windows(2).any(|w| w[1] <= w[0]) {
            return Err(EngineError::InvalidInput(
                "ages must be strictly increasing".into(),
            ));
        }
        if qx.iter().any(|&q| !(0.0..=1.0).contains(&q)) {
            return Err(EngineError::InvalidInput(
                "qx values must lie in [0, 1]".into(),
            ));
        }

        let n = ages.len();

        // Forward recursion for survivors and deaths; lx needs one extra
        // slot for the end of the final interval.
        let mut lx = vec![0.0; n + 1];
        let mut dx = vec![0.0; n];
        lx[0] = self.radix;
        for i in 0..n {
            dx[i] = lx[i] * qx[i];
            lx[i + 1] = lx[i] - dx[i];
        }

        // Person-years per interval: average of survivors at both ends.
        let cap_lx: Vec<f64> = (0..n).map(|i| (lx[i] + lx[i + 1]) / 2.0).collect();

        // Backward recursion for person-years remaining.
        let mut cap_tx = vec![0.0; n];
        cap_tx[n - 1] = cap_lx[n - 1];
        for i in (0..n - 1).rev() {
            cap_tx[i] = cap_tx[i + 1] + cap_lx[i];
        }

        let rows = (0..n)
            .map(|i| LifeTableRow {
                age: ages[i],
                qx: qx[i],
                px: 1.0 - qx[i],
                lx: lx[i],
                dx: dx[i],
                cap_lx: cap_lx[i],
                cap_tx: cap_tx[i],
                ex: if lx[i] > 0.0 { cap_tx[i] / lx[i] } else { 0.0 },
            })
            .collect();

        Ok(rows)
    }
}

impl Default for LifeTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Vec<LifeTableRow> {
        let ages: Vec<f64> = (0..10).map(|a| a as f64).collect();
        let qx: Vec<f64> = (0..10).map(|a| 0.01 + 0.005 * a as f64).collect();
        LifeTableBuilder::new().build(&ages, &qx).unwrap()
    }

    #[test]
    fn test_lx_non_increasing_and_recursions() {
        let rows = sample_table();

        assert_eq!(rows[0].lx, DEFAULT_RADIX);
        for w in rows.windows(2) {
            assert!(w[1].lx <= w[0].lx);
            // lx[i+1] = lx[i] - dx[i] exactly
            assert_eq!(w[1].lx, w[0].lx - w[0].dx);
        }
        for row in &rows {
            assert!((row.dx - row.lx * row.qx).abs() < 1e-9);
            assert!((row.px - (1.0 - row.qx)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_tx_backward_sum() {
        let rows = sample_table();
        let n = rows.len();

        assert!((rows[n - 1].cap_tx - rows[n - 1].cap_lx).abs() < 1e-9);
        for i in 0..n - 1 {
            assert!((rows[i].cap_tx - (rows[i + 1].cap_tx + rows[i].cap_lx)).abs() < 1e-9);
        }
        // Tx[0] equals the sum of all Lx
        let total: f64 = rows.iter().map(|r| r.cap_lx).sum();
        assert!((rows[0].cap_tx - total).abs() < 1e-6);
    }

    #[test]
    fn test_ex_guard_against_extinct_cohort() {
        // qx = 1 at the first age wipes out the cohort immediately.
        let rows = LifeTableBuilder::new()
            .build(&[0.0, 1.0, 2.0], &[1.0, 0.5, 0.5])
            .unwrap();
        assert_eq!(rows[1].lx, 0.0);
        assert_eq!(rows[1].ex, 0.0);
        assert_eq!(rows[2].ex, 0.0);
    }

    #[test]
    fn test_ex_matches_direct_ratio() {
        let rows = sample_table();
        for row in &rows {
            if row.lx > 0.0 {
                assert!((row.ex - row.cap_tx / row.lx).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_precondition_violations() {
        let b = LifeTableBuilder::new();
        assert!(b.build(&[0.0, 1.0], &[0.1]).is_err());
        assert!(b.build(&[], &[]).is_err());
        assert!(b.build(&[0.0, 0.0], &[0.1, 0.1]).is_err());
        assert!(b.build(&[0.0, 1.0], &[0.1, 1.5]).is_err());
        assert!(b.build(&[0.0, 1.0], &[-0.1, 0.5]).is_err());
    }

    #[test]
    fn test_custom_radix() {
        let rows = LifeTableBuilder::with_radix(1000.0)
            .build(&[0.0, 1.0], &[0.1, 0.2])
            .unwrap();
        assert_eq!(rows[0].lx, 1000.0);
        assert!((rows[0].dx - 100.0).abs() < 1e-9);
        assert!((rows[1].lx - 900.0).abs() < 1e-9);
    }
}
