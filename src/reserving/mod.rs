//! Chain-ladder loss reserving over a cumulative run-off triangle.

use serde::Serialize;

use crate::dataset::Triangle;
use crate::error::{EngineError, Result};

/// Chain-ladder reserve estimate for one triangle.
#[derive(Debug, Clone, Serialize)]
pub struct ReservingResult {
    /// Volume-weighted development factors, one per column transition.
    pub development_factors: Vec<f64>,
    pub n_origin: usize,
    pub n_dev: usize,
    /// Total IBNR reserve: sum of ultimates less the latest diagonal.
    pub reserve_estimate: f64,
}

/// Volume-weighted chain-ladder projection.
pub struct ChainLadder;

impl ChainLadder {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the outstanding reserve for a cumulative triangle.
    pub fn compute(&self, triangle: &Triangle) -> Result<ReservingResult> {
        let n_origin = triangle.n_origin();
        let n_dev = triangle.n_dev();
        if n_dev < 2 {
            return Err(EngineError::InsufficientData(format!(
                "chain ladder needs at least 2 development periods, got {n_dev}"
            )));
        }
        if n_origin < 2 {
            return Err(EngineError::InsufficientData(format!(
                "chain ladder needs at least 2 origin periods, got {n_origin}"
            )));
        }

        let factors = development_factors(triangle);
        log::debug!("development factors: {factors:?}");

        let mut total_ultimate = 0.0;
        let mut total_latest = 0.0;
        for origin in 0..n_origin {
            let row = triangle.row(origin);
            // Latest populated cell of this origin row.
            let latest = row
                .iter()
                .enumerate()
                .rev()
                .find_map(|(dev, cell)| cell.map(|v| (dev, v)));
            let Some((dev, value)) = latest else {
                // A fully empty row contributes nothing to the reserve.
                log::warn!("origin '{}' has no observed cells", triangle.origins()[origin]);
                continue;
            };

            let mut ultimate = value;
            for &f in &factors[dev..] {
                ultimate *= f;
            }
            total_ultimate += ultimate;
            total_latest += value;
        }

        Ok(ReservingResult {
            development_factors: factors,
            n_origin,
            n_dev,
            reserve_estimate: total_ultimate - total_latest,
        })
    }
}

impl Default for ChainLadder {
    fn default() -> Self {
        Self::new()
    }
}

/// Volume-weighted sum-to-sum factors: for each column transition, the ratio
/// of column sums over the origin rows where both cells are observed. No
/// usable pairs or a zero denominator give a factor of 1.0.
fn development_factors(triangle: &Triangle) -> Vec<f64> {
    let n_dev = triangle.n_dev();
    let mut factors = Vec::with_capacity(n_dev - 1);
    for dev in 0..n_dev - 1 {
        let mut numer = 0.0;
        let mut denom = 0.0;
        for origin in 0..triangle.n_origin() {
            if let (Some(current), Some(next)) =
                (triangle.cell(origin, dev), triangle.cell(origin, dev + 1))
            {
                numer += next;
                denom += current;
            }
        }
        factors.push(if denom > 0.0 { numer / denom } else { 1.0 });
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_triangle() -> Triangle {
        Triangle::new(
            vec!["2020".into(), "2021".into(), "2022".into(), "2023".into()],
            vec![
                vec![Some(100.0), Some(150.0), Some(180.0), Some(189.0)],
                vec![Some(200.0), Some(300.0), Some(360.0), None],
                vec![Some(300.0), Some(450.0), None, None],
                vec![Some(400.0), None, None, None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_development_factors() {
        let result = ChainLadder::new().compute(&sample_triangle()).unwrap();
        assert_eq!(result.development_factors.len(), 3);
        assert_relative_eq!(result.development_factors[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(result.development_factors[1], 1.2, epsilon = 1e-12);
        assert_relative_eq!(result.development_factors[2], 1.05, epsilon = 1e-12);
    }

    #[test]
    fn test_reserve_estimate() {
        // Ultimates: 189, 360*1.05 = 378, 450*1.2*1.05 = 567,
        // 400*1.5*1.2*1.05 = 756; diagonal 189+360+450+400 = 1399.
        let result = ChainLadder::new().compute(&sample_triangle()).unwrap();
        assert_relative_eq!(result.reserve_estimate, 491.0, epsilon = 1e-9);
        assert_eq!(result.n_origin, 4);
        assert_eq!(result.n_dev, 4);
    }

    #[test]
    fn test_single_dev_column_rejected() {
        let triangle = Triangle::new(
            vec!["2020".into(), "2021".into()],
            vec![vec![Some(100.0)], vec![Some(200.0)]],
        )
        .unwrap();
        let err = ChainLadder::new().compute(&triangle).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData(_)));
    }

    #[test]
    fn test_single_origin_rejected() {
        let triangle = Triangle::new(
            vec!["2020".into()],
            vec![vec![Some(100.0), Some(150.0)]],
        )
        .unwrap();
        assert!(ChainLadder::new().compute(&triangle).is_err());
    }

    #[test]
    fn test_zero_denominator_defaults_to_unity() {
        let triangle = Triangle::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Some(0.0), Some(0.0), Some(50.0)],
                vec![Some(0.0), Some(40.0), None],
            ],
        )
        .unwrap();
        let result = ChainLadder::new().compute(&triangle).unwrap();
        assert_relative_eq!(result.development_factors[0], 1.0, epsilon = 1e-12);
        // Only valid pair for the second transition is (0.0, 50.0): zero
        // denominator again.
        assert_relative_eq!(result.development_factors[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_row_contributes_nothing() {
        let triangle = Triangle::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec![Some(100.0), Some(150.0)],
                vec![Some(200.0), None],
                vec![None, None],
            ],
        )
        .unwrap();
        let result = ChainLadder::new().compute(&triangle).unwrap();
        // Factor 1.5; reserve = 200*1.5 - 200 = 100.
        assert_relative_eq!(result.reserve_estimate, 100.0, epsilon = 1e-9);
    }
}
