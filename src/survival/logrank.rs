//! Stratified log-rank comparison
//!
//! Omnibus test that all strata share one survival curve: at each distinct
//! event time the observed events per group are compared against their
//! hypergeometric expectation, and the accumulated quadratic form is
//! referred to a chi-square distribution with k-1 degrees of freedom.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Omnibus log-rank p-value across `n_groups` groups (`groups[i]` in
/// `0..n_groups`). Returns `None` when the test is degenerate: fewer than
/// two groups, no events, or a singular variance matrix.
pub fn multivariate_logrank(
    times: &[f64],
    events: &[bool],
    groups: &[usize],
    n_groups: usize,
) -> Option<f64> {
    if n_groups < 2 || times.len() != events.len() || times.len() != groups.len() {
        return None;
    }
    let n = times.len();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    // At-risk counts per group, decremented as subjects leave.
    let mut at_risk = vec![0usize; n_groups];
    for &g in groups {
        at_risk[g] += 1;
    }

    let mut observed = vec![0.0; n_groups];
    let mut expected = vec![0.0; n_groups];
    let mut var = DMatrix::<f64>::zeros(n_groups, n_groups);
    let mut any_events = false;

    let mut k = 0;
    while k < n {
        let t = times[order[k]];
        let mut leaving = vec![0usize; n_groups];
        let mut events_here = vec![0usize; n_groups];
        while k < n && times[order[k]] == t {
            let i = order[k];
            leaving[groups[i]] += 1;
            if events[i] {
                events_here[groups[i]] += 1;
            }
            k += 1;
        }

        let d: usize = events_here.iter().sum();
        let total_at_risk: usize = at_risk.iter().sum();
        if d > 0 && total_at_risk > 1 {
            any_events = true;
            let nf = total_at_risk as f64;
            let df = d as f64;
            let scale = df * (nf - df) / (nf - 1.0);
            for g in 0..n_groups {
                let pg = at_risk[g] as f64 / nf;
                observed[g] += events_here[g] as f64;
                expected[g] += df * pg;
                for h in 0..n_groups {
                    let ph = at_risk[h] as f64 / nf;
                    let delta = if g == h { pg } else { 0.0 };
                    var[(g, h)] += scale * (delta - pg * ph);
                }
            }
        }

        for g in 0..n_groups {
            at_risk[g] -= leaving[g];
        }
    }

    if !any_events {
        return None;
    }

    // The k deviations sum to zero, so the quadratic form uses the first
    // k-1 components and the corresponding variance block.
    let dim = n_groups - 1;
    let z = DVector::from_iterator(dim, (0..dim).map(|g| observed[g] - expected[g]));
    let v = var.view((0, 0), (dim, dim)).into_owned();
    let solved = v.lu().solve(&z)?;
    let chi2 = z.dot(&solved);
    if !chi2.is_finite() || chi2 < 0.0 {
        return None;
    }

    let dist = ChiSquared::new(dim as f64).ok()?;
    Some(1.0 - dist.cdf(chi2))
}
