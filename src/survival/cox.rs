//! Cox proportional-hazards regression
//!
//! Newton-Raphson maximization of the Breslow partial likelihood over
//! standardized covariates, with step-halving when a full step overshoots.
//! Covariates are optional input, so thin datasets degrade to an empty
//! summary instead of failing, and convergence problems are reported inside
//! the result rather than raised.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Cox fit settings.
#[derive(Debug, Clone)]
pub struct CoxConfig {
    /// Maximum Newton-Raphson iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the max coefficient update.
    pub tol: f64,
    /// Minimum number of complete rows required to attempt a fit.
    pub min_rows: usize,
}

impl Default for CoxConfig {
    fn default() -> Self {
        Self {
            max_iter: 50,
            tol: 1e-7,
            min_rows: 10,
        }
    }
}

/// One covariate row of the Cox summary.
#[derive(Debug, Clone, Serialize)]
pub struct CoxCoefficient {
    /// Covariate column name.
    pub covariate: String,
    /// Log hazard ratio.
    pub coef: f64,
    /// Hazard ratio exp(coef).
    pub exp_coef: f64,
    /// Standard error of the coefficient.
    pub se_coef: f64,
    /// Wald z statistic.
    pub z: f64,
    /// Two-sided p-value.
    pub p: f64,
}

/// Cox model output. An absent concordance with an empty summary means the
/// fit was skipped (no covariates or too few rows); `error` is set when the
/// optimizer itself failed.
#[derive(Debug, Clone, Serialize)]
pub struct CoxResult {
    /// Harrell's concordance index, when a fit was produced.
    pub concordance: Option<f64>,
    /// Per-covariate coefficients.
    pub summary: Vec<CoxCoefficient>,
    /// Failure reason when the fit was attempted but did not converge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CoxResult {
    fn skipped() -> Self {
        Self {
            concordance: None,
            summary: Vec::new(),
            error: None,
        }
    }

    fn failed(reason: String) -> Self {
        log::warn!("cox fit failed: {reason}");
        Self {
            concordance: None,
            summary: Vec::new(),
            error: Some(reason),
        }
    }
}

/// Fit a Cox model on complete rows of `covariates` (column-major, one inner
/// vector per covariate, parallel to `times`/`events`).
pub fn fit_cox(
    times: &[f64],
    events: &[bool],
    covariates: &[Vec<f64>],
    names: &[String],
    config: &CoxConfig,
) -> CoxResult {
    let n = times.len();
    let p = covariates.len();
    if p == 0 || n < config.min_rows {
        return CoxResult::skipped();
    }

    // Standardize covariates; keeps the Newton iteration well-conditioned.
    let mut sds = vec![0.0; p];
    let mut x = DMatrix::<f64>::zeros(n, p);
    for j in 0..p {
        let col = &covariates[j];
        let mean = col.iter().sum::<f64>() / n as f64;
        let var = col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        let sd = var.sqrt();
        if sd < 1e-12 {
            return CoxResult::failed(format!("covariate '{}' is constant", names[j]));
        }
        sds[j] = sd;
        for i in 0..n {
            x[(i, j)] = (col[i] - mean) / sd;
        }
    }

    // Order rows by time descending so risk sets accumulate as we walk.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| times[b].total_cmp(&times[a]));

    let mut beta = DVector::<f64>::zeros(p);
    let mut loglik = match breslow_loglik(&x, times, events, &order, &beta) {
        Some(ll) => ll,
        None => return CoxResult::failed("non-finite partial likelihood at start".into()),
    };

    let mut converged = false;
    for iter in 0..config.max_iter {
        let (grad, hess) = breslow_derivatives(&x, times, events, &order, &beta);

        // Newton step: beta_new = beta - H^-1 g (H is the loglik Hessian,
        // negative semidefinite).
        let mut delta = match hess.clone().lu().solve(&grad) {
            Some(d) => -d,
            None => return CoxResult::failed("singular Hessian in Newton-Raphson".into()),
        };

        // Step-halving when the full step reduces the likelihood.
        let mut accepted = false;
        for _ in 0..10 {
            let candidate = &beta + &delta;
            if let Some(ll) = breslow_loglik(&x, times, events, &order, &candidate) {
                if ll >= loglik - 1e-12 {
                    let max_step = delta.amax();
                    let gain = ll - loglik;
                    beta = candidate;
                    loglik = ll;
                    accepted = true;
                    if max_step < config.tol || gain < 1e-9 {
                        converged = true;
                    }
                    break;
                }
            }
            delta *= 0.5;
        }

        if !accepted {
            return CoxResult::failed(format!(
                "step-halving failed to improve likelihood at iteration {iter}"
            ));
        }
        if converged {
            break;
        }
    }

    if !converged {
        return CoxResult::failed(format!(
            "Newton-Raphson did not converge in {} iterations",
            config.max_iter
        ));
    }

    // Standard errors from the observed information matrix.
    let (_, hess) = breslow_derivatives(&x, times, events, &order, &beta);
    let info = -hess;
    let cov = match info.try_inverse() {
        Some(c) => c,
        None => return CoxResult::failed("singular information matrix".into()),
    };

    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let mut summary = Vec::with_capacity(p);
    for j in 0..p {
        // Back-transform from the standardized scale.
        let coef = beta[j] / sds[j];
        let se = cov[(j, j)].sqrt() / sds[j];
        let z = if se > 0.0 { coef / se } else { 0.0 };
        let pval = 2.0 * (1.0 - normal.cdf(z.abs()));
        summary.push(CoxCoefficient {
            covariate: names[j].clone(),
            coef,
            exp_coef: coef.exp(),
            se_coef: se,
            z,
            p: pval,
        });
    }

    let eta: Vec<f64> = (0..n).map(|i| x.row(i).transpose().dot(&beta)).collect();
    CoxResult {
        concordance: Some(concordance_index(times, events, &eta)),
        summary,
        error: None,
    }
}

/// Breslow log partial likelihood at `beta`. `order` is row indices sorted
/// by time descending. Returns `None` if the value is non-finite.
fn breslow_loglik(
    x: &DMatrix<f64>,
    times: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &DVector<f64>,
) -> Option<f64> {
    let mut ll = 0.0;
    let mut s0 = 0.0;
    let mut k = 0;
    while k < order.len() {
        let t = times[order[k]];
        // Everyone tied at this time joins the risk set first.
        let start = k;
        while k < order.len() && times[order[k]] == t {
            let eta = x.row(order[k]).transpose().dot(beta);
            s0 += eta.exp();
            k += 1;
        }
        let mut d = 0usize;
        for &i in &order[start..k] {
            if events[i] {
                ll += x.row(i).transpose().dot(beta);
                d += 1;
            }
        }
        if d > 0 {
            ll -= d as f64 * s0.ln();
        }
    }
    ll.is_finite().then_some(ll)
}

/// Gradient and Hessian of the Breslow log partial likelihood.
fn breslow_derivatives(
    x: &DMatrix<f64>,
    times: &[f64],
    events: &[bool],
    order: &[usize],
    beta: &DVector<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let p = beta.len();
    let mut grad = DVector::<f64>::zeros(p);
    let mut hess = DMatrix::<f64>::zeros(p, p);

    let mut s0 = 0.0;
    let mut s1 = DVector::<f64>::zeros(p);
    let mut s2 = DMatrix::<f64>::zeros(p, p);

    let mut k = 0;
    while k < order.len() {
        let t = times[order[k]];
        let start = k;
        while k < order.len() && times[order[k]] == t {
            let xi = x.row(order[k]).transpose();
            let w = xi.dot(beta).exp();
            s0 += w;
            s1 += &xi * w;
            s2 += &xi * xi.transpose() * w;
            k += 1;
        }
        let mut d = 0usize;
        for &i in &order[start..k] {
            if events[i] {
                grad += x.row(i).transpose();
                d += 1;
            }
        }
        if d > 0 {
            let d = d as f64;
            let mean = &s1 / s0;
            grad -= &mean * d;
            hess -= (&s2 / s0 - &mean * mean.transpose()) * d;
        }
    }

    (grad, hess)
}

/// Harrell's concordance index over comparable pairs: for each pair where
/// the shorter time is an event, the model is concordant when it assigns the
/// earlier failure the higher risk score. Tied scores count one half.
pub fn concordance_index(times: &[f64], events: &[bool], risk: &[f64]) -> f64 {
    let n = times.len();
    let mut concordant = 0.0;
    let mut comparable = 0.0;

    for i in 0..n {
        if !events[i] {
            continue;
        }
        for j in 0..n {
            if i == j || times[j] <= times[i] {
                continue;
            }
            comparable += 1.0;
            if risk[i] > risk[j] {
                concordant += 1.0;
            } else if risk[i] == risk[j] {
                concordant += 0.5;
            }
        }
    }

    if comparable > 0.0 {
        concordant / comparable
    } else {
        0.5
    }
}
