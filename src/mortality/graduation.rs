//! Graduation (smoothing) of raw mortality rates
//!
//! Three independent methods, each producing its own smoothed series from
//! the raw qx vector: Whittaker-Henderson penalized differences, a
//! triangular-weighted moving average, and a natural cubic smoothing
//! spline. Graduation is best-effort; the spline falls back to the raw
//! series rather than surfacing a numerical failure.

use nalgebra::{DMatrix, DVector};

/// Whittaker-Henderson graduation.
///
/// Minimizes `||q - q_raw||^2 + lambda * ||D^k q||^2` where `D^k` is the
/// k-th order finite-difference operator, by solving the linear system
/// `(I + lambda * D'D) q = q_raw`. Larger `lambda` gives a smoother series;
/// polynomials of degree `< order` pass through unpenalized. Output is
/// clipped to [0, 1].
pub fn whittaker_henderson(qx: &[f64], order: usize, lambda: f64) -> Vec<f64> {
    let n = qx.len();
    if n == 0 || n <= order {
        // Too short to difference: the fidelity term alone returns the raw
        // series.
        return qx.iter().map(|&q| q.clamp(0.0, 1.0)).collect();
    }

    let d = difference_matrix(n, order);
    // Small ridge keeps the solve stable for extreme lambda.
    let mut a = DMatrix::<f64>::identity(n, n) * (1.0 + 1e-10);
    a += d.transpose() * d * lambda;

    let b = DVector::from_column_slice(qx);
    match a.lu().solve(&b) {
        Some(solution) => solution.iter().map(|&q| q.clamp(0.0, 1.0)).collect(),
        None => {
            log::warn!("Whittaker-Henderson solve failed; returning raw rates");
            qx.iter().map(|&q| q.clamp(0.0, 1.0)).collect()
        }
    }
}

/// k-th order finite-difference operator as an (n-k) x n matrix; row i
/// holds the alternating binomial coefficients of the k-th forward
/// difference starting at column i.
fn difference_matrix(n: usize, order: usize) -> DMatrix<f64> {
    let coeffs = binomial_coefficients(order);
    let rows = n - order;
    let mut d = DMatrix::<f64>::zeros(rows, n);
    for i in 0..rows {
        for (j, &c) in coeffs.iter().enumerate() {
            let sign = if (order - j) % 2 == 0 { 1.0 } else { -1.0 };
            d[(i, i + j)] = sign * c;
        }
    }
    d
}

fn binomial_coefficients(order: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for _ in 0..order {
        let mut next = vec![1.0];
        for w in row.windows(2) {
            next.push(w[0] + w[1]);
        }
        next.push(1.0);
        row = next;
    }
    row
}

/// Triangular-weighted moving average.
///
/// The window is forced odd; the center point gets the highest weight. Near
/// the boundaries the window shrinks and its triangular weights are rebuilt
/// and re-normalized so edge points are not under-weighted.
pub fn moving_average(qx: &[f64], window: usize) -> Vec<f64> {
    let window = if window % 2 == 0 { window + 1 } else { window };
    let n = qx.len();
    let half = window / 2;

    let center_weights = triangular_weights(window);
    let mut smoothed = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        let len = end - start;
        if len == window {
            let value: f64 = qx[start..end]
                .iter()
                .zip(&center_weights)
                .map(|(&q, &w)| q * w)
                .sum();
            smoothed.push(value);
        } else {
            let weights = triangular_weights(len);
            let value: f64 = qx[start..end]
                .iter()
                .zip(&weights)
                .map(|(&q, &w)| q * w)
                .sum();
            smoothed.push(value);
        }
    }

    smoothed
}

/// Normalized triangular weights of the given length, peaked at the middle.
fn triangular_weights(len: usize) -> Vec<f64> {
    let half = len / 2;
    let raw: Vec<f64> = (0..len)
        .map(|i| (1 + half - half.abs_diff(i).min(half)) as f64)
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Natural cubic smoothing spline (Reinsch algorithm).
///
/// Minimizes `sum (q_i - f(x_i))^2 + lambda * integral f''^2` over natural
/// cubic splines, with `lambda = factor * n` so the smoothing scales with
/// the series length. Any numerical failure falls back to the raw series;
/// output is clipped to [0, 1].
pub fn smoothing_spline(ages: &[f64], qx: &[f64], factor: f64) -> Vec<f64> {
    match try_smoothing_spline(ages, qx, factor) {
        Some(smoothed) => smoothed.into_iter().map(|q| q.clamp(0.0, 1.0)).collect(),
        None => {
            log::warn!("spline smoothing failed; returning raw rates");
            qx.to_vec()
        }
    }
}

fn try_smoothing_spline(ages: &[f64], qx: &[f64], factor: f64) -> Option<Vec<f64>> {
    let n = qx.len();
    if n < 3 || ages.len() != n {
        return None;
    }
    let lambda = factor * n as f64;
    if !(lambda > 0.0) {
        return Some(qx.to_vec());
    }

    let h: Vec<f64> = ages.windows(2).map(|w| w[1] - w[0]).collect();
    if h.iter().any(|&step| step <= 0.0) {
        return None;
    }

    // Reinsch formulation: second derivatives gamma at the interior knots
    // solve (R + lambda Q'Q) gamma = Q'y, then f = y - lambda Q gamma.
    let m = n - 2;
    let mut r = DMatrix::<f64>::zeros(m, m);
    for i in 0..m {
        r[(i, i)] = (h[i] + h[i + 1]) / 3.0;
        if i + 1 < m {
            r[(i, i + 1)] = h[i + 1] / 6.0;
            r[(i + 1, i)] = h[i + 1] / 6.0;
        }
    }

    let mut q = DMatrix::<f64>::zeros(n, m);
    for j in 0..m {
        q[(j, j)] = 1.0 / h[j];
        q[(j + 1, j)] = -1.0 / h[j] - 1.0 / h[j + 1];
        q[(j + 2, j)] = 1.0 / h[j + 1];
    }

    let y = DVector::from_column_slice(qx);
    let rhs = q.transpose() * &y;
    let system = r + q.transpose() * &q * lambda;
    let gamma = system.lu().solve(&rhs)?;

    let fitted = y - q * gamma * lambda;
    if fitted.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(fitted.iter().copied().collect())
}
