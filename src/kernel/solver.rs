//! Constrained weighted least squares for the attribution coefficients
//!
//! Fits one set of per-feature coefficients per model output dimension. The
//! Shapley efficiency constraint (coefficients sum to `f(x) - fnull` in link
//! space) is enforced by re-parameterization: one varying column is
//! eliminated, the remaining free coefficients are solved from the weighted
//! normal equations, and the eliminated coefficient is recovered by
//! subtraction. Every solve goes through the fallback ladder in
//! [`crate::linalg`].

use ndarray::{Array1, Array2};

use crate::error::{Result, ShapError};
use crate::linalg;

use super::Regularizer;

/// Solved coefficients and confidence half-widths for one output dimension.
#[derive(Debug, Clone)]
pub(crate) struct SolvedDimension {
    pub scores: Vec<f64>,
    pub half_widths: Vec<f64>,
}

/// Inverse standard normal CDF (Acklam's rational approximation).
///
/// Accurate to about 1e-9 over the open unit interval, which is far tighter
/// than the sampling noise the intervals describe.
pub(crate) fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Columns whose mask bit differs somewhere across the regression rows.
/// Constant columns are dropped from the fit and attributed exactly zero.
fn varying_columns(x: &Array2<f64>) -> Vec<usize> {
    let mut varying = Vec::new();
    for j in 0..x.ncols() {
        let first = x[[0, j]];
        if (0..x.nrows()).any(|i| x[[i, j]] != first) {
            varying.push(j);
        }
    }
    varying
}

/// Rank `candidates` by the magnitude of their weighted correlation with the
/// response, descending. Ties break toward the lower feature index.
fn rank_by_correlation(
    x: &Array2<f64>,
    weights: &Array1<f64>,
    y: &Array1<f64>,
    candidates: &[usize],
) -> Vec<usize> {
    let w_total: f64 = weights.sum();
    let y_bar = weights.dot(y) / w_total;
    let var_y: f64 = (0..y.len())
        .map(|i| weights[i] * (y[i] - y_bar).powi(2))
        .sum();

    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&j| {
            let x_bar = (0..x.nrows()).map(|i| weights[i] * x[[i, j]]).sum::<f64>() / w_total;
            let mut cov = 0.0;
            let mut var_x = 0.0;
            for i in 0..x.nrows() {
                let dx = x[[i, j]] - x_bar;
                cov += weights[i] * dx * (y[i] - y_bar);
                var_x += weights[i] * dx * dx;
            }
            let corr = cov / (var_x * var_y).sqrt().max(1e-12);
            (j, corr.abs())
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(j, _)| j).collect()
}

/// One constrained fit over a fixed active feature set.
struct ActiveFit {
    /// Coefficient per active feature, ordered like `active`.
    coefficients: Vec<f64>,
    /// Weighted residual sum of squares over all regression rows.
    weighted_rss: f64,
    /// Normal-equations matrix of the eliminated system, kept for the
    /// covariance factor of the confidence intervals. `None` for the
    /// single-active shortcut.
    normal_matrix: Option<Array2<f64>>,
}

fn fit_active(
    x: &Array2<f64>,
    weights: &Array1<f64>,
    y: &Array1<f64>,
    lfnull: f64,
    diff: f64,
    active: &[usize],
) -> Result<ActiveFit> {
    let n = x.nrows();

    let coefficients = if active.len() == 1 {
        // A single free coefficient is pinned by the constraint alone.
        vec![diff]
    } else {
        let last = active[active.len() - 1];
        let free = &active[..active.len() - 1];

        // Eliminate the last active column: the constraint makes its
        // coefficient diff - sum(free), which folds into the response.
        let mut xe = Array2::zeros((n, free.len()));
        let mut ye = Array1::zeros(n);
        for i in 0..n {
            for (jj, &j) in free.iter().enumerate() {
                xe[[i, jj]] = x[[i, j]] - x[[i, last]];
            }
            ye[i] = y[i] - lfnull - x[[i, last]] * diff;
        }

        let mut a = Array2::zeros((free.len(), free.len()));
        let mut b = Array1::zeros(free.len());
        for i in 0..n {
            let w = weights[i];
            for p in 0..free.len() {
                b[p] += w * xe[[i, p]] * ye[i];
                for q in p..free.len() {
                    a[[p, q]] += w * xe[[i, p]] * xe[[i, q]];
                }
            }
        }
        for p in 0..free.len() {
            for q in 0..p {
                a[[p, q]] = a[[q, p]];
            }
        }

        let solution = linalg::solve_symmetric(&a, &b).ok_or_else(|| {
            ShapError::SolverError(
                "weighted normal equations are singular beyond the fallback ladder".to_string(),
            )
        })?;

        let mut coefficients: Vec<f64> = solution.to_vec();
        let eliminated = diff - coefficients.iter().sum::<f64>();
        coefficients.push(eliminated);

        return finish_fit(x, weights, y, lfnull, active, coefficients, Some(a));
    };

    finish_fit(x, weights, y, lfnull, active, coefficients, None)
}

fn finish_fit(
    x: &Array2<f64>,
    weights: &Array1<f64>,
    y: &Array1<f64>,
    lfnull: f64,
    active: &[usize],
    coefficients: Vec<f64>,
    normal_matrix: Option<Array2<f64>>,
) -> Result<ActiveFit> {
    let mut weighted_rss = 0.0;
    for i in 0..x.nrows() {
        let mut y_hat = lfnull;
        for (jj, &j) in active.iter().enumerate() {
            y_hat += coefficients[jj] * x[[i, j]];
        }
        let r = y[i] - y_hat;
        weighted_rss += weights[i] * r * r;
    }
    Ok(ActiveFit {
        coefficients,
        weighted_rss,
        normal_matrix,
    })
}

/// Information-criterion score for a candidate active-set size.
fn criterion(weighted_rss: f64, n: usize, p: usize, bayesian: bool) -> f64 {
    let n_f = n as f64;
    let fit_term = n_f * (weighted_rss / n_f).max(1e-12).ln();
    let penalty = if bayesian {
        p as f64 * n_f.ln()
    } else {
        2.0 * p as f64
    };
    fit_term + penalty
}

/// Confidence half-widths for one fit. Free coefficients take the classic
/// residual-variance-scaled diagonal of the inverted normal matrix; the
/// eliminated coefficient, being the negated sum of the free ones, takes the
/// total covariance mass.
fn half_widths(fit: &ActiveFit, n: usize, z: f64) -> Result<Vec<f64>> {
    let p = fit.coefficients.len();
    match &fit.normal_matrix {
        None => Ok(vec![0.0; p]),
        Some(a) => {
            let dof = (n.saturating_sub(p - 1)).max(1);
            let sigma2 = fit.weighted_rss / dof as f64;
            let cov_factor = linalg::invert_symmetric(a).ok_or_else(|| {
                ShapError::SolverError(
                    "covariance matrix is singular beyond the fallback ladder".to_string(),
                )
            })?;

            let mut widths = Vec::with_capacity(p);
            for j in 0..p - 1 {
                widths.push(z * (sigma2 * cov_factor[[j, j]]).max(0.0).sqrt());
            }
            let total: f64 = cov_factor.iter().sum();
            widths.push(z * (sigma2 * total).max(0.0).sqrt());
            Ok(widths)
        }
    }
}

/// Fit the attribution coefficients for one output dimension.
///
/// `x` holds the 0/1 design rows (non-fixed masks only), `weights` the
/// per-mask kernel weights, `y` the link-space mean model output per mask.
/// `lfnull` and `lfx` are the link-space baseline and instance prediction.
pub(crate) fn solve_dimension(
    x: &Array2<f64>,
    weights: &Array1<f64>,
    y: &Array1<f64>,
    lfnull: f64,
    lfx: f64,
    regularizer: &Regularizer,
    z: f64,
) -> Result<SolvedDimension> {
    let m = x.ncols();
    let n = x.nrows();
    let diff = lfx - lfnull;

    let mut scores = vec![0.0; m];
    let mut widths = vec![0.0; m];

    let varying = varying_columns(x);
    if varying.is_empty() {
        return Ok(SolvedDimension {
            scores,
            half_widths: widths,
        });
    }
    if varying.len() == 1 {
        // The whole prediction shift belongs to the only varying feature.
        scores[varying[0]] = diff;
        return Ok(SolvedDimension {
            scores,
            half_widths: widths,
        });
    }

    let (active, fit) = match regularizer {
        Regularizer::None => {
            let fit = fit_active(x, weights, y, lfnull, diff, &varying)?;
            (varying.clone(), fit)
        }
        Regularizer::TopK(k) => {
            let ranked = rank_by_correlation(x, weights, y, &varying);
            let mut active: Vec<usize> = ranked.into_iter().take((*k).max(1)).collect();
            active.sort_unstable();
            let fit = fit_active(x, weights, y, lfnull, diff, &active)?;
            (active, fit)
        }
        Regularizer::Aic | Regularizer::Bic => {
            let bayesian = matches!(regularizer, Regularizer::Bic);
            let ranked = rank_by_correlation(x, weights, y, &varying);
            let mut best: Option<(f64, Vec<usize>, ActiveFit)> = None;
            for k in 1..=ranked.len() {
                let mut active: Vec<usize> = ranked[..k].to_vec();
                active.sort_unstable();
                let fit = fit_active(x, weights, y, lfnull, diff, &active)?;
                let score = criterion(fit.weighted_rss, n, k, bayesian);
                if best.as_ref().map_or(true, |(s, _, _)| score < *s) {
                    best = Some((score, active, fit));
                }
            }
            // ranked is non-empty here: varying.len() >= 2
            let (_, active, fit) = best.ok_or_else(|| {
                ShapError::SolverError("no candidate active set produced a fit".to_string())
            })?;
            (active, fit)
        }
    };

    let fit_widths = half_widths(&fit, n, z)?;
    for (jj, &j) in active.iter().enumerate() {
        scores[j] = fit.coefficients[jj];
        widths[j] = fit_widths[jj];
    }

    Ok(SolvedDimension {
        scores,
        half_widths: widths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const Z95: f64 = 1.959963984540054;

    #[test]
    fn test_normal_quantile_known_values() {
        assert!((normal_quantile(0.975) - 1.959963984540054).abs() < 1e-6);
        assert!((normal_quantile(0.95) - 1.6448536269514722).abs() < 1e-6);
        assert!((normal_quantile(0.995) - 2.5758293035489004).abs() < 1e-6);
        assert!((normal_quantile(0.5)).abs() < 1e-9);
        assert!((normal_quantile(0.025) + normal_quantile(0.975)).abs() < 1e-6);
    }

    #[test]
    fn test_varying_columns() {
        let x = array![[1.0, 0.0, 1.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        assert_eq!(varying_columns(&x), vec![1, 2]);
    }

    #[test]
    fn test_two_feature_exact_recovery() {
        // Model f = 2*a + 3*b over instance (1,1) against background (0,0).
        // Design rows: {a}, {b}; y values 2 and 3; fnull 0; fx 5.
        let x = array![[1.0, 0.0], [0.0, 1.0]];
        let w = array![0.5, 0.5];
        let y = array![2.0, 3.0];
        let solved =
            solve_dimension(&x, &w, &y, 0.0, 5.0, &Regularizer::None, Z95).unwrap();
        assert!((solved.scores[0] - 2.0).abs() < 1e-9);
        assert!((solved.scores[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_scores_zero() {
        let x = array![[1.0, 1.0], [1.0, 0.0]];
        let w = array![0.5, 0.5];
        let y = array![4.0, 1.0];
        let solved =
            solve_dimension(&x, &w, &y, 1.0, 4.0, &Regularizer::None, Z95).unwrap();
        // Column 0 never varies: exact zero, and the lone varying feature
        // takes the full difference.
        assert_eq!(solved.scores[0], 0.0);
        assert!((solved.scores[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_efficiency_holds_for_every_regularizer() {
        let x = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0]
        ];
        let w = array![0.2, 0.2, 0.2, 0.1, 0.2, 0.1];
        let y = array![1.0, 2.5, 0.5, 3.6, 3.1, 1.4];
        let fnull = 0.0;
        let fx = 4.1;
        for reg in [
            Regularizer::None,
            Regularizer::TopK(2),
            Regularizer::Aic,
            Regularizer::Bic,
        ] {
            let solved = solve_dimension(&x, &w, &y, fnull, fx, &reg, Z95).unwrap();
            let total: f64 = solved.scores.iter().sum();
            assert!(
                (total - (fx - fnull)).abs() < 1e-9,
                "efficiency violated under {reg:?}: {total}"
            );
        }
    }

    #[test]
    fn test_top_k_zeroes_weak_features() {
        let x = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0]
        ];
        let w = array![1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        // Response driven almost entirely by features 0 and 1.
        let y = array![5.0, 4.0, 0.01, 9.0, 4.01, 5.01];
        let solved =
            solve_dimension(&x, &w, &y, 0.0, 9.01, &Regularizer::TopK(2), Z95).unwrap();
        let zeroed = solved.scores.iter().filter(|s| **s == 0.0).count();
        assert_eq!(zeroed, 1);
        let total: f64 = solved.scores.iter().sum();
        assert!((total - 9.01).abs() < 1e-9);
    }

    #[test]
    fn test_half_widths_zero_for_exact_fit() {
        // Perfectly additive response: zero residuals, zero interval width.
        let x = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0]
        ];
        let w = array![1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let y = array![1.0, 2.0, 3.0, 3.0, 5.0, 4.0];
        let solved =
            solve_dimension(&x, &w, &y, 0.0, 6.0, &Regularizer::None, Z95).unwrap();
        assert!(solved.half_widths.iter().all(|h| h.abs() < 1e-6));
    }

    #[test]
    fn test_half_widths_positive_for_noisy_fit() {
        let x = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [1.0, 0.0, 1.0]
        ];
        let w = array![1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        // Non-additive response leaves residuals behind.
        let y = array![1.3, 1.8, 3.2, 2.7, 5.4, 3.9];
        let solved =
            solve_dimension(&x, &w, &y, 0.0, 6.0, &Regularizer::None, Z95).unwrap();
        assert!(solved.half_widths.iter().all(|h| *h > 0.0));
    }
}
