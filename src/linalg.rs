//! Dense linear algebra routines for the weighted regression solve
//!
//! The normal-equations systems here are small (one row/column per varying
//! feature) but frequently ill-conditioned when the sample budget is tight,
//! so every solve goes through an explicit fallback ladder:
//! exact Cholesky -> Gauss-Jordan inverse -> ridge-regularized Cholesky.

use ndarray::{Array1, Array2};

/// Solve the symmetric positive-definite system `A x = b` via Cholesky
/// decomposition. Returns `None` when `A` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    // A = L * L^T
    let mut l = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Invert a square matrix with Gauss-Jordan elimination and partial pivoting.
/// Returns `None` when a pivot falls below `tol`.
pub(crate) fn gauss_jordan_inverse(m: &Array2<f64>, tol: f64) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // Augmented matrix [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }
        if max_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }

        if aug[[col, col]].abs() < tol {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }
    Some(inv)
}

/// Solve `A x = b` for symmetric `A` with the full fallback ladder.
///
/// A genuinely rank-deficient system survives through the ridge rungs: the
/// returned solution is then the ridge-regularized one rather than a failure.
/// `None` means every rung failed, which callers surface as a solver error.
pub(crate) fn solve_symmetric(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if let Some(x) = cholesky_solve(a, b) {
        return Some(x);
    }

    if let Some(inv) = gauss_jordan_inverse(a, 1e-10) {
        return Some(inv.dot(b));
    }

    // Ridge ladder with escalating regularization strength
    let n = a.nrows();
    let scale = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let base = if scale > 0.0 { scale } else { 1.0 };
    let mut lambda = 1e-8 * base;
    for _ in 0..6 {
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += lambda;
        }
        if let Some(x) = cholesky_solve(&a_reg, b) {
            return Some(x);
        }
        lambda *= 100.0;
    }

    None
}

/// Inverse of a symmetric matrix with the same ladder, used for the
/// covariance factor of the confidence intervals.
pub(crate) fn invert_symmetric(a: &Array2<f64>) -> Option<Array2<f64>> {
    if let Some(inv) = gauss_jordan_inverse(a, 1e-12) {
        return Some(inv);
    }

    let n = a.nrows();
    let scale = a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
    let base = if scale > 0.0 { scale } else { 1.0 };
    let mut lambda = 1e-8 * base;
    for _ in 0..6 {
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += lambda;
        }
        if let Some(inv) = gauss_jordan_inverse(&a_reg, 1e-12) {
            return Some(inv);
        }
        lambda *= 100.0;
    }

    None
}
