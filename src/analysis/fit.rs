//! Least-squares fit of `steps(n) = a/n + b + c·n`
//!
//! The model is linear in its coefficients, so the Gauss-Newton iteration
//! for the least-squares problem converges in a single step: solve the
//! normal equations `(XᵀX)β = Xᵀy` with basis `[1/n, 1, n]`. A singular or
//! ill-conditioned system is reported as a failed fit.

use serde::Serialize;

use crate::{Error, Result};

/// Minimum number of points before a fit is attempted.
pub const MIN_FIT_POINTS: usize = 2;

/// Relative pivot size below which the normal matrix counts as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Fitted model coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelFit {
    /// Partition term coefficient (`a/n`).
    pub a: f64,
    /// Constant term.
    pub b: f64,
    /// Overhead term coefficient (`c·n`).
    pub c: f64,
    /// Coefficient of determination over the fitted points.
    pub r_squared: f64,
}

impl ModelFit {
    /// Model value at `n`.
    #[must_use]
    pub fn predict(&self, n: f64) -> f64 {
        self.a / n + self.b + self.c * n
    }

    /// Closed-form minimizer `sqrt(a/c)`, defined only when both the
    /// partition and overhead coefficients are positive.
    #[must_use]
    pub fn minimizer(&self) -> Option<f64> {
        (self.a > 0.0 && self.c > 0.0).then(|| (self.a / self.c).sqrt())
    }
}

/// Fit the model to `(parameter, steps)` points.
///
/// # Errors
///
/// Returns [`Error::InsufficientData`] below [`MIN_FIT_POINTS`] points and
/// [`Error::FitFailed`] when the system is singular (fewer distinct
/// parameters than coefficients) or the solution is not finite.
pub fn fit_model(points: &[(f64, f64)]) -> Result<ModelFit> {
    if points.len() < MIN_FIT_POINTS {
        return Err(Error::InsufficientData {
            required: MIN_FIT_POINTS,
            found: points.len(),
        });
    }
    if points.iter().any(|&(x, y)| x <= 0.0 || !x.is_finite() || !y.is_finite()) {
        return Err(Error::FitFailed("parameters must be positive and finite".into()));
    }

    let mut normal = [[0.0f64; 4]; 3];
    for &(x, y) in points {
        let basis = [1.0 / x, 1.0, x];
        for (row, &bi) in normal.iter_mut().zip(&basis) {
            for (cell, &bj) in row.iter_mut().zip(&basis) {
                *cell += bi * bj;
            }
            row[3] += bi * y;
        }
    }

    let [a, b, c] = solve3(normal)
        .ok_or_else(|| Error::FitFailed(format!("singular system for {} points", points.len())))?;
    if ![a, b, c].iter().all(|v| v.is_finite()) {
        return Err(Error::FitFailed("non-finite coefficients".into()));
    }

    let mut fit = ModelFit {
        a,
        b,
        c,
        r_squared: 0.0,
    };
    fit.r_squared = r_squared(&fit, points);
    Ok(fit)
}

#[allow(clippy::cast_precision_loss)]
fn r_squared(fit: &ModelFit, points: &[(f64, f64)]) -> f64 {
    let mean = points.iter().map(|p| p.1).sum::<f64>() / points.len() as f64;
    let ss_tot: f64 = points.iter().map(|p| (p.1 - mean).powi(2)).sum();
    let ss_res: f64 = points.iter().map(|p| (p.1 - fit.predict(p.0)).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Gaussian elimination with partial pivoting on an augmented 3x4 matrix.
fn solve3(mut m: [[f64; 4]; 3]) -> Option<[f64; 3]> {
    let scale = m
        .iter()
        .flat_map(|row| row[..3].iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }

    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot][col].abs() <= SINGULAR_TOLERANCE * scale {
            return None;
        }
        m.swap(col, pivot);
        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][3] - tail) / m[row][row];
    }
    Some(x)
}
