//! Dense least squares for the small systems the models need (tens of columns).

use super::ModelError;

/// Result of an ordinary or penalized least-squares fit.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    pub coefficients: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Diagonal of `(XᵀX + P)⁻¹`, for standard errors.
    pub inverse_diagonal: Vec<f64>,
}

impl LeastSquaresFit {
    pub fn rss(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }
}

/// Solves `min ‖y − Xβ‖² + Σ pⱼβⱼ²` via the normal equations and Cholesky.
///
/// `design` is row-major with one `Vec` per observation; `penalties` has one
/// entry per column (zero for an unpenalized column).
pub fn penalized_least_squares(
    design: &[Vec<f64>],
    target: &[f64],
    penalties: &[f64],
) -> Result<LeastSquaresFit, ModelError> {
    let p = penalties.len();
    if design.len() != target.len() {
        return Err(ModelError::ShapeMismatch {
            expected: design.len(),
            actual: target.len(),
        });
    }
    if design.len() < p.max(1) {
        return Err(ModelError::InsufficientData {
            required: p.max(1),
            actual: design.len(),
        });
    }
    if let Some(row) = design.iter().find(|r| r.len() != p) {
        return Err(ModelError::ShapeMismatch {
            expected: p,
            actual: row.len(),
        });
    }

    let mut gram = vec![0.0; p * p];
    let mut rhs = vec![0.0; p];
    for (row, &y) in design.iter().zip(target) {
        for i in 0..p {
            rhs[i] += row[i] * y;
            for j in 0..=i {
                gram[i * p + j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        gram[i * p + i] += penalties[i];
        for j in 0..i {
            gram[j * p + i] = gram[i * p + j];
        }
    }

    let chol = Cholesky::decompose_with_jitter(&gram, p)?;
    let coefficients = chol.solve(&rhs);
    let residuals = design
        .iter()
        .zip(target)
        .map(|(row, &y)| y - dot(row, &coefficients))
        .collect();
    let inverse_diagonal = (0..p)
        .map(|j| {
            let mut e = vec![0.0; p];
            e[j] = 1.0;
            chol.solve(&e)[j]
        })
        .collect();

    Ok(LeastSquaresFit {
        coefficients,
        residuals,
        inverse_diagonal,
    })
}

/// Ordinary least squares (no penalty).
pub fn least_squares(design: &[Vec<f64>], target: &[f64]) -> Result<LeastSquaresFit, ModelError> {
    let p = design.first().map_or(0, Vec::len);
    penalized_least_squares(design, target, &vec![0.0; p])
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

struct Cholesky {
    l: Vec<f64>,
    n: usize,
}

impl Cholesky {
    fn decompose(a: &[f64], n: usize) -> Option<Self> {
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = a[i * n + j];
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                if i == j {
                    // relative pivot floor: treat near-singular as singular
                    if sum <= a[i * n + i].abs() * 1e-12 || !sum.is_finite() {
                        return None;
                    }
                    l[i * n + i] = sum.sqrt();
                } else {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }
        Some(Self { l, n })
    }

    /// Retries with a growing ridge on the diagonal when `a` is only
    /// semi-definite (collinear columns).
    fn decompose_with_jitter(a: &[f64], n: usize) -> Result<Self, ModelError> {
        if let Some(c) = Self::decompose(a, n) {
            return Ok(c);
        }
        let scale = (0..n).map(|i| a[i * n + i].abs()).fold(0.0, f64::max).max(1.0);
        let mut jitter = 1e-10 * scale;
        for _ in 0..6 {
            let mut b = a.to_vec();
            for i in 0..n {
                b[i * n + i] += jitter;
            }
            if let Some(c) = Self::decompose(&b, n) {
                return Ok(c);
            }
            jitter *= 100.0;
        }
        Err(ModelError::Numerical(
            "normal equations are not positive definite".into(),
        ))
    }

    fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.n;
        let l = &self.l;
        let mut y = vec![0.0; n];
        for i in 0..n {
            let s: f64 = (0..i).map(|k| l[i * n + k] * y[k]).sum();
            y[i] = (b[i] - s) / l[i * n + i];
        }
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let s: f64 = (i + 1..n).map(|k| l[k * n + i] * x[k]).sum();
            x[i] = (y[i] - s) / l[i * n + i];
        }
        x
    }
}
