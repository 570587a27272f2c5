//! Gaussian densities in the reduced coordinate spaces.
//!
//! [`Gaussian`] caches the Cholesky-derived precision and log-determinant so
//! that repeated log-density evaluations cost one quadratic form each.
//! [`UnivariateGaussian`] models the per-light-source illumination scale.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::f64::consts::PI;

const LN_2PI: f64 = 1.837_877_066_409_345_3; // ln(2π)

/// Multivariate normal distribution with cached precision.
#[derive(Clone, Debug)]
pub struct Gaussian {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    precision: DMatrix<f64>,
    log_det: f64,
}

impl Gaussian {
    /// Build from mean and covariance. Returns `None` if the covariance is not
    /// square, does not match the mean, or is not positive definite.
    pub fn new(mean: DVector<f64>, covariance: DMatrix<f64>) -> Option<Self> {
        let k = mean.len();
        if k == 0 || covariance.nrows() != k || covariance.ncols() != k {
            return None;
        }
        let covariance = symmetrize(&covariance);
        let chol = covariance.clone().cholesky()?;
        let l = chol.l_dirty();
        let mut log_det = 0.0;
        for i in 0..k {
            let d = l[(i, i)];
            if !(d.is_finite() && d > 0.0) {
                return None;
            }
            log_det += 2.0 * d.ln();
        }
        let precision = chol.inverse();
        if precision.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self {
            mean,
            covariance,
            precision,
            log_det,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// `−(k/2)ln(2π) − ½ln|Σ| − ½(x−μ)ᵗΣ⁻¹(x−μ)`.
    pub fn log_density(&self, x: &DVector<f64>) -> f64 {
        self.log_density_centered(&(x - &self.mean))
    }

    /// Log-density evaluated at a residual `x − μ` that the caller already
    /// formed (used when the mean varies per call but the covariance does not).
    pub fn log_density_centered(&self, residual: &DVector<f64>) -> f64 {
        let q = (residual.transpose() * &self.precision * residual)[(0, 0)];
        -0.5 * (self.dim() as f64) * LN_2PI - 0.5 * self.log_det - 0.5 * q
    }
}

/// Normal distribution over a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UnivariateGaussian {
    pub mean: f64,
    pub std: f64,
}

impl Default for UnivariateGaussian {
    /// Neutral prior used when no pixel supports a light source.
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 1.0,
        }
    }
}

impl UnivariateGaussian {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// Mean and population standard deviation of `values`, with the standard
    /// deviation floored at `min_std`. Empty input yields the neutral prior.
    pub fn from_samples(values: &[f64], min_std: f64) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt().max(min_std),
        }
    }

    #[inline]
    pub fn variance(&self) -> f64 {
        self.std * self.std
    }

    pub fn log_density(&self, x: f64) -> f64 {
        let var = self.variance();
        let d = x - self.mean;
        -0.5 * (2.0 * PI * var).ln() - 0.5 * d * d / var
    }
}

/// Sample mean and covariance (unbiased when more than one sample), with
/// `ridge` added to the diagonal.
pub fn sample_moments(samples: &[DVector<f64>], ridge: f64) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let first = samples.first()?;
    let k = first.len();
    let n = samples.len() as f64;
    let mut mean = DVector::zeros(k);
    for s in samples {
        mean += s;
    }
    mean /= n;
    let mut cov = DMatrix::zeros(k, k);
    if samples.len() > 1 {
        for s in samples {
            let d = s - &mean;
            cov += &d * d.transpose();
        }
        cov /= n - 1.0;
    }
    for i in 0..k {
        cov[(i, i)] += ridge;
    }
    Some((mean, cov))
}

/// Moments of a weighted mixture of Gaussians:
/// `μ = Σ wᵢμᵢ`, `Σ = Σ wᵢ(Σᵢ + μᵢμᵢᵗ) − μμᵗ`.
pub fn mixture_moments(
    components: &[(f64, DVector<f64>, DMatrix<f64>)],
) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let (_, first, _) = components.first()?;
    let k = first.len();
    let total: f64 = components.iter().map(|(w, _, _)| *w).sum();
    if total <= 0.0 {
        return None;
    }
    let mut mean = DVector::zeros(k);
    for (w, mu, _) in components {
        mean += mu * (*w / total);
    }
    let mut second = DMatrix::zeros(k, k);
    for (w, mu, cov) in components {
        second += (cov + mu * mu.transpose()) * (*w / total);
    }
    let cov = symmetrize(&(second - &mean * mean.transpose()));
    Some((mean, cov))
}

fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}
