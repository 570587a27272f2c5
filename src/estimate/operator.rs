//! Structured spectrum operator.
//!
//! A reflectance vector `σ` of length `D = M·C` stores the `M × C` reflectance
//! matrix `S` column by column (channel-major): `σ[c·M + k] = S[k, c]`.
//! The operator `B` is block diagonal with one copy of the spectrum `β` per
//! colour channel, so that `Bᵗσ = Sᵗβ` is the noiseless pixel colour at unit
//! illumination. The blocks are never materialised.

use nalgebra::{DMatrix, DVector};

/// View `σ` as the `M × C` reflectance matrix `S`.
pub fn reflectance_matrix(sigma: &DVector<f64>, model_dimensions: usize) -> DMatrix<f64> {
    let channels = sigma.len() / model_dimensions;
    DMatrix::from_column_slice(model_dimensions, channels, sigma.as_slice())
}

/// Block-diagonal operator `B` (`D × C`) built from a spectrum `β`.
#[derive(Clone, Copy, Debug)]
pub struct SpectrumOperator<'a> {
    beta: &'a DVector<f64>,
    channels: usize,
}

impl<'a> SpectrumOperator<'a> {
    pub fn new(beta: &'a DVector<f64>, channels: usize) -> Self {
        Self { beta, channels }
    }

    #[inline]
    pub fn model_dimensions(&self) -> usize {
        self.beta.len()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Reflectance dimension `D = M·C`.
    #[inline]
    pub fn reflectance_dim(&self) -> usize {
        self.beta.len() * self.channels
    }

    /// `Bᵗσ`, i.e. `Sᵗβ`.
    pub fn apply_transpose(&self, sigma: &DVector<f64>) -> DVector<f64> {
        let m = self.model_dimensions();
        DVector::from_fn(self.channels, |c, _| {
            (0..m).map(|k| self.beta[k] * sigma[c * m + k]).sum()
        })
    }

    /// `B·v` for a colour-space vector `v`.
    pub fn apply(&self, v: &DVector<f64>) -> DVector<f64> {
        let m = self.model_dimensions();
        DVector::from_fn(self.reflectance_dim(), |i, _| self.beta[i % m] * v[i / m])
    }

    /// `A·B` for a `D × D` matrix `A`.
    pub fn right_mul(&self, a: &DMatrix<f64>) -> DMatrix<f64> {
        let m = self.model_dimensions();
        DMatrix::from_fn(a.nrows(), self.channels, |i, c| {
            (0..m).map(|k| a[(i, c * m + k)] * self.beta[k]).sum()
        })
    }

    /// `Bᵗ·A` for a `D × n` matrix `A`.
    pub fn transpose_mul(&self, a: &DMatrix<f64>) -> DMatrix<f64> {
        let m = self.model_dimensions();
        DMatrix::from_fn(self.channels, a.ncols(), |c, j| {
            (0..m).map(|k| self.beta[k] * a[(c * m + k, j)]).sum()
        })
    }

    /// `BᵗAB`.
    pub fn sandwich(&self, a: &DMatrix<f64>) -> DMatrix<f64> {
        self.transpose_mul(&self.right_mul(a))
    }

    /// Dense `D × C` matrix; only used to cross-check the structured products.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let m = self.model_dimensions();
        DMatrix::from_fn(self.reflectance_dim(), self.channels, |i, c| {
            if i / m == c {
                self.beta[i % m]
            } else {
                0.0
            }
        })
    }
}
