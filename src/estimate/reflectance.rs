//! Closed-form Bayesian reflectance update.
//!
//! With `B` the structured spectrum operator, prior `N(μ_o, Σ_o)` and
//! observation `p = g·Bᵗσ + n`, `n ~ N(0, Σ_p)`:
//!
//! ```text
//! K3 = (Σ_p / g² + BᵗΣ_oB)⁻¹
//! K2 = g·Σ_oB·(I − K3·BᵗΣ_oB)
//! K1 = I − Σ_oB·K3·Bᵗ
//! σ' = K1·μ_o + K2·Σ_p⁻¹·p
//! ```
//!
//! which is the exact posterior mean of `σ` for jointly Gaussian variables.

use super::operator::SpectrumOperator;
use crate::gaussian::Gaussian;
use crate::model::ObservationModel;
use nalgebra::{DMatrix, DVector};

/// Illumination magnitudes below this carry no information about reflectance.
pub const MIN_ILLUMINATION: f64 = 1e-12;

/// Posterior mean of the reflectance coefficients. Returns `None` if the
/// innovation matrix cannot be inverted.
pub fn estimate_reflectance(
    prior: &Gaussian,
    beta: &DVector<f64>,
    illumination: f64,
    pixel: &DVector<f64>,
    noise: &ObservationModel,
) -> Option<DVector<f64>> {
    let g = illumination;
    if g.abs() < MIN_ILLUMINATION {
        return Some(prior.mean().clone());
    }
    let op = SpectrumOperator::new(beta, noise.channels());
    let sigma_o_b = op.right_mul(prior.covariance());
    let projected = op.transpose_mul(&sigma_o_b);

    let k3 = (noise.covariance() / (g * g) + &projected).try_inverse()?;
    let channels = noise.channels();
    let k2 = &sigma_o_b * (DMatrix::identity(channels, channels) - &k3 * &projected) * g;
    let k1_mu = prior.mean() - &sigma_o_b * (&k3 * op.apply_transpose(prior.mean()));
    let updated = k1_mu + k2 * (noise.precision() * pixel);
    updated.iter().all(|v| v.is_finite()).then_some(updated)
}
