//! Scalar posterior mean of the global illumination of one pixel.
//!
//! With local prior `g ~ N(μ_g, σ_g²)`, `a = Sᵗβ`, and precision `Σ_p⁻¹`:
//! `g = (μ_g + σ_g²·pᵗΣ_p⁻¹a) / (1 + σ_g²·aᵗΣ_p⁻¹a)`.

use super::operator::SpectrumOperator;
use crate::gaussian::UnivariateGaussian;
use crate::model::ObservationModel;
use nalgebra::DVector;

pub fn estimate_illumination(
    prior: &UnivariateGaussian,
    reflectance: &DVector<f64>,
    beta: &DVector<f64>,
    pixel: &DVector<f64>,
    noise: &ObservationModel,
) -> f64 {
    let a = SpectrumOperator::new(beta, noise.channels()).apply_transpose(reflectance);
    let pa = noise.precision() * &a;
    let var = prior.variance();
    (prior.mean + var * pixel.dot(&pa)) / (1.0 + var * a.dot(&pa))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn broad_prior_recovers_generating_scale() {
        let sigma = DVector::from_vec(vec![0.5, 0.3, 0.2]);
        let beta = DVector::from_vec(vec![1.5]);
        let noise = ObservationModel::isotropic(3, 1e-4).unwrap();
        let pixel = SpectrumOperator::new(&beta, 3).apply_transpose(&sigma) * 2.0;
        let g = estimate_illumination(
            &UnivariateGaussian::new(0.0, 1e3),
            &sigma,
            &beta,
            &pixel,
            &noise,
        );
        assert_relative_eq!(g, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn tight_prior_dominates_evidence() {
        let sigma = DVector::from_vec(vec![0.5, 0.3, 0.2]);
        let beta = DVector::from_vec(vec![1.0]);
        let noise = ObservationModel::isotropic(3, 1e-2).unwrap();
        let pixel = DVector::from_vec(vec![5.0, 3.0, 2.0]);
        let g = estimate_illumination(
            &UnivariateGaussian::new(0.7, 1e-6),
            &sigma,
            &beta,
            &pixel,
            &noise,
        );
        assert_relative_eq!(g, 0.7, epsilon = 1e-6);
    }
}
