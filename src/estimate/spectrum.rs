//! Per-light-source spectrum refresh.
//!
//! Every pixel votes once, for the light source of its rank-0 hypothesis,
//! with that hypothesis' reflectance `S` and illumination `g`. For each light
//! source the regularised weighted least-squares system
//!
//! ```text
//! H = Σ g²·S·W·Sᵗ + n·Σ_β⁻¹
//! b = Σ g·S·W·p   + n·Σ_β⁻¹·μ_β
//! β = H⁻¹·b
//! ```
//!
//! is solved, where the weight `W` is the observation covariance `Σ_p` (or its
//! inverse, see `SpectrumWeighting`). A light source without voters keeps its
//! prior mean.

use super::operator::reflectance_matrix;
use crate::error::{ConstancyError, NumericEntity, Result};
use crate::model::LightSourceClass;
use crate::types::LightSourceId;
use nalgebra::{DMatrix, DVector};

/// One pixel's contribution to the spectrum of its best light source.
#[derive(Clone, Copy, Debug)]
pub struct SpectrumVote<'a> {
    pub light_source: LightSourceId,
    pub reflectance: &'a DVector<f64>,
    pub illumination: f64,
    pub pixel: &'a DVector<f64>,
}

/// Normal-equation accumulator for one light source.
#[derive(Clone, Debug)]
pub struct SpectrumAccumulator {
    pub h: DMatrix<f64>,
    pub b: DVector<f64>,
    pub votes: usize,
}

impl SpectrumAccumulator {
    pub fn new(model_dimensions: usize) -> Self {
        Self {
            h: DMatrix::zeros(model_dimensions, model_dimensions),
            b: DVector::zeros(model_dimensions),
            votes: 0,
        }
    }

    /// Add one vote, weighting its residual with `weight` (`C × C`).
    pub fn accumulate(&mut self, vote: &SpectrumVote<'_>, weight: &DMatrix<f64>) {
        let m = self.b.len();
        let s = reflectance_matrix(vote.reflectance, m);
        let sp = &s * weight;
        let g = vote.illumination;
        self.h += (&sp * s.transpose()) * (g * g);
        self.b += (&sp * vote.pixel) * g;
        self.votes += 1;
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.h += other.h;
        self.b += other.b;
        self.votes += other.votes;
        self
    }

    /// Add the prior regulariser and solve for the spectrum.
    pub fn solve(self, light: &LightSourceClass) -> Result<DVector<f64>> {
        if self.votes == 0 {
            return Ok(light.spectrum.mean().clone());
        }
        let n = self.votes as f64;
        let prior_precision = light.spectrum.precision();
        let h = self.h + prior_precision * n;
        let b = self.b + (prior_precision * light.spectrum.mean()) * n;
        let unstable = |reason: String| {
            ConstancyError::unstable(NumericEntity::LightSource(light.id), None, reason)
        };
        if !(h.iter().all(|v| v.is_finite()) && b.iter().all(|v| v.is_finite())) {
            return Err(unstable(format!(
                "spectrum normal equations have non-finite entries ({} votes)",
                self.votes
            )));
        }
        let solved = match h.clone().cholesky() {
            Some(chol) => Some(chol.solve(&b)),
            None => h.lu().solve(&b),
        };
        match solved {
            Some(beta) if beta.iter().all(|v| v.is_finite()) => Ok(beta),
            Some(_) => Err(unstable(format!(
                "spectrum solution is not finite ({} votes)",
                self.votes
            ))),
            None => Err(unstable(format!(
                "spectrum normal equations are singular ({} votes)",
                self.votes
            ))),
        }
    }
}

/// Accumulate votes per light source (sequential reduction).
pub fn accumulate_votes(
    votes: &[SpectrumVote<'_>],
    num_light_sources: usize,
    model_dimensions: usize,
    weight: &DMatrix<f64>,
) -> Vec<SpectrumAccumulator> {
    let mut accs = vec![SpectrumAccumulator::new(model_dimensions); num_light_sources];
    for vote in votes {
        accs[vote.light_source.0].accumulate(vote, weight);
    }
    accs
}

/// Accumulate votes per light source with a parallel fold/reduce over pixels.
#[cfg(feature = "parallel")]
pub fn accumulate_votes_parallel(
    votes: &[SpectrumVote<'_>],
    num_light_sources: usize,
    model_dimensions: usize,
    weight: &DMatrix<f64>,
) -> Vec<SpectrumAccumulator> {
    use rayon::prelude::*;

    let empty = || vec![SpectrumAccumulator::new(model_dimensions); num_light_sources];
    votes
        .par_iter()
        .fold(empty, |mut accs, vote| {
            accs[vote.light_source.0].accumulate(vote, weight);
            accs
        })
        .reduce(empty, |a, b| {
            a.into_iter().zip(b).map(|(x, y)| x.merge(y)).collect()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::SpectrumOperator;
    use crate::gaussian::Gaussian;
    use crate::model::ObservationModel;
    use approx::assert_relative_eq;

    fn single_vote<'a>(refl: &'a DVector<f64>, pixel: &'a DVector<f64>) -> SpectrumVote<'a> {
        SpectrumVote {
            light_source: LightSourceId(0),
            reflectance: refl,
            illumination: 1.0,
            pixel,
        }
    }

    fn light(mean: f64, var: f64) -> LightSourceClass {
        LightSourceClass {
            id: LightSourceId(0),
            name: "sun".into(),
            prior: 1.0,
            spectrum: Gaussian::new(
                DVector::from_vec(vec![mean, 0.1]),
                DMatrix::identity(2, 2) * var,
            )
            .unwrap(),
        }
    }

    #[test]
    fn no_votes_returns_prior_mean() {
        let light = light(0.8, 0.05);
        let beta = SpectrumAccumulator::new(2).solve(&light).unwrap();
        assert_eq!(&beta, light.spectrum.mean());
    }

    #[test]
    fn broad_prior_recovers_generating_spectrum() {
        let noise = ObservationModel::isotropic(3, 1e-4).unwrap();
        let true_beta = DVector::from_vec(vec![1.4, -0.3]);
        let reflectances = [
            DVector::from_vec(vec![0.6, 0.1, 0.3, 0.2, 0.2, 0.4]),
            DVector::from_vec(vec![0.2, 0.3, 0.5, 0.1, 0.1, 0.6]),
            DVector::from_vec(vec![0.4, 0.4, 0.4, 0.0, 0.3, 0.2]),
        ];
        let gains = [0.9, 1.2, 0.5];
        let pixels: Vec<DVector<f64>> = reflectances
            .iter()
            .zip(gains)
            .map(|(s, g)| SpectrumOperator::new(&true_beta, 3).apply_transpose(s) * g)
            .collect();
        let votes: Vec<SpectrumVote<'_>> = (0..3)
            .map(|i| SpectrumVote {
                light_source: LightSourceId(0),
                reflectance: &reflectances[i],
                illumination: gains[i],
                pixel: &pixels[i],
            })
            .collect();
        let accs = accumulate_votes(&votes, 1, 2, noise.covariance());
        let beta = accs.into_iter().next().unwrap().solve(&light(0.0, 1e12)).unwrap();
        assert_relative_eq!(beta, true_beta, epsilon = 1e-4);

        let accs = accumulate_votes(&votes, 1, 2, noise.precision());
        let beta = accs.into_iter().next().unwrap().solve(&light(0.0, 1e6)).unwrap();
        assert_relative_eq!(beta, true_beta, epsilon = 1e-4);
    }

    #[test]
    fn covariance_weighting_keeps_small_noise_close_to_prior() {
        let noise = ObservationModel::isotropic(3, 1e-3).unwrap();
        let refl = DVector::from_vec(vec![0.6, 0.1, 0.3, 0.2, 0.2, 0.4]);
        let pixel = DVector::from_vec(vec![1.5, 0.2, 0.9]);
        let light = light(0.8, 1.0);

        let mut acc = SpectrumAccumulator::new(2);
        acc.accumulate(&single_vote(&refl, &pixel), noise.covariance());
        let beta = acc.solve(&light).unwrap();
        assert_relative_eq!(beta, DVector::from_vec(vec![0.800728, 0.100369]), epsilon = 1e-6);

        let mut acc = SpectrumAccumulator::new(2);
        acc.accumulate(&single_vote(&refl, &pixel), noise.precision());
        let beta = acc.solve(&light).unwrap();
        assert_relative_eq!(beta, DVector::from_vec(vec![2.054823, 0.659409]), epsilon = 1e-6);
    }

    #[test]
    fn non_finite_votes_are_reported_as_such() {
        let noise = ObservationModel::isotropic(3, 1e-3).unwrap();
        let refl = DVector::from_vec(vec![0.6, 0.1, 0.3, 0.2, 0.2, 0.4]);
        let pixel = DVector::from_vec(vec![f64::NAN, 0.2, 0.9]);
        let mut acc = SpectrumAccumulator::new(2);
        acc.accumulate(&single_vote(&refl, &pixel), noise.covariance());
        let err = acc.solve(&light(0.8, 1.0)).unwrap_err();
        assert!(err.to_string().contains("non-finite"), "{err}");
        assert!(err.to_string().contains("light source 0"), "{err}");
    }

    #[test]
    fn confident_prior_pins_spectrum() {
        let noise = ObservationModel::isotropic(3, 1e-3).unwrap();
        let refl = DVector::from_vec(vec![0.6, 0.1, 0.3, 0.2, 0.2, 0.4]);
        let pixel = DVector::from_vec(vec![3.0, 0.1, 2.0]);
        let votes = vec![
            SpectrumVote {
                light_source: LightSourceId(0),
                reflectance: &refl,
                illumination: 1.0,
                pixel: &pixel,
            };
            4
        ];
        let light = light(0.8, 1e-12);
        let mut acc = SpectrumAccumulator::new(2);
        for v in &votes {
            acc.accumulate(v, noise.covariance());
        }
        let beta = acc.solve(&light).unwrap();
        assert_relative_eq!(beta, light.spectrum.mean().clone(), epsilon = 1e-6);
    }
}
