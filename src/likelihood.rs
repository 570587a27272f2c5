//! Joint log-posterior of a hypothesis given the current global estimates.
//!
//! The score of hypothesis `(m, w, σ, g)` at pixel `p` is the sum of
//!
//! - the observation term `log N(p; g·Sᵗβ_w, Σ_p)`,
//! - the reflectance term `log N(σ; μ_m, Σ_m)`,
//! - the illumination term `log N(g; μ_g, σ_g²)` under the local (window) or
//!   global distribution of `w`,
//! - the spectrum term `log N(β_w; μ_w, Σ_w)`,
//! - the log-priors of `m` and `w`.
//!
//! The spectrum term only depends on the light source, so it is evaluated
//! once per light source when the evaluator is built.

use crate::estimate::SpectrumOperator;
use crate::gaussian::UnivariateGaussian;
use crate::hypothesis::Hypothesis;
use crate::model::{CalibratedModel, ObservationModel};
use nalgebra::DVector;
use serde::Serialize;

/// Individual log-probability terms of one hypothesis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct LikelihoodTerms {
    pub observation: f64,
    pub reflectance: f64,
    pub illumination: f64,
    pub spectrum: f64,
    pub prior: f64,
}

impl LikelihoodTerms {
    pub fn total(&self) -> f64 {
        self.observation + self.reflectance + self.illumination + self.spectrum + self.prior
    }
}

pub struct LikelihoodEvaluator<'a> {
    model: &'a CalibratedModel,
    noise: &'a ObservationModel,
    spectra: &'a [DVector<f64>],
    spectrum_terms: Vec<f64>,
}

impl<'a> LikelihoodEvaluator<'a> {
    /// `spectra[w]` is the current spectrum estimate of light source `w`.
    pub fn new(
        model: &'a CalibratedModel,
        noise: &'a ObservationModel,
        spectra: &'a [DVector<f64>],
    ) -> Self {
        let spectrum_terms = model
            .light_sources()
            .iter()
            .zip(spectra)
            .map(|(light, beta)| light.spectrum.log_density(beta))
            .collect();
        Self {
            model,
            noise,
            spectra,
            spectrum_terms,
        }
    }

    /// `log N(p; g·Sᵗβ, Σ_p)` for an explicit reflectance, illumination and
    /// spectrum.
    pub fn observation_term(
        &self,
        reflectance: &DVector<f64>,
        illumination: f64,
        beta: &DVector<f64>,
        pixel: &DVector<f64>,
    ) -> f64 {
        let predicted =
            SpectrumOperator::new(beta, self.noise.channels()).apply_transpose(reflectance);
        self.noise.log_density(&(pixel - predicted * illumination))
    }

    pub fn terms(
        &self,
        hypothesis: &Hypothesis,
        pixel: &DVector<f64>,
        illumination_prior: &UnivariateGaussian,
    ) -> LikelihoodTerms {
        let material = self.model.material(hypothesis.material);
        let light = self.model.light_source(hypothesis.light_source);
        let beta = &self.spectra[hypothesis.light_source.0];
        LikelihoodTerms {
            observation: self.observation_term(
                &hypothesis.reflectance,
                hypothesis.illumination,
                beta,
                pixel,
            ),
            reflectance: material.reflectance.log_density(&hypothesis.reflectance),
            illumination: illumination_prior.log_density(hypothesis.illumination),
            spectrum: self.spectrum_terms[hypothesis.light_source.0],
            prior: material.log_prior() + light.log_prior(),
        }
    }

    /// Summed log-likelihood.
    pub fn evaluate(
        &self,
        hypothesis: &Hypothesis,
        pixel: &DVector<f64>,
        illumination_prior: &UnivariateGaussian,
    ) -> f64 {
        self.terms(hypothesis, pixel, illumination_prior).total()
    }
}
