//! Parameter types configuring calibration and estimation.
//!
//! Every struct deserialises from JSON with per-field defaults, so a runtime
//! config only needs to spell out what it changes.

use crate::calibration::CalibrationOptions;
use crate::error::{ConstancyError, Result};
use crate::model::ObservationModel;
use crate::types::ClassCatalog;
use crate::window::WindowOptions;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;

/// All recognised options.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConstancyParams {
    pub classes: ClassCatalog,
    pub calibration: CalibrationOptions,
    pub noise: ObservationNoise,
    pub window: WindowOptions,
    pub scoring: ScoringOptions,
}

impl ConstancyParams {
    /// Checks the estimation options (class priors are checked when the
    /// catalog is resolved).
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.scoring.validate()
    }
}

/// Pixel noise covariance `Σ_p`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationNoise {
    /// `σ²·I`.
    Isotropic(f64),
    /// Per-channel variances.
    Diagonal(Vec<f64>),
    /// Full covariance, row by row.
    Full(Vec<Vec<f64>>),
}

impl Default for ObservationNoise {
    fn default() -> Self {
        ObservationNoise::Isotropic(1e-3)
    }
}

impl ObservationNoise {
    pub fn covariance(&self, channels: usize) -> Result<DMatrix<f64>> {
        match self {
            ObservationNoise::Isotropic(var) => Ok(DMatrix::identity(channels, channels) * *var),
            ObservationNoise::Diagonal(vars) => {
                if vars.len() != channels {
                    return Err(ConstancyError::config(format!(
                        "diagonal observation noise has {} entries, image has {channels} channels",
                        vars.len()
                    )));
                }
                Ok(DMatrix::from_diagonal(&DVector::from_column_slice(vars)))
            }
            ObservationNoise::Full(rows) => {
                if rows.len() != channels || rows.iter().any(|r| r.len() != channels) {
                    return Err(ConstancyError::config(format!(
                        "observation covariance must be {channels}x{channels}"
                    )));
                }
                let cov = DMatrix::from_fn(channels, channels, |i, j| rows[i][j]);
                if (&cov - cov.transpose()).abs().max() > 1e-12 {
                    return Err(ConstancyError::config("observation covariance is not symmetric"));
                }
                Ok(cov)
            }
        }
    }

    /// Build the observation model, failing if `Σ_p` is not positive definite.
    pub fn model(&self, channels: usize) -> Result<ObservationModel> {
        ObservationModel::new(self.covariance(channels)?)
    }
}

/// Which illumination distribution scores a hypothesis' illumination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IlluminationPrior {
    /// Distribution of the window that owns the pixel.
    #[default]
    Local,
    /// Image-wide distribution of the light source.
    Global,
}

/// Matrix weighting each vote's residual in the spectrum normal equations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumWeighting {
    /// `H += g²·S·Σ_p·Sᵗ`, `b += g·S·Σ_p·p`.
    #[default]
    Covariance,
    /// `H += g²·S·Σ_p⁻¹·Sᵗ`, `b += g·S·Σ_p⁻¹·p` (generalised least squares).
    Precision,
}

impl SpectrumWeighting {
    pub fn matrix<'a>(&self, noise: &'a ObservationModel) -> &'a DMatrix<f64> {
        match self {
            SpectrumWeighting::Covariance => noise.covariance(),
            SpectrumWeighting::Precision => noise.precision(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    pub illumination_prior: IlluminationPrior,
    /// Floor for the standard deviation of illumination distributions.
    pub min_illumination_std: f64,
    pub spectrum_weighting: SpectrumWeighting,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            illumination_prior: IlluminationPrior::Local,
            min_illumination_std: 1e-3,
            spectrum_weighting: SpectrumWeighting::Covariance,
        }
    }
}

impl ScoringOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_illumination_std > 0.0 && self.min_illumination_std.is_finite()) {
            return Err(ConstancyError::config(format!(
                "min_illumination_std must be positive, got {}",
                self.min_illumination_std
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_with_defaults() {
        let params: ConstancyParams = serde_json::from_str(
            r#"{
                "classes": {
                    "materials": [{"name": "skin"}, {"name": "paint"}],
                    "light_sources": [{"name": "sun", "prior": 0.7}, {"name": "lamp", "prior": 0.3}]
                },
                "noise": {"diagonal": [0.001, 0.002, 0.001]},
                "window": {"size": 8}
            }"#,
        )
        .unwrap();
        assert_eq!(params.classes.num_materials(), 2);
        assert_eq!(params.window.size, 8);
        assert_eq!(params.window.overlap, 4);
        assert_eq!(params.calibration.model_dimensions, 3);
        assert_eq!(params.scoring.illumination_prior, IlluminationPrior::Local);
        assert_eq!(params.scoring.spectrum_weighting, SpectrumWeighting::Covariance);
        let cov = params.noise.covariance(3).unwrap();
        assert_eq!(cov[(1, 1)], 0.002);
        assert_eq!(cov[(0, 1)], 0.0);
        params.validate().unwrap();
    }

    #[test]
    fn spectrum_weighting_selects_noise_matrix() {
        let scoring: ScoringOptions = serde_json::from_str(
            r#"{"illumination_prior": "global", "spectrum_weighting": "precision"}"#,
        )
        .unwrap();
        assert_eq!(scoring.illumination_prior, IlluminationPrior::Global);
        let noise = ObservationNoise::Isotropic(0.01).model(3).unwrap();
        assert_eq!(scoring.spectrum_weighting.matrix(&noise)[(0, 0)], 100.0);
        assert_eq!(SpectrumWeighting::Covariance.matrix(&noise)[(0, 0)], 0.01);
        assert_eq!(SpectrumWeighting::Covariance.matrix(&noise)[(0, 1)], 0.0);
    }

    #[test]
    fn noise_shape_must_match_channels() {
        assert!(ObservationNoise::Diagonal(vec![1.0, 1.0]).covariance(3).is_err());
        let asym = ObservationNoise::Full(vec![vec![1.0, 0.5], vec![0.0, 1.0]]);
        assert!(asym.covariance(2).unwrap_err().is_configuration());
        assert!(ObservationNoise::Isotropic(-1.0).model(3).is_err());
    }
}
