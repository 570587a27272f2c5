//! Calibrated class model consumed by the estimator.
//!
//! Holds the immutable per-material reflectance priors, per-light-source
//! spectrum priors, patch-averaged reflectance per pair, and the observation
//! noise model. Built once by [`crate::calibration`] or assembled directly with
//! [`CalibratedModel::from_parts`].

use crate::calibration::ReducedBasis;
use crate::error::{ConstancyError, NumericEntity, Result};
use crate::gaussian::Gaussian;
use crate::types::{ClassCatalog, LightSourceId, MaterialId};
use nalgebra::{DMatrix, DVector};

#[derive(Clone, Debug)]
pub struct MaterialClass {
    pub id: MaterialId,
    pub name: String,
    pub prior: f64,
    /// Distribution over reduced reflectance coordinates (dimension `D`).
    pub reflectance: Gaussian,
}

impl MaterialClass {
    #[inline]
    pub fn log_prior(&self) -> f64 {
        self.prior.ln()
    }
}

#[derive(Clone, Debug)]
pub struct LightSourceClass {
    pub id: LightSourceId,
    pub name: String,
    pub prior: f64,
    /// Distribution over spectrum coordinates (dimension `M`).
    pub spectrum: Gaussian,
}

impl LightSourceClass {
    #[inline]
    pub fn log_prior(&self) -> f64 {
        self.prior.ln()
    }
}

/// Zero-mean Gaussian pixel noise `N(0, Σ_p)`.
#[derive(Clone, Debug)]
pub struct ObservationModel {
    noise: Gaussian,
}

impl ObservationModel {
    pub fn new(covariance: DMatrix<f64>) -> Result<Self> {
        let k = covariance.nrows();
        let noise = Gaussian::new(DVector::zeros(k), covariance).ok_or_else(|| {
            ConstancyError::unstable(
                NumericEntity::ObservationNoise,
                None,
                "observation covariance is not positive definite",
            )
        })?;
        Ok(Self { noise })
    }

    pub fn isotropic(channels: usize, variance: f64) -> Result<Self> {
        Self::new(DMatrix::identity(channels, channels) * variance)
    }

    pub fn channels(&self) -> usize {
        self.noise.dim()
    }

    /// `Σ_p`.
    pub fn covariance(&self) -> &DMatrix<f64> {
        self.noise.covariance()
    }

    /// `Σ_p⁻¹`.
    pub fn precision(&self) -> &DMatrix<f64> {
        self.noise.precision()
    }

    /// Log-density of an observation residual `p − g·Sᵗβ`.
    pub fn log_density(&self, residual: &DVector<f64>) -> f64 {
        self.noise.log_density_centered(residual)
    }
}

#[derive(Clone, Debug)]
pub struct CalibratedModel {
    model_dimensions: usize,
    channels: usize,
    materials: Vec<MaterialClass>,
    light_sources: Vec<LightSourceClass>,
    /// Patch-averaged reflectance per pair, indexed `m * L + w`.
    pair_reflectance: Vec<DVector<f64>>,
    bases: Vec<ReducedBasis>,
}

impl CalibratedModel {
    /// Assemble a model from explicit distributions.
    ///
    /// `reflectance[m]` and `spectra[w]` are `(mean, covariance)` pairs;
    /// `pair_reflectance` is indexed `m * num_light_sources + w`.
    pub fn from_parts(
        catalog: &ClassCatalog,
        model_dimensions: usize,
        reflectance: Vec<(DVector<f64>, DMatrix<f64>)>,
        spectra: Vec<(DVector<f64>, DMatrix<f64>)>,
        pair_reflectance: Vec<DVector<f64>>,
    ) -> Result<Self> {
        let priors = catalog.resolve()?;
        let (n_mat, n_light) = (catalog.num_materials(), catalog.num_light_sources());
        if model_dimensions == 0 {
            return Err(ConstancyError::config("model_dimensions must be at least 1"));
        }
        if reflectance.len() != n_mat || spectra.len() != n_light {
            return Err(ConstancyError::config(format!(
                "expected {n_mat} reflectance and {n_light} spectrum distributions, got {} and {}",
                reflectance.len(),
                spectra.len()
            )));
        }
        if pair_reflectance.len() != n_mat * n_light {
            return Err(ConstancyError::config(format!(
                "expected {} pair reflectances, got {}",
                n_mat * n_light,
                pair_reflectance.len()
            )));
        }
        let d = reflectance[0].0.len();
        if d == 0 || d % model_dimensions != 0 {
            return Err(ConstancyError::config(format!(
                "reflectance dimension {d} is not a multiple of model_dimensions {model_dimensions}"
            )));
        }
        if let Some(bad) = reflectance
            .iter()
            .map(|(mu, _)| mu.len())
            .chain(pair_reflectance.iter().map(|p| p.len()))
            .find(|&len| len != d)
        {
            return Err(ConstancyError::config(format!(
                "reflectance vectors must all have dimension {d}, found {bad}"
            )));
        }
        if let Some((w, _)) = spectra
            .iter()
            .enumerate()
            .find(|(_, (mu, _))| mu.len() != model_dimensions)
        {
            return Err(ConstancyError::config(format!(
                "spectrum prior of light source {w} must have dimension {model_dimensions}"
            )));
        }

        let materials = reflectance
            .into_iter()
            .enumerate()
            .map(|(m, (mean, cov))| {
                let reflectance = Gaussian::new(mean, cov).ok_or_else(|| {
                    ConstancyError::unstable(
                        NumericEntity::Material(MaterialId(m)),
                        None,
                        "reflectance covariance is not positive definite",
                    )
                })?;
                Ok(MaterialClass {
                    id: MaterialId(m),
                    name: catalog.materials[m].name.clone(),
                    prior: priors.materials[m],
                    reflectance,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let light_sources = spectra
            .into_iter()
            .enumerate()
            .map(|(w, (mean, cov))| {
                let spectrum = Gaussian::new(mean, cov).ok_or_else(|| {
                    ConstancyError::unstable(
                        NumericEntity::LightSource(LightSourceId(w)),
                        None,
                        "spectrum covariance is not positive definite",
                    )
                })?;
                Ok(LightSourceClass {
                    id: LightSourceId(w),
                    name: catalog.light_sources[w].name.clone(),
                    prior: priors.light_sources[w],
                    spectrum,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            model_dimensions,
            channels: d / model_dimensions,
            materials,
            light_sources,
            pair_reflectance,
            bases: Vec::new(),
        })
    }

    pub(crate) fn with_bases(mut self, bases: Vec<ReducedBasis>) -> Self {
        self.bases = bases;
        self
    }

    pub fn model_dimensions(&self) -> usize {
        self.model_dimensions
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `D = model_dimensions × channels`.
    pub fn reflectance_dim(&self) -> usize {
        self.model_dimensions * self.channels
    }

    pub fn materials(&self) -> &[MaterialClass] {
        &self.materials
    }

    pub fn light_sources(&self) -> &[LightSourceClass] {
        &self.light_sources
    }

    pub fn material(&self, m: MaterialId) -> &MaterialClass {
        &self.materials[m.0]
    }

    pub fn light_source(&self, w: LightSourceId) -> &LightSourceClass {
        &self.light_sources[w.0]
    }

    /// Number of (material, light source) combinations.
    pub fn num_combinations(&self) -> usize {
        self.materials.len() * self.light_sources.len()
    }

    /// All combinations, material-major.
    pub fn combinations(&self) -> impl Iterator<Item = (MaterialId, LightSourceId)> + '_ {
        let n_light = self.light_sources.len();
        (0..self.num_combinations()).map(move |i| (MaterialId(i / n_light), LightSourceId(i % n_light)))
    }

    pub fn pair_reflectance(&self, m: MaterialId, w: LightSourceId) -> &DVector<f64> {
        &self.pair_reflectance[m.0 * self.light_sources.len() + w.0]
    }

    /// Reduced bases from calibration; empty for models built from parts.
    pub fn bases(&self) -> &[ReducedBasis] {
        &self.bases
    }

    pub fn basis(&self, m: MaterialId, w: LightSourceId) -> Option<&ReducedBasis> {
        self.bases
            .get(m.0 * self.light_sources.len() + w.0)
    }
}
