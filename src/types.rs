use crate::diagnostics::{IterationReport, PixelFault};
use crate::error::{ConstancyError, Result};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Index of a material class in the model's class catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub usize);

/// Index of a light-source class in the model's class catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LightSourceId(pub usize);

/// Tolerance applied when checking that priors sum to one.
pub const PRIOR_SUM_TOL: f64 = 1e-6;

/// Named class with an optional prior probability.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    #[serde(default)]
    pub prior: Option<f64>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prior: None,
        }
    }

    pub fn with_prior(mut self, prior: f64) -> Self {
        self.prior = Some(prior);
        self
    }
}

/// Material and light-source catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClassCatalog {
    pub materials: Vec<ClassSpec>,
    pub light_sources: Vec<ClassSpec>,
}

impl ClassCatalog {
    pub fn new(materials: Vec<ClassSpec>, light_sources: Vec<ClassSpec>) -> Self {
        Self {
            materials,
            light_sources,
        }
    }

    /// Catalog with uniform priors and generated names.
    pub fn uniform(num_materials: usize, num_light_sources: usize) -> Self {
        Self {
            materials: (0..num_materials)
                .map(|i| ClassSpec::new(format!("material_{i}")))
                .collect(),
            light_sources: (0..num_light_sources)
                .map(|i| ClassSpec::new(format!("light_{i}")))
                .collect(),
        }
    }

    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn num_light_sources(&self) -> usize {
        self.light_sources.len()
    }

    /// Resolve the priors of both class lists, applying the uniform default.
    pub fn resolve(&self) -> Result<ClassPriors> {
        if self.materials.is_empty() || self.light_sources.is_empty() {
            return Err(ConstancyError::config(format!(
                "need at least one material and one light source (got {} and {})",
                self.materials.len(),
                self.light_sources.len()
            )));
        }
        Ok(ClassPriors {
            materials: resolve_priors("material", &self.materials)?,
            light_sources: resolve_priors("light source", &self.light_sources)?,
        })
    }
}

/// Prior probabilities resolved from a [`ClassCatalog`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassPriors {
    pub materials: Vec<f64>,
    pub light_sources: Vec<f64>,
}

fn resolve_priors(kind: &str, specs: &[ClassSpec]) -> Result<Vec<f64>> {
    let given = specs.iter().filter(|s| s.prior.is_some()).count();
    if given == 0 {
        let p = 1.0 / specs.len() as f64;
        return Ok(vec![p; specs.len()]);
    }
    if given != specs.len() {
        return Err(ConstancyError::config(format!(
            "{kind} priors must be given for all classes or none ({given} of {} given)",
            specs.len()
        )));
    }
    let priors: Vec<f64> = specs.iter().filter_map(|s| s.prior).collect();
    if let Some(bad) = specs
        .iter()
        .find(|s| !matches!(s.prior, Some(p) if p > 0.0 && p <= 1.0))
    {
        return Err(ConstancyError::config(format!(
            "{kind} '{}' has prior {:?}, expected a value in (0, 1]",
            bad.name, bad.prior
        )));
    }
    let sum: f64 = priors.iter().sum();
    if (sum - 1.0).abs() > PRIOR_SUM_TOL {
        return Err(ConstancyError::config(format!(
            "{kind} priors sum to {sum}, expected 1"
        )));
    }
    Ok(priors)
}

/// Final assignment produced once a single hypothesis per pixel survives.
#[derive(Clone, Debug, Serialize)]
pub struct ConstancyResult {
    pub width: usize,
    pub height: usize,
    pub material_labels: Vec<MaterialId>,
    pub light_source_labels: Vec<LightSourceId>,
    pub reflectance: Vec<DVector<f64>>,
    pub illumination: Vec<f64>,
    pub spectra: Vec<DVector<f64>>,
    pub iterations: Vec<IterationReport>,
    pub faults: Vec<PixelFault>,
    pub latency_ms: f64,
}
