use super::timing::TimingBreakdown;
use crate::gaussian::UnivariateGaussian;
use crate::hypothesis::HypothesisStore;
use crate::types::{LightSourceId, MaterialId};
use nalgebra::DVector;
use serde::Serialize;

/// A per-pixel failure that was isolated instead of aborting the batch. The
/// affected hypothesis keeps its previous estimates and scores `-inf`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelFault {
    pub pixel: usize,
    pub iteration: usize,
    pub material: MaterialId,
    pub light_source: LightSourceId,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikelihoodEntry {
    pub material: MaterialId,
    pub light_source: LightSourceId,
    pub log_likelihood: f64,
}

/// Log-likelihood of every surviving hypothesis, per pixel, in rank order.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikelihoodTable {
    pub pixels: Vec<Vec<LikelihoodEntry>>,
}

impl LikelihoodTable {
    pub fn from_store(store: &HypothesisStore) -> Self {
        let pixels = (0..store.num_pixels())
            .map(|p| {
                store
                    .survivors(p)
                    .map(|h| LikelihoodEntry {
                        material: h.material,
                        light_source: h.light_source,
                        log_likelihood: h.log_likelihood,
                    })
                    .collect()
            })
            .collect();
        Self { pixels }
    }

    pub fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Dense `pixels × (materials · light_sources)` grid in material-major
    /// combination order; pruned combinations are `-inf`.
    pub fn dense(&self, num_materials: usize, num_light_sources: usize) -> Vec<Vec<f64>> {
        self.pixels
            .iter()
            .map(|entries| {
                let mut row = vec![f64::NEG_INFINITY; num_materials * num_light_sources];
                for e in entries {
                    row[e.material.0 * num_light_sources + e.light_source.0] = e.log_likelihood;
                }
                row
            })
            .collect()
    }
}

/// Everything the estimator observed during one iteration.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationReport {
    /// 1-based.
    pub iteration: usize,
    /// Survivors per pixel when the likelihoods were evaluated.
    pub hypotheses_per_pixel: usize,
    /// Rank-0 labels after the likelihood resort.
    pub material_labels: Vec<MaterialId>,
    pub light_source_labels: Vec<LightSourceId>,
    pub likelihoods: LikelihoodTable,
    pub spectra: Vec<DVector<f64>>,
    pub illumination: Vec<UnivariateGaussian>,
    pub faults: Vec<PixelFault>,
    pub timing: TimingBreakdown,
}
