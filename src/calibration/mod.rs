//! Calibration model builder.
//!
//! Overview
//! - Groups labelled training patches by (material, light source) and checks
//!   that patch sizes and example counts are consistent.
//! - Decomposes each pair with an SVD ([`ReducedBasis`]) to obtain per-pixel
//!   reduced reflectance samples and per-example spectrum coordinates.
//! - Fits a Gaussian to the reflectance samples of every pair and marginalises
//!   over light sources (weighted by light-source prior) to get the material
//!   prior; symmetrically, spectrum coordinates are marginalised over materials
//!   (weighted by material prior) to get the light-source prior.
//! - Derives the [`MeanColorTable`] from the same patches.
//!
//! Modules
//! - [`basis`] – SVD reduced basis per pair.
//! - [`mean_colors`] – expected colour per pair, used to seed hypotheses.
//! - [`options`] – basis dimensionality and covariance ridge.
//! - [`training`] – training images and labelled patch samples.

pub mod basis;
pub mod mean_colors;
pub mod options;
pub mod training;

pub use basis::ReducedBasis;
pub use mean_colors::MeanColorTable;
pub use options::CalibrationOptions;
pub use training::{PatchSample, TrainingSet};

use crate::error::{ConstancyError, NumericEntity, Result};
use crate::gaussian::{mixture_moments, sample_moments};
use crate::model::CalibratedModel;
use crate::types::{ClassCatalog, LightSourceId, MaterialId};
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

/// Output of [`calibrate`].
#[derive(Clone, Debug)]
pub struct Calibration {
    pub model: CalibratedModel,
    pub mean_colors: MeanColorTable,
}

type Moments = (DVector<f64>, DMatrix<f64>);

/// Build the calibrated model and mean-colour table from training patches.
pub fn calibrate(
    training: &TrainingSet,
    catalog: &ClassCatalog,
    options: &CalibrationOptions,
) -> Result<Calibration> {
    let t0 = Instant::now();
    let priors = catalog.resolve()?;
    let (n_mat, n_light) = (catalog.num_materials(), catalog.num_light_sources());
    let grouped = training.group(n_mat, n_light)?;
    let dims = options.model_dimensions;

    let mut bases = Vec::with_capacity(n_mat * n_light);
    for m in 0..n_mat {
        for w in 0..n_light {
            let (mid, wid) = (MaterialId(m), LightSourceId(w));
            bases.push(ReducedBasis::fit(
                mid,
                wid,
                grouped.pair(mid, wid),
                grouped.channels,
                dims,
            )?);
        }
    }
    let basis_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let pair_moments = |idx: usize, samples: Vec<DVector<f64>>, entity: NumericEntity| {
        sample_moments(&samples, options.covariance_ridge).ok_or_else(|| {
            ConstancyError::unstable(entity, None, format!("no samples for pair {idx}"))
        })
    };

    let mut reflectance: Vec<Moments> = Vec::with_capacity(n_mat);
    for m in 0..n_mat {
        let mut components = Vec::with_capacity(n_light);
        for w in 0..n_light {
            let idx = m * n_light + w;
            let entity = NumericEntity::Pair(MaterialId(m), LightSourceId(w));
            let (mu, cov) = pair_moments(idx, bases[idx].reflectance_samples(), entity)?;
            components.push((priors.light_sources[w], mu, cov));
        }
        reflectance.push(mixture_moments(&components).ok_or_else(|| {
            ConstancyError::unstable(
                NumericEntity::Material(MaterialId(m)),
                None,
                "degenerate light-source weights",
            )
        })?);
    }

    let mut spectra: Vec<Moments> = Vec::with_capacity(n_light);
    for w in 0..n_light {
        let mut components = Vec::with_capacity(n_mat);
        for m in 0..n_mat {
            let idx = m * n_light + w;
            let entity = NumericEntity::Pair(MaterialId(m), LightSourceId(w));
            let (mu, cov) = pair_moments(idx, bases[idx].spectrum_coords().to_vec(), entity)?;
            components.push((priors.materials[m], mu, cov));
        }
        spectra.push(mixture_moments(&components).ok_or_else(|| {
            ConstancyError::unstable(
                NumericEntity::LightSource(LightSourceId(w)),
                None,
                "degenerate material weights",
            )
        })?);
    }

    let pair_reflectance = bases.iter().map(|b| b.mean_reflectance()).collect();
    let model = CalibratedModel::from_parts(catalog, dims, reflectance, spectra, pair_reflectance)?
        .with_bases(bases);
    let mean_colors = MeanColorTable::from_training(&grouped)?;

    debug!(
        "calibrate: materials={} light_sources={} dims={} channels={} basis_ms={:.3} total_ms={:.3}",
        n_mat,
        n_light,
        dims,
        grouped.channels,
        basis_ms,
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(Calibration { model, mean_colors })
}
