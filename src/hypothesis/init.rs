//! Seed every pixel with one hypothesis per (material, light source) pair.
//!
//! Combinations are ranked by squared colour distance to the mean-colour
//! table (a best guess, not yet a likelihood ranking). Each hypothesis starts
//! from the pair's patch-averaged reflectance and from the projection of the
//! pixel colour onto the direction of the pair's mean colour.

use super::store::{Hypothesis, HypothesisStore};
use crate::calibration::MeanColorTable;
use crate::error::{ConstancyError, Result};
use crate::model::CalibratedModel;
use nalgebra::DVector;

const MIN_COLOR_NORM: f64 = 1e-12;

/// `p·c / |c|`, or zero for a black mean colour.
pub fn initial_illumination(pixel: &DVector<f64>, mean_color: &DVector<f64>) -> f64 {
    let norm = mean_color.norm();
    if norm < MIN_COLOR_NORM {
        0.0
    } else {
        pixel.dot(mean_color) / norm
    }
}

/// Combination indices sorted by ascending squared distance (ties keep
/// material-major order). NaN distances rank last.
pub fn rank_by_mean_color(pixel: &DVector<f64>, mean_colors: &[DVector<f64>]) -> Vec<usize> {
    let dist: Vec<f64> = mean_colors
        .iter()
        .map(|c| (pixel - c).norm_squared())
        .map(|d| if d.is_nan() { f64::INFINITY } else { d })
        .collect();
    let mut order: Vec<usize> = (0..mean_colors.len()).collect();
    order.sort_by(|&a, &b| dist[a].total_cmp(&dist[b]));
    order
}

pub fn initialize_hypotheses(
    model: &CalibratedModel,
    mean_colors: &MeanColorTable,
    pixels: &[DVector<f64>],
) -> Result<HypothesisStore> {
    if mean_colors.num_materials != model.materials().len()
        || mean_colors.num_light_sources != model.light_sources().len()
    {
        return Err(ConstancyError::config(format!(
            "mean colour table is {} x {}, model has {} materials and {} light sources",
            mean_colors.num_materials,
            mean_colors.num_light_sources,
            model.materials().len(),
            model.light_sources().len()
        )));
    }
    mean_colors.validate(Some(model.channels()))?;
    if let Some((i, p)) = pixels
        .iter()
        .enumerate()
        .find(|(_, p)| p.len() != model.channels())
    {
        return Err(ConstancyError::config(format!(
            "pixel {i} has {} channels, model expects {}",
            p.len(),
            model.channels()
        )));
    }

    let combos: Vec<_> = model.combinations().collect();
    let colors: Vec<DVector<f64>> = combos
        .iter()
        .map(|&(m, w)| mean_colors.get(m, w))
        .collect();
    let blocks = pixels
        .iter()
        .map(|pixel| {
            let slots = combos
                .iter()
                .zip(&colors)
                .map(|(&(m, w), color)| {
                    Hypothesis::new(
                        m,
                        w,
                        model.pair_reflectance(m, w).clone(),
                        initial_illumination(pixel, color),
                    )
                })
                .collect();
            (slots, rank_by_mean_color(pixel, &colors))
        })
        .collect();
    HypothesisStore::from_blocks(blocks)
}
