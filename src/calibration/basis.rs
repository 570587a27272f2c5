//! Low-rank reflectance basis per (material, light source) pair.
//!
//! Examples of one pair are stacked into `X` (`N × C·P`, channel-major
//! patches) and decomposed `X = UΣVᵗ`. The top `M` right singular vectors
//! become the reflectance basis, reshaped into a `D × P` matrix whose column
//! `j` is the reduced reflectance of patch pixel `j`; the rows of `U_M Σ_M`
//! are the spectrum coordinates of each example.

use crate::estimate::SpectrumOperator;
use crate::error::{ConstancyError, NumericEntity, Result};
use crate::types::{LightSourceId, MaterialId};
use nalgebra::{DMatrix, DVector};

#[derive(Clone, Debug)]
pub struct ReducedBasis {
    pub material: MaterialId,
    pub light_source: LightSourceId,
    pub model_dimensions: usize,
    pub channels: usize,
    pub patch_pixels: usize,
    /// Retained right singular vectors, one per row (`M × C·P`).
    components: DMatrix<f64>,
    /// Reflectance basis (`D × P`).
    basis: DMatrix<f64>,
    spectrum_coords: Vec<DVector<f64>>,
}

impl ReducedBasis {
    /// Decompose the flattened examples of one pair.
    pub fn fit(
        material: MaterialId,
        light_source: LightSourceId,
        examples: &[Vec<f64>],
        channels: usize,
        model_dimensions: usize,
    ) -> Result<Self> {
        let n = examples.len();
        let cols = examples.first().map(|e| e.len()).unwrap_or(0);
        if model_dimensions == 0 {
            return Err(ConstancyError::config("model_dimensions must be at least 1"));
        }
        if n < model_dimensions {
            return Err(ConstancyError::config(format!(
                "material {} / light source {}: {n} training examples, need at least model_dimensions = {model_dimensions}",
                material.0, light_source.0
            )));
        }
        if channels == 0 || cols % channels != 0 || cols / channels < model_dimensions {
            return Err(ConstancyError::config(format!(
                "material {} / light source {}: patch of {cols} values cannot support {model_dimensions} dimensions over {channels} channels",
                material.0, light_source.0
            )));
        }
        let patch_pixels = cols / channels;
        let x = DMatrix::from_fn(n, cols, |r, c| examples[r][c]);
        let svd = x.svd(true, true);
        let unstable = |reason: &str| {
            ConstancyError::unstable(NumericEntity::Pair(material, light_source), None, reason)
        };
        let u = svd.u.ok_or_else(|| unstable("SVD did not produce U"))?;
        let v_t = svd.v_t.ok_or_else(|| unstable("SVD did not produce Vᵗ"))?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

        let mut components = DMatrix::zeros(model_dimensions, cols);
        let mut spectrum_coords = vec![DVector::zeros(model_dimensions); n];
        for (k, &src) in order.iter().take(model_dimensions).enumerate() {
            let s = svd.singular_values[src];
            // Orient each component so that its entries sum to a non-negative value.
            let sign = if v_t.row(src).sum() < 0.0 { -1.0 } else { 1.0 };
            components.set_row(k, &(v_t.row(src) * sign));
            for (r, coords) in spectrum_coords.iter_mut().enumerate() {
                coords[k] = u[(r, src)] * s * sign;
            }
        }

        let d = model_dimensions * channels;
        let basis = DMatrix::from_fn(d, patch_pixels, |row, j| {
            let (c, k) = (row / model_dimensions, row % model_dimensions);
            components[(k, c * patch_pixels + j)]
        });

        Ok(Self {
            material,
            light_source,
            model_dimensions,
            channels,
            patch_pixels,
            components,
            basis,
            spectrum_coords,
        })
    }

    /// Reflectance basis, `D × P`.
    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    /// Spectrum coordinates of each training example.
    pub fn spectrum_coords(&self) -> &[DVector<f64>] {
        &self.spectrum_coords
    }

    /// Per-pixel reduced reflectance samples (the columns of the basis).
    pub fn reflectance_samples(&self) -> Vec<DVector<f64>> {
        self.basis
            .column_iter()
            .map(|col| col.clone_owned())
            .collect()
    }

    /// Patch-averaged reduced reflectance.
    pub fn mean_reflectance(&self) -> DVector<f64> {
        self.basis.column_mean()
    }

    /// Spectrum coordinates of a flattened (channel-major) patch.
    pub fn project(&self, patch: &[f64]) -> Result<DVector<f64>> {
        if patch.len() != self.components.ncols() {
            return Err(ConstancyError::config(format!(
                "patch has {} values, basis expects {}",
                patch.len(),
                self.components.ncols()
            )));
        }
        Ok(&self.components * DVector::from_column_slice(patch))
    }

    /// Mean colour implied by spectrum coordinates: `S̄ᵗβ` with `S̄` the
    /// patch-averaged reflectance matrix.
    pub fn reconstruct_mean_color(&self, coeffs: &DVector<f64>) -> DVector<f64> {
        SpectrumOperator::new(coeffs, self.channels).apply_transpose(&self.mean_reflectance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn examples() -> Vec<Vec<f64>> {
        // Two pixels, three channels, four examples of varying brightness/tint.
        vec![
            vec![0.8, 0.7, 0.2, 0.25, 0.1, 0.1],
            vec![0.4, 0.35, 0.1, 0.12, 0.05, 0.06],
            vec![0.6, 0.5, 0.3, 0.3, 0.2, 0.2],
            vec![0.9, 0.85, 0.3, 0.35, 0.1, 0.15],
        ]
    }

    #[test]
    fn components_are_orthonormal_and_oriented() {
        let b = ReducedBasis::fit(MaterialId(0), LightSourceId(0), &examples(), 3, 2).unwrap();
        let gram = &b.components * b.components.transpose();
        assert_relative_eq!(gram, DMatrix::identity(2, 2), epsilon = 1e-9);
        assert!(b.components.row(0).sum() >= 0.0);
        let energy = |k: usize| b.spectrum_coords().iter().map(|c| c[k] * c[k]).sum::<f64>();
        assert!(energy(0) >= energy(1));
        assert_eq!(b.basis().shape(), (6, 2));
    }

    #[test]
    fn first_component_coordinates_are_positive_for_positive_data() {
        let b = ReducedBasis::fit(MaterialId(0), LightSourceId(0), &examples(), 3, 1).unwrap();
        for c in b.spectrum_coords() {
            assert!(c[0] > 0.0);
        }
    }

    #[test]
    fn too_few_examples_is_configuration_error() {
        let ex = examples();
        let err = ReducedBasis::fit(MaterialId(0), LightSourceId(0), &ex[..1], 3, 2).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn rank_matched_reconstruction_is_exact() {
        let v1 = [0.8, 0.7, 0.2, 0.25, 0.1, 0.1];
        let v2 = [0.1, 0.0, 0.1, 0.1, 0.2, 0.1];
        let mix = |a: f64, b: f64| -> Vec<f64> {
            v1.iter().zip(v2.iter()).map(|(x, y)| a * x + b * y).collect()
        };
        let ex = vec![mix(1.0, 0.0), mix(0.5, 0.0), mix(1.0, 1.0), mix(0.3, 2.0)];
        let b = ReducedBasis::fit(MaterialId(0), LightSourceId(0), &ex, 3, 2).unwrap();
        let coeffs = b.project(&ex[0]).unwrap();
        let rebuilt = b.reconstruct_mean_color(&coeffs);
        let actual = DVector::from_vec(vec![0.75, 0.225, 0.1]);
        assert_relative_eq!(rebuilt, actual, epsilon = 1e-9);
    }
}
