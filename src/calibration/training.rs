//! Labelled training patches and their consistency checks.

use crate::error::{ConstancyError, Result};
use crate::image::{ColorImage, Rect};
use crate::types::{LightSourceId, MaterialId};
use serde::Deserialize;

/// One example patch: a rectangle of a training image showing `material`
/// under `light_source`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct PatchSample {
    pub image: usize,
    pub material: MaterialId,
    pub light_source: LightSourceId,
    pub region: Rect,
}

/// Stack of same-channel training images plus labelled patches.
#[derive(Clone, Debug)]
pub struct TrainingSet {
    pub images: Vec<ColorImage>,
    pub samples: Vec<PatchSample>,
}

/// Training patches grouped per (material, light source) pair, flattened
/// channel-major, validated for consistent shapes.
#[derive(Clone, Debug)]
pub(crate) struct GroupedPatches {
    pub channels: usize,
    pub num_materials: usize,
    pub num_light_sources: usize,
    /// Patch pixel count per material.
    pub patch_pixels: Vec<usize>,
    /// Flattened examples, indexed `m * num_light_sources + w`.
    pub examples: Vec<Vec<Vec<f64>>>,
}

impl GroupedPatches {
    pub fn pair(&self, m: MaterialId, w: LightSourceId) -> &[Vec<f64>] {
        &self.examples[m.0 * self.num_light_sources + w.0]
    }
}

impl TrainingSet {
    pub fn new(images: Vec<ColorImage>, samples: Vec<PatchSample>) -> Self {
        Self { images, samples }
    }

    /// Number of colour channels shared by every training image.
    pub fn channels(&self) -> Result<usize> {
        let first = self
            .images
            .first()
            .ok_or_else(|| ConstancyError::config("training set has no images"))?;
        if let Some((i, img)) = self
            .images
            .iter()
            .enumerate()
            .find(|(_, img)| img.channels != first.channels)
        {
            return Err(ConstancyError::config(format!(
                "training image {i} has {} channels, expected {}",
                img.channels, first.channels
            )));
        }
        Ok(first.channels)
    }

    /// Validate the sample layout and group the flattened patches by pair.
    pub(crate) fn group(
        &self,
        num_materials: usize,
        num_light_sources: usize,
    ) -> Result<GroupedPatches> {
        let channels = self.channels()?;
        let mut patch_dims: Vec<Option<(usize, usize)>> = vec![None; num_materials];
        let pairs = num_materials * num_light_sources;
        let mut examples = vec![Vec::new(); pairs];

        for (k, s) in self.samples.iter().enumerate() {
            if s.material.0 >= num_materials || s.light_source.0 >= num_light_sources {
                return Err(ConstancyError::config(format!(
                    "sample {k} references material {} / light source {} outside the catalog ({num_materials} x {num_light_sources})",
                    s.material.0, s.light_source.0
                )));
            }
            let image = self.images.get(s.image).ok_or_else(|| {
                ConstancyError::config(format!(
                    "sample {k} references image {} but only {} are loaded",
                    s.image,
                    self.images.len()
                ))
            })?;
            let dims = (s.region.w, s.region.h);
            match patch_dims[s.material.0] {
                None => patch_dims[s.material.0] = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(ConstancyError::config(format!(
                        "sample {k}: patches of material {} must all be {}x{}, got {}x{}",
                        s.material.0, expected.0, expected.1, dims.0, dims.1
                    )));
                }
                Some(_) => {}
            }
            let idx = s.material.0 * num_light_sources + s.light_source.0;
            examples[idx].push(image.patch_channel_major(&s.region)?);
        }

        for w in 0..num_light_sources {
            let counts: Vec<usize> = (0..num_materials)
                .map(|m| examples[m * num_light_sources + w].len())
                .collect();
            if let Some(m) = counts.iter().position(|&c| c == 0) {
                return Err(ConstancyError::config(format!(
                    "no training patches for material {m} under light source {w}"
                )));
            }
            if counts.iter().any(|&c| c != counts[0]) {
                return Err(ConstancyError::config(format!(
                    "light source {w} has unequal example counts across materials: {counts:?}"
                )));
            }
        }

        let patch_pixels = patch_dims
            .into_iter()
            .map(|d| d.map(|(w, h)| w * h).unwrap_or(0))
            .collect();
        Ok(GroupedPatches {
            channels,
            num_materials,
            num_light_sources,
            patch_pixels,
            examples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(image: usize, m: usize, w: usize, region: Rect) -> PatchSample {
        PatchSample {
            image,
            material: MaterialId(m),
            light_source: LightSourceId(w),
            region,
        }
    }

    #[test]
    fn inconsistent_patch_sizes_are_rejected() {
        let set = TrainingSet::new(
            vec![ColorImage::new(8, 8, 3)],
            vec![
                sample(0, 0, 0, Rect::new(0, 0, 2, 2)),
                sample(0, 0, 0, Rect::new(4, 4, 3, 2)),
            ],
        );
        let err = set.group(1, 1).unwrap_err();
        assert!(err.is_configuration(), "{err}");
    }

    #[test]
    fn unequal_counts_per_light_source_are_rejected() {
        let set = TrainingSet::new(
            vec![ColorImage::new(8, 8, 3)],
            vec![
                sample(0, 0, 0, Rect::new(0, 0, 2, 2)),
                sample(0, 0, 0, Rect::new(2, 0, 2, 2)),
                sample(0, 1, 0, Rect::new(4, 0, 2, 2)),
            ],
        );
        assert!(set.group(2, 1).is_err());
    }

    #[test]
    fn groups_by_pair() {
        let set = TrainingSet::new(
            vec![ColorImage::new(8, 8, 3), ColorImage::new(8, 8, 3)],
            vec![
                sample(0, 0, 1, Rect::new(0, 0, 2, 2)),
                sample(1, 0, 1, Rect::new(0, 0, 2, 2)),
                sample(0, 0, 0, Rect::new(2, 2, 2, 2)),
            ],
        );
        let grouped = set.group(1, 2).unwrap();
        assert_eq!(grouped.pair(MaterialId(0), LightSourceId(1)).len(), 2);
        assert_eq!(grouped.pair(MaterialId(0), LightSourceId(0)).len(), 1);
        assert_eq!(grouped.patch_pixels, vec![4]);
        assert_eq!(grouped.pair(MaterialId(0), LightSourceId(0))[0].len(), 12);
    }
}
