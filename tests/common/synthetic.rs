use color_constancy::calibration::{MeanColorTable, PatchSample, TrainingSet};
use color_constancy::image::{ColorImage, Rect};
use color_constancy::{CalibratedModel, ClassCatalog, LightSourceId, MaterialId};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Colour of one patch pixel: `brightness · material ⊙ light`, modulated by a
/// fixed texture so patches are not perfectly flat.
pub fn shade(material: [f64; 3], light: [f64; 3], brightness: f64, pixel: usize) -> [f64; 3] {
    let texture = 1.0 + 0.05 * ((pixel as f64) * 1.7).sin();
    [
        brightness * material[0] * light[0] * texture,
        brightness * material[1] * light[1] * texture,
        brightness * material[2] * light[2] * texture,
    ]
}

/// Materials and light sources of a synthetic scene.
pub struct SyntheticScene {
    pub materials: Vec<[f64; 3]>,
    pub lights: Vec<[f64; 3]>,
    /// Patch side length in pixels.
    pub patch: usize,
    pub examples_per_light: usize,
}

impl SyntheticScene {
    pub fn red_blue() -> Self {
        Self {
            materials: vec![[0.9, 0.15, 0.1], [0.1, 0.2, 0.9]],
            lights: vec![[1.0, 1.0, 1.0], [1.0, 0.8, 0.6]],
            patch: 4,
            examples_per_light: 4,
        }
    }

    pub fn catalog(&self) -> ClassCatalog {
        ClassCatalog::uniform(self.materials.len(), self.lights.len())
    }

    pub fn brightness(&self, example: usize) -> f64 {
        0.6 + 0.4 * example as f64 / (self.examples_per_light.max(2) - 1) as f64
    }

    /// One training image per (light, example), with one patch per material
    /// laid out left to right.
    pub fn training_set(&self, seed: u64, noise: f64) -> TrainingSet {
        let mut rng = StdRng::seed_from_u64(seed);
        let p = self.patch;
        let mut images = Vec::new();
        let mut samples = Vec::new();
        for (w, light) in self.lights.iter().enumerate() {
            for e in 0..self.examples_per_light {
                let b = self.brightness(e);
                let mut img = ColorImage::new(p * self.materials.len(), p, 3);
                for (m, material) in self.materials.iter().enumerate() {
                    let region = Rect::new(m * p, 0, p, p);
                    for (j, idx) in region.indices(img.w).enumerate() {
                        let mut c = shade(*material, *light, b, j);
                        if noise > 0.0 {
                            for v in c.iter_mut() {
                                *v += rng.gen_range(-noise..noise);
                            }
                        }
                        img.set(idx % img.w, idx / img.w, &c);
                    }
                    samples.push(PatchSample {
                        image: images.len(),
                        material: MaterialId(m),
                        light_source: LightSourceId(w),
                        region,
                    });
                }
                images.push(img);
            }
        }
        TrainingSet::new(images, samples)
    }

    /// Target image whose pixel `(x, y)` shows `labels(x, y)` at `brightness`.
    pub fn target(
        &self,
        width: usize,
        height: usize,
        brightness: f64,
        labels: impl Fn(usize, usize) -> (usize, usize),
    ) -> ColorImage {
        let mut img = ColorImage::new(width, height, 3);
        for y in 0..height {
            for x in 0..width {
                let (m, w) = labels(x, y);
                let c = shade(self.materials[m], self.lights[w], brightness, y * width + x);
                img.set(x, y, &c);
            }
        }
        img
    }
}

/// Hand-built model with one reduced dimension: materials A (reddish) and
/// B (bluish), light sources X (β = 1) and Y (β = 0.5).
pub fn four_combination_model(
    spectrum_variance: f64,
) -> (CalibratedModel, MeanColorTable) {
    hand_built_model(&[(1.0, spectrum_variance), (0.5, spectrum_variance)])
}

/// Materials A and B under one light source per `(β mean, β variance)`.
pub fn hand_built_model(lights: &[(f64, f64)]) -> (CalibratedModel, MeanColorTable) {
    let materials = [
        DVector::from_vec(vec![0.8, 0.2, 0.2]),
        DVector::from_vec(vec![0.2, 0.2, 0.8]),
    ];
    let reflectance = materials
        .iter()
        .map(|mu| (mu.clone(), DMatrix::identity(3, 3) * 1e-3))
        .collect();
    let spectrum = lights
        .iter()
        .map(|&(b, var)| (DVector::from_element(1, b), DMatrix::identity(1, 1) * var))
        .collect();
    let mut pair_reflectance = Vec::new();
    let mut entries = Vec::new();
    for mu in &materials {
        for &(b, _) in lights {
            pair_reflectance.push(mu.clone());
            entries.push((mu * b).iter().copied().collect());
        }
    }
    let model = CalibratedModel::from_parts(
        &ClassCatalog::uniform(2, lights.len()),
        1,
        reflectance,
        spectrum,
        pair_reflectance,
    )
    .unwrap();
    let table = MeanColorTable::new(2, lights.len(), entries).unwrap();
    (model, table)
}

/// Image with seeded uniform colours in `[lo, hi)`.
pub fn random_image(width: usize, height: usize, seed: u64, lo: f64, hi: f64) -> ColorImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..width * height * 3).map(|_| rng.gen_range(lo..hi)).collect();
    ColorImage::from_vec(width, height, 3, data).unwrap()
}
