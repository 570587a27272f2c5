//! Fixed-length hypothesis elimination loop.
//!
//! ```no_run
//! use color_constancy::prelude::*;
//!
//! # fn example(cal: Calibration, image: ColorImage) -> color_constancy::Result<()> {
//! let params = ConstancyParams::default();
//! let estimator = ConstancyEstimator::new(cal.model, &cal.mean_colors, &image, &params)?;
//! let result = estimator.run()?;
//! println!("iterations={} faults={}", result.iterations.len(), result.faults.len());
//! # Ok(())
//! # }
//! ```

use super::params::{ConstancyParams, IlluminationPrior, ScoringOptions};
use super::state::{EstimatorState, Phase};
use crate::calibration::MeanColorTable;
use crate::diagnostics::{elapsed_ms, IterationReport, LikelihoodTable, PixelFault, TimingBreakdown};
use crate::error::{ConstancyError, Result};
use crate::estimate::{estimate_illumination, estimate_reflectance, SpectrumVote};
use crate::hypothesis::{initialize_hypotheses, prune_all, Hypothesis, HypothesisStore, PixelHypotheses};
use crate::image::ColorImage;
use crate::likelihood::LikelihoodEvaluator;
use crate::model::{CalibratedModel, ObservationModel};
use crate::types::ConstancyResult;
use crate::window::{IlluminationField, IlluminationVote, WindowGrid};
use log::{debug, info, warn};
use nalgebra::DVector;
use std::time::Instant;

/// Runs `materials × light_sources − 1` iterations of window statistics,
/// per-pixel refinement, likelihood evaluation, spectrum refresh and pruning.
pub struct ConstancyEstimator {
    model: CalibratedModel,
    noise: ObservationModel,
    scoring: ScoringOptions,
    grid: WindowGrid,
    width: usize,
    height: usize,
    pixels: Vec<DVector<f64>>,
    state: EstimatorState,
    reports: Vec<IterationReport>,
    faults: Vec<PixelFault>,
    latency_ms: f64,
}

/// Shared read-only inputs of the per-pixel passes.
struct PixelPass<'a> {
    model: &'a CalibratedModel,
    noise: &'a ObservationModel,
    spectra: &'a [DVector<f64>],
    field: &'a IlluminationField,
    grid: &'a WindowGrid,
    pixels: &'a [DVector<f64>],
    prior: IlluminationPrior,
    iteration: usize,
}

impl ConstancyEstimator {
    /// Seed the hypothesis store of `image` and set every spectrum to its
    /// prior mean.
    pub fn new(
        model: CalibratedModel,
        mean_colors: &MeanColorTable,
        image: &ColorImage,
        params: &ConstancyParams,
    ) -> Result<Self> {
        let t0 = Instant::now();
        params.validate()?;
        if image.channels != model.channels() {
            return Err(ConstancyError::config(format!(
                "image has {} channels, model expects {}",
                image.channels,
                model.channels()
            )));
        }
        if image.num_pixels() == 0 {
            return Err(ConstancyError::config("target image is empty"));
        }
        let noise = params.noise.model(model.channels())?;
        let grid = WindowGrid::new(image.w, image.h, &params.window)?;
        let pixels = image.pixel_vectors();
        let hypotheses = initialize_hypotheses(&model, mean_colors, &pixels)?;
        let spectra: Vec<DVector<f64>> = model
            .light_sources()
            .iter()
            .map(|light| light.spectrum.mean().clone())
            .collect();
        let field = IlluminationField::estimate(
            &grid,
            &illumination_votes(&hypotheses, &pixels, false),
            model.light_sources().len(),
            params.scoring.min_illumination_std,
        );
        let state = EstimatorState {
            iteration: 0,
            hypotheses,
            spectra,
            illumination: field.globals().to_vec(),
        };
        let latency_ms = elapsed_ms(t0);
        debug!(
            "ConstancyEstimator::new pixels={} hypotheses_per_pixel={} roi={:?} windows={} elapsed_ms={:.3}",
            pixels.len(),
            state.hypotheses.initial_per_pixel(),
            grid.roi(),
            grid.len(),
            latency_ms
        );
        Ok(Self {
            model,
            noise,
            scoring: params.scoring.clone(),
            grid,
            width: image.w,
            height: image.h,
            pixels,
            state,
            reports: Vec::new(),
            faults: Vec::new(),
            latency_ms,
        })
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn model(&self) -> &CalibratedModel {
        &self.model
    }

    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    /// Total number of iterations the loop runs.
    pub fn total_iterations(&self) -> usize {
        self.state.hypotheses.initial_per_pixel() - 1
    }

    /// Run one iteration. The state is only replaced when the iteration
    /// completes; on error it is left as it was before the call.
    pub fn step(&mut self) -> Result<&IterationReport> {
        if self.phase() == Phase::Converged {
            return Err(ConstancyError::AlreadyConverged);
        }
        let t0 = Instant::now();
        let k = self.state.iteration + 1;
        let before = self.state.remaining();
        let num_lights = self.model.light_sources().len();
        let mut timing = TimingBreakdown::default();
        let mut hypotheses = self.state.hypotheses.clone();

        let t = Instant::now();
        let field = IlluminationField::estimate(
            &self.grid,
            &illumination_votes(&hypotheses, &self.pixels, k > 1),
            num_lights,
            self.scoring.min_illumination_std,
        );
        timing.lap("window_stats", t);

        let pass = PixelPass {
            model: &self.model,
            noise: &self.noise,
            spectra: &self.state.spectra,
            field: &field,
            grid: &self.grid,
            pixels: &self.pixels,
            prior: self.scoring.illumination_prior,
            iteration: k,
        };

        let t = Instant::now();
        let refined = hypotheses.map_pixels(|mut ph| pass.refine(&mut ph));
        let mut faults: Vec<PixelFault> = Vec::new();
        let mut faulted: Vec<Vec<usize>> = Vec::with_capacity(refined.len());
        for (slots, pixel_faults) in refined {
            faulted.push(slots);
            faults.extend(pixel_faults);
        }
        timing.lap("refine", t);

        let t = Instant::now();
        let evaluator = LikelihoodEvaluator::new(&self.model, &self.noise, &self.state.spectra);
        let scored = hypotheses.map_pixels(|mut ph| pass.score(&mut ph, &evaluator, &faulted));
        faults.extend(scored.into_iter().flatten());
        timing.lap("likelihood", t);

        let material_labels = (0..hypotheses.num_pixels())
            .map(|p| hypotheses.best(p).material)
            .collect();
        let light_source_labels = (0..hypotheses.num_pixels())
            .map(|p| hypotheses.best(p).light_source)
            .collect();
        let likelihoods = LikelihoodTable::from_store(&hypotheses);

        let t = Instant::now();
        let (spectra, excluded) = self.refresh_spectra(&hypotheses, k)?;
        faults.extend(excluded);
        timing.lap("spectrum", t);

        let t = Instant::now();
        prune_all(&mut hypotheses).map_err(|e| e.at_iteration(k))?;
        timing.lap("prune", t);

        debug_assert_eq!(hypotheses.uniform_remaining(), Some(before - 1));

        for fault in &faults {
            warn!(
                "ConstancyEstimator::step iteration={} pixel={} material={} light_source={}: {}",
                k, fault.pixel, fault.material.0, fault.light_source.0, fault.reason
            );
        }

        timing.total_ms = elapsed_ms(t0);
        self.latency_ms += timing.total_ms;
        info!(
            "ConstancyEstimator::step iteration={}/{} remaining={} faults={} elapsed_ms={:.3}",
            k,
            self.total_iterations(),
            before - 1,
            faults.len(),
            timing.total_ms
        );
        debug!(
            "ConstancyEstimator::step stages: {}",
            timing
                .stages
                .iter()
                .map(|s| format!("{}={:.3}ms", s.label, s.elapsed_ms))
                .collect::<Vec<_>>()
                .join(" ")
        );

        self.faults.extend(faults.iter().cloned());
        self.state = EstimatorState {
            iteration: k,
            hypotheses,
            spectra: spectra.clone(),
            illumination: field.globals().to_vec(),
        };
        self.reports.push(IterationReport {
            iteration: k,
            hypotheses_per_pixel: before,
            material_labels,
            light_source_labels,
            likelihoods,
            spectra,
            illumination: field.globals().to_vec(),
            faults,
            timing,
        });
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// Iterate until one hypothesis per pixel remains.
    pub fn run(mut self) -> Result<ConstancyResult> {
        while self.phase() != Phase::Converged {
            self.step()?;
        }
        Ok(self.into_result())
    }

    /// Rank-0 assignment of every pixel in the current state.
    pub fn into_result(self) -> ConstancyResult {
        let store = &self.state.hypotheses;
        let best: Vec<_> = (0..store.num_pixels()).map(|p| store.best(p)).collect();
        ConstancyResult {
            width: self.width,
            height: self.height,
            material_labels: best.iter().map(|h| h.material).collect(),
            light_source_labels: best.iter().map(|h| h.light_source).collect(),
            reflectance: best.iter().map(|h| h.reflectance.clone()).collect(),
            illumination: best.iter().map(|h| h.illumination).collect(),
            spectra: self.state.spectra.clone(),
            iterations: self.reports,
            faults: self.faults,
            latency_ms: self.latency_ms,
        }
    }

    /// Re-estimate every light source's spectrum from the rank-0 votes.
    /// Pixels that cannot vote are returned as faults.
    fn refresh_spectra(
        &self,
        store: &HypothesisStore,
        k: usize,
    ) -> Result<(Vec<DVector<f64>>, Vec<PixelFault>)> {
        let mut votes: Vec<SpectrumVote<'_>> = Vec::with_capacity(store.num_pixels());
        let mut excluded = Vec::new();
        for (p, pixel) in self.pixels.iter().enumerate() {
            let h = store.best(p);
            if casts_vote(h, pixel, true) {
                votes.push(SpectrumVote {
                    light_source: h.light_source,
                    reflectance: &h.reflectance,
                    illumination: h.illumination,
                    pixel,
                });
            } else {
                let reason = if pixel.iter().all(|v| v.is_finite()) {
                    "best hypothesis failed; pixel excluded from light-source votes"
                } else {
                    "observed colour is not finite; pixel excluded from light-source votes"
                };
                excluded.push(PixelFault {
                    pixel: p,
                    iteration: k,
                    material: h.material,
                    light_source: h.light_source,
                    reason: reason.to_string(),
                });
            }
        }
        let num_lights = self.model.light_sources().len();
        let dims = self.model.model_dimensions();
        let weight = self.scoring.spectrum_weighting.matrix(&self.noise);
        #[cfg(feature = "parallel")]
        let accumulators =
            crate::estimate::accumulate_votes_parallel(&votes, num_lights, dims, weight);
        #[cfg(not(feature = "parallel"))]
        let accumulators = crate::estimate::accumulate_votes(&votes, num_lights, dims, weight);

        let spectra = accumulators
            .into_iter()
            .zip(self.model.light_sources())
            .map(|(acc, light)| {
                if acc.votes == 0 {
                    warn!(
                        "ConstancyEstimator::step iteration={} light_source={} has no votes, keeping prior mean",
                        k, light.name
                    );
                }
                acc.solve(light).map_err(|e| e.at_iteration(k))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((spectra, excluded))
    }
}

impl PixelPass<'_> {
    /// Reflectance then illumination update of every survivor. Returns the
    /// slots that failed, with their faults.
    fn refine(&self, ph: &mut PixelHypotheses<'_>) -> (Vec<usize>, Vec<PixelFault>) {
        let pixel = &self.pixels[ph.pixel];
        let index = ph.pixel;
        let mut failed = Vec::new();
        let mut faults = Vec::new();
        ph.for_each_mut(|slot, h| {
            let material = self.model.material(h.material);
            let beta = &self.spectra[h.light_source.0];
            let prior = match self.prior {
                IlluminationPrior::Local => self.field.local(self.grid, index, h.light_source),
                IlluminationPrior::Global => self.field.global(h.light_source),
            };
            let outcome = estimate_reflectance(&material.reflectance, beta, h.illumination, pixel, self.noise)
                .ok_or("reflectance innovation matrix is singular")
                .and_then(|sigma| {
                    let g = estimate_illumination(prior, &sigma, beta, pixel, self.noise);
                    if g.is_finite() {
                        Ok((sigma, g))
                    } else {
                        Err("illumination update is not finite")
                    }
                });
            match outcome {
                Ok((sigma, g)) => {
                    h.reflectance = sigma;
                    h.illumination = g;
                }
                Err(reason) => {
                    failed.push(slot);
                    faults.push(PixelFault {
                        pixel: index,
                        iteration: self.iteration,
                        material: h.material,
                        light_source: h.light_source,
                        reason: reason.to_string(),
                    });
                }
            }
        });
        (failed, faults)
    }

    /// Score every survivor and resort the pixel by descending likelihood.
    fn score(
        &self,
        ph: &mut PixelHypotheses<'_>,
        evaluator: &LikelihoodEvaluator<'_>,
        faulted: &[Vec<usize>],
    ) -> Vec<PixelFault> {
        let pixel = &self.pixels[ph.pixel];
        let index = ph.pixel;
        let failed = &faulted[index];
        let mut faults = Vec::new();
        ph.for_each_mut(|slot, h| {
            if failed.contains(&slot) {
                h.log_likelihood = f64::NEG_INFINITY;
                return;
            }
            let prior = match self.prior {
                IlluminationPrior::Local => self.field.local(self.grid, index, h.light_source),
                IlluminationPrior::Global => self.field.global(h.light_source),
            };
            let ll = evaluator.evaluate(h, pixel, prior);
            if ll.is_finite() {
                h.log_likelihood = ll;
            } else {
                h.log_likelihood = f64::NEG_INFINITY;
                faults.push(PixelFault {
                    pixel: index,
                    iteration: self.iteration,
                    material: h.material,
                    light_source: h.light_source,
                    reason: "log-likelihood is not finite".to_string(),
                });
            }
        });
        ph.sort_by_likelihood();
        faults
    }
}

/// Whether a pixel's rank-0 hypothesis may vote in the illumination and
/// spectrum statistics. Before the first likelihood pass (`scored == false`)
/// every log-likelihood is still `-inf` and is not checked.
fn casts_vote(h: &Hypothesis, pixel: &DVector<f64>, scored: bool) -> bool {
    pixel.iter().all(|v| v.is_finite())
        && h.illumination.is_finite()
        && h.reflectance.iter().all(|v| v.is_finite())
        && (!scored || h.log_likelihood.is_finite())
}

fn illumination_votes(
    store: &HypothesisStore,
    pixels: &[DVector<f64>],
    scored: bool,
) -> Vec<Option<IlluminationVote>> {
    pixels
        .iter()
        .enumerate()
        .map(|(p, pixel)| {
            let h = store.best(p);
            casts_vote(h, pixel, scored).then(|| IlluminationVote {
                light_source: h.light_source,
                illumination: h.illumination,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassCatalog, LightSourceId, MaterialId};
    use nalgebra::DMatrix;

    fn two_by_two_model() -> (CalibratedModel, MeanColorTable) {
        let materials = [
            DVector::from_vec(vec![0.8, 0.2, 0.2]),
            DVector::from_vec(vec![0.2, 0.2, 0.8]),
        ];
        let spectra = [1.0, 0.5];
        let reflectance = materials
            .iter()
            .map(|mu| (mu.clone(), DMatrix::identity(3, 3) * 1e-3))
            .collect();
        let spectrum = spectra
            .iter()
            .map(|&b| (DVector::from_element(1, b), DMatrix::identity(1, 1) * 0.01))
            .collect();
        let mut pair_reflectance = Vec::new();
        let mut entries = Vec::new();
        for mu in &materials {
            for &b in &spectra {
                pair_reflectance.push(mu.clone());
                entries.push((mu * b).iter().copied().collect());
            }
        }
        let model = CalibratedModel::from_parts(
            &ClassCatalog::uniform(2, 2),
            1,
            reflectance,
            spectrum,
            pair_reflectance,
        )
        .unwrap();
        (model, MeanColorTable::new(2, 2, entries).unwrap())
    }

    fn is_pair(h: &Hypothesis, m: usize, w: usize) -> bool {
        h.material == MaterialId(m) && h.light_source == LightSourceId(w)
    }

    #[test]
    fn failed_hypothesis_ranks_last_and_is_pruned_next() {
        let (model, table) = two_by_two_model();
        let image = ColorImage::filled(2, 1, &[0.8, 0.2, 0.2]);
        let estimator =
            ConstancyEstimator::new(model, &table, &image, &ConstancyParams::default()).unwrap();
        let mut store = estimator.state.hypotheses.clone();
        let field = IlluminationField::estimate(
            &estimator.grid,
            &illumination_votes(&store, &estimator.pixels, false),
            2,
            1e-3,
        );
        let pass = PixelPass {
            model: &estimator.model,
            noise: &estimator.noise,
            spectra: &estimator.state.spectra,
            field: &field,
            grid: &estimator.grid,
            pixels: &estimator.pixels,
            prior: IlluminationPrior::Local,
            iteration: 1,
        };
        let evaluator =
            LikelihoodEvaluator::new(&estimator.model, &estimator.noise, &estimator.state.spectra);

        // Slot 0 is (material 0, light source 0), the best fit of both pixels.
        let faulted = vec![vec![0], Vec::new()];
        let faults = store.map_pixels(|mut ph| pass.score(&mut ph, &evaluator, &faulted));
        assert!(faults.iter().all(|f| f.is_empty()));

        assert!(is_pair(store.best(1), 0, 0));
        assert!(store.survivors(1).all(|h| h.log_likelihood.is_finite()));
        let last = store.survivors(0).last().unwrap();
        assert!(is_pair(last, 0, 0));
        assert_eq!(last.log_likelihood, f64::NEG_INFINITY);

        prune_all(&mut store).unwrap();
        assert_eq!(store.uniform_remaining(), Some(3));
        assert!(store.survivors(0).all(|h| !is_pair(h, 0, 0)));
        assert!(store.survivors(1).any(|h| is_pair(h, 0, 0)));
    }

    #[test]
    fn non_finite_pixels_do_not_vote() {
        let (model, table) = two_by_two_model();
        let image = ColorImage::from_vec(
            2,
            1,
            3,
            vec![0.8, 0.2, 0.2, f64::NAN, 0.2, 0.2],
        )
        .unwrap();
        let mut estimator =
            ConstancyEstimator::new(model, &table, &image, &ConstancyParams::default()).unwrap();
        let votes = illumination_votes(&estimator.state.hypotheses, &estimator.pixels, false);
        assert!(votes[0].is_some());
        assert!(votes[1].is_none());

        let report = estimator.step().unwrap();
        assert!(report.faults.iter().all(|f| f.pixel == 1));
        assert!(report
            .faults
            .iter()
            .any(|f| f.reason.contains("excluded from light-source votes")));
        assert!(report.spectra.iter().all(|b| b.iter().all(|v| v.is_finite())));
        assert!(is_pair(estimator.state().hypotheses.best(0), 0, 0));
    }
}
