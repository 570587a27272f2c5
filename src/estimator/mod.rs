//! Convergence loop turning per-pixel hypothesis lists into one assignment.
//!
//! Overview
//! - Initialisation seeds every pixel with one hypothesis per (material,
//!   light source) pair ranked by mean-colour distance, and sets every
//!   spectrum to its prior mean.
//! - Each iteration then runs, in order:
//!   1. window statistics of the rank-0 illumination votes,
//!   2. reflectance then illumination update of every surviving hypothesis,
//!   3. likelihood evaluation and a stable resort of each pixel,
//!   4. spectrum refresh from the new rank-0 votes,
//!   5. removal of each pixel's least likely hypothesis.
//! - After `materials × light_sources − 1` iterations a single hypothesis per
//!   pixel remains.
//!
//! Modules
//! - [`params`] – recognised options and their defaults.
//! - `pipeline` – the [`ConstancyEstimator`] state machine.
//! - [`state`] – versioned state passed between iterations.
//!
//! Key Ideas
//! - Steps 2 and 3 touch only one pixel's hypotheses and run in parallel with
//!   the `parallel` feature; step 4 is a reduction over all pixels.
//! - A pixel's influence on the global estimates is its rank-0 hypothesis
//!   only.
//! - Failures local to one hypothesis are recorded as [`PixelFault`]s and
//!   score `-inf`; failures of a global estimate abort the iteration.
//!
//! [`PixelFault`]: crate::diagnostics::PixelFault

pub mod params;
mod pipeline;
pub mod state;

pub use params::{
    ConstancyParams, IlluminationPrior, ObservationNoise, ScoringOptions, SpectrumWeighting,
};
pub use pipeline::ConstancyEstimator;
pub use state::{EstimatorState, Phase};
