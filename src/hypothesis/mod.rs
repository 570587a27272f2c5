//! Per-pixel hypothesis store, its initialisation and pruning.
//!
//! - [`store`] – arena of hypotheses with a per-pixel ranking of survivors.
//! - [`init`] – one hypothesis per (material, light source) pair, ranked by
//!   distance to the mean-colour table.
//! - [`prune`] – drop each pixel's least likely survivor.

pub mod init;
pub mod prune;
pub mod store;

pub use init::initialize_hypotheses;
pub use prune::{prune_all, prune_pixel};
pub use store::{Hypothesis, HypothesisStore, PixelHypotheses};
