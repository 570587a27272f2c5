//! Per-iteration diagnostics returned by the estimator.
//!
//! [`IterationReport`] carries the rank-0 labels (for mask rendering), the
//! full likelihood table (for heatmaps), refreshed spectra, illumination
//! distributions, isolated pixel faults, and stage timings.

pub mod report;
pub mod timing;

pub use report::{IterationReport, LikelihoodEntry, LikelihoodTable, PixelFault};
pub use timing::{elapsed_ms, StageTiming, TimingBreakdown};
