#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod calibration;
pub mod diagnostics;
pub mod error;
pub mod estimator;
pub mod image;
pub mod model;
pub mod types;

// Building blocks of the estimator – public for tools and tests, but expect
// them to move.
pub mod config;
pub mod estimate;
pub mod gaussian;
pub mod hypothesis;
pub mod likelihood;
pub mod window;

// --- High-level re-exports -------------------------------------------------

// Main entry points: calibration, estimator, results.
pub use crate::calibration::{calibrate, Calibration, CalibrationOptions, MeanColorTable, TrainingSet};
pub use crate::error::{ConstancyError, Result};
pub use crate::estimator::{ConstancyEstimator, ConstancyParams, Phase};
pub use crate::model::CalibratedModel;
pub use crate::types::{ClassCatalog, ClassSpec, ConstancyResult, LightSourceId, MaterialId};

// Per-iteration diagnostics.
pub use crate::diagnostics::{IterationReport, LikelihoodTable, PixelFault};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use color_constancy::prelude::*;
///
/// # fn main() -> color_constancy::Result<()> {
/// let training = TrainingSet::new(vec![ColorImage::new(8, 8, 3)], Vec::new());
/// let params = ConstancyParams::default();
/// let cal = calibrate(&training, &params.classes, &params.calibration)?;
/// let target = ColorImage::new(64, 48, 3);
/// let result = ConstancyEstimator::new(cal.model, &cal.mean_colors, &target, &params)?.run()?;
/// println!("iterations={} latency_ms={:.3}", result.iterations.len(), result.latency_ms);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::calibration::PatchSample;
    pub use crate::image::{ColorImage, Rect};
    pub use crate::{
        calibrate, Calibration, ClassCatalog, ClassSpec, ConstancyEstimator, ConstancyParams,
        ConstancyResult, MeanColorTable, TrainingSet,
    };
}
