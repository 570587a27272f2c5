use crate::gaussian::UnivariateGaussian;
use crate::hypothesis::HypothesisStore;
use nalgebra::DVector;
use serde::Serialize;

/// Position of the estimator in its fixed-length loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "phase")]
pub enum Phase {
    /// Every pixel still holds all `materials × light_sources` hypotheses.
    Initialized,
    Iterating { remaining: usize },
    /// One hypothesis per pixel.
    Converged,
}

/// Versioned estimator state handed from one iteration to the next.
#[derive(Clone, Debug)]
pub struct EstimatorState {
    /// Number of completed iterations.
    pub iteration: usize,
    pub hypotheses: HypothesisStore,
    /// Current spectrum estimate per light source.
    pub spectra: Vec<DVector<f64>>,
    /// Image-wide illumination distribution per light source.
    pub illumination: Vec<UnivariateGaussian>,
}

impl EstimatorState {
    /// Survivors per pixel.
    pub fn remaining(&self) -> usize {
        self.hypotheses.initial_per_pixel() - self.iteration
    }

    pub fn phase(&self) -> Phase {
        match self.remaining() {
            1 => Phase::Converged,
            _ if self.iteration == 0 => Phase::Initialized,
            remaining => Phase::Iterating { remaining },
        }
    }
}
