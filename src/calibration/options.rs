use serde::Deserialize;

/// Options controlling the calibration model builder.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Number of retained singular vectors per pair (`M`).
    pub model_dimensions: usize,
    /// Added to the diagonal of every fitted covariance.
    pub covariance_ridge: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            model_dimensions: 3,
            covariance_ridge: 1e-6,
        }
    }
}

impl CalibrationOptions {
    pub fn new(model_dimensions: usize) -> Self {
        Self {
            model_dimensions,
            ..Default::default()
        }
    }

    pub fn with_ridge(mut self, covariance_ridge: f64) -> Self {
        self.covariance_ridge = covariance_ridge;
        self
    }
}
