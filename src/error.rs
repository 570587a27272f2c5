//! Error taxonomy shared by calibration, estimation and the I/O helpers.

use crate::types::{LightSourceId, MaterialId};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConstancyError>;

/// Entity whose matrix could not be inverted or factorised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericEntity {
    Material(MaterialId),
    LightSource(LightSourceId),
    Pair(MaterialId, LightSourceId),
    ObservationNoise,
}

impl fmt::Display for NumericEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericEntity::Material(m) => write!(f, "material {}", m.0),
            NumericEntity::LightSource(w) => write!(f, "light source {}", w.0),
            NumericEntity::Pair(m, w) => write!(f, "pair (material {}, light source {})", m.0, w.0),
            NumericEntity::ObservationNoise => write!(f, "observation noise"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConstancyError {
    /// Inconsistent inputs detected before any iteration runs.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// A covariance or precision matrix is singular or not positive definite.
    #[error("numerical instability in {entity}{}: {reason}", fmt_iteration(.iteration))]
    NumericalInstability {
        entity: NumericEntity,
        iteration: Option<usize>,
        reason: String,
    },

    #[error("cannot prune pixel {pixel}: only {remaining} hypotheses remain")]
    PruneUnderflow { pixel: usize, remaining: usize },

    #[error("estimator has already converged")]
    AlreadyConverged,

    #[error("failed to process image {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn fmt_iteration(iteration: &Option<usize>) -> String {
    match iteration {
        Some(k) => format!(" at iteration {k}"),
        None => String::new(),
    }
}

impl ConstancyError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn unstable(
        entity: NumericEntity,
        iteration: Option<usize>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NumericalInstability {
            entity,
            iteration,
            reason: reason.into(),
        }
    }

    /// Attach an iteration number to a numerical error raised without one.
    pub fn at_iteration(self, k: usize) -> Self {
        match self {
            Self::NumericalInstability {
                entity,
                iteration: None,
                reason,
            } => Self::NumericalInstability {
                entity,
                iteration: Some(k),
                reason,
            },
            other => other,
        }
    }

    /// True for errors that are raised before estimation starts.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerical_error_names_entity_and_iteration() {
        let err = ConstancyError::unstable(
            NumericEntity::LightSource(LightSourceId(2)),
            None,
            "normal equations are singular",
        )
        .at_iteration(4);
        let msg = err.to_string();
        assert!(msg.contains("light source 2"), "{msg}");
        assert!(msg.contains("iteration 4"), "{msg}");
    }

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(ConstancyError::config("priors").is_configuration());
        assert!(!ConstancyError::AlreadyConverged.is_configuration());
    }
}
