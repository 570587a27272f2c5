//! Closed-form estimators refreshed on every iteration.
//!
//! - [`operator`] – block-structured spectrum operator `B` and the `σ ↔ S` reshape.
//! - [`reflectance`] – Bayesian reflectance update per hypothesis.
//! - [`illumination`] – scalar illumination update per hypothesis.
//! - [`spectrum`] – per-light-source spectrum refresh from rank-0 votes.

pub mod illumination;
pub mod operator;
pub mod reflectance;
pub mod spectrum;

pub use illumination::estimate_illumination;
pub use operator::{reflectance_matrix, SpectrumOperator};
pub use reflectance::estimate_reflectance;
pub use spectrum::{accumulate_votes, SpectrumAccumulator, SpectrumVote};

#[cfg(feature = "parallel")]
pub use spectrum::accumulate_votes_parallel;
