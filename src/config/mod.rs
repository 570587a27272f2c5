//! JSON runtime configuration for the demo binary.

pub mod demo;

pub use demo::{load_config, parse_cli, OutputConfig, OutputFormat, RuntimeConfig, TrainingConfig};
