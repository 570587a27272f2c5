use crate::calibration::{MeanColorTable, PatchSample};
use crate::error::{ConstancyError, Result};
use crate::estimator::ConstancyParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct TrainingConfig {
    /// Training images, indexed by `PatchSample::image`.
    pub images: Vec<PathBuf>,
    pub samples: Vec<PatchSample>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Both,
}

impl OutputFormat {
    pub fn includes_text(self) -> bool {
        matches!(self, OutputFormat::Text | OutputFormat::Both)
    }

    pub fn includes_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub json_out: Option<PathBuf>,
    /// Directory receiving per-iteration material/light-source label masks.
    pub mask_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    pub training: TrainingConfig,
    pub target: PathBuf,
    /// Externally supplied mean colours; derived from the training patches
    /// when omitted.
    #[serde(default)]
    pub mean_colors: Option<MeanColorTable>,
    #[serde(default)]
    pub params: ConstancyParams,
    #[serde(default)]
    pub output: OutputConfig,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let contents = fs::read_to_string(path).map_err(|source| ConstancyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConstancyError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the config named by the first command-line argument.
pub fn parse_cli(program: &str) -> Result<RuntimeConfig> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| ConstancyError::config(format!("usage: {program} <config.json>")))?;
    load_config(Path::new(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{
                "training": {
                    "images": ["train/a.png"],
                    "samples": [
                        {"image": 0, "material": 0, "light_source": 0,
                         "region": {"x": 0, "y": 0, "w": 4, "h": 4}}
                    ]
                },
                "target": "scene.png",
                "output": {"format": "both", "json_out": "out/report.json"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.training.samples.len(), 1);
        assert!(config.mean_colors.is_none());
        assert!(config.output.format.includes_json());
        assert!(config.output.format.includes_text());
        assert_eq!(config.params.window.size, 16);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/constancy.json")).unwrap_err();
        assert!(matches!(err, ConstancyError::Io { .. }));
    }
}
