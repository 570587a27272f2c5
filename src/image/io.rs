//! I/O helpers for colour images, label masks and JSON.
//!
//! - `load_color_image`: read a PNG/JPEG/etc. into an RGB `ColorImage` in `[0, 1]`.
//! - `save_label_mask`: write per-pixel class labels as a grayscale PNG.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::ColorImage;
use crate::error::{ConstancyError, Result};
use image::{GrayImage, Luma};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk as 3-channel RGB with values scaled to `[0, 1]`.
pub fn load_color_image(path: &Path) -> Result<ColorImage> {
    let img = image::open(path)
        .map_err(|e| ConstancyError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .into_rgb8();
    let width = img.width() as usize;
    let height = img.height() as usize;
    let data = img.into_raw().into_iter().map(|v| v as f64 / 255.0).collect();
    ColorImage::from_vec(width, height, 3, data)
}

/// Save class labels as a grayscale PNG; label `i` of `num_classes` maps to
/// `255 * i / (num_classes - 1)`.
pub fn save_label_mask(
    labels: &[usize],
    width: usize,
    height: usize,
    num_classes: usize,
    path: &Path,
) -> Result<()> {
    if labels.len() != width * height {
        return Err(ConstancyError::config(format!(
            "label mask has {} entries, expected {}x{}",
            labels.len(),
            width,
            height
        )));
    }
    ensure_parent_dir(path)?;
    let scale = if num_classes > 1 {
        255.0 / (num_classes - 1) as f64
    } else {
        0.0
    };
    let mut out = GrayImage::new(width as u32, height as u32);
    for (i, &label) in labels.iter().enumerate() {
        let v = (label as f64 * scale).round().clamp(0.0, 255.0);
        out.put_pixel((i % width) as u32, (i / width) as u32, Luma([v as u8]));
    }
    out.save(path).map_err(|e| ConstancyError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| ConstancyError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ConstancyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ConstancyError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
