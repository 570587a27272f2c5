//! Window scheduler and local illumination statistics.
//!
//! The region of interest is tiled by overlapping square windows of `size`
//! pixels placed with stride `size - overlap`, left to right and top to
//! bottom. The last window of a row or column is clipped to the region so
//! windows never extend past it. Within each window the rank-0 votes of the
//! pixels are grouped by light source to estimate a local illumination
//! distribution per light source.

use crate::error::{ConstancyError, Result};
use crate::gaussian::UnivariateGaussian;
use crate::image::Rect;
use crate::types::LightSourceId;
use log::debug;
use serde::{Deserialize, Serialize};

/// Window tiling options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOptions {
    /// Side length in pixels (> 0).
    pub size: usize,
    /// Overlap between consecutive windows (< `size`).
    pub overlap: usize,
    /// Region of interest; `None` covers the whole image.
    pub roi: Option<Rect>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            size: 16,
            overlap: 4,
            roi: None,
        }
    }
}

impl WindowOptions {
    pub fn stride(&self) -> usize {
        self.size.saturating_sub(self.overlap)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ConstancyError::config("window size must be positive"));
        }
        if self.overlap >= self.size {
            return Err(ConstancyError::config(format!(
                "window overlap {} must be smaller than window size {}",
                self.overlap, self.size
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Window {
    pub rect: Rect,
    /// Flattened image indices inside the window, row-major.
    pub pixels: Vec<usize>,
}

/// Clipped window starts/ends along one axis of `[start, end)`.
fn spans(start: usize, end: usize, size: usize, stride: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut s = start;
    loop {
        let e = (s + size).min(end);
        out.push((s, e));
        if e == end {
            break;
        }
        s += stride;
    }
    out
}

/// Windows tiling the region of interest of one image.
#[derive(Clone, Debug)]
pub struct WindowGrid {
    width: usize,
    height: usize,
    roi: Rect,
    windows: Vec<Window>,
    /// Last window (scan order) covering each pixel.
    owner: Vec<Option<usize>>,
}

impl WindowGrid {
    pub fn new(width: usize, height: usize, options: &WindowOptions) -> Result<Self> {
        options.validate()?;
        let roi = options
            .roi
            .unwrap_or_else(|| Rect::full(width, height))
            .clip(width, height)
            .ok_or_else(|| {
                ConstancyError::config(format!(
                    "region of interest {:?} does not intersect the {width}x{height} image",
                    options.roi
                ))
            })?;
        let stride = options.stride();
        let cols = spans(roi.x, roi.x + roi.w, options.size, stride);
        let rows = spans(roi.y, roi.y + roi.h, options.size, stride);

        let mut windows = Vec::with_capacity(rows.len() * cols.len());
        let mut owner = vec![None; width * height];
        for &(y0, y1) in &rows {
            for &(x0, x1) in &cols {
                let rect = Rect::new(x0, y0, x1 - x0, y1 - y0);
                let pixels: Vec<usize> = rect.indices(width).collect();
                for &p in &pixels {
                    owner[p] = Some(windows.len());
                }
                windows.push(Window { rect, pixels });
            }
        }
        debug!(
            "WindowGrid::new roi={:?} size={} overlap={} windows={}",
            roi,
            options.size,
            options.overlap,
            windows.len()
        );
        Ok(Self {
            width,
            height,
            roi,
            windows,
            owner,
        })
    }

    pub fn roi(&self) -> Rect {
        self.roi
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }

    /// Window whose statistics serve as the local prior of `pixel`; `None`
    /// outside the region of interest.
    pub fn owner(&self, pixel: usize) -> Option<usize> {
        self.owner[pixel]
    }
}

/// One pixel's contribution to the illumination statistics: light source and
/// illumination of its rank-0 hypothesis.
#[derive(Clone, Copy, Debug)]
pub struct IlluminationVote {
    pub light_source: LightSourceId,
    pub illumination: f64,
}

/// Illumination distributions per window and light source, plus image-wide
/// distributions per light source.
#[derive(Clone, Debug)]
pub struct IlluminationField {
    num_light_sources: usize,
    /// Indexed `window * num_light_sources + w`.
    local: Vec<UnivariateGaussian>,
    global: Vec<UnivariateGaussian>,
}

impl IlluminationField {
    /// `votes[i]` is the vote of image pixel `i`, `None` for pixels excluded
    /// from the statistics. Groups without voters get the neutral `N(0, 1)`.
    pub fn estimate(
        grid: &WindowGrid,
        votes: &[Option<IlluminationVote>],
        num_light_sources: usize,
        min_std: f64,
    ) -> Self {
        let mut local = Vec::with_capacity(grid.len() * num_light_sources);
        let mut empty = 0usize;
        for window in grid.windows() {
            let (dists, missing) =
                group_stats(window.pixels.iter().copied(), votes, num_light_sources, min_std);
            empty += missing;
            local.extend(dists);
        }
        let (global, _) = group_stats(0..votes.len(), votes, num_light_sources, min_std);
        if empty > 0 {
            debug!(
                "IlluminationField::estimate windows={} empty_groups={} (neutral prior)",
                grid.len(),
                empty
            );
        }
        Self {
            num_light_sources,
            local,
            global,
        }
    }

    pub fn window(&self, window: usize, w: LightSourceId) -> &UnivariateGaussian {
        &self.local[window * self.num_light_sources + w.0]
    }

    pub fn global(&self, w: LightSourceId) -> &UnivariateGaussian {
        &self.global[w.0]
    }

    pub fn globals(&self) -> &[UnivariateGaussian] {
        &self.global
    }

    /// Local prior of `pixel` for light source `w`, falling back to the global
    /// distribution outside the region of interest.
    pub fn local(&self, grid: &WindowGrid, pixel: usize, w: LightSourceId) -> &UnivariateGaussian {
        match grid.owner(pixel) {
            Some(window) => self.window(window, w),
            None => self.global(w),
        }
    }
}

/// Per-light-source distributions over `pixels`, and the number of light
/// sources without voters.
fn group_stats(
    pixels: impl Iterator<Item = usize>,
    votes: &[Option<IlluminationVote>],
    num_light_sources: usize,
    min_std: f64,
) -> (Vec<UnivariateGaussian>, usize) {
    let mut groups = vec![Vec::new(); num_light_sources];
    for v in pixels.filter_map(|p| votes[p]) {
        groups[v.light_source.0].push(v.illumination);
    }
    let missing = groups.iter().filter(|g| g.is_empty()).count();
    let dists = groups
        .iter()
        .map(|g| UnivariateGaussian::from_samples(g, min_std))
        .collect();
    (dists, missing)
}
