//! Owned multi-channel f64 image with interleaved channels in row-major order.
//!
//! Pixels are addressed either by `(x, y)` or by their flattened index
//! `y * w + x`, which is how the estimator refers to them.
use super::Rect;
use crate::error::{ConstancyError, Result};
use nalgebra::DVector;

#[derive(Clone, Debug)]
pub struct ColorImage {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Number of colour channels per pixel
    pub channels: usize,
    /// Backing storage, `channels` values per pixel
    pub data: Vec<f64>,
}

impl ColorImage {
    /// Construct a zero-initialized image of size `w × h`.
    pub fn new(w: usize, h: usize, channels: usize) -> Self {
        Self {
            w,
            h,
            channels,
            data: vec![0.0; w * h * channels],
        }
    }

    /// Wrap an existing buffer, checking that its length matches the shape.
    pub fn from_vec(w: usize, h: usize, channels: usize, data: Vec<f64>) -> Result<Self> {
        if channels == 0 {
            return Err(ConstancyError::config("image must have at least one channel"));
        }
        if data.len() != w * h * channels {
            return Err(ConstancyError::config(format!(
                "image buffer holds {} values, expected {}x{}x{} = {}",
                data.len(),
                w,
                h,
                channels,
                w * h * channels
            )));
        }
        Ok(Self {
            w,
            h,
            channels,
            data,
        })
    }

    /// Image where every pixel has the same colour.
    pub fn filled(w: usize, h: usize, color: &[f64]) -> Self {
        let mut data = Vec::with_capacity(w * h * color.len());
        for _ in 0..w * h {
            data.extend_from_slice(color);
        }
        Self {
            w,
            h,
            channels: color.len(),
            data,
        }
    }

    #[inline]
    pub fn num_pixels(&self) -> usize {
        self.w * self.h
    }

    #[inline]
    /// Convert (x, y) to a flattened pixel index.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    /// Colour of the pixel with flattened index `i`.
    pub fn pixel(&self, i: usize) -> &[f64] {
        let start = i * self.channels;
        &self.data[start..start + self.channels]
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &[f64] {
        self.pixel(self.idx(x, y))
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: &[f64]) {
        let start = self.idx(x, y) * self.channels;
        self.data[start..start + self.channels].copy_from_slice(color);
    }

    /// Pixel colours as owned column vectors.
    pub fn pixel_vectors(&self) -> Vec<DVector<f64>> {
        (0..self.num_pixels())
            .map(|i| DVector::from_column_slice(self.pixel(i)))
            .collect()
    }

    /// Flatten a patch channel-major: all values of channel 0 (row-major over
    /// the patch), then channel 1, and so on.
    pub fn patch_channel_major(&self, rect: &Rect) -> Result<Vec<f64>> {
        if rect.x + rect.w > self.w || rect.y + rect.h > self.h || rect.is_empty() {
            return Err(ConstancyError::config(format!(
                "patch {rect:?} does not fit inside a {}x{} image",
                self.w, self.h
            )));
        }
        let n = rect.area();
        let mut out = vec![0.0; n * self.channels];
        for (j, idx) in rect.indices(self.w).enumerate() {
            for (c, v) in self.pixel(idx).iter().enumerate() {
                out[c * n + j] = *v;
            }
        }
        Ok(out)
    }

    /// Mean colour over a patch.
    pub fn patch_mean(&self, rect: &Rect) -> Result<DVector<f64>> {
        let flat = self.patch_channel_major(rect)?;
        let n = rect.area() as f64;
        Ok(DVector::from_iterator(
            self.channels,
            flat.chunks(rect.area()).map(|ch| ch.iter().sum::<f64>() / n),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_major_patch_layout() {
        let mut img = ColorImage::new(3, 2, 2);
        img.set(1, 0, &[1.0, 10.0]);
        img.set(2, 0, &[2.0, 20.0]);
        img.set(1, 1, &[3.0, 30.0]);
        img.set(2, 1, &[4.0, 40.0]);
        let rect = Rect::new(1, 0, 2, 2);
        let flat = img.patch_channel_major(&rect).unwrap();
        assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0]);
        let mean = img.patch_mean(&rect).unwrap();
        assert_eq!(mean.as_slice(), &[2.5, 25.0]);
    }

    #[test]
    fn patch_outside_image_is_rejected() {
        let img = ColorImage::new(4, 4, 3);
        assert!(img.patch_channel_major(&Rect::new(3, 3, 2, 2)).is_err());
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(ColorImage::from_vec(2, 2, 3, vec![0.0; 11]).is_err());
        assert!(ColorImage::from_vec(2, 2, 3, vec![0.0; 12]).is_ok());
    }
}
