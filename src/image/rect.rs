use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle `[x, x + w) × [y, y + h)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle covering a whole `width × height` image.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.w * self.h
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    /// Intersect with a `width × height` image; `None` when nothing remains.
    pub fn clip(&self, width: usize, height: usize) -> Option<Rect> {
        let x1 = (self.x + self.w).min(width);
        let y1 = (self.y + self.h).min(height);
        if self.x >= x1 || self.y >= y1 {
            return None;
        }
        Some(Rect::new(self.x, self.y, x1 - self.x, y1 - self.y))
    }

    /// Flattened pixel indices inside the rectangle, row-major.
    pub fn indices(&self, image_width: usize) -> impl Iterator<Item = usize> + '_ {
        (self.y..self.y + self.h)
            .flat_map(move |y| (self.x..self.x + self.w).map(move |x| y * image_width + x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_trims_to_image() {
        let r = Rect::new(6, 2, 10, 10).clip(8, 5).unwrap();
        assert_eq!(r, Rect::new(6, 2, 2, 3));
        assert!(Rect::new(8, 0, 2, 2).clip(8, 5).is_none());
    }

    #[test]
    fn indices_are_row_major() {
        let idx: Vec<usize> = Rect::new(1, 1, 2, 2).indices(4).collect();
        assert_eq!(idx, vec![5, 6, 9, 10]);
    }
}
