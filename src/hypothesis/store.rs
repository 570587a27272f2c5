//! Arena of per-pixel hypotheses plus a per-pixel ranking of survivors.
//!
//! Each pixel owns a contiguous block of `K = num_materials × num_light_sources`
//! slots in the arena. Slots are never reallocated; pruning only deletes the
//! slot index from the pixel's ranking, so every pixel's block can be handed
//! to a different worker without sharing.

use crate::error::{ConstancyError, Result};
use crate::types::{LightSourceId, MaterialId};
use nalgebra::DVector;
use serde::Serialize;

/// Candidate (material, light source) explanation of one pixel.
#[derive(Clone, Debug, Serialize)]
pub struct Hypothesis {
    pub material: MaterialId,
    pub light_source: LightSourceId,
    pub reflectance: DVector<f64>,
    pub illumination: f64,
    /// Combined log-likelihood from the last evaluation pass
    /// (`-inf` before the first pass).
    pub log_likelihood: f64,
}

impl Hypothesis {
    pub fn new(
        material: MaterialId,
        light_source: LightSourceId,
        reflectance: DVector<f64>,
        illumination: f64,
    ) -> Self {
        Self {
            material,
            light_source,
            reflectance,
            illumination,
            log_likelihood: f64::NEG_INFINITY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HypothesisStore {
    slots_per_pixel: usize,
    arena: Vec<Hypothesis>,
    ranking: Vec<Vec<usize>>,
}

/// Mutable access to one pixel's slots and ranking.
pub struct PixelHypotheses<'a> {
    pub pixel: usize,
    slots: &'a mut [Hypothesis],
    ranking: &'a mut Vec<usize>,
}

impl HypothesisStore {
    /// Build a store from per-pixel slot blocks and initial rankings.
    pub fn from_blocks(blocks: Vec<(Vec<Hypothesis>, Vec<usize>)>) -> Result<Self> {
        let slots_per_pixel = blocks.first().map_or(0, |(slots, _)| slots.len());
        if slots_per_pixel == 0 {
            return Err(ConstancyError::config("hypothesis store needs at least one pixel and one hypothesis"));
        }
        let mut arena = Vec::with_capacity(blocks.len() * slots_per_pixel);
        let mut ranking = Vec::with_capacity(blocks.len());
        for (pixel, (slots, order)) in blocks.into_iter().enumerate() {
            let mut seen = vec![false; slots_per_pixel];
            let valid = slots.len() == slots_per_pixel
                && order.len() == slots_per_pixel
                && order
                    .iter()
                    .all(|&s| s < slots_per_pixel && !std::mem::replace(&mut seen[s], true));
            if !valid {
                return Err(ConstancyError::config(format!(
                    "pixel {pixel}: ranking must be a permutation of {slots_per_pixel} slots"
                )));
            }
            arena.extend(slots);
            ranking.push(order);
        }
        Ok(Self {
            slots_per_pixel,
            arena,
            ranking,
        })
    }

    pub fn num_pixels(&self) -> usize {
        self.ranking.len()
    }

    /// Number of hypotheses each pixel started with.
    pub fn initial_per_pixel(&self) -> usize {
        self.slots_per_pixel
    }

    /// Survivors of one pixel.
    pub fn remaining(&self, pixel: usize) -> usize {
        self.ranking[pixel].len()
    }

    /// Survivor count shared by all pixels, or `None` if pixels disagree.
    pub fn uniform_remaining(&self) -> Option<usize> {
        let first = self.ranking.first()?.len();
        self.ranking
            .iter()
            .all(|r| r.len() == first)
            .then_some(first)
    }

    /// The pixel's vote for global aggregation: its rank-0 hypothesis only.
    pub fn best(&self, pixel: usize) -> &Hypothesis {
        let slot = self.ranking[pixel][0];
        &self.arena[pixel * self.slots_per_pixel + slot]
    }

    /// Survivors of one pixel in rank order.
    pub fn survivors(&self, pixel: usize) -> impl Iterator<Item = &Hypothesis> + '_ {
        let base = pixel * self.slots_per_pixel;
        self.ranking[pixel]
            .iter()
            .map(move |&s| &self.arena[base + s])
    }

    pub fn pixel_mut(&mut self, pixel: usize) -> PixelHypotheses<'_> {
        let k = self.slots_per_pixel;
        PixelHypotheses {
            pixel,
            slots: &mut self.arena[pixel * k..(pixel + 1) * k],
            ranking: &mut self.ranking[pixel],
        }
    }

    /// Apply `f` to every pixel, in parallel when the `parallel` feature is on.
    pub fn map_pixels<T, F>(&mut self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(PixelHypotheses<'_>) -> T + Sync + Send,
    {
        let k = self.slots_per_pixel;
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.arena
                .par_chunks_mut(k)
                .zip(self.ranking.par_iter_mut())
                .enumerate()
                .map(|(pixel, (slots, ranking))| {
                    f(PixelHypotheses {
                        pixel,
                        slots,
                        ranking,
                    })
                })
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.arena
                .chunks_mut(k)
                .zip(self.ranking.iter_mut())
                .enumerate()
                .map(|(pixel, (slots, ranking))| {
                    f(PixelHypotheses {
                        pixel,
                        slots,
                        ranking,
                    })
                })
                .collect()
        }
    }
}

impl<'a> PixelHypotheses<'a> {
    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    /// Slot indices of the survivors in rank order.
    pub fn ranking(&self) -> &[usize] {
        self.ranking
    }

    pub fn slot(&self, slot: usize) -> &Hypothesis {
        &self.slots[slot]
    }

    /// Call `f` on every survivor in rank order.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, &mut Hypothesis)) {
        for &slot in self.ranking.iter() {
            f(slot, &mut self.slots[slot]);
        }
    }

    /// Stable resort of the survivors by descending log-likelihood; ties (and
    /// NaN, treated as `-inf`) fall back to slot order.
    pub fn sort_by_likelihood(&mut self) {
        let slots = &*self.slots;
        self.ranking.sort_by(|&a, &b| {
            let la = finite_or_neg_inf(slots[a].log_likelihood);
            let lb = finite_or_neg_inf(slots[b].log_likelihood);
            lb.total_cmp(&la).then(a.cmp(&b))
        });
    }

    /// Remove a survivor from the ranking. Returns false if it was not present.
    pub fn remove(&mut self, slot: usize) -> bool {
        match self.ranking.iter().position(|&s| s == slot) {
            Some(pos) => {
                self.ranking.remove(pos);
                true
            }
            None => false,
        }
    }
}

fn finite_or_neg_inf(v: f64) -> f64 {
    if v.is_nan() {
        f64::NEG_INFINITY
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(m: usize, w: usize, ll: f64) -> Hypothesis {
        let mut h = Hypothesis::new(MaterialId(m), LightSourceId(w), DVector::zeros(3), 1.0);
        h.log_likelihood = ll;
        h
    }

    fn store() -> HypothesisStore {
        HypothesisStore::from_blocks(vec![
            (vec![hyp(0, 0, -1.0), hyp(0, 1, -3.0), hyp(1, 0, -2.0)], vec![2, 0, 1]),
            (vec![hyp(0, 0, -5.0), hyp(0, 1, 0.0), hyp(1, 0, f64::NAN)], vec![0, 1, 2]),
        ])
        .unwrap()
    }

    #[test]
    fn best_reads_rank_zero() {
        let s = store();
        assert_eq!(s.best(0).material, MaterialId(1));
        assert_eq!(s.uniform_remaining(), Some(3));
    }

    #[test]
    fn sort_orders_by_descending_likelihood_with_nan_last() {
        let mut s = store();
        let mut p0 = s.pixel_mut(0);
        p0.sort_by_likelihood();
        assert_eq!(p0.ranking(), &[0, 2, 1]);
        let mut p1 = s.pixel_mut(1);
        p1.sort_by_likelihood();
        assert_eq!(p1.ranking(), &[1, 0, 2]);
    }

    #[test]
    fn remove_keeps_slots_in_place() {
        let mut s = store();
        {
            let mut p = s.pixel_mut(0);
            assert!(p.remove(0));
            assert!(!p.remove(0));
        }
        assert_eq!(s.remaining(0), 2);
        assert_eq!(s.remaining(1), 3);
        assert_eq!(s.uniform_remaining(), None);
        assert_eq!(s.pixel_mut(0).slot(0).material, MaterialId(0));
    }

    #[test]
    fn map_pixels_visits_every_pixel_once() {
        let mut s = store();
        let mut visited = s.map_pixels(|p| (p.pixel, p.len()));
        visited.sort();
        assert_eq!(visited, vec![(0, 3), (1, 3)]);
    }

    #[test]
    fn invalid_ranking_is_rejected() {
        let blocks = vec![(vec![hyp(0, 0, 0.0), hyp(0, 1, 0.0)], vec![0, 0])];
        assert!(HypothesisStore::from_blocks(blocks).is_err());
    }
}
