//! Remove the least likely hypothesis of every pixel.
//!
//! Survivors are fully resorted by their current log-likelihood before the
//! removal, so the outcome does not depend on the order left by earlier
//! passes. Each pixel is pruned independently.

use super::store::{HypothesisStore, PixelHypotheses};
use crate::error::{ConstancyError, Result};

/// Resort one pixel and drop its minimum-likelihood survivor. Returns the
/// removed slot.
pub fn prune_pixel(pixel: &mut PixelHypotheses<'_>) -> Result<usize> {
    if pixel.len() <= 1 {
        return Err(ConstancyError::PruneUnderflow {
            pixel: pixel.pixel,
            remaining: pixel.len(),
        });
    }
    pixel.sort_by_likelihood();
    let worst = pixel.ranking()[pixel.len() - 1];
    pixel.remove(worst);
    Ok(worst)
}

/// Prune every pixel by one hypothesis. Returns the removed slot per pixel.
pub fn prune_all(store: &mut HypothesisStore) -> Result<Vec<usize>> {
    store
        .map_pixels(|mut pixel| prune_pixel(&mut pixel))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::Hypothesis;
    use crate::types::{LightSourceId, MaterialId};
    use nalgebra::DVector;

    fn block(lls: &[f64], order: Vec<usize>) -> (Vec<Hypothesis>, Vec<usize>) {
        let slots = lls
            .iter()
            .enumerate()
            .map(|(i, &ll)| {
                let mut h = Hypothesis::new(MaterialId(i), LightSourceId(0), DVector::zeros(1), 1.0);
                h.log_likelihood = ll;
                h
            })
            .collect();
        (slots, order)
    }

    fn brute_force_min(lls: &[f64]) -> usize {
        let mut best = 0;
        for (i, &v) in lls.iter().enumerate() {
            if v < lls[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn removes_brute_force_minimum() {
        let lls = [-2.0, -7.5, 3.0, -7.0];
        let mut store = HypothesisStore::from_blocks(vec![block(&lls, vec![0, 1, 2, 3])]).unwrap();
        let removed = prune_all(&mut store).unwrap();
        assert_eq!(removed, vec![brute_force_min(&lls)]);
        assert_eq!(store.remaining(0), 3);
        assert_eq!(store.best(0).material, MaterialId(2));
    }

    #[test]
    fn removal_is_independent_of_prior_order() {
        let lls = [-1.0, -4.0, 0.5, -0.2, -3.9];
        let orders = [
            vec![0, 1, 2, 3, 4],
            vec![4, 3, 2, 1, 0],
            vec![1, 4, 0, 2, 3],
            vec![2, 0, 3, 4, 1],
        ];
        for order in orders {
            let mut store = HypothesisStore::from_blocks(vec![block(&lls, order.clone())]).unwrap();
            let removed = prune_all(&mut store).unwrap();
            assert_eq!(removed, vec![1], "order {order:?}");
            let ranked: Vec<_> = store.survivors(0).map(|h| h.material.0).collect();
            assert_eq!(ranked, vec![2, 3, 0, 4]);
        }
    }

    #[test]
    fn refuses_to_prune_last_hypothesis() {
        let mut store = HypothesisStore::from_blocks(vec![block(&[0.0], vec![0])]).unwrap();
        let err = prune_all(&mut store).unwrap_err();
        assert!(matches!(err, ConstancyError::PruneUnderflow { pixel: 0, remaining: 1 }));
    }
}
