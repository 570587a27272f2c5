//! Expected mean colour per (material, light source) pair.
//!
//! Only used to rank hypotheses at initialisation, so the table may come from
//! an external source ([`MeanColorTable::new`]) or from the training patches
//! ([`MeanColorTable::from_training`]).

use super::training::GroupedPatches;
use crate::error::{ConstancyError, Result};
use crate::types::{LightSourceId, MaterialId};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeanColorTable {
    pub num_materials: usize,
    pub num_light_sources: usize,
    /// Row-major over (material, light source).
    pub entries: Vec<Vec<f64>>,
}

impl MeanColorTable {
    pub fn new(
        num_materials: usize,
        num_light_sources: usize,
        entries: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let table = Self {
            num_materials,
            num_light_sources,
            entries,
        };
        table.validate(None)?;
        Ok(table)
    }

    /// Average colour of every training example of each pair.
    pub(crate) fn from_training(grouped: &GroupedPatches) -> Result<Self> {
        let mut entries = Vec::with_capacity(grouped.num_materials * grouped.num_light_sources);
        for m in 0..grouped.num_materials {
            let n_pix = grouped.patch_pixels[m] as f64;
            for w in 0..grouped.num_light_sources {
                let examples = grouped.pair(MaterialId(m), LightSourceId(w));
                let mut mean = vec![0.0; grouped.channels];
                for ex in examples {
                    for (c, chunk) in ex.chunks(grouped.patch_pixels[m]).enumerate() {
                        mean[c] += chunk.iter().sum::<f64>() / n_pix;
                    }
                }
                for v in &mut mean {
                    *v /= examples.len() as f64;
                }
                entries.push(mean);
            }
        }
        Self::new(grouped.num_materials, grouped.num_light_sources, entries)
    }

    /// Check the table shape against the class counts and channel count.
    pub fn validate(&self, channels: Option<usize>) -> Result<()> {
        let expected = self.num_materials * self.num_light_sources;
        if self.entries.len() != expected {
            return Err(ConstancyError::config(format!(
                "mean colour table has {} entries, expected {} x {} = {expected}",
                self.entries.len(),
                self.num_materials,
                self.num_light_sources
            )));
        }
        let channels = channels.unwrap_or_else(|| self.entries.first().map_or(0, |e| e.len()));
        if let Some((i, e)) = self
            .entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != channels)
        {
            return Err(ConstancyError::config(format!(
                "mean colour entry {i} has {} channels, expected {channels}",
                e.len()
            )));
        }
        Ok(())
    }

    pub fn get(&self, m: MaterialId, w: LightSourceId) -> DVector<f64> {
        DVector::from_column_slice(&self.entries[m.0 * self.num_light_sources + w.0])
    }
}
