//! Linear mixtures of materials.

use crate::error::{probability_sum, ConfigError};
use crate::material::{Color, Material};
use crate::sampling::gen_f64;
use lux_math::DVec3;
use rand::RngCore;

/// Tolerance on the probabilities summing to one.
const PROB_TOLERANCE: f64 = 1e-9;

/// A sum of materials, sampled by picking one of them at random.
///
/// The BSDF, emission and ambient terms add up. Each sub-material is chosen
/// for sampling with its configured probability and the densities combine
/// with the same weights.
pub struct Joined {
    materials: Vec<Box<dyn Material>>,
    probs: Vec<f64>,
}

impl Joined {
    /// Combine `materials`, sampling each with the matching entry of `probs`.
    pub fn new(materials: Vec<Box<dyn Material>>, probs: Vec<f64>) -> Result<Self, ConfigError> {
        if materials.len() != probs.len() {
            return Err(ConfigError::JoinedMaterialMismatch {
                materials: materials.len(),
                probs: probs.len(),
            });
        }
        match probability_sum(&probs) {
            Some(sum) if (sum - 1.0).abs() <= PROB_TOLERANCE => {}
            sum => {
                return Err(ConfigError::InvalidJoinedProbabilities {
                    sum: sum.unwrap_or(f64::NAN),
                })
            }
        }
        Ok(Self { materials, probs })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Pick a sub-material in proportion to its probability.
    fn choose(&self, rng: &mut dyn RngCore) -> &dyn Material {
        let mut u = gen_f64(rng);
        for (material, prob) in self.materials.iter().zip(&self.probs) {
            if u < *prob {
                return material.as_ref();
            }
            u -= prob;
        }
        // Rounding can leave `u` just above the last bucket.
        let last = self
            .probs
            .iter()
            .rposition(|p| *p > 0.0)
            .unwrap_or(self.materials.len() - 1);
        self.materials[last].as_ref()
    }

    fn weighted(&self, f: impl Fn(&dyn Material) -> f64) -> f64 {
        self.materials
            .iter()
            .zip(&self.probs)
            .filter(|(_, prob)| **prob > 0.0)
            .map(|(material, prob)| prob * f(material.as_ref()))
            .sum()
    }
}

impl Material for Joined {
    fn bsdf(&self, normal: DVec3, source: DVec3, dest: DVec3) -> Color {
        self.materials
            .iter()
            .map(|m| m.bsdf(normal, source, dest))
            .sum()
    }

    fn sample_source(&self, rng: &mut dyn RngCore, normal: DVec3, dest: DVec3) -> DVec3 {
        self.choose(rng).sample_source(rng, normal, dest)
    }

    fn source_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        self.weighted(|m| m.source_density(normal, source, dest))
    }

    fn sample_dest(&self, rng: &mut dyn RngCore, normal: DVec3, source: DVec3) -> DVec3 {
        self.choose(rng).sample_dest(rng, normal, source)
    }

    fn dest_density(&self, normal: DVec3, source: DVec3, dest: DVec3) -> f64 {
        self.weighted(|m| m.dest_density(normal, source, dest))
    }

    fn emission(&self) -> Color {
        self.materials.iter().map(|m| m.emission()).sum()
    }

    fn ambient(&self) -> Color {
        self.materials.iter().map(|m| m.ambient()).sum()
    }
}
