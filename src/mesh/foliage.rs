//! Leaf instance placement on the finished skeleton.
//!
//! Every terminal segment gets leaves; segments in the outer half of the
//! depth range get them with probability `outer_branch_density`. Leaves are
//! emitted as instance transforms for the renderer to draw with its own
//! leaf card or mesh.

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::InstanceTransform;
use crate::core::{Error, Result};
use crate::procgen::skeleton::Skeleton;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    pub enabled: bool,
    /// Instances per leaf-bearing segment
    pub leaves_per_segment: usize,
    /// Chance that an outer, non-terminal segment also gets leaves (0.0-1.0)
    pub outer_branch_density: f32,
    /// Base instance scale
    pub leaf_scale: f32,
    /// Relative scale variation (0.0-1.0)
    pub scale_jitter: f32,
    /// Max random offset from the segment end
    pub spread: f32,
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            leaves_per_segment: 3,
            outer_branch_density: 0.3,
            leaf_scale: 0.15,
            scale_jitter: 0.3,
            spread: 0.1,
        }
    }
}

impl FoliageConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.outer_branch_density) {
            return Err(Error::invalid("outer_branch_density must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.scale_jitter) {
            return Err(Error::invalid("scale_jitter must be in [0, 1]"));
        }
        if !(self.leaf_scale > 0.0 && self.leaf_scale.is_finite()) {
            return Err(Error::invalid("leaf_scale must be positive"));
        }
        if !(self.spread >= 0.0 && self.spread.is_finite()) {
            return Err(Error::invalid("spread must be non-negative"));
        }
        Ok(())
    }
}

#[inline]
fn symmetric(rng: &mut impl Rng, amplitude: f32) -> f32 {
    (rng.random::<f32>() * 2.0 - 1.0) * amplitude
}

/// Place leaf instances. Deterministic for a given skeleton and RNG state.
pub fn place_leaves(skeleton: &Skeleton, config: &FoliageConfig, rng: &mut impl Rng) -> Vec<InstanceTransform> {
    if !config.enabled || skeleton.is_empty() {
        return Vec::new();
    }

    let depths = skeleton.depths();
    let max_depth = depths.iter().copied().max().unwrap_or(0);
    let outer_threshold = max_depth / 2;

    let mut leaves = Vec::new();
    for (i, seg) in skeleton.segments().iter().enumerate() {
        if seg.parent.is_none() {
            continue;
        }
        let is_terminal = seg.children.is_empty();
        let is_outer = depths[i] >= outer_threshold;
        let should_leaf = is_terminal || (is_outer && rng.random::<f32>() < config.outer_branch_density);
        if !should_leaf {
            continue;
        }

        let count = if is_terminal {
            config.leaves_per_segment
        } else {
            config.leaves_per_segment.div_ceil(2)
        };
        let facing = seg.direction();
        for _ in 0..count {
            let offset = Vec3::new(
                symmetric(rng, config.spread),
                symmetric(rng, config.spread),
                symmetric(rng, config.spread),
            );
            let yaw = rng.random::<f32>() * std::f32::consts::TAU;
            let base = if facing == Vec3::ZERO { Quat::IDENTITY } else { Quat::from_rotation_arc(Vec3::Y, facing) };
            let rotation = (base * Quat::from_rotation_y(yaw)).normalize();
            let scale = config.leaf_scale * (1.0 + symmetric(rng, config.scale_jitter));
            leaves.push(InstanceTransform::new(seg.end + offset, rotation, scale));
        }
    }

    log::debug!("Placed {} leaf instances on {} segments", leaves.len(), skeleton.len());
    leaves
}
