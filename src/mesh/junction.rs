//! Smooth blended geometry at branching points.
//!
//! A junction is a segment with more than one child whose end overlaps at
//! least one child's start. Each junction gets its own small scalar field:
//! one sphere for the parent end at full strength and one per overlapping
//! child scaled by its overlap ratio. The extracted blob is emitted as a
//! separate mesh piece next to the tubes.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Mesh;
use super::scalar_field::ScalarFieldVolume;
use crate::core::{Error, Result, is_finite_vec};
use crate::generation::config::GenerationLimits;
use crate::math::Aabb;
use crate::procgen::skeleton::Skeleton;

/// Local blend field parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JunctionConfig {
    pub enabled: bool,
    /// Samples per axis of each junction's field
    pub resolution: usize,
    /// Isosurface level
    pub threshold: f32,
    /// Contribution radius as a multiple of the endpoint radius
    pub sphere_scale: f32,
    /// Box edge as a multiple of the largest participating radius
    pub box_scale: f32,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 12,
            threshold: 0.5,
            sphere_scale: 2.0,
            box_scale: 4.0,
        }
    }
}

impl JunctionConfig {
    pub fn validate(&self, limits: &GenerationLimits) -> Result<()> {
        if self.resolution < 4 {
            return Err(Error::invalid(format!(
                "junction resolution must be >= 4, got {}",
                self.resolution
            )));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(Error::invalid("junction threshold must be positive"));
        }
        if !(self.sphere_scale > 0.0 && self.box_scale > 0.0) {
            return Err(Error::invalid("junction scales must be positive"));
        }
        let requested = self.resolution.saturating_pow(3).saturating_mul(4);
        if requested > limits.scalar_field_budget_bytes {
            return Err(Error::ResourceExhaustion {
                requested,
                budget: limits.scalar_field_budget_bytes,
            });
        }
        Ok(())
    }
}

/// A child whose start overlaps the parent end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionChild {
    pub segment: usize,
    pub start: Vec3,
    pub radius: f32,
    /// `(sum − distance) / sum` of the two radii, in (0, 1]
    pub overlap_ratio: f32,
}

/// A branching point with at least one overlapping child
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    /// Parent segment index
    pub segment: usize,
    pub center: Vec3,
    pub radius: f32,
    pub children: Vec<JunctionChild>,
}

impl Junction {
    pub fn max_radius(&self) -> f32 {
        self.children.iter().map(|c| c.radius).fold(self.radius, f32::max)
    }
}

pub struct JunctionBlender {
    config: JunctionConfig,
}

impl JunctionBlender {
    pub fn new(config: JunctionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JunctionConfig {
        &self.config
    }

    /// Find every segment with more than one child and at least one
    /// overlapping child.
    pub fn detect_junctions(&self, skeleton: &Skeleton) -> Vec<Junction> {
        let segments = skeleton.segments();
        skeleton
            .junctions()
            .into_iter()
            .filter_map(|index| {
                let parent = &segments[index];
                if !(parent.radius > 0.0) {
                    log::warn!("Skipping junction at segment {} with radius {}", index, parent.radius);
                    return None;
                }
                let children: Vec<JunctionChild> = parent
                    .children
                    .iter()
                    .filter_map(|&c| {
                        let child = &segments[c];
                        let sum = parent.radius + child.radius;
                        let distance = parent.end.distance(child.start);
                        (child.radius > 0.0 && sum > distance).then(|| JunctionChild {
                            segment: c,
                            start: child.start,
                            radius: child.radius,
                            overlap_ratio: (sum - distance) / sum,
                        })
                    })
                    .collect();
                (!children.is_empty()).then(|| Junction {
                    segment: index,
                    center: parent.end,
                    radius: parent.radius,
                    children,
                })
            })
            .collect()
    }

    /// Extract the blended joint mesh for one junction
    pub fn blend(&self, junction: &Junction, limits: &GenerationLimits) -> Result<Mesh> {
        let cfg = &self.config;
        let max_radius = junction.max_radius();
        if !(max_radius.is_finite() && max_radius > 0.0) || !is_finite_vec(junction.center) {
            return Err(Error::DegenerateGeometry(format!(
                "junction at segment {} has no usable radius",
                junction.segment
            )));
        }

        let centers = Aabb::from_points(
            std::iter::once(junction.center).chain(junction.children.iter().map(|c| c.start)),
        );
        let edge = centers.size() + Vec3::splat(cfg.box_scale * max_radius);
        let cell = edge / (cfg.resolution - 1) as f32;
        let size = edge + cell * 2.0;

        let mut field = ScalarFieldVolume::new(cfg.resolution, centers.center(), size, limits)?;
        field.add_sphere_weighted(junction.center, junction.radius * cfg.sphere_scale, 1.0);
        for child in &junction.children {
            field.add_sphere_weighted(child.start, child.radius * cfg.sphere_scale, child.overlap_ratio);
        }
        field.extract_isosurface(cfg.threshold)
    }

    /// Blend every junction in parallel, one field per junction.
    /// Results keep the order of `junctions`.
    pub fn blend_all(&self, junctions: &[Junction], limits: &GenerationLimits) -> Result<Vec<Mesh>> {
        junctions
            .par_iter()
            .map(|junction| self.blend(junction, limits))
            .collect()
    }
}
