//! Skeleton to mesh assembly
//!
//! Every branch path becomes one swept tube at its planned tier. Junctions
//! and the optional root flare are extracted from their own scalar fields.
//! Leaves become instance transforms. All pieces are concatenated in a
//! fixed order: tubes (branch-path order), junction blobs (segment order),
//! root flare.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Mesh;
use super::foliage::{FoliageConfig, place_leaves};
use super::junction::{JunctionBlender, JunctionConfig};
use super::organic::{blend_primitives, root_flare_primitives};
use super::tube::{PathSample, TubeMeshSweeper, subdivide_path};
use crate::core::{Error, Result};
use crate::generation::config::GenerationLimits;
use crate::lod::TessellationPlan;
use crate::procgen::skeleton::{BranchPath, Skeleton};

/// Geometry parameters for assembly
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub tube: TubeMeshSweeper,
    pub junctions: JunctionConfig,
    pub foliage: FoliageConfig,
    /// Trunk base widening (1.0 = no flare, 2.0 = twice the root radius)
    pub root_flare: f32,
    /// Samples per axis of the root flare field
    pub flare_resolution: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            tube: TubeMeshSweeper::default(),
            junctions: JunctionConfig::default(),
            foliage: FoliageConfig::default(),
            root_flare: 1.0,
            flare_resolution: 20,
        }
    }
}

impl MeshConfig {
    pub fn validate(&self, limits: &GenerationLimits) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tube.min_radius_fraction) {
            return Err(Error::invalid("tube min_radius_fraction must be in [0, 1]"));
        }
        self.junctions.validate(limits)?;
        self.foliage.validate()?;
        if !(self.root_flare.is_finite() && self.root_flare >= 1.0) {
            return Err(Error::invalid(format!("root_flare must be >= 1.0, got {}", self.root_flare)));
        }
        if self.root_flare > 1.0 {
            if self.flare_resolution < 4 {
                return Err(Error::invalid("flare_resolution must be >= 4"));
            }
            let requested = self.flare_resolution.saturating_pow(3).saturating_mul(4);
            if requested > limits.scalar_field_budget_bytes {
                return Err(Error::ResourceExhaustion {
                    requested,
                    budget: limits.scalar_field_budget_bytes,
                });
            }
        }
        Ok(())
    }
}

/// Piece counts from one assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub tubes: usize,
    pub junctions: usize,
    pub root_flare: bool,
    pub instances: usize,
    /// Paths dropped as degenerate
    pub degenerate_skipped: usize,
}

pub struct MeshAssembler {
    config: MeshConfig,
}

impl MeshAssembler {
    pub fn new(config: MeshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Centerline samples for a branch path: each segment start, then the last end
    pub fn path_samples(skeleton: &Skeleton, path: &BranchPath) -> Vec<PathSample> {
        let segments = skeleton.segments();
        let mut samples: Vec<PathSample> = path
            .segments
            .iter()
            .map(|&i| PathSample::new(segments[i].start, segments[i].radius))
            .collect();
        if let Some(&last) = path.segments.last() {
            samples.push(PathSample::new(segments[last].end, segments[last].radius));
        }
        samples
    }

    fn sweep_path(&self, skeleton: &Skeleton, path: &BranchPath, plan: &TessellationPlan) -> Result<Option<Mesh>> {
        let tier = plan.tier_for(path.branch);
        let (rings, radial) = tier.segments();
        let samples = subdivide_path(&Self::path_samples(skeleton, path), radial);
        match self.config.tube.sweep(&samples, rings) {
            Ok(mesh) => Ok(Some(mesh)),
            Err(Error::DegenerateGeometry(msg)) => {
                log::warn!("Skipping branch {:?}: {}", path.branch, msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Build the full mesh. Fails without a partial result if any piece
    /// fails for a reason other than local degeneracy.
    pub fn assemble(
        &self,
        skeleton: &Skeleton,
        plan: &TessellationPlan,
        limits: &GenerationLimits,
        rng: &mut impl Rng,
    ) -> Result<(Mesh, AssemblyStats)> {
        let mut stats = AssemblyStats::default();
        if skeleton.is_empty() {
            return Ok((Mesh::new(), stats));
        }

        let paths = skeleton.branch_paths();
        let tubes: Vec<Option<Mesh>> = paths
            .par_iter()
            .map(|path| self.sweep_path(skeleton, path, plan))
            .collect::<Result<_>>()?;
        stats.degenerate_skipped = tubes.iter().filter(|t| t.is_none()).count();
        let tubes: Vec<Mesh> = tubes.into_iter().flatten().collect();
        stats.tubes = tubes.len();

        let blobs = if self.config.junctions.enabled {
            let blender = JunctionBlender::new(self.config.junctions.clone());
            let junctions = blender.detect_junctions(skeleton);
            blender.blend_all(&junctions, limits)?
        } else {
            Vec::new()
        };
        stats.junctions = blobs.len();

        let mut pieces = tubes;
        pieces.extend(blobs);

        if self.config.root_flare > 1.0 {
            if let Some(root) = skeleton.root().and_then(|r| skeleton.segment(r)) {
                let primitives = root_flare_primitives(root, self.config.root_flare);
                let flare = blend_primitives(&primitives, self.config.flare_resolution, 0.5, limits)?;
                stats.root_flare = !flare.is_empty();
                pieces.push(flare);
            }
        }

        let mut mesh = Mesh::merged(pieces);
        mesh.instances = place_leaves(skeleton, &self.config.foliage, rng);
        stats.instances = mesh.instances.len();

        log::debug!(
            "Assembled {} tubes, {} junctions, {} instances: {} vertices, {} triangles",
            stats.tubes,
            stats.junctions,
            stats.instances,
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok((mesh, stats))
    }
}
