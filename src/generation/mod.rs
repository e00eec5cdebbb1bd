//! Tree generation pipeline: config in, skeleton and mesh out.
//!
//! The pipeline runs:
//! 1. Validation of every stage against [`GenerationLimits`](config::GenerationLimits)
//! 2. L-system rewriting and turtle interpretation
//! 3. Space colonization refinement (optional)
//! 4. Tessellation planning per branch
//! 5. Mesh assembly (tubes, junction blends, root flare, leaf instances)
//!
//! One seeded RNG is created per call and threaded through every stochastic
//! stage in that order, so a config always reproduces the same tree. A call
//! either returns a complete, well-formed mesh or an error.

pub mod config;

pub use config::{GenerationConfig, GenerationLimits};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::core::{Error, Result};
use crate::lod::{AdaptiveTessellationController, TessellationPlan};
use crate::mesh::{Mesh, MeshAssembler};
use crate::procgen::colonization::{HaltReason, SpaceColonizationGrower};
use crate::procgen::lsystem::LSystemGenerator;
use crate::procgen::skeleton::Skeleton;
use crate::procgen::species::Species;

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub string_length: usize,
    /// Segments from turtle interpretation
    pub lsystem_segments: usize,
    /// `]` symbols ignored on an empty stack
    pub unbalanced_pops: usize,
    pub growth_iterations: usize,
    pub growth_halt: Option<HaltReason>,
    pub segments_added: usize,
    pub total_segments: usize,
    pub branches: usize,
    /// Elements dropped as degenerate across all stages
    pub degenerate_filtered: usize,
    pub tubes: usize,
    pub junctions: usize,
    pub root_flare: bool,
    pub instances: usize,
    pub vertices: usize,
    pub triangles: usize,
    /// Branches per tier: ultra, high, medium, low
    pub tier_histogram: [usize; 4],
}

/// Output of [`TreeGenerator::generate`]
#[derive(Debug, Clone)]
pub struct GeneratedTree {
    pub skeleton: Skeleton,
    pub mesh: Mesh,
    pub plan: TessellationPlan,
    pub report: GenerationReport,
}

/// Runs the full skeleton-to-mesh pipeline for one config
pub struct TreeGenerator {
    config: GenerationConfig,
}

impl TreeGenerator {
    /// Validate `config` up front. Nothing heavy runs until `generate`.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn for_species(species: Species, seed: u64) -> Result<Self> {
        Self::new(species.config(seed))
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn generate(&self) -> Result<GeneratedTree> {
        let cfg = &self.config;
        let limits = &cfg.limits;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut report = GenerationReport { seed: cfg.seed, ..Default::default() };

        let lsystem = LSystemGenerator::new(cfg.lsystem.clone(), limits)?;
        let (symbols, interpretation) = lsystem.generate(limits, &mut rng)?;
        report.string_length = symbols.chars().count();
        report.lsystem_segments = interpretation.skeleton.len();
        report.unbalanced_pops = interpretation.unbalanced_pops;
        report.degenerate_filtered = interpretation.degenerate_skipped;
        let mut skeleton = interpretation.skeleton;

        if let Some(growth) = &cfg.growth {
            let grower = SpaceColonizationGrower::new(growth.clone(), limits)?;
            let growth_report = grower.grow(&mut skeleton, &mut rng)?;
            report.growth_iterations = growth_report.iterations;
            report.growth_halt = Some(growth_report.halt);
            report.segments_added = growth_report.segments_added;
            report.degenerate_filtered += growth_report.degenerate_skipped;
        }
        report.total_segments = skeleton.len();
        report.branches = skeleton.branch_count() as usize;

        let mut controller = AdaptiveTessellationController::new(cfg.tessellation.clone())?;
        controller.evaluate_skeleton(&skeleton);
        let plan = controller.plan();
        report.tier_histogram = plan.histogram();

        let assembler = MeshAssembler::new(cfg.mesh.clone());
        let (mesh, stats) = assembler.assemble(&skeleton, &plan, limits, &mut rng)?;
        if !mesh.is_well_formed() {
            return Err(Error::DegenerateGeometry("assembled mesh failed validation".into()));
        }
        report.tubes = stats.tubes;
        report.junctions = stats.junctions;
        report.root_flare = stats.root_flare;
        report.instances = stats.instances;
        report.degenerate_filtered += stats.degenerate_skipped;
        report.vertices = mesh.vertex_count();
        report.triangles = mesh.triangle_count();

        log::info!(
            "Generated tree (seed {}): {} segments, {} vertices, {} triangles, {} leaves",
            cfg.seed,
            report.total_segments,
            report.vertices,
            report.triangles,
            report.instances
        );

        Ok(GeneratedTree { skeleton, mesh, plan, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::{LodTier, Viewer};
    use glam::Vec3;

    fn quick(species: Species, seed: u64) -> GenerationConfig {
        let mut config = species.config(seed);
        if let Some(growth) = config.growth.as_mut() {
            growth.max_iterations = 40;
            growth.point_density = 4.0;
        }
        config
    }

    #[test]
    fn test_default_config_generates() {
        let tree = TreeGenerator::new(GenerationConfig::default()).unwrap().generate().unwrap();
        assert!(tree.mesh.is_well_formed());
        assert!(tree.mesh.triangle_count() > 0);
        assert_eq!(tree.report.total_segments, tree.skeleton.len());
        assert_eq!(tree.report.lsystem_segments, 64);
        assert_eq!(tree.report.unbalanced_pops, 0);
        assert!(tree.report.growth_halt.is_none());
        assert!(tree.skeleton.is_tapered());
    }

    #[test]
    fn test_same_seed_same_tree() {
        let a = TreeGenerator::new(quick(Species::Oak, 11)).unwrap().generate().unwrap();
        let b = TreeGenerator::new(quick(Species::Oak, 11)).unwrap().generate().unwrap();
        assert_eq!(a.mesh, b.mesh);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = TreeGenerator::new(GenerationConfig { seed: 1, ..Default::default() })
            .unwrap()
            .generate()
            .unwrap();
        let b = TreeGenerator::new(GenerationConfig { seed: 2, ..Default::default() })
            .unwrap()
            .generate()
            .unwrap();
        assert_ne!(a.mesh.positions, b.mesh.positions);
    }

    #[test]
    fn test_species_pipelines() {
        for species in [Species::Oak, Species::Willow, Species::WinterOak] {
            let tree = TreeGenerator::new(quick(species, 3)).unwrap().generate().unwrap();
            let report = &tree.report;
            assert!(report.growth_iterations <= 40);
            assert!(report.total_segments >= report.lsystem_segments);
            assert!(report.root_flare);
            assert!(report.junctions > 0);
            assert_eq!(report.instances > 0, species != Species::WinterOak);
            assert!(tree.mesh.is_well_formed());
        }
    }

    #[test]
    fn test_overflow_rejected_before_work() {
        let mut config = GenerationConfig::default();
        config.lsystem.iterations = 6;
        config.limits.max_string_length = 10_000;
        let generator = TreeGenerator::new(config).unwrap();
        assert!(matches!(
            generator.generate(),
            Err(Error::GenerationOverflow { what: "grammar string length", .. })
        ));

        let mut config = GenerationConfig::default();
        config.lsystem.iterations = 40;
        assert!(matches!(TreeGenerator::new(config), Err(Error::GenerationOverflow { .. })));
    }

    #[test]
    fn test_budget_failure_returns_no_mesh() {
        let mut config = GenerationConfig::default();
        config.limits.scalar_field_budget_bytes = 1024;
        assert!(matches!(TreeGenerator::new(config), Err(Error::ResourceExhaustion { .. })));
    }

    #[test]
    fn test_viewer_drives_tiers() {
        let near = Viewer { position: Vec3::new(0.0, 1.5, 2.0), ..Default::default() };
        let mut config = GenerationConfig::default();
        config.tessellation.viewer = Some(near);
        let close = TreeGenerator::new(config.clone()).unwrap().generate().unwrap();

        config.tessellation.viewer = Some(Viewer { position: Vec3::new(0.0, 1.5, 180.0), ..near });
        let far = TreeGenerator::new(config).unwrap().generate().unwrap();

        assert!(far.report.triangles < close.report.triangles);
        assert!(far.plan.tiers.values().all(|&t| t == LodTier::Low));
    }

    #[test]
    fn test_report_serializes() {
        let tree = TreeGenerator::new(GenerationConfig::default()).unwrap().generate().unwrap();
        let json = serde_json::to_string(&tree.report).unwrap();
        assert!(json.contains("\"total_segments\""));
    }
}
