//! Species presets: pre-filled generation configs

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::colonization::{CrownAnchor, CrownVolume, GrowthConfig};
use super::lsystem::LSystemConfig;
use crate::core::Error;
use crate::generation::config::GenerationConfig;
use crate::mesh::assembler::MeshConfig;
use crate::mesh::foliage::FoliageConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Oak,
    Willow,
    Elm,
    WinterOak,
    WinterWillow,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::Oak,
        Species::Willow,
        Species::Elm,
        Species::WinterOak,
        Species::WinterWillow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Species::Oak => "oak",
            Species::Willow => "willow",
            Species::Elm => "elm",
            Species::WinterOak => "winter_oak",
            Species::WinterWillow => "winter_willow",
        }
    }

    /// Full pipeline config for this species
    pub fn config(self, seed: u64) -> GenerationConfig {
        let mut config = match self {
            Species::Oak | Species::WinterOak => oak(),
            Species::Willow | Species::WinterWillow => willow(),
            Species::Elm => elm(),
        };
        if matches!(self, Species::WinterOak | Species::WinterWillow) {
            config.mesh.foliage.enabled = false;
        }
        config.seed = seed;
        config
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Species::ALL
            .into_iter()
            .find(|sp| sp.name() == normalized)
            .ok_or_else(|| Error::invalid(format!("unknown species '{s}'")))
    }
}

fn rules(pairs: &[(char, &str)]) -> std::collections::BTreeMap<char, String> {
    pairs.iter().map(|&(k, v)| (k, v.to_string())).collect()
}

/// Wide spreading crown, dense rounded canopy
fn oak() -> GenerationConfig {
    GenerationConfig {
        lsystem: LSystemConfig {
            axiom: "F".into(),
            rules: rules(&[('F', "FF+[+F-F-F]-[-F+F+F]")]),
            iterations: 2,
            angle_degrees: 25.0,
            segment_length: 0.6,
            base_radius: 0.2,
            tropism: Vec3::Y,
            tropism_strength: 0.08,
            ..Default::default()
        },
        growth: Some(GrowthConfig {
            crown: CrownVolume { center: Vec3::new(0.0, 0.5, 0.0), radius: 3.5, height: 4.0 },
            anchor: CrownAnchor::SkeletonTop,
            influence_radius: 2.5,
            kill_radius: 0.4,
            step_size: 0.2,
            max_iterations: 300,
            tropism: Vec3::Y,
            tropism_strength: 0.08,
            ..Default::default()
        }),
        mesh: MeshConfig {
            root_flare: 1.4,
            foliage: FoliageConfig { outer_branch_density: 0.25, leaf_scale: 0.35, ..Default::default() },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Drooping canopy, cascading branches
fn willow() -> GenerationConfig {
    GenerationConfig {
        lsystem: LSystemConfig {
            axiom: "X".into(),
            rules: rules(&[('X', "F[+X]F[-X]+X"), ('F', "FF")]),
            iterations: 3,
            angle_degrees: 22.0,
            segment_length: 0.35,
            base_radius: 0.18,
            tropism: Vec3::NEG_Y,
            tropism_strength: 0.12,
            ..Default::default()
        },
        growth: Some(GrowthConfig {
            crown: CrownVolume { center: Vec3::new(0.0, -0.5, 0.0), radius: 4.0, height: 4.0 },
            anchor: CrownAnchor::SkeletonTop,
            influence_radius: 2.0,
            kill_radius: 0.35,
            step_size: 0.25,
            max_iterations: 300,
            tropism: Vec3::NEG_Y,
            tropism_strength: 0.3,
            ..Default::default()
        }),
        mesh: MeshConfig {
            root_flare: 1.3,
            foliage: FoliageConfig { outer_branch_density: 0.35, leaf_scale: 0.25, ..Default::default() },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Tall vase-shaped crown, upward reaching
fn elm() -> GenerationConfig {
    GenerationConfig {
        lsystem: LSystemConfig {
            axiom: "FFX".into(),
            rules: rules(&[('X', "[&FX]/[&FX]/[&FX]")]),
            iterations: 3,
            angle_degrees: 20.0,
            segment_length: 0.8,
            length_decay: 0.75,
            base_radius: 0.22,
            tropism: Vec3::Y,
            tropism_strength: 0.15,
            ..Default::default()
        },
        growth: Some(GrowthConfig {
            crown: CrownVolume { center: Vec3::new(0.0, 0.5, 0.0), radius: 3.0, height: 4.5 },
            anchor: CrownAnchor::SkeletonTop,
            influence_radius: 2.5,
            kill_radius: 0.45,
            step_size: 0.22,
            max_iterations: 300,
            tropism: Vec3::Y,
            tropism_strength: 0.15,
            ..Default::default()
        }),
        mesh: MeshConfig {
            root_flare: 1.3,
            foliage: FoliageConfig { outer_branch_density: 0.25, leaf_scale: 0.3, ..Default::default() },
            ..Default::default()
        },
        ..Default::default()
    }
}
