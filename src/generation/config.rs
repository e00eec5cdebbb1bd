//! Generation configuration records.
//!
//! Everything the pipeline consumes is a plain serde record with defaults,
//! so a species preset is just a pre-filled [`GenerationConfig`].

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::lod::TessellationConfig;
use crate::mesh::assembler::MeshConfig;
use crate::procgen::colonization::GrowthConfig;
use crate::procgen::lsystem::LSystemConfig;

/// Hard ceilings checked before any heavy computation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationLimits {
    /// Longest grammar string the rewriter may produce.
    pub max_string_length: usize,
    /// Most rewrite passes a grammar may request.
    pub max_rewrite_iterations: usize,
    /// Most space-colonization sweeps a growth config may request.
    pub max_growth_iterations: usize,
    /// Most attraction points a crown may be seeded with.
    pub max_attraction_points: usize,
    /// Most segments a skeleton may hold after growth.
    pub max_segments: usize,
    /// Largest scalar-field allocation in bytes.
    pub scalar_field_budget_bytes: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_string_length: 1_000_000,
            max_rewrite_iterations: 16,
            max_growth_iterations: 2_000,
            max_attraction_points: 200_000,
            max_segments: 250_000,
            scalar_field_budget_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Configuration for the whole skeleton-to-mesh pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Seed for every stochastic stage.
    pub seed: u64,
    /// Grammar and turtle parameters.
    pub lsystem: LSystemConfig,
    /// Space-colonization refinement. `None` skips growth.
    pub growth: Option<GrowthConfig>,
    /// Tube, junction, foliage and root flare parameters.
    pub mesh: MeshConfig,
    /// LOD metric weights and tier thresholds.
    pub tessellation: TessellationConfig,
    /// Ceilings.
    pub limits: GenerationLimits,
}

impl GenerationConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Validate every stage before any of them runs.
    pub fn validate(&self) -> Result<()> {
        self.lsystem.validate(&self.limits)?;
        if let Some(growth) = &self.growth {
            growth.validate(&self.limits)?;
        }
        self.mesh.validate(&self.limits)?;
        self.tessellation.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = GenerationLimits::default();
        assert_eq!(limits.max_string_length, 1_000_000);
        assert!(limits.max_growth_iterations > 0);
        assert!(limits.max_segments >= limits.max_growth_iterations);
        assert!(limits.scalar_field_budget_bytes >= 16 * 16 * 16 * 4);
    }

    #[test]
    fn test_default_config_validates() {
        GenerationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip_keeps_rules() {
        let config = GenerationConfig::default();
        let json = config.to_json_string().unwrap();
        let parsed = GenerationConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.lsystem.rules, config.lsystem.rules);
        assert_eq!(parsed.limits, config.limits);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = GenerationConfig::from_json_str(
            r#"{ "seed": 7, "lsystem": { "axiom": "X", "rules": { "X": "F[+X]F[-X]+X", "F": "FF" } } }"#,
        )
        .unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.lsystem.axiom, "X");
        assert_eq!(parsed.lsystem.rules.len(), 2);
        assert_eq!(parsed.limits, GenerationLimits::default());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(
            GenerationConfig::from_json_str("{ not json"),
            Err(Error::Config(_))
        ));
    }
}
