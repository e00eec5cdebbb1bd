//! Procedural skeleton generation
//!
//! An L-system lays out the primary structure, then space colonization
//! grows fine branches into a crown volume. Both write into the same
//! index-based [`Skeleton`] arena.

pub mod skeleton;
pub mod lsystem;
pub mod colonization;
pub mod species;

pub use colonization::{CrownVolume, GrowthConfig, GrowthReport, SpaceColonizationGrower};
pub use lsystem::{Interpretation, LSystemConfig, LSystemGenerator};
pub use skeleton::{BranchId, BranchPath, Segment, Skeleton};
pub use species::Species;
