//! Arbor - procedural tree skeletons and organic meshes
//!
//! Pipeline: grammar config -> L-system skeleton -> space colonization ->
//! tessellation plan -> tube sweeps, junction blends, root flare and leaf
//! instances -> one renderer-agnostic [`mesh::Mesh`].

pub mod core;
pub mod math;
pub mod procgen;
pub mod mesh;
pub mod lod;
pub mod generation;
