//! Renderer-agnostic triangle meshes and the stages that produce them
//!
//! A [`Mesh`] is plain position/normal/index buffers plus an optional list of
//! per-instance transforms for foliage. The caller owns it once returned.

pub mod mc_tables;
pub mod scalar_field;
pub mod tube;
pub mod junction;
pub mod organic;
pub mod foliage;
pub mod assembler;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use crate::math::Aabb;

pub use assembler::{MeshAssembler, MeshConfig};
pub use junction::{Junction, JunctionBlender, JunctionConfig};
pub use scalar_field::ScalarFieldVolume;
pub use tube::{PathSample, TubeMeshSweeper};

/// Per-instance placement for instanced geometry (leaves)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub position: [f32; 3],
    pub scale: f32,
    /// Orientation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl InstanceTransform {
    pub fn new(position: Vec3, rotation: Quat, scale: f32) -> Self {
        Self {
            position: position.to_array(),
            scale,
            rotation: rotation.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rotation)
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Triangle list, three indices per triangle
    pub indices: Vec<u32>,
    pub instances: Vec<InstanceTransform>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(triangles * 3),
            instances: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// No triangles and no instances
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.instances.is_empty()
    }

    /// Append a vertex, returning its index
    #[inline]
    pub fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position.to_array());
        self.normals.push(normal.to_array());
        index
    }

    #[inline]
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Merge `other` into this mesh, offsetting its indices
    pub fn append(&mut self, other: Mesh) {
        let base = self.positions.len() as u32;
        self.positions.extend(other.positions);
        self.normals.extend(other.normals);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
        self.instances.extend(other.instances);
    }

    /// Merge several meshes in order
    pub fn merged(parts: impl IntoIterator<Item = Mesh>) -> Mesh {
        let parts: Vec<Mesh> = parts.into_iter().collect();
        let vertices = parts.iter().map(|m| m.vertex_count()).sum();
        let triangles = parts.iter().map(|m| m.triangle_count()).sum();
        let mut merged = Mesh::with_capacity(vertices, triangles);
        for part in parts {
            merged.append(part);
        }
        merged
    }

    /// True when every index addresses an existing vertex and buffers agree
    pub fn is_well_formed(&self) -> bool {
        let n = self.positions.len() as u32;
        self.normals.len() == self.positions.len()
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| i < n)
            && self.positions.iter().flatten().all(|v| v.is_finite())
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().map(|&p| Vec3::from_array(p)))
    }

    /// Signed volume enclosed by the triangles (divergence theorem).
    /// Only meaningful for closed, outward-wound surfaces.
    pub fn enclosed_volume(&self) -> f32 {
        self.indices
            .chunks_exact(3)
            .map(|tri| {
                let a = Vec3::from_array(self.positions[tri[0] as usize]);
                let b = Vec3::from_array(self.positions[tri[1] as usize]);
                let c = Vec3::from_array(self.positions[tri[2] as usize]);
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Replace normals with area-weighted face normals
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = Vec3::from_array(self.positions[a]);
            let face = (Vec3::from_array(self.positions[b]) - pa)
                .cross(Vec3::from_array(self.positions[c]) - pa);
            accum[a] += face;
            accum[b] += face;
            accum[c] += face;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
            .collect();
    }

    /// Raw position bytes for GPU upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.push_vertex(Vec3::ZERO, Vec3::Z);
        let b = mesh.push_vertex(Vec3::X, Vec3::Z);
        let c = mesh.push_vertex(Vec3::Y, Vec3::Z);
        mesh.push_triangle(a, b, c);
        mesh
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut mesh = triangle();
        mesh.append(triangle());
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(&mesh.indices[3..], &[3, 4, 5]);
        assert!(mesh.is_well_formed());
    }

    #[test]
    fn test_merged_preserves_order() {
        let merged = Mesh::merged([triangle(), Mesh::new(), triangle()]);
        assert_eq!(merged.triangle_count(), 2);
        assert_eq!(merged.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_well_formed_rejects_bad_index() {
        let mut mesh = triangle();
        mesh.indices[2] = 9;
        assert!(!mesh.is_well_formed());
    }

    #[test]
    fn test_byte_views() {
        let mesh = triangle();
        assert_eq!(mesh.position_bytes().len(), 3 * 3 * 4);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
        assert_eq!(std::mem::size_of::<InstanceTransform>(), 32);
    }

    #[test]
    fn test_recompute_normals_follows_winding() {
        let mut mesh = triangle();
        mesh.normals.iter_mut().for_each(|n| *n = [0.0, 0.0, 0.0]);
        mesh.recompute_normals();
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_instance_round_trip() {
        let rot = Quat::from_rotation_y(0.5);
        let inst = InstanceTransform::new(Vec3::new(1.0, 2.0, 3.0), rot, 0.5);
        assert_eq!(inst.position(), Vec3::new(1.0, 2.0, 3.0));
        assert!(inst.rotation().abs_diff_eq(rot, 1e-6));
    }
}
