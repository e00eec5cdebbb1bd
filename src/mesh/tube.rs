//! Tapered tube sweeping along a branch path

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::Mesh;
use crate::core::{Error, Result, is_finite_vec};

/// Parallel-to-up cutoff before switching the frame reference axis
const UP_SWITCH_DOT: f32 = 0.99;

/// One point on a branch centerline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSample {
    pub position: Vec3,
    pub radius: f32,
}

impl PathSample {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self { position, radius }
    }
}

/// Insert `subdivisions - 1` evenly spaced samples between each pair,
/// interpolating both position and radius. `subdivisions <= 1` returns
/// the path unchanged.
pub fn subdivide_path(path: &[PathSample], subdivisions: usize) -> Vec<PathSample> {
    if subdivisions <= 1 || path.len() < 2 {
        return path.to_vec();
    }
    let mut out = Vec::with_capacity((path.len() - 1) * subdivisions + 1);
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        for step in 0..subdivisions {
            let t = step as f32 / subdivisions as f32;
            out.push(PathSample {
                position: a.position.lerp(b.position, t),
                radius: a.radius + (b.radius - a.radius) * t,
            });
        }
    }
    if let Some(&last) = path.last() {
        out.push(last);
    }
    out
}

/// Sweeps rings of vertices along a path into an open tube
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TubeMeshSweeper {
    /// Ring radius floor as a fraction of the first sample's radius
    pub min_radius_fraction: f32,
}

impl Default for TubeMeshSweeper {
    fn default() -> Self {
        Self { min_radius_fraction: 0.02 }
    }
}

impl TubeMeshSweeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit tangent at sample `i` by central difference (one-sided at the ends)
    fn tangent(path: &[PathSample], i: usize, previous: Vec3) -> Vec3 {
        let lo = path[i.saturating_sub(1)].position;
        let hi = path[(i + 1).min(path.len() - 1)].position;
        (hi - lo).try_normalize().unwrap_or(previous)
    }

    /// Ring normal from the up reference, switching axis when the tangent is near vertical
    fn reference_normal(tangent: Vec3) -> Vec3 {
        let up = if tangent.dot(Vec3::Y).abs() > UP_SWITCH_DOT { Vec3::X } else { Vec3::Y };
        up.cross(tangent).normalize()
    }

    /// Parallel-transport the previous ring normal onto a new tangent
    fn transport(normal: Vec3, from: Vec3, to: Vec3) -> Vec3 {
        let carried = Quat::from_rotation_arc(from, to) * normal;
        (carried - to * carried.dot(to))
            .try_normalize()
            .unwrap_or_else(|| Self::reference_normal(to))
    }

    /// Sweep `ring_segments` vertices around every sample.
    ///
    /// The first ring's frame comes from the up reference; later rings
    /// transport it along the path.
    ///
    /// The result has exactly `ring_segments · N` vertices and
    /// `2 · ring_segments · (N − 1)` triangles, wound so face normals point
    /// away from the centerline. The tube is open at both ends.
    pub fn sweep(&self, path: &[PathSample], ring_segments: usize) -> Result<Mesh> {
        if path.len() < 2 {
            return Err(Error::invalid(format!("tube path needs >= 2 samples, got {}", path.len())));
        }
        if ring_segments < 3 {
            return Err(Error::invalid(format!("ring segments must be >= 3, got {ring_segments}")));
        }
        if let Some(bad) = path
            .iter()
            .find(|s| !is_finite_vec(s.position) || !s.radius.is_finite())
        {
            return Err(Error::DegenerateGeometry(format!("non-finite path sample {bad:?}")));
        }

        let rings = path.len();
        let min_radius = path[0].radius.abs() * self.min_radius_fraction;
        let mut mesh = Mesh::with_capacity(rings * ring_segments, 2 * ring_segments * (rings - 1));

        let mut tangent = Self::tangent(path, 0, Vec3::Y);
        let mut normal = Self::reference_normal(tangent);
        for (i, sample) in path.iter().enumerate() {
            if i > 0 {
                let next = Self::tangent(path, i, tangent);
                normal = Self::transport(normal, tangent, next);
                tangent = next;
            }
            let binormal = tangent.cross(normal);
            let radius = sample.radius.max(min_radius);
            for j in 0..ring_segments {
                let angle = j as f32 / ring_segments as f32 * std::f32::consts::TAU;
                let offset = normal * angle.cos() + binormal * angle.sin();
                let vertex = sample.position + offset * radius;
                if !is_finite_vec(vertex) {
                    return Err(Error::DegenerateGeometry(format!(
                        "ring vertex overflows at sample {i} ({sample:?})"
                    )));
                }
                mesh.push_vertex(vertex, offset);
            }
        }

        let r = ring_segments as u32;
        for i in 0..rings as u32 - 1 {
            for j in 0..r {
                let a = i * r + j;
                let b = i * r + (j + 1) % r;
                let c = (i + 1) * r + j;
                let d = (i + 1) * r + (j + 1) % r;
                mesh.push_triangle(a, b, c);
                mesh.push_triangle(b, d, c);
            }
        }

        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(n: usize) -> Vec<PathSample> {
        (0..n)
            .map(|i| PathSample::new(Vec3::Y * i as f32, 0.5 - i as f32 * 0.05))
            .collect()
    }

    #[test]
    fn test_vertex_and_triangle_counts() {
        let sweeper = TubeMeshSweeper::new();
        for (n, r) in [(2, 3), (5, 8), (9, 16)] {
            let mesh = sweeper.sweep(&straight(n), r).unwrap();
            assert_eq!(mesh.vertex_count(), r * n);
            assert_eq!(mesh.triangle_count(), 2 * r * (n - 1));
            assert!(mesh.indices.iter().all(|&i| (i as usize) < r * n));
            assert!(mesh.is_well_formed());
        }
    }

    #[test]
    fn test_invalid_input() {
        let sweeper = TubeMeshSweeper::new();
        assert!(matches!(sweeper.sweep(&straight(1), 8), Err(Error::InvalidParameter(_))));
        assert!(matches!(sweeper.sweep(&straight(4), 2), Err(Error::InvalidParameter(_))));

        let mut path = straight(3);
        path[1].position.x = f32::NAN;
        assert!(matches!(sweeper.sweep(&path, 8), Err(Error::DegenerateGeometry(_))));
    }

    #[test]
    fn test_overflowing_ring_is_degenerate() {
        let edge = Vec3::new(f32::MAX, 0.0, 0.0);
        let path = [PathSample::new(edge, 1e37), PathSample::new(edge + Vec3::Y * 1e34, 1e37)];
        assert!(matches!(TubeMeshSweeper::new().sweep(&path, 8), Err(Error::DegenerateGeometry(_))));
    }

    #[test]
    fn test_rings_are_perpendicular_and_sized() {
        let path = straight(3);
        let mesh = TubeMeshSweeper::new().sweep(&path, 6).unwrap();
        for (i, sample) in path.iter().enumerate() {
            for j in 0..6 {
                let p = Vec3::from_array(mesh.positions[i * 6 + j]);
                let offset = p - sample.position;
                assert!(offset.dot(Vec3::Y).abs() < 1e-5);
                assert!((offset.length() - sample.radius).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_radius_floor() {
        let path = [PathSample::new(Vec3::ZERO, 1.0), PathSample::new(Vec3::Y, 0.0)];
        let mesh = TubeMeshSweeper::new().sweep(&path, 4).unwrap();
        let tip = Vec3::from_array(mesh.positions[4]) - Vec3::Y;
        assert!((tip.length() - 0.02).abs() < 1e-5);
    }

    #[test]
    fn test_faces_point_outward() {
        let path = [
            PathSample::new(Vec3::ZERO, 0.3),
            PathSample::new(Vec3::new(0.2, 1.0, 0.1), 0.25),
            PathSample::new(Vec3::new(0.1, 2.0, 0.5), 0.2),
        ];
        let mesh = TubeMeshSweeper::new().sweep(&path, 8).unwrap();
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| Vec3::from_array(mesh.positions[tri[k] as usize]));
            let face = (b - a).cross(c - a);
            let ring = tri[0] as usize / 8;
            let axis = Vec3::from_array(mesh.positions[tri[0] as usize]) - path[ring].position;
            assert!(face.dot(axis) > 0.0);
        }
    }

    #[test]
    fn test_vertical_tangent_uses_alternate_up() {
        // Straight up: the Y reference is parallel, so the frame must switch
        let mesh = TubeMeshSweeper::new().sweep(&straight(2), 8).unwrap();
        assert!(mesh.normals.iter().flatten().all(|v| v.is_finite()));
        let n = Vec3::from_array(mesh.normals[0]);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_bent_path_does_not_twist() {
        let path = [
            PathSample::new(Vec3::ZERO, 0.3),
            PathSample::new(Vec3::new(0.2, 1.0, 0.1), 0.25),
            PathSample::new(Vec3::new(0.1, 2.0, 0.5), 0.2),
        ];
        let mesh = TubeMeshSweeper::new().sweep(&path, 8).unwrap();
        // Matching vertices on neighbouring rings stay on the same side
        for i in 0..2 {
            for j in 0..8 {
                let a = Vec3::from_array(mesh.normals[i * 8 + j]);
                let b = Vec3::from_array(mesh.normals[(i + 1) * 8 + j]);
                assert!(a.dot(b) > 0.8, "ring {i} vertex {j} twisted");
            }
        }
    }

    #[test]
    fn test_subdivide_path_interpolates() {
        let path = [PathSample::new(Vec3::ZERO, 1.0), PathSample::new(Vec3::Y * 2.0, 0.5)];
        let out = subdivide_path(&path, 4);
        assert_eq!(out.len(), 5);
        assert_eq!(out[2].position, Vec3::Y);
        assert!((out[2].radius - 0.75).abs() < 1e-6);
        assert_eq!(out[4], path[1]);
        assert_eq!(subdivide_path(&path, 1), path.to_vec());
    }

    #[test]
    fn test_sweep_is_deterministic() {
        let sweeper = TubeMeshSweeper::new();
        assert_eq!(sweeper.sweep(&straight(4), 5).unwrap(), sweeper.sweep(&straight(4), 5).unwrap());
    }
}
