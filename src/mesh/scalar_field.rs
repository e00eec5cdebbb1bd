//! Dense scalar field over a box, with metaball-style primitive accumulation
//! and marching-cubes isosurface extraction.
//!
//! Contributions are additive: `strength · 2 · (1 − d/r)²` for every sample
//! within `r` of the primitive. [`ScalarFieldVolume::fill`] is the only way
//! to reset values. A volume is scratch space for one extraction at a time;
//! concurrent blends each allocate their own.

use std::collections::HashMap;

use glam::Vec3;

use super::Mesh;
use super::mc_tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};
use crate::core::{Error, Result, is_finite_vec};
use crate::generation::config::GenerationLimits;
use crate::math::Aabb;

/// Distance from `p` to the segment `a`-`b`
#[inline]
pub fn distance_to_segment(p: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

/// Metaball falloff shared by every primitive
#[inline]
fn falloff(distance: f32, radius: f32) -> f32 {
    let k = 1.0 - distance / radius;
    k * k * 2.0
}

/// Regular grid of `resolution³` density samples spanning `size` around `center`
#[derive(Debug, Clone)]
pub struct ScalarFieldVolume {
    resolution: usize,
    center: Vec3,
    size: Vec3,
    data: Vec<f32>,
}

impl ScalarFieldVolume {
    /// Allocate a zeroed field.
    ///
    /// Fails with `InvalidParameter` for resolution < 2 or a non-positive box,
    /// and with `ResourceExhaustion` when the allocation exceeds
    /// `limits.scalar_field_budget_bytes` (checked before allocating).
    pub fn new(resolution: usize, center: Vec3, size: Vec3, limits: &GenerationLimits) -> Result<Self> {
        if resolution < 2 {
            return Err(Error::invalid(format!("resolution must be >= 2, got {resolution}")));
        }
        if !is_finite_vec(center) {
            return Err(Error::invalid("field center must be finite"));
        }
        if !is_finite_vec(size) || size.min_element() <= 0.0 {
            return Err(Error::invalid(format!("field size must be positive, got {size:?}")));
        }

        let budget = limits.scalar_field_budget_bytes;
        let requested = resolution
            .checked_pow(3)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .unwrap_or(usize::MAX);
        if requested > budget {
            return Err(Error::ResourceExhaustion { requested, budget });
        }

        Ok(Self {
            resolution,
            center,
            size,
            data: vec![0.0; resolution * resolution * resolution],
        })
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.center, self.size * 0.5)
    }

    /// Distance between neighbouring samples on each axis
    pub fn spacing(&self) -> Vec3 {
        self.size / (self.resolution - 1) as f32
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.resolution + z * self.resolution * self.resolution
    }

    /// World position of grid sample (x, y, z)
    #[inline]
    pub fn sample_position(&self, x: usize, y: usize, z: usize) -> Vec3 {
        self.bounds().min + Vec3::new(x as f32, y as f32, z as f32) * self.spacing()
    }

    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Overwrite every sample with `value`
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Inclusive sample index range covering `region`, or None if outside the grid
    fn sample_range(&self, region: Aabb) -> Option<([usize; 3], [usize; 3])> {
        let min = self.bounds().min;
        let spacing = self.spacing();
        let max_index = (self.resolution - 1) as f32;
        let lo = ((region.min - min) / spacing).floor().max(Vec3::ZERO);
        let hi = ((region.max - min) / spacing).ceil().min(Vec3::splat(max_index));
        if lo.x > hi.x || lo.y > hi.y || lo.z > hi.z {
            return None;
        }
        Some((
            [lo.x as usize, lo.y as usize, lo.z as usize],
            [hi.x as usize, hi.y as usize, hi.z as usize],
        ))
    }

    /// Add a contribution around an arbitrary distance function
    fn accumulate(&mut self, region: Aabb, radius: f32, strength: f32, distance: impl Fn(Vec3) -> f32) {
        let Some((lo, hi)) = self.sample_range(region) else {
            return;
        };
        for z in lo[2]..=hi[2] {
            for y in lo[1]..=hi[1] {
                for x in lo[0]..=hi[0] {
                    let d = distance(self.sample_position(x, y, z));
                    if d < radius {
                        let i = self.index(x, y, z);
                        self.data[i] += strength * falloff(d, radius);
                    }
                }
            }
        }
    }

    fn primitive_ok(radius: f32, strength: f32, points: &[Vec3]) -> bool {
        radius.is_finite() && radius > 0.0 && strength.is_finite() && points.iter().all(|&p| is_finite_vec(p))
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32) {
        self.add_sphere_weighted(center, radius, 1.0);
    }

    /// Sphere contribution scaled by `strength`. Invalid primitives are skipped.
    pub fn add_sphere_weighted(&mut self, center: Vec3, radius: f32, strength: f32) {
        if !Self::primitive_ok(radius, strength, &[center]) {
            log::warn!("Skipping degenerate sphere at {:?} (r={})", center, radius);
            return;
        }
        let region = Aabb::from_center_half_extent(center, Vec3::splat(radius));
        self.accumulate(region, radius, strength, |p| (p - center).length());
    }

    pub fn add_cylinder(&mut self, start: Vec3, end: Vec3, radius: f32) {
        self.add_cylinder_weighted(start, end, radius, 1.0);
    }

    /// Capsule contribution (point-to-segment distance) scaled by `strength`
    pub fn add_cylinder_weighted(&mut self, start: Vec3, end: Vec3, radius: f32, strength: f32) {
        if !Self::primitive_ok(radius, strength, &[start, end]) {
            log::warn!("Skipping degenerate cylinder {:?} -> {:?} (r={})", start, end, radius);
            return;
        }
        let region = Aabb::from_points([start, end]).padded(radius);
        self.accumulate(region, radius, strength, |p| distance_to_segment(p, start, end));
    }

    /// Central-difference gradient at a grid sample
    fn gradient(&self, x: usize, y: usize, z: usize) -> Vec3 {
        let last = self.resolution - 1;
        let axis = |lo: (usize, usize, usize), hi: (usize, usize, usize), steps: usize| {
            (self.value(hi.0, hi.1, hi.2) - self.value(lo.0, lo.1, lo.2)) / steps as f32
        };
        let (xl, xh) = (x.saturating_sub(1), (x + 1).min(last));
        let (yl, yh) = (y.saturating_sub(1), (y + 1).min(last));
        let (zl, zh) = (z.saturating_sub(1), (z + 1).min(last));
        let spacing = self.spacing();
        Vec3::new(
            axis((xl, y, z), (xh, y, z), xh - xl) / spacing.x,
            axis((x, yl, z), (x, yh, z), yh - yl) / spacing.y,
            axis((x, y, zl), (x, y, zh), zh - zl) / spacing.z,
        )
    }

    /// Extract the `threshold` isosurface with the marching-cubes case table.
    ///
    /// Vertices are shared between cells along grid edges, so the result is a
    /// connected indexed mesh. Normals point down the density gradient (out of
    /// the blob).
    pub fn extract_isosurface(&self, threshold: f32) -> Result<Mesh> {
        if !threshold.is_finite() {
            return Err(Error::invalid("isosurface threshold must be finite"));
        }

        let res = self.resolution;
        let mut mesh = Mesh::new();
        let mut edge_vertices: HashMap<(usize, usize), u32> = HashMap::new();
        let mut needs_fallback_normals = false;

        for z in 0..res - 1 {
            for y in 0..res - 1 {
                for x in 0..res - 1 {
                    let mut corners = [(0usize, 0usize, 0usize); 8];
                    let mut values = [0.0f32; 8];
                    let mut case = 0usize;
                    for (i, off) in CORNER_OFFSETS.iter().enumerate() {
                        corners[i] = (x + off[0], y + off[1], z + off[2]);
                        values[i] = self.value(corners[i].0, corners[i].1, corners[i].2);
                        if values[i] > threshold {
                            case |= 1 << i;
                        }
                    }
                    if EDGE_TABLE[case] == 0 {
                        continue;
                    }

                    let mut cell_vertices = [u32::MAX; 12];
                    for (e, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
                        if EDGE_TABLE[case] & (1 << e) == 0 {
                            continue;
                        }
                        let (ca, cb) = (corners[a], corners[b]);
                        let ia = self.index(ca.0, ca.1, ca.2);
                        let ib = self.index(cb.0, cb.1, cb.2);
                        let key = (ia.min(ib), ia.max(ib));

                        let vertex = *edge_vertices.entry(key).or_insert_with(|| {
                            let (va, vb) = (values[a], values[b]);
                            let t = ((threshold - va) / (vb - va)).clamp(0.0, 1.0);
                            let pa = self.sample_position(ca.0, ca.1, ca.2);
                            let pb = self.sample_position(cb.0, cb.1, cb.2);
                            let ga = self.gradient(ca.0, ca.1, ca.2);
                            let gb = self.gradient(cb.0, cb.1, cb.2);
                            let normal = -(ga + (gb - ga) * t);
                            let normal = match normal.try_normalize() {
                                Some(n) => n,
                                None => {
                                    needs_fallback_normals = true;
                                    Vec3::ZERO
                                }
                            };
                            mesh.push_vertex(pa + (pb - pa) * t, normal)
                        });
                        cell_vertices[e] = vertex;
                    }

                    for tri in TRI_TABLE[case].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        mesh.push_triangle(
                            cell_vertices[tri[0] as usize],
                            cell_vertices[tri[1] as usize],
                            cell_vertices[tri[2] as usize],
                        );
                    }
                }
            }
        }

        if needs_fallback_normals {
            // Flat gradients (e.g. the falloff plateau) fall back to face normals
            let gradient_normals = mesh.normals.clone();
            mesh.recompute_normals();
            for (n, g) in mesh.normals.iter_mut().zip(gradient_normals) {
                if g != [0.0, 0.0, 0.0] {
                    *n = g;
                }
            }
        }

        log::debug!(
            "Isosurface at {}: {} vertices, {} triangles ({}³ grid)",
            threshold,
            mesh.vertex_count(),
            mesh.triangle_count(),
            res
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn limits() -> GenerationLimits {
        GenerationLimits::default()
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            ScalarFieldVolume::new(1, Vec3::ZERO, Vec3::ONE, &limits()),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            ScalarFieldVolume::new(8, Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0), &limits()),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            ScalarFieldVolume::new(8, Vec3::ZERO, Vec3::new(1.0, -1.0, 1.0), &limits()),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_budget_checked_before_allocation() {
        let tight = GenerationLimits { scalar_field_budget_bytes: 1024, ..limits() };
        match ScalarFieldVolume::new(16, Vec3::ZERO, Vec3::ONE, &tight) {
            Err(Error::ResourceExhaustion { requested, budget }) => {
                assert_eq!(requested, 16 * 16 * 16 * 4);
                assert_eq!(budget, 1024);
            }
            other => panic!("expected resource exhaustion, got {other:?}"),
        }
        assert!(matches!(
            ScalarFieldVolume::new(usize::MAX / 2, Vec3::ZERO, Vec3::ONE, &limits()),
            Err(Error::ResourceExhaustion { .. })
        ));
    }

    #[test]
    fn test_sphere_contribution_is_additive() {
        let mut field = ScalarFieldVolume::new(9, Vec3::ZERO, Vec3::splat(2.0), &limits()).unwrap();
        field.add_sphere(Vec3::ZERO, 1.0);
        let center = field.value(4, 4, 4);
        assert!((center - 2.0).abs() < 1e-5);

        field.add_sphere(Vec3::ZERO, 1.0);
        assert!((field.value(4, 4, 4) - 4.0).abs() < 1e-5);
        // Corner sample is outside the radius
        assert_eq!(field.value(0, 0, 0), 0.0);

        field.fill(0.25);
        assert!(field.values().iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_cylinder_uses_segment_distance() {
        let mut field = ScalarFieldVolume::new(9, Vec3::ZERO, Vec3::splat(2.0), &limits()).unwrap();
        field.add_cylinder(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 0.5);
        // Every sample on the axis is at full strength
        for x in 0..9 {
            assert!((field.value(x, 4, 4) - 2.0).abs() < 1e-5);
        }
        // Half a radius off the axis: (1 - 0.5)^2 * 2
        assert!((field.value(4, 5, 4) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_primitives_skipped() {
        let mut field = ScalarFieldVolume::new(4, Vec3::ZERO, Vec3::ONE, &limits()).unwrap();
        field.add_sphere(Vec3::ZERO, 0.0);
        field.add_sphere(Vec3::new(f32::NAN, 0.0, 0.0), 1.0);
        field.add_cylinder(Vec3::ZERO, Vec3::X, -1.0);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_field_extracts_nothing() {
        let field = ScalarFieldVolume::new(8, Vec3::ZERO, Vec3::ONE, &limits()).unwrap();
        let mesh = field.extract_isosurface(0.5).unwrap();
        assert_eq!(mesh.triangle_count(), 0);
        assert!(field.extract_isosurface(f32::NAN).is_err());
    }

    /// Isosurface radius of one full-strength contribution at `threshold`
    fn iso_radius(radius: f32, threshold: f32) -> f32 {
        radius * (1.0 - (threshold / 2.0).sqrt())
    }

    #[test]
    fn test_sphere_volume_within_ten_percent() {
        for (resolution, threshold) in [(16, 0.5), (32, 0.5), (32, 0.02)] {
            let center = Vec3::new(0.5, 2.0, -1.0);
            let radius = 1.0;
            let mut field =
                ScalarFieldVolume::new(resolution, center, Vec3::splat(2.5), &limits()).unwrap();
            field.add_sphere(center, radius);
            let mesh = field.extract_isosurface(threshold).unwrap();

            let r = iso_radius(radius, threshold);
            let analytic = 4.0 / 3.0 * PI * r * r * r;
            let volume = mesh.enclosed_volume();
            let ratio = volume / analytic;
            assert!(
                (ratio - 1.0).abs() < 0.1,
                "res {resolution} threshold {threshold}: volume {volume} vs {analytic}"
            );
        }
    }

    #[test]
    fn test_sphere_surface_is_closed_and_outward() {
        let mut field = ScalarFieldVolume::new(16, Vec3::ZERO, Vec3::splat(2.5), &limits()).unwrap();
        field.add_sphere(Vec3::ZERO, 1.0);
        let mesh = field.extract_isosurface(0.5).unwrap();
        assert!(mesh.is_well_formed());

        // Every directed edge is matched by its reverse on a closed surface
        let mut edges: HashMap<(u32, u32), i32> = HashMap::new();
        for tri in mesh.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                *edges.entry((a, b)).or_default() += 1;
            }
        }
        for (&(a, b), &count) in &edges {
            assert_eq!(edges.get(&(b, a)), Some(&count), "open edge {a}-{b}");
        }

        // Normals point away from the center
        for (p, n) in mesh.positions.iter().zip(&mesh.normals) {
            assert!(Vec3::from_array(*p).dot(Vec3::from_array(*n)) > 0.0);
        }
    }

    #[test]
    fn test_two_spheres_blend_into_one_surface() {
        let mut field = ScalarFieldVolume::new(24, Vec3::ZERO, Vec3::new(4.0, 2.5, 2.5), &limits()).unwrap();
        field.add_sphere(Vec3::new(-0.6, 0.0, 0.0), 1.0);
        field.add_sphere(Vec3::new(0.6, 0.0, 0.0), 1.0);
        let mesh = field.extract_isosurface(0.5).unwrap();

        // The midpoint adds up from both primitives, so the neck is filled
        let single = 4.0 / 3.0 * PI * 0.5f32.powi(3);
        assert!(mesh.enclosed_volume() > 2.0 * single);
    }
}
