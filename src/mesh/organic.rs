//! Metaball unions of simple primitives
//!
//! Used for one-off organic shapes like the root flare, where several
//! contributions are summed into one field and extracted together.

use glam::Vec3;

use super::Mesh;
use super::scalar_field::ScalarFieldVolume;
use crate::core::Result;
use crate::generation::config::GenerationLimits;
use crate::math::Aabb;
use crate::procgen::skeleton::Segment;

/// Field contribution. `radius` is the contribution radius, so a
/// full-strength primitive's 0.5 isosurface sits at half of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrganicPrimitive {
    Sphere { center: Vec3, radius: f32, strength: f32 },
    Capsule { start: Vec3, end: Vec3, radius: f32, strength: f32 },
}

impl OrganicPrimitive {
    fn bounds(&self) -> Aabb {
        match *self {
            OrganicPrimitive::Sphere { center, radius, .. } => {
                Aabb::from_center_half_extent(center, Vec3::splat(radius))
            }
            OrganicPrimitive::Capsule { start, end, radius, .. } => {
                Aabb::from_points([start, end]).padded(radius)
            }
        }
    }

    fn add_to(&self, field: &mut ScalarFieldVolume) {
        match *self {
            OrganicPrimitive::Sphere { center, radius, strength } => {
                field.add_sphere_weighted(center, radius, strength)
            }
            OrganicPrimitive::Capsule { start, end, radius, strength } => {
                field.add_cylinder_weighted(start, end, radius, strength)
            }
        }
    }
}

/// Sum `primitives` into one field fitted around them and extract the
/// `threshold` surface. An empty list gives an empty mesh.
pub fn blend_primitives(
    primitives: &[OrganicPrimitive],
    resolution: usize,
    threshold: f32,
    limits: &GenerationLimits,
) -> Result<Mesh> {
    let bounds = primitives
        .iter()
        .fold(Aabb::EMPTY, |acc, p| acc.merged(&p.bounds()));
    if primitives.is_empty() || bounds.is_empty() {
        return Ok(Mesh::new());
    }

    // One cell of margin so the surface closes inside the box
    let edge = bounds.size();
    let cell = edge / (resolution.max(2) - 1) as f32;
    let mut field = ScalarFieldVolume::new(resolution, bounds.center(), edge + cell * 2.0, limits)?;
    for primitive in primitives {
        primitive.add_to(&mut field);
    }
    field.extract_isosurface(threshold)
}

/// Flared trunk base: a capsule up the lower part of the root segment
/// plus a wider sphere at its foot.
pub fn root_flare_primitives(root: &Segment, flare: f32) -> Vec<OrganicPrimitive> {
    let flare_radius = root.radius * flare;
    let flare_top = root.start + (root.end - root.start) * 0.3;
    vec![
        OrganicPrimitive::Capsule {
            start: root.start,
            end: flare_top,
            radius: root.radius * 2.0,
            strength: 1.0,
        },
        OrganicPrimitive::Sphere {
            center: root.start,
            radius: flare_radius * 2.0,
            strength: 1.0,
        },
    ]
}
