//! Index-based branch skeleton
//!
//! Segments live in a single arena and refer to each other by index:
//! a parent link plus an ordered child list. Children are always appended
//! after their parent, so a reverse scan of the arena visits every child
//! before its parent.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result, is_finite_vec};
use crate::math::Aabb;

/// Segments shorter than this are rejected as degenerate
pub const MIN_SEGMENT_LENGTH: f32 = 1e-5;

/// Identifier of a branch (a chain of segments grown by one turtle/tip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BranchId(pub u32);

/// A single tapered skeleton segment
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
    pub radius: f32,
    pub branch: BranchId,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Segment {
    pub fn length(&self) -> f32 {
        (self.end - self.start).length()
    }

    /// Unit direction from start to end (zero for a degenerate segment)
    pub fn direction(&self) -> Vec3 {
        (self.end - self.start).normalize_or_zero()
    }
}

/// An ordered chain of segments sharing one branch id
#[derive(Debug, Clone, PartialEq)]
pub struct BranchPath {
    pub branch: BranchId,
    pub segments: Vec<usize>,
}

/// Arena of segments forming one or more rooted trees
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    segments: Vec<Segment>,
    root: Option<usize>,
    next_branch: u32,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh branch id
    pub fn allocate_branch(&mut self) -> BranchId {
        let id = BranchId(self.next_branch);
        self.next_branch += 1;
        id
    }

    /// Append a segment, linking it under `parent`.
    ///
    /// Fails with `DegenerateGeometry` for non-finite positions, NaN or
    /// negative radius, or a segment shorter than [`MIN_SEGMENT_LENGTH`].
    /// Callers treat that as "skip this element".
    pub fn push_segment(
        &mut self,
        start: Vec3,
        end: Vec3,
        radius: f32,
        branch: BranchId,
        parent: Option<usize>,
    ) -> Result<usize> {
        if !is_finite_vec(start) || !is_finite_vec(end) {
            return Err(Error::DegenerateGeometry(format!(
                "non-finite segment {start:?} -> {end:?}"
            )));
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::DegenerateGeometry(format!("invalid radius {radius}")));
        }
        if (end - start).length() < MIN_SEGMENT_LENGTH {
            return Err(Error::DegenerateGeometry(format!(
                "zero-length segment at {start:?}"
            )));
        }
        if let Some(p) = parent {
            if p >= self.segments.len() {
                return Err(Error::invalid(format!(
                    "parent index {p} out of range ({} segments)",
                    self.segments.len()
                )));
            }
        }

        let index = self.segments.len();
        self.segments.push(Segment {
            start,
            end,
            radius,
            branch,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.segments[p].children.push(index),
            None => {
                if self.root.is_none() {
                    self.root = Some(index);
                }
            }
        }
        if branch.0 >= self.next_branch {
            self.next_branch = branch.0 + 1;
        }
        Ok(index)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First parentless segment
    pub fn root(&self) -> Option<usize> {
        self.root
    }

    /// Number of distinct branch ids handed out so far
    pub fn branch_count(&self) -> u32 {
        self.next_branch
    }

    /// Segments without children
    pub fn tips(&self) -> Vec<usize> {
        (0..self.segments.len())
            .filter(|&i| self.segments[i].children.is_empty())
            .collect()
    }

    /// Segments with more than one child
    pub fn junctions(&self) -> Vec<usize> {
        (0..self.segments.len())
            .filter(|&i| self.segments[i].children.len() > 1)
            .collect()
    }

    /// Depth of every segment (parentless segments are depth 0)
    pub fn depths(&self) -> Vec<u32> {
        let mut depths = vec![0u32; self.segments.len()];
        for i in 0..self.segments.len() {
            if let Some(p) = self.segments[i].parent {
                depths[i] = depths[p] + 1;
            }
        }
        depths
    }

    /// Number of tip segments in each segment's subtree
    pub fn leaf_counts(&self) -> Vec<u32> {
        let n = self.segments.len();
        let mut counts = vec![0u32; n];
        for i in (0..n).rev() {
            let seg = &self.segments[i];
            counts[i] = if seg.children.is_empty() {
                1
            } else {
                seg.children.iter().map(|&c| counts[c]).sum()
            };
        }
        counts
    }

    /// Child of `index` that continues the same branch, if any
    fn continuation(&self, index: usize) -> Option<usize> {
        let seg = &self.segments[index];
        seg.children
            .iter()
            .copied()
            .find(|&c| self.segments[c].branch == seg.branch)
    }

    /// Split the arena into ordered per-branch segment chains.
    ///
    /// A chain starts at a parentless segment, at a segment whose parent
    /// belongs to another branch, or at a same-branch child that is not its
    /// parent's first continuation. Every segment lands in exactly one chain.
    pub fn branch_paths(&self) -> Vec<BranchPath> {
        let mut paths = Vec::new();
        for i in 0..self.segments.len() {
            let is_start = match self.segments[i].parent {
                None => true,
                Some(p) => {
                    self.segments[p].branch != self.segments[i].branch
                        || self.continuation(p) != Some(i)
                }
            };
            if !is_start {
                continue;
            }

            let mut chain = vec![i];
            let mut current = i;
            while let Some(next) = self.continuation(current) {
                chain.push(next);
                current = next;
            }
            paths.push(BranchPath {
                branch: self.segments[i].branch,
                segments: chain,
            });
        }
        paths
    }

    /// Bounds of all segments padded by their radii
    pub fn bounds(&self) -> Aabb {
        self.segments.iter().fold(Aabb::EMPTY, |acc, seg| {
            let seg_box = Aabb::from_points([seg.start, seg.end]).padded(seg.radius);
            acc.merged(&seg_box)
        })
    }

    /// True when radius never grows from a segment to its same-branch child
    pub fn is_tapered(&self) -> bool {
        self.segments.iter().all(|seg| match seg.parent {
            Some(p) if self.segments[p].branch == seg.branch => {
                seg.radius <= self.segments[p].radius + 1e-6
            }
            _ => true,
        })
    }

    /// Recompute radii with the pipe model: a segment's cross-section is
    /// proportional to the number of tips it supports.
    pub fn apply_pipe_model(&mut self, base_radius: f32, min_radius: f32) {
        let counts = self.leaf_counts();
        let max_count = self
            .segments
            .iter()
            .zip(&counts)
            .filter(|(seg, _)| seg.parent.is_none())
            .map(|(_, &c)| c)
            .max()
            .unwrap_or(1)
            .max(1) as f32;

        for (seg, &count) in self.segments.iter_mut().zip(&counts) {
            seg.radius = (base_radius * (count as f32 / max_count).sqrt()).max(min_radius);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trunk of two segments with one side branch off the first
    fn small_tree() -> Skeleton {
        let mut sk = Skeleton::new();
        let trunk = sk.allocate_branch();
        let side = sk.allocate_branch();
        let a = sk.push_segment(Vec3::ZERO, Vec3::Y, 0.3, trunk, None).unwrap();
        sk.push_segment(Vec3::Y, Vec3::new(0.5, 1.5, 0.0), 0.1, side, Some(a)).unwrap();
        sk.push_segment(Vec3::Y, Vec3::new(0.0, 2.0, 0.0), 0.25, trunk, Some(a)).unwrap();
        sk
    }

    #[test]
    fn test_push_links_parent_and_child() {
        let sk = small_tree();
        assert_eq!(sk.len(), 3);
        assert_eq!(sk.root(), Some(0));
        assert_eq!(sk.segments()[0].children, vec![1, 2]);
        assert_eq!(sk.segments()[2].parent, Some(0));
    }

    #[test]
    fn test_degenerate_segments_rejected() {
        let mut sk = Skeleton::new();
        let b = sk.allocate_branch();
        assert!(matches!(
            sk.push_segment(Vec3::ZERO, Vec3::ZERO, 0.1, b, None),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(matches!(
            sk.push_segment(Vec3::ZERO, Vec3::new(f32::NAN, 0.0, 0.0), 0.1, b, None),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(matches!(
            sk.push_segment(Vec3::ZERO, Vec3::Y, -1.0, b, None),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(matches!(
            sk.push_segment(Vec3::ZERO, Vec3::Y, 0.1, b, Some(7)),
            Err(Error::InvalidParameter(_))
        ));
        assert!(sk.is_empty());
    }

    #[test]
    fn test_tips_and_junctions() {
        let sk = small_tree();
        assert_eq!(sk.tips(), vec![1, 2]);
        assert_eq!(sk.junctions(), vec![0]);
        assert_eq!(sk.depths(), vec![0, 1, 1]);
        assert_eq!(sk.leaf_counts(), vec![2, 1, 1]);
    }

    #[test]
    fn test_branch_paths_cover_every_segment_once() {
        let sk = small_tree();
        let paths = sk.branch_paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].segments, vec![0, 2]);
        assert_eq!(paths[1].segments, vec![1]);

        let mut seen: Vec<usize> = paths.iter().flat_map(|p| p.segments.clone()).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_pipe_model_tapers() {
        let mut sk = small_tree();
        sk.apply_pipe_model(0.4, 0.02);
        let r = |i: usize| sk.segments()[i].radius;
        assert!((r(0) - 0.4).abs() < 1e-6);
        assert!(r(1) < r(0));
        assert!((r(1) - r(2)).abs() < 1e-6);
        assert!(sk.is_tapered());
    }

    #[test]
    fn test_bounds_include_radius() {
        let sk = small_tree();
        let b = sk.bounds();
        assert!(b.min.x <= -0.3 + 1e-6);
        assert!(b.max.y >= 2.25 - 1e-6);
    }
}
