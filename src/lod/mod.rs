//! Adaptive tessellation for branch tubes
//!
//! Each branch gets a composite geometric-error score from four metrics
//! (screen size, curvature, distance, motion), bucketed into one of four
//! tiers. A tier fixes how many vertices go around each ring and how many
//! ring spans are interpolated per skeleton segment.
//!
//! The controller remembers the tier last assigned to every branch and
//! flags regeneration only when it changes, so unchanged branches are never
//! re-tessellated.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::procgen::skeleton::{BranchPath, BranchId, Skeleton};

/// Tessellation quality level, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LodTier {
    Ultra,
    #[default]
    High,
    Medium,
    Low,
}

impl LodTier {
    pub const ALL: [LodTier; 4] = [LodTier::Ultra, LodTier::High, LodTier::Medium, LodTier::Low];

    /// `(ring_segments, radial_segments)` for this tier
    ///
    /// # Examples
    /// ```
    /// use arbor::lod::LodTier;
    ///
    /// assert_eq!(LodTier::Ultra.segments(), (16, 4));
    /// assert_eq!(LodTier::Low.segments(), (5, 1));
    /// ```
    pub fn segments(self) -> (usize, usize) {
        match self {
            LodTier::Ultra => (16, 4),
            LodTier::High => (12, 3),
            LodTier::Medium => (8, 2),
            LodTier::Low => (5, 1),
        }
    }

    pub fn ring_segments(self) -> usize {
        self.segments().0
    }

    pub fn radial_segments(self) -> usize {
        self.segments().1
    }
}

/// Per-branch inputs to the error metric, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchMetrics {
    /// Projected size as a fraction of screen height
    pub screen_size: f32,
    /// Mean direction change between neighbouring path samples
    pub curvature: f32,
    /// Closeness to the viewer (1 at the viewer, 0 at the far plane)
    pub distance: f32,
    /// Motion activity
    pub motion: f32,
}

impl BranchMetrics {
    fn clamped(&self) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            screen_size: c(self.screen_size),
            curvature: c(self.curvature),
            distance: c(self.distance),
            motion: c(self.motion),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricWeights {
    pub screen_size: f32,
    pub curvature: f32,
    pub distance: f32,
    pub motion: f32,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            screen_size: 0.4,
            curvature: 0.3,
            distance: 0.2,
            motion: 0.1,
        }
    }
}

/// Where the branches are seen from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewer {
    pub position: Vec3,
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Motion activity applied to every branch (wind, animation)
    pub motion: f32,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 10.0),
            fov_y_degrees: 60.0,
            near: 1.0,
            far: 200.0,
            motion: 0.0,
        }
    }
}

/// Metric weights, tier thresholds and the tier used without a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    pub weights: MetricWeights,
    /// Minimum composite error for ultra, high and medium (descending)
    pub thresholds: [f32; 3],
    pub default_tier: LodTier,
    /// When set, every branch is scored from this viewpoint
    pub viewer: Option<Viewer>,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            weights: MetricWeights::default(),
            thresholds: [0.75, 0.5, 0.25],
            default_tier: LodTier::default(),
            viewer: None,
        }
    }
}

impl TessellationConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        if [w.screen_size, w.curvature, w.distance, w.motion]
            .iter()
            .any(|&v| !v.is_finite() || v < 0.0)
        {
            return Err(Error::invalid("tessellation weights must be finite and non-negative"));
        }
        let [a, b, c] = self.thresholds;
        if !(a.is_finite() && a >= b && b >= c && c.is_finite()) {
            return Err(Error::invalid(format!(
                "tier thresholds must be descending, got {:?}",
                self.thresholds
            )));
        }
        if let Some(viewer) = &self.viewer {
            if !(viewer.near >= 0.0 && viewer.far > viewer.near) {
                return Err(Error::invalid("viewer far plane must lie beyond near plane"));
            }
            if !(viewer.fov_y_degrees > 0.0 && viewer.fov_y_degrees < 180.0) {
                return Err(Error::invalid("viewer fov must be in (0, 180) degrees"));
            }
        }
        Ok(())
    }
}

/// Weighted sum of the clamped metrics
pub fn composite_error(weights: &MetricWeights, metrics: &BranchMetrics) -> f32 {
    let m = metrics.clamped();
    weights.screen_size * m.screen_size
        + weights.curvature * m.curvature
        + weights.distance * m.distance
        + weights.motion * m.motion
}

/// Bucket a branch into a tier. Pure: no state, no time dependence.
///
/// # Examples
/// ```
/// use arbor::lod::{select_tier, BranchMetrics, LodTier, TessellationConfig};
///
/// let config = TessellationConfig::default();
/// let near = BranchMetrics { screen_size: 1.0, curvature: 1.0, distance: 1.0, motion: 1.0 };
/// assert_eq!(select_tier(&config, &near), LodTier::Ultra);
/// assert_eq!(select_tier(&config, &BranchMetrics::default()), LodTier::Low);
/// ```
pub fn select_tier(config: &TessellationConfig, metrics: &BranchMetrics) -> LodTier {
    let error = composite_error(&config.weights, metrics);
    let [ultra, high, medium] = config.thresholds;
    if error >= ultra {
        LodTier::Ultra
    } else if error >= high {
        LodTier::High
    } else if error >= medium {
        LodTier::Medium
    } else {
        LodTier::Low
    }
}

/// Fraction of screen height covered by a sphere of `radius` at `distance`
pub fn projected_size(radius: f32, distance: f32, fov_y_radians: f32) -> f32 {
    if distance <= radius {
        return 1.0;
    }
    let half_height = distance * (fov_y_radians * 0.5).tan();
    if !(half_height > 0.0) {
        return 0.0;
    }
    (radius / half_height).clamp(0.0, 1.0)
}

/// Closeness factor: 1 at or inside `near`, falling linearly to 0 at `far`
///
/// # Examples
/// ```
/// use arbor::lod::distance_factor;
///
/// assert_eq!(distance_factor(0.5, 1.0, 11.0), 1.0);
/// assert_eq!(distance_factor(6.0, 1.0, 11.0), 0.5);
/// assert_eq!(distance_factor(50.0, 1.0, 11.0), 0.0);
/// ```
pub fn distance_factor(distance: f32, near: f32, far: f32) -> f32 {
    if far <= near {
        return if distance <= near { 1.0 } else { 0.0 };
    }
    1.0 - ((distance - near) / (far - near)).clamp(0.0, 1.0)
}

/// Mean angle between consecutive path directions, normalized by π
pub fn curvature_estimate(points: &[Vec3]) -> f32 {
    let dirs: Vec<Vec3> = points
        .windows(2)
        .filter_map(|w| (w[1] - w[0]).try_normalize())
        .collect();
    if dirs.len() < 2 {
        return 0.0;
    }
    let total: f32 = dirs
        .windows(2)
        .map(|d| d[0].dot(d[1]).clamp(-1.0, 1.0).acos())
        .sum();
    total / (dirs.len() - 1) as f32 / std::f32::consts::PI
}

/// Score one branch path from a viewpoint
pub fn metrics_for_path(skeleton: &Skeleton, path: &BranchPath, viewer: &Viewer) -> BranchMetrics {
    let segments = skeleton.segments();
    let mut points: Vec<Vec3> = path.segments.iter().map(|&i| segments[i].start).collect();
    if let Some(&last) = path.segments.last() {
        points.push(segments[last].end);
    }
    let center = points.iter().copied().sum::<Vec3>() / points.len().max(1) as f32;
    let extent = points.iter().map(|p| p.distance(center)).fold(0.0, f32::max);
    let radius = path
        .segments
        .iter()
        .map(|&i| segments[i].radius)
        .fold(0.0, f32::max);
    let distance = viewer.position.distance(center);

    BranchMetrics {
        screen_size: projected_size(extent + radius, distance, viewer.fov_y_degrees.to_radians()),
        curvature: curvature_estimate(&points),
        distance: distance_factor(distance, viewer.near, viewer.far),
        motion: viewer.motion,
    }
}

/// Outcome of evaluating one branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierUpdate {
    pub tier: LodTier,
    pub previous: Option<LodTier>,
    /// Tier differs from the last assigned one (or none was assigned)
    pub needs_regeneration: bool,
}

/// Per-branch tiers handed to the mesh assembler
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TessellationPlan {
    pub default_tier: LodTier,
    pub tiers: BTreeMap<BranchId, LodTier>,
}

impl TessellationPlan {
    /// Every branch at one tier
    pub fn uniform(tier: LodTier) -> Self {
        Self { default_tier: tier, tiers: BTreeMap::new() }
    }

    pub fn tier_for(&self, branch: BranchId) -> LodTier {
        self.tiers.get(&branch).copied().unwrap_or(self.default_tier)
    }

    /// Branch count per tier, best first
    pub fn histogram(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for tier in self.tiers.values() {
            counts[*tier as usize] += 1;
        }
        counts
    }
}

/// Tracks assigned tiers across evaluations
pub struct AdaptiveTessellationController {
    config: TessellationConfig,
    assigned: HashMap<BranchId, LodTier>,
}

impl AdaptiveTessellationController {
    pub fn new(config: TessellationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, assigned: HashMap::new() })
    }

    pub fn config(&self) -> &TessellationConfig {
        &self.config
    }

    pub fn select_tier(&self, metrics: &BranchMetrics) -> LodTier {
        select_tier(&self.config, metrics)
    }

    /// Score a branch and record its tier
    pub fn evaluate(&mut self, branch: BranchId, metrics: &BranchMetrics) -> TierUpdate {
        let tier = self.select_tier(metrics);
        let previous = self.assigned.insert(branch, tier);
        TierUpdate {
            tier,
            previous,
            needs_regeneration: previous != Some(tier),
        }
    }

    /// Evaluate every branch of a skeleton from the configured viewer.
    /// Returns the branches whose tier changed. Without a viewer every
    /// branch takes the default tier.
    pub fn evaluate_skeleton(&mut self, skeleton: &Skeleton) -> Vec<BranchId> {
        let default_tier = self.config.default_tier;
        let mut changed = Vec::new();
        for path in skeleton.branch_paths() {
            let update = match self.config.viewer {
                Some(viewer) => {
                    let metrics = metrics_for_path(skeleton, &path, &viewer);
                    self.evaluate(path.branch, &metrics)
                }
                None => {
                    let previous = self.assigned.insert(path.branch, default_tier);
                    TierUpdate {
                        tier: default_tier,
                        previous,
                        needs_regeneration: previous != Some(default_tier),
                    }
                }
            };
            if update.needs_regeneration && !changed.contains(&path.branch) {
                changed.push(path.branch);
            }
        }
        log::debug!("Tessellation: {} of {} branches changed tier", changed.len(), self.assigned.len());
        changed
    }

    pub fn tier(&self, branch: BranchId) -> Option<LodTier> {
        self.assigned.get(&branch).copied()
    }

    /// Snapshot of the assigned tiers
    pub fn plan(&self) -> TessellationPlan {
        TessellationPlan {
            default_tier: self.config.default_tier,
            tiers: self.assigned.iter().map(|(&b, &t)| (b, t)).collect(),
        }
    }

    /// Forget a branch (e.g. after it was pruned)
    pub fn forget(&mut self, branch: BranchId) {
        self.assigned.remove(&branch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(v: f32) -> BranchMetrics {
        BranchMetrics { screen_size: v, curvature: v, distance: v, motion: v }
    }

    #[test]
    fn test_composite_uses_default_weights() {
        let w = MetricWeights::default();
        let m = BranchMetrics { screen_size: 1.0, curvature: 0.0, distance: 0.0, motion: 0.0 };
        assert!((composite_error(&w, &m) - 0.4).abs() < 1e-6);
        let m = BranchMetrics { screen_size: 0.0, curvature: 1.0, distance: 1.0, motion: 1.0 };
        assert!((composite_error(&w, &m) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_tier_buckets() {
        let config = TessellationConfig::default();
        assert_eq!(select_tier(&config, &metrics(0.8)), LodTier::Ultra);
        assert_eq!(select_tier(&config, &metrics(0.6)), LodTier::High);
        assert_eq!(select_tier(&config, &metrics(0.3)), LodTier::Medium);
        assert_eq!(select_tier(&config, &metrics(0.1)), LodTier::Low);
    }

    #[test]
    fn test_out_of_range_metrics_are_clamped() {
        let config = TessellationConfig::default();
        assert_eq!(select_tier(&config, &metrics(50.0)), LodTier::Ultra);
        assert_eq!(select_tier(&config, &metrics(-3.0)), LodTier::Low);
        assert_eq!(select_tier(&config, &metrics(f32::NAN)), LodTier::Low);
    }

    #[test]
    fn test_selection_is_pure() {
        let controller = AdaptiveTessellationController::new(TessellationConfig::default()).unwrap();
        let m = BranchMetrics { screen_size: 0.42, curvature: 0.7, distance: 0.13, motion: 0.9 };
        let first = controller.select_tier(&m);
        for _ in 0..100 {
            assert_eq!(controller.select_tier(&m), first);
        }
    }

    #[test]
    fn test_regeneration_only_on_tier_change() {
        let mut controller = AdaptiveTessellationController::new(TessellationConfig::default()).unwrap();
        let b = BranchId(3);

        let first = controller.evaluate(b, &metrics(0.6));
        assert!(first.needs_regeneration);
        assert_eq!(first.previous, None);

        // Same bucket, different values
        let same = controller.evaluate(b, &metrics(0.55));
        assert_eq!(same.tier, LodTier::High);
        assert!(!same.needs_regeneration);

        let changed = controller.evaluate(b, &metrics(0.1));
        assert_eq!(changed.previous, Some(LodTier::High));
        assert_eq!(changed.tier, LodTier::Low);
        assert!(changed.needs_regeneration);

        assert_eq!(controller.tier(b), Some(LodTier::Low));
        assert_eq!(controller.plan().tier_for(b), LodTier::Low);
        assert_eq!(controller.plan().tier_for(BranchId(99)), LodTier::High);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = TessellationConfig { thresholds: [0.2, 0.5, 0.7], ..Default::default() };
        assert!(AdaptiveTessellationController::new(config).is_err());
        let viewer = Viewer { near: 10.0, far: 5.0, ..Default::default() };
        let config = TessellationConfig { viewer: Some(viewer), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metric_helpers() {
        assert_eq!(curvature_estimate(&[Vec3::ZERO, Vec3::Y, Vec3::Y * 2.0]), 0.0);
        let right_angle = curvature_estimate(&[Vec3::ZERO, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)]);
        assert!((right_angle - 0.5).abs() < 1e-5);
        assert_eq!(curvature_estimate(&[Vec3::ZERO]), 0.0);

        let near = projected_size(1.0, 5.0, 60f32.to_radians());
        let far = projected_size(1.0, 50.0, 60f32.to_radians());
        assert!(near > far && far > 0.0);
        assert_eq!(projected_size(1.0, 0.5, 1.0), 1.0);
    }

    #[test]
    fn test_evaluate_skeleton_with_and_without_viewer() {
        let mut sk = Skeleton::new();
        let root = sk.push_segment(Vec3::ZERO, Vec3::Y, 0.2, BranchId(0), None).unwrap();
        sk.push_segment(Vec3::Y, Vec3::new(0.5, 1.5, 0.0), 0.1, BranchId(1), Some(root)).unwrap();

        let mut controller = AdaptiveTessellationController::new(TessellationConfig::default()).unwrap();
        assert_eq!(controller.evaluate_skeleton(&sk).len(), 2);
        assert!(controller.evaluate_skeleton(&sk).is_empty());
        assert_eq!(controller.plan().histogram(), [0, 2, 0, 0]);

        let close = Viewer { position: Vec3::new(0.0, 1.0, 1.5), ..Default::default() };
        let config = TessellationConfig { viewer: Some(close), ..Default::default() };
        let mut controller = AdaptiveTessellationController::new(config).unwrap();
        controller.evaluate_skeleton(&sk);
        let far_config = TessellationConfig {
            viewer: Some(Viewer { position: Vec3::new(0.0, 1.0, 190.0), ..Default::default() }),
            ..Default::default()
        };
        let mut far_controller = AdaptiveTessellationController::new(far_config).unwrap();
        far_controller.evaluate_skeleton(&sk);
        assert!(controller.plan().tier_for(BranchId(0)) <= far_controller.plan().tier_for(BranchId(0)));
        assert_eq!(far_controller.plan().tier_for(BranchId(0)), LodTier::Low);
    }
}
