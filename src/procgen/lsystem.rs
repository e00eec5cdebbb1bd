//! L-system skeleton generation
//!
//! Two stages:
//! 1. [`LSystemGenerator::generate_string`] rewrites the axiom with the
//!    production rules. The length of every rewrite is computed before the
//!    new string is built, so a grammar that would exceed the ceiling fails
//!    with `GenerationOverflow` without allocating it.
//! 2. [`LSystemGenerator::interpret_string`] walks the string with a 3D turtle
//!    and emits one [`Segment`](super::skeleton::Segment) per drawing symbol.
//!
//! Turtle symbols:
//! - `F` draw forward, `f` move forward without drawing
//! - `+`/`-` yaw, `&`/`^` pitch, `\`/`/` roll, `|` turn around
//! - `[`/`]` push/pop turtle state, `!` thin the current radius
//!
//! Any other symbol is an inert variable used only for rewriting.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::skeleton::{BranchId, Skeleton};
use crate::core::{Error, Result, is_finite_vec};
use crate::generation::config::GenerationLimits;

/// Grammar and turtle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LSystemConfig {
    /// Starting string
    pub axiom: String,
    /// Production rules: symbol -> replacement
    pub rules: BTreeMap<char, String>,
    /// Number of rewrite passes
    pub iterations: u32,
    /// Turn angle in degrees
    pub angle_degrees: f32,
    /// Length of an `F` step at the trunk
    pub segment_length: f32,
    /// Length multiplier applied when entering a branch (`[`)
    pub length_decay: f32,
    /// Radius of the first trunk segment
    pub base_radius: f32,
    /// Radius multiplier applied when entering a branch (`[`) or on `!`
    pub radius_decay: f32,
    /// Radius multiplier applied after every `F` within a branch
    pub segment_taper: f32,
    /// Radius floor
    pub min_radius: f32,
    /// Growth bias direction (gravity, light)
    pub tropism: Vec3,
    /// How strongly each step bends toward `tropism`
    pub tropism_strength: f32,
    /// Amplitude of random angle and heading perturbation (radians)
    pub jitter: f32,
    /// Turtle start position
    pub origin: Vec3,
}

impl Default for LSystemConfig {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert('F', "FF+[+F-F-F]-[-F+F+F]".to_string());
        Self {
            axiom: "F".to_string(),
            rules,
            iterations: 2,
            angle_degrees: 25.0,
            segment_length: 0.5,
            length_decay: 0.8,
            base_radius: 0.2,
            radius_decay: 0.7,
            segment_taper: 0.97,
            min_radius: 0.01,
            tropism: Vec3::Y,
            tropism_strength: 0.05,
            jitter: 0.05,
            origin: Vec3::ZERO,
        }
    }
}

impl LSystemConfig {
    /// Check every parameter before any rewriting happens
    pub fn validate(&self, limits: &GenerationLimits) -> Result<()> {
        if self.axiom.is_empty() {
            return Err(Error::invalid("axiom must not be empty"));
        }
        if self.iterations as usize > limits.max_rewrite_iterations {
            return Err(Error::GenerationOverflow {
                what: "rewrite iterations",
                actual: self.iterations as usize,
                limit: limits.max_rewrite_iterations,
            });
        }
        let axiom_len = self.axiom.chars().count();
        if axiom_len > limits.max_string_length {
            return Err(Error::GenerationOverflow {
                what: "axiom length",
                actual: axiom_len,
                limit: limits.max_string_length,
            });
        }
        for (symbol, replacement) in &self.rules {
            if symbol.is_whitespace() || symbol.is_control() {
                return Err(Error::invalid(format!("rule symbol {symbol:?} is not printable")));
            }
            if replacement.chars().any(|c| c.is_control()) {
                return Err(Error::invalid(format!(
                    "rule for {symbol:?} contains control characters"
                )));
            }
        }

        let positive = [
            ("segment_length", self.segment_length),
            ("length_decay", self.length_decay),
            ("base_radius", self.base_radius),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::invalid(format!("{name} must be positive, got {value}")));
            }
        }
        let unit_interval = [
            ("radius_decay", self.radius_decay),
            ("segment_taper", self.segment_taper),
        ];
        for (name, value) in unit_interval {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(Error::invalid(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        let non_negative = [
            ("min_radius", self.min_radius),
            ("tropism_strength", self.tropism_strength),
            ("jitter", self.jitter),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid(format!("{name} must be >= 0, got {value}")));
            }
        }
        if self.min_radius > self.base_radius {
            return Err(Error::invalid("min_radius exceeds base_radius"));
        }
        if !self.angle_degrees.is_finite() {
            return Err(Error::invalid("angle_degrees must be finite"));
        }
        if !is_finite_vec(self.tropism) || !is_finite_vec(self.origin) {
            return Err(Error::invalid("tropism and origin must be finite"));
        }
        Ok(())
    }
}

/// Result of turtle interpretation
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub skeleton: Skeleton,
    /// `]` symbols seen with an empty stack (ignored)
    pub unbalanced_pops: usize,
    /// `F` steps dropped as degenerate geometry
    pub degenerate_skipped: usize,
    /// Stack depth left when the string ended
    pub final_stack_depth: usize,
    /// Deepest bracket nesting reached
    pub max_stack_depth: usize,
}

#[derive(Debug, Clone, Copy)]
struct TurtleState {
    position: Vec3,
    orientation: Quat,
    length: f32,
    radius: f32,
    branch: BranchId,
    last_segment: Option<usize>,
}

impl TurtleState {
    fn heading(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }
}

/// Uniform value in [-amplitude, amplitude]
fn symmetric(rng: &mut impl Rng, amplitude: f32) -> f32 {
    (rng.random::<f32>() * 2.0 - 1.0) * amplitude
}

/// Rewrites a grammar and walks the result into a [`Skeleton`]
#[derive(Debug, Clone)]
pub struct LSystemGenerator {
    config: LSystemConfig,
}

impl LSystemGenerator {
    /// Create a generator, validating the config against `limits`
    pub fn new(config: LSystemConfig, limits: &GenerationLimits) -> Result<Self> {
        config.validate(limits)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LSystemConfig {
        &self.config
    }

    /// Apply every rule to every symbol, `iterations` times.
    pub fn generate_string(&self, limits: &GenerationLimits) -> Result<String> {
        let rules: BTreeMap<char, (&str, usize)> = self
            .config
            .rules
            .iter()
            .map(|(&k, v)| (k, (v.as_str(), v.chars().count())))
            .collect();

        let mut current = self.config.axiom.clone();
        for iteration in 0..self.config.iterations {
            let next_len: usize = current
                .chars()
                .map(|c| rules.get(&c).map_or(1, |&(_, len)| len))
                .sum();
            if next_len > limits.max_string_length {
                return Err(Error::GenerationOverflow {
                    what: "grammar string length",
                    actual: next_len,
                    limit: limits.max_string_length,
                });
            }

            let mut next = String::with_capacity(next_len);
            for c in current.chars() {
                match rules.get(&c) {
                    Some(&(replacement, _)) => next.push_str(replacement),
                    None => next.push(c),
                }
            }
            log::debug!("L-system iteration {}: {} symbols", iteration + 1, next_len);
            current = next;
        }
        Ok(current)
    }

    /// Walk `symbols` with the turtle and build the skeleton.
    ///
    /// Randomness (angle jitter, heading perturbation) is drawn only from `rng`.
    pub fn interpret_string(&self, symbols: &str, rng: &mut impl Rng) -> Result<Interpretation> {
        let cfg = &self.config;
        let angle = cfg.angle_degrees.to_radians();
        let tropism = cfg.tropism.normalize_or_zero() * cfg.tropism_strength;

        let mut skeleton = Skeleton::new();
        let mut state = TurtleState {
            position: cfg.origin,
            orientation: Quat::IDENTITY,
            length: cfg.segment_length,
            radius: cfg.base_radius,
            branch: skeleton.allocate_branch(),
            last_segment: None,
        };
        let mut stack: Vec<TurtleState> = Vec::new();
        let mut unbalanced_pops = 0;
        let mut degenerate_skipped = 0;
        let mut max_stack_depth = 0;

        for symbol in symbols.chars() {
            match symbol {
                'F' => {
                    let heading = state.heading();
                    let noise = Vec3::new(
                        symmetric(rng, cfg.jitter),
                        symmetric(rng, cfg.jitter),
                        symmetric(rng, cfg.jitter),
                    );
                    let nudged = (heading + tropism + noise).normalize_or_zero();
                    if nudged != Vec3::ZERO && nudged.is_finite() {
                        state.orientation =
                            (Quat::from_rotation_arc(heading, nudged) * state.orientation).normalize();
                    }
                    let end = state.position + state.heading() * state.length;

                    match skeleton.push_segment(
                        state.position,
                        end,
                        state.radius,
                        state.branch,
                        state.last_segment,
                    ) {
                        Ok(index) => {
                            state.last_segment = Some(index);
                            state.position = end;
                            state.radius = (state.radius * cfg.segment_taper).max(cfg.min_radius);
                        }
                        Err(Error::DegenerateGeometry(msg)) => {
                            log::warn!("Skipping degenerate L-system segment: {}", msg);
                            degenerate_skipped += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
                'f' => {
                    let next = state.position + state.heading() * state.length;
                    if is_finite_vec(next) {
                        state.position = next;
                    }
                }
                '+' => state.orientation *= Quat::from_rotation_z(angle + symmetric(rng, cfg.jitter)),
                '-' => state.orientation *= Quat::from_rotation_z(-angle + symmetric(rng, cfg.jitter)),
                '&' => state.orientation *= Quat::from_rotation_x(angle + symmetric(rng, cfg.jitter)),
                '^' => state.orientation *= Quat::from_rotation_x(-angle + symmetric(rng, cfg.jitter)),
                '\\' => state.orientation *= Quat::from_rotation_y(angle + symmetric(rng, cfg.jitter)),
                '/' => state.orientation *= Quat::from_rotation_y(-angle + symmetric(rng, cfg.jitter)),
                '|' => state.orientation *= Quat::from_rotation_z(PI),
                '!' => state.radius = (state.radius * cfg.radius_decay).max(cfg.min_radius),
                '[' => {
                    stack.push(state);
                    max_stack_depth = max_stack_depth.max(stack.len());
                    state.length *= cfg.length_decay;
                    state.radius = (state.radius * cfg.radius_decay).max(cfg.min_radius);
                    state.branch = skeleton.allocate_branch();
                }
                ']' => match stack.pop() {
                    Some(saved) => state = saved,
                    None => {
                        log::warn!("Ignoring ']' with empty turtle stack");
                        unbalanced_pops += 1;
                    }
                },
                _ => {}
            }
        }

        if !stack.is_empty() {
            log::warn!("L-system string ended with {} unclosed '['", stack.len());
        }
        log::debug!(
            "Interpreted {} symbols into {} segments ({} branches)",
            symbols.chars().count(),
            skeleton.len(),
            skeleton.branch_count()
        );

        Ok(Interpretation {
            skeleton,
            unbalanced_pops,
            degenerate_skipped,
            final_stack_depth: stack.len(),
            max_stack_depth,
        })
    }

    /// Rewrite then interpret
    pub fn generate(&self, limits: &GenerationLimits, rng: &mut impl Rng) -> Result<(String, Interpretation)> {
        let symbols = self.generate_string(limits)?;
        let interpretation = self.interpret_string(&symbols, rng)?;
        Ok((symbols, interpretation))
    }
}
