//! Synthetic polyline generator for stress testing and benchmarking.
//!
//! Generates sets of gently winding lines with narrow spikes injected at
//! known vertices, providing ground truth for validating detection and
//! correction.
//!
//! Feature-gated behind `synthetic` — not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use despike::synthetic::SyntheticScenario;
//!
//! let scenario = SyntheticScenario {
//!     line_count: 10,
//!     vertices_per_line: 200,
//!     ..SyntheticScenario::default()
//! };
//!
//! let dataset = scenario.generate();
//! assert_eq!(dataset.lines.len(), 10);
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Point2D, Polyline};

// ============================================================================
// Types
// ============================================================================

/// Scenario configuration for generating synthetic line networks.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Lower-left start of the first line.
    pub origin: Point2D,
    /// Number of independent lines.
    pub line_count: usize,
    /// Regular vertices per line, spike tips not included.
    pub vertices_per_line: usize,
    /// Distance between consecutive regular vertices, in map units.
    pub segment_length: f64,
    /// Probability (0.0-1.0) that a regular vertex is followed by a spike.
    pub spike_probability: f64,
    /// Distance from the line to a spike tip, in map units.
    pub spike_depth: f64,
    /// Maximum heading change per step in radians.
    pub max_turn: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            origin: Point2D::new(0.0, 0.0),
            line_count: 20,
            vertices_per_line: 500,
            segment_length: 5.0,
            spike_probability: 0.02,
            spike_depth: 20.0,
            max_turn: 0.1,
            seed: 42,
        }
    }
}

/// An injected spike, for ground truth validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedSpike {
    /// Index of the line in [`SyntheticDataset::lines`].
    pub line: usize,
    /// Vertex index of the tip within the line.
    pub index: usize,
    pub tip: Point2D,
}

/// A generated line network with ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    pub lines: Vec<Polyline>,
    pub spikes: Vec<InjectedSpike>,
    /// Total vertices across all lines.
    pub total_points: usize,
}

// ============================================================================
// Generation
// ============================================================================

/// Absolute heading bound, keeping every line inside its row.
const MAX_HEADING: f64 = 0.3;

impl SyntheticScenario {
    /// Vertical distance between line rows, wide enough that rows never touch.
    fn row_spacing(&self) -> f64 {
        let length = self.segment_length * self.vertices_per_line as f64;
        2.0 * (self.spike_depth + length * MAX_HEADING.sin()) + 10.0
    }

    /// Generate the line network for this scenario.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let row_spacing = self.row_spacing();

        let mut lines = Vec::with_capacity(self.line_count);
        let mut spikes = Vec::new();

        for line_idx in 0..self.line_count {
            let start = Point2D::new(
                self.origin.x,
                self.origin.y + row_spacing * line_idx as f64,
            );
            let points = self.generate_line(start, line_idx, &mut rng, &mut spikes);
            if let Some(polyline) = Polyline::single(points) {
                lines.push(polyline);
            }
        }

        let total_points = lines.iter().map(Polyline::point_count).sum();
        SyntheticDataset {
            lines,
            spikes,
            total_points,
        }
    }

    fn generate_line(
        &self,
        start: Point2D,
        line_idx: usize,
        rng: &mut StdRng,
        spikes: &mut Vec<InjectedSpike>,
    ) -> Vec<Point2D> {
        let mut points = Vec::with_capacity(self.vertices_per_line + 8);
        let mut heading = 0.0f64;
        let mut current = start;
        let mut last_spike = 0;
        points.push(current);

        for i in 1..self.vertices_per_line {
            // Spikes need a regular vertex on both sides, and adjacent tips
            // would make the vertex between them a spike too
            let spiky = i > 1
                && i > last_spike + 1
                && i + 1 < self.vertices_per_line
                && rng.gen_range(0.0..1.0) < self.spike_probability;
            if spiky {
                last_spike = i;
                let side = if rng.gen_range(0.0..1.0) < 0.5 { 1.0 } else { -1.0 };
                let normal = heading + side * std::f64::consts::FRAC_PI_2;
                let tip = Point2D::new(
                    current.x + self.spike_depth * normal.cos(),
                    current.y + self.spike_depth * normal.sin(),
                );
                spikes.push(InjectedSpike {
                    line: line_idx,
                    index: points.len(),
                    tip,
                });
                points.push(tip);
            }

            let turn = if self.max_turn > 0.0 {
                rng.gen_range(-self.max_turn..self.max_turn)
            } else {
                0.0
            };
            heading = (heading + turn).clamp(-MAX_HEADING, MAX_HEADING);
            current = Point2D::new(
                current.x + self.segment_length * heading.cos(),
                current.y + self.segment_length * heading.sin(),
            );
            points.push(current);
        }

        points
    }
}
