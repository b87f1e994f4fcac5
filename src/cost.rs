//! Transition cost between two tracks.
//!
//! Calculates how expensive it is to mix from one track into another based on
//! relationship strength, key compatibility, tempo and energy.
//!
//! ```text
//! cost(a, b) = strength_term        (1 - strength, or the synthetic penalty)
//!            + key_weight   * (1 - compatibility(a.key, b.key).score)
//!            + bpm_weight   * bpm_out_of_range(a, b)
//!            + energy_term  (excess over max change, or energy-flow bias)
//!            + cluster_term (different known clusters)
//! ```
//!
//! The strength term dominates: the largest key penalty is below the gap
//! between a weak and a strong connection, and the synthetic penalty sits above
//! the worst real-edge base plus key cost so real connections win when
//! available.

use crate::error::GraphError;
use crate::graph::{IndexedTrack, TrackGraph};
use crate::harmonic::{compatibility, CamelotKey, Compatibility};
use crate::model::{EnergyFlow, PathConstraints};
use std::collections::BTreeSet;

/// Fixed weights for the cost terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostWeights {
    pub strength: f64,
    /// Base cost of a hop with no real relationship. Must exceed `strength`
    /// plus the largest key penalty.
    pub synthetic_base: f64,
    pub key_preferred: f64,
    pub key_relaxed: f64,
    /// Per BPM outside the requested range.
    pub bpm_out_of_range: f64,
    pub energy_excess: f64,
    pub energy_flow: f64,
    pub cluster_change: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            strength: 1.0,
            synthetic_base: 2.0,
            key_preferred: 0.6,
            key_relaxed: 0.15,
            bpm_out_of_range: 0.02,
            energy_excess: 0.8,
            energy_flow: 0.1,
            cluster_change: 0.05,
        }
    }
}

/// Which kind of edge a hop travels over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeUse {
    Real { strength: f64, weight: f64 },
    Synthetic,
}

impl EdgeUse {
    #[must_use]
    pub fn strength(self) -> Option<f64> {
        match self {
            Self::Real { strength, .. } => Some(strength),
            Self::Synthetic => None,
        }
    }

    #[must_use]
    pub fn is_synthetic(self) -> bool {
        matches!(self, Self::Synthetic)
    }
}

/// A scored hop from one track to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub edge: EdgeUse,
    pub compatibility: Compatibility,
    pub cost: f64,
}

/// Why a track cannot be the target of a hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    BpmOutOfRange,
    KeyNotAllowed,
}

/// Hard filters and cost weights derived from one set of constraints.
#[derive(Debug, Clone)]
pub struct CostModel {
    weights: CostWeights,
    key_weight: f64,
    min_bpm: Option<f64>,
    max_bpm: Option<f64>,
    allowed_keys: Option<BTreeSet<CamelotKey>>,
    max_energy_change: Option<f64>,
    energy_flow: Option<EnergyFlow>,
}

impl CostModel {
    /// Validate constraints and derive the cost model.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConstraint`] for non-positive targets,
    /// negative tolerances or slack, inverted BPM ranges and unparseable
    /// allowed keys.
    pub fn new(constraints: &PathConstraints, weights: CostWeights) -> Result<Self, GraphError> {
        let invalid = |detail: String| GraphError::InvalidConstraint { detail };

        if !constraints.target_duration.is_finite() || constraints.target_duration <= 0.0 {
            return Err(invalid(format!(
                "target duration must be positive, got {} min",
                constraints.target_duration
            )));
        }
        if !constraints.tolerance.is_finite() || constraints.tolerance < 0.0 {
            return Err(invalid(format!(
                "tolerance must be non-negative, got {} min",
                constraints.tolerance
            )));
        }
        if !constraints.waypoint_slack.is_finite() || constraints.waypoint_slack < 0.0 {
            return Err(invalid(format!(
                "waypoint slack must be non-negative, got {} min",
                constraints.waypoint_slack
            )));
        }
        if let (Some(min), Some(max)) = (constraints.min_bpm, constraints.max_bpm) {
            if min > max {
                return Err(invalid(format!("minimum BPM {min} exceeds maximum BPM {max}")));
            }
        }
        if let Some(change) = constraints.max_energy_change {
            if !change.is_finite() || change < 0.0 {
                return Err(invalid(format!("max energy change must be non-negative, got {change}")));
            }
        }
        let allowed_keys = constraints
            .allowed_keys
            .as_ref()
            .map(|keys| {
                keys.iter()
                    .map(|raw| raw.parse::<CamelotKey>().map_err(|e| invalid(e.to_string())))
                    .collect::<Result<BTreeSet<_>, _>>()
            })
            .transpose()?;

        let key_weight = if constraints.prefer_key_matching {
            weights.key_preferred
        } else {
            weights.key_relaxed
        };

        Ok(Self {
            weights,
            key_weight,
            min_bpm: constraints.min_bpm,
            max_bpm: constraints.max_bpm,
            allowed_keys,
            max_energy_change: constraints.max_energy_change,
            energy_flow: constraints.energy_flow,
        })
    }

    #[must_use]
    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Hard filters applied to the target of every hop.
    ///
    /// Tracks without BPM or key data pass.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] that applies.
    pub fn admits(&self, track: &IndexedTrack<'_>) -> Result<(), Rejection> {
        if self.bpm_excess(track.track.bpm) > 0.0 {
            return Err(Rejection::BpmOutOfRange);
        }
        if let (Some(allowed), Some(key)) = (&self.allowed_keys, track.key) {
            if !allowed.contains(&key) {
                return Err(Rejection::KeyNotAllowed);
            }
        }
        Ok(())
    }

    /// Describe the BPM range for failure messages.
    #[must_use]
    pub fn bpm_range_label(&self) -> String {
        match (self.min_bpm, self.max_bpm) {
            (Some(min), Some(max)) => format!("[{min}, {max}] bpm"),
            (Some(min), None) => format!(">= {min} bpm"),
            (None, Some(max)) => format!("<= {max} bpm"),
            (None, None) => "any bpm".to_string(),
        }
    }

    fn bpm_excess(&self, bpm: Option<f64>) -> f64 {
        let Some(bpm) = bpm else {
            return 0.0;
        };
        let below = self.min_bpm.map_or(0.0, |min| (min - bpm).max(0.0));
        let above = self.max_bpm.map_or(0.0, |max| (bpm - max).max(0.0));
        below + above
    }

    fn energy_term(&self, from: Option<f64>, to: Option<f64>) -> f64 {
        let (Some(from), Some(to)) = (from, to) else {
            return 0.0;
        };
        let delta = to - from;
        if let Some(limit) = self.max_energy_change {
            return self.weights.energy_excess * (delta.abs() - limit).max(0.0);
        }
        let against_flow = match self.energy_flow {
            Some(EnergyFlow::Ascending) => (-delta).max(0.0),
            Some(EnergyFlow::Descending) => delta.max(0.0),
            Some(EnergyFlow::Flat) => delta.abs(),
            None => 0.0,
        };
        self.weights.energy_flow * against_flow
    }

    fn cluster_term(&self, from: &IndexedTrack<'_>, to: &IndexedTrack<'_>) -> f64 {
        match (&from.track.cluster, &to.track.cluster) {
            (Some(a), Some(b)) if a != b => self.weights.cluster_change,
            _ => 0.0,
        }
    }

    /// Score a hop given the edge it would travel over.
    #[must_use]
    pub fn score(&self, from: &IndexedTrack<'_>, to: &IndexedTrack<'_>, edge: EdgeUse) -> Transition {
        let base = match edge {
            EdgeUse::Real { strength, .. } => self.weights.strength * (1.0 - strength),
            EdgeUse::Synthetic => self.weights.synthetic_base,
        };
        let compatibility = compatibility(from.key, to.key);
        let key = self.key_weight * (1.0 - compatibility.score);
        let bpm = self.weights.bpm_out_of_range
            * (self.bpm_excess(from.track.bpm) + self.bpm_excess(to.track.bpm));
        let energy = self.energy_term(from.track.energy, to.track.energy);
        let cluster = self.cluster_term(from, to);

        Transition {
            edge,
            compatibility,
            cost: base + key + bpm + energy + cluster,
        }
    }

    /// Score the hop `from -> to`, synthesising an edge when none exists.
    #[must_use]
    pub fn transition(&self, graph: &TrackGraph<'_>, from: usize, to: usize) -> Transition {
        let edge = graph.edge_between(from, to).map_or(EdgeUse::Synthetic, |stats| EdgeUse::Real {
            strength: stats.strength,
            weight: stats.weight,
        });
        self.score(graph.track(from), graph.track(to), edge)
    }
}
