//! # Data Model
//!
//! Input types describe the caller's library snapshot and planning request;
//! output types describe the computed set. Inputs use camelCase field names on
//! the wire, outputs use snake_case, matching the JSON produced and consumed by
//! the surrounding application.
//!
//! Nothing here is mutated by the engine. A [`GraphSnapshot`] is borrowed for
//! the duration of a call and indexed into a [`crate::graph::TrackGraph`].

use crate::harmonic::CompatibilityClass;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type TrackId = String;

/// A track in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    /// Playing time in seconds.
    pub duration: f64,
    #[serde(default)]
    pub bpm: Option<f64>,
    /// Canonical Camelot notation, `1A`..`12B`.
    #[serde(default)]
    pub camelot_key: Option<String>,
    /// 0.0 - 1.0
    #[serde(default)]
    pub energy: Option<f64>,
    /// Community label from an external clustering pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

impl Track {
    /// Duration in whole milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        seconds_to_ms(self.duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    #[default]
    Adjacency,
    Similarity,
    KeyCompatibility,
    #[serde(other)]
    Other,
}

/// Observed or inferred relationship between two tracks.
///
/// Direction is recorded but ignored for mixing purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipEdge {
    pub source: TrackId,
    pub target: TrackId,
    #[serde(default)]
    pub weight: f64,
    pub strength: f64,
    #[serde(rename = "type", default)]
    pub kind: EdgeKind,
}

/// The caller's full library graph for one planning call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub edges: Vec<RelationshipEdge>,
}

/// Soft preference for the energy direction across the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnergyFlow {
    Ascending,
    Descending,
    Flat,
}

/// Duration, tempo, key and energy constraints for a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConstraints {
    /// Minutes.
    pub target_duration: f64,
    /// Minutes either side of the target.
    pub tolerance: f64,
    #[serde(default = "default_true")]
    pub prefer_key_matching: bool,
    #[serde(default)]
    pub min_bpm: Option<f64>,
    #[serde(default)]
    pub max_bpm: Option<f64>,
    #[serde(default)]
    pub allowed_keys: Option<Vec<String>>,
    #[serde(default)]
    pub max_energy_change: Option<f64>,
    #[serde(default)]
    pub energy_flow: Option<EnergyFlow>,
    /// Minutes of projected overshoot tolerated before unlocked waypoints are
    /// dropped.
    #[serde(default)]
    pub waypoint_slack: f64,
}

fn default_true() -> bool {
    true
}

impl PathConstraints {
    /// Constraints with only a duration window set.
    #[must_use]
    pub fn new(target_minutes: f64, tolerance_minutes: f64) -> Self {
        Self {
            target_duration: target_minutes,
            tolerance: tolerance_minutes,
            prefer_key_matching: true,
            min_bpm: None,
            max_bpm: None,
            allowed_keys: None,
            max_energy_change: None,
            energy_flow: None,
            waypoint_slack: 0.0,
        }
    }

    #[must_use]
    pub fn target_ms(&self) -> u64 {
        minutes_to_ms(self.target_duration)
    }

    /// Inclusive tolerance band in milliseconds.
    #[must_use]
    pub fn band_ms(&self) -> (u64, u64) {
        let lower = minutes_to_ms(self.target_duration - self.tolerance);
        let upper = minutes_to_ms(self.target_duration + self.tolerance);
        (lower, upper)
    }

    #[must_use]
    pub fn slack_ms(&self) -> u64 {
        minutes_to_ms(self.waypoint_slack)
    }
}

/// A track that must appear somewhere in the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub track_id: TrackId,
    /// Locked waypoints fail the whole plan rather than being skipped.
    #[serde(default)]
    pub locked: bool,
}

impl Waypoint {
    pub fn locked(track_id: impl Into<TrackId>) -> Self {
        Self { track_id: track_id.into(), locked: true }
    }

    pub fn unlocked(track_id: impl Into<TrackId>) -> Self {
        Self { track_id: track_id.into(), locked: false }
    }
}

/// Unordered set of waypoints.
///
/// There is intentionally no way to express a visiting order: the engine
/// decides it. Duplicate ids collapse into one entry, locked if any copy was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Waypoint>", into = "Vec<Waypoint>")]
pub struct WaypointSet {
    entries: BTreeMap<TrackId, bool>,
}

impl WaypointSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, waypoint: Waypoint) {
        let locked = self.entries.entry(waypoint.track_id).or_insert(false);
        *locked |= waypoint.locked;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_locked(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    /// Waypoints in track-id order.
    pub fn iter(&self) -> impl Iterator<Item = Waypoint> + '_ {
        self.entries.iter().map(|(id, &locked)| Waypoint { track_id: id.clone(), locked })
    }
}

impl From<Vec<Waypoint>> for WaypointSet {
    fn from(waypoints: Vec<Waypoint>) -> Self {
        waypoints.into_iter().collect()
    }
}

impl From<WaypointSet> for Vec<Waypoint> {
    fn from(set: WaypointSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Waypoint> for WaypointSet {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        let mut set = Self::new();
        for waypoint in iter {
            set.insert(waypoint);
        }
        set
    }
}

/// Start, optional end and waypoint selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRequest {
    pub start_id: TrackId,
    #[serde(default)]
    pub end_id: Option<TrackId>,
    #[serde(default)]
    pub waypoints: WaypointSet,
}

impl PathRequest {
    pub fn new(start_id: impl Into<TrackId>) -> Self {
        Self {
            start_id: start_id.into(),
            end_id: None,
            waypoints: WaypointSet::new(),
        }
    }

    #[must_use]
    pub fn with_end(mut self, end_id: impl Into<TrackId>) -> Self {
        self.end_id = Some(end_id.into());
        self
    }

    #[must_use]
    pub fn with_waypoint(mut self, waypoint: Waypoint) -> Self {
        self.waypoints.insert(waypoint);
        self
    }
}

/// Waypoint ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmVariant {
    /// Exhaustive for small waypoint sets, nearest insertion beyond.
    #[default]
    Auto,
    Exhaustive,
    NearestInsertion,
}

/// Search tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub algorithm_variant: AlgorithmVariant,
    /// Upper bound on search steps before the plan is reported as failed.
    pub step_budget: u64,
    /// Intermediate tracks allowed between two required stops.
    pub max_detour_hops: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            algorithm_variant: AlgorithmVariant::Auto,
            step_budget: 200_000,
            max_detour_hops: 3,
        }
    }
}

/// One request of a batch: what to plan and under which constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub request: PathRequest,
    pub constraints: PathConstraints,
    #[serde(default)]
    pub options: SearchOptions,
}

/// One track of the computed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub track: Track,
    /// Strength of the real edge from the previous track; `None` on the first
    /// segment and on synthetic hops.
    pub connection_strength: Option<f64>,
    pub key_compatible: bool,
    pub key_class: Option<CompatibilityClass>,
    pub transition_cost: Option<f64>,
    pub cumulative_duration_ms: u64,
    pub is_synthetic_edge: bool,
}

/// Outcome of a planning call. Always well formed, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathfinderResult {
    pub success: bool,
    pub path: Vec<PathSegment>,
    pub total_duration_ms: u64,
    pub target_duration_ms: u64,
    pub duration_difference_ms: i64,
    pub waypoints_visited: Vec<TrackId>,
    pub waypoints_missed: Vec<TrackId>,
    pub average_connection_strength: f64,
    pub key_compatibility_score: f64,
    pub synthetic_edge_count: usize,
    pub steps_used: u64,
    pub message: String,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

pub(crate) fn minutes_to_ms(minutes: f64) -> u64 {
    seconds_to_ms(minutes * 60.0)
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn ms_to_minutes(ms: u64) -> f64 {
    ms as f64 / 60_000.0
}
