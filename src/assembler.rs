//! Turns a placed track sequence into a [`PathfinderResult`].

use crate::graph::TrackGraph;
use crate::model::{ms_to_minutes, PathConstraints, PathSegment, PathfinderResult, WaypointSet};
use crate::search::Hop;
use std::collections::HashSet;

/// How the search ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Success, with an optional remark appended to the summary.
    Success { note: Option<String> },
    Failure(String),
}

/// Build the reported result in a single walk over the sequence.
///
/// `start` is the first track; `hops` are every following track with the
/// transition used to reach it.
#[must_use]
pub fn assemble(
    graph: &TrackGraph<'_>,
    start: usize,
    hops: &[Hop],
    waypoints: &WaypointSet,
    constraints: &PathConstraints,
    verdict: Verdict,
    steps_used: u64,
) -> PathfinderResult {
    let mut path = Vec::with_capacity(hops.len() + 1);
    let mut cumulative = graph.track(start).track.duration_ms();
    path.push(PathSegment {
        track: graph.track(start).track.clone(),
        connection_strength: None,
        key_compatible: true,
        key_class: None,
        transition_cost: None,
        cumulative_duration_ms: cumulative,
        is_synthetic_edge: false,
    });

    let mut strength_sum = 0.0;
    let mut key_sum = 0.0;
    let mut synthetic_edge_count = 0;
    for hop in hops {
        let track = graph.track(hop.node).track;
        let transition = hop.transition;
        cumulative += track.duration_ms();
        strength_sum += transition.edge.strength().unwrap_or(0.0);
        key_sum += transition.compatibility.score;
        if transition.edge.is_synthetic() {
            synthetic_edge_count += 1;
        }
        path.push(PathSegment {
            track: track.clone(),
            connection_strength: transition.edge.strength(),
            key_compatible: transition.compatibility.class.is_compatible(),
            key_class: Some(transition.compatibility.class),
            transition_cost: Some(transition.cost),
            cumulative_duration_ms: cumulative,
            is_synthetic_edge: transition.edge.is_synthetic(),
        });
    }

    let (average_connection_strength, key_compatibility_score) = if hops.is_empty() {
        (0.0, 0.0)
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = hops.len() as f64;
        (strength_sum / n, key_sum / n)
    };

    let mut placed = HashSet::with_capacity(path.len());
    let waypoints_visited: Vec<String> = path
        .iter()
        .map(|segment| segment.track.id.as_str())
        .filter(|id| waypoints.iter().any(|w| w.track_id == *id))
        .filter(|id| placed.insert(*id))
        .map(str::to_string)
        .collect();
    let waypoints_missed: Vec<String> = waypoints
        .iter()
        .filter(|w| !w.locked && !placed.contains(w.track_id.as_str()))
        .map(|w| w.track_id)
        .collect();

    let total_duration_ms = cumulative;
    let target_duration_ms = constraints.target_ms();
    #[allow(clippy::cast_possible_wrap)]
    let duration_difference_ms = total_duration_ms as i64 - target_duration_ms as i64;

    let (success, message) = match verdict {
        Verdict::Success { note } => {
            let mut message = format!(
                "Planned {} tracks, {:.1} min against a {:.1} ± {:.1} min target",
                path.len(),
                ms_to_minutes(total_duration_ms),
                constraints.target_duration,
                constraints.tolerance
            );
            if synthetic_edge_count > 0 {
                message.push_str(&format!(", {synthetic_edge_count} synthetic transition(s)"));
            }
            if !waypoints_missed.is_empty() {
                message.push_str(&format!(", {} waypoint(s) missed", waypoints_missed.len()));
            }
            if let Some(note) = note {
                message.push_str("; ");
                message.push_str(&note);
            }
            (true, message)
        }
        Verdict::Failure(reason) => (false, reason),
    };

    PathfinderResult {
        success,
        path,
        total_duration_ms,
        target_duration_ms,
        duration_difference_ms,
        waypoints_visited,
        waypoints_missed,
        average_connection_strength,
        key_compatibility_score,
        synthetic_edge_count,
        steps_used,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostModel, CostWeights};
    use crate::model::{GraphSnapshot, RelationshipEdge, Track, Waypoint};

    fn track(id: &str, minutes: f64, key: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            artist: String::new(),
            duration: minutes * 60.0,
            bpm: None,
            camelot_key: Some(key.to_string()),
            energy: None,
            cluster: None,
        }
    }

    fn fixture() -> GraphSnapshot {
        GraphSnapshot {
            tracks: vec![track("a", 4.0, "8A"), track("b", 5.0, "8B"), track("c", 6.0, "3B")],
            edges: vec![RelationshipEdge {
                source: "a".to_string(),
                target: "b".to_string(),
                weight: 2.0,
                strength: 0.8,
                kind: Default::default(),
            }],
        }
    }

    #[test]
    fn test_segments_and_aggregates() {
        let snap = fixture();
        let graph = TrackGraph::build(&snap).unwrap();
        let constraints = PathConstraints::new(15.0, 1.0);
        let cost = CostModel::new(&constraints, CostWeights::default()).unwrap();
        let hops = [
            Hop { node: 1, transition: cost.transition(&graph, 0, 1) },
            Hop { node: 2, transition: cost.transition(&graph, 1, 2) },
        ];
        let waypoints: WaypointSet =
            vec![Waypoint::unlocked("c"), Waypoint::unlocked("zz"), Waypoint::locked("q")].into();

        let result = assemble(&graph, 0, &hops, &waypoints, &constraints, Verdict::Success { note: None }, 7);

        assert!(result.success);
        let cumulative: Vec<u64> = result.path.iter().map(|s| s.cumulative_duration_ms).collect();
        assert_eq!(cumulative, [240_000, 540_000, 900_000]);
        assert_eq!(result.total_duration_ms, 900_000);
        assert_eq!(result.duration_difference_ms, 0);

        assert_eq!(result.path[0].connection_strength, None);
        assert_eq!(result.path[1].connection_strength, Some(0.8));
        assert!(result.path[1].key_compatible);
        assert!(!result.path[2].key_compatible);
        assert!(result.path[2].is_synthetic_edge);
        assert_eq!(result.synthetic_edge_count, 1);

        assert!((result.average_connection_strength - 0.4).abs() < 1e-9);
        assert!((result.key_compatibility_score - (0.9 + 0.1) / 2.0).abs() < 1e-9);

        assert_eq!(result.waypoints_visited, ["c"]);
        assert_eq!(result.waypoints_missed, ["zz"]);
        assert_eq!(result.steps_used, 7);
        assert!(result.message.contains("1 synthetic transition"));
    }

    #[test]
    fn test_single_track_failure() {
        let snap = fixture();
        let graph = TrackGraph::build(&snap).unwrap();
        let constraints = PathConstraints::new(15.0, 1.0);
        let result = assemble(
            &graph,
            0,
            &[],
            &WaypointSet::new(),
            &constraints,
            Verdict::Failure("nothing fits".to_string()),
            0,
        );
        assert!(!result.success);
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.average_connection_strength, 0.0);
        assert_eq!(result.key_compatibility_score, 0.0);
        assert_eq!(result.duration_difference_ms, 240_000 - 900_000);
        assert_eq!(result.message, "nothing fits");
    }
}
