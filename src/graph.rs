//! Adjacency index over a [`GraphSnapshot`].
//!
//! Tracks are addressed by dense `usize` indices in snapshot order. Edges are
//! folded into an undirected map keyed by the index pair, keeping only the
//! strongest relationship per pair (highest `strength`, then highest `weight`).
//! Neighbour lists are sorted by track id so every traversal is deterministic.

use crate::error::{GraphError, TrackRole};
use crate::harmonic::CamelotKey;
use crate::model::{GraphSnapshot, Track};
use log::{debug, warn};
use std::collections::HashMap;

/// A track together with its parsed key.
#[derive(Debug, Clone, Copy)]
pub struct IndexedTrack<'a> {
    pub track: &'a Track,
    pub key: Option<CamelotKey>,
}

impl IndexedTrack<'_> {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.track.id
    }
}

/// Strongest real relationship between two tracks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStats {
    pub strength: f64,
    pub weight: f64,
}

impl EdgeStats {
    fn beats(&self, other: &Self) -> bool {
        self.strength > other.strength
            || (self.strength == other.strength && self.weight > other.weight)
    }
}

/// Read-only index built once per snapshot.
#[derive(Debug)]
pub struct TrackGraph<'a> {
    tracks: Vec<IndexedTrack<'a>>,
    by_id: HashMap<&'a str, usize>,
    neighbours: Vec<Vec<usize>>,
    edges: HashMap<(usize, usize), EdgeStats>,
}

fn pair(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl<'a> TrackGraph<'a> {
    /// Index a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateTrack`] for repeated ids,
    /// [`GraphError::InvalidKey`] for keys that are not canonical Camelot
    /// notation and [`GraphError::InvalidDuration`] for negative or
    /// non-finite durations. Malformed edges are skipped with a warning.
    pub fn build(snapshot: &'a GraphSnapshot) -> Result<Self, GraphError> {
        let mut tracks = Vec::with_capacity(snapshot.tracks.len());
        let mut by_id = HashMap::with_capacity(snapshot.tracks.len());

        for track in &snapshot.tracks {
            if !track.duration.is_finite() || track.duration < 0.0 {
                return Err(GraphError::InvalidDuration {
                    track_id: track.id.clone(),
                    duration: track.duration,
                });
            }
            let key = track
                .camelot_key
                .as_deref()
                .map(|raw| {
                    raw.parse::<CamelotKey>().map_err(|source| GraphError::InvalidKey {
                        track_id: track.id.clone(),
                        key: raw.to_string(),
                        source,
                    })
                })
                .transpose()?;

            if by_id.insert(track.id.as_str(), tracks.len()).is_some() {
                return Err(GraphError::DuplicateTrack { id: track.id.clone() });
            }
            tracks.push(IndexedTrack { track, key });
        }

        let mut edges: HashMap<(usize, usize), EdgeStats> = HashMap::new();
        let mut skipped = 0usize;
        for edge in &snapshot.edges {
            let (Some(&a), Some(&b)) = (by_id.get(edge.source.as_str()), by_id.get(edge.target.as_str()))
            else {
                warn!("Skipping edge {} -> {}: unknown track id", edge.source, edge.target);
                skipped += 1;
                continue;
            };
            if a == b {
                warn!("Skipping edge {} -> {}: self-loop", edge.source, edge.target);
                skipped += 1;
                continue;
            }
            if !edge.strength.is_finite() {
                warn!("Skipping edge {} -> {}: non-finite strength", edge.source, edge.target);
                skipped += 1;
                continue;
            }
            let stats = EdgeStats {
                strength: edge.strength.clamp(0.0, 1.0),
                weight: if edge.weight.is_finite() { edge.weight.max(0.0) } else { 0.0 },
            };
            edges
                .entry(pair(a, b))
                .and_modify(|existing| {
                    if stats.beats(existing) {
                        *existing = stats;
                    }
                })
                .or_insert(stats);
        }

        let mut neighbours = vec![Vec::new(); tracks.len()];
        for &(a, b) in edges.keys() {
            neighbours[a].push(b);
            neighbours[b].push(a);
        }
        for list in &mut neighbours {
            list.sort_unstable_by(|&x, &y| tracks[x].id().cmp(tracks[y].id()));
        }

        debug!(
            "Indexed {} tracks, {} unique relationships ({} edges skipped)",
            tracks.len(),
            edges.len(),
            skipped
        );

        Ok(Self { tracks, by_id, neighbours, edges })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Resolve an id that the request requires to exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownTrack`] tagged with the id's role.
    pub fn require(&self, id: &str, role: TrackRole) -> Result<usize, GraphError> {
        self.index_of(id).ok_or_else(|| GraphError::UnknownTrack { role, id: id.to_string() })
    }

    #[must_use]
    pub fn track(&self, index: usize) -> &IndexedTrack<'a> {
        &self.tracks[index]
    }

    /// Neighbours of `index`, sorted by track id.
    #[must_use]
    pub fn neighbours(&self, index: usize) -> &[usize] {
        &self.neighbours[index]
    }

    /// Strongest real edge between two tracks, in either direction.
    #[must_use]
    pub fn edge_between(&self, a: usize, b: usize) -> Option<EdgeStats> {
        self.edges.get(&pair(a, b)).copied()
    }

    /// All indices sorted by track id.
    #[must_use]
    pub fn indices_by_id(&self) -> Vec<usize> {
        let mut all: Vec<usize> = (0..self.tracks.len()).collect();
        all.sort_unstable_by(|&x, &y| self.tracks[x].id().cmp(self.tracks[y].id()));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, RelationshipEdge};

    fn track(id: &str, key: Option<&str>) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_uppercase(),
            artist: "Artist".to_string(),
            duration: 300.0,
            bpm: Some(124.0),
            camelot_key: key.map(str::to_string),
            energy: None,
            cluster: None,
        }
    }

    fn edge(source: &str, target: &str, strength: f64, weight: f64) -> RelationshipEdge {
        RelationshipEdge {
            source: source.to_string(),
            target: target.to_string(),
            weight,
            strength,
            kind: EdgeKind::Adjacency,
        }
    }

    #[test]
    fn test_keeps_strongest_edge_either_direction() {
        let snapshot = GraphSnapshot {
            tracks: vec![track("a", None), track("b", None)],
            edges: vec![
                edge("a", "b", 0.4, 10.0),
                edge("b", "a", 0.7, 1.0),
                edge("a", "b", 0.7, 3.0),
                edge("a", "b", 0.2, 50.0),
            ],
        };
        let graph = TrackGraph::build(&snapshot).unwrap();

        let stats = graph.edge_between(1, 0).unwrap();
        assert_eq!(stats, EdgeStats { strength: 0.7, weight: 3.0 });
        assert_eq!(graph.neighbours(0), &[1]);
        assert_eq!(graph.neighbours(1), &[0]);
    }

    #[test]
    fn test_neighbours_sorted_by_id() {
        let snapshot = GraphSnapshot {
            tracks: vec![track("m", None), track("z", None), track("c", None), track("k", None)],
            edges: vec![edge("m", "z", 0.5, 1.0), edge("c", "m", 0.5, 1.0), edge("m", "k", 0.5, 1.0)],
        };
        let graph = TrackGraph::build(&snapshot).unwrap();
        let ids: Vec<&str> = graph.neighbours(0).iter().map(|&i| graph.track(i).id()).collect();
        assert_eq!(ids, ["c", "k", "z"]);
    }

    #[test]
    fn test_malformed_edges_are_skipped() {
        let snapshot = GraphSnapshot {
            tracks: vec![track("a", None), track("b", None)],
            edges: vec![
                edge("a", "ghost", 0.9, 1.0),
                edge("a", "a", 0.9, 1.0),
                edge("a", "b", f64::NAN, 1.0),
                edge("a", "b", 1.7, -4.0),
            ],
        };
        let graph = TrackGraph::build(&snapshot).unwrap();
        assert_eq!(graph.edge_between(0, 1), Some(EdgeStats { strength: 1.0, weight: 0.0 }));
        assert_eq!(graph.neighbours(0).len(), 1);
        assert_eq!(graph.edge_between(0, 0), None);
    }

    #[test]
    fn test_rejects_invalid_key_and_duplicates() {
        let bad_key = GraphSnapshot {
            tracks: vec![track("a", Some("A minor"))],
            edges: vec![],
        };
        assert!(matches!(
            TrackGraph::build(&bad_key),
            Err(GraphError::InvalidKey { ref track_id, .. }) if track_id == "a"
        ));

        let duplicate = GraphSnapshot {
            tracks: vec![track("a", None), track("a", None)],
            edges: vec![],
        };
        assert!(matches!(TrackGraph::build(&duplicate), Err(GraphError::DuplicateTrack { .. })));
    }

    #[test]
    fn test_rejects_negative_duration() {
        let mut t = track("a", None);
        t.duration = -1.0;
        let snapshot = GraphSnapshot { tracks: vec![t], edges: vec![] };
        assert!(matches!(TrackGraph::build(&snapshot), Err(GraphError::InvalidDuration { .. })));
    }

    #[test]
    fn test_require_reports_role() {
        let snapshot = GraphSnapshot { tracks: vec![track("a", Some("8A"))], edges: vec![] };
        let graph = TrackGraph::build(&snapshot).unwrap();
        assert_eq!(graph.require("a", TrackRole::Start), Ok(0));
        assert_eq!(
            graph.require("nope", TrackRole::End),
            Err(GraphError::UnknownTrack { role: TrackRole::End, id: "nope".to_string() })
        );
        assert_eq!(graph.track(0).key.map(|k| k.to_string()).as_deref(), Some("8A"));
    }
}
