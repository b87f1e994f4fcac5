//! # Error Types
//!
//! Only malformed input is exceptional in Mixpath. Unknown track ids, duplicate
//! tracks, unparseable keys and nonsensical constraints are rejected before any
//! search work begins. Everything that can go wrong *during* a search
//! (infeasible BPM ranges, unreachable durations, exhausted step budgets) is
//! reported as data in [`crate::model::PathfinderResult`] instead.

use std::fmt;
use thiserror::Error;

/// Which part of a request referenced a track id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRole {
    Start,
    End,
    LockedWaypoint,
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start track"),
            Self::End => write!(f, "end track"),
            Self::LockedWaypoint => write!(f, "locked waypoint"),
        }
    }
}

/// A string that is not a canonical Camelot key (`1A` .. `12B`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{input}' is not a canonical Camelot key (expected 1A..12B)")]
pub struct KeyParseError {
    pub input: String,
}

/// Fatal input errors, raised before the search starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("{role} '{id}' is not present in the graph")]
    UnknownTrack { role: TrackRole, id: String },

    #[error("track id '{id}' appears more than once in the graph snapshot")]
    DuplicateTrack { id: String },

    #[error("track '{track_id}' has an invalid key: {source}")]
    InvalidKey {
        track_id: String,
        key: String,
        #[source]
        source: KeyParseError,
    },

    #[error("track '{track_id}' has an invalid duration of {duration} seconds")]
    InvalidDuration { track_id: String, duration: f64 },

    #[error("invalid path constraints: {detail}")]
    InvalidConstraint { detail: String },
}
