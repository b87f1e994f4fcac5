//! Plans DJ sets through a graph of track relationships.
//!
//! Given a library snapshot, a start track, an optional end track and an
//! unordered set of waypoints, Mixpath computes a sequence whose playing time
//! fits a target duration, whose transitions follow the strongest available
//! relationships, and whose key changes are harmonically compatible.
//!
//! Core modules:
//! - [`harmonic`] - Camelot key parsing and compatibility scoring
//! - [`graph`] - Adjacency index over a snapshot
//! - [`cost`] - Transition cost and hard filters
//! - [`sequencer`] - Waypoint ordering (exhaustive or nearest insertion)
//! - [`search`] - Leg search between stops and open-ended extension
//! - [`assembler`] - Result assembly
//! - [`pathfinder`] - Entry points
//!
//! ### Supporting Modules
//!
//! - [`model`] - Input and output data types
//! - [`error`] - Input errors
//! - [`budget`] - Step budget shared by all searches
//! - [`snapshot`] - JSON loading for the command line tool
//! - [`config`] - Runtime configuration file
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```
//! use mixpath::model::{GraphSnapshot, PathConstraints, PathRequest, RelationshipEdge, SearchOptions, Track, Waypoint};
//!
//! let track = |id: &str, key: &str| Track {
//!     id: id.to_string(),
//!     name: format!("Track {id}"),
//!     artist: "Artist".to_string(),
//!     duration: 300.0,
//!     bpm: Some(124.0),
//!     camelot_key: Some(key.to_string()),
//!     energy: None,
//!     cluster: None,
//! };
//! let edge = |source: &str, target: &str, strength: f64| RelationshipEdge {
//!     source: source.to_string(),
//!     target: target.to_string(),
//!     weight: 1.0,
//!     strength,
//!     kind: Default::default(),
//! };
//! let snapshot = GraphSnapshot {
//!     tracks: vec![track("a", "8A"), track("b", "9A"), track("c", "9B"), track("d", "10B")],
//!     edges: vec![edge("a", "b", 0.9), edge("b", "c", 0.8), edge("c", "d", 0.7)],
//! };
//!
//! let request = PathRequest::new("a").with_waypoint(Waypoint::locked("c"));
//! let constraints = PathConstraints::new(20.0, 1.0);
//! let result = mixpath::compute_path(&snapshot, &request, &constraints, &SearchOptions::default())?;
//!
//! assert!(result.success);
//! assert_eq!(result.waypoints_visited, ["c"]);
//! assert_eq!(result.total_duration_ms, 20 * 60_000);
//! # Ok::<(), mixpath::error::GraphError>(())
//! ```
//!
//! ## Failure Model
//!
//! Only malformed input is an error ([`error::GraphError`]). A plan that cannot
//! satisfy its constraints, or that runs out of search steps, comes back as a
//! [`model::PathfinderResult`] with `success == false`, a partial path and a
//! message explaining why.
//!
//! ## Determinism
//!
//! Neighbour lists are sorted by track id, waypoints are normalised to id
//! order, and every priority queue breaks ties on insertion order, so equal
//! inputs always produce equal results. Concurrent calls share no state; see
//! [`compute_paths_parallel`].

pub mod assembler;
pub mod budget;
pub mod cli;
pub mod completion;
pub mod config;
pub mod cost;
pub mod error;
pub mod graph;
pub mod harmonic;
pub mod model;
pub mod pathfinder;
pub mod search;
pub mod sequencer;
pub mod snapshot;

pub use error::GraphError;
pub use pathfinder::{compute_path, compute_paths_parallel, Pathfinder};
