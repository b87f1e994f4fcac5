//! # Snapshot Loading
//!
//! Reads graph snapshots and batch plan files from disk for the command line
//! tool. The engine itself never touches the filesystem; library callers hand
//! it an in-memory [`GraphSnapshot`].
//!
//! Both files are JSON in the shapes described in [`crate::model`]:
//!
//! ```json
//! {
//!   "tracks": [{"id": "t1", "name": "Opener", "duration": 312.0, "bpm": 122.0, "camelotKey": "8A"}],
//!   "edges": [{"source": "t1", "target": "t2", "weight": 4, "strength": 0.8, "type": "adjacency"}]
//! }
//! ```

use crate::model::{GraphSnapshot, PlanRequest};
use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {what} in {}", path.display()))
}

/// Load a graph snapshot.
///
/// # Errors
///
/// Fails if the file cannot be read or is not a valid snapshot document.
pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let snapshot: GraphSnapshot = read_json(path, "graph snapshot")?;
    debug!(
        "Loaded {} tracks and {} edges from {}",
        snapshot.tracks.len(),
        snapshot.edges.len(),
        path.display()
    );
    Ok(snapshot)
}

/// Load a batch of plan requests (a JSON array).
///
/// # Errors
///
/// Fails if the file cannot be read or is not an array of plan requests.
pub fn load_plans(path: &Path) -> Result<Vec<PlanRequest>> {
    read_json(path, "plan batch")
}
