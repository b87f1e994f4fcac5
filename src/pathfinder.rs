//! # Pathfinder
//!
//! Entry points tying the pipeline together:
//!
//! 1. validate the request and derive the [`CostModel`],
//! 2. normalise and filter the waypoint set,
//! 3. order the waypoints and drop unlocked ones that cannot fit,
//! 4. connect consecutive required stops with [`LegSearch::connect`],
//! 5. without an end track, extend the set until it lands in the tolerance
//!    band,
//! 6. assemble the [`PathfinderResult`].
//!
//! Only malformed input returns an error. Infeasible plans and exhausted step
//! budgets produce a result with `success == false` and a partial path.

use crate::assembler::{assemble, Verdict};
use crate::budget::{BudgetExhausted, StepBudget};
use crate::cost::{CostModel, CostWeights, Rejection};
use crate::error::{GraphError, TrackRole};
use crate::graph::TrackGraph;
use crate::model::{
    ms_to_minutes, GraphSnapshot, PathConstraints, PathRequest, PathfinderResult, PlanRequest, SearchOptions,
};
use crate::search::{ExtensionOutcome, Hop, LegKind, LegSearch};
use crate::sequencer::{sequencer_for, trim_unlocked_waypoints, SequencingProblem, Stop};
use log::{debug, info, warn};
use rayon::prelude::*;

/// A reusable planner over one indexed snapshot.
///
/// Building the index is the expensive part for large libraries; keep a
/// `Pathfinder` around to plan several sets against the same snapshot.
#[derive(Debug)]
pub struct Pathfinder<'a> {
    graph: TrackGraph<'a>,
    weights: CostWeights,
}

/// Mutable state of one planning call.
struct Plan<'p, 'a> {
    graph: &'p TrackGraph<'a>,
    request: &'p PathRequest,
    constraints: &'p PathConstraints,
    start: usize,
    hops: Vec<Hop>,
    budget: StepBudget,
}

impl Plan<'_, '_> {
    fn finish(self, verdict: Verdict) -> PathfinderResult {
        let result = assemble(
            self.graph,
            self.start,
            &self.hops,
            &self.request.waypoints,
            self.constraints,
            verdict,
            self.budget.used(),
        );
        if result.success {
            info!(
                "Planned {} tracks ({:.1} min) from '{}' in {} steps",
                result.path.len(),
                ms_to_minutes(result.total_duration_ms),
                self.request.start_id,
                result.steps_used
            );
        } else {
            info!("No plan from '{}': {}", self.request.start_id, result.message);
        }
        result
    }

    fn fail(self, reason: String) -> PathfinderResult {
        self.finish(Verdict::Failure(reason))
    }

    fn exhausted(self, error: &BudgetExhausted, stage: &str) -> PathfinderResult {
        self.fail(format!("{error} while {stage}"))
    }

    fn total_ms(&self) -> u64 {
        self.graph.track(self.start).track.duration_ms()
            + self
                .hops
                .iter()
                .map(|hop| self.graph.track(hop.node).track.duration_ms())
                .sum::<u64>()
    }
}

fn band_label(constraints: &PathConstraints) -> String {
    let (lower, upper) = constraints.band_ms();
    format!("{:.1}-{:.1} min", ms_to_minutes(lower), ms_to_minutes(upper))
}

fn filter_failure(cost: &CostModel, rejection: Rejection, role: TrackRole, id: &str) -> String {
    match rejection {
        Rejection::BpmOutOfRange => format!(
            "no reachable path satisfies BPM range {}: {role} '{id}' is outside it",
            cost.bpm_range_label()
        ),
        Rejection::KeyNotAllowed => {
            format!("no reachable path satisfies the allowed keys: {role} '{id}' is not in a permitted key")
        }
    }
}

impl<'a> Pathfinder<'a> {
    /// Index a snapshot for planning.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] if the snapshot itself is malformed.
    pub fn new(snapshot: &'a GraphSnapshot) -> Result<Self, GraphError> {
        Ok(Self {
            graph: TrackGraph::build(snapshot)?,
            weights: CostWeights::default(),
        })
    }

    #[must_use]
    pub fn with_weights(mut self, weights: CostWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn graph(&self) -> &TrackGraph<'a> {
        &self.graph
    }

    /// Plan one set.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] for unknown start, end or locked waypoint ids,
    /// an end track equal to the start, and invalid constraints. Every other
    /// outcome, including failure, is reported in the returned result.
    pub fn compute(
        &self,
        request: &PathRequest,
        constraints: &PathConstraints,
        options: &SearchOptions,
    ) -> Result<PathfinderResult, GraphError> {
        let graph = &self.graph;
        let cost = CostModel::new(constraints, self.weights)?;
        let start = graph.require(&request.start_id, TrackRole::Start)?;
        let end = request
            .end_id
            .as_deref()
            .map(|id| graph.require(id, TrackRole::End))
            .transpose()?;
        if end == Some(start) {
            return Err(GraphError::InvalidConstraint {
                detail: format!("end track '{}' is the same as the start track", request.start_id),
            });
        }

        let mut resolved = Vec::with_capacity(request.waypoints.len());
        for waypoint in request.waypoints.iter() {
            match graph.index_of(&waypoint.track_id) {
                Some(index) => resolved.push(Stop { index, locked: waypoint.locked }),
                None if waypoint.locked => {
                    return Err(GraphError::UnknownTrack {
                        role: TrackRole::LockedWaypoint,
                        id: waypoint.track_id,
                    });
                }
                None => warn!("Unlocked waypoint '{}' is not in the graph; it will be missed", waypoint.track_id),
            }
        }

        debug!(
            "Planning from '{}'{} with {} waypoint(s), target {} min ± {} min",
            request.start_id,
            request.end_id.as_deref().map(|id| format!(" to '{id}'")).unwrap_or_default(),
            resolved.len(),
            constraints.target_duration,
            constraints.tolerance
        );

        let mut plan = Plan {
            graph,
            request,
            constraints,
            start,
            hops: Vec::new(),
            budget: StepBudget::new(options.step_budget),
        };

        if let Some(end) = end {
            if let Err(rejection) = cost.admits(graph.track(end)) {
                return Ok(plan.fail(filter_failure(&cost, rejection, TrackRole::End, graph.track(end).id())));
            }
        }

        let mut stops = Vec::with_capacity(resolved.len());
        for stop in resolved {
            if stop.index == start || Some(stop.index) == end {
                continue;
            }
            match cost.admits(graph.track(stop.index)) {
                Ok(()) => stops.push(stop),
                Err(rejection) if stop.locked => {
                    let id = graph.track(stop.index).id();
                    return Ok(plan.fail(filter_failure(&cost, rejection, TrackRole::LockedWaypoint, id)));
                }
                Err(rejection) => debug!(
                    "Unlocked waypoint '{}' rejected by {:?}; it will be missed",
                    graph.track(stop.index).id(),
                    rejection
                ),
            }
        }

        let indices: Vec<usize> = stops.iter().map(|stop| stop.index).collect();
        let problem = SequencingProblem::build(graph, &cost, start, &indices, end);
        let sequencer = sequencer_for(options.algorithm_variant, stops.len());
        let order = match sequencer.order(&problem, &mut plan.budget) {
            Ok(order) => order,
            Err(error) => return Ok(plan.exhausted(&error, "ordering waypoints")),
        };
        debug!(
            "Ordered {} waypoint(s) with {} at estimated cost {:.3}",
            order.len(),
            sequencer.name(),
            problem.route_cost(&order)
        );

        let (_, upper) = constraints.band_ms();
        let fixed_ms = graph.track(start).track.duration_ms()
            + end.map_or(0, |e| graph.track(e).track.duration_ms());
        let ordered = order.iter().map(|&w| stops[w]).collect();
        let (kept, _dropped) =
            trim_unlocked_waypoints(graph, ordered, fixed_ms, upper.saturating_add(constraints.slack_ms()));

        // Required stops are reserved so no leg wanders through a later one.
        let mut blocked = vec![false; graph.len()];
        blocked[start] = true;
        for index in kept.iter().map(|stop| stop.index).chain(end) {
            blocked[index] = true;
        }

        let search = LegSearch::new(graph, &cost, options.max_detour_hops);
        let mut last = start;
        let targets = kept.iter().map(|stop| (stop.index, stop.locked)).chain(end.map(|e| (e, true)));
        for (target, required) in targets {
            let leg = match search.connect(last, target, &blocked, &mut plan.budget) {
                Ok(leg) => leg,
                Err(error) => {
                    let stage = format!("connecting to '{}'", graph.track(target).id());
                    return Ok(plan.exhausted(&error, &stage));
                }
            };
            // An optional stop only reachable through filtered tracks is missed.
            if !required && leg.kind == LegKind::Synthetic && leg.filtered {
                debug!(
                    "Unlocked waypoint '{}' is cut off by the hard filters; it will be missed",
                    graph.track(target).id()
                );
                continue;
            }
            for hop in &leg.hops {
                blocked[hop.node] = true;
            }
            plan.hops.extend(leg.hops);
            last = target;
        }

        if end.is_some() {
            let (lower, upper) = constraints.band_ms();
            let total = plan.total_ms();
            let note = (total < lower || total > upper)
                .then(|| format!("length is outside the {} band", band_label(constraints)));
            return Ok(plan.finish(Verdict::Success { note }));
        }

        let total = plan.total_ms();
        let extension = match search.extend_to_band(last, &mut blocked, total, constraints.band_ms(), &mut plan.budget) {
            Ok(extension) => extension,
            Err(error) => return Ok(plan.exhausted(&error, "extending towards the target duration")),
        };
        plan.hops.extend(extension.hops);

        let verdict = match extension.outcome {
            ExtensionOutcome::InBand => Verdict::Success { note: None },
            ExtensionOutcome::Overshoot { shortest_ms } => Verdict::Failure(format!(
                "target duration unreachable within tolerance: the set stops at {:.1} min and the shortest next track takes it to {:.1} min (band {})",
                ms_to_minutes(extension.total_ms),
                ms_to_minutes(shortest_ms),
                band_label(constraints)
            )),
            ExtensionOutcome::AlreadyOver => Verdict::Failure(format!(
                "target duration unreachable within tolerance: required tracks already run {:.1} min (band {})",
                ms_to_minutes(extension.total_ms),
                band_label(constraints)
            )),
            ExtensionOutcome::Stuck { rejected } if rejected.contains(&Rejection::BpmOutOfRange) => {
                Verdict::Failure(format!(
                    "no reachable path satisfies BPM range {}: the set stops at {:.1} min (band {})",
                    cost.bpm_range_label(),
                    ms_to_minutes(extension.total_ms),
                    band_label(constraints)
                ))
            }
            ExtensionOutcome::Stuck { rejected } if rejected.contains(&Rejection::KeyNotAllowed) => {
                Verdict::Failure(format!(
                    "no reachable path satisfies the allowed keys: the set stops at {:.1} min (band {})",
                    ms_to_minutes(extension.total_ms),
                    band_label(constraints)
                ))
            }
            ExtensionOutcome::Stuck { .. } => Verdict::Failure(format!(
                "target duration unreachable within tolerance: the library runs out at {:.1} min (band {})",
                ms_to_minutes(extension.total_ms),
                band_label(constraints)
            )),
        };
        Ok(plan.finish(verdict))
    }
}

/// Plan one set against a snapshot.
///
/// # Errors
///
/// See [`Pathfinder::new`] and [`Pathfinder::compute`].
///
/// # Examples
///
/// ```
/// use mixpath::model::{GraphSnapshot, PathConstraints, PathRequest, SearchOptions, Track};
///
/// let track = |id: &str, key: &str| Track {
///     id: id.to_string(),
///     name: id.to_string(),
///     artist: String::new(),
///     duration: 180.0,
///     bpm: Some(124.0),
///     camelot_key: Some(key.to_string()),
///     energy: None,
///     cluster: None,
/// };
/// let snapshot = GraphSnapshot { tracks: vec![track("a", "8A"), track("b", "8B")], edges: vec![] };
/// let request = PathRequest::new("a").with_end("b");
/// let result = mixpath::compute_path(
///     &snapshot,
///     &request,
///     &PathConstraints::new(6.0, 1.0),
///     &SearchOptions::default(),
/// )
/// .unwrap();
///
/// assert!(result.success);
/// assert_eq!(result.synthetic_edge_count, 1);
/// ```
pub fn compute_path(
    snapshot: &GraphSnapshot,
    request: &PathRequest,
    constraints: &PathConstraints,
    options: &SearchOptions,
) -> Result<PathfinderResult, GraphError> {
    Pathfinder::new(snapshot)?.compute(request, constraints, options)
}

/// Plan many independent sets against one snapshot in parallel.
///
/// The index is built once. Results come back in input order and match what
/// [`compute_path`] returns for each plan.
///
/// # Errors
///
/// The outer error is a malformed snapshot; per-plan input errors are
/// reported in place.
pub fn compute_paths_parallel(
    snapshot: &GraphSnapshot,
    plans: &[PlanRequest],
) -> Result<Vec<Result<PathfinderResult, GraphError>>, GraphError> {
    let pathfinder = Pathfinder::new(snapshot)?;
    Ok(plans
        .par_iter()
        .map(|plan| pathfinder.compute(&plan.request, &plan.constraints, &plan.options))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlgorithmVariant, RelationshipEdge, Track, Waypoint};

    fn track(id: &str, minutes: f64, bpm: f64, key: &str) -> Track {
        Track {
            id: id.to_string(),
            name: id.to_string(),
            artist: String::new(),
            duration: minutes * 60.0,
            bpm: Some(bpm),
            camelot_key: Some(key.to_string()),
            energy: None,
            cluster: None,
        }
    }

    fn snapshot(tracks: Vec<Track>, edges: &[(&str, &str, f64)]) -> GraphSnapshot {
        GraphSnapshot {
            tracks,
            edges: edges
                .iter()
                .map(|&(s, t, strength)| RelationshipEdge {
                    source: s.to_string(),
                    target: t.to_string(),
                    weight: 1.0,
                    strength,
                    kind: Default::default(),
                })
                .collect(),
        }
    }

    fn chain() -> GraphSnapshot {
        snapshot(
            vec![
                track("a", 5.0, 124.0, "8A"),
                track("b", 5.0, 124.0, "8A"),
                track("c", 5.0, 124.0, "9A"),
                track("d", 5.0, 126.0, "9A"),
                track("e", 5.0, 126.0, "10A"),
            ],
            &[("a", "b", 0.9), ("b", "c", 0.9), ("c", "d", 0.9), ("d", "e", 0.9)],
        )
    }

    fn ids(result: &PathfinderResult) -> Vec<&str> {
        result.path.iter().map(|s| s.track.id.as_str()).collect()
    }

    #[test]
    fn test_open_ended_plan_fills_band() {
        let snap = chain();
        let result = compute_path(
            &snap,
            &PathRequest::new("a"),
            &PathConstraints::new(15.0, 1.0),
            &SearchOptions::default(),
        )
        .unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(ids(&result), ["a", "b", "c"]);
        assert_eq!(result.synthetic_edge_count, 0);
    }

    #[test]
    fn test_waypoints_routed_between_start_and_end() {
        let snap = chain();
        let request = PathRequest::new("a")
            .with_end("e")
            .with_waypoint(Waypoint::unlocked("d"))
            .with_waypoint(Waypoint::locked("b"));
        let result = compute_path(&snap, &request, &PathConstraints::new(25.0, 1.0), &SearchOptions::default())
            .unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(ids(&result), ["a", "b", "c", "d", "e"]);
        assert_eq!(result.waypoints_visited, ["b", "d"]);
        assert!(result.waypoints_missed.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_input_errors() {
        let snap = chain();
        let options = SearchOptions::default();
        let constraints = PathConstraints::new(15.0, 1.0);

        let err = compute_path(&snap, &PathRequest::new("nope"), &constraints, &options).unwrap_err();
        assert!(matches!(err, GraphError::UnknownTrack { role: TrackRole::Start, .. }));

        let err = compute_path(&snap, &PathRequest::new("a").with_end("nope"), &constraints, &options).unwrap_err();
        assert!(matches!(err, GraphError::UnknownTrack { role: TrackRole::End, .. }));

        let request = PathRequest::new("a").with_waypoint(Waypoint::locked("nope"));
        let err = compute_path(&snap, &request, &constraints, &options).unwrap_err();
        assert!(matches!(err, GraphError::UnknownTrack { role: TrackRole::LockedWaypoint, .. }));

        let request = PathRequest::new("a").with_waypoint(Waypoint::unlocked("nope"));
        let result = compute_path(&snap, &request, &constraints, &options).unwrap();
        assert_eq!(result.waypoints_missed, ["nope"]);
    }

    #[test]
    fn test_end_equal_to_start_rejected() {
        let snap = chain();
        let err = compute_path(
            &snap,
            &PathRequest::new("a").with_end("a"),
            &PathConstraints::new(15.0, 1.0),
            &SearchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::InvalidConstraint { .. }));
    }

    #[test]
    fn test_locked_waypoint_outside_bpm_range_fails() {
        let snap = chain();
        let mut constraints = PathConstraints::new(25.0, 1.0);
        constraints.max_bpm = Some(125.0);
        let request = PathRequest::new("a").with_waypoint(Waypoint::locked("d"));
        let result = compute_path(&snap, &request, &constraints, &SearchOptions::default()).unwrap();
        assert!(!result.success);
        assert!(result.message.contains("BPM range"), "{}", result.message);
        assert_eq!(ids(&result), ["a"]);
    }

    #[test]
    fn test_unlocked_waypoint_outside_bpm_range_is_missed() {
        let snap = chain();
        let mut constraints = PathConstraints::new(15.0, 1.0);
        constraints.max_bpm = Some(125.0);
        let request = PathRequest::new("a").with_waypoint(Waypoint::unlocked("d"));
        let result = compute_path(&snap, &request, &constraints, &SearchOptions::default()).unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(result.waypoints_missed, ["d"]);
        assert!(!ids(&result).contains(&"d"));
    }

    #[test]
    fn test_unlocked_waypoint_behind_filtered_track_is_missed() {
        let snap = snapshot(
            vec![
                track("a", 5.0, 124.0, "8A"),
                track("fast", 5.0, 170.0, "8A"),
                track("w", 5.0, 124.0, "8A"),
                track("z", 5.0, 124.0, "8A"),
            ],
            &[("a", "fast", 0.9), ("fast", "w", 0.9), ("a", "z", 0.9)],
        );
        let mut constraints = PathConstraints::new(15.0, 1.0);
        constraints.max_bpm = Some(130.0);
        let request = PathRequest::new("a").with_end("z").with_waypoint(Waypoint::unlocked("w"));
        let result = compute_path(&snap, &request, &constraints, &SearchOptions::default()).unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(ids(&result), ["a", "z"]);
        assert_eq!(result.waypoints_missed, ["w"]);
        assert!(result.waypoints_visited.is_empty());
        assert_eq!(result.synthetic_edge_count, 0);
    }

    #[test]
    fn test_long_real_chain_preferred_over_synthetic_shortcut() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let snap = snapshot(
            names.iter().map(|id| track(id, 5.0, 124.0, "8A")).collect(),
            &[("a", "b", 0.9), ("b", "c", 0.9), ("c", "d", 0.9), ("d", "e", 0.9), ("e", "f", 0.9)],
        );
        let request = PathRequest::new("a").with_end("f");
        let result = compute_path(&snap, &request, &PathConstraints::new(30.0, 2.0), &SearchOptions::default())
            .unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(ids(&result), names);
        assert_eq!(result.synthetic_edge_count, 0);
        assert_eq!(result.total_duration_ms, 30 * 60_000);
    }

    #[test]
    fn test_unlocked_waypoint_dropped_when_it_cannot_fit() {
        let mut tracks = chain().tracks;
        tracks.push(track("long", 40.0, 124.0, "8A"));
        let snap = snapshot(tracks, &[("a", "b", 0.9), ("b", "c", 0.9), ("a", "long", 0.5)]);
        let request = PathRequest::new("a").with_waypoint(Waypoint::unlocked("long"));
        let result = compute_path(&snap, &request, &PathConstraints::new(15.0, 1.0), &SearchOptions::default())
            .unwrap();
        assert!(result.success, "{}", result.message);
        assert_eq!(result.waypoints_missed, ["long"]);
    }

    #[test]
    fn test_waypoint_equal_to_start_is_visited() {
        let snap = chain();
        let request = PathRequest::new("a").with_waypoint(Waypoint::locked("a"));
        let result = compute_path(&snap, &request, &PathConstraints::new(15.0, 1.0), &SearchOptions::default())
            .unwrap();
        assert_eq!(result.waypoints_visited, ["a"]);
    }

    #[test]
    fn test_budget_exhaustion_is_a_failure_result() {
        let snap = chain();
        let options = SearchOptions { step_budget: 2, ..SearchOptions::default() };
        let result = compute_path(&snap, &PathRequest::new("a").with_end("e"), &PathConstraints::new(25.0, 1.0), &options)
            .unwrap();
        assert!(!result.success);
        assert!(result.message.contains("budget"), "{}", result.message);
        assert!(result.steps_used <= 2);
        assert_eq!(ids(&result)[0], "a");
    }

    #[test]
    fn test_variants_agree_on_small_inputs() {
        let snap = chain();
        let request = PathRequest::new("a")
            .with_end("e")
            .with_waypoint(Waypoint::unlocked("c"))
            .with_waypoint(Waypoint::unlocked("b"));
        let constraints = PathConstraints::new(25.0, 1.0);
        let pathfinder = Pathfinder::new(&snap).unwrap();
        let exact = pathfinder
            .compute(&request, &constraints, &SearchOptions { algorithm_variant: AlgorithmVariant::Exhaustive, ..Default::default() })
            .unwrap();
        let greedy = pathfinder
            .compute(
                &request,
                &constraints,
                &SearchOptions { algorithm_variant: AlgorithmVariant::NearestInsertion, ..Default::default() },
            )
            .unwrap();
        assert_eq!(ids(&exact), ids(&greedy));
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let snap = chain();
        let plans: Vec<PlanRequest> = ["a", "c", "missing"]
            .iter()
            .map(|start| PlanRequest {
                request: PathRequest::new(*start),
                constraints: PathConstraints::new(10.0, 1.0),
                options: SearchOptions::default(),
            })
            .collect();
        let batch = compute_paths_parallel(&snap, &plans).unwrap();
        assert_eq!(batch.len(), 3);
        for (plan, result) in plans.iter().zip(&batch) {
            let single = compute_path(&snap, &plan.request, &plan.constraints, &plan.options);
            assert_eq!(&single, result);
        }
        assert!(batch[2].is_err());
    }
}
