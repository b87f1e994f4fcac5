//! # Waypoint Sequencing
//!
//! Waypoints arrive without an order; this module decides one. The problem is
//! a fixed-endpoint travelling-salesman variant over the pairwise transition
//! costs of [`crate::cost::CostModel`], so two strategies are offered:
//!
//! - [`ExhaustiveSequencer`]: branch-and-bound over all permutations, seeded
//!   with the nearest-insertion tour so pruning bites early. Exact, but
//!   factorial in the worst case.
//! - [`NearestInsertionSequencer`]: greedy nearest insertion. Polynomial and
//!   usually within a few percent of optimal, with no guarantee.
//!
//! [`AlgorithmVariant::Auto`] uses the exhaustive search up to
//! [`EXACT_SEQUENCING_LIMIT`] waypoints and nearest insertion beyond. This is a
//! deliberate quality/performance trade-off: beyond the limit the returned
//! order can be suboptimal.
//!
//! After ordering, [`trim_unlocked_waypoints`] drops unlocked waypoints whose
//! playing time would push the projected set length past the tolerance band.

use crate::budget::{BudgetExhausted, StepBudget};
use crate::cost::CostModel;
use crate::graph::TrackGraph;
use crate::model::AlgorithmVariant;
use log::debug;

/// Largest waypoint count ordered exhaustively under [`AlgorithmVariant::Auto`].
pub const EXACT_SEQUENCING_LIMIT: usize = 8;

const EPSILON: f64 = 1e-9;

/// Pairwise transition costs between the start, the waypoints and the end.
///
/// Slot `0` is the start, slots `1..=n` the waypoints in input order and slot
/// `n + 1` the end when one was requested.
#[derive(Debug, Clone)]
pub struct SequencingProblem {
    costs: Vec<Vec<f64>>,
    waypoints: usize,
    has_end: bool,
}

impl SequencingProblem {
    /// Precompute the cost matrix using direct hops (real or synthetic).
    #[must_use]
    pub fn build(
        graph: &TrackGraph<'_>,
        cost: &CostModel,
        start: usize,
        waypoints: &[usize],
        end: Option<usize>,
    ) -> Self {
        let nodes: Vec<usize> = std::iter::once(start)
            .chain(waypoints.iter().copied())
            .chain(end)
            .collect();
        let costs = nodes
            .iter()
            .map(|&from| {
                nodes
                    .iter()
                    .map(|&to| if from == to { 0.0 } else { cost.transition(graph, from, to).cost })
                    .collect()
            })
            .collect();
        Self::from_matrix(costs, waypoints.len(), end.is_some())
    }

    /// Wrap an explicit matrix laid out as described on the type.
    #[must_use]
    pub fn from_matrix(costs: Vec<Vec<f64>>, waypoints: usize, has_end: bool) -> Self {
        debug_assert_eq!(costs.len(), waypoints + 1 + usize::from(has_end));
        Self { costs, waypoints, has_end }
    }

    #[must_use]
    pub fn waypoint_count(&self) -> usize {
        self.waypoints
    }

    fn start_slot() -> usize {
        0
    }

    fn waypoint_slot(w: usize) -> usize {
        w + 1
    }

    fn end_slot(&self) -> Option<usize> {
        self.has_end.then_some(self.waypoints + 1)
    }

    fn cost(&self, from: usize, to: usize) -> f64 {
        self.costs[from][to]
    }

    /// Total cost of visiting the waypoints in `order` (waypoint positions).
    #[must_use]
    pub fn route_cost(&self, order: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut last = Self::start_slot();
        for &w in order {
            let slot = Self::waypoint_slot(w);
            total += self.cost(last, slot);
            last = slot;
        }
        if let Some(end) = self.end_slot() {
            total += self.cost(last, end);
        }
        total
    }
}

/// Strategy for ordering waypoints.
pub trait WaypointSequencer {
    /// Return a permutation of `0..problem.waypoint_count()`.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetExhausted`] if the step budget runs out.
    fn order(&self, problem: &SequencingProblem, budget: &mut StepBudget) -> Result<Vec<usize>, BudgetExhausted>;

    fn name(&self) -> &'static str;
}

/// Greedy nearest insertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestInsertionSequencer;

impl WaypointSequencer for NearestInsertionSequencer {
    fn order(&self, problem: &SequencingProblem, budget: &mut StepBudget) -> Result<Vec<usize>, BudgetExhausted> {
        let n = problem.waypoint_count();
        let mut route: Vec<usize> = Vec::with_capacity(n);
        let mut remaining: Vec<usize> = (0..n).collect();
        let end = problem.end_slot();

        while !remaining.is_empty() {
            budget.step()?;

            // Nearest: the remaining waypoint closest to anything already placed.
            let placed: Vec<usize> = std::iter::once(SequencingProblem::start_slot())
                .chain(route.iter().map(|&w| SequencingProblem::waypoint_slot(w)))
                .chain(end)
                .collect();
            let mut nearest = 0;
            let mut nearest_cost = f64::INFINITY;
            for (i, &w) in remaining.iter().enumerate() {
                let slot = SequencingProblem::waypoint_slot(w);
                let closest = placed
                    .iter()
                    .map(|&p| problem.cost(p, slot))
                    .fold(f64::INFINITY, f64::min);
                if closest < nearest_cost - EPSILON {
                    nearest = i;
                    nearest_cost = closest;
                }
            }
            let w = remaining.remove(nearest);
            let slot = SequencingProblem::waypoint_slot(w);

            // Insert where it adds the least.
            let mut best_position = route.len();
            let mut best_delta = f64::INFINITY;
            for position in 0..=route.len() {
                let prev = if position == 0 {
                    SequencingProblem::start_slot()
                } else {
                    SequencingProblem::waypoint_slot(route[position - 1])
                };
                let next = if position == route.len() {
                    end
                } else {
                    Some(SequencingProblem::waypoint_slot(route[position]))
                };
                let delta = problem.cost(prev, slot)
                    + next.map_or(0.0, |next| problem.cost(slot, next) - problem.cost(prev, next));
                if delta < best_delta - EPSILON {
                    best_delta = delta;
                    best_position = position;
                }
            }
            route.insert(best_position, w);
        }

        Ok(route)
    }

    fn name(&self) -> &'static str {
        "nearest-insertion"
    }
}

/// Exact branch-and-bound permutation search.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveSequencer;

struct BranchState<'p> {
    problem: &'p SequencingProblem,
    cheapest_hop: f64,
    used: Vec<bool>,
    prefix: Vec<usize>,
    best: Vec<usize>,
    best_cost: f64,
}

impl BranchState<'_> {
    fn explore(&mut self, last: usize, cost_so_far: f64, budget: &mut StepBudget) -> Result<(), BudgetExhausted> {
        budget.step()?;
        let n = self.problem.waypoint_count();

        if self.prefix.len() == n {
            let total = cost_so_far + self.problem.end_slot().map_or(0.0, |end| self.problem.cost(last, end));
            if total < self.best_cost - EPSILON {
                self.best_cost = total;
                self.best.clone_from(&self.prefix);
            }
            return Ok(());
        }

        #[allow(clippy::cast_precision_loss)]
        let hops_left = (n - self.prefix.len() + usize::from(self.problem.has_end)) as f64;
        for w in 0..n {
            if self.used[w] {
                continue;
            }
            let slot = SequencingProblem::waypoint_slot(w);
            let cost = cost_so_far + self.problem.cost(last, slot);
            if cost + (hops_left - 1.0) * self.cheapest_hop >= self.best_cost - EPSILON {
                continue;
            }
            self.used[w] = true;
            self.prefix.push(w);
            self.explore(slot, cost, budget)?;
            self.prefix.pop();
            self.used[w] = false;
        }
        Ok(())
    }
}

impl WaypointSequencer for ExhaustiveSequencer {
    fn order(&self, problem: &SequencingProblem, budget: &mut StepBudget) -> Result<Vec<usize>, BudgetExhausted> {
        let seed = NearestInsertionSequencer.order(problem, budget)?;
        let seed_cost = problem.route_cost(&seed);
        let n = problem.waypoint_count();

        let cheapest_hop = problem
            .costs
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().filter(move |&(j, _)| i != j).map(|(_, &c)| c))
            .fold(f64::INFINITY, f64::min);

        let mut state = BranchState {
            problem,
            cheapest_hop: if cheapest_hop.is_finite() { cheapest_hop } else { 0.0 },
            used: vec![false; n],
            prefix: Vec::with_capacity(n),
            best: seed,
            best_cost: seed_cost,
        };
        state.explore(SequencingProblem::start_slot(), 0.0, budget)?;

        debug!(
            "Exhaustive ordering of {n} waypoints: cost {:.3} (nearest insertion {:.3})",
            state.best_cost, seed_cost
        );
        Ok(state.best)
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

/// Pick the sequencer for a variant and waypoint count.
#[must_use]
pub fn sequencer_for(variant: AlgorithmVariant, waypoints: usize) -> &'static dyn WaypointSequencer {
    match variant {
        AlgorithmVariant::Exhaustive => &ExhaustiveSequencer,
        AlgorithmVariant::NearestInsertion => &NearestInsertionSequencer,
        AlgorithmVariant::Auto if waypoints <= EXACT_SEQUENCING_LIMIT => &ExhaustiveSequencer,
        AlgorithmVariant::Auto => &NearestInsertionSequencer,
    }
}

/// A waypoint scheduled for the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stop {
    pub index: usize,
    pub locked: bool,
}

/// Drop unlocked waypoints until the projected length fits.
///
/// The projection is the sum of the fixed tracks (start and end) and every
/// scheduled waypoint. While it exceeds `limit_ms`, the longest unlocked
/// waypoint is removed (ties go to the later one in the order). Locked
/// waypoints are never dropped. Returns the kept order and the dropped stops.
#[must_use]
pub fn trim_unlocked_waypoints(
    graph: &TrackGraph<'_>,
    ordered: Vec<Stop>,
    fixed_ms: u64,
    limit_ms: u64,
) -> (Vec<Stop>, Vec<Stop>) {
    let duration = |stop: &Stop| graph.track(stop.index).track.duration_ms();
    let mut kept = ordered;
    let mut dropped = Vec::new();
    let mut projected: u64 = fixed_ms + kept.iter().map(duration).sum::<u64>();

    while projected > limit_ms {
        let Some(position) = kept
            .iter()
            .enumerate()
            .filter(|(_, stop)| !stop.locked)
            .max_by_key(|&(position, stop)| (duration(stop), position))
            .map(|(position, _)| position)
        else {
            break;
        };
        let stop = kept.remove(position);
        projected -= duration(&stop);
        debug!("Dropping unlocked waypoint {} to fit the duration band", graph.track(stop.index).id());
        dropped.push(stop);
    }

    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphSnapshot, Track};

    /// Points on a line: cost is the distance between positions.
    fn line_problem(start: f64, waypoints: &[f64], end: Option<f64>) -> SequencingProblem {
        let points: Vec<f64> = std::iter::once(start)
            .chain(waypoints.iter().copied())
            .chain(end)
            .collect();
        let costs = points
            .iter()
            .map(|a| points.iter().map(|b| (a - b).abs()).collect())
            .collect();
        SequencingProblem::from_matrix(costs, waypoints.len(), end.is_some())
    }

    fn brute_force(problem: &SequencingProblem) -> f64 {
        fn permute(items: &mut Vec<usize>, k: usize, problem: &SequencingProblem, best: &mut f64) {
            if k == items.len() {
                *best = best.min(problem.route_cost(items));
                return;
            }
            for i in k..items.len() {
                items.swap(k, i);
                permute(items, k + 1, problem, best);
                items.swap(k, i);
            }
        }
        let mut items: Vec<usize> = (0..problem.waypoint_count()).collect();
        let mut best = f64::INFINITY;
        permute(&mut items, 0, problem, &mut best);
        best
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    #[test]
    fn test_zero_waypoints_trivial_order() {
        let problem = line_problem(0.0, &[], Some(10.0));
        let mut budget = StepBudget::new(100);
        assert!(ExhaustiveSequencer.order(&problem, &mut budget).unwrap().is_empty());
        assert!(NearestInsertionSequencer.order(&problem, &mut budget).unwrap().is_empty());
    }

    #[test]
    fn test_line_is_visited_in_order() {
        let problem = line_problem(0.0, &[7.0, 2.0, 5.0, 9.0], Some(10.0));
        let mut budget = StepBudget::new(10_000);
        let order = ExhaustiveSequencer.order(&problem, &mut budget).unwrap();
        assert_eq!(order, [1, 2, 0, 3]);
        assert!((problem.route_cost(&order) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_exhaustive_matches_brute_force() {
        let problem = line_problem(3.0, &[8.0, -4.0, 1.0, 12.0, -1.0, 6.0], None);
        let mut budget = StepBudget::new(1_000_000);
        let order = ExhaustiveSequencer.order(&problem, &mut budget).unwrap();
        assert!(is_permutation(&order, 6));
        assert!((problem.route_cost(&order) - brute_force(&problem)).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_insertion_returns_permutation() {
        let waypoints: Vec<f64> = (0..20).map(|i| f64::from((i * 37) % 23)).collect();
        let problem = line_problem(0.0, &waypoints, Some(30.0));
        let mut budget = StepBudget::new(1_000);
        let order = NearestInsertionSequencer.order(&problem, &mut budget).unwrap();
        assert!(is_permutation(&order, 20));
    }

    #[test]
    fn test_budget_exhaustion_propagates() {
        let problem = line_problem(0.0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None);
        let mut budget = StepBudget::new(3);
        assert!(ExhaustiveSequencer.order(&problem, &mut budget).is_err());
    }

    #[test]
    fn test_auto_variant_switches_on_size() {
        assert_eq!(sequencer_for(AlgorithmVariant::Auto, EXACT_SEQUENCING_LIMIT).name(), "exhaustive");
        assert_eq!(sequencer_for(AlgorithmVariant::Auto, EXACT_SEQUENCING_LIMIT + 1).name(), "nearest-insertion");
        assert_eq!(sequencer_for(AlgorithmVariant::Exhaustive, 50).name(), "exhaustive");
        assert_eq!(sequencer_for(AlgorithmVariant::NearestInsertion, 1).name(), "nearest-insertion");
    }

    #[test]
    fn test_trim_drops_longest_unlocked_only() {
        let track = |id: &str, minutes: f64| Track {
            id: id.to_string(),
            name: id.to_string(),
            artist: String::new(),
            duration: minutes * 60.0,
            bpm: None,
            camelot_key: None,
            energy: None,
            cluster: None,
        };
        let snapshot = GraphSnapshot {
            tracks: vec![track("long", 9.0), track("short", 3.0), track("locked", 10.0)],
            edges: vec![],
        };
        let graph = TrackGraph::build(&snapshot).unwrap();
        let ordered = vec![
            Stop { index: 0, locked: false },
            Stop { index: 1, locked: false },
            Stop { index: 2, locked: true },
        ];

        let (kept, dropped) = trim_unlocked_waypoints(&graph, ordered.clone(), 0, 14 * 60_000);
        assert_eq!(kept, [ordered[1], ordered[2]]);
        assert_eq!(dropped, [ordered[0]]);

        let (kept, dropped) = trim_unlocked_waypoints(&graph, ordered.clone(), 0, 60_000);
        assert_eq!(kept, [ordered[2]]);
        assert_eq!(dropped.len(), 2);
    }
}
