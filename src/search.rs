//! # Path Search
//!
//! Two searches build a set between the required stops:
//!
//! - [`LegSearch::connect`] links two consecutive required stops with a
//!   best-first (uniform-cost) expansion over real relationships. A direct
//!   edge is kept unless a detour of at most `max_detour_hops` extra tracks is
//!   materially cheaper. Without a direct edge any real route is taken, and
//!   when the real graph offers none a single synthetic edge is inserted so
//!   disconnected libraries still produce a set.
//! - [`LegSearch::extend_to_band`] grows an open-ended set one track at a time,
//!   always with the cheapest transition that does not overshoot, until the
//!   running length lands inside the tolerance band.
//!
//! Every frontier pop and every extension choice consumes one step of the
//! shared [`StepBudget`].

use crate::budget::{BudgetExhausted, StepBudget};
use crate::cost::{CostModel, Rejection, Transition};
use crate::graph::TrackGraph;
use log::{debug, trace};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// A detour must cost less than this fraction of the direct hop to win.
pub const DETOUR_GAIN_RATIO: f64 = 0.75;

/// One placed track and the transition that led to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hop {
    pub node: usize,
    pub transition: Transition,
}

/// How a leg between two stops was realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Direct,
    Detour,
    Synthetic,
}

/// Hops from one required stop to the next, ending at the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub kind: LegKind,
    pub hops: Vec<Hop>,
    /// The hard filters excluded at least one track the search could
    /// otherwise have expanded.
    pub filtered: bool,
}

impl Leg {
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.hops.iter().map(|hop| hop.transition.cost).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct FrontierKey {
    cost: f64,
    hops: usize,
    order: u64,
}

impl PartialEq for FrontierKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierKey {}

impl PartialOrd for FrontierKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .total_cmp(&other.cost)
            .then(self.hops.cmp(&other.hops))
            .then(self.order.cmp(&other.order))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    key: FrontierKey,
    arena: usize,
}

/// Outcome of one best-first expansion.
struct Expansion {
    route: Option<Vec<Hop>>,
    filtered: bool,
}

#[derive(Debug, Clone, Copy)]
struct ArenaNode {
    node: usize,
    parent: Option<usize>,
    hops: usize,
    transition: Option<Transition>,
}

/// Why an open-ended extension stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionOutcome {
    /// The running length is inside the band.
    InBand,
    /// Every remaining choice lands above the band; `shortest_ms` is the
    /// smallest length any of them would reach.
    Overshoot { shortest_ms: u64 },
    /// Already above the band before extending.
    AlreadyOver,
    /// No admissible track left. `rejected` lists the hard filters that
    /// excluded otherwise available tracks.
    Stuck { rejected: BTreeSet<Rejection> },
}

/// Tracks appended by [`LegSearch::extend_to_band`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub hops: Vec<Hop>,
    pub total_ms: u64,
    pub outcome: ExtensionOutcome,
}

/// Search context for one planning call.
pub struct LegSearch<'g, 'a> {
    graph: &'g TrackGraph<'a>,
    cost: &'g CostModel,
    max_detour_hops: usize,
}

impl<'g, 'a> LegSearch<'g, 'a> {
    #[must_use]
    pub fn new(graph: &'g TrackGraph<'a>, cost: &'g CostModel, max_detour_hops: usize) -> Self {
        Self { graph, cost, max_detour_hops }
    }

    /// Link `from` to `to` without touching any `blocked` track.
    ///
    /// `to` itself is never filtered: required stops are validated by the
    /// caller. Intermediate tracks must pass the hard filters of the cost
    /// model.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetExhausted`] if the expansion runs out of steps.
    pub fn connect(
        &self,
        from: usize,
        to: usize,
        blocked: &[bool],
        budget: &mut StepBudget,
    ) -> Result<Leg, BudgetExhausted> {
        let direct = self
            .graph
            .edge_between(from, to)
            .map(|_| self.cost.transition(self.graph, from, to));
        // The hop cap only limits detours competing with a direct edge.
        let max_hops = direct.map(|_| self.max_detour_hops + 1);
        let Expansion { route, filtered } = self.best_first(from, to, blocked, max_hops, budget)?;

        let (kind, hops) = match (direct, route) {
            (Some(direct), Some(best)) if best.len() > 1 => {
                let detour_cost: f64 = best.iter().map(|hop| hop.transition.cost).sum();
                if detour_cost < direct.cost * DETOUR_GAIN_RATIO {
                    (LegKind::Detour, best)
                } else {
                    (LegKind::Direct, vec![Hop { node: to, transition: direct }])
                }
            }
            (Some(direct), _) => (LegKind::Direct, vec![Hop { node: to, transition: direct }]),
            (None, Some(best)) => (LegKind::Detour, best),
            (None, None) => (
                LegKind::Synthetic,
                vec![Hop { node: to, transition: self.cost.transition(self.graph, from, to) }],
            ),
        };
        let leg = Leg { kind, hops, filtered };

        debug!(
            "Leg {} -> {}: {:?} over {} hop(s), cost {:.3}",
            self.graph.track(from).id(),
            self.graph.track(to).id(),
            leg.kind,
            leg.hops.len(),
            leg.cost()
        );
        Ok(leg)
    }

    /// Uniform-cost search over real edges, with at most `max_hops` hops when
    /// a cap is given. Returns the cheapest route, if any.
    fn best_first(
        &self,
        from: usize,
        to: usize,
        blocked: &[bool],
        max_hops: Option<usize>,
        budget: &mut StepBudget,
    ) -> Result<Expansion, BudgetExhausted> {
        // Uncapped, the first settlement of a node is final.
        let dominates = |settled_hops: usize, hops: usize| max_hops.is_none() || settled_hops <= hops;
        let mut filtered = false;
        let mut arena = vec![ArenaNode { node: from, parent: None, hops: 0, transition: None }];
        let mut frontier = BinaryHeap::new();
        let mut settled: HashMap<usize, usize> = HashMap::new();
        let mut order = 0u64;

        frontier.push(Reverse(FrontierEntry {
            key: FrontierKey { cost: 0.0, hops: 0, order },
            arena: 0,
        }));

        while let Some(Reverse(entry)) = frontier.pop() {
            budget.step()?;
            let current = arena[entry.arena];

            // A node settled earlier with no more hops dominates this entry.
            if settled.get(&current.node).is_some_and(|&hops| dominates(hops, current.hops)) {
                continue;
            }
            settled.insert(current.node, current.hops);
            trace!(
                "Expanding {} at cost {:.3}, {} hop(s)",
                self.graph.track(current.node).id(),
                entry.key.cost,
                current.hops
            );

            if current.node == to {
                let route = Self::unwind(&arena, entry.arena);
                return Ok(Expansion { route: Some(route), filtered });
            }
            if max_hops == Some(current.hops) {
                continue;
            }

            for &next in self.graph.neighbours(current.node) {
                if next == from || (next != to && blocked[next]) {
                    continue;
                }
                if next != to && self.cost.admits(self.graph.track(next)).is_err() {
                    filtered = true;
                    continue;
                }
                if settled.get(&next).is_some_and(|&hops| dominates(hops, current.hops + 1)) {
                    continue;
                }
                let transition = self.cost.transition(self.graph, current.node, next);
                arena.push(ArenaNode {
                    node: next,
                    parent: Some(entry.arena),
                    hops: current.hops + 1,
                    transition: Some(transition),
                });
                order += 1;
                frontier.push(Reverse(FrontierEntry {
                    key: FrontierKey {
                        cost: entry.key.cost + transition.cost,
                        hops: current.hops + 1,
                        order,
                    },
                    arena: arena.len() - 1,
                }));
            }
        }

        Ok(Expansion { route: None, filtered })
    }

    fn unwind(arena: &[ArenaNode], mut at: usize) -> Vec<Hop> {
        let mut hops = Vec::new();
        while let (Some(parent), Some(transition)) = (arena[at].parent, arena[at].transition) {
            hops.push(Hop { node: arena[at].node, transition });
            at = parent;
        }
        hops.reverse();
        hops
    }

    /// Grow an open-ended set from `last` until its length is in `band`.
    ///
    /// Real neighbours are preferred; only when none is admissible are
    /// unconnected tracks considered through synthetic edges. Each step takes
    /// the cheapest candidate that does not push the set past the band, and
    /// the extension stops as soon as the length enters it. When every
    /// candidate would overshoot the extension stops without placing anything.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetExhausted`] if the extension runs out of steps.
    pub fn extend_to_band(
        &self,
        mut last: usize,
        used: &mut [bool],
        mut total_ms: u64,
        band: (u64, u64),
        budget: &mut StepBudget,
    ) -> Result<Extension, BudgetExhausted> {
        let (lower, upper) = band;
        let mut hops = Vec::new();
        let mut by_id: Option<Vec<usize>> = None;

        if total_ms > upper {
            return Ok(Extension { hops, total_ms, outcome: ExtensionOutcome::AlreadyOver });
        }

        let outcome = loop {
            if total_ms >= lower {
                break ExtensionOutcome::InBand;
            }
            budget.step()?;

            let mut rejected = BTreeSet::new();
            let mut candidates = self.admissible(self.graph.neighbours(last).iter().copied(), used, &mut rejected);
            if candidates.is_empty() {
                let all = by_id.get_or_insert_with(|| self.graph.indices_by_id());
                candidates = self.admissible(all.iter().copied().filter(|&n| n != last), used, &mut rejected);
            }
            if candidates.is_empty() {
                break ExtensionOutcome::Stuck { rejected };
            }

            let mut cheapest: Option<(usize, Transition)> = None;
            let mut shortest_ms = u64::MAX;
            for next in candidates {
                let landing = total_ms + self.graph.track(next).track.duration_ms();
                if landing > upper {
                    shortest_ms = shortest_ms.min(landing);
                    continue;
                }
                let transition = self.cost.transition(self.graph, last, next);
                if cheapest.map_or(true, |(_, best)| transition.cost < best.cost) {
                    cheapest = Some((next, transition));
                }
            }

            let Some((next, transition)) = cheapest else {
                break ExtensionOutcome::Overshoot { shortest_ms };
            };
            trace!(
                "Extending with {} (cost {:.3})",
                self.graph.track(next).id(),
                transition.cost
            );
            used[next] = true;
            total_ms += self.graph.track(next).track.duration_ms();
            hops.push(Hop { node: next, transition });
            last = next;
        };

        Ok(Extension { hops, total_ms, outcome })
    }

    fn admissible(
        &self,
        nodes: impl Iterator<Item = usize>,
        used: &[bool],
        rejected: &mut BTreeSet<Rejection>,
    ) -> Vec<usize> {
        nodes
            .filter(|&n| !used[n])
            .filter(|&n| match self.cost.admits(self.graph.track(n)) {
                Ok(()) => true,
                Err(reason) => {
                    rejected.insert(reason);
                    false
                }
            })
            .collect()
    }
}
