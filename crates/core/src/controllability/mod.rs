//! The dynamic-controllability checking engine.
//!
//! [`check`] rewrites the network's labeled constraints to a fixpoint by
//! repeatedly applying the propagation rules (R0, R3, labeled-value
//! propagation, plus the upper/lower-case rules of the uncertainty
//! extension) over a worklist of recently changed edges. It terminates with
//! `Controllable` on an empty worklist, with `NotControllable` on a proven
//! negative loop, or early (`finished == false`) when the caller-supplied
//! iteration/time budget runs out.
//!
//! A network that is not controllable is the legitimate negative answer of
//! the predicate and is reported through [`CheckStatus`], never as an
//! [`Error`]. Errors are reserved for malformed input (raised before any
//! mutation) and for internal arithmetic defects.
//!
//! The engine is single-threaded by contract: rules must observe each
//! edge's current value set before deriving from it, so there is no sound
//! way to interleave two rule applications on one network. Parallelism
//! belongs across networks, one checker per clone.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use hashbrown::HashSet;

use crate::graph::TemporalNetwork;
use crate::label::{Label, TombstoneSet, NEG_INFINITY};

pub mod error;
pub mod well_definedness;

mod potential;
mod rules;

pub use error::{Error, WellDefinednessError};

/// What to do when propagation derives a negative self-loop whose label is
/// entirely in the unknown state (a Q-loop).
///
/// The two behaviors reflect a genuine semantic fork: a Q-loop is not yet a
/// proof of uncontrollability (the contradictory scenario may be impossible
/// once more constraints propagate), so the default seeds a `-∞` potential
/// and keeps going. The strict policy treats it as fatal right away, which
/// is complete for the network families where Q-loops never resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum QLoopPolicy {
    /// Collapse the loop value to `-∞` and let it propagate.
    #[default]
    PropagateInfinity,
    /// Declare the network not controllable immediately.
    RejectImmediately,
}

/// Tunable knobs of one check run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Minimum delay before the strategy may react to an observation;
    /// `0` means instantaneous reaction semantics. Must be non-negative.
    pub reaction_time: i32,
    /// Restrict labeled-value propagation to edges terminating at the zero
    /// time-point. Faster on large networks, complete only for the
    /// algorithm variants designed around it.
    pub propagate_only_to_z: bool,
    /// Stop after this many worklist extractions, reporting
    /// `finished == false`.
    pub max_iterations: Option<u64>,
    /// Stop after this much wall-clock time, reporting `finished == false`.
    pub time_budget: Option<Duration>,
    pub qloop_policy: QLoopPolicy,
    /// Run the single-source potential pass before the rule loop; detects
    /// unconditional negative cycles without touching any label.
    pub potential_prepass: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            reaction_time: 0,
            propagate_only_to_z: false,
            max_iterations: None,
            time_budget: None,
            qloop_policy: QLoopPolicy::default(),
            potential_prepass: true,
        }
    }
}

/// Where a check run stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum CheckState {
    /// No check has run yet.
    #[default]
    Unchecked,
    /// A check ran out of budget before reaching a verdict.
    Running,
    /// Fixpoint reached with no negative loop.
    Controllable,
    /// A negative loop was exhibited.
    NotControllable,
}

/// How many times each rule fired (successful merges only, since a rejected
/// merge changes nothing and must not mask a reached fixpoint).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct RuleCounters {
    pub r0_calls: u64,
    pub r3_calls: u64,
    pub labeled_value_propagation_calls: u64,
    pub upper_case_propagation_calls: u64,
    pub lower_case_propagation_calls: u64,
    pub letter_removal_calls: u64,
    pub potential_updates: u64,
}

impl RuleCounters {
    /// Name → count view for diagnostics and benchmark reports.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("r0_calls", self.r0_calls),
            ("r3_calls", self.r3_calls),
            (
                "labeled_value_propagation_calls",
                self.labeled_value_propagation_calls,
            ),
            (
                "upper_case_propagation_calls",
                self.upper_case_propagation_calls,
            ),
            (
                "lower_case_propagation_calls",
                self.lower_case_propagation_calls,
            ),
            ("letter_removal_calls", self.letter_removal_calls),
            ("potential_updates", self.potential_updates),
        ])
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.as_map().values().sum()
    }
}

/// The negative loop exhibited by a failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct NegativeLoop {
    pub node: String,
    pub label: Label,
    pub value: i32,
}

/// Outcome record of one check run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct CheckStatus {
    pub state: CheckState,
    /// `false` when the run stopped on its iteration/time budget.
    pub finished: bool,
    pub counters: RuleCounters,
    /// Worklist extractions performed.
    pub iterations: u64,
    pub elapsed: Duration,
    /// Present exactly when `state == NotControllable` and the loop was
    /// found by rule propagation (the potential pre-pass names the node but
    /// collapses the value to `-∞`).
    pub negative_loop: Option<NegativeLoop>,
}

impl CheckStatus {
    /// The verdict, or `None` if the run did not finish.
    #[must_use]
    pub const fn controllable(&self) -> Option<bool> {
        if !self.finished {
            return None;
        }
        match self.state {
            CheckState::Controllable => Some(true),
            CheckState::NotControllable => Some(false),
            CheckState::Unchecked | CheckState::Running => None,
        }
    }

    #[must_use]
    pub const fn elapsed_nanos(&self) -> u128 {
        self.elapsed.as_nanos()
    }
}

/// Checks dynamic controllability of `network`, rewriting its constraints
/// in place. Callers that need the original network must clone it first.
///
/// # Errors
///
/// Returns [`Error::WellDefinedness`] if the input violates a structural
/// precondition; the network is untouched in that case. Returns
/// [`Error::HorizonOverflow`] or [`Error::Overflow`] when the network's
/// weights exceed what 32-bit bound arithmetic can carry.
pub fn check(network: &mut TemporalNetwork, options: &CheckOptions) -> Result<CheckStatus, Error> {
    let start = Instant::now();
    well_definedness::verify(network)?;
    let horizon = compute_horizon(network)?;
    tracing::debug!(
        nodes = network.node_count(),
        edges = network.edge_count(),
        horizon,
        "starting controllability check"
    );

    let mut checker = Checker::new(network, options, horizon);
    checker.normalize_to_zero();

    if options.potential_prepass {
        if let Some(node) = potential::seed_potentials(checker.network, &mut checker.counters) {
            tracing::debug!(%node, "unconditional negative cycle found by potential pass");
            checker.negative_loop = Some(NegativeLoop {
                node,
                label: Label::EMPTY,
                value: NEG_INFINITY,
            });
            return Ok(checker.into_status(CheckState::NotControllable, true, 0, start));
        }
    }

    checker.seed_queue();
    checker.run(start)
}

/// Magnitude beyond which any further negative bound behaves as `-∞`:
/// `max-edge-weight × node-count × 2^#propositions`, the largest finite
/// distance any scenario-consistent simple path can carry.
fn compute_horizon(network: &TemporalNetwork) -> Result<i64, Error> {
    let weight = network.max_absolute_value().max(1);
    let nodes = i64::try_from(network.node_count()).unwrap_or(i64::MAX);
    let scenarios = 1i64 << network.propositions().len().min(32);
    let horizon = weight
        .saturating_mul(nodes)
        .saturating_mul(scenarios)
        .max(1);
    if horizon > i64::from(i32::MAX) {
        return Err(Error::HorizonOverflow { horizon });
    }
    Ok(horizon)
}

/// One check run's working state: the network under rewrite, the worklist,
/// the per-edge tombstone memory, and the evidence gathered so far.
pub(crate) struct Checker<'a> {
    pub(crate) network: &'a mut TemporalNetwork,
    pub(crate) options: &'a CheckOptions,
    pub(crate) horizon: i64,
    pub(crate) counters: RuleCounters,
    /// Generation stamp handed to tombstone records; bumped per merge so
    /// each removal is attributable to one rule application.
    pub(crate) generation: u64,
    /// Superseded-entry memory, one set per directed edge.
    pub(crate) tombstones: BTreeMap<(String, String), TombstoneSet>,
    pub(crate) queue: VecDeque<(String, String)>,
    pub(crate) queued: HashSet<(String, String)>,
    /// Self-loop edges touched by a merge and not yet inspected.
    pub(crate) dirty_loops: Vec<String>,
    pub(crate) negative_loop: Option<NegativeLoop>,
}

impl<'a> Checker<'a> {
    fn new(network: &'a mut TemporalNetwork, options: &'a CheckOptions, horizon: i64) -> Self {
        Self {
            network,
            options,
            horizon,
            counters: RuleCounters::default(),
            generation: 0,
            tombstones: BTreeMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            dirty_loops: Vec::new(),
            negative_loop: None,
        }
    }

    /// Ensures every node reaches the zero time-point through a `(⊡, 0)`
    /// edge, the standard normalization that lets R3's dagger variant and
    /// the `propagate_only_to_z` mode see every constraint.
    fn normalize_to_zero(&mut self) {
        let zero = self.network.zero().to_owned();
        let names: Vec<String> = self
            .network
            .nodes()
            .map(|n| n.name().to_owned())
            .filter(|name| *name != zero)
            .collect();
        for name in names {
            let edge = self.network.edge_or_insert(&name, &zero);
            let _ = edge.put_value(Label::EMPTY, 0);
        }
    }

    fn seed_queue(&mut self) {
        for key in self.network.edge_keys() {
            if self.queued.insert(key.clone()) {
                self.queue.push_back(key);
            }
        }
    }

    pub(crate) fn enqueue(&mut self, source: &str, dest: &str) {
        let key = (source.to_owned(), dest.to_owned());
        if self.queued.insert(key.clone()) {
            self.queue.push_back(key);
        }
    }

    fn run(mut self, start: Instant) -> Result<CheckStatus, Error> {
        let mut iterations = 0u64;
        while let Some((source, dest)) = self.queue.pop_front() {
            let _ = self.queued.remove(&(source.clone(), dest.clone()));
            if self.budget_exhausted(iterations, start) {
                tracing::debug!(iterations, "budget exhausted before fixpoint");
                return Ok(self.into_status(CheckState::Running, false, iterations, start));
            }
            iterations += 1;
            if self.network.edge(&source, &dest).is_none() {
                continue;
            }
            tracing::trace!(%source, %dest, iterations, "examining edge");

            if source == dest {
                self.inspect_self_loop(&source);
            }
            if self.negative_loop.is_none() {
                self.apply_r0(&source, &dest);
                self.apply_r3(&source, &dest);
                self.apply_propagation(&source, &dest)?;
                self.apply_upper_case(&source, &dest)?;
                self.apply_lower_case(&source, &dest)?;
                self.apply_letter_removal(&source, &dest);
                self.settle_loops();
            }

            if let Some(found) = &self.negative_loop {
                tracing::debug!(
                    node = %found.node,
                    label = %found.label,
                    value = found.value,
                    "negative loop, network is not controllable"
                );
                return Ok(self.into_status(CheckState::NotControllable, true, iterations, start));
            }
        }
        tracing::debug!(iterations, "fixpoint reached, network is controllable");
        Ok(self.into_status(CheckState::Controllable, true, iterations, start))
    }

    fn budget_exhausted(&self, iterations: u64, start: Instant) -> bool {
        self.options
            .max_iterations
            .is_some_and(|limit| iterations >= limit)
            || self
                .options
                .time_budget
                .is_some_and(|budget| start.elapsed() >= budget)
    }

    fn into_status(
        self,
        state: CheckState,
        finished: bool,
        iterations: u64,
        start: Instant,
    ) -> CheckStatus {
        CheckStatus {
            state,
            finished,
            counters: self.counters,
            iterations,
            elapsed: start.elapsed(),
            negative_loop: self.negative_loop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn label(s: &str) -> Label {
        s.parse().expect("test label must parse")
    }

    fn two_node_network() -> TemporalNetwork {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::new("X")).unwrap();
        let _ = network.edge_or_insert("Z", "X").put_value(Label::EMPTY, 5);
        let _ = network.edge_or_insert("X", "Z").put_value(Label::EMPTY, -5);
        network
    }

    #[test]
    fn horizon_grows_with_weights_nodes_and_propositions() {
        let network = two_node_network();
        // weight 5, 2 nodes, no propositions.
        assert_eq!(compute_horizon(&network).unwrap(), 10);

        let mut network = two_node_network();
        network.add_node(Node::observer("P?", 'p').unwrap()).unwrap();
        assert_eq!(compute_horizon(&network).unwrap(), 5 * 3 * 2);
    }

    #[test]
    fn trivially_controllable_pair() {
        let mut network = two_node_network();
        let status = check(&mut network, &CheckOptions::default()).unwrap();
        assert!(status.finished);
        assert_eq!(status.state, CheckState::Controllable);
        assert_eq!(status.controllable(), Some(true));
        // Already minimal: nothing to derive beyond the Z-normalization.
        assert_eq!(status.counters.r0_calls, 0);
        assert_eq!(status.counters.r3_calls, 0);
    }

    #[test]
    fn direct_negative_self_loop_is_not_controllable() {
        let mut network = two_node_network();
        let _ = network.edge_or_insert("X", "X").put_value(Label::EMPTY, -1);
        let status = check(&mut network, &CheckOptions::default()).unwrap();
        assert_eq!(status.state, CheckState::NotControllable);
        assert_eq!(status.controllable(), Some(false));
    }

    #[test]
    fn unknown_literals_in_input_are_rejected() {
        // A contingent-link label comes from the input alone, so an
        // unknown-state literal there is malformed regardless of the
        // Q-loop policy.
        let mut network = TemporalNetwork::default();
        network.add_node(Node::observer("P?", 'p').unwrap()).unwrap();
        network.add_node(Node::new("A")).unwrap();
        network.add_node(Node::new("C")).unwrap();
        network
            .add_contingent_link("A", "C", 2, 5, label("¿p"))
            .unwrap();
        let options = CheckOptions {
            qloop_policy: QLoopPolicy::RejectImmediately,
            ..CheckOptions::default()
        };
        assert!(matches!(
            check(&mut network, &options),
            Err(Error::WellDefinedness(
                WellDefinednessError::UnknownLiteralInInput { .. }
            ))
        ));
    }

    #[test]
    fn iteration_budget_reports_unfinished() {
        let mut network = two_node_network();
        let options = CheckOptions {
            max_iterations: Some(1),
            potential_prepass: false,
            ..CheckOptions::default()
        };
        let status = check(&mut network, &options).unwrap();
        assert!(!status.finished);
        assert_eq!(status.state, CheckState::Running);
        assert_eq!(status.controllable(), None);
    }

    #[test]
    fn counters_map_lists_every_rule() {
        let counters = RuleCounters {
            r0_calls: 1,
            r3_calls: 2,
            ..RuleCounters::default()
        };
        let map = counters.as_map();
        assert_eq!(map.len(), 7);
        assert_eq!(map["r0_calls"], 1);
        assert_eq!(counters.total(), 3);
    }
}
