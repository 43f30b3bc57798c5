//! The propagation rules.
//!
//! Every rule follows the same two-phase shape: snapshot the entries it
//! reads from immutable borrows, compute the candidate derivations, then
//! apply them through [`Checker::merge_ordinary`] / [`Checker::merge_upper`]
//! so no rule ever observes a half-updated map. Counters record successful
//! merges only; a rejected candidate is by definition already implied and
//! must not keep the worklist alive.

use crate::graph::Node;
use crate::label::{ALabel, Label, State, NEG_INFINITY};

use super::error::Error;
use super::{Checker, NegativeLoop, QLoopPolicy};

impl Checker<'_> {
    /// Merges an ordinary labeled value into the edge `source → dest`,
    /// threading the edge's tombstone set, and requeues the edge on change.
    pub(crate) fn merge_ordinary(
        &mut self,
        source: &str,
        dest: &str,
        label: Label,
        value: i32,
    ) -> bool {
        if self.vacuous_loop_entry(source, dest, &label) {
            return false;
        }
        self.generation += 1;
        let tombstones = self
            .tombstones
            .entry((source.to_owned(), dest.to_owned()))
            .or_default();
        let edge = self.network.edge_or_insert(source, dest);
        let changed = edge.merge_value(label, value, tombstones, self.generation);
        if changed {
            tracing::trace!(%source, %dest, %label, value, "merged labeled value");
            self.enqueue(source, dest);
            if source == dest {
                self.dirty_loops.push(source.to_owned());
            }
        }
        changed
    }

    /// Merges an upper-case value; an empty name set degenerates to an
    /// ordinary merge.
    pub(crate) fn merge_upper(
        &mut self,
        source: &str,
        dest: &str,
        names: ALabel,
        label: Label,
        value: i32,
    ) -> bool {
        if names.is_empty() {
            return self.merge_ordinary(source, dest, label, value);
        }
        if self.vacuous_loop_entry(source, dest, &label) {
            return false;
        }
        let edge = self.network.edge_or_insert(source, dest);
        let changed = edge.merge_upper_case(names, label, value);
        if changed {
            tracing::trace!(%source, %dest, %label, value, "merged upper-case value");
            self.enqueue(source, dest);
            if source == dest {
                self.dirty_loops.push(source.to_owned());
            }
        }
        changed
    }

    /// A derived self-loop entry whose label contradicts the node's own
    /// execution label carries no information: the node never executes in
    /// those scenarios. Unknown literals stay compatible, so Q-loop entries
    /// pass.
    fn vacuous_loop_entry(&self, source: &str, dest: &str, label: &Label) -> bool {
        source == dest
            && self
                .network
                .node(source)
                .is_some_and(|n| !label.is_consistent_with(n.label()))
    }

    /// `u + v` in `i64`, clamped to the horizon: sums at or below `-horizon`
    /// collapse to `-∞`, sums above `+horizon` carry no information and are
    /// dropped (`None`). Anything else must fit an `i32` by the horizon
    /// argument; failing that is an internal defect, reported with full
    /// context.
    fn bounded_sum(
        &self,
        left: i32,
        right: i32,
        source: &str,
        dest: &str,
        label: Label,
    ) -> Result<Option<i32>, Error> {
        if left == NEG_INFINITY || right == NEG_INFINITY {
            return Ok(Some(NEG_INFINITY));
        }
        let sum = i64::from(left) + i64::from(right);
        if sum <= -self.horizon {
            return Ok(Some(NEG_INFINITY));
        }
        if sum > self.horizon {
            return Ok(None);
        }
        match i32::try_from(sum) {
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(Error::Overflow {
                source: source.to_owned(),
                dest: dest.to_owned(),
                label,
                left,
                right,
            }),
        }
    }

    fn successors(&self, node: &str) -> Vec<String> {
        self.network
            .edges()
            .filter(|(s, _, _)| *s == node)
            .map(|(_, d, _)| d.to_owned())
            .collect()
    }

    fn predecessors(&self, node: &str) -> Vec<String> {
        self.network
            .edges()
            .filter(|(_, d, _)| *d == node)
            .map(|(s, _, _)| s.to_owned())
            .collect()
    }

    fn ordinary_snapshot(&self, source: &str, dest: &str) -> Vec<(Label, i32)> {
        self.network.edge(source, dest).map_or_else(Vec::new, |e| {
            e.values().iter().map(|(l, v)| (*l, v)).collect()
        })
    }

    fn upper_snapshot(&self, source: &str, dest: &str) -> Vec<(ALabel, Label, i32)> {
        self.network.edge(source, dest).map_or_else(Vec::new, |e| {
            e.upper_case_entries().map(|(n, l, v)| (n, *l, v)).collect()
        })
    }

    /// R0: on an edge leaving the observer of `p`, a bound at or below
    /// `-reaction_time` no longer needs its conditioning on a *decided*
    /// `p` literal: by the time the constraint bites, `p`'s value is known.
    /// An Unknown `p` is not decided by the observation and must keep its
    /// literal, or Q-loop bounds would leak into decided labels.
    pub(crate) fn apply_r0(&mut self, source: &str, dest: &str) {
        let Some(p) = self.network.node(source).and_then(Node::observed) else {
            return;
        };
        let threshold = -self.options.reaction_time;
        let decided =
            |l: &Label| l.state_of(p).is_some_and(|state| state != State::Unknown);
        let ordinary: Vec<(Label, i32)> = self
            .ordinary_snapshot(source, dest)
            .into_iter()
            .filter(|(l, v)| decided(l) && *v <= threshold)
            .map(|(l, v)| (l.remove(p), v))
            .collect();
        for (label, value) in ordinary {
            if self.merge_ordinary(source, dest, label, value) {
                self.counters.r0_calls += 1;
            }
        }
        let upper: Vec<(ALabel, Label, i32)> = self
            .upper_snapshot(source, dest)
            .into_iter()
            .filter(|(_, l, v)| decided(l) && *v <= threshold)
            .map(|(n, l, v)| (n, l.remove(p), v))
            .collect();
        for (names, label, value) in upper {
            if self.merge_upper(source, dest, names, label, value) {
                self.counters.r0_calls += 1;
            }
        }
    }

    /// R3: a non-positive bound from the observer of `p` into `dest` lets
    /// every entry of `source → dest` conditioned on `p` shed that literal,
    /// at the cost of weakening the value to the max of the two bounds.
    ///
    /// The edge is taken both as the rewrite target (combining with every
    /// observer edge into `dest`) and, when `source` is itself an observer,
    /// as the premise rewriting its sibling edges into `dest`.
    pub(crate) fn apply_r3(&mut self, source: &str, dest: &str) {
        let dagger = dest == self.network.zero();

        // This edge as the rewrite target.
        let target_values = self.ordinary_snapshot(source, dest);
        if !target_values.is_empty() {
            let observers: Vec<(String, char)> = self
                .network
                .observers()
                .filter(|n| n.name() != source && n.name() != dest)
                .filter_map(|n| n.observed().map(|p| (n.name().to_owned(), p)))
                .collect();
            for (obs, p) in observers {
                let obs_values = self.ordinary_snapshot(&obs, dest);
                for (label, value) in r3_derivations(p, &obs_values, &target_values, dagger) {
                    if self.merge_ordinary(source, dest, label, value) {
                        self.counters.r3_calls += 1;
                    }
                }
            }
        }

        // This edge as the observation premise.
        let Some(p) = self.network.node(source).and_then(Node::observed) else {
            return;
        };
        let obs_values = self.ordinary_snapshot(source, dest);
        if obs_values.is_empty() {
            return;
        }
        let targets: Vec<String> = self
            .predecessors(dest)
            .into_iter()
            .filter(|s| s != source && s != dest)
            .collect();
        for target in targets {
            let target_values = self.ordinary_snapshot(&target, dest);
            for (label, value) in r3_derivations(p, &obs_values, &target_values, dagger) {
                if self.merge_ordinary(&target, dest, label, value) {
                    self.counters.r3_calls += 1;
                }
            }
        }
    }

    /// Labeled-value propagation: entries of `A → B` and `B → C` combine
    /// into `A → C` under the extended conjunction of their labels.
    pub(crate) fn apply_propagation(&mut self, source: &str, dest: &str) -> Result<(), Error> {
        let zero = self.network.zero().to_owned();

        // This edge as the first leg.
        let first = self.ordinary_snapshot(source, dest);
        if !first.is_empty() {
            for next in self.successors(dest) {
                if self.options.propagate_only_to_z && next != zero {
                    continue;
                }
                let second = self.ordinary_snapshot(dest, &next);
                self.propagate_pair(source, &next, &first, &second)?;
            }
        }

        // This edge as the second leg.
        let second = self.ordinary_snapshot(source, dest);
        if !second.is_empty() && (!self.options.propagate_only_to_z || dest == zero) {
            for prev in self.predecessors(source) {
                let first = self.ordinary_snapshot(&prev, source);
                self.propagate_pair(&prev, dest, &first, &second)?;
            }
        }
        Ok(())
    }

    fn propagate_pair(
        &mut self,
        from: &str,
        to: &str,
        first: &[(Label, i32)],
        second: &[(Label, i32)],
    ) -> Result<(), Error> {
        for (l1, u) in first {
            for (l2, v) in second {
                let label = l1.conjunction_extended(l2);
                let Some(sum) = self.bounded_sum(*u, *v, from, to, label)? else {
                    continue;
                };
                // Unknown-labeled entries only matter while negative: they
                // exist to expose q-loops, not to constrain scenarios.
                if label.contains_unknown() && sum >= 0 {
                    continue;
                }
                if from == to && sum >= 0 {
                    continue;
                }
                if self.merge_ordinary(from, to, label, sum) {
                    self.counters.labeled_value_propagation_calls += 1;
                }
            }
        }
        Ok(())
    }

    /// Upper-case propagation: an ordinary leg followed by an upper-case
    /// leg yields an upper-case bound carrying the same contingent names.
    pub(crate) fn apply_upper_case(&mut self, source: &str, dest: &str) -> Result<(), Error> {
        let zero = self.network.zero().to_owned();

        let first = self.ordinary_snapshot(source, dest);
        if !first.is_empty() {
            for next in self.successors(dest) {
                if self.options.propagate_only_to_z && next != zero {
                    continue;
                }
                let second = self.upper_snapshot(dest, &next);
                self.propagate_upper_pair(source, &next, &first, &second)?;
            }
        }

        let second = self.upper_snapshot(source, dest);
        if !second.is_empty() && (!self.options.propagate_only_to_z || dest == zero) {
            for prev in self.predecessors(source) {
                let first = self.ordinary_snapshot(&prev, source);
                self.propagate_upper_pair(&prev, dest, &first, &second)?;
            }
        }
        Ok(())
    }

    fn propagate_upper_pair(
        &mut self,
        from: &str,
        to: &str,
        first: &[(Label, i32)],
        second: &[(ALabel, Label, i32)],
    ) -> Result<(), Error> {
        for (l1, u) in first {
            for (names, l2, v) in second {
                let label = l1.conjunction_extended(l2);
                let Some(sum) = self.bounded_sum(*u, *v, from, to, label)? else {
                    continue;
                };
                if label.contains_unknown() && sum >= 0 {
                    continue;
                }
                if from == to && sum >= 0 {
                    continue;
                }
                if self.merge_upper(from, to, *names, label, sum) {
                    self.counters.upper_case_propagation_calls += 1;
                }
            }
        }
        Ok(())
    }

    /// Lower-case propagation (Morris): a negative bound leaving a
    /// contingent time-point combines with the link's minimal duration into
    /// a bound leaving the activation, since the contingent event may fire
    /// that early and the constraint must already hold then. The cross-case
    /// variant carries upper-case names not naming this link.
    pub(crate) fn apply_lower_case(&mut self, source: &str, dest: &str) -> Result<(), Error> {
        let links: Vec<(String, u8, Label, i32)> = self
            .network
            .contingent_edges()
            .filter(|(_, contingent, _)| *contingent == source)
            .filter_map(|(activation, _, e)| {
                let lc = e.lower_case()?;
                let index = lc.letter.indices().next()?;
                Some((activation.to_owned(), index, lc.label, lc.value))
            })
            .collect();
        if links.is_empty() {
            return Ok(());
        }
        let ordinary = self.ordinary_snapshot(source, dest);
        let upper = self.upper_snapshot(source, dest);
        for (activation, letter, link_label, x) in links {
            for (l, v) in &ordinary {
                if *v >= 0 {
                    continue;
                }
                let label = l.conjunction_extended(&link_label);
                let Some(sum) = self.bounded_sum(x, *v, &activation, dest, label)? else {
                    continue;
                };
                if label.contains_unknown() && sum >= 0 {
                    continue;
                }
                if activation == dest && sum >= 0 {
                    continue;
                }
                if self.merge_ordinary(&activation, dest, label, sum) {
                    self.counters.lower_case_propagation_calls += 1;
                }
            }
            for (names, l, v) in &upper {
                if *v >= 0 || names.contains_index(letter) {
                    continue;
                }
                let label = l.conjunction_extended(&link_label);
                let Some(sum) = self.bounded_sum(x, *v, &activation, dest, label)? else {
                    continue;
                };
                if label.contains_unknown() && sum >= 0 {
                    continue;
                }
                if activation == dest && sum >= 0 {
                    continue;
                }
                if self.merge_upper(&activation, dest, *names, label, sum) {
                    self.counters.lower_case_propagation_calls += 1;
                }
            }
        }
        Ok(())
    }

    /// Letter removal (Morris): an upper-case bound into an activation that
    /// is no tighter than the link's minimal duration cannot actually be
    /// forced by that contingent link taking its maximum, so the letter is
    /// dropped.
    pub(crate) fn apply_letter_removal(&mut self, source: &str, dest: &str) {
        let links: Vec<(u8, Label, i32)> = self
            .network
            .contingent_edges()
            .filter(|(activation, _, _)| *activation == dest)
            .filter_map(|(_, _, e)| {
                let lc = e.lower_case()?;
                let index = lc.letter.indices().next()?;
                Some((index, lc.label, lc.value))
            })
            .collect();
        if links.is_empty() {
            return;
        }
        let entries = self.upper_snapshot(source, dest);
        for (letter, link_label, x) in links {
            for (names, label, value) in &entries {
                if !names.contains_index(letter) || *value < -x {
                    continue;
                }
                let remaining = names.remove_index(letter);
                let label = label.conjunction_extended(&link_label);
                let changed = if remaining.is_empty() {
                    self.merge_ordinary(source, dest, label, *value)
                } else {
                    self.merge_upper(source, dest, remaining, label, *value)
                };
                if changed {
                    self.counters.letter_removal_calls += 1;
                }
            }
        }
    }

    /// Drains the self-loop edges touched since the last call, inspecting
    /// each; stops early once a fatal loop is found.
    pub(crate) fn settle_loops(&mut self) {
        while let Some(node) = self.dirty_loops.pop() {
            self.inspect_self_loop(&node);
            if self.negative_loop.is_some() {
                self.dirty_loops.clear();
                return;
            }
        }
    }

    /// Negative self-loop semantics: a negative bound on `node → node`
    /// under a label that is not entirely unknown is a negative cycle. An
    /// all-unknown one is a Q-loop, handled per the configured policy.
    /// Bounds whose label contradicts the node's own execution label are
    /// vacuous; the node never executes in those scenarios.
    pub(crate) fn inspect_self_loop(&mut self, node: &str) {
        let node_label = self
            .network
            .node(node)
            .map_or(Label::EMPTY, |n| *n.label());
        let Some(edge) = self.network.edge(node, node) else {
            return;
        };
        let tightest = edge.values().min_value_consistent_with(&node_label);
        let ordinary: Vec<(Label, i32)> = if tightest.is_some_and(|v| v < 0) {
            edge.values()
                .iter()
                .filter(|(l, v)| *v < 0 && l.is_consistent_with(&node_label))
                .map(|(l, v)| (*l, v))
                .collect()
        } else {
            Vec::new()
        };
        let upper: Vec<(ALabel, Label, i32)> = edge
            .upper_case_entries()
            .filter(|(_, l, v)| *v < 0 && l.is_consistent_with(&node_label))
            .map(|(n, l, v)| (n, *l, v))
            .collect();
        for (label, value) in ordinary {
            if self.resolve_loop(node, label, value, None) {
                return;
            }
        }
        for (names, label, value) in upper {
            if self.resolve_loop(node, label, value, Some(names)) {
                return;
            }
        }
    }

    /// Returns `true` if the loop is fatal.
    fn resolve_loop(
        &mut self,
        node: &str,
        label: Label,
        value: i32,
        names: Option<ALabel>,
    ) -> bool {
        if !label.all_unknown() || self.options.qloop_policy == QLoopPolicy::RejectImmediately {
            self.negative_loop = Some(NegativeLoop {
                node: node.to_owned(),
                label,
                value,
            });
            return true;
        }
        // Q-loop: the scenario is still undecided, so collapse the bound to
        // -∞ and let it propagate until it either resolves or meets a
        // decided label.
        if value != NEG_INFINITY {
            let _ = match names {
                None => self.merge_ordinary(node, node, label, NEG_INFINITY),
                Some(names) => self.merge_upper(node, node, names, label, NEG_INFINITY),
            };
        }
        if let Some(n) = self.network.node_mut(node) {
            if n.merge_potential(label, NEG_INFINITY) {
                self.counters.potential_updates += 1;
            }
        }
        false
    }
}

/// α/β/γ decomposition of R3: `obs_values` are the observer's bounds into
/// the shared destination, `target_values` the entries being rewritten.
/// `dagger` (destination is the zero time-point) switches to the extended
/// conjunction, letting unknown literals survive.
fn r3_derivations(
    p: char,
    obs_values: &[(Label, i32)],
    target_values: &[(Label, i32)],
    dagger: bool,
) -> Vec<(Label, i32)> {
    let mut out = Vec::new();
    for (obs_label, w) in obs_values {
        // Entries conditioned on p itself are R0's business, not a premise.
        if *w > 0 || obs_label.contains_proposition(p) {
            continue;
        }
        let beta = *obs_label;
        for (label, v) in target_values {
            if label.state_of(p).is_none() {
                continue;
            }
            let alpha = label.remove(p);
            let derived = if dagger {
                Some(beta.conjunction_extended(&alpha))
            } else {
                beta.conjunction(&alpha)
            };
            let Some(derived) = derived else {
                continue;
            };
            out.push((derived, (*w).max(*v)));
        }
    }
    out
}
