//! Minimal labeled-value maps.
//!
//! A [`LabeledIntMap`] maps [`Label`]s to integer distance bounds and keeps
//! itself **minimal**: no stored entry `(L1, v1)` is dominated by another
//! entry `(L2, v2)` with `L1.subsumes(L2)` and `v1 >= v2` (the more general
//! label already promises an equal-or-tighter bound). Every insertion
//! re-establishes the invariant, which may delete other entries, and may
//! collapse two entries whose labels differ by exactly one literal's
//! polarity into a single entry over the common sub-label when their values
//! are equal (propositional simplification: `(pq, v)` and `(p¬q, v)` become
//! `(p, v)`).
//!
//! Rule application must also be **monotone**: once a fact `(L, v)` has been
//! superseded, rediscovering a weaker version of it must not re-enter the
//! map, or the checker could oscillate. That memory lives in a
//! [`TombstoneSet`] owned by the edge and threaded explicitly through
//! [`LabeledIntMap::merge`], stamped with the generation of the rule
//! application that caused each removal, so the monotonicity argument is
//! auditable per call. Plain [`LabeledIntMap::put`] has no such memory and
//! is meant for loaders and tests.

use std::collections::BTreeMap;
use std::fmt;

use super::Label;

/// Sentinel for `-∞`, the bound a value collapses to once it falls beyond
/// the network horizon. All arithmetic on labeled values happens in `i64`
/// and is clamped before being stored, so the sentinel never overflows.
pub const NEG_INFINITY: i32 = i32::MIN;

/// Remembrance of entries removed from a [`LabeledIntMap`] by rule
/// application: label → (best value the map ever held for it, generation of
/// the rule application that removed it).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TombstoneSet {
    removed: BTreeMap<Label, (i32, u64)>,
}

impl TombstoneSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a previously removed entry for an equal-or-more
    /// general label already covered an equal-or-better value, i.e. the
    /// candidate `(label, value)` is a weaker rediscovery.
    #[must_use]
    pub fn covers(&self, label: &Label, value: i32) -> bool {
        self.removed
            .iter()
            .any(|(tomb, &(v, _))| label.subsumes(tomb) && v <= value)
    }

    /// Records a removed entry, keeping the best (lowest) value per label.
    pub fn record(&mut self, label: Label, value: i32, generation: u64) {
        let slot = self.removed.entry(label).or_insert((value, generation));
        if value < slot.0 {
            *slot = (value, generation);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// A self-minimizing map from [`Label`] to integer bound.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LabeledIntMap {
    entries: BTreeMap<Label, i32>,
}

impl LabeledIntMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-label lookup.
    #[must_use]
    pub fn get(&self, label: &Label) -> Option<i32> {
        self.entries.get(label).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&Label, i32)> + '_ {
        self.entries.iter().map(|(l, &v)| (l, v))
    }

    /// The tightest bound in the map, regardless of label.
    #[must_use]
    pub fn min_value(&self) -> Option<i32> {
        self.entries.values().min().copied()
    }

    /// The tightest bound among entries whose label is consistent with
    /// `label` (the query scenario does not contradict the entry).
    #[must_use]
    pub fn min_value_consistent_with(&self, label: &Label) -> Option<i32> {
        self.entries
            .iter()
            .filter(|(l, _)| l.is_consistent_with(label))
            .map(|(_, &v)| v)
            .min()
    }

    /// The tightest bound among entries whose label is subsumed by `label`
    /// (entries guaranteed to apply in the query scenario).
    #[must_use]
    pub fn min_value_subsumed_by(&self, label: &Label) -> Option<i32> {
        self.entries
            .iter()
            .filter(|(l, _)| label.subsumes(l))
            .map(|(_, &v)| v)
            .min()
    }

    /// Returns `true` if `(label, value)` is already implied by a stored
    /// entry with an equal-or-more-general label and equal-or-better value.
    #[must_use]
    pub fn is_dominated(&self, label: &Label, value: i32) -> bool {
        self.min_value_subsumed_by(label).is_some_and(|v| v <= value)
    }

    /// Inserts `(label, value)`, enforcing minimality.
    ///
    /// Returns `true` if the map changed. A dominated candidate is rejected;
    /// an accepted candidate removes every entry it dominates and then runs
    /// propositional simplification to a fixpoint.
    pub fn put(&mut self, label: Label, value: i32) -> bool {
        let mut removed = Vec::new();
        self.put_collecting(label, value, &mut removed)
    }

    /// Inserts like [`put`](Self::put) while respecting and extending
    /// `tombstones`: a candidate covered by a previously removed entry is
    /// rejected outright, and entries removed by this insertion are recorded
    /// with the given `generation` stamp.
    pub fn merge(
        &mut self,
        label: Label,
        value: i32,
        tombstones: &mut TombstoneSet,
        generation: u64,
    ) -> bool {
        if tombstones.covers(&label, value) {
            return false;
        }
        let mut removed = Vec::new();
        let changed = self.put_collecting(label, value, &mut removed);
        for (l, v) in removed {
            tombstones.record(l, v, generation);
        }
        changed
    }

    /// Removes the exact entry for `label`, returning its value.
    pub fn remove(&mut self, label: &Label) -> Option<i32> {
        self.entries.remove(label)
    }

    fn put_collecting(
        &mut self,
        label: Label,
        value: i32,
        removed: &mut Vec<(Label, i32)>,
    ) -> bool {
        if self.is_dominated(&label, value) {
            return false;
        }
        let dominated: Vec<Label> = self
            .entries
            .iter()
            .filter(|(l, &v)| l.subsumes(&label) && v >= value)
            .map(|(l, _)| *l)
            .collect();
        for l in dominated {
            if let Some(v) = self.entries.remove(&l) {
                removed.push((l, v));
            }
        }
        let _ = self.entries.insert(label, value);
        self.simplify(removed);
        true
    }

    /// Collapses pairs of entries that differ by exactly one literal's
    /// polarity and carry equal values into the common sub-label, repeating
    /// until no such pair remains. The collapsed entry is re-inserted
    /// through the minimality path, so collapses can cascade.
    fn simplify(&mut self, removed: &mut Vec<(Label, i32)>) {
        loop {
            let items: Vec<(Label, i32)> = self.entries.iter().map(|(l, &v)| (*l, v)).collect();
            let mut collapse = None;
            'search: for (i, (l1, v1)) in items.iter().enumerate() {
                for (l2, v2) in &items[i + 1..] {
                    if v1 == v2 {
                        if let Some(common) = l1.polarity_sibling(l2) {
                            collapse = Some((*l1, *l2, common, *v1));
                            break 'search;
                        }
                    }
                }
            }
            let Some((l1, l2, common, v)) = collapse else {
                break;
            };
            for l in [l1, l2] {
                if let Some(old) = self.entries.remove(&l) {
                    removed.push((l, old));
                }
            }
            let _ = self.put_collecting(common, v, removed);
        }
    }

    /// Debug check of the minimality invariant: no entry dominates another.
    #[must_use]
    pub fn is_minimal(&self) -> bool {
        self.entries.iter().all(|(l1, &v1)| {
            self.entries
                .iter()
                .all(|(l2, &v2)| (l1, v1) == (l2, v2) || !(l1.subsumes(l2) && v1 >= v2))
        })
    }
}

impl fmt::Display for LabeledIntMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (label, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if value == NEG_INFINITY {
                write!(f, "({label}, -∞)")?;
            } else {
                write!(f, "({label}, {value})")?;
            }
        }
        write!(f, "}}")
    }
}

impl FromIterator<(Label, i32)> for LabeledIntMap {
    fn from_iter<I: IntoIterator<Item = (Label, i32)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (label, value) in iter {
            let _ = map.put(label, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        s.parse().expect("test label must parse")
    }

    #[test]
    fn put_rejects_dominated_entries() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(Label::EMPTY, 5));
        // (p, 7) is implied by (⊡, 5): more specific label, worse value.
        assert!(!map.put(label("p"), 7));
        assert!(!map.put(Label::EMPTY, 5));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn put_removes_entries_dominated_by_newcomer() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("pq"), 3));
        assert!(map.put(label("p"), 1));
        assert_eq!(map.get(&label("pq")), None);
        assert_eq!(map.get(&label("p")), Some(1));
        assert!(map.is_minimal());
    }

    #[test]
    fn tighter_value_replaces_same_label() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("p"), 4));
        assert!(map.put(label("p"), 2));
        assert_eq!(map.get(&label("p")), Some(2));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn polarity_pair_collapses_to_common_sublabel() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("pq"), -3));
        assert!(map.put(label("p¬q"), -3));
        assert_eq!(map.get(&label("p")), Some(-3));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn collapse_cascades() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("pq"), -1));
        assert!(map.put(label("¬pq"), -1));
        assert!(map.put(label("¬q"), -1));
        // (pq,-1)+(¬pq,-1) -> (q,-1); then (q,-1)+(¬q,-1) -> (⊡,-1).
        assert_eq!(map.get(&Label::EMPTY), Some(-1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn unequal_values_do_not_collapse() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("pq"), -3));
        assert!(map.put(label("p¬q"), -5));
        assert_eq!(map.len(), 2);
        assert!(map.is_minimal());
    }

    #[test]
    fn minimality_holds_after_mixed_sequences() {
        let mut map = LabeledIntMap::new();
        let script = [
            ("⊡", 10),
            ("p", 5),
            ("¬p", 5),
            ("pq", -2),
            ("p¬q", 0),
            ("¿pq", -4),
            ("q", -2),
            ("⊡", 3),
        ];
        for (l, v) in script {
            let _ = map.put(label(l), v);
        }
        assert!(map.is_minimal());
        // (p,5)+(¬p,5) collapsed into (⊡,5), later tightened to (⊡,3).
        assert_eq!(map.get(&Label::EMPTY), Some(3));
    }

    #[test]
    fn min_value_queries() {
        let map: LabeledIntMap = [
            (label("p"), -10),
            (label("¬p"), 0),
            (label("q"), -4),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.min_value(), Some(-10));
        assert_eq!(map.min_value_consistent_with(&label("¬p")), Some(-4));
        assert_eq!(map.min_value_subsumed_by(&label("pq")), Some(-10));
        assert_eq!(map.min_value_subsumed_by(&label("¬pr")), Some(0));
        assert_eq!(map.min_value_subsumed_by(&label("r")), None);
        assert_eq!(LabeledIntMap::new().min_value(), None);
    }

    #[test]
    fn merge_respects_tombstones() {
        let mut map = LabeledIntMap::new();
        let mut tombs = TombstoneSet::new();
        assert!(map.merge(label("pq"), 3, &mut tombs, 1));
        // Tightening (p, 1) removes (pq, 3) and records it.
        assert!(map.merge(label("p"), 1, &mut tombs, 2));
        assert!(!tombs.is_empty());
        // Weaker rediscoveries of the removed fact are rejected even though
        // nothing in the map dominates them... the tombstone remembers.
        assert!(!map.merge(label("pq"), 3, &mut tombs, 3));
        assert!(!map.merge(label("pqr"), 5, &mut tombs, 3));
        // A strictly better fact under the removed label is still accepted.
        assert!(map.merge(label("pq"), 0, &mut tombs, 4));
    }

    #[test]
    fn neg_infinity_is_the_tightest_bound() {
        let mut map = LabeledIntMap::new();
        assert!(map.put(label("¿p"), -100));
        assert!(map.put(label("¿p"), NEG_INFINITY));
        assert_eq!(map.get(&label("¿p")), Some(NEG_INFINITY));
        assert!(!map.put(label("¿p"), -100));
    }
}
