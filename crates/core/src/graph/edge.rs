use std::collections::BTreeMap;

use crate::label::{ALabel, ALabelAlphabet, Label, LabeledIntMap, TombstoneSet};

/// How an edge's constraint came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstraintKind {
    /// A requirement stated by the input network.
    Requirement,
    /// One direction of a contingent link (uncontrolled duration).
    Contingent,
    /// Derived by the checker during propagation.
    Derived,
}

/// The lower-case value of a contingent edge: "the contingent time-point
/// may fire as early as `value` after its activation, in scenario `label`".
/// At most one per edge in the base semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowerCaseValue {
    /// Singleton name set of the contingent time-point.
    pub letter: ALabel,
    pub label: Label,
    pub value: i32,
}

/// A directed distance constraint between two time-points.
///
/// The ordinary labeled values mean `dest - source <= value` under the
/// entry's scenario label. Upper-case values additionally carry the
/// [`ALabel`] of the contingent time-points whose maximal duration they
/// hedge against (Morris's reduction); the lower-case value is the dual
/// early bound. Edges are mutated in place by the checker and never shared
/// between networks without a deep copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    name: String,
    kind: ConstraintKind,
    values: LabeledIntMap,
    upper_case: BTreeMap<ALabel, LabeledIntMap>,
    lower_case: Option<LowerCaseValue>,
}

impl Edge {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            kind,
            values: LabeledIntMap::new(),
            upper_case: BTreeMap::new(),
            lower_case: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ConstraintKind) {
        self.kind = kind;
    }

    /// Ordinary labeled values.
    #[must_use]
    pub const fn values(&self) -> &LabeledIntMap {
        &self.values
    }

    /// Inserts an ordinary value without tombstone memory (loader path).
    pub fn put_value(&mut self, label: Label, value: i32) -> bool {
        let changed = self.values.put(label, value);
        if changed {
            self.drop_dominated_upper_case();
        }
        changed
    }

    /// Merges an ordinary value through the edge's tombstone set.
    ///
    /// A successful merge may cascade: upper-case entries that the new,
    /// tighter unconditional bound renders redundant are dropped in the same
    /// mutation, so no caller ever observes the half-updated pair of maps.
    pub fn merge_value(
        &mut self,
        label: Label,
        value: i32,
        tombstones: &mut TombstoneSet,
        generation: u64,
    ) -> bool {
        let changed = self.values.merge(label, value, tombstones, generation);
        if changed {
            self.drop_dominated_upper_case();
        }
        changed
    }

    /// Removes the ordinary entry with exactly `label`.
    pub fn remove_value(&mut self, label: &Label) -> Option<i32> {
        self.values.remove(label)
    }

    /// Upper-case value maps, keyed by contingent-name set.
    #[must_use]
    pub const fn upper_case(&self) -> &BTreeMap<ALabel, LabeledIntMap> {
        &self.upper_case
    }

    /// Iterates all upper-case entries as `(names, label, value)`.
    pub fn upper_case_entries(&self) -> impl Iterator<Item = (ALabel, &Label, i32)> + '_ {
        self.upper_case
            .iter()
            .flat_map(|(names, map)| map.iter().map(move |(l, v)| (*names, l, v)))
    }

    /// Merges an upper-case value, enforcing dominance across name sets:
    /// an entry is useless if some entry with a subset of its names, an
    /// equal-or-more-general label, and an equal-or-better value exists
    /// (fewer letters hedge against fewer contingent maxima, so they are
    /// stronger). Ordinary values count as the empty name set.
    pub fn merge_upper_case(&mut self, names: ALabel, label: Label, value: i32) -> bool {
        if self.values.is_dominated(&label, value) {
            return false;
        }
        let dominated_by_existing = self.upper_case.iter().any(|(other, map)| {
            names.contains(other)
                && map
                    .iter()
                    .any(|(l, v)| label.subsumes(l) && v <= value)
        });
        if dominated_by_existing {
            return false;
        }
        // Drop entries the newcomer dominates.
        for (other, map) in &mut self.upper_case {
            if other.contains(&names) && *other != names {
                let doomed: Vec<Label> = map
                    .iter()
                    .filter(|(l, v)| l.subsumes(&label) && *v >= value)
                    .map(|(l, _)| *l)
                    .collect();
                for l in doomed {
                    let _ = map.remove(&l);
                }
            }
        }
        self.upper_case.retain(|_, map| !map.is_empty());
        self.upper_case.entry(names).or_default().put(label, value)
    }

    /// Inserts an upper-case value without dominance against the ordinary
    /// map (loader path). Bounds stated by the input must survive verbatim
    /// so validation can judge them as given.
    pub fn put_upper_case(&mut self, names: ALabel, label: Label, value: i32) -> bool {
        self.upper_case.entry(names).or_default().put(label, value)
    }

    /// Drops upper-case entries an ordinary value now dominates.
    fn drop_dominated_upper_case(&mut self) {
        let values = &self.values;
        for map in self.upper_case.values_mut() {
            let doomed: Vec<Label> = map
                .iter()
                .filter(|(l, v)| values.is_dominated(l, *v))
                .map(|(l, _)| *l)
                .collect();
            for l in doomed {
                let _ = map.remove(&l);
            }
        }
        self.upper_case.retain(|_, map| !map.is_empty());
    }

    /// The lower-case value, if this is the forward edge of a contingent
    /// link.
    #[must_use]
    pub const fn lower_case(&self) -> Option<&LowerCaseValue> {
        self.lower_case.as_ref()
    }

    pub fn set_lower_case(&mut self, value: LowerCaseValue) {
        self.lower_case = Some(value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.upper_case.is_empty() && self.lower_case.is_none()
    }

    /// Largest absolute finite value on this edge, for horizon computation.
    #[must_use]
    pub fn max_absolute_value(&self) -> i64 {
        let ordinary = self
            .values
            .iter()
            .map(|(_, v)| i64::from(v).abs())
            .max()
            .unwrap_or(0);
        let upper = self
            .upper_case_entries()
            .map(|(_, _, v)| i64::from(v).abs())
            .max()
            .unwrap_or(0);
        let lower = self
            .lower_case
            .map_or(0, |lc| i64::from(lc.value).abs());
        ordinary.max(upper).max(lower)
    }

    /// Human-readable rendering of the edge's constraint sets.
    #[must_use]
    pub fn describe(&self, alphabet: &ALabelAlphabet) -> String {
        let mut out = format!("{}: {}", self.name, self.values);
        for (names, label, value) in self.upper_case_entries() {
            out.push_str(&format!(" UC({}, {label}, {value})", names.to_text(alphabet)));
        }
        if let Some(lc) = &self.lower_case {
            out.push_str(&format!(
                " LC({}, {}, {})",
                lc.letter.to_text(alphabet),
                lc.label,
                lc.value
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        s.parse().expect("test label must parse")
    }

    #[test]
    fn tighter_ordinary_value_evicts_redundant_upper_case() {
        let mut edge = Edge::new("e", ConstraintKind::Requirement);
        let c = ALabel::from_index(0);
        assert!(edge.merge_upper_case(c, label("p"), -3));
        // An unconditional bound at least as tight makes the upper-case
        // entry pointless.
        assert!(edge.put_value(Label::EMPTY, -5));
        assert!(edge.upper_case().is_empty());
    }

    #[test]
    fn upper_case_rejected_when_ordinary_covers_it() {
        let mut edge = Edge::new("e", ConstraintKind::Requirement);
        assert!(edge.put_value(Label::EMPTY, -5));
        assert!(!edge.merge_upper_case(ALabel::from_index(0), label("p"), -3));
        assert!(edge.merge_upper_case(ALabel::from_index(0), label("p"), -9));
    }

    #[test]
    fn fewer_letters_dominate_more_letters() {
        let mut edge = Edge::new("e", ConstraintKind::Derived);
        let c = ALabel::from_index(0);
        let cd = c.conjunction(&ALabel::from_index(1));
        assert!(edge.merge_upper_case(cd, Label::EMPTY, -4));
        // Same bound with a subset of letters supersedes the wider set.
        assert!(edge.merge_upper_case(c, Label::EMPTY, -4));
        assert_eq!(edge.upper_case_entries().count(), 1);
        // And the reverse insertion is now useless.
        assert!(!edge.merge_upper_case(cd, Label::EMPTY, -4));
    }

    #[test]
    fn loader_upper_case_bypasses_ordinary_dominance() {
        let mut edge = Edge::new("e", ConstraintKind::Contingent);
        assert!(edge.put_value(Label::EMPTY, -5));
        // merge_upper_case would discard -3 as dominated; the loader path
        // keeps the stated bound so validation sees it.
        assert!(edge.put_upper_case(ALabel::from_index(0), Label::EMPTY, -3));
        assert_eq!(edge.upper_case_entries().count(), 1);
        assert_eq!(
            edge.upper_case_entries().next().map(|(_, _, v)| v),
            Some(-3)
        );
    }

    #[test]
    fn lower_case_round_trips() {
        let mut edge = Edge::new("e", ConstraintKind::Contingent);
        edge.set_lower_case(LowerCaseValue {
            letter: ALabel::from_index(2),
            label: label("¬p"),
            value: 2,
        });
        assert_eq!(edge.lower_case().map(|lc| lc.value), Some(2));
        assert_eq!(edge.max_absolute_value(), 2);
    }
}
