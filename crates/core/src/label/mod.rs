//! Propositional labels: scenario descriptors for conditional constraints.
//!
//! A [`Label`] is a duplicate-free conjunction of [`Literal`]s over a fixed
//! alphabet of at most 32 propositions (`a..=z` then `A..=F`). Each literal
//! carries one of three states: *straight* (`p`), *negated* (`¬p`), or
//! *unknown* (`¿p`). The unknown state only arises during propagation, when
//! two derived constraints disagree on a proposition whose observation has
//! not happened yet.
//!
//! Labels are packed into three machine words (presence, polarity, unknown),
//! so conjunction, subsumption, and consistency are a handful of bit
//! operations rather than literal scans. This keeps the checker's inner loop
//! cheap and makes labels freely copyable.
//!
//! The empty label `⊡` is the identity of conjunction and is subsumed by
//! every label.

use core::fmt;
use core::str::FromStr;

pub mod alabel;
pub mod map;

pub use alabel::{ALabel, ALabelAlphabet};
pub use map::{LabeledIntMap, TombstoneSet, NEG_INFINITY};

/// Maximum number of distinct propositions a label can mention.
///
/// Bound by the 32-bit words backing [`Label`]. Exceeding it is a checked
/// construction error, never silent truncation.
pub const MAX_PROPOSITIONS: usize = 32;

/// Returns the bit index of a proposition character, or `None` if the
/// character is outside the alphabet `a..=z A..=F`.
#[must_use]
pub const fn proposition_index(proposition: char) -> Option<u8> {
    match proposition {
        'a'..='z' => Some(proposition as u8 - b'a'),
        'A'..='F' => Some(proposition as u8 - b'A' + 26),
        _ => None,
    }
}

/// Returns the proposition character for a bit index below
/// [`MAX_PROPOSITIONS`].
#[must_use]
pub const fn proposition_char(index: u8) -> Option<char> {
    match index {
        0..=25 => Some((b'a' + index) as char),
        26..=31 => Some((b'A' + index - 26) as char),
        _ => None,
    }
}

/// Truth state of a proposition inside a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// The proposition must be observed true.
    Straight,
    /// The proposition must be observed false.
    Negated,
    /// The proposition's value is not yet decided in this scenario.
    Unknown,
}

/// A single proposition with its state. Immutable value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    proposition: char,
    state: State,
}

impl Literal {
    /// Creates a literal, or `None` if `proposition` is outside the alphabet.
    #[must_use]
    pub const fn new(proposition: char, state: State) -> Option<Self> {
        match proposition_index(proposition) {
            Some(_) => Some(Self { proposition, state }),
            None => None,
        }
    }

    /// Straight literal `p`.
    #[must_use]
    pub const fn straight(proposition: char) -> Option<Self> {
        Self::new(proposition, State::Straight)
    }

    /// Negated literal `¬p`.
    #[must_use]
    pub const fn negated(proposition: char) -> Option<Self> {
        Self::new(proposition, State::Negated)
    }

    /// Unknown literal `¿p`.
    #[must_use]
    pub const fn unknown(proposition: char) -> Option<Self> {
        Self::new(proposition, State::Unknown)
    }

    #[must_use]
    pub const fn proposition(&self) -> char {
        self.proposition
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Flips Straight to Negated and vice versa.
    ///
    /// Undefined for Unknown literals, which have no complement; returns
    /// `None` in that case.
    #[must_use]
    pub const fn complement(&self) -> Option<Self> {
        let state = match self.state {
            State::Straight => State::Negated,
            State::Negated => State::Straight,
            State::Unknown => return None,
        };
        Some(Self {
            proposition: self.proposition,
            state,
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            State::Straight => write!(f, "{}", self.proposition),
            State::Negated => write!(f, "¬{}", self.proposition),
            State::Unknown => write!(f, "¿{}", self.proposition),
        }
    }
}

/// A conjunction of literals over at most 32 distinct propositions.
///
/// Internally three bitsets: `present` marks which propositions occur,
/// `negated` and `unknown` (both subsets of `present`, mutually disjoint)
/// encode the state. A proposition occurs in exactly one state.
///
/// `Ord` is derived over the raw words; it is an arbitrary total order used
/// only to keep labeled containers deterministic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    present: u32,
    negated: u32,
    unknown: u32,
}

impl Label {
    /// The empty label `⊡`, satisfied by every scenario.
    pub const EMPTY: Self = Self {
        present: 0,
        negated: 0,
        unknown: 0,
    };

    /// Builds a label from literals.
    ///
    /// Returns `None` if two literals assign different states to the same
    /// proposition.
    #[must_use]
    pub fn from_literals<I>(literals: I) -> Option<Self>
    where
        I: IntoIterator<Item = Literal>,
    {
        let mut label = Self::EMPTY;
        for literal in literals {
            let bit = 1u32 << proposition_index(literal.proposition)?;
            if label.present & bit != 0 {
                if label.state_bits(bit) != literal.state {
                    return None;
                }
                continue;
            }
            label.present |= bit;
            match literal.state {
                State::Straight => {}
                State::Negated => label.negated |= bit,
                State::Unknown => label.unknown |= bit,
            }
        }
        Some(label)
    }

    fn state_bits(&self, bit: u32) -> State {
        if self.unknown & bit != 0 {
            State::Unknown
        } else if self.negated & bit != 0 {
            State::Negated
        } else {
            State::Straight
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.present == 0
    }

    /// Number of literals in the conjunction.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.present.count_ones() as usize
    }

    /// Returns the state of `proposition` in this label, if present.
    #[must_use]
    pub fn state_of(&self, proposition: char) -> Option<State> {
        let bit = 1u32 << proposition_index(proposition)?;
        (self.present & bit != 0).then(|| self.state_bits(bit))
    }

    /// Returns `true` if the label mentions `proposition` in any state.
    #[must_use]
    pub fn contains_proposition(&self, proposition: char) -> bool {
        self.state_of(proposition).is_some()
    }

    /// Returns `true` if any literal is in the Unknown state.
    #[must_use]
    pub const fn contains_unknown(&self) -> bool {
        self.unknown != 0
    }

    /// Returns `true` if the label is non-empty and every literal is Unknown.
    #[must_use]
    pub const fn all_unknown(&self) -> bool {
        self.present != 0 && self.unknown == self.present
    }

    /// Returns a copy of this label without `proposition` (in any state).
    #[must_use]
    pub fn remove(&self, proposition: char) -> Self {
        let Some(index) = proposition_index(proposition) else {
            return *self;
        };
        let mask = !(1u32 << index);
        Self {
            present: self.present & mask,
            negated: self.negated & mask,
            unknown: self.unknown & mask,
        }
    }

    /// Strict conjunction.
    ///
    /// Fails (returns `None`) if the labels assign opposite straight/negated
    /// states to a shared proposition, or if either label contains an
    /// Unknown literal: strict conjunction is only defined between fully
    /// decided scenarios.
    #[must_use]
    pub const fn conjunction(&self, other: &Self) -> Option<Self> {
        if self.unknown != 0 || other.unknown != 0 {
            return None;
        }
        if (self.present & other.present) & (self.negated ^ other.negated) != 0 {
            return None;
        }
        Some(Self {
            present: self.present | other.present,
            negated: self.negated | other.negated,
            unknown: 0,
        })
    }

    /// Extended conjunction: never fails.
    ///
    /// Where the labels assign opposite straight/negated states to a shared
    /// proposition, the result carries the proposition in the Unknown state
    /// ("don't know yet"). Unknown literals on either side survive.
    #[must_use]
    pub const fn conjunction_extended(&self, other: &Self) -> Self {
        let present = self.present | other.present;
        let conflict = (self.present & other.present) & (self.negated ^ other.negated);
        let unknown = (self.unknown | other.unknown | conflict) & present;
        let negated = (self.negated | other.negated) & present & !unknown;
        Self {
            present,
            negated,
            unknown,
        }
    }

    /// Returns `true` if every literal of `other` occurs in `self` with the
    /// same state (`self` is at least as specific as `other`).
    ///
    /// Every label subsumes `⊡`; `⊡` subsumes only itself.
    #[must_use]
    pub const fn subsumes(&self, other: &Self) -> bool {
        other.present & !self.present == 0
            && (self.negated ^ other.negated) & other.present == 0
            && (self.unknown ^ other.unknown) & other.present == 0
    }

    /// Returns `true` if no shared proposition has opposite straight/negated
    /// states in the two labels. Unknown is compatible with every state.
    #[must_use]
    pub const fn is_consistent_with(&self, other: &Self) -> bool {
        let shared = self.present & other.present;
        shared & (self.negated ^ other.negated) & !(self.unknown | other.unknown) == 0
    }

    /// Extracts the part of `self` whose propositions do (`in_common ==
    /// true`) or do not (`in_common == false`) occur in `other`, regardless
    /// of state. Used by the α/β/γ decomposition of rule R3.
    #[must_use]
    pub const fn sub_label_in(&self, other: &Self, in_common: bool) -> Self {
        let mask = if in_common {
            other.present
        } else {
            !other.present
        };
        Self {
            present: self.present & mask,
            negated: self.negated & mask,
            unknown: self.unknown & mask,
        }
    }

    /// If `self` and `other` differ only in the straight/negated polarity of
    /// exactly one literal, returns the common label with that literal
    /// removed. This is the propositional-simplification step of the labeled
    /// map: `(pq, v)` and `(p¬q, v)` jointly mean `(p, v)`.
    #[must_use]
    pub const fn polarity_sibling(&self, other: &Self) -> Option<Self> {
        if self.present != other.present || self.unknown != other.unknown {
            return None;
        }
        let diff = self.negated ^ other.negated;
        if diff.count_ones() != 1 {
            return None;
        }
        Some(Self {
            present: self.present & !diff,
            negated: self.negated & !diff,
            unknown: self.unknown,
        })
    }

    /// Iterates the literals in proposition-index order.
    pub fn literals(&self) -> impl Iterator<Item = Literal> + '_ {
        (0u8..32).filter_map(move |index| {
            let bit = 1u32 << index;
            if self.present & bit == 0 {
                return None;
            }
            Some(Literal {
                proposition: proposition_char(index)?,
                state: self.state_bits(bit),
            })
        })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "⊡");
        }
        for literal in self.literals() {
            write!(f, "{literal}")?;
        }
        Ok(())
    }
}

/// Error parsing a label from its textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseLabelError {
    /// A character outside the proposition alphabet.
    UnknownProposition(char),
    /// A `¬`/`!` or `¿`/`?` modifier with no proposition after it.
    DanglingModifier,
    /// The same proposition appears twice with different states.
    ConflictingStates(char),
}

impl fmt::Display for ParseLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProposition(c) => write!(f, "unknown proposition {c:?}"),
            Self::DanglingModifier => write!(f, "modifier with no proposition"),
            Self::ConflictingStates(c) => {
                write!(f, "proposition {c:?} appears with conflicting states")
            }
        }
    }
}

impl core::error::Error for ParseLabelError {}

impl FromStr for Label {
    type Err = ParseLabelError;

    /// Parses `"⊡"` or the empty string as the empty label, otherwise a
    /// sequence of literals such as `"p¬q¿r"`. ASCII `!` and `?` are
    /// accepted for `¬` and `¿`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut literals = Vec::new();
        let mut pending: Option<State> = None;
        for c in s.chars() {
            match c {
                '⊡' if literals.is_empty() && pending.is_none() => return Ok(Self::EMPTY),
                '¬' | '!' if pending.is_none() => pending = Some(State::Negated),
                '¿' | '?' if pending.is_none() => pending = Some(State::Unknown),
                c => {
                    let state = pending.take().unwrap_or(State::Straight);
                    let literal =
                        Literal::new(c, state).ok_or(ParseLabelError::UnknownProposition(c))?;
                    literals.push(literal);
                }
            }
        }
        if pending.is_some() {
            return Err(ParseLabelError::DanglingModifier);
        }
        let conflicting = literals
            .iter()
            .find(|l| literals.iter().any(|m| m.proposition == l.proposition && m.state != l.state))
            .map(|l| l.proposition);
        Self::from_literals(literals).ok_or_else(|| {
            ParseLabelError::ConflictingStates(conflicting.unwrap_or('?'))
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Label {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "schemars")]
impl schemars::JsonSchema for Label {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "Label".into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        // Textual form, e.g. "p!q"; "⊡" or "" is the empty label.
        <String as schemars::JsonSchema>::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        s.parse().expect("test label must parse")
    }

    #[test]
    fn conjunction_is_commutative() {
        let a = label("p¬q");
        let b = label("r");
        assert_eq!(a.conjunction(&b), b.conjunction(&a));
        assert_eq!(a.conjunction_extended(&b), b.conjunction_extended(&a));
    }

    #[test]
    fn conjunction_with_empty_is_identity() {
        let a = label("p¬qr");
        assert_eq!(a.conjunction(&Label::EMPTY), Some(a));
        assert_eq!(Label::EMPTY.conjunction(&a), Some(a));
    }

    #[test]
    fn conjunction_of_opposite_literals_is_inconsistent() {
        let a = label("pq");
        let b = label("¬p");
        assert_eq!(a.conjunction(&b), None);
    }

    #[test]
    fn conjunction_rejects_unknown_literals() {
        let a = label("¿p");
        let b = label("q");
        assert_eq!(a.conjunction(&b), None);
    }

    #[test]
    fn extended_conjunction_turns_conflicts_unknown() {
        let a = label("pq");
        let b = label("¬pr");
        let c = a.conjunction_extended(&b);
        assert_eq!(c, label("¿pqr"));
        assert!(c.contains_unknown());
        assert!(!c.all_unknown());
    }

    #[test]
    fn subsumption_is_reflexive_and_transitive() {
        let a = label("p¬qr");
        let b = label("p¬q");
        let c = label("p");
        assert!(a.subsumes(&a));
        assert!(a.subsumes(&b));
        assert!(b.subsumes(&c));
        assert!(a.subsumes(&c));
        assert!(!c.subsumes(&b));
    }

    #[test]
    fn everything_subsumes_empty() {
        assert!(label("p").subsumes(&Label::EMPTY));
        assert!(Label::EMPTY.subsumes(&Label::EMPTY));
        assert!(!Label::EMPTY.subsumes(&label("p")));
    }

    #[test]
    fn subsumption_distinguishes_states() {
        assert!(!label("p").subsumes(&label("¬p")));
        assert!(!label("¿p").subsumes(&label("p")));
        assert!(label("¿pq").subsumes(&label("¿p")));
    }

    #[test]
    fn consistency_ignores_unknown() {
        assert!(label("p").is_consistent_with(&label("¿p")));
        assert!(label("¬p").is_consistent_with(&label("¿pq")));
        assert!(!label("p").is_consistent_with(&label("¬p")));
        assert!(label("pq").is_consistent_with(&label("p¬r")));
    }

    #[test]
    fn complement_flips_polarity() {
        let p = Literal::straight('p').unwrap();
        assert_eq!(p.complement(), Literal::negated('p'));
        assert_eq!(Literal::unknown('p').unwrap().complement(), None);
    }

    #[test]
    fn remove_strips_any_state() {
        assert_eq!(label("p¬q").remove('q'), label("p"));
        assert_eq!(label("¿pq").remove('p'), label("q"));
        assert_eq!(label("p").remove('z'), label("p"));
    }

    #[test]
    fn sub_label_in_splits_by_shared_propositions() {
        let a = label("p¬qr");
        let b = label("q¬s");
        assert_eq!(a.sub_label_in(&b, true), label("¬q"));
        assert_eq!(a.sub_label_in(&b, false), label("pr"));
    }

    #[test]
    fn polarity_sibling_requires_exactly_one_flip() {
        assert_eq!(label("pq").polarity_sibling(&label("p¬q")), Some(label("p")));
        assert_eq!(label("p").polarity_sibling(&label("¬p")), Some(Label::EMPTY));
        assert_eq!(label("pq").polarity_sibling(&label("¬p¬q")), None);
        assert_eq!(label("pq").polarity_sibling(&label("pq")), None);
        assert_eq!(label("¿pq").polarity_sibling(&label("p¬q")), None);
        assert_eq!(label("pq").polarity_sibling(&label("p¬r")), None);
    }

    #[test]
    fn display_and_parse_round_trip() {
        for s in ["⊡", "p", "¬q", "¿r", "p¬q¿r", "aB"] {
            let l = label(s);
            assert_eq!(l.to_string().parse::<Label>(), Ok(l));
        }
        assert_eq!("".parse::<Label>(), Ok(Label::EMPTY));
        assert_eq!(label("!q"), label("¬q"));
        assert_eq!(label("?r"), label("¿r"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            "p;".parse::<Label>(),
            Err(ParseLabelError::UnknownProposition(';'))
        );
        assert_eq!("p¬".parse::<Label>(), Err(ParseLabelError::DanglingModifier));
        assert_eq!(
            "p¬p".parse::<Label>(),
            Err(ParseLabelError::ConflictingStates('p'))
        );
    }

    #[test]
    fn alphabet_covers_32_propositions() {
        for index in 0..32 {
            let c = proposition_char(index).unwrap();
            assert_eq!(proposition_index(c), Some(index));
        }
        assert_eq!(proposition_index('G'), None);
        assert_eq!(proposition_char(32), None);
    }
}
