use derive_more::From;

use crate::label::Label;

/// Structural defect of the input network, detected before any mutation.
///
/// Always recoverable by the caller: fix the input and re-run the check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum WellDefinednessError {
    /// The distinguished zero time-point is missing from the node set.
    MissingZero { name: String },
    /// Two observation nodes claim the same proposition.
    DuplicatedObservation {
        proposition: char,
        first: String,
        second: String,
    },
    /// An edge (or node) label mentions a proposition no node observes.
    PropositionWithoutObserver {
        proposition: char,
        context: String,
    },
    /// A contingent edge has no counterpart in the opposite direction.
    ContingentWithoutCounterpart { source: String, dest: String },
    /// A contingent link's duration range is empty or non-positive: the
    /// lower-case value `x` must satisfy `0 < x` and the upper-case value
    /// `u` must satisfy `u <= -x` (range `[x, -u]` non-empty).
    ContingentBoundsMalformed {
        activation: String,
        contingent: String,
        lower: i32,
        upper_case: i32,
    },
    /// An input value collides with the `-∞` sentinel or its negation.
    ValueOutOfRange {
        source: String,
        dest: String,
        label: Label,
        value: i32,
    },
    /// Node labels and contingent-link labels must be fully decided.
    /// Unknown-labeled *edge entries* are legitimate: the engine writes them
    /// and a checked network may be fed back in.
    UnknownLiteralInInput { context: String, label: Label },
}

impl core::fmt::Display for WellDefinednessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingZero { name } => write!(f, "zero time-point {name:?} is missing"),
            Self::DuplicatedObservation {
                proposition,
                first,
                second,
            } => write!(
                f,
                "proposition {proposition:?} observed by both {first:?} and {second:?}"
            ),
            Self::PropositionWithoutObserver {
                proposition,
                context,
            } => write!(f, "proposition {proposition:?} in {context} has no observer"),
            Self::ContingentWithoutCounterpart { source, dest } => write!(
                f,
                "contingent edge {source:?} -> {dest:?} has no opposite counterpart"
            ),
            Self::ContingentBoundsMalformed {
                activation,
                contingent,
                lower,
                upper_case,
            } => write!(
                f,
                "contingent link {activation:?} => {contingent:?} has malformed bounds \
                 (lower-case {lower}, upper-case {upper_case})"
            ),
            Self::ValueOutOfRange {
                source,
                dest,
                label,
                value,
            } => write!(
                f,
                "edge {source:?} -> {dest:?} value ({label}, {value}) is outside the \
                 representable range"
            ),
            Self::UnknownLiteralInInput { context, label } => {
                write!(f, "{context} carries unknown literal in label {label}")
            }
        }
    }
}

impl core::error::Error for WellDefinednessError {}

/// Error returned by the checker.
///
/// A not-controllable network is *not* an error: it is the legitimate
/// negative answer, reported through the status record.
#[derive(Debug, Clone, PartialEq, Eq, From)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum Error {
    /// The input violates a structural precondition; raised before any
    /// mutation.
    #[from]
    WellDefinedness(WellDefinednessError),
    /// Internal arithmetic left the range the horizon argument guarantees.
    /// A defect, never expected in correct operation; reported with full
    /// context rather than recovered.
    Overflow {
        source: String,
        dest: String,
        label: Label,
        left: i32,
        right: i32,
    },
    /// The horizon itself is not representable for this network (too many
    /// nodes/propositions for 32-bit bounds).
    HorizonOverflow { horizon: i64 },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::WellDefinedness(e) => write!(f, "{e}"),
            Self::Overflow {
                source,
                dest,
                label,
                left,
                right,
            } => write!(
                f,
                "arithmetic overflow deriving {source:?} -> {dest:?} under {label}: \
                 {left} + {right}"
            ),
            Self::HorizonOverflow { horizon } => {
                write!(f, "network horizon {horizon} exceeds the representable range")
            }
        }
    }
}

impl core::error::Error for Error {}
