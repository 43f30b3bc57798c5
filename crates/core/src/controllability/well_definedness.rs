//! Pre-mutation structural validation.
//!
//! Every check runs this pass first; a network that fails it is rejected
//! before the engine touches anything, so the caller can fix the input and
//! retry against an unmodified graph.

use std::collections::BTreeMap;

use crate::graph::{ConstraintKind, TemporalNetwork};
use crate::label::{Label, NEG_INFINITY};

use super::error::WellDefinednessError;

/// Validates the structural preconditions of a check.
///
/// Unknown-labeled edge entries are accepted as-is: the engine writes them
/// (Q-loop seeds, extended-conjunction derivations), and the output of one
/// check must pass verification for the next. Only such entries may carry
/// the `-∞` sentinel. Node labels and contingent-link labels come from the
/// input alone, so there the unknown state is a defect.
///
/// # Errors
///
/// Returns the first violated precondition: missing zero time-point,
/// duplicate observations, propositions without an observer, unknown
/// literals in node or contingent-link labels, decided-label values
/// colliding with the `-∞` sentinel, or incomplete/malformed contingent
/// links.
pub fn verify(network: &TemporalNetwork) -> Result<(), WellDefinednessError> {
    if network.node(network.zero()).is_none() {
        return Err(WellDefinednessError::MissingZero {
            name: network.zero().to_owned(),
        });
    }

    let mut observers: BTreeMap<char, String> = BTreeMap::new();
    for node in network.observers() {
        if let Some(p) = node.observed() {
            if let Some(first) = observers.insert(p, node.name().to_owned()) {
                return Err(WellDefinednessError::DuplicatedObservation {
                    proposition: p,
                    first,
                    second: node.name().to_owned(),
                });
            }
        }
    }

    for node in network.nodes() {
        let context = || format!("node {:?}", node.name());
        if node.label().contains_unknown() {
            return Err(WellDefinednessError::UnknownLiteralInInput {
                context: context(),
                label: *node.label(),
            });
        }
        check_label(node.label(), &observers, context)?;
    }

    for (source, dest, edge) in network.edges() {
        let context = || format!("edge {source:?} -> {dest:?}");
        for (label, value) in edge.values().iter() {
            check_entry(source, dest, label, value, &observers, &context)?;
        }
        for (_, label, value) in edge.upper_case_entries() {
            check_entry(source, dest, label, value, &observers, &context)?;
        }
        if let Some(lc) = edge.lower_case() {
            if lc.label.contains_unknown() {
                return Err(WellDefinednessError::UnknownLiteralInInput {
                    context: format!("contingent link {source:?} => {dest:?}"),
                    label: lc.label,
                });
            }
            check_entry(source, dest, &lc.label, lc.value, &observers, &context)?;
        }
        if edge.kind() == ConstraintKind::Contingent {
            let counterpart = network.edge(dest, source);
            if !counterpart.is_some_and(|e| e.kind() == ConstraintKind::Contingent) {
                return Err(WellDefinednessError::ContingentWithoutCounterpart {
                    source: source.to_owned(),
                    dest: dest.to_owned(),
                });
            }
        }
    }

    // The forward edge of each link carries the lower-case value x, its
    // counterpart the upper-case value u = -upper; a realizable duration
    // range [x, -u] needs 0 < x and u <= -x.
    for (activation, contingent, edge) in network.contingent_edges() {
        let Some(lc) = edge.lower_case() else {
            continue;
        };
        let upper_case = network
            .edge(contingent, activation)
            .and_then(|back| back.upper_case_entries().map(|(_, _, v)| v).min());
        let Some(upper_case) = upper_case else {
            return Err(WellDefinednessError::ContingentWithoutCounterpart {
                source: activation.to_owned(),
                dest: contingent.to_owned(),
            });
        };
        if lc.value <= 0 || upper_case > -lc.value {
            return Err(WellDefinednessError::ContingentBoundsMalformed {
                activation: activation.to_owned(),
                contingent: contingent.to_owned(),
                lower: lc.value,
                upper_case,
            });
        }
    }

    Ok(())
}

fn check_entry(
    source: &str,
    dest: &str,
    label: &Label,
    value: i32,
    observers: &BTreeMap<char, String>,
    context: &impl Fn() -> String,
) -> Result<(), WellDefinednessError> {
    // Unknown-labeled entries are engine output being re-ingested; they are
    // the one place the sentinel may legitimately appear.
    if label.contains_unknown() {
        return check_label(label, observers, context);
    }
    if value == NEG_INFINITY {
        return Err(WellDefinednessError::ValueOutOfRange {
            source: source.to_owned(),
            dest: dest.to_owned(),
            label: *label,
            value,
        });
    }
    check_label(label, observers, context)
}

fn check_label(
    label: &Label,
    observers: &BTreeMap<char, String>,
    context: impl Fn() -> String,
) -> Result<(), WellDefinednessError> {
    for literal in label.literals() {
        if !observers.contains_key(&literal.proposition()) {
            return Err(WellDefinednessError::PropositionWithoutObserver {
                proposition: literal.proposition(),
                context: context(),
            });
        }
    }
    Ok(())
}
