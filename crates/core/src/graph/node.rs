use crate::label::{proposition_index, Label, LabeledIntMap};

/// A time-point of the network.
///
/// A node may *observe* a proposition: executing the node decides the
/// proposition's truth value for the rest of the execution. Nodes own a
/// [`LabeledIntMap`] of best-known potentials, filled by the optional
/// shortest-path pre-pass and by Q-loop propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: String,
    label: Label,
    observed: Option<char>,
    potential: LabeledIntMap,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: Label::EMPTY,
            observed: None,
            potential: LabeledIntMap::new(),
        }
    }

    /// Creates an observation node for `proposition`.
    ///
    /// Returns `None` if the proposition is outside the label alphabet.
    #[must_use]
    pub fn observer(name: impl Into<String>, proposition: char) -> Option<Self> {
        proposition_index(proposition)?;
        let mut node = Self::new(name);
        node.observed = Some(proposition);
        Some(node)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's own execution label (unused in the label-free variant).
    #[must_use]
    pub const fn label(&self) -> &Label {
        &self.label
    }

    pub fn set_label(&mut self, label: Label) {
        self.label = label;
    }

    /// The proposition this node observes, if any.
    #[must_use]
    pub const fn observed(&self) -> Option<char> {
        self.observed
    }

    #[must_use]
    pub const fn is_observer(&self) -> bool {
        self.observed.is_some()
    }

    /// Best-known labeled potentials for this node.
    #[must_use]
    pub const fn potential(&self) -> &LabeledIntMap {
        &self.potential
    }

    /// Merges a potential entry; returns `true` if it tightened anything.
    pub fn merge_potential(&mut self, label: Label, value: i32) -> bool {
        self.potential.put(label, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_requires_alphabet_proposition() {
        assert!(Node::observer("P?", 'p').is_some());
        assert!(Node::observer("P?", '9').is_none());
        let node = Node::observer("P?", 'p').unwrap();
        assert_eq!(node.observed(), Some('p'));
        assert!(node.is_observer());
        assert!(!Node::new("X").is_observer());
    }

    #[test]
    fn potential_entries_stay_minimal() {
        let mut node = Node::new("X");
        assert!(node.merge_potential(Label::EMPTY, -3));
        assert!(!node.merge_potential("p".parse().unwrap(), 0));
        assert_eq!(node.potential().len(), 1);
    }
}
