use std::collections::{BTreeMap, BTreeSet};

use derive_more::From;
use hashbrown::{Equivalent, HashMap};

use super::edge::{ConstraintKind, Edge, LowerCaseValue};
use super::node::Node;
use crate::label::{alabel, ALabel, ALabelAlphabet, Label};

/// Error building or mutating a [`TemporalNetwork`].
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum Error {
    /// A node with this name already exists.
    DuplicateNode { name: String },
    /// An edge between this ordered pair already exists; fetch and merge
    /// instead.
    DuplicateEdge { source: String, dest: String },
    /// An endpoint names a node that is not in the network.
    MissingNode { name: String },
    /// The contingent-name alphabet overflowed.
    #[from]
    Alphabet(alabel::Error),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DuplicateNode { name } => write!(f, "node {name:?} already exists"),
            Self::DuplicateEdge { source, dest } => {
                write!(f, "edge {source:?} -> {dest:?} already exists")
            }
            Self::MissingNode { name } => write!(f, "node {name:?} is not in the network"),
            Self::Alphabet(e) => write!(f, "{e}"),
        }
    }
}

impl core::error::Error for Error {}

/// Owned endpoint pair of an edge. Lookups hash a borrowed `(&str, &str)`
/// against it, so the hot paths never allocate key strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct EdgeKey(String, String);

impl Equivalent<EdgeKey> for (&str, &str) {
    fn equivalent(&self, key: &EdgeKey) -> bool {
        self.0 == key.0 && self.1 == key.1
    }
}

impl From<&(&str, &str)> for EdgeKey {
    fn from(pair: &(&str, &str)) -> Self {
        Self(pair.0.to_owned(), pair.1.to_owned())
    }
}

/// A conditional temporal network: time-points, labeled distance edges, a
/// distinguished zero time-point, and the contingent-name alphabet shared by
/// all upper/lower-case values.
///
/// The node table is an ordered map and edges keep an ordered key set next
/// to their hash table, so iteration (and therefore rule-firing order during
/// a check) is deterministic while lookup by endpoint pair stays constant
/// time.
///
/// A network is built once by a loader, then mutated destructively by the
/// checker; callers that want to keep the original must clone first.
#[derive(Debug, Clone)]
pub struct TemporalNetwork {
    nodes: BTreeMap<String, Node>,
    edges: HashMap<EdgeKey, Edge>,
    edge_order: BTreeSet<EdgeKey>,
    zero: String,
    alphabet: ALabelAlphabet,
}

impl Default for TemporalNetwork {
    fn default() -> Self {
        Self::new("Z")
    }
}

impl TemporalNetwork {
    /// Creates a network containing only the zero time-point.
    #[must_use]
    pub fn new(zero: impl Into<String>) -> Self {
        let zero = zero.into();
        let mut nodes = BTreeMap::new();
        let _ = nodes.insert(zero.clone(), Node::new(zero.clone()));
        Self {
            nodes,
            edges: HashMap::new(),
            edge_order: BTreeSet::new(),
            zero,
            alphabet: ALabelAlphabet::new(),
        }
    }

    /// Name of the zero time-point.
    #[must_use]
    pub fn zero(&self) -> &str {
        &self.zero
    }

    /// Adds a node; rejects duplicates.
    pub fn add_node(&mut self, node: Node) -> Result<(), Error> {
        if self.nodes.contains_key(node.name()) {
            return Err(Error::DuplicateNode {
                name: node.name().to_owned(),
            });
        }
        let _ = self.nodes.insert(node.name().to_owned(), node);
        Ok(())
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Removes a node and every incident edge.
    ///
    /// Incident-edge removal is an invariant, not hygiene: the checker
    /// indexes edges by endpoint name and must never see a dangling one.
    pub fn remove_node(&mut self, name: &str) -> Option<Node> {
        let node = self.nodes.remove(name)?;
        self.edge_order.retain(|key| key.0 != name && key.1 != name);
        self.edges.retain(|key, _| key.0 != name && key.1 != name);
        Some(node)
    }

    /// Adds an edge between existing nodes; rejects a second edge on the
    /// same ordered pair.
    pub fn add_edge(&mut self, source: &str, dest: &str, edge: Edge) -> Result<(), Error> {
        for endpoint in [source, dest] {
            if !self.nodes.contains_key(endpoint) {
                return Err(Error::MissingNode {
                    name: endpoint.to_owned(),
                });
            }
        }
        if self.edges.contains_key(&(source, dest)) {
            return Err(Error::DuplicateEdge {
                source: source.to_owned(),
                dest: dest.to_owned(),
            });
        }
        let key = EdgeKey(source.to_owned(), dest.to_owned());
        let _ = self.edge_order.insert(key.clone());
        let _ = self.edges.insert(key, edge);
        Ok(())
    }

    /// Builds both directions of a contingent link with duration range
    /// `[lower, upper]` under `label`: the lower-case value on
    /// activation→contingent and the upper-case value `-upper` on
    /// contingent→activation.
    ///
    /// Bounds are stored as given; their consistency is validated by the
    /// checker's well-definedness pass, so malformed instances can still be
    /// represented and reported.
    pub fn add_contingent_link(
        &mut self,
        activation: &str,
        contingent: &str,
        lower: i32,
        upper: i32,
        label: Label,
    ) -> Result<(), Error> {
        let index = self.alphabet.put(contingent)?;
        let letter = ALabel::from_index(index);

        let mut forward = Edge::new(
            format!("{activation}-{contingent}"),
            ConstraintKind::Contingent,
        );
        let _ = forward.put_value(label, upper);
        forward.set_lower_case(LowerCaseValue {
            letter,
            label,
            value: lower,
        });

        let mut backward = Edge::new(
            format!("{contingent}-{activation}"),
            ConstraintKind::Contingent,
        );
        let _ = backward.put_value(label, -lower);
        let _ = backward.put_upper_case(letter, label, -upper);

        self.add_edge(activation, contingent, forward)?;
        self.add_edge(contingent, activation, backward)
    }

    /// The edge between the ordered pair, if present.
    #[must_use]
    pub fn edge(&self, source: &str, dest: &str) -> Option<&Edge> {
        self.edges.get(&(source, dest))
    }

    pub fn edge_mut(&mut self, source: &str, dest: &str) -> Option<&mut Edge> {
        self.edges.get_mut(&(source, dest))
    }

    /// Returns the edge between the pair, creating an empty derived edge if
    /// none exists. Used by propagation, which only ever connects existing
    /// nodes.
    pub fn edge_or_insert(&mut self, source: &str, dest: &str) -> &mut Edge {
        if !self.edges.contains_key(&(source, dest)) {
            let _ = self
                .edge_order
                .insert(EdgeKey(source.to_owned(), dest.to_owned()));
        }
        self.edges
            .entry_ref(&(source, dest))
            .or_insert_with(|| Edge::new(format!("{source}-{dest}"), ConstraintKind::Derived))
    }

    pub fn remove_edge(&mut self, source: &str, dest: &str) -> Option<Edge> {
        let edge = self.edges.remove(&(source, dest))?;
        let _ = self
            .edge_order
            .remove(&EdgeKey(source.to_owned(), dest.to_owned()));
        Some(edge)
    }

    /// Iterates edges with their endpoint pair, in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &Edge)> + '_ {
        self.edge_order.iter().filter_map(move |key| {
            self.edges
                .get(key)
                .map(|edge| (key.0.as_str(), key.1.as_str(), edge))
        })
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Endpoint pairs of all edges, in key order.
    #[must_use]
    pub fn edge_keys(&self) -> Vec<(String, String)> {
        self.edge_order
            .iter()
            .map(|key| (key.0.clone(), key.1.clone()))
            .collect()
    }

    /// Propositions observed somewhere in the network.
    #[must_use]
    pub fn propositions(&self) -> BTreeSet<char> {
        self.nodes.values().filter_map(Node::observed).collect()
    }

    /// The node observing `proposition`, if any.
    #[must_use]
    pub fn observer_of(&self, proposition: char) -> Option<&Node> {
        self.nodes
            .values()
            .find(|n| n.observed() == Some(proposition))
    }

    /// Observation nodes, in name order.
    pub fn observers(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values().filter(|n| n.is_observer())
    }

    /// Contingent edges with their endpoint pairs.
    pub fn contingent_edges(&self) -> impl Iterator<Item = (&str, &str, &Edge)> + '_ {
        self.edges()
            .filter(|(_, _, e)| e.kind() == ConstraintKind::Contingent)
    }

    #[must_use]
    pub const fn alphabet(&self) -> &ALabelAlphabet {
        &self.alphabet
    }

    pub fn alphabet_mut(&mut self) -> &mut ALabelAlphabet {
        &mut self.alphabet
    }

    /// Largest absolute finite edge value, for horizon computation.
    #[must_use]
    pub fn max_absolute_value(&self) -> i64 {
        self.edges
            .values()
            .map(Edge::max_absolute_value)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_node_exists_from_the_start() {
        let network = TemporalNetwork::default();
        assert_eq!(network.zero(), "Z");
        assert!(network.node("Z").is_some());
        assert_eq!(network.node_count(), 1);
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::new("X")).unwrap();
        network
            .add_edge("Z", "X", Edge::new("zx", ConstraintKind::Requirement))
            .unwrap();
        assert_eq!(
            network.add_edge("Z", "X", Edge::new("zx2", ConstraintKind::Requirement)),
            Err(Error::DuplicateEdge {
                source: "Z".into(),
                dest: "X".into()
            })
        );
        // Opposite direction is a different pair.
        assert!(network
            .add_edge("X", "Z", Edge::new("xz", ConstraintKind::Requirement))
            .is_ok());
    }

    #[test]
    fn edges_need_existing_endpoints() {
        let mut network = TemporalNetwork::default();
        assert_eq!(
            network.add_edge("Z", "ghost", Edge::new("e", ConstraintKind::Requirement)),
            Err(Error::MissingNode {
                name: "ghost".into()
            })
        );
    }

    #[test]
    fn removing_a_node_removes_incident_edges() {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::new("X")).unwrap();
        network.add_node(Node::new("Y")).unwrap();
        network
            .add_edge("X", "Y", Edge::new("xy", ConstraintKind::Requirement))
            .unwrap();
        network
            .add_edge("Y", "X", Edge::new("yx", ConstraintKind::Requirement))
            .unwrap();
        network
            .add_edge("Z", "Y", Edge::new("zy", ConstraintKind::Requirement))
            .unwrap();

        assert!(network.remove_node("X").is_some());
        assert!(network.edge("X", "Y").is_none());
        assert!(network.edge("Y", "X").is_none());
        assert!(network.edge("Z", "Y").is_some());
        assert_eq!(network.edge_count(), 1);
    }

    #[test]
    fn contingent_link_builds_both_directions() {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::new("A")).unwrap();
        network.add_node(Node::new("C")).unwrap();
        network
            .add_contingent_link("A", "C", 2, 5, Label::EMPTY)
            .unwrap();

        let forward = network.edge("A", "C").unwrap();
        assert_eq!(forward.kind(), ConstraintKind::Contingent);
        assert_eq!(forward.lower_case().map(|lc| lc.value), Some(2));
        assert_eq!(forward.values().get(&Label::EMPTY), Some(5));

        let backward = network.edge("C", "A").unwrap();
        assert_eq!(backward.values().get(&Label::EMPTY), Some(-2));
        let uc: Vec<_> = backward.upper_case_entries().collect();
        assert_eq!(uc.len(), 1);
        assert_eq!(uc[0].2, -5);
        assert_eq!(network.alphabet().index_of("C"), Some(0));
        assert_eq!(network.contingent_edges().count(), 2);
    }

    /// A link with `lower > upper` stores both bounds as given: the ordinary
    /// `-lower` must not swallow the upper-case `-upper`, or validation could
    /// no longer see what the input actually said.
    #[test]
    fn contingent_bounds_are_stored_verbatim() {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::new("A")).unwrap();
        network.add_node(Node::new("C")).unwrap();
        network
            .add_contingent_link("A", "C", 5, 3, Label::EMPTY)
            .unwrap();

        let backward = network.edge("C", "A").unwrap();
        assert_eq!(backward.values().get(&Label::EMPTY), Some(-5));
        let uc: Vec<_> = backward.upper_case_entries().collect();
        assert_eq!(uc.len(), 1);
        assert_eq!(uc[0].2, -3);
    }

    #[test]
    fn observer_index() {
        let mut network = TemporalNetwork::default();
        network.add_node(Node::observer("P?", 'p').unwrap()).unwrap();
        network.add_node(Node::observer("Q?", 'q').unwrap()).unwrap();
        assert_eq!(network.propositions(), ['p', 'q'].into());
        assert_eq!(network.observer_of('p').map(Node::name), Some("P?"));
        assert_eq!(network.observer_of('r'), None);
        assert_eq!(network.observers().count(), 2);
    }
}
