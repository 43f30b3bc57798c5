//! Serde-facing network description.
//!
//! [`NetworkData`] is the shape the CLI and the instance generator exchange
//! as JSON. It is deliberately flat (named nodes, edge records with
//! `(label, value)` lists, contingent links given as duration ranges)
//! and converts losslessly to and from [`TemporalNetwork`]: a network that
//! round-trips through `NetworkData` yields the same checking verdict and
//! the same rule-counter trajectory.

use derive_more::From;
use serde::{Deserialize, Serialize};

use super::edge::{ConstraintKind, Edge};
use super::network::{self, TemporalNetwork};
use super::node::Node;
use crate::label::Label;

/// A whole network, ready for (de)serialization.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct NetworkData {
    /// Name of the zero time-point; defaults to `"Z"`. The node is created
    /// implicitly if absent from `nodes`.
    #[serde(default = "default_zero")]
    pub zero: String,
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub edges: Vec<EdgeData>,
    #[serde(default)]
    pub contingent_links: Vec<ContingentLinkData>,
}

fn default_zero() -> String {
    "Z".to_owned()
}

/// A time-point.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct NodeData {
    pub name: String,
    /// Execution label (textual form, e.g. `"p!q"`).
    #[serde(default)]
    pub label: Label,
    /// Proposition observed when this node executes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<char>,
}

/// A requirement edge with its labeled values.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct EdgeData {
    pub source: String,
    pub dest: String,
    #[serde(default)]
    pub values: Vec<LabeledValueData>,
}

/// One `(label, value)` constraint entry: `dest - source <= value` under
/// `label`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct LabeledValueData {
    #[serde(default)]
    pub label: Label,
    pub value: i32,
}

/// A contingent link with duration range `[lower, upper]` under `label`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
pub struct ContingentLinkData {
    pub activation: String,
    pub contingent: String,
    pub lower: i32,
    pub upper: i32,
    #[serde(default)]
    pub label: Label,
}

/// Error converting a [`NetworkData`] into a network.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum Error {
    /// The underlying graph mutation failed.
    #[from]
    Graph(network::Error),
    /// An observation node names a proposition outside the alphabet.
    InvalidProposition { node: String, proposition: char },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Graph(e) => write!(f, "{e}"),
            Self::InvalidProposition { node, proposition } => {
                write!(f, "node {node:?} observes invalid proposition {proposition:?}")
            }
        }
    }
}

impl core::error::Error for Error {}

impl TryFrom<&NetworkData> for TemporalNetwork {
    type Error = Error;

    fn try_from(data: &NetworkData) -> Result<Self, Self::Error> {
        let mut network = Self::new(data.zero.clone());
        for node_data in &data.nodes {
            if node_data.name == data.zero {
                continue;
            }
            let mut node = match node_data.observed {
                Some(p) => {
                    Node::observer(node_data.name.clone(), p).ok_or(Error::InvalidProposition {
                        node: node_data.name.clone(),
                        proposition: p,
                    })?
                }
                None => Node::new(node_data.name.clone()),
            };
            node.set_label(node_data.label);
            network.add_node(node)?;
        }
        for edge_data in &data.edges {
            let mut edge = Edge::new(
                format!("{}-{}", edge_data.source, edge_data.dest),
                ConstraintKind::Requirement,
            );
            for entry in &edge_data.values {
                let _ = edge.put_value(entry.label, entry.value);
            }
            network.add_edge(&edge_data.source, &edge_data.dest, edge)?;
        }
        for link in &data.contingent_links {
            network.add_contingent_link(
                &link.activation,
                &link.contingent,
                link.lower,
                link.upper,
                link.label,
            )?;
        }
        Ok(network)
    }
}

impl From<&TemporalNetwork> for NetworkData {
    fn from(network: &TemporalNetwork) -> Self {
        let nodes = network
            .nodes()
            .filter(|n| n.name() != network.zero())
            .map(|n| NodeData {
                name: n.name().to_owned(),
                label: *n.label(),
                observed: n.observed(),
            })
            .collect();

        let mut edges = Vec::new();
        let mut contingent_links = Vec::new();
        for (source, dest, edge) in network.edges() {
            if edge.kind() == ConstraintKind::Contingent {
                // The forward direction (the one carrying the lower-case
                // value) reconstructs the whole link; the backward edge is
                // implied.
                if let Some(lc) = edge.lower_case() {
                    let upper = edge.values().get(&lc.label).unwrap_or(0);
                    contingent_links.push(ContingentLinkData {
                        activation: source.to_owned(),
                        contingent: dest.to_owned(),
                        lower: lc.value,
                        upper,
                        label: lc.label,
                    });
                }
                continue;
            }
            let values: Vec<LabeledValueData> = edge
                .values()
                .iter()
                .map(|(l, v)| LabeledValueData {
                    label: *l,
                    value: v,
                })
                .collect();
            if values.is_empty() {
                continue;
            }
            edges.push(EdgeData {
                source: source.to_owned(),
                dest: dest.to_owned(),
                values,
            });
        }

        Self {
            zero: network.zero().to_owned(),
            nodes,
            edges,
            contingent_links,
        }
    }
}
