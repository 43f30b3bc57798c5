//! The temporal-network graph model: time-points, labeled distance edges,
//! and the network that owns them.

pub mod edge;
pub mod network;
pub mod node;

#[cfg(feature = "serde")]
pub mod data;

pub use edge::{ConstraintKind, Edge, LowerCaseValue};
pub use network::TemporalNetwork;
pub use node::Node;
