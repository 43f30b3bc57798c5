//! Single-source potential pass over the unconditional values.
//!
//! A label-correcting shortest-path run from the zero time-point over the
//! `⊡`-labeled bounds. Cheap relative to the rule loop, it catches
//! unconditional negative cycles before any label surgery and seeds each
//! node's potential with its unconditional distance, which the Q-loop
//! handling later tightens.

use hashbrown::HashMap;

use crate::graph::TemporalNetwork;
use crate::heap::NodeHeap;
use crate::label::Label;

use super::RuleCounters;

/// Runs the pass, writing distances into the nodes' potential maps.
///
/// Returns the name of a node proven to lie on an unconditional negative
/// cycle, or `None` when distances settle. Each node carries the edge count
/// of the path realizing its current distance; an improving path of
/// `node_count` edges must repeat a node, and an improving repeat is a
/// negative cycle. Extraction counts are no guard here: layered graphs
/// re-improve a node exponentially often with no cycle in sight.
pub(super) fn seed_potentials(
    network: &mut TemporalNetwork,
    counters: &mut RuleCounters,
) -> Option<String> {
    let zero = network.zero().to_owned();
    let node_count = network.node_count();

    let mut outgoing: HashMap<String, Vec<(String, i64)>> = HashMap::new();
    for (source, dest, edge) in network.edges() {
        if let Some(weight) = edge.values().get(&Label::EMPTY) {
            outgoing
                .entry(source.to_owned())
                .or_default()
                .push((dest.to_owned(), i64::from(weight)));
        }
    }

    let mut heap: NodeHeap<String, i64> = NodeHeap::new();
    let mut hops: HashMap<String, usize> = HashMap::new();
    let _ = heap.insert_or_decrease(zero.clone(), 0);
    let _ = hops.insert(zero, 0);

    while let Some((node, distance)) = heap.pop() {
        let depth = hops.get(&node).copied().unwrap_or(0);
        for (next, weight) in outgoing.get(&node).into_iter().flatten() {
            if heap.insert_or_decrease(next.clone(), distance + weight) {
                if depth + 1 >= node_count {
                    return Some(next.clone());
                }
                let _ = hops.insert(next.clone(), depth + 1);
            }
        }
    }

    let names: Vec<String> = network.nodes().map(|n| n.name().to_owned()).collect();
    for name in names {
        let Some(distance) = heap.priority(&name) else {
            continue;
        };
        let Ok(distance) = i32::try_from(distance) else {
            continue;
        };
        if let Some(node) = network.node_mut(&name) {
            if node.merge_potential(Label::EMPTY, distance) {
                counters.potential_updates += 1;
            }
        }
    }
    tracing::debug!(
        updates = counters.potential_updates,
        "potential pass settled"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn network_with(edges: &[(&str, &str, i32)]) -> TemporalNetwork {
        let mut network = TemporalNetwork::default();
        for (s, d, _) in edges {
            for name in [s, d] {
                if network.node(name).is_none() {
                    network.add_node(Node::new(*name)).unwrap();
                }
            }
        }
        for (s, d, w) in edges {
            let _ = network.edge_or_insert(s, d).put_value(Label::EMPTY, *w);
        }
        network
    }

    #[test]
    fn distances_settle_along_negative_edges() {
        let mut network = network_with(&[("Z", "A", 10), ("A", "B", -4), ("Z", "B", 8)]);
        let mut counters = RuleCounters::default();
        assert_eq!(seed_potentials(&mut network, &mut counters), None);
        assert_eq!(
            network.node("B").unwrap().potential().get(&Label::EMPTY),
            Some(6)
        );
        assert_eq!(counters.potential_updates, 3);
    }

    #[test]
    fn negative_cycle_is_detected() {
        let mut network = network_with(&[("Z", "A", 1), ("A", "B", -3), ("B", "A", 2)]);
        let mut counters = RuleCounters::default();
        assert!(seed_potentials(&mut network, &mut counters).is_some());
    }

    /// Layered graph where each node's distance improves repeatedly through
    /// ever-cheaper detours. Acyclic, so the pass must settle; an
    /// extraction-count cutoff would misread the churn as a cycle.
    #[test]
    fn repeated_improvements_without_a_cycle_settle() {
        let mut network = network_with(&[
            ("Z", "P1", 20000),
            ("Z", "Q1", 30000),
            ("Q1", "P1", -20000),
            ("P1", "P2", 0),
            ("P1", "Q2", 100),
            ("Q2", "P2", -200),
            ("P2", "P3", 0),
            ("P2", "Q3", 1),
            ("Q3", "P3", -2),
        ]);
        let mut counters = RuleCounters::default();
        assert_eq!(seed_potentials(&mut network, &mut counters), None);
        assert_eq!(
            network.node("P1").unwrap().potential().get(&Label::EMPTY),
            Some(10000)
        );
        assert_eq!(
            network.node("P3").unwrap().potential().get(&Label::EMPTY),
            Some(9899)
        );
    }

    #[test]
    fn unreachable_nodes_keep_no_potential() {
        let mut network = network_with(&[("A", "Z", 1)]);
        let mut counters = RuleCounters::default();
        assert_eq!(seed_potentials(&mut network, &mut counters), None);
        assert!(network.node("A").unwrap().potential().is_empty());
        assert_eq!(
            network.node("Z").unwrap().potential().get(&Label::EMPTY),
            Some(0)
        );
    }
}
