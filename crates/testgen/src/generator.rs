use std::collections::HashSet;

use chrono::{DateTime, Duration, Local};
use dycop_core::graph::data::{
    ContingentLinkData, EdgeData, LabeledValueData, NetworkData, NodeData,
};
use dycop_core::label::{proposition_char, Label, Literal};
use rand::distr::{Distribution, Uniform};
use rand::RngExt;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
pub struct InstanceParams {
    pub id: u64,
    /// Plain time-points, observers included (the zero node is extra).
    pub n_node: u64,
    /// How many of the nodes observe a proposition.
    pub n_observer: u64,
    /// Random requirement edges between distinct node pairs.
    pub n_edge: u64,
    /// Contingent links, each adding its own activation/contingent pair.
    pub n_contingent: u64,
    /// Weights are drawn from `[-max_weight, max_weight]`.
    pub max_weight: i32,
}

/// A generated instance with its parameters and generation timestamps.
#[derive(Deserialize, Serialize, Debug)]
pub struct Instance {
    params: InstanceParams,
    info: String,
    start: DateTime<Local>,
    end: DateTime<Local>,
    data: NetworkData,
}

impl Instance {
    #[must_use]
    pub const fn new(
        params: InstanceParams,
        info: String,
        start: DateTime<Local>,
        end: DateTime<Local>,
        data: NetworkData,
    ) -> Self {
        Self {
            params,
            info,
            start,
            end,
            data,
        }
    }

    #[must_use]
    pub const fn get_id(&self) -> u64 {
        self.params.id
    }

    #[must_use]
    pub const fn get_data(&self) -> &NetworkData {
        &self.data
    }

    #[must_use]
    pub const fn get_params(&self) -> &InstanceParams {
        &self.params
    }

    #[must_use]
    pub fn get_duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Generate one random CSTN(U) instance.
///
/// # Well-definedness invariant
///
/// Every instance passes the checker's structural validation:
///
/// 1. Each of the first `n_observer` nodes observes a distinct proposition,
///    and edge/link labels only mention those propositions, so every
///    proposition has exactly one observer.
/// 2. Each contingent link gets its own fresh activation/contingent node
///    pair with `0 < lower <= upper`, so the duration range is realizable.
/// 3. At most one requirement edge per ordered node pair, matching the
///    graph's duplicate-pair rejection.
/// 4. Every node is anchored by a window from the zero node, so weights
///    stay inside what 32-bit bound arithmetic tolerates.
///
/// Whether the instance is *controllable* is not constrained; negative
/// windows and conditional disagreements are exactly what the checker is
/// exercised with.
///
/// # Panics
///
/// Panics if `n_node` is zero or `max_weight` is not positive (the uniform
/// weight distribution would be empty).
#[must_use]
pub fn generate_single_instance(
    n_node: u64,
    n_observer: u64,
    n_edge: u64,
    n_contingent: u64,
    max_weight: i32,
) -> NetworkData {
    let mut random_generator = rand::rng();
    let n_observer = n_observer.min(n_node).min(26);
    let node_range = Uniform::new(0, n_node).unwrap();
    let weight_range = Uniform::new_inclusive(-max_weight, max_weight).unwrap();
    let duration_range = Uniform::new_inclusive(1, max_weight.max(1)).unwrap();

    let propositions: Vec<char> = (0..n_observer)
        .filter_map(|i| u8::try_from(i).ok().and_then(proposition_char))
        .collect();

    let mut data = NetworkData::default();
    for i in 0..n_node {
        let name = format!("N{i}");
        let observed = usize::try_from(i)
            .ok()
            .and_then(|i| propositions.get(i).copied());
        data.nodes.push(NodeData {
            name: name.clone(),
            label: Label::EMPTY,
            observed,
        });
        // Anchor every node in a window off the zero time-point.
        data.edges.push(EdgeData {
            source: data.zero.clone(),
            dest: name.clone(),
            values: vec![LabeledValueData {
                label: Label::EMPTY,
                value: max_weight,
            }],
        });
        data.edges.push(EdgeData {
            source: name,
            dest: data.zero.clone(),
            values: vec![LabeledValueData {
                label: Label::EMPTY,
                value: 0,
            }],
        });
    }

    let mut used_pairs: HashSet<(u64, u64)> = HashSet::new();
    let mut placed = 0;
    // Cap the attempts so dense requests on tiny graphs still terminate.
    let mut attempts = n_edge.saturating_mul(8).max(64);
    while placed < n_edge && attempts > 0 {
        attempts -= 1;
        let source = node_range.sample(&mut random_generator);
        let dest = node_range.sample(&mut random_generator);
        if source == dest || !used_pairs.insert((source, dest)) {
            continue;
        }
        let entries = 1 + usize::from(random_generator.random::<bool>());
        let values = (0..entries)
            .map(|_| LabeledValueData {
                label: random_label(&mut random_generator, &propositions, 2),
                value: weight_range.sample(&mut random_generator),
            })
            .collect();
        data.edges.push(EdgeData {
            source: format!("N{source}"),
            dest: format!("N{dest}"),
            values,
        });
        placed += 1;
    }

    for i in 0..n_contingent {
        let lower = duration_range.sample(&mut random_generator);
        let upper = lower + duration_range.sample(&mut random_generator);
        data.contingent_links.push(ContingentLinkData {
            activation: format!("A{i}"),
            contingent: format!("C{i}"),
            lower,
            upper,
            label: random_label(&mut random_generator, &propositions, 1),
        });
        data.nodes.push(NodeData {
            name: format!("A{i}"),
            ..NodeData::default()
        });
        data.nodes.push(NodeData {
            name: format!("C{i}"),
            ..NodeData::default()
        });
    }

    data
}

fn random_label(
    random_generator: &mut impl RngExt,
    propositions: &[char],
    max_literals: usize,
) -> Label {
    if propositions.is_empty() || max_literals == 0 {
        return Label::EMPTY;
    }
    let count = random_generator.random_range(0..=max_literals.min(propositions.len()));
    let mut picked: Vec<usize> = Vec::new();
    let mut literals: Vec<Literal> = Vec::new();
    while literals.len() < count {
        let i = random_generator.random_range(0..propositions.len());
        if picked.contains(&i) {
            continue;
        }
        picked.push(i);
        let literal = if random_generator.random::<bool>() {
            Literal::straight(propositions[i])
        } else {
            Literal::negated(propositions[i])
        };
        if let Some(literal) = literal {
            literals.push(literal);
        }
    }
    Label::from_literals(literals).unwrap_or(Label::EMPTY)
}

/// Generate `n_instances` instances in parallel.
#[must_use]
pub fn generate_mult_instances(
    n_instances: u64,
    n_node: u64,
    n_observer: u64,
    n_edge: u64,
    n_contingent: u64,
    max_weight: i32,
) -> Vec<Instance> {
    (0..n_instances)
        .into_par_iter()
        .map(|id| {
            let start = Local::now();
            let data = generate_single_instance(n_node, n_observer, n_edge, n_contingent, max_weight);
            let end = Local::now();
            Instance {
                params: InstanceParams {
                    id,
                    n_node,
                    n_observer,
                    n_edge,
                    n_contingent,
                    max_weight,
                },
                info: "generated".to_string(),
                start,
                end,
                data,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dycop_core::controllability::well_definedness;
    use dycop_core::graph::TemporalNetwork;

    #[test]
    fn generated_instances_are_well_defined() {
        for _ in 0..20 {
            let data = generate_single_instance(6, 3, 10, 2, 15);
            let network = TemporalNetwork::try_from(&data).expect("instance must load");
            assert_eq!(well_definedness::verify(&network), Ok(()));
        }
    }

    #[test]
    fn observers_get_distinct_propositions() {
        let data = generate_single_instance(5, 3, 0, 0, 10);
        let observed: Vec<char> = data.nodes.iter().filter_map(|n| n.observed).collect();
        assert_eq!(observed, vec!['a', 'b', 'c']);
    }

    #[test]
    fn requested_structure_is_respected() {
        let data = generate_single_instance(8, 2, 12, 3, 20);
        // 8 plain nodes plus an activation/contingent pair per link.
        assert_eq!(data.nodes.len(), 8 + 2 * 3);
        assert_eq!(data.contingent_links.len(), 3);
        // Two anchor edges per plain node plus the random requirements
        // (attempt-capped, so an unlucky roll may place fewer).
        assert!(data.edges.len() > 2 * 8);
        assert!(data.edges.len() <= 2 * 8 + 12);
        for link in &data.contingent_links {
            assert!(link.lower > 0);
            assert!(link.upper >= link.lower);
        }
    }

    #[test]
    fn batch_generation_numbers_instances() {
        let instances = generate_mult_instances(4, 3, 1, 2, 0, 5);
        assert_eq!(instances.len(), 4);
        let ids: Vec<u64> = instances.iter().map(Instance::get_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }
}
