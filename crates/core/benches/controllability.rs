use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use dycop_core::controllability::{check, CheckOptions};
use dycop_core::graph::{Node, TemporalNetwork};
use dycop_core::label::Label;

/// Build a ladder of `rungs` windows hanging off Z, alternating observers
/// and plain time-points, with conditional cross constraints between
/// consecutive rungs. Controllable by construction.
fn build_ladder(rungs: usize, observers: usize) -> TemporalNetwork {
    let mut network = TemporalNetwork::default();
    let props = ['p', 'q', 'r', 's'];

    for i in 0..rungs {
        let name = format!("N{i}");
        let node = if i < observers {
            Node::observer(name.clone(), props[i % props.len()]).expect("valid proposition")
        } else {
            Node::new(name.clone())
        };
        network.add_node(node).expect("unique names");

        let window = i32::try_from(10 * (i + 1)).expect("small sizes");
        let _ = network
            .edge_or_insert("Z", &name)
            .put_value(Label::EMPTY, window);
        let _ = network
            .edge_or_insert(&name, "Z")
            .put_value(Label::EMPTY, 0);
    }

    for i in 1..rungs {
        let prev = format!("N{}", i - 1);
        let name = format!("N{i}");
        let edge = network.edge_or_insert(&prev, &name);
        let _ = edge.put_value(Label::EMPTY, 10);
        if i <= observers {
            let p = props[(i - 1) % props.len()];
            let straight: Label = p.to_string().parse().expect("single literal");
            let negated: Label = format!("¬{p}").parse().expect("single literal");
            let _ = edge.put_value(straight, 5);
            let _ = edge.put_value(negated, 8);
        }
        let _ = network
            .edge_or_insert(&name, &prev)
            .put_value(Label::EMPTY, -1);
    }

    network
}

fn bench_check(c: &mut Criterion) {
    let cases = [
        ("ladder_small", build_ladder(6, 2)),
        ("ladder_medium", build_ladder(12, 3)),
        ("ladder_large", build_ladder(24, 4)),
    ];

    for (_, network) in &cases {
        let mut probe = network.clone();
        let status = check(&mut probe, &CheckOptions::default())
            .expect("benchmark networks must be well defined");
        assert_eq!(status.controllable(), Some(true));
    }

    let mut group = c.benchmark_group("controllability_check");
    for (name, network) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let mut graph = black_box(network).clone();
                let _ = check(&mut graph, &CheckOptions::default());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_check);
criterion_main!(benches);
