//! Conflict graph benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nexus_common::types::{ProcessId, TxnId};
use nexus_ssi::{
    export_neighborhood, ConflictGraph, ConflictGraphConfig, CurrentTransaction, ExportRequest,
};

const NEIGHBORS: usize = 256;

/// One subject with an out- and an in-edge to each neighbor.
fn populated_graph() -> ConflictGraph {
    let graph = ConflictGraph::with_config(ConflictGraphConfig::for_transactions(NEIGHBORS + 1))
        .unwrap();
    let subject = graph.register_node(ProcessId::new(1), None).unwrap();
    for i in 0..NEIGHBORS {
        let peer = graph
            .register_node(ProcessId::new(100 + i as i32), Some(TxnId::new(i as u64 + 1)))
            .unwrap();
        graph.notify_conflict(subject, peer).unwrap();
        graph.notify_conflict(peer, subject).unwrap();
    }
    graph
}

fn notify_conflict_benchmark(c: &mut Criterion) {
    c.bench_function("notify_release_1000", |b| {
        let graph = ConflictGraph::new();
        let a = graph.register_node(ProcessId::new(1), None).unwrap();
        let z = graph.register_node(ProcessId::new(2), None).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                let edge = graph.notify_conflict(a, z).unwrap();
                graph.release_conflict(edge, a, z).unwrap();
            }
            black_box(graph.conflict_count())
        })
    });
}

fn stream_export_benchmark(c: &mut Criterion) {
    let graph = populated_graph();
    let current = CurrentTransaction::serializable(ProcessId::new(1));
    let request = ExportRequest::stream();

    c.bench_function("export_stream_512", |b| {
        b.iter(|| {
            let records = export_neighborhood(&graph, &current, &request)
                .unwrap()
                .count();
            black_box(records)
        })
    });
}

fn materialize_export_benchmark(c: &mut Criterion) {
    let graph = populated_graph();
    let current = CurrentTransaction::serializable(ProcessId::new(1));
    let request = ExportRequest::materialize();

    c.bench_function("export_materialize_512", |b| {
        b.iter(|| {
            let records = export_neighborhood(&graph, &current, &request)
                .unwrap()
                .count();
            black_box(records)
        })
    });
}

criterion_group!(
    benches,
    notify_conflict_benchmark,
    stream_export_benchmark,
    materialize_export_benchmark
);
criterion_main!(benches);
