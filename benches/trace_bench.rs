/// Benchmarks for the RunVis reconstruction pipeline.
///
/// Run with: `cargo bench`
///
/// Covers the two stages whose cost grows with execution length rather than
/// source size: tree reconstruction from the event stream and document
/// serialization.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use runvis::domain::event::{ExecutionOutcome, TraceEvent};
use runvis::domain::index::{IdentifierIndex, NodeKind};
use runvis::domain::source::SourceRange;
use runvis::domain::tree::TraceTree;
use runvis::ports::json_exporter::JsonTraceExporter;
use runvis::ports::TraceExporter;

// ═══════════════════════════════════════════════════════════════════════════
// Synthetic Data Generators
// ═══════════════════════════════════════════════════════════════════════════

fn range(sl: u32, el: u32) -> SourceRange {
    SourceRange {
        start_line: sl,
        start_col: 0,
        end_line: el,
        end_col: 60,
    }
}

/// main { loop { stmt; call -> helper { stmt } } }
fn synthetic_index() -> IdentifierIndex {
    let mut index = IdentifierIndex::new();
    let f = index.add_file("main.rs");
    index.append(NodeKind::MethodEntry, f, range(1, 20), None); // 1 main
    index.append(NodeKind::LoopBody, f, range(2, 10), Some(1)); // 2
    index.append(NodeKind::Statement, f, range(3, 3), Some(2)); // 3
    index.append(NodeKind::CallSite, f, range(4, 4), Some(2)); // 4
    index.append(NodeKind::MethodEntry, f, range(22, 25), None); // 5 helper
    index.append(NodeKind::Statement, f, range(23, 23), Some(5)); // 6
    index
}

/// Event stream for `iterations` loop passes, seven events per pass.
fn synthetic_events(iterations: usize) -> Vec<TraceEvent> {
    let mut events = Vec::with_capacity(iterations * 7 + 2);
    events.push(TraceEvent::enter(1));
    for _ in 0..iterations {
        events.push(TraceEvent::boundary(2));
        events.push(TraceEvent::enter(3));
        events.push(TraceEvent::enter(4));
        events.push(TraceEvent::enter(5));
        events.push(TraceEvent::enter(6));
        events.push(TraceEvent::exit(5));
        events.push(TraceEvent::exit(4));
    }
    events.push(TraceEvent::exit(1));
    events
}

// ═══════════════════════════════════════════════════════════════════════════
// Reconstruction Benchmarks
// ═══════════════════════════════════════════════════════════════════════════

fn bench_tree_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace/reconstruction");
    let index = synthetic_index();
    let outcome = ExecutionOutcome::completed();

    for iterations in [100, 1_000, 10_000, 100_000].iter() {
        let events = synthetic_events(*iterations);
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &events,
            |b, events| {
                b.iter(|| {
                    TraceTree::from_events(black_box(events), &index, None, &outcome).unwrap()
                })
            },
        );
    }

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Serialization Benchmarks
// ═══════════════════════════════════════════════════════════════════════════

fn bench_document_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace/serialize");
    group.sample_size(30);
    let index = synthetic_index();
    let outcome = ExecutionOutcome::completed();

    for iterations in [1_000, 10_000, 50_000].iter() {
        let events = synthetic_events(*iterations);
        let tree = TraceTree::from_events(&events, &index, None, &outcome).unwrap();

        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &tree,
            |b, tree| {
                b.iter(|| {
                    let mut out = Vec::with_capacity(1 << 20);
                    JsonTraceExporter
                        .export(&outcome, &index, black_box(tree), &mut out)
                        .unwrap();
                    out
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tree_reconstruction, bench_document_serialization);
criterion_main!(benches);
