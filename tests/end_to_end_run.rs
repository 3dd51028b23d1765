// Full pipeline runs against real child processes. These tests compile and
// execute instrumented programs with rustc, so they are ignored by default;
// run them with `cargo test -- --ignored` on a machine with a Rust
// toolchain.

use runvis::application::TraceUsecase;
use runvis::domain::config::RunConfig;
use runvis::domain::event::RunStatus;
use runvis::domain::source::{InstrumentedProgram, InstrumentedUnit, SourceFile};
use runvis::infrastructure::{RustcRunner, SynInstrumenter, SynSourceIndexer};
use runvis::ports::json_exporter::JsonTraceExporter;
use runvis::ports::ProgramRunner;
use serde_json::Value;
use std::time::Duration;

fn usecase<'a>(runner: &'a RustcRunner) -> TraceUsecase<'a> {
    TraceUsecase {
        indexer: &SynSourceIndexer,
        instrumenter: &SynInstrumenter,
        runner,
        exporter: &JsonTraceExporter,
    }
}

fn trace_program(source: &str, config: &RunConfig) -> (Value, RunStatus) {
    let files = vec![SourceFile {
        rel_path: "main.rs".to_string(),
        content: source.to_string(),
    }];
    let runner = RustcRunner;
    let mut out = Vec::new();
    let summary = usecase(&runner)
        .run(&files, Some("main.rs"), config, &mut out)
        .expect("pipeline must produce a document");
    let doc = serde_json::from_slice(&out).expect("valid JSON document");
    (doc, summary.status)
}

#[test]
#[ignore] // Requires rustc in PATH
fn completed_run_produces_closed_trace() {
    let (doc, status) = trace_program(
        r#"
fn main() {
    let mut total = 0;
    for i in 0..3 {
        total += bump(i);
    }
    if total > 2 {
        println!("total={}", total);
    }
}

fn bump(n: i32) -> i32 {
    n + 1
}
"#,
        &RunConfig::default(),
    );

    assert_eq!(status, RunStatus::Completed);
    assert_eq!(doc["outcome"], "Completed");

    // Three sibling iteration frames under the loop entry.
    fn count_iterations(node: &Value, hits: &mut usize) {
        if node.get("iteration").is_some() {
            *hits += 1;
        }
        if let Some(children) = node["children"].as_array() {
            for child in children {
                count_iterations(child, hits);
            }
        }
    }
    let mut iterations = 0;
    count_iterations(&doc["trace"], &mut iterations);
    assert_eq!(iterations, 3);

    // No frame may be incomplete on a completed run.
    fn assert_all_complete(node: &Value) {
        if node["type"] == "frame" {
            assert_eq!(node["complete"], true);
        }
        if let Some(children) = node["children"].as_array() {
            for child in children {
                assert_all_complete(child);
            }
        }
    }
    assert_all_complete(&doc["trace"]);
}

#[test]
#[ignore] // Requires rustc in PATH
fn panicking_run_yields_incomplete_frames() {
    let (doc, status) = trace_program(
        r#"
fn main() {
    outer();
}

fn outer() {
    inner();
}

fn inner() {
    panic!("boom");
}
"#,
        &RunConfig::default(),
    );

    assert_eq!(status, RunStatus::UncaughtFault);
    assert_eq!(doc["outcome"], "UncaughtFault");

    fn count_incomplete(node: &Value, hits: &mut usize) {
        if node["type"] == "frame" && node["complete"] == false {
            *hits += 1;
        }
        if let Some(children) = node["children"].as_array() {
            for child in children {
                count_incomplete(child, hits);
            }
        }
    }
    let mut incomplete = 0;
    count_incomplete(&doc["trace"], &mut incomplete);
    assert!(incomplete > 0, "aborted run must leave open frames flagged");
}

#[test]
#[ignore] // Requires rustc in PATH
fn infinite_loop_times_out_with_partial_trace() {
    let config = RunConfig {
        timeout: Duration::from_secs(2),
        ..RunConfig::default()
    };
    let (doc, status) = trace_program(
        r#"
fn main() {
    let mut n: u64 = 0;
    loop {
        n = n.wrapping_add(1);
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}
"#,
        &config,
    );

    assert_eq!(status, RunStatus::TimedOut);
    assert_eq!(doc["outcome"], "TimedOut");
    // The drained prefix still yields a tree rooted in main.
    assert!(!doc["trace"]["children"].as_array().unwrap().is_empty());
}

#[test]
#[ignore] // Requires rustc in PATH
fn instrumentation_is_semantically_transparent() {
    const PROGRAM: &str = r#"
fn main() {
    let mut acc = 0;
    for i in 1..=4 {
        acc += i;
    }
    println!("acc={}", acc);
    eprintln!("done");
}
"#;

    // Instrumented run, through the full pipeline.
    let files = vec![SourceFile {
        rel_path: "main.rs".to_string(),
        content: PROGRAM.to_string(),
    }];
    let runner = RustcRunner;
    let mut out = Vec::new();
    let summary = usecase(&runner)
        .run(&files, Some("main.rs"), &RunConfig::default(), &mut out)
        .unwrap();

    // Plain run of the same program, compiled without any probes.
    let plain = InstrumentedProgram {
        files: vec![InstrumentedUnit {
            rel_path: "main.rs".to_string(),
            code: PROGRAM.to_string(),
        }],
        root: 0,
        issues: Vec::new(),
    };
    let baseline = runner.run(&plain, &RunConfig::default()).unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(baseline.outcome.status, RunStatus::Completed);
    assert_eq!(summary.stdout, baseline.stdout);
    assert_eq!(summary.stderr, baseline.stderr);
}
