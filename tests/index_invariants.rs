// Structural invariants of the identifier index over realistic source.

use runvis::domain::index::{NodeKind, ProgramIndex, TraceNode};
use runvis::domain::source::SourceFile;
use runvis::infrastructure::SynSourceIndexer;
use runvis::ports::SourceIndexer;

const PROGRAM: &str = r#"
fn main() {
    let total = sum_to(4);
    if total > 5 {
        println!("large: {}", total);
    } else {
        println!("small: {}", total);
    }
    let mut count = 0;
    while count < 3 {
        count += 1;
        tick(count);
    }
    match total {
        0 => println!("zero"),
        n if n.is_positive() => println!("positive"),
        _ => println!("negative"),
    }
}

fn sum_to(n: i32) -> i32 {
    let mut acc = 0;
    for i in 1..=n {
        acc += i;
    }
    acc
}

fn tick(n: i32) {
    let _ = n;
}
"#;

const SECOND_FILE: &str = r#"
pub struct Counter {
    value: u32,
}

impl Counter {
    pub fn bump(&mut self) -> u32 {
        self.value += 1;
        self.value
    }
}
"#;

fn index_program() -> ProgramIndex {
    let indexer = SynSourceIndexer;
    let files = vec![
        SourceFile {
            rel_path: "counter.rs".to_string(),
            content: SECOND_FILE.to_string(),
        },
        SourceFile {
            rel_path: "main.rs".to_string(),
            content: PROGRAM.to_string(),
        },
    ];
    let units = indexer.parse(&files).unwrap();
    indexer.index(&units)
}

#[test]
fn identifiers_are_stable_across_repeated_runs() {
    let first = index_program();
    let second = index_program();
    assert_eq!(first.index, second.index);
}

#[test]
fn ids_are_dense_and_pre_ordered() {
    let program = index_program();
    let ids: Vec<u64> = program.index.iter().map(|n| n.id).collect();
    let expected: Vec<u64> = (1..=ids.len() as u64).collect();
    assert_eq!(ids, expected);

    for node in program.index.iter() {
        if let Some(parent) = node.parent {
            assert!(
                parent < node.id,
                "pre-order violated: parent {} after child {}",
                parent,
                node.id
            );
        }
    }
}

#[test]
fn sibling_ranges_never_overlap() {
    let program = index_program();
    let nodes: Vec<&TraceNode> = program.index.iter().collect();

    for a in &nodes {
        for b in &nodes {
            if a.id >= b.id || a.parent != b.parent || a.file != b.file {
                continue;
            }
            let disjoint = ends_before(a, b) || ends_before(b, a);
            assert!(
                disjoint,
                "sibling ranges overlap: id {} {:?} vs id {} {:?}",
                a.id, a.range, b.id, b.range
            );
        }
    }
}

fn ends_before(a: &TraceNode, b: &TraceNode) -> bool {
    (a.range.end_line, a.range.end_col) <= (b.range.start_line, b.range.start_col)
}

#[test]
fn child_ranges_nest_inside_ancestors() {
    let program = index_program();
    for node in program.index.iter() {
        let mut current = node.parent;
        while let Some(parent_id) = current {
            let parent = program.index.get(parent_id).unwrap();
            // Method bodies live in their own items; everything else nests
            // within the same file.
            if node.kind == NodeKind::MethodEntry {
                break;
            }
            assert_eq!(parent.file, node.file);
            assert!(
                parent.range.contains(&node.range),
                "id {} escapes ancestor {}",
                node.id,
                parent_id
            );
            current = parent.parent;
        }
    }
}

#[test]
fn only_executable_constructs_get_ids() {
    let program = index_program();
    // Struct and impl declarations contribute no ids beyond the method body.
    let counter_file_nodes: Vec<_> = program
        .index
        .iter()
        .filter(|n| program.index.file_path(n.file) == "counter.rs")
        .collect();
    assert_eq!(
        counter_file_nodes
            .iter()
            .filter(|n| n.kind == NodeKind::MethodEntry)
            .count(),
        1
    );
    // bump() holds two statements and no calls.
    assert_eq!(
        counter_file_nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Statement)
            .count(),
        2
    );
}

#[test]
fn file_walk_order_follows_loader_order() {
    let program = index_program();
    // counter.rs was delivered first, so its ids come first.
    let first_node = program.index.get(1).unwrap();
    assert_eq!(program.index.file_path(first_node.file), "counter.rs");
}

#[test]
fn method_records_cover_all_bodies() {
    let program = index_program();
    let names: Vec<&str> = program.methods.iter().map(|m| m.name.as_str()).collect();
    assert!(names.contains(&"main"));
    assert!(names.contains(&"sum_to"));
    assert!(names.contains(&"tick"));
    assert!(names.contains(&"bump"));

    let bump = program.methods.iter().find(|m| m.name == "bump").unwrap();
    assert_eq!(bump.receiver.as_deref(), Some("&self"));
}
