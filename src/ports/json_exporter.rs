//! JSON Trace Exporter
//!
//! Serializes the reconstructed trace plus the identifier index into the
//! single JSON document crossing the boundary to the presentation layer.
//! Pure output formatting: never mutates its inputs, and streams straight to
//! the writer through serde: no intermediate Value tree and no full-document
//! buffer, so peak memory stays bounded by tree depth rather than trace
//! length. The index is emitted in ascending id order for byte-stable
//! output.

use std::io::Write;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::domain::errors::TraceError;
use crate::domain::event::ExecutionOutcome;
use crate::domain::index::{IdentifierIndex, TraceNode, ROOT_MARKER};
use crate::domain::tree::{FrameChild, FrameKind, TraceTree};
use crate::ports::TraceExporter;

pub struct JsonTraceExporter;

impl TraceExporter for JsonTraceExporter {
    fn export(
        &self,
        outcome: &ExecutionOutcome,
        index: &IdentifierIndex,
        tree: &TraceTree,
        out: &mut dyn Write,
    ) -> Result<(), TraceError> {
        let document = TraceDocument {
            outcome,
            index,
            tree,
        };
        let mut writer = std::io::BufWriter::new(out);
        serde_json::to_writer(&mut writer, &document)
            .map_err(|err| TraceError::Io(err.into()))?;
        writer.flush()?;
        Ok(())
    }
}

struct TraceDocument<'a> {
    outcome: &'a ExecutionOutcome,
    index: &'a IdentifierIndex,
    tree: &'a TraceTree,
}

impl Serialize for TraceDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("outcome", &self.outcome.status)?;
        if let Some(diagnostic) = &self.outcome.diagnostic {
            map.serialize_entry("diagnostic", diagnostic)?;
        }
        map.serialize_entry("index", &IndexTable { index: self.index })?;
        map.serialize_entry(
            "trace",
            &FrameRef {
                tree: self.tree,
                frame: 0,
            },
        )?;
        map.end()
    }
}

struct IndexTable<'a> {
    index: &'a IdentifierIndex,
}

impl Serialize for IndexTable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.index.len()))?;
        for node in self.index.iter() {
            map.serialize_entry(
                &node.id.to_string(),
                &IndexEntry {
                    index: self.index,
                    node,
                },
            )?;
        }
        map.end()
    }
}

struct IndexEntry<'a> {
    index: &'a IdentifierIndex,
    node: &'a TraceNode,
}

impl Serialize for IndexEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let range = &self.node.range;
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("file", self.index.file_path(self.node.file))?;
        map.serialize_entry("startLine", &range.start_line)?;
        map.serialize_entry("startCol", &range.start_col)?;
        map.serialize_entry("endLine", &range.end_line)?;
        map.serialize_entry("endCol", &range.end_col)?;
        map.serialize_entry("kind", self.node.kind.label())?;
        map.end()
    }
}

struct FrameRef<'a> {
    tree: &'a TraceTree,
    frame: usize,
}

impl Serialize for FrameRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let frame = &self.tree.frames[self.frame];
        let children = ChildList {
            tree: self.tree,
            frame: self.frame,
        };

        let mut map = serializer.serialize_map(None)?;
        if frame.kind == FrameKind::Root {
            map.serialize_entry("id", &ROOT_MARKER)?;
            map.serialize_entry("children", &children)?;
        } else {
            map.serialize_entry("type", "frame")?;
            map.serialize_entry("id", &frame.node.unwrap_or(ROOT_MARKER))?;
            map.serialize_entry("complete", &frame.complete)?;
            if let Some(iteration) = frame.iteration {
                map.serialize_entry("iteration", &iteration)?;
            }
            if let Some(method) = &frame.method {
                map.serialize_entry("method", method)?;
            }
            map.serialize_entry("children", &children)?;
        }
        map.end()
    }
}

struct ChildList<'a> {
    tree: &'a TraceTree,
    frame: usize,
}

impl Serialize for ChildList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let children = &self.tree.frames[self.frame].children;
        let mut seq = serializer.serialize_seq(Some(children.len()))?;
        for child in children {
            match child {
                FrameChild::Frame(idx) => seq.serialize_element(&FrameRef {
                    tree: self.tree,
                    frame: *idx,
                })?,
                FrameChild::Leaf(id) => seq.serialize_element(&LeafRef { id: *id })?,
            }
        }
        seq.end()
    }
}

struct LeafRef {
    id: u64,
}

impl Serialize for LeafRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "leaf")?;
        map.serialize_entry("id", &self.id)?;
        map.end()
    }
}
