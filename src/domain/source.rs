// Source file model for RunVis.
// These types carry input programs through the pipeline: raw text from the
// loader, parsed units for indexing, and instrumented text for the runner.

use serde::{Deserialize, Serialize};

use crate::domain::errors::InstrumentationIssue;

/// One input source file as delivered by the project loader.
/// `rel_path` is relative to the source root (the directory holding the
/// crate root file) and doubles as the file name reported in trace output.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub rel_path: String,
    pub content: String,
}

/// A parsed source file. Owned by the indexing pass; read-only afterward.
#[derive(Debug)]
pub struct SourceUnit {
    pub rel_path: String,
    pub content: String,
    pub ast: syn::File,
}

/// A line/column range in one source file.
/// Lines are 1-based, columns 0-based (what proc-macro2 span locations give).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    pub fn from_span(span: proc_macro2::Span) -> Self {
        let start = span.start();
        let end = span.end();
        SourceRange {
            start_line: start.line as u32,
            start_col: start.column as u32,
            end_line: end.line as u32,
            end_col: end.column as u32,
        }
    }

    /// Check if `other` is fully contained within `self`.
    pub fn contains(&self, other: &SourceRange) -> bool {
        if self.start_line > other.start_line || self.end_line < other.end_line {
            return false;
        }
        if self.start_line == other.start_line && self.start_col > other.start_col {
            return false;
        }
        if self.end_line == other.end_line && self.end_col < other.end_col {
            return false;
        }
        true
    }

    /// Containment excluding the equal range.
    pub fn strictly_contains(&self, other: &SourceRange) -> bool {
        self.contains(other) && self != other
    }
}

/// One instrumented source file, ready to be written into the scratch crate.
#[derive(Debug, Clone)]
pub struct InstrumentedUnit {
    pub rel_path: String,
    pub code: String,
}

/// The fully instrumented program handed to the runner.
/// `root` indexes the crate root file (the one carrying `fn main` and the
/// appended probe runtime).
#[derive(Debug, Clone)]
pub struct InstrumentedProgram {
    pub files: Vec<InstrumentedUnit>,
    pub root: usize,
    pub issues: Vec<InstrumentationIssue>,
}
