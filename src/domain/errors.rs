// Error taxonomy for the RunVis pipeline.
//
// Parse and build failures abort the whole request; instrumentation issues
// are node-local demotions; runtime failures are recorded as an
// ExecutionOutcome, never as errors, so a partial trace can still be built.

use thiserror::Error;

use crate::domain::index::NodeId;

#[derive(Debug, Error)]
pub enum TraceError {
    /// A source file could not be parsed. Fatal to the whole indexing batch:
    /// a partial index is useless downstream.
    #[error("parse error in {file} at {line}:{col}: {message}")]
    Parse {
        file: String,
        line: usize,
        col: usize,
        message: String,
    },

    /// The instrumenter could not process a file at all (its replay of the
    /// indexer's traversal diverged, or the crate root is missing). Distinct
    /// from node-local demotions, which are InstrumentationIssue records.
    #[error("instrumentation failed for {file}: {message}")]
    Instrumentation { file: String, message: String },

    /// The instrumented program failed to compile. Fatal to trace
    /// production; the compiler output is surfaced as-is.
    #[error("failed to compile instrumented program:\n{stderr}")]
    Build { stderr: String },

    /// Enter/Exit mismatch while reconstructing the tree. Indicates broken
    /// instrumentation or a damaged event stream; never silently repaired.
    #[error("corrupted trace at event {position}: {message}")]
    Corruption { position: usize, message: String },

    /// The requested entry function does not exist in the input sources.
    #[error("entry point `{name}` not found in the provided sources")]
    NoEntryPoint { name: String },

    /// The requested entry function exists but cannot serve as an entry.
    #[error("entry point `{name}` cannot be used: {reason}")]
    InvalidEntry { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A node-local instrumentation demotion: the construct keeps its id in the
/// index but is flagged untraceable instead of aborting the file.
#[derive(Debug, Clone)]
pub struct InstrumentationIssue {
    pub id: NodeId,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message_names_location() {
        let err = TraceError::Parse {
            file: "src/main.rs".to_string(),
            line: 7,
            col: 12,
            message: "expected `;`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("src/main.rs"));
        assert!(text.contains("7:12"));
    }

    #[test]
    fn test_corruption_message_names_position() {
        let err = TraceError::Corruption {
            position: 42,
            message: "exit for id 3, expected 5".to_string(),
        };
        assert!(err.to_string().contains("event 42"));
    }
}
