// Runtime trace events and execution outcomes.
//
// Events arrive over the trace channel as one line each: `E <id>` (enter),
// `X <id>` (exit), `I <id>` (iteration boundary). Arrival order is the only
// ground truth about execution order; nothing ever reorders events.

use serde::Serialize;

use crate::domain::index::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enter,
    Exit,
    IterationBoundary,
}

/// A single runtime emission. Ephemeral: produced by the drain thread,
/// consumed immediately by the trace builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub id: NodeId,
    pub kind: EventKind,
}

impl TraceEvent {
    pub fn enter(id: NodeId) -> Self {
        TraceEvent {
            id,
            kind: EventKind::Enter,
        }
    }

    pub fn exit(id: NodeId) -> Self {
        TraceEvent {
            id,
            kind: EventKind::Exit,
        }
    }

    pub fn boundary(id: NodeId) -> Self {
        TraceEvent {
            id,
            kind: EventKind::IterationBoundary,
        }
    }

    /// Parse one wire line. Returns None for anything malformed, which the
    /// drain loop treats as a truncated tail write from a killed child.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let tag = parts.next()?;
        let id: NodeId = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let kind = match tag {
            "E" => EventKind::Enter,
            "X" => EventKind::Exit,
            "I" => EventKind::IterationBoundary,
            _ => return None,
        };
        Some(TraceEvent { id, kind })
    }
}

/// How the traced program finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    NonZeroExit,
    UncaughtFault,
    TimedOut,
}

/// Final status of one execution, consumed by the trace builder to decide
/// whether the tree must be closed normally or terminated at the stop point.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: RunStatus,
    pub diagnostic: Option<String>,
}

impl ExecutionOutcome {
    pub fn completed() -> Self {
        ExecutionOutcome {
            status: RunStatus::Completed,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(status: RunStatus, diagnostic: impl Into<String>) -> Self {
        ExecutionOutcome {
            status,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// True when every Enter is expected to have a matching Exit.
    pub fn is_normal(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Everything captured from one execution of the instrumented program: the
/// drained event prefix, the classified outcome, and the program's own
/// output streams (kept apart from the trace channel, so user output and
/// events never interleave).
#[derive(Debug)]
pub struct RunCapture {
    pub events: Vec<TraceEvent>,
    pub outcome: ExecutionOutcome,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}
