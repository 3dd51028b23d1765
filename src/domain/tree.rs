//! Trace Tree Reconstruction
//!
//! Rebuilds a nested execution tree from the flat, ordered event stream.
//! Frames live in an arena with index-based parent/child links; the stack of
//! open frames mirrors the traced program's own call stack. Call and method
//! frames are opened by Enter and closed by the matching Exit; loop frames
//! have no Exit of their own and close when an event arrives whose source
//! range falls outside the loop (or when the enclosing activation exits).

use crate::domain::errors::TraceError;
use crate::domain::event::{EventKind, ExecutionOutcome, TraceEvent};
use crate::domain::index::{IdentifierIndex, NodeId, NodeKind, TraceNode};
use crate::domain::symbol::SymbolIndex;

/// What one reconstructed frame represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Implicit program-entry frame; exactly one per tree.
    Root,
    /// One call-site activation.
    Call,
    /// One method-body activation.
    Method,
    /// One loop entry, grouping its iterations.
    Loop,
    /// One loop iteration.
    Iteration,
}

/// Ordered child of a frame: a nested frame or a leaf trace-node reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameChild {
    Frame(usize),
    Leaf(NodeId),
}

/// A reconstructed node in the execution tree.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Trace-node id behind this frame; None only for the root.
    /// Iteration frames carry their loop's id.
    pub node: Option<NodeId>,
    pub kind: FrameKind,
    pub parent: Option<usize>,
    pub children: Vec<FrameChild>,
    /// False only when execution stopped while this frame was still open.
    pub complete: bool,
    /// 1-based iteration number, set on Iteration frames.
    pub iteration: Option<u32>,
    /// Resolved callee name, set on method frames and their call sites.
    pub method: Option<String>,
    /// Event positions delimiting this frame in the stream.
    pub opened_at: usize,
    pub closed_at: Option<usize>,
}

/// The reconstructed execution tree. Built once per run, then handed to the
/// serializer and discarded.
#[derive(Debug, Clone)]
pub struct TraceTree {
    pub frames: Vec<Frame>,
}

impl TraceTree {
    /// Reconstruct the tree from an ordered event stream.
    ///
    /// Events are processed strictly in arrival order. An Exit that does not
    /// match the open frame is reported as corruption, never repaired. If the
    /// outcome is abnormal, frames still open at end-of-stream are closed
    /// implicitly and flagged incomplete.
    pub fn from_events(
        events: &[TraceEvent],
        index: &IdentifierIndex,
        symbols: Option<&SymbolIndex>,
        outcome: &ExecutionOutcome,
    ) -> Result<TraceTree, TraceError> {
        let mut builder = Builder::new(index, symbols);
        for (pos, event) in events.iter().enumerate() {
            builder.pos = pos;
            match event.kind {
                EventKind::Enter => builder.on_enter(event.id)?,
                EventKind::Exit => builder.on_exit(event.id)?,
                EventKind::IterationBoundary => builder.on_boundary(event.id)?,
            }
        }
        Ok(builder.finish(outcome))
    }

    pub fn root(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len() - 1 // excluding the implicit root
    }

    pub fn incomplete_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.complete).count()
    }

    /// Child frame indices of one frame, in order.
    pub fn child_frames(&self, frame: usize) -> Vec<usize> {
        self.frames[frame]
            .children
            .iter()
            .filter_map(|c| match c {
                FrameChild::Frame(idx) => Some(*idx),
                FrameChild::Leaf(_) => None,
            })
            .collect()
    }

    /// Leaf node ids directly under one frame, in order.
    pub fn leaves(&self, frame: usize) -> Vec<NodeId> {
        self.frames[frame]
            .children
            .iter()
            .filter_map(|c| match c {
                FrameChild::Leaf(id) => Some(*id),
                FrameChild::Frame(_) => None,
            })
            .collect()
    }
}

struct Builder<'a> {
    index: &'a IdentifierIndex,
    symbols: Option<&'a SymbolIndex>,
    frames: Vec<Frame>,
    stack: Vec<usize>,
    pos: usize,
}

impl<'a> Builder<'a> {
    fn new(index: &'a IdentifierIndex, symbols: Option<&'a SymbolIndex>) -> Self {
        let root = Frame {
            node: None,
            kind: FrameKind::Root,
            parent: None,
            children: Vec::new(),
            complete: true,
            iteration: None,
            method: None,
            opened_at: 0,
            closed_at: None,
        };
        Builder {
            index,
            symbols,
            frames: vec![root],
            stack: vec![0],
            pos: 0,
        }
    }

    fn corruption(&self, message: String) -> TraceError {
        TraceError::Corruption {
            position: self.pos,
            message,
        }
    }

    fn lookup(&self, id: NodeId) -> Result<&'a TraceNode, TraceError> {
        self.index
            .get(id)
            .ok_or_else(|| self.corruption(format!("event references unknown id {}", id)))
    }

    fn top(&self) -> usize {
        *self.stack.last().expect("stack always holds the root")
    }

    fn push_frame(&mut self, kind: FrameKind, node: NodeId) -> usize {
        let parent = self.top();
        let idx = self.frames.len();
        self.frames.push(Frame {
            node: Some(node),
            kind,
            parent: Some(parent),
            children: Vec::new(),
            complete: false,
            iteration: None,
            method: None,
            opened_at: self.pos,
            closed_at: None,
        });
        self.frames[parent].children.push(FrameChild::Frame(idx));
        self.stack.push(idx);
        idx
    }

    fn close_top(&mut self, complete: bool) {
        let idx = self.stack.pop().expect("close_top never pops the root");
        self.frames[idx].complete = complete;
        self.frames[idx].closed_at = Some(self.pos);
    }

    /// Close open loop/iteration frames whose loop range does not contain
    /// `node`. This is how a finished loop is detected: the first event from
    /// beyond the loop closes it. Never crosses a call/method frame, so
    /// recursion into the same source region cannot close the caller's loops.
    fn close_loops_not_containing(&mut self, node: &TraceNode) {
        loop {
            let frame = &self.frames[self.top()];
            if !matches!(frame.kind, FrameKind::Loop | FrameKind::Iteration) {
                return;
            }
            let loop_node = self
                .index
                .get(frame.node.expect("loop frames always carry an id"))
                .expect("loop frame ids were validated on open");
            if loop_node.file == node.file && loop_node.range.contains(&node.range) {
                return;
            }
            self.close_top(true);
        }
    }

    fn on_enter(&mut self, id: NodeId) -> Result<(), TraceError> {
        let node = self.lookup(id)?;
        match node.kind {
            NodeKind::Statement | NodeKind::BranchArm => {
                self.close_loops_not_containing(node);
                let top = self.top();
                self.frames[top].children.push(FrameChild::Leaf(id));
            }
            NodeKind::CallSite => {
                self.close_loops_not_containing(node);
                self.push_frame(FrameKind::Call, id);
            }
            NodeKind::MethodEntry => {
                // The method body lives elsewhere in the source, so no
                // containment check: open loops belong to the caller and stay
                // open underneath this activation.
                let method = self.symbols.and_then(|s| s.method(id)).map(|m| m.name);
                let top = self.top();
                if self.frames[top].kind == FrameKind::Call && self.frames[top].method.is_none() {
                    self.frames[top].method = method.clone();
                }
                let idx = self.push_frame(FrameKind::Method, id);
                self.frames[idx].method = method;
            }
            NodeKind::LoopBody => {
                return Err(self.corruption(format!("loop body {} emitted Enter", id)));
            }
        }
        Ok(())
    }

    fn on_exit(&mut self, id: NodeId) -> Result<(), TraceError> {
        let node = self.lookup(id)?;
        if !node.kind.opens_frame() {
            return Err(self.corruption(format!(
                "exit event for {} node {}",
                node.kind.label(),
                id
            )));
        }

        // Loops still open inside this activation end here.
        while matches!(
            self.frames[self.top()].kind,
            FrameKind::Loop | FrameKind::Iteration
        ) {
            self.close_top(true);
        }

        let top = self.top();
        if top == 0 {
            return Err(self.corruption(format!("exit for id {} with no open frame", id)));
        }
        if self.frames[top].node != Some(id) {
            return Err(self.corruption(format!(
                "exit for id {}, expected id {}",
                id,
                self.frames[top].node.unwrap_or(0)
            )));
        }
        self.close_top(true);
        Ok(())
    }

    fn on_boundary(&mut self, id: NodeId) -> Result<(), TraceError> {
        let node = self.lookup(id)?;
        if node.kind != NodeKind::LoopBody {
            return Err(self.corruption(format!(
                "iteration boundary for {} node {}",
                node.kind.label(),
                id
            )));
        }

        // Is an iteration of this loop already open in the current
        // activation? Search stops at the first call/method frame.
        let mut open_iteration = None;
        for &idx in self.stack.iter().rev() {
            match self.frames[idx].kind {
                FrameKind::Iteration if self.frames[idx].node == Some(id) => {
                    open_iteration = Some(idx);
                    break;
                }
                FrameKind::Iteration | FrameKind::Loop => continue,
                _ => break,
            }
        }

        if let Some(idx) = open_iteration {
            // Close inner loops, then the finished iteration, and open the
            // next one under the same loop entry.
            while self.top() != idx {
                self.close_top(true);
            }
            let finished = self.frames[idx].iteration.unwrap_or(1);
            self.close_top(true);
            let next = self.push_frame(FrameKind::Iteration, id);
            self.frames[next].iteration = Some(finished + 1);
        } else {
            // First boundary for this loop: open the loop entry and its
            // first iteration.
            self.close_loops_not_containing(node);
            self.push_frame(FrameKind::Loop, id);
            let first = self.push_frame(FrameKind::Iteration, id);
            self.frames[first].iteration = Some(1);
        }
        Ok(())
    }

    fn finish(mut self, outcome: &ExecutionOutcome) -> TraceTree {
        // Anything still open at end-of-stream closes here: normally for a
        // completed run, flagged incomplete otherwise so the presentation
        // layer can show where execution stopped.
        self.pos = self.pos.saturating_add(1);
        let normal = outcome.is_normal();
        while self.stack.len() > 1 {
            self.close_top(normal);
        }
        TraceTree {
            frames: self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{ExecutionOutcome, RunStatus, TraceEvent};
    use crate::domain::index::{IdentifierIndex, NodeKind};
    use crate::domain::source::SourceRange;

    fn range(sl: u32, el: u32) -> SourceRange {
        SourceRange {
            start_line: sl,
            start_col: 0,
            end_line: el,
            end_col: 99,
        }
    }

    /// main { stmt; call -> helper { stmt } }
    fn call_index() -> IdentifierIndex {
        let mut index = IdentifierIndex::new();
        let f = index.add_file("main.rs");
        index.append(NodeKind::MethodEntry, f, range(1, 5), None); // 1 main
        index.append(NodeKind::Statement, f, range(2, 2), Some(1)); // 2
        index.append(NodeKind::CallSite, f, range(3, 3), Some(1)); // 3
        index.append(NodeKind::MethodEntry, f, range(7, 9), None); // 4 helper
        index.append(NodeKind::Statement, f, range(8, 8), Some(4)); // 5
        index
    }

    #[test]
    fn test_empty_stream_yields_bare_root() {
        let index = call_index();
        let tree =
            TraceTree::from_events(&[], &index, None, &ExecutionOutcome::completed()).unwrap();
        assert_eq!(tree.frames.len(), 1);
        assert!(tree.root().children.is_empty());
        assert_eq!(tree.incomplete_count(), 0);
    }

    #[test]
    fn test_call_nesting() {
        let index = call_index();
        let events = vec![
            TraceEvent::enter(1),
            TraceEvent::enter(2),
            TraceEvent::enter(3),
            TraceEvent::enter(4),
            TraceEvent::enter(5),
            TraceEvent::exit(4),
            TraceEvent::exit(3),
            TraceEvent::exit(1),
        ];
        let tree =
            TraceTree::from_events(&events, &index, None, &ExecutionOutcome::completed()).unwrap();

        let main_frame = tree.child_frames(0)[0];
        assert_eq!(tree.frames[main_frame].kind, FrameKind::Method);
        assert_eq!(tree.leaves(main_frame), vec![2]);

        let call_frame = tree.child_frames(main_frame)[0];
        assert_eq!(tree.frames[call_frame].kind, FrameKind::Call);
        let helper_frame = tree.child_frames(call_frame)[0];
        assert_eq!(tree.frames[helper_frame].kind, FrameKind::Method);
        assert_eq!(tree.leaves(helper_frame), vec![5]);
        assert_eq!(tree.incomplete_count(), 0);
    }

    #[test]
    fn test_exit_mismatch_is_corruption() {
        let index = call_index();
        let events = vec![TraceEvent::enter(1), TraceEvent::exit(4)];
        let err = TraceTree::from_events(&events, &index, None, &ExecutionOutcome::completed())
            .unwrap_err();
        assert!(matches!(err, TraceError::Corruption { position: 1, .. }));
    }

    #[test]
    fn test_unknown_id_is_corruption() {
        let index = call_index();
        let events = vec![TraceEvent::enter(77)];
        let err = TraceTree::from_events(&events, &index, None, &ExecutionOutcome::completed())
            .unwrap_err();
        assert!(matches!(err, TraceError::Corruption { .. }));
    }

    #[test]
    fn test_abnormal_outcome_marks_open_frames() {
        let index = call_index();
        // Entered main and the call, never exited either.
        let events = vec![
            TraceEvent::enter(1),
            TraceEvent::enter(3),
            TraceEvent::enter(4),
        ];
        let outcome = ExecutionOutcome::with_diagnostic(RunStatus::UncaughtFault, "signal 6");
        let tree = TraceTree::from_events(&events, &index, None, &outcome).unwrap();
        assert_eq!(tree.incomplete_count(), 3);
    }
}
