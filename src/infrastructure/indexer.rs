//! Source Indexer
//!
//! Parses input files with syn and assigns a dense, stable id to every
//! traceable construct in a fixed pre-order traversal: the enclosing
//! construct always receives its id before anything nested inside it, and
//! files are walked in the order the loader delivers them (sorted by path).
//! Re-running on unchanged source therefore reproduces identical ids.
//!
//! Traceable constructs, by structural rule:
//! - every fn/method/trait-default body          -> MethodEntry
//! - every statement inside an executable block  -> Statement
//! - every if/else block and match arm           -> BranchArm
//! - every for/while/loop construct              -> LoopBody
//! - every call and method-call expression       -> CallSite
//! Declarations, type signatures, const initializers and comments never get
//! ids.
//!
//! The instrumenter replays this exact traversal to splice probes; both
//! sides hook the same syn visitor dispatch points, which is what keeps the
//! two walks aligned.

use syn::spanned::Spanned;
use syn::visit::{self, Visit};

use crate::domain::errors::TraceError;
use crate::domain::index::{IdentifierIndex, NodeId, NodeKind, ProgramIndex};
use crate::domain::source::{SourceFile, SourceRange, SourceUnit};
use crate::domain::symbol::MethodRecord;
use crate::ports::SourceIndexer;

pub struct SynSourceIndexer;

impl SourceIndexer for SynSourceIndexer {
    /// Parse all input files in parallel. Any parse failure aborts the whole
    /// batch: a partial index is useless downstream.
    fn parse(&self, files: &[SourceFile]) -> Result<Vec<SourceUnit>, TraceError> {
        files
            .iter()
            .map(|file| {
                syn::parse_file(&file.content)
                    .map(|ast| SourceUnit {
                        rel_path: file.rel_path.clone(),
                        content: file.content.clone(),
                        ast,
                    })
                    .map_err(|err| {
                        let location = err.span().start();
                        TraceError::Parse {
                            file: file.rel_path.clone(),
                            line: location.line,
                            col: location.column,
                            message: err.to_string(),
                        }
                    })
            })
            .collect()
    }

    /// Walk all units sequentially, assigning ids and collecting method
    /// records for the symbol index.
    fn index(&self, units: &[SourceUnit]) -> ProgramIndex {
        let mut index = IdentifierIndex::new();
        let mut methods = Vec::new();

        for unit in units {
            let file = index.add_file(&unit.rel_path);
            let mut walker = IndexWalker {
                index: &mut index,
                methods: &mut methods,
                file,
                rel_path: &unit.rel_path,
                parents: Vec::new(),
            };
            walker.visit_file(&unit.ast);
        }

        ProgramIndex { index, methods }
    }
}

/// Extract the receiver form of a signature: "&self", "self", or None for
/// free functions and associated functions.
fn receiver_of(sig: &syn::Signature) -> Option<String> {
    sig.inputs.first().and_then(|arg| match arg {
        syn::FnArg::Receiver(r) => {
            if r.reference.is_some() {
                Some("&self".to_string())
            } else {
                Some("self".to_string())
            }
        }
        _ => None,
    })
}

fn has_typed_params(sig: &syn::Signature) -> bool {
    sig.inputs
        .iter()
        .any(|arg| matches!(arg, syn::FnArg::Typed(_)))
}

struct IndexWalker<'a> {
    index: &'a mut IdentifierIndex,
    methods: &'a mut Vec<MethodRecord>,
    file: u32,
    rel_path: &'a str,
    parents: Vec<NodeId>,
}

impl IndexWalker<'_> {
    fn record(&mut self, kind: NodeKind, span: proc_macro2::Span) -> NodeId {
        let range = SourceRange::from_span(span);
        let parent = self.parents.last().copied();
        self.index.append(kind, self.file, range, parent)
    }

    fn record_method(&mut self, id: NodeId, sig: &syn::Signature) {
        self.methods.push(MethodRecord {
            node_id: id,
            name: sig.ident.to_string(),
            receiver: receiver_of(sig),
            has_params: has_typed_params(sig),
            is_const: sig.constness.is_some(),
            file: self.rel_path.to_string(),
            line: sig.ident.span().start().line,
        });
    }

    fn enter_body(&mut self, kind: NodeKind, span: proc_macro2::Span, block: &syn::Block) -> NodeId {
        let id = self.record(kind, span);
        self.parents.push(id);
        self.visit_block(block);
        self.parents.pop();
        id
    }
}

impl<'ast> Visit<'ast> for IndexWalker<'_> {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let id = self.enter_body(NodeKind::MethodEntry, node.span(), &node.block);
        self.record_method(id, &node.sig);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let id = self.enter_body(NodeKind::MethodEntry, node.span(), &node.block);
        self.record_method(id, &node.sig);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast syn::TraitItemFn) {
        // Only default bodies are executable.
        if let Some(block) = &node.default {
            let id = self.enter_body(NodeKind::MethodEntry, node.span(), block);
            self.record_method(id, &node.sig);
        }
    }

    fn visit_block(&mut self, block: &'ast syn::Block) {
        for stmt in &block.stmts {
            if matches!(stmt, syn::Stmt::Item(_)) {
                // Nested items are declarations, not statements; descend to
                // reach nested fn bodies without assigning a statement id.
                self.visit_stmt(stmt);
                continue;
            }
            let id = self.record(NodeKind::Statement, stmt.span());
            self.parents.push(id);
            self.visit_stmt(stmt);
            self.parents.pop();
        }
    }

    fn visit_expr_if(&mut self, node: &'ast syn::ExprIf) {
        self.visit_expr(&node.cond);
        self.enter_body(
            NodeKind::BranchArm,
            node.then_branch.span(),
            &node.then_branch,
        );
        if let Some((_, else_expr)) = &node.else_branch {
            match else_expr.as_ref() {
                // `else if` chains: the nested if contributes its own arms.
                syn::Expr::If(inner) => self.visit_expr_if(inner),
                syn::Expr::Block(b) => {
                    self.enter_body(NodeKind::BranchArm, b.block.span(), &b.block);
                }
                other => self.visit_expr(other),
            }
        }
    }

    fn visit_expr_match(&mut self, node: &'ast syn::ExprMatch) {
        self.visit_expr(&node.expr);
        for arm in &node.arms {
            // Guards execute before arm entry and for arms that never match.
            if let Some((_, guard)) = &arm.guard {
                self.visit_expr(guard);
            }
            let id = self.record(NodeKind::BranchArm, arm.body.span());
            self.parents.push(id);
            self.visit_expr(&arm.body);
            self.parents.pop();
        }
    }

    fn visit_expr_for_loop(&mut self, node: &'ast syn::ExprForLoop) {
        // The loop node's range spans the whole construct so that events
        // from the loop header stay inside it during reconstruction.
        let id = self.record(NodeKind::LoopBody, node.span());
        self.parents.push(id);
        self.visit_expr(&node.expr);
        self.visit_block(&node.body);
        self.parents.pop();
    }

    fn visit_expr_while(&mut self, node: &'ast syn::ExprWhile) {
        let id = self.record(NodeKind::LoopBody, node.span());
        self.parents.push(id);
        self.visit_expr(&node.cond);
        self.visit_block(&node.body);
        self.parents.pop();
    }

    fn visit_expr_loop(&mut self, node: &'ast syn::ExprLoop) {
        let id = self.record(NodeKind::LoopBody, node.span());
        self.parents.push(id);
        self.visit_block(&node.body);
        self.parents.pop();
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        let id = self.record(NodeKind::CallSite, node.span());
        self.parents.push(id);
        visit::visit_expr_call(self, node);
        self.parents.pop();
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        let id = self.record(NodeKind::CallSite, node.span());
        self.parents.push(id);
        visit::visit_expr_method_call(self, node);
        self.parents.pop();
    }

    // Const evaluation contexts never execute at trace time; skip them
    // entirely so no id lands inside an initializer the instrumenter could
    // not probe anyway.
    fn visit_item_const(&mut self, _node: &'ast syn::ItemConst) {}
    fn visit_item_static(&mut self, _node: &'ast syn::ItemStatic) {}
    fn visit_impl_item_const(&mut self, _node: &'ast syn::ImplItemConst) {}
    fn visit_trait_item_const(&mut self, _node: &'ast syn::TraitItemConst) {}
    fn visit_item_enum(&mut self, _node: &'ast syn::ItemEnum) {}
    fn visit_expr_const(&mut self, _node: &'ast syn::ExprConst) {}

    fn visit_expr_repeat(&mut self, node: &'ast syn::ExprRepeat) {
        // The element is runtime code, the length is const context.
        self.visit_expr(&node.expr);
    }

    fn visit_generic_argument(&mut self, node: &'ast syn::GenericArgument) {
        // Const generic arguments are const context.
        if matches!(
            node,
            syn::GenericArgument::Const(_) | syn::GenericArgument::AssocConst(_)
        ) {
            return;
        }
        visit::visit_generic_argument(self, node);
    }

    fn visit_type_array(&mut self, node: &'ast syn::TypeArray) {
        // Array lengths in type position are const context.
        self.visit_type(&node.elem);
    }
}
