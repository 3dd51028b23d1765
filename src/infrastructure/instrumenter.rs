//! Probe Instrumenter
//!
//! Produces a semantically equivalent variant of each parsed file in which
//! reaching a traceable node emits its id on the trace channel. The splicer
//! replays the indexer's pre-order traversal (same visitor hooks, same
//! order), consuming the per-file id sequence as it goes; any divergence
//! between the two walks is an internal defect and fails the file loudly.
//!
//! Probe shapes per node kind:
//! - Statement:  `crate::__rv::stmt(ID);` prepended before the statement
//! - BranchArm:  `crate::__rv::arm(ID);` prepended inside the arm block
//! - LoopBody:   `crate::__rv::iter(ID);` as the first statement of the body
//! - CallSite:   `E` rewritten to `({ let _rv_call = crate::__rv::call(ID); E })`
//! - MethodEntry: `let _rv_frame = crate::__rv::enter(ID);` prepended to the body
//!
//! Guards emit Exit on Drop, so exits fire on early returns and `?` without
//! altering control flow. Constructs that cannot host a probe, namely
//! everything inside a `const fn` body that must stay const-evaluable, are demoted to
//! untraceable and reported per node instead of aborting the file.

use proc_macro2::{Literal, TokenStream};
use quote::ToTokens;
use syn::visit_mut::{self, VisitMut};

use crate::domain::entry_point::{EntryPoint, EntryPointKind};
use crate::domain::errors::{InstrumentationIssue, TraceError};
use crate::domain::index::{NodeId, NodeKind, ProgramIndex};
use crate::domain::source::{InstrumentedProgram, InstrumentedUnit, SourceUnit};
use crate::infrastructure::runtime::PROBE_RUNTIME;
use crate::ports::Instrumenter;

pub struct SynInstrumenter;

impl Instrumenter for SynInstrumenter {
    fn instrument(
        &self,
        units: &[SourceUnit],
        program: &ProgramIndex,
        entry: &EntryPoint,
        root_rel: &str,
    ) -> Result<InstrumentedProgram, TraceError> {
        let mut files = Vec::with_capacity(units.len());
        let mut issues = Vec::new();
        let mut root = None;

        for (file_idx, unit) in units.iter().enumerate() {
            let expected: Vec<(NodeId, NodeKind)> = program
                .index
                .iter()
                .filter(|n| n.file == file_idx as u32)
                .map(|n| (n.id, n.kind))
                .collect();

            let mut ast = unit.ast.clone();
            let mut splicer = ProbeSplicer {
                expected: expected.into_iter(),
                issues: &mut issues,
                demoted_scopes: 0,
                drift: None,
            };
            splicer.visit_file_mut(&mut ast);

            if let Some(message) = splicer.drift.take() {
                return Err(TraceError::Instrumentation {
                    file: unit.rel_path.clone(),
                    message,
                });
            }
            if let Some((id, _)) = splicer.expected.next() {
                return Err(TraceError::Instrumentation {
                    file: unit.rel_path.clone(),
                    message: format!("traversal ended with id {} unconsumed", id),
                });
            }

            let mut code = ast.into_token_stream().to_string();
            if unit.rel_path == root_rel {
                root = Some(files.len());
                if entry.kind == EntryPointKind::Named {
                    code.push_str(&format!("\nfn main() {{ {}(); }}\n", entry.name));
                }
                code.push_str("\n");
                code.push_str(PROBE_RUNTIME);
            }
            files.push(InstrumentedUnit {
                rel_path: unit.rel_path.clone(),
                code,
            });
        }

        let root = root.ok_or_else(|| TraceError::Instrumentation {
            file: root_rel.to_string(),
            message: "crate root file not among the input units".to_string(),
        })?;

        Ok(InstrumentedProgram {
            files,
            root,
            issues,
        })
    }
}

struct ProbeSplicer<'a> {
    expected: std::vec::IntoIter<(NodeId, NodeKind)>,
    issues: &'a mut Vec<InstrumentationIssue>,
    /// Depth of enclosing scopes where probes must not be spliced.
    demoted_scopes: u32,
    drift: Option<String>,
}

impl ProbeSplicer<'_> {
    /// Consume the next expected id, verifying the kind matches the
    /// indexer's assignment at this traversal point.
    fn take(&mut self, kind: NodeKind) -> NodeId {
        match self.expected.next() {
            Some((id, expected_kind)) if expected_kind == kind => {
                if self.demoted_scopes > 0 {
                    self.issues.push(InstrumentationIssue {
                        id,
                        reason: "inside a const fn body".to_string(),
                    });
                }
                id
            }
            Some((id, expected_kind)) => {
                if self.drift.is_none() {
                    self.drift = Some(format!(
                        "expected {} for id {}, reached {}",
                        expected_kind.label(),
                        id,
                        kind.label()
                    ));
                }
                id
            }
            None => {
                if self.drift.is_none() {
                    self.drift = Some(format!("ran out of ids reaching a {}", kind.label()));
                }
                0
            }
        }
    }

    fn spliceable(&self) -> bool {
        self.demoted_scopes == 0 && self.drift.is_none()
    }

    fn visit_fn_body(&mut self, id: NodeId, is_const: bool, block: &mut syn::Block) {
        if is_const {
            self.issues.push(InstrumentationIssue {
                id,
                reason: "const fn body cannot host probes".to_string(),
            });
            self.demoted_scopes += 1;
            self.visit_block_mut(block);
            self.demoted_scopes -= 1;
        } else {
            self.visit_block_mut(block);
            if self.spliceable() {
                let lit = Literal::u64_unsuffixed(id);
                block
                    .stmts
                    .insert(0, syn::parse_quote! { let _rv_frame = crate::__rv::enter(#lit); });
            }
        }
    }
}

fn stmt_probe(id: NodeId) -> syn::Stmt {
    let lit = Literal::u64_unsuffixed(id);
    syn::parse_quote! { crate::__rv::stmt(#lit); }
}

fn arm_probe(id: NodeId) -> syn::Stmt {
    let lit = Literal::u64_unsuffixed(id);
    syn::parse_quote! { crate::__rv::arm(#lit); }
}

fn iter_probe(id: NodeId) -> syn::Stmt {
    let lit = Literal::u64_unsuffixed(id);
    syn::parse_quote! { crate::__rv::iter(#lit); }
}

impl VisitMut for ProbeSplicer<'_> {
    fn visit_item_fn_mut(&mut self, node: &mut syn::ItemFn) {
        let id = self.take(NodeKind::MethodEntry);
        self.visit_fn_body(id, node.sig.constness.is_some(), &mut node.block);
    }

    fn visit_impl_item_fn_mut(&mut self, node: &mut syn::ImplItemFn) {
        let id = self.take(NodeKind::MethodEntry);
        self.visit_fn_body(id, node.sig.constness.is_some(), &mut node.block);
    }

    fn visit_trait_item_fn_mut(&mut self, node: &mut syn::TraitItemFn) {
        let is_const = node.sig.constness.is_some();
        if let Some(block) = &mut node.default {
            let id = self.take(NodeKind::MethodEntry);
            self.visit_fn_body(id, is_const, block);
        }
    }

    fn visit_block_mut(&mut self, block: &mut syn::Block) {
        let original = std::mem::take(&mut block.stmts);
        let mut stmts = Vec::with_capacity(original.len() * 2);
        for mut stmt in original {
            if matches!(stmt, syn::Stmt::Item(_)) {
                self.visit_stmt_mut(&mut stmt);
                stmts.push(stmt);
                continue;
            }
            let id = self.take(NodeKind::Statement);
            self.visit_stmt_mut(&mut stmt);
            if self.spliceable() {
                stmts.push(stmt_probe(id));
            }
            stmts.push(stmt);
        }
        block.stmts = stmts;
    }

    fn visit_expr_if_mut(&mut self, node: &mut syn::ExprIf) {
        self.visit_expr_mut(&mut node.cond);
        let id = self.take(NodeKind::BranchArm);
        self.visit_block_mut(&mut node.then_branch);
        if self.spliceable() {
            node.then_branch.stmts.insert(0, arm_probe(id));
        }
        if let Some((_, else_expr)) = &mut node.else_branch {
            match else_expr.as_mut() {
                syn::Expr::If(inner) => self.visit_expr_if_mut(inner),
                syn::Expr::Block(b) => {
                    let id = self.take(NodeKind::BranchArm);
                    self.visit_block_mut(&mut b.block);
                    if self.spliceable() {
                        b.block.stmts.insert(0, arm_probe(id));
                    }
                }
                other => self.visit_expr_mut(other),
            }
        }
    }

    fn visit_expr_match_mut(&mut self, node: &mut syn::ExprMatch) {
        self.visit_expr_mut(&mut node.expr);
        for arm in &mut node.arms {
            if let Some((_, guard)) = &mut arm.guard {
                self.visit_expr_mut(guard);
            }
            let id = self.take(NodeKind::BranchArm);
            self.visit_expr_mut(&mut arm.body);
            if self.spliceable() {
                let probe = arm_probe(id);
                let original =
                    std::mem::replace(arm.body.as_mut(), syn::Expr::Verbatim(TokenStream::new()));
                *arm.body = syn::parse_quote! { { #probe #original } };
            }
        }
    }

    fn visit_expr_for_loop_mut(&mut self, node: &mut syn::ExprForLoop) {
        let id = self.take(NodeKind::LoopBody);
        self.visit_expr_mut(&mut node.expr);
        self.visit_block_mut(&mut node.body);
        if self.spliceable() {
            node.body.stmts.insert(0, iter_probe(id));
        }
    }

    fn visit_expr_while_mut(&mut self, node: &mut syn::ExprWhile) {
        let id = self.take(NodeKind::LoopBody);
        self.visit_expr_mut(&mut node.cond);
        self.visit_block_mut(&mut node.body);
        if self.spliceable() {
            node.body.stmts.insert(0, iter_probe(id));
        }
    }

    fn visit_expr_loop_mut(&mut self, node: &mut syn::ExprLoop) {
        let id = self.take(NodeKind::LoopBody);
        self.visit_block_mut(&mut node.body);
        if self.spliceable() {
            node.body.stmts.insert(0, iter_probe(id));
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut syn::Expr) {
        match expr {
            syn::Expr::Call(_) | syn::Expr::MethodCall(_) => {
                let id = self.take(NodeKind::CallSite);
                // Rewrite nested calls first, then wrap this one.
                match expr {
                    syn::Expr::Call(call) => visit_mut::visit_expr_call_mut(self, call),
                    syn::Expr::MethodCall(call) => visit_mut::visit_expr_method_call_mut(self, call),
                    _ => unreachable!(),
                }
                if self.spliceable() {
                    let lit = Literal::u64_unsuffixed(id);
                    let original =
                        std::mem::replace(expr, syn::Expr::Verbatim(TokenStream::new()));
                    // Parenthesized so the block cannot reparse as a loop or
                    // if body in range/condition positions.
                    *expr = syn::parse_quote! {
                        ({ let _rv_call = crate::__rv::call(#lit); #original })
                    };
                }
            }
            _ => visit_mut::visit_expr_mut(self, expr),
        }
    }

    // Const evaluation contexts are skipped on both walks.
    fn visit_item_const_mut(&mut self, _node: &mut syn::ItemConst) {}
    fn visit_item_static_mut(&mut self, _node: &mut syn::ItemStatic) {}
    fn visit_impl_item_const_mut(&mut self, _node: &mut syn::ImplItemConst) {}
    fn visit_trait_item_const_mut(&mut self, _node: &mut syn::TraitItemConst) {}
    fn visit_item_enum_mut(&mut self, _node: &mut syn::ItemEnum) {}
    fn visit_expr_const_mut(&mut self, _node: &mut syn::ExprConst) {}

    fn visit_expr_repeat_mut(&mut self, node: &mut syn::ExprRepeat) {
        self.visit_expr_mut(&mut node.expr);
    }

    fn visit_generic_argument_mut(&mut self, node: &mut syn::GenericArgument) {
        if matches!(
            node,
            syn::GenericArgument::Const(_) | syn::GenericArgument::AssocConst(_)
        ) {
            return;
        }
        visit_mut::visit_generic_argument_mut(self, node);
    }

    fn visit_type_array_mut(&mut self, node: &mut syn::TypeArray) {
        self.visit_type_mut(&mut node.elem);
    }
}
