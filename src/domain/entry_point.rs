//! Entry Point Resolution Module
//!
//! Resolves the configured entry function against the symbol index and
//! detects the usual `fn main` candidates.

use crate::domain::errors::TraceError;
use crate::domain::index::NodeId;
use crate::domain::symbol::SymbolIndex;

/// Represents a resolved entry point in the traced program.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    /// Function name (e.g., "main")
    pub name: String,
    /// Type of entry point
    pub kind: EntryPointKind,
    /// File path where this entry point is defined
    pub file: String,
    /// Line number in the file
    pub line: usize,
    /// MethodEntry node id of the entry body
    pub node_id: NodeId,
}

/// Classification of entry point types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointKind {
    /// fn main(); the program runs as-is
    Main,
    /// Any other zero-argument free function, run through a generated shim
    Named,
}

/// Entry point resolver over the symbol index.
pub struct EntryPointResolver;

impl EntryPointResolver {
    /// Detect all `fn main` definitions in the indexed program.
    pub fn detect_mains(symbols: &SymbolIndex) -> Vec<EntryPoint> {
        symbols
            .resolve("main")
            .into_iter()
            .filter(|m| m.receiver.is_none())
            .map(|m| EntryPoint {
                name: m.name.clone(),
                kind: EntryPointKind::Main,
                file: m.file.clone(),
                line: m.line,
                node_id: m.node_id,
            })
            .collect()
    }

    /// Resolve the configured entry function name.
    ///
    /// `main` resolves to the program's own main; any other name must be a
    /// unique zero-argument free function, which the runner will call from a
    /// generated shim main.
    pub fn resolve(symbols: &SymbolIndex, name: &str) -> Result<EntryPoint, TraceError> {
        let candidates: Vec<_> = symbols
            .resolve(name)
            .into_iter()
            .filter(|m| m.receiver.is_none())
            .collect();

        if candidates.is_empty() {
            return Err(TraceError::NoEntryPoint {
                name: name.to_string(),
            });
        }
        if candidates.len() > 1 {
            return Err(TraceError::InvalidEntry {
                name: name.to_string(),
                reason: format!("{} free functions share this name", candidates.len()),
            });
        }

        let method = &candidates[0];
        let kind = if name == "main" {
            EntryPointKind::Main
        } else {
            if method.has_params {
                return Err(TraceError::InvalidEntry {
                    name: name.to_string(),
                    reason: "entry functions must take no parameters".to_string(),
                });
            }
            EntryPointKind::Named
        };

        Ok(EntryPoint {
            name: method.name.clone(),
            kind,
            file: method.file.clone(),
            line: method.line,
            node_id: method.node_id,
        })
    }
}
