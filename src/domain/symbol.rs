use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::index::NodeId;

/// Signature of one traced function or method, recorded by the indexer while
/// it walks fn items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Id of the MethodEntry node for this body.
    pub node_id: NodeId,
    pub name: String,
    pub receiver: Option<String>, // "&self", "self", or None for free functions
    pub has_params: bool,
    pub is_const: bool,
    pub file: String,
    pub line: usize,
}

/// Thread-safe symbol index over method-entry nodes.
/// Resolves entry-point names and labels call frames with callee names.
pub struct SymbolIndex {
    methods: DashMap<NodeId, MethodRecord>,

    // Acceleration map: name -> method-entry ids carrying that name
    by_name: DashMap<String, Vec<NodeId>>,
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self {
            methods: DashMap::new(),
            by_name: DashMap::new(),
        }
    }
}

impl SymbolIndex {
    /// Build the symbol index from the indexer's method records in parallel.
    pub fn build(records: &[MethodRecord]) -> Self {
        let index = SymbolIndex::default();

        records.par_iter().for_each(|record| {
            index
                .by_name
                .entry(record.name.clone())
                .or_default()
                .push(record.node_id);
            index.methods.insert(record.node_id, record.clone());
        });

        // Candidate lists come out in insertion order under contention; sort
        // so resolution is deterministic across runs.
        for mut entry in index.by_name.iter_mut() {
            entry.value_mut().sort_unstable();
        }

        index
    }

    /// Look up the record behind a method-entry id.
    /// Returns a clone to avoid holding DashMap locks.
    pub fn method(&self, id: NodeId) -> Option<MethodRecord> {
        self.methods.get(&id).map(|r| r.clone())
    }

    /// Find all methods with a given name, in id order.
    pub fn resolve(&self, name: &str) -> Vec<MethodRecord> {
        if let Some(ids) = self.by_name.get(name) {
            ids.iter().filter_map(|id| self.method(*id)).collect()
        } else {
            Vec::new()
        }
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
