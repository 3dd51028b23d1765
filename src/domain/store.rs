use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use sled::Db;

use crate::domain::index::ProgramIndex;
use crate::domain::source::SourceFile;

/// Cache format version; bump when the index layout changes.
const CACHE_VERSION: u64 = 1;

/// Fingerprint of an input set, used as the cache key.
/// Covers relative path and full content of every file plus the cache
/// version, so any edit or file rename invalidates the entry.
pub fn source_fingerprint(files: &[SourceFile]) -> String {
    let mut hasher = DefaultHasher::new();
    CACHE_VERSION.hash(&mut hasher);
    files.len().hash(&mut hasher);
    for file in files {
        file.rel_path.hash(&mut hasher);
        file.content.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// Trait for index cache backends.
/// Implementations must be thread-safe (Send + Sync).
pub trait IndexStore: Send + Sync {
    fn load(&self, fingerprint: &str) -> Option<ProgramIndex>;
    fn save(&self, fingerprint: &str, cached: &ProgramIndex);
}

// ============================================================================
// MemoryIndexStore - Fast in-memory cache using DashMap
// ============================================================================

pub struct MemoryIndexStore {
    entries: DashMap<String, ProgramIndex>,
}

impl Default for MemoryIndexStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl IndexStore for MemoryIndexStore {
    fn load(&self, fingerprint: &str) -> Option<ProgramIndex> {
        self.entries.get(fingerprint).map(|r| r.clone())
    }

    fn save(&self, fingerprint: &str, cached: &ProgramIndex) {
        self.entries.insert(fingerprint.to_string(), cached.clone());
    }
}

// ============================================================================
// DiskIndexStore - Persistent cache across invocations using sled
// ============================================================================

pub struct DiskIndexStore {
    _db: Db,
    tree: sled::Tree,
}

impl DiskIndexStore {
    pub fn new(path: &std::path::Path) -> anyhow::Result<Self> {
        let db = sled::open(path)?;
        let tree = db.open_tree("indexes")?;
        Ok(Self { _db: db, tree })
    }
}

impl IndexStore for DiskIndexStore {
    fn load(&self, fingerprint: &str) -> Option<ProgramIndex> {
        self.tree
            .get(fingerprint.as_bytes())
            .ok()
            .flatten()
            .and_then(|bytes| bincode::deserialize(&bytes).ok())
    }

    fn save(&self, fingerprint: &str, cached: &ProgramIndex) {
        if let Ok(bytes) = bincode::serialize(cached) {
            let _ = self.tree.insert(fingerprint.as_bytes(), bytes);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
