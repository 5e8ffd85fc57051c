//! Memoized tag-set queries.
//!
//! A query asks for every live entity carrying *all* of a set of tags. The
//! [`QueryCache`] memoizes each answer under a [`QueryKey`], the canonical
//! (sorted, deduplicated) form of the requested tags, so `[velocity, position]`
//! and `[position, velocity, position]` share one entry.
//!
//! Invalidation is wholesale: any structural change to the population marks
//! every entry dirty, and a dirty entry is recomputed before it is handed out
//! again. Results are shared as `Arc<[EntityId]>` snapshots, so a caller may
//! keep iterating a result while the cache moves on.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::component::ComponentTag;
use crate::entity::EntityId;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// QueryKey
// ---------------------------------------------------------------------------

/// Canonical, order-independent form of a tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Box<[ComponentTag]>);

impl QueryKey {
    /// Sort and deduplicate `tags`.
    pub fn new(tags: &[ComponentTag]) -> Self {
        let mut tags = tags.to_vec();
        tags.sort_unstable();
        tags.dedup();
        Self(tags.into_boxed_slice())
    }

    /// The canonical tags.
    pub fn tags(&self) -> &[ComponentTag] {
        &self.0
    }

    /// Whether `entity` carries every tag in the key.
    pub fn matches(&self, registry: &Registry, entity: EntityId) -> bool {
        self.0.iter().all(|&tag| registry.has_tag(entity, tag))
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCacheStats {
    /// Queries answered from a clean entry.
    pub hits: u64,
    /// Queries that had to scan the population.
    pub misses: u64,
    /// Number of wholesale invalidations.
    pub invalidations: u64,
    /// Entries currently held (clean or dirty).
    pub entries: usize,
}

// ---------------------------------------------------------------------------
// QueryCache
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheEntry {
    entities: Arc<[EntityId]>,
    dirty: bool,
}

/// Memo table from [`QueryKey`] to matching entity lists.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl QueryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the clean entry for `key`, or compute, store and return it.
    pub fn get_or_compute<F>(&mut self, key: QueryKey, compute: F) -> Arc<[EntityId]>
    where
        F: FnOnce(&QueryKey) -> Vec<EntityId>,
    {
        if let Some(entry) = self.entries.get(&key) {
            if !entry.dirty {
                self.hits += 1;
                return Arc::clone(&entry.entities);
            }
        }

        self.misses += 1;
        let entities: Arc<[EntityId]> = compute(&key).into();
        trace!(tags = ?key.tags(), matched = entities.len(), "query cache miss");
        self.entries.insert(
            key,
            CacheEntry {
                entities: Arc::clone(&entities),
                dirty: false,
            },
        );
        entities
    }

    /// Mark every entry dirty.
    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dirty = true;
        }
        self.invalidations += 1;
    }

    /// Drop every entry, clean or dirty.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether a clean entry exists for `key`.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| !e.dirty)
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
            entries: self.entries.len(),
        }
    }
}

/// Linear scan of `population` keeping entities that match `key`.
pub(crate) fn scan(registry: &Registry, population: &[EntityId], key: &QueryKey) -> Vec<EntityId> {
    population
        .iter()
        .copied()
        .filter(|&e| key.matches(registry, e))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
