//! Per-type component storage.
//!
//! Each component type gets one [`ComponentStore`]: a sparse set whose dense
//! side packs values and their owning entities contiguously, and whose sparse
//! side maps an entity index to a dense row. Removal is a swap-remove, so the
//! dense arrays never contain holes.
//!
//! The registry holds stores behind the [`ErasedStore`] trait so that it can
//! test membership and drop an entity's components by tag without knowing the
//! concrete type.

use std::any::Any;

use crate::entity::EntityId;

// ---------------------------------------------------------------------------
// ErasedStore
// ---------------------------------------------------------------------------

/// Type-erased view of a [`ComponentStore`].
pub(crate) trait ErasedStore: Send + Sync {
    /// Whether `entity` (exact generation) has a value in this store.
    fn contains(&self, entity: EntityId) -> bool;
    /// Remove and box the value owned by `entity`.
    fn remove_boxed(&mut self, entity: EntityId) -> Option<Box<dyn Any + Send + Sync>>;
    /// Remove and drop the value owned by `entity`. Returns whether one existed.
    fn discard(&mut self, entity: EntityId) -> bool;
    /// Number of stored values.
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Densely packed storage for every value of one component type.
#[derive(Debug)]
pub(crate) struct ComponentStore<T> {
    /// Component values, densely packed.
    values: Vec<T>,
    /// Owner of each value (parallel to `values`).
    owners: Vec<EntityId>,
    /// Entity index -> dense row.
    sparse: Vec<Option<u32>>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            owners: Vec::new(),
            sparse: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> ComponentStore<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Dense row of `entity`, checking the generation of the stored owner.
    fn row(&self, entity: EntityId) -> Option<usize> {
        let row = (*self.sparse.get(entity.index() as usize)?)? as usize;
        (self.owners[row] == entity).then_some(row)
    }

    /// Insert or overwrite. Returns the previous value, if any.
    pub(crate) fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        if let Some(row) = self.row(entity) {
            return Some(std::mem::replace(&mut self.values[row], value));
        }
        let idx = entity.index() as usize;
        if idx >= self.sparse.len() {
            self.sparse.resize(idx + 1, None);
        }
        self.sparse[idx] = Some(self.values.len() as u32);
        self.values.push(value);
        self.owners.push(entity);
        None
    }

    pub(crate) fn get(&self, entity: EntityId) -> Option<&T> {
        self.row(entity).map(|row| &self.values[row])
    }

    pub(crate) fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let row = self.row(entity)?;
        Some(&mut self.values[row])
    }

    /// Swap-remove the value owned by `entity`.
    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<T> {
        let row = self.row(entity)?;
        self.sparse[entity.index() as usize] = None;
        let value = self.values.swap_remove(row);
        self.owners.swap_remove(row);
        // Patch the sparse entry of the value that moved into `row`.
        if let Some(moved) = self.owners.get(row) {
            self.sparse[moved.index() as usize] = Some(row as u32);
        }
        Some(value)
    }

    /// Owners in dense order.
    #[cfg(test)]
    pub(crate) fn owners(&self) -> &[EntityId] {
        &self.owners
    }
}

impl<T: Send + Sync + 'static> ErasedStore for ComponentStore<T> {
    fn contains(&self, entity: EntityId) -> bool {
        self.row(entity).is_some()
    }

    fn remove_boxed(&mut self, entity: EntityId) -> Option<Box<dyn Any + Send + Sync>> {
        self.remove(entity)
            .map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
    }

    fn discard(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
