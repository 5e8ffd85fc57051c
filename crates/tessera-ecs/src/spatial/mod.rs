//! Spatial index over entity positions.
//!
//! [`SpatialIndex`] pairs a [`QuadTree`] with a [`RebuildPolicy`]. The tree is
//! a cache: the source of truth for where an entity is stays its
//! [`Position`] component, looked up through [`PositionLookup`] whenever the
//! index inserts or rebuilds. Moving an entity does not move its entry; the
//! producer of the movement calls [`SpatialIndex::mark_dirty`] once and the
//! policy decides when a rebuild is worth it.

pub mod bounds;
pub mod policy;
pub mod quadtree;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entity::EntityId;
use crate::registry::Registry;
use crate::EcsError;

pub use bounds::{Bounds, Position};
pub use policy::{RebuildConfig, RebuildDecision, RebuildPolicy, RebuildStats};
pub use quadtree::QuadTree;

// ---------------------------------------------------------------------------
// PositionLookup
// ---------------------------------------------------------------------------

/// Where the index reads entity positions from.
pub trait PositionLookup {
    fn position_of(&self, entity: EntityId) -> Option<Position>;
}

impl PositionLookup for Registry {
    fn position_of(&self, entity: EntityId) -> Option<Position> {
        self.get::<Position>(entity).copied()
    }
}

impl PositionLookup for HashMap<EntityId, Position> {
    fn position_of(&self, entity: EntityId) -> Option<Position> {
        self.get(&entity).copied()
    }
}

// ---------------------------------------------------------------------------
// SpatialConfig
// ---------------------------------------------------------------------------

/// Covering rectangle, node capacity and rebuild schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub bounds: Bounds,
    /// Entries a leaf holds before it subdivides.
    pub capacity: usize,
    pub rebuild: RebuildConfig,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::new(0.0, 0.0, 1000.0, 1000.0),
            capacity: 4,
            rebuild: RebuildConfig::default(),
        }
    }
}

impl SpatialConfig {
    /// Reject non-finite or inverted bounds, zero capacity and a zero
    /// check interval.
    pub fn validate(&self) -> Result<(), EcsError> {
        if !self.bounds.is_valid() {
            return Err(EcsError::InvalidConfig(format!(
                "spatial bounds must be finite with min <= max, got {:?}",
                self.bounds
            )));
        }
        if self.capacity == 0 {
            return Err(EcsError::InvalidConfig(
                "spatial capacity must be at least 1".to_owned(),
            ));
        }
        if self.rebuild.check_interval == 0 {
            return Err(EcsError::InvalidConfig(
                "rebuild check_interval must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// Quadtree plus rebuild scheduling.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: QuadTree,
    policy: RebuildPolicy,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl SpatialIndex {
    /// Empty index covering `config.bounds`.
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            tree: QuadTree::new(config.bounds, config.capacity),
            policy: RebuildPolicy::new(config.rebuild),
        }
    }

    /// Index `entity` at its current position.
    ///
    /// Returns `false` if the entity has no position, the position lies
    /// outside the covering rectangle, or the entity is already indexed.
    pub fn insert<P>(&mut self, positions: &P, entity: EntityId) -> bool
    where
        P: PositionLookup + ?Sized,
    {
        match positions.position_of(entity) {
            Some(pos) => self.tree.insert(entity, pos),
            None => false,
        }
    }

    /// Entities whose indexed position lies inside `bounds`.
    pub fn query_region(&self, bounds: &Bounds) -> Vec<EntityId> {
        self.tree.query_region(bounds)
    }

    /// Entities whose indexed position lies within `r` of `(x, y)`.
    pub fn query_radius(&self, x: f32, y: f32, r: f32) -> Vec<EntityId> {
        self.tree.query_radius(x, y, r)
    }

    /// Clear the tree and reinsert `entities` from their current positions.
    ///
    /// Entities without a position are left out; entities outside the
    /// covering rectangle are left out with a warning. Returns how many were
    /// indexed. Counts as a manual rebuild for the policy.
    pub fn rebuild<P>(&mut self, positions: &P, entities: &[EntityId]) -> usize
    where
        P: PositionLookup + ?Sized,
    {
        let indexed = self.refill(positions, entities);
        self.policy.record_manual_rebuild();
        indexed
    }

    fn refill<P>(&mut self, positions: &P, entities: &[EntityId]) -> usize
    where
        P: PositionLookup + ?Sized,
    {
        self.tree.clear();
        let mut outside = 0usize;
        for &entity in entities {
            if let Some(pos) = positions.position_of(entity) {
                if !self.tree.insert(entity, pos) {
                    outside += 1;
                }
            }
        }
        if outside > 0 {
            warn!(
                outside,
                bounds = ?self.tree.bounds(),
                "entities outside spatial bounds were not indexed"
            );
        }
        self.tree.len()
    }

    /// Step the rebuild policy by one frame, rebuilding from `entities` if it
    /// says so.
    pub fn on_frame<P>(&mut self, positions: &P, entities: &[EntityId]) -> RebuildDecision
    where
        P: PositionLookup + ?Sized,
    {
        let decision = self.policy.step();
        if decision.rebuilds() {
            let indexed = self.refill(positions, entities);
            debug!(
                ?decision,
                indexed,
                nodes = self.tree.node_count(),
                "spatial index rebuilt"
            );
        }
        decision
    }

    /// Flag that indexed positions may be stale.
    pub fn mark_dirty(&mut self) {
        self.policy.mark_dirty();
    }

    /// Whether the policy is waiting to rebuild.
    pub fn is_dirty(&self) -> bool {
        self.policy.is_dirty()
    }

    /// Rebuild counters from the policy.
    pub fn stats(&self) -> RebuildStats {
        self.policy.stats()
    }

    /// The underlying tree, for inspection.
    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    /// The rebuild policy, for inspection.
    pub fn policy(&self) -> &RebuildPolicy {
        &self.policy
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
