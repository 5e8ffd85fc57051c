//! Tessera ECS -- sparse-set Entity Component System with a cached query
//! layer and a lazily rebuilt spatial index.
//!
//! Entities are generational ids. Components live in one sparse set per type
//! inside the [`Registry`](registry::Registry). The [`World`](world::World)
//! double-buffers the population so that every system in a frame observes
//! the same live set, memoizes multi-tag queries until the next structural
//! change, and owns a quadtree whose rebuilds are scheduled by a
//! staleness/CPU trade-off policy.
//!
//! # Quick Start
//!
//! ```
//! use tessera_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! impl Component for Velocity {
//!     const NAME: &'static str = "velocity";
//! }
//!
//! let mut world = World::new();
//! let e = world.create_entity();
//! world.attach(e, Position::new(0.0, 0.0));
//! world.attach(e, Velocity { dx: 1.0, dy: 0.0 });
//!
//! world.add_system("movement", |w: &mut World, entities: &[EntityId], dt: f64| {
//!     for &e in entities {
//!         let Some(v) = w.get::<Velocity>(e).cloned() else { continue };
//!         if let Some(p) = w.get_mut::<Position>(e) {
//!             p.x += v.dx * dt as f32;
//!         }
//!     }
//! }).unwrap();
//!
//! // The entity goes live at the first frame boundary, then moves.
//! world.advance_frame(1.0);
//! assert_eq!(world.get::<Position>(e), Some(&Position::new(1.0, 0.0)));
//!
//! let moving = world.query_names(&["position", "velocity"]);
//! assert_eq!(&*moving, &[e]);
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod registry;
pub mod spatial;
mod storage;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Operations on unknown or retired entities are not errors; they return
/// `None`/`false`/empty instead.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// A component name is already owned by a different Rust type.
    #[error("component name '{name}' is already registered to another type (rejected {type_name})")]
    ComponentNameConflict {
        name: String,
        type_name: &'static str,
    },

    /// A system with this name is already registered on the world.
    #[error("duplicate system name: {0:?}")]
    DuplicateSystem(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTag};
    pub use crate::entity::EntityId;
    pub use crate::query::QueryCacheStats;
    pub use crate::registry::{Attached, Registry};
    pub use crate::spatial::{
        Bounds, Position, PositionLookup, QuadTree, RebuildConfig, RebuildDecision, RebuildPolicy,
        RebuildStats, SpatialConfig, SpatialIndex,
    };
    pub use crate::system::{NamedSystem, System};
    pub use crate::world::{EntityRef, FrameReport, World, WorldConfig};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
