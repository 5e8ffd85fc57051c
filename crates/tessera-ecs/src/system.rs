//! Behavior units run by [`World::advance_frame`](crate::world::World::advance_frame).
//!
//! A system receives the world, the frame-stable list of live entities and
//! the frame's `dt`. It may mutate component data in place and request
//! structural changes; requested creations and removals only become visible
//! at the next frame boundary.

use crate::entity::EntityId;
use crate::world::World;

/// Per-frame logic over the live population.
pub trait System: Send {
    /// Unique name within a world (e.g. `"movement"`).
    fn name(&self) -> &str;

    fn run(&mut self, world: &mut World, entities: &[EntityId], dt: f64);
}

/// A closure paired with its name.
///
/// ```
/// use tessera_ecs::prelude::*;
///
/// let mut world = World::new();
/// world
///     .add_boxed_system(Box::new(NamedSystem::new("noop", |_w: &mut World, _e: &[EntityId], _dt: f64| {})))
///     .unwrap();
/// assert_eq!(world.system_names(), vec!["noop"]);
/// ```
pub struct NamedSystem<F> {
    name: String,
    func: F,
}

impl<F> NamedSystem<F>
where
    F: FnMut(&mut World, &[EntityId], f64) + Send,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> System for NamedSystem<F>
where
    F: FnMut(&mut World, &[EntityId], f64) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, world: &mut World, entities: &[EntityId], dt: f64) {
        (self.func)(world, entities, dt)
    }
}

impl<F> std::fmt::Debug for NamedSystem<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedSystem")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
