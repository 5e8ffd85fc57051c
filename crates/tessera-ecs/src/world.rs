//! The [`World`]: live population, frame boundary and query cache.
//!
//! The world wraps a [`Registry`] and double-buffers the population.
//! [`World::create_entity`] and [`World::remove_entity`] only record a
//! request; the live set changes at the start of the next
//! [`World::advance_frame`]. Each frame:
//!
//! 1. Pending creations join the live set.
//! 2. Pending removals are destroyed and retired.
//! 3. If either step changed anything, the flattened entity list is rebuilt
//!    and the query cache is marked dirty.
//! 4. The spatial rebuild policy is stepped once.
//! 5. Every registered system runs, in registration order, over the same
//!    frame-stable entity list.
//!
//! Anything a system requests during step 5 is buffered for the next frame,
//! so every system in one frame sees the same population.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{Component, ComponentTag};
use crate::entity::EntityId;
use crate::query::{self, QueryCache, QueryCacheStats, QueryKey};
use crate::registry::{Attached, Registry};
use crate::spatial::{Bounds, RebuildDecision, SpatialConfig, SpatialIndex};
use crate::system::{NamedSystem, System};
use crate::EcsError;

// ---------------------------------------------------------------------------
// WorldConfig
// ---------------------------------------------------------------------------

/// Construction-time settings for a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub spatial: SpatialConfig,
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), EcsError> {
        self.spatial.validate()
    }
}

// ---------------------------------------------------------------------------
// FrameReport
// ---------------------------------------------------------------------------

/// What one [`World::advance_frame`] did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    /// Frame number after advancing (the first frame is 1).
    pub frame: u64,
    /// Pending creations that became live.
    pub spawned: usize,
    /// Entities destroyed at this boundary.
    pub retired: usize,
    /// Whether the population changed and the query cache was marked dirty.
    pub caches_invalidated: bool,
    pub rebuild: RebuildDecision,
    /// Live population seen by this frame's systems.
    pub live: usize,
    /// Wall-clock time per system, in execution order.
    pub system_times: Vec<(String, Duration)>,
}

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// Read-only handle to an entity that was alive when it was looked up.
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    id: EntityId,
    world: &'w World,
}

impl<'w> EntityRef<'w> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity is part of the live population (as opposed to a
    /// creation still waiting for the next frame).
    pub fn is_live(&self) -> bool {
        self.world.is_live(self.id)
    }

    /// Whether removal has been requested for the next frame.
    pub fn is_removal_pending(&self) -> bool {
        self.world.removal_requested.contains(&self.id)
    }

    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.world.registry.get::<T>(self.id)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world.registry.has::<T>(self.id)
    }

    pub fn has_tag(&self, tag: ComponentTag) -> bool {
        self.world.registry.has_tag(self.id, tag)
    }

    /// Tags currently attached, in tag order.
    pub fn tags(&self) -> Vec<ComponentTag> {
        self.world.registry.tags_of(self.id)
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Entity population with a frame boundary, cached queries and a spatial
/// index.
///
/// A world assumes a single mutator. Hosts that share one across threads
/// must serialize access at the world boundary (one writer per frame).
pub struct World {
    registry: Registry,
    /// Frame-stable flattened live list. Rebuilt only when the population
    /// changes; shared with callers as a read-only snapshot.
    live: Arc<[EntityId]>,
    live_set: HashSet<EntityId>,
    pending_spawns: Vec<EntityId>,
    pending_removals: Vec<EntityId>,
    removal_requested: HashSet<EntityId>,
    query_cache: QueryCache,
    spatial: SpatialIndex,
    /// Registration order. Temporarily empty while systems run.
    systems: Vec<Box<dyn System>>,
    system_names: HashSet<String>,
    /// Set while systems run; blocks a nested frame boundary.
    in_frame: bool,
    frame: u64,
    config: WorldConfig,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("frame", &self.frame)
            .field("live", &self.live.len())
            .field("pending_spawns", &self.pending_spawns.len())
            .field("pending_removals", &self.pending_removals.len())
            .field("systems", &self.system_names.len())
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world with the default configuration.
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create an empty world after validating `config`.
    pub fn with_config(config: WorldConfig) -> Result<Self, EcsError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            registry: Registry::new(),
            live: Arc::from(Vec::new()),
            live_set: HashSet::new(),
            pending_spawns: Vec::new(),
            pending_removals: Vec::new(),
            removal_requested: HashSet::new(),
            query_cache: QueryCache::new(),
            spatial: SpatialIndex::new(config.spatial),
            systems: Vec::new(),
            system_names: HashSet::new(),
            in_frame: false,
            frame: 0,
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read-only access to identity and component storage.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Frames advanced so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -- registration -------------------------------------------------------

    /// Register `T` ahead of first use. Attaching registers implicitly, so
    /// this is only needed to obtain a tag early or to surface a name
    /// conflict as an error.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTag, EcsError> {
        self.registry.register::<T>()
    }

    pub fn tag<T: Component>(&self) -> Option<ComponentTag> {
        self.registry.tag_of::<T>()
    }

    pub fn tag_by_name(&self, name: &str) -> Option<ComponentTag> {
        self.registry.tag_by_name(name)
    }

    // -- lifecycle ----------------------------------------------------------

    /// Allocate a new entity. It can carry components immediately but stays
    /// out of [`all_entities`](Self::all_entities) and every query until the
    /// next [`advance_frame`](Self::advance_frame).
    pub fn create_entity(&mut self) -> EntityId {
        let id = self.registry.create();
        self.pending_spawns.push(id);
        id
    }

    /// Request removal of `id` at the next frame boundary. The entity stays
    /// visible and mutable until then. Requests cannot be withdrawn; asking
    /// twice is the same as asking once.
    ///
    /// Returns `false` if `id` is unknown or already retired.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if !self.registry.is_alive(id) {
            return false;
        }
        if self.removal_requested.insert(id) {
            self.pending_removals.push(id);
        }
        true
    }

    /// Handle to `id` if it has not been retired (live or pending).
    pub fn get_entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.registry
            .is_alive(id)
            .then_some(EntityRef { id, world: self })
    }

    /// Whether `id` is in the live population.
    pub fn is_live(&self, id: EntityId) -> bool {
        self.live_set.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Creations waiting for the next frame.
    pub fn pending_count(&self) -> usize {
        self.pending_spawns.len()
    }

    /// Removals waiting for the next frame.
    pub fn pending_removal_count(&self) -> usize {
        self.pending_removals.len()
    }

    /// The live population in the order entities went live. Stable for the
    /// whole frame.
    pub fn all_entities(&self) -> &[EntityId] {
        &self.live
    }

    /// Shared snapshot of [`all_entities`](Self::all_entities).
    pub fn entity_list(&self) -> Arc<[EntityId]> {
        Arc::clone(&self.live)
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `id`, overwriting an existing `T`.
    ///
    /// Adding a tag a live entity did not carry marks the query cache dirty;
    /// overwriting does not. Returns `false` if `id` is retired or `T::NAME`
    /// is claimed by another type.
    pub fn attach<T: Component>(&mut self, id: EntityId, value: T) -> bool {
        match self.registry.attach(id, value) {
            Some(outcome) => {
                if outcome.is_new_tag() {
                    self.structural_change(id);
                }
                true
            }
            None => false,
        }
    }

    /// Attach `value`, returning the value it replaced.
    pub fn replace<T: Component>(&mut self, id: EntityId, value: T) -> Option<T> {
        match self.registry.attach(id, value)? {
            Attached::Replaced(old) => Some(old),
            Attached::Inserted => {
                self.structural_change(id);
                None
            }
        }
    }

    /// Detach and return the `T` on `id`.
    pub fn detach<T: Component>(&mut self, id: EntityId) -> Option<T> {
        let value = self.registry.detach::<T>(id)?;
        self.structural_change(id);
        Some(value)
    }

    /// Detach by tag; the value comes back type-erased.
    pub fn detach_tag(
        &mut self,
        id: EntityId,
        tag: ComponentTag,
    ) -> Option<Box<dyn std::any::Any + Send + Sync>> {
        let value = self.registry.detach_tag(id, tag)?;
        self.structural_change(id);
        Some(value)
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.registry.get::<T>(id)
    }

    /// In-place mutation. Never invalidates cached queries.
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.registry.get_mut::<T>(id)
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.registry.has::<T>(id)
    }

    pub fn has_tag(&self, id: EntityId, tag: ComponentTag) -> bool {
        self.registry.has_tag(id, tag)
    }

    /// Pending entities are not queryable, so only live ones can stale the
    /// cache.
    fn structural_change(&mut self, id: EntityId) {
        if self.live_set.contains(&id) {
            self.query_cache.invalidate_all();
        }
    }

    // -- queries ------------------------------------------------------------

    /// Live entities carrying every tag in `tags`, in live-list order.
    ///
    /// Tag order and duplicates do not matter. Served from the cache when a
    /// clean entry exists; otherwise the live list is scanned once.
    pub fn query(&mut self, tags: &[ComponentTag]) -> Arc<[EntityId]> {
        let registry = &self.registry;
        let live = &self.live;
        self.query_cache
            .get_or_compute(QueryKey::new(tags), |key| query::scan(registry, live, key))
    }

    /// [`query`](Self::query) by component name. A name nobody registered
    /// matches nothing.
    pub fn query_names(&mut self, names: &[&str]) -> Arc<[EntityId]> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            match self.registry.tag_by_name(name) {
                Some(tag) => tags.push(tag),
                None => return Arc::from(Vec::new()),
            }
        }
        self.query(&tags)
    }

    pub fn query_cache_stats(&self) -> QueryCacheStats {
        self.query_cache.stats()
    }

    // -- systems ------------------------------------------------------------

    /// Register a closure as a named system. Systems run in registration
    /// order; one added while a frame is running first runs next frame.
    pub fn add_system<F>(&mut self, name: &str, func: F) -> Result<(), EcsError>
    where
        F: FnMut(&mut World, &[EntityId], f64) + Send + 'static,
    {
        self.add_boxed_system(Box::new(NamedSystem::new(name, func)))
    }

    /// Register any [`System`] implementation.
    pub fn add_boxed_system(&mut self, system: Box<dyn System>) -> Result<(), EcsError> {
        let name = system.name().to_owned();
        if self.system_names.contains(&name) {
            return Err(EcsError::DuplicateSystem(name));
        }
        debug!(system = %name, "system registered");
        self.system_names.insert(name);
        self.systems.push(system);
        Ok(())
    }

    pub fn system_count(&self) -> usize {
        self.system_names.len()
    }

    /// Names in execution order. Only meaningful outside a running frame.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    // -- frame boundary -----------------------------------------------------

    /// Reconcile pending changes, step the spatial policy, then run every
    /// system once with `dt`.
    ///
    /// Called from inside a running system this does nothing and reports an
    /// empty frame; the outer frame's population must not change under the
    /// systems still waiting to run.
    pub fn advance_frame(&mut self, dt: f64) -> FrameReport {
        if self.in_frame {
            warn!(frame = self.frame, "advance_frame called from a system; ignored");
            return FrameReport {
                frame: self.frame,
                spawned: 0,
                retired: 0,
                caches_invalidated: false,
                rebuild: RebuildDecision::Idle,
                live: self.live.len(),
                system_times: Vec::new(),
            };
        }
        self.frame += 1;

        let (spawned, retired) = self.reconcile();
        let caches_invalidated = spawned > 0 || retired > 0;
        if caches_invalidated {
            self.query_cache.invalidate_all();
        }

        let rebuild = self.spatial.on_frame(&self.registry, &self.live);

        debug!(
            frame = self.frame,
            spawned,
            retired,
            live = self.live.len(),
            ?rebuild,
            "frame reconciled"
        );

        self.in_frame = true;
        let system_times = self.run_systems(dt);
        self.in_frame = false;

        FrameReport {
            frame: self.frame,
            spawned,
            retired,
            caches_invalidated,
            rebuild,
            live: self.live.len(),
            system_times,
        }
    }

    /// Apply buffered creations, then buffered removals. Returns
    /// `(spawned, retired)`.
    fn reconcile(&mut self) -> (usize, usize) {
        if self.pending_spawns.is_empty() && self.pending_removals.is_empty() {
            return (0, 0);
        }

        let spawns = std::mem::take(&mut self.pending_spawns);
        let removals = std::mem::take(&mut self.pending_removals);
        self.removal_requested.clear();

        let mut live = self.live.to_vec();
        let mut spawned = 0;
        for id in spawns {
            if self.registry.is_alive(id) && self.live_set.insert(id) {
                live.push(id);
                spawned += 1;
            }
        }

        let mut retired = 0;
        for id in removals {
            if self.registry.destroy(id) {
                self.live_set.remove(&id);
                retired += 1;
            }
        }
        if retired > 0 {
            live.retain(|id| self.live_set.contains(id));
        }

        self.live = live.into();
        (spawned, retired)
    }

    fn run_systems(&mut self, dt: f64) -> Vec<(String, Duration)> {
        let entities = Arc::clone(&self.live);
        let mut systems = std::mem::take(&mut self.systems);
        let mut times = Vec::with_capacity(systems.len());

        for system in &mut systems {
            let start = Instant::now();
            system.run(self, &entities, dt);
            times.push((system.name().to_owned(), start.elapsed()));
        }

        // Keep systems registered mid-frame, after the existing ones.
        systems.append(&mut self.systems);
        self.systems = systems;
        times
    }

    // -- spatial ------------------------------------------------------------

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Index `id` at its current [`Position`](crate::spatial::Position).
    pub fn spatial_insert(&mut self, id: EntityId) -> bool {
        self.spatial.insert(&self.registry, id)
    }

    /// Rebuild the spatial index from the live population now.
    pub fn rebuild_spatial(&mut self) -> usize {
        self.spatial.rebuild(&self.registry, &self.live)
    }

    /// Tell the rebuild policy that positions changed. Evaluated at the next
    /// frame boundary.
    pub fn mark_spatial_dirty(&mut self) {
        self.spatial.mark_dirty();
    }

    /// Indexed entities inside `bounds` that are in the live population.
    /// Pending and retired ids still held by the tree are dropped.
    pub fn query_region(&self, bounds: &Bounds) -> Vec<EntityId> {
        let mut hits = self.spatial.query_region(bounds);
        hits.retain(|&id| self.is_live(id));
        hits
    }

    /// Indexed entities within `r` of `(x, y)` that are in the live
    /// population.
    pub fn query_radius(&self, x: f32, y: f32, r: f32) -> Vec<EntityId> {
        let mut hits = self.spatial.query_radius(x, y, r);
        hits.retain(|&id| self.is_live(id));
        hits
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::spatial::{Position, RebuildConfig};

    #[derive(Debug, Clone, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    impl Component for Vel {
        const NAME: &'static str = "velocity";
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);

    impl Component for Health {
        const NAME: &'static str = "health";
    }

    fn spawn_live(world: &mut World, n: usize) -> Vec<EntityId> {
        let ids: Vec<_> = (0..n).map(|_| world.create_entity()).collect();
        world.advance_frame(0.0);
        ids
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn created_entity_is_invisible_until_next_frame() {
        let mut world = World::new();
        let e = world.create_entity();
        world.attach(e, Health(10));

        assert!(world.all_entities().is_empty());
        assert!(!world.is_live(e));
        assert_eq!(world.pending_count(), 1);
        let health = world.tag::<Health>().unwrap();
        assert!(world.query(&[health]).is_empty());
        assert_eq!(world.get::<Health>(e), Some(&Health(10)));

        let report = world.advance_frame(0.016);
        assert_eq!(report.spawned, 1);
        assert!(report.caches_invalidated);
        assert_eq!(world.all_entities(), &[e]);
        assert_eq!(&*world.query(&[health]), &[e]);
    }

    #[test]
    fn removed_entity_stays_visible_until_next_frame() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 3);
        assert!(world.remove_entity(ids[1]));
        assert!(world.remove_entity(ids[1]), "second request is harmless");

        assert_eq!(world.all_entities().len(), 3);
        assert!(world.get_entity(ids[1]).unwrap().is_removal_pending());
        assert!(world.attach(ids[1], Health(1)), "still mutable");

        let report = world.advance_frame(0.016);
        assert_eq!(report.retired, 1);
        assert_eq!(world.all_entities(), &[ids[0], ids[2]]);
        assert!(world.get_entity(ids[1]).is_none());
        assert!(!world.remove_entity(ids[1]));
        assert_eq!(world.get::<Health>(ids[1]), None);
    }

    #[test]
    fn create_then_remove_in_same_frame_never_goes_live() {
        let mut world = World::new();
        let e = world.create_entity();
        world.remove_entity(e);
        let report = world.advance_frame(0.0);
        assert_eq!(report.spawned, 1);
        assert_eq!(report.retired, 1);
        assert!(world.all_entities().is_empty());
        assert!(world.get_entity(e).is_none());
    }

    #[test]
    fn quiet_frame_keeps_live_list_and_cache() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 2);
        for &id in &ids {
            world.attach(id, Health(5));
        }
        let health = world.tag::<Health>().unwrap();
        let before = world.query(&[health]);
        let list_before = world.entity_list();

        let report = world.advance_frame(0.016);
        assert!(!report.caches_invalidated);
        assert!(Arc::ptr_eq(&list_before, &world.entity_list()));
        let after = world.query(&[health]);
        assert!(Arc::ptr_eq(&before, &after), "warm hit returns the same snapshot");
    }

    // -- queries ------------------------------------------------------------

    #[test]
    fn query_requires_every_tag_and_ignores_order() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 3);
        world.attach(ids[0], Position::new(0.0, 0.0));
        world.attach(ids[0], Vel { dx: 1.0, dy: 0.0 });
        world.attach(ids[1], Position::new(1.0, 1.0));
        world.attach(ids[2], Vel { dx: 0.0, dy: 1.0 });

        let pos = world.tag::<Position>().unwrap();
        let vel = world.tag::<Vel>().unwrap();
        assert_eq!(&*world.query(&[pos, vel]), &[ids[0]]);
        assert_eq!(&*world.query(&[vel, pos, vel]), &[ids[0]]);
        assert_eq!(world.query_cache_stats().hits, 1);
        assert_eq!(&*world.query(&[pos]), &[ids[0], ids[1]]);
    }

    #[test]
    fn query_by_unknown_name_is_empty() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 1);
        world.attach(ids[0], Health(1));
        assert!(world.query_names(&["health", "mana"]).is_empty());
        assert_eq!(&*world.query_names(&["health"]), &[ids[0]]);
    }

    #[test]
    fn new_tag_on_live_entity_invalidates_immediately() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 2);
        world.attach(ids[0], Health(1));
        let health = world.tag::<Health>().unwrap();
        assert_eq!(&*world.query(&[health]), &[ids[0]]);

        world.attach(ids[1], Health(2));
        assert_eq!(&*world.query(&[health]), &[ids[0], ids[1]]);

        let invalidations = world.query_cache_stats().invalidations;
        world.attach(ids[1], Health(3));
        assert_eq!(
            world.query_cache_stats().invalidations,
            invalidations,
            "overwrite is not structural"
        );

        assert_eq!(world.detach::<Health>(ids[0]), Some(Health(1)));
        assert_eq!(&*world.query(&[health]), &[ids[1]]);
    }

    #[test]
    fn replace_returns_previous_value() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 1);
        assert_eq!(world.replace(ids[0], Health(1)), None);
        assert_eq!(world.replace(ids[0], Health(2)), Some(Health(1)));
    }

    #[test]
    fn detach_tag_returns_erased_value() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 1);
        world.attach(ids[0], Health(7));
        let tag = world.tag::<Health>().unwrap();
        let boxed = world.detach_tag(ids[0], tag).unwrap();
        assert_eq!(boxed.downcast_ref::<Health>(), Some(&Health(7)));
        assert!(!world.has_tag(ids[0], tag));
    }

    // -- systems ------------------------------------------------------------

    #[test]
    fn systems_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut world = World::new();
        for name in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            world
                .add_system(name, move |_w, _e, _dt| order.lock().unwrap().push(name))
                .unwrap();
        }
        let report = world.advance_frame(0.016);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        let names: Vec<_> = report.system_times.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_system_name_is_rejected() {
        let mut world = World::new();
        world.add_system("move", |_w, _e, _dt| {}).unwrap();
        let err = world.add_system("move", |_w, _e, _dt| {}).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateSystem(ref n) if n == "move"));
        assert_eq!(world.system_count(), 1);
    }

    #[test]
    fn structural_requests_inside_a_frame_wait_for_the_next() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 2);
        for &id in &ids {
            world.attach(id, Health(1));
        }

        world
            .add_system("churn", |w, entities, _dt| {
                let health = w.tag::<Health>().unwrap();
                let before = w.query(&[health]);
                let list_before = w.all_entities().to_vec();

                let spawned = w.create_entity();
                w.attach(spawned, Health(1));
                w.remove_entity(entities[0]);

                assert_eq!(w.query(&[health]), before);
                assert_eq!(w.all_entities(), &list_before[..]);
                assert_eq!(entities, &list_before[..]);
            })
            .unwrap();

        world.advance_frame(0.016);
        // Second frame applies the first frame's requests.
        let report = world.advance_frame(0.016);
        assert_eq!(report.spawned, 1);
        assert_eq!(report.retired, 1);
    }

    #[test]
    fn nested_advance_frame_is_ignored() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut world = World::new();
        spawn_live(&mut world, 3);

        let log = Arc::clone(&seen);
        world
            .add_system("spawner", move |w, entities, _dt| {
                w.create_entity();
                let nested = w.advance_frame(0.0);
                assert_eq!(nested.spawned, 0);
                assert_eq!(nested.retired, 0);
                assert!(nested.system_times.is_empty());
                log.lock()
                    .unwrap()
                    .push((entities.len(), w.all_entities().len(), w.frame()));
            })
            .unwrap();
        let log = Arc::clone(&seen);
        world
            .add_system("reader", move |w, entities, _dt| {
                log.lock()
                    .unwrap()
                    .push((entities.len(), w.all_entities().len(), w.frame()));
            })
            .unwrap();

        let report = world.advance_frame(0.016);
        assert_eq!(*seen.lock().unwrap(), vec![(3, 3, 2), (3, 3, 2)]);
        assert_eq!(report.frame, 2);
        assert_eq!(world.pending_count(), 1);

        // The outer frame still closes normally; the next one applies the spawn.
        seen.lock().unwrap().clear();
        assert_eq!(world.advance_frame(0.016).spawned, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(4, 4, 3), (4, 4, 3)]);
    }

    #[test]
    fn later_system_sees_earlier_mutation_same_frame() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut world = World::new();
        let ids = spawn_live(&mut world, 1);
        world.attach(ids[0], Health(1));

        world
            .add_system("heal", |w, entities, _dt| {
                for &e in entities {
                    if let Some(h) = w.get_mut::<Health>(e) {
                        h.0 += 10;
                    }
                }
            })
            .unwrap();
        let seen_clone = Arc::clone(&seen);
        world
            .add_system("observe", move |w, entities, _dt| {
                let h = w.get::<Health>(entities[0]).unwrap();
                seen_clone.store(h.0 as usize, Ordering::SeqCst);
            })
            .unwrap();

        world.advance_frame(0.016);
        assert_eq!(seen.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn system_added_mid_frame_runs_next_frame() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut world = World::new();
        let runs_clone = Arc::clone(&runs);
        world
            .add_system("installer", move |w, _e, _dt| {
                let runs = Arc::clone(&runs_clone);
                // Fails with DuplicateSystem after the first frame.
                let _ = w.add_system("late", move |_w, _e, _dt| {
                    runs.fetch_add(1, Ordering::SeqCst);
                });
            })
            .unwrap();

        world.advance_frame(0.016);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        world.advance_frame(0.016);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(world.system_names(), vec!["installer", "late"]);
    }

    #[test]
    fn systems_receive_dt() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 1);
        world.attach(ids[0], Position::new(0.0, 0.0));
        world.attach(ids[0], Vel { dx: 2.0, dy: -1.0 });
        world
            .add_system("integrate", |w, entities, dt| {
                for &e in entities {
                    let Some(v) = w.get::<Vel>(e).cloned() else {
                        continue;
                    };
                    if let Some(p) = w.get_mut::<Position>(e) {
                        p.x += v.dx * dt as f32;
                        p.y += v.dy * dt as f32;
                    }
                }
            })
            .unwrap();
        world.advance_frame(0.5);
        assert_eq!(world.get::<Position>(ids[0]), Some(&Position::new(1.0, -0.5)));
    }

    // -- spatial ------------------------------------------------------------

    #[test]
    fn spatial_queries_drop_retired_entities() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 2);
        world.attach(ids[0], Position::new(10.0, 10.0));
        world.attach(ids[1], Position::new(11.0, 11.0));
        assert_eq!(world.rebuild_spatial(), 2);

        world.remove_entity(ids[0]);
        world.advance_frame(0.016);
        assert!(world.spatial().tree().contains_entity(ids[0]));
        assert_eq!(world.query_radius(10.0, 10.0, 5.0), vec![ids[1]]);
        assert_eq!(
            world.query_region(&Bounds::new(0.0, 0.0, 20.0, 20.0)),
            vec![ids[1]]
        );
    }

    #[test]
    fn spatial_queries_skip_pending_entities() {
        let mut world = World::new();
        let e = world.create_entity();
        world.attach(e, Position::new(10.0, 10.0));
        assert!(world.spatial_insert(e));
        assert!(!world.is_live(e));
        assert!(world.query_radius(10.0, 10.0, 1.0).is_empty());
        assert!(world
            .query_region(&Bounds::new(0.0, 0.0, 20.0, 20.0))
            .is_empty());

        world.advance_frame(0.016);
        assert_eq!(world.query_radius(10.0, 10.0, 1.0), vec![e]);
    }

    #[test]
    fn spatial_policy_is_stepped_every_frame() {
        let config = WorldConfig {
            spatial: SpatialConfig {
                rebuild: RebuildConfig {
                    check_interval: 2,
                    min_cooldown: 0,
                },
                ..SpatialConfig::default()
            },
        };
        let mut world = World::with_config(config).unwrap();
        let e = world.create_entity();
        world.attach(e, Position::new(5.0, 5.0));
        world.mark_spatial_dirty();

        assert_eq!(world.advance_frame(0.0).rebuild, RebuildDecision::Idle);
        assert_eq!(world.advance_frame(0.0).rebuild, RebuildDecision::Lazy);
        assert_eq!(world.query_radius(5.0, 5.0, 0.5), vec![e]);
    }

    #[test]
    fn spatial_insert_requires_position() {
        let mut world = World::new();
        let ids = spawn_live(&mut world, 2);
        world.attach(ids[0], Position::new(1.0, 1.0));
        assert!(world.spatial_insert(ids[0]));
        assert!(!world.spatial_insert(ids[0]));
        assert!(!world.spatial_insert(ids[1]));
    }

    #[test]
    fn with_config_rejects_invalid_config() {
        let config = WorldConfig {
            spatial: SpatialConfig {
                capacity: 0,
                ..SpatialConfig::default()
            },
        };
        assert!(matches!(
            World::with_config(config),
            Err(EcsError::InvalidConfig(_))
        ));
    }
}
