//! The entity registry: identity plus per-entity component sets.
//!
//! [`Registry`] is the leaf of the core. It owns the [`EntityAllocator`] and
//! one [`ComponentStore`](crate::storage) per component type, and it is the
//! only place component values live.
//!
//! Every operation is total over its input: an unknown or destroyed
//! [`EntityId`] yields `None`/`false`/empty instead of an error, so a system
//! still holding the handle of an entity that died mid-frame degrades
//! gracefully.

use std::any::Any;

use tracing::warn;

use crate::component::{Component, ComponentRegistry, ComponentTag};
use crate::entity::{EntityAllocator, EntityId};
use crate::storage::{ComponentStore, ErasedStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Attached
// ---------------------------------------------------------------------------

/// Outcome of a successful [`Registry::attach`].
#[derive(Debug, PartialEq, Eq)]
pub enum Attached<T> {
    /// The entity did not carry this tag before.
    Inserted,
    /// The tag was already present; the old value is returned.
    Replaced(T),
}

impl<T> Attached<T> {
    /// Whether the attach added a tag the entity did not have.
    pub fn is_new_tag(&self) -> bool {
        matches!(self, Attached::Inserted)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Entity identity and component storage.
pub struct Registry {
    allocator: EntityAllocator,
    components: ComponentRegistry,
    /// Indexed by `ComponentTag.0`; created on registration.
    stores: Vec<Box<dyn ErasedStore>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entity_count", &self.allocator.alive_count())
            .field("component_types", &self.components.len())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            components: ComponentRegistry::new(),
            stores: Vec::new(),
        }
    }

    // -- identity -----------------------------------------------------------

    /// Allocate the next identifier. The entity starts with no components.
    pub fn create(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Remove every component of `entity` and retire the identifier.
    ///
    /// Returns `false` if the id was unknown or already destroyed.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        if !self.allocator.is_alive(entity) {
            return false;
        }
        for store in &mut self.stores {
            store.discard(entity);
        }
        self.allocator.deallocate(entity)
    }

    /// Whether `entity` resolves to an entity that has not been destroyed.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of entities that have been created and not destroyed.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    // -- component types ----------------------------------------------------

    /// Register `T` explicitly and return its tag.
    ///
    /// Registration also happens implicitly on the first [`attach`](Self::attach)
    /// of a `T`.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTag, EcsError> {
        let tag = self.components.register::<T>()?;
        if tag.slot() == self.stores.len() {
            self.stores.push(Box::new(ComponentStore::<T>::new()));
        }
        Ok(tag)
    }

    /// Tag of `T`, if it has been registered.
    pub fn tag_of<T: Component>(&self) -> Option<ComponentTag> {
        self.components.lookup::<T>()
    }

    /// Tag registered under `name`.
    pub fn tag_by_name(&self, name: &str) -> Option<ComponentTag> {
        self.components.lookup_by_name(name)
    }

    /// Read-only access to the name/type registry.
    pub fn component_registry(&self) -> &ComponentRegistry {
        &self.components
    }

    fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        let tag = self.components.lookup::<T>()?;
        self.stores[tag.slot()]
            .as_any()
            .downcast_ref::<ComponentStore<T>>()
    }

    fn store_mut<T: Component>(&mut self) -> Option<&mut ComponentStore<T>> {
        let tag = self.components.lookup::<T>()?;
        self.stores[tag.slot()]
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`, silently overwriting an existing `T`.
    ///
    /// Returns `None` if the entity is not alive, or if `T::NAME` is already
    /// claimed by a different type (logged as a warning).
    pub fn attach<T: Component>(&mut self, entity: EntityId, value: T) -> Option<Attached<T>> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        if let Err(e) = self.register::<T>() {
            warn!(entity = %entity, error = %e, "attach rejected");
            return None;
        }
        let store = self.store_mut::<T>()?;
        Some(match store.insert(entity, value) {
            Some(old) => Attached::Replaced(old),
            None => Attached::Inserted,
        })
    }

    /// Detach and return the `T` on `entity`.
    pub fn detach<T: Component>(&mut self, entity: EntityId) -> Option<T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.store_mut::<T>()?.remove(entity)
    }

    /// Detach by tag without naming the type. The value comes back boxed.
    pub fn detach_tag(
        &mut self,
        entity: EntityId,
        tag: ComponentTag,
    ) -> Option<Box<dyn Any + Send + Sync>> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.stores.get_mut(tag.slot())?.remove_boxed(entity)
    }

    /// Shared reference to the `T` on `entity`.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.store::<T>()?.get(entity)
    }

    /// Mutable reference to the `T` on `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    /// Whether `entity` carries a `T`.
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.store::<T>().is_some_and(|s| s.contains(entity))
    }

    /// Whether `entity` carries the component registered as `tag`.
    pub fn has_tag(&self, entity: EntityId, tag: ComponentTag) -> bool {
        self.stores
            .get(tag.slot())
            .is_some_and(|s| s.contains(entity))
    }

    /// Tags currently attached to `entity`, in tag order.
    pub fn tags_of(&self, entity: EntityId) -> Vec<ComponentTag> {
        if !self.allocator.is_alive(entity) {
            return Vec::new();
        }
        self.stores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains(entity))
            .map(|(i, _)| ComponentTag(i as u32))
            .collect()
    }

    /// Number of entities carrying `tag`.
    pub fn component_count(&self, tag: ComponentTag) -> usize {
        self.stores.get(tag.slot()).map_or(0, |s| s.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {
        const NAME: &'static str = "position";
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {
        const NAME: &'static str = "health";
    }

    #[derive(Debug)]
    struct FakeHealth;
    impl Component for FakeHealth {
        const NAME: &'static str = "health";
    }

    #[test]
    fn attach_get_has() {
        let mut reg = Registry::new();
        let e = reg.create();
        assert_eq!(
            reg.attach(e, Position { x: 1.0, y: 2.0 }),
            Some(Attached::Inserted)
        );
        assert!(reg.has::<Position>(e));
        assert!(!reg.has::<Health>(e));
        assert_eq!(reg.get::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
    }

    #[test]
    fn attach_overwrites_silently() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Health(10));
        assert_eq!(reg.attach(e, Health(3)), Some(Attached::Replaced(Health(10))));
        assert_eq!(reg.get::<Health>(e), Some(&Health(3)));
        let tag = reg.tag_of::<Health>().unwrap();
        assert_eq!(reg.component_count(tag), 1);
    }

    #[test]
    fn detach_twice_returns_value_then_none() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Health(5));
        assert_eq!(reg.detach::<Health>(e), Some(Health(5)));
        assert_eq!(reg.detach::<Health>(e), None);
        assert!(!reg.has::<Health>(e));
    }

    #[test]
    fn detach_by_tag_returns_boxed_value() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Health(42));
        let tag = reg.tag_by_name("health").unwrap();
        let boxed = reg.detach_tag(e, tag).unwrap();
        assert_eq!(boxed.downcast_ref::<Health>(), Some(&Health(42)));
        assert!(reg.detach_tag(e, tag).is_none());
    }

    #[test]
    fn get_mut_mutates_in_place() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Position { x: 0.0, y: 0.0 });
        if let Some(p) = reg.get_mut::<Position>(e) {
            p.x = 9.0;
        }
        assert_eq!(reg.get::<Position>(e).map(|p| p.x), Some(9.0));
    }

    #[test]
    fn destroyed_entity_is_absent_everywhere() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Health(1));
        reg.attach(e, Position { x: 0.0, y: 0.0 });
        assert!(reg.destroy(e));

        assert!(!reg.is_alive(e));
        assert_eq!(reg.get::<Health>(e), None);
        assert!(!reg.has::<Position>(e));
        assert_eq!(reg.detach::<Health>(e), None);
        assert_eq!(reg.attach(e, Health(2)), None);
        assert!(reg.tags_of(e).is_empty());
        assert!(!reg.destroy(e));
        assert_eq!(reg.entity_count(), 0);
    }

    #[test]
    fn recycled_slot_does_not_inherit_components() {
        let mut reg = Registry::new();
        let old = reg.create();
        reg.attach(old, Health(1));
        reg.destroy(old);
        let fresh = reg.create();
        assert_eq!(fresh.index(), old.index());
        assert!(!reg.has::<Health>(fresh));
        assert_eq!(reg.get::<Health>(old), None);
    }

    #[test]
    fn unknown_type_and_tag_are_absent() {
        let mut reg = Registry::new();
        let e = reg.create();
        assert_eq!(reg.get::<Health>(e), None);
        assert!(!reg.has_tag(e, ComponentTag(12)));
        assert!(reg.detach_tag(e, ComponentTag(12)).is_none());
        assert_eq!(reg.tag_by_name("nope"), None);
    }

    #[test]
    fn conflicting_name_is_rejected_on_attach() {
        let mut reg = Registry::new();
        let e = reg.create();
        reg.attach(e, Health(1));
        assert_eq!(reg.attach(e, FakeHealth).map(|a| a.is_new_tag()), None);
        assert!(reg.register::<FakeHealth>().is_err());
        assert_eq!(reg.get::<Health>(e), Some(&Health(1)));
    }

    #[test]
    fn tags_of_lists_attached_components() {
        let mut reg = Registry::new();
        let e = reg.create();
        let pos = reg.register::<Position>().unwrap();
        let hp = reg.register::<Health>().unwrap();
        reg.attach(e, Health(1));
        assert_eq!(reg.tags_of(e), vec![hp]);
        reg.attach(e, Position { x: 0.0, y: 0.0 });
        assert_eq!(reg.tags_of(e), vec![pos, hp]);
    }
}
