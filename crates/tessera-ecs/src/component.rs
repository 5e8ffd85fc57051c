//! Component trait, tag interning, and type registration.
//!
//! Every component type reports its own name through [`Component::NAME`].
//! The first time a type is seen it is registered in a [`ComponentRegistry`],
//! which hands out a small [`ComponentTag`] used as the join key for queries
//! and as the index of the type's storage column.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A plain data payload that can be attached to an entity.
///
/// The only contract is reporting a type tag. Two different Rust types must
/// not share a `NAME`.
///
/// ```
/// use tessera_ecs::component::Component;
///
/// struct Health(u32);
///
/// impl Component for Health {
///     const NAME: &'static str = "health";
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// The tag name under which this component is attached and queried.
    const NAME: &'static str;
}

// ---------------------------------------------------------------------------
// ComponentTag
// ---------------------------------------------------------------------------

/// Interned identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTag(pub(crate) u32);

impl ComponentTag {
    /// Position of this tag's storage column.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTag({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Tag assigned at registration time.
    pub tag: ComponentTag,
    /// The component's `NAME`.
    pub name: &'static str,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types and names to [`ComponentTag`]s.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing tag.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// TypeId -> tag for dedup.
    by_type: HashMap<TypeId, ComponentTag>,
    /// Name -> tag for lookup by string name.
    by_name: HashMap<&'static str, ComponentTag>,
    /// Indexed by `ComponentTag.0`.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its `NAME`.
    ///
    /// Returns the existing tag if `T` is already registered, or
    /// [`EcsError::ComponentNameConflict`] if another type already owns the
    /// name.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTag, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.by_name.contains_key(T::NAME) {
            return Err(EcsError::ComponentNameConflict {
                name: T::NAME.to_owned(),
                type_name: std::any::type_name::<T>(),
            });
        }

        let tag = ComponentTag(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            tag,
            name: T::NAME,
            type_id: rust_type_id,
        });
        self.by_type.insert(rust_type_id, tag);
        self.by_name.insert(T::NAME, tag);
        Ok(tag)
    }

    /// Look up the tag of a Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTag> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a tag by its registered name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTag> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a tag.
    pub fn get_info(&self, tag: ComponentTag) -> Option<&ComponentInfo> {
        self.infos.get(tag.slot())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
