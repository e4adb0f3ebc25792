// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Component storage and management
//!
//! Components are data containers attached to entities. Every attached
//! instance lives in a single generational arena owned by the
//! [`ComponentRegistry`]; systems only ever hold [`ComponentHandle`]s into
//! it. A handle whose component has been released fails the generation
//! check instead of dangling.
//!
//! A component's type is its concrete Rust type and never changes for the
//! lifetime of the instance. Replacing behavior means detaching and
//! attaching a new component.

use crate::ecs::Entity;
use slotmap::SlotMap;
use std::any::{Any, TypeId};
use std::fmt;

slotmap::new_key_type! {
    /// Generation-checked handle to an attached component instance
    pub struct ComponentHandle;
}

/// Downcasting support for [`Component`] trait objects
///
/// Implemented for every `'static` type; user code never implements it.
pub trait AsAny: Any {
    /// View as `&dyn Any`
    fn as_any(&self) -> &dyn Any;

    /// View as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Name of the concrete type
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Trait that all components must implement
///
/// Components should be plain data. Behavior belongs to the systems that
/// accept them.
pub trait Component: 'static + AsAny + Send + Sync {}

impl dyn Component {
    /// The behavior tag of this instance
    pub fn component_type(&self) -> ComponentType {
        ComponentType {
            id: self.as_any().type_id(),
            name: self.type_name(),
        }
    }

    /// Check whether this instance is a `T`
    pub fn is<T: Component>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete component type
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete component type
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component<{}>", self.type_name())
    }
}

/// Behavior tag of a component: its concrete type
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Tag for the component type `T`
    pub fn of<T: Component>() -> Self {
        ComponentType {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl std::hash::Hash for ComponentType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Whether a stored component is still visible to systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Attached to a live entity and routed to accepting systems
    Attached,
    /// Detached or owned by an entity pending deletion; memory stays valid
    /// until the next flush
    Detached,
}

struct ComponentEntry {
    owner: Entity,
    attachment: Attachment,
    data: Box<dyn Component>,
}

/// Arena holding every component instance of a world
///
/// The registry knows nothing about scheduling. It stores instances, hands
/// out generation-checked handles and keeps released components around
/// until the world's safe point.
pub struct ComponentRegistry {
    entries: SlotMap<ComponentHandle, ComponentEntry>,
    pending_release: Vec<ComponentHandle>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a registry with room for `capacity` components
    pub fn with_capacity(capacity: usize) -> Self {
        ComponentRegistry {
            entries: SlotMap::with_capacity_and_key(capacity),
            pending_release: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, owner: Entity, data: Box<dyn Component>) -> ComponentHandle {
        self.entries.insert(ComponentEntry {
            owner,
            attachment: Attachment::Attached,
            data,
        })
    }

    /// Mark a component detached. Returns false if it was already detached.
    pub(crate) fn detach(&mut self, handle: ComponentHandle) -> bool {
        match self.entries.get_mut(handle) {
            Some(entry) if entry.attachment == Attachment::Attached => {
                entry.attachment = Attachment::Detached;
                true
            }
            _ => false,
        }
    }

    /// Queue a detached component for release at the next flush
    pub(crate) fn schedule_release(&mut self, handle: ComponentHandle) {
        self.pending_release.push(handle);
    }

    /// Free a component immediately
    pub(crate) fn remove(&mut self, handle: ComponentHandle) -> Option<Box<dyn Component>> {
        self.entries.remove(handle).map(|entry| entry.data)
    }

    /// Free every component queued by [`schedule_release`](Self::schedule_release)
    pub(crate) fn release_pending(&mut self) -> usize {
        let mut released = 0;
        for handle in self.pending_release.drain(..) {
            if self.entries.remove(handle).is_some() {
                released += 1;
            }
        }
        released
    }

    /// Get a component as a trait object
    pub fn get(&self, handle: ComponentHandle) -> Option<&dyn Component> {
        self.entries.get(handle).map(|entry| &*entry.data)
    }

    /// Get a component as a mutable trait object
    pub fn get_mut(&mut self, handle: ComponentHandle) -> Option<&mut dyn Component> {
        self.entries.get_mut(handle).map(|entry| &mut *entry.data)
    }

    /// Get a component downcast to its concrete type
    pub fn get_as<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.get(handle)?.downcast_ref::<T>()
    }

    /// Get a component mutably, downcast to its concrete type
    pub fn get_as_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.get_mut(handle)?.downcast_mut::<T>()
    }

    /// Entity that owns the component
    pub fn owner(&self, handle: ComponentHandle) -> Option<Entity> {
        self.entries.get(handle).map(|entry| entry.owner)
    }

    /// Attachment state of the component
    pub fn attachment(&self, handle: ComponentHandle) -> Option<Attachment> {
        self.entries.get(handle).map(|entry| entry.attachment)
    }

    /// Check whether the handle still resolves to stored memory
    pub fn contains(&self, handle: ComponentHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Iterate over all attached components in arena order
    pub fn iter_attached(&self) -> impl Iterator<Item = (ComponentHandle, Entity, &dyn Component)> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.attachment == Attachment::Attached)
            .map(|(handle, entry)| (handle, entry.owner, &*entry.data))
    }

    /// Number of stored components, including ones awaiting release
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of components waiting for the next flush
    pub fn pending_release_count(&self) -> usize {
        self.pending_release.len()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct TestComponent {
        x: f32,
        y: f32,
    }

    impl Component for TestComponent {}

    #[derive(Debug)]
    struct Marker;

    impl Component for Marker {}

    #[test]
    fn test_component_type_tag() {
        let boxed: Box<dyn Component> = Box::new(TestComponent { x: 1.0, y: 2.0 });
        assert_eq!(boxed.as_ref().component_type(), ComponentType::of::<TestComponent>());
        assert_ne!(boxed.as_ref().component_type(), ComponentType::of::<Marker>());
        assert!(boxed.as_ref().is::<TestComponent>());
        assert!(ComponentType::of::<Marker>().name().ends_with("Marker"));
    }

    #[test]
    fn test_registry_insert_and_downcast() {
        let mut registry = ComponentRegistry::new();
        let owner = Entity::new(1, 0);

        let handle = registry.insert(owner, Box::new(TestComponent { x: 10.0, y: 20.0 }));

        assert!(registry.contains(handle));
        assert_eq!(registry.owner(handle), Some(owner));
        assert_eq!(registry.get_as::<TestComponent>(handle).unwrap().x, 10.0);
        assert!(registry.get_as::<Marker>(handle).is_none());

        registry.get_as_mut::<TestComponent>(handle).unwrap().y = 5.0;
        assert_eq!(registry.get_as::<TestComponent>(handle).unwrap().y, 5.0);
    }

    #[test]
    fn test_detached_components_stay_valid_until_release() {
        let mut registry = ComponentRegistry::new();
        let handle = registry.insert(Entity::new(1, 0), Box::new(Marker));

        assert!(registry.detach(handle));
        assert!(!registry.detach(handle));
        registry.schedule_release(handle);

        assert_eq!(registry.attachment(handle), Some(Attachment::Detached));
        assert!(registry.get(handle).is_some());
        assert_eq!(registry.iter_attached().count(), 0);

        assert_eq!(registry.release_pending(), 1);
        assert!(!registry.contains(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut registry = ComponentRegistry::new();
        let old = registry.insert(Entity::new(1, 0), Box::new(Marker));
        registry.remove(old);

        let new = registry.insert(Entity::new(2, 0), Box::new(Marker));
        assert_ne!(old, new);
        assert!(registry.get(old).is_none());
        assert_eq!(registry.owner(new), Some(Entity::new(2, 0)));
    }
}
