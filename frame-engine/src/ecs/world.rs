//! World management
//!
//! The World owns every entity and, through its [`ComponentRegistry`], every
//! attached component. It implements the entity lifecycle:
//!
//! ```text
//! spawn() ──> Live ──mark_for_deletion()──> PendingDeletion ──flush_deletions()──> Freed
//! ```
//!
//! Marking an entity unroutes its components right away, so no system sees
//! it in a later phase of the same frame, but the entity and its component
//! memory stay valid until `flush_deletions` runs at the end-of-frame safe
//! point. Attach and detach operations are recorded as [`RoutingEvent`]s that
//! the owner of the world (normally the scheduler) delivers to systems.

use crate::ecs::component::Attachment;
use crate::ecs::{Component, ComponentHandle, ComponentRegistry, Entity, EntityId};
use crate::error::{WorldError, WorldResult};

/// Lifecycle state of an entity that has not been freed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Visible to systems
    Live,
    /// Excluded from iteration, freed at the next flush
    PendingDeletion,
}

/// An attach or detach that systems have not been told about yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingEvent {
    /// A component was attached to a live entity
    Attached {
        /// The new component
        handle: ComponentHandle,
        /// Its owner
        owner: Entity,
    },
    /// A component was detached, or its owner was marked for deletion
    Detached {
        /// The removed component; its memory is valid until the next flush
        handle: ComponentHandle,
        /// Its owner
        owner: Entity,
    },
}

impl RoutingEvent {
    /// The component the event is about
    pub fn handle(&self) -> ComponentHandle {
        match *self {
            RoutingEvent::Attached { handle, .. } | RoutingEvent::Detached { handle, .. } => handle,
        }
    }
}

/// What a call to [`World::flush_deletions`] freed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entities moved from PendingDeletion to Freed
    pub entities_freed: usize,
    /// Component instances whose memory was released
    pub components_released: usize,
}

#[derive(Debug)]
struct EntitySlot {
    generation: u32,
    state: Option<EntityState>,
    persistent: bool,
    components: Vec<ComponentHandle>,
}

/// The main ECS world container
///
/// Holds the live-entity set, the pending-deletion queue and the component
/// registry. Systems receive `&World` during parallel updates and
/// `&mut World` only on the frame thread.
pub struct World {
    slots: Vec<EntitySlot>,
    free_ids: Vec<EntityId>,
    pending_deletion: Vec<Entity>,
    live_count: usize,
    components: ComponentRegistry,
    events: Vec<RoutingEvent>,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a world with preallocated entity and component storage
    pub fn with_capacity(entities: usize, components: usize) -> Self {
        World {
            slots: Vec::with_capacity(entities),
            free_ids: Vec::new(),
            pending_deletion: Vec::new(),
            live_count: 0,
            components: ComponentRegistry::with_capacity(components),
            events: Vec::new(),
        }
    }

    /// Create a new live entity
    pub fn spawn(&mut self) -> Entity {
        self.spawn_with(false)
    }

    /// Create a live entity that survives `clear(false)`
    pub fn spawn_persistent(&mut self) -> Entity {
        self.spawn_with(true)
    }

    fn spawn_with(&mut self, persistent: bool) -> Entity {
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = EntityId::new(self.slots.len() as u64);
                self.slots.push(EntitySlot {
                    generation: 0,
                    state: None,
                    persistent: false,
                    components: Vec::new(),
                });
                id
            }
        };

        let slot = &mut self.slots[id.index()];
        slot.state = Some(EntityState::Live);
        slot.persistent = persistent;
        self.live_count += 1;

        let entity = Entity::new(id.raw(), slot.generation);
        tracing::trace!(%entity, persistent, "spawned entity");
        entity
    }

    fn slot(&self, entity: Entity) -> WorldResult<&EntitySlot> {
        match self.slots.get(entity.id().index()) {
            Some(slot) if slot.generation == entity.generation() && slot.state.is_some() => Ok(slot),
            _ => Err(WorldError::StaleEntity(entity)),
        }
    }

    fn slot_mut(&mut self, entity: Entity) -> WorldResult<&mut EntitySlot> {
        match self.slots.get_mut(entity.id().index()) {
            Some(slot) if slot.generation == entity.generation() && slot.state.is_some() => Ok(slot),
            _ => Err(WorldError::StaleEntity(entity)),
        }
    }

    /// Change the persistent flag of an entity
    pub fn set_persistent(&mut self, entity: Entity, persistent: bool) -> WorldResult<()> {
        self.slot_mut(entity)?.persistent = persistent;
        Ok(())
    }

    /// Whether the entity survives `clear(false)`
    pub fn is_persistent(&self, entity: Entity) -> WorldResult<bool> {
        Ok(self.slot(entity)?.persistent)
    }

    /// Lifecycle state, or `None` once the entity has been freed
    pub fn state(&self, entity: Entity) -> Option<EntityState> {
        self.slot(entity).ok().and_then(|slot| slot.state)
    }

    /// Check if an entity is live
    pub fn is_live(&self, entity: Entity) -> bool {
        self.state(entity) == Some(EntityState::Live)
    }

    /// Check if an entity can still be dereferenced (live or pending deletion)
    pub fn exists(&self, entity: Entity) -> bool {
        self.state(entity).is_some()
    }

    /// Number of live entities
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of entities waiting for the next flush
    pub fn pending_count(&self) -> usize {
        self.pending_deletion.len()
    }

    /// Entities marked for deletion since the last flush, in marking order
    pub fn pending_deletions(&self) -> &[Entity] {
        &self.pending_deletion
    }

    /// Iterate over all live entities in id order
    pub fn live_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            (slot.state == Some(EntityState::Live)).then(|| Entity::new(index as u64, slot.generation))
        })
    }

    /// Component handles attached to an entity, in attach order
    ///
    /// For an entity pending deletion this still lists its (detached)
    /// components, which remain readable until the flush.
    pub fn components_of(&self, entity: Entity) -> WorldResult<&[ComponentHandle]> {
        Ok(&self.slot(entity)?.components)
    }

    /// First component of type `T` on an entity
    pub fn first_component<T: Component>(&self, entity: Entity) -> Option<(ComponentHandle, &T)> {
        let slot = self.slot(entity).ok()?;
        slot.components
            .iter()
            .find_map(|&handle| self.components.get_as::<T>(handle).map(|c| (handle, c)))
    }

    /// Attach a component to a live entity
    pub fn attach<C: Component>(&mut self, entity: Entity, component: C) -> WorldResult<ComponentHandle> {
        self.attach_boxed(entity, Box::new(component))
    }

    /// Attach an already boxed component to a live entity
    pub fn attach_boxed(&mut self, entity: Entity, component: Box<dyn Component>) -> WorldResult<ComponentHandle> {
        let slot = self.slot(entity)?;
        if slot.state != Some(EntityState::Live) {
            return Err(WorldError::EntityNotLive(entity));
        }

        self.reserve_event()?;
        let handle = self.components.insert(entity, component);
        self.slot_mut(entity)?.components.push(handle);
        self.events.push(RoutingEvent::Attached { handle, owner: entity });
        Ok(handle)
    }

    /// Detach a component from its entity
    ///
    /// The component stops being routed immediately; its memory is released
    /// at the next flush. Returns `Ok(false)` if it was already detached.
    pub fn detach(&mut self, handle: ComponentHandle) -> WorldResult<bool> {
        let owner = self
            .components
            .owner(handle)
            .ok_or(WorldError::UnknownComponent(handle))?;

        if self.components.attachment(handle) != Some(Attachment::Attached) {
            return Ok(false);
        }

        self.reserve_event()?;
        self.components.detach(handle);
        if let Ok(slot) = self.slot_mut(owner) {
            slot.components.retain(|&h| h != handle);
        }
        self.components.schedule_release(handle);
        self.events.push(RoutingEvent::Detached { handle, owner });
        Ok(true)
    }

    fn reserve_event(&mut self) -> WorldResult<()> {
        self.events.try_reserve(1).map_err(|_| WorldError::Allocation {
            what: "routing event queue",
            requested: 1,
        })
    }

    /// Move an entity from Live to PendingDeletion
    ///
    /// Returns `Ok(false)` if the entity was already pending deletion.
    pub fn mark_for_deletion(&mut self, entity: Entity) -> WorldResult<bool> {
        let slot = self.slot(entity)?;
        if slot.state == Some(EntityState::PendingDeletion) {
            return Ok(false);
        }
        let handles = slot.components.clone();

        // Reserve both queues before the state change so a failure leaves the entity Live
        self.events.try_reserve(handles.len()).map_err(|_| WorldError::Allocation {
            what: "routing event queue",
            requested: handles.len(),
        })?;
        self.pending_deletion.try_reserve(1).map_err(|_| WorldError::Allocation {
            what: "pending deletion list",
            requested: 1,
        })?;

        self.slot_mut(entity)?.state = Some(EntityState::PendingDeletion);
        self.live_count -= 1;
        self.pending_deletion.push(entity);

        for handle in handles {
            if self.components.detach(handle) {
                self.events.push(RoutingEvent::Detached { handle, owner: entity });
            }
        }

        tracing::trace!(%entity, "entity marked for deletion");
        Ok(true)
    }

    /// Mark every live entity for deletion
    ///
    /// Persistent entities are kept unless `include_persistent` is set.
    /// Returns the number of entities marked.
    pub fn clear(&mut self, include_persistent: bool) -> WorldResult<usize> {
        let doomed: Vec<Entity> = self
            .live_entities()
            .filter(|&entity| include_persistent || !self.slots[entity.id().index()].persistent)
            .collect();

        let mut marked = 0;
        for entity in doomed {
            if self.mark_for_deletion(entity)? {
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Free every entity pending deletion and release detached components
    ///
    /// Freed handles become stale: their slot generation moves on and the id
    /// is recycled by a later `spawn`. Must only run at the end-of-frame safe
    /// point, after every routing event has been delivered.
    pub fn flush_deletions(&mut self) -> FlushReport {
        let mut report = FlushReport::default();

        for entity in std::mem::take(&mut self.pending_deletion) {
            let Some(slot) = self.slots.get_mut(entity.id().index()) else {
                continue;
            };
            if slot.generation != entity.generation() || slot.state != Some(EntityState::PendingDeletion) {
                continue;
            }

            for handle in slot.components.drain(..) {
                self.components.schedule_release(handle);
            }
            slot.state = None;
            slot.persistent = false;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_ids.push(entity.id());
            report.entities_freed += 1;
        }

        if !self.events.is_empty() {
            let before = self.events.len();
            let components = &self.components;
            // Detached handles are about to be released; anything still
            // queued for them can no longer be delivered.
            self.events
                .retain(|event| components.attachment(event.handle()) == Some(Attachment::Attached));
            let dropped = before - self.events.len();
            if dropped > 0 {
                tracing::warn!(dropped, "routing events discarded at flush");
            }
        }

        report.components_released = self.components.release_pending();

        if report.entities_freed > 0 || report.components_released > 0 {
            tracing::debug!(
                entities = report.entities_freed,
                components = report.components_released,
                "flushed deletions"
            );
        }
        report
    }

    /// Take every routing event recorded since the last drain, in order
    pub fn drain_events(&mut self) -> Vec<RoutingEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of routing events not yet delivered
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// The component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Get a component by handle, downcast to `T`
    ///
    /// Detached components stay readable until the next flush.
    pub fn component<T: Component>(&self, handle: ComponentHandle) -> WorldResult<&T> {
        let component = self
            .components
            .get(handle)
            .ok_or(WorldError::UnknownComponent(handle))?;
        component.downcast_ref::<T>().ok_or(WorldError::ComponentTypeMismatch {
            handle,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Get a component mutably by handle, downcast to `T`
    pub fn component_mut<T: Component>(&mut self, handle: ComponentHandle) -> WorldResult<&mut T> {
        let component = self
            .components
            .get_mut(handle)
            .ok_or(WorldError::UnknownComponent(handle))?;
        component.downcast_mut::<T>().ok_or(WorldError::ComponentTypeMismatch {
            handle,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Get a component as a trait object
    pub fn component_dyn(&self, handle: ComponentHandle) -> Option<&dyn Component> {
        self.components.get(handle)
    }

    /// Entity that owns a component
    pub fn owner(&self, handle: ComponentHandle) -> Option<Entity> {
        self.components.owner(handle)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug)]
    struct Tag;
    impl Component for Tag {}

    #[test]
    fn test_world_entity_lifecycle() {
        let mut world = World::new();

        let e1 = world.spawn();
        let e2 = world.spawn();
        assert_eq!(world.live_count(), 2);
        assert!(world.is_live(e1));

        assert!(world.mark_for_deletion(e1).unwrap());
        assert!(!world.mark_for_deletion(e1).unwrap());
        assert_eq!(world.state(e1), Some(EntityState::PendingDeletion));
        assert!(world.exists(e1));
        assert!(!world.is_live(e1));
        assert_eq!(world.live_count(), 1);
        assert_eq!(world.live_entities().collect::<Vec<_>>(), vec![e2]);

        let report = world.flush_deletions();
        assert_eq!(report.entities_freed, 1);
        assert!(!world.exists(e1));
        assert_eq!(world.mark_for_deletion(e1), Err(WorldError::StaleEntity(e1)));
    }

    #[test]
    fn test_entity_generation_on_reuse() {
        let mut world = World::new();
        let e1 = world.spawn();
        world.mark_for_deletion(e1).unwrap();
        world.flush_deletions();

        let e2 = world.spawn();
        assert_eq!(e2.id(), e1.id());
        assert_ne!(e2.generation(), e1.generation());
        assert!(world.is_live(e2));
        assert!(!world.exists(e1));
    }

    #[test]
    fn test_attach_records_events_and_downcasts() {
        let mut world = World::new();
        let entity = world.spawn();
        let handle = world.attach(entity, Health(10)).unwrap();

        assert_eq!(world.component::<Health>(handle).unwrap(), &Health(10));
        assert!(matches!(
            world.component::<Tag>(handle),
            Err(WorldError::ComponentTypeMismatch { .. })
        ));
        world.component_mut::<Health>(handle).unwrap().0 = 3;
        assert_eq!(world.first_component::<Health>(entity).map(|(_, h)| h.0), Some(3));

        assert_eq!(
            world.drain_events(),
            vec![RoutingEvent::Attached { handle, owner: entity }]
        );
        assert_eq!(world.pending_events(), 0);
    }

    #[test]
    fn test_attach_to_pending_entity_fails() {
        let mut world = World::new();
        let entity = world.spawn();
        world.mark_for_deletion(entity).unwrap();

        assert_eq!(world.attach(entity, Tag), Err(WorldError::EntityNotLive(entity)));
    }

    #[test]
    fn test_marked_entity_components_stay_readable_until_flush() {
        let mut world = World::new();
        let entity = world.spawn();
        let handle = world.attach(entity, Health(5)).unwrap();
        world.drain_events();

        world.mark_for_deletion(entity).unwrap();
        assert_eq!(
            world.drain_events(),
            vec![RoutingEvent::Detached { handle, owner: entity }]
        );
        assert_eq!(world.component::<Health>(handle).unwrap().0, 5);
        assert_eq!(world.components_of(entity).unwrap(), &[handle]);

        let report = world.flush_deletions();
        assert_eq!(report.components_released, 1);
        assert_eq!(world.component::<Health>(handle), Err(WorldError::UnknownComponent(handle)));
    }

    #[test]
    fn test_detach_defers_release() {
        let mut world = World::new();
        let entity = world.spawn();
        let handle = world.attach(entity, Tag).unwrap();

        assert!(world.detach(handle).unwrap());
        assert!(!world.detach(handle).unwrap());
        assert!(world.components_of(entity).unwrap().is_empty());
        assert!(world.component_dyn(handle).is_some());

        world.drain_events();
        world.flush_deletions();
        assert!(world.component_dyn(handle).is_none());
        assert_eq!(world.detach(handle), Err(WorldError::UnknownComponent(handle)));
        assert!(world.is_live(entity));
    }

    #[test]
    fn test_clear_respects_persistent() {
        let mut world = World::new();
        let keep = world.spawn_persistent();
        let drop_a = world.spawn();
        let drop_b = world.spawn();

        assert_eq!(world.clear(false).unwrap(), 2);
        assert!(world.is_live(keep));
        assert_eq!(world.pending_deletions(), &[drop_a, drop_b]);

        world.set_persistent(keep, false).unwrap();
        assert_eq!(world.clear(false).unwrap(), 1);
        world.flush_deletions();
        assert_eq!(world.live_count(), 0);
    }

    #[test]
    fn test_flush_discards_undeliverable_events() {
        let mut world = World::new();
        let entity = world.spawn();
        world.attach(entity, Tag).unwrap();
        world.mark_for_deletion(entity).unwrap();

        world.flush_deletions();
        assert_eq!(world.pending_events(), 0);
    }
}
