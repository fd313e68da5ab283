use std::any::type_name;

use tracing::trace;

use crate::component::{Component, ComponentId, ComponentMask, ComponentRegistry};
use crate::entity::{Entity, EntityAllocator, EntityIter};
use crate::error::EcsError;
use crate::event::{Events, WorldEvent};
use crate::query::{Access, QueryIter, WorldQuery};
use crate::resource::Resources;
use crate::storage::{ErasedPool, Pool, DEFAULT_CHUNK_SIZE};

/// The central ECS container. Owns all entities, component pools and resources,
/// and is the sole authority on entity lifetime.
///
/// Not thread-safe by contract: every mutation happens on the update thread.
pub struct World {
    entities: EntityAllocator,
    /// Component bitmask per entity slot.
    masks: Vec<ComponentMask>,
    registry: ComponentRegistry,
    /// One pool per registered component type, indexed by `ComponentId`.
    pools: Vec<Box<dyn ErasedPool>>,
    chunk_size: usize,
    events: Events<WorldEvent>,
    resources: Resources,
}

fn downcast_pool<C: Component>(pool: &dyn ErasedPool) -> &Pool<C> {
    pool.as_any()
        .downcast_ref::<Pool<C>>()
        .unwrap_or_else(|| panic!("component pool type mismatch for `{}`", type_name::<C>()))
}

fn downcast_pool_mut<C: Component>(pool: &mut dyn ErasedPool) -> &mut Pool<C> {
    pool.as_any_mut()
        .downcast_mut::<Pool<C>>()
        .unwrap_or_else(|| panic!("component pool type mismatch for `{}`", type_name::<C>()))
}

impl World {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a world whose component pools grow `chunk_size` slots at a time.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            entities: EntityAllocator::new(),
            masks: Vec::new(),
            registry: ComponentRegistry::new(),
            pools: Vec::new(),
            chunk_size,
            events: Events::new(),
            resources: Resources::new(),
        }
    }

    // ---- Entity management ----

    /// Create an entity in the lowest free slot.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.allocate();
        let idx = entity.index as usize;
        if idx >= self.masks.len() {
            self.masks.resize(idx + 1, ComponentMask::EMPTY);
        }
        trace!("Created entity {entity}");
        entity
    }

    /// Destroy an entity, destructing every component it still has.
    ///
    /// # Panics
    /// If the handle is stale.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.assert_alive(entity);
        let mask = std::mem::take(&mut self.masks[entity.index as usize]);
        for id in mask.iter() {
            self.pools[id.index()].discard(entity);
            self.events.push(WorldEvent::ComponentRemoved {
                entity,
                component: id,
            });
        }
        self.entities.deallocate(entity);
        self.events.push(WorldEvent::EntityDestroyed(entity));
        trace!("Destroyed entity {entity} ({} components)", mask.count());
    }

    /// Check whether an entity handle still refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Staleness query for callers that hold handles across frames.
    pub fn check_alive(&self, entity: Entity) -> Result<(), EcsError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity(entity))
        }
    }

    fn assert_alive(&self, entity: Entity) {
        assert!(self.is_alive(entity), "entity {entity} is stale");
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate live entities in ascending index order.
    pub fn entities(&mut self) -> EntityIter<'_> {
        self.entities.iter()
    }

    // ---- Component management ----

    /// Register a component type, creating its pool. Idempotent.
    pub fn register<C: Component>(&mut self) -> ComponentId {
        let id = self.registry.register::<C>();
        if id.index() == self.pools.len() {
            self.pools.push(Box::new(Pool::<C>::new(self.chunk_size)));
        }
        id
    }

    pub fn component_id<C: Component>(&self) -> Option<ComponentId> {
        self.registry.id::<C>()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Construct a component in the entity's slot and return it.
    ///
    /// # Panics
    /// If the entity is stale or already has a `C`.
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> &mut C {
        self.assert_alive(entity);
        let id = self.register::<C>();
        let idx = entity.index as usize;
        assert!(
            !self.masks[idx].contains(id),
            "entity {entity} already has a `{}` component",
            type_name::<C>()
        );

        let Self {
            pools,
            masks,
            events,
            ..
        } = self;
        let storage = &mut downcast_pool_mut::<C>(pools[id.index()].as_mut()).storage;
        storage.ensure_capacity(idx + 1);
        masks[idx].set(id);
        events.push(WorldEvent::ComponentAdded {
            entity,
            component: id,
        });
        trace!("Added `{}` to {entity}", type_name::<C>());
        storage.construct(entity.index, component)
    }

    /// Destruct the entity's `C` component.
    ///
    /// # Panics
    /// If the entity is stale or has no `C`.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) {
        self.assert_alive(entity);
        let id = self.expect_id::<C>(entity);
        self.events.push(WorldEvent::ComponentRemoved {
            entity,
            component: id,
        });
        self.pools[id.index()].discard(entity);
        self.masks[entity.index as usize].clear(id);
        trace!("Removed `{}` from {entity}", type_name::<C>());
    }

    fn expect_id<C: Component>(&self, entity: Entity) -> ComponentId {
        match self.registry.id::<C>() {
            Some(id) if self.masks[entity.index as usize].contains(id) => id,
            _ => panic!("entity {entity} has no `{}` component", type_name::<C>()),
        }
    }

    /// # Panics
    /// If the entity is stale or has no `C`.
    pub fn get_component<C: Component>(&self, entity: Entity) -> &C {
        self.assert_alive(entity);
        let id = self.expect_id::<C>(entity);
        downcast_pool::<C>(self.pools[id.index()].as_ref())
            .storage
            .get(entity.index)
            .unwrap_or_else(|| panic!("`{}` slot {entity} is empty", type_name::<C>()))
    }

    /// # Panics
    /// If the entity is stale or has no `C`.
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> &mut C {
        self.assert_alive(entity);
        let id = self.expect_id::<C>(entity);
        downcast_pool_mut::<C>(self.pools[id.index()].as_mut())
            .storage
            .get_mut(entity.index)
            .unwrap_or_else(|| panic!("`{}` slot {entity} is empty", type_name::<C>()))
    }

    /// Like [`World::get_component`] but returns `None` instead of panicking.
    pub fn try_get_component<C: Component>(&self, entity: Entity) -> Option<&C> {
        if !self.has_component::<C>(entity) {
            return None;
        }
        let id = self.registry.id::<C>()?;
        downcast_pool::<C>(self.pools[id.index()].as_ref())
            .storage
            .get(entity.index)
    }

    pub fn try_get_component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        if !self.has_component::<C>(entity) {
            return None;
        }
        let id = self.registry.id::<C>()?;
        downcast_pool_mut::<C>(self.pools[id.index()].as_mut())
            .storage
            .get_mut(entity.index)
    }

    /// Check whether a live entity has a component of the given type.
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.registry
            .id::<C>()
            .is_some_and(|id| self.masks[entity.index as usize].contains(id))
    }

    /// The component mask of a live entity (empty for stale handles).
    pub fn component_mask(&self, entity: Entity) -> ComponentMask {
        if self.is_alive(entity) {
            self.masks[entity.index as usize]
        } else {
            ComponentMask::EMPTY
        }
    }

    /// Keep values of `C` destructed by remove/destroy so they can be drained.
    pub fn track_removals<C: Component>(&mut self) {
        let id = self.register::<C>();
        downcast_pool_mut::<C>(self.pools[id.index()].as_mut()).track_removals = true;
    }

    /// Take every tracked `C` removed since the last drain.
    pub fn drain_removed<C: Component>(&mut self) -> Vec<(Entity, C)> {
        match self.registry.id::<C>() {
            Some(id) => std::mem::take(&mut downcast_pool_mut::<C>(self.pools[id.index()].as_mut()).removed),
            None => Vec::new(),
        }
    }

    /// Structural events recorded since the last drain.
    pub fn events(&self) -> &Events<WorldEvent> {
        &self.events
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, WorldEvent> {
        self.events.drain()
    }

    // ---- Queries ----

    /// Query live entities whose mask includes every required component of `Q`.
    ///
    /// Yields `(Entity, Q::Item)` in ascending entity index order.
    ///
    /// # Example
    /// ```ignore
    /// for (entity, (transform, anim)) in world.query::<(&mut Transform, &Animation)>() {
    ///     // ...
    /// }
    /// ```
    ///
    /// # Panics
    /// If `Q` names the same component type twice.
    pub fn query<Q: WorldQuery>(&mut self) -> QueryIter<'_, Q> {
        let mut access = Access::default();
        Q::access(&self.registry, &mut access);
        if let Some(name) = access.conflict {
            panic!("query accesses `{name}` more than once");
        }

        let pools = self.pools.as_mut_ptr();
        QueryIter::new(
            self.entities.iter(),
            &self.masks,
            access.required,
            pools,
            &self.registry,
            access.missing,
        )
    }

    // ---- Resources ----

    /// Insert a singleton resource, returning the previous one.
    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.resources.insert(value)
    }

    pub fn resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn resource_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    pub fn remove_resource<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        self.resources.remove::<T>()
    }

    pub fn contains_resource<T: 'static + Send + Sync>(&self) -> bool {
        self.resources.contains::<T>()
    }

    /// Lift resource `R` out of the world while `f` runs with both, then put it back.
    ///
    /// Returns `None` without calling `f` if the resource is absent.
    pub fn resource_scope<R: 'static + Send + Sync, T>(
        &mut self,
        f: impl FnOnce(&mut World, &mut R) -> T,
    ) -> Option<T> {
        let mut resource = self.resources.remove::<R>()?;
        let result = f(self, &mut resource);
        self.resources.insert(resource);
        Some(result)
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

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Name(String);

    #[test]
    fn create_and_destroy() {
        let mut world = World::new();
        let e = world.create_entity();
        assert!(world.is_alive(e));
        assert_eq!(world.entity_count(), 1);
        world.destroy_entity(e);
        assert!(!world.is_alive(e));
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn stale_handle_after_slot_reuse() {
        let mut world = World::new();
        let e1 = world.create_entity();
        world.add_component(e1, Position { x: 1.0, y: 0.0 });
        world.destroy_entity(e1);

        let e2 = world.create_entity();
        assert_eq!(e2.index(), e1.index());
        assert_ne!(e1, e2);
        assert_eq!(world.check_alive(e1), Err(EcsError::StaleEntity(e1)));
        assert!(world.check_alive(e2).is_ok());
        assert!(!world.has_component::<Position>(e1));
        assert!(!world.has_component::<Position>(e2));
        assert_eq!(world.try_get_component::<Position>(e1), None);
    }

    #[test]
    fn has_tracks_add_and_remove() {
        let mut world = World::new();
        let e = world.create_entity();
        assert!(!world.has_component::<Position>(e));
        world.add_component(e, Position { x: 1.0, y: 2.0 });
        assert!(world.has_component::<Position>(e));
        assert_eq!(world.get_component::<Position>(e), &Position { x: 1.0, y: 2.0 });
        world.remove_component::<Position>(e);
        assert!(!world.has_component::<Position>(e));
        world.add_component(e, Position { x: 3.0, y: 4.0 });
        assert_eq!(world.get_component::<Position>(e).x, 3.0);
    }

    #[test]
    #[should_panic(expected = "already has")]
    fn double_add_panics() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 });
        world.add_component(e, Position { x: 1.0, y: 0.0 });
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn get_missing_panics() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 });
        world.get_component::<Velocity>(e);
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn remove_missing_panics() {
        let mut world = World::new();
        let e = world.create_entity();
        world.remove_component::<Velocity>(e);
    }

    #[test]
    #[should_panic(expected = "stale")]
    fn add_to_stale_entity_panics() {
        let mut world = World::new();
        let e = world.create_entity();
        world.destroy_entity(e);
        world.add_component(e, Name("ghost".into()));
    }

    #[test]
    fn component_mutation() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 });
        world.get_component_mut::<Position>(e).x = 5.0;
        assert_eq!(world.get_component::<Position>(e).x, 5.0);
    }

    #[test]
    fn components_span_chunks() {
        let mut world = World::with_chunk_size(2);
        let entities: Vec<_> = (0..9).map(|_| world.create_entity()).collect();
        for (i, &e) in entities.iter().enumerate() {
            world.add_component(e, Position { x: i as f32, y: 0.0 });
        }
        for (i, &e) in entities.iter().enumerate() {
            assert_eq!(world.get_component::<Position>(e).x, i as f32);
        }
    }

    #[test]
    fn destroy_emits_events_and_clears_components() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 0.0 });
        world.add_component(e, Velocity { dx: 0.0, dy: 1.0 });
        let pos_id = world.component_id::<Position>().unwrap();
        let vel_id = world.component_id::<Velocity>().unwrap();
        let _ = world.drain_events();

        world.destroy_entity(e);
        let events: Vec<_> = world.drain_events().collect();
        assert_eq!(
            events,
            vec![
                WorldEvent::ComponentRemoved { entity: e, component: pos_id },
                WorldEvent::ComponentRemoved { entity: e, component: vel_id },
                WorldEvent::EntityDestroyed(e),
            ]
        );
        assert_eq!(world.query::<(&Position,)>().count(), 0);
    }

    #[test]
    fn tracked_removals_are_drained() {
        let mut world = World::new();
        world.track_removals::<Name>();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, Name("a".into()));
        world.add_component(b, Name("b".into()));

        world.remove_component::<Name>(a);
        world.destroy_entity(b);

        let removed = world.drain_removed::<Name>();
        assert_eq!(removed, vec![(a, Name("a".into())), (b, Name("b".into()))]);
        assert!(world.drain_removed::<Name>().is_empty());
        assert!(world.drain_removed::<Velocity>().is_empty());
    }

    #[test]
    fn query_multi_component() {
        let mut world = World::new();
        let e1 = world.create_entity();
        let e2 = world.create_entity();
        let e3 = world.create_entity();
        world.add_component(e1, Position { x: 1.0, y: 0.0 });
        world.add_component(e1, Velocity { dx: 1.0, dy: 0.0 });
        world.add_component(e2, Position { x: 2.0, y: 0.0 });
        world.add_component(e3, Velocity { dx: 3.0, dy: 0.0 });

        let results: Vec<_> = world.query::<(&Position, &Velocity)>().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, e1);
    }

    #[test]
    fn query_mutates_in_index_order() {
        let mut world = World::new();
        let entities: Vec<_> = (0..5).map(|_| world.create_entity()).collect();
        for &e in &entities {
            world.add_component(e, Position { x: 0.0, y: 0.0 });
            world.add_component(e, Velocity { dx: 2.0, dy: 1.0 });
        }
        world.destroy_entity(entities[3]);
        world.destroy_entity(entities[1]);

        let mut visited = Vec::new();
        for (entity, (pos, vel)) in world.query::<(&mut Position, &Velocity)>() {
            pos.x += vel.dx;
            pos.y += vel.dy;
            visited.push(entity.index());
        }
        assert_eq!(visited, vec![0, 2, 4]);
        assert_eq!(world.get_component::<Position>(entities[4]), &Position { x: 2.0, y: 1.0 });
    }

    #[test]
    fn query_optional() {
        let mut world = World::new();
        let e1 = world.create_entity();
        let e2 = world.create_entity();
        world.add_component(e1, Position { x: 1.0, y: 0.0 });
        world.add_component(e1, Name("one".to_string()));
        world.add_component(e2, Position { x: 2.0, y: 0.0 });

        let results: Vec<_> = world.query::<(&Position, Option<&Name>)>().collect();
        assert_eq!(results.len(), 2);
        let named = results.iter().filter(|(_, (_, n))| n.is_some()).count();
        assert_eq!(named, 1);
    }

    #[test]
    fn query_unregistered_type_is_empty() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 });
        assert_eq!(world.query::<(&Position, &Velocity)>().count(), 0);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn aliasing_query_panics() {
        let mut world = World::new();
        world.register::<Position>();
        let _ = world.query::<(&mut Position, &Position)>();
    }

    #[test]
    fn resource_scope_lends_resource() {
        let mut world = World::new();
        world.insert_resource(10u32);
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 });

        let out = world.resource_scope(|world, step: &mut u32| {
            world.get_component_mut::<Position>(e).x = *step as f32;
            *step += 1;
            *step
        });
        assert_eq!(out, Some(11));
        assert_eq!(world.resource::<u32>(), Some(&11));
        assert_eq!(world.get_component::<Position>(e).x, 10.0);
        assert_eq!(world.resource_scope(|_, _: &mut String| ()), None);
    }
}
