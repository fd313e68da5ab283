#![allow(private_interfaces)]

use std::any::type_name;
use std::marker::PhantomData;

use crate::component::{Component, ComponentId, ComponentMask, ComponentRegistry};
use crate::entity::{Entity, EntityIter};
use crate::storage::{ErasedPool, Pool};

/// Component access collected from a query type before iteration starts.
#[derive(Default)]
pub(crate) struct Access {
    /// Bits an entity's mask must contain to match.
    pub required: ComponentMask,
    /// Every component touched, required or optional.
    seen: ComponentMask,
    /// A required type was never registered, so nothing can match.
    pub missing: bool,
    /// First component type accessed twice.
    pub conflict: Option<&'static str>,
}

impl Access {
    fn record(&mut self, id: Option<ComponentId>, name: &'static str, required: bool) {
        match id {
            Some(id) => {
                if self.seen.contains(id) && self.conflict.is_none() {
                    self.conflict = Some(name);
                }
                self.seen.set(id);
                if required {
                    self.required.set(id);
                }
            }
            None if required => self.missing = true,
            None => {}
        }
    }
}

/// Trait implemented for query parameter types (`&T`, `&mut T`, `Option<&T>`, tuples).
///
/// # Safety
/// Implementors must report every component they fetch through `access`, so the
/// world can reject queries that would alias a mutable borrow.
pub unsafe trait WorldQuery {
    type Item<'w>;

    fn access(registry: &ComponentRegistry, access: &mut Access);

    /// Fetch the item for an entity slot.
    ///
    /// # Safety
    /// `pools` must point at the world's pool array, which must outlive `'w`,
    /// and no other live reference may alias a component fetched mutably.
    unsafe fn fetch<'w>(
        pools: *mut Box<dyn ErasedPool>,
        registry: &ComponentRegistry,
        index: u32,
    ) -> Option<Self::Item<'w>>;
}

unsafe impl<T: Component> WorldQuery for &T {
    type Item<'w> = &'w T;

    fn access(registry: &ComponentRegistry, access: &mut Access) {
        access.record(registry.id::<T>(), type_name::<T>(), true);
    }

    unsafe fn fetch<'w>(
        pools: *mut Box<dyn ErasedPool>,
        registry: &ComponentRegistry,
        index: u32,
    ) -> Option<Self::Item<'w>> {
        let id = registry.id::<T>()?;
        let pool: &'w Box<dyn ErasedPool> = &*pools.add(id.index());
        pool.as_any().downcast_ref::<Pool<T>>()?.storage.get(index)
    }
}

unsafe impl<T: Component> WorldQuery for &mut T {
    type Item<'w> = &'w mut T;

    fn access(registry: &ComponentRegistry, access: &mut Access) {
        access.record(registry.id::<T>(), type_name::<T>(), true);
    }

    unsafe fn fetch<'w>(
        pools: *mut Box<dyn ErasedPool>,
        registry: &ComponentRegistry,
        index: u32,
    ) -> Option<Self::Item<'w>> {
        let id = registry.id::<T>()?;
        // Each entity is visited once, so slots handed out never overlap.
        let pool: &'w mut Box<dyn ErasedPool> = &mut *pools.add(id.index());
        pool.as_any_mut()
            .downcast_mut::<Pool<T>>()?
            .storage
            .get_mut(index)
    }
}

unsafe impl<T: Component> WorldQuery for Option<&T> {
    type Item<'w> = Option<&'w T>;

    fn access(registry: &ComponentRegistry, access: &mut Access) {
        access.record(registry.id::<T>(), type_name::<T>(), false);
    }

    unsafe fn fetch<'w>(
        pools: *mut Box<dyn ErasedPool>,
        registry: &ComponentRegistry,
        index: u32,
    ) -> Option<Self::Item<'w>> {
        Some(<&T as WorldQuery>::fetch(pools, registry, index))
    }
}

macro_rules! impl_world_query_tuple {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        unsafe impl<$($name: WorldQuery),+> WorldQuery for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);

            fn access(registry: &ComponentRegistry, access: &mut Access) {
                $($name::access(registry, access);)+
            }

            unsafe fn fetch<'w>(
                pools: *mut Box<dyn ErasedPool>,
                registry: &ComponentRegistry,
                index: u32,
            ) -> Option<Self::Item<'w>> {
                Some(($($name::fetch(pools, registry, index)?,)+))
            }
        }
    };
}

impl_world_query_tuple!(A);
impl_world_query_tuple!(A, B);
impl_world_query_tuple!(A, B, C);
impl_world_query_tuple!(A, B, C, D);
impl_world_query_tuple!(A, B, C, D, E);
impl_world_query_tuple!(A, B, C, D, E, F);

/// Iterator returned by `World::query`. Yields `(Entity, Q::Item)` for each
/// live entity whose mask contains the query's required bits.
pub struct QueryIter<'w, Q: WorldQuery> {
    entities: EntityIter<'w>,
    masks: &'w [ComponentMask],
    required: ComponentMask,
    pools: *mut Box<dyn ErasedPool>,
    registry: &'w ComponentRegistry,
    exhausted: bool,
    _marker: PhantomData<fn() -> Q>,
}

impl<'w, Q: WorldQuery> QueryIter<'w, Q> {
    pub(crate) fn new(
        entities: EntityIter<'w>,
        masks: &'w [ComponentMask],
        required: ComponentMask,
        pools: *mut Box<dyn ErasedPool>,
        registry: &'w ComponentRegistry,
        exhausted: bool,
    ) -> Self {
        Self {
            entities,
            masks,
            required,
            pools,
            registry,
            exhausted,
            _marker: PhantomData,
        }
    }
}

impl<'w, Q: WorldQuery> Iterator for QueryIter<'w, Q> {
    type Item = (Entity, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        loop {
            let entity = self.entities.next()?;
            if !self.masks[entity.index() as usize].contains_all(self.required) {
                continue;
            }
            // SAFETY: the query borrows the world mutably for 'w, access was
            // checked for duplicates, and each entity is yielded at most once.
            if let Some(item) = unsafe { Q::fetch(self.pools, self.registry, entity.index()) } {
                return Some((entity, item));
            }
        }
    }
}
