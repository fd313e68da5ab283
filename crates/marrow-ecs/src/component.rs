use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

/// Marker trait for types that can be stored as ECS components.
pub trait Component: 'static + Send + Sync {}

/// Blanket implementation: any `'static + Send + Sync` type is a valid component.
impl<T: 'static + Send + Sync> Component for T {}

/// Upper bound on distinct component types per world. Fixed by the width of
/// [`ComponentMask`].
pub const MAX_COMPONENT_TYPES: usize = 128;

/// Stable per-world index of a component type, assigned on first registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u8);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-width set of component types present on an entity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u128);

impl ComponentMask {
    pub const EMPTY: ComponentMask = ComponentMask(0);

    pub fn contains(&self, id: ComponentId) -> bool {
        self.0 & (1u128 << id.0) != 0
    }

    /// Whether every bit of `other` is also set here.
    pub fn contains_all(&self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, id: ComponentId) {
        self.0 |= 1u128 << id.0;
    }

    pub fn clear(&mut self, id: ComponentId) {
        self.0 &= !(1u128 << id.0);
    }

    pub fn with(mut self, id: ComponentId) -> Self {
        self.set(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate set component ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let id = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(ComponentId(id))
        })
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.0)).finish()
    }
}

/// Explicit registry mapping component types to ids. Owned by a [`World`](crate::World),
/// so two worlds never share id assignments.
#[derive(Default)]
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its id. Registering twice returns the same id.
    ///
    /// # Panics
    /// If more than [`MAX_COMPONENT_TYPES`] types are registered.
    pub fn register<T: 'static>(&mut self) -> ComponentId {
        if let Some(&id) = self.ids.get(&TypeId::of::<T>()) {
            return id;
        }
        assert!(
            self.names.len() < MAX_COMPONENT_TYPES,
            "component type limit ({MAX_COMPONENT_TYPES}) exceeded registering `{}`",
            type_name::<T>()
        );
        let id = ComponentId(self.names.len() as u8);
        self.ids.insert(TypeId::of::<T>(), id);
        self.names.push(type_name::<T>());
        debug!("Registered component `{}` as id {}", type_name::<T>(), id.0);
        id
    }

    pub fn id<T: 'static>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Type name of a registered component, for diagnostics.
    pub fn name(&self, id: ComponentId) -> &'static str {
        self.names.get(id.index()).copied().unwrap_or("<unregistered>")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;
    struct Marker<const I: usize, const J: usize>;

    /// Register `Marker<i, j>` for every pair drawn from the two lists.
    macro_rules! register_grid {
        ($registry:ident; [$($i:literal)*] x $cols:tt) => {
            $( register_grid!(@row $registry; $i; $cols); )*
        };
        (@row $registry:ident; $i:literal; [$($j:literal)*]) => {
            $( $registry.register::<Marker<$i, $j>>(); )*
        };
    }

    #[test]
    fn registry_holds_exactly_the_limit() {
        let mut registry = ComponentRegistry::new();
        register_grid!(registry; [0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15] x [0 1 2 3 4 5 6 7]);
        assert_eq!(registry.len(), MAX_COMPONENT_TYPES);
        assert_eq!(registry.id::<Marker<15, 7>>(), Some(ComponentId(127)));
        assert_eq!(registry.register::<Marker<0, 0>>(), ComponentId(0));
    }

    #[test]
    #[should_panic(expected = "component type limit")]
    fn registering_past_the_limit_panics() {
        let mut registry = ComponentRegistry::new();
        register_grid!(registry; [0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15] x [0 1 2 3 4 5 6 7]);
        registry.register::<A>();
    }

    #[test]
    fn ids_are_stable_and_dense() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<A>();
        let b = registry.register::<B>();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.register::<A>(), a);
        assert_eq!(registry.id::<B>(), Some(b));
        assert_eq!(registry.id::<u8>(), None);
    }

    #[test]
    fn mask_set_clear_iter() {
        let mut mask = ComponentMask::EMPTY;
        mask.set(ComponentId(3));
        mask.set(ComponentId(127));
        mask.set(ComponentId(0));
        assert!(mask.contains(ComponentId(127)));
        assert_eq!(mask.count(), 3);
        let ids: Vec<u8> = mask.iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![0, 3, 127]);

        mask.clear(ComponentId(3));
        assert!(!mask.contains(ComponentId(3)));
        assert!(mask.contains_all(ComponentMask::EMPTY.with(ComponentId(0))));
        assert!(!mask.contains_all(ComponentMask::EMPTY.with(ComponentId(5))));
    }
}
