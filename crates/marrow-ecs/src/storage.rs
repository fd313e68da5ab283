use std::any::Any;

use crate::component::Component;
use crate::entity::Entity;

/// Default number of slots allocated per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Slot-addressed storage that grows a whole chunk at a time.
///
/// Slot `i` always lives at `chunks[i / chunk_size][i % chunk_size]`. Chunks are
/// separately boxed and never reallocated, so a value keeps its address for as
/// long as it stays constructed, no matter how much the storage grows.
pub struct ChunkedStorage<T> {
    chunks: Vec<Box<[Option<T>]>>,
    chunk_size: usize,
    live: usize,
}

impl<T> ChunkedStorage<T> {
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            chunks: Vec::new(),
            chunk_size,
            live: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of addressable slots.
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    /// Grow by whole chunks until at least `slots` slots are addressable.
    pub fn ensure_capacity(&mut self, slots: usize) {
        while self.capacity() < slots {
            let chunk: Box<[Option<T>]> = (0..self.chunk_size).map(|_| None).collect();
            self.chunks.push(chunk);
        }
    }

    fn locate(&self, index: u32) -> (usize, usize) {
        let index = index as usize;
        (index / self.chunk_size, index % self.chunk_size)
    }

    /// Construct `value` in slot `index`.
    ///
    /// # Panics
    /// If the slot is outside capacity or already holds a value.
    pub fn construct(&mut self, index: u32, value: T) -> &mut T {
        let (chunk, offset) = self.locate(index);
        let slot = &mut self.chunks[chunk][offset];
        assert!(slot.is_none(), "slot {index} is already constructed");
        self.live += 1;
        slot.insert(value)
    }

    /// Move the value out of slot `index`, leaving it empty.
    ///
    /// # Panics
    /// If the slot holds no value.
    pub fn destruct(&mut self, index: u32) -> T {
        let (chunk, offset) = self.locate(index);
        let value = self.chunks[chunk][offset]
            .take()
            .unwrap_or_else(|| panic!("slot {index} is not constructed"));
        self.live -= 1;
        value
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        let (chunk, offset) = self.locate(index);
        self.chunks.get(chunk)?[offset].as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        let (chunk, offset) = self.locate(index);
        self.chunks.get_mut(chunk)?[offset].as_mut()
    }

    /// Number of constructed slots.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Per-type pool owned by the world: the chunked slots plus the removal
/// queue used when the type's removals are tracked.
pub(crate) struct Pool<T> {
    pub(crate) storage: ChunkedStorage<T>,
    pub(crate) track_removals: bool,
    pub(crate) removed: Vec<(Entity, T)>,
}

impl<T: Component> Pool<T> {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            storage: ChunkedStorage::new(chunk_size),
            track_removals: false,
            removed: Vec::new(),
        }
    }
}

/// Type-erased pool interface, so the world can destruct components of an
/// entity without knowing their concrete types.
pub(crate) trait ErasedPool: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Destruct the component at the entity's slot, queueing it if tracked.
    fn discard(&mut self, entity: Entity);
}

impl<T: Component> ErasedPool for Pool<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn discard(&mut self, entity: Entity) {
        let value = self.storage.destruct(entity.index());
        if self.track_removals {
            self.removed.push((entity, value));
        }
    }
}
