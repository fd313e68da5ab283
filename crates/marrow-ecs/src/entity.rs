use std::fmt;

/// A generational entity handle: slot index plus the slot's version at creation.
///
/// Two handles are equal only if both index and version match, so a handle
/// kept across a destroy/recreate of the same slot compares unequal and is
/// reported stale by [`World::is_alive`](crate::World::is_alive).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) version: u32,
}

impl Entity {
    /// Create an entity from raw parts (mainly for testing).
    pub fn from_raw(index: u32, version: u32) -> Self {
        Self { index, version }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The version of this entity (incremented each time the slot is freed).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Pack into a 64-bit id: version in the high half, index in the low half.
    pub fn to_bits(&self) -> u64 {
        (u64::from(self.version) << 32) | u64::from(self.index)
    }

    /// Inverse of [`Entity::to_bits`].
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            version: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.version)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.version)
    }
}

/// Allocates and recycles entity slots with version tracking.
///
/// The free list is lazily kept sorted in descending order so that popping
/// yields the lowest free slot and iteration can skip freed slots with a
/// single merge pass.
pub(crate) struct EntityAllocator {
    versions: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    free_sorted: bool,
    len: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            versions: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            free_sorted: true,
            len: 0,
        }
    }

    /// Allocate a new entity, reusing the lowest freed slot if one exists.
    pub fn allocate(&mut self) -> Entity {
        self.len += 1;
        self.sort_free_list();
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            Entity {
                index,
                version: self.versions[index as usize],
            }
        } else {
            let index = self.versions.len() as u32;
            self.versions.push(0);
            self.alive.push(true);
            Entity { index, version: 0 }
        }
    }

    /// Deallocate an entity. Returns `true` if it was alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.alive[idx] = false;
        self.versions[idx] = self.versions[idx].wrapping_add(1);
        if self.free_list.last().is_some_and(|&last| last < entity.index) {
            self.free_sorted = false;
        }
        self.free_list.push(entity.index);
        self.len -= 1;
        true
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.versions[idx] == entity.version
    }

    /// Number of currently alive entities.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn sort_free_list(&mut self) {
        if !self.free_sorted {
            self.free_list.sort_unstable_by(|a, b| b.cmp(a));
            self.free_sorted = true;
        }
    }

    /// Iterate live entities in ascending index order.
    pub fn iter(&mut self) -> EntityIter<'_> {
        self.sort_free_list();
        EntityIter {
            versions: &self.versions,
            free_desc: &self.free_list,
            free_cursor: self.free_list.len(),
            next: 0,
        }
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over live entities, ascending by index.
///
/// Walks every slot and skips the ones present in the sorted free list.
pub struct EntityIter<'a> {
    versions: &'a [u32],
    /// Free slots sorted descending; consumed from the back (ascending).
    free_desc: &'a [u32],
    free_cursor: usize,
    next: u32,
}

impl Iterator for EntityIter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while (self.next as usize) < self.versions.len() {
            let index = self.next;
            self.next += 1;
            if self.free_cursor > 0 && self.free_desc[self.free_cursor - 1] == index {
                self.free_cursor -= 1;
                continue;
            }
            return Some(Entity {
                index,
                version: self.versions[index as usize],
            });
        }
        None
    }
}
