use crate::component::ComponentId;
use crate::entity::Entity;

/// Structural changes recorded by the [`World`](crate::World) as they happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    ComponentAdded {
        entity: Entity,
        component: ComponentId,
    },
    ComponentRemoved {
        entity: Entity,
        component: ComponentId,
    },
    EntityDestroyed(Entity),
}

/// A queue of events, appended to synchronously and drained by whoever owns
/// the reaction at a defined point of the frame.
#[derive(Debug, Clone)]
pub struct Events<E> {
    queue: Vec<E>,
}

impl<E> Events<E> {
    pub fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub fn push(&mut self, event: E) {
        self.queue.push(event);
    }

    /// Take every pending event, oldest first.
    pub fn drain(&mut self) -> std::vec::Drain<'_, E> {
        self.queue.drain(..)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<E> Default for Events<E> {
    fn default() -> Self {
        Self::new()
    }
}
