//! Arena-backed scene tree.
//!
//! Children are kept as a singly linked list through `first_child` and
//! `next_sibling`. New children are linked at the head, so iteration visits the
//! most recently added child first.

use marrow_ecs::{Entity, Events, World};
use tracing::debug;

use crate::error::SceneError;
use crate::transform::{DirtyFlags, TransformComponent};

/// Stable handle to a node in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Structural edits, queued for whoever reacts to hierarchy changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    NodeAdded { node: NodeId, entity: Entity },
    NodeRemoved { node: NodeId, entity: Entity },
}

#[derive(Debug, Clone)]
struct SceneNode {
    entity: Entity,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    /// Set when the node was attached or moved since the last hierarchy pass.
    moved: bool,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Tree of entities. A node owns its subtree; it only references its entity,
/// so removing nodes never destroys entities.
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    len: usize,
    events: Events<SceneEvent>,
}

impl SceneGraph {
    /// Create a graph whose root node wraps `root_entity`.
    pub fn new(root_entity: Entity) -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(SceneNode {
                    entity: root_entity,
                    parent: None,
                    first_child: None,
                    next_sibling: None,
                    moved: true,
                }),
            }],
            free: Vec::new(),
            root,
            len: 1,
            events: Events::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn expect_node(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.node(id).ok_or(SceneError::UnknownNode(id))
    }

    fn link_mut(&mut self, id: NodeId) -> &mut SceneNode {
        self.node_mut(id)
            .unwrap_or_else(|| panic!("scene link points at missing node {id:?}"))
    }

    pub fn entity(&self, node: NodeId) -> Option<Entity> {
        self.node(node).map(|n| n.entity)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    /// Children of `node`, newest first.
    pub fn children(&self, node: NodeId) -> Children<'_> {
        Children {
            graph: self,
            next: self.node(node).and_then(|n| n.first_child),
        }
    }

    /// Every node below `node` in depth-first order (excluding `node` itself).
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).collect();
        stack.reverse();
        while let Some(id) = stack.pop() {
            out.push(id);
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }
        out
    }

    /// Find the first node wrapping `entity`.
    pub fn find(&self, entity: Entity) -> Option<NodeId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.node
                .as_ref()
                .filter(|n| n.entity == entity)
                .map(|_| NodeId {
                    index: index as u32,
                    generation: slot.generation,
                })
        })
    }

    /// Attach a new node for `entity` as the first child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, entity: Entity) -> Result<NodeId, SceneError> {
        let first_child = self.expect_node(parent)?.first_child;
        let node = SceneNode {
            entity,
            parent: Some(parent),
            first_child: None,
            next_sibling: first_child,
            moved: true,
        };

        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        };

        self.link_mut(parent).first_child = Some(id);
        self.len += 1;
        self.events.push(SceneEvent::NodeAdded { node: id, entity });
        debug!("Scene node {id:?} added for entity {entity} under {parent:?}");
        Ok(id)
    }

    /// Unlink `node` from its parent's child list.
    fn unlink(&mut self, node: NodeId) {
        let (parent, next) = {
            let n = self.link_mut(node);
            (n.parent.take(), n.next_sibling.take())
        };
        let Some(parent) = parent else {
            return;
        };

        let mut cursor = self.link_mut(parent).first_child;
        if cursor == Some(node) {
            self.link_mut(parent).first_child = next;
            return;
        }
        while let Some(current) = cursor {
            let after = self.link_mut(current).next_sibling;
            if after == Some(node) {
                self.link_mut(current).next_sibling = next;
                return;
            }
            cursor = after;
        }
    }

    /// Remove `node` and its whole subtree. The wrapped entities stay alive.
    pub fn remove(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.expect_node(node)?;
        if node == self.root {
            return Err(SceneError::RootNode);
        }
        self.unlink(node);

        let mut doomed = self.descendants(node);
        doomed.insert(0, node);
        for id in doomed {
            let slot = &mut self.slots[id.index as usize];
            if let Some(removed) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                self.len -= 1;
                self.events.push(SceneEvent::NodeRemoved {
                    node: id,
                    entity: removed.entity,
                });
            }
        }
        debug!("Scene node {node:?} removed with its subtree");
        Ok(())
    }

    /// Move `node` (with its subtree) to become the first child of `new_parent`.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        self.expect_node(node)?;
        self.expect_node(new_parent)?;
        if node == self.root {
            return Err(SceneError::RootNode);
        }
        if node == new_parent || self.descendants(node).contains(&new_parent) {
            return Err(SceneError::Cycle {
                node,
                parent: new_parent,
            });
        }

        self.unlink(node);
        let first = self.link_mut(new_parent).first_child;
        let moved = self.link_mut(node);
        moved.parent = Some(new_parent);
        moved.next_sibling = first;
        moved.moved = true;
        self.link_mut(new_parent).first_child = Some(node);
        Ok(())
    }

    /// OR the node's own dirty bits into the transform of every descendant.
    pub fn propagate_dirty(&self, world: &mut World, node: NodeId) {
        let Some(entity) = self.entity(node) else {
            return;
        };
        let Some(flags) = world
            .try_get_component::<TransformComponent>(entity)
            .map(TransformComponent::dirty)
        else {
            return;
        };
        if flags == DirtyFlags::NONE {
            return;
        }
        for id in self.descendants(node) {
            let Some(child) = self.entity(id) else {
                continue;
            };
            if let Some(transform) = world.try_get_component_mut::<TransformComponent>(child) {
                transform.mark_dirty(flags);
            }
        }
    }

    /// Clear and return the moved flag of a node.
    pub(crate) fn take_moved(&mut self, node: NodeId) -> bool {
        self.node_mut(node)
            .map(|n| std::mem::take(&mut n.moved))
            .unwrap_or(false)
    }

    pub fn events(&self) -> &Events<SceneEvent> {
        &self.events
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, SceneEvent> {
        self.events.drain()
    }
}

/// Iterator over a node's children in sibling-list order.
pub struct Children<'a> {
    graph: &'a SceneGraph,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_world() -> (World, SceneGraph) {
        let mut world = World::new();
        let root = world.create_entity();
        (world, SceneGraph::new(root))
    }

    #[test]
    fn children_iterate_newest_first() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let a = graph.add_child(root, world.create_entity()).unwrap();
        let b = graph.add_child(root, world.create_entity()).unwrap();
        let c = graph.add_child(root, world.create_entity()).unwrap();
        assert_eq!(graph.children(root).collect::<Vec<_>>(), vec![c, b, a]);
        assert_eq!(graph.parent(b), Some(root));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn remove_unlinks_head_and_middle() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let a = graph.add_child(root, world.create_entity()).unwrap();
        let b = graph.add_child(root, world.create_entity()).unwrap();
        let c = graph.add_child(root, world.create_entity()).unwrap();
        let d = graph.add_child(root, world.create_entity()).unwrap();

        graph.remove(d).unwrap();
        assert_eq!(graph.children(root).collect::<Vec<_>>(), vec![c, b, a]);
        graph.remove(b).unwrap();
        assert_eq!(graph.children(root).collect::<Vec<_>>(), vec![c, a]);
        graph.remove(a).unwrap();
        assert_eq!(graph.children(root).collect::<Vec<_>>(), vec![c]);
        assert!(!graph.contains(a));
    }

    #[test]
    fn remove_takes_subtree_but_not_entities() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let parent_entity = world.create_entity();
        let child_entity = world.create_entity();
        let parent = graph.add_child(root, parent_entity).unwrap();
        let child = graph.add_child(parent, child_entity).unwrap();
        let _ = graph.drain_events();

        graph.remove(parent).unwrap();
        assert!(!graph.contains(child));
        assert_eq!(graph.len(), 1);
        assert!(world.is_alive(child_entity));

        let events: Vec<_> = graph.drain_events().collect();
        assert_eq!(
            events,
            vec![
                SceneEvent::NodeRemoved { node: parent, entity: parent_entity },
                SceneEvent::NodeRemoved { node: child, entity: child_entity },
            ]
        );
    }

    #[test]
    fn stale_node_ids_are_rejected() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let a = graph.add_child(root, world.create_entity()).unwrap();
        graph.remove(a).unwrap();
        let reused = graph.add_child(root, world.create_entity()).unwrap();
        assert_ne!(a, reused);
        assert_eq!(graph.remove(a), Err(SceneError::UnknownNode(a)));
        assert_eq!(graph.add_child(a, world.create_entity()), Err(SceneError::UnknownNode(a)));
    }

    #[test]
    fn root_cannot_be_removed() {
        let (_world, mut graph) = graph_with_world();
        assert_eq!(graph.remove(graph.root()), Err(SceneError::RootNode));
    }

    #[test]
    fn reparent_moves_subtree_and_rejects_cycles() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let a = graph.add_child(root, world.create_entity()).unwrap();
        let b = graph.add_child(root, world.create_entity()).unwrap();
        let a_child = graph.add_child(a, world.create_entity()).unwrap();

        graph.reparent(a, b).unwrap();
        assert_eq!(graph.parent(a), Some(b));
        assert_eq!(graph.children(root).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.descendants(b), vec![a, a_child]);

        assert_eq!(
            graph.reparent(b, a_child),
            Err(SceneError::Cycle { node: b, parent: a_child })
        );
    }

    #[test]
    fn propagate_dirty_reaches_all_descendants() {
        let (mut world, mut graph) = graph_with_world();
        let root = graph.root();
        let entities: Vec<_> = (0..3).map(|_| world.create_entity()).collect();
        for &e in &entities {
            world.add_component(e, TransformComponent::default()).calculate_cache();
        }
        let top = graph.add_child(root, entities[0]).unwrap();
        let mid = graph.add_child(top, entities[1]).unwrap();
        graph.add_child(mid, entities[2]).unwrap();

        world
            .get_component_mut::<TransformComponent>(entities[0])
            .set_scale(3.0);
        graph.propagate_dirty(&mut world, top);

        for &e in &entities {
            assert_eq!(world.get_component::<TransformComponent>(e).dirty(), DirtyFlags::SCALE);
        }
    }
}
