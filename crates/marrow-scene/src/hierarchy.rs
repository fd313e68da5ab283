//! Absolute transform propagation down the scene graph.

use glam::Mat4;
use marrow_ecs::{Entity, System, World};
use tracing::{trace, warn};

use crate::graph::{NodeId, SceneGraph};
use crate::transform::TransformComponent;

/// Cached absolute (world) transform of an entity.
///
/// Written only by [`HierarchySystem`]; everything else reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyComponent {
    abs_transform: Mat4,
    /// Absolute transform of the nearest ancestor, as composed last pass.
    parent_transform: Mat4,
    /// Whether the entity contributed a local transform last pass.
    had_transform: bool,
    changed: bool,
}

impl Default for HierarchyComponent {
    fn default() -> Self {
        Self {
            abs_transform: Mat4::IDENTITY,
            parent_transform: Mat4::IDENTITY,
            had_transform: false,
            changed: true,
        }
    }
}

impl HierarchyComponent {
    pub fn abs_transform(&self) -> Mat4 {
        self.abs_transform
    }

    /// The matrix this entity's local transform was composed onto.
    ///
    /// Maps parent space to world space; its inverse brings world poses
    /// back into the space of the entity's [`TransformComponent`].
    pub fn parent_transform(&self) -> Mat4 {
        self.parent_transform
    }

    /// World-space position of the entity.
    pub fn world_position(&self) -> glam::Vec3 {
        self.abs_transform.w_axis.truncate()
    }

    /// Whether the last hierarchy pass recomputed this transform.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

/// Walks the scene graph from the root and writes each node's absolute transform.
///
/// Composition follows glam's column-vector convention: a child's absolute
/// matrix is `parent_absolute * child_local`. Nodes whose entity has no
/// [`TransformComponent`] pass their parent's transform through unchanged.
/// A subtree is only recomputed when some transform on its path is dirty or
/// the tree above it was edited; otherwise the cached matrices are kept.
#[derive(Debug, Default)]
pub struct HierarchySystem;

struct Pending {
    node: NodeId,
    parent_abs: Mat4,
    parent_dirty: bool,
}

impl HierarchySystem {
    pub fn new() -> Self {
        Self
    }

    /// Run one propagation pass over `scene`.
    pub fn update(world: &mut World, scene: &mut SceneGraph) {
        let mut stack = vec![Pending {
            node: scene.root(),
            parent_abs: Mat4::IDENTITY,
            parent_dirty: false,
        }];
        let mut recomputed = 0usize;

        while let Some(Pending {
            node,
            parent_abs,
            parent_dirty,
        }) = stack.pop()
        {
            let Some(entity) = scene.entity(node) else {
                continue;
            };
            let moved = scene.take_moved(node);

            let (abs, dirty) = if world.is_alive(entity) {
                Self::resolve(world, entity, parent_abs, parent_dirty || moved)
            } else {
                warn!("Scene node {node:?} wraps stale entity {entity}; passing through");
                (parent_abs, true)
            };
            if dirty {
                recomputed += 1;
            }

            for child in scene.children(node) {
                stack.push(Pending {
                    node: child,
                    parent_abs: abs,
                    parent_dirty: dirty,
                });
            }
        }
        trace!("Hierarchy pass recomputed {recomputed} of {} nodes", scene.len());
    }

    /// Compute and store one node's absolute transform.
    ///
    /// Returns the value handed to its children and whether it changed.
    fn resolve(world: &mut World, entity: Entity, parent_abs: Mat4, parent_dirty: bool) -> (Mat4, bool) {
        let local = world
            .try_get_component_mut::<TransformComponent>(entity)
            .map(|t| {
                let dirty = t.take_pending();
                (t.matrix(), dirty)
            });
        let has_transform = local.is_some();

        let fresh = !world.has_component::<HierarchyComponent>(entity);
        if fresh {
            world.add_component(entity, HierarchyComponent::default());
        }
        let hierarchy = world.get_component_mut::<HierarchyComponent>(entity);

        let dirty = fresh
            || parent_dirty
            || hierarchy.had_transform != has_transform
            || local.is_some_and(|(_, dirty)| dirty);

        if dirty {
            hierarchy.abs_transform = match local {
                Some((matrix, _)) => parent_abs * matrix,
                None => parent_abs,
            };
        }
        hierarchy.parent_transform = parent_abs;
        hierarchy.had_transform = has_transform;
        hierarchy.changed = dirty;
        (hierarchy.abs_transform, dirty)
    }
}

impl System for HierarchySystem {
    fn run(&mut self, world: &mut World) {
        let ran = world.resource_scope(|world, scene: &mut SceneGraph| Self::update(world, scene));
        if ran.is_none() {
            warn!("HierarchySystem ran without a SceneGraph resource");
        }
    }

    fn name(&self) -> &str {
        "hierarchy"
    }
}
