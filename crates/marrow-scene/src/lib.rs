//! Marrow Scene - scene graph and transform propagation
//!
//! Entities are arranged in a tree of [`SceneGraph`] nodes. Each frame the
//! [`HierarchySystem`] walks the tree and writes every node's absolute
//! transform into its [`HierarchyComponent`].

mod error;
mod graph;
mod hierarchy;
mod transform;

pub use error::SceneError;
pub use graph::{Children, NodeId, SceneEvent, SceneGraph};
pub use hierarchy::{HierarchyComponent, HierarchySystem};
pub use transform::{DirtyFlags, TransformComponent};
