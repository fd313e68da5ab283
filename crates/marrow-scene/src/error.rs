use crate::graph::NodeId;

/// Errors from structural scene graph edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("scene node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("the root node cannot be removed or reparented")]
    RootNode,

    #[error("cannot attach {node:?} under its own descendant {parent:?}")]
    Cycle { node: NodeId, parent: NodeId },
}
