use crate::entity::Entity;

/// Recoverable ECS conditions. Contract violations (double add, missing
/// component access) panic instead; use the `try_` accessors when absence is expected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error("entity {0} is stale or was never allocated")]
    StaleEntity(Entity),
}
