use rapier3d::prelude::RigidBodyHandle;

use crate::character_controller::{CharacterController, CollisionFlags};

/// How an entity takes part in the simulation.
#[derive(Debug, Clone)]
pub enum PhysicsBody {
    /// Simulated; the body drives the entity's transform.
    Dynamic(RigidBodyHandle),
    /// Moved by the entity's transform; pushes other bodies.
    Kinematic(RigidBodyHandle),
    /// Moved by its velocity with collision correction.
    Character(CharacterController),
}

/// Links an entity to a body in the [`PhysicsWorld`](crate::PhysicsWorld).
#[derive(Debug, Clone)]
pub struct PhysicsComponent {
    pub body: PhysicsBody,
    /// Result of the last character move.
    pub last_collision: CollisionFlags,
}

impl PhysicsComponent {
    pub fn new(body: PhysicsBody) -> Self {
        Self {
            body,
            last_collision: CollisionFlags::NONE,
        }
    }

    pub fn dynamic(handle: RigidBodyHandle) -> Self {
        Self::new(PhysicsBody::Dynamic(handle))
    }

    pub fn kinematic(handle: RigidBodyHandle) -> Self {
        Self::new(PhysicsBody::Kinematic(handle))
    }

    pub fn character(controller: CharacterController) -> Self {
        Self::new(PhysicsBody::Character(controller))
    }

    pub fn rigid_body(&self) -> Option<RigidBodyHandle> {
        match self.body {
            PhysicsBody::Dynamic(handle) | PhysicsBody::Kinematic(handle) => Some(handle),
            PhysicsBody::Character(_) => None,
        }
    }
}
