//! Marrow Physics - rigid bodies and character controllers using rapier3d
//!
//! The simulation itself is opaque to the rest of the engine. Entities opt in
//! with a [`PhysicsComponent`]; [`PhysicsSystem`] keeps their transforms and
//! the rapier bodies in sync each frame.

mod character_controller;
mod component;
mod system;

pub use character_controller::{CharacterController, CharacterControllerConfig, CollisionFlags};
pub use component::{PhysicsBody, PhysicsComponent};
pub use system::PhysicsSystem;

use glam::{Quat, Vec3};
use nalgebra::{Quaternion, Translation3, Unit, UnitQuaternion};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Most fixed steps taken for one frame; leftover time is dropped.
pub const MAX_SUBSTEPS: u32 = 8;

/// Physics world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity vector (default: -9.81 on Y axis)
    pub gravity: Vec3,
    /// Fixed simulation timestep (default: 1/60)
    pub timestep: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 60.0,
        }
    }
}

/// All rapier simulation state
pub struct PhysicsWorld {
    pub config: PhysicsConfig,

    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,

    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    /// Frame time not yet consumed by fixed steps
    accumulator: f32,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.timestep;

        Self {
            config,
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            accumulator: 0.0,
        }
    }

    /// Run one fixed step of the simulation
    pub fn step(&mut self) {
        let gravity = vector![self.config.gravity.x, self.config.gravity.y, self.config.gravity.z];

        self.physics_pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        self.query_pipeline.update(&self.collider_set);
    }

    /// Consume `dt` seconds of frame time in fixed steps.
    ///
    /// Returns how many steps ran. A non-positive timestep never steps.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !(self.config.timestep > 0.0) {
            warn!("Physics timestep {} is not positive; simulation halted", self.config.timestep);
            return 0;
        }
        self.accumulator += dt.max(0.0);
        let mut steps = 0;
        while self.accumulator >= self.config.timestep && steps < MAX_SUBSTEPS {
            self.accumulator -= self.config.timestep;
            self.step();
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            self.accumulator = 0.0;
        }
        trace!("Physics advanced {steps} steps");
        steps
    }

    /// Refresh the scene query structures without stepping.
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    pub fn add_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.collider_set.insert(collider)
    }

    /// Insert a body with one attached collider.
    pub fn add_body(&mut self, rigid_body: RigidBody, collider: Collider) -> (RigidBodyHandle, ColliderHandle) {
        let rb_handle = self.rigid_body_set.insert(rigid_body);
        let col_handle =
            self.collider_set
                .insert_with_parent(collider, rb_handle, &mut self.rigid_body_set);
        (rb_handle, col_handle)
    }

    /// A dynamic body with a ball collider at `position`.
    pub fn add_dynamic_ball(&mut self, position: Vec3, radius: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y, position.z])
            .build();
        self.add_body(body, ColliderBuilder::ball(radius).build()).0
    }

    /// A position-driven kinematic body with a box collider at `position`.
    pub fn add_kinematic_box(&mut self, position: Vec3, half_extents: Vec3) -> RigidBodyHandle {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build();
        self.add_body(body, collider).0
    }

    /// Remove a rigid body and its colliders
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_set
            .remove(handle, &mut self.island_manager, &mut self.rigid_body_set, true);
    }

    pub fn get_collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.collider_set.get(handle)
    }

    /// World position and rotation of a body.
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<(Vec3, Quat)> {
        self.rigid_body_set
            .get(handle)
            .map(|body| from_isometry(body.position()))
    }

    /// Drive a kinematic body to `position`/`rotation` on the next step.
    pub fn set_kinematic_target(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: Quat) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_next_kinematic_position(to_isometry(position, rotation));
        }
    }

    /// Create a ground plane collider
    pub fn create_ground(&mut self, y: f32) -> ColliderHandle {
        let normal = Unit::new_normalize(vector![0.0, 1.0, 0.0]);
        let ground = ColliderBuilder::halfspace(normal)
            .translation(vector![0.0, y, 0.0])
            .friction(0.7)
            .restitution(0.0)
            .build();
        self.add_static_collider(ground)
    }

    /// Cast a ray and return the first hit and its distance
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(ColliderHandle, f32)> {
        let ray = Ray::new(
            point![origin.x, origin.y, origin.z],
            vector![direction.x, direction.y, direction.z],
        );
        self.query_pipeline.cast_ray(
            &self.rigid_body_set,
            &self.collider_set,
            &ray,
            max_distance,
            true,
            QueryFilter::default(),
        )
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let rotation = UnitQuaternion::new_normalize(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z));
    Isometry::from_parts(Translation3::new(position.x, position.y, position.z), rotation)
}

pub(crate) fn from_isometry(isometry: &Isometry<Real>) -> (Vec3, Quat) {
    let t = isometry.translation.vector;
    let r = isometry.rotation;
    (Vec3::new(t.x, t.y, t.z), Quat::from_xyzw(r.i, r.j, r.k, r.w))
}
