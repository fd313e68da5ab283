//! Character controller using rapier3d's kinematic character controller

use std::ops::{BitOr, BitOrAssign};

use glam::Vec3;
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::prelude::*;

use crate::PhysicsWorld;

/// Smallest translation difference counted as a blocked move.
const BLOCK_EPSILON: f32 = 1.0e-4;

/// Which sides of a character hit something during a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CollisionFlags(u8);

impl CollisionFlags {
    pub const NONE: CollisionFlags = CollisionFlags(0);
    pub const UP: CollisionFlags = CollisionFlags(1 << 0);
    pub const DOWN: CollisionFlags = CollisionFlags(1 << 1);
    pub const SIDES: CollisionFlags = CollisionFlags(1 << 2);

    pub fn contains(self, other: CollisionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Classify a move by comparing what was asked for with what happened.
    pub fn from_movement(desired: Vec3, applied: Vec3, grounded: bool) -> Self {
        let mut flags = Self::NONE;
        if grounded || (desired.y < 0.0 && applied.y > desired.y + BLOCK_EPSILON) {
            flags |= Self::DOWN;
        }
        if desired.y > 0.0 && applied.y < desired.y - BLOCK_EPSILON {
            flags |= Self::UP;
        }
        let desired_flat = Vec3::new(desired.x, 0.0, desired.z);
        let applied_flat = Vec3::new(applied.x, 0.0, applied.z);
        if desired_flat.distance(applied_flat) > BLOCK_EPSILON {
            flags |= Self::SIDES;
        }
        flags
    }
}

impl BitOr for CollisionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CollisionFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Character controller configuration
#[derive(Debug, Clone)]
pub struct CharacterControllerConfig {
    /// Capsule height (default: 1.8m)
    pub height: f32,
    /// Capsule radius (default: 0.4m)
    pub radius: f32,
    /// Maximum slope angle in degrees (default: 45)
    pub max_slope_angle: f32,
    /// Step height for climbing stairs (default: 0.25m)
    pub step_height: f32,
    /// Skin width for collision detection (default: 0.02m)
    pub skin_width: f32,
    pub snap_to_ground: bool,
    pub ground_snap_distance: f32,
}

impl Default for CharacterControllerConfig {
    fn default() -> Self {
        Self {
            height: 1.8,
            radius: 0.4,
            max_slope_angle: 45.0,
            step_height: 0.25,
            skin_width: 0.02,
            snap_to_ground: true,
            ground_snap_distance: 0.2,
        }
    }
}

/// Capsule moved by velocity and collision-corrected against the world.
///
/// `position` is the bottom of the capsule.
#[derive(Debug, Clone)]
pub struct CharacterController {
    pub config: CharacterControllerConfig,
    pub position: Vec3,
    pub velocity: Vec3,
    pub grounded: bool,
    pub collider_handle: Option<ColliderHandle>,
    controller: KinematicCharacterController,
}

impl CharacterController {
    pub fn new() -> Self {
        Self::with_config(CharacterControllerConfig::default())
    }

    pub fn with_config(config: CharacterControllerConfig) -> Self {
        let mut controller = KinematicCharacterController::default();
        controller.max_slope_climb_angle = config.max_slope_angle.to_radians();
        controller.min_slope_slide_angle = config.max_slope_angle.to_radians();
        controller.autostep = Some(CharacterAutostep {
            max_height: CharacterLength::Absolute(config.step_height),
            min_width: CharacterLength::Relative(0.5),
            include_dynamic_bodies: true,
        });
        controller.snap_to_ground = config
            .snap_to_ground
            .then_some(CharacterLength::Absolute(config.ground_snap_distance));
        controller.offset = CharacterLength::Absolute(config.skin_width);

        Self {
            config,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            grounded: false,
            collider_handle: None,
            controller,
        }
    }

    fn collider_center(&self, position: Vec3) -> Vector<Real> {
        vector![position.x, position.y + self.config.height / 2.0, position.z]
    }

    /// Insert the capsule collider with its base at `position`.
    pub fn spawn(&mut self, physics: &mut PhysicsWorld, position: Vec3) -> ColliderHandle {
        self.position = position;

        let half_height = (self.config.height - 2.0 * self.config.radius) / 2.0;
        let collider = ColliderBuilder::capsule_y(half_height.max(0.01), self.config.radius)
            .translation(self.collider_center(position))
            .friction(0.0)
            .restitution(0.0)
            .build();

        let handle = physics.add_static_collider(collider);
        self.collider_handle = Some(handle);
        handle
    }

    /// Move by `desired_translation`, stopping at obstacles.
    ///
    /// Returns which sides were blocked. An unspawned controller does not move.
    pub fn move_character(
        &mut self,
        physics: &mut PhysicsWorld,
        desired_translation: Vec3,
        dt: f32,
    ) -> CollisionFlags {
        let Some(collider_handle) = self.collider_handle else {
            return CollisionFlags::NONE;
        };
        let Some(collider) = physics.collider_set.get(collider_handle) else {
            return CollisionFlags::NONE;
        };

        let center = self.collider_center(self.position);
        let current_pos = Isometry::translation(center.x, center.y, center.z);
        let movement = self.controller.move_shape(
            dt,
            &physics.rigid_body_set,
            &physics.collider_set,
            &physics.query_pipeline,
            collider.shape(),
            &current_pos,
            vector![desired_translation.x, desired_translation.y, desired_translation.z],
            QueryFilter::default().exclude_collider(collider_handle),
            |_| {},
        );

        self.grounded = movement.grounded;
        let applied = Vec3::new(movement.translation.x, movement.translation.y, movement.translation.z);
        self.position += applied;

        let center = self.collider_center(self.position);
        if let Some(collider) = physics.collider_set.get_mut(collider_handle) {
            collider.set_translation(center);
        }
        CollisionFlags::from_movement(desired_translation, applied, self.grounded)
    }

    /// Move by `velocity * dt`.
    pub fn update(&mut self, physics: &mut PhysicsWorld, dt: f32) -> CollisionFlags {
        self.move_character(physics, self.velocity * dt, dt)
    }

    /// Teleport without collision checks.
    pub fn set_position(&mut self, physics: &mut PhysicsWorld, position: Vec3) {
        self.position = position;
        let center = self.collider_center(position);
        if let Some(collider) = self.collider_handle.and_then(|h| physics.collider_set.get_mut(h)) {
            collider.set_translation(center);
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }
}

impl Default for CharacterController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_from_free_movement() {
        let step = Vec3::new(1.0, -0.5, 0.0);
        assert!(CollisionFlags::from_movement(step, step, false).is_empty());
    }

    #[test]
    fn flags_from_blocked_movement() {
        let landed = CollisionFlags::from_movement(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, false);
        assert_eq!(landed, CollisionFlags::DOWN);

        let ceiling = CollisionFlags::from_movement(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.2, 0.0), false);
        assert_eq!(ceiling, CollisionFlags::UP);

        let wall = CollisionFlags::from_movement(Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0), true);
        assert!(wall.contains(CollisionFlags::SIDES | CollisionFlags::DOWN));
        assert!(!wall.contains(CollisionFlags::UP));
    }

    #[test]
    fn unspawned_controller_stays_put() {
        let mut physics = PhysicsWorld::new();
        let mut controller = CharacterController::new();
        let flags = controller.move_character(&mut physics, Vec3::X, 0.1);
        assert_eq!(flags, CollisionFlags::NONE);
        assert_eq!(controller.position, Vec3::ZERO);
    }

    #[test]
    fn teleport_moves_collider() {
        let mut physics = PhysicsWorld::new();
        let mut controller = CharacterController::new();
        let handle = controller.spawn(&mut physics, Vec3::ZERO);
        controller.set_position(&mut physics, Vec3::new(4.0, 0.0, 0.0));
        let center = physics.get_collider(handle).unwrap().translation();
        assert_eq!(center.x, 4.0);
        assert!((center.y - controller.config.height / 2.0).abs() < 1e-6);
    }
}
