//! Rotation conventions shared by transforms and animation write-back.
//!
//! Rotations authored on entities are Euler angles in degrees, stored as
//! `(pitch, yaw, roll)` in `(x, y, z)`. They are applied roll first, then pitch,
//! then yaw, which is glam's `EulerRot::YXZ` ordering.

use glam::{EulerRot, Quat, Vec3};

/// Weights at or below this are treated as zero by blending code.
pub const WEIGHT_EPSILON: f32 = 1.0e-4;

/// Convert `(pitch, yaw, roll)` degrees into a unit quaternion.
pub fn euler_degrees_to_quat(degrees: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        degrees.y.to_radians(),
        degrees.x.to_radians(),
        degrees.z.to_radians(),
    )
}

/// Convert a quaternion back into `(pitch, yaw, roll)` degrees.
pub fn quat_to_euler_degrees(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.normalize().to_euler(EulerRot::YXZ);
    Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}
