use glam::{Mat4, Quat, Vec3};
use marrow_ecs::Entity;
use serde::{Deserialize, Serialize};

/// Translation and rotation of one bone, relative to its parent unless the
/// owning pose has been converted to model space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Both parts multiplied by `weight`. The rotation is no longer unit length.
    pub fn scaled(self, weight: f32) -> Self {
        Self {
            translation: self.translation * weight,
            rotation: self.rotation * weight,
        }
    }

    /// Add a weighted contribution, flipping its rotation onto the same
    /// hemisphere as the running sum first.
    pub fn accumulate(&mut self, other: BoneTransform) {
        self.translation += other.translation;
        let rotation = if self.rotation.dot(other.rotation) < 0.0 {
            -other.rotation
        } else {
            other.rotation
        };
        self.rotation = self.rotation + rotation;
    }

    /// Renormalize the rotation. A degenerate sum falls back to identity.
    pub fn normalized(self) -> Self {
        let rotation = if self.rotation.length_squared() > f32::EPSILON {
            self.rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        Self {
            translation: self.translation,
            rotation,
        }
    }

    /// Apply `local` in the space of `self`: the parent-then-child composition.
    pub fn compose(self, local: BoneTransform) -> Self {
        Self {
            translation: self.translation + self.rotation * local.translation,
            rotation: self.rotation * local.rotation,
        }
    }

    pub fn to_mat4(self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }
}

/// Static per-bone data loaded with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneData {
    pub name: String,
    /// Position of this bone in the pose arrays.
    pub index: usize,
    /// Model space to bone space at bind time.
    pub inverse_bind_transform: Mat4,
}

/// One bone of a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneNode {
    /// Entity that mirrors this bone's transform, if any.
    pub entity: Option<Entity>,
    pub transform: BoneTransform,
    /// Parent bone, always at a lower index. `None` for the root.
    pub parent_index: Option<usize>,
}

impl BoneNode {
    pub fn new(transform: BoneTransform, parent_index: Option<usize>) -> Self {
        Self {
            entity: None,
            transform,
            parent_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_flips_to_shortest_path() {
        let q = Quat::from_rotation_y(0.3);
        let mut sum = BoneTransform::new(Vec3::X, q).scaled(0.5);
        sum.accumulate(BoneTransform::new(Vec3::X, -q).scaled(0.5));
        let blended = sum.normalized();
        assert!(blended.rotation.abs_diff_eq(q, 1e-5));
        assert!(blended.translation.abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn compose_applies_parent_rotation_to_child_offset() {
        let parent = BoneTransform::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_rotation_z(90f32.to_radians()));
        let child = BoneTransform::new(Vec3::X, Quat::IDENTITY);
        let model = parent.compose(child);
        assert!(model.translation.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
        assert!(model.to_mat4().abs_diff_eq(parent.to_mat4() * child.to_mat4(), 1e-5));
    }

    #[test]
    fn degenerate_rotation_normalizes_to_identity() {
        let zero = BoneTransform::new(Vec3::ZERO, Quat::IDENTITY).scaled(0.0);
        assert_eq!(zero.normalized().rotation, Quat::IDENTITY);
    }
}
