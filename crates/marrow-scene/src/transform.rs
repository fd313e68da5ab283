//! Local transform component with a cached matrix.

use glam::{Mat4, Quat, Vec3};
use marrow_core::{euler_degrees_to_quat, quat_to_euler_degrees};
use serde::{Deserialize, Serialize};

/// Which parts of a [`TransformComponent`] changed since its matrix was cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirtyFlags(u8);

impl DirtyFlags {
    pub const NONE: DirtyFlags = DirtyFlags(0);
    pub const POSITION: DirtyFlags = DirtyFlags(1);
    pub const ROTATION: DirtyFlags = DirtyFlags(1 << 1);
    pub const SCALE: DirtyFlags = DirtyFlags(1 << 2);
    pub const ALL: DirtyFlags = DirtyFlags(0b111);

    pub fn contains(self, other: DirtyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: DirtyFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DirtyFlags {
    type Output = DirtyFlags;

    fn bitor(self, rhs: DirtyFlags) -> DirtyFlags {
        DirtyFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DirtyFlags {
    fn bitor_assign(&mut self, rhs: DirtyFlags) {
        self.0 |= rhs.0;
    }
}

/// Position, Euler rotation in degrees and uniform scale, relative to the parent node.
///
/// Setters mark the matching [`DirtyFlags`]; the local matrix is rebuilt lazily
/// by [`TransformComponent::matrix`]. Rebuilding the cache does not hide an
/// edit from the hierarchy pass: that is tracked by a separate flag which only
/// [`HierarchySystem`](crate::HierarchySystem) consumes. Use
/// [`SceneGraph::propagate_dirty`](crate::SceneGraph::propagate_dirty) to push the
/// bits down to descendants whose world transform depends on this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformComponent {
    position: Vec3,
    /// `(pitch, yaw, roll)` in degrees.
    rotation: Vec3,
    scale: f32,
    #[serde(skip, default = "identity")]
    cache: Mat4,
    #[serde(skip, default = "all_dirty")]
    dirty: DirtyFlags,
    /// Edited since the last hierarchy pass.
    #[serde(skip, default = "pending")]
    pending: bool,
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

fn all_dirty() -> DirtyFlags {
    DirtyFlags::ALL
}

fn pending() -> bool {
    true
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO, 1.0)
    }
}

impl PartialEq for TransformComponent {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

impl TransformComponent {
    pub fn new(position: Vec3, rotation_degrees: Vec3, scale: f32) -> Self {
        Self {
            position,
            rotation: rotation_degrees,
            scale,
            cache: Mat4::IDENTITY,
            dirty: DirtyFlags::ALL,
            pending: true,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO, 1.0)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Rotation as `(pitch, yaw, roll)` degrees.
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn rotation_quat(&self) -> Quat {
        euler_degrees_to_quat(self.rotation)
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_dirty(DirtyFlags::POSITION);
    }

    pub fn set_rotation(&mut self, degrees: Vec3) {
        self.rotation = degrees;
        self.mark_dirty(DirtyFlags::ROTATION);
    }

    pub fn set_rotation_quat(&mut self, rotation: Quat) {
        self.set_rotation(quat_to_euler_degrees(rotation));
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.mark_dirty(DirtyFlags::SCALE);
    }

    /// Translate by the given offset
    pub fn translate(&mut self, offset: Vec3) {
        self.set_position(self.position + offset);
    }

    /// Add Euler degrees to the current rotation.
    pub fn rotate(&mut self, degrees: Vec3) {
        self.set_rotation(self.rotation + degrees);
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Invalidate part of the cache without changing any field.
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
        self.pending = true;
    }

    /// Whether the transform changed since the hierarchy last consumed it.
    pub fn needs_propagation(&self) -> bool {
        self.pending
    }

    /// Clear the propagation flag, returning its previous value.
    pub(crate) fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Build the local matrix from the current fields, ignoring the cache.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation_quat(),
            self.position,
        )
    }

    /// Bring the cached matrix up to date and clear the dirty bits.
    pub fn calculate_cache(&mut self) {
        if self.dirty == DirtyFlags::POSITION {
            self.cache.w_axis = self.position.extend(1.0);
        } else if self.is_dirty() {
            self.cache = self.local_matrix();
        }
        self.dirty = DirtyFlags::NONE;
    }

    /// The local matrix, recomputed only if something changed.
    pub fn matrix(&mut self) -> Mat4 {
        self.calculate_cache();
        self.cache
    }

    /// Forward direction (negative Z in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * -Vec3::Z
    }

    /// Right direction (positive X in local space)
    pub fn right(&self) -> Vec3 {
        self.rotation_quat() * Vec3::X
    }

    /// Up direction (positive Y in local space)
    pub fn up(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transform_is_fully_dirty() {
        let mut t = TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.dirty(), DirtyFlags::ALL);
        let m = t.matrix();
        assert!(!t.is_dirty());
        assert_eq!(m.col(3).truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn setters_mark_independent_bits() {
        let mut t = TransformComponent::default();
        t.calculate_cache();
        t.set_position(Vec3::X);
        assert_eq!(t.dirty(), DirtyFlags::POSITION);
        t.set_scale(2.0);
        assert!(t.dirty().contains(DirtyFlags::POSITION | DirtyFlags::SCALE));
        assert!(!t.dirty().intersects(DirtyFlags::ROTATION));
    }

    #[test]
    fn position_only_update_keeps_rotation_and_scale() {
        let mut t = TransformComponent::new(Vec3::ZERO, Vec3::new(0.0, 90.0, 0.0), 2.0);
        t.calculate_cache();
        t.translate(Vec3::new(0.0, 5.0, 0.0));
        let cached = t.matrix();
        assert!(cached.abs_diff_eq(t.local_matrix(), 1e-5));
    }

    #[test]
    fn cache_matches_fresh_matrix_after_edits() {
        let mut t = TransformComponent::default();
        t.set_rotation(Vec3::new(10.0, 20.0, 30.0));
        t.matrix();
        t.rotate(Vec3::new(0.0, 5.0, 0.0));
        t.set_position(Vec3::new(4.0, 0.0, -1.0));
        assert!(t.matrix().abs_diff_eq(t.local_matrix(), 1e-5));
    }

    #[test]
    fn reading_the_matrix_keeps_propagation_pending() {
        let mut t = TransformComponent::default();
        assert!(t.take_pending());
        t.set_position(Vec3::new(0.0, 7.0, 0.0));
        let _ = t.matrix();
        assert!(!t.is_dirty());
        assert!(t.needs_propagation());
        assert!(t.take_pending());
        assert!(!t.needs_propagation());
    }

    #[test]
    fn yaw_turns_forward() {
        let t = TransformComponent::new(Vec3::ZERO, Vec3::new(0.0, 90.0, 0.0), 1.0);
        assert!(t.forward().abs_diff_eq(-Vec3::X, 1e-5));
        assert!(t.up().abs_diff_eq(Vec3::Y, 1e-5));
    }
}
