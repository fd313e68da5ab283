//! Keyframe tracks for a single bone.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::bone::BoneTransform;
use crate::error::AnimationError;

/// A timestamped value on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub timestamp: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(timestamp: f32, value: T) -> Self {
        Self { timestamp, value }
    }
}

/// Sampling position within one channel.
///
/// Kept outside the channel so several states can play the same clip
/// without sharing a cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelCursor {
    pub last_pos_index: usize,
    pub last_rot_index: usize,
    pub last_timestamp: f32,
}

impl ChannelCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Position and rotation keyframes driving one bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationChannel {
    bone_index: usize,
    positions: Vec<Keyframe<Vec3>>,
    rotations: Vec<Keyframe<Quat>>,
}

fn is_sorted<T>(keys: &[Keyframe<T>]) -> bool {
    keys.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

impl AnimationChannel {
    /// Build a channel. Position and rotation tracks must both be present or
    /// both be empty, and each must be in time order.
    pub fn new(
        bone_index: usize,
        positions: Vec<Keyframe<Vec3>>,
        rotations: Vec<Keyframe<Quat>>,
    ) -> Result<Self, AnimationError> {
        if positions.is_empty() != rotations.is_empty() {
            return Err(AnimationError::IncompleteChannel {
                bone: bone_index,
                positions: positions.len(),
                rotations: rotations.len(),
            });
        }
        if !is_sorted(&positions) || !is_sorted(&rotations) {
            return Err(AnimationError::UnsortedKeyframes { bone: bone_index });
        }
        Ok(Self {
            bone_index,
            positions,
            rotations,
        })
    }

    pub fn bone_index(&self) -> usize {
        self.bone_index
    }

    /// A channel with no keyframes leaves its bone at the bind pose.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Keyframe<Vec3>] {
        &self.positions
    }

    pub fn rotations(&self) -> &[Keyframe<Quat>] {
        &self.rotations
    }

    /// Timestamp of the last keyframe on either track.
    pub fn end_time(&self) -> f32 {
        let last_pos = self.positions.last().map_or(0.0, |k| k.timestamp);
        let last_rot = self.rotations.last().map_or(0.0, |k| k.timestamp);
        last_pos.max(last_rot)
    }

    /// Sample the bone transform at `timestamp`.
    ///
    /// Scans forward from the cursor, so monotonically increasing timestamps
    /// cost amortized O(1). A timestamp earlier than the previous one resets
    /// the cursor to the start.
    ///
    /// # Panics
    /// If the channel has no keyframes.
    pub fn sample(&self, cursor: &mut ChannelCursor, timestamp: f32) -> BoneTransform {
        assert!(
            !self.positions.is_empty() && !self.rotations.is_empty(),
            "channel for bone {} has no keyframes to sample",
            self.bone_index
        );
        if timestamp < cursor.last_timestamp {
            cursor.reset();
        }
        cursor.last_timestamp = timestamp;

        let translation = sample_track(&self.positions, &mut cursor.last_pos_index, timestamp, |a, b, t| {
            a.lerp(b, t)
        });
        let rotation = sample_track(&self.rotations, &mut cursor.last_rot_index, timestamp, |a, b, t| {
            a.slerp(b, t)
        });
        BoneTransform::new(translation, rotation)
    }
}

/// Find the keyframe pair bracketing `timestamp` and interpolate.
fn sample_track<T: Copy>(
    keys: &[Keyframe<T>],
    cursor: &mut usize,
    timestamp: f32,
    interpolate: impl Fn(T, T, f32) -> T,
) -> T {
    let first = keys[0];
    let last = keys[keys.len() - 1];
    if keys.len() == 1 || timestamp <= first.timestamp {
        return first.value;
    }
    if timestamp >= last.timestamp {
        return last.value;
    }

    let mut i = (*cursor).min(keys.len() - 2);
    if keys[i].timestamp > timestamp {
        i = 0;
    }
    while keys[i + 1].timestamp <= timestamp {
        i += 1;
    }
    *cursor = i;

    let prev = keys[i];
    let next = keys[i + 1];
    let pct = (timestamp - prev.timestamp) / (next.timestamp - prev.timestamp);
    interpolate(prev.value, next.value, pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_key_channel() -> AnimationChannel {
        AnimationChannel::new(
            0,
            vec![
                Keyframe::new(0.0, Vec3::ZERO),
                Keyframe::new(1.0, Vec3::new(2.0, 4.0, 0.0)),
            ],
            vec![
                Keyframe::new(0.0, Quat::IDENTITY),
                Keyframe::new(1.0, Quat::from_rotation_y(90f32.to_radians())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn clamps_outside_range() {
        let channel = two_key_channel();
        let mut cursor = ChannelCursor::default();
        assert_eq!(channel.sample(&mut cursor, -1.0).translation, Vec3::ZERO);
        let end = channel.sample(&mut cursor, 2.0);
        assert_eq!(end.translation, Vec3::new(2.0, 4.0, 0.0));
        assert!(end.rotation.abs_diff_eq(Quat::from_rotation_y(90f32.to_radians()), 1e-6));
    }

    #[test]
    fn midpoint_interpolates() {
        let channel = two_key_channel();
        let mut cursor = ChannelCursor::default();
        let mid = channel.sample(&mut cursor, 0.5);
        assert!(mid.translation.abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
        assert!(mid
            .rotation
            .abs_diff_eq(Quat::from_rotation_y(45f32.to_radians()), 1e-5));
    }

    #[test]
    fn single_keyframe_is_constant() {
        let channel = AnimationChannel::new(
            3,
            vec![Keyframe::new(0.5, Vec3::ONE)],
            vec![Keyframe::new(0.5, Quat::from_rotation_x(1.0))],
        )
        .unwrap();
        let mut cursor = ChannelCursor::default();
        for t in [-3.0, 0.0, 0.5, 10.0] {
            assert_eq!(channel.sample(&mut cursor, t).translation, Vec3::ONE);
        }
    }

    #[test]
    fn rewinding_resets_cursor() {
        let keys: Vec<_> = (0..=10).map(|i| Keyframe::new(i as f32, Vec3::new(i as f32, 0.0, 0.0))).collect();
        let rots: Vec<_> = (0..=10).map(|i| Keyframe::new(i as f32, Quat::IDENTITY)).collect();
        let channel = AnimationChannel::new(0, keys, rots).unwrap();
        let mut cursor = ChannelCursor::default();

        for t in [0.5, 2.25, 7.5, 9.9] {
            assert!((channel.sample(&mut cursor, t).translation.x - t).abs() < 1e-5);
        }
        assert_eq!(cursor.last_pos_index, 9);

        for t in [8.5, 3.25, 1.5, 0.1] {
            assert!((channel.sample(&mut cursor, t).translation.x - t).abs() < 1e-5);
        }
        assert_eq!(cursor.last_pos_index, 0);
    }

    #[test]
    fn independent_cursors_do_not_interfere() {
        let channel = two_key_channel();
        let mut ahead = ChannelCursor::default();
        let mut behind = ChannelCursor::default();
        channel.sample(&mut ahead, 0.9);
        let sample = channel.sample(&mut behind, 0.25);
        assert!(sample.translation.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-6));
        assert_eq!(ahead.last_timestamp, 0.9);
    }

    #[test]
    fn rejects_incomplete_channel() {
        let err = AnimationChannel::new(2, vec![Keyframe::new(0.0, Vec3::ZERO)], Vec::new()).unwrap_err();
        assert_eq!(
            err,
            AnimationError::IncompleteChannel {
                bone: 2,
                positions: 1,
                rotations: 0
            }
        );
    }

    #[test]
    fn rejects_unsorted_keys() {
        let err = AnimationChannel::new(
            0,
            vec![Keyframe::new(1.0, Vec3::ZERO), Keyframe::new(0.0, Vec3::ONE)],
            vec![Keyframe::new(0.0, Quat::IDENTITY)],
        )
        .unwrap_err();
        assert_eq!(err, AnimationError::UnsortedKeyframes { bone: 0 });
    }
}
