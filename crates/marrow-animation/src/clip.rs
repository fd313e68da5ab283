use serde::{Deserialize, Serialize};

use crate::channel::{AnimationChannel, ChannelCursor};
use crate::error::AnimationError;
use crate::pose::SkeletonPose;
use crate::skeleton::Skeleton;

/// A named set of channels with a fixed playback length in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    channels: Vec<AnimationChannel>,
}

/// Per-channel cursors for one playback of a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipCursor {
    channels: Vec<ChannelCursor>,
}

impl ClipCursor {
    pub fn for_clip(clip: &AnimationClip) -> Self {
        Self {
            channels: vec![ChannelCursor::default(); clip.channels.len()],
        }
    }

    pub fn reset(&mut self) {
        self.channels.iter_mut().for_each(ChannelCursor::reset);
    }
}

impl AnimationClip {
    pub fn new(
        name: impl Into<String>,
        duration: f32,
        channels: Vec<AnimationChannel>,
    ) -> Result<Self, AnimationError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(AnimationError::InvalidDuration(duration));
        }
        Ok(Self {
            name: name.into(),
            duration,
            channels,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    /// Check that every channel targets a bone of `skeleton`.
    pub fn validate_against(&self, skeleton: &Skeleton) -> Result<(), AnimationError> {
        let count = skeleton.bone_count();
        match self.channels.iter().find(|c| c.bone_index() >= count) {
            Some(channel) => Err(AnimationError::ChannelBoneOutOfRange {
                clip: self.name.clone(),
                bone: channel.bone_index(),
                count,
            }),
            None => Ok(()),
        }
    }

    /// Sample every channel at `timestamp` on top of `bind_pose`.
    ///
    /// Bones without a channel, or whose channel is empty, keep their bind
    /// transform. The result is parent-relative.
    ///
    /// # Panics
    /// If a channel targets a bone outside `bind_pose`.
    pub fn sample(&self, cursor: &mut ClipCursor, timestamp: f32, bind_pose: &SkeletonPose) -> SkeletonPose {
        if cursor.channels.len() != self.channels.len() {
            cursor.channels.resize(self.channels.len(), ChannelCursor::default());
        }

        let mut pose = bind_pose.clone();
        for (channel, channel_cursor) in self.channels.iter().zip(&mut cursor.channels) {
            if channel.is_empty() {
                continue;
            }
            let bone = channel.bone_index();
            assert!(
                bone < pose.len(),
                "clip `{}` targets bone {bone} but the pose has {} bones",
                self.name,
                pose.len()
            );
            pose.bones[bone].transform = channel.sample(channel_cursor, timestamp);
        }
        pose
    }
}
