use std::sync::Arc;

use crate::clip::{AnimationClip, ClipCursor};
use crate::pose::SkeletonPose;

/// Gap kept between a non-looping state's clamped timestamp and the clip end.
pub const TIME_EPSILON: f32 = 1.0e-4;

/// One playback of a shared clip: its own timestamp, speed, weight and cursors.
#[derive(Debug, Clone)]
pub struct AnimationState {
    clip: Arc<AnimationClip>,
    cursor: ClipCursor,
    pub timestamp: f32,
    pub timescale: f32,
    pub weight: f32,
    pub looping: bool,
    pub active: bool,
}

impl AnimationState {
    /// An active, looping state at full weight starting from the beginning.
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        let cursor = ClipCursor::for_clip(&clip);
        Self {
            clip,
            cursor,
            timestamp: 0.0,
            timescale: 1.0,
            weight: 1.0,
            looping: true,
            active: true,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_timescale(mut self, timescale: f32) -> Self {
        self.timescale = timescale;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    /// Move the playhead by `dt * timescale`.
    ///
    /// Looping states wrap into `[0, duration)`; others clamp to
    /// `[0, duration - TIME_EPSILON]`.
    pub fn advance(&mut self, dt: f32) {
        if !self.active {
            return;
        }
        let duration = self.clip.duration();
        if duration <= 0.0 {
            self.timestamp = 0.0;
            return;
        }

        let next = self.timestamp + dt * self.timescale;
        self.timestamp = if self.looping {
            next.rem_euclid(duration)
        } else {
            next.clamp(0.0, (duration - TIME_EPSILON).max(0.0))
        };
    }

    /// Restart from the beginning.
    pub fn rewind(&mut self) {
        self.timestamp = 0.0;
        self.cursor.reset();
    }

    /// A non-looping state that reached the end of its clip.
    pub fn is_finished(&self) -> bool {
        !self.looping && self.timestamp >= self.clip.duration() - TIME_EPSILON
    }

    /// Sample the clip at the current timestamp on top of `bind_pose`.
    pub fn sample(&mut self, bind_pose: &SkeletonPose) -> SkeletonPose {
        self.clip.sample(&mut self.cursor, self.timestamp, bind_pose)
    }
}
