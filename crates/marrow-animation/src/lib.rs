//! Marrow Animation - skeletal animation sampling and blending
//!
//! Clips are shared, read-only data. Each playing [`AnimationState`] keeps its
//! own sampling cursors, every active state is sampled against the bind pose,
//! and the results are blended into one [`SkeletonPose`] per entity per frame.

mod bone;
mod channel;
mod clip;
mod component;
mod error;
mod pose;
mod skeleton;
mod state;
mod system;

pub use bone::{BoneData, BoneNode, BoneTransform};
pub use channel::{AnimationChannel, ChannelCursor, Keyframe};
pub use clip::{AnimationClip, ClipCursor};
pub use component::{AnimationComponent, PaletteEntry, MAX_ACTIVE_STATES};
pub use error::AnimationError;
pub use pose::SkeletonPose;
pub use skeleton::Skeleton;
pub use state::{AnimationState, TIME_EPSILON};
pub use system::AnimationSystem;
