/// Content errors caught when skeletons and clips are constructed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnimationError {
    #[error("root bone must not have a parent")]
    RootHasParent,

    #[error("bone {bone} has parent {parent}, which does not precede it")]
    ParentOrder { bone: usize, parent: usize },

    #[error("bone data index {index} is out of range for {count} bones")]
    BoneIndexOutOfRange { index: usize, count: usize },

    #[error("channel for bone {bone} has {positions} position and {rotations} rotation keyframes")]
    IncompleteChannel {
        bone: usize,
        positions: usize,
        rotations: usize,
    },

    #[error("channel for bone {bone} has keyframes out of time order")]
    UnsortedKeyframes { bone: usize },

    #[error("clip `{clip}` targets bone {bone} but the skeleton has {count} bones")]
    ChannelBoneOutOfRange {
        clip: String,
        bone: usize,
        count: usize,
    },

    #[error("clip duration {0} must be finite and non-negative")]
    InvalidDuration(f32),
}
