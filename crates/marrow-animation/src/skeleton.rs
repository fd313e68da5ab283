use crate::bone::{BoneData, BoneNode};
use crate::error::AnimationError;
use crate::pose::SkeletonPose;

/// Static skeleton: per-bone data plus the bind pose, shared by every
/// animation component that uses the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<BoneData>,
    bind_pose: SkeletonPose,
}

impl Skeleton {
    /// Validate bone ordering and build a skeleton.
    ///
    /// Bone 0 is the root; every other bone's parent must have a lower index.
    pub fn new(bones: Vec<BoneData>, bind_pose: SkeletonPose) -> Result<Self, AnimationError> {
        for (i, node) in bind_pose.bones.iter().enumerate() {
            match (i, node.parent_index) {
                (0, Some(_)) => return Err(AnimationError::RootHasParent),
                (_, Some(parent)) if parent >= i => {
                    return Err(AnimationError::ParentOrder { bone: i, parent })
                }
                _ => {}
            }
        }
        let count = bind_pose.len();
        if let Some(data) = bones.iter().find(|b| b.index >= count) {
            return Err(AnimationError::BoneIndexOutOfRange {
                index: data.index,
                count,
            });
        }
        Ok(Self { bones, bind_pose })
    }

    /// A skeleton with no skinning data, only a bind pose.
    pub fn from_bind_pose(nodes: Vec<BoneNode>) -> Result<Self, AnimationError> {
        Self::new(Vec::new(), SkeletonPose::new(nodes))
    }

    pub fn bones(&self) -> &[BoneData] {
        &self.bones
    }

    pub fn bind_pose(&self) -> &SkeletonPose {
        &self.bind_pose
    }

    pub fn bone_count(&self) -> usize {
        self.bind_pose.len()
    }

    pub fn find_bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::BoneTransform;
    use glam::Mat4;

    fn node(parent: Option<usize>) -> BoneNode {
        BoneNode::new(BoneTransform::IDENTITY, parent)
    }

    #[test]
    fn accepts_topological_order() {
        let skeleton = Skeleton::new(
            vec![BoneData {
                name: "hip".into(),
                index: 1,
                inverse_bind_transform: Mat4::IDENTITY,
            }],
            SkeletonPose::new(vec![node(None), node(Some(0)), node(Some(0)), node(Some(2))]),
        )
        .unwrap();
        assert_eq!(skeleton.bone_count(), 4);
        assert_eq!(skeleton.find_bone("hip").map(|b| b.index), Some(1));
    }

    #[test]
    fn rejects_forward_parent() {
        let err = Skeleton::from_bind_pose(vec![node(None), node(Some(2)), node(Some(0))]).unwrap_err();
        assert_eq!(err, AnimationError::ParentOrder { bone: 1, parent: 2 });
    }

    #[test]
    fn rejects_parented_root() {
        let err = Skeleton::from_bind_pose(vec![node(Some(0))]).unwrap_err();
        assert_eq!(err, AnimationError::RootHasParent);
    }

    #[test]
    fn rejects_out_of_range_bone_data() {
        let err = Skeleton::new(
            vec![BoneData {
                name: "ghost".into(),
                index: 3,
                inverse_bind_transform: Mat4::IDENTITY,
            }],
            SkeletonPose::new(vec![node(None)]),
        )
        .unwrap_err();
        assert_eq!(err, AnimationError::BoneIndexOutOfRange { index: 3, count: 1 });
    }
}
