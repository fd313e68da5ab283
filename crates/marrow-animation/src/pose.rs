use glam::Mat4;
use marrow_core::WEIGHT_EPSILON;

use crate::bone::{BoneData, BoneNode, BoneTransform};

/// A full set of bone transforms, ordered so every parent precedes its children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkeletonPose {
    pub bones: Vec<BoneNode>,
}

impl SkeletonPose {
    pub fn new(bones: Vec<BoneNode>) -> Self {
        Self { bones }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Weighted blend of `poses`, topped up from `bind_pose` when the weights
    /// sum to less than one.
    ///
    /// Weights summing above one are normalized. Rotations are accumulated on
    /// the shortest path and renormalized, so every output rotation is unit
    /// length. Entities and parent links are taken from the first pose.
    ///
    /// # Panics
    /// If `poses` is empty, the weight count differs, or bone counts disagree.
    pub fn blend(poses: &[SkeletonPose], weights: &[f32], bind_pose: &SkeletonPose) -> SkeletonPose {
        assert!(!poses.is_empty(), "pose blend needs at least one pose");
        assert_eq!(
            poses.len(),
            weights.len(),
            "pose blend got {} poses but {} weights",
            poses.len(),
            weights.len()
        );
        let bone_count = poses[0].len();
        for pose in poses.iter().chain(std::iter::once(bind_pose)) {
            assert_eq!(
                pose.len(),
                bone_count,
                "pose blend inputs have mismatched bone counts"
            );
        }

        let total: f32 = weights.iter().sum();
        let factor = if total > 1.0 { 1.0 / total } else { 1.0 };

        let mut result = poses[0].clone();
        for bone in &mut result.bones {
            bone.transform = bone.transform.scaled(weights[0] * factor);
        }

        for (pose, &weight) in poses.iter().zip(weights).skip(1) {
            if weight.abs() <= WEIGHT_EPSILON {
                continue;
            }
            let scale = weight * factor;
            for (out, src) in result.bones.iter_mut().zip(&pose.bones) {
                out.transform.accumulate(src.transform.scaled(scale));
            }
        }

        if total < 1.0 {
            let remaining = 1.0 - total;
            for (out, src) in result.bones.iter_mut().zip(&bind_pose.bones) {
                out.transform.accumulate(src.transform.scaled(remaining));
            }
        }

        for bone in &mut result.bones {
            bone.transform = bone.transform.normalized();
        }
        result
    }

    /// Convert parent-relative transforms into model space in one forward pass.
    ///
    /// # Panics
    /// If a bone's parent does not precede it.
    pub fn to_model_space(&mut self) {
        for i in 1..self.bones.len() {
            let Some(parent) = self.bones[i].parent_index else {
                continue;
            };
            assert!(parent < i, "bone {i} has parent {parent}, which does not precede it");
            let parent_transform = self.bones[parent].transform;
            self.bones[i].transform = parent_transform.compose(self.bones[i].transform);
        }
    }

    /// Per-bone skinning matrices for a model-space pose.
    ///
    /// Entry `i` is `model_space[i] * inverse_bind[i]` for every bone with
    /// [`BoneData`]; bones without it get the identity.
    pub fn to_matrix_palette(&self, bones: &[BoneData]) -> Vec<Mat4> {
        let mut palette = vec![Mat4::IDENTITY; self.bones.len()];
        for data in bones {
            let model: BoneTransform = self.bones[data.index].transform;
            palette[data.index] = model.to_mat4() * data.inverse_bind_transform;
        }
        palette
    }
}
