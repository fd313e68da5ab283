use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use marrow_core::WEIGHT_EPSILON;
use marrow_ecs::Entity;

use crate::clip::AnimationClip;
use crate::pose::SkeletonPose;
use crate::skeleton::Skeleton;
use crate::state::AnimationState;

/// Most states one component can play at once.
pub const MAX_ACTIVE_STATES: usize = 8;

/// One skinning matrix laid out for GPU upload (column major).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PaletteEntry {
    pub matrix: [[f32; 4]; 4],
}

impl From<Mat4> for PaletteEntry {
    fn from(matrix: Mat4) -> Self {
        Self {
            matrix: matrix.to_cols_array_2d(),
        }
    }
}

/// Skeletal animation attached to an entity.
///
/// The skeleton is shared; the bind pose is copied per instance so each
/// instance can bind its own bone entities.
#[derive(Debug, Clone)]
pub struct AnimationComponent {
    skeleton: Arc<Skeleton>,
    bind_pose: SkeletonPose,
    states: Vec<AnimationState>,
    current_pose: SkeletonPose,
    palette: Vec<Mat4>,
}

impl AnimationComponent {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let bind_pose = skeleton.bind_pose().clone();
        let mut component = Self {
            skeleton,
            current_pose: bind_pose.clone(),
            bind_pose,
            states: Vec::new(),
            palette: Vec::new(),
        };
        component.rebuild_palette();
        component
    }

    /// Bind `(bone, entity)` pairs in one go.
    pub fn with_bone_entities(mut self, bindings: impl IntoIterator<Item = (usize, Entity)>) -> Self {
        for (bone, entity) in bindings {
            self.bind_bone_entity(bone, entity);
        }
        self
    }

    /// Mirror bone `bone` onto `entity`'s transform every frame.
    ///
    /// # Panics
    /// If `bone` is outside the skeleton.
    pub fn bind_bone_entity(&mut self, bone: usize, entity: Entity) {
        assert!(
            bone < self.bind_pose.len(),
            "bone {bone} is out of range for a skeleton with {} bones",
            self.bind_pose.len()
        );
        self.bind_pose.bones[bone].entity = Some(entity);
        self.current_pose.bones[bone].entity = Some(entity);
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn bind_pose(&self) -> &SkeletonPose {
        &self.bind_pose
    }

    /// Start playing `clip` as a new looping state at full weight.
    /// Returns the state's index.
    pub fn play(&mut self, clip: Arc<AnimationClip>) -> usize {
        self.play_state(AnimationState::new(clip))
    }

    /// # Panics
    /// If [`MAX_ACTIVE_STATES`] states are already playing.
    pub fn play_state(&mut self, state: AnimationState) -> usize {
        assert!(
            self.states.len() < MAX_ACTIVE_STATES,
            "animation component already has {MAX_ACTIVE_STATES} states"
        );
        self.states.push(state);
        self.states.len() - 1
    }

    /// Remove a state. Later states shift down by one.
    pub fn stop(&mut self, index: usize) -> AnimationState {
        self.states.remove(index)
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn states(&self) -> &[AnimationState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> Option<&AnimationState> {
        self.states.get(index)
    }

    pub fn state_mut(&mut self, index: usize) -> Option<&mut AnimationState> {
        self.states.get_mut(index)
    }

    pub fn set_weight(&mut self, index: usize, weight: f32) {
        self.states[index].weight = weight;
    }

    /// Split unit weight between two states: `from` gets `1 - t`, `to` gets `t`.
    pub fn cross_fade(&mut self, from: usize, to: usize, t: f32) {
        let t = t.clamp(0.0, 1.0);
        self.states[from].weight = 1.0 - t;
        self.states[to].weight = t;
    }

    /// Parent-relative pose from the last evaluation.
    pub fn current_pose(&self) -> &SkeletonPose {
        &self.current_pose
    }

    /// Skinning matrices from the last evaluation, one per bone.
    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    pub fn palette_entries(&self) -> Vec<PaletteEntry> {
        self.palette.iter().copied().map(PaletteEntry::from).collect()
    }

    /// Advance every state by `dt`, blend the results and refresh the palette.
    pub(crate) fn evaluate(&mut self, dt: f32) {
        let mut poses = Vec::with_capacity(self.states.len());
        let mut weights = Vec::with_capacity(self.states.len());
        for state in self.states.iter_mut().filter(|s| s.active) {
            state.advance(dt);
            if state.weight.abs() <= WEIGHT_EPSILON {
                continue;
            }
            poses.push(state.sample(&self.bind_pose));
            weights.push(state.weight);
        }

        self.current_pose = if poses.is_empty() {
            self.bind_pose.clone()
        } else {
            SkeletonPose::blend(&poses, &weights, &self.bind_pose)
        };
        self.rebuild_palette();
    }

    fn rebuild_palette(&mut self) {
        let mut model = self.current_pose.clone();
        model.to_model_space();
        self.palette = model.to_matrix_palette(self.skeleton.bones());
    }
}
