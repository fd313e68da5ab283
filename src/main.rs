//! Marrow - entity/scene/animation simulation core
//!
//! Runs a small headless demo scene for the configured number of frames.

mod engine;
mod settings;

use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Quat, Vec3};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use marrow_animation::{
    AnimationChannel, AnimationClip, AnimationComponent, BoneData, BoneNode, BoneTransform, Keyframe,
    Skeleton, SkeletonPose,
};
use marrow_physics::{CharacterController, PhysicsComponent};
use marrow_scene::{HierarchyComponent, TransformComponent};

use crate::engine::Engine;
use crate::settings::EngineSettings;

/// Three-bone arm hanging from the origin.
fn arm_skeleton() -> Result<Skeleton> {
    let offsets = [Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
    let mut nodes = Vec::new();
    let mut bones = Vec::new();
    let mut model = Vec3::ZERO;
    for (i, offset) in offsets.into_iter().enumerate() {
        model += offset;
        nodes.push(BoneNode::new(BoneTransform::new(offset, Quat::IDENTITY), i.checked_sub(1)));
        bones.push(BoneData {
            name: format!("arm_{i}"),
            index: i,
            inverse_bind_transform: Mat4::from_translation(-model),
        });
    }
    Ok(Skeleton::new(bones, SkeletonPose::new(nodes))?)
}

/// Elbow swings 90 degrees and back over two seconds.
fn wave_clip() -> Result<AnimationClip> {
    let elbow = AnimationChannel::new(
        1,
        vec![Keyframe::new(0.0, Vec3::new(0.0, 1.0, 0.0))],
        vec![
            Keyframe::new(0.0, Quat::IDENTITY),
            Keyframe::new(1.0, Quat::from_rotation_z(90f32.to_radians())),
            Keyframe::new(2.0, Quat::IDENTITY),
        ],
    )?;
    Ok(AnimationClip::new("wave", 2.0, vec![elbow])?)
}

fn build_demo(engine: &mut Engine) -> Result<()> {
    let skeleton = Arc::new(arm_skeleton()?);
    let clip = Arc::new(wave_clip()?);
    clip.validate_against(&skeleton)?;

    let (actor, actor_node) = engine.spawn(None, Some(TransformComponent::from_position(Vec3::new(0.0, 0.0, -5.0))))?;
    let mut animation = AnimationComponent::new(skeleton.clone());
    let mut parent = actor_node;
    for bone in 0..skeleton.bone_count() {
        let (entity, node) = engine.spawn(Some(parent), None)?;
        animation.bind_bone_entity(bone, entity);
        parent = node;
    }
    animation.play(clip);
    engine.world_mut().add_component(actor, animation);

    let (ball, _) = engine.spawn(None, Some(TransformComponent::from_position(Vec3::new(2.0, 8.0, 0.0))))?;
    let (walker, _) = engine.spawn(None, Some(TransformComponent::default()))?;
    let (ball_body, controller) = engine.with_physics(|_, physics| {
        physics.create_ground(0.0);
        let body = physics.add_dynamic_ball(Vec3::new(2.0, 8.0, 0.0), 0.5);
        let mut controller = CharacterController::new();
        controller.spawn(physics, Vec3::new(-2.0, 0.0, 0.0));
        controller.set_velocity(Vec3::new(1.0, 0.0, 0.0));
        physics.update_queries();
        (body, controller)
    })?;
    let world = engine.world_mut();
    world.add_component(ball, PhysicsComponent::dynamic(ball_body));
    world.add_component(walker, PhysicsComponent::character(controller));

    engine.validate()?;
    Ok(())
}

fn main() -> Result<()> {
    let settings = EngineSettings::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Marrow simulation...");
    if EngineSettings::settings_path().is_some_and(|path| !path.exists()) {
        if let Err(e) = settings.save() {
            warn!("Failed to write default settings: {}", e);
        }
    }

    let mut engine = Engine::new(&settings);
    build_demo(&mut engine)?;

    for _ in 0..settings.simulation.frames {
        engine.step(settings.simulation.frame_delta);
    }

    for (entity, hierarchy) in engine.world_mut().query::<&HierarchyComponent>() {
        info!("{entity}: {}", hierarchy.world_position());
    }
    info!(
        "Simulated {} frames ({:.2}s), {} scene nodes, {} events last frame",
        settings.simulation.frames,
        engine.time().map_or(0.0, |t| t.total_time),
        engine.scene().map_or(0, |scene| scene.len()),
        engine.world_events().len() + engine.scene_events().len()
    );
    Ok(())
}
