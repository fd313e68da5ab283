use glam::{Quat, Vec3};
use marrow_core::GameTime;
use marrow_ecs::{Component, Entity, System, World};
use marrow_scene::TransformComponent;
use tracing::{trace, warn};

use crate::component::AnimationComponent;

type ConflictCheck = fn(&World, Entity) -> bool;

/// Advances every [`AnimationComponent`] and writes the blended bone-local
/// transforms onto the bones' bound entities.
///
/// Bone output lands in the ordinary [`TransformComponent`] of each bound
/// entity, so the hierarchy and renderer treat it like any other transform.
/// The animated entity's own transform is never touched.
#[derive(Default)]
pub struct AnimationSystem {
    conflicts: Vec<(&'static str, ConflictCheck)>,
}

impl AnimationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip animated entities that also carry `C`, since another system owns
    /// their transform.
    pub fn exclusive_with<C: Component>(mut self) -> Self {
        let check = World::has_component::<C> as ConflictCheck;
        self.conflicts.push((std::any::type_name::<C>(), check));
        self
    }

    /// Run one animation pass with time step `dt`.
    pub fn update(&self, world: &mut World, dt: f32) {
        let animated: Vec<Entity> = world
            .query::<&AnimationComponent>()
            .map(|(entity, _)| entity)
            .collect();

        let mut writes: Vec<(Entity, Vec3, Quat)> = Vec::new();
        for entity in animated {
            if let Some((name, _)) = self.conflicts.iter().find(|(_, check)| check(&*world, entity)) {
                warn!("Entity {entity} has both an animation and `{name}`; skipping animation");
                continue;
            }
            let animation = world.get_component_mut::<AnimationComponent>(entity);
            animation.evaluate(dt);
            writes.extend(animation.current_pose().bones.iter().filter_map(|bone| {
                bone.entity
                    .map(|target| (target, bone.transform.translation, bone.transform.rotation))
            }));
        }

        for (target, position, rotation) in writes {
            if !world.is_alive(target) {
                warn!("Bone entity {target} is stale; dropping its sample");
                continue;
            }
            match world.try_get_component_mut::<TransformComponent>(target) {
                Some(transform) => {
                    transform.set_position(position);
                    transform.set_rotation_quat(rotation);
                }
                None => {
                    let mut transform = TransformComponent::from_position(position);
                    transform.set_rotation_quat(rotation);
                    world.add_component(target, transform);
                }
            }
            trace!("Bone entity {target} -> {position}");
        }
    }
}

impl System for AnimationSystem {
    fn run(&mut self, world: &mut World) {
        let dt = match world.resource::<GameTime>() {
            Some(time) => time.delta_time,
            None => {
                warn!("AnimationSystem ran without a GameTime resource");
                return;
            }
        };
        self.update(world, dt);
    }

    fn name(&self) -> &str {
        "animation"
    }
}
