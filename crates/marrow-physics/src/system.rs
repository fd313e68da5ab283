use glam::Mat4;
use marrow_core::GameTime;
use marrow_ecs::{System, World};
use marrow_scene::{HierarchyComponent, TransformComponent};
use tracing::{debug, trace, warn};

use crate::component::{PhysicsBody, PhysicsComponent};
use crate::PhysicsWorld;

/// Keeps [`PhysicsComponent`] entities and the physics world in step.
///
/// Each pass, in order: bodies of removed components are released,
/// kinematic bodies take their entity's world transform, characters move by
/// `velocity * dt`, the simulation advances, and dynamic bodies write their
/// pose back to the transform.
///
/// Bodies live in world space while [`TransformComponent`] is relative to the
/// parent node. The parent's absolute matrix comes from the entity's
/// [`HierarchyComponent`], so the hierarchy pass must run first; entities
/// without one are treated as scene roots.
#[derive(Debug, Default)]
pub struct PhysicsSystem;

impl PhysicsSystem {
    pub fn new() -> Self {
        Self
    }

    pub fn update(world: &mut World, physics: &mut PhysicsWorld, dt: f32) {
        world.track_removals::<PhysicsComponent>();
        Self::release_removed(world, physics);

        for (entity, (component, transform, hierarchy)) in
            world.query::<(&mut PhysicsComponent, &mut TransformComponent, Option<&HierarchyComponent>)>()
        {
            let parent = parent_matrix(hierarchy);
            match &mut component.body {
                PhysicsBody::Kinematic(handle) => {
                    let (_, rotation, position) = (parent * transform.local_matrix()).to_scale_rotation_translation();
                    physics.set_kinematic_target(*handle, position, rotation);
                }
                PhysicsBody::Character(controller) => {
                    component.last_collision = controller.update(physics, dt);
                    match world_to_parent(parent) {
                        Some(inverse) => transform.set_position(inverse.transform_point3(controller.position)),
                        None => warn!("Entity {entity} has a degenerate parent transform; character not synced"),
                    }
                }
                PhysicsBody::Dynamic(_) => {}
            }
        }

        physics.advance(dt);

        for (entity, (component, transform, hierarchy)) in
            world.query::<(&PhysicsComponent, &mut TransformComponent, Option<&HierarchyComponent>)>()
        {
            let PhysicsBody::Dynamic(handle) = component.body else {
                continue;
            };
            let Some((position, rotation)) = physics.body_pose(handle) else {
                warn!("Entity {entity} refers to a missing rigid body");
                continue;
            };
            let Some(inverse) = world_to_parent(parent_matrix(hierarchy)) else {
                warn!("Entity {entity} has a degenerate parent transform; body not synced");
                continue;
            };
            let local = inverse * Mat4::from_rotation_translation(rotation, position);
            let (_, rotation, position) = local.to_scale_rotation_translation();
            transform.set_position(position);
            transform.set_rotation_quat(rotation);
        }
        trace!("Physics sync done");
    }

    fn release_removed(world: &mut World, physics: &mut PhysicsWorld) {
        for (entity, component) in world.drain_removed::<PhysicsComponent>() {
            match component.body {
                PhysicsBody::Dynamic(handle) | PhysicsBody::Kinematic(handle) => {
                    physics.remove_rigid_body(handle);
                }
                PhysicsBody::Character(controller) => {
                    if let Some(handle) = controller.collider_handle {
                        physics.remove_collider(handle);
                    }
                }
            }
            debug!("Released physics body of {entity}");
        }
    }
}

fn parent_matrix(hierarchy: Option<&HierarchyComponent>) -> Mat4 {
    hierarchy.map_or(Mat4::IDENTITY, HierarchyComponent::parent_transform)
}

/// Inverse of the parent's absolute matrix, unless it collapses a dimension.
fn world_to_parent(parent: Mat4) -> Option<Mat4> {
    (parent.determinant().abs() > f32::EPSILON).then(|| parent.inverse())
}

impl System for PhysicsSystem {
    fn run(&mut self, world: &mut World) {
        let dt = world.resource::<GameTime>().map_or(0.0, |time| time.delta_time);
        let ran = world.resource_scope(|world, physics: &mut PhysicsWorld| Self::update(world, physics, dt));
        if ran.is_none() {
            warn!("PhysicsSystem ran without a PhysicsWorld resource");
        }
    }

    fn name(&self) -> &str {
        "physics"
    }
}
