//! Frame driver: owns the world, runs the systems in a fixed order and
//! drains the structural event queues after each frame.

use marrow_animation::{AnimationComponent, AnimationSystem};
use marrow_core::GameTime;
use marrow_ecs::{Entity, System, SystemSchedule, World, WorldEvent};
use marrow_physics::{PhysicsComponent, PhysicsSystem, PhysicsWorld};
use marrow_scene::{HierarchySystem, NodeId, SceneError, SceneEvent, SceneGraph, TransformComponent};
use tracing::{debug, info, trace};

use crate::settings::EngineSettings;

/// Content problems found by [`Engine::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entity {0} has both a physics and an animation component")]
    PhysicsAndAnimation(Entity),

    #[error("engine resource `{0}` is missing")]
    MissingResource(&'static str),
}

/// World plus system schedule.
///
/// Systems run hierarchy, physics, animation, then anything added with
/// [`Engine::add_system`].
pub struct Engine {
    world: World,
    schedule: SystemSchedule,
    world_events: Vec<WorldEvent>,
    scene_events: Vec<SceneEvent>,
}

impl Engine {
    pub fn new(settings: &EngineSettings) -> Self {
        let settings = settings.clone().sanitized();
        let mut world = World::with_chunk_size(settings.ecs.storage_chunk_size);
        let root = world.create_entity();
        world.insert_resource(SceneGraph::new(root));
        world.insert_resource(GameTime::new(settings.time.clone()));
        world.insert_resource(PhysicsWorld::with_config(settings.physics.clone()));
        world.track_removals::<PhysicsComponent>();

        let mut schedule = SystemSchedule::new();
        schedule.add_system(HierarchySystem::new());
        schedule.add_system(PhysicsSystem::new());
        schedule.add_system(AnimationSystem::new().exclusive_with::<PhysicsComponent>());

        info!(
            "Engine ready with systems [{}]",
            schedule.names().collect::<Vec<_>>().join(", ")
        );
        Self {
            world,
            schedule,
            world_events: Vec::new(),
            scene_events: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Append a system after the built-in ones.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.schedule.add_system(system);
    }

    pub fn time(&self) -> Option<&GameTime> {
        self.world.resource::<GameTime>()
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.world.resource::<SceneGraph>()
    }

    /// Run `f` with the world and the scene graph borrowed separately.
    pub fn with_scene<T>(&mut self, f: impl FnOnce(&mut World, &mut SceneGraph) -> T) -> Result<T, ValidationError> {
        self.world
            .resource_scope(f)
            .ok_or(ValidationError::MissingResource("SceneGraph"))
    }

    /// Run `f` with the world and the physics world borrowed separately.
    pub fn with_physics<T>(
        &mut self,
        f: impl FnOnce(&mut World, &mut PhysicsWorld) -> T,
    ) -> Result<T, ValidationError> {
        self.world
            .resource_scope(f)
            .ok_or(ValidationError::MissingResource("PhysicsWorld"))
    }

    /// Create an entity, give it `transform` if any, and attach it under
    /// `parent` (the scene root when `None`).
    pub fn spawn(
        &mut self,
        parent: Option<NodeId>,
        transform: Option<TransformComponent>,
    ) -> anyhow::Result<(Entity, NodeId)> {
        let (entity, node) = self.with_scene(|world, scene| -> Result<_, SceneError> {
            let entity = world.create_entity();
            if let Some(transform) = transform {
                world.add_component(entity, transform);
            }
            let node = scene.add_child(parent.unwrap_or(scene.root()), entity)?;
            Ok((entity, node))
        })??;
        Ok((entity, node))
    }

    /// Reject worlds where two systems would write the same transform.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let conflict = self
            .world
            .query::<(&PhysicsComponent, &AnimationComponent)>()
            .map(|(entity, _)| entity)
            .next();
        match conflict {
            Some(entity) => Err(ValidationError::PhysicsAndAnimation(entity)),
            None => Ok(()),
        }
    }

    /// Advance the clock by `raw_dt` seconds and run one frame.
    pub fn step(&mut self, raw_dt: f32) {
        let frame = match self.world.resource_mut::<GameTime>() {
            Some(time) => {
                time.update(raw_dt);
                time.frame_count
            }
            None => 0,
        };

        self.schedule.run_all(&mut self.world);

        self.world_events.clear();
        self.world_events.extend(self.world.drain_events());
        self.scene_events.clear();
        if let Some(scene) = self.world.resource_mut::<SceneGraph>() {
            self.scene_events.extend(scene.drain_events());
        }
        for event in &self.scene_events {
            debug!("Scene event: {event:?}");
        }
        trace!(
            "Frame {frame}: {} world events, {} scene events",
            self.world_events.len(),
            self.scene_events.len()
        );
    }

    /// World events drained at the end of the last frame.
    pub fn world_events(&self) -> &[WorldEvent] {
        &self.world_events
    }

    /// Scene events drained at the end of the last frame.
    pub fn scene_events(&self) -> &[SceneEvent] {
        &self.scene_events
    }
}
