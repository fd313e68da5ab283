use tracing::trace_span;

use crate::world::World;

/// A system that runs to completion over the world once per tick.
pub trait System: Send + Sync {
    fn run(&mut self, world: &mut World);

    /// Name used in trace spans.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Blanket implementation so closures can be used as systems.
impl<F: FnMut(&mut World) + Send + Sync> System for F {
    fn run(&mut self, world: &mut World) {
        (self)(world);
    }
}

/// Systems in registration order. Each one finishes its pass over the world
/// before the next starts, so later systems observe earlier writes in the
/// same tick.
pub struct SystemSchedule {
    systems: Vec<Box<dyn System>>,
}

impl SystemSchedule {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Add a system to the end of the schedule.
    pub fn add_system<S: System + 'static>(&mut self, system: S) {
        self.systems.push(Box::new(system));
    }

    /// Run all systems in order on the given world.
    pub fn run_all(&mut self, world: &mut World) {
        for system in &mut self.systems {
            let _span = trace_span!("system", name = system.name()).entered();
            system.run(world);
        }
    }

    /// System names in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(|system| system.name())
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl Default for SystemSchedule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Height(f32);

    struct Gravity;

    impl System for Gravity {
        fn run(&mut self, world: &mut World) {
            for (_, height) in world.query::<&mut Height>() {
                height.0 -= 1.0;
            }
        }

        fn name(&self) -> &str {
            "gravity"
        }
    }

    /// Records the lowest height it sees.
    fn record_lowest(world: &mut World) {
        let lowest = world
            .query::<&Height>()
            .map(|(_, height)| height.0)
            .fold(f32::INFINITY, f32::min);
        world.insert_resource(lowest);
    }

    #[test]
    fn later_systems_see_earlier_writes() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Height(3.0));

        let mut schedule = SystemSchedule::new();
        schedule.add_system(Gravity);
        schedule.add_system(record_lowest);
        schedule.run_all(&mut world);
        schedule.run_all(&mut world);

        assert_eq!(world.get_component::<Height>(entity).0, 1.0);
        assert_eq!(world.resource::<f32>(), Some(&1.0));
    }

    #[test]
    fn reversed_order_reads_stale_values() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.add_component(entity, Height(3.0));

        let mut schedule = SystemSchedule::new();
        schedule.add_system(record_lowest);
        schedule.add_system(Gravity);
        schedule.run_all(&mut world);

        assert_eq!(world.get_component::<Height>(entity).0, 2.0);
        assert_eq!(world.resource::<f32>(), Some(&3.0));
    }

    #[test]
    fn names_follow_registration_order() {
        let mut schedule = SystemSchedule::new();
        assert!(schedule.is_empty());
        schedule.add_system(Gravity);
        schedule.add_system(|_: &mut World| {});

        let names: Vec<&str> = schedule.names().collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "gravity");
        assert!(names[1].contains("closure"));
    }
}
