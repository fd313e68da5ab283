//! Marrow ECS - Entity Component System
//!
//! Entities are generational indices. Each component type owns one chunked,
//! slot-addressed pool indexed directly by entity slot, and each entity carries
//! a bitmask recording which component types it currently has.

mod component;
mod entity;
mod error;
mod event;
mod query;
mod resource;
mod storage;
mod system;
mod world;

pub use component::{Component, ComponentId, ComponentMask, ComponentRegistry, MAX_COMPONENT_TYPES};
pub use entity::{Entity, EntityIter};
pub use error::EcsError;
pub use event::{Events, WorldEvent};
pub use query::{QueryIter, WorldQuery};
pub use resource::Resources;
pub use storage::{ChunkedStorage, DEFAULT_CHUNK_SIZE};
pub use system::{System, SystemSchedule};
pub use world::World;
