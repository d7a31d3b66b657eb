//! Entity-Component-System implementation
//!
//! A minimal ECS covering what the visibility pipeline consumes: entity
//! liveness, transforms, renderables, and a per-frame change set.

pub mod world;
pub mod entity;
pub mod change_set;
pub mod components;
pub mod system;
pub mod systems;

pub use world::World;
pub use entity::Entity;
pub use change_set::{ChangeFlags, ChangeSet};
pub use components::{RenderableComponent, RenderSpace, TransformComponent};
pub use system::System;
pub use systems::TransformSystem;
