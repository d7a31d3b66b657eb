//! # Render Core
//!
//! Visibility culling, spatial indexing and draw batching for the engine
//! renderer.
//!
//! ## Features
//!
//! - **Frustum Culling**: plane extraction from the view-projection matrix,
//!   single-corner box tests with per-entity corner caches
//! - **BVH**: flat-array bounding volume hierarchy with incremental refit,
//!   frustum queries and bounded ray casts
//! - **Instance Batching**: visible entities sorted by mesh into one
//!   indirect draw per mesh, written into N-buffered frame slots
//! - **Mesh Arena**: every mesh in one growable vertex and index buffer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_core::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenderCoreConfig::default();
//!     let mut arena = MeshArena::new(&config.arena)?;
//!     let cube = arena.register(&Mesh::cube())?;
//!
//!     let mut world = World::new();
//!     let entity = world.create_entity();
//!     let bounds = Mesh::cube().bounds().ok_or("empty mesh")?;
//!     let position = Vec3::new(0.0, 0.0, 10.0);
//!     world.insert_transform(entity, TransformComponent::from_position(position));
//!     world.insert_renderable(entity, RenderableComponent::new(cube, MaterialId(0), bounds));
//!
//!     let mut scene = SceneManager::new(&config)?;
//!     let mut renderer = SceneRenderer::new(&config)?;
//!     let camera = Camera::default();
//!
//!     let outcome =
//!         renderer.render_frame(&mut world, &mut scene, &arena, &camera, (1280, 720), 0)?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod core;
pub mod config;

pub mod foundation;
pub mod ecs;
pub mod scene;
pub mod spatial;
pub mod render;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        core::config::{Config, RenderCoreConfig},
        foundation::math::{Mat4, Mat4Ext, Transform, Vec3},
        ecs::{Entity, RenderableComponent, RenderSpace, System, TransformComponent, World},
        scene::{
            Camera, FrameOutcome, Frustum, Ray, SceneManager, SceneRenderer, UpdateContext, AABB,
        },
        spatial::{Bvh, BvhError},
        render::{BatchError, InstanceBatcher, MaterialId, Mesh, MeshArena, MeshId},
    };
}
