//! Scene management system
//!
//! Bridges the ECS (gameplay) layer with the batcher (rendering data)
//! layer.
//!
//! ## Architecture
//!
//! ```text
//! ECS World (Gameplay)
//!      ↓
//! Scene Manager (BVH, cull caches, frustum)
//!      ↓
//! Scene Renderer → Instance Batcher
//! ```
//!
//! The Scene Manager:
//! - Syncs transform and renderable changes into the BVH
//! - Answers frustum and ray queries, skipping dead entities
//! - Caches the frustum between frames while the camera is still

pub mod bounds;
pub mod frustum;
pub mod camera;
mod scene_manager;
mod scene_renderer;

#[cfg(test)]
mod tests;

pub use bounds::{Ray, AABB};
pub use frustum::{CullCache, Frustum, FrustumCache, Plane};
pub use camera::Camera;
pub use scene_manager::{SceneManager, UpdateContext};
pub use scene_renderer::{FrameOutcome, SceneRenderer};
