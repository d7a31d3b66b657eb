//! ECS Components module
//!
//! Pure data components consumed by the visibility pipeline

pub mod transform;
pub mod renderable;

pub use transform::TransformComponent;
pub use renderable::{RenderableComponent, RenderSpace};
