//! Spatial partitioning data structures
//!
//! Provides the bounding volume hierarchy used for frustum queries and ray
//! casting over renderable entities.

mod bvh;

pub use bvh::{Bvh, BvhError, BvhNode, BvhResult, NodeKind, DEFAULT_RAY_STACK_CAPACITY};
