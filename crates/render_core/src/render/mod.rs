//! # Rendering Data
//!
//! Everything the visibility pipeline hands to a graphics backend, without
//! the backend itself.
//!
//! ## Architecture
//!
//! - **MeshArena**: one growable vertex buffer and one index buffer shared by every mesh
//! - **InstanceBatcher**: visible set to sorted instances and indirect draws
//! - **FrameSlots**: N-buffered GPU-visible storage for the batcher's output

pub mod material;
pub mod mesh;
pub mod mesh_arena;
pub mod instance_data;
pub mod frame_slots;
pub mod instance_batcher;

pub use material::MaterialId;
pub use mesh::{Mesh, Vertex};
pub use mesh_arena::{ArenaError, ArenaResult, MeshAllocation, MeshArena, MeshId};
pub use instance_data::{
    DrawIndexedIndirectCommand, GpuInstance, InstanceCandidate, MeshInstanceRange,
};
pub use frame_slots::{FrameSlot, FrameSlots, SlotState};
pub use instance_batcher::{
    build_ranges, sort_by_mesh, BatchError, BatchResult, BatchStats, InstanceBatcher,
};
