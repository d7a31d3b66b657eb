//! # Core Module
//!
//! Shared configuration for every subsystem of the crate.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for culling, spatial indexing,
//!   batching and the mesh arena

pub mod config;

// Re-export commonly used config types
pub use config::{
    RenderCoreConfig,
    CullingConfig,
    SpatialConfig,
    BatchingConfig,
    MeshArenaConfig,
    Config,
    ConfigError,
};
