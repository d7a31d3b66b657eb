//! # Unified Configuration System
//!
//! All tunables of the visibility and batching pipeline in one serializable
//! tree, loadable from TOML or RON through [`Config`].
//!
//! ## Configuration Categories
//!
//! - **Culling**: visibility tolerance and candidate gathering strategy
//! - **Spatial**: BVH ray stack bound and rebuild threshold
//! - **Batching**: frames in flight and instance buffer sizing
//! - **Arena**: mesh arena sizing and growth

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Largest count or byte offset a GPU record can address
pub const MAX_GPU_ADDRESSABLE: usize = u32::MAX as usize;

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(message.to_string()))
}

/// # Culling Configuration
///
/// Controls how visible candidates are gathered and tested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// How far (in world units) a box may lie behind a plane and still count
    /// as visible. Biases borderline boxes towards being drawn.
    pub visibility_tolerance: f32,
    /// Gather world-space candidates through the BVH; when false every
    /// renderable is scanned unconditionally
    pub use_spatial_index: bool,
    /// Re-test BVH candidates against the frustum with their cached corners
    pub retest_candidates: bool,
}

impl CullingConfig {
    /// Set the visibility tolerance
    pub fn with_visibility_tolerance(mut self, tolerance: f32) -> Self {
        self.visibility_tolerance = tolerance;
        self
    }

    /// Enable or disable the spatial index
    pub fn with_spatial_index(mut self, enabled: bool) -> Self {
        self.use_spatial_index = enabled;
        self
    }

    /// Enable or disable the leaf-level re-test
    pub fn with_retest(mut self, enabled: bool) -> Self {
        self.retest_candidates = enabled;
        self
    }

    /// Reject a tolerance that would cull everything or nothing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.visibility_tolerance.is_finite() || self.visibility_tolerance < 0.0 {
            return invalid("visibility tolerance must be a finite non-negative number");
        }
        Ok(())
    }
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            visibility_tolerance: 0.01,
            use_spatial_index: true,
            retest_candidates: true,
        }
    }
}

/// # Spatial Index Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Maximum pending nodes during a ray query
    pub ray_stack_capacity: usize,
    /// Rebuild the BVH when its depth exceeds this factor times log2(leaves)
    pub rebuild_depth_factor: f32,
}

impl SpatialConfig {
    /// Set the ray stack capacity
    pub fn with_ray_stack_capacity(mut self, capacity: usize) -> Self {
        self.ray_stack_capacity = capacity;
        self
    }

    /// Set the rebuild depth factor
    pub fn with_rebuild_depth_factor(mut self, factor: f32) -> Self {
        self.rebuild_depth_factor = factor;
        self
    }

    /// Validate the spatial index settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ray_stack_capacity == 0 {
            return invalid("ray stack capacity must be at least 1");
        }
        if self.rebuild_depth_factor.is_nan() || self.rebuild_depth_factor < 1.0 {
            return invalid("rebuild depth factor must be at least 1");
        }
        Ok(())
    }
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            ray_stack_capacity: crate::spatial::DEFAULT_RAY_STACK_CAPACITY,
            rebuild_depth_factor: 3.0,
        }
    }
}

/// # Batching Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Number of frame slots (N in N-buffering)
    pub frames_in_flight: usize,
    /// Instance capacity each slot starts with
    pub initial_instance_capacity: usize,
    /// Hard upper bound on instances per frame
    pub max_instances: usize,
}

impl BatchingConfig {
    /// Set frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the initial and maximum instance capacity
    pub fn with_instance_capacity(mut self, initial: usize, max: usize) -> Self {
        self.initial_instance_capacity = initial;
        self.max_instances = max;
        self
    }

    /// Validate slot count and instance limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return invalid("frames in flight must be at least 1");
        }
        if self.initial_instance_capacity > self.max_instances {
            return invalid("initial instance capacity exceeds max instances");
        }
        if self.max_instances > MAX_GPU_ADDRESSABLE {
            return invalid("max instances exceeds the u32 range of indirect commands");
        }
        Ok(())
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            initial_instance_capacity: 1024,
            max_instances: 1 << 20,
        }
    }
}

/// # Mesh Arena Configuration
///
/// Sizes apply to the vertex and index buffers independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshArenaConfig {
    /// Initial vertex buffer size in bytes
    pub initial_vertex_bytes: usize,
    /// Initial index buffer size in bytes
    pub initial_index_bytes: usize,
    /// Minimum bytes added by a growth event
    pub growth_increment: usize,
    /// Hard upper bound on each buffer in bytes
    pub max_bytes: usize,
}

impl MeshArenaConfig {
    /// Set initial buffer sizes
    pub fn with_initial_bytes(mut self, vertex_bytes: usize, index_bytes: usize) -> Self {
        self.initial_vertex_bytes = vertex_bytes;
        self.initial_index_bytes = index_bytes;
        self
    }

    /// Set the growth increment
    pub fn with_growth_increment(mut self, bytes: usize) -> Self {
        self.growth_increment = bytes;
        self
    }

    /// Set the hard size limit
    pub fn with_max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    /// Validate buffer sizes against the limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_vertex_bytes > self.max_bytes || self.initial_index_bytes > self.max_bytes {
            return invalid("initial arena size exceeds max bytes");
        }
        if self.max_bytes > MAX_GPU_ADDRESSABLE {
            return invalid("max bytes exceeds the u32 range of GPU offsets");
        }
        Ok(())
    }
}

impl Default for MeshArenaConfig {
    fn default() -> Self {
        Self {
            initial_vertex_bytes: 4 << 20,
            initial_index_bytes: 2 << 20,
            growth_increment: 4 << 20,
            max_bytes: 512 << 20,
        }
    }
}

/// # Complete Render Core Configuration
///
/// Top-level configuration that encompasses all subsystems.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCoreConfig {
    /// Culling configuration
    pub culling: CullingConfig,
    /// Spatial index configuration
    pub spatial: SpatialConfig,
    /// Batching configuration
    pub batching: BatchingConfig,
    /// Mesh arena configuration
    pub arena: MeshArenaConfig,
}

impl RenderCoreConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.culling.validate()?;
        self.spatial.validate()?;
        self.batching.validate()?;
        self.arena.validate()
    }
}

impl Config for RenderCoreConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RenderCoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RenderCoreConfig::new();
        config.batching = config.batching.with_frames_in_flight(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RenderCoreConfig::new();
        config.culling = config.culling.with_visibility_tolerance(-0.5);
        assert!(config.validate().is_err());

        let mut config = RenderCoreConfig::new();
        config.culling = config.culling.with_visibility_tolerance(f32::NAN);
        assert!(config.validate().is_err());

        let mut config = RenderCoreConfig::new();
        config.culling = config.culling.with_visibility_tolerance(f32::INFINITY);
        assert!(config.validate().is_err());

        let mut config = RenderCoreConfig::new();
        config.spatial = config.spatial.with_ray_stack_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_caps_gpu_addressable_sizes() {
        let batching = BatchingConfig::default().with_instance_capacity(16, MAX_GPU_ADDRESSABLE);
        assert!(batching.validate().is_ok());

        let batching =
            BatchingConfig::default().with_instance_capacity(16, MAX_GPU_ADDRESSABLE + 1);
        assert!(matches!(batching.validate(), Err(ConfigError::Invalid(_))));

        let arena = MeshArenaConfig::default().with_max_bytes(MAX_GPU_ADDRESSABLE + 1);
        assert!(arena.validate().is_err());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = RenderCoreConfig::from_toml_str(
            "[culling]\nvisibility_tolerance = 0.25\n\n[batching]\nframes_in_flight = 3\n",
        )
        .unwrap();

        assert_eq!(config.culling.visibility_tolerance, 0.25);
        assert!(config.culling.use_spatial_index);
        assert_eq!(config.batching.frames_in_flight, 3);
        assert_eq!(config.arena, MeshArenaConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RenderCoreConfig {
            spatial: SpatialConfig::default().with_ray_stack_capacity(32),
            ..Default::default()
        };

        let text = config.to_toml_string().unwrap();

        assert_eq!(RenderCoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_ron_file_round_trip() {
        let name = format!("render_core_config_{}.ron", std::process::id());
        let path = std::env::temp_dir().join(name);
        let config = RenderCoreConfig {
            batching: BatchingConfig::default().with_frames_in_flight(3),
            culling: CullingConfig::default().with_retest(false),
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = RenderCoreConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RenderCoreConfig::load_from_file("render_core.json");
        assert!(result.is_err());

        let result = RenderCoreConfig::default().save_to_file("render_core.yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
