//! # Instance Batcher
//!
//! Turns the visible set of one frame into GPU-ready instance data and one
//! indirect draw per mesh.
//!
//! ## Pipeline
//!
//! 1. **Gather**: world-space candidates come from the BVH frustum query,
//!    screen-space renderables are always taken. With the spatial index
//!    disabled every renderable is scanned instead.
//! 2. **Re-test**: world-space candidates are checked again against the
//!    frustum with their cached world corners.
//! 3. **Sort**: stable sort by mesh id, so each mesh's instances are
//!    contiguous and keep gather order among themselves.
//! 4. **Ranges**: one linear pass records each mesh's instance run.
//! 5. **Emit**: instance records and indirect commands are written into the
//!    frame's slot, growing it if needed.
//!
//! Every check that can fail runs before the slot is cleared, so a rejected
//! frame leaves the slot's previous contents and state as they were.

use crate::core::config::{BatchingConfig, CullingConfig, RenderCoreConfig, MAX_GPU_ADDRESSABLE};
use crate::ecs::{Entity, World};
use crate::foundation::math::Mat4;
use crate::render::frame_slots::{FrameSlot, FrameSlots};
use crate::render::instance_data::{
    DrawIndexedIndirectCommand, GpuInstance, InstanceCandidate, MeshInstanceRange,
};
use crate::render::mesh_arena::{ArenaError, MeshAllocation, MeshArena, MeshId};
use crate::scene::SceneManager;
use crate::spatial::BvhError;
use log::trace;

/// Result type for batching operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while building a frame's batches
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    /// More visible instances than the configured maximum
    #[error("instance capacity exceeded: {requested} > {max}")]
    OutOfCapacity {
        /// Instances the frame needed
        requested: usize,
        /// Configured maximum
        max: usize,
    },

    /// The allocator refused a grown instance buffer
    #[error("failed to allocate {bytes} bytes of instance data")]
    AllocationFailed {
        /// Size of the refused allocation
        bytes: usize,
    },

    /// The frame's slot is still being read by the GPU
    #[error("frame slot {slot} is still in flight for frame {frame}")]
    SlotInFlight {
        /// Slot index
        slot: usize,
        /// Frame the slot was submitted for
        frame: u64,
    },

    /// The batching or culling settings are out of range
    #[error("invalid batching configuration: {0}")]
    InvalidConfig(String),

    /// A renderable refers to a mesh the arena never registered
    #[error("unknown mesh: {0:?}")]
    UnknownMesh(MeshId),

    /// Mesh arena failure
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// Spatial index failure
    #[error(transparent)]
    Traversal(#[from] BvhError),
}

/// Per-frame batching statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Entities gathered before the re-test
    pub candidates: usize,

    /// Instances written
    pub visible: usize,

    /// Candidates rejected by the leaf-level re-test
    pub culled_by_retest: usize,

    /// Indirect commands written, one per mesh with visible instances
    pub draw_commands: usize,

    /// Instance buffer growth events this frame
    pub grow_events: u32,
}

impl BatchStats {
    /// Average instances per draw command
    pub fn avg_instances_per_draw(&self) -> f32 {
        if self.draw_commands == 0 {
            0.0
        } else {
            self.visible as f32 / self.draw_commands as f32
        }
    }
}

/// Builds instance buffers and indirect commands into N-buffered slots
#[derive(Debug)]
pub struct InstanceBatcher {
    slots: FrameSlots,
    culling: CullingConfig,
    candidates: Vec<InstanceCandidate>,
    gathered: Vec<Entity>,
    ranges: Vec<MeshInstanceRange>,
    stats: BatchStats,
}

impl InstanceBatcher {
    /// Create a batcher from the batching and culling settings
    pub fn new(config: &RenderCoreConfig) -> BatchResult<Self> {
        Self::with_config(&config.batching, config.culling.clone())
    }

    /// Create a batcher from explicit settings
    pub fn with_config(batching: &BatchingConfig, culling: CullingConfig) -> BatchResult<Self> {
        batching
            .validate()
            .and_then(|()| culling.validate())
            .map_err(|e| BatchError::InvalidConfig(e.to_string()))?;

        let slots = FrameSlots::new(
            batching.frames_in_flight,
            batching.initial_instance_capacity,
            batching.max_instances,
        )?;

        Ok(Self {
            slots,
            culling,
            candidates: Vec::new(),
            gathered: Vec::new(),
            ranges: Vec::new(),
            stats: BatchStats::default(),
        })
    }

    /// Build the instance buffer and draw list for `frame_index`.
    ///
    /// The scene's frustum must already reflect this frame's camera. An
    /// empty visible set yields an empty draw list.
    pub fn update_instance_buffer(
        &mut self,
        frame_index: u64,
        world: &World,
        scene: &mut SceneManager,
        arena: &MeshArena,
    ) -> BatchResult<&FrameSlot> {
        self.slots.check_writable(frame_index)?;
        self.stats = BatchStats::default();

        self.gather(world, scene);
        sort_by_mesh(&mut self.candidates);
        build_ranges(&self.candidates, arena, &mut self.ranges)?;

        let max_instances = self.slots.max_instances();
        if self.candidates.len() > max_instances {
            return Err(BatchError::OutOfCapacity {
                requested: self.candidates.len(),
                max: max_instances,
            });
        }

        self.slots.begin_write(frame_index)?;
        let slot = self.slots.slot_mut(frame_index);
        if slot.ensure_capacity(self.candidates.len(), max_instances)? {
            self.stats.grow_events += 1;
        }

        for candidate in &self.candidates {
            let allocation = lookup(arena, candidate.mesh)?;
            slot.instances.push(GpuInstance::new(
                &candidate.model,
                &candidate.local_bounds,
                candidate.mesh,
                candidate.material,
                allocation,
            ));
        }
        slot.ranges.clone_from(&self.ranges);
        slot.commands.extend(slot.ranges.iter().map(DrawIndexedIndirectCommand::from_range));

        self.stats.visible = slot.instances.len();
        self.stats.draw_commands = slot.commands.len();
        trace!(
            "Frame {}: {} candidates, {} visible, {} draws",
            frame_index,
            self.stats.candidates,
            self.stats.visible,
            self.stats.draw_commands
        );

        self.slots.finish_write(frame_index);
        Ok(self.slots.slot(frame_index))
    }

    /// Collect visible entities into `self.candidates`
    fn gather(&mut self, world: &World, scene: &mut SceneManager) {
        self.candidates.clear();
        self.gathered.clear();

        let gathered = &mut self.gathered;
        if self.culling.use_spatial_index {
            scene.query_frustum_callback(world, |entity| gathered.push(entity));
            gathered.extend(
                world
                    .renderables()
                    .filter(|(_, renderable)| !renderable.is_world_space())
                    .map(|(entity, _)| entity),
            );
        } else {
            gathered.extend(world.renderables().map(|(entity, _)| entity));
        }
        self.stats.candidates = gathered.len();

        // The scan path has no earlier test, so it always culls here
        let retest = self.culling.retest_candidates || !self.culling.use_spatial_index;

        for &entity in &self.gathered {
            let Some(renderable) = world.renderable(entity) else {
                trace!("Skipping stale candidate {:?}", entity);
                continue;
            };
            if !renderable.should_render() {
                continue;
            }

            let model = if renderable.is_world_space() {
                let Some(model) = world.world_matrix(entity) else {
                    continue;
                };
                if retest && !scene.test_cached(entity, &renderable.local_bounds, model) {
                    self.stats.culled_by_retest += 1;
                    continue;
                }
                *model
            } else {
                world.world_matrix(entity).copied().unwrap_or_else(Mat4::identity)
            };

            self.candidates.push(InstanceCandidate {
                entity,
                mesh: renderable.mesh,
                material: renderable.material,
                model,
                local_bounds: renderable.local_bounds,
            });
        }
    }

    /// Slots, for submission bookkeeping and inspection
    pub fn slots(&self) -> &FrameSlots {
        &self.slots
    }

    /// Record that `frame` was submitted to the GPU
    pub fn mark_submitted(&mut self, frame: u64) {
        self.slots.mark_submitted(frame);
    }

    /// Record that the GPU finished `frame`
    pub fn mark_complete(&mut self, frame: u64) {
        self.slots.mark_complete(frame);
    }

    /// Statistics of the last built frame
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }
}

fn lookup(arena: &MeshArena, mesh: MeshId) -> BatchResult<&MeshAllocation> {
    arena.allocation(mesh).ok_or(BatchError::UnknownMesh(mesh))
}

/// Stable sort by mesh id; candidates sharing a mesh keep their order
pub fn sort_by_mesh(candidates: &mut [InstanceCandidate]) {
    candidates.sort_by_key(|candidate| candidate.mesh);
}

/// One range per run of equal meshes in a mesh-sorted candidate list.
///
/// The ranges are written into `ranges` (cleared first), are pairwise
/// disjoint and cover `candidates` exactly.
pub fn build_ranges(
    candidates: &[InstanceCandidate],
    arena: &MeshArena,
    ranges: &mut Vec<MeshInstanceRange>,
) -> BatchResult<()> {
    ranges.clear();

    for (index, candidate) in candidates.iter().enumerate() {
        if let Some(last) = ranges.last_mut() {
            if last.mesh == candidate.mesh {
                last.count += 1;
                continue;
            }
        }

        let allocation = lookup(arena, candidate.mesh)?;
        let first_instance = u32::try_from(index).map_err(|_| BatchError::OutOfCapacity {
            requested: candidates.len(),
            max: MAX_GPU_ADDRESSABLE,
        })?;
        ranges.push(MeshInstanceRange {
            mesh: candidate.mesh,
            first_instance,
            count: 1,
            index_count: allocation.index_count,
            first_index: allocation.first_index(),
            base_vertex: allocation.base_vertex(),
        });
    }

    Ok(())
}
