//! Scene Renderer - drives one frame of the visibility pipeline
//!
//! Runs the scene update, feeds the camera into the frustum cache and asks
//! the instance batcher for the frame's instance buffer and draw list.
//! Submission to a graphics API happens outside this crate; the caller
//! reports it back through [`SceneRenderer::mark_submitted`] and
//! [`SceneRenderer::mark_complete`].

use crate::core::config::RenderCoreConfig;
use crate::ecs::World;
use crate::render::{BatchResult, BatchStats, InstanceBatcher, MeshArena};
use crate::scene::camera::Camera;
use crate::scene::scene_manager::{SceneManager, UpdateContext};
use log::trace;

/// What happened to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The surface has zero area; nothing was touched
    Skipped,
    /// The frame's slot was written
    Rendered {
        /// Frame index
        frame_index: u64,
        /// Slot the frame was written into
        slot: usize,
        /// Scene update summary
        update: UpdateContext,
        /// Batching statistics
        stats: BatchStats,
    },
}

/// Frame driver tying the scene manager to the instance batcher
#[derive(Debug)]
pub struct SceneRenderer {
    batcher: InstanceBatcher,
}

impl SceneRenderer {
    /// Create a renderer from configuration
    pub fn new(config: &RenderCoreConfig) -> BatchResult<Self> {
        Ok(Self {
            batcher: InstanceBatcher::new(config)?,
        })
    }

    /// Build one frame.
    ///
    /// A zero-area `extent` skips the frame wholesale: no scene update, no
    /// slot write.
    pub fn render_frame(
        &mut self,
        world: &mut World,
        scene: &mut SceneManager,
        arena: &MeshArena,
        camera: &Camera,
        extent: (u32, u32),
        frame_index: u64,
    ) -> BatchResult<FrameOutcome> {
        if extent.0 == 0 || extent.1 == 0 {
            trace!("Skipping frame {} for zero-area surface", frame_index);
            return Ok(FrameOutcome::Skipped);
        }

        let mut update = UpdateContext::new(frame_index);
        scene.update(world, &mut update);
        scene.set_camera(&camera.view_matrix(), &camera.projection_matrix());

        self.batcher.update_instance_buffer(frame_index, world, scene, arena)?;

        Ok(FrameOutcome::Rendered {
            frame_index,
            slot: self.batcher.slots().slot_index(frame_index),
            update,
            stats: *self.batcher.stats(),
        })
    }

    /// Batcher, for reading the written slots
    pub fn batcher(&self) -> &InstanceBatcher {
        &self.batcher
    }

    /// Record that `frame` was submitted to the GPU
    pub fn mark_submitted(&mut self, frame: u64) {
        self.batcher.mark_submitted(frame);
    }

    /// Record that the GPU finished `frame`
    pub fn mark_complete(&mut self, frame: u64) {
        self.batcher.mark_complete(frame);
    }
}
