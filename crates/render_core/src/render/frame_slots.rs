//! N-buffered frame slots
//!
//! Frame `f` writes slot `f % N`. A slot moves `Free -> Written -> InFlight`
//! and only returns to `Free` once the renderer reports that the GPU has
//! finished with the frame it carried. Writing a slot that is still in
//! flight is refused rather than silently overwritten.

use crate::render::instance_data::{DrawIndexedIndirectCommand, GpuInstance, MeshInstanceRange};
use crate::render::instance_batcher::{BatchError, BatchResult};
use log::{debug, warn};

/// Lifecycle of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Never written, or the GPU is done with it
    #[default]
    Free,
    /// Holds the data of `frame`, not yet submitted
    Written {
        /// Frame index the contents belong to
        frame: u64,
    },
    /// Submitted for `frame`; the GPU may still be reading it
    InFlight {
        /// Frame index the contents belong to
        frame: u64,
    },
}

/// One GPU-visible instance buffer plus its draw list
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    state: SlotState,
    pub(crate) instances: Vec<GpuInstance>,
    pub(crate) commands: Vec<DrawIndexedIndirectCommand>,
    pub(crate) ranges: Vec<MeshInstanceRange>,
    instance_capacity: usize,
    grow_events: u32,
}

impl FrameSlot {
    fn with_capacity(capacity: usize) -> BatchResult<Self> {
        let mut slot = Self::default();
        slot.reserve(capacity)?;
        Ok(slot)
    }

    fn reserve(&mut self, capacity: usize) -> BatchResult<()> {
        let additional = capacity.saturating_sub(self.instances.len());
        self.instances
            .try_reserve_exact(additional)
            .map_err(|_| BatchError::AllocationFailed { bytes: capacity * GpuInstance::SIZE })?;
        self.instance_capacity = capacity;
        Ok(())
    }

    /// Make room for `required` instances, growing to at least double the
    /// current capacity but never past `max`.
    ///
    /// Returns whether a growth event happened.
    pub(crate) fn ensure_capacity(&mut self, required: usize, max: usize) -> BatchResult<bool> {
        if required <= self.instance_capacity {
            return Ok(false);
        }
        if required > max {
            return Err(BatchError::OutOfCapacity { requested: required, max });
        }

        let new_capacity = required.max(self.instance_capacity.saturating_mul(2)).min(max);
        debug!("Instance buffer grew {} -> {} instances", self.instance_capacity, new_capacity);
        self.reserve(new_capacity)?;
        self.grow_events += 1;
        Ok(true)
    }

    pub(crate) fn clear(&mut self) {
        self.instances.clear();
        self.commands.clear();
        self.ranges.clear();
    }

    /// Current lifecycle state
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Instance records of the last frame written here
    pub fn instances(&self) -> &[GpuInstance] {
        &self.instances
    }

    /// One indirect command per mesh range
    pub fn commands(&self) -> &[DrawIndexedIndirectCommand] {
        &self.commands
    }

    /// Instance ranges matching [`commands`](Self::commands) one to one
    pub fn ranges(&self) -> &[MeshInstanceRange] {
        &self.ranges
    }

    /// Instance data as bytes for upload
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    /// Command list as bytes for upload
    pub fn command_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.commands)
    }

    /// Instances the slot can hold without growing
    pub fn instance_capacity(&self) -> usize {
        self.instance_capacity
    }

    /// Number of times this slot grew
    pub fn grow_events(&self) -> u32 {
        self.grow_events
    }
}

/// Ring of frame slots indexed by `frame % len`
#[derive(Debug, Clone)]
pub struct FrameSlots {
    slots: Vec<FrameSlot>,
    max_instances: usize,
}

impl FrameSlots {
    /// Create `count` slots, each able to hold `initial_capacity` instances
    pub fn new(count: usize, initial_capacity: usize, max_instances: usize) -> BatchResult<Self> {
        if count == 0 {
            return Err(BatchError::InvalidConfig("at least one frame slot is required".into()));
        }

        let slots = (0..count)
            .map(|_| FrameSlot::with_capacity(initial_capacity.min(max_instances)))
            .collect::<BatchResult<Vec<_>>>()?;

        Ok(Self { slots, max_instances })
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; there is at least one slot
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot used by `frame`
    pub fn slot_index(&self, frame: u64) -> usize {
        (frame % self.slots.len() as u64) as usize
    }

    /// Slot used by `frame`, read-only
    pub fn slot(&self, frame: u64) -> &FrameSlot {
        &self.slots[self.slot_index(frame)]
    }

    /// Upper bound on instances per frame
    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    /// Fail if the slot for `frame` is still being read by the GPU
    pub(crate) fn check_writable(&self, frame: u64) -> BatchResult<()> {
        let index = self.slot_index(frame);
        match self.slots[index].state {
            SlotState::InFlight { frame: in_flight } => {
                Err(BatchError::SlotInFlight { slot: index, frame: in_flight })
            }
            _ => Ok(()),
        }
    }

    /// Claim the slot for `frame` and clear it for writing.
    ///
    /// The slot reads as `Free` until [`finish_write`](Self::finish_write),
    /// so an interrupted write is never submitted under an old frame.
    pub(crate) fn begin_write(&mut self, frame: u64) -> BatchResult<()> {
        self.check_writable(frame)?;

        let slot = self.slot_mut(frame);
        slot.clear();
        slot.state = SlotState::Free;
        Ok(())
    }

    pub(crate) fn slot_mut(&mut self, frame: u64) -> &mut FrameSlot {
        let index = self.slot_index(frame);
        &mut self.slots[index]
    }

    pub(crate) fn finish_write(&mut self, frame: u64) {
        let index = self.slot_index(frame);
        self.slots[index].state = SlotState::Written { frame };
    }

    /// Record that the slot holding `frame` was handed to the GPU
    pub fn mark_submitted(&mut self, frame: u64) {
        let index = self.slot_index(frame);
        let slot = &mut self.slots[index];
        match slot.state {
            SlotState::Written { frame: written } if written == frame => {
                slot.state = SlotState::InFlight { frame };
            }
            other => warn!("mark_submitted({}) on slot {} in state {:?}", frame, index, other),
        }
    }

    /// Record that the GPU finished reading the slot holding `frame`
    pub fn mark_complete(&mut self, frame: u64) {
        let index = self.slot_index(frame);
        let slot = &mut self.slots[index];
        match slot.state {
            SlotState::InFlight { frame: in_flight } if in_flight == frame => {
                slot.state = SlotState::Free;
            }
            other => warn!("mark_complete({}) on slot {} in state {:?}", frame, index, other),
        }
    }

    /// Growth events across all slots
    pub fn grow_events(&self) -> u32 {
        self.slots.iter().map(FrameSlot::grow_events).sum()
    }
}
