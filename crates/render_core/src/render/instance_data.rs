//! GPU-visible per-frame records
//!
//! [`GpuInstance`] is what the vertex shader reads per instance and
//! [`DrawIndexedIndirectCommand`] is one batched draw. Both are `Pod` so a
//! frame slot can be handed to the device as raw bytes.

use crate::ecs::Entity;
use crate::foundation::math::Mat4;
use crate::render::material::MaterialId;
use crate::render::mesh_arena::{MeshAllocation, MeshId};
use crate::scene::bounds::AABB;
use bytemuck::{Pod, Zeroable};

/// Per-instance data uploaded to the instance buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuInstance {
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
    /// Local-space bounds minimum
    pub aabb_min: [f32; 3],
    /// Mesh the instance draws
    pub mesh_id: u32,
    /// Local-space bounds maximum
    pub aabb_max: [f32; 3],
    /// Material table index
    pub material_id: u32,
    /// Byte offset of the mesh's indices in the arena index buffer
    pub index_offset: u32,
    /// Byte offset of the mesh's vertices in the arena vertex buffer
    pub vertex_offset: u32,
    /// Indices per instance
    pub index_count: u32,
    _pad: u32,
}

impl GpuInstance {
    /// Size in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Pack one visible entity
    pub fn new(
        model: &Mat4,
        local_bounds: &AABB,
        mesh: MeshId,
        material: MaterialId,
        allocation: &MeshAllocation,
    ) -> Self {
        Self {
            model: (*model).into(),
            aabb_min: local_bounds.min.into(),
            mesh_id: mesh.0,
            aabb_max: local_bounds.max.into(),
            material_id: material.0,
            index_offset: allocation.index_offset,
            vertex_offset: allocation.vertex_offset,
            index_count: allocation.index_count,
            _pad: 0,
        }
    }

    /// Model matrix as a nalgebra matrix
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from(self.model)
    }
}

/// Indirect draw command for one mesh's instance range
///
/// Field order matches what `vkCmdDrawIndexedIndirect` consumes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectCommand {
    /// Number of indices per instance
    pub index_count: u32,
    /// Number of instances to draw
    pub instance_count: u32,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Vertex offset added to each index
    pub base_vertex: i32,
    /// First instance in the instance buffer
    pub first_instance: u32,
}

impl DrawIndexedIndirectCommand {
    /// Command drawing `range`
    pub fn from_range(range: &MeshInstanceRange) -> Self {
        Self {
            index_count: range.index_count,
            instance_count: range.count,
            first_index: range.first_index,
            base_vertex: range.base_vertex,
            first_instance: range.first_instance,
        }
    }
}

/// Contiguous run of the sorted instance array sharing one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInstanceRange {
    /// Mesh drawn by every instance in the range
    pub mesh: MeshId,
    /// Position of the first instance
    pub first_instance: u32,
    /// Number of instances
    pub count: u32,
    /// Indices per instance
    pub index_count: u32,
    /// First index of the mesh, in elements
    pub first_index: u32,
    /// First vertex of the mesh, in elements
    pub base_vertex: i32,
}

impl MeshInstanceRange {
    /// One past the last instance
    pub fn end(&self) -> u32 {
        self.first_instance + self.count
    }
}

/// A visible entity waiting to be sorted into a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceCandidate {
    /// Source entity
    pub entity: Entity,
    /// Mesh the entity draws
    pub mesh: MeshId,
    /// Material the entity draws with
    pub material: MaterialId,
    /// World matrix at gather time
    pub model: Mat4,
    /// Local-space bounds
    pub local_bounds: AABB,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MeshArenaConfig;
    use crate::foundation::math::Vec3;
    use crate::render::mesh::Mesh;
    use crate::render::mesh_arena::MeshArena;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(GpuInstance::SIZE, 112);
        assert_eq!(std::mem::size_of::<DrawIndexedIndirectCommand>(), 20);
        assert_eq!(std::mem::align_of::<GpuInstance>(), 4);
    }

    #[test]
    fn test_instance_packs_model_column_major() {
        let model = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let mut arena = MeshArena::new(&MeshArenaConfig::default()).unwrap();
        let mesh = arena.register(&Mesh::cube()).unwrap();
        let allocation = arena.allocation(mesh).unwrap();

        let bounds = allocation.local_bounds;
        let instance = GpuInstance::new(&model, &bounds, mesh, MaterialId(3), allocation);

        assert_eq!(instance.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(instance.model_matrix(), model);
        assert_eq!((instance.mesh_id, instance.material_id), (0, 3));
        assert_eq!(instance.aabb_max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_instance_offsets_are_arena_bytes() {
        let mut arena = MeshArena::new(&MeshArenaConfig::default()).unwrap();
        arena.register(&Mesh::cube()).unwrap();
        let triangle = arena.register(&Mesh::triangle()).unwrap();
        let allocation = arena.allocation(triangle).unwrap();

        let instance = GpuInstance::new(
            &Mat4::identity(),
            &allocation.local_bounds,
            triangle,
            MaterialId(0),
            allocation,
        );

        assert_eq!(instance.vertex_offset, allocation.vertex_offset);
        assert_eq!(instance.index_offset, allocation.index_offset);
        assert_eq!((instance.vertex_offset, instance.index_offset), (256, 144));
        assert_eq!(instance.index_count, 3);
        assert_eq!((allocation.base_vertex(), allocation.first_index()), (8, 36));
    }

    #[test]
    fn test_command_from_range() {
        let range = MeshInstanceRange {
            mesh: MeshId(1),
            first_instance: 4,
            count: 3,
            index_count: 36,
            first_index: 12,
            base_vertex: 8,
        };

        let command = DrawIndexedIndirectCommand::from_range(&range);

        assert_eq!(command.instance_count, 3);
        assert_eq!(command.first_instance, 4);
        assert_eq!(command.base_vertex, 8);
        assert_eq!(range.end(), 7);
    }
}
