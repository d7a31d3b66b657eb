//! Growable mesh arena ("mega-buffer")
//!
//! Every registered mesh lives in one vertex buffer and one index buffer.
//! Registration appends at a monotonic cursor and hands back byte offsets
//! that stay valid for the arena's lifetime, across any number of growth
//! events. Meshes are never freed individually.

use crate::core::config::MeshArenaConfig;
use crate::foundation::memory::{ByteRegion, RegionError};
use crate::render::mesh::{bounds_of, Mesh, Vertex};
use crate::scene::bounds::AABB;
use log::{debug, info};

/// Result type for mesh arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Errors raised while registering meshes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    /// Growth would pass the configured size limit
    #[error("mesh arena out of capacity: {requested} bytes required, limit is {limit}")]
    OutOfCapacity {
        /// Total bytes the buffer would need
        requested: usize,
        /// Configured upper bound
        limit: usize,
    },

    /// The allocator refused the grown buffer
    #[error("mesh arena failed to allocate {bytes} bytes")]
    AllocationFailed {
        /// Size of the refused allocation
        bytes: usize,
    },

    /// A mesh must have at least one vertex and one index
    #[error("cannot register an empty mesh")]
    EmptyMesh,

    /// The arena settings are out of range
    #[error("invalid mesh arena configuration: {0}")]
    InvalidConfig(String),

    /// An index refers past the end of the mesh's vertices
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index value
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },
}

impl From<RegionError> for ArenaError {
    fn from(error: RegionError) -> Self {
        match error {
            RegionError::LimitExceeded { requested, limit } => {
                Self::OutOfCapacity { requested, limit }
            }
            RegionError::AllocationFailed { bytes } => Self::AllocationFailed { bytes },
        }
    }
}

/// Stable dense mesh identifier, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MeshId(pub u32);

impl MeshId {
    /// Position of this mesh in the arena's allocation table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a mesh lives inside the arena; permanent once created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshAllocation {
    /// Byte offset of the first vertex in the vertex buffer
    pub vertex_offset: u32,
    /// Byte offset of the first index in the index buffer
    pub index_offset: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of indices
    pub index_count: u32,
    /// Local-space bounds of the vertex positions
    pub local_bounds: AABB,
    base_vertex: i32,
}

impl MeshAllocation {
    /// Size of the vertex data in bytes
    pub fn vertex_bytes(&self) -> usize {
        self.vertex_count as usize * Vertex::SIZE
    }

    /// Size of the index data in bytes
    pub fn index_bytes(&self) -> usize {
        self.index_count as usize * INDEX_SIZE
    }

    /// Index offset in elements, as an indirect draw expects
    pub fn first_index(&self) -> u32 {
        self.index_offset / INDEX_SIZE as u32
    }

    /// Vertex offset in elements, as an indirect draw expects
    pub fn base_vertex(&self) -> i32 {
        self.base_vertex
    }
}

const INDEX_SIZE: usize = std::mem::size_of::<u32>();

/// Convert a size or offset for a GPU-facing `u32` field
fn gpu_u32(value: usize, limit: usize) -> ArenaResult<u32> {
    u32::try_from(value).map_err(|_| ArenaError::OutOfCapacity { requested: value, limit })
}

/// Single vertex and index buffer shared by every mesh
#[derive(Debug, Clone)]
pub struct MeshArena {
    vertices: ByteRegion,
    indices: ByteRegion,
    allocations: Vec<MeshAllocation>,
}

impl MeshArena {
    /// Create an arena sized by `config`
    pub fn new(config: &MeshArenaConfig) -> ArenaResult<Self> {
        config.validate().map_err(|e| ArenaError::InvalidConfig(e.to_string()))?;

        let region =
            |initial| ByteRegion::with_capacity(initial, config.growth_increment, config.max_bytes);
        let vertices = region(config.initial_vertex_bytes)?;
        let indices = region(config.initial_index_bytes)?;

        Ok(Self {
            vertices,
            indices,
            allocations: Vec::new(),
        })
    }

    /// Append a mesh and return its id.
    ///
    /// Indices are relative to the mesh's own first vertex. Nothing is
    /// written if validation or the size limit rejects the mesh.
    pub fn register_mesh(&mut self, vertices: &[Vertex], indices: &[u32]) -> ArenaResult<MeshId> {
        let Some(local_bounds) = bounds_of(vertices) else {
            return Err(ArenaError::EmptyMesh);
        };
        if indices.is_empty() {
            return Err(ArenaError::EmptyMesh);
        }
        if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(ArenaError::IndexOutOfRange { index, vertex_count: vertices.len() });
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(indices);

        // Check both limits up front so a failure cannot leave orphaned vertices
        let pending = [(&self.vertices, vertex_bytes.len()), (&self.indices, index_bytes.len())];
        for (region, bytes) in pending {
            if !region.fits(bytes) {
                return Err(ArenaError::OutOfCapacity {
                    requested: region.len() + bytes,
                    limit: region.limit(),
                });
            }
        }

        // Records are built before any write, so a value that does not fit
        // the GPU-facing u32 fields leaves the arena untouched
        let limit = self.vertices.limit().max(self.indices.limit());
        let vertex_offset = gpu_u32(self.vertices.len(), limit)?;
        let base_vertex = i32::try_from(self.vertices.len() / Vertex::SIZE)
            .map_err(|_| ArenaError::OutOfCapacity { requested: self.vertices.len(), limit })?;
        let allocation = MeshAllocation {
            vertex_offset,
            index_offset: gpu_u32(self.indices.len(), limit)?,
            vertex_count: gpu_u32(vertices.len(), limit)?,
            index_count: gpu_u32(indices.len(), limit)?,
            local_bounds,
            base_vertex,
        };
        let id = MeshId(gpu_u32(self.allocations.len(), limit)?);

        let growth_before = self.growth_events();
        self.vertices.append(vertex_bytes)?;
        self.indices.append(index_bytes)?;
        if self.growth_events() != growth_before {
            info!(
                "Mesh arena grew to {} vertex / {} index bytes",
                self.vertices.capacity(),
                self.indices.capacity()
            );
        }
        self.allocations.push(allocation);

        debug!(
            "Registered mesh {:?}: {} vertices at {}, {} indices at {}",
            id,
            vertices.len(),
            allocation.vertex_offset,
            indices.len(),
            allocation.index_offset
        );
        Ok(id)
    }

    /// Append a [`Mesh`]
    pub fn register(&mut self, mesh: &Mesh) -> ArenaResult<MeshId> {
        self.register_mesh(&mesh.vertices, &mesh.indices)
    }

    /// Allocation of a registered mesh
    pub fn allocation(&self, id: MeshId) -> Option<&MeshAllocation> {
        self.allocations.get(id.index())
    }

    /// Number of registered meshes
    pub fn mesh_count(&self) -> usize {
        self.allocations.len()
    }

    /// Raw vertex bytes of one mesh
    pub fn mesh_vertex_bytes(&self, id: MeshId) -> Option<&[u8]> {
        let allocation = self.allocation(id)?;
        self.vertices.read(allocation.vertex_offset as usize, allocation.vertex_bytes())
    }

    /// Raw index bytes of one mesh
    pub fn mesh_index_bytes(&self, id: MeshId) -> Option<&[u8]> {
        let allocation = self.allocation(id)?;
        self.indices.read(allocation.index_offset as usize, allocation.index_bytes())
    }

    /// Every written vertex byte, for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        self.vertices.as_bytes()
    }

    /// Every written index byte, for upload
    pub fn index_bytes(&self) -> &[u8] {
        self.indices.as_bytes()
    }

    /// Vertex buffer capacity in bytes
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.capacity()
    }

    /// Index buffer capacity in bytes
    pub fn index_capacity(&self) -> usize {
        self.indices.capacity()
    }

    /// Growth events across both buffers
    pub fn growth_events(&self) -> u32 {
        self.vertices.growth_events() + self.indices.growth_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> MeshArenaConfig {
        MeshArenaConfig::default()
            .with_initial_bytes(64, 16)
            .with_growth_increment(32)
            .with_max_bytes(4096)
    }

    #[test]
    fn test_register_returns_dense_ids_and_offsets() {
        let mut arena = MeshArena::new(&small_config()).unwrap();

        let a = arena.register(&Mesh::triangle()).unwrap();
        let b = arena.register(&Mesh::cube()).unwrap();

        assert_eq!((a, b), (MeshId(0), MeshId(1)));
        let b_alloc = arena.allocation(b).unwrap();
        assert_eq!(b_alloc.vertex_offset as usize, 3 * Vertex::SIZE);
        assert_eq!(b_alloc.index_offset, 12);
        assert_eq!(b_alloc.base_vertex(), 3);
        assert_eq!(b_alloc.first_index(), 3);
        assert_eq!(b_alloc.index_count, 36);
    }

    #[test]
    fn test_growth_preserves_earlier_mesh() {
        let mut arena = MeshArena::new(&small_config()).unwrap();
        let triangle = Mesh::triangle();

        let a = arena.register(&triangle).unwrap();
        let offset = arena.allocation(a).unwrap().vertex_offset;
        for _ in 0..10 {
            arena.register(&Mesh::cube()).unwrap();
        }

        assert!(arena.growth_events() > 0);
        assert_eq!(arena.allocation(a).unwrap().vertex_offset, offset);
        assert_eq!(
            arena.mesh_vertex_bytes(a).unwrap(),
            bytemuck::cast_slice::<Vertex, u8>(&triangle.vertices)
        );
        assert_eq!(
            arena.mesh_index_bytes(a).unwrap(),
            bytemuck::cast_slice::<u32, u8>(&triangle.indices)
        );
    }

    #[test]
    fn test_local_bounds_computed_from_positions() {
        let mut arena = MeshArena::new(&small_config()).unwrap();

        let id = arena.register(&Mesh::cube()).unwrap();

        assert_eq!(arena.allocation(id).unwrap().local_bounds, Mesh::cube().bounds().unwrap());
    }

    #[test]
    fn test_rejects_invalid_meshes() {
        let mut arena = MeshArena::new(&small_config()).unwrap();
        let triangle = Mesh::triangle();

        assert_eq!(arena.register(&Mesh::default()), Err(ArenaError::EmptyMesh));
        assert_eq!(arena.register_mesh(&triangle.vertices, &[]), Err(ArenaError::EmptyMesh));
        assert_eq!(
            arena.register_mesh(&triangle.vertices, &[0, 1, 3]),
            Err(ArenaError::IndexOutOfRange { index: 3, vertex_count: 3 })
        );
        assert_eq!(arena.mesh_count(), 0);
    }

    #[test]
    fn test_limit_is_surfaced_without_partial_writes() {
        let config = MeshArenaConfig::default()
            .with_initial_bytes(0, 0)
            .with_growth_increment(64)
            .with_max_bytes(300);
        let mut arena = MeshArena::new(&config).unwrap();

        // 8 vertices = 256 bytes fits once, not twice
        arena.register(&Mesh::cube()).unwrap();
        let result = arena.register(&Mesh::cube());

        assert!(matches!(result, Err(ArenaError::OutOfCapacity { limit: 300, .. })));
        assert_eq!(arena.vertex_bytes().len(), 256);
        assert_eq!(arena.index_bytes().len(), 144);
        assert_eq!(arena.mesh_count(), 1);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = MeshArenaConfig::default().with_initial_bytes(1024, 0).with_max_bytes(512);

        assert!(matches!(MeshArena::new(&config), Err(ArenaError::InvalidConfig(_))));
    }
}
