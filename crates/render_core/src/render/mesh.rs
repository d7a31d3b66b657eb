//! Mesh representation for 3D models
//!
//! Pure geometry data, uploaded once into the [`MeshArena`](super::mesh_arena::MeshArena).

use crate::foundation::math::Vec3;
use crate::scene::bounds::AABB;
use bytemuck::{Pod, Zeroable};

/// 3D vertex data structure for rendering
///
/// `#[repr(C)]` so that a vertex slice can be viewed as bytes for upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in 3D space
    pub position: [f32; 3],

    /// Normal vector
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Size of one vertex in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Index data for triangles
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Local-space bounds of the vertex positions; `None` for an empty mesh
    pub fn bounds(&self) -> Option<AABB> {
        bounds_of(&self.vertices)
    }

    /// Unit cube centered at the origin with vertices at ±1.0 on each axis
    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            // Back face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0]),
        ];

        let indices = vec![
            // Front
            0, 1, 2, 2, 3, 0,
            // Back
            4, 5, 6, 6, 7, 4,
            // Left
            4, 0, 3, 3, 5, 4,
            // Right
            1, 7, 6, 6, 2, 1,
            // Top
            3, 2, 6, 6, 5, 3,
            // Bottom
            4, 7, 1, 1, 0, 4,
        ];

        Self::new(vertices, indices)
    }

    /// Single triangle in the XY plane, useful as a flat test mesh
    pub fn triangle() -> Self {
        Self::new(
            vec![
                Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                Vertex::new([0.5, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }
}

/// Bounds of a vertex slice's positions
pub fn bounds_of(vertices: &[Vertex]) -> Option<AABB> {
    let positions: Vec<Vec3> = vertices.iter().map(Vertex::position).collect();
    AABB::from_points(&positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(Vertex::SIZE, 32);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&Mesh::triangle().vertices).len(), 96);
    }

    #[test]
    fn test_cube_bounds() {
        let bounds = Mesh::cube().bounds().unwrap();

        assert_eq!(bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_flat_mesh_has_degenerate_bounds() {
        let bounds = Mesh::triangle().bounds().unwrap();

        assert_eq!(bounds.min.z, bounds.max.z);
        assert!(bounds.is_valid());
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::default().bounds().is_none());
    }
}
