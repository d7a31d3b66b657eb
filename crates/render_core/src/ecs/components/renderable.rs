//! Renderable component for entities that can be rendered
//!
//! Holds mesh and material ids rather than geometry; the mesh arena owns the
//! vertex and index data.

use crate::render::material::MaterialId;
use crate::render::mesh_arena::MeshId;
use crate::scene::bounds::AABB;

/// Coordinate space a renderable is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderSpace {
    /// Placed in the world; spatially indexed and frustum culled
    #[default]
    World,
    /// Overlay geometry in screen space; never culled
    Screen,
}

/// Component for entities that can be rendered
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableComponent {
    /// Mesh registered in the mesh arena
    pub mesh: MeshId,

    /// Material to use for rendering
    pub material: MaterialId,

    /// Mesh bounds in local space
    pub local_bounds: AABB,

    /// Space this renderable is drawn in
    pub space: RenderSpace,

    /// Whether this object is visible
    pub visible: bool,
}

impl RenderableComponent {
    /// Create a world-space renderable
    pub fn new(mesh: MeshId, material: MaterialId, local_bounds: AABB) -> Self {
        Self {
            mesh,
            material,
            local_bounds,
            space: RenderSpace::World,
            visible: true,
        }
    }

    /// Create a screen-space renderable
    pub fn screen_space(mesh: MeshId, material: MaterialId, local_bounds: AABB) -> Self {
        Self::new(mesh, material, local_bounds).with_space(RenderSpace::Screen)
    }

    /// Builder pattern: Set render space
    pub fn with_space(mut self, space: RenderSpace) -> Self {
        self.space = space;
        self
    }

    /// Builder pattern: Set visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Check if this component should be rendered
    pub fn should_render(&self) -> bool {
        self.visible
    }

    /// Whether this renderable belongs in the spatial index
    pub fn is_world_space(&self) -> bool {
        self.space == RenderSpace::World
    }
}
