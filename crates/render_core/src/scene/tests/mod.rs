//! Scenario tests for the full visibility pipeline
//!
//! These drive the ECS world, scene manager, mesh arena and batcher
//! together the way a frame loop would.

mod queries;

use crate::core::config::RenderCoreConfig;
use crate::ecs::{Entity, RenderableComponent, TransformComponent, World};
use crate::foundation::math::Vec3;
use crate::render::{MaterialId, Mesh, MeshArena, MeshId};
use crate::scene::{SceneManager, UpdateContext, AABB};

/// World, scene and arena wired from one configuration
pub(super) struct Fixture {
    pub config: RenderCoreConfig,
    pub world: World,
    pub scene: SceneManager,
    pub arena: MeshArena,
    pub meshes: Vec<MeshId>,
}

impl Fixture {
    pub fn new(config: RenderCoreConfig) -> Self {
        crate::foundation::logging::init_for_tests();
        let mut arena = MeshArena::new(&config.arena).unwrap();
        let meshes = vec![
            arena.register(&Mesh::cube()).unwrap(),
            arena.register(&Mesh::triangle()).unwrap(),
            arena.register(&Mesh::cube()).unwrap(),
        ];

        Self {
            scene: SceneManager::new(&config).unwrap(),
            world: World::new(),
            config,
            arena,
            meshes,
        }
    }

    /// Spawn a world-space box of half-size `half_extent` at `position`
    pub fn spawn(&mut self, position: Vec3, half_extent: f32, mesh: MeshId) -> Entity {
        let entity = self.world.create_entity();
        self.world.insert_transform(entity, TransformComponent::from_position(position));
        self.world.insert_renderable(
            entity,
            RenderableComponent::new(
                mesh,
                MaterialId(0),
                AABB::from_center_extents(Vec3::zeros(), Vec3::repeat(half_extent)),
            ),
        );
        entity
    }

    pub fn update(&mut self, frame_index: u64) -> UpdateContext {
        let mut ctx = UpdateContext::new(frame_index);
        self.scene.update(&mut self.world, &mut ctx);
        ctx
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new(RenderCoreConfig::default())
    }
}
