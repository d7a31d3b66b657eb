//! # Scene Manager - Bridge between ECS and the visibility queries
//!
//! Keeps the BVH in step with the ECS world and answers frustum and ray
//! queries against it.
//!
//! ## Per-frame flow
//!
//! 1. The transform pass recomputes world matrices of dirty transforms.
//! 2. [`SceneManager::update`] drains the world's change set: destroyed
//!    entities leave the BVH, changed world-space renderables are refitted
//!    from their cached world bounds, anything that stopped qualifying is
//!    removed.
//! 3. [`SceneManager::set_camera`] feeds the view-projection matrix to the
//!    frustum cache.
//!
//! Screen-space renderables never enter the BVH.

use crate::core::config::{ConfigError, CullingConfig, RenderCoreConfig};
use crate::ecs::{Entity, System, TransformSystem, World};
use crate::foundation::math::Mat4;
use crate::scene::bounds::{Ray, AABB};
use crate::scene::frustum::{CullCache, Frustum, FrustumCache};
use crate::spatial::{Bvh, BvhResult};
use log::{debug, trace};
use slotmap::SecondaryMap;

/// State threaded through one frame's update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateContext {
    /// Frame being built
    pub frame_index: u64,
    /// Whether the transform pass changed any world matrix this frame
    pub transforms_changed: bool,
    /// Entities inserted into or refitted in the BVH this frame
    pub refitted: usize,
    /// Entities removed from the BVH this frame
    pub removed: usize,
    /// Whether the BVH was rebuilt this frame
    pub rebuilt: bool,
}

impl UpdateContext {
    /// Fresh context for `frame_index`
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            ..Self::default()
        }
    }
}

/// Spatial side of the scene: BVH, cull caches and frustum
#[derive(Debug)]
pub struct SceneManager {
    bvh: Bvh,
    cull_caches: SecondaryMap<Entity, CullCache>,
    frustum_cache: FrustumCache,
    culling: CullingConfig,
    rebuild_depth_factor: f32,
    transform_system: TransformSystem,
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::from_valid(&RenderCoreConfig::default())
    }
}

impl SceneManager {
    /// Create a scene manager from the culling and spatial settings.
    ///
    /// Rejects a tolerance or ray stack bound that would make every query
    /// meaningless, such as a NaN tolerance that culls everything.
    pub fn new(config: &RenderCoreConfig) -> Result<Self, ConfigError> {
        config.culling.validate()?;
        config.spatial.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: &RenderCoreConfig) -> Self {
        Self {
            bvh: Bvh::with_ray_stack_capacity(config.spatial.ray_stack_capacity),
            cull_caches: SecondaryMap::new(),
            frustum_cache: FrustumCache::new(),
            culling: config.culling.clone(),
            rebuild_depth_factor: config.spatial.rebuild_depth_factor,
            transform_system: TransformSystem::new(),
        }
    }

    /// Run the transform pass and sync the BVH with the world's changes.
    ///
    /// Call once per frame before any query.
    pub fn update(&mut self, world: &mut World, ctx: &mut UpdateContext) {
        ctx.transforms_changed = self.transform_system.run(world);

        let changes = world.drain_changes();
        if changes.is_empty() {
            return;
        }

        for &entity in changes.removed() {
            self.cull_caches.remove(entity);
            if self.bvh.remove(entity) {
                ctx.removed += 1;
            }
        }

        for &(entity, _) in changes.dirty() {
            match Self::world_space_inputs(world, entity) {
                Some((local, model)) => {
                    let bounds = match self.cull_caches.get_mut(entity) {
                        Some(cache) => {
                            cache.refresh(&local, &model);
                            *cache.world_bounds()
                        }
                        None => {
                            let cache = CullCache::new(&local, &model);
                            let bounds = *cache.world_bounds();
                            self.cull_caches.insert(entity, cache);
                            bounds
                        }
                    };
                    self.bvh.insert_or_update(entity, bounds);
                    ctx.refitted += 1;
                }
                None => {
                    self.cull_caches.remove(entity);
                    if self.bvh.remove(entity) {
                        ctx.removed += 1;
                    }
                }
            }
        }

        if self.bvh.needs_rebuild(self.rebuild_depth_factor) {
            debug!(
                "BVH depth {} over budget for {} leaves, rebuilding",
                self.bvh.depth(),
                self.bvh.leaf_count()
            );
            self.bvh.rebuild();
            ctx.rebuilt = true;
        }
    }

    /// Local bounds and world matrix of an entity that belongs in the BVH
    fn world_space_inputs(world: &World, entity: Entity) -> Option<(AABB, Mat4)> {
        if !world.is_alive(entity) {
            return None;
        }
        let renderable = world.renderable(entity)?;
        if !renderable.is_world_space() {
            return None;
        }
        let model = world.world_matrix(entity)?;
        Some((renderable.local_bounds, *model))
    }

    /// Set this frame's camera. Returns true if the frustum changed.
    pub fn set_camera(&mut self, view: &Mat4, projection: &Mat4) -> bool {
        self.frustum_cache.update(&(projection * view))
    }

    /// Current frustum
    pub fn frustum(&self) -> &Frustum {
        self.frustum_cache.frustum()
    }

    /// Visibility tolerance in world units
    pub fn visibility_tolerance(&self) -> f32 {
        self.culling.visibility_tolerance
    }

    /// Visit every live world-space entity whose BVH leaf intersects the
    /// current frustum
    pub fn query_frustum_callback(&self, world: &World, mut on_visible: impl FnMut(Entity)) {
        self.query_frustum_with(self.frustum(), world, &mut on_visible);
    }

    /// Same as [`query_frustum_callback`](Self::query_frustum_callback)
    /// with an explicit frustum
    pub fn query_frustum_with(
        &self,
        frustum: &Frustum,
        world: &World,
        mut on_visible: impl FnMut(Entity),
    ) {
        self.bvh.query_frustum(frustum, self.culling.visibility_tolerance, |entity| {
            if world.is_alive(entity) {
                on_visible(entity);
            } else {
                trace!("Frustum query skipped dead entity {:?}", entity);
            }
        });
    }

    /// Visit live entities whose bounds the ray enters within
    /// `[t_min, t_max]`; `on_hit` returning false stops the query
    pub fn ray_cast_callback(
        &self,
        world: &World,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
        mut on_hit: impl FnMut(Entity, f32, &AABB) -> bool,
    ) -> BvhResult<()> {
        self.bvh.ray_cast(ray, t_min, t_max, |entity, t, bounds| {
            if !world.is_alive(entity) {
                return true;
            }
            on_hit(entity, t, bounds)
        })
    }

    /// Nearest live entity along the ray, with its entry distance
    pub fn ray_cast_closest_hit(
        &self,
        world: &World,
        ray: &Ray,
        t_min: f32,
        t_max: f32,
    ) -> BvhResult<Option<(Entity, f32)>> {
        self.bvh.ray_cast_closest(ray, t_min, t_max, |entity| world.is_alive(entity))
    }

    /// Leaf-level frustum test through the entity's cull cache
    pub fn test_cached(&mut self, entity: Entity, local: &AABB, model: &Mat4) -> bool {
        let frustum = self.frustum_cache.frustum();
        let tolerance = self.culling.visibility_tolerance;

        match self.cull_caches.get_mut(entity) {
            Some(cache) => frustum.test_cached(cache, local, model, tolerance),
            None => {
                let mut cache = CullCache::new(local, model);
                let visible = frustum.test_cached(&mut cache, local, model, tolerance);
                self.cull_caches.insert(entity, cache);
                visible
            }
        }
    }

    /// Spatial index, for diagnostics
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Number of entities in the BVH
    pub fn entity_count(&self) -> usize {
        self.bvh.leaf_count()
    }

    /// Check if an entity is in the BVH
    pub fn has_entity(&self, entity: Entity) -> bool {
        self.bvh.contains(entity)
    }

    /// Drop all spatial state; the next update only sees new changes
    pub fn clear(&mut self) {
        self.bvh.clear();
        self.cull_caches.clear();
    }
}
