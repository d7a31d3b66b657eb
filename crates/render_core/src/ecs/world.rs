//! ECS World implementation

use super::change_set::{ChangeFlags, ChangeSet};
use super::components::{RenderableComponent, TransformComponent};
use super::Entity;
use crate::foundation::math::Mat4;
use slotmap::{SecondaryMap, SlotMap};

/// ECS World containing all entities and components
///
/// Every mutating accessor records the entity in the world's [`ChangeSet`],
/// which the scene manager drains once per frame.
#[derive(Debug, Default)]
pub struct World {
    entities: SlotMap<Entity, ()>,
    transforms: SecondaryMap<Entity, TransformComponent>,
    world_matrices: SecondaryMap<Entity, Mat4>,
    renderables: SecondaryMap<Entity, RenderableComponent>,
    changes: ChangeSet,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and all its components.
    ///
    /// Returns false if the entity was already dead.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            return false;
        }

        self.transforms.remove(entity);
        self.world_matrices.remove(entity);
        self.renderables.remove(entity);
        self.changes.mark_removed(entity);
        true
    }

    /// Whether the handle refers to a live entity
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Get an iterator over all entities
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Add or replace the transform of a live entity.
    ///
    /// Returns false (and stores nothing) if the entity is dead.
    pub fn insert_transform(&mut self, entity: Entity, transform: TransformComponent) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.transforms.insert(entity, transform);
        self.changes.mark(entity, ChangeFlags::TRANSFORM);
        true
    }

    /// Replace an existing transform; same as [`World::insert_transform`]
    pub fn set_transform(&mut self, entity: Entity, transform: TransformComponent) -> bool {
        self.insert_transform(entity, transform)
    }

    /// Get the transform of an entity
    pub fn transform(&self, entity: Entity) -> Option<&TransformComponent> {
        self.transforms.get(entity)
    }

    /// Mutable access to a transform; marks it changed
    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut TransformComponent> {
        let transform = self.transforms.get_mut(entity)?;
        self.changes.mark(entity, ChangeFlags::TRANSFORM);
        Some(transform)
    }

    /// Remove the transform of an entity
    pub fn remove_transform(&mut self, entity: Entity) -> Option<TransformComponent> {
        let removed = self.transforms.remove(entity)?;
        self.world_matrices.remove(entity);
        self.changes.mark(entity, ChangeFlags::TRANSFORM);
        Some(removed)
    }

    /// World matrix as of the last transform pass
    pub fn world_matrix(&self, entity: Entity) -> Option<&Mat4> {
        self.world_matrices.get(entity)
    }

    /// Store a freshly computed world matrix.
    ///
    /// Returns true if it differs bitwise from the previous one.
    pub(crate) fn store_world_matrix(&mut self, entity: Entity, matrix: Mat4) -> bool {
        match self.world_matrices.insert(entity, matrix) {
            Some(previous) => previous
                .iter()
                .zip(matrix.iter())
                .any(|(a, b)| a.to_bits() != b.to_bits()),
            None => true,
        }
    }

    /// Add or replace the renderable of a live entity.
    ///
    /// Returns false (and stores nothing) if the entity is dead.
    pub fn insert_renderable(&mut self, entity: Entity, renderable: RenderableComponent) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.renderables.insert(entity, renderable);
        self.changes.mark(entity, ChangeFlags::RENDERABLE);
        true
    }

    /// Get the renderable of an entity
    pub fn renderable(&self, entity: Entity) -> Option<&RenderableComponent> {
        self.renderables.get(entity)
    }

    /// Mutable access to a renderable; marks it changed
    pub fn renderable_mut(&mut self, entity: Entity) -> Option<&mut RenderableComponent> {
        let renderable = self.renderables.get_mut(entity)?;
        self.changes.mark(entity, ChangeFlags::RENDERABLE);
        Some(renderable)
    }

    /// Remove the renderable of an entity
    pub fn remove_renderable(&mut self, entity: Entity) -> Option<RenderableComponent> {
        let removed = self.renderables.remove(entity)?;
        self.changes.mark(entity, ChangeFlags::RENDERABLE);
        Some(removed)
    }

    /// Iterate over all renderables
    pub fn renderables(&self) -> impl Iterator<Item = (Entity, &RenderableComponent)> {
        self.renderables.iter()
    }

    /// Changes recorded since the last drain
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Take the recorded changes, leaving an empty set
    pub fn drain_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::{material::MaterialId, mesh_arena::MeshId};
    use crate::scene::bounds::AABB;

    fn renderable() -> RenderableComponent {
        RenderableComponent::new(
            MeshId(0),
            MaterialId(0),
            AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
        )
    }

    #[test]
    fn test_mutators_mark_entities_dirty() {
        let mut world = World::new();
        let entity = world.create_entity();

        world.insert_transform(entity, TransformComponent::identity());
        world.insert_renderable(entity, renderable());
        let changes = world.drain_changes();

        assert_eq!(changes.dirty(), &[(entity, ChangeFlags::TRANSFORM | ChangeFlags::RENDERABLE)]);
        assert!(world.changes().is_empty());

        if let Some(transform) = world.transform_mut(entity) {
            transform.position.x = 4.0;
        }
        assert_eq!(world.changes().dirty(), &[(entity, ChangeFlags::TRANSFORM)]);
    }

    #[test]
    fn test_read_access_does_not_mark() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.insert_transform(entity, TransformComponent::identity());
        world.drain_changes();

        assert!(world.transform(entity).is_some());
        assert!(world.renderable(entity).is_none());
        assert!(world.changes().is_empty());
    }

    #[test]
    fn test_destroy_removes_components_and_records_removal() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.insert_transform(entity, TransformComponent::identity());
        world.insert_renderable(entity, renderable());

        assert!(world.destroy_entity(entity));
        assert!(!world.destroy_entity(entity));

        assert!(!world.is_alive(entity));
        assert!(world.transform(entity).is_none());
        assert_eq!(world.renderables().count(), 0);
        assert_eq!(world.changes().removed(), &[entity]);
    }

    #[test]
    fn test_dead_entities_reject_components() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.destroy_entity(entity);

        assert!(!world.insert_transform(entity, TransformComponent::identity()));
        assert!(!world.insert_renderable(entity, renderable()));
        assert!(world.transform_mut(entity).is_none());
    }

    #[test]
    fn test_store_world_matrix_reports_bitwise_change() {
        let mut world = World::new();
        let entity = world.create_entity();

        assert!(world.store_world_matrix(entity, Mat4::identity()));
        assert!(!world.store_world_matrix(entity, Mat4::identity()));
        assert!(world.store_world_matrix(entity, Mat4::new_scaling(2.0)));
    }
}
