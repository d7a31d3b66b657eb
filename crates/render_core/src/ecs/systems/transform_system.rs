//! Transform pass
//!
//! Recomputes cached world matrices for entities whose transform changed
//! this frame and reports whether any matrix actually moved.

use crate::ecs::change_set::ChangeFlags;
use crate::ecs::{Entity, System, World};
use log::trace;

/// System that keeps world matrices in step with transform components
#[derive(Debug, Default)]
pub struct TransformSystem {
    updated_last_run: usize,
}

impl TransformSystem {
    /// Create a new transform system
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matrices that changed in the most recent run
    pub fn updated_last_run(&self) -> usize {
        self.updated_last_run
    }
}

impl System for TransformSystem {
    /// True if any world matrix changed, or a transform was removed
    type Output = bool;

    fn run(&mut self, world: &mut World) -> bool {
        let dirty: Vec<Entity> = world.changes().dirty_with(ChangeFlags::TRANSFORM).collect();

        let mut updated = 0;
        for entity in dirty {
            match world.transform(entity).map(|transform| transform.to_matrix()) {
                Some(matrix) => {
                    if world.store_world_matrix(entity, matrix) {
                        updated += 1;
                    }
                }
                // Transform removed or entity destroyed since it was marked
                None => updated += 1,
            }
        }

        if updated > 0 {
            trace!("Transform pass updated {} world matrices", updated);
        }
        self.updated_last_run = updated;
        updated > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::TransformComponent;
    use crate::foundation::math::{Mat4, Vec3};
    use approx::assert_relative_eq;

    #[test]
    fn test_run_computes_world_matrices() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.insert_transform(entity, TransformComponent::from_position(Vec3::new(1.0, 2.0, 3.0)));

        let mut system = TransformSystem::new();
        assert!(system.run(&mut world));

        let expected = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(*world.world_matrix(entity).unwrap(), expected);
    }

    #[test]
    fn test_unchanged_matrix_reports_false() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.insert_transform(entity, TransformComponent::identity());

        let mut system = TransformSystem::new();
        assert!(system.run(&mut world));
        world.drain_changes();

        // Touching the transform without changing it marks it dirty
        let _ = world.transform_mut(entity);
        assert!(!system.run(&mut world));
        assert_eq!(system.updated_last_run(), 0);
    }

    #[test]
    fn test_no_dirty_transforms_reports_false() {
        let mut world = World::new();
        world.create_entity();

        assert!(!TransformSystem::new().run(&mut world));
    }

    #[test]
    fn test_removed_transform_counts_as_change() {
        let mut world = World::new();
        let entity = world.create_entity();
        world.insert_transform(entity, TransformComponent::identity());

        let mut system = TransformSystem::new();
        system.run(&mut world);
        world.drain_changes();

        world.remove_transform(entity);
        assert!(system.run(&mut world));
        assert!(world.world_matrix(entity).is_none());
    }
}
