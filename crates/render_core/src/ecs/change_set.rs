//! Per-frame record of component mutations
//!
//! Every [`World`](super::World) mutator appends its entity here instead of
//! the spatial index polling all entities each frame. The scene manager
//! drains the set once per tick.

use super::Entity;
use slotmap::SecondaryMap;

bitflags::bitflags! {
    /// Which components of an entity changed since the last drain
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u8 {
        /// Transform inserted, mutated or removed
        const TRANSFORM = 1 << 0;
        /// Renderable inserted, mutated or removed
        const RENDERABLE = 1 << 1;
    }
}

/// Deduplicated dirty list plus the entities destroyed this frame
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Dirty entities in first-marked order
    dirty: Vec<(Entity, ChangeFlags)>,

    /// Position of each entity in `dirty`
    positions: SecondaryMap<Entity, usize>,

    /// Entities destroyed since the last drain
    removed: Vec<Entity>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `flags` changed on `entity`
    pub fn mark(&mut self, entity: Entity, flags: ChangeFlags) {
        if let Some(&position) = self.positions.get(entity) {
            self.dirty[position].1 |= flags;
            return;
        }

        self.positions.insert(entity, self.dirty.len());
        self.dirty.push((entity, flags));
    }

    /// Record that `entity` was destroyed
    pub fn mark_removed(&mut self, entity: Entity) {
        self.removed.push(entity);
    }

    /// Dirty entities with their accumulated flags
    pub fn dirty(&self) -> &[(Entity, ChangeFlags)] {
        &self.dirty
    }

    /// Dirty entities whose flags intersect `flags`
    pub fn dirty_with(&self, flags: ChangeFlags) -> impl Iterator<Item = Entity> + '_ {
        self.dirty
            .iter()
            .filter(move |(_, changed)| changed.intersects(flags))
            .map(|(entity, _)| *entity)
    }

    /// Entities destroyed since the last drain
    pub fn removed(&self) -> &[Entity] {
        &self.removed
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_marks_are_deduplicated_and_merged() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();
        let a = entities.insert(());
        let b = entities.insert(());

        let mut changes = ChangeSet::new();
        changes.mark(a, ChangeFlags::TRANSFORM);
        changes.mark(b, ChangeFlags::RENDERABLE);
        changes.mark(a, ChangeFlags::RENDERABLE);

        assert_eq!(
            changes.dirty(),
            &[(a, ChangeFlags::TRANSFORM | ChangeFlags::RENDERABLE), (b, ChangeFlags::RENDERABLE)]
        );
        assert_eq!(changes.dirty_with(ChangeFlags::TRANSFORM).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_removals_are_tracked_separately() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();
        let a = entities.insert(());

        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());

        changes.mark_removed(a);

        assert!(!changes.is_empty());
        assert!(changes.dirty().is_empty());
        assert_eq!(changes.removed(), &[a]);
    }
}
