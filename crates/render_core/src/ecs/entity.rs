//! Entity implementation

slotmap::new_key_type! {
    /// Entity identifier
    ///
    /// A generational key: once the entity is destroyed, every copy of the
    /// handle fails lookups, even if its slot is reused by a new entity.
    pub struct Entity;
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_stale_entity_does_not_alias_reused_slot() {
        let mut entities: SlotMap<Entity, ()> = SlotMap::with_key();

        let first = entities.insert(());
        entities.remove(first);
        let second = entities.insert(());

        assert_ne!(first, second);
        assert!(!entities.contains_key(first));
        assert!(entities.contains_key(second));
    }
}
