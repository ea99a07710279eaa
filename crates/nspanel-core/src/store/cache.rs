// ── Entity state cache ──
//
// Lock-free concurrent storage keyed by entity id, written by the Home
// Assistant bridge and read by every panel session.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use super::EntityState;

pub struct StateCache {
    by_id: DashMap<String, Arc<EntityState>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
        }
    }

    /// Insert or update one entity. Returns `true` if the id was new.
    pub fn upsert(&self, state: EntityState) -> bool {
        self.by_id
            .insert(state.entity_id.clone(), Arc::new(state))
            .is_none()
    }

    /// Replace the whole cache with a fresh snapshot.
    ///
    /// Entities are overwritten in place; stale ids go only after every
    /// fresh state is in.
    pub fn replace_all(&self, states: impl IntoIterator<Item = EntityState>) {
        let mut fresh = HashSet::new();
        for state in states {
            fresh.insert(state.entity_id.clone());
            self.by_id.insert(state.entity_id.clone(), Arc::new(state));
        }
        self.by_id.retain(|id, _| fresh.contains(id));
    }

    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityState>> {
        self.by_id.remove(entity_id).map(|(_, v)| v)
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.by_id
            .get(entity_id)
            .map(|r| EntityState::clone(r.value()))
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.by_id.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

}

impl Default for StateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_reports_new_ids() {
        let cache = StateCache::new();
        assert!(cache.upsert(EntityState::new("light.a", "on")));
        assert!(!cache.upsert(EntityState::new("light.a", "off")));
        assert_eq!(cache.get("light.a").unwrap().state, "off");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn replace_all_drops_stale_entities() {
        let cache = StateCache::new();
        cache.upsert(EntityState::new("light.a", "on"));
        cache.replace_all([EntityState::new("light.b", "off")]);
        assert!(!cache.contains("light.a"));
        assert!(cache.contains("light.b"));
    }

    #[test]
    fn replace_all_overwrites_surviving_entities() {
        let cache = StateCache::new();
        cache.upsert(EntityState::new("light.a", "on"));
        cache.upsert(EntityState::new("light.b", "on"));
        cache.replace_all([
            EntityState::new("light.a", "off"),
            EntityState::new("light.c", "on"),
        ]);
        assert_eq!(cache.get("light.a").unwrap().state, "off");
        assert!(!cache.contains("light.b"));
        assert_eq!(cache.len(), 2);

        assert!(cache.remove("light.c").is_some());
        assert!(cache.remove("light.c").is_none());
    }
}
