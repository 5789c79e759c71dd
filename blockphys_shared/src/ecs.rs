//! Entity/component store (minimal ECS).
//!
//! Instances keep their entities here. It is not archetype-based; it uses
//! typed component storages keyed by entity id, plus a set of live ids so
//! despawning clears every storage at once.

use std::{
    any::{Any, TypeId},
    collections::{BTreeSet, HashMap},
};

use serde::{Deserialize, Serialize};

use crate::math::{Point, Vec3};

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

trait Storage: Send + Sync {
    fn remove_entity(&mut self, entity: EntityId);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static + Send + Sync> Storage for HashMap<EntityId, T> {
    fn remove_entity(&mut self, entity: EntityId) {
        self.remove(&entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Simple world that can store typed components.
#[derive(Default)]
pub struct World {
    next_id: u64,
    alive: BTreeSet<EntityId>,
    storages: HashMap<TypeId, Box<dyn Storage>>,
}

impl World {
    /// Creates a new entity.
    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.alive.insert(id);
        id
    }

    /// Removes an entity and all of its components. Returns false if it was
    /// not alive.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.alive.remove(&entity) {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        true
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.alive.contains(&entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Live entity ids in creation order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.iter().copied()
    }

    fn storage<T: 'static + Send + Sync>(&self) -> Option<&HashMap<EntityId, T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.as_any().downcast_ref::<HashMap<EntityId, T>>())
    }

    fn storage_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut HashMap<EntityId, T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.as_any_mut().downcast_mut::<HashMap<EntityId, T>>())
    }

    /// Inserts/replaces a component for a live entity. Components for dead
    /// entities are dropped.
    pub fn insert<T: 'static + Send + Sync>(&mut self, entity: EntityId, component: T) {
        if !self.contains(entity) {
            return;
        }
        if self.storage::<T>().is_none() {
            self.storages
                .insert(TypeId::of::<T>(), Box::new(HashMap::<EntityId, T>::new()));
        }
        if let Some(storage) = self.storage_mut::<T>() {
            storage.insert(entity, component);
        }
    }

    /// Removes a component, returning it.
    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<T> {
        self.storage_mut::<T>().and_then(|s| s.remove(&entity))
    }

    /// Gets a component reference.
    pub fn get<T: 'static + Send + Sync>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>().and_then(|storage| storage.get(&entity))
    }

    /// Gets a mutable component reference.
    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.storage_mut::<T>()
            .and_then(|storage| storage.get_mut(&entity))
    }

    /// Iterates entities with a given component.
    pub fn iter<T: 'static + Send + Sync>(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.storage::<T>()
            .into_iter()
            .flat_map(|storage| storage.iter().map(|(k, v)| (*k, v)))
    }
}

/// Common component: position in the instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position(pub Point);

/// Common component: velocity in blocks per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Velocity(pub Vec3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecs_insert_and_get() {
        let mut world = World::default();
        let e = world.spawn();
        world.insert(e, Position(Point::new(1.0, 2.0, 3.0)));
        assert_eq!(world.get::<Position>(e).unwrap().0.x, 1.0);
    }

    #[test]
    fn despawn_clears_every_storage() {
        let mut world = World::default();
        let e = world.spawn();
        world.insert(e, Position::default());
        world.insert(e, Velocity(Vec3::Y));

        assert!(world.despawn(e));
        assert!(!world.despawn(e));
        assert!(world.get::<Position>(e).is_none());
        assert_eq!(world.iter::<Velocity>().count(), 0);
    }

    #[test]
    fn insert_on_dead_entity_is_ignored() {
        let mut world = World::default();
        let e = world.spawn();
        world.despawn(e);
        world.insert(e, Position::default());
        assert!(world.get::<Position>(e).is_none());
    }
}
