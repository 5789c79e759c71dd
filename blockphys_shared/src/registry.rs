//! Physics registry: which instances have rigid-body physics.

use std::collections::{btree_map::Entry, BTreeMap};

use tracing::info;

use crate::{
    config::PhysicsConfig,
    handler::{PhysicsError, PhysicsHandler},
    physics::ContactListeners,
    world::InstanceId,
};

/// Owns one `PhysicsHandler` per instance with physics enabled.
pub struct PhysicsRegistry {
    config: PhysicsConfig,
    handlers: BTreeMap<InstanceId, PhysicsHandler>,
}

impl PhysicsRegistry {
    /// Prepares the engine. Must succeed before any handler is created.
    pub fn init(config: PhysicsConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        info!(
            timestep = config.fixed_timestep,
            max_substeps = config.max_substeps,
            iterations = config.solver_iterations,
            "Rigid body physics ready"
        );
        Ok(Self {
            config,
            handlers: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Enables physics for `instance`, replacing any existing handler.
    pub fn create_physics(
        &mut self,
        instance: InstanceId,
        listeners: ContactListeners,
    ) -> &mut PhysicsHandler {
        let handler = PhysicsHandler::new(instance, self.config, listeners);
        match self.handlers.entry(instance) {
            Entry::Occupied(mut slot) => {
                info!(instance = ?instance, "Replaced existing physics handler");
                slot.insert(handler);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(handler),
        }
    }

    pub fn remove_physics(&mut self, instance: InstanceId) -> Option<PhysicsHandler> {
        let removed = self.handlers.remove(&instance);
        if removed.is_some() {
            info!(instance = ?instance, "Physics removed");
        }
        removed
    }

    pub fn get_handler(&self, instance: InstanceId) -> Option<&PhysicsHandler> {
        self.handlers.get(&instance)
    }

    pub fn get_handler_mut(&mut self, instance: InstanceId) -> Option<&mut PhysicsHandler> {
        self.handlers.get_mut(&instance)
    }

    /// Like `get_handler_mut`, but an error for callers that propagate.
    pub fn require_handler(&mut self, instance: InstanceId) -> Result<&mut PhysicsHandler, PhysicsError> {
        self.handlers
            .get_mut(&instance)
            .ok_or(PhysicsError::UnknownInstance(instance))
    }

    pub fn has_physics(&self, instance: InstanceId) -> bool {
        self.handlers.contains_key(&instance)
    }

    pub fn instances(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.handlers.keys().copied()
    }

    pub fn handlers_mut(&mut self) -> impl Iterator<Item = (&InstanceId, &mut PhysicsHandler)> {
        self.handlers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ConfigError, math::Point, object::StaticBlockObject, world::Instance};

    #[test]
    fn init_rejects_bad_config() {
        let cfg = PhysicsConfig {
            solver_iterations: 0,
            ..PhysicsConfig::default()
        };
        assert!(matches!(
            PhysicsRegistry::init(cfg),
            Err(PhysicsError::InvalidConfig(ConfigError::NoSolverIterations))
        ));
    }

    #[test]
    fn create_replaces_and_remove_forgets() -> Result<(), PhysicsError> {
        let mut registry = PhysicsRegistry::init(PhysicsConfig::default())?;
        let mut instance = Instance::new();
        let id = instance.id();

        let handler = registry.create_physics(id, ContactListeners::new(true, false, true));
        handler.spawn_at_point(&mut instance, Point::ZERO, Box::new(StaticBlockObject::new()))?;
        assert_eq!(handler.object_count(), 1);
        assert!(!handler.space().listeners().contains(ContactListeners::ONGOING));

        let fresh = registry.create_physics(id, ContactListeners::all());
        assert_eq!(fresh.object_count(), 0);
        assert_eq!(registry.len(), 1);
        assert!(registry.has_physics(id));
        assert_eq!(registry.instances().collect::<Vec<_>>(), vec![id]);

        assert!(registry.remove_physics(id).is_some());
        assert!(registry.get_handler(id).is_none());
        assert!(registry.remove_physics(id).is_none());
        assert_eq!(
            registry.require_handler(id).err(),
            Some(PhysicsError::UnknownInstance(id))
        );
        Ok(())
    }
}
