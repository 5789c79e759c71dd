//! Per-instance physics handler.
//!
//! Owns one `PhysicsSpace` and every physics object placed in an instance.
//! Three lookup maps tie objects to the world:
//! - point map: block cell -> object (static colliders standing in for blocks)
//! - entity map: entity -> object (display-driven bodies)
//! - collision map: body -> object (only mapped bodies produce contact events)
//!
//! The handler is ticked by the server once per host tick with the real time
//! elapsed since its previous tick.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    time::Instant,
};

use tracing::{debug, info, trace, warn};

use crate::{
    config::{ConfigError, PhysicsConfig},
    ecs::EntityId,
    event::{ContactEndedEvent, ContactOngoingEvent, ContactStartedEvent, EventDispatcher},
    math::{BlockPos, Point},
    object::{ObjectContext, ObjectId, PhysicsObject, StaticBlockObject},
    physics::{BodyId, ContactKind, ContactListeners, ContactNotice, PhysicsSpace},
    sphere::{blocks_in_sphere, nearby_blocks},
    world::{Instance, InstanceId},
};

/// Physics errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// No object with this id is owned by the handler.
    UnknownObject(ObjectId),
    /// The object has no rigid body yet.
    NotSpawned(ObjectId),
    /// `spawn` was called twice.
    AlreadySpawned,
    /// An entity mapping was requested for an object without an entity.
    NoEntity(ObjectId),
    /// No physics handler exists for the instance.
    UnknownInstance(InstanceId),
    InvalidConfig(ConfigError),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::UnknownObject(id) => write!(f, "unknown physics object {}", id.0),
            PhysicsError::NotSpawned(id) => write!(f, "physics object {} is not spawned", id.0),
            PhysicsError::AlreadySpawned => write!(f, "physics object already spawned"),
            PhysicsError::NoEntity(id) => write!(f, "physics object {} has no entity", id.0),
            PhysicsError::UnknownInstance(id) => write!(f, "no physics for instance {}", id.0),
            PhysicsError::InvalidConfig(e) => write!(f, "invalid physics config: {}", e),
        }
    }
}

impl std::error::Error for PhysicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PhysicsError::InvalidConfig(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PhysicsError {
    fn from(e: ConfigError) -> Self {
        PhysicsError::InvalidConfig(e)
    }
}

pub struct PhysicsHandler {
    instance: InstanceId,
    space: PhysicsSpace,
    paused: bool,
    last_ran: Instant,
    last_delta: f32,

    next_object: u64,
    objects: BTreeMap<ObjectId, Box<dyn PhysicsObject>>,
    updatable: Vec<ObjectId>,
    point_map: HashMap<BlockPos, ObjectId>,
    entity_map: HashMap<EntityId, ObjectId>,
    collision_map: HashMap<BodyId, ObjectId>,

    /// Offsets checked around each moving body for static colliders.
    body_fill: Vec<Point>,
}

impl PhysicsHandler {
    pub fn new(instance: InstanceId, config: PhysicsConfig, listeners: ContactListeners) -> Self {
        info!(instance = ?instance, listeners = ?listeners, "Physics handler created");
        Self {
            instance,
            space: PhysicsSpace::new(config).with_listeners(listeners),
            paused: false,
            last_ran: Instant::now(),
            last_delta: 0.0,
            next_object: 1,
            objects: BTreeMap::new(),
            updatable: Vec::new(),
            point_map: HashMap::new(),
            entity_map: HashMap::new(),
            collision_map: HashMap::new(),
            body_fill: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub fn space(&self) -> &PhysicsSpace {
        &self.space
    }

    pub fn space_mut(&mut self) -> &mut PhysicsSpace {
        &mut self.space
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A paused handler keeps its clock running but skips simulation, so
    /// resuming does not replay the paused time.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            debug!(instance = ?self.instance, paused, "Physics pause toggled");
        }
        self.paused = paused;
    }

    /// Solid blocks within `radius` of every updatable dynamic body get a
    /// static collider before each step. Zero or negative turns it off.
    pub fn set_body_fill_radius(&mut self, radius: f64) {
        self.body_fill = if radius > 0.0 {
            blocks_in_sphere(radius)
        } else {
            Vec::new()
        };
    }

    /// Seconds between the two most recent scheduled ticks.
    pub fn last_delta(&self) -> f32 {
        self.last_delta
    }

    /// Scheduled tick: measures the time since the previous one and steps
    /// the simulation by it.
    pub fn run_tick(&mut self, now: Instant, instance: &mut Instance, events: &mut EventDispatcher) {
        let delta = now.saturating_duration_since(self.last_ran).as_secs_f32();
        self.last_ran = now;
        self.last_delta = delta;
        if !self.paused {
            self.update(delta, instance, events);
        }
    }

    /// Fills colliders around moving bodies, steps the space by `delta`
    /// seconds, publishes contact events for mapped bodies, then updates
    /// every updatable object.
    pub fn update(&mut self, delta: f32, instance: &mut Instance, events: &mut EventDispatcher) {
        self.fill_around_bodies(instance);

        for notice in self.space.update(delta) {
            self.publish(notice, events);
        }

        let Self {
            space,
            objects,
            updatable,
            ..
        } = self;
        let mut ctx = ObjectContext { space, instance };
        for id in updatable.iter() {
            if let Some(object) = objects.get_mut(id) {
                object.update(&mut ctx, delta);
            }
        }
    }

    fn fill_around_bodies(&mut self, instance: &mut Instance) {
        if self.body_fill.is_empty() {
            return;
        }
        let centres: Vec<Point> = self
            .updatable
            .iter()
            .filter_map(|id| self.objects.get(id)?.rigid_body())
            .filter_map(|body| self.space.body(body))
            .filter(|body| !body.is_static())
            .map(|body| body.position.into())
            .collect();

        let offsets = std::mem::take(&mut self.body_fill);
        for centre in centres {
            self.fill_with_offsets(instance, centre, &offsets);
        }
        self.body_fill = offsets;
    }

    fn publish(&self, notice: ContactNotice, events: &mut EventDispatcher) {
        let (Some(&a), Some(&b)) = (
            self.collision_map.get(&notice.body_a),
            self.collision_map.get(&notice.body_b),
        ) else {
            return;
        };
        trace!(instance = ?self.instance, kind = ?notice.kind, a = a.0, b = b.0, "Contact");
        match notice.kind {
            ContactKind::Started => {
                events.call(ContactStartedEvent::new(self.instance, a, b));
            }
            ContactKind::Ongoing => {
                events.call(ContactOngoingEvent::new(self.instance, a, b));
            }
            ContactKind::Ended => {
                events.call(ContactEndedEvent::new(self.instance, a, b));
            }
        }
    }

    // -- object arena --

    /// Takes ownership of an object. It is not mapped or updated until asked.
    pub fn insert_object(&mut self, object: Box<dyn PhysicsObject>) -> ObjectId {
        let id = ObjectId(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&dyn PhysicsObject> {
        self.objects.get(&id).map(|o| &**o)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut (dyn PhysicsObject + 'static)> {
        self.objects.get_mut(&id).map(|o| &mut **o)
    }

    /// Hands an object back without destroying it, dropping every mapping.
    pub fn take_object(&mut self, id: ObjectId) -> Option<Box<dyn PhysicsObject>> {
        let object = self.objects.remove(&id)?;
        self.unmap(id);
        Some(object)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    fn unmap(&mut self, id: ObjectId) {
        self.point_map.retain(|_, o| *o != id);
        self.entity_map.retain(|_, o| *o != id);
        self.collision_map.retain(|_, o| *o != id);
        self.updatable.retain(|o| *o != id);
    }

    fn body_of(&self, id: ObjectId) -> Result<BodyId, PhysicsError> {
        self.objects
            .get(&id)
            .ok_or(PhysicsError::UnknownObject(id))?
            .rigid_body()
            .ok_or(PhysicsError::NotSpawned(id))
    }

    // -- maps --

    pub fn has_physics_object(&self, body: BodyId) -> bool {
        self.collision_map.contains_key(&body)
    }

    /// Object whose rigid body is `body`, if it is mapped.
    pub fn get_from_body(&self, body: BodyId) -> Option<ObjectId> {
        self.collision_map.get(&body).copied()
    }

    pub fn get_from_point(&self, point: Point) -> Option<ObjectId> {
        self.point_map.get(&point.block_pos()).copied()
    }

    pub fn get_from_entity(&self, entity: EntityId) -> Option<ObjectId> {
        self.entity_map.get(&entity).copied()
    }

    /// Maps the cell containing `point` to `object` and registers its body
    /// for contact events. Replaces any object already at that cell.
    pub fn add_to_point(&mut self, point: Point, object: ObjectId) -> Result<(), PhysicsError> {
        let body = self.body_of(object)?;
        self.point_map.insert(point.block_pos(), object);
        self.collision_map.insert(body, object);
        Ok(())
    }

    pub fn add_to_entity(&mut self, entity: EntityId, object: ObjectId) -> Result<(), PhysicsError> {
        let body = self.body_of(object)?;
        self.entity_map.insert(entity, object);
        self.collision_map.insert(body, object);
        Ok(())
    }

    /// Unmaps the cell containing `point`. The object itself is kept.
    pub fn remove_from_point(&mut self, point: Point) -> Option<ObjectId> {
        let object = self.point_map.remove(&point.block_pos())?;
        self.unmap_body(object);
        Some(object)
    }

    pub fn remove_from_entity(&mut self, entity: EntityId) -> Option<ObjectId> {
        let object = self.entity_map.remove(&entity)?;
        self.unmap_body(object);
        Some(object)
    }

    fn unmap_body(&mut self, object: ObjectId) {
        if let Some(body) = self.objects.get(&object).and_then(|o| o.rigid_body()) {
            self.collision_map.remove(&body);
        }
    }

    pub fn exists_at_point(&self, point: Point) -> bool {
        self.point_map.contains_key(&point.block_pos())
    }

    pub fn exists_at_entity(&self, entity: EntityId) -> bool {
        self.entity_map.contains_key(&entity)
    }

    /// Adds `object` to the per-tick update list. Adding twice is a no-op.
    pub fn add_updatable(&mut self, object: ObjectId) {
        if !self.updatable.contains(&object) {
            self.updatable.push(object);
        }
    }

    pub fn remove_updatable(&mut self, object: ObjectId) -> bool {
        let before = self.updatable.len();
        self.updatable.retain(|o| *o != object);
        self.updatable.len() != before
    }

    pub fn contains_updatable(&self, object: ObjectId) -> bool {
        self.updatable.contains(&object)
    }

    pub fn updatable_objects(&self) -> &[ObjectId] {
        &self.updatable
    }

    // -- lifecycle helpers --

    /// Spawns `object` at `point` and maps it to that cell.
    pub fn spawn_at_point(
        &mut self,
        instance: &mut Instance,
        point: Point,
        object: Box<dyn PhysicsObject>,
    ) -> Result<ObjectId, PhysicsError> {
        let id = self.spawn_object(instance, point, object)?;
        self.add_to_point(point, id)?;
        Ok(id)
    }

    /// Spawns an entity-backed object, maps its entity and marks it
    /// updatable so the display follows the body.
    pub fn spawn_entity_object(
        &mut self,
        instance: &mut Instance,
        point: Point,
        object: Box<dyn PhysicsObject>,
    ) -> Result<ObjectId, PhysicsError> {
        let id = self.spawn_object(instance, point, object)?;
        let entity = self
            .objects
            .get(&id)
            .and_then(|o| o.as_entity_object())
            .and_then(|e| e.entity());
        let Some(entity) = entity else {
            self.destroy_object(instance, id);
            return Err(PhysicsError::NoEntity(id));
        };
        self.add_to_entity(entity, id)?;
        self.add_updatable(id);
        Ok(id)
    }

    fn spawn_object(
        &mut self,
        instance: &mut Instance,
        point: Point,
        mut object: Box<dyn PhysicsObject>,
    ) -> Result<ObjectId, PhysicsError> {
        let mut ctx = ObjectContext {
            space: &mut self.space,
            instance,
        };
        object.spawn(&mut ctx, point)?;
        let id = self.insert_object(object);
        debug!(instance = ?self.instance, object = id.0, ?point, "Physics object spawned");
        Ok(id)
    }

    /// Runs the object's destroy hook and forgets it. Returns false if the
    /// object is unknown.
    pub fn destroy_object(&mut self, instance: &mut Instance, id: ObjectId) -> bool {
        let Some(mut object) = self.take_object(id) else {
            return false;
        };
        let mut ctx = ObjectContext {
            space: &mut self.space,
            instance,
        };
        object.destroy(&mut ctx);
        debug!(instance = ?self.instance, object = id.0, "Physics object destroyed");
        true
    }

    /// Gives every solid block within `radius` of `center` a static
    /// collider, skipping cells that already have one.
    pub fn fill_static_blocks(
        &mut self,
        instance: &mut Instance,
        center: Point,
        radius: f64,
    ) -> Vec<ObjectId> {
        self.fill_with_offsets(instance, center, &blocks_in_sphere(radius))
    }

    fn fill_with_offsets(
        &mut self,
        instance: &mut Instance,
        center: Point,
        offsets: &[Point],
    ) -> Vec<ObjectId> {
        let solids = nearby_blocks(center, instance, offsets, |wb| {
            wb.block.is_solid() && !self.exists_at_point(wb.pos)
        });

        let mut added = Vec::with_capacity(solids.len());
        for wb in solids {
            if self.exists_at_point(wb.pos) {
                continue;
            }
            match self.spawn_at_point(instance, wb.pos, Box::new(StaticBlockObject::new())) {
                Ok(id) => added.push(id),
                Err(e) => warn!(pos = ?wb.pos, error = %e, "Static block collider failed"),
            }
        }
        if !added.is_empty() {
            debug!(instance = ?self.instance, count = added.len(), "Static block colliders added");
        }
        added
    }
}
