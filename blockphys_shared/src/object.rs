//! Physics objects.
//!
//! A physics object couples one rigid body with whatever represents it in
//! the instance. Handlers own objects and drive their lifecycle:
//! `spawn` once, `update` every physics tick while updatable, `destroy` once.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    collision::Shape,
    ecs::{EntityId, Position},
    handler::PhysicsError,
    math::{BlockPos, Point, Vec3},
    physics::{BodyId, PhysicsSpace, RigidBodyDesc},
    world::{DisplayMeta, EntityKind, Instance},
};

/// Handle to an object owned by a `PhysicsHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

/// What an object may touch while being spawned, updated or destroyed.
pub struct ObjectContext<'a> {
    pub space: &'a mut PhysicsSpace,
    pub instance: &'a mut Instance,
}

/// An object with physics attached to it.
pub trait PhysicsObject: Send {
    /// Creates the body (and any representation) at `point`.
    fn spawn(&mut self, ctx: &mut ObjectContext<'_>, point: Point) -> Result<(), PhysicsError>;

    /// Called every physics tick while the object is updatable.
    fn update(&mut self, ctx: &mut ObjectContext<'_>, delta: f32);

    /// Removes the object completely.
    fn destroy(&mut self, ctx: &mut ObjectContext<'_>);

    /// The body, once spawned.
    fn rigid_body(&self) -> Option<BodyId>;

    fn as_entity_object(&self) -> Option<&dyn PhysicsEntityObject> {
        None
    }
}

/// A physics object rendered through an item-display entity.
///
/// Block displays are not used: their origin is a corner rather than the
/// centre, so rotations swing them around the wrong pivot.
pub trait PhysicsEntityObject: PhysicsObject {
    /// The display entity, once spawned.
    fn entity(&self) -> Option<EntityId>;

    fn meta<'a>(&self, instance: &'a Instance) -> Option<&'a DisplayMeta> {
        self.entity()
            .and_then(|e| instance.entities().get::<DisplayMeta>(e))
    }
}

/// A static full-block collider. Has no representation of its own: the
/// block in the world is the visual.
#[derive(Debug, Default)]
pub struct StaticBlockObject {
    block: Option<BlockPos>,
    body: Option<BodyId>,
}

impl StaticBlockObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self) -> Option<BlockPos> {
        self.block
    }
}

impl PhysicsObject for StaticBlockObject {
    fn spawn(&mut self, ctx: &mut ObjectContext<'_>, point: Point) -> Result<(), PhysicsError> {
        if self.body.is_some() {
            return Err(PhysicsError::AlreadySpawned);
        }
        let cell = point.block_pos();
        let body = ctx
            .space
            .add_body(RigidBodyDesc::fixed(Shape::block()).at(cell.center().into()));
        self.block = Some(cell);
        self.body = Some(body);
        Ok(())
    }

    fn update(&mut self, _ctx: &mut ObjectContext<'_>, _delta: f32) {}

    fn destroy(&mut self, ctx: &mut ObjectContext<'_>) {
        if let Some(body) = self.body.take() {
            ctx.space.remove_body(body);
        }
    }

    fn rigid_body(&self) -> Option<BodyId> {
        self.body
    }
}

/// A dynamic body shown by an item display that follows it.
pub struct DisplayObject {
    item: String,
    desc: RigidBodyDesc,
    size: Vec3,
    body: Option<BodyId>,
    entity: Option<EntityId>,
}

impl DisplayObject {
    /// A falling block of `item`, one block in size.
    pub fn block(item: &str) -> Self {
        Self {
            item: item.to_string(),
            desc: RigidBodyDesc::new(Shape::block()),
            size: Vec3::ONE,
            body: None,
            entity: None,
        }
    }

    /// A ball of `item` with the given radius.
    pub fn sphere(item: &str, radius: f32) -> Self {
        Self {
            item: item.to_string(),
            desc: RigidBodyDesc::new(Shape::sphere(radius)),
            size: Vec3::splat(radius * 2.0),
            body: None,
            entity: None,
        }
    }

    /// Adjusts the body before it is spawned (mass, velocity, friction...).
    pub fn with_body(mut self, f: impl FnOnce(RigidBodyDesc) -> RigidBodyDesc) -> Self {
        self.desc = f(self.desc);
        self
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    fn sync_display(&self, ctx: &mut ObjectContext<'_>) {
        let (Some(body), Some(entity)) = (self.body, self.entity) else {
            return;
        };
        let Some(state) = ctx.space.body(body) else {
            debug!(body = ?body, "Display body vanished; skipping sync");
            return;
        };
        let (position, rotation) = (state.position, state.rotation);

        let entities = ctx.instance.entities_mut();
        if let Some(pos) = entities.get_mut::<Position>(entity) {
            pos.0 = position.into();
        }
        if let Some(meta) = entities.get_mut::<DisplayMeta>(entity) {
            meta.left_rotation = rotation.to_array();
            meta.interpolation_start_delta = 0;
        }
    }
}

impl PhysicsObject for DisplayObject {
    fn spawn(&mut self, ctx: &mut ObjectContext<'_>, point: Point) -> Result<(), PhysicsError> {
        if self.body.is_some() {
            return Err(PhysicsError::AlreadySpawned);
        }

        let body = ctx.space.add_body(self.desc.at(point.into()));
        let entity = ctx
            .instance
            .spawn_no_tick_entity(EntityKind::ItemDisplay, point);

        let mut meta = DisplayMeta::new(&self.item);
        meta.scale = self.size;
        meta.left_rotation = self.desc.rotation.to_array();
        ctx.instance.entities_mut().insert(entity, meta);

        self.body = Some(body);
        self.entity = Some(entity);
        debug!(body = ?body, entity = ?entity, item = %self.item, "Display object spawned");
        Ok(())
    }

    fn update(&mut self, ctx: &mut ObjectContext<'_>, _delta: f32) {
        self.sync_display(ctx);
    }

    fn destroy(&mut self, ctx: &mut ObjectContext<'_>) {
        if let Some(body) = self.body.take() {
            ctx.space.remove_body(body);
        }
        if let Some(entity) = self.entity.take() {
            ctx.instance.remove_entity(entity);
        }
    }

    fn rigid_body(&self) -> Option<BodyId> {
        self.body
    }

    fn as_entity_object(&self) -> Option<&dyn PhysicsEntityObject> {
        Some(self)
    }
}

impl PhysicsEntityObject for DisplayObject {
    fn entity(&self) -> Option<EntityId> {
        self.entity
    }
}
