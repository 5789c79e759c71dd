//! World instances.
//!
//! An `Instance` is one independent world: a sparse block grid plus the
//! entities living in it. The server ticks every instance; physics is
//! attached separately through `registry::PhysicsRegistry`.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{
    ecs::{EntityId, Position, Velocity, World},
    math::{BlockPos, Point, Vec3},
};

/// Host gravity for regular entities, blocks per tick².
pub const ENTITY_GRAVITY: f32 = 0.08;

/// Host ticks per second the per-tick constants are tuned for.
pub const TICKS_PER_SECOND: f32 = 20.0;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    pub fn new_unique() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A block type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Block {
    #[default]
    Air,
    Solid {
        name: String,
    },
}

impl Block {
    pub fn solid(name: &str) -> Self {
        Block::Solid {
            name: name.to_string(),
        }
    }

    pub fn stone() -> Self {
        Self::solid("stone")
    }

    pub fn is_air(&self) -> bool {
        matches!(self, Block::Air)
    }

    pub fn is_solid(&self) -> bool {
        matches!(self, Block::Solid { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Block::Air => "air",
            Block::Solid { name } => name,
        }
    }
}

/// A block together with where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldBlock {
    pub pos: Point,
    pub block: Block,
}

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    ItemDisplay,
    BlockDisplay,
    Marker,
    Item,
}

/// How the host treats an entity on its own tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFlags {
    /// Host movement physics (velocity integration).
    pub has_physics: bool,
    pub no_gravity: bool,
    /// Whether the entity receives host ticks at all.
    pub ticks: bool,
}

impl Default for EntityFlags {
    fn default() -> Self {
        Self {
            has_physics: true,
            no_gravity: false,
            ticks: true,
        }
    }
}

impl EntityFlags {
    /// An entity the host never moves: no ticks, no movement, no gravity.
    /// Used for bodies driven by the rigid-body engine.
    pub const NO_TICK: Self = Self {
        has_physics: false,
        no_gravity: true,
        ticks: false,
    };
}

/// Item-display metadata: what a display entity renders and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMeta {
    /// Item rendered, by block/item name.
    pub item: String,
    pub translation: Vec3,
    pub scale: Vec3,
    /// `[x, y, z, w]`.
    pub left_rotation: [f32; 4],
    /// `[x, y, z, w]`.
    pub right_rotation: [f32; 4],
    /// Ticks the client interpolates a transform change over.
    pub interpolation_duration: i32,
    /// Ticks until that interpolation begins.
    pub interpolation_start_delta: i32,
}

impl DisplayMeta {
    pub fn new(item: &str) -> Self {
        Self {
            item: item.to_string(),
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            left_rotation: [0.0, 0.0, 0.0, 1.0],
            right_rotation: [0.0, 0.0, 0.0, 1.0],
            interpolation_duration: 1,
            interpolation_start_delta: 0,
        }
    }
}

/// One world: blocks and entities.
pub struct Instance {
    id: InstanceId,
    blocks: HashMap<BlockPos, Block>,
    entities: World,
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl Instance {
    pub fn new() -> Self {
        Self {
            id: InstanceId::new_unique(),
            blocks: HashMap::new(),
            entities: World::default(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Places a block. Setting air clears the cell.
    pub fn set_block(&mut self, pos: BlockPos, block: Block) {
        if block.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    /// Block in the cell containing `point`. Empty cells are air.
    pub fn get_block(&self, point: Point) -> Block {
        self.block_at(point.block_pos())
    }

    pub fn block_at(&self, pos: BlockPos) -> Block {
        self.blocks.get(&pos).cloned().unwrap_or_default()
    }

    /// Number of non-air blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Fills a flat square of `block` at height `y`.
    pub fn fill_floor(&mut self, y: i32, radius: i32, block: &Block) {
        for x in -radius..=radius {
            for z in -radius..=radius {
                self.set_block(BlockPos::new(x, y, z), block.clone());
            }
        }
    }

    pub fn entities(&self) -> &World {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut World {
        &mut self.entities
    }

    /// Spawns a regular entity that the host moves and pulls down.
    pub fn spawn_entity(&mut self, kind: EntityKind, pos: Point) -> EntityId {
        self.spawn_with_flags(kind, pos, EntityFlags::default())
    }

    /// Spawns an entity the host leaves alone, for use with custom physics.
    pub fn spawn_no_tick_entity(&mut self, kind: EntityKind, pos: Point) -> EntityId {
        self.spawn_with_flags(kind, pos, EntityFlags::NO_TICK)
    }

    fn spawn_with_flags(&mut self, kind: EntityKind, pos: Point, flags: EntityFlags) -> EntityId {
        let id = self.entities.spawn();
        self.entities.insert(id, kind);
        self.entities.insert(id, flags);
        self.entities.insert(id, Position(pos));
        self.entities.insert(id, Velocity::default());
        id
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.entities.despawn(entity)
    }

    pub fn entity_position(&self, entity: EntityId) -> Option<Point> {
        self.entities.get::<Position>(entity).map(|p| p.0)
    }

    /// Moves an entity. Returns false if it does not exist.
    pub fn teleport(&mut self, entity: EntityId, pos: Point) -> bool {
        match self.entities.get_mut::<Position>(entity) {
            Some(p) => {
                p.0 = pos;
                true
            }
            None => false,
        }
    }

    /// Host entity tick. `dt` is in seconds; per-tick constants are scaled
    /// to it so a 20 Hz tick applies them exactly once.
    pub fn tick_entities(&mut self, dt: f32) {
        let ticks = dt * TICKS_PER_SECOND;
        let movers: Vec<(EntityId, EntityFlags)> = self
            .entities
            .iter::<EntityFlags>()
            .filter(|(_, f)| f.ticks && f.has_physics)
            .map(|(id, f)| (id, *f))
            .collect();

        for (id, flags) in movers {
            let Some(velocity) = self.entities.get_mut::<Velocity>(id) else {
                continue;
            };
            if !flags.no_gravity {
                velocity.0.y -= ENTITY_GRAVITY * ticks;
            }
            let step = velocity.0 * ticks;
            if let Some(pos) = self.entities.get_mut::<Position>(id) {
                pos.0 = pos.0.add(step.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cells_read_as_air() {
        let mut instance = Instance::new();
        assert!(instance.get_block(Point::new(3.2, 1.0, -4.0)).is_air());

        instance.set_block(BlockPos::new(3, 1, -4), Block::stone());
        assert_eq!(instance.get_block(Point::new(3.9, 1.5, -3.1)).name(), "stone");

        instance.set_block(BlockPos::new(3, 1, -4), Block::Air);
        assert_eq!(instance.block_count(), 0);
    }

    #[test]
    fn no_tick_entity_is_left_alone() {
        let mut instance = Instance::new();
        let start = Point::new(0.0, 10.0, 0.0);
        let regular = instance.spawn_entity(EntityKind::Item, start);
        let display = instance.spawn_no_tick_entity(EntityKind::ItemDisplay, start);

        for _ in 0..5 {
            instance.tick_entities(1.0 / TICKS_PER_SECOND);
        }

        assert!(instance.entity_position(regular).unwrap().y < start.y);
        assert_eq!(instance.entity_position(display), Some(start));
        assert_eq!(
            instance.entities().get::<EntityFlags>(display),
            Some(&EntityFlags::NO_TICK)
        );
    }

    #[test]
    fn instance_ids_are_unique() {
        assert_ne!(Instance::new().id(), Instance::new().id());
    }
}
