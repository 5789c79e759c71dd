//! Server implementation.
//!
//! A single-threaded host loop: every tick it drains console input, runs
//! entity ticks for each instance, then runs the scheduled physics tick of
//! every physics-enabled instance. Physics runs inline, so handlers and
//! their objects are only ever touched from the tick.
//!
//! Console commands: `status [json]`, `pause [id]`, `resume [id]`, `drop [x y z]`,
//! `clear`, `quit`.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use anyhow::Context;
use blockphys_shared::{
    config::ServerConfig,
    event::EventDispatcher,
    handler::PhysicsHandler,
    math::Point,
    object::{DisplayObject, ObjectId},
    physics::ContactListeners,
    registry::PhysicsRegistry,
    world::{Block, Instance, InstanceId},
};
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Where dropped blocks appear when no position is given.
const DROP_HEIGHT: f64 = 12.0;

/// Spawn point of the default instance, standing on the floor.
pub const SPAWN: Point = Point {
    x: 0.5,
    y: 1.0,
    z: 0.5,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerState {
    Running,
    /// `quit` was issued; the loop exits after the current tick.
    Stopping,
}

/// Snapshot of one instance for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub id: InstanceId,
    pub blocks: usize,
    pub entities: usize,
    /// `None` when the instance has no physics.
    pub bodies: Option<usize>,
    pub objects: Option<usize>,
    pub paused: Option<bool>,
}

/// Snapshot of the whole server for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: ServerState,
    pub tick: u64,
    pub instances: Vec<InstanceStatus>,
}

/// Physics host server.
pub struct PhysicsServer {
    pub cfg: ServerConfig,
    instances: BTreeMap<InstanceId, Instance>,
    physics: PhysicsRegistry,
    events: EventDispatcher,

    tick: u64,
    state: ServerState,
    /// Target of console commands that take no instance id.
    default_instance: Option<InstanceId>,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl PhysicsServer {
    pub fn new(cfg: ServerConfig) -> anyhow::Result<Self> {
        cfg.validate().context("validate config")?;
        let physics = PhysicsRegistry::init(cfg.physics).context("init physics")?;
        Ok(Self {
            cfg,
            instances: BTreeMap::new(),
            physics,
            events: EventDispatcher::new(),
            tick: 0,
            state: ServerState::Running,
            default_instance: None,
            console_rx: None,
        })
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Creates an empty instance without physics.
    pub fn create_instance(&mut self) -> InstanceId {
        let instance = Instance::new();
        let id = instance.id();
        self.instances.insert(id, instance);
        debug!(instance = ?id, "Instance created");
        id
    }

    /// Creates the default instance: a stone floor with physics enabled and
    /// static colliders filled in around spawn.
    pub fn create_default_world(&mut self) -> anyhow::Result<InstanceId> {
        let id = self.create_instance();
        let radius = self.cfg.floor_radius;
        let static_radius = self.cfg.static_radius;

        let instance = self.instances.get_mut(&id).context("instance vanished")?;
        instance.fill_floor(0, radius, &Block::stone());

        let handler = self.physics.create_physics(id, self.cfg.listeners.into());
        handler.set_body_fill_radius(self.cfg.body_fill_radius);
        let colliders = handler.fill_static_blocks(instance, SPAWN, static_radius);
        info!(instance = ?id, colliders = colliders.len(), "Default world ready");

        self.default_instance = Some(id);
        Ok(id)
    }

    pub fn default_instance(&self) -> Option<InstanceId> {
        self.default_instance
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    /// Removes an instance together with its physics.
    pub fn remove_instance(&mut self, id: InstanceId) -> Option<Instance> {
        self.physics.remove_physics(id);
        if self.default_instance == Some(id) {
            self.default_instance = None;
        }
        self.instances.remove(&id)
    }

    /// Enables physics for an existing instance.
    pub fn enable_physics(
        &mut self,
        id: InstanceId,
        listeners: ContactListeners,
    ) -> anyhow::Result<&mut PhysicsHandler> {
        anyhow::ensure!(self.instances.contains_key(&id), "no instance {:?}", id);
        let handler = self.physics.create_physics(id, listeners);
        handler.set_body_fill_radius(self.cfg.body_fill_radius);
        Ok(handler)
    }

    pub fn physics(&self) -> &PhysicsRegistry {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsRegistry {
        &mut self.physics
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// Gives `f` an instance and its physics handler together.
    pub fn with_physics<R>(
        &mut self,
        id: InstanceId,
        f: impl FnOnce(&mut Instance, &mut PhysicsHandler) -> R,
    ) -> anyhow::Result<R> {
        let instance = self
            .instances
            .get_mut(&id)
            .with_context(|| format!("no instance {:?}", id))?;
        let handler = self.physics.require_handler(id)?;
        Ok(f(instance, handler))
    }

    /// Drops a falling block of `item` at `point`.
    pub fn drop_block(&mut self, id: InstanceId, point: Point, item: &str) -> anyhow::Result<ObjectId> {
        let object = Box::new(DisplayObject::block(item));
        let spawned = self.with_physics(id, |instance, handler| {
            handler.spawn_entity_object(instance, point, object)
        })??;
        info!(instance = ?id, object = spawned.0, ?point, item, "Block dropped");
        Ok(spawned)
    }

    /// Destroys every entity-backed physics object in the instance.
    pub fn clear_dynamic(&mut self, id: InstanceId) -> anyhow::Result<usize> {
        self.with_physics(id, |instance, handler| {
            let dynamic: Vec<ObjectId> = handler.updatable_objects().to_vec();
            dynamic
                .into_iter()
                .filter(|object| handler.destroy_object(instance, *object))
                .count()
        })
    }

    pub fn status_report(&self) -> StatusReport {
        let instances = self
            .instances
            .iter()
            .map(|(id, instance)| {
                let handler = self.physics.get_handler(*id);
                InstanceStatus {
                    id: *id,
                    blocks: instance.block_count(),
                    entities: instance.entities().len(),
                    bodies: handler.map(|h| h.space().len()),
                    objects: handler.map(|h| h.object_count()),
                    paused: handler.map(|h| h.is_paused()),
                }
            })
            .collect();
        StatusReport {
            state: self.state,
            tick: self.tick,
            instances,
        }
    }

    /// Runs the server for a number of ticks at the configured rate.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = tokio::time::Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step()?;
            if self.state == ServerState::Stopping {
                break;
            }
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// One host tick at the current wall time.
    pub fn step(&mut self) -> anyhow::Result<()> {
        self.step_at(Instant::now())
    }

    /// One host tick. Physics handlers measure their delta against `now`.
    pub fn step_at(&mut self, now: Instant) -> anyhow::Result<()> {
        self.process_console_commands()?;

        let dt = 1.0 / self.cfg.tick_hz as f32;
        for instance in self.instances.values_mut() {
            instance.tick_entities(dt);
        }

        for (id, handler) in self.physics.handlers_mut() {
            if let Some(instance) = self.instances.get_mut(id) {
                handler.run_tick(now, instance, &mut self.events);
            }
        }

        self.tick += 1;
        Ok(())
    }

    fn process_console_commands(&mut self) -> anyhow::Result<()> {
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            for out in self.exec_console(&line)? {
                println!("{}", out);
            }
        }
        Ok(())
    }

    fn target_instance(&self, arg: Option<&str>) -> Result<InstanceId, String> {
        match arg {
            Some(raw) => raw
                .parse::<u64>()
                .map(InstanceId)
                .map_err(|_| format!("Bad instance id '{}'", raw)),
            None => self
                .default_instance
                .ok_or_else(|| "No default instance".to_string()),
        }
    }

    /// Executes a console command and returns the lines to print.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "status" => {
                let report = self.status_report();
                if tokens.get(1) == Some(&"json") {
                    let json = serde_json::to_string_pretty(&report).context("serialize status")?;
                    return Ok(json.lines().map(str::to_string).collect());
                }
                let mut out = vec![
                    format!("Server state: {:?}", report.state),
                    format!("Tick: {}", report.tick),
                    format!("Instances: {}", report.instances.len()),
                ];
                for i in &report.instances {
                    match (i.bodies, i.objects, i.paused) {
                        (Some(bodies), Some(objects), Some(paused)) => out.push(format!(
                            "  {}: blocks={} entities={} bodies={} objects={} paused={}",
                            i.id.0, i.blocks, i.entities, bodies, objects, paused
                        )),
                        _ => out.push(format!(
                            "  {}: blocks={} entities={} (no physics)",
                            i.id.0, i.blocks, i.entities
                        )),
                    }
                }
                Ok(out)
            }
            cmd @ ("pause" | "resume") => {
                let id = match self.target_instance(tokens.get(1).copied()) {
                    Ok(id) => id,
                    Err(msg) => return Ok(vec![msg]),
                };
                match self.physics.get_handler_mut(id) {
                    Some(handler) => {
                        handler.set_paused(cmd == "pause");
                        Ok(vec![format!("Physics {}d for instance {}", cmd, id.0)])
                    }
                    None => Ok(vec![format!("No physics for instance {}", id.0)]),
                }
            }
            "drop" => {
                let Some(id) = self.default_instance else {
                    return Ok(vec!["No default instance".to_string()]);
                };
                let point = match &tokens[1..] {
                    [] => {
                        let spread = f64::from(self.cfg.floor_radius.max(1)) / 2.0;
                        let mut rng = rand::thread_rng();
                        Point::new(
                            rng.gen_range(-spread..=spread),
                            DROP_HEIGHT,
                            rng.gen_range(-spread..=spread),
                        )
                    }
                    [x, y, z] => match (x.parse::<f64>(), y.parse::<f64>(), z.parse::<f64>()) {
                        (Ok(x), Ok(y), Ok(z)) => Point::new(x, y, z),
                        _ => return Ok(vec!["Usage: drop [x y z]".to_string()]),
                    },
                    _ => return Ok(vec!["Usage: drop [x y z]".to_string()]),
                };
                match self.drop_block(id, point, "stone") {
                    Ok(object) => Ok(vec![format!(
                        "Dropped object {} at {:.2} {:.2} {:.2}",
                        object.0, point.x, point.y, point.z
                    )]),
                    Err(e) => Ok(vec![format!("Drop failed: {:#}", e)]),
                }
            }
            "clear" => {
                let Some(id) = self.default_instance else {
                    return Ok(vec!["No default instance".to_string()]);
                };
                let removed = self.clear_dynamic(id)?;
                Ok(vec![format!("Removed {} objects", removed)])
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.state = ServerState::Stopping;
                Ok(vec!["Bye".to_string()])
            }
            other => Ok(vec![format!("Unknown command '{}'", other)]),
        }
    }
}

/// Helper for tests: a server with the default world and the given tick rate.
pub fn headless(tick_hz: u32) -> anyhow::Result<(PhysicsServer, InstanceId)> {
    let cfg = ServerConfig {
        tick_hz,
        floor_radius: 4,
        static_radius: 3.0,
        ..ServerConfig::default()
    };
    let mut server = PhysicsServer::new(cfg)?;
    let id = server.create_default_world()?;
    Ok((server, id))
}
