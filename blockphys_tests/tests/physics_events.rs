//! End-to-end physics tests driven through the server tick.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Context;
use blockphys_server::server::{headless, PhysicsServer};
use blockphys_shared::{
    config::{ListenerConfig, ServerConfig},
    event::{
        CancellableEvent, ContactEndedEvent, ContactOngoingEvent, ContactStartedEvent,
        RigidBodyEvent,
    },
    math::{Point, Vec3},
    object::ObjectId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Steps the server `ticks` times on a synthetic 20 Hz clock.
struct Clock {
    now: Instant,
}

impl Clock {
    fn new() -> Self {
        Self { now: Instant::now() }
    }

    fn run(&mut self, server: &mut PhysicsServer, ticks: u32) -> anyhow::Result<()> {
        for _ in 0..ticks {
            self.now += Duration::from_millis(50);
            server.step_at(self.now)?;
        }
        Ok(())
    }
}

fn record<E>(server: &mut PhysicsServer) -> Arc<Mutex<Vec<(ObjectId, ObjectId)>>>
where
    E: RigidBodyEvent + ContactPair,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    server.events_mut().add_listener(move |e: &mut E| {
        sink.lock().unwrap().push((e.physics_object(), e.second()));
    });
    seen
}

trait ContactPair {
    fn second(&self) -> ObjectId;
}

impl ContactPair for ContactStartedEvent {
    fn second(&self) -> ObjectId {
        self.second_physics_object()
    }
}

impl ContactPair for ContactOngoingEvent {
    fn second(&self) -> ObjectId {
        self.second_physics_object()
    }
}

impl ContactPair for ContactEndedEvent {
    fn second(&self) -> ObjectId {
        self.second_physics_object()
    }
}

#[test]
fn dropped_block_lands_and_reports_contacts() -> anyhow::Result<()> {
    init_tracing();
    let (mut server, world) = headless(20)?;
    let started = record::<ContactStartedEvent>(&mut server);
    let ongoing = record::<ContactOngoingEvent>(&mut server);
    let ended = record::<ContactEndedEvent>(&mut server);

    let cube = server.drop_block(world, Point::new(0.5, 3.0, 0.5), "stone")?;
    let mut clock = Clock::new();
    clock.run(&mut server, 40)?;

    let handler = server.physics().get_handler(world).context("physics")?;
    let floor = handler
        .get_from_point(Point::new(0.5, 0.5, 0.5))
        .context("floor collider")?;

    {
        let started = started.lock().unwrap();
        assert!(
            started.contains(&(floor, cube)) || started.contains(&(cube, floor)),
            "started: {:?}",
            started
        );
    }
    assert!(!ongoing.lock().unwrap().is_empty());
    assert!(ended.lock().unwrap().is_empty());

    // The display follows the body down to the floor.
    let body = handler.object(cube).and_then(|o| o.rigid_body()).context("body")?;
    let entity = handler
        .object(cube)
        .and_then(|o| o.as_entity_object())
        .and_then(|e| e.entity())
        .context("entity")?;
    let resting = handler.space().body(body).context("body state")?.position;
    assert!((resting.y - 1.5).abs() < 0.1, "y = {}", resting.y);
    let shown = server
        .instance(world)
        .and_then(|i| i.entity_position(entity))
        .context("display")?;
    assert!((shown.y - 1.5).abs() < 0.1);

    // Lift it clear of the floor: the pair ends.
    server
        .physics_mut()
        .get_handler_mut(world)
        .context("physics")?
        .space_mut()
        .set_position(body, Vec3::new(0.5, 20.0, 0.5));
    clock.run(&mut server, 1)?;
    assert!(ended
        .lock()
        .unwrap()
        .iter()
        .any(|(a, b)| *a == cube || *b == cube));
    Ok(())
}

#[test]
fn blocks_dropped_far_from_spawn_land_on_the_floor() -> anyhow::Result<()> {
    init_tracing();
    let mut server = PhysicsServer::new(ServerConfig::default())?;
    let world = server.create_default_world()?;

    // Both spots are solid floor well outside the colliders laid around spawn.
    let far = server.drop_block(world, Point::new(8.5, 12.0, 8.5), "stone")?;
    let seam = server.drop_block(world, Point::new(-8.0, 12.0, 8.0), "stone")?;
    Clock::new().run(&mut server, 100)?;

    let handler = server.physics().get_handler(world).context("physics")?;
    assert!(handler.exists_at_point(Point::new(8.5, 0.5, 8.5)));
    for object in [far, seam] {
        let body = handler.object(object).and_then(|o| o.rigid_body()).context("body")?;
        let y = handler.space().body(body).context("state")?.position.y;
        assert!((y - 1.5).abs() < 0.1, "object {} rests at y = {}", object.0, y);
    }
    Ok(())
}

#[test]
fn cancelled_contact_skips_later_listeners() -> anyhow::Result<()> {
    init_tracing();
    let (mut server, world) = headless(20)?;
    server
        .events_mut()
        .add_listener(|e: &mut ContactStartedEvent| e.set_cancelled(true));
    let late = record::<ContactStartedEvent>(&mut server);

    server.drop_block(world, Point::new(0.5, 2.0, 0.5), "stone")?;
    Clock::new().run(&mut server, 30)?;

    assert!(late.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn disabled_listeners_stay_quiet() -> anyhow::Result<()> {
    init_tracing();
    let cfg = ServerConfig {
        floor_radius: 2,
        static_radius: 2.0,
        listeners: ListenerConfig {
            started: true,
            ongoing: false,
            ended: false,
        },
        ..ServerConfig::default()
    };
    let mut server = PhysicsServer::new(cfg)?;
    let world = server.create_default_world()?;
    let started = record::<ContactStartedEvent>(&mut server);
    let ongoing = record::<ContactOngoingEvent>(&mut server);

    server.drop_block(world, Point::new(0.5, 2.0, 0.5), "stone")?;
    Clock::new().run(&mut server, 30)?;

    assert!(!started.lock().unwrap().is_empty());
    assert!(ongoing.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn paused_physics_freezes_objects() -> anyhow::Result<()> {
    init_tracing();
    let (mut server, world) = headless(20)?;
    let cube = server.drop_block(world, Point::new(0.5, 8.0, 0.5), "stone")?;
    server.exec_console("pause")?;

    let mut clock = Clock::new();
    clock.run(&mut server, 20)?;

    let handler = server.physics().get_handler(world).context("physics")?;
    let body = handler.object(cube).and_then(|o| o.rigid_body()).context("body")?;
    assert_eq!(handler.space().body(body).context("state")?.position.y, 8.0);

    server.exec_console("resume")?;
    clock.run(&mut server, 5)?;
    let handler = server.physics().get_handler(world).context("physics")?;
    assert!(handler.space().body(body).context("state")?.position.y < 8.0);
    Ok(())
}

#[test]
fn config_file_round_trip() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("blockphys-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "tick_hz": 30, "listeners": { "ongoing": false } }"#)?;
    let cfg = ServerConfig::load(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(cfg.tick_hz, 30);
    assert!(!cfg.listeners.ongoing);
    assert!(cfg.listeners.started);

    let bad = ServerConfig {
        tick_hz: 0,
        ..ServerConfig::default()
    };
    assert!(PhysicsServer::new(bad).is_err());
    assert!(ServerConfig::load(&std::env::temp_dir().join("blockphys-missing.json")).is_err());
    Ok(())
}
