//! Headless drop scenario.
//!
//! Drops a grid of blocks onto the default floor, simulates a fixed number
//! of ticks on a synthetic clock and prints a JSON report with contact
//! counts and final resting heights.
//!
//! Usage: drop_runner [ticks] [grid]

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Context;
use blockphys_server::server::headless;
use blockphys_shared::{
    event::{ContactEndedEvent, ContactOngoingEvent, ContactStartedEvent},
    math::Point,
    object::ObjectId,
};
use serde_json::json;
use tracing::info;

#[derive(Default)]
struct Counts {
    started: u64,
    ongoing: u64,
    ended: u64,
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let ticks: u32 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let grid: i32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(2);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let (mut server, world) = headless(20)?;

    let counts = Arc::new(Mutex::new(Counts::default()));
    {
        let c = Arc::clone(&counts);
        server
            .events_mut()
            .add_listener(move |_: &mut ContactStartedEvent| {
                if let Ok(mut c) = c.lock() {
                    c.started += 1;
                }
            });
    }
    {
        let c = Arc::clone(&counts);
        server
            .events_mut()
            .add_listener(move |_: &mut ContactOngoingEvent| {
                if let Ok(mut c) = c.lock() {
                    c.ongoing += 1;
                }
            });
    }
    {
        let c = Arc::clone(&counts);
        server
            .events_mut()
            .add_listener(move |_: &mut ContactEndedEvent| {
                if let Ok(mut c) = c.lock() {
                    c.ended += 1;
                }
            });
    }

    let mut dropped: Vec<ObjectId> = Vec::new();
    for x in 0..grid {
        for z in 0..grid {
            let at = Point::new(f64::from(x) * 1.5 + 0.5, 4.0, f64::from(z) * 1.5 + 0.5);
            dropped.push(server.drop_block(world, at, "stone")?);
        }
    }

    let dt = Duration::from_secs_f32(1.0 / server.cfg.tick_hz as f32);
    let mut now = Instant::now();
    for _ in 0..ticks {
        now += dt;
        server.step_at(now)?;
    }

    let handler = server.physics().get_handler(world).context("physics")?;
    let heights: Vec<_> = dropped
        .iter()
        .filter_map(|id| {
            let body = handler.object(*id)?.rigid_body()?;
            let y = handler.space().body(body)?.position.y;
            Some(json!({ "object": id.0, "y": y }))
        })
        .collect();

    let c = counts
        .lock()
        .map_err(|_| anyhow::anyhow!("counter lock poisoned"))?;
    let report = json!({
        "ticks": server.tick(),
        "dropped": dropped.len(),
        "contacts": { "started": c.started, "ongoing": c.ongoing, "ended": c.ended },
        "resting": heights,
    });
    info!(
        ticks = server.tick(),
        dropped = dropped.len(),
        started = c.started,
        ended = c.ended,
        "Drop scenario finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
