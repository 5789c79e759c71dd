//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p blockphys_server -- [--config server.json] [--tick-hz 20]
//!
//! Creates a default instance with a stone floor, enables physics on it and
//! runs the tick loop until `quit`.
//!
//! Console commands:
//!   status          - Show instances and physics state
//!   pause [id]      - Pause physics (default instance if no id)
//!   resume [id]     - Resume physics
//!   drop [x y z]    - Drop a block (random spot if no position)
//!   clear           - Remove dropped blocks
//!   quit            - Shutdown server

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use blockphys_server::server::{PhysicsServer, ServerState};
use blockphys_shared::{
    config::ServerConfig,
    event::{ContactEndedEvent, ContactStartedEvent, RigidBodyEvent},
};
use tokio::sync::mpsc;
use tracing::info;

struct Args {
    config: Option<PathBuf>,
    tick_hz: Option<u32>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut out = Args {
        config: None,
        tick_hz: None,
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                out.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--tick-hz" => {
                let value = args.get(i + 1).context("--tick-hz needs a value")?;
                let hz = value
                    .parse::<u32>()
                    .with_context(|| format!("parse --tick-hz '{}'", value))?;
                out.tick_hz = Some(hz);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args(&env::args().collect::<Vec<_>>())?;
    let mut cfg = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(hz) = args.tick_hz {
        cfg.tick_hz = hz;
    }
    info!(tick_hz = cfg.tick_hz, floor_radius = cfg.floor_radius, "Starting server");

    let mut server = PhysicsServer::new(cfg.clone()).context("create server")?;
    let world = server.create_default_world().context("create default world")?;
    info!(instance = ?world, "Default instance ready");

    server
        .events_mut()
        .add_listener(|e: &mut ContactStartedEvent| {
            info!(a = e.physics_object().0, b = e.second_physics_object().0, "Contact started");
        });
    server
        .events_mut()
        .add_listener(|e: &mut ContactEndedEvent| {
            info!(a = e.physics_object().0, b = e.second_physics_object().0, "Contact ended");
        });

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'drop' to drop a block, 'status' for info, 'quit' to exit.");
    println!();

    let tick_interval = std::time::Duration::from_secs_f32(1.0 / cfg.tick_hz as f32);
    let mut next_tick = tokio::time::Instant::now();

    while server.state() == ServerState::Running {
        server.step()?;
        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    info!(ticks = server.tick(), "Server stopped");
    Ok(())
}
