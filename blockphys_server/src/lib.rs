//! `blockphys_server`
//!
//! Host-side systems:
//! - Fixed-rate tick loop
//! - World instances and their physics handlers
//! - Stdin console commands
//!
//! Physics is stepped inline on the tick, once per physics-enabled instance.

pub mod server;

pub use server::PhysicsServer;
