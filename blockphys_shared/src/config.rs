//! Configuration system.
//!
//! Loads server and physics configuration from JSON strings/files.

use std::{fmt, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{math::Vec3, physics::ContactListeners};

/// Rigid-body engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity, blocks/s². Y is up.
    pub gravity: Vec3,
    /// Length of one internal simulation step, seconds.
    pub fixed_timestep: f32,
    /// Maximum internal steps per update. 0 runs one variable-length step.
    pub max_substeps: u32,
    /// Sequential-impulse iterations per step.
    pub solver_iterations: u32,
    /// Penetration allowed before positional correction kicks in.
    pub linear_slop: f32,
    /// Fraction of the remaining penetration corrected each step.
    pub baumgarte: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            solver_iterations: 10,
            linear_slop: 0.005,
            baumgarte: 0.2,
        }
    }
}

impl PhysicsConfig {
    /// Checks that the engine can run with these parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(ConfigError::InvalidTimestep(self.fixed_timestep));
        }
        if self.solver_iterations == 0 {
            return Err(ConfigError::NoSolverIterations);
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::NonFiniteGravity);
        }
        if !(0.0..=1.0).contains(&self.baumgarte) || self.linear_slop < 0.0 {
            return Err(ConfigError::InvalidCorrection);
        }
        Ok(())
    }
}

/// Which contact callbacks an instance listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub started: bool,
    pub ongoing: bool,
    pub ended: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            started: true,
            ongoing: true,
            ended: true,
        }
    }
}

impl From<ListenerConfig> for ContactListeners {
    fn from(cfg: ListenerConfig) -> Self {
        ContactListeners::new(cfg.ended, cfg.ongoing, cfg.started)
    }
}

/// Root configuration for the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// Contact listeners enabled for new instances.
    #[serde(default)]
    pub listeners: ListenerConfig,
    /// Radius of the stone floor laid out in the default instance.
    #[serde(default = "default_floor_radius")]
    pub floor_radius: i32,
    /// Radius around spawn filled with static block colliders.
    #[serde(default = "default_static_radius")]
    pub static_radius: f64,
    /// Radius around each moving body filled with static block colliders
    /// every physics tick.
    #[serde(default = "default_body_fill_radius")]
    pub body_fill_radius: f64,
}

fn default_tick_hz() -> u32 {
    20
}

fn default_floor_radius() -> i32 {
    16
}

fn default_static_radius() -> f64 {
    6.0
}

fn default_body_fill_radius() -> f64 {
    3.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            physics: PhysicsConfig::default(),
            listeners: ListenerConfig::default(),
            floor_radius: default_floor_radius(),
            static_radius: default_static_radius(),
            body_fill_radius: default_body_fill_radius(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        self.physics.validate()
    }
}

/// Config validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroTickRate,
    InvalidTimestep(f32),
    NoSolverIterations,
    NonFiniteGravity,
    InvalidCorrection,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickRate => write!(f, "tick rate must be at least 1"),
            ConfigError::InvalidTimestep(dt) => write!(f, "invalid fixed timestep {}", dt),
            ConfigError::NoSolverIterations => write!(f, "solver needs at least one iteration"),
            ConfigError::NonFiniteGravity => write!(f, "gravity must be finite"),
            ConfigError::InvalidCorrection => {
                write!(f, "baumgarte must be in [0, 1] and slop non-negative")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = ServerConfig::from_json_str(r#"{ "tick_hz": 40, "physics": { "max_substeps": 2 } }"#)
            .unwrap();
        assert_eq!(cfg.tick_hz, 40);
        assert_eq!(cfg.physics.max_substeps, 2);
        assert_eq!(cfg.physics.solver_iterations, 10);
        assert_eq!(cfg.body_fill_radius, 3.0);
        assert!(cfg.listeners.started && cfg.listeners.ongoing && cfg.listeners.ended);
        assert_eq!(cfg.floor_radius, 16);
    }

    #[test]
    fn validation_rejects_broken_engine_params() {
        let mut cfg = PhysicsConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.fixed_timestep = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTimestep(0.0)));

        cfg = PhysicsConfig {
            solver_iterations: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoSolverIterations));

        cfg = PhysicsConfig {
            gravity: Vec3::new(0.0, f32::NAN, 0.0),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NonFiniteGravity));
    }

    #[test]
    fn listener_config_maps_to_flags() {
        let flags: ContactListeners = ListenerConfig {
            started: true,
            ongoing: false,
            ended: true,
        }
        .into();
        assert!(flags.contains(ContactListeners::STARTED | ContactListeners::ENDED));
        assert!(!flags.contains(ContactListeners::ONGOING));
    }
}
