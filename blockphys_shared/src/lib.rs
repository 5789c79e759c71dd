//! `blockphys_shared`
//!
//! Rigid-body physics for block worlds.
//!
//! Layers, bottom up:
//! - `math`, `collision`, `physics`: a small fixed-step rigid-body engine.
//! - `world`, `ecs`, `sphere`: instances (blocks and entities) the engine
//!   is attached to.
//! - `object`, `handler`, `registry`, `event`: the bridge between the two,
//!   publishing contact events for mapped bodies.
//!
//! No `unsafe`.

pub mod collision;
pub mod config;
pub mod ecs;
pub mod event;
pub mod handler;
pub mod math;
pub mod object;
pub mod physics;
pub mod registry;
pub mod sphere;
pub mod world;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::handler::*;
    pub use crate::math::*;
    pub use crate::object::*;
    pub use crate::physics::{BodyId, ContactListeners, RigidBodyDesc};
    pub use crate::registry::*;
    pub use crate::world::*;
}
