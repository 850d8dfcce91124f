//! Multi-directional gravity zones.
//!
//! Areas redefine "down" for the bodies inside them. Trigger events pass
//! through a hysteresis gate before they change a body's membership, the
//! highest-priority active area decides the body's gravity, and material
//! changes of "up" are reported as transitions that consumers animate and
//! then complete (or that time out).
//!
//! This crate has no engine dependency; the host drives it once per fixed
//! tick through [`GravityWorld`].

pub mod area;
pub mod body;
pub mod config;
mod error;
pub mod hysteresis;
pub mod orient;
pub mod placement;
mod world;

pub use area::{AreaId, AreaShape, GravityArea, LocalAxis, MeshBounds, OrientedBox};
pub use body::{AlignCommand, BodyId, GravityBody, Transition};
pub use config::GravityConfig;
pub use error::{GravityError, Result};
pub use hysteresis::{HysteresisGate, PendingAction};
pub use placement::{AreaPlacement, LevelPlacement};
pub use world::{GravityEvent, GravityWorld};
