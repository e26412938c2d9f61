//! Shared primitive types used across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated time, in seconds.
pub type Seconds = f64;

/// A frame counter. The first update of a scene is frame 1.
pub type Frame = u64;

/// A stable, unique identifier for an entity in a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// A stable, unique identifier for a component slot in a scene.
/// Ids are never reused, so a retired id keeps answering lifecycle queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e#{}", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c#{}", self.0)
    }
}
