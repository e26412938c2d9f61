//! Structural entity filters.
//!
//! A `Condition` is plain data so it can be cached by a chain node,
//! stored on a bus subscription, or loaded from JSON.

use crate::scene::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub state: Option<u32>,
    /// Every bit set here must also be set on the entity.
    #[serde(default)]
    pub flags: u32,
    /// Name of a component the entity must carry. Only components that
    /// have not finished or been detached count.
    #[serde(default)]
    pub has_component: Option<String>,
}

impl Condition {
    /// Matches every entity.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn state(mut self, state: u32) -> Self {
        self.state = Some(state);
        self
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    pub fn has_component(mut self, name: impl Into<String>) -> Self {
        self.has_component = Some(name.into());
        self
    }

    /// Check the entity's own fields. `has_component` is resolved by the
    /// scene, which owns the component names.
    pub(crate) fn matches_fields(&self, entity: &Entity) -> bool {
        if let Some(name) = &self.name {
            if &entity.name != name {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if entity.tag.as_ref() != Some(tag) {
                return false;
            }
        }
        if let Some(state) = self.state {
            if entity.state != state {
                return false;
            }
        }
        entity.flags & self.flags == self.flags
    }
}
