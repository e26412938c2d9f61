//! The scene event log: what happened to entities, components and the
//! bus during a frame. Host tooling drains it after every update.

use crate::types::{ComponentId, EntityId, Frame};
use serde::{Deserialize, Serialize};

/// Variants are appended only. Never remove or reorder them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneEvent {
    // ── Entities ───────────────────────────────────
    EntityAdded {
        frame:  Frame,
        entity: EntityId,
        name:   String,
    },
    EntityRemoved {
        frame:  Frame,
        entity: EntityId,
    },

    // ── Component lifecycle ────────────────────────
    ComponentAttached {
        frame:     Frame,
        entity:    EntityId,
        component: ComponentId,
        name:      String,
    },
    ComponentFinished {
        frame:     Frame,
        entity:    EntityId,
        component: ComponentId,
        name:      String,
    },
    ComponentDetached {
        frame:     Frame,
        entity:    EntityId,
        component: ComponentId,
        name:      String,
    },
    ComponentRemoved {
        frame:     Frame,
        entity:    EntityId,
        component: ComponentId,
    },

    // ── Bus ────────────────────────────────────────
    MessageSent {
        frame:  Frame,
        key:    String,
        origin: Option<EntityId>,
    },
}

/// Stable string name of a SceneEvent variant, for log lines and filters.
pub fn event_type_name(event: &SceneEvent) -> &'static str {
    match event {
        SceneEvent::EntityAdded { .. }       => "entity_added",
        SceneEvent::EntityRemoved { .. }     => "entity_removed",
        SceneEvent::ComponentAttached { .. } => "component_attached",
        SceneEvent::ComponentFinished { .. } => "component_finished",
        SceneEvent::ComponentDetached { .. } => "component_detached",
        SceneEvent::ComponentRemoved { .. }  => "component_removed",
        SceneEvent::MessageSent { .. }       => "message_sent",
    }
}
