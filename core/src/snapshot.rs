//! Snapshot serialization: an inspector's view of a scene as JSON.
//!
//! Snapshots are read-only. They capture entities and the names and
//! lifecycle states of their components, not component internals.

use crate::{
    component::ComponentState,
    scene::Scene,
    types::{ComponentId, EntityId, Frame, Seconds},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub frame:    Frame,
    pub absolute: Seconds,
    pub entities: Vec<EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id:         EntityId,
    pub name:       String,
    pub tag:        Option<String>,
    pub state:      u32,
    pub flags:      u32,
    pub removing:   bool,
    pub components: Vec<ComponentSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub id:    ComponentId,
    pub name:  String,
    pub state: ComponentState,
}

impl SceneSnapshot {
    /// Entities in id order, components in attach order.
    pub fn capture(scene: &Scene) -> Self {
        let entities = scene
            .entities()
            .map(|entity| EntitySnapshot {
                id:         entity.id,
                name:       entity.name.clone(),
                tag:        entity.tag.clone(),
                state:      entity.state,
                flags:      entity.flags,
                removing:   entity.is_removing(),
                components: entity
                    .components()
                    .iter()
                    .filter_map(|id| {
                        Some(ComponentSnapshot {
                            id:    *id,
                            name:  scene.component_name(*id)?.to_string(),
                            state: scene.component_state(*id)?,
                        })
                    })
                    .collect(),
            })
            .collect();

        Self {
            frame: scene.frame(),
            absolute: scene.absolute(),
            entities,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Scene {
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::capture(self)
    }
}
