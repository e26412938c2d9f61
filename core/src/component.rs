//! Component trait and lifecycle states.
//!
//! RULE: Entities have no behavior of their own. Everything an entity
//! does comes from the components attached to it.
//! The scene drives every component through the same state machine:
//!
//!   NEW → INITIALIZED → RUNNING → {FINISHED | DETACHED} → REMOVED
//!
//! NEW components wait for the start of the next scene update before
//! `on_init` and `on_attach` run. FINISHED and DETACHED components are
//! retired at the end of the update in which they stopped.

use crate::{
    bus::Message,
    error::EngineResult,
    scene::Context,
    types::Seconds,
};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    New,
    Initialized,
    Running,
    Finished,
    Detached,
    Removed,
}

impl ComponentState {
    /// True once the component has stopped running for good.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Finished | Self::Detached | Self::Removed)
    }
}

/// The contract every component must fulfill.
pub trait Component: Any {
    /// Name used for lookups (`find_component_by_name`) and logs.
    fn name(&self) -> &str;

    /// Called once, before `on_attach`.
    fn on_init(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Called once when the component joins its entity.
    fn on_attach(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Called once per frame while RUNNING.
    ///
    /// - `delta`:    seconds since the previous frame
    /// - `absolute`: seconds since the first frame
    fn on_update(
        &mut self,
        ctx: &mut Context<'_>,
        delta: Seconds,
        absolute: Seconds,
    ) -> EngineResult<()>;

    /// Called for every message on a key this component subscribed to.
    fn on_message(&mut self, _ctx: &mut Context<'_>, _message: &Message) -> EngineResult<()> {
        Ok(())
    }

    /// Called once after the component was finished.
    fn on_finish(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Called once after the component was removed from a running entity.
    fn on_detach(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// Last callback before the scene drops the component.
    fn on_remove(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        Ok(())
    }

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
