//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chainwork_core::{
    component::Component,
    config::EngineConfig,
    engine::Engine,
    error::EngineResult,
    scene::Context,
    types::Seconds,
};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    rc::Rc,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An engine stepping `1 / frame_rate` seconds per frame.
pub fn engine(frame_rate: f64) -> Engine {
    init_logging();
    Engine::new(EngineConfig { frame_rate, ..EngineConfig::default_test() })
}

/// Run `n` frames, panicking on any engine error.
pub fn run(engine: &mut Engine, n: u64) {
    engine.run_frames(n).unwrap();
}

pub type Trace = Rc<RefCell<Vec<String>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

/// A CALL action that appends `label` to `trace`.
pub fn record(
    trace: &Trace,
    label: &str,
) -> impl FnMut(&mut Context<'_>) -> EngineResult<()> + 'static {
    let trace = trace.clone();
    let label = label.to_string();
    move |_ctx: &mut Context<'_>| {
        trace.borrow_mut().push(label.clone());
        Ok(())
    }
}

/// A CALL action that stores the current frame in `cell`.
pub fn mark_frame(cell: &Rc<Cell<u64>>) -> impl FnMut(&mut Context<'_>) -> EngineResult<()> + 'static {
    let cell = cell.clone();
    move |ctx: &mut Context<'_>| {
        cell.set(ctx.frame());
        Ok(())
    }
}

pub fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

/// Callback counts for one Probe.
#[derive(Debug, Default)]
pub struct Hooks {
    pub init:   Cell<u32>,
    pub attach: Cell<u32>,
    pub update: Cell<u32>,
    pub finish: Cell<u32>,
    pub detach: Cell<u32>,
    pub remove: Cell<u32>,
}

fn bump(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

/// A component that counts its callbacks and optionally finishes itself
/// after a number of updates.
pub struct Probe {
    name:     String,
    lifetime: Option<u32>,
    hooks:    Rc<Hooks>,
}

impl Probe {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), lifetime: None, hooks: Rc::default() }
    }

    /// Finishes itself during its `updates`-th update.
    pub fn countdown(name: &str, updates: u32) -> Self {
        Self { lifetime: Some(updates), ..Self::new(name) }
    }

    pub fn hooks(&self) -> Rc<Hooks> {
        self.hooks.clone()
    }
}

impl Component for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_init(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        bump(&self.hooks.init);
        Ok(())
    }

    fn on_attach(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        bump(&self.hooks.attach);
        Ok(())
    }

    fn on_update(&mut self, ctx: &mut Context<'_>, _delta: Seconds, _absolute: Seconds) -> EngineResult<()> {
        bump(&self.hooks.update);
        if let Some(left) = &mut self.lifetime {
            *left = left.saturating_sub(1);
            if *left == 0 {
                ctx.finish();
            }
        }
        Ok(())
    }

    fn on_finish(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        bump(&self.hooks.finish);
        Ok(())
    }

    fn on_detach(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        bump(&self.hooks.detach);
        Ok(())
    }

    fn on_remove(&mut self, _ctx: &mut Context<'_>) -> EngineResult<()> {
        bump(&self.hooks.remove);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any { self }

    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
