//! The engine: a frame clock driving one scene.
//!
//! EXECUTION ORDER per tick (fixed, never reordered):
//!   1. Advance the clock (frame 1 has delta 0, absolute 0).
//!   2. Scene::update with the frame's delta and absolute time.
//!   3. Drain the scene's event log and hand it to the caller.
//!
//! RULES:
//!   - The clock is the only time source; components never read wall time.
//!   - All randomness flows through the RngBank.

use crate::{
    clock::{FrameClock, FrameTime},
    config::EngineConfig,
    error::EngineResult,
    event::SceneEvent,
    rng::{RngBank, SeededRng},
    scene::Scene,
    types::{EntityId, Frame},
};

pub struct Engine {
    pub clock:    FrameClock,
    pub scene:    Scene,
    pub rng_bank: RngBank,
    config:       EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut clock = FrameClock::new(config.step());
        clock.set_speed(config.speed);
        Self {
            clock,
            scene:    Scene::new(),
            rng_bank: RngBank::new(config.seed),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A deterministic random stream for `entity`, e.g. for producers.
    pub fn rng_for(&self, entity: EntityId) -> SeededRng {
        self.rng_bank.for_entity(entity)
    }

    /// Advance one frame. This is the core engine step.
    pub fn tick(&mut self) -> EngineResult<Vec<SceneEvent>> {
        assert!(!self.clock.paused, "tick() called on paused engine");

        let FrameTime { frame, delta, absolute } = self.clock.advance();
        self.scene.update(delta, absolute)?;

        let events = self.scene.drain_events();
        log::trace!("frame={frame} engine: {} event(s), absolute={absolute:.3}", events.len());
        Ok(events)
    }

    /// Run n frames in a loop, collecting their events.
    pub fn run_frames(&mut self, n: u64) -> EngineResult<Vec<SceneEvent>> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(self.tick()?);
        }
        Ok(events)
    }

    /// Tick until the scene has nothing left to run, at most `max` frames.
    /// Returns the number of frames run.
    pub fn run_until_idle(&mut self, max: u64) -> EngineResult<Frame> {
        let mut ran = 0;
        while ran < max {
            self.tick()?;
            ran += 1;
            if self.scene.is_idle() {
                log::debug!("frame={} engine: scene idle after {ran} frame(s)", self.clock.frame);
                return Ok(ran);
            }
        }
        log::warn!("frame={} engine: scene still busy after {max} frame(s)", self.clock.frame);
        Ok(ran)
    }
}
