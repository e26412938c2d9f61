//! Frame clock: frame count and simulated time, with pause and speed control.
//!
//! The first frame starts the clock: it reports `delta = 0` and
//! `absolute = 0`. Every later frame adds `step × speed`.

use crate::types::{Frame, Seconds};
use serde::{Deserialize, Serialize};

/// Timing of one frame, as handed to `Scene::update`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTime {
    pub frame:    Frame,
    pub delta:    Seconds,
    pub absolute: Seconds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameClock {
    pub frame:    Frame,
    pub absolute: Seconds,
    pub step:     Seconds,
    pub speed:    ClockSpeed,
    pub paused:   bool,
}

impl FrameClock {
    /// A running clock advancing `step` seconds per frame at normal speed.
    pub fn new(step: Seconds) -> Self {
        Self {
            frame:    0,
            absolute: 0.0,
            step,
            speed:    ClockSpeed::Normal,
            paused:   false,
        }
    }

    /// Advance one frame.
    /// Panics if called while paused; callers must check.
    pub fn advance(&mut self) -> FrameTime {
        assert!(!self.paused, "advance() called on paused clock");
        let delta = if self.frame == 0 { 0.0 } else { self.step * self.speed.scale() };
        self.frame += 1;
        self.absolute += delta;
        FrameTime { frame: self.frame, delta, absolute: self.absolute }
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: ClockSpeed) {
        self.speed = speed;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockSpeed {
    #[default]
    Normal,  // 1× step per frame
    Half,    // slow motion
    Double,
}

impl ClockSpeed {
    pub fn scale(&self) -> f64 {
        match self {
            Self::Normal => 1.0,
            Self::Half   => 0.5,
            Self::Double => 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_has_zero_delta() {
        let mut clock = FrameClock::new(0.25);
        let first = clock.advance();
        assert_eq!(first, FrameTime { frame: 1, delta: 0.0, absolute: 0.0 });
        let second = clock.advance();
        assert_eq!(second, FrameTime { frame: 2, delta: 0.25, absolute: 0.25 });
    }

    #[test]
    fn speed_scales_delta() {
        let mut clock = FrameClock::new(0.5);
        clock.advance();
        clock.set_speed(ClockSpeed::Double);
        assert_eq!(clock.advance().delta, 1.0);
        clock.set_speed(ClockSpeed::Half);
        assert_eq!(clock.advance().delta, 0.25);
        assert_eq!(clock.absolute, 1.25);
    }

    #[test]
    #[should_panic(expected = "paused clock")]
    fn advancing_a_paused_clock_panics() {
        let mut clock = FrameClock::new(1.0);
        clock.pause();
        clock.advance();
    }
}
