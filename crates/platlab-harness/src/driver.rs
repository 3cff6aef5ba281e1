//! The loop owner: one actor, one step per tick, plus a fixed-rate clock.
//!
//! [`Driver`] owns params, world and state and counts frames and events.
//! [`FrameClock`] turns variable real-time deltas into a whole number of
//! fixed steps, so the simulation never sees a variable `dt`.

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::Params;
use platlab_core::parity::{hash_hex, ParitySummary};
use platlab_core::state::{EventCounts, Events, State};
use platlab_core::step::{step, DT};
use platlab_core::trace::TraceScript;

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Owns one actor and steps it.
#[derive(Debug, Clone)]
pub struct Driver {
    params: Params,
    world: Vec<Rect>,
    state: State,
    frame: u64,
    counts: EventCounts,
    last_events: Events,
}

impl Driver {
    /// A driver at frame 0.
    pub fn new(params: Params, world: Vec<Rect>, state: State) -> Self {
        Self {
            params,
            world,
            state,
            frame: 0,
            counts: EventCounts::default(),
            last_events: Events::default(),
        }
    }

    /// A driver set up with a script's scenario. The inputs are not played.
    pub fn from_script(script: &TraceScript) -> Self {
        Self::new(script.params, script.world.clone(), script.initial_state)
    }

    /// Run one fixed step with `buttons`.
    pub fn tick(&mut self, buttons: Buttons) -> Events {
        let events = step(&self.params, &self.world, &mut self.state, buttons);
        self.frame += 1;
        self.counts.record(events);
        self.last_events = events;
        events
    }

    /// Run `frames` steps with the same buttons held.
    pub fn run(&mut self, buttons: Buttons, frames: u64) {
        for _ in 0..frames {
            self.tick(buttons);
        }
    }

    /// Frames stepped so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds, computed from the frame count.
    pub fn sim_time(&self) -> f64 {
        self.frame as f64 * f64::from(DT)
    }

    /// Current actor state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Tuning parameters in use.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Replace the tuning parameters. Takes effect on the next tick.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Static platforms.
    pub fn world(&self) -> &[Rect] {
        &self.world
    }

    /// Cumulative event counts.
    pub fn counts(&self) -> EventCounts {
        self.counts
    }

    /// Events from the most recent tick.
    pub fn last_events(&self) -> Events {
        self.last_events
    }

    /// Current state and counts as a parity summary.
    pub fn summary(&self) -> ParitySummary {
        ParitySummary::from_state(&self.state, self.counts)
    }

    /// Parity hash of the current state and counts.
    pub fn state_hash(&self) -> u64 {
        self.summary().hash()
    }

    /// [`Driver::state_hash`] as 16 hex digits.
    pub fn state_hash_hex(&self) -> String {
        hash_hex(self.state_hash())
    }
}

// ---------------------------------------------------------------------------
// FrameClock
// ---------------------------------------------------------------------------

/// Longest real-time delta accepted per call; anything longer is treated
/// as this long, so a stall does not trigger a burst of catch-up steps.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Shortest step [`FrameClock::with_step`] accepts (10 kHz).
pub const MIN_STEP: f64 = 1e-4;

/// Fixed-timestep accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameClock {
    step: f64,
    accumulator: f64,
}

impl FrameClock {
    /// Clock yielding steps of [`DT`].
    pub fn new() -> Self {
        Self::with_step(f64::from(DT))
    }

    /// Clock yielding steps of `step` seconds.
    ///
    /// A step that is not finite or is shorter than [`MIN_STEP`] falls back
    /// to [`DT`], since it would never drain the accumulator.
    pub fn with_step(step: f64) -> Self {
        let step = if step.is_finite() && step >= MIN_STEP {
            step
        } else {
            tracing::warn!(step, fallback = f64::from(DT), "invalid clock step, using DT");
            f64::from(DT)
        };
        Self {
            step,
            accumulator: 0.0,
        }
    }

    /// Seconds per fixed step.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Add `elapsed` real seconds and return how many fixed steps are due.
    /// Negative or NaN deltas add nothing.
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        let elapsed = if elapsed > 0.0 {
            elapsed.min(MAX_FRAME_TIME)
        } else {
            0.0
        };
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.step
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platlab_core::parity::canonical_script;

    #[test]
    fn driver_counts_frames_and_events() {
        let mut driver = Driver::from_script(&canonical_script());
        let ev = driver.tick(Buttons::RIGHT);
        assert!(ev.landed);
        assert_eq!(driver.frame(), 1);
        assert_eq!(driver.counts().landed, 1);
        assert_eq!(driver.last_events(), ev);

        driver.run(Buttons::empty(), 59);
        assert_eq!(driver.frame(), 60);
        assert!((driver.sim_time() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn driver_matches_canonical_run() {
        let script = canonical_script();
        let mut driver = Driver::from_script(&script);
        for &bits in &script.inputs {
            driver.tick(Buttons::from_bits_truncate(bits));
        }
        let run = platlab_core::parity::run_script(
            &mut platlab_core::parity::NativeSimulator::new(),
            &script,
        )
        .unwrap();
        assert_eq!(driver.summary(), run.summary);
        assert_eq!(driver.state_hash_hex(), run.summary.hash_hex());
    }

    #[test]
    fn clock_yields_whole_steps() {
        let mut clock = FrameClock::with_step(0.125);
        assert_eq!(clock.advance(0.3125), 2);
        assert_eq!(clock.alpha(), 0.5);
        assert_eq!(clock.advance(0.0625), 1);
        assert_eq!(clock.alpha(), 0.0);
    }

    #[test]
    fn clock_caps_long_stalls() {
        let mut clock = FrameClock::with_step(0.0625);
        assert_eq!(clock.advance(10.0), 4);
    }

    #[test]
    fn clock_ignores_bad_deltas() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.advance(f64::NAN), 0);
        assert_eq!(clock.alpha(), 0.0);
    }

    #[test]
    fn degenerate_steps_fall_back_to_dt() {
        for step in [0.0, -0.5, f64::NAN, f64::INFINITY, 1e-9] {
            let mut clock = FrameClock::with_step(step);
            assert_eq!(clock.step(), f64::from(DT), "step {step}");
            let steps = clock.advance(0.1);
            assert!((5..=6).contains(&steps), "step {step}: {steps} steps");
        }
    }

    #[test]
    fn smallest_accepted_step_is_kept() {
        assert_eq!(FrameClock::with_step(MIN_STEP).step(), MIN_STEP);
    }
}
