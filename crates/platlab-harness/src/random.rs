//! Seeded random input scripts for fuzzing parity past the canonical trace.
//!
//! Inputs come in held runs (a button combination kept for several frames)
//! the way a player actually presses them, with short jump taps mixed in.
//! Optional ledges above the floor give the actor ceilings to bonk on and
//! edges to fall off.

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::Params;
use platlab_core::parity::{CANONICAL_GROUND, CANONICAL_SPAWN};
use platlab_core::state::State;
use platlab_core::trace::TraceScript;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg32;

/// Shape of the scripts [`random_script`] produces.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomScriptConfig {
    /// Number of frames of input.
    pub frames: usize,
    /// Shortest run of held buttons, in frames.
    pub min_hold: usize,
    /// Longest run of held buttons, in frames.
    pub max_hold: usize,
    /// Chance that a run starts with a jump press.
    pub jump_chance: f64,
    /// Number of floating ledges added above the floor.
    pub ledges: usize,
    /// Turn world wrap off (mode 0) instead of the default edge wrap, so
    /// the body may walk past either edge.
    pub no_wrap: bool,
}

impl Default for RandomScriptConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            min_hold: 4,
            max_hold: 40,
            jump_chance: 0.3,
            ledges: 3,
            no_wrap: false,
        }
    }
}

/// Combinations a run may hold. Jump is added separately.
const HOLD_CHOICES: [u8; 8] = [
    0,
    Buttons::LEFT.bits(),
    Buttons::RIGHT.bits(),
    Buttons::LEFT.bits() | Buttons::RUN.bits(),
    Buttons::RIGHT.bits() | Buttons::RUN.bits(),
    Buttons::DOWN.bits(),
    Buttons::RIGHT.bits() | Buttons::DOWN.bits(),
    Buttons::LEFT.bits() | Buttons::RIGHT.bits(),
];

/// Build a script from `seed`. The same seed and config always give the
/// same script.
pub fn random_script(seed: u64, config: &RandomScriptConfig) -> TraceScript {
    let mut rng = Pcg32::seed_from_u64(seed);

    let mut params = Params::default();
    if config.no_wrap {
        params.world_wrap_mode = 0.0;
    }

    let mut world = vec![CANONICAL_GROUND];
    for _ in 0..config.ledges {
        let w = rng.gen_range(64.0f32..240.0).round();
        let x = rng.gen_range(0.0f32..(CANONICAL_GROUND.w - w)).round();
        let y = rng.gen_range(300.0f32..380.0).round();
        let h = rng.gen_range(12.0f32..28.0).round();
        world.push(Rect::new(x, y, w, h));
    }

    // NaN would make `gen_bool` panic.
    let jump_chance = if config.jump_chance.is_nan() {
        0.0
    } else {
        config.jump_chance.clamp(0.0, 1.0)
    };
    let min_hold = config.min_hold.max(1);
    let max_hold = config.max_hold.max(min_hold);
    let mut inputs = Vec::with_capacity(config.frames);
    while inputs.len() < config.frames {
        let held = HOLD_CHOICES[rng.gen_range(0..HOLD_CHOICES.len())];
        let len = rng.gen_range(min_hold..=max_hold);
        let jump = rng.gen_bool(jump_chance);
        // Jump held for part of the run so both full and cut jumps occur.
        let jump_len = if jump { rng.gen_range(1..=len) } else { 0 };
        for i in 0..len {
            let mut bits = held;
            if i < jump_len {
                bits |= Buttons::JUMP.bits();
            }
            inputs.push(bits);
        }
    }
    inputs.truncate(config.frames);

    let s = CANONICAL_SPAWN;
    TraceScript {
        params,
        world,
        initial_state: State::spawn(s.x, s.y, s.w, s.h),
        inputs,
    }
}
