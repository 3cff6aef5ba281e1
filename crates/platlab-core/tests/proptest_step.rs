//! Property tests for the step engine.
//!
//! These drive the engine with generated inputs, step lengths and tuning
//! values and check the invariants every target relies on.

use platlab_core::collision::{substep_count, MAX_SUBSTEPS};
use platlab_core::prelude::*;
use proptest::prelude::*;

fn ground() -> [Rect; 1] {
    [Rect::new(0.0, 480.0, 960.0, 60.0)]
}

/// Any combination of the five buttons.
fn buttons() -> impl Strategy<Value = u8> {
    0u8..32
}

/// Step lengths from 20 Hz to 240 Hz.
fn step_length() -> impl Strategy<Value = f32> {
    (20u32..=240).prop_map(|hz| 1.0 / hz as f32)
}

fn sign(v: f32) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Ground friction brings any horizontal speed to exactly zero without
    /// ever flipping its sign.
    #[test]
    fn friction_converges_without_sign_flip(
        vx in -600.0f32..600.0,
        friction in 50.0f32..12_000.0,
        dt in step_length(),
    ) {
        let params = Params {
            ground_friction: friction,
            ..Params::default()
        };
        let world = ground();
        let mut state = State::spawn(400.0, 436.0, 28.0, 44.0);
        step_with_dt(&params, &world, &mut state, Buttons::empty(), dt);
        prop_assert!(state.grounded);

        state.vx = vx;
        let start_sign = sign(vx);
        let mut stopped = false;
        for _ in 0..10_000 {
            step_with_dt(&params, &world, &mut state, Buttons::empty(), dt);
            prop_assert!(sign(state.vx) == start_sign || state.vx == 0.0);
            if state.vx == 0.0 {
                stopped = true;
                break;
            }
        }
        prop_assert!(stopped, "vx never reached zero");
    }

    /// With no ground and an expired coyote window nothing can jump,
    /// however the buttons are mashed.
    #[test]
    fn airborne_actor_without_coyote_never_jumps(
        inputs in prop::collection::vec(buttons(), 1..120),
    ) {
        let params = Params::default();
        let mut state = State::spawn(300.0, 100.0, 28.0, 44.0);
        for bits in inputs {
            let ev = core_step(&params, &[], &mut state, bits);
            prop_assert!(!ev.jumped);
            prop_assert!(!state.grounded);
            prop_assert_eq!(state.coyote, 0.0);
        }
    }

    /// Events agree with the state transitions that caused them.
    #[test]
    fn events_follow_state_transitions(
        inputs in prop::collection::vec(buttons(), 1..300),
    ) {
        let params = Params::default();
        let world = [
            Rect::new(0.0, 480.0, 960.0, 60.0),
            Rect::new(300.0, 380.0, 120.0, 16.0),
        ];
        let mut state = State::spawn(80.0, 436.0, 28.0, 44.0);
        for bits in inputs {
            let before = state;
            let ev = core_step(&params, &world, &mut state, bits);
            prop_assert_eq!(ev.landed, state.grounded && !before.grounded);
            if ev.jumped {
                prop_assert!(before.jump_phase().can_jump());
                prop_assert!(state.vy < 0.0 || ev.bonked);
            }
        }
    }

    /// A still actor resting on the ground keeps its height.
    #[test]
    fn snapped_still_actor_keeps_height(
        x in 0.0f32..900.0,
        frames in 1usize..120,
    ) {
        let params = Params::default();
        let world = ground();
        let mut state = State::spawn(x.round(), 436.0, 28.0, 44.0);
        core_step(&params, &world, &mut state, 0);
        prop_assert!(state.grounded);
        let y = state.y;
        for _ in 0..frames {
            core_step(&params, &world, &mut state, 0);
            prop_assert_eq!(state.y, y);
            prop_assert!(state.grounded);
        }
    }

    /// Substep counts are at least one, bounded, and one whenever the move
    /// fits in a single substep.
    #[test]
    fn substep_count_bounds(
        dx in -500.0f32..500.0,
        dy in -500.0f32..500.0,
        max_step in 0.0f32..20.0,
    ) {
        let n = substep_count(dx, dy, max_step);
        prop_assert!(n >= 1);
        prop_assert!(n <= MAX_SUBSTEPS);
        if dx.abs().max(dy.abs()) <= max_step.max(1.0) {
            prop_assert_eq!(n, 1);
        }
        let per_step = dx.abs().max(dy.abs()) / n as f32;
        prop_assert!(per_step <= max_step.max(1.0) + 1e-3);
    }

    /// The same script always produces the same trace.
    #[test]
    fn runs_are_deterministic(
        inputs in prop::collection::vec(buttons(), 1..240),
        wrap in 0u8..3,
    ) {
        let mut script = canonical_script();
        script.inputs = inputs;
        script.params.world_wrap_mode = f32::from(wrap);

        let a = run_script(&mut NativeSimulator::new(), &script).unwrap();
        let b = run_script(&mut NativeSimulator::new(), &script).unwrap();
        prop_assert_eq!(a.summary.hash(), b.summary.hash());
        prop_assert_eq!(a.trace_hash(), b.trace_hash());
        prop_assert_eq!(a.rows, b.rows);
    }
}
