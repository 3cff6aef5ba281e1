//! The fixed-step movement engine.
//!
//! One call advances one actor by one tick:
//!
//! 1. timers (coyote, jump buffer) and jump-button edges,
//! 2. horizontal movement (accel/decel, friction or drag, speed clamp),
//! 3. vertical movement (split gravity, fast-fall, terminal velocity),
//! 4. jump execution and jump cut,
//! 5. substepped collision ([`crate::collision::sweep`]),
//! 6. world wrap ([`crate::wrap::apply_wrap`]),
//! 7. ground snap and the grounded decision.
//!
//! Movement decisions in steps 2–4 use the grounded flag from the *previous*
//! step; the new flag is only decided in step 7.

use crate::collision::{snap_to_ground, sweep};
use crate::geom::Rect;
use crate::input::Buttons;
use crate::params::Params;
use crate::state::{Events, State};
use crate::wrap::apply_wrap;

/// Simulation rate in steps per second.
pub const HZ: f32 = 60.0;

/// Fixed step length in seconds.
pub const DT: f32 = 1.0 / HZ;

/// Upward speed is effectively unbounded; this only keeps it finite.
const MAX_RISE_SPEED: f32 = 5000.0;

/// Advance `state` by one fixed [`DT`] step.
pub fn step(params: &Params, world: &[Rect], state: &mut State, input: Buttons) -> Events {
    step_with_dt(params, world, state, input, DT)
}

/// Advance `state` by one step of `dt` seconds.
///
/// Identical to [`step`] except for the step length. `dt` must be positive;
/// other values are a contract violation and give unspecified numbers.
pub fn step_with_dt(
    params: &Params,
    world: &[Rect],
    state: &mut State,
    input: Buttons,
    dt: f32,
) -> Events {
    let mut events = Events::default();

    let jump_down = input.contains(Buttons::JUMP);
    let was_grounded = state.grounded;

    let edges = update_timers(params, state, jump_down, dt);
    apply_horizontal(params, state, input, was_grounded, dt);
    apply_vertical(params, state, input.contains(Buttons::DOWN), dt);
    events.jumped = try_jump(params, state, was_grounded, edges.released);

    let body = state.body().rounded();
    let total_dx = state.vx * dt;
    let total_dy = state.vy * dt;
    let swept = sweep(body, &mut state.vy, total_dx, total_dy, params.max_step_px, world);
    events.bonked = swept.bonked;
    state.x = swept.body.x;
    state.y = swept.body.y;

    apply_wrap(state, params.wrap_mode(), params.world_w);

    let grounded = if params.snap_to_ground > 0.0 {
        let body = Rect {
            x: state.x,
            y: state.y,
            ..swept.body
        };
        let (snapped, grounded) = snap_to_ground(body, params.snap_to_ground, world);
        state.y = snapped.y;
        grounded
    } else {
        swept.hit_ground_any
    };

    events.landed = grounded && !was_grounded;
    state.grounded = grounded;
    state.jump_was_down = jump_down;

    events
}

/// Jump-button transitions observed this step.
#[derive(Debug, Clone, Copy, Default)]
struct JumpEdges {
    released: bool,
}

fn update_timers(params: &Params, state: &mut State, jump_down: bool, dt: f32) -> JumpEdges {
    let pressed = jump_down && !state.jump_was_down;
    let released = !jump_down && state.jump_was_down;

    state.coyote = if state.grounded {
        params.coyote_time
    } else {
        (state.coyote - dt).max(0.0)
    };

    state.jump_buffer = if pressed {
        params.jump_buffer
    } else {
        (state.jump_buffer - dt).max(0.0)
    };

    JumpEdges { released }
}

fn apply_horizontal(params: &Params, state: &mut State, input: Buttons, grounded: bool, dt: f32) {
    let run = if input.contains(Buttons::RUN) {
        params.run_multiplier
    } else {
        1.0
    };
    let (max_speed, accel, decel) = if grounded {
        (params.ground_max_speed * run, params.ground_accel, params.ground_decel)
    } else {
        (params.air_max_speed * run, params.air_accel, params.air_decel)
    };

    let intent = input.move_intent();
    if intent != 0 {
        let dir = intent as f32;
        let turning = state.vx != 0.0 && sign(state.vx) != dir;
        let rate = if turning { decel } else { accel };
        state.vx += rate * dt * dir;
    } else if grounded {
        state.vx = decay_toward_zero(state.vx, params.ground_friction * dt);
    }

    if !grounded && params.air_drag > 0.0 {
        state.vx = decay_toward_zero(state.vx, params.air_drag * dt);
    }

    state.vx = state.vx.max(-max_speed).min(max_speed);
}

fn apply_vertical(params: &Params, state: &mut State, fast_fall: bool, dt: f32) {
    let mut gravity = if state.vy < 0.0 {
        params.gravity_up
    } else {
        params.gravity_down
    };
    if fast_fall && state.vy > 0.0 {
        gravity *= params.fast_fall_multiplier;
    }
    state.vy += gravity * dt;
    state.vy = state.vy.max(-MAX_RISE_SPEED).min(params.terminal_velocity);
}

/// Execute a buffered jump if allowed, then apply the jump cut.
/// Returns whether a jump impulse was applied.
fn try_jump(params: &Params, state: &mut State, was_grounded: bool, released: bool) -> bool {
    let can_jump = was_grounded || state.coyote > 0.0;
    let wants_jump = state.jump_buffer > 0.0;
    let jumped = can_jump && wants_jump;
    if jumped {
        state.vy = -params.jump_velocity;
        state.grounded = false;
        state.coyote = 0.0;
        state.jump_buffer = 0.0;
    }

    if released && state.vy < 0.0 {
        let cut = -params.jump_velocity * params.jump_cut_multiplier;
        if state.vy < cut {
            state.vy = cut;
        }
    }

    jumped
}

/// Reduce `|v|` by `amount`, snapping to exactly zero instead of crossing it.
#[inline]
fn decay_toward_zero(v: f32, amount: f32) -> f32 {
    if v.abs() <= amount {
        0.0
    } else {
        v - sign(v) * amount
    }
}

#[inline]
fn sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else if x > 0.0 {
        1.0
    } else {
        0.0
    }
}
