//! Platlab FFI -- the step engine behind a C ABI.
//!
//! Exports three symbols that mirror the safe call boundary in
//! `platlab_core`:
//!
//! ```c
//! void    core_default_params(Params *out);
//! void    core_init_state(CState *out, float x, float y, float w, float h);
//! CEvents core_step(const Params *params, const Rect *rects, size_t len,
//!                   CState *state, uint8_t input_bits);
//! ```
//!
//! `Params` and `Rect` are the `#[repr(C)]` types from `platlab_core`; they
//! hold only floats. State and events cross as [`CState`] and [`CEvents`],
//! whose flags are plain bytes: a caller may write any byte, nonzero reads
//! as true, and the step always writes back 0 or 1.
//!
//! Null pointers make a call a no-op; `core_step` then returns empty events.
//! A null `rects` with any `len` is an empty world.
//!
//! [`FfiSimulator`] drives the same symbols from Rust so the parity harness
//! can check the ABI layer against the native engine.

use std::convert::Infallible;

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::Params;
use platlab_core::parity::Simulator;
use platlab_core::state::{Events, State};

// ---------------------------------------------------------------------------
// ABI structs
// ---------------------------------------------------------------------------

/// C layout of [`State`] with byte flags.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub w: f32,
    pub h: f32,
    pub grounded: u8,
    pub coyote: f32,
    pub jump_buffer: f32,
    pub jump_was_down: u8,
}

impl From<State> for CState {
    fn from(s: State) -> Self {
        Self {
            x: s.x,
            y: s.y,
            vx: s.vx,
            vy: s.vy,
            w: s.w,
            h: s.h,
            grounded: u8::from(s.grounded),
            coyote: s.coyote,
            jump_buffer: s.jump_buffer,
            jump_was_down: u8::from(s.jump_was_down),
        }
    }
}

impl From<CState> for State {
    fn from(c: CState) -> Self {
        Self {
            x: c.x,
            y: c.y,
            vx: c.vx,
            vy: c.vy,
            w: c.w,
            h: c.h,
            grounded: c.grounded != 0,
            coyote: c.coyote,
            jump_buffer: c.jump_buffer,
            jump_was_down: c.jump_was_down != 0,
        }
    }
}

/// C layout of [`Events`]: 1 when the event fired, else 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CEvents {
    pub jumped: u8,
    pub landed: u8,
    pub bonked: u8,
}

impl From<Events> for CEvents {
    fn from(e: Events) -> Self {
        Self {
            jumped: u8::from(e.jumped),
            landed: u8::from(e.landed),
            bonked: u8::from(e.bonked),
        }
    }
}

impl From<CEvents> for Events {
    fn from(c: CEvents) -> Self {
        Self {
            jumped: c.jumped != 0,
            landed: c.landed != 0,
            bonked: c.bonked != 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Exported symbols
// ---------------------------------------------------------------------------

/// Write the default parameters to `out`.
///
/// # Safety
///
/// `out` must be null or valid for a write of one `Params`.
#[no_mangle]
pub unsafe extern "C" fn core_default_params(out: *mut Params) {
    // SAFETY: caller guarantees `out` is null or writable.
    if let Some(out) = unsafe { out.as_mut() } {
        *out = platlab_core::core_default_params();
    }
}

/// Write a freshly spawned actor to `out`.
///
/// # Safety
///
/// `out` must be null or valid for a write of one `CState`.
#[no_mangle]
pub unsafe extern "C" fn core_init_state(out: *mut CState, x: f32, y: f32, w: f32, h: f32) {
    // SAFETY: caller guarantees `out` is null or writable.
    if let Some(out) = unsafe { out.as_mut() } {
        *out = platlab_core::core_init_state(x, y, w, h).into();
    }
}

/// Advance `state` by one fixed step.
///
/// # Safety
///
/// `params` must be null or point to a valid `Params`; `state` must be null
/// or point to a valid, exclusively borrowed `CState`; `rects` must be null
/// or point to `len` consecutive valid `Rect`s. None may alias `state`.
#[no_mangle]
pub unsafe extern "C" fn core_step(
    params: *const Params,
    rects: *const Rect,
    len: usize,
    state: *mut CState,
    input_bits: u8,
) -> CEvents {
    // SAFETY: caller guarantees each pointer is null or valid as documented.
    let (params, raw) = match unsafe { (params.as_ref(), state.as_mut()) } {
        (Some(p), Some(s)) => (p, s),
        _ => return CEvents::default(),
    };
    let world: &[Rect] = if rects.is_null() || len == 0 {
        &[]
    } else {
        // SAFETY: non-null `rects` points to `len` valid rects.
        unsafe { std::slice::from_raw_parts(rects, len) }
    };
    let mut state = State::from(*raw);
    let events = platlab_core::core_step(params, world, &mut state, input_bits);
    *raw = state.into();
    events.into()
}

/// [`Simulator`] that goes through the exported C symbols.
#[derive(Debug, Clone, Default)]
pub struct FfiSimulator {
    params: Params,
    world: Vec<Rect>,
    state: CState,
}

impl FfiSimulator {
    /// Simulator starting from the ABI's own default params.
    pub fn new() -> Self {
        let mut params = Params::default();
        // SAFETY: `params` is a live local.
        unsafe { core_default_params(&mut params) };
        Self {
            params,
            ..Self::default()
        }
    }
}

impl Simulator for FfiSimulator {
    type Error = Infallible;

    fn name(&self) -> &str {
        "c-abi"
    }

    fn load(&mut self, params: &Params, world: &[Rect], state: &State) -> Result<(), Infallible> {
        self.params = *params;
        self.world = world.to_vec();
        // SAFETY: `self.state` is a live field.
        unsafe { core_init_state(&mut self.state, state.x, state.y, state.w, state.h) };
        self.state = CState {
            vx: state.vx,
            vy: state.vy,
            grounded: u8::from(state.grounded),
            coyote: state.coyote,
            jump_buffer: state.jump_buffer,
            jump_was_down: u8::from(state.jump_was_down),
            ..self.state
        };
        tracing::debug!(rects = self.world.len(), "c-abi simulator loaded");
        Ok(())
    }

    fn step(&mut self, input: Buttons) -> Result<Events, Infallible> {
        // SAFETY: all pointers come from live fields; `world` does not alias
        // `state`.
        let events = unsafe {
            core_step(
                &self.params,
                self.world.as_ptr(),
                self.world.len(),
                &mut self.state,
                input.bits(),
            )
        };
        Ok(events.into())
    }

    fn state(&mut self) -> Result<State, Infallible> {
        Ok(self.state.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platlab_core::parity::{canonical_script, run_script, NativeSimulator};
    use std::ptr;

    fn spawn(x: f32, y: f32) -> CState {
        State::spawn(x, y, 28.0, 44.0).into()
    }

    #[test]
    fn null_pointers_are_no_ops() {
        unsafe {
            core_default_params(ptr::null_mut());
            core_init_state(ptr::null_mut(), 1.0, 2.0, 3.0, 4.0);

            let params = Params::default();
            let mut state = spawn(80.0, 436.0);
            let before = state;
            let ev = core_step(ptr::null(), ptr::null(), 0, &mut state, 0);
            assert_eq!(ev, CEvents::default());
            assert_eq!(state, before);

            let ev = core_step(&params, ptr::null(), 0, ptr::null_mut(), 0);
            assert_eq!(ev, CEvents::default());
        }
    }

    #[test]
    fn null_world_is_empty_world() {
        let params = Params::default();
        let mut via_abi = spawn(80.0, 100.0);
        let mut native = State::from(via_abi);
        unsafe { core_step(&params, ptr::null(), 5, &mut via_abi, 0) };
        platlab_core::core_step(&params, &[], &mut native, 0);
        assert_eq!(State::from(via_abi), native);
        assert_eq!(via_abi.grounded, 0);
    }

    #[test]
    fn exported_defaults_match_core() {
        let mut params = Params {
            gravity_down: 0.0,
            ..Params::default()
        };
        unsafe { core_default_params(&mut params) };
        assert_eq!(params, Params::default());

        let mut state = CState::default();
        unsafe { core_init_state(&mut state, 80.0, 436.0, 28.0, 44.0) };
        assert_eq!(state, spawn(80.0, 436.0));
    }

    #[test]
    fn any_nonzero_flag_byte_reads_as_true() {
        let params = Params::default();
        let world = [Rect::new(0.0, 480.0, 960.0, 60.0)];

        // Standing still on the floor, so grounded stays set and no landing
        // fires when the incoming flag is honored as true.
        let mut loose = spawn(80.0, 436.0);
        loose.grounded = 2;
        loose.jump_was_down = 0xFF;
        let mut strict = spawn(80.0, 436.0);
        strict.grounded = 1;
        strict.jump_was_down = 1;

        let ev_loose =
            unsafe { core_step(&params, world.as_ptr(), world.len(), &mut loose, 0) };
        let ev_strict =
            unsafe { core_step(&params, world.as_ptr(), world.len(), &mut strict, 0) };

        assert_eq!(ev_loose, ev_strict);
        assert_eq!(ev_loose.landed, 0);
        assert_eq!(loose, strict);
        assert_eq!(loose.grounded, 1, "flags are written back as 0/1");
        assert_eq!(loose.jump_was_down, 0);
    }

    #[test]
    fn state_and_events_convert_both_ways() {
        let mut s = State::spawn(1.0, 2.0, 3.0, 4.0);
        s.grounded = true;
        s.coyote = 0.05;
        assert_eq!(State::from(CState::from(s)), s);

        let ev = Events {
            jumped: true,
            landed: false,
            bonked: true,
        };
        let c = CEvents::from(ev);
        assert_eq!((c.jumped, c.landed, c.bonked), (1, 0, 1));
        assert_eq!(Events::from(c), ev);
    }

    #[test]
    fn abi_matches_native_on_canonical_trace() {
        let script = canonical_script();
        let native = run_script(&mut NativeSimulator::new(), &script).unwrap();
        let abi = run_script(&mut FfiSimulator::new(), &script).unwrap();
        assert_eq!(native.rows, abi.rows);
        assert_eq!(native.summary.hash_hex(), abi.summary.hash_hex());
    }
}
