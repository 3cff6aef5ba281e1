//! Platlab WASM -- the step engine as a sandbox guest.
//!
//! Compiled to `wasm32-unknown-unknown`, this crate exports a handful of
//! scalar-only functions (see [`abi`]) that a host such as
//! `platlab-wasm-host` drives. The module imports nothing: no WASI, no host
//! callbacks, no clock.
//!
//! Built natively, the same exports are ordinary Rust functions.
//! [`GuestSimulator`] drives them in-process so the guest ABI can be checked
//! against the engine without a WASM runtime.

pub mod abi;
pub mod exports;

use std::convert::Infallible;

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::Params;
use platlab_core::parity::Simulator;
use platlab_core::state::{Events, State};

use abi::StateField;

/// [`Simulator`] over the guest exports, running natively.
///
/// The guest keeps its simulator in a thread-local, so two `GuestSimulator`s
/// on one thread share state. Tests create one per thread.
#[derive(Debug, Default)]
pub struct GuestSimulator {
    _private: (),
}

impl GuestSimulator {
    /// Handle to this thread's guest instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Simulator for GuestSimulator {
    type Error = Infallible;

    fn name(&self) -> &str {
        "wasm-guest"
    }

    fn load(&mut self, params: &Params, world: &[Rect], state: &State) -> Result<(), Infallible> {
        for (index, value) in params.values().into_iter().enumerate() {
            exports::platlab_set_param(index as u32, value);
        }
        exports::platlab_clear_world();
        for r in world {
            exports::platlab_push_rect(r.x, r.y, r.w, r.h);
        }
        exports::platlab_reset(state.x, state.y, state.w, state.h);
        for field in StateField::ALL {
            exports::platlab_set(field.index(), field.get(state));
        }
        Ok(())
    }

    fn step(&mut self, input: Buttons) -> Result<Events, Infallible> {
        Ok(Events::from_bits(exports::platlab_step(u32::from(input.bits()))))
    }

    fn state(&mut self) -> Result<State, Infallible> {
        let mut state = State::default();
        for field in StateField::ALL {
            field.set(&mut state, exports::platlab_get(field.index()));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platlab_core::params::PARAM_COUNT;
    use platlab_core::parity::{canonical_script, run_script, NativeSimulator};

    #[test]
    fn param_count_matches_schema() {
        assert_eq!(exports::platlab_param_count() as usize, PARAM_COUNT);
    }

    #[test]
    fn set_param_rejects_bad_index_and_nan() {
        assert_eq!(exports::platlab_set_param(0, 300.0), 1);
        assert_eq!(exports::platlab_set_param(PARAM_COUNT as u32, 1.0), 0);
        assert_eq!(exports::platlab_set_param(0, f32::NAN), 0);
    }

    #[test]
    fn push_rect_counts_platforms() {
        exports::platlab_clear_world();
        assert_eq!(exports::platlab_push_rect(0.0, 480.0, 960.0, 60.0), 1);
        assert_eq!(exports::platlab_push_rect(0.0, 0.0, 10.0, 10.0), 2);
        exports::platlab_clear_world();
        assert_eq!(exports::platlab_push_rect(0.0, 0.0, 10.0, 10.0), 1);
    }

    #[test]
    fn unknown_state_field_reads_nan() {
        assert!(exports::platlab_get(99).is_nan());
        assert_eq!(exports::platlab_set(99, 1.0), 0);
    }

    #[test]
    fn step_reports_packed_events() {
        exports::platlab_clear_world();
        exports::platlab_push_rect(0.0, 480.0, 960.0, 60.0);
        exports::platlab_reset(80.0, 436.0, 28.0, 44.0);
        let bits = exports::platlab_step(0);
        assert!(Events::from_bits(bits).landed);
        assert_eq!(exports::platlab_get(StateField::Grounded.index()), 1.0);
    }

    #[test]
    fn guest_matches_native_on_canonical_trace() {
        let script = canonical_script();
        let native = run_script(&mut NativeSimulator::new(), &script).unwrap();
        let guest = run_script(&mut GuestSimulator::new(), &script).unwrap();
        assert_eq!(native.rows, guest.rows);
        assert_eq!(native.summary.hash_hex(), guest.summary.hash_hex());
    }
}
