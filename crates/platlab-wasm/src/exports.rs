//! The flat exports a sandbox host calls.
//!
//! The guest keeps one simulator instance per thread (the sandbox has one).
//! Nothing here allocates per step; only `platlab_push_rect` grows the world.

use std::cell::RefCell;

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::{Params, PARAM_COUNT};
use platlab_core::state::State;

use crate::abi::StateField;

#[derive(Default)]
struct Guest {
    params: Params,
    world: Vec<Rect>,
    state: State,
}

thread_local! {
    static GUEST: RefCell<Guest> = RefCell::new(Guest::default());
}

fn with_guest<R>(f: impl FnOnce(&mut Guest) -> R) -> R {
    GUEST.with(|g| f(&mut g.borrow_mut()))
}

/// Respawn the actor at `(x, y)` with size `w x h`. Params and world are kept.
#[no_mangle]
pub extern "C" fn platlab_reset(x: f32, y: f32, w: f32, h: f32) {
    with_guest(|g| g.state = State::spawn(x, y, w, h));
}

/// Number of tuning parameters, for hosts that check the schema size.
#[no_mangle]
pub extern "C" fn platlab_param_count() -> u32 {
    PARAM_COUNT as u32
}

/// Set parameter `index` (schema order). Returns 1 on success, 0 for an
/// unknown index or a non-finite value.
#[no_mangle]
pub extern "C" fn platlab_set_param(index: u32, value: f32) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    with_guest(|g| i32::from(g.params.set_index(index as usize, value)))
}

/// Remove every platform.
#[no_mangle]
pub extern "C" fn platlab_clear_world() {
    with_guest(|g| g.world.clear());
}

/// Append a platform. Returns the new platform count.
#[no_mangle]
pub extern "C" fn platlab_push_rect(x: f32, y: f32, w: f32, h: f32) -> u32 {
    with_guest(|g| {
        g.world.push(Rect::new(x, y, w, h));
        g.world.len() as u32
    })
}

/// Advance one fixed step. Returns packed events.
#[no_mangle]
pub extern "C" fn platlab_step(input_bits: u32) -> u32 {
    let buttons = Buttons::from_bits_truncate((input_bits & 0xFF) as u8);
    with_guest(|g| {
        let Guest {
            params,
            world,
            state,
        } = g;
        platlab_core::step::step(params, world, state, buttons).to_bits()
    })
}

/// Read state field `field`. Unknown fields read as NaN.
#[no_mangle]
pub extern "C" fn platlab_get(field: u32) -> f32 {
    match StateField::from_index(field) {
        Some(f) => with_guest(|g| f.get(&g.state)),
        None => f32::NAN,
    }
}

/// Write state field `field`. Returns 1 on success, 0 for an unknown field.
#[no_mangle]
pub extern "C" fn platlab_set(field: u32, value: f32) -> i32 {
    match StateField::from_index(field) {
        Some(f) => {
            with_guest(|g| f.set(&mut g.state, value));
            1
        }
        None => 0,
    }
}
