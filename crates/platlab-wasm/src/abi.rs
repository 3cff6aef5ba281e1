//! Numeric ABI shared by the guest exports and the host.
//!
//! Everything crossing the sandbox boundary is an `i32`, `u32` or `f32`:
//! parameters are addressed by schema index, state fields by
//! [`StateField`] index, events come back packed with
//! [`Events::to_bits`](platlab_core::state::Events::to_bits).

use platlab_core::state::State;

/// Export names, in the order a host should resolve them.
pub const EXPORT_RESET: &str = "platlab_reset";
/// `() -> u32`
pub const EXPORT_PARAM_COUNT: &str = "platlab_param_count";
/// `(u32, f32) -> i32`
pub const EXPORT_SET_PARAM: &str = "platlab_set_param";
/// `()`
pub const EXPORT_CLEAR_WORLD: &str = "platlab_clear_world";
/// `(f32, f32, f32, f32) -> u32`
pub const EXPORT_PUSH_RECT: &str = "platlab_push_rect";
/// `(u32) -> u32`
pub const EXPORT_STEP: &str = "platlab_step";
/// `(u32) -> f32`
pub const EXPORT_GET: &str = "platlab_get";
/// `(u32, f32) -> i32`
pub const EXPORT_SET: &str = "platlab_set";

/// Every export a module must provide.
pub const REQUIRED_EXPORTS: &[&str] = &[
    EXPORT_RESET,
    EXPORT_PARAM_COUNT,
    EXPORT_SET_PARAM,
    EXPORT_CLEAR_WORLD,
    EXPORT_PUSH_RECT,
    EXPORT_STEP,
    EXPORT_GET,
    EXPORT_SET,
];

/// State fields by ABI index. Flags travel as `0.0` / `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StateField {
    X = 0,
    Y = 1,
    Vx = 2,
    Vy = 3,
    W = 4,
    H = 5,
    Grounded = 6,
    Coyote = 7,
    JumpBuffer = 8,
    JumpWasDown = 9,
}

impl StateField {
    /// All fields in index order.
    pub const ALL: [StateField; 10] = [
        StateField::X,
        StateField::Y,
        StateField::Vx,
        StateField::Vy,
        StateField::W,
        StateField::H,
        StateField::Grounded,
        StateField::Coyote,
        StateField::JumpBuffer,
        StateField::JumpWasDown,
    ];

    /// Field for an ABI index.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// ABI index of this field.
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Read this field from `state`.
    pub fn get(self, state: &State) -> f32 {
        match self {
            StateField::X => state.x,
            StateField::Y => state.y,
            StateField::Vx => state.vx,
            StateField::Vy => state.vy,
            StateField::W => state.w,
            StateField::H => state.h,
            StateField::Grounded => flag(state.grounded),
            StateField::Coyote => state.coyote,
            StateField::JumpBuffer => state.jump_buffer,
            StateField::JumpWasDown => flag(state.jump_was_down),
        }
    }

    /// Write this field into `state`. Flags are true for any non-zero value.
    pub fn set(self, state: &mut State, value: f32) {
        match self {
            StateField::X => state.x = value,
            StateField::Y => state.y = value,
            StateField::Vx => state.vx = value,
            StateField::Vy => state.vy = value,
            StateField::W => state.w = value,
            StateField::H => state.h = value,
            StateField::Grounded => state.grounded = value != 0.0,
            StateField::Coyote => state.coyote = value,
            StateField::JumpBuffer => state.jump_buffer = value,
            StateField::JumpWasDown => state.jump_was_down = value != 0.0,
        }
    }
}

fn flag(v: bool) -> f32 {
    if v {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_and_ordered() {
        for (i, field) in StateField::ALL.iter().enumerate() {
            assert_eq!(field.index() as usize, i);
            assert_eq!(StateField::from_index(i as u32), Some(*field));
        }
        assert_eq!(StateField::from_index(10), None);
    }

    #[test]
    fn fields_write_back_what_they_read() {
        let mut src = State::spawn(1.0, 2.0, 3.0, 4.0);
        src.vx = -5.5;
        src.grounded = true;
        src.coyote = 0.05;
        src.jump_was_down = true;

        let mut dst = State::default();
        for field in StateField::ALL {
            field.set(&mut dst, field.get(&src));
        }
        assert_eq!(dst, src);
    }
}
