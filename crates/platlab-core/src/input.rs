//! Per-frame button state.
//!
//! The bit layout is part of every platlab ABI (C, Python, WASM) and must not
//! change: bit0 left, bit1 right, bit2 down/fast-fall, bit3 run, bit4 jump.

bitflags::bitflags! {
    /// Five independent buttons sampled once per step.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u8 {
        /// Move left.
        const LEFT = 1 << 0;
        /// Move right.
        const RIGHT = 1 << 1;
        /// Fast-fall while descending.
        const DOWN = 1 << 2;
        /// Run modifier (scales max speed).
        const RUN = 1 << 3;
        /// Jump.
        const JUMP = 1 << 4;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Self::empty()
    }
}

impl Buttons {
    /// Horizontal intent: `-1` left, `+1` right, `0` for neither or both.
    pub fn move_intent(self) -> i32 {
        i32::from(self.contains(Self::RIGHT)) - i32::from(self.contains(Self::LEFT))
    }
}
