//! Actor state and per-step events.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geom::Rect;

/// Flags arrive as JSON booleans from Rust and as `0`/`1` from scripts and
/// older tools; accept both.
pub(crate) fn flag_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Float(f) => f != 0.0,
    })
}

/// Write a flag as `0`/`1`.
pub(crate) fn flag_as_int<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(u8::from(*v))
}

/// Mutable per-actor record. Owned by the caller, mutated only by the step.
///
/// Respawning replaces the whole record. The C ABI carries it as
/// `platlab_ffi::CState`, whose flags are bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Left edge of the body.
    pub x: f32,
    /// Top edge of the body.
    pub y: f32,
    /// Horizontal velocity (px/s, positive right).
    pub vx: f32,
    /// Vertical velocity (px/s, positive down).
    pub vy: f32,
    /// Body width.
    pub w: f32,
    /// Body height.
    pub h: f32,
    /// Standing on a platform as of the last step.
    #[serde(deserialize_with = "flag_from_any")]
    pub grounded: bool,
    /// Seconds left in which a jump is still allowed after leaving the ground.
    pub coyote: f32,
    /// Seconds left in which a queued jump press is still honored.
    pub jump_buffer: f32,
    /// Jump button state sampled on the previous step.
    #[serde(deserialize_with = "flag_from_any")]
    pub jump_was_down: bool,
}

impl State {
    /// A still, airborne actor at `(x, y)` with body size `w x h`.
    pub fn spawn(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            ..Self::default()
        }
    }

    /// The body rectangle at the current position.
    pub fn body(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Which conceptual jump state the timers encode.
    pub fn jump_phase(&self) -> JumpPhase {
        if self.grounded {
            JumpPhase::Grounded
        } else if self.coyote > 0.0 {
            JumpPhase::Coyote
        } else {
            JumpPhase::Airborne
        }
    }
}

/// The jump state machine's states. The step keeps them implicit in
/// `grounded` and the coyote timer; this is the explicit view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpPhase {
    /// Standing on a platform; a jump is allowed.
    Grounded,
    /// Airborne but still inside the coyote window; a jump is allowed.
    Coyote,
    /// Airborne with the coyote window expired; no jump.
    Airborne,
}

impl JumpPhase {
    /// Whether a jump request would be honored in this phase.
    pub fn can_jump(self) -> bool {
        !matches!(self, JumpPhase::Airborne)
    }
}

/// Transitions that happened during one step. Never accumulated by the step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    /// A jump impulse was applied.
    pub jumped: bool,
    /// The actor went from airborne to grounded.
    pub landed: bool,
    /// Upward motion was stopped by a ceiling.
    pub bonked: bool,
}

impl Events {
    /// Bit for [`Events::jumped`] in the packed form.
    pub const JUMPED_BIT: u32 = 1 << 0;
    /// Bit for [`Events::landed`] in the packed form.
    pub const LANDED_BIT: u32 = 1 << 1;
    /// Bit for [`Events::bonked`] in the packed form.
    pub const BONKED_BIT: u32 = 1 << 2;

    /// Packed form used by the WASM ABI.
    pub fn to_bits(self) -> u32 {
        let mut bits = 0;
        if self.jumped {
            bits |= Self::JUMPED_BIT;
        }
        if self.landed {
            bits |= Self::LANDED_BIT;
        }
        if self.bonked {
            bits |= Self::BONKED_BIT;
        }
        bits
    }

    /// Inverse of [`Events::to_bits`]; unknown bits are ignored.
    pub fn from_bits(bits: u32) -> Self {
        Self {
            jumped: bits & Self::JUMPED_BIT != 0,
            landed: bits & Self::LANDED_BIT != 0,
            bonked: bits & Self::BONKED_BIT != 0,
        }
    }

    /// True when no event fired.
    pub fn is_empty(self) -> bool {
        !(self.jumped || self.landed || self.bonked)
    }
}

/// Running totals of [`Events`] kept by drivers and the parity harness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    /// Number of steps with `jumped`.
    pub jumped: u32,
    /// Number of steps with `landed`.
    pub landed: u32,
    /// Number of steps with `bonked`.
    pub bonked: u32,
}

impl EventCounts {
    /// Add one step's events.
    pub fn record(&mut self, events: Events) {
        self.jumped += u32::from(events.jumped);
        self.landed += u32::from(events.landed);
        self.bonked += u32::from(events.bonked);
    }
}
