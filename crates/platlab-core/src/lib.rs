//! Platlab Core -- deterministic fixed-step platformer movement and collision.
//!
//! This crate owns the single `step` function every platlab target runs: the
//! native library, the C ABI, the Python extension and the sandboxed WASM
//! build all call into [`step::step`] and are expected to agree bit for bit
//! on the canonical parity trace.
//!
//! # Quick Start
//!
//! ```
//! use platlab_core::prelude::*;
//!
//! let params = core_default_params();
//! let world = [Rect::new(0.0, 480.0, 960.0, 60.0)];
//! let mut state = core_init_state(80.0, 436.0, 28.0, 44.0);
//!
//! let events = core_step(&params, &world, &mut state, Buttons::RIGHT.bits());
//! assert!(events.landed, "spawned flush on the ground, first step lands");
//! assert!(state.grounded);
//! ```
//!
//! # Determinism
//!
//! The step only uses `+ - * /`, `min`, `max`, `round`, `ceil` and `%` on
//! `f32`. It performs no allocation, no I/O and keeps no state between calls
//! other than the caller's [`State`](state::State). Malformed parameters
//! (negative durations, NaN) are a caller contract violation: the step still
//! terminates, but the numbers it produces are unspecified.

#![deny(unsafe_code)]

pub mod collision;
pub mod geom;
pub mod input;
pub mod params;
pub mod parity;
pub mod state;
pub mod step;
pub mod trace;
pub mod wrap;

use geom::Rect;
use input::Buttons;
use params::Params;
use state::{Events, State};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while reading or writing parameter documents.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    /// The key is not part of the parameter schema.
    #[error("unknown parameter '{key}'. Known parameters: [{known}]")]
    UnknownKey {
        /// The rejected key.
        key: String,
        /// Comma-separated schema names.
        known: String,
    },

    /// The value is NaN or infinite.
    #[error("parameter '{key}' must be finite, got {value}")]
    NonFinite {
        /// The parameter name.
        key: String,
        /// The rejected value.
        value: f64,
    },

    /// The value lies outside the schema bounds.
    #[error("parameter '{key}' = {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// The parameter name.
        key: String,
        /// The rejected value.
        value: f64,
        /// Lower schema bound.
        min: f64,
        /// Upper schema bound.
        max: f64,
    },

    /// The document is not valid JSON or not a flat numeric object.
    #[error("malformed parameter document: {0}")]
    Malformed(String),
}

/// Errors produced while loading or comparing traces.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The trace script JSON could not be parsed.
    #[error("invalid trace script: {0}")]
    Script(String),

    /// A CSV trace line could not be parsed.
    #[error("invalid trace CSV at line {line}: {details}")]
    Csv {
        /// 1-based line number in the CSV text.
        line: usize,
        /// What was wrong with the line.
        details: String,
    },
}

/// Divergences reported by the parity checks. These are never recovered
/// from: every variant means two implementations simulated differently.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParityError {
    /// Two traces have a different number of rows.
    #[error("row count mismatch: {left_name}={left} {right_name}={right}")]
    RowCountMismatch {
        /// Name of the left-hand implementation.
        left_name: String,
        /// Rows on the left.
        left: usize,
        /// Name of the right-hand implementation.
        right_name: String,
        /// Rows on the right.
        right: usize,
    },

    /// The grounded flag differs on some frame.
    #[error("grounded mismatch at frame {frame}: {left} vs {right}")]
    GroundedMismatch {
        /// Frame index.
        frame: usize,
        /// Left-hand grounded flag.
        left: bool,
        /// Right-hand grounded flag.
        right: bool,
    },

    /// A numeric field differs by more than the tolerance.
    #[error("frame {frame} field {field}: {left} vs {right} (diff {diff} > tol {tolerance})")]
    FieldDivergence {
        /// Frame index.
        frame: usize,
        /// Field name (`x`, `y`, `vx`, `vy`).
        field: &'static str,
        /// Left-hand value.
        left: f64,
        /// Right-hand value.
        right: f64,
        /// Absolute difference.
        diff: f64,
        /// Configured tolerance.
        tolerance: f64,
    },

    /// Final-state hashes disagree across implementations.
    #[error("cross-target parity mismatch: {hashes}")]
    HashMismatch {
        /// `name=hash` pairs for every implementation compared.
        hashes: String,
    },

    /// No summaries were handed to the comparison.
    #[error("no implementations to compare")]
    NothingToCompare,
}

// ---------------------------------------------------------------------------
// Call boundary
// ---------------------------------------------------------------------------

/// Default tuning parameters. Same values as [`Params::default`].
pub fn core_default_params() -> Params {
    Params::default()
}

/// A freshly spawned actor at `(x, y)` with body size `w x h`.
///
/// Velocity and timers start at zero and `grounded` is false until the first
/// step decides it.
pub fn core_init_state(x: f32, y: f32, w: f32, h: f32) -> State {
    State::spawn(x, y, w, h)
}

/// Advance `state` by one fixed step using raw input bits.
///
/// Bits outside the five defined buttons are ignored.
pub fn core_step(params: &Params, world: &[Rect], state: &mut State, input_bits: u8) -> Events {
    step::step(params, world, state, Buttons::from_bits_truncate(input_bits))
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::geom::Rect;
    pub use crate::input::Buttons;
    pub use crate::params::{ParamSpec, Params, ParamsDocument, WrapMode, PARAM_SPECS};
    pub use crate::parity::{
        canonical_script, compare_summaries, run_script, NativeSimulator, ParitySummary,
        Simulator, StateHasher,
    };
    pub use crate::state::{EventCounts, Events, JumpPhase, State};
    pub use crate::step::{step, step_with_dt, DT, HZ};
    pub use crate::trace::{compare_traces, TraceReport, TraceRow, TraceRun, TraceScript};
    pub use crate::{core_default_params, core_init_state, core_step};
    pub use crate::{ParamsError, ParityError, TraceError};
}
