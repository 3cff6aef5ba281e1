//! Platlab Harness -- drivers and cross-implementation parity checks.
//!
//! This crate sits on top of every platlab target and provides:
//!
//! - **`Driver` / `FrameClock`**: a fixed-rate loop owner that assembles
//!   one step per tick and keeps cumulative event counts.
//! - **`ReplayRecorder` / `replay()`**: per-frame input logs with periodic
//!   state-hash checkpoints, verified frame by frame.
//! - **`ParityRun`**: runs the same script through the native engine, the C
//!   ABI, the WASM guest ABI and (optionally) a compiled WASM module under
//!   Wasmtime, then compares summary hashes.
//! - **`random_script`**: seeded input scripts for fuzzing parity beyond the
//!   canonical trace.
//!
//! The `platlab-parity` binary exposes all of it on the command line.

#![deny(unsafe_code)]

pub mod check;
pub mod driver;
pub mod random;
pub mod replay;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::check::{run_target, ParityReport, ParityRun};
    pub use crate::driver::{Driver, FrameClock};
    pub use crate::random::{random_script, RandomScriptConfig};
    pub use crate::replay::{
        record_script, replay, ReplayEntry, ReplayLog, ReplayRecorder, ReplayResult,
    };
}
