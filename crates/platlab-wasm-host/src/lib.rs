//! Platlab WASM Host -- runs the sandboxed step engine on Wasmtime.
//!
//! The guest module (built from `platlab-wasm`) runs inside a fuel-metered
//! Wasmtime instance with no imports at all: no WASI, no host callbacks, no
//! wall-clock access. The host drives it through the scalar ABI described in
//! [`platlab_wasm::abi`] and reads state back field by field.
//!
//! # Architecture
//!
//! - **`WasmConfig`**: fuel budget per call and linear-memory cap.
//! - **`CoreModule`**: loads, validates and drives one guest instance. It
//!   implements [`Simulator`](platlab_core::parity::Simulator), so the parity
//!   harness treats it like any other target.
//! - **`WasmError`**: compilation, missing exports, ABI mismatch, fuel
//!   exhaustion, traps and memory-limit failures.
//!
//! # Example
//!
//! ```no_run
//! use platlab_core::prelude::*;
//! use platlab_wasm_host::{CoreModule, WasmConfig};
//!
//! let bytes = std::fs::read("target/wasm32-unknown-unknown/release/platlab_wasm.wasm").unwrap();
//! let mut module = CoreModule::from_bytes(&WasmConfig::default(), &bytes).unwrap();
//! let run = run_script(&mut module, &canonical_script()).unwrap();
//! println!("{}", run.summary.hash_hex());
//! ```

#![deny(unsafe_code)]

mod module;

pub use module::{CoreModule, SandboxLimiter, WasmConfig};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while loading or driving a guest module.
#[derive(Debug, thiserror::Error)]
pub enum WasmError {
    /// The bytes are not valid WASM or WAT.
    #[error("WASM compilation failed: {0}")]
    CompileError(String),

    /// The module does not export a function the ABI requires.
    #[error("missing required export '{name}' -- a core module must export every platlab_* fn")]
    MissingExport {
        /// The name of the missing export.
        name: String,
    },

    /// The module exports the right names but disagrees with the host about
    /// signatures, the parameter schema or field indices.
    #[error("ABI mismatch: {0}")]
    AbiMismatch(String),

    /// A call exhausted its fuel budget.
    #[error("WASM module ran out of fuel (budget: {budget} units) -- possible infinite loop")]
    OutOfFuel {
        /// The fuel budget that was exceeded.
        budget: u64,
    },

    /// A WASM trap occurred (unreachable, out-of-bounds access, ...).
    #[error("WASM trap: {0}")]
    Trap(String),

    /// The module tried to grow its memory past the configured cap.
    #[error("WASM module exceeded memory limit of {limit_bytes} bytes")]
    MemoryLimitExceeded {
        /// The configured memory limit in bytes.
        limit_bytes: usize,
    },

    /// A general runtime error from the Wasmtime engine.
    #[error("WASM runtime error: {0}")]
    Runtime(String),
}
