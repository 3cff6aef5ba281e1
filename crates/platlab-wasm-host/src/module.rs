//! Guest module loading, validation and execution.
//!
//! [`CoreModule`] wraps a Wasmtime instance of a platlab core build. It
//! enforces fuel metering and a memory cap, and checks the whole export
//! surface (names, signatures, parameter schema size) before it hands out a
//! usable module.

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::{Params, PARAM_COUNT};
use platlab_core::parity::Simulator;
use platlab_core::state::{Events, State};
use platlab_wasm::abi::{self, StateField};
use wasmtime::{Engine, Linker, Module, ResourceLimiter, Store, TypedFunc};

use crate::WasmError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the WASM sandbox.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WasmConfig {
    /// Fuel units granted to every call into the guest. When fuel runs out
    /// the call traps with [`WasmError::OutOfFuel`]. Default: 1,000,000.
    pub fuel_per_step: u64,

    /// Maximum linear memory the guest may hold, in bytes.
    /// Default: 16 MiB (16,777,216 bytes).
    pub memory_limit_bytes: usize,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            fuel_per_step: 1_000_000,
            memory_limit_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

// ---------------------------------------------------------------------------
// Resource limiting
// ---------------------------------------------------------------------------

/// Store data: refuses memory growth past the cap and remembers that it did,
/// so the trap the guest raises afterwards can be reported accurately.
#[derive(Debug)]
pub struct SandboxLimiter {
    limit_bytes: usize,
    exceeded: bool,
}

impl SandboxLimiter {
    /// Limiter capping linear memory at `limit_bytes`.
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes,
            exceeded: false,
        }
    }

    /// Whether a growth request was ever refused.
    pub fn exceeded(&self) -> bool {
        self.exceeded
    }
}

impl ResourceLimiter for SandboxLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.limit_bytes {
            tracing::debug!(current, desired, limit = self.limit_bytes, "refusing memory growth");
            self.exceeded = true;
            return Ok(false);
        }
        Ok(true)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        _desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// CoreModule
// ---------------------------------------------------------------------------

/// Resolved guest exports.
struct Exports {
    reset: TypedFunc<(f32, f32, f32, f32), ()>,
    set_param: TypedFunc<(u32, f32), i32>,
    clear_world: TypedFunc<(), ()>,
    push_rect: TypedFunc<(f32, f32, f32, f32), u32>,
    step: TypedFunc<u32, u32>,
    get: TypedFunc<u32, f32>,
    set: TypedFunc<(u32, f32), i32>,
}

/// A loaded and validated platlab core module.
///
/// # Sandbox Guarantees
///
/// - No imports of any kind; a module that imports anything fails to load
/// - Fuel is reset to [`WasmConfig::fuel_per_step`] before every call
/// - Memory is capped at [`WasmConfig::memory_limit_bytes`]
pub struct CoreModule {
    store: Store<SandboxLimiter>,
    exports: Exports,
    config: WasmConfig,
    module_hash: String,
    last_step_fuel: u64,
}

impl CoreModule {
    /// Load and instantiate a core module from raw bytes.
    ///
    /// The bytes may be a binary `.wasm` file or a text `.wat` file.
    ///
    /// # Errors
    ///
    /// - [`WasmError::CompileError`] if the bytes are not valid WASM/WAT.
    /// - [`WasmError::MissingExport`] if any `platlab_*` export is absent.
    /// - [`WasmError::AbiMismatch`] if an export has the wrong signature or
    ///   the module was built against a different parameter schema.
    /// - [`WasmError::MemoryLimitExceeded`] if the initial memory is too big.
    /// - [`WasmError::Runtime`] if instantiation fails (e.g. unsatisfied imports).
    pub fn from_bytes(config: &WasmConfig, bytes: &[u8]) -> Result<Self, WasmError> {
        let mut engine_config = wasmtime::Config::new();
        engine_config.consume_fuel(true);

        let engine = Engine::new(&engine_config)
            .map_err(|e| WasmError::Runtime(format!("failed to create Wasmtime engine: {e}")))?;

        let module =
            Module::new(&engine, bytes).map_err(|e| WasmError::CompileError(format!("{e}")))?;

        // Report the first missing name before instantiation muddies it.
        for name in abi::REQUIRED_EXPORTS {
            if !module.exports().any(|export| export.name() == *name) {
                return Err(WasmError::MissingExport {
                    name: (*name).to_owned(),
                });
            }
        }

        let mut store = Store::new(&engine, SandboxLimiter::new(config.memory_limit_bytes));
        store.limiter(|limiter| limiter);
        store
            .set_fuel(config.fuel_per_step)
            .map_err(|e| WasmError::Runtime(format!("failed to set fuel: {e}")))?;

        // Empty linker: the guest gets no host functions.
        let linker: Linker<SandboxLimiter> = Linker::new(&engine);
        let instance = linker.instantiate(&mut store, &module).map_err(|e| {
            if store.data().exceeded() {
                WasmError::MemoryLimitExceeded {
                    limit_bytes: config.memory_limit_bytes,
                }
            } else {
                WasmError::Runtime(format!("{e}"))
            }
        })?;

        macro_rules! typed {
            ($name:expr) => {
                instance
                    .get_typed_func(&mut store, $name)
                    .map_err(|e| WasmError::AbiMismatch(format!("export '{}': {e}", $name)))?
            };
        }
        let param_count: TypedFunc<(), u32> = typed!(abi::EXPORT_PARAM_COUNT);
        let exports = Exports {
            reset: typed!(abi::EXPORT_RESET),
            set_param: typed!(abi::EXPORT_SET_PARAM),
            clear_world: typed!(abi::EXPORT_CLEAR_WORLD),
            push_rect: typed!(abi::EXPORT_PUSH_RECT),
            step: typed!(abi::EXPORT_STEP),
            get: typed!(abi::EXPORT_GET),
            set: typed!(abi::EXPORT_SET),
        };

        let mut core = Self {
            store,
            exports,
            config: config.clone(),
            module_hash: blake3::hash(bytes).to_hex().to_string(),
            last_step_fuel: 0,
        };

        core.reset_fuel()?;
        let count = param_count
            .call(&mut core.store, ())
            .map_err(|e| core.classify_trap(e))?;
        if count as usize != PARAM_COUNT {
            return Err(WasmError::AbiMismatch(format!(
                "module has {count} parameters, host schema has {PARAM_COUNT}"
            )));
        }

        tracing::debug!(
            fuel_per_step = config.fuel_per_step,
            memory_limit = config.memory_limit_bytes,
            module_hash = %core.module_hash,
            "core module loaded and instantiated"
        );

        Ok(core)
    }

    /// Push every parameter into the guest, in schema order.
    ///
    /// # Errors
    ///
    /// [`WasmError::AbiMismatch`] if the guest rejects an index or value.
    pub fn set_params(&mut self, params: &Params) -> Result<(), WasmError> {
        for (index, value) in params.values().into_iter().enumerate() {
            self.reset_fuel()?;
            let ok = self
                .exports
                .set_param
                .call(&mut self.store, (index as u32, value))
                .map_err(|e| self.classify_trap(e))?;
            if ok != 1 {
                return Err(WasmError::AbiMismatch(format!(
                    "guest rejected parameter {index} = {value}"
                )));
            }
        }
        Ok(())
    }

    /// Replace the guest's world.
    pub fn set_world(&mut self, world: &[Rect]) -> Result<(), WasmError> {
        self.reset_fuel()?;
        self.exports
            .clear_world
            .call(&mut self.store, ())
            .map_err(|e| self.classify_trap(e))?;
        for r in world {
            self.reset_fuel()?;
            self.exports
                .push_rect
                .call(&mut self.store, (r.x, r.y, r.w, r.h))
                .map_err(|e| self.classify_trap(e))?;
        }
        Ok(())
    }

    /// Respawn, then overwrite every state field.
    pub fn write_state(&mut self, state: &State) -> Result<(), WasmError> {
        self.reset_fuel()?;
        self.exports
            .reset
            .call(&mut self.store, (state.x, state.y, state.w, state.h))
            .map_err(|e| self.classify_trap(e))?;
        for field in StateField::ALL {
            self.reset_fuel()?;
            let ok = self
                .exports
                .set
                .call(&mut self.store, (field.index(), field.get(state)))
                .map_err(|e| self.classify_trap(e))?;
            if ok != 1 {
                return Err(WasmError::AbiMismatch(format!(
                    "guest rejected state field {field:?}"
                )));
            }
        }
        Ok(())
    }

    /// Read every state field back.
    pub fn read_state(&mut self) -> Result<State, WasmError> {
        let mut state = State::default();
        for field in StateField::ALL {
            self.reset_fuel()?;
            let value = self
                .exports
                .get
                .call(&mut self.store, field.index())
                .map_err(|e| self.classify_trap(e))?;
            field.set(&mut state, value);
        }
        Ok(state)
    }

    /// Advance the guest one fixed step with raw input bits.
    ///
    /// # Errors
    ///
    /// - [`WasmError::OutOfFuel`] if the step exhausts the fuel budget.
    /// - [`WasmError::MemoryLimitExceeded`] if it tried to grow memory past the cap.
    /// - [`WasmError::Trap`] for any other trap.
    pub fn step_bits(&mut self, input_bits: u8) -> Result<Events, WasmError> {
        self.reset_fuel()?;
        let packed = self
            .exports
            .step
            .call(&mut self.store, u32::from(input_bits))
            .map_err(|e| self.classify_trap(e))?;

        let remaining = self
            .store
            .get_fuel()
            .map_err(|e| WasmError::Runtime(format!("failed to read fuel: {e}")))?;
        self.last_step_fuel = self.config.fuel_per_step.saturating_sub(remaining);

        tracing::trace!(
            input_bits,
            events = packed,
            fuel_consumed = self.last_step_fuel,
            "platlab_step() completed"
        );

        Ok(Events::from_bits(packed))
    }

    /// Fuel consumed by the most recent step.
    pub fn last_step_fuel(&self) -> u64 {
        self.last_step_fuel
    }

    /// BLAKE3 hex digest of the module bytes.
    pub fn module_hash(&self) -> &str {
        &self.module_hash
    }

    /// Returns the configuration used to create this module.
    pub fn config(&self) -> &WasmConfig {
        &self.config
    }

    // -- Internal helpers ---------------------------------------------------

    fn reset_fuel(&mut self) -> Result<(), WasmError> {
        self.store
            .set_fuel(self.config.fuel_per_step)
            .map_err(|e| WasmError::Runtime(format!("failed to set fuel: {e}")))
    }

    /// Classify a Wasmtime error into the appropriate [`WasmError`] variant.
    fn classify_trap(&self, error: anyhow::Error) -> WasmError {
        if self.store.data().exceeded() {
            return WasmError::MemoryLimitExceeded {
                limit_bytes: self.config.memory_limit_bytes,
            };
        }
        for cause in error.chain() {
            if let Some(trap) = cause.downcast_ref::<wasmtime::Trap>() {
                if *trap == wasmtime::Trap::OutOfFuel {
                    return WasmError::OutOfFuel {
                        budget: self.config.fuel_per_step,
                    };
                }
                return WasmError::Trap(format!("{error}"));
            }
        }
        WasmError::Runtime(format!("{error}"))
    }
}

impl Simulator for CoreModule {
    type Error = WasmError;

    fn name(&self) -> &str {
        "wasm"
    }

    fn load(&mut self, params: &Params, world: &[Rect], state: &State) -> Result<(), WasmError> {
        self.set_params(params)?;
        self.set_world(world)?;
        self.write_state(state)
    }

    fn step(&mut self, input: Buttons) -> Result<Events, WasmError> {
        self.step_bits(input.bits())
    }

    fn state(&mut self) -> Result<State, WasmError> {
        self.read_state()
    }
}

impl std::fmt::Debug for CoreModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreModule")
            .field("config", &self.config)
            .field("module_hash", &self.module_hash)
            .field("last_step_fuel", &self.last_step_fuel)
            .finish_non_exhaustive()
    }
}
