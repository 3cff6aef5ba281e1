//! Cross-implementation parity checks.
//!
//! A [`ParityRun`] holds one instance of every target: the native engine,
//! the C ABI, the WASM guest ABI called natively and, when a compiled module
//! is supplied, the same guest under Wasmtime. Each run plays one script
//! through all of them, compares every trace against the native one and
//! then compares final summary hashes, optionally together with summaries
//! produced elsewhere (a Python build, an older release).

use std::ops::Range;

use anyhow::Context;
use platlab_core::parity::{
    compare_summaries, hash_hex, run_script, NativeSimulator, ParitySummary, Simulator,
};
use platlab_core::trace::{
    compare_traces, TraceReport, TraceRun, TraceScript, DEFAULT_TOLERANCE,
};
use platlab_ffi::FfiSimulator;
use platlab_wasm::GuestSimulator;
use platlab_wasm_host::CoreModule;
use serde::Serialize;

use crate::random::{random_script, RandomScriptConfig};

/// Play `script` through `sim`, naming the target in any failure.
pub fn run_target<S>(sim: &mut S, script: &TraceScript) -> anyhow::Result<TraceRun>
where
    S: Simulator,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let name = sim.name().to_owned();
    run_script(sim, script).with_context(|| format!("target '{name}' failed to run the script"))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One target's result within a [`ParityReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetOutcome {
    /// Target name.
    pub name: String,
    /// Final summary.
    pub summary: ParitySummary,
    /// Summary hash as 16 hex digits.
    pub hash: String,
    /// Per-frame comparison against the native trace. `None` for the
    /// native target itself and for external summaries.
    pub trace: Option<TraceReport>,
}

/// Result of playing one script through every target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityReport {
    /// Frames in the script.
    pub frames: usize,
    /// Rolling hash of the native per-frame trace, as 16 hex digits.
    pub trace_hash: String,
    /// Every target compared, native first.
    pub targets: Vec<TargetOutcome>,
    /// Shared summary hash when every target agreed.
    pub agreed_hash: Option<String>,
    /// Every divergence found, one line each.
    pub failures: Vec<String>,
}

impl ParityReport {
    /// True when all traces and hashes matched.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of [`ParityRun::fuzz`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzOutcome {
    /// Scripts played before stopping.
    pub scripts_run: u64,
    /// Seed and report of the first failing script.
    pub first_failure: Option<(u64, ParityReport)>,
}

// ---------------------------------------------------------------------------
// ParityRun
// ---------------------------------------------------------------------------

/// Every target, ready to play scripts.
pub struct ParityRun {
    native: NativeSimulator,
    ffi: FfiSimulator,
    guest: GuestSimulator,
    module: Option<CoreModule>,
    external: Vec<(String, ParitySummary)>,
    tolerance: f64,
}

impl ParityRun {
    /// Native, C ABI and guest targets with [`DEFAULT_TOLERANCE`].
    pub fn new() -> Self {
        Self {
            native: NativeSimulator::new(),
            ffi: FfiSimulator::new(),
            guest: GuestSimulator::new(),
            module: None,
            external: Vec::new(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Also run a compiled guest under Wasmtime.
    pub fn with_module(mut self, module: CoreModule) -> Self {
        self.module = Some(module);
        self
    }

    /// Per-field tolerance for trace comparison.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Add a summary produced outside this process. It must come from the
    /// same script later passed to [`ParityRun::run`].
    pub fn add_external(&mut self, name: impl Into<String>, summary: ParitySummary) {
        self.external.push((name.into(), summary));
    }

    /// Names of the in-process targets, in report order.
    pub fn target_names(&self) -> Vec<String> {
        let mut names = vec![
            self.native.name().to_owned(),
            self.ffi.name().to_owned(),
            self.guest.name().to_owned(),
        ];
        if let Some(module) = &self.module {
            names.push(module.name().to_owned());
        }
        names
    }

    /// Play `script` through every target, external summaries included.
    ///
    /// # Errors
    ///
    /// Fails only when a target cannot run at all (a WASM trap, fuel
    /// exhaustion). Divergences are reported in the returned report.
    pub fn run(&mut self, script: &TraceScript) -> anyhow::Result<ParityReport> {
        self.run_with(script, true)
    }

    /// Play one random script per seed, stopping at the first divergence.
    /// External summaries are not consulted.
    pub fn fuzz(
        &mut self,
        seeds: Range<u64>,
        config: &RandomScriptConfig,
    ) -> anyhow::Result<FuzzOutcome> {
        let mut scripts_run = 0;
        for seed in seeds {
            let script = random_script(seed, config);
            let report = self
                .run_with(&script, false)
                .with_context(|| format!("fuzz seed {seed}"))?;
            scripts_run += 1;
            if !report.passed() {
                tracing::warn!(seed, failures = report.failures.len(), "fuzz found a divergence");
                return Ok(FuzzOutcome {
                    scripts_run,
                    first_failure: Some((seed, report)),
                });
            }
        }
        tracing::info!(scripts = scripts_run, "fuzz finished without divergence");
        Ok(FuzzOutcome {
            scripts_run,
            first_failure: None,
        })
    }

    fn run_with(
        &mut self,
        script: &TraceScript,
        include_external: bool,
    ) -> anyhow::Result<ParityReport> {
        let native = run_target(&mut self.native, script)?;
        let mut runs = vec![
            (self.ffi.name().to_owned(), run_target(&mut self.ffi, script)?),
            (self.guest.name().to_owned(), run_target(&mut self.guest, script)?),
        ];
        if let Some(module) = self.module.as_mut() {
            runs.push((module.name().to_owned(), run_target(module, script)?));
        }

        let native_name = self.native.name().to_owned();
        let mut failures = Vec::new();
        let mut targets = vec![TargetOutcome {
            name: native_name.clone(),
            summary: native.summary,
            hash: native.summary.hash_hex(),
            trace: None,
        }];
        for (name, run) in &runs {
            let compared =
                compare_traces(&native_name, &native.rows, name, &run.rows, self.tolerance);
            let trace = match compared {
                Ok(report) => Some(report),
                Err(e) => {
                    failures.push(format!("{name}: {e}"));
                    None
                }
            };
            targets.push(TargetOutcome {
                name: name.clone(),
                summary: run.summary,
                hash: run.summary.hash_hex(),
                trace,
            });
        }
        if include_external {
            for (name, summary) in &self.external {
                targets.push(TargetOutcome {
                    name: name.clone(),
                    summary: *summary,
                    hash: summary.hash_hex(),
                    trace: None,
                });
            }
        }

        let entries: Vec<(&str, ParitySummary)> =
            targets.iter().map(|t| (t.name.as_str(), t.summary)).collect();
        let agreed_hash = match compare_summaries(&entries) {
            Ok(hash) => Some(hash_hex(hash)),
            Err(e) => {
                failures.push(e.to_string());
                None
            }
        };

        let report = ParityReport {
            frames: script.inputs.len(),
            trace_hash: hash_hex(native.trace_hash()),
            targets,
            agreed_hash,
            failures,
        };
        tracing::debug!(
            frames = report.frames,
            targets = report.targets.len(),
            passed = report.passed(),
            "parity run finished"
        );
        Ok(report)
    }
}

impl Default for ParityRun {
    fn default() -> Self {
        Self::new()
    }
}
