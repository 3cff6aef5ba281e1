//! `platlab-parity`: run, record, replay and cross-check platlab traces.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use platlab_core::parity::{canonical_script, hash_hex, NativeSimulator, ParitySummary};
use platlab_core::trace::{compare_traces, parse_csv, TraceScript, DEFAULT_TOLERANCE};
use platlab_harness::check::{run_target, ParityRun};
use platlab_harness::random::RandomScriptConfig;
use platlab_harness::replay::{record_script, replay, ReplayLog};
use platlab_wasm_host::{CoreModule, WasmConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "platlab-parity",
    version,
    about = "Cross-implementation parity checks for the platlab step engine"
)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the canonical 180-frame trace natively and print its summary as JSON.
    Canonical {
        /// Also write the per-frame trace as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Run a trace script natively and print the per-frame CSV.
    Replay {
        /// Trace script JSON.
        script: PathBuf,
    },
    /// Compare two CSV traces row by row.
    Compare {
        /// Left CSV trace.
        left: PathBuf,
        /// Right CSV trace.
        right: PathBuf,
        /// Largest allowed per-field difference.
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tol: f64,
    },
    /// Run every implementation on a script and compare.
    Check {
        /// Trace script JSON. Defaults to the canonical trace.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Compiled platlab-wasm module to run under Wasmtime.
        #[arg(long)]
        wasm: Option<PathBuf>,
        /// External summary as `name=path.json`. Repeatable.
        #[arg(long = "summary", value_parser = parse_named_path)]
        summaries: Vec<(String, PathBuf)>,
        /// Also fuzz this many random scripts (seeds 0..N).
        #[arg(long, default_value_t = 0)]
        fuzz_seeds: u64,
        /// Frames per fuzz script.
        #[arg(long, default_value_t = 600)]
        fuzz_frames: usize,
        /// Largest allowed per-field difference.
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tol: f64,
        /// Fuel granted per call into the wasm module.
        #[arg(long)]
        fuel: Option<u64>,
    },
    /// Record a script into a replay log with state-hash checkpoints.
    Record {
        /// Trace script JSON. Defaults to the canonical trace.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Where to write the log.
        #[arg(long)]
        out: PathBuf,
        /// Frames between checkpoints (0 = every frame).
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
    /// Replay a log and verify every checkpoint.
    VerifyLog {
        /// Replay log JSON.
        log: PathBuf,
    },
}

fn parse_named_path(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=path, got '{s}'"))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected name=path, got '{s}'"));
    }
    Ok((name.to_owned(), PathBuf::from(path)))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Opts::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether everything matched.
fn run(opts: Opts) -> Result<bool> {
    match opts.command {
        Command::Canonical { csv } => {
            let run = run_target(&mut NativeSimulator::new(), &canonical_script())?;
            if let Some(path) = csv {
                fs::write(&path, run.to_csv())
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            // Flat, so the output doubles as a `--summary` input.
            let mut out = serde_json::to_value(run.summary)?;
            if let Some(obj) = out.as_object_mut() {
                obj.insert("hash".into(), run.summary.hash_hex().into());
                obj.insert("trace_hash".into(), hash_hex(run.trace_hash()).into());
            }
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(true)
        }
        Command::Replay { script } => {
            let script = load_script(&script)?;
            let run = run_target(&mut NativeSimulator::new(), &script)?;
            print!("{}", run.to_csv());
            Ok(true)
        }
        Command::Compare { left, right, tol } => {
            let a = parse_csv(&read(&left)?).with_context(|| left.display().to_string())?;
            let b = parse_csv(&read(&right)?).with_context(|| right.display().to_string())?;
            let (left_name, right_name) = (left.display().to_string(), right.display().to_string());
            match compare_traces(&left_name, &a, &right_name, &b, tol) {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    tracing::info!(rows = report.rows, "traces match");
                    Ok(true)
                }
                Err(e) => {
                    tracing::warn!(%e, "traces differ");
                    println!("MISMATCH: {e}");
                    Ok(false)
                }
            }
        }
        Command::Check {
            script,
            wasm,
            summaries,
            fuzz_seeds,
            fuzz_frames,
            tol,
            fuel,
        } => {
            let script = match script {
                Some(path) => load_script(&path)?,
                None => canonical_script(),
            };
            let mut parity = ParityRun::new().with_tolerance(tol);
            if let Some(path) = wasm {
                let mut config = WasmConfig::default();
                if let Some(fuel) = fuel {
                    config.fuel_per_step = fuel;
                }
                let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
                let module = CoreModule::from_bytes(&config, &bytes)
                    .with_context(|| format!("loading {}", path.display()))?;
                tracing::info!(
                    module = %path.display(),
                    hash = module.module_hash(),
                    "wasm module loaded"
                );
                parity = parity.with_module(module);
            }
            for (name, path) in summaries {
                parity.add_external(name, load_summary(&path)?);
            }

            let report = parity.run(&script)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            let mut ok = report.passed();
            if ok {
                tracing::info!(hash = report.agreed_hash.as_deref().unwrap_or(""), "parity OK");
            } else {
                for failure in &report.failures {
                    tracing::warn!("{failure}");
                }
            }

            if fuzz_seeds > 0 {
                let config = RandomScriptConfig {
                    frames: fuzz_frames,
                    ..Default::default()
                };
                let outcome = parity.fuzz(0..fuzz_seeds, &config)?;
                if let Some((seed, failed)) = &outcome.first_failure {
                    println!("fuzz seed {seed} diverged:");
                    println!("{}", serde_json::to_string_pretty(failed)?);
                    ok = false;
                }
            }
            Ok(ok)
        }
        Command::Record {
            script,
            out,
            interval,
        } => {
            let script = match script {
                Some(path) => load_script(&path)?,
                None => canonical_script(),
            };
            let log = record_script(&script, interval);
            fs::write(&out, serde_json::to_string_pretty(&log)?)
                .with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(frames = log.total_frames, out = %out.display(), "replay log written");
            Ok(true)
        }
        Command::VerifyLog { log } => {
            let parsed: ReplayLog = serde_json::from_str(&read(&log)?)
                .map_err(|e| anyhow!("{}: {e}", log.display()))?;
            let result = replay(&parsed)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.completed)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_script(path: &Path) -> Result<TraceScript> {
    TraceScript::from_json(&read(path)?).with_context(|| path.display().to_string())
}

fn load_summary(path: &Path) -> Result<ParitySummary> {
    serde_json::from_str(&read(path)?).map_err(|e| anyhow!("{}: {e}", path.display()))
}
