//! Deterministic replay with input recording and checkpoint verification.
//!
//! A [`ReplayLog`] captures a scenario (params, world, initial state), the
//! input bits of every frame and periodic state-hash checkpoints. Replaying
//! it on a fresh [`Driver`] feeds the recorded inputs frame by frame and
//! compares hashes at each checkpoint, stopping at the first divergence.
//!
//! # Recording
//!
//! ```
//! use platlab_core::prelude::*;
//! use platlab_harness::driver::Driver;
//! use platlab_harness::replay::ReplayRecorder;
//!
//! let script = canonical_script();
//! let mut driver = Driver::from_script(&script);
//! let mut recorder = ReplayRecorder::new(&script, 10); // checkpoint every 10 frames
//!
//! for &bits in &script.inputs {
//!     let frame = driver.frame();
//!     recorder.record_frame(frame, bits, Some(driver.state_hash_hex()));
//!     driver.tick(Buttons::from_bits_truncate(bits));
//! }
//!
//! let log = recorder.finish();
//! assert_eq!(log.total_frames, 180);
//! ```
//!
//! # Replaying
//!
//! ```
//! # use platlab_core::prelude::*;
//! use platlab_harness::replay::{record_script, replay};
//!
//! let log = record_script(&canonical_script(), 10);
//! let result = replay(&log).expect("replay should succeed");
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use platlab_core::geom::Rect;
use platlab_core::input::Buttons;
use platlab_core::params::Params;
use platlab_core::state::State;
use platlab_core::trace::TraceScript;
use serde::{Deserialize, Serialize};

use crate::driver::Driver;

// ---------------------------------------------------------------------------
// Scenario fingerprint
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Scenario<'a> {
    params: &'a Params,
    world: &'a [Rect],
    initial_state: &'a State,
}

/// BLAKE3 hex digest of the canonical JSON form of a scenario.
///
/// Identifies which params, world and spawn a log was recorded against, so a
/// log cannot silently be replayed on a different scenario.
pub fn scenario_fingerprint(params: &Params, world: &[Rect], initial_state: &State) -> String {
    let scenario = Scenario {
        params,
        world,
        initial_state,
    };
    // Plain structs of floats and bools always serialize.
    let bytes = serde_json::to_vec(&scenario).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A complete replay log: scenario + ordered inputs and checkpoints.
///
/// Fully serializable to JSON for storage and regression fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Tuning parameters of the recording.
    pub params: Params,
    /// Static platforms of the recording.
    pub world: Vec<Rect>,
    /// Actor state before frame 0.
    pub initial_state: State,
    /// [`scenario_fingerprint`] of the three fields above.
    pub scenario_hash: String,
    /// Optional BLAKE3 hex digest of the WASM module used while recording.
    /// Informational only; replay does not enforce it.
    pub module_hash: Option<String>,
    /// Number of frames recorded. Replay runs exactly this many.
    pub total_frames: u64,
    /// Inputs and checkpoints, in frame order.
    pub entries: Vec<ReplayEntry>,
}

impl ReplayLog {
    /// The log as a plain trace script, one input per frame.
    pub fn to_script(&self) -> TraceScript {
        let mut inputs = vec![0u8; self.total_frames as usize];
        for entry in &self.entries {
            if let ReplayEntry::Input { frame, bits } = entry {
                if let Some(slot) = inputs.get_mut(*frame as usize) {
                    *slot = *bits;
                }
            }
        }
        TraceScript {
            params: self.params,
            world: self.world.clone(),
            initial_state: self.initial_state,
            inputs,
        }
    }
}

/// One entry of a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayEntry {
    /// Non-empty input bits held on `frame`.
    Input {
        /// Frame the input applies to.
        frame: u64,
        /// Raw button bits.
        bits: u8,
    },
    /// State hash taken before `frame` was stepped.
    Checkpoint {
        /// Frame the checkpoint precedes.
        frame: u64,
        /// 16-hex-digit parity hash of state and event counts.
        state_hash: String,
    },
}

/// The outcome of replaying a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every frame was replayed without divergence.
    pub completed: bool,
    /// Frames replayed before stopping.
    pub frames_replayed: u64,
    /// First checkpoint that did not match. `None` when deterministic.
    pub first_divergence: Option<ReplayDivergence>,
}

/// Details about a determinism failure detected during replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    /// Frame whose checkpoint failed.
    pub frame: u64,
    /// Hash recorded in the log.
    pub expected_hash: String,
    /// Hash computed during replay.
    pub actual_hash: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Records a run into a [`ReplayLog`].
///
/// Call [`record_frame`](Self::record_frame) before each step with that
/// frame's input and, optionally, the pre-step state hash. Frames must be
/// recorded in strictly increasing order.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    log: ReplayLog,
    checkpoint_interval: u64,
    frames_recorded: u64,
    last_frame: Option<u64>,
}

impl ReplayRecorder {
    /// Recorder for `script`'s scenario. A `checkpoint_interval` of 10 keeps
    /// hashes for frames 0, 10, 20, ...; 0 keeps every hash supplied.
    pub fn new(script: &TraceScript, checkpoint_interval: u64) -> Self {
        Self {
            log: ReplayLog {
                params: script.params,
                world: script.world.clone(),
                initial_state: script.initial_state,
                scenario_hash: scenario_fingerprint(
                    &script.params,
                    &script.world,
                    &script.initial_state,
                ),
                module_hash: None,
                total_frames: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            frames_recorded: 0,
            last_frame: None,
        }
    }

    /// Attach the digest of the WASM module that was active.
    pub fn set_module_hash(&mut self, hash: String) {
        self.log.module_hash = Some(hash);
    }

    /// Record one frame.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not strictly greater than the previous one.
    pub fn record_frame(&mut self, frame: u64, bits: u8, state_hash: Option<String>) {
        if let Some(prev) = self.last_frame {
            assert!(
                frame > prev,
                "ReplayRecorder::record_frame: frame {frame} is not strictly greater \
                 than previous frame {prev}"
            );
        }
        self.last_frame = Some(frame);
        self.frames_recorded += 1;

        let bits = Buttons::from_bits_truncate(bits).bits();
        if bits != 0 {
            self.log.entries.push(ReplayEntry::Input { frame, bits });
        }

        if let Some(hash) = state_hash {
            let due = self.checkpoint_interval == 0 || frame % self.checkpoint_interval == 0;
            if due {
                self.log.entries.push(ReplayEntry::Checkpoint {
                    frame,
                    state_hash: hash,
                });
            }
        }
    }

    /// Finish recording and return the log.
    pub fn finish(mut self) -> ReplayLog {
        self.log.total_frames = self.frames_recorded;
        self.log
    }
}

/// Run `script` on a fresh [`Driver`] and record it.
pub fn record_script(script: &TraceScript, checkpoint_interval: u64) -> ReplayLog {
    let mut driver = Driver::from_script(script);
    let mut recorder = ReplayRecorder::new(script, checkpoint_interval);
    for &bits in &script.inputs {
        recorder.record_frame(driver.frame(), bits, Some(driver.state_hash_hex()));
        driver.tick(Buttons::from_bits_truncate(bits));
    }
    let log = recorder.finish();
    tracing::debug!(
        frames = log.total_frames,
        entries = log.entries.len(),
        "recorded replay log"
    );
    log
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Replay `log` on a fresh [`Driver`], verifying every checkpoint.
///
/// Stops at the first divergence and reports how far it got.
///
/// # Errors
///
/// Returns an error if the log is malformed: duplicate entries, entries past
/// `total_frames`, or a scenario hash that does not match its scenario.
pub fn replay(log: &ReplayLog) -> anyhow::Result<ReplayResult> {
    let expected = scenario_fingerprint(&log.params, &log.world, &log.initial_state);
    if expected != log.scenario_hash {
        anyhow::bail!(
            "replay log scenario hash {} does not match its scenario ({expected})",
            log.scenario_hash
        );
    }

    let mut inputs: BTreeMap<u64, u8> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();
    for entry in &log.entries {
        let frame = match entry {
            ReplayEntry::Input { frame, bits } => {
                if inputs.insert(*frame, *bits).is_some() {
                    anyhow::bail!("replay log contains duplicate Input entry at frame {frame}");
                }
                *frame
            }
            ReplayEntry::Checkpoint { frame, state_hash } => {
                if checkpoints.insert(*frame, state_hash).is_some() {
                    anyhow::bail!(
                        "replay log contains duplicate Checkpoint entry at frame {frame}"
                    );
                }
                *frame
            }
        };
        if frame >= log.total_frames {
            anyhow::bail!(
                "replay log entry at frame {frame} is past total_frames ({})",
                log.total_frames
            );
        }
    }

    let mut driver = Driver::new(log.params, log.world.clone(), log.initial_state);
    let mut frames_replayed = 0;
    for frame in 0..log.total_frames {
        if let Some(&expected_hash) = checkpoints.get(&frame) {
            let actual_hash = driver.state_hash_hex();
            if actual_hash != expected_hash {
                tracing::warn!(
                    frame,
                    expected = expected_hash,
                    actual = %actual_hash,
                    "replay diverged"
                );
                return Ok(ReplayResult {
                    completed: false,
                    frames_replayed,
                    first_divergence: Some(ReplayDivergence {
                        frame,
                        expected_hash: expected_hash.to_owned(),
                        actual_hash,
                    }),
                });
            }
        }
        let bits = inputs.get(&frame).copied().unwrap_or(0);
        driver.tick(Buttons::from_bits_truncate(bits));
        frames_replayed += 1;
    }

    Ok(ReplayResult {
        completed: true,
        frames_replayed,
        first_divergence: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use platlab_core::parity::canonical_script;

    #[test]
    fn recorded_canonical_run_replays_clean() {
        let log = record_script(&canonical_script(), 10);
        assert_eq!(log.total_frames, 180);
        let checkpoints = log
            .entries
            .iter()
            .filter(|e| matches!(e, ReplayEntry::Checkpoint { .. }))
            .count();
        assert_eq!(checkpoints, 18);

        let result = replay(&log).unwrap();
        assert!(result.completed);
        assert_eq!(result.frames_replayed, 180);
        assert!(result.first_divergence.is_none());
    }

    #[test]
    fn empty_inputs_are_not_stored() {
        let log = record_script(&canonical_script(), 0);
        let inputs = log
            .entries
            .iter()
            .filter(|e| matches!(e, ReplayEntry::Input { .. }))
            .count();
        assert_eq!(inputs, 120);
    }

    #[test]
    fn log_converts_back_to_script() {
        let script = canonical_script();
        let log = record_script(&script, 30);
        assert_eq!(log.to_script(), script);
    }

    #[test]
    fn tampered_checkpoint_reports_first_divergence() {
        let mut log = record_script(&canonical_script(), 10);
        for entry in &mut log.entries {
            if let ReplayEntry::Checkpoint { frame: 50, state_hash } = entry {
                *state_hash = "0000000000000000".to_owned();
            }
        }
        let result = replay(&log).unwrap();
        assert!(!result.completed);
        assert_eq!(result.frames_replayed, 50);
        let div = result.first_divergence.unwrap();
        assert_eq!(div.frame, 50);
        assert_eq!(div.expected_hash, "0000000000000000");
    }

    #[test]
    fn tampered_input_diverges_at_next_checkpoint() {
        let mut log = record_script(&canonical_script(), 10);
        log.entries.retain(|e| !matches!(e, ReplayEntry::Input { frame: 10, .. }));
        let result = replay(&log).unwrap();
        assert_eq!(result.first_divergence.map(|d| d.frame), Some(20));
    }

    #[test]
    fn scenario_mismatch_is_rejected() {
        let mut log = record_script(&canonical_script(), 10);
        log.params.gravity_down = 1000.0;
        let err = replay(&log).unwrap_err();
        assert!(err.to_string().contains("scenario hash"));
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let mut log = record_script(&canonical_script(), 10);
        log.entries.push(ReplayEntry::Input { frame: 3, bits: 2 });
        assert!(replay(&log).unwrap_err().to_string().contains("duplicate Input"));
    }

    #[test]
    fn entries_past_the_end_are_rejected() {
        let mut log = record_script(&canonical_script(), 10);
        log.entries.push(ReplayEntry::Input { frame: 500, bits: 2 });
        assert!(replay(&log).is_err());
    }

    #[test]
    #[should_panic(expected = "strictly greater")]
    fn recorder_rejects_out_of_order_frames() {
        let mut recorder = ReplayRecorder::new(&canonical_script(), 10);
        recorder.record_frame(5, 0, None);
        recorder.record_frame(5, 0, None);
    }

    #[test]
    fn log_survives_json() {
        let log = record_script(&canonical_script(), 10);
        let json = serde_json::to_string(&log).unwrap();
        let back: ReplayLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
        assert!(replay(&back).unwrap().completed);
    }
}
