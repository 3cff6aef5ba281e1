//! Cross-implementation parity: quantized state hashing, the canonical
//! input trace and the [`Simulator`] seam every target implements.
//!
//! Two implementations agree when, after the same scripted input trace,
//! their final summaries hash to the same value. The hash is FNV-1a 64 over
//! the little-endian bytes of each quantized field, so a summary produced by
//! a Python or WASM build can be compared with the native one without
//! sharing any code beyond the quantization rule.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geom::Rect;
use crate::input::Buttons;
use crate::params::Params;
use crate::state::{flag_as_int, flag_from_any, EventCounts, Events, State};
use crate::step::step;
use crate::trace::{TraceRow, TraceRun, TraceScript};
use crate::ParityError;

// ---------------------------------------------------------------------------
// Quantization and hashing
// ---------------------------------------------------------------------------

/// Scale applied before rounding a float for hashing.
pub const QUANT_SCALE: f64 = 1000.0;

/// FNV-1a 64 offset basis.
pub const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;

/// FNV-1a 64 prime.
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// `round(v * 1000)` computed in f64.
pub fn quantize(v: f64) -> i64 {
    (v * QUANT_SCALE).round() as i64
}

/// Incremental FNV-1a 64 hasher over `i64` words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHasher {
    hash: u64,
}

impl StateHasher {
    /// A hasher at the offset basis.
    pub fn new() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }

    /// Feed the 8 little-endian bytes of `v`.
    pub fn write_i64(&mut self, v: i64) {
        for byte in v.to_le_bytes() {
            self.hash ^= u64::from(byte);
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
    }

    /// Feed a flag as `0` or `1`.
    pub fn write_flag(&mut self, v: bool) {
        self.write_i64(i64::from(v));
    }

    /// Current hash value. The hasher can keep absorbing afterwards.
    pub fn finish(&self) -> u64 {
        self.hash
    }
}

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a hash as 16 lowercase hex digits.
pub fn hash_hex(hash: u64) -> String {
    format!("{hash:016x}")
}

/// Final state plus cumulative event counts: the record every target emits
/// after running a trace.
///
/// Positions are stored as f64 so summaries read from another runtime's JSON
/// keep the exact value it printed. `grounded` is written as `0`/`1` and
/// read from either an integer or a boolean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParitySummary {
    /// Final left edge.
    pub x: f64,
    /// Final top edge.
    pub y: f64,
    /// Final horizontal velocity.
    pub vx: f64,
    /// Final vertical velocity.
    pub vy: f64,
    /// Final grounded flag.
    #[serde(serialize_with = "flag_as_int", deserialize_with = "flag_from_any")]
    pub grounded: bool,
    /// Number of steps that reported `jumped`.
    pub jumped: u32,
    /// Number of steps that reported `landed`.
    pub landed: u32,
    /// Number of steps that reported `bonked`.
    pub bonked: u32,
}

impl ParitySummary {
    /// Build a summary from a state and its running event totals.
    pub fn from_state(state: &State, counts: EventCounts) -> Self {
        Self {
            x: f64::from(state.x),
            y: f64::from(state.y),
            vx: f64::from(state.vx),
            vy: f64::from(state.vy),
            grounded: state.grounded,
            jumped: counts.jumped,
            landed: counts.landed,
            bonked: counts.bonked,
        }
    }

    /// The cumulative event counts carried by this summary.
    pub fn counts(&self) -> EventCounts {
        EventCounts {
            jumped: self.jumped,
            landed: self.landed,
            bonked: self.bonked,
        }
    }

    /// FNV-1a 64 over `(qx, qy, qvx, qvy, grounded, jumped, landed, bonked)`.
    pub fn hash(&self) -> u64 {
        let mut h = StateHasher::new();
        h.write_i64(quantize(self.x));
        h.write_i64(quantize(self.y));
        h.write_i64(quantize(self.vx));
        h.write_i64(quantize(self.vy));
        h.write_flag(self.grounded);
        h.write_i64(i64::from(self.jumped));
        h.write_i64(i64::from(self.landed));
        h.write_i64(i64::from(self.bonked));
        h.finish()
    }

    /// [`ParitySummary::hash`] as 16 lowercase hex digits.
    pub fn hash_hex(&self) -> String {
        hash_hex(self.hash())
    }
}

/// Check that every named summary hashes identically.
///
/// Returns the shared hash, or a [`ParityError::HashMismatch`] listing every
/// `name=hash` pair when any differ.
pub fn compare_summaries<S: AsRef<str>>(
    entries: &[(S, ParitySummary)],
) -> Result<u64, ParityError> {
    let Some((_, first)) = entries.first() else {
        return Err(ParityError::NothingToCompare);
    };
    let expected = first.hash();
    let all_equal = entries.iter().all(|(_, s)| s.hash() == expected);
    if all_equal {
        debug!(
            implementations = entries.len(),
            hash = %hash_hex(expected),
            "parity hashes agree"
        );
        return Ok(expected);
    }

    let hashes = entries
        .iter()
        .map(|(name, s)| format!("{}={}", name.as_ref(), s.hash_hex()))
        .collect::<Vec<_>>()
        .join(" ");
    Err(ParityError::HashMismatch { hashes })
}

// ---------------------------------------------------------------------------
// Canonical trace
// ---------------------------------------------------------------------------

/// Steps in the canonical trace.
pub const CANONICAL_FRAMES: usize = 180;

/// The single floor of the canonical world.
pub const CANONICAL_GROUND: Rect = Rect::new(0.0, 480.0, 960.0, 60.0);

/// Spawn rectangle of the canonical actor, standing on the floor.
pub const CANONICAL_SPAWN: Rect = Rect::new(80.0, 436.0, 28.0, 44.0);

/// Last frame (exclusive) on which RIGHT is held.
pub const CANONICAL_RIGHT_UNTIL: usize = 120;

/// The only frame on which JUMP is held.
pub const CANONICAL_JUMP_FRAME: usize = 10;

/// Buttons held on `frame` of the canonical trace.
pub fn canonical_input(frame: usize) -> Buttons {
    let mut buttons = Buttons::empty();
    if frame < CANONICAL_RIGHT_UNTIL {
        buttons |= Buttons::RIGHT;
    }
    if frame == CANONICAL_JUMP_FRAME {
        buttons |= Buttons::JUMP;
    }
    buttons
}

/// The canonical parity trace as a script: default params, one floor, the
/// canonical spawn and 180 frames of input.
pub fn canonical_script() -> TraceScript {
    let s = CANONICAL_SPAWN;
    TraceScript {
        params: Params::default(),
        world: vec![CANONICAL_GROUND],
        initial_state: State::spawn(s.x, s.y, s.w, s.h),
        inputs: (0..CANONICAL_FRAMES)
            .map(|frame| canonical_input(frame).bits())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Simulator seam
// ---------------------------------------------------------------------------

/// One implementation of the step engine, driven through a script.
///
/// `state` takes `&mut self` because sandboxed implementations read state
/// back through calls into their runtime.
pub trait Simulator {
    /// Failure type of the implementation. Infallible for in-process ones.
    type Error;

    /// Short name used in parity reports.
    fn name(&self) -> &str;

    /// Replace params, world and state.
    fn load(&mut self, params: &Params, world: &[Rect], state: &State) -> Result<(), Self::Error>;

    /// Advance one fixed step.
    fn step(&mut self, input: Buttons) -> Result<Events, Self::Error>;

    /// Current actor state.
    fn state(&mut self) -> Result<State, Self::Error>;
}

/// The engine called directly, in-process.
#[derive(Debug, Clone, Default)]
pub struct NativeSimulator {
    params: Params,
    world: Vec<Rect>,
    state: State,
}

impl NativeSimulator {
    /// An empty-world simulator with default params.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Simulator for NativeSimulator {
    type Error = Infallible;

    fn name(&self) -> &str {
        "native"
    }

    fn load(&mut self, params: &Params, world: &[Rect], state: &State) -> Result<(), Infallible> {
        self.params = *params;
        self.world = world.to_vec();
        self.state = *state;
        Ok(())
    }

    fn step(&mut self, input: Buttons) -> Result<Events, Infallible> {
        Ok(step(&self.params, &self.world, &mut self.state, input))
    }

    fn state(&mut self) -> Result<State, Infallible> {
        Ok(self.state)
    }
}

/// Drive `sim` through `script`, collecting one row per frame and the final
/// summary.
pub fn run_script<S: Simulator>(sim: &mut S, script: &TraceScript) -> Result<TraceRun, S::Error> {
    sim.load(&script.params, &script.world, &script.initial_state)?;

    let mut counts = EventCounts::default();
    let mut rows = Vec::with_capacity(script.inputs.len());
    let mut last = script.initial_state;
    for (frame, &bits) in script.inputs.iter().enumerate() {
        let events = sim.step(Buttons::from_bits_truncate(bits))?;
        counts.record(events);
        last = sim.state()?;
        rows.push(TraceRow::from_state(frame, &last));
    }

    let summary = ParitySummary::from_state(&last, counts);
    debug!(
        simulator = sim.name(),
        frames = rows.len(),
        hash = %summary.hash_hex(),
        "script finished"
    );
    Ok(TraceRun { rows, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_scales_and_rounds() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.2346), 1235);
        assert_eq!(quantize(-2.0004), -2000);
        assert_eq!(quantize(-2.0006), -2001);
        assert_eq!(quantize(555.0), 555_000);
    }

    #[test]
    fn empty_hasher_is_offset_basis() {
        assert_eq!(StateHasher::new().finish(), FNV_OFFSET_BASIS);
    }

    #[test]
    fn hasher_matches_reference_fnv1a() {
        // FNV-1a 64 of the single byte 'a' followed by seven zero bytes,
        // computed byte by byte.
        let mut expected = FNV_OFFSET_BASIS;
        for byte in [0x61u8, 0, 0, 0, 0, 0, 0, 0] {
            expected ^= u64::from(byte);
            expected = expected.wrapping_mul(FNV_PRIME);
        }
        let mut h = StateHasher::new();
        h.write_i64(0x61);
        assert_eq!(h.finish(), expected);
    }

    #[test]
    fn hash_hex_is_sixteen_lowercase_digits() {
        assert_eq!(hash_hex(0xAB), "00000000000000ab");
        assert_eq!(hash_hex(u64::MAX).len(), 16);
    }

    #[test]
    fn summary_hash_ignores_sub_quantum_noise() {
        let a = ParitySummary {
            x: 555.0,
            y: 436.0,
            grounded: true,
            jumped: 1,
            landed: 2,
            ..ParitySummary::default()
        };
        let b = ParitySummary {
            x: 555.000_2,
            ..a
        };
        let c = ParitySummary { x: 555.002, ..a };
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn summary_json_accepts_integer_and_bool_flags() {
        let from_int: ParitySummary = serde_json::from_str(
            r#"{"x":1.0,"y":2.0,"vx":0.0,"vy":0.0,"grounded":1,"jumped":1,"landed":2,"bonked":0}"#,
        )
        .unwrap();
        let from_bool: ParitySummary = serde_json::from_str(
            r#"{"x":1.0,"y":2.0,"vx":0.0,"vy":0.0,
                "grounded":true,"jumped":1,"landed":2,"bonked":0}"#,
        )
        .unwrap();
        assert_eq!(from_int, from_bool);
        assert!(from_int.grounded);

        let json = serde_json::to_string(&from_int).unwrap();
        assert!(json.contains("\"grounded\":1"));
    }

    #[test]
    fn compare_summaries_reports_every_hash_on_mismatch() {
        let a = ParitySummary::default();
        let b = ParitySummary { x: 1.0, ..a };
        assert_eq!(compare_summaries(&[("a", a), ("b", a)]), Ok(a.hash()));

        let err = compare_summaries(&[("native", a), ("wasm", b)]).unwrap_err();
        match err {
            ParityError::HashMismatch { hashes } => {
                assert!(hashes.contains(&format!("native={}", a.hash_hex())));
                assert!(hashes.contains(&format!("wasm={}", b.hash_hex())));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn compare_summaries_rejects_empty_input() {
        let empty: [(&str, ParitySummary); 0] = [];
        assert_eq!(compare_summaries(&empty), Err(ParityError::NothingToCompare));
    }

    #[test]
    fn canonical_inputs() {
        let script = canonical_script();
        assert_eq!(script.inputs.len(), CANONICAL_FRAMES);
        assert_eq!(script.inputs[0], Buttons::RIGHT.bits());
        assert_eq!(script.inputs[10], (Buttons::RIGHT | Buttons::JUMP).bits());
        assert_eq!(script.inputs[11], Buttons::RIGHT.bits());
        assert_eq!(script.inputs[119], Buttons::RIGHT.bits());
        assert_eq!(script.inputs[120], 0);
        assert_eq!(script.world, vec![CANONICAL_GROUND]);
    }

    #[test]
    fn native_simulator_runs_canonical_script() {
        let run = run_script(&mut NativeSimulator::new(), &canonical_script()).unwrap();
        assert_eq!(run.rows.len(), CANONICAL_FRAMES);
        assert_eq!(run.summary.jumped, 1);
        assert!(run.summary.landed >= 1);
        assert!(run.summary.x > 80.0);
        assert!(run.summary.grounded);
    }
}
