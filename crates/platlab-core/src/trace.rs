//! Trace scripts, per-frame trace rows and row-by-row trace comparison.
//!
//! A [`TraceScript`] is the JSON scenario every implementation can replay:
//!
//! ```json
//! {
//!   "params": { "gravity_down": 2300.0 },
//!   "world": [{ "x": 0, "y": 480, "w": 960, "h": 60 }],
//!   "initial_state": { "x": 80, "y": 436, "w": 28, "h": 44 },
//!   "inputs": [2, 2, 18, 2]
//! }
//! ```
//!
//! Running it yields one [`TraceRow`] per frame. Rows render as CSV with the
//! header `frame,x,y,vx,vy,grounded`, which is also what other runtimes
//! print, so their output can be parsed back and compared here.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::geom::Rect;
use crate::params::Params;
use crate::parity::{ParitySummary, StateHasher};
use crate::state::State;
use crate::{ParityError, TraceError};

/// CSV header line for trace rows.
pub const CSV_HEADER: &str = "frame,x,y,vx,vy,grounded";

/// Default absolute tolerance for row comparison.
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// A replayable scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceScript {
    /// Tuning parameters. Missing keys take their defaults.
    #[serde(default)]
    pub params: Params,
    /// Static platforms in collision order.
    #[serde(default)]
    pub world: Vec<Rect>,
    /// Actor state before frame 0.
    pub initial_state: State,
    /// Raw input bits, one entry per frame.
    #[serde(default)]
    pub inputs: Vec<u8>,
}

impl TraceScript {
    /// Parse a script from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TraceError> {
        serde_json::from_str(text).map_err(|e| TraceError::Script(e.to_string()))
    }

    /// Pretty JSON form.
    pub fn to_json_pretty(&self) -> Result<String, TraceError> {
        serde_json::to_string_pretty(self).map_err(|e| TraceError::Script(e.to_string()))
    }
}

/// Actor state after one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Zero-based frame index.
    pub frame: usize,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Horizontal velocity.
    pub vx: f64,
    /// Vertical velocity.
    pub vy: f64,
    /// Grounded flag.
    pub grounded: bool,
}

impl TraceRow {
    /// Row for `state` after `frame`.
    pub fn from_state(frame: usize, state: &State) -> Self {
        Self {
            frame,
            x: f64::from(state.x),
            y: f64::from(state.y),
            vx: f64::from(state.vx),
            vy: f64::from(state.vy),
            grounded: state.grounded,
        }
    }

    /// The compared numeric fields, by name, in comparison order.
    pub fn fields(&self) -> [(&'static str, f64); 4] {
        [("x", self.x), ("y", self.y), ("vx", self.vx), ("vy", self.vy)]
    }
}

/// Rows plus the final summary of one scripted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRun {
    /// One row per input frame.
    pub rows: Vec<TraceRow>,
    /// Final state and event totals.
    pub summary: ParitySummary,
}

impl TraceRun {
    /// Render rows as CSV, header first.
    pub fn to_csv(&self) -> String {
        render_csv(&self.rows)
    }

    /// Rolling FNV-1a hash over every row's whole-pixel position, velocity
    /// and grounded flag. Catches divergences that cancel out by the end.
    pub fn trace_hash(&self) -> u64 {
        let mut h = StateHasher::new();
        for row in &self.rows {
            h.write_i64(row.x.round() as i64);
            h.write_i64(row.y.round() as i64);
            h.write_i64(row.vx.round() as i64);
            h.write_i64(row.vy.round() as i64);
            h.write_flag(row.grounded);
        }
        h.finish()
    }
}

/// Render rows as CSV with [`CSV_HEADER`].
///
/// Values are printed from their f32 origin so the text matches what the
/// engine computed rather than its widened f64 form.
pub fn render_csv(rows: &[TraceRow]) -> String {
    let mut out = String::with_capacity(32 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in rows {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            r.frame,
            r.x as f32,
            r.y as f32,
            r.vx as f32,
            r.vy as f32,
            u8::from(r.grounded)
        );
    }
    out
}

fn parse_flag(text: &str) -> Option<bool> {
    match text {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parse CSV produced by [`render_csv`] or by another runtime.
///
/// A leading header line is skipped; blank lines are ignored.
pub fn parse_csv(text: &str) -> Result<Vec<TraceRow>, TraceError> {
    let mut rows = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || (idx == 0 && line.starts_with("frame")) {
            continue;
        }

        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != 6 {
            return Err(TraceError::Csv {
                line: line_no,
                details: format!("expected 6 columns, found {}", cols.len()),
            });
        }

        let csv_err = |what: &str, value: &str| TraceError::Csv {
            line: line_no,
            details: format!("bad {what} '{value}'"),
        };
        let num = |i: usize, what: &str| -> Result<f64, TraceError> {
            cols[i].parse::<f64>().map_err(|_| csv_err(what, cols[i]))
        };

        rows.push(TraceRow {
            frame: cols[0].parse().map_err(|_| csv_err("frame", cols[0]))?,
            x: num(1, "x")?,
            y: num(2, "y")?,
            vx: num(3, "vx")?,
            vy: num(4, "vy")?,
            grounded: parse_flag(cols[5]).ok_or_else(|| csv_err("grounded", cols[5]))?,
        });
    }
    Ok(rows)
}

/// Largest per-field difference seen in a successful comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TraceReport {
    /// Rows compared.
    pub rows: usize,
    /// Largest `|x_a - x_b|`.
    pub max_dx: f64,
    /// Largest `|y_a - y_b|`.
    pub max_dy: f64,
    /// Largest `|vx_a - vx_b|`.
    pub max_dvx: f64,
    /// Largest `|vy_a - vy_b|`.
    pub max_dvy: f64,
}

/// Compare two traces row by row.
///
/// Fails on the first of: differing row counts, a grounded mismatch, or any
/// of `x, y, vx, vy` differing by more than `tolerance`. Frames are matched
/// by position, not by the `frame` column.
pub fn compare_traces(
    left_name: &str,
    left: &[TraceRow],
    right_name: &str,
    right: &[TraceRow],
    tolerance: f64,
) -> Result<TraceReport, ParityError> {
    if left.len() != right.len() {
        return Err(ParityError::RowCountMismatch {
            left_name: left_name.to_owned(),
            left: left.len(),
            right_name: right_name.to_owned(),
            right: right.len(),
        });
    }

    let mut report = TraceReport {
        rows: left.len(),
        ..TraceReport::default()
    };
    for (frame, (a, b)) in left.iter().zip(right).enumerate() {
        if a.grounded != b.grounded {
            return Err(ParityError::GroundedMismatch {
                frame,
                left: a.grounded,
                right: b.grounded,
            });
        }
        let maxima = [
            &mut report.max_dx,
            &mut report.max_dy,
            &mut report.max_dvx,
            &mut report.max_dvy,
        ];
        let pairs = a.fields().into_iter().zip(b.fields());
        for (((field, va), (_, vb)), max) in pairs.zip(maxima) {
            let diff = (va - vb).abs();
            // NaN never compares within tolerance.
            if !(diff <= tolerance) {
                return Err(ParityError::FieldDivergence {
                    frame,
                    field,
                    left: va,
                    right: vb,
                    diff,
                    tolerance,
                });
            }
            *max = max.max(diff);
        }
    }
    Ok(report)
}
