//! The canonical tuning-parameter schema.
//!
//! Every consumer of motion parameters reads this module: engine defaults,
//! the flat JSON persistence document, the WASM parameter ABI (which sets
//! parameters by schema index) and the Python binding (which sets them by
//! name). Nothing else defines a parameter name, bound or default.
//!
//! [`Params`] is `#[repr(C)]` because the C ABI hands it across the boundary
//! by pointer. Field order equals [`PARAM_SPECS`] order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ParamsError;

/// Schema entry for one tuning parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Field and document key name.
    pub name: &'static str,
    /// Default value.
    pub default: f64,
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Slider increment for tuning front-ends.
    pub step: f64,
    /// Decimal places shown by tuning front-ends.
    pub precision: usize,
}

impl ParamSpec {
    /// Format `value` with this parameter's display precision.
    pub fn format(&self, value: f64) -> String {
        format!("{value:.prec$}", prec = self.precision)
    }

    /// Snap `value` to the slider grid and clamp it into bounds.
    pub fn quantize(&self, value: f64) -> f64 {
        if self.step <= 0.0 {
            return value.clamp(self.min, self.max);
        }
        let q = ((value - self.min) / self.step).round() * self.step + self.min;
        q.clamp(self.min, self.max)
    }

    /// Whether `value` lies inside the schema bounds.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

macro_rules! param_schema {
    (
        $(
            $(#[$doc:meta])*
            $field:ident = $default:literal, [$min:literal, $max:literal],
                step $step:literal, prec $prec:literal;
        )*
    ) => {
        /// Tunable motion constants. Read-only during a step.
        ///
        /// All speeds are pixels per second, accelerations pixels per second
        /// squared, durations seconds, distances pixels.
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct Params {
            $(
                $(#[$doc])*
                pub $field: f32,
            )*
        }

        impl Default for Params {
            fn default() -> Self {
                Self {
                    $( $field: $default, )*
                }
            }
        }

        /// Every tuning parameter, in [`Params`] field order.
        pub const PARAM_SPECS: &[ParamSpec] = &[
            $(
                ParamSpec {
                    name: stringify!($field),
                    default: $default,
                    min: $min,
                    max: $max,
                    step: $step,
                    precision: $prec,
                },
            )*
        ];

        impl Params {
            /// All values in schema order.
            pub fn values(&self) -> [f32; PARAM_COUNT] {
                [ $( self.$field, )* ]
            }

            fn slots_mut(&mut self) -> [&mut f32; PARAM_COUNT] {
                [ $( &mut self.$field, )* ]
            }
        }
    };
}

param_schema! {
    /// Top horizontal speed on the ground.
    ground_max_speed = 260.0, [50.0, 600.0], step 5.0, prec 0;
    /// Ground acceleration toward the held direction.
    ground_accel = 1800.0, [0.0, 8000.0], step 50.0, prec 0;
    /// Ground braking when input opposes the current velocity.
    ground_decel = 2200.0, [0.0, 8000.0], step 50.0, prec 0;
    /// Ground deceleration with no horizontal input.
    ground_friction = 2600.0, [0.0, 12000.0], step 50.0, prec 0;
    /// Max-speed multiplier while run is held.
    run_multiplier = 1.35, [1.0, 2.5], step 0.01, prec 2;
    /// Top horizontal speed while airborne.
    air_max_speed = 220.0, [0.0, 600.0], step 5.0, prec 0;
    /// Air acceleration toward the held direction.
    air_accel = 1200.0, [0.0, 8000.0], step 50.0, prec 0;
    /// Air braking when input opposes the current velocity.
    air_decel = 900.0, [0.0, 8000.0], step 50.0, prec 0;
    /// Linear horizontal damping while airborne (0 = off).
    air_drag = 0.0, [0.0, 4000.0], step 25.0, prec 0;
    /// Gravity while rising.
    gravity_up = 1500.0, [0.0, 6000.0], step 50.0, prec 0;
    /// Gravity while falling.
    gravity_down = 2300.0, [0.0, 9000.0], step 50.0, prec 0;
    /// Downward speed cap.
    terminal_velocity = 1200.0, [0.0, 5000.0], step 25.0, prec 0;
    /// Gravity multiplier while down is held and already falling.
    fast_fall_multiplier = 1.35, [1.0, 3.0], step 0.01, prec 2;
    /// Upward speed applied by a jump.
    jump_velocity = 520.0, [0.0, 1400.0], step 10.0, prec 0;
    /// Fraction of the jump speed kept when jump is released early.
    jump_cut_multiplier = 0.45, [0.05, 1.0], step 0.01, prec 2;
    /// Grace period after leaving the ground during which a jump still works.
    coyote_time = 0.085, [0.0, 0.25], step 0.005, prec 3;
    /// How long an early jump press is remembered.
    jump_buffer = 0.1, [0.0, 0.25], step 0.005, prec 3;
    /// Downward probe distance for ground snapping (0 = off).
    snap_to_ground = 6.0, [0.0, 20.0], step 0.5, prec 1;
    /// Largest per-substep displacement.
    max_step_px = 6.0, [1.0, 20.0], step 0.5, prec 1;
    /// World width used by wrapping.
    world_w = 960.0, [64.0, 4096.0], step 1.0, prec 0;
    /// Wrap mode selector, see [`WrapMode`].
    world_wrap_mode = 1.0, [0.0, 2.0], step 1.0, prec 0;
}

/// Number of tuning parameters.
pub const PARAM_COUNT: usize = PARAM_SPECS.len();

/// How the actor is brought back when it leaves `[0, world_w]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    /// No wrapping; the body may hang outside the world.
    Off,
    /// Leaving one edge places the body flush against the opposite edge.
    Edge,
    /// Torus wrap of the body's center coordinate.
    Center,
}

impl WrapMode {
    /// Decode the numeric selector stored in [`Params::world_wrap_mode`].
    ///
    /// The value is rounded first; anything other than 1 or 2 (including NaN)
    /// is [`WrapMode::Off`].
    pub fn from_raw(raw: f32) -> Self {
        match raw.round() as i32 {
            1 => WrapMode::Edge,
            2 => WrapMode::Center,
            _ => WrapMode::Off,
        }
    }

    /// Numeric selector for this mode.
    pub fn as_raw(self) -> f32 {
        match self {
            WrapMode::Off => 0.0,
            WrapMode::Edge => 1.0,
            WrapMode::Center => 2.0,
        }
    }
}

impl Params {
    /// Decoded wrap mode.
    pub fn wrap_mode(&self) -> WrapMode {
        WrapMode::from_raw(self.world_wrap_mode)
    }

    /// Schema entry for `name`.
    pub fn spec(name: &str) -> Option<&'static ParamSpec> {
        PARAM_SPECS.iter().find(|s| s.name == name)
    }

    /// Schema index for `name`.
    pub fn index_of(name: &str) -> Option<usize> {
        PARAM_SPECS.iter().position(|s| s.name == name)
    }

    /// Value of the parameter called `name`.
    pub fn get(&self, name: &str) -> Option<f32> {
        Self::index_of(name).map(|i| self.values()[i])
    }

    /// Value at schema index `index`.
    pub fn get_index(&self, index: usize) -> Option<f32> {
        self.values().get(index).copied()
    }

    /// Set the parameter at schema index `index` without bounds checks.
    ///
    /// Returns false when the index is outside the schema. Used by narrow
    /// ABIs that forward whatever the host already validated.
    pub fn set_index(&mut self, index: usize, value: f32) -> bool {
        match self.slots_mut().into_iter().nth(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Set the parameter called `name`, validating it against the schema.
    ///
    /// # Errors
    ///
    /// - [`ParamsError::UnknownKey`] if `name` is not in the schema.
    /// - [`ParamsError::NonFinite`] if `value` is NaN or infinite.
    /// - [`ParamsError::OutOfRange`] if `value` is outside the schema bounds.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), ParamsError> {
        let index = Self::index_of(name).ok_or_else(|| unknown_key(name))?;
        let spec = &PARAM_SPECS[index];
        if !value.is_finite() {
            return Err(ParamsError::NonFinite {
                key: name.to_owned(),
                value,
            });
        }
        if !spec.contains(value) {
            return Err(ParamsError::OutOfRange {
                key: name.to_owned(),
                value,
                min: spec.min,
                max: spec.max,
            });
        }
        self.set_index(index, value as f32);
        Ok(())
    }

    /// Iterate `(spec, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static ParamSpec, f32)> {
        PARAM_SPECS.iter().zip(self.values())
    }

    /// Flat key/value document holding every parameter.
    pub fn to_document(&self) -> ParamsDocument {
        ParamsDocument(
            self.iter()
                .map(|(spec, v)| (spec.name.to_owned(), f64::from(v)))
                .collect(),
        )
    }

    /// Build parameters from a document, starting from defaults.
    ///
    /// In [`LoadMode::Lenient`] unknown keys are skipped and out-of-range
    /// values clamped, each with a warning. [`LoadMode::Strict`] rejects both.
    ///
    /// # Errors
    ///
    /// Non-finite values are always rejected; strict mode also returns
    /// [`ParamsError::UnknownKey`] and [`ParamsError::OutOfRange`].
    pub fn from_document(doc: &ParamsDocument, mode: LoadMode) -> Result<Self, ParamsError> {
        let mut params = Params::default();
        for (key, &value) in &doc.0 {
            let Some(index) = Self::index_of(key) else {
                if mode == LoadMode::Strict {
                    return Err(unknown_key(key));
                }
                tracing::warn!(key = %key, "ignoring unknown parameter");
                continue;
            };
            let spec = &PARAM_SPECS[index];
            if !value.is_finite() {
                return Err(ParamsError::NonFinite {
                    key: key.clone(),
                    value,
                });
            }
            let value = if spec.contains(value) {
                value
            } else if mode == LoadMode::Strict {
                return Err(ParamsError::OutOfRange {
                    key: key.clone(),
                    value,
                    min: spec.min,
                    max: spec.max,
                });
            } else {
                let clamped = value.clamp(spec.min, spec.max);
                tracing::warn!(key = %key, value, clamped, "clamping out-of-range parameter");
                clamped
            };
            params.set_index(index, value as f32);
        }
        Ok(params)
    }
}

fn unknown_key(key: &str) -> ParamsError {
    let known: Vec<&str> = PARAM_SPECS.iter().map(|s| s.name).collect();
    ParamsError::UnknownKey {
        key: key.to_owned(),
        known: known.join(", "),
    }
}

/// How strictly [`Params::from_document`] treats unexpected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Skip unknown keys and clamp out-of-range values.
    #[default]
    Lenient,
    /// Reject unknown keys and out-of-range values.
    Strict,
}

// ---------------------------------------------------------------------------
// ParamsDocument
// ---------------------------------------------------------------------------

/// A flat `name -> number` document, the persisted form of [`Params`].
///
/// Keys are kept sorted so saved files diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamsDocument(pub BTreeMap<String, f64>);

impl ParamsDocument {
    /// Parse a JSON object. Non-numeric values are skipped with a warning;
    /// documents written by tuning front-ends carry extra UI keys.
    ///
    /// # Errors
    ///
    /// [`ParamsError::Malformed`] if the text is not a JSON object.
    pub fn from_json(text: &str) -> Result<Self, ParamsError> {
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| ParamsError::Malformed(e.to_string()))?;
        let mut out = BTreeMap::new();
        for (key, value) in raw {
            match value.as_f64() {
                Some(v) => {
                    out.insert(key, v);
                }
                None => tracing::warn!(key = %key, "skipping non-numeric parameter value"),
            }
        }
        Ok(Self(out))
    }

    /// Pretty-printed JSON with sorted keys.
    ///
    /// # Errors
    ///
    /// [`ParamsError::Malformed`] if a value cannot be represented in JSON.
    pub fn to_json_pretty(&self) -> Result<String, ParamsError> {
        serde_json::to_string_pretty(self).map_err(|e| ParamsError::Malformed(e.to_string()))
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_matches_struct_defaults() {
        let params = Params::default();
        assert_eq!(PARAM_COUNT, 21);
        for (spec, value) in params.iter() {
            assert_eq!(value, spec.default as f32, "default for {}", spec.name);
            assert!(spec.contains(spec.default), "default out of bounds: {}", spec.name);
        }
    }

    #[test]
    fn default_values_match_reference_tuning() {
        let p = Params::default();
        assert_eq!(p.ground_max_speed, 260.0);
        assert_eq!(p.jump_velocity, 520.0);
        assert_eq!(p.coyote_time, 0.085);
        assert_eq!(p.jump_buffer, 0.1);
        assert_eq!(p.world_w, 960.0);
        assert_eq!(p.wrap_mode(), WrapMode::Edge);
    }

    #[test]
    fn wrap_mode_decodes_closed_set() {
        assert_eq!(WrapMode::from_raw(0.0), WrapMode::Off);
        assert_eq!(WrapMode::from_raw(1.0), WrapMode::Edge);
        assert_eq!(WrapMode::from_raw(1.4), WrapMode::Edge);
        assert_eq!(WrapMode::from_raw(2.0), WrapMode::Center);
        assert_eq!(WrapMode::from_raw(3.0), WrapMode::Off);
        assert_eq!(WrapMode::from_raw(-1.0), WrapMode::Off);
        assert_eq!(WrapMode::from_raw(f32::NAN), WrapMode::Off);
        for mode in [WrapMode::Off, WrapMode::Edge, WrapMode::Center] {
            assert_eq!(WrapMode::from_raw(mode.as_raw()), mode);
        }
    }

    #[test]
    fn set_by_name_validates() {
        let mut p = Params::default();
        p.set("gravity_up", 1000.0).unwrap();
        assert_eq!(p.gravity_up, 1000.0);

        assert!(matches!(
            p.set("gravity_sideways", 1.0),
            Err(ParamsError::UnknownKey { .. })
        ));
        assert!(matches!(
            p.set("gravity_up", f64::NAN),
            Err(ParamsError::NonFinite { .. })
        ));
        assert!(matches!(
            p.set("run_multiplier", 9.0),
            Err(ParamsError::OutOfRange { .. })
        ));
        assert_eq!(p.run_multiplier, 1.35, "failed set must not write");
    }

    #[test]
    fn index_access_follows_schema_order() {
        let mut p = Params::default();
        let idx = Params::index_of("air_drag").unwrap();
        assert!(p.set_index(idx, 50.0));
        assert_eq!(p.air_drag, 50.0);
        assert_eq!(p.get_index(idx), Some(50.0));
        assert!(!p.set_index(PARAM_COUNT, 1.0));
        assert_eq!(p.get_index(PARAM_COUNT), None);
    }

    #[test]
    fn lenient_load_skips_ui_keys_and_clamps() {
        let doc = ParamsDocument::from_json(
            r#"{"sim_hz": 60, "show_debug": 1, "gravity_down": 99999,
                "jump_velocity": 600, "label": "x"}"#,
        )
        .unwrap();
        assert_eq!(doc.get("label"), None);

        let p = Params::from_document(&doc, LoadMode::Lenient).unwrap();
        assert_eq!(p.jump_velocity, 600.0);
        assert_eq!(p.gravity_down, 9000.0);
        assert_eq!(p.ground_accel, 1800.0, "absent keys keep defaults");
    }

    #[test]
    fn strict_load_rejects_unknown_and_out_of_range() {
        let doc = ParamsDocument::from_json(r#"{"sim_hz": 60}"#).unwrap();
        assert!(matches!(
            Params::from_document(&doc, LoadMode::Strict),
            Err(ParamsError::UnknownKey { .. })
        ));

        let doc = ParamsDocument::from_json(r#"{"coyote_time": 1.0}"#).unwrap();
        assert!(matches!(
            Params::from_document(&doc, LoadMode::Strict),
            Err(ParamsError::OutOfRange { .. })
        ));
    }

    #[test]
    fn document_round_trip_keeps_values() {
        let mut p = Params::default();
        p.set("air_drag", 125.0).unwrap();
        let text = p.to_document().to_json_pretty().unwrap();
        let back = Params::from_document(
            &ParamsDocument::from_json(&text).unwrap(),
            LoadMode::Strict,
        )
        .unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            ParamsDocument::from_json("[1, 2, 3]"),
            Err(ParamsError::Malformed(_))
        ));
    }

    #[test]
    fn spec_quantize_and_format() {
        let spec = Params::spec("coyote_time").unwrap();
        assert_eq!(spec.format(0.085), "0.085");
        assert!((spec.quantize(0.0871) - 0.085).abs() < 1e-9);
        assert_eq!(spec.quantize(5.0), 0.25);
        let spec = Params::spec("ground_accel").unwrap();
        assert_eq!(spec.format(1799.6), "1800");
    }
}
