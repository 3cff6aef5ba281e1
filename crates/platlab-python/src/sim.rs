//! Python-facing simulator wrapper.
//!
//! [`PyCore`] owns params, world and one actor state and steps them with the
//! shared engine. Dicts cross the boundary via a JSON round-trip:
//! Rust value -> `serde_json::to_string` -> Python `json.loads` -> `dict`,
//! and back through `json.dumps` for dicts coming in.

use platlab_core::geom::Rect;
use platlab_core::params::{LoadMode, Params, ParamsDocument};
use platlab_core::parity::{canonical_script, run_script, NativeSimulator, ParitySummary};
use platlab_core::state::{EventCounts, Events, State};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Converts any serializable value to a Python object via JSON round-trip.
fn to_pyobject<T: serde::Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json_str = serde_json::to_string(value)
        .map_err(|e| PyRuntimeError::new_err(format!("failed to serialize to JSON: {e}")))?;
    let json_mod = py.import("json")?;
    let obj = json_mod.call_method1("loads", (json_str,))?;
    Ok(obj.unbind())
}

/// Converts a Python dict to JSON text via `json.dumps`.
fn dict_to_json(py: Python<'_>, dict: &Bound<'_, PyDict>) -> PyResult<String> {
    let json_mod = py.import("json")?;
    json_mod.call_method1("dumps", (dict,))?.extract()
}

/// Parse a `{name: number}` dict into params, rejecting unknown or
/// out-of-range entries.
fn params_from_dict(py: Python<'_>, dict: &Bound<'_, PyDict>) -> PyResult<Params> {
    let doc = ParamsDocument::from_json(&dict_to_json(py, dict)?)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Params::from_document(&doc, LoadMode::Strict).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn world_from_tuples(rects: Vec<(f32, f32, f32, f32)>) -> Vec<Rect> {
    rects
        .into_iter()
        .map(|(x, y, w, h)| Rect::new(x, y, w, h))
        .collect()
}

/// One actor stepped by the shared engine.
///
/// Usage from Python:
/// ```python
/// from platlab._platlab import Core, RIGHT, JUMP
/// core = Core(80, 436, 28, 44, world=[(0, 480, 960, 60)])
/// events = core.step(RIGHT | JUMP)
/// print(core.state()["x"], events["landed"])
/// ```
#[pyclass(name = "Core", unsendable)]
pub struct PyCore {
    params: Params,
    world: Vec<Rect>,
    state: State,
    last_events: Events,
    counts: EventCounts,
}

#[pymethods]
impl PyCore {
    /// Create a simulator with an actor spawned at `(x, y)`.
    ///
    /// Args:
    ///     x, y, w, h: Spawn rectangle.
    ///     params: Optional dict of parameter overrides.
    ///     world: Optional list of `(x, y, w, h)` platforms.
    #[new]
    #[pyo3(signature = (x=80.0, y=436.0, w=28.0, h=44.0, params=None, world=None))]
    fn new(
        py: Python<'_>,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        params: Option<&Bound<'_, PyDict>>,
        world: Option<Vec<(f32, f32, f32, f32)>>,
    ) -> PyResult<Self> {
        let params = match params {
            Some(dict) => params_from_dict(py, dict)?,
            None => Params::default(),
        };
        Ok(Self {
            params,
            world: world_from_tuples(world.unwrap_or_default()),
            state: State::spawn(x, y, w, h),
            last_events: Events::default(),
            counts: EventCounts::default(),
        })
    }

    /// Respawn the actor. Params and world are kept; event totals reset.
    fn reset(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.state = State::spawn(x, y, w, h);
        self.last_events = Events::default();
        self.counts = EventCounts::default();
    }

    /// Replace the world with a list of `(x, y, w, h)` platforms.
    fn set_world(&mut self, rects: Vec<(f32, f32, f32, f32)>) {
        self.world = world_from_tuples(rects);
        tracing::debug!(rects = self.world.len(), "python core world replaced");
    }

    /// Set one parameter by name.
    ///
    /// Raises ValueError for unknown names, non-finite or out-of-range values.
    fn set_param(&mut self, name: &str, value: f64) -> PyResult<()> {
        self.params
            .set(name, value)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Read one parameter by name.
    fn get_param(&self, name: &str) -> PyResult<f32> {
        self.params
            .get(name)
            .ok_or_else(|| PyValueError::new_err(format!("unknown parameter '{name}'")))
    }

    /// All parameters as a `{name: value}` dict.
    fn params(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_pyobject(py, &self.params.to_document())
    }

    /// Advance one fixed step with raw button bits; returns the events dict.
    fn step(&mut self, py: Python<'_>, buttons: u8) -> PyResult<PyObject> {
        let events = platlab_core::core_step(&self.params, &self.world, &mut self.state, buttons);
        self.last_events = events;
        self.counts.record(events);
        to_pyobject(py, &events)
    }

    /// Current actor state as a dict.
    fn state(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_pyobject(py, &self.state)
    }

    /// Events from the most recent step.
    fn events(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_pyobject(py, &self.last_events)
    }

    /// Cumulative event counts since construction or the last reset.
    fn event_counts(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_pyobject(py, &self.counts)
    }

    /// Final-state summary (state plus event totals) and its parity hash.
    fn summary(&self, py: Python<'_>) -> PyResult<PyObject> {
        summary_with_hash(py, ParitySummary::from_state(&self.state, self.counts))
    }
}

fn summary_with_hash(py: Python<'_>, summary: ParitySummary) -> PyResult<PyObject> {
    let obj = to_pyobject(py, &summary)?;
    let dict = obj.bind(py).downcast::<PyDict>()?;
    dict.set_item("hash", summary.hash_hex())?;
    Ok(obj)
}

/// Default parameters as a dict.
#[pyfunction]
pub fn default_params(py: Python<'_>) -> PyResult<PyObject> {
    to_pyobject(py, &Params::default().to_document())
}

/// A freshly spawned actor state as a dict.
#[pyfunction]
pub fn init_state(py: Python<'_>, x: f32, y: f32, w: f32, h: f32) -> PyResult<PyObject> {
    to_pyobject(py, &State::spawn(x, y, w, h))
}

/// Run the canonical 180-frame parity trace and return the final summary
/// with its `hash`.
#[pyfunction]
pub fn run_parity_trace(py: Python<'_>) -> PyResult<PyObject> {
    let run = match run_script(&mut NativeSimulator::new(), &canonical_script()) {
        Ok(run) => run,
        Err(never) => match never {},
    };
    summary_with_hash(py, run.summary)
}

/// Parity hash (16 hex digits) of a summary dict with keys
/// `x y vx vy grounded jumped landed bonked`.
#[pyfunction]
pub fn parity_hash(py: Python<'_>, summary: &Bound<'_, PyDict>) -> PyResult<String> {
    let summary: ParitySummary = serde_json::from_str(&dict_to_json(py, summary)?)
        .map_err(|e| PyValueError::new_err(format!("invalid summary: {e}")))?;
    Ok(summary.hash_hex())
}
