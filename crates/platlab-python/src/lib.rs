//! PyO3 Python bindings for the platlab step engine.
//!
//! Exposes the same step every other target runs, plus the canonical parity
//! trace and its hash, so Python tooling can take part in parity checks.
//! Structured data (params, state, events, summaries) crosses the boundary
//! as Python dicts via a JSON round-trip.

#![deny(unsafe_code)]

use platlab_core::input::Buttons;
use pyo3::prelude::*;

mod sim;

/// The `platlab._platlab` native module.
#[pymodule]
fn _platlab(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<sim::PyCore>()?;
    m.add_function(wrap_pyfunction!(sim::default_params, m)?)?;
    m.add_function(wrap_pyfunction!(sim::init_state, m)?)?;
    m.add_function(wrap_pyfunction!(sim::run_parity_trace, m)?)?;
    m.add_function(wrap_pyfunction!(sim::parity_hash, m)?)?;
    m.add("LEFT", Buttons::LEFT.bits())?;
    m.add("RIGHT", Buttons::RIGHT.bits())?;
    m.add("DOWN", Buttons::DOWN.bits())?;
    m.add("RUN", Buttons::RUN.bits())?;
    m.add("JUMP", Buttons::JUMP.bits())?;
    m.add("DT", platlab_core::step::DT)?;
    Ok(())
}
