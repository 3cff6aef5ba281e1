//! Sandbox call overhead.
//!
//! Compares one native step with one step through the guest ABI (the stub
//! core fixture, so only the boundary is measured) and with a full state
//! read-back, which the parity harness does after every frame.
//!
//! Run with: `cargo bench --bench wasm_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use platlab_core::prelude::*;
use platlab_wasm_host::{CoreModule, WasmConfig};

/// Load a WAT/WASM fixture from the tests/fixtures directory.
fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {}", path.display(), e))
}

fn bench_native_step(c: &mut Criterion) {
    let params = Params::default();
    let world = [Rect::new(0.0, 480.0, 960.0, 60.0)];
    let mut state = State::spawn(80.0, 436.0, 28.0, 44.0);
    c.bench_function("native_step", |b| {
        b.iter(|| black_box(step(&params, &world, &mut state, Buttons::RIGHT)));
    });
}

fn bench_guest_step(c: &mut Criterion) {
    let mut module = CoreModule::from_bytes(&WasmConfig::default(), &fixture_bytes("stub_core.wat"))
        .expect("stub_core.wat should compile and instantiate");
    c.bench_function("wasm_step_call", |b| {
        b.iter(|| {
            black_box(
                module
                    .step_bits(Buttons::RIGHT.bits())
                    .expect("step should not trap"),
            )
        });
    });
}

fn bench_guest_state_readback(c: &mut Criterion) {
    let mut module = CoreModule::from_bytes(&WasmConfig::default(), &fixture_bytes("stub_core.wat"))
        .expect("stub_core.wat should compile and instantiate");
    c.bench_function("wasm_state_readback", |b| {
        b.iter(|| black_box(module.read_state().expect("read should not trap")));
    });
}

criterion_group!(benches, bench_native_step, bench_guest_step, bench_guest_state_readback);
criterion_main!(benches);
