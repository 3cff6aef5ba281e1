//! World wrapping.
//!
//! Boundary rule shared by every target: edge wrap triggers only when the
//! body is strictly outside (`left < 0` or `right > world_w`), so a body
//! exactly flush with either edge stays put. Center wrap maps a center of
//! exactly `world_w` to 0.

use crate::params::WrapMode;
use crate::state::State;

/// Bring `state` back inside `[0, world_w]` according to `mode`.
pub fn apply_wrap(state: &mut State, mode: WrapMode, world_w: f32) {
    match mode {
        WrapMode::Off => {}
        WrapMode::Edge => {
            let w = world_w.max(1.0).round();
            let body_w = state.w.round();
            let mut left = state.x.round();
            let right = left + body_w;
            if left < 0.0 {
                left = w - body_w;
            } else if right > w {
                left = 0.0;
            }
            state.x = left;
        }
        WrapMode::Center => {
            let w = world_w.max(1.0);
            let center = state.x + 0.5 * state.w;
            let wrapped = ((center % w) + w) % w;
            state.x = (wrapped - 0.5 * state.w).round();
        }
    }
}
