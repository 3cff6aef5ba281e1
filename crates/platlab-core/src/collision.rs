//! Substepped, axis-separated collision against static platforms.
//!
//! Movement is split into equal substeps no longer than `max_step_px` so a
//! fast body cannot skip over a thin platform. Within a substep the body
//! moves along X, is pushed out of anything it overlaps, then does the same
//! along Y. Each axis delta is rounded to a whole pixel before it is applied,
//! which keeps the body on the integer grid every target agrees on.

use crate::geom::Rect;

/// Upper bound on substeps per step. Unreachable with in-schema parameters;
/// it only keeps the loop bounded for absurd velocities.
pub const MAX_SUBSTEPS: u32 = 1024;

/// Which faces were hit while resolving one substep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Contact {
    /// Moving down into a platform's top face.
    pub hit_ground: bool,
    /// Moving up into a platform's bottom face.
    pub hit_head: bool,
}

/// Result of sweeping a body through all substeps of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sweep {
    /// Resolved body rectangle.
    pub body: Rect,
    /// Number of substeps taken.
    pub substeps: u32,
    /// Any substep landed on a platform top.
    pub hit_ground_any: bool,
    /// Any substep hit a platform bottom.
    pub hit_head_any: bool,
    /// A ceiling stopped upward velocity.
    pub bonked: bool,
}

/// Number of substeps for a total displacement of `(total_dx, total_dy)`.
///
/// `ceil(max(|dx|, |dy|) / max(1, max_step_px))`, at least 1.
pub fn substep_count(total_dx: f32, total_dy: f32, max_step_px: f32) -> u32 {
    let max_step = max_step_px.max(1.0);
    let steps = (total_dx.abs().max(total_dy.abs()) / max_step).ceil().max(1.0);
    if steps >= MAX_SUBSTEPS as f32 {
        MAX_SUBSTEPS
    } else {
        steps as u32
    }
}

/// Move `body` by `(dx, dy)` one axis at a time and push it out of `world`.
///
/// X first: moving right clamps the right edge to the platform's left edge,
/// moving left clamps the left edge to the platform's right edge. Then Y:
/// moving down lands on the platform top, moving up stops under its bottom.
/// Velocity is left to the caller.
pub fn resolve_axis_separated(mut body: Rect, dx: f32, dy: f32, world: &[Rect]) -> (Rect, Contact) {
    let mut contact = Contact::default();

    body.x += dx.round();
    for p in world {
        if body.intersects(p) {
            if dx > 0.0 {
                body.x = p.x - body.w;
            } else if dx < 0.0 {
                body.x = p.x + p.w;
            }
        }
    }

    body.y += dy.round();
    for p in world {
        if body.intersects(p) {
            if dy > 0.0 {
                body.y = p.y - body.h;
                contact.hit_ground = true;
            } else if dy < 0.0 {
                body.y = p.y + p.h;
                contact.hit_head = true;
            }
        }
    }

    (body, contact)
}

/// Sweep `body` through one step's displacement, zeroing `vy` on contact.
///
/// A ceiling hit while `vy < 0` zeroes `vy` and reports `bonked`; a floor hit
/// while `vy > 0` zeroes `vy`.
pub fn sweep(
    mut body: Rect,
    vy: &mut f32,
    total_dx: f32,
    total_dy: f32,
    max_step_px: f32,
    world: &[Rect],
) -> Sweep {
    let substeps = substep_count(total_dx, total_dy, max_step_px);
    let dx = total_dx / substeps as f32;
    let dy = total_dy / substeps as f32;

    let mut hit_ground_any = false;
    let mut hit_head_any = false;
    let mut bonked = false;

    for _ in 0..substeps {
        let (next, contact) = resolve_axis_separated(body, dx, dy, world);
        body = next;

        if contact.hit_head && *vy < 0.0 {
            *vy = 0.0;
            bonked = true;
        }
        if contact.hit_ground && *vy > 0.0 {
            *vy = 0.0;
        }

        hit_ground_any |= contact.hit_ground;
        hit_head_any |= contact.hit_head;
    }

    Sweep {
        body,
        substeps,
        hit_ground_any,
        hit_head_any,
        bonked,
    }
}

/// Probe `snap` pixels below `body` for ground.
///
/// Returns the (possibly snapped) body and whether it counts as grounded. The
/// first platform in world order that the shifted probe overlaps decides: the
/// body is grounded, and if its bottom is within the snap distance of that
/// platform's top it is pulled exactly onto it.
pub fn snap_to_ground(mut body: Rect, snap: f32, world: &[Rect]) -> (Rect, bool) {
    let snap = snap.round();
    let probe = body.translated(0.0, snap);
    for p in world {
        if probe.intersects(p) {
            if body.bottom() <= p.y + snap {
                body.y = p.y - body.h;
            }
            return (body, true);
        }
    }
    (body, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Rect {
        Rect::new(0.0, 100.0, 200.0, 20.0)
    }

    #[test]
    fn substep_count_is_one_within_budget() {
        assert_eq!(substep_count(0.0, 0.0, 6.0), 1);
        assert_eq!(substep_count(6.0, -6.0, 6.0), 1);
        assert_eq!(substep_count(-5.9, 2.0, 6.0), 1);
        assert_eq!(substep_count(6.1, 0.0, 6.0), 2);
        assert_eq!(substep_count(0.0, 20.0, 6.0), 4);
    }

    #[test]
    fn substep_budget_never_below_one_pixel() {
        assert_eq!(substep_count(3.0, 0.0, 0.0), 3);
        assert_eq!(substep_count(3.0, 0.0, 0.25), 3);
    }

    #[test]
    fn substep_count_is_bounded() {
        assert_eq!(substep_count(f32::MAX, 0.0, 1.0), MAX_SUBSTEPS);
        assert_eq!(substep_count(f32::INFINITY, 0.0, 1.0), MAX_SUBSTEPS);
        assert_eq!(substep_count(f32::NAN, 0.0, 1.0), 1);
    }

    #[test]
    fn falling_body_lands_on_top_face() {
        let body = Rect::new(10.0, 80.0, 10.0, 18.0);
        let (r, c) = resolve_axis_separated(body, 0.0, 5.0, &[floor()]);
        assert_eq!(r.bottom(), 100.0);
        assert!(c.hit_ground);
        assert!(!c.hit_head);
    }

    #[test]
    fn rising_body_stops_under_ceiling() {
        let ceiling = Rect::new(0.0, 0.0, 200.0, 20.0);
        let body = Rect::new(10.0, 22.0, 10.0, 10.0);
        let (r, c) = resolve_axis_separated(body, 0.0, -5.0, &[ceiling]);
        assert_eq!(r.y, 20.0);
        assert!(c.hit_head);
    }

    #[test]
    fn horizontal_moves_clamp_against_walls() {
        let wall = Rect::new(50.0, 0.0, 10.0, 100.0);
        let body = Rect::new(38.0, 10.0, 10.0, 10.0);
        let (r, _) = resolve_axis_separated(body, 5.0, 0.0, &[wall]);
        assert_eq!(r.right(), 50.0);

        let body = Rect::new(62.0, 10.0, 10.0, 10.0);
        let (r, _) = resolve_axis_separated(body, -5.0, 0.0, &[wall]);
        assert_eq!(r.x, 60.0);
    }

    #[test]
    fn axis_deltas_are_rounded_to_pixels() {
        let body = Rect::new(0.0, 0.0, 10.0, 10.0);
        let (r, _) = resolve_axis_separated(body, 0.4, 0.6, &[]);
        assert_eq!((r.x, r.y), (0.0, 1.0));
        let (r, _) = resolve_axis_separated(body, -1.5, -2.5, &[]);
        assert_eq!((r.x, r.y), (-2.0, -3.0));
    }

    #[test]
    fn single_and_multi_substep_agree_against_one_wall() {
        let wall = Rect::new(40.0, 0.0, 4.0, 100.0);
        let body = Rect::new(20.0, 10.0, 10.0, 10.0);

        // One 12 px move penetrates the wall; with 6 px and 4 px substeps
        // only the last move does. All must end flush.
        let mut vy = 0.0;
        let single = sweep(body, &mut vy, 12.0, 0.0, 20.0, &[wall]);
        let double = sweep(body, &mut vy, 12.0, 0.0, 6.0, &[wall]);
        let triple = sweep(body, &mut vy, 12.0, 0.0, 4.0, &[wall]);
        assert_eq!(single.substeps, 1);
        assert_eq!(double.substeps, 2);
        assert_eq!(triple.substeps, 3);
        assert_eq!(single.body.right(), 40.0);
        assert_eq!(double.body, single.body);
        assert_eq!(triple.body, single.body);
    }

    #[test]
    fn substeps_prevent_tunneling_through_thin_platform() {
        let thin = Rect::new(0.0, 50.0, 100.0, 2.0);
        let body = Rect::new(10.0, 30.0, 10.0, 10.0);
        let mut vy = 1200.0;

        let sweep = sweep(body, &mut vy, 0.0, 40.0, 6.0, &[thin]);
        assert_eq!(sweep.body.bottom(), 50.0);
        assert!(sweep.hit_ground_any);
        assert_eq!(vy, 0.0);
        assert!(!sweep.bonked);
    }

    #[test]
    fn ceiling_hit_while_rising_bonks_once() {
        let ceiling = Rect::new(0.0, 0.0, 100.0, 10.0);
        let body = Rect::new(10.0, 14.0, 10.0, 10.0);
        let mut vy = -600.0;

        let sweep = sweep(body, &mut vy, 0.0, -10.0, 6.0, &[ceiling]);
        assert!(sweep.bonked);
        assert!(sweep.hit_head_any);
        assert_eq!(vy, 0.0);
        assert_eq!(sweep.body.y, 10.0);
    }

    #[test]
    fn snap_pulls_body_onto_nearby_ground() {
        let body = Rect::new(10.0, 78.0, 10.0, 18.0);
        let (r, grounded) = snap_to_ground(body, 6.0, &[floor()]);
        assert!(grounded);
        assert_eq!(r.bottom(), 100.0);
    }

    #[test]
    fn snap_probe_misses_distant_ground() {
        let body = Rect::new(10.0, 60.0, 10.0, 18.0);
        let (r, grounded) = snap_to_ground(body, 6.0, &[floor()]);
        assert!(!grounded);
        assert_eq!(r, body);
    }

    #[test]
    fn snap_uses_first_platform_in_world_order() {
        let upper = Rect::new(0.0, 98.0, 200.0, 2.0);
        let body = Rect::new(10.0, 78.0, 10.0, 18.0);
        let (r, grounded) = snap_to_ground(body, 6.0, &[upper, floor()]);
        assert!(grounded);
        assert_eq!(r.bottom(), 98.0);
    }
}
