//! Axis-aligned rectangles for platforms and the actor's body.
//!
//! Screen coordinates: `x` grows right, `y` grows down, so a rectangle's
//! "top" is its smallest `y`.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle with its origin at the top-left corner.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl Rect {
    /// Create a rectangle from its top-left corner and size.
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Right edge (`x + w`).
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge (`y + h`).
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Strict overlap test. Rectangles that only share an edge do not
    /// intersect, which is what lets a body rest flush on a platform.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }

    /// Copy of this rectangle with every component rounded to a whole pixel.
    #[inline]
    pub fn rounded(&self) -> Self {
        Self::new(self.x.round(), self.y.round(), self.w.round(), self.h.round())
    }

    /// Copy of this rectangle moved by `(dx, dy)`.
    #[inline]
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn edge_contact_is_not_intersection() {
        let body = Rect::new(0.0, 0.0, 10.0, 10.0);
        let floor = Rect::new(0.0, 10.0, 100.0, 5.0);
        let wall = Rect::new(10.0, 0.0, 5.0, 100.0);
        assert!(!body.intersects(&floor));
        assert!(!body.intersects(&wall));
    }

    #[test]
    fn rounded_snaps_every_component() {
        let r = Rect::new(1.4, 2.6, 27.5, 43.49).rounded();
        assert_eq!(r, Rect::new(1.0, 3.0, 28.0, 43.0));
    }

    #[test]
    fn edges_and_translation() {
        let r = Rect::new(2.0, 3.0, 4.0, 5.0).translated(1.0, -1.0);
        assert_eq!(r.x, 3.0);
        assert_eq!(r.y, 2.0);
        assert_eq!(r.right(), 7.0);
        assert_eq!(r.bottom(), 7.0);
    }
}
