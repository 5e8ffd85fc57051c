//! Axis-aligned rectangles and the position component.

use serde::{Deserialize, Serialize};

use crate::component::Component;

/// World-space position consulted by the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    /// Position at `(x, y)`.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `(x, y)`.
    #[inline]
    pub fn distance_sq(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

impl Component for Position {
    const NAME: &'static str = "position";
}

/// Axis-aligned rectangle, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    /// Rectangle from its two corners. Not validated; see [`is_valid`](Self::is_valid).
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Square of half-extent `r` centred on `(x, y)`: the bounding box of a
    /// circle.
    pub fn around(x: f32, y: f32, r: f32) -> Self {
        Self::new(x - r, y - r, x + r, y + r)
    }

    /// Extent along `x`.
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Extent along `y`.
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Finite, with `min <= max` on both axes.
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Whether `p` lies inside or on an edge.
    #[inline]
    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Whether the two rectangles overlap. Touching edges count.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Midpoint as `(x, y)`.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Split into `[nw, ne, sw, se]` quadrants sharing the centre lines.
    ///
    /// "North" is the low-`y` half.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let (cx, cy) = self.center();
        [
            Bounds::new(self.min_x, self.min_y, cx, cy),
            Bounds::new(cx, self.min_y, self.max_x, cy),
            Bounds::new(self.min_x, cy, cx, self.max_y),
            Bounds::new(cx, cy, self.max_x, self.max_y),
        ]
    }

    /// Index into [`quadrants`](Self::quadrants) that owns `p`. Points on a
    /// centre line go to the east/south side so that every point has exactly
    /// one owner.
    #[inline]
    pub fn quadrant_of(&self, p: Position) -> usize {
        let (cx, cy) = self.center();
        let east = (p.x >= cx) as usize;
        let south = (p.y >= cy) as usize;
        south * 2 + east
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let b = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(Position::new(0.0, 0.0)));
        assert!(b.contains(Position::new(10.0, 10.0)));
        assert!(!b.contains(Position::new(10.01, 5.0)));
        assert!(!b.contains(Position::new(5.0, -0.01)));
    }

    #[test]
    fn intersects_touching_edges() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Bounds::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!a.intersects(&Bounds::new(10.5, 0.0, 20.0, 20.0)));
    }

    #[test]
    fn quadrant_of_matches_quadrants() {
        let b = Bounds::new(0.0, 0.0, 100.0, 100.0);
        let quads = b.quadrants();
        for p in [
            Position::new(10.0, 10.0),
            Position::new(90.0, 10.0),
            Position::new(10.0, 90.0),
            Position::new(90.0, 90.0),
            Position::new(50.0, 50.0),
        ] {
            assert!(quads[b.quadrant_of(p)].contains(p));
        }
        assert_eq!(b.quadrant_of(Position::new(50.0, 50.0)), 3);
    }

    #[test]
    fn validity() {
        assert!(Bounds::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Bounds::new(1.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Bounds::new(0.0, 0.0, f32::NAN, 1.0).is_valid());
    }

    #[test]
    fn around_and_distance() {
        let b = Bounds::around(12.0, 12.0, 10.0);
        assert_eq!(b, Bounds::new(2.0, 2.0, 22.0, 22.0));
        assert_eq!(Position::new(3.0, 4.0).distance_sq(0.0, 0.0), 25.0);
    }
}
