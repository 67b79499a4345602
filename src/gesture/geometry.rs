use serde::{Deserialize, Serialize};

/// A pointer or touch contact in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `distance` from `self` in direction `angle_deg`.
    pub fn offset_polar(self, distance: f64, angle_deg: f64) -> Self {
        let radians = angle_deg.to_radians();
        Self {
            x: self.x + distance * radians.cos(),
            y: self.y + distance * radians.sin(),
        }
    }
}

/// Euclidean distance between two contacts.
pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Angle of the segment from `a` to `b`, in degrees within (-180, 180].
pub fn angle_deg(a: Point, b: Point) -> f64 {
    (b.y - a.y).atan2(b.x - a.x).to_degrees()
}

/// Signed angular change from `anchor` to `current`.
///
/// Not wrapped at ±180°: a two-finger rotation that crosses the boundary
/// jumps by 360°.
pub fn angular_change(anchor_deg: f64, current_deg: f64) -> f64 {
    current_deg - anchor_deg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_distance() {
        assert!(approx(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0));
        assert!(approx(distance(Point::new(2.0, 2.0), Point::new(2.0, 2.0)), 0.0));
    }

    #[test]
    fn test_angle() {
        let origin = Point::new(0.0, 0.0);
        assert!(approx(angle_deg(origin, Point::new(1.0, 0.0)), 0.0));
        assert!(approx(angle_deg(origin, Point::new(0.0, 1.0)), 90.0));
        assert!(approx(angle_deg(origin, Point::new(-1.0, 0.0)), 180.0));
    }

    #[test]
    fn test_angular_change_does_not_wrap() {
        assert!(approx(angular_change(170.0, -170.0), -340.0));
        assert!(approx(angular_change(0.0, 15.0), 15.0));
    }

    #[test]
    fn test_offset_polar() {
        let p = Point::new(10.0, 10.0).offset_polar(100.0, 90.0);
        assert!(approx(p.x, 10.0));
        assert!(approx(p.y, 110.0));
    }
}
