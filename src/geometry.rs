use serde::{Deserialize, Serialize};

/// A landmark position in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Whether both coordinates fall inside the visible `[0, 1]` frame.
    pub fn is_on_frame(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(v: (f64, f64)) -> Self {
        Point2D { x: v.0, y: v.1 }
    }
}

/// Angle in degrees at `vertex` between the rays towards `a` and `c`.
///
/// The result is folded into `[0, 180]`, so the order of `a` and `c` does not
/// matter. If either outer point coincides with the vertex the angle is
/// undefined and `0.0` is returned.
pub fn angle_between(a: Point2D, vertex: Point2D, c: Point2D) -> f64 {
    if a == vertex || c == vertex {
        return 0.0;
    }

    let radians = (c.y - vertex.y).atan2(c.x - vertex.x) - (a.y - vertex.y).atan2(a.x - vertex.x);
    let angle = radians.to_degrees().abs();

    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Average of a left/right pair of joint angles.
pub fn mean_angle(left: f64, right: f64) -> f64 {
    (left + right) / 2.0
}
