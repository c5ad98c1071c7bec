//! Pure 2D point transformations used by the toolpath-generating command
//! handlers (rotated rectangle pockets, scaled arcs).
//!
//! Angle convention: degrees, clockwise positive. Internally the sign is
//! inverted before converting to radians so the standard counter-clockwise
//! rotation matrix applies. Components that are absent (`None`) pass through
//! every transformation untouched.

/// A point with optional components. Handlers that only move some axes leave
/// the others `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Point {
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
        }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// Normalize an angle in degrees to the open interval (-360, 360).
fn normalize_deg(angle: f64) -> f64 {
    angle % 360.0
}

/// Rotate about `(cx, cy)` by `angle_deg` (clockwise positive).
pub fn rotate(p: Point, angle_deg: f64, cx: f64, cy: f64) -> Point {
    let theta = -normalize_deg(angle_deg).to_radians();
    let (sin, cos) = theta.sin_cos();
    match (p.x, p.y) {
        (Some(x), Some(y)) => {
            let dx = x - cx;
            let dy = y - cy;
            Point {
                x: Some(cx + dx * cos - dy * sin),
                y: Some(cy + dx * sin + dy * cos),
                z: p.z,
            }
        }
        // Rotation needs both planar components.
        _ => p,
    }
}

/// Rotate a concrete `(x, y)` pair about `(cx, cy)`. Convenience wrapper for
/// handlers that carry coordinates as plain floats.
pub fn rotate_xy(x: f64, y: f64, angle_deg: f64, cx: f64, cy: f64) -> (f64, f64) {
    let p = rotate(Point::xy(x, y), angle_deg, cx, cy);
    (p.x.unwrap_or(x), p.y.unwrap_or(y))
}

/// Shear along X: offsets X by the shear factor times Y. The factor is the
/// small-angle tangent approximation `-angle_deg * PI / 180`.
pub fn shear_x(p: Point, angle_deg: f64) -> Point {
    let factor = -angle_deg.to_radians();
    match (p.x, p.y) {
        (Some(x), Some(y)) => Point {
            x: Some(x + factor * y),
            ..p
        },
        _ => p,
    }
}

/// Shear along Y: offsets Y by the shear factor times X.
pub fn shear_y(p: Point, angle_deg: f64) -> Point {
    let factor = -angle_deg.to_radians();
    match (p.x, p.y) {
        (Some(x), Some(y)) => Point {
            y: Some(y + factor * x),
            ..p
        },
        _ => p,
    }
}

/// Scale about `(cx, cy)`. A component with scale factor exactly 1 (or an
/// absent coordinate) is untouched.
pub fn scale(p: Point, sx: f64, sy: f64, cx: f64, cy: f64) -> Point {
    let x = match p.x {
        Some(x) if sx != 1.0 => Some(cx + (x - cx) * sx),
        other => other,
    };
    let y = match p.y {
        Some(y) if sy != 1.0 => Some(cy + (y - cy) * sy),
        other => other,
    };
    Point { x, y, z: p.z }
}

/// Translate by `(dx, dy, dz)`. Zero offsets and absent coordinates are
/// untouched.
pub fn translate(p: Point, dx: f64, dy: f64, dz: f64) -> Point {
    let shift = |c: Option<f64>, d: f64| match c {
        Some(v) if d != 0.0 => Some(v + d),
        other => other,
    };
    Point {
        x: shift(p.x, dx),
        y: shift(p.y, dy),
        z: shift(p.z, dz),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn rotate_then_unrotate_is_identity() {
        let p = Point::xyz(3.25, -1.5, 0.75);
        for angle in [0.0, 17.3, 90.0, 245.0, 359.9, 719.5, -33.0] {
            let r = rotate(p, angle, 1.0, 2.0);
            let back = rotate(r, -angle, 1.0, 2.0);
            assert!(close(back.x.unwrap(), 3.25), "angle {angle}");
            assert!(close(back.y.unwrap(), -1.5), "angle {angle}");
            assert_eq!(back.z, Some(0.75));
        }
    }

    #[test]
    fn rotate_90_cw_about_origin() {
        // Clockwise positive: (1, 0) rotated 90 degrees lands on (0, -1).
        let r = rotate(Point::xy(1.0, 0.0), 90.0, 0.0, 0.0);
        assert!(close(r.x.unwrap(), 0.0));
        assert!(close(r.y.unwrap(), -1.0));
    }

    #[test]
    fn rotate_missing_component_is_untouched() {
        let p = Point {
            x: Some(1.0),
            y: None,
            z: None,
        };
        assert_eq!(rotate(p, 45.0, 0.0, 0.0), p);
    }

    #[test]
    fn translate_roundtrip_is_identity() {
        let p = Point::xyz(1.0, 2.0, 3.0);
        let t = translate(p, 0.5, -0.25, 4.0);
        let back = translate(t, -0.5, 0.25, -4.0);
        assert_eq!(back, p);
    }

    #[test]
    fn translate_skips_absent_and_zero() {
        let p = Point {
            x: Some(1.0),
            y: None,
            z: Some(2.0),
        };
        let t = translate(p, 0.0, 5.0, 1.0);
        assert_eq!(t.x, Some(1.0));
        assert_eq!(t.y, None);
        assert_eq!(t.z, Some(3.0));
    }

    #[test]
    fn scale_about_center() {
        let s = scale(Point::xy(3.0, 4.0), 2.0, 2.0, 1.0, 1.0);
        assert!(close(s.x.unwrap(), 5.0));
        assert!(close(s.y.unwrap(), 7.0));
    }

    #[test]
    fn scale_factor_one_is_untouched() {
        let p = Point::xy(3.0, 4.0);
        assert_eq!(scale(p, 1.0, 1.0, 100.0, 100.0), p);
    }

    #[test]
    fn shear_x_offsets_by_other_axis() {
        let s = shear_x(Point::xy(1.0, 2.0), -90.0);
        // factor = -(-90) * PI/180 = PI/2; x' = 1 + (PI/2)*2
        assert!(close(s.x.unwrap(), 1.0 + std::f64::consts::PI));
        assert!(close(s.y.unwrap(), 2.0));
    }

    #[test]
    fn shear_y_offsets_by_other_axis() {
        let s = shear_y(Point::xy(2.0, 1.0), 180.0);
        assert!(close(s.y.unwrap(), 1.0 - 2.0 * std::f64::consts::PI));
    }
}
