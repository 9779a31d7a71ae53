//! The 3-component vector every other part of the solver is written against.
//!
//! `Triple` is a plain nalgebra `Vector3<f64>`, so the arithmetic, `dot`,
//! `cross`, `norm` and `norm_squared` come from nalgebra. The few helpers the
//! goals need on top of that live in [`TripleExt`].

use nalgebra::Vector3;

pub type Triple = Vector3<f64>;

/// Default tolerance for [`TripleExt::is_almost_zero`]
pub const ZERO_TOLERANCE: f64 = 1e-12;

pub trait TripleExt {
    /// `true` when every component lies strictly inside `(-threshold, threshold)`
    fn is_almost_zero(&self, threshold: f64) -> bool;

    /// Scale to unit length via the reciprocal square root of the squared length.
    /// Undefined for the zero vector; callers check [`TripleExt::is_almost_zero`] first.
    fn normalise(&self) -> Triple;

    /// An arbitrary non-zero vector perpendicular to `self`.
    /// The component with the smallest magnitude is dropped, so the result is
    /// never degenerate for a non-zero input.
    fn perpendicular(&self) -> Triple;

    /// Squared distance to another point
    fn distance_squared(&self, other: &Triple) -> f64;
}

impl TripleExt for Triple {
    fn is_almost_zero(&self, threshold: f64) -> bool {
        self.x.abs() < threshold && self.y.abs() < threshold && self.z.abs() < threshold
    }

    fn normalise(&self) -> Triple {
        self * self.norm_squared().sqrt().recip()
    }

    fn perpendicular(&self) -> Triple {
        let (ax, ay, az) = (self.x.abs(), self.y.abs(), self.z.abs());
        if ax <= ay && ax <= az {
            Triple::new(0.0, -self.z, self.y)
        } else if ay <= az {
            Triple::new(-self.z, 0.0, self.x)
        } else {
            Triple::new(-self.y, self.x, 0.0)
        }
    }

    fn distance_squared(&self, other: &Triple) -> f64 {
        (self - other).norm_squared()
    }
}

/// Mean of a point set, zero for an empty slice
pub fn centroid(points: &[Triple]) -> Triple {
    if points.is_empty() {
        return Triple::zeros();
    }
    points.iter().sum::<Triple>() / points.len() as f64
}

/// Closest point to `p` on the segment `a`-`b`
pub fn closest_point_on_segment(p: &Triple, a: &Triple, b: &Triple) -> Triple {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < ZERO_TOLERANCE {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}
