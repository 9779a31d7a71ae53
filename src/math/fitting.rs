//! Least-squares best-fit line, plane, circle and sphere.
//!
//! Line and plane come from the covariance matrix of the centroid-subtracted
//! points. The covariance is symmetric positive semi-definite, so the generic
//! SVD gives its eigenvalues (singular values) and eigenvectors (columns of V)
//! directly. Circle and sphere are closed-form algebraic fits.
//!
//! None of these panic on degenerate input. Line and plane report what kind
//! of point set they saw; circle and sphere return `None` when no fit exists.

use nalgebra::{DMatrix, Matrix3};

use crate::error::Result;
use crate::math::svd::Svd;
use crate::math::triple::{centroid, Triple, TripleExt};

/// Eigenvalues below this (absolute, in squared length units) mean "all points coincide"
pub const COINCIDENT_TOLERANCE: f64 = 1e-12;

/// Eigenvalue ratio to the largest eigenvalue below which an axis is treated as flat
pub const FLATNESS_TOLERANCE: f64 = 1e-10;

/// Relative determinant tolerance for the sphere's 3x3 system
pub const SPHERE_DELTA_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFitKind {
    Coincident = 0,
    Colinear = 1,
    Scattered = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneFitKind {
    Coincident = 0,
    Colinear = 1,
    Coplanar = 2,
    General = 3,
}

#[derive(Debug, Clone, Copy)]
pub struct LineFit {
    pub origin: Triple,    // centroid of the points
    pub direction: Triple, // unit dominant axis
    pub kind: LineFitKind,
}

impl LineFit {
    pub fn closest_point(&self, p: &Triple) -> Triple {
        self.origin + self.direction * (p - self.origin).dot(&self.direction)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaneFit {
    pub origin: Triple, // centroid of the points
    pub normal: Triple, // unit normal
    pub x_axis: Triple, // unit dominant in-plane axis
    pub y_axis: Triple, // normal x x_axis
    pub kind: PlaneFitKind,
}

impl PlaneFit {
    pub fn closest_point(&self, p: &Triple) -> Triple {
        p - self.normal * (p - self.origin).dot(&self.normal)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircleFit {
    pub center: Triple,
    pub normal: Triple,
    pub radius: f64,
}

impl CircleFit {
    /// Closest point on the circle; a point on the axis maps to an arbitrary rim point
    pub fn closest_point(&self, p: &Triple) -> Triple {
        let rel = p - self.center;
        let mut in_plane = rel - self.normal * rel.dot(&self.normal);
        if in_plane.is_almost_zero(1e-12) {
            in_plane = self.normal.perpendicular();
        }
        self.center + in_plane.normalise() * self.radius
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SphereFit {
    pub center: Triple,
    pub radius: f64,
}

impl SphereFit {
    pub fn closest_point(&self, p: &Triple) -> Triple {
        let mut rel = p - self.center;
        if rel.is_almost_zero(1e-12) {
            rel = Triple::x();
        }
        self.center + rel.normalise() * self.radius
    }
}

/// Eigen-decomposition of the covariance of `points`, sorted descending
struct PrincipalAxes {
    centroid: Triple,
    values: [f64; 3],
    axes: [Triple; 3],
}

fn principal_axes(points: &[Triple]) -> Result<PrincipalAxes> {
    let c = centroid(points);
    let mut cov = Matrix3::<f64>::zeros();
    for p in points {
        let d = p - c;
        cov += d * d.transpose();
    }
    if !points.is_empty() {
        cov /= points.len() as f64;
    }

    let svd = Svd::decompose(&DMatrix::from_iterator(3, 3, cov.iter().cloned()))?.sorted();
    let axis = |i: usize| Triple::new(svd.v[(0, i)], svd.v[(1, i)], svd.v[(2, i)]);

    Ok(PrincipalAxes {
        centroid: c,
        values: [svd.w[0], svd.w[1], svd.w[2]],
        axes: [axis(0), axis(1), axis(2)],
    })
}

/// Best-fit line through `points`
pub fn best_fit_line(points: &[Triple]) -> Result<LineFit> {
    let pa = principal_axes(points)?;
    let [l0, l1, _] = pa.values;

    let kind = if l0 < COINCIDENT_TOLERANCE {
        LineFitKind::Coincident
    } else if l1 < FLATNESS_TOLERANCE * l0 {
        LineFitKind::Colinear
    } else {
        LineFitKind::Scattered
    };

    let direction = if kind == LineFitKind::Coincident {
        Triple::x()
    } else {
        pa.axes[0].normalise()
    };

    Ok(LineFit {
        origin: pa.centroid,
        direction,
        kind,
    })
}

/// Best-fit plane through `points`
pub fn best_fit_plane(points: &[Triple]) -> Result<PlaneFit> {
    let pa = principal_axes(points)?;
    let [l0, l1, l2] = pa.values;

    let kind = if l0 < COINCIDENT_TOLERANCE {
        PlaneFitKind::Coincident
    } else if l1 < FLATNESS_TOLERANCE * l0 {
        PlaneFitKind::Colinear
    } else if l2 < FLATNESS_TOLERANCE * l0 {
        PlaneFitKind::Coplanar
    } else {
        PlaneFitKind::General
    };

    let (x_axis, normal) = match kind {
        PlaneFitKind::Coincident => (Triple::x(), Triple::z()),
        PlaneFitKind::Colinear => {
            let x = pa.axes[0].normalise();
            (x, x.perpendicular().normalise())
        }
        PlaneFitKind::Coplanar | PlaneFitKind::General => {
            let x = pa.axes[0].normalise();
            (x, x.cross(&pa.axes[1]).normalise())
        }
    };

    Ok(PlaneFit {
        origin: pa.centroid,
        normal,
        x_axis,
        y_axis: normal.cross(&x_axis),
        kind,
    })
}

/// Algebraic circle fit in the best-fit plane.
/// `None` for coincident or colinear points, or if the SVD fails.
pub fn best_fit_circle(points: &[Triple]) -> Option<CircleFit> {
    let plane = best_fit_plane(points).ok()?;
    if matches!(plane.kind, PlaneFitKind::Coincident | PlaneFitKind::Colinear) {
        return None;
    }

    // moments of the centered in-plane coordinates
    let (mut suu, mut suv, mut svv) = (0.0, 0.0, 0.0);
    let (mut suuu, mut svvv, mut suvv, mut svuu) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let d = p - plane.origin;
        let u = d.dot(&plane.x_axis);
        let v = d.dot(&plane.y_axis);
        suu += u * u;
        suv += u * v;
        svv += v * v;
        suuu += u * u * u;
        svvv += v * v * v;
        suvv += u * v * v;
        svuu += v * u * u;
    }

    // [suu suv; suv svv] [uc vc]^T = 0.5 [suuu + suvv, svvv + svuu]^T
    let det = suu * svv - suv * suv;
    if det.abs() <= FLATNESS_TOLERANCE * (suu + svv).powi(2) {
        return None;
    }
    let bu = 0.5 * (suuu + suvv);
    let bv = 0.5 * (svvv + svuu);
    let uc = (bu * svv - suv * bv) / det;
    let vc = (suu * bv - suv * bu) / det;

    let n = points.len() as f64;
    let radius = (uc * uc + vc * vc + (suu + svv) / n).sqrt();
    Some(CircleFit {
        center: plane.origin + plane.x_axis * uc + plane.y_axis * vc,
        normal: plane.normal,
        radius,
    })
}

/// Exact least-squares sphere fit from first to third order moment sums.
/// `None` when the 3x3 system is singular (coplanar, colinear or coincident points).
pub fn best_fit_sphere(points: &[Triple]) -> Option<SphereFit> {
    if points.len() < 4 {
        return None;
    }
    // center first for conditioning; the solution is shifted back at the end
    let c = centroid(points);
    let n = points.len() as f64;

    let (mut sx, mut sy, mut sz) = (0.0, 0.0, 0.0);
    let (mut sxx, mut syy, mut szz, mut sxy, mut sxz, mut syz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut sxxx, mut syyy, mut szzz) = (0.0, 0.0, 0.0);
    let (mut sxyy, mut sxzz, mut sxxy, mut sxxz, mut syyz, mut syzz) =
        (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for p in points {
        let d = p - c;
        let (x, y, z) = (d.x, d.y, d.z);
        sx += x;
        sy += y;
        sz += z;
        sxx += x * x;
        syy += y * y;
        szz += z * z;
        sxy += x * y;
        sxz += x * z;
        syz += y * z;
        sxxx += x * x * x;
        syyy += y * y * y;
        szzz += z * z * z;
        sxyy += x * y * y;
        sxzz += x * z * z;
        sxxy += x * x * y;
        sxxz += x * x * z;
        syyz += y * y * z;
        syzz += y * z * z;
    }

    let a1 = sxx + syy + szz;
    let a = 2.0 * sx * sx - 2.0 * n * sxx;
    let b = 2.0 * sx * sy - 2.0 * n * sxy;
    let cc = 2.0 * sx * sz - 2.0 * n * sxz;
    let d = -n * (sxxx + sxyy + sxzz) + a1 * sx;
    let e = b;
    let f = 2.0 * sy * sy - 2.0 * n * syy;
    let g = 2.0 * sy * sz - 2.0 * n * syz;
    let h = -n * (sxxy + syyy + syzz) + a1 * sy;
    let j = cc;
    let k = g;
    let l = 2.0 * sz * sz - 2.0 * n * szz;
    let m = -n * (sxxz + syyz + szzz) + a1 * sz;

    let delta = a * (f * l - g * k) - e * (b * l - cc * k) + j * (b * g - cc * f);
    let magnitude = (a.abs() + f.abs() + l.abs()).powi(3);
    if delta.abs() <= SPHERE_DELTA_TOLERANCE * magnitude {
        return None;
    }

    let xc = (d * (f * l - g * k) - h * (b * l - cc * k) + m * (b * g - cc * f)) / delta;
    let yc = (a * (h * l - m * g) - e * (d * l - m * cc) + j * (d * g - h * cc)) / delta;
    let zc = (a * (f * m - h * k) - e * (b * m - d * k) + j * (b * h - d * f)) / delta;

    let r2 = xc * xc + yc * yc + zc * zc + (a1 - 2.0 * (xc * sx + yc * sy + zc * sz)) / n;
    if r2 < 0.0 {
        return None;
    }

    Some(SphereFit {
        center: c + Triple::new(xc, yc, zc),
        radius: r2.sqrt(),
    })
}
