//! Fixed-cost SVD for 3x3 matrices.
//!
//! Follows the minimal-branching scheme of McAdams et al.:
//! - `A^T A` is diagonalized with four cyclic Jacobi sweeps. Each rotation uses
//!   an approximate Givens angle and is accumulated as a quaternion.
//! - `B = A V` has its columns sorted by norm (descending), swapping with a sign
//!   flip so `V` stays a proper rotation.
//! - Three Givens rotations QR-factor `B` into `U` and the diagonal `S`.
//!
//! `U` and `V` are always proper rotations, so when `det(A) < 0` the smallest
//! entry of `S` comes out negative. The cost is constant per call, which is
//! what rigid shape matching wants every iteration. It is not a replacement for
//! [`crate::math::svd`] on degenerate input.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Number of cyclic Jacobi sweeps
pub const JACOBI_SWEEPS: usize = 4;

const FOUR_GAMMA_SQUARED: f64 = 5.828_427_124_746_19; // 3 + 2 * sqrt(2)
const COS_PI_OVER_EIGHT: f64 = 0.923_879_532_511_286_7;
const SIN_PI_OVER_EIGHT: f64 = 0.382_683_432_365_089_8;
const QR_EPSILON: f64 = 1e-15;

#[derive(Debug, Clone, Copy)]
pub struct FastSvd3 {
    pub u: Matrix3<f64>, // left rotation
    pub s: Vector3<f64>, // diagonal of S, sorted by magnitude, last entry may be negative
    pub v: Matrix3<f64>, // right rotation
}

impl FastSvd3 {
    /// `U * diag(s) * V^T`
    pub fn recompose(&self) -> Matrix3<f64> {
        self.u * Matrix3::from_diagonal(&self.s) * self.v.transpose()
    }
}

/// Symmetric 3x3 held as its lower triangle, the layout the sweeps work on
#[derive(Clone, Copy)]
struct Symmetric {
    s11: f64,
    s21: f64,
    s22: f64,
    s31: f64,
    s32: f64,
    s33: f64,
}

/// Half-angle (cos, sin) of an approximate Jacobi rotation zeroing `a12`
fn approximate_givens(a11: f64, a12: f64, a22: f64) -> (f64, f64) {
    let ch = 2.0 * (a11 - a22);
    let sh = a12;
    if FOUR_GAMMA_SQUARED * sh * sh < ch * ch {
        let w = (ch * ch + sh * sh).sqrt().recip();
        (w * ch, w * sh)
    } else {
        (COS_PI_OVER_EIGHT, SIN_PI_OVER_EIGHT)
    }
}

/// One conjugation `S = Q^T S Q` in the leading (1,2) plane, followed by a
/// cyclic relabelling of the axes so the next call works on the next pair.
/// `(x, y, z)` names the quaternion components for the current pair.
fn jacobi_conjugation(x: usize, y: usize, z: usize, s: &mut Symmetric, q: &mut [f64; 4]) {
    let (ch, sh) = approximate_givens(s.s11, s.s21, s.s22);

    let scale = ch * ch + sh * sh;
    let a = (ch * ch - sh * sh) / scale;
    let b = (2.0 * sh * ch) / scale;

    let o = *s;
    s.s11 = a * (a * o.s11 + b * o.s21) + b * (a * o.s21 + b * o.s22);
    s.s21 = a * (-b * o.s11 + a * o.s21) + b * (-b * o.s21 + a * o.s22);
    s.s22 = -b * (-b * o.s11 + a * o.s21) + a * (-b * o.s21 + a * o.s22);
    s.s31 = a * o.s31 + b * o.s32;
    s.s32 = -b * o.s31 + a * o.s32;
    s.s33 = o.s33;

    // q = q * (ch, sh about axis z); q[3] is the scalar part
    let tmp = [q[0] * sh, q[1] * sh, q[2] * sh];
    let sh_w = sh * q[3];
    for c in q.iter_mut() {
        *c *= ch;
    }
    q[z] += sh_w;
    q[3] -= tmp[z];
    q[x] += tmp[y];
    q[y] -= tmp[x];

    // relabel axes (1,2,3) -> (2,3,1)
    let r = *s;
    s.s11 = r.s22;
    s.s21 = r.s32;
    s.s22 = r.s33;
    s.s31 = r.s21;
    s.s32 = r.s31;
    s.s33 = r.s11;
}

/// Quaternion (x, y, z, w) accumulating `V` for the symmetric matrix `s`
fn jacobi_eigenanalysis(s: &mut Symmetric) -> [f64; 4] {
    let mut q = [0.0, 0.0, 0.0, 1.0];
    for _ in 0..JACOBI_SWEEPS {
        jacobi_conjugation(0, 1, 2, s, &mut q);
        jacobi_conjugation(1, 2, 0, s, &mut q);
        jacobi_conjugation(2, 0, 1, s, &mut q);
    }
    q
}

/// Swap columns `i` and `j` of both matrices when `cond`, negating the one
/// moved into `j` so determinants are preserved
fn cond_neg_swap_columns(cond: bool, b: &mut Matrix3<f64>, v: &mut Matrix3<f64>, i: usize, j: usize) {
    if !cond {
        return;
    }
    for m in [b, v] {
        let ci = m.column(i).into_owned();
        let cj = m.column(j).into_owned();
        m.set_column(i, &cj);
        m.set_column(j, &(-ci));
    }
}

fn sort_singular_values(b: &mut Matrix3<f64>, v: &mut Matrix3<f64>) {
    let mut rho = [
        b.column(0).norm_squared(),
        b.column(1).norm_squared(),
        b.column(2).norm_squared(),
    ];

    let c = rho[0] < rho[1];
    cond_neg_swap_columns(c, b, v, 0, 1);
    if c {
        rho.swap(0, 1);
    }

    let c = rho[0] < rho[2];
    cond_neg_swap_columns(c, b, v, 0, 2);
    if c {
        rho.swap(0, 2);
    }

    let c = rho[1] < rho[2];
    cond_neg_swap_columns(c, b, v, 1, 2);
}

/// Full-angle (cos, sin) of the Givens rotation that annihilates `a2` against pivot `a1`
fn qr_givens(a1: f64, a2: f64) -> (f64, f64) {
    let rho = (a1 * a1 + a2 * a2).sqrt();
    let mut sh = if rho > QR_EPSILON { a2 } else { 0.0 };
    let mut ch = a1.abs() + rho.max(QR_EPSILON);
    if a1 < 0.0 {
        std::mem::swap(&mut sh, &mut ch);
    }
    let w = (ch * ch + sh * sh).sqrt().recip();
    ch *= w;
    sh *= w;
    (1.0 - 2.0 * sh * sh, 2.0 * ch * sh)
}

/// Givens rotation acting on rows `p` and `q`
fn givens(p: usize, q: usize, c: f64, s: f64) -> Matrix3<f64> {
    let mut g = Matrix3::identity();
    g[(p, p)] = c;
    g[(p, q)] = s;
    g[(q, p)] = -s;
    g[(q, q)] = c;
    g
}

/// `B = Q R` from three Givens rotations
fn qr_decomposition(b: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let (c1, s1) = qr_givens(b[(0, 0)], b[(1, 0)]);
    let g1 = givens(0, 1, c1, s1);
    let r = g1 * b;

    let (c2, s2) = qr_givens(r[(0, 0)], r[(2, 0)]);
    let g2 = givens(0, 2, c2, s2);
    let r = g2 * r;

    let (c3, s3) = qr_givens(r[(1, 1)], r[(2, 1)]);
    let g3 = givens(1, 2, c3, s3);
    let r = g3 * r;

    let q = g1.transpose() * g2.transpose() * g3.transpose();
    (q, r)
}

/// Decompose `a` as `U * diag(s) * V^T`
pub fn fast_svd3(a: &Matrix3<f64>) -> FastSvd3 {
    let ata = a.transpose() * a;
    let mut sym = Symmetric {
        s11: ata[(0, 0)],
        s21: ata[(1, 0)],
        s22: ata[(1, 1)],
        s31: ata[(2, 0)],
        s32: ata[(2, 1)],
        s33: ata[(2, 2)],
    };

    let q = jacobi_eigenanalysis(&mut sym);
    let quat = UnitQuaternion::from_quaternion(Quaternion::new(q[3], q[0], q[1], q[2]));
    let mut v = quat.to_rotation_matrix().into_inner();

    let mut b = a * v;
    sort_singular_values(&mut b, &mut v);

    let (u, r) = qr_decomposition(&b);
    FastSvd3 {
        u,
        s: r.diagonal(),
        v,
    }
}
