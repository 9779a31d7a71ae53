//! General singular value decomposition for `m x n` matrices with `m >= n`.
//!
//! Two phases:
//! 1. Householder reflections reduce the matrix to upper-bidiagonal form while
//!    the right-hand transformations are accumulated into `V`.
//! 2. Implicitly shifted QR sweeps chase the super-diagonal to zero, one
//!    singular value at a time, deflating whenever an element becomes
//!    negligible relative to the matrix norm (`|x| + anorm == anorm`).
//!
//! The input matrix is overwritten with the left singular vectors `U`, so
//! `A = U * diag(w) * V^T`. Singular values come back non-negative but
//! unsorted; [`Svd::sorted`] orders them descending.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, SolverError};

/// QR sweeps allowed per singular value before giving up
pub const MAX_SWEEPS: usize = 30;

/// Result of [`Svd::decompose`]
#[derive(Debug, Clone)]
pub struct Svd {
    pub u: DMatrix<f64>, // left singular vectors, m x n
    pub w: DVector<f64>, // singular values, non-negative
    pub v: DMatrix<f64>, // right singular vectors, n x n (columns)
}

impl Svd {
    /// Decompose a copy of `a`
    pub fn decompose(a: &DMatrix<f64>) -> Result<Self> {
        let mut u = a.clone();
        let (w, v) = compute_svd(&mut u)?;
        Ok(Self { u, w, v })
    }

    /// Reorder so singular values are descending, permuting the columns of
    /// `u` and `v` along with them
    pub fn sorted(self) -> Self {
        let n = self.w.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.w[b].total_cmp(&self.w[a]));

        let w = DVector::from_iterator(n, order.iter().map(|&i| self.w[i]));
        let mut u = DMatrix::zeros(self.u.nrows(), n);
        let mut v = DMatrix::zeros(self.v.nrows(), n);
        for (dst, &src) in order.iter().enumerate() {
            u.set_column(dst, &self.u.column(src));
            v.set_column(dst, &self.v.column(src));
        }
        Self { u, w, v }
    }

    /// `U * diag(w) * V^T`
    pub fn recompose(&self) -> DMatrix<f64> {
        &self.u * DMatrix::from_diagonal(&self.w) * self.v.transpose()
    }
}

/// `|a|` carrying the sign of `b`
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// In-place SVD. On return `a` holds `U`; the singular values and `V` are returned.
pub fn compute_svd(a: &mut DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
    let (m, n) = a.shape();
    if m < n || n == 0 {
        return Err(SolverError::SvdShape { rows: m, cols: n });
    }

    let mut w = DVector::<f64>::zeros(n);
    let mut v = DMatrix::<f64>::zeros(n, n);
    let mut rv1 = vec![0.0_f64; n];

    let mut g = 0.0_f64;
    let mut scale = 0.0_f64;
    let mut anorm = 0.0_f64;

    // =========================================================================
    // Householder reduction to bidiagonal form
    // =========================================================================
    for i in 0..n {
        let l = i + 1;
        rv1[i] = scale * g;
        g = 0.0;
        scale = 0.0;
        let mut s = 0.0;

        // column reflection
        for k in i..m {
            scale += a[(k, i)].abs();
        }
        if scale != 0.0 {
            for k in i..m {
                a[(k, i)] /= scale;
                s += a[(k, i)] * a[(k, i)];
            }
            let f = a[(i, i)];
            g = -sign(s.sqrt(), f);
            let h = f * g - s;
            a[(i, i)] = f - g;
            for j in l..n {
                let mut s = 0.0;
                for k in i..m {
                    s += a[(k, i)] * a[(k, j)];
                }
                let f = s / h;
                for k in i..m {
                    let aki = a[(k, i)];
                    a[(k, j)] += f * aki;
                }
            }
            for k in i..m {
                a[(k, i)] *= scale;
            }
        }
        w[i] = scale * g;

        // row reflection
        g = 0.0;
        scale = 0.0;
        s = 0.0;
        if i + 1 != n {
            for k in l..n {
                scale += a[(i, k)].abs();
            }
            if scale != 0.0 {
                for k in l..n {
                    a[(i, k)] /= scale;
                    s += a[(i, k)] * a[(i, k)];
                }
                let f = a[(i, l)];
                g = -sign(s.sqrt(), f);
                let h = f * g - s;
                a[(i, l)] = f - g;
                for k in l..n {
                    rv1[k] = a[(i, k)] / h;
                }
                for j in l..m {
                    let mut s = 0.0;
                    for k in l..n {
                        s += a[(j, k)] * a[(i, k)];
                    }
                    for k in l..n {
                        a[(j, k)] += s * rv1[k];
                    }
                }
                for k in l..n {
                    a[(i, k)] *= scale;
                }
            }
        }
        anorm = anorm.max(w[i].abs() + rv1[i].abs());
    }

    // =========================================================================
    // Accumulate right-hand transformations into V
    // =========================================================================
    for i in (0..n).rev() {
        let l = i + 1;
        if l < n {
            if g != 0.0 {
                // double division avoids possible underflow
                for j in l..n {
                    v[(j, i)] = (a[(i, j)] / a[(i, l)]) / g;
                }
                for j in l..n {
                    let mut s = 0.0;
                    for k in l..n {
                        s += a[(i, k)] * v[(k, j)];
                    }
                    for k in l..n {
                        let vki = v[(k, i)];
                        v[(k, j)] += s * vki;
                    }
                }
            }
            for j in l..n {
                v[(i, j)] = 0.0;
                v[(j, i)] = 0.0;
            }
        }
        v[(i, i)] = 1.0;
        g = rv1[i];
    }

    // =========================================================================
    // Accumulate left-hand transformations into U (in place in `a`)
    // =========================================================================
    for i in (0..m.min(n)).rev() {
        let l = i + 1;
        let mut g = w[i];
        for j in l..n {
            a[(i, j)] = 0.0;
        }
        if g != 0.0 {
            g = g.recip();
            for j in l..n {
                let mut s = 0.0;
                for k in l..m {
                    s += a[(k, i)] * a[(k, j)];
                }
                let f = (s / a[(i, i)]) * g;
                for k in i..m {
                    let aki = a[(k, i)];
                    a[(k, j)] += f * aki;
                }
            }
            for j in i..m {
                a[(j, i)] *= g;
            }
        } else {
            for j in i..m {
                a[(j, i)] = 0.0;
            }
        }
        a[(i, i)] += 1.0;
    }

    // =========================================================================
    // Diagonalize the bidiagonal form
    // =========================================================================
    for k in (0..n).rev() {
        let mut its = 0;
        loop {
            its += 1;

            // test for splitting; rv1[0] is always zero so the scan stops at l = 0
            let mut flag = true;
            let mut l = k;
            let mut nm = 0;
            loop {
                if l == 0 || rv1[l].abs() + anorm == anorm {
                    flag = false;
                    break;
                }
                nm = l - 1;
                if w[nm].abs() + anorm == anorm {
                    break;
                }
                l -= 1;
            }

            if flag {
                // cancellation of rv1[l] when l > 0
                let mut c = 0.0;
                let mut s = 1.0;
                for i in l..=k {
                    let f = s * rv1[i];
                    rv1[i] *= c;
                    if f.abs() + anorm == anorm {
                        break;
                    }
                    let g = w[i];
                    let mut h = f.hypot(g);
                    w[i] = h;
                    h = h.recip();
                    c = g * h;
                    s = -f * h;
                    for j in 0..m {
                        let y = a[(j, nm)];
                        let z = a[(j, i)];
                        a[(j, nm)] = y * c + z * s;
                        a[(j, i)] = z * c - y * s;
                    }
                }
            }

            let z = w[k];
            if l == k {
                // converged; make the singular value non-negative
                if z < 0.0 {
                    w[k] = -z;
                    for j in 0..n {
                        v[(j, k)] = -v[(j, k)];
                    }
                }
                break;
            }
            if its >= MAX_SWEEPS {
                return Err(SolverError::SvdNoConvergence {
                    index: k,
                    max_sweeps: MAX_SWEEPS,
                });
            }

            // shift from the bottom 2x2 minor
            let mut x = w[l];
            let nm = k - 1;
            let mut y = w[nm];
            let mut g = rv1[nm];
            let mut h = rv1[k];
            let mut f = ((y - z) * (y + z) + (g - h) * (g + h)) / (2.0 * h * y);
            g = f.hypot(1.0);
            f = ((x - z) * (x + z) + h * ((y / (f + sign(g, f))) - h)) / x;

            // next QR transformation
            let mut c = 1.0;
            let mut s = 1.0;
            for j in l..=nm {
                let i = j + 1;
                g = rv1[i];
                y = w[i];
                h = s * g;
                g *= c;
                let mut z = f.hypot(h);
                rv1[j] = z;
                c = f / z;
                s = h / z;
                f = x * c + g * s;
                g = g * c - x * s;
                h = y * s;
                y *= c;
                for jj in 0..n {
                    let x = v[(jj, j)];
                    let z = v[(jj, i)];
                    v[(jj, j)] = x * c + z * s;
                    v[(jj, i)] = z * c - x * s;
                }
                z = f.hypot(h);
                w[j] = z;
                if z != 0.0 {
                    z = z.recip();
                    c = f * z;
                    s = h * z;
                }
                f = c * g + s * y;
                x = c * y - s * g;
                for jj in 0..m {
                    let y = a[(jj, j)];
                    let z = a[(jj, i)];
                    a[(jj, j)] = y * c + z * s;
                    a[(jj, i)] = z * c - y * s;
                }
            }
            rv1[l] = 0.0;
            rv1[k] = f;
            w[k] = x;
        }
    }

    Ok((w, v))
}
