//! Dense matrix products over flat row-major buffers.
//!
//! Everything funnels into `gemm_f32`:
//! - default: a plain triple loop
//! - feature `matrixmultiply`: the strided `sgemm` kernel from that crate
//!
//! The `nn`/`nt`/`tn` wrappers name the transpose pattern of the two operands, which is
//! all the layers ever need. `beta` selects overwrite (`0.0`) or accumulate (`1.0`).

#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn gemm_f32(
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    rsa: usize,
    csa: usize,
    b: &[f32],
    rsb: usize,
    csb: usize,
    beta: f32,
    c: &mut [f32],
    rsc: usize,
    csc: usize,
) {
    if m == 0 || n == 0 {
        return;
    }
    if k == 0 {
        for i in 0..m {
            for j in 0..n {
                c[i * rsc + j * csc] *= beta;
            }
        }
        return;
    }

    #[cfg(feature = "matrixmultiply")]
    {
        debug_assert!(a.len() >= (m - 1) * rsa + (k - 1) * csa + 1);
        debug_assert!(b.len() >= (k - 1) * rsb + (n - 1) * csb + 1);
        debug_assert!(c.len() >= (m - 1) * rsc + (n - 1) * csc + 1);

        // SAFETY: the asserts above (and the callers' shape contracts) keep every
        // strided access inside the three slices.
        unsafe {
            matrixmultiply::sgemm(
                m,
                k,
                n,
                alpha,
                a.as_ptr(),
                rsa as isize,
                csa as isize,
                b.as_ptr(),
                rsb as isize,
                csb as isize,
                beta,
                c.as_mut_ptr(),
                rsc as isize,
                csc as isize,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0_f32;
            let a0 = i * rsa;
            let b0 = j * csb;

            for p in 0..k {
                let av = a[a0 + p * csa];
                let bv = b[p * rsb + b0];
                acc = av.mul_add(bv, acc);
            }

            let idx = i * rsc + j * csc;
            c[idx] = if beta == 0.0 {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

/// `C (m, n) = A (m, k) * B (k, n) + beta * C`.
#[inline]
pub(crate) fn matmul_nn(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], beta: f32, c: &mut [f32]) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(c.len(), m * n);
    gemm_f32(m, n, k, 1.0, a, k, 1, b, n, 1, beta, c, n, 1);
}

/// `C (m, n) = A (m, k) * B^T + beta * C`, where `B` is stored as `(n, k)`.
#[inline]
pub(crate) fn matmul_nt(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], beta: f32, c: &mut [f32]) {
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), n * k);
    debug_assert_eq!(c.len(), m * n);
    gemm_f32(m, n, k, 1.0, a, k, 1, b, 1, k, beta, c, n, 1);
}

/// `C (m, n) = A^T * B (k, n) + beta * C`, where `A` is stored as `(k, m)`.
#[inline]
pub(crate) fn matmul_tn(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], beta: f32, c: &mut [f32]) {
    debug_assert_eq!(a.len(), k * m);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(c.len(), m * n);
    gemm_f32(m, n, k, 1.0, a, 1, m, b, n, 1, beta, c, n, 1);
}

/// Adds `bias` (length `cols`) to every row of a `(rows, cols)` buffer.
#[inline]
pub(crate) fn add_row_bias(values: &mut [f32], bias: &[f32]) {
    for row in values.chunks_exact_mut(bias.len()) {
        for (v, &b) in row.iter_mut().zip(bias) {
            *v += b;
        }
    }
}

/// Column sums of a `(rows, cols)` buffer, written into `out` (length `cols`).
#[inline]
pub(crate) fn column_sums(values: &[f32], out: &mut [f32]) {
    out.fill(0.0);
    for row in values.chunks_exact(out.len()) {
        for (o, &v) in out.iter_mut().zip(row) {
            *o += v;
        }
    }
}
