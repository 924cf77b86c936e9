use std::cmp::Ordering;

use log::warn;
use nalgebra::SymmetricEigen;

use crate::{DMat, DVec};

/// compute the eigen decomposition of the symmetric matrix `mat` and return
/// the eigenvalues in ascending order along with the corresponding
/// eigenvectors as the ROWS of the returned matrix. each eigenvector is
/// flipped if necessary so that its largest-magnitude component is positive
pub fn symm_eigen_decomp(mat: &DMat) -> (DVec, DMat) {
    let SymmetricEigen {
        eigenvectors: vecs,
        eigenvalues: vals,
    } = SymmetricEigen::new(mat.clone());
    let mut pairs: Vec<_> = vals.iter().enumerate().collect();
    pairs.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let (rows, cols) = vecs.shape();
    let mut ret = DMat::zeros(cols, rows);
    for (i, (j, _)) in pairs.iter().enumerate() {
        let mut v = vecs.column(*j).transpose();
        let big = v.iter().fold(0.0_f64, |acc, x| {
            if x.abs() > acc.abs() { *x } else { acc }
        });
        if big < 0.0 {
            v.neg_mut();
        }
        ret.set_row(i, &v);
    }
    (
        DVec::from_iterator(vals.len(), pairs.iter().map(|a| *a.1)),
        ret,
    )
}

/// rebuild Vᵀ diag(f(λ)) V from the decomposition of `mat`, where `f`
/// returns None for eigenvalues that should be projected out
fn reconstruct(mat: &DMat, f: impl Fn(f64) -> Option<f64>) -> DMat {
    let (vals, vecs) = symm_eigen_decomp(mat);
    let n = mat.nrows();
    let mut ret = DMat::zeros(n, n);
    for (i, &l) in vals.iter().enumerate() {
        if let Some(w) = f(l) {
            let v = vecs.row(i);
            ret += w * v.transpose() * v;
        }
    }
    ret
}

/// generalized inverse of the symmetric matrix `mat`. eigenvalues with
/// magnitude at or below `tol` are treated as zero
pub fn symm_mat_inv(mat: &DMat, tol: f64) -> DMat {
    reconstruct(mat, |l| if l.abs() > tol { Some(1.0 / l) } else { None })
}

/// generalized square root of the symmetric positive semi-definite matrix
/// `mat`, or its inverse square root if `inverse` is set. eigenvalues at or
/// below `tol` are projected out
pub fn symm_mat_root(mat: &DMat, tol: f64, inverse: bool) -> DMat {
    reconstruct(mat, |l| {
        if l > tol {
            let r = l.sqrt();
            Some(if inverse { 1.0 / r } else { r })
        } else {
            if l < -tol {
                warn!("dropping negative eigenvalue {l:.3e} from matrix root");
            }
            None
        }
    })
}

/// root-mean-square of the elements of `v`
pub fn rms(v: &DVec) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    (v.norm_squared() / v.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn spd() -> DMat {
        DMat::from_row_slice(
            3,
            3,
            &[4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0],
        )
    }

    #[test]
    fn eigen_sorted_and_signed() {
        let m = spd();
        let (vals, vecs) = symm_eigen_decomp(&m);
        assert!(vals[0] <= vals[1] && vals[1] <= vals[2]);
        for i in 0..3 {
            let v = vecs.row(i).transpose();
            assert_abs_diff_eq!(&m * &v, vals[i] * &v, epsilon = 1e-10);
            let big = v.iter().cloned().fold(0.0_f64, |a, x| {
                if x.abs() > a.abs() { x } else { a }
            });
            assert!(big > 0.0);
        }
    }

    #[test]
    fn full_rank_inverse() {
        let m = spd();
        let inv = symm_mat_inv(&m, 1e-10);
        assert_abs_diff_eq!(&m * inv, DMat::identity(3, 3), epsilon = 1e-10);
    }

    #[test]
    fn singular_inverse() {
        // rank one
        let v = DVec::from_row_slice(&[1.0, 2.0, 2.0]);
        let m = &v * v.transpose();
        let inv = symm_mat_inv(&m, 1e-10);
        assert_abs_diff_eq!(symm_mat_inv(&inv, 1e-10), m, epsilon = 1e-10);
        assert_abs_diff_eq!(&m * &inv * &m, m, epsilon = 1e-10);
    }

    #[test]
    fn roots() {
        let m = spd();
        let r = symm_mat_root(&m, 1e-10, false);
        let ri = symm_mat_root(&m, 1e-10, true);
        assert_abs_diff_eq!(&r * &r, m, epsilon = 1e-10);
        assert_abs_diff_eq!(&r * &ri, DMat::identity(3, 3), epsilon = 1e-10);
    }
}
