//! the predictor half of the Gonzalez-Schlegel IRC step: find the pivot
//! point half a step from the current point and extrapolate the guess point
//! through it

use intco::{
    DMat, DVec,
    linalg::{symm_eigen_decomp, symm_mat_inv, symm_mat_root},
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{IrcError, config::Config, molsys::MolSys};

/// G and its generalized inverse and roots at one geometry
pub struct Metric {
    pub g: DMat,
    pub inv: DMat,
    pub root: DMat,
    pub inv_root: DMat,
}

impl Metric {
    pub fn new(molsys: &MolSys, tol: f64) -> Result<Self, IrcError> {
        let g = molsys.g_matrix()?;
        if g.iter().any(|x| !x.is_finite()) {
            return Err(IrcError::opt("non-finite element in G matrix"));
        }
        let inv = symm_mat_inv(&g, tol);
        if inv.iter().all(|&x| x == 0.0) {
            return Err(IrcError::opt("G matrix has no eigenvalues above the \
                                      redundancy tolerance"));
        }
        let root = symm_mat_root(&g, tol, false);
        let inv_root = symm_mat_root(&g, tol, true);
        Ok(Self {
            g,
            inv,
            root,
            inv_root,
        })
    }

    /// the mass-weighted internal gradient G⁻¹ B M⁻¹ gₓ
    pub fn gradient(
        &self,
        b: &DMat,
        masses: &[f64],
        gx: &DVec,
    ) -> Result<DVec, IrcError> {
        if gx.len() != b.ncols() || b.ncols() != 3 * masses.len() {
            return Err(IrcError::Config(format!(
                "gradient of length {} for a {:?} B matrix and {} atoms",
                gx.len(),
                b.shape(),
                masses.len()
            )));
        }
        let ugx = DVec::from_fn(gx.len(), |i, _| gx[i] / masses[i / 3]);
        Ok(&self.inv * (b * ugx))
    }
}

/// the points produced by a predictor step, in internal coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfStep {
    /// coordinate values at the start of the step
    pub q0: DVec,
    pub pivot: DVec,
    pub guess: DVec,

    /// ‖guess - q0‖
    pub dq_norm: f64,
}

fn check_shapes(
    molsys: &MolSys,
    hq: Option<&DMat>,
    b: &DMat,
    nq: usize,
) -> Result<(), IrcError> {
    let nc = 3 * molsys.natom();
    if b.shape() != (nq, nc) {
        return Err(IrcError::Config(format!(
            "{:?} B matrix for {nq} coordinates and {} atoms",
            b.shape(),
            molsys.natom()
        )));
    }
    if let Some(h) = hq
        && h.shape() != (nq, nq)
    {
        return Err(IrcError::Config(format!(
            "{:?} Hessian for {nq} coordinates",
            h.shape()
        )));
    }
    Ok(())
}

/// step half of `config.step_size` from `q0` along `v`, measured in the
/// metric `g`
fn half_step(
    q0: DVec,
    g: &DMat,
    v: &DVec,
    config: &Config,
) -> Result<HalfStep, IrcError> {
    let gv = g * v;
    let norm = v.dot(&gv);
    if !(norm > 0.0) {
        return Err(IrcError::alg(
            format!("step direction has non-positive norm {norm:e} in G"),
            Vec::new(),
        ));
    }
    let n = 1.0 / norm.sqrt();
    let pivot = &q0 - 0.5 * config.step_size * n * gv;
    let guess = &q0 + 2.0 * (&pivot - &q0);
    let dq_norm = (&guess - &q0).norm();
    debug!("pivot point:{:.8}", pivot.transpose());
    debug!("guess point:{:.8}", guess.transpose());
    debug!("dq to guess point: {dq_norm:.8}");
    Ok(HalfStep {
        q0,
        pivot,
        guess,
        dq_norm,
    })
}

/// take the first half step away from a transition state along the
/// eigenvector of `hq` with the lowest eigenvalue, in the direction given by
/// `config.direction`
pub fn hessian_half_step(
    molsys: &MolSys,
    hq: &DMat,
    b: &DMat,
    config: &Config,
) -> Result<HalfStep, IrcError> {
    let q0 = molsys.q_values()?;
    check_shapes(molsys, Some(hq), b, q0.len())?;
    let metric = Metric::new(molsys, config.redundant_eval_tol)?;
    debug!("B matrix:{b:.8}");
    debug!("G^1/2:{:.8}", metric.root);
    debug!("Hessian:{hq:.8}");

    let (vals, vecs) = symm_eigen_decomp(hq);
    debug!("Hessian eigenvalues:{:.8}", vals.transpose());
    let gk = config.direction.sign() * vecs.row(0).transpose();
    half_step(q0, &metric.g, &gk, config)
}

/// take a half step downhill along the mass-weighted gradient, for starting
/// points that are not stationary. the direction in `config` is ignored
pub fn gradient_half_step(
    molsys: &MolSys,
    gx: &DVec,
    b: &DMat,
    config: &Config,
) -> Result<HalfStep, IrcError> {
    let q0 = molsys.q_values()?;
    check_shapes(molsys, None, b, q0.len())?;
    let metric = Metric::new(molsys, config.redundant_eval_tol)?;
    let gq = metric.gradient(b, &molsys.masses(), gx)?;
    debug!("internal coordinate gradient:{:.8}", gq.transpose());
    half_step(q0, &metric.g, &gq, config)
}
