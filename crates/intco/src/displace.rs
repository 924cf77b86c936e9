//! back-transformation of internal coordinate steps to Cartesian geometries

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    DVec, Intco, IntcoError, a_matrix, b_matrix, geom::Geom, linalg::rms,
    q_diff, values,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaceOptions {
    /// maximum number of Newton-Raphson iterations
    pub max_iter: usize,

    /// stop once the RMS Cartesian change drops below this
    pub dx_conv: f64,

    /// eigenvalue cutoff for the generalized inverse of BBᵀ
    pub tol: f64,
}

impl Default for DisplaceOptions {
    fn default() -> Self {
        Self {
            max_iter: 25,
            dx_conv: 1e-7,
            tol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaceReport {
    pub iterations: usize,
    pub converged: bool,

    /// norm of the step actually taken in internal coordinates
    pub dq_achieved: f64,

    /// RMS deviation of the final coordinates from their targets
    pub rms_error: f64,
}

/// displace `geom` so that `intcos` change by `dq`. frozen coordinates have
/// their components of `dq` zeroed first. `fq`, when given, holds the forces
/// along `intcos` and is only reported. if the iterations do not converge,
/// the geometry closest to the target is kept
pub fn displace(
    intcos: &[Intco],
    geom: &mut Geom,
    dq: &DVec,
    fq: Option<&DVec>,
    opts: &DisplaceOptions,
) -> Result<DisplaceReport, IntcoError> {
    if dq.len() != intcos.len() {
        return Err(IntcoError::Dimension(format!(
            "step of length {} for {} coordinates",
            dq.len(),
            intcos.len()
        )));
    }
    if let Some(f) = fq
        && f.len() != intcos.len()
    {
        return Err(IntcoError::Dimension(format!(
            "{} forces for {} coordinates",
            f.len(),
            intcos.len()
        )));
    }
    let mut dq = dq.clone();
    for (i, ic) in intcos.iter().enumerate() {
        if ic.frozen {
            dq[i] = 0.0;
        }
    }

    let q0 = values(intcos, geom)?;
    let target = &q0 + &dq;

    let mut x: DVec = geom.clone().into();
    let mut best = (f64::INFINITY, x.clone());
    let mut converged = false;
    let mut iterations = 0;
    while iterations < opts.max_iter {
        iterations += 1;
        let g = Geom::from(&x);
        let q = values(intcos, &g)?;
        let err = q_diff(intcos, &target, &q);
        let e = rms(&err);
        if e < best.0 {
            best = (e, x.clone());
        }
        let b = b_matrix(intcos, &g)?;
        let dx = a_matrix(&b, opts.tol) * err;
        x += &dx;
        let dx_rms = rms(&dx);
        debug!("back-transformation iter {iterations:3}: rms(dx) = {dx_rms:.3e}, rms(dq) = {e:.3e}");
        if dx_rms < opts.dx_conv {
            converged = true;
            break;
        }
    }

    let g = Geom::from(&x);
    let q = values(intcos, &g)?;
    let err = rms(&q_diff(intcos, &target, &q));
    if converged || err <= best.0 {
        *geom = g;
    } else {
        warn!(
            "back-transformation did not converge in {} iterations, \
             using best geometry with rms(dq) = {:.3e}",
            opts.max_iter, best.0
        );
        *geom = Geom::from(&best.1);
    }

    let q = values(intcos, geom)?;
    let achieved = q_diff(intcos, &q, &q0);
    let rms_error = rms(&q_diff(intcos, &target, &q));

    info!("{:>20}{:>14}{:>14}{:>14}", "Coordinate", "Force", "Target dq", "Achieved dq");
    for (i, ic) in intcos.iter().enumerate() {
        let f = fq.map(|f| f[i]).unwrap_or(0.0);
        info!("{:>20}{f:14.6}{:14.6}{:14.6}", ic.to_string(), dq[i], achieved[i]);
    }

    Ok(DisplaceReport {
        iterations,
        converged,
        dq_achieved: achieved.norm(),
        rms_error,
    })
}
