//! the corrector half of the IRC step, which moves from the guess point to
//! the point on the hypersphere about the pivot that minimizes the quadratic
//! model of the energy

use intco::{
    DMat, DVec,
    connect::linear_bend_check,
    displace::displace,
    linalg::symm_eigen_decomp,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    IrcError, config::Config, lagrangian::Secular, molsys::MolSys,
    predictor::Metric,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectorStep {
    /// the Lagrange multiplier, below the lowest eigenvalue of the
    /// mass-weighted Hessian
    pub lambda: f64,

    /// the step in internal coordinates
    pub dq: DVec,

    /// the mass-weighted internal gradient at the guess point
    pub gq: DVec,

    /// the energy change predicted by the quadratic model
    pub de_projected: f64,
}

/// the energy change along `dq` predicted by the gradient `gq` and Hessian
/// `hq`
pub fn de_projected(dq: &DVec, gq: &DVec, hq: &DMat) -> f64 {
    let len = dq.norm();
    if len == 0.0 {
        return 0.0;
    }
    let u = dq / len;
    let grad = gq.dot(&u);
    let curv = u.dot(&(hq * &u));
    len * grad + 0.5 * len * len * curv
}

/// eigenpairs of `hm` in the range of the orthogonal projector `p`. `hm` is
/// assumed to vanish outside of that range, so its complement is shifted
/// above the spectrum of `hm` to keep zero eigenvalues in the range from
/// mixing with it. the eigenvectors are then either in the range, with
/// |pv| = 1, or out of it, with |pv| = 0, and 0.5 splits the two
fn range_modes(hm: &DMat, p: &DMat) -> Vec<(f64, DVec)> {
    let n = hm.nrows();
    let shift = 1.0 + 2.0 * hm.norm();
    let shifted = hm + shift * (DMat::identity(n, n) - p);
    let (vals, vecs) = symm_eigen_decomp(&shifted);
    (0..n)
        .map(|i| (vals[i], vecs.row(i).transpose()))
        .filter(|(_, v)| (p * v).norm() > 0.5)
        .collect()
}

/// compute the corrector step without touching the geometry. `gx`, `hq`,
/// and `b` are evaluated at the guess point, where `molsys` must currently
/// be
pub fn corrector_step(
    molsys: &MolSys,
    gx: &DVec,
    hq: &DMat,
    b: &DMat,
    config: &Config,
    guess: &DVec,
    pivot: &DVec,
) -> Result<CorrectorStep, IrcError> {
    let nq = guess.len();
    if pivot.len() != nq || hq.shape() != (nq, nq) || b.nrows() != nq {
        return Err(IrcError::Config(format!(
            "pivot of length {}, {:?} Hessian, and {:?} B matrix for {nq} \
             coordinates",
            pivot.len(),
            hq.shape(),
            b.shape()
        )));
    }
    let metric = Metric::new(molsys, config.redundant_eval_tol)?;
    if metric.g.nrows() != nq {
        return Err(IrcError::Config(format!(
            "guess point of length {nq} for {} coordinates",
            metric.g.nrows()
        )));
    }
    let gq = metric.gradient(b, &molsys.masses(), gx)?;
    let gm = &metric.root * &gq;
    let hm = &metric.root * hq * &metric.root;
    let pm = &metric.inv_root * (guess - pivot);
    debug!("mass-weighted gradient:{:.8}", gm.transpose());
    debug!("mass-weighted Hessian:{hm:.8}");
    debug!("mass-weighted step from pivot:{:.8}", pm.transpose());

    // modes of Hm in the null space of G belong to the redundancies and take
    // no part in the step
    let projector = &metric.root * &metric.inv_root;
    let modes = range_modes(&hm, &projector);
    if modes.is_empty() {
        return Err(IrcError::opt("no coordinates left after projection"));
    }
    let bk = DVec::from_iterator(modes.len(), modes.iter().map(|m| m.0));
    let pk =
        DVec::from_iterator(modes.len(), modes.iter().map(|m| m.1.dot(&pm)));
    let gk =
        DVec::from_iterator(modes.len(), modes.iter().map(|m| m.1.dot(&gm)));
    let c = bk.component_mul(&pk) - &gk;
    debug!("Hm eigenvalues:{:.8}", bk.transpose());

    let radius = 0.5 * config.step_size;
    let lambda = Secular::new(bk.clone(), c, radius)?.solve(config)?;
    info!("Lagrangian multiplier λ = {lambda:.10}");

    // δq_M = -(Hm - λI)⁺ (gm - λ pm), expanded in the eigenvectors
    let mut dqm = DVec::zeros(nq);
    let mut sphere = 0.0;
    for (k, (_, v)) in modes.iter().enumerate() {
        let d = -(gk[k] - lambda * pk[k]) / (bk[k] - lambda);
        sphere += (pk[k] + d).powi(2);
        dqm += d * v;
    }
    debug!(
        "distance from pivot: {:.10}, target: {radius:.10}",
        sphere.sqrt()
    );
    let dq = &metric.root * dqm;
    let de = de_projected(&dq, &gq, hq);
    Ok(CorrectorStep {
        lambda,
        dq,
        gq,
        de_projected: de,
    })
}

/// compute the corrector step and apply it to the geometry of `molsys`,
/// returning the step in internal coordinates. bends that become linear in
/// the new geometry are reported as a recoverable [IrcError::Alg] after the
/// geometry has been updated
#[allow(clippy::too_many_arguments)]
pub fn dq_irc(
    molsys: &mut MolSys,
    gx: &DVec,
    energy: f64,
    hq: &DMat,
    b: &DMat,
    config: &Config,
    guess: &DVec,
    pivot: &DVec,
) -> Result<DVec, IrcError> {
    let step = corrector_step(molsys, gx, hq, b, config, guess, pivot)?;
    info!(
        "energy at guess point: {energy:.10}, projected change: {:.10}",
        step.de_projected
    );

    let intcos = molsys.intcos();
    let mut geom = molsys.geom();
    let fq = -&step.gq;
    let report = displace(
        &intcos,
        &mut geom,
        &step.dq,
        Some(&fq),
        &config.displace_options(),
    )?;
    debug!(
        "back-transformation took {} iterations, achieved |dq| = {:.10}",
        report.iterations, report.dq_achieved
    );
    molsys.set_geom(&geom)?;

    let linear =
        linear_bend_check(&intcos, &geom, config.linear_bend_threshold)?;
    if !linear.is_empty() {
        return Err(IrcError::alg(
            "bends became linear during the IRC step",
            linear,
        ));
    }
    Ok(step.dq)
}
