use approx::assert_abs_diff_eq;
use intco::{DMat, DVec, Simple, geom::Geom};

use crate::{
    IrcError,
    config::{Config, Direction},
    corrector::{corrector_step, de_projected, dq_irc},
    molsys::{Fragment, MolSys},
    predictor::{gradient_half_step, hessian_half_step},
};

const R: f64 = 1.8;

/// 1/m_O + 1/m_H, the diagonal of G for the two stretches
const A: f64 = 1.0 / 16.0 + 1.0;

/// an oxygen with hydrogens along x and y, described by the two O-H
/// stretches. the stretches are orthogonal, so G = diag(A, A) and stays that
/// way while the hydrogens move along their bonds
fn toy(r1: f64) -> MolSys {
    let geom =
        Geom::from(vec![[0.0, 0.0, 0.0], [r1, 0.0, 0.0], [0.0, R, 0.0]]);
    let frag = Fragment::new(vec![8, 1, 1], geom, vec![16.0, 1.0, 1.0])
        .unwrap()
        .with_intcos(vec![
            Simple::stretch(0, 1).into(),
            Simple::stretch(0, 2).into(),
        ])
        .unwrap();
    MolSys::new(vec![frag])
}

fn hessian() -> DMat {
    DMat::from_diagonal(&DVec::from(vec![-0.02, 0.30]))
}

fn config() -> Config {
    Config::default().step_size(0.3)
}

#[test]
fn predictor() {
    let mol = toy(R);
    let b = mol.b_matrix().unwrap();
    let got = hessian_half_step(&mol, &hessian(), &b, &config()).unwrap();
    let s = A.sqrt();
    assert_abs_diff_eq!(got.q0, DVec::from(vec![R, R]), epsilon = 1e-12);
    assert_abs_diff_eq!(
        got.pivot,
        DVec::from(vec![R - 0.15 * s, R]),
        epsilon = 1e-8
    );
    assert_abs_diff_eq!(
        got.guess,
        DVec::from(vec![R - 0.3 * s, R]),
        epsilon = 1e-8
    );
    assert_abs_diff_eq!(got.dq_norm, 0.3 * s, epsilon = 1e-8);
}

#[test]
fn backward_mirrors_forward() {
    // a coupled Hessian so that the lowest eigenvector is not a unit vector
    let mut mol = toy(R);
    mol.fragments_mut()[0] = mol.fragments()[0]
        .clone()
        .with_intcos(vec![
            Simple::stretch(0, 1).into(),
            Simple::stretch(0, 2).into(),
            Simple::bend(1, 0, 2).into(),
        ])
        .unwrap();
    let hq = DMat::from_row_slice(
        3,
        3,
        &[0.4, 0.05, -0.1, 0.05, 0.45, 0.02, -0.1, 0.02, -0.03],
    );
    let b = mol.b_matrix().unwrap();
    let fwd = hessian_half_step(&mol, &hq, &b, &config()).unwrap();
    let bwd = hessian_half_step(
        &mol,
        &hq,
        &b,
        &config().direction(Direction::Backward),
    )
    .unwrap();
    assert_abs_diff_eq!(
        &fwd.pivot - &fwd.q0,
        &bwd.q0 - &bwd.pivot,
        epsilon = 1e-12
    );
    assert_abs_diff_eq!(fwd.dq_norm, bwd.dq_norm, epsilon = 1e-12);
}

#[test]
fn gradient_step() {
    let mol = toy(R);
    let b = mol.b_matrix().unwrap();
    let gq = DVec::from(vec![0.03, 0.04]);
    let gx = b.transpose() * &gq;
    let got = gradient_half_step(&mol, &gx, &b, &config()).unwrap();
    // G is a multiple of the identity, so the step runs straight down gq
    let dir = -gq.normalize();
    assert_abs_diff_eq!(
        got.pivot,
        &got.q0 + 0.15 * A.sqrt() * &dir,
        epsilon = 1e-10
    );
    // the direction setting has no effect on gradient steps
    let bwd = gradient_half_step(
        &mol,
        &gx,
        &b,
        &config().direction(Direction::Backward),
    )
    .unwrap();
    assert_eq!(got, bwd);
}

/// the molecule at the guess point of [predictor] with the gradient
/// gq = (0.006√A, 0.01)
fn at_guess() -> (MolSys, DVec, DMat, DVec, DVec, DVec) {
    let s = A.sqrt();
    let mol = toy(R - 0.3 * s);
    let b = mol.b_matrix().unwrap();
    let gq = DVec::from(vec![0.006 * s, 0.01]);
    let gx = b.transpose() * &gq;
    let pivot = DVec::from(vec![R - 0.15 * s, R]);
    let guess = DVec::from(vec![R - 0.3 * s, R]);
    (mol, gx, b, gq, pivot, guess)
}

#[test]
fn corrector() {
    let (mol, gx, b, gq, pivot, guess) = at_guess();
    let got =
        corrector_step(&mol, &gx, &hessian(), &b, &config(), &guess, &pivot)
            .unwrap();
    assert_abs_diff_eq!(got.gq, gq, epsilon = 1e-10);
    assert!(got.lambda < -0.02);
    assert_abs_diff_eq!(got.lambda, -0.0428943408834, epsilon = 1e-8);
    // the new point lies half a step from the pivot in mass-weighted
    // coordinates
    let pm = (&guess - &pivot + &got.dq) / A.sqrt();
    assert_abs_diff_eq!(pm.norm(), 0.15, epsilon = 1e-10);
    assert_abs_diff_eq!(
        got.dq,
        DVec::from(vec![0.0028169761389, -0.0293796938009]),
        epsilon = 1e-8
    );
    assert_abs_diff_eq!(
        got.de_projected,
        de_projected(&got.dq, &gq, &hessian())
    );
}

#[test]
fn corrector_moves_geometry() {
    let (mut mol, gx, b, _, pivot, guess) = at_guess();
    let dq =
        dq_irc(&mut mol, &gx, -76.0, &hessian(), &b, &config(), &guess, &pivot)
            .unwrap();
    let q = mol.q_values().unwrap();
    assert_abs_diff_eq!(q - &guess, dq, epsilon = 1e-7);
}

#[test]
fn corrector_no_root() {
    // no gradient and no step from the pivot leaves F(λ) = -(s/2)²
    let (mut mol, _, b, _, _, guess) = at_guess();
    let before = mol.geom();
    let got = dq_irc(
        &mut mol,
        &DVec::zeros(9),
        -76.0,
        &hessian(),
        &b,
        &config(),
        &guess,
        &guess,
    );
    let e = got.unwrap_err();
    assert!(e.is_convergence());
    assert!(e.is_recoverable());
    assert_eq!(mol.geom(), before);
}

#[test]
fn linear_bend() {
    let mut mol = toy(R);
    mol.fragments_mut()[0] = mol.fragments()[0]
        .clone()
        .with_intcos(vec![
            Simple::stretch(0, 1).into(),
            Simple::stretch(0, 2).into(),
            Simple::bend(1, 0, 2).into(),
        ])
        .unwrap();
    let hq = DMat::from_diagonal(&DVec::from(vec![0.3, 0.3, -0.02]));
    // anything above 80 degrees counts as linear, including the right angle
    let config = config().linear_bend_threshold(80.0);
    let b = mol.b_matrix().unwrap();
    let half = hessian_half_step(&mol, &hq, &b, &config).unwrap();
    let before = mol.geom();
    let got = dq_irc(
        &mut mol,
        &DVec::zeros(9),
        -76.0,
        &hq,
        &b,
        &config,
        &half.guess,
        &half.pivot,
    );
    assert_eq!(
        got,
        Err(IrcError::Alg {
            msg: "bends became linear during the IRC step".to_owned(),
            linear_bends: vec![Simple::bend(1, 0, 2)],
        })
    );
    assert_ne!(mol.geom(), before);
}

#[test]
fn config_shapes() {
    let mol = toy(R);
    let b = mol.b_matrix().unwrap();
    let got = hessian_half_step(&mol, &DMat::zeros(3, 3), &b, &config());
    assert!(matches!(got, Err(IrcError::Config(_))));
    let got = hessian_half_step(&mol, &hessian(), &DMat::zeros(2, 6), &config());
    assert!(matches!(got, Err(IrcError::Config(_))));
}
