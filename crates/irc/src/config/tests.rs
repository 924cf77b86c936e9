use test_case::test_case;

use super::*;

#[test]
fn load() {
    let got = Config::load("testfiles/irc.toml").unwrap();
    let want = Config {
        step_size: 0.3,
        direction: Direction::Backward,
        max_steps: 8,
        hessian_guess: GuessKind::Fischer,
        redundant_eval_tol: 1e-10,
        linear_bend_threshold: 170f64.to_radians(),
        interfrag_connect: 1.3,
        interfrag_connect_step: 0.4,
        covalent_connect: 1.3,
        lagrangian_coarse_step: 1.0,
        lagrangian_coarse_max_iter: 1000,
        lagrangian_bisect_after: 50,
        lagrangian_max_iter: 200,
        lagrangian_tol: 1e-10,
        bt_max_iter: 50,
        bt_dx_conv: 1e-7,
    };
    assert_eq!(got, want);
}

#[test]
fn builder() {
    let got = Config::default()
        .step_size(0.3)
        .direction(Direction::Backward)
        .max_steps(8)
        .hessian_guess(GuessKind::Fischer)
        .linear_bend_threshold(170.0)
        .lagrangian_tol(1e-10)
        .bt_max_iter(50);
    assert_eq!(got, Config::load("testfiles/irc.toml").unwrap());
}

#[test]
fn defaults() {
    let got: Config = toml::from_str("").unwrap();
    assert_eq!(got, Config::default());
    assert_eq!(got.step_size, 0.2);
    assert_eq!(got.direction, Direction::Forward);
    assert_eq!(got.hessian_guess, GuessKind::Simple);
    assert_eq!(got.lagrangian_max_iter, 200);
    assert!(got.validate().is_ok());
}

#[test_case("testfiles/unknown.toml" ; "unknown field")]
#[test_case("testfiles/bad_guess.toml" ; "unknown guess")]
#[test_case("testfiles/bad_caps.toml" ; "bisect after max")]
#[test_case("testfiles/missing.toml" ; "missing file")]
fn bad(path: &str) {
    let got = Config::load(path);
    assert!(matches!(got, Err(IrcError::Config(_))), "{got:?}");
}

#[test]
fn negative_step() {
    let got = Config::default().step_size(-0.1).validate();
    assert!(matches!(got, Err(IrcError::Config(_))));
}

#[test]
fn display() {
    insta::assert_snapshot!(Config::default().to_string().trim(), @r"
    Configuration Options:
    step_size = 0.2
    direction = forward
    max_steps = 20
    hessian_guess = simple
    redundant_eval_tol = 1e-10
    linear_bend_threshold = 175.0
    interfrag_connect = 1.3
    interfrag_connect_step = 0.4
    covalent_connect = 1.3
    lagrangian_coarse_step = 1
    lagrangian_coarse_max_iter = 1000
    lagrangian_bisect_after = 50
    lagrangian_max_iter = 200
    lagrangian_tol = 1e-12
    bt_max_iter = 25
    bt_dx_conv = 1e-7
    ");
}
