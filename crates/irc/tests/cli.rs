use std::path::Path;

use approx::assert_abs_diff_eq;
use assert_cmd::Command;
use insta::{assert_snapshot, with_settings};
use irc::predictor::HalfStep;
use tempfile::tempdir;

fn run(args: &[&str]) -> std::io::Result<String> {
    let dir = tempdir()?;
    std::fs::copy(
        Path::new("testfiles/water.toml"),
        dir.path().join("irc.toml"),
    )?;
    let mut cmd = Command::cargo_bin("irc").unwrap();
    let assert = cmd.args(args).current_dir(&dir).assert();
    let output = assert.get_output();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr),
    );
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[test]
fn table() -> std::io::Result<()> {
    let got = run(&[])?;
    with_settings!({
        filters => vec![(r"-?\d+\.\d+", "[f]")],
    }, {
        assert_snapshot!(got, @r"
        No.   Coordinate                  q0         Pivot         Guess
        1     r(1-2)              [f]    [f]    [f]
        2     r(1-3)              [f]    [f]    [f]
        3     ∠(2-1-3)            [f]    [f]    [f]

        |dq| to guess point = [f]
        normal termination of irc
        ");
    });
    Ok(())
}

#[test]
fn json() -> std::io::Result<()> {
    let fwd: HalfStep = serde_json::from_str(&run(&["--json"])?)?;
    let bwd: HalfStep =
        serde_json::from_str(&run(&["irc.toml", "--json", "--backward"])?)?;
    assert_eq!(fwd.q0, bwd.q0);
    assert_abs_diff_eq!(
        &fwd.pivot - &fwd.q0,
        &bwd.q0 - &bwd.pivot,
        epsilon = 1e-10
    );
    assert_abs_diff_eq!(fwd.dq_norm, bwd.dq_norm, epsilon = 1e-10);
    // the bend has the negative curvature, so it moves the most
    let dq = &fwd.guess - &fwd.q0;
    assert!(dq[2].abs() > dq[0].abs());
    Ok(())
}

#[test]
fn missing_input() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("irc")
        .unwrap()
        .arg("nothing.toml")
        .current_dir(&dir)
        .assert()
        .failure();
}
