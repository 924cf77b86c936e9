//! Configuration settings for following an IRC

use std::{
    fmt::{Debug, Display},
    path::Path,
};

use intco::hessian::GuessKind;
use serde::{Deserialize, Serialize};

use crate::IrcError;

#[cfg(test)]
mod tests;

/// which way to leave the transition state along the lowest Hessian
/// eigenvector
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// 1.0 for forward and -1.0 for backward
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    /// The total length of one IRC step in mass-weighted internal
    /// coordinates. The pivot point lies half of this distance from the
    /// starting point.
    step_size: Option<f64>,

    /// The direction to follow from the transition state, either "forward"
    /// or "backward".
    direction: Option<Direction>,

    /// The number of points to compute along the path before stopping.
    max_steps: Option<usize>,

    /// The empirical formulas for guessing a diagonal Hessian when none is
    /// given. One of "simple", "schlegel", "fischer", or "lindh_simple".
    hessian_guess: Option<GuessKind>,

    /// Eigenvalues of G smaller than this are treated as zero when forming
    /// its generalized inverse and roots.
    redundant_eval_tol: Option<f64>,

    /// Bends larger than this angle in degrees are considered linear.
    linear_bend_threshold: Option<f64>,

    /// The initial scale factor on the sum of covalent radii used to connect
    /// separate fragments.
    interfrag_connect: Option<f64>,

    /// The amount to grow `interfrag_connect` by when a pass fails to join
    /// every fragment.
    interfrag_connect_step: Option<f64>,

    /// The scale factor on the sum of covalent radii for bonds within a
    /// fragment.
    covalent_connect: Option<f64>,

    /// The decrement in λ per iteration of the coarse search for a sign
    /// change in the secular equation.
    lagrangian_coarse_step: Option<f64>,

    /// The maximum number of coarse search iterations.
    lagrangian_coarse_max_iter: Option<usize>,

    /// The number of refinement iterations after which only bisection is
    /// used.
    lagrangian_bisect_after: Option<usize>,

    /// The maximum number of refinement iterations before giving up.
    lagrangian_max_iter: Option<usize>,

    /// The secular equation is solved once |F(λ)| is below this.
    lagrangian_tol: Option<f64>,

    /// The maximum number of iterations in the back-transformation to
    /// Cartesian coordinates.
    bt_max_iter: Option<usize>,

    /// The back-transformation stops once the RMS Cartesian change drops
    /// below this.
    bt_dx_conv: Option<f64>,
}

/// Construct a full `Config` using [Config::load] on a TOML file or use
/// [Config::default] and the Builder pattern
#[derive(Clone, Deserialize, PartialEq, Debug)]
#[serde(from = "RawConfig")]
pub struct Config {
    /// full step length s in bohr amu^1/2
    pub step_size: f64,

    pub direction: Direction,

    pub max_steps: usize,

    pub hessian_guess: GuessKind,

    pub redundant_eval_tol: f64,

    /// threshold for linear bends in radians
    pub linear_bend_threshold: f64,

    pub interfrag_connect: f64,

    pub interfrag_connect_step: f64,

    pub covalent_connect: f64,

    pub lagrangian_coarse_step: f64,

    pub lagrangian_coarse_max_iter: usize,

    pub lagrangian_bisect_after: usize,

    pub lagrangian_max_iter: usize,

    pub lagrangian_tol: f64,

    pub bt_max_iter: usize,

    pub bt_dx_conv: f64,
}

impl Default for Config {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

impl From<RawConfig> for Config {
    fn from(rc: RawConfig) -> Self {
        Self {
            step_size: rc.step_size.unwrap_or(0.2),
            direction: rc.direction.unwrap_or_default(),
            max_steps: rc.max_steps.unwrap_or(20),
            hessian_guess: rc.hessian_guess.unwrap_or_default(),
            redundant_eval_tol: rc.redundant_eval_tol.unwrap_or(1e-10),
            linear_bend_threshold: rc
                .linear_bend_threshold
                .unwrap_or(175.0)
                .to_radians(),
            interfrag_connect: rc.interfrag_connect.unwrap_or(1.3),
            interfrag_connect_step: rc.interfrag_connect_step.unwrap_or(0.4),
            covalent_connect: rc.covalent_connect.unwrap_or(1.3),
            lagrangian_coarse_step: rc.lagrangian_coarse_step.unwrap_or(1.0),
            lagrangian_coarse_max_iter: rc
                .lagrangian_coarse_max_iter
                .unwrap_or(1000),
            lagrangian_bisect_after: rc.lagrangian_bisect_after.unwrap_or(50),
            lagrangian_max_iter: rc.lagrangian_max_iter.unwrap_or(200),
            lagrangian_tol: rc.lagrangian_tol.unwrap_or(1e-12),
            bt_max_iter: rc.bt_max_iter.unwrap_or(25),
            bt_dx_conv: rc.bt_dx_conv.unwrap_or(1e-7),
        }
    }
}

macro_rules! builders {
    ($($name: ident: $t: ty),* $(,)?) => {
        $(pub fn $name(mut self, v: $t) -> Self {
            self.$name = v;
            self
        })*
    }
}

impl Config {
    builders!(
        step_size: f64,
        direction: Direction,
        max_steps: usize,
        hessian_guess: GuessKind,
        redundant_eval_tol: f64,
        interfrag_connect: f64,
        interfrag_connect_step: f64,
        covalent_connect: f64,
        lagrangian_coarse_step: f64,
        lagrangian_coarse_max_iter: usize,
        lagrangian_bisect_after: usize,
        lagrangian_max_iter: usize,
        lagrangian_tol: f64,
        bt_max_iter: usize,
        bt_dx_conv: f64,
    );

    /// set the linear bend threshold in degrees
    pub fn linear_bend_threshold(mut self, deg: f64) -> Self {
        self.linear_bend_threshold = deg.to_radians();
        self
    }

    /// load a [Config] from the TOML file specified by `filename`
    pub fn load<P>(filename: P) -> Result<Self, IrcError>
    where
        P: AsRef<Path> + Debug,
    {
        let contents = std::fs::read_to_string(&filename).map_err(|e| {
            IrcError::Config(format!("failed to read {filename:?} with {e}"))
        })?;
        let ret: Self = toml::from_str(&contents).map_err(|e| {
            IrcError::Config(format!(
                "failed to deserialize config file {filename:?} with {e}"
            ))
        })?;
        ret.validate()?;
        Ok(ret)
    }

    /// check that the settings in `self` make any sense
    pub fn validate(&self) -> Result<(), IrcError> {
        let err = |s: String| Err(IrcError::Config(s));
        if !(self.step_size > 0.0) {
            return err(format!(
                "step_size must be positive, got {}",
                self.step_size
            ));
        }
        if !(self.lagrangian_coarse_step > 0.0) {
            return err(format!(
                "lagrangian_coarse_step must be positive, got {}",
                self.lagrangian_coarse_step
            ));
        }
        if self.lagrangian_bisect_after >= self.lagrangian_max_iter {
            return err(format!(
                "lagrangian_bisect_after ({}) must be less than \
                 lagrangian_max_iter ({})",
                self.lagrangian_bisect_after, self.lagrangian_max_iter
            ));
        }
        if self.redundant_eval_tol < 0.0 || self.lagrangian_tol < 0.0 {
            return err("tolerances must not be negative".to_owned());
        }
        if !(self.interfrag_connect_step > 0.0) {
            return err(format!(
                "interfrag_connect_step must be positive, got {}",
                self.interfrag_connect_step
            ));
        }
        Ok(())
    }

    pub fn displace_options(&self) -> intco::displace::DisplaceOptions {
        intco::displace::DisplaceOptions {
            max_iter: self.bt_max_iter,
            dx_conv: self.bt_dx_conv,
            tol: self.redundant_eval_tol,
        }
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Config {
            step_size,
            direction,
            max_steps,
            hessian_guess,
            redundant_eval_tol,
            linear_bend_threshold,
            interfrag_connect,
            interfrag_connect_step,
            covalent_connect,
            lagrangian_coarse_step,
            lagrangian_coarse_max_iter,
            lagrangian_bisect_after,
            lagrangian_max_iter,
            lagrangian_tol,
            bt_max_iter,
            bt_dx_conv,
        } = self;
        write!(
            f,
            "
Configuration Options:
step_size = {step_size}
direction = {direction}
max_steps = {max_steps}
hessian_guess = {hessian_guess}
redundant_eval_tol = {redundant_eval_tol:e}
linear_bend_threshold = {:.1}
interfrag_connect = {interfrag_connect}
interfrag_connect_step = {interfrag_connect_step}
covalent_connect = {covalent_connect}
lagrangian_coarse_step = {lagrangian_coarse_step}
lagrangian_coarse_max_iter = {lagrangian_coarse_max_iter}
lagrangian_bisect_after = {lagrangian_bisect_after}
lagrangian_max_iter = {lagrangian_max_iter}
lagrangian_tol = {lagrangian_tol:e}
bt_max_iter = {bt_max_iter}
bt_dx_conv = {bt_dx_conv:e}
",
            linear_bend_threshold.to_degrees(),
        )
    }
}
