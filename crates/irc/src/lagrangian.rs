//! the secular equation for the Lagrange multiplier of the constrained IRC
//! step

use intco::DVec;
use log::{debug, trace};

use crate::{IrcError, config::Config};

/// F(λ) = Σᵢ (cᵢ / (bᵢ - λ))² - r², where bᵢ are the eigenvalues of the
/// mass-weighted Hessian in ascending order, cᵢ = bᵢpᵢ - gᵢ are the
/// projections of the step and gradient onto the corresponding eigenvectors,
/// and r is half of the step size. Below the lowest pole F increases
/// monotonically from -r², so the root sought is the one below b₀
#[derive(Debug, Clone, PartialEq)]
pub struct Secular {
    b: DVec,
    c: DVec,
    radius: f64,
}

impl Secular {
    pub fn new(b: DVec, c: DVec, radius: f64) -> Result<Self, IrcError> {
        if b.len() != c.len() || b.is_empty() {
            return Err(IrcError::Config(format!(
                "{} eigenvalues and {} projections in the secular equation",
                b.len(),
                c.len()
            )));
        }
        Ok(Self { b, c, radius })
    }

    pub fn value(&self, lambda: f64) -> f64 {
        self.derivatives(lambda)[0]
    }

    /// F and its first three derivatives with respect to λ
    pub fn derivatives(&self, lambda: f64) -> [f64; 4] {
        let mut ret = [-self.radius * self.radius, 0.0, 0.0, 0.0];
        for (b, c) in self.b.iter().zip(self.c.iter()) {
            let d = 1.0 / (b - lambda);
            let t = c * c * d * d;
            ret[0] += t;
            ret[1] += 2.0 * t * d;
            ret[2] += 6.0 * t * d * d;
            ret[3] += 24.0 * t * d * d * d;
        }
        ret
    }

    /// find λ and λ' with F(λ) < 0 < F(λ'), both below the lowest pole
    fn bracket(&self, config: &Config) -> Result<(f64, f64), IrcError> {
        let b0 = self.b.min();
        // start between the pole and the origin side, then move toward the
        // pole until F is positive
        let mut gap = (0.5 * b0.abs()).max(f64::EPSILON.sqrt());
        let mut hi = b0 - gap;
        let mut f = self.value(hi);
        let mut iter = 0;
        while !(f > 0.0) {
            iter += 1;
            if iter > config.lagrangian_coarse_max_iter {
                return Err(IrcError::Convergence {
                    phase: "bracket",
                    iterations: iter - 1,
                });
            }
            gap *= 0.5;
            hi = b0 - gap;
            f = self.value(hi);
            if gap == 0.0 || hi >= b0 {
                return Err(IrcError::Convergence {
                    phase: "bracket",
                    iterations: iter,
                });
            }
        }
        trace!("F({hi}) = {f} above the root");

        let mut lo = hi;
        for iter in 1..=config.lagrangian_coarse_max_iter {
            lo -= config.lagrangian_coarse_step;
            let f = self.value(lo);
            trace!("coarse iter {iter}: F({lo}) = {f}");
            if f < 0.0 {
                return Ok((lo, hi));
            }
            hi = lo;
        }
        Err(IrcError::Convergence {
            phase: "coarse",
            iterations: config.lagrangian_coarse_max_iter,
        })
    }

    /// solve F(λ) = 0 for the root below the lowest pole with safeguarded
    /// third-order Householder iterations
    pub fn solve(&self, config: &Config) -> Result<f64, IrcError> {
        let (mut lo, mut hi) = self.bracket(config)?;
        debug!("bracketed Lagrangian root in [{lo}, {hi}]");

        // F is increasing and convex below the pole, so iterating from the
        // positive side converges without overshooting in exact arithmetic
        let mut x = hi;
        let mut prev: Option<(f64, f64)> = None;
        for iter in 1..=config.lagrangian_max_iter {
            let [f, d1, d2, d3] = self.derivatives(x);
            trace!("refine iter {iter}: F({x}) = {f:e}");
            if f.abs() < config.lagrangian_tol {
                debug!("found λ = {x} in {iter} iterations");
                return Ok(x);
            }
            if f < 0.0 {
                lo = x;
            } else {
                hi = x;
            }
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                // bracket is as narrow as the floating point numbers allow
                debug!("λ bracket collapsed at {x} after {iter} iterations");
                return Ok(x);
            }

            let next = if iter > config.lagrangian_bisect_after {
                mid
            } else if let Some((px, pf)) = prev
                && pf * f < 0.0
            {
                0.5 * (px + x)
            } else {
                let num = 6.0 * f * d1 * d1 - 3.0 * f * f * d2;
                let den =
                    6.0 * d1 * d1 * d1 - 6.0 * f * d1 * d2 + f * f * d3;
                x - num / den
            };
            prev = Some((x, f));
            x = if next.is_finite() && next > lo && next < hi {
                next
            } else {
                mid
            };
        }
        Err(IrcError::Convergence {
            phase: "refine",
            iterations: config.lagrangian_max_iter,
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn secular() -> Secular {
        Secular::new(
            DVec::from(vec![-0.05, 0.3, 0.8]),
            DVec::from(vec![-0.004, 0.02, -0.01]),
            0.15,
        )
        .unwrap()
    }

    #[test]
    fn derivatives() {
        let s = secular();
        let x = -0.2;
        let h = 1e-5;
        let [_, d1, d2, d3] = s.derivatives(x);
        let fd = |i: usize| {
            (s.derivatives(x + h)[i] - s.derivatives(x - h)[i]) / (2.0 * h)
        };
        assert_abs_diff_eq!(d1, fd(0), epsilon = 1e-8);
        assert_abs_diff_eq!(d2, fd(1), epsilon = 1e-7);
        assert_abs_diff_eq!(d3, fd(2), epsilon = 1e-6);
    }

    #[test]
    fn root() {
        let s = secular();
        let config = Config::default();
        let got = s.solve(&config).unwrap();
        assert!(got < -0.05);
        assert!(s.value(got).abs() < config.lagrangian_tol);
    }

    #[test]
    fn root_positive_pole() {
        // every eigenvalue positive, as near a minimum
        let s = Secular::new(
            DVec::from(vec![0.1, 0.4]),
            DVec::from(vec![0.01, 0.03]),
            0.05,
        )
        .unwrap();
        let config = Config::default();
        let got = s.solve(&config).unwrap();
        assert!(got < 0.1);
        assert!(s.value(got).abs() < config.lagrangian_tol);
    }

    #[test]
    fn far_root() {
        // the root lies many coarse steps below the pole
        let s = Secular::new(
            DVec::from(vec![-0.01, 0.2]),
            DVec::from(vec![-3.0, 0.0]),
            0.1,
        )
        .unwrap();
        let config = Config::default();
        let got = s.solve(&config).unwrap();
        assert_abs_diff_eq!(got, -30.01, epsilon = 1e-7);
    }

    #[test]
    fn bisection_only() {
        let s = secular();
        let config = Config::default().lagrangian_bisect_after(0);
        let got = s.solve(&config).unwrap();
        assert!(s.value(got).abs() < config.lagrangian_tol);
    }

    #[test]
    fn no_root() {
        // F is -r² everywhere
        let s =
            Secular::new(DVec::from(vec![-0.02, 0.3]), DVec::zeros(2), 0.15)
                .unwrap();
        let config = Config::default();
        let got = s.solve(&config);
        assert!(matches!(
            got,
            Err(IrcError::Convergence {
                phase: "bracket",
                ..
            })
        ));
    }

    #[test]
    fn coarse_cap() {
        // the root near -30000 is out of reach of 1000 unit steps
        let s = Secular::new(
            DVec::from(vec![-0.01, 0.2]),
            DVec::from(vec![-3000.0, 0.0]),
            0.1,
        )
        .unwrap();
        assert_eq!(
            s.solve(&Config::default()),
            Err(IrcError::Convergence {
                phase: "coarse",
                iterations: 1000,
            })
        );
    }

    #[test]
    fn shapes() {
        let got = Secular::new(DVec::zeros(2), DVec::zeros(3), 0.1);
        assert!(matches!(got, Err(IrcError::Config(_))));
        let got = Secular::new(DVec::zeros(0), DVec::zeros(0), 0.1);
        assert!(matches!(got, Err(IrcError::Config(_))));
    }

    #[test]
    fn refine_cap() {
        let s = secular();
        let config = Config::default()
            .lagrangian_tol(0.0)
            .lagrangian_bisect_after(1)
            .lagrangian_max_iter(3);
        assert_eq!(
            s.solve(&config),
            Err(IrcError::Convergence {
                phase: "refine",
                iterations: 3,
            })
        );
    }
}
