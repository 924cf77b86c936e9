//! empirical diagonal Hessian guesses and the conversion of Cartesian
//! derivatives to internal coordinates

use std::{fmt::Display, str::FromStr};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    Connectivity, DMat, DVec, Intco, IntcoError, Simple, a_matrix, b_matrix,
    b_prime,
    elements::{covalent_radius, period},
    geom::Geom,
};

/// which empirical formulas to use for the diagonal force constants. see
/// Schlegel, Theor. Chim. Acta, 66, 333 (1984), Fischer and Almlöf,
/// J. Phys. Chem., 96, 9770 (1992), and Lindh et al., Chem. Phys. Lett., 241,
/// 423 (1995)
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GuessKind {
    #[default]
    Simple,
    Schlegel,
    Fischer,
    LindhSimple,
}

impl FromStr for GuessKind {
    type Err = IntcoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "schlegel" => Ok(Self::Schlegel),
            "fischer" => Ok(Self::Fischer),
            "lindh_simple" => Ok(Self::LindhSimple),
            _ => Err(IntcoError::UnknownGuess(s.to_owned())),
        }
    }
}

impl Display for GuessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GuessKind::Simple => "simple",
            GuessKind::Schlegel => "schlegel",
            GuessKind::Fischer => "fischer",
            GuessKind::LindhSimple => "lindh_simple",
        };
        write!(f, "{s}")
    }
}

/// Schlegel's B parameter for a bond between atoms in periods `pa` and `pb`
fn schlegel_b(pa: usize, pb: usize) -> f64 {
    match (pa.min(pb), pa.max(pb)) {
        (1, 1) => -0.244,
        (1, 2) => 0.352,
        (1, _) => 0.660,
        (2, 2) => 1.085,
        (2, _) => 1.522,
        _ => 2.068,
    }
}

/// Lindh's reference bond length for two periods
fn lindh_r_ref(pa: usize, pb: usize) -> f64 {
    match (pa.min(pb), pa.max(pb)) {
        (1, 1) => 1.35,
        (1, 2) => 2.1,
        (1, _) => 2.53,
        (2, 2) => 2.87,
        _ => 3.40,
    }
}

fn lindh_alpha(pa: usize, pb: usize) -> f64 {
    match (pa, pb) {
        (1, 1) => 1.000,
        (1, _) | (_, 1) => 0.3949,
        _ => 0.2800,
    }
}

/// ρ = exp(-α (R² - r_ref²)) for atoms `a` and `b`
fn lindh_rho(geom: &Geom, z: &[usize], a: usize, b: usize) -> Result<f64, IntcoError> {
    let (pa, pb) = (period(z[a])?, period(z[b])?);
    let r = geom.dist(a, b);
    let r_ref = lindh_r_ref(pa, pb);
    Ok((-lindh_alpha(pa, pb) * (r * r - r_ref * r_ref)).exp())
}

fn rcov(z: &[usize], a: usize, b: usize) -> Result<f64, IntcoError> {
    Ok(covalent_radius(z[a])? + covalent_radius(z[b])?)
}

fn unknown(s: &Simple, kind: GuessKind) -> f64 {
    warn!("no {kind} Hessian guess for {s}, using 1.0");
    1.0
}

impl Simple {
    /// empirical diagonal force constant for `self` in atomic units
    pub fn diagonal_hessian_guess(
        &self,
        geom: &Geom,
        z: &[usize],
        conn: &Connectivity,
        kind: GuessKind,
    ) -> Result<f64, IntcoError> {
        use GuessKind as G;
        Ok(match *self {
            Simple::Stretch(a, b) => {
                let r = geom.dist(a, b);
                match kind {
                    G::Simple => 0.5,
                    G::Schlegel => {
                        let bb = schlegel_b(period(z[a])?, period(z[b])?);
                        1.734 / (r - bb).powi(3)
                    }
                    G::Fischer => {
                        0.3601 * (-1.944 * (r - rcov(z, a, b)?)).exp()
                    }
                    G::LindhSimple => 0.45 * lindh_rho(geom, z, a, b)?,
                }
            }
            Simple::InverseStretch(a, b) => {
                // d²E/d(1/R)² = R⁴ d²E/dR² at a stationary point
                let r = geom.dist(a, b);
                Simple::Stretch(a, b)
                    .diagonal_hessian_guess(geom, z, conn, kind)?
                    * r.powi(4)
            }
            Simple::HBond(..) => match kind {
                G::Simple => 0.1,
                _ => unknown(self, kind),
            },
            Simple::Bend(a, b, c) => match kind {
                G::Simple => 0.2,
                G::Schlegel => {
                    if z[a] == 1 || z[c] == 1 {
                        0.160
                    } else {
                        0.250
                    }
                }
                G::Fischer => {
                    let (rab, rcb) = (geom.dist(a, b), geom.dist(c, b));
                    let (cab, ccb) = (rcov(z, a, b)?, rcov(z, c, b)?);
                    0.089
                        + 0.11 / (cab * ccb).powf(-0.42)
                            * (-0.44 * (rab + rcb - cab - ccb)).exp()
                }
                G::LindhSimple => {
                    0.15 * lindh_rho(geom, z, a, b)? * lindh_rho(geom, z, b, c)?
                }
            },
            Simple::Torsion(a, b, c, d) => match kind {
                G::Simple => 0.1,
                G::Schlegel => {
                    let r = geom.dist(b, c);
                    let cov = rcov(z, b, c)?;
                    let (aa, bb) = (0.0023, 0.07);
                    if r > cov + aa / bb {
                        aa
                    } else {
                        aa - bb * (r - cov)
                    }
                }
                G::Fischer => {
                    let r = geom.dist(b, c);
                    let cov = rcov(z, b, c)?;
                    let bonds = |i: usize| conn.row(i).iter().filter(|&&x| x).count();
                    let l = (bonds(b) + bonds(c)).saturating_sub(2) as f64;
                    0.0015
                        + 14.0 * l.powf(0.57) / (r * cov).powi(4)
                            * (-2.85 * (r - cov)).exp()
                }
                G::LindhSimple => {
                    0.005
                        * lindh_rho(geom, z, a, b)?
                        * lindh_rho(geom, z, b, c)?
                        * lindh_rho(geom, z, c, d)?
                }
            },
            Simple::Out(..) => match kind {
                G::Simple => 0.1,
                _ => unknown(self, kind),
            },
        })
    }
}

/// diagonal guess Hessian for all of `intcos`
pub fn guess(
    intcos: &[Intco],
    geom: &Geom,
    z: &[usize],
    conn: &Connectivity,
    kind: GuessKind,
) -> Result<DMat, IntcoError> {
    if z.len() != geom.len() {
        return Err(IntcoError::Dimension(format!(
            "{} atomic numbers for {} atoms",
            z.len(),
            geom.len()
        )));
    }
    let diag = intcos
        .iter()
        .map(|ic| ic.simple.diagonal_hessian_guess(geom, z, conn, kind))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("{kind} guess Hessian diagonal: {diag:.4?}");
    Ok(DMat::from_diagonal(&DVec::from(diag)))
}

/// convert the Cartesian gradient `gx` to internal coordinates, gq = Aᵀ gx
pub fn gradient_to_internals(b: &DMat, gx: &DVec, tol: f64) -> DVec {
    a_matrix(b, tol).transpose() * gx
}

/// convert the Cartesian Hessian `hx` to internal coordinates including the
/// gradient term, Hq = Aᵀ (Hx - Σᵢ gqᵢ B′ᵢ) A
pub fn to_internals(
    hx: &DMat,
    gx: &DVec,
    intcos: &[Intco],
    geom: &Geom,
    tol: f64,
) -> Result<DMat, IntcoError> {
    let nc = 3 * geom.len();
    if hx.shape() != (nc, nc) || gx.len() != nc {
        return Err(IntcoError::Dimension(format!(
            "Cartesian derivatives of size {} and {:?} for {} atoms",
            gx.len(),
            hx.shape(),
            geom.len()
        )));
    }
    let b = b_matrix(intcos, geom)?;
    let a = a_matrix(&b, tol);
    let gq = a.transpose() * gx;
    let bp = b_prime(intcos, geom)?;
    let mut h = hx.clone();
    for (i, g) in gq.iter().enumerate() {
        for j in 0..nc {
            for k in 0..nc {
                h[(j, k)] -= g * bp[(i, j, k)];
            }
        }
    }
    Ok(a.transpose() * h * a)
}
