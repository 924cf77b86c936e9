use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{Display, Formatter},
};

pub mod connect;
pub mod displace;
pub mod elements;
pub mod geom;
pub mod hessian;
pub mod hmat;
pub mod linalg;

use geom::Geom;
use hmat::Hmat;
use nalgebra as na;

pub type Tensor3 = ndarray::Array3<f64>;

/// from <https://physics.nist.gov/cgi-bin/cuu/Value?bohrrada0>
pub const ANGBOHR: f64 = 0.529_177_210_9;

type Vec3 = na::Vector3<f64>;
pub type DMat = na::DMatrix<f64>;
pub type DVec = na::DVector<f64>;

/// symmetric bond connectivity between atoms, `true` where bonded
pub type Connectivity = na::DMatrix<bool>;

#[derive(Debug, Clone, PartialEq)]
pub enum IntcoError {
    /// the defining atoms of a coordinate coincide or are collinear where the
    /// coordinate or its derivative is undefined
    Degenerate(String),
    UnknownElement(usize),
    UnknownSymbol(String),
    UnknownGuess(String),
    Dimension(String),
}

impl Display for IntcoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for IntcoError {}

/// A simple internal coordinate. Atom indices are zero-based. Use the
/// lowercase constructors ([Simple::stretch], [Simple::bend], ...) to get the
/// canonical atom ordering, which makes two coordinates describing the same
/// geometric relationship compare equal.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Simple {
    /// bond stretch between two atoms
    Stretch(usize, usize),

    /// 1/R for the bond between two atoms
    InverseStretch(usize, usize),

    /// hydrogen bond stretch. geometrically a [Simple::Stretch], but with its
    /// own force constant guesses
    HBond(usize, usize),

    /// central atom is second like normal people would expect
    Bend(usize, usize, usize),

    /// angle between planes formed by i, j, k and j, k, l
    Torsion(usize, usize, usize, usize),

    /// bend of atom `i` out of the plane formed by atoms `j`, `k`, and `l`,
    /// with `j` the central atom
    Out(usize, usize, usize, usize),
}

impl Display for Simple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Simple::Stretch(i, j) => write!(f, "r({}-{})", i + 1, j + 1),
            Simple::InverseStretch(i, j) => {
                write!(f, "1/r({}-{})", i + 1, j + 1)
            }
            Simple::HBond(i, j) => write!(f, "h({}-{})", i + 1, j + 1),
            Simple::Bend(i, j, k) => {
                write!(f, "∠({}-{}-{})", i + 1, j + 1, k + 1)
            }
            Simple::Torsion(i, j, k, l) => {
                write!(f, "τ({}-{}-{}-{})", i + 1, j + 1, k + 1, l + 1)
            }
            Simple::Out(i, j, k, l) => {
                write!(f, "OUT({}-{}-{}-{})", i + 1, j + 1, k + 1, l + 1)
            }
        }
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

impl Simple {
    pub fn stretch(a: usize, b: usize) -> Self {
        let (a, b) = ordered(a, b);
        Self::Stretch(a, b)
    }

    pub fn inverse_stretch(a: usize, b: usize) -> Self {
        let (a, b) = ordered(a, b);
        Self::InverseStretch(a, b)
    }

    pub fn hbond(a: usize, b: usize) -> Self {
        let (a, b) = ordered(a, b);
        Self::HBond(a, b)
    }

    /// `b` is the central atom and stays in the middle
    pub fn bend(a: usize, b: usize, c: usize) -> Self {
        if a < c {
            Self::Bend(a, b, c)
        } else {
            Self::Bend(c, b, a)
        }
    }

    pub fn torsion(a: usize, b: usize, c: usize, d: usize) -> Self {
        if a < d {
            Self::Torsion(a, b, c, d)
        } else {
            Self::Torsion(d, c, b, a)
        }
    }

    /// the order of the plane atoms determines the sign of the angle, so
    /// nothing is reordered here
    pub fn out(a: usize, b: usize, c: usize, d: usize) -> Self {
        Self::Out(a, b, c, d)
    }

    pub fn atoms(&self) -> Vec<usize> {
        use Simple::*;
        match *self {
            Stretch(a, b) | InverseStretch(a, b) | HBond(a, b) => vec![a, b],
            Bend(a, b, c) => vec![a, b, c],
            Torsion(a, b, c, d) | Out(a, b, c, d) => vec![a, b, c, d],
        }
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, Simple::InverseStretch(..))
    }

    /// whether values of this coordinate live on a circle, so that
    /// differences should be wrapped into (-π, π]
    pub fn is_periodic(&self) -> bool {
        matches!(self, Simple::Torsion(..) | Simple::Out(..))
    }

    /// shift every atom index by `n`, for moving from fragment-local to
    /// global numbering
    pub fn offset(&self, n: usize) -> Self {
        use Simple::*;
        match *self {
            Stretch(a, b) => Stretch(a + n, b + n),
            InverseStretch(a, b) => InverseStretch(a + n, b + n),
            HBond(a, b) => HBond(a + n, b + n),
            Bend(a, b, c) => Bend(a + n, b + n, c + n),
            Torsion(a, b, c, d) => Torsion(a + n, b + n, c + n, d + n),
            Out(a, b, c, d) => Out(a + n, b + n, c + n, d + n),
        }
    }

    /// value in bohr or radians. torsions are in (-π, π]
    pub fn value(&self, geom: &Geom) -> Result<f64, IntcoError> {
        use Simple::*;
        match *self {
            Stretch(a, b) | HBond(a, b) => {
                geom.unit(a, b)?;
                Ok(geom.dist(a, b))
            }
            InverseStretch(a, b) => {
                geom.unit(a, b)?;
                Ok(1.0 / geom.dist(a, b))
            }
            Bend(a, b, c) => geom.angle(a, b, c),
            Torsion(a, b, c, d) => {
                let e_21 = geom.unit(b, a)?;
                let e_32 = geom.unit(c, b)?;
                let e_43 = geom.unit(d, c)?;
                let v5 = e_21.cross(&e_32);
                let v6 = e_43.cross(&e_32);
                let w2 = e_21.dot(&e_32);
                let w3 = e_43.dot(&e_32);
                let sp2 = (1.0 - w2 * w2).sqrt();
                let sp3 = (1.0 - w3 * w3).sqrt();
                if sp2 < geom::DEGENERATE_SIN || sp3 < geom::DEGENERATE_SIN {
                    return Err(IntcoError::Degenerate(format!(
                        "torsion {self} has collinear atoms"
                    )));
                }
                let w2 = e_21.dot(&v6);
                let w3 = -v5.dot(&v6);
                let w = (w2 / (sp2 * sp3)).clamp(-1.0, 1.0).asin();
                let w = if w3 < 0.0 { std::f64::consts::PI - w } else { w };
                if w > std::f64::consts::PI {
                    Ok(w - 2.0 * std::f64::consts::PI)
                } else {
                    Ok(w)
                }
            }
            Out(a, b, c, d) => {
                let e21 = geom.unit(b, a)?;
                let e23 = geom.unit(b, c)?;
                let e24 = geom.unit(b, d)?;
                let v5 = e23.cross(&e24);
                let w1 = e21.dot(&e23);
                let w2 = e21.dot(&e24);
                let phi = geom.angle(c, b, d)?;
                let sphi = phi.sin();
                if sphi < geom::DEGENERATE_SIN {
                    return Err(IntcoError::Degenerate(format!(
                        "plane atoms of {self} are collinear"
                    )));
                }
                let w = e21.dot(&v5);
                let w = (w / sphi).clamp(-1.0, 1.0).asin();
                if w1 + w2 > 0.0 {
                    Ok(std::f64::consts::PI.copysign(w) - w)
                } else {
                    Ok(w)
                }
            }
        }
    }

    /// the row of the Wilson B matrix for this coordinate, of length 3 *
    /// `geom.len()`
    pub fn derivative(&self, geom: &Geom) -> Result<DVec, IntcoError> {
        Ok(DVec::from(geom.s_vec(self)?))
    }

    /// the block of second derivatives restricted to the atoms of `self`, in
    /// the order returned by [Simple::atoms]. the result is 3k x 3k for k
    /// atoms
    pub fn second_derivative(&self, geom: &Geom) -> Result<DMat, IntcoError> {
        let h = Hmat::new(geom, self)?;
        match *self {
            Simple::InverseStretch(a, b) => {
                // q = 1/R, so q'' = 2/q q' q'ᵀ - q² R''
                let q = self.value(geom)?;
                let s = geom.s_vec(self)?;
                let dq = DVec::from_iterator(
                    6,
                    s[3 * a..3 * a + 3]
                        .iter()
                        .chain(&s[3 * b..3 * b + 3])
                        .cloned(),
                );
                Ok(2.0 / q * &dq * dq.transpose() - q * q * h.block(2))
            }
            _ => Ok(h.block(self.atoms().len())),
        }
    }
}

/// A [Simple] coordinate together with its optimization flags. Equality only
/// considers the underlying coordinate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Intco {
    pub simple: Simple,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub fixed_value: Option<f64>,
}

impl PartialEq for Intco {
    fn eq(&self, other: &Self) -> bool {
        self.simple == other.simple
    }
}

impl From<Simple> for Intco {
    fn from(simple: Simple) -> Self {
        Self::new(simple)
    }
}

impl Intco {
    pub fn new(simple: Simple) -> Self {
        Self {
            simple,
            frozen: false,
            fixed_value: None,
        }
    }

    pub fn frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn fixed_value(mut self, v: f64) -> Self {
        self.fixed_value = Some(v);
        self
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn offset(&self, n: usize) -> Self {
        Self {
            simple: self.simple.offset(n),
            ..*self
        }
    }

    pub fn value(&self, geom: &Geom) -> Result<f64, IntcoError> {
        self.simple.value(geom)
    }
}

impl Display for Intco {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.frozen {
            write!(f, "*")?;
        }
        write!(f, "{}", self.simple)?;
        if let Some(v) = self.fixed_value {
            write!(f, "[{v:.4}]")?;
        }
        Ok(())
    }
}

/// wrap an angular difference into (-π, π]
pub fn wrap_angle(d: f64) -> f64 {
    use std::f64::consts::PI;
    let w = (d + PI).rem_euclid(2.0 * PI) - PI;
    if w <= -PI { PI } else { w }
}

/// values of all of `intcos` at `geom`
pub fn values(intcos: &[Intco], geom: &Geom) -> Result<DVec, IntcoError> {
    let vals = intcos
        .iter()
        .map(|ic| ic.value(geom))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DVec::from(vals))
}

/// `to - from`, with periodic coordinates wrapped into (-π, π]
pub fn q_diff(intcos: &[Intco], to: &DVec, from: &DVec) -> DVec {
    let mut d = to - from;
    for (i, ic) in intcos.iter().enumerate() {
        if ic.simple.is_periodic() {
            d[i] = wrap_angle(d[i]);
        }
    }
    d
}

/// return the Wilson B matrix, one row per coordinate and one column per
/// Cartesian coordinate
pub fn b_matrix(intcos: &[Intco], geom: &Geom) -> Result<DMat, IntcoError> {
    let rows = intcos.len();
    let cols = 3 * geom.len();
    let mut b_mat = Vec::with_capacity(rows * cols);
    for ic in intcos {
        b_mat.extend(geom.s_vec(&ic.simple)?);
    }
    Ok(DMat::from_row_slice(rows, cols, &b_mat))
}

/// return the second derivatives of every coordinate with respect to the
/// Cartesian coordinates. the first index runs over `intcos`
pub fn b_prime(intcos: &[Intco], geom: &Geom) -> Result<Tensor3, IntcoError> {
    let nc = 3 * geom.len();
    let mut ret = Tensor3::zeros((intcos.len(), nc, nc));
    for (r, ic) in intcos.iter().enumerate() {
        let block = ic.simple.second_derivative(geom)?;
        let atoms = ic.simple.atoms();
        for (p, ap) in atoms.iter().enumerate() {
            for (q, aq) in atoms.iter().enumerate() {
                for i in 0..3 {
                    for j in 0..3 {
                        ret[(r, 3 * ap + i, 3 * aq + j)] +=
                            block[(3 * p + i, 3 * q + j)];
                    }
                }
            }
        }
    }
    Ok(ret)
}

/// the mass-weighted metric G = B M⁻¹ Bᵀ. `masses` holds one entry per atom
/// and is applied to each of that atom's three Cartesian components
pub fn g_matrix(
    intcos: &[Intco],
    geom: &Geom,
    masses: &[f64],
) -> Result<DMat, IntcoError> {
    if masses.len() != geom.len() {
        return Err(IntcoError::Dimension(format!(
            "{} masses for {} atoms",
            masses.len(),
            geom.len()
        )));
    }
    let b = b_matrix(intcos, geom)?;
    let nc = b.ncols();
    let minv = DVec::from_iterator(nc, (0..nc).map(|i| 1.0 / masses[i / 3]));
    let g = &b * DMat::from_diagonal(&minv) * b.transpose();
    // symmetric up to rounding; make it exact
    Ok((&g + g.transpose()) * 0.5)
}

/// Let D = BBᵀ and return A = BᵀD⁺, using the generalized inverse so that
/// redundant coordinate sets work
pub fn a_matrix(b: &DMat, tol: f64) -> DMat {
    let d = b * b.transpose();
    b.transpose() * linalg::symm_mat_inv(&d, tol)
}
