use crate::{ANGBOHR, DVec, IntcoError, Simple, Vec3};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    ops::{Index, IndexMut},
};

/// atoms closer than this (in bohr) are treated as coincident
pub(crate) const DEGENERATE_DIST: f64 = 1e-10;

/// sines smaller than this make angular derivatives undefined
pub(crate) const DEGENERATE_SIN: f64 = 1e-8;

/// Cartesian geometry in bohr, one [Vec3] per atom
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Geom(pub Vec<Vec3>);

impl Geom {
    pub fn new() -> Self {
        Geom(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&mut self, it: Vec3) {
        self.0.push(it)
    }

    /// convert the geometry from angstroms to bohr
    pub fn to_bohr(&mut self) {
        for a in self.0.iter_mut() {
            *a /= ANGBOHR;
        }
    }

    /// return the unit vector from atom i to atom j, failing if the atoms
    /// coincide
    pub fn unit(&self, i: usize, j: usize) -> Result<Vec3, IntcoError> {
        let diff = self[j] - self[i];
        let r = diff.magnitude();
        if r < DEGENERATE_DIST {
            return Err(IntcoError::Degenerate(format!(
                "atoms {} and {} coincide",
                i + 1,
                j + 1
            )));
        }
        Ok(diff / r)
    }

    /// distance between atoms i and j in bohr
    pub fn dist(&self, i: usize, j: usize) -> f64 {
        (self[j] - self[i]).magnitude()
    }

    /// angle in radians between atoms i, j, and k, where j is the central atom
    pub fn angle(&self, i: usize, j: usize, k: usize) -> Result<f64, IntcoError> {
        let e_ji = self.unit(j, i)?;
        let e_jk = self.unit(j, k)?;
        Ok(e_ji.dot(&e_jk).clamp(-1.0, 1.0).acos())
    }

    /// the B matrix row of `ic`, of length 3 * `self.len()`
    pub fn s_vec(&self, ic: &Simple) -> Result<Vec<f64>, IntcoError> {
        let mut tmp = vec![0.0; 3 * self.len()];
        match *ic {
            Simple::Stretch(a, b) | Simple::HBond(a, b) => {
                let e_12 = self.unit(a, b)?;
                for i in 0..3 {
                    tmp[3 * a + i] = -e_12[i];
                    tmp[3 * b + i] = e_12[i];
                }
            }
            Simple::InverseStretch(a, b) => {
                // d(1/R) = -(1/R)² dR
                let e_12 = self.unit(a, b)?;
                let q = ic.value(self)?;
                let w = -q * q;
                for i in 0..3 {
                    tmp[3 * a + i] = -w * e_12[i];
                    tmp[3 * b + i] = w * e_12[i];
                }
            }
            Simple::Bend(a, b, c) => {
                let e_21 = self.unit(b, a)?;
                let e_23 = self.unit(b, c)?;
                let t_12 = self.dist(b, a);
                let t_32 = self.dist(b, c);
                let w = e_21.dot(&e_23);
                let sp = (1.0 - w * w).sqrt();
                if sp < DEGENERATE_SIN {
                    return Err(IntcoError::Degenerate(format!(
                        "bend {ic} is linear"
                    )));
                }
                let c1 = 1.0 / (t_12 * sp);
                let c2 = 1.0 / (t_32 * sp);
                for i in 0..3 {
                    tmp[3 * a + i] = (w * e_21[i] - e_23[i]) * c1;
                    tmp[3 * c + i] = (w * e_23[i] - e_21[i]) * c2;
                    tmp[3 * b + i] = -tmp[3 * a + i] - tmp[3 * c + i];
                }
            }
            Simple::Torsion(a, b, c, d) => {
                let e_21 = self.unit(b, a)?;
                let e_32 = self.unit(c, b)?;
                let e_43 = self.unit(d, c)?;
                let t_21 = self.dist(b, a);
                let t_32 = self.dist(c, b);
                let t_43 = self.dist(d, c);
                let v5 = e_21.cross(&e_32);
                let v6 = e_43.cross(&e_32);
                let cp2 = -e_21.dot(&e_32);
                let cp3 = -e_43.dot(&e_32);
                let sp2 = 1.0 - cp2 * cp2;
                let sp3 = 1.0 - cp3 * cp3;
                if sp2 < DEGENERATE_SIN || sp3 < DEGENERATE_SIN {
                    return Err(IntcoError::Degenerate(format!(
                        "torsion {ic} has collinear atoms"
                    )));
                }
                // terminal atoms
                let w1 = 1.0 / (t_21 * sp2);
                let w2 = 1.0 / (t_43 * sp3);
                for i in 0..3 {
                    tmp[3 * a + i] = -w1 * v5[i];
                    tmp[3 * d + i] = -w2 * v6[i];
                }
                let w3 = (t_32 - t_21 * cp2) * w1 / t_32;
                let w4 = cp3 / (t_32 * sp3);
                let w5 = (t_32 - t_43 * cp3) * w2 / t_32;
                let w6 = cp2 / (t_32 * sp2);
                for i in 0..3 {
                    tmp[3 * b + i] = w3 * v5[i] + w4 * v6[i];
                    tmp[3 * c + i] = w5 * v6[i] + w6 * v5[i];
                }
            }
            Simple::Out(a, b, c, d) => {
                let e21 = self.unit(a, b)?;
                let e23 = self.unit(c, b)?;
                let e24 = self.unit(d, b)?;
                let t21 = self.dist(a, b);
                let t23 = self.dist(c, b);
                let t24 = self.dist(d, b);
                let v5 = e23.cross(&e24);
                let phi = self.angle(c, b, d)?;
                let sphi = phi.sin();
                // sign conventions here are flipped relative to
                // Simple::value, so take the angle from there and negate
                let w = -ic.value(self)?;
                let cg = w.cos();
                if sphi < DEGENERATE_SIN || cg.abs() < DEGENERATE_SIN {
                    return Err(IntcoError::Degenerate(format!(
                        "out-of-plane angle {ic} is undefined"
                    )));
                }
                let sg = w.sin();
                let tg = sg / cg;
                let w1 = cg * sphi;
                let w2 = 1.0 / (t21 * w1);
                let w3 = tg / t21;
                let w4 = 1.0 / (t23 * w1);
                let w5 = t24 * sg * w4;
                let w6 = 1.0 / (t24 * w1);
                let w7 = t23 * sg * w6;
                let v6 = e24.cross(&e21);
                let v7 = e21.cross(&e23);
                let svec = self.s_vec(&Simple::Bend(c, b, d))?;
                let b3p = &svec[3 * c..3 * c + 3];
                let b4p = &svec[3 * d..3 * d + 3];
                for i in 0..3 {
                    // V1, V3, V4, V2 in VECT5
                    let v1i = v5[i] * w2 - e21[i] * w3;
                    let v3i = v6[i] * w4 - b4p[i] * w5;
                    let v4i = v7[i] * w6 - b3p[i] * w7;
                    tmp[3 * a + i] = v1i;
                    tmp[3 * c + i] = v3i;
                    tmp[3 * d + i] = v4i;
                    tmp[3 * b + i] = -v1i - v3i - v4i;
                }
            }
        }
        Ok(tmp)
    }
}

impl From<&DVec> for Geom {
    fn from(dvec: &DVec) -> Self {
        Self(
            dvec.as_slice()
                .chunks(3)
                .map(Vec3::from_row_slice)
                .collect(),
        )
    }
}

impl From<Geom> for DVec {
    fn from(val: Geom) -> Self {
        let mut geom = Vec::with_capacity(3 * val.len());
        for c in &val {
            geom.extend(&c);
        }
        DVec::from(geom)
    }
}

impl From<Vec<[f64; 3]>> for Geom {
    fn from(v: Vec<[f64; 3]>) -> Self {
        Self(v.into_iter().map(Vec3::from).collect())
    }
}

impl IntoIterator for &Geom {
    type Item = Vec3;

    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.clone().into_iter()
    }
}

impl Index<usize> for Geom {
    type Output = Vec3;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for Geom {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Display for Geom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for atom in &self.0 {
            writeln!(f, "{:20.10}{:20.10}{:20.10}", atom[0], atom[1], atom[2])?;
        }
        Ok(())
    }
}
