//! the TOML input read by the `irc` binary

use std::{fmt::Debug, path::Path};

use intco::{DMat, DVec, elements::symbol_to_z, geom::Geom};
use serde::Deserialize;

use crate::{
    IrcError,
    config::Config,
    molsys::{Fragment, MolSys},
};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Input {
    /// one atom per line as `symbol x y z`, in bohr, optionally followed by
    /// the mass of the atom in amu
    pub geometry: String,

    /// the Hessian in the generated internal coordinates. if absent, a
    /// diagonal guess is used
    pub hessian: Option<Vec<Vec<f64>>>,

    /// the Cartesian gradient. when present, the first step follows the
    /// gradient instead of the lowest Hessian eigenvector
    pub gradient: Option<Vec<f64>>,

    #[serde(default)]
    pub irc: Config,
}

impl Input {
    pub fn load<P>(filename: P) -> Result<Self, IrcError>
    where
        P: AsRef<Path> + Debug,
    {
        let contents = std::fs::read_to_string(&filename).map_err(|e| {
            IrcError::Config(format!("failed to read {filename:?} with {e}"))
        })?;
        let ret: Self = toml::from_str(&contents).map_err(|e| {
            IrcError::Config(format!(
                "failed to deserialize input file {filename:?} with {e}"
            ))
        })?;
        ret.irc.validate()?;
        Ok(ret)
    }

    /// a single-fragment system from the geometry lines
    pub fn molsys(&self) -> Result<MolSys, IrcError> {
        let mut z = Vec::new();
        let mut geom = Geom::new();
        let mut masses = Vec::new();
        for (i, line) in self
            .geometry
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
        {
            let fields: Vec<_> = line.split_whitespace().collect();
            if fields.len() != 4 && fields.len() != 5 {
                return Err(IrcError::Config(format!(
                    "expected 4 or 5 fields on geometry line {}, got `{line}`",
                    i + 1
                )));
            }
            let nums = fields[1..]
                .iter()
                .map(|s| s.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    IrcError::Config(format!(
                        "failed to parse geometry line `{line}` with {e}"
                    ))
                })?;
            let atomic_number = symbol_to_z(fields[0])?;
            geom.push([nums[0], nums[1], nums[2]].into());
            masses.push(match nums.get(3) {
                Some(&m) => m,
                None => intco::elements::mass(atomic_number)?,
            });
            z.push(atomic_number);
        }
        if z.is_empty() {
            return Err(IrcError::Config("empty geometry".to_owned()));
        }
        Ok(MolSys::new(vec![Fragment::new(z, geom, masses)?]))
    }

    /// the given Hessian, checked against `nq` coordinates
    pub fn hessian(&self, nq: usize) -> Result<Option<DMat>, IrcError> {
        let Some(rows) = &self.hessian else {
            return Ok(None);
        };
        if rows.len() != nq || rows.iter().any(|r| r.len() != nq) {
            return Err(IrcError::Config(format!(
                "Hessian must be {nq}x{nq} for {nq} coordinates"
            )));
        }
        Ok(Some(DMat::from_fn(nq, nq, |i, j| rows[i][j])))
    }

    /// the given gradient, checked against `natom` atoms
    pub fn gradient(&self, natom: usize) -> Result<Option<DVec>, IrcError> {
        let Some(g) = &self.gradient else {
            return Ok(None);
        };
        if g.len() != 3 * natom {
            return Err(IrcError::Config(format!(
                "gradient of length {} for {natom} atoms",
                g.len()
            )));
        }
        Ok(Some(DVec::from(g.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(geometry: &str) -> Input {
        Input {
            geometry: geometry.to_owned(),
            hessian: None,
            gradient: None,
            irc: Config::default(),
        }
    }

    #[test]
    fn geometry() {
        let mol = input(
            "
            O 0.0 0.0 0.0
            h 1.8 0.0 0.0 2.014
            H 0.0 1.8 0.0
            ",
        )
        .molsys()
        .unwrap();
        assert_eq!(mol.natom(), 3);
        assert_eq!(mol.z(), vec![8, 1, 1]);
        assert_eq!(mol.masses()[1], 2.014);
        assert_eq!(mol.geom()[2][1], 1.8);
    }

    #[test]
    fn bad_geometry() {
        assert!(input("O 0.0 0.0").molsys().is_err());
        assert!(input("Q 0.0 0.0 0.0").molsys().is_err());
        assert!(input("O 0.0 x 0.0").molsys().is_err());
        assert!(input("\n").molsys().is_err());
    }

    #[test]
    fn hessian() {
        let mut inp = input("H 0 0 0");
        assert_eq!(inp.hessian(2), Ok(None));
        inp.hessian = Some(vec![vec![1.0, 0.1], vec![0.1, 2.0]]);
        let h = inp.hessian(2).unwrap().unwrap();
        assert_eq!(h[(0, 1)], 0.1);
        assert!(inp.hessian(3).is_err());
    }
}
