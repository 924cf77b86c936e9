//! molecular systems composed of fragments

use std::{collections::VecDeque, fmt::Display, ops::Range};

use intco::{
    Connectivity, DMat, DVec, Intco, b_matrix,
    connect::{self, connectivity_from_distances, is_connected},
    elements, g_matrix,
    geom::Geom,
    values,
};
use log::{debug, info, warn};

use crate::{IrcError, config::Config};

#[cfg(test)]
mod tests;

/// distances between atom pairs closer than this to the shortest one are
/// treated as ties when connecting fragments
const TIE_TOL: f64 = 1e-10;

/// A set of atoms and the coordinates describing them. Coordinates use atom
/// indices local to the fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    z: Vec<usize>,
    geom: Geom,
    masses: Vec<f64>,
    intcos: Vec<Intco>,
}

impl Fragment {
    pub fn new(
        z: Vec<usize>,
        geom: Geom,
        masses: Vec<f64>,
    ) -> Result<Self, IrcError> {
        if geom.is_empty() {
            return Err(IrcError::Config("fragment has no atoms".to_owned()));
        }
        if z.len() != geom.len() || masses.len() != geom.len() {
            return Err(IrcError::Config(format!(
                "fragment has {} atomic numbers, {} atoms, and {} masses",
                z.len(),
                geom.len(),
                masses.len()
            )));
        }
        Ok(Self {
            z,
            geom,
            masses,
            intcos: Vec::new(),
        })
    }

    /// construct a [Fragment] with the masses of the most abundant isotopes
    pub fn from_z(z: Vec<usize>, geom: Geom) -> Result<Self, IrcError> {
        let masses = z
            .iter()
            .map(|&z| elements::mass(z))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(z, geom, masses)
    }

    /// replace the coordinates of `self` with `intcos`, failing if any of
    /// them refers to an atom outside of the fragment
    pub fn with_intcos(mut self, intcos: Vec<Intco>) -> Result<Self, IrcError> {
        for ic in &intcos {
            if ic.simple.atoms().iter().any(|&a| a >= self.natom()) {
                return Err(IrcError::Config(format!(
                    "coordinate {ic} is outside of a fragment with {} atoms",
                    self.natom()
                )));
            }
        }
        self.intcos = intcos;
        Ok(self)
    }

    pub fn natom(&self) -> usize {
        self.geom.len()
    }

    pub fn z(&self) -> &[usize] {
        &self.z
    }

    pub fn geom(&self) -> &Geom {
        &self.geom
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn intcos(&self) -> &[Intco] {
        &self.intcos
    }

    /// freeze or unfreeze the coordinate at `index`
    pub fn set_frozen(
        &mut self,
        index: usize,
        frozen: bool,
    ) -> Result<(), IrcError> {
        let n = self.intcos.len();
        let Some(ic) = self.intcos.get_mut(index) else {
            return Err(IrcError::Config(format!(
                "coordinate {index} is outside of a fragment with {n} \
                 coordinates"
            )));
        };
        if frozen {
            ic.freeze();
        } else {
            ic.unfreeze();
        }
        Ok(())
    }

    pub fn connectivity_from_distances(
        &self,
        scale: f64,
    ) -> Result<Connectivity, IrcError> {
        Ok(connectivity_from_distances(&self.geom, &self.z, scale)?)
    }

    /// add stretches, bends, and torsions for the bonds in `conn`
    pub fn add_intcos_from_connectivity(
        &mut self,
        conn: &Connectivity,
        linear_threshold: f64,
    ) -> Result<(), IrcError> {
        connect::add_intcos_from_connectivity(
            &mut self.intcos,
            &self.geom,
            conn,
            linear_threshold,
        )?;
        Ok(())
    }
}

impl Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, atom) in self.geom.0.iter().enumerate() {
            let sym = elements::symbol(self.z[i]).unwrap_or("X");
            writeln!(
                f,
                "{sym:<2}{:15.10}{:15.10}{:15.10}{:12.6}",
                atom[0], atom[1], atom[2], self.masses[i]
            )?;
        }
        for ic in &self.intcos {
            writeln!(f, "{ic}")?;
        }
        Ok(())
    }
}

/// A rigid body placed by three Euler angles and a translation. It takes part
/// in the fragment count but contributes no atoms to the flexible system
#[derive(Debug, Clone, PartialEq)]
pub struct FbFragment {
    pub z: Vec<usize>,
    pub masses: Vec<f64>,
    pub reference: Geom,
    pub euler: [f64; 3],
    pub translation: [f64; 3],
}

impl FbFragment {
    pub fn new(
        z: Vec<usize>,
        masses: Vec<f64>,
        reference: Geom,
    ) -> Result<Self, IrcError> {
        if z.len() != reference.len() || masses.len() != reference.len() {
            return Err(IrcError::Config(format!(
                "fixed-body fragment has {} atomic numbers, {} atoms, and {} \
                 masses",
                z.len(),
                reference.len(),
                masses.len()
            )));
        }
        Ok(Self {
            z,
            masses,
            reference,
            euler: [0.0; 3],
            translation: [0.0; 3],
        })
    }

    /// the reference geometry rotated by the z-y-z Euler angles about its
    /// center of mass and then translated
    pub fn geom(&self) -> Geom {
        use nalgebra::{Rotation3, Vector3};
        let total: f64 = self.masses.iter().sum();
        let com = if total > 0.0 {
            self.reference
                .0
                .iter()
                .zip(&self.masses)
                .fold(Vector3::zeros(), |acc, (r, m)| acc + r * *m)
                / total
        } else {
            Vector3::zeros()
        };
        let [a, b, c] = self.euler;
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), a)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), b)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), c);
        let t = Vector3::from(self.translation);
        Geom(
            self.reference
                .0
                .iter()
                .map(|r| rot * (r - com) + com + t)
                .collect(),
        )
    }
}

impl Display for FbFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.euler;
        let [x, y, z] = self.translation;
        writeln!(f, "Euler angles: {a:12.6}{b:12.6}{c:12.6}")?;
        writeln!(f, "Translation:  {x:12.6}{y:12.6}{z:12.6}")?;
        let geom = self.geom();
        for (i, atom) in geom.0.iter().enumerate() {
            let sym = elements::symbol(self.z[i]).unwrap_or("X");
            writeln!(
                f,
                "{sym:<2}{:15.10}{:15.10}{:15.10}",
                atom[0], atom[1], atom[2]
            )?;
        }
        Ok(())
    }
}

/// The full molecular system. The concatenated geometry, masses, atomic
/// numbers, and coordinates are assembled from the fragments on every call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MolSys {
    fragments: Vec<Fragment>,
    fb_fragments: Vec<FbFragment>,
}

impl MolSys {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments,
            fb_fragments: Vec::new(),
        }
    }

    pub fn with_fb_fragments(mut self, fb: Vec<FbFragment>) -> Self {
        self.fb_fragments = fb;
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut [Fragment] {
        &mut self.fragments
    }

    pub fn fb_fragments(&self) -> &[FbFragment] {
        &self.fb_fragments
    }

    pub fn natom(&self) -> usize {
        self.fragments.iter().map(Fragment::natom).sum()
    }

    pub fn nfragments(&self) -> usize {
        self.fragments.len() + self.fb_fragments.len()
    }

    fn check_frag(&self, ifrag: usize) -> Result<(), IrcError> {
        if ifrag >= self.fragments.len() {
            return Err(IrcError::Config(format!(
                "fragment index {ifrag} out of range for {} fragments",
                self.fragments.len()
            )));
        }
        Ok(())
    }

    /// global index of the first atom in fragment `ifrag`
    pub fn frag_1st_atom(&self, ifrag: usize) -> Result<usize, IrcError> {
        self.check_frag(ifrag)?;
        Ok(self.fragments[..ifrag].iter().map(Fragment::natom).sum())
    }

    pub fn frag_atom_range(
        &self,
        ifrag: usize,
    ) -> Result<Range<usize>, IrcError> {
        let start = self.frag_1st_atom(ifrag)?;
        Ok(start..start + self.fragments[ifrag].natom())
    }

    /// index of the fragment containing the global atom index `atom`
    pub fn atom_to_frag(&self, atom: usize) -> Result<usize, IrcError> {
        let mut start = 0;
        for (i, f) in self.fragments.iter().enumerate() {
            if (start..start + f.natom()).contains(&atom) {
                return Ok(i);
            }
            start += f.natom();
        }
        Err(IrcError::Config(format!(
            "atom index {atom} out of range for {} atoms",
            self.natom()
        )))
    }

    /// the fragments containing `atoms`, in order of first appearance
    pub fn atoms_to_unique_frags(
        &self,
        atoms: &[usize],
    ) -> Result<Vec<usize>, IrcError> {
        let mut ret = Vec::new();
        for &a in atoms {
            let f = self.atom_to_frag(a)?;
            if !ret.contains(&f) {
                ret.push(f);
            }
        }
        Ok(ret)
    }

    /// global index of the first coordinate in fragment `ifrag`
    pub fn frag_1st_intco(&self, ifrag: usize) -> Result<usize, IrcError> {
        self.check_frag(ifrag)?;
        Ok(self.fragments[..ifrag].iter().map(|f| f.intcos.len()).sum())
    }

    pub fn geom(&self) -> Geom {
        Geom(
            self.fragments
                .iter()
                .flat_map(|f| f.geom.0.iter().cloned())
                .collect(),
        )
    }

    /// write the global geometry `geom` back into the fragments
    pub fn set_geom(&mut self, geom: &Geom) -> Result<(), IrcError> {
        if geom.len() != self.natom() {
            return Err(IrcError::Config(format!(
                "geometry with {} atoms for a system of {}",
                geom.len(),
                self.natom()
            )));
        }
        let mut start = 0;
        for f in &mut self.fragments {
            let n = f.natom();
            f.geom = Geom(geom.0[start..start + n].to_vec());
            start += n;
        }
        Ok(())
    }

    pub fn masses(&self) -> Vec<f64> {
        self.fragments
            .iter()
            .flat_map(|f| f.masses.iter().cloned())
            .collect()
    }

    pub fn z(&self) -> Vec<usize> {
        self.fragments
            .iter()
            .flat_map(|f| f.z.iter().cloned())
            .collect()
    }

    /// all of the coordinates with atom indices offset to global numbering
    pub fn intcos(&self) -> Vec<Intco> {
        let mut ret = Vec::new();
        let mut start = 0;
        for f in &self.fragments {
            ret.extend(f.intcos.iter().map(|ic| ic.offset(start)));
            start += f.natom();
        }
        ret
    }

    pub fn q_values(&self) -> Result<DVec, IrcError> {
        Ok(values(&self.intcos(), &self.geom())?)
    }

    pub fn b_matrix(&self) -> Result<DMat, IrcError> {
        Ok(b_matrix(&self.intcos(), &self.geom())?)
    }

    /// the mass-weighted metric for the current geometry
    pub fn g_matrix(&self) -> Result<DMat, IrcError> {
        Ok(g_matrix(&self.intcos(), &self.geom(), &self.masses())?)
    }

    /// merge every fragment into a single one, keeping the coordinates with
    /// their global atom indices
    pub fn consolidate(&mut self) -> Result<(), IrcError> {
        if self.fragments.len() <= 1 {
            return Ok(());
        }
        info!("consolidating {} fragments into one", self.fragments.len());
        let frag = Fragment::new(self.z(), self.geom(), self.masses())?
            .with_intcos(self.intcos())?;
        self.fragments = vec![frag];
        Ok(())
    }

    /// split every fragment into its bonded components according to its own
    /// distance connectivity. atoms keep their relative order, and the
    /// coordinates are dropped since they must be regenerated for the new
    /// fragments
    pub fn split_by_connectivity(&mut self, scale: f64) -> Result<(), IrcError> {
        let mut new_frags = Vec::new();
        for f in &self.fragments {
            let conn = f.connectivity_from_distances(scale)?;
            let mut allocated = vec![false; f.natom()];
            for start in 0..f.natom() {
                if allocated[start] {
                    continue;
                }
                allocated[start] = true;
                let mut atoms = vec![start];
                let mut queue = VecDeque::from([start]);
                while let Some(a) = queue.pop_front() {
                    for b in 0..f.natom() {
                        if conn[(a, b)] && !allocated[b] {
                            allocated[b] = true;
                            atoms.push(b);
                            queue.push_back(b);
                        }
                    }
                }
                atoms.sort_unstable();
                debug!("new fragment with atoms {atoms:?}");
                new_frags.push(Fragment::new(
                    atoms.iter().map(|&a| f.z[a]).collect(),
                    Geom(atoms.iter().map(|&a| f.geom[a]).collect()),
                    atoms.iter().map(|&a| f.masses[a]).collect(),
                )?);
            }
            if !f.intcos.is_empty() {
                warn!(
                    "dropping {} coordinates while splitting fragments",
                    f.intcos.len()
                );
            }
        }
        info!(
            "split {} fragments into {}",
            self.fragments.len(),
            new_frags.len()
        );
        self.fragments = new_frags;
        Ok(())
    }

    /// add bonds to the global connectivity matrix `conn` until every
    /// fragment is connected to every other, growing the allowed distance
    /// each time a pass leaves some fragments apart
    pub fn augment_connectivity_to_single_fragment(
        &self,
        conn: &mut Connectivity,
        config: &Config,
    ) -> Result<(), IrcError> {
        let n = self.natom();
        if conn.shape() != (n, n) {
            return Err(IrcError::Config(format!(
                "{:?} connectivity for {n} atoms",
                conn.shape()
            )));
        }
        let nf = self.fragments.len();
        if nf <= 1 {
            return Ok(());
        }
        let geom = self.geom();
        let radii = self
            .z()
            .iter()
            .map(|&z| elements::covalent_radius(z))
            .collect::<Result<Vec<_>, _>>()?;
        let ranges = (0..nf)
            .map(|i| self.frag_atom_range(i))
            .collect::<Result<Vec<_>, _>>()?;

        // closest atom pair of every pair of fragments, and the scale at
        // which every one of them is close enough to connect
        let mut closest = Vec::new();
        let mut needed = 0.0f64;
        for f2 in 0..nf {
            for f1 in 0..f2 {
                let mut min = (f64::INFINITY, 0, 0);
                for i in ranges[f1].clone() {
                    for j in ranges[f2].clone() {
                        let r = geom.dist(i, j);
                        if r < min.0 {
                            min = (r, i, j);
                        }
                    }
                }
                let (rmin, i, j) = min;
                if !rmin.is_finite() {
                    return Err(IrcError::opt(format!(
                        "no finite distance between fragments {} and {}",
                        f1 + 1,
                        f2 + 1
                    )));
                }
                needed = needed.max(rmin / (radii[i] + radii[j]));
                closest.push((f1, f2, rmin, i, j));
            }
        }

        let mut frag_conn = Connectivity::from_fn(nf, nf, |i, j| i == j);
        let mut scale = config.interfrag_connect;
        loop {
            for &(f1, f2, rmin, i, j) in &closest {
                if frag_conn[(f1, f2)] || rmin > scale * (radii[i] + radii[j])
                {
                    continue;
                }
                frag_conn[(f1, f2)] = true;
                frag_conn[(f2, f1)] = true;
                for i in ranges[f1].clone() {
                    for j in ranges[f2].clone() {
                        if (geom.dist(i, j) - rmin).abs() < TIE_TOL {
                            info!(
                                "connecting fragments with atoms {} and {}",
                                i + 1,
                                j + 1
                            );
                            conn[(i, j)] = true;
                            conn[(j, i)] = true;
                        }
                    }
                }
            }
            if is_connected(&frag_conn) {
                return Ok(());
            }
            // every closest pair is within reach by now
            if scale > needed + config.interfrag_connect_step {
                return Err(IrcError::opt(format!(
                    "fragments are still apart at a scaling of {scale:.3}"
                )));
            }
            scale += config.interfrag_connect_step;
            info!("increasing scaling to {scale:6.3} to connect fragments");
        }
    }

    /// generate coordinates for every fragment from `conn`, or from each
    /// fragment's own distance connectivity if `conn` is None. `conn` uses
    /// global atom indices
    pub fn add_intcos_from_connectivity(
        &mut self,
        conn: Option<&Connectivity>,
        config: &Config,
    ) -> Result<(), IrcError> {
        let n = self.natom();
        if let Some(c) = conn
            && c.shape() != (n, n)
        {
            return Err(IrcError::Config(format!(
                "{:?} connectivity for {n} atoms",
                c.shape()
            )));
        }
        let mut start = 0;
        for f in &mut self.fragments {
            let k = f.natom();
            let local = match conn {
                Some(c) => c.view((start, start), (k, k)).into_owned(),
                None => f.connectivity_from_distances(config.covalent_connect)?,
            };
            f.add_intcos_from_connectivity(&local, config.linear_bend_threshold)?;
            start += k;
        }
        Ok(())
    }

    /// throw away every coordinate and generate them again from the current
    /// geometry
    pub fn regenerate_intcos(&mut self, config: &Config) -> Result<(), IrcError> {
        for f in &mut self.fragments {
            f.intcos.clear();
        }
        self.add_intcos_from_connectivity(None, config)
    }
}

impl Display for MolSys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, frag) in self.fragments.iter().enumerate() {
            writeln!(f, "Fragment {}", i + 1)?;
            write!(f, "{frag}")?;
        }
        for (i, frag) in self.fb_fragments.iter().enumerate() {
            writeln!(f, "Fixed body Fragment {}", i + 1)?;
            write!(f, "{frag}")?;
        }
        Ok(())
    }
}
