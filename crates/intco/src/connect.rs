use log::{debug, trace};

use crate::{
    Connectivity, Intco, IntcoError, Simple, elements::covalent_radius,
    geom::Geom,
};

/// bond every pair of atoms closer than `scale` times the sum of their
/// covalent radii
pub fn connectivity_from_distances(
    geom: &Geom,
    z: &[usize],
    scale: f64,
) -> Result<Connectivity, IntcoError> {
    let n = geom.len();
    if z.len() != n {
        return Err(IntcoError::Dimension(format!(
            "{} atomic numbers for {n} atoms",
            z.len()
        )));
    }
    let radii = z
        .iter()
        .map(|&z| covalent_radius(z))
        .collect::<Result<Vec<_>, _>>()?;
    let mut conn = Connectivity::from_element(n, n, false);
    for i in 0..n {
        for j in 0..i {
            let r = geom.dist(i, j);
            if r < scale * (radii[i] + radii[j]) {
                trace!("bonding atoms {} and {} at R = {r:.4}", i + 1, j + 1);
                conn[(i, j)] = true;
                conn[(j, i)] = true;
            }
        }
    }
    Ok(conn)
}

fn push_unique(intcos: &mut Vec<Intco>, s: Simple) {
    let ic = Intco::new(s);
    if !intcos.contains(&ic) {
        intcos.push(ic);
    }
}

fn neighbors(conn: &Connectivity, i: usize) -> impl Iterator<Item = usize> + '_ {
    (0..conn.ncols()).filter(move |&j| conn[(i, j)])
}

/// generate stretches for every bond, bends for every pair of bonds sharing an
/// atom, and torsions for every chain of three bonds. bends whose value
/// exceeds `linear_threshold` (in radians) are skipped, along with torsions
/// containing them. coordinates already present in `intcos` are not added
/// again
pub fn add_intcos_from_connectivity(
    intcos: &mut Vec<Intco>,
    geom: &Geom,
    conn: &Connectivity,
    linear_threshold: f64,
) -> Result<(), IntcoError> {
    let n = geom.len();
    if conn.nrows() != n || conn.ncols() != n {
        return Err(IntcoError::Dimension(format!(
            "{}x{} connectivity for {n} atoms",
            conn.nrows(),
            conn.ncols()
        )));
    }
    let before = intcos.len();
    for i in 0..n {
        for j in neighbors(conn, i).filter(|&j| j > i) {
            push_unique(intcos, Simple::stretch(i, j));
        }
    }

    let linear = |a, b, c| -> Result<bool, IntcoError> {
        Ok(geom.angle(a, b, c)? > linear_threshold)
    };
    for j in 0..n {
        for i in neighbors(conn, j) {
            for k in neighbors(conn, j).filter(|&k| k > i) {
                if linear(i, j, k)? {
                    debug!("skipping linear bend {}", Simple::bend(i, j, k));
                    continue;
                }
                push_unique(intcos, Simple::bend(i, j, k));
            }
        }
    }

    for j in 0..n {
        for k in neighbors(conn, j).filter(|&k| k > j) {
            for i in neighbors(conn, j).filter(|&i| i != k) {
                for l in neighbors(conn, k).filter(|&l| l != j && l != i) {
                    if linear(i, j, k)? || linear(j, k, l)? {
                        continue;
                    }
                    push_unique(intcos, Simple::torsion(i, j, k, l));
                }
            }
        }
    }
    debug!("generated {} coordinates", intcos.len() - before);
    Ok(())
}

/// return the bends in `intcos` whose value exceeds `threshold` radians
pub fn linear_bend_check(
    intcos: &[Intco],
    geom: &Geom,
    threshold: f64,
) -> Result<Vec<Simple>, IntcoError> {
    let mut ret = Vec::new();
    for ic in intcos {
        if let Simple::Bend(..) = ic.simple
            && ic.value(geom)? > threshold
        {
            ret.push(ic.simple);
        }
    }
    Ok(ret)
}

/// whether every atom can be reached from the first one through bonds in
/// `conn`
pub fn is_connected(conn: &Connectivity) -> bool {
    let n = conn.nrows();
    if n == 0 {
        return true;
    }
    let mut seen = vec![false; n];
    let mut stack = vec![0];
    seen[0] = true;
    while let Some(i) = stack.pop() {
        for j in neighbors(conn, i) {
            if !seen[j] {
                seen[j] = true;
                stack.push(j);
            }
        }
    }
    seen.into_iter().all(|s| s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ANGBOHR;

    /// water at a typical equilibrium geometry, converted to bohr
    fn water() -> (Geom, Vec<usize>) {
        let mut g = Geom::from(vec![
            [0.0, 0.0, 0.1173],
            [0.0, 0.7572, -0.4692],
            [0.0, -0.7572, -0.4692],
        ]);
        g.to_bohr();
        (g, vec![8, 1, 1])
    }

    #[test]
    fn water_coords() {
        let (g, z) = water();
        let conn = connectivity_from_distances(&g, &z, 1.3).unwrap();
        assert!(conn[(0, 1)] && conn[(0, 2)]);
        assert!(!conn[(1, 2)]);
        assert!(is_connected(&conn));
        let mut intcos = Vec::new();
        add_intcos_from_connectivity(&mut intcos, &g, &conn, 3.05).unwrap();
        let got: Vec<_> = intcos.iter().map(|ic| ic.simple).collect();
        assert_eq!(
            got,
            vec![
                Simple::Stretch(0, 1),
                Simple::Stretch(0, 2),
                Simple::Bend(1, 0, 2)
            ]
        );
        // nothing new the second time
        add_intcos_from_connectivity(&mut intcos, &g, &conn, 3.05).unwrap();
        assert_eq!(intcos.len(), 3);
    }

    #[test]
    fn disconnected() {
        let g = Geom::from(vec![[0.0, 0.0, 0.0], [0.0, 0.0, 10.0 / ANGBOHR]]);
        let conn = connectivity_from_distances(&g, &[1, 1], 1.3).unwrap();
        assert!(!is_connected(&conn));
    }

    #[test]
    fn linear() {
        let g = Geom::from(vec![
            [0.0, 0.0, -2.2],
            [0.0, 0.0, 0.0],
            [0.0, 0.05, 2.2],
        ]);
        let intcos = vec![Intco::new(Simple::bend(0, 1, 2))];
        let got = linear_bend_check(&intcos, &g, 175f64.to_radians()).unwrap();
        assert_eq!(got, vec![Simple::Bend(0, 1, 2)]);
        let got = linear_bend_check(&intcos, &g, 179.5f64.to_radians()).unwrap();
        assert!(got.is_empty());
    }
}
