use std::f64::consts::FRAC_PI_2;

use approx::assert_abs_diff_eq;
use intco::{Simple, connect::is_connected};

use super::*;

fn water(x: f64) -> Vec<[f64; 3]> {
    vec![
        [x, 1.431390244079, 0.986041163966],
        [x, 0.000000000000, -0.124238450265],
        [x, -1.431390244079, 0.986041163966],
    ]
}

/// two water molecules 6 bohr apart in a single fragment
fn dimer() -> MolSys {
    let mut geom = water(0.0);
    geom.extend(water(6.0));
    MolSys::new(vec![
        Fragment::from_z(vec![1, 8, 1, 1, 8, 1], Geom::from(geom)).unwrap(),
    ])
}

#[test]
fn split_and_consolidate() {
    let mut mol = dimer();
    let geom = mol.geom();
    let masses = mol.masses();
    mol.split_by_connectivity(1.3).unwrap();
    assert_eq!(mol.nfragments(), 2);
    assert_eq!(mol.frag_atom_range(1).unwrap(), 3..6);
    assert_eq!(mol.geom(), geom);

    mol.regenerate_intcos(&Config::default()).unwrap();
    assert_eq!(mol.fragments()[1].intcos().len(), 3);
    let intcos = mol.intcos();
    assert_eq!(intcos[3].simple, Simple::stretch(3, 4));
    assert_eq!(mol.frag_1st_intco(1).unwrap(), 3);

    mol.consolidate().unwrap();
    assert_eq!(mol.nfragments(), 1);
    assert_eq!(mol.geom(), geom);
    assert_eq!(mol.masses(), masses);
    assert_eq!(mol.intcos(), intcos);
}

#[test]
fn index_helpers() {
    let mut mol = dimer();
    mol.split_by_connectivity(1.3).unwrap();
    assert_eq!(mol.frag_1st_atom(1).unwrap(), 3);
    assert_eq!(mol.atom_to_frag(2).unwrap(), 0);
    assert_eq!(mol.atom_to_frag(4).unwrap(), 1);
    assert!(mol.atom_to_frag(6).is_err());
    assert!(mol.frag_1st_atom(2).is_err());
    assert_eq!(mol.atoms_to_unique_frags(&[4, 0, 5, 1]).unwrap(), vec![1, 0]);
}

#[test]
fn augment() {
    let mut mol = dimer();
    mol.split_by_connectivity(1.3).unwrap();
    let config = Config::default();
    let mut conn = mol.fragments()[0]
        .connectivity_from_distances(config.covalent_connect)
        .unwrap();
    // build the block-diagonal global connectivity
    let n = mol.natom();
    let mut global = Connectivity::from_element(n, n, false);
    global.view_mut((0, 0), (3, 3)).copy_from(&conn);
    conn = mol.fragments()[1]
        .connectivity_from_distances(config.covalent_connect)
        .unwrap();
    global.view_mut((3, 3), (3, 3)).copy_from(&conn);
    assert!(!is_connected(&global));

    mol.augment_connectivity_to_single_fragment(&mut global, &config)
        .unwrap();
    assert!(is_connected(&global));
    // every atom is exactly 6 bohr from its image, so all three pairs tie
    for i in 0..3 {
        assert!(global[(i, i + 3)]);
        assert!(global[(i + 3, i)]);
    }
    assert!(!global[(0, 4)]);

    let mut bad = Connectivity::from_element(2, 2, false);
    assert!(
        mol.augment_connectivity_to_single_fragment(&mut bad, &config)
            .is_err()
    );
}

#[test]
fn augment_unreachable() {
    // a lone hydrogen with no finite distance to the water
    let water = Fragment::from_z(vec![1, 8, 1], Geom::from(water(0.0))).unwrap();
    let lost = Fragment::from_z(vec![1], Geom::from(vec![[f64::NAN; 3]]))
        .unwrap();
    let mol = MolSys::new(vec![water, lost]);
    let mut conn = Connectivity::from_element(4, 4, false);
    let got =
        mol.augment_connectivity_to_single_fragment(&mut conn, &Config::default());
    assert!(matches!(got, Err(IrcError::Opt(_))));
}

#[test]
fn augment_far_apart() {
    // 1000 bohr apart still connects, just after many passes
    let a = Fragment::from_z(vec![1], Geom::from(vec![[0.0; 3]])).unwrap();
    let b = Fragment::from_z(vec![1], Geom::from(vec![[1000.0, 0.0, 0.0]]))
        .unwrap();
    let mol = MolSys::new(vec![a, b]);
    let mut conn = Connectivity::from_element(2, 2, false);
    mol.augment_connectivity_to_single_fragment(&mut conn, &Config::default())
        .unwrap();
    assert!(conn[(0, 1)]);
}

#[test]
fn fb_fragments() {
    let reference = Geom::from(vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]]);
    let mut fb =
        FbFragment::new(vec![1, 1], vec![1.0, 1.0], reference.clone())
            .unwrap();
    assert_eq!(fb.geom(), reference);

    fb.euler = [FRAC_PI_2, 0.0, 0.0];
    fb.translation = [0.0, 0.0, 2.0];
    let got = fb.geom();
    assert_abs_diff_eq!(got[0][1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(got[0][0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(got[1][2], 2.0, epsilon = 1e-12);

    let mol = dimer().with_fb_fragments(vec![fb]);
    assert_eq!(mol.nfragments(), 2);
    assert_eq!(mol.natom(), 6);

    assert!(FbFragment::new(vec![1], vec![1.0, 1.0], reference).is_err());
}

#[test]
fn fragment_validation() {
    let geom = Geom::from(water(0.0));
    assert!(Fragment::new(vec![1, 8], geom.clone(), vec![1.0; 3]).is_err());
    assert!(Fragment::from_z(vec![1, 200, 1], geom.clone()).is_err());
    let frag = Fragment::from_z(vec![1, 8, 1], geom).unwrap();
    assert!(
        frag.clone()
            .with_intcos(vec![Simple::stretch(0, 3).into()])
            .is_err()
    );
    let mut frag = frag.with_intcos(vec![Simple::stretch(0, 1).into()]).unwrap();
    frag.set_frozen(0, true).unwrap();
    assert!(frag.intcos()[0].frozen);
    frag.set_frozen(0, false).unwrap();
    assert!(!frag.intcos()[0].frozen);
    assert!(matches!(frag.set_frozen(1, true), Err(IrcError::Config(_))));
    assert!(matches!(
        Fragment::new(vec![], Geom::new(), vec![]),
        Err(IrcError::Config(_))
    ));
}

#[test]
fn set_geom() {
    let mut mol = dimer();
    mol.split_by_connectivity(1.3).unwrap();
    let mut geom = mol.geom();
    geom[4][2] += 0.1;
    mol.set_geom(&geom).unwrap();
    assert_eq!(mol.fragments()[1].geom()[1], geom[4]);
    assert!(mol.set_geom(&Geom::from(water(0.0))).is_err());
}
