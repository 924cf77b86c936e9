//! element data for H through Kr

use crate::{ANGBOHR, IntcoError};

pub const NUMBER_TO_SYMBOL: [&str; 37] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg",
    "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn",
    "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
];

/// masses of the most abundant isotopes in amu
const MASSES: [f64; 37] = [
    0.0,
    1.007_825_032_23,
    4.002_603_254_13,
    7.016_003_436_6,
    9.012_183_065,
    11.009_305_36,
    12.0,
    14.003_074_004_43,
    15.994_914_619_57,
    18.998_403_162_73,
    19.992_440_176_2,
    22.989_769_282,
    23.985_041_697,
    26.981_538_53,
    27.976_926_534_65,
    30.973_761_998_42,
    31.972_071_174_4,
    34.968_852_682,
    39.962_383_123_7,
    38.963_706_486_4,
    39.962_590_863,
    44.955_908_28,
    47.947_941_98,
    50.943_957_04,
    51.940_506_23,
    54.938_043_91,
    55.934_936_33,
    58.933_194_29,
    57.935_342_41,
    62.929_597_72,
    63.929_142_01,
    68.925_573_5,
    73.921_177_761,
    74.921_594_57,
    79.916_521_8,
    78.918_337_6,
    83.911_497_728_2,
];

/// covalent radii in Å from Cordero et al., Dalton Trans. 2832 (2008), using
/// sp3 carbon and the low-spin values for the transition metals
const COVALENT_RADII: [f64; 37] = [
    0.0, 0.31, 0.28, 1.28, 0.96, 0.84, 0.76, 0.71, 0.66, 0.57, 0.58, 1.66,
    1.41, 1.21, 1.11, 1.07, 1.05, 1.02, 1.06, 2.03, 1.76, 1.70, 1.60, 1.53,
    1.39, 1.39, 1.32, 1.26, 1.24, 1.32, 1.22, 1.22, 1.20, 1.19, 1.20, 1.20,
    1.16,
];

fn check(z: usize) -> Result<usize, IntcoError> {
    if z == 0 || z >= NUMBER_TO_SYMBOL.len() {
        return Err(IntcoError::UnknownElement(z));
    }
    Ok(z)
}

fn titlecase(s: &str) -> String {
    let mut cs = s.chars();
    match cs.next() {
        Some(c) => c.to_uppercase().chain(cs.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// look up the atomic number for `s`, ignoring case
pub fn symbol_to_z(s: &str) -> Result<usize, IntcoError> {
    let t = titlecase(s);
    NUMBER_TO_SYMBOL
        .iter()
        .skip(1)
        .position(|&x| x == t)
        .map(|p| p + 1)
        .ok_or_else(|| IntcoError::UnknownSymbol(s.to_owned()))
}

pub fn symbol(z: usize) -> Result<&'static str, IntcoError> {
    Ok(NUMBER_TO_SYMBOL[check(z)?])
}

pub fn mass(z: usize) -> Result<f64, IntcoError> {
    Ok(MASSES[check(z)?])
}

/// covalent radius in bohr
pub fn covalent_radius(z: usize) -> Result<f64, IntcoError> {
    Ok(COVALENT_RADII[check(z)?] / ANGBOHR)
}

/// row of the periodic table
pub fn period(z: usize) -> Result<usize, IntcoError> {
    Ok(match check(z)? {
        1..=2 => 1,
        3..=10 => 2,
        11..=18 => 3,
        _ => 4,
    })
}
