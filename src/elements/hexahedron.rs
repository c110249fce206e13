//! Solid element - 8-node trilinear hexahedron

use super::{CenterStress, EnergySplit, Formulation, Structure, DOFS_PER_NODE, TRANSLATIONS};
use crate::error::FEAResult;
use crate::math::solid::{hexahedron_center_stress, hexahedron_stiffness, hexahedron_volume};
use crate::math::{half_quadratic, Mat, Vec as FEVec};

/// A solid block; only translations are active at its nodes
#[derive(Debug, Clone)]
pub struct Hexahedron {
    coords: [[f64; 3]; 8],
    e0: f64,
    poisson: f64,
    volume: f64,
    normal: Mat,
    shear: Mat,
    stiffness: Mat,
}

impl Hexahedron {
    pub fn new(structure: &Structure, coords: &[[f64; 3]; 8]) -> FEAResult<Self> {
        let e0 = structure.youngs_modulus()?;
        let poisson = structure.poisson()?;
        let split = hexahedron_stiffness(coords, e0, poisson)?;
        let stiffness = split.total();

        Ok(Self {
            coords: *coords,
            e0,
            poisson,
            volume: hexahedron_volume(coords)?,
            normal: split.normal,
            shear: split.shear,
            stiffness,
        })
    }
}

impl Formulation for Hexahedron {
    fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        TRANSLATIONS
    }

    fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    /// Normal-stress energy as axial, shear-stress energy as shear
    fn energy_split(&self, d: &FEVec) -> EnergySplit {
        EnergySplit {
            axial: half_quadratic(&self.normal, d),
            shear: half_quadratic(&self.shear, d),
            bend: 0.0,
        }
    }

    fn stress_at_center(&self, d: &FEVec) -> FEAResult<CenterStress> {
        let components = hexahedron_center_stress(&self.coords, self.e0, self.poisson, d)?;
        Ok(CenterStress::from_components(components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube(size: f64) -> [[f64; 3]; 8] {
        [
            [0.0, 0.0, 0.0],
            [size, 0.0, 0.0],
            [size, size, 0.0],
            [0.0, size, 0.0],
            [0.0, 0.0, size],
            [size, 0.0, size],
            [size, size, size],
            [0.0, size, size],
        ]
    }

    #[test]
    fn test_uniaxial_energy() {
        // Uniaxial stress state: energy = ½·E·ε²·V, all in normal components
        let structure = Structure::quad_hexahedron(0.25, 1000.0).unwrap();
        let coords = cube(2.0);
        let hex = Hexahedron::new(&structure, &coords).unwrap();
        assert_relative_eq!(hex.volume(), 8.0, epsilon = 1e-12);

        let strain = 1e-3;
        let mut d = FEVec::zeros(24);
        for (i, c) in coords.iter().enumerate() {
            d[i * 3] = strain * c[0];
            d[i * 3 + 1] = -0.25 * strain * c[1];
            d[i * 3 + 2] = -0.25 * strain * c[2];
        }
        let split = hex.energy_split(&d);
        assert_relative_eq!(split.axial, 0.5 * 1000.0 * strain * strain * 8.0, max_relative = 1e-9);
        assert_relative_eq!(split.shear, 0.0, epsilon = 1e-12);

        let stress = hex.stress_at_center(&d).unwrap();
        assert_relative_eq!(stress.von_mises, 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_pure_shear_energy() {
        let structure = Structure::quad_hexahedron(0.3, 1000.0).unwrap();
        let coords = cube(1.0);
        let hex = Hexahedron::new(&structure, &coords).unwrap();
        let gamma = 1e-3;
        let mut d = FEVec::zeros(24);
        for (i, c) in coords.iter().enumerate() {
            d[i * 3] = gamma * c[1];
        }
        let split = hex.energy_split(&d);
        assert_relative_eq!(split.axial, 0.0, epsilon = 1e-12);
        let g = 1000.0 / (2.0 * 1.3);
        assert_relative_eq!(split.shear, 0.5 * g * gamma * gamma, max_relative = 1e-9);
    }
}
