//! Truss element - axial-only two-node member

use super::{CenterStress, EnergySplit, Formulation, Structure, DOFS_PER_NODE, TRANSLATIONS};
use crate::error::{FEAError, FEAResult};
use crate::math::{half_quadratic, vec_between, Mat, Vec as FEVec, Vec3};

/// A pin-ended axial member
///
/// Local DOFs: DX, DY, DZ at each end (6 in total).
#[derive(Debug, Clone)]
pub struct Truss {
    area: f64,
    e0: f64,
    length: f64,
    direction: Vec3,
    stiffness: Mat,
}

impl Truss {
    pub fn new(structure: &Structure, coords: &[[f64; 3]; 2]) -> FEAResult<Self> {
        let area = structure.area()?;
        let e0 = structure.youngs_modulus()?;

        let axis = vec_between(&coords[0], &coords[1]);
        let length = axis.norm();
        if length < 1e-10 {
            return Err(FEAError::InvalidGeometry(format!(
                "truss has zero length at {:?}",
                coords[0]
            )));
        }
        let direction = axis / length;

        // A·E/L·[nnᵀ −nnᵀ; −nnᵀ nnᵀ], one block computed and mirrored
        let block = direction * direction.transpose() * (area * e0 / length);
        let mut stiffness = Mat::zeros(6, 6);
        for row in 0..3 {
            for col in 0..3 {
                let k = block[(row, col)];
                stiffness[(row, col)] = k;
                stiffness[(row + 3, col + 3)] = k;
                stiffness[(row, col + 3)] = -k;
                stiffness[(row + 3, col)] = -k;
            }
        }

        Ok(Self {
            area,
            e0,
            length,
            direction,
            stiffness,
        })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Axial strain from the 6 end translations (tension positive)
    pub fn axial_strain(&self, d: &FEVec) -> f64 {
        let elongation = (0..3)
            .map(|i| self.direction[i] * (d[i + 3] - d[i]))
            .sum::<f64>();
        elongation / self.length
    }
}

impl Formulation for Truss {
    fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        TRANSLATIONS
    }

    fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    fn volume(&self) -> f64 {
        self.area * self.length
    }

    fn energy_split(&self, d: &FEVec) -> EnergySplit {
        EnergySplit {
            axial: half_quadratic(&self.stiffness, d),
            ..Default::default()
        }
    }

    fn stress_at_center(&self, d: &FEVec) -> FEAResult<CenterStress> {
        let sigma = self.e0 * self.axial_strain(d);
        Ok(CenterStress::from_components([sigma, 0.0, 0.0, 0.0, 0.0, 0.0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diagonal_truss_stiffness() {
        let structure = Structure::truss(2.0, 100.0).unwrap();
        let truss = Truss::new(&structure, &[[0.0, 0.0, 0.0], [3.0, 4.0, 0.0]]).unwrap();
        let k = truss.stiffness();
        // AE/L = 40, n = (0.6, 0.8, 0)
        assert_relative_eq!(k[(0, 0)], 40.0 * 0.36, epsilon = 1e-12);
        assert_relative_eq!(k[(0, 1)], 40.0 * 0.48, epsilon = 1e-12);
        assert_relative_eq!(k[(0, 3)], -40.0 * 0.36, epsilon = 1e-12);
        assert_relative_eq!(k[(2, 2)], 0.0);
        assert_relative_eq!(truss.volume(), 10.0);
    }

    #[test]
    fn test_energy_and_stress() {
        let structure = Structure::truss(1.0, 1000.0).unwrap();
        let truss = Truss::new(&structure, &[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]).unwrap();
        let d = FEVec::from_vec(vec![0.0, 0.0, 0.0, 0.01, 0.0, 0.0]);
        // ½·(EA/L)·δ² = ½·500·1e-4
        let split = truss.energy_split(&d);
        assert_relative_eq!(split.axial, 0.025, epsilon = 1e-12);
        assert_eq!(split.bend, 0.0);
        let stress = truss.stress_at_center(&d).unwrap();
        assert_relative_eq!(stress.components[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(stress.von_mises, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_length() {
        let structure = Structure::truss(1.0, 1.0).unwrap();
        assert!(Truss::new(&structure, &[[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]]).is_err());
    }
}
