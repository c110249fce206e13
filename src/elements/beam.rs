//! Beam element - 3D Timoshenko frame member with a rectangular section

use super::{CenterStress, EnergySplit, Formulation, Structure, ALL_DOFS, DOFS_PER_NODE};
use crate::error::FEAResult;
use crate::math::{
    beam_local_stiffness, block_rotation, half_quadratic, line_direction_cosines, to_dynamic,
    to_global, BeamSection, Mat, Vec as FEVec,
};

/// A two-node frame member carrying all six DOFs per node
///
/// The section width lies along the local y axis and the height along local
/// z; local z is in the vertical plane through the member.
#[derive(Debug, Clone)]
pub struct Beam {
    section: BeamSection,
    length: f64,
    /// Global-to-local transformation (12x12)
    transformation: Mat,
    /// Local flexural stiffness, used to recover shear forces
    local_flexure: Mat,
    axial: Mat,
    torsion: Mat,
    flexure: Mat,
    stiffness: Mat,
}

impl Beam {
    pub fn new(structure: &Structure, coords: &[[f64; 3]; 2]) -> FEAResult<Self> {
        let section = BeamSection::rectangular(
            structure.width()?,
            structure.height()?,
            structure.youngs_modulus()?,
            structure.poisson()?,
        );

        let rotation = line_direction_cosines(&coords[0], &coords[1])?;
        let length = crate::math::vec_between(&coords[0], &coords[1]).norm();
        let transformation = block_rotation(&rotation, 4);

        let local = beam_local_stiffness(&section, length);
        let axial = to_global(&to_dynamic(&local.axial), &transformation);
        let torsion = to_global(&to_dynamic(&local.torsion), &transformation);
        let local_flexure = to_dynamic(&local.flexure);
        let flexure = to_global(&local_flexure, &transformation);
        let stiffness = &axial + &torsion + &flexure;

        Ok(Self {
            section,
            length,
            transformation,
            local_flexure,
            axial,
            torsion,
            flexure,
            stiffness,
        })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn section(&self) -> &BeamSection {
        &self.section
    }
}

impl Formulation for Beam {
    fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        ALL_DOFS
    }

    fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    fn volume(&self) -> f64 {
        self.section.a * self.length
    }

    /// Axial energy; torsion plus transverse shear energy V²L/(2·G·As) as
    /// shear; the rest of the flexural energy as bending
    fn energy_split(&self, d: &FEVec) -> EnergySplit {
        let flexural = half_quadratic(&self.flexure, d);

        let local = &self.transformation * d;
        let forces = &self.local_flexure * local;
        let shear_flex = self.length / (2.0 * self.section.g * self.section.shear_area);
        let transverse = (forces[1].powi(2) + forces[2].powi(2)) * shear_flex;

        EnergySplit {
            axial: half_quadratic(&self.axial, d),
            shear: half_quadratic(&self.torsion, d) + transverse,
            bend: flexural - transverse,
        }
    }

    /// Axial stress N/A at mid-length
    fn stress_at_center(&self, d: &FEVec) -> FEAResult<CenterStress> {
        let local = &self.transformation * d;
        let strain = (local[6] - local[0]) / self.length;
        Ok(CenterStress::from_components([
            self.section.e * strain,
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cantilever(coords: [[f64; 3]; 2]) -> Beam {
        let structure = Structure::beam(0.1, 0.2, 0.3, 200e9).unwrap();
        Beam::new(&structure, &coords).unwrap()
    }

    #[test]
    fn test_global_stiffness_symmetric() {
        let beam = cantilever([[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]]);
        let k = beam.stiffness();
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], max_relative = 1e-9, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_rigid_translation_has_no_energy() {
        let beam = cantilever([[0.0, 0.0, 0.0], [2.0, 1.0, 0.5]]);
        let mut d = FEVec::zeros(12);
        for i in [0, 6] {
            d[i] = 0.3;
            d[i + 1] = -0.1;
            d[i + 2] = 0.2;
        }
        assert!(beam.energy_split(&d).total().abs() < 1e-3);
    }

    #[test]
    fn test_energy_split_sums_to_total() {
        let beam = cantilever([[0.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let mut d = FEVec::zeros(12);
        d[6] = 1e-4;
        d[8] = -2e-3;
        d[9] = 1e-4;
        d[10] = 1e-3;
        let split = beam.energy_split(&d);
        assert_relative_eq!(
            split.total(),
            half_quadratic(beam.stiffness(), &d),
            max_relative = 1e-10
        );
        assert!(split.axial > 0.0);
        assert!(split.shear > 0.0);
        assert!(split.bend > 0.0);
    }

    #[test]
    fn test_axial_stress() {
        let beam = cantilever([[0.0, 0.0, 0.0], [0.0, 2.0, 0.0]]);
        let mut d = FEVec::zeros(12);
        d[7] = 1e-3;
        let stress = beam.stress_at_center(&d).unwrap();
        assert_relative_eq!(stress.components[0], 200e9 * 5e-4, max_relative = 1e-12);
    }
}
