//! Flat shell element - 4-node quadrilateral with membrane and plate bending

use super::{CenterStress, EnergySplit, Formulation, Structure, ALL_DOFS, DOFS_PER_NODE};
use crate::error::FEAResult;
use crate::math::shell::{shell_center_stress, shell_local_stiffness, ShellFrame};
use crate::math::{half_quadratic, to_global, Mat, Vec as FEVec};

#[derive(Debug, Clone)]
pub struct FlatShell {
    frame: ShellFrame,
    thickness: f64,
    e0: f64,
    poisson: f64,
    transformation: Mat,
    membrane: Mat,
    shear: Mat,
    bending: Mat,
    stiffness: Mat,
}

impl FlatShell {
    pub fn new(structure: &Structure, coords: &[[f64; 3]; 4]) -> FEAResult<Self> {
        let thickness = structure.thickness()?;
        let e0 = structure.youngs_modulus()?;
        let poisson = structure.poisson()?;

        let frame = ShellFrame::new(coords)?;
        let transformation = frame.transformation();
        let local = shell_local_stiffness(&frame, thickness, e0, poisson)?;

        let membrane = to_global(&local.membrane, &transformation);
        let shear = to_global(&local.shear, &transformation);
        let bending = to_global(&local.bending, &transformation);
        let stiffness = &membrane + &shear + &bending;

        Ok(Self {
            frame,
            thickness,
            e0,
            poisson,
            transformation,
            membrane,
            shear,
            bending,
            stiffness,
        })
    }

    pub fn area(&self) -> f64 {
        self.frame.area()
    }
}

impl Formulation for FlatShell {
    fn freedom_signature(&self) -> [bool; DOFS_PER_NODE] {
        ALL_DOFS
    }

    fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    fn volume(&self) -> f64 {
        self.frame.area() * self.thickness
    }

    fn energy_split(&self, d: &FEVec) -> EnergySplit {
        EnergySplit {
            axial: half_quadratic(&self.membrane, d),
            shear: half_quadratic(&self.shear, d),
            bend: half_quadratic(&self.bending, d),
        }
    }

    fn stress_at_center(&self, d: &FEVec) -> FEAResult<CenterStress> {
        let local = &self.transformation * d;
        let components = shell_center_stress(&self.frame, self.thickness, self.e0, self.poisson, &local)?;
        Ok(CenterStress::from_components(components))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vertical_panel() -> FlatShell {
        let structure = Structure::flat_shell(0.02, 0.3, 70e9).unwrap();
        let coords = [
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 2.0],
            [0.0, 0.0, 2.0],
        ];
        FlatShell::new(&structure, &coords).unwrap()
    }

    #[test]
    fn test_volume() {
        assert_relative_eq!(vertical_panel().volume(), 0.04, epsilon = 1e-12);
    }

    #[test]
    fn test_in_plane_stretch_is_membrane_energy() {
        let shell = vertical_panel();
        // Stretch along global Z (in the panel's plane)
        let mut d = FEVec::zeros(24);
        d[2 * 6 + 2] = 1e-4;
        d[3 * 6 + 2] = 1e-4;
        let split = shell.energy_split(&d);
        assert!(split.axial > 0.0);
        assert_relative_eq!(split.shear, 0.0, epsilon = 1e-9);
        assert_relative_eq!(split.bend, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_plane_is_bending_and_shear() {
        let shell = vertical_panel();
        // Push the top edge out of plane (global X)
        let mut d = FEVec::zeros(24);
        d[2 * 6] = 1e-3;
        d[3 * 6] = 1e-3;
        let split = shell.energy_split(&d);
        assert_relative_eq!(split.axial, 0.0, epsilon = 1e-9);
        assert!(split.shear > 0.0);
    }

    #[test]
    fn test_symmetric_global_stiffness() {
        let k = vertical_panel().stiffness().clone();
        let diff = (&k - k.transpose()).abs().max();
        assert!(diff <= 1e-9 * k.abs().max());
    }
}
