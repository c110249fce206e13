//! Mathematical utilities for FEA calculations

pub mod shell;
pub mod solid;
pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, Vector3};

use crate::error::{FEAError, FEAResult};

// Re-export sparse utilities
pub use sparse::{
    permute_symmetric, reverse_cuthill_mckee, solve_bicgstab, solve_pcg, sparse_matvec,
    SkylineCholesky, SparseMatrixBuilder,
};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 12x12 matrix for beam stiffness
pub type Mat12 = SMatrix<f64, 12, 12>;

/// Gauss point location for 2-point quadrature (weights are 1.0)
pub const GAUSS_2: f64 = 0.577_350_269_189_625_8;

/// Shear correction factor for rectangular sections
pub const SHEAR_CORRECTION: f64 = 5.0 / 6.0;

/// Vector from `a` to `b`
pub fn vec_between(a: &[f64; 3], b: &[f64; 3]) -> Vec3 {
    Vec3::new(b[0] - a[0], b[1] - a[1], b[2] - a[2])
}

/// Direction cosine matrix of a line element
///
/// Rows are the local x (along the member), y and z axes in global
/// coordinates. Global Z is "up": the local z axis lies in the vertical plane
/// through the member. Vertical members use global X as the reference.
pub fn line_direction_cosines(i_node: &[f64; 3], j_node: &[f64; 3]) -> FEAResult<Mat3> {
    let axis = vec_between(i_node, j_node);
    let length = axis.norm();
    if length < 1e-10 {
        return Err(FEAError::InvalidGeometry(format!(
            "line element has zero length between {i_node:?} and {j_node:?}"
        )));
    }
    let x = axis / length;

    let reference = if x.z.abs() > 1.0 - 1e-9 {
        Vec3::x()
    } else {
        Vec3::z()
    };
    let y = reference.cross(&x).normalize();
    let z = x.cross(&y);

    Ok(Mat3::new(
        x[0], x[1], x[2],
        y[0], y[1], y[2],
        z[0], z[1], z[2],
    ))
}

/// Block-diagonal transformation with `blocks` copies of a 3x3 rotation
pub fn block_rotation(r: &Mat3, blocks: usize) -> Mat {
    let mut t = Mat::zeros(3 * blocks, 3 * blocks);
    for i in 0..blocks {
        let offset = i * 3;
        for row in 0..3 {
            for col in 0..3 {
                t[(offset + row, offset + col)] = r[(row, col)];
            }
        }
    }
    t
}

/// Rotate a local stiffness matrix into global coordinates: Tᵀ·K·T
pub fn to_global(k_local: &Mat, t: &Mat) -> Mat {
    t.transpose() * k_local * t
}

/// Torsion constant of a solid rectangle
pub fn rectangular_torsion_constant(width: f64, height: f64) -> f64 {
    let (a, b) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };
    let ratio = b / a;
    a * b.powi(3) * (1.0 / 3.0 - 0.21 * ratio * (1.0 - ratio.powi(4) / 12.0))
}

/// Section and material constants of a prismatic beam
#[derive(Debug, Clone, Copy)]
pub struct BeamSection {
    /// Modulus of elasticity
    pub e: f64,
    /// Shear modulus
    pub g: f64,
    /// Cross-sectional area
    pub a: f64,
    /// Moment of inertia about local y (deflection along local z)
    pub iy: f64,
    /// Moment of inertia about local z (deflection along local y)
    pub iz: f64,
    /// Torsional constant
    pub j: f64,
    /// Effective shear area
    pub shear_area: f64,
}

impl BeamSection {
    /// Solid rectangle; width along local y, height along local z
    pub fn rectangular(width: f64, height: f64, e: f64, poisson: f64) -> Self {
        let a = width * height;
        Self {
            e,
            g: e / (2.0 * (1.0 + poisson)),
            a,
            iy: width * height.powi(3) / 12.0,
            iz: height * width.powi(3) / 12.0,
            j: rectangular_torsion_constant(width, height),
            shear_area: SHEAR_CORRECTION * a,
        }
    }

    /// Shear deformation factors (φy for the xy plane, φz for the xz plane)
    pub fn shear_factors(&self, length: f64) -> (f64, f64) {
        let l2 = length * length;
        let phi_y = 12.0 * self.e * self.iz / (self.g * self.shear_area * l2);
        let phi_z = 12.0 * self.e * self.iy / (self.g * self.shear_area * l2);
        (phi_y, phi_z)
    }
}

/// Local beam stiffness split by deformation mode
#[derive(Debug, Clone)]
pub struct BeamStiffness {
    /// Axial terms
    pub axial: Mat12,
    /// Saint-Venant torsion terms
    pub torsion: Mat12,
    /// Bending in both planes, including shear deformation
    pub flexure: Mat12,
}

impl BeamStiffness {
    pub fn total(&self) -> Mat12 {
        self.axial + self.torsion + self.flexure
    }
}

/// Compute the local stiffness matrix for a 3D Timoshenko beam
///
/// DOF order per node: DX, DY, DZ, RX, RY, RZ (local axes).
pub fn beam_local_stiffness(section: &BeamSection, length: f64) -> BeamStiffness {
    let l = length;
    let l2 = l * l;
    let (phi_y, phi_z) = section.shear_factors(l);

    let ea_l = section.e * section.a / l;
    let gj_l = section.g * section.j / l;

    let mut axial = Mat12::zeros();
    axial[(0, 0)] = ea_l;
    axial[(0, 6)] = -ea_l;
    axial[(6, 0)] = -ea_l;
    axial[(6, 6)] = ea_l;

    let mut torsion = Mat12::zeros();
    torsion[(3, 3)] = gj_l;
    torsion[(3, 9)] = -gj_l;
    torsion[(9, 3)] = -gj_l;
    torsion[(9, 9)] = gj_l;

    // Bending in the local xy plane (v, rz)
    let c = section.e * section.iz / (l2 * l * (1.0 + phi_y));
    // Bending in the local xz plane (w, ry)
    let d = section.e * section.iy / (l2 * l * (1.0 + phi_z));

    #[rustfmt::skip]
    let upper = [
        (1, 1, 12.0 * c),  (1, 5, 6.0 * l * c),  (1, 7, -12.0 * c), (1, 11, 6.0 * l * c),
        (5, 5, (4.0 + phi_y) * l2 * c), (5, 7, -6.0 * l * c), (5, 11, (2.0 - phi_y) * l2 * c),
        (7, 7, 12.0 * c),  (7, 11, -6.0 * l * c),
        (11, 11, (4.0 + phi_y) * l2 * c),
        (2, 2, 12.0 * d),  (2, 4, -6.0 * l * d), (2, 8, -12.0 * d), (2, 10, -6.0 * l * d),
        (4, 4, (4.0 + phi_z) * l2 * d), (4, 8, 6.0 * l * d), (4, 10, (2.0 - phi_z) * l2 * d),
        (8, 8, 12.0 * d),  (8, 10, 6.0 * l * d),
        (10, 10, (4.0 + phi_z) * l2 * d),
    ];

    let mut flexure = Mat12::zeros();
    for &(row, col, value) in &upper {
        flexure[(row, col)] = value;
        flexure[(col, row)] = value;
    }

    BeamStiffness {
        axial,
        torsion,
        flexure,
    }
}

/// Convert a fixed-size matrix into a dynamic one
pub fn to_dynamic<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> Mat {
    Mat::from_column_slice(R, C, m.as_slice())
}

/// Quadratic form ½·dᵀ·K·d
pub fn half_quadratic(k: &Mat, d: &Vec) -> f64 {
    0.5 * d.dot(&(k * d))
}

/// Von Mises equivalent stress from Voigt components [sx, sy, sz, txy, tyz, tzx]
pub fn von_mises(s: &[f64; 6]) -> f64 {
    let normal = (s[0] - s[1]).powi(2) + (s[1] - s[2]).powi(2) + (s[2] - s[0]).powi(2);
    let shear = s[3].powi(2) + s[4].powi(2) + s[5].powi(2);
    (0.5 * normal + 3.0 * shear).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_direction_cosines_horizontal() {
        let r = line_direction_cosines(&[0.0, 0.0, 0.0], &[10.0, 0.0, 0.0]).unwrap();
        // local x = global X, local y = global Y, local z = global Z
        assert_relative_eq!(r[(0, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(1, 1)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(2, 2)], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_direction_cosines_vertical() {
        let r = line_direction_cosines(&[0.0, 0.0, 0.0], &[0.0, 0.0, 3.0]).unwrap();
        assert_relative_eq!(r[(0, 2)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(1, 1)], -1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(2, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(line_direction_cosines(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_local_stiffness_symmetry() {
        let section = BeamSection::rectangular(0.2, 0.4, 200e9, 0.3);
        let k = beam_local_stiffness(&section, 5.0).total();
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_cantilever_tip_deflection_with_shear() {
        // Tip load P on a cantilever: δ = PL³/(3EI) + PL/(G·As)
        let section = BeamSection::rectangular(0.1, 0.3, 30e9, 0.2);
        let l = 2.0;
        let k = beam_local_stiffness(&section, l).total();

        // Free DOFs at the j-node in the xz plane: w (8) and ry (10)
        let k_ff = nalgebra::Matrix2::new(k[(8, 8)], k[(8, 10)], k[(10, 8)], k[(10, 10)]);
        let p = 1000.0;
        let u = k_ff.try_inverse().unwrap() * nalgebra::Vector2::new(p, 0.0);

        let expected = p * l.powi(3) / (3.0 * section.e * section.iy)
            + p * l / (section.g * section.shear_area);
        assert_relative_eq!(u[0], expected, max_relative = 1e-10);
    }

    #[test]
    fn test_von_mises_uniaxial() {
        assert_relative_eq!(von_mises(&[100.0, 0.0, 0.0, 0.0, 0.0, 0.0]), 100.0);
        assert_relative_eq!(von_mises(&[0.0, 0.0, 0.0, 10.0, 0.0, 0.0]), 10.0 * 3.0_f64.sqrt());
    }
}
