//! 8-node hexahedron (trilinear brick) math
//!
//! Node ordering:
//! ```text
//!        8----------7
//!       /|         /|
//!      / |        / |
//!     5----------6  |
//!     |  4-------|--3
//!     | /        | /
//!     |/         |/
//!     1----------2
//! ```
//! Bottom face 1-2-3-4 at ζ = -1, top face 5-6-7-8 at ζ = +1.
//! DOFs: 3 translations per node, 24 in total. Integration: 2×2×2 Gauss.

use nalgebra::{Matrix6, SMatrix};

use super::{Mat, Mat3, Vec, Vec3, GAUSS_2};
use crate::error::{FEAError, FEAResult};

/// Natural coordinates of the eight corner nodes
const CORNERS: [(f64, f64, f64); 8] = [
    (-1.0, -1.0, -1.0),
    (1.0, -1.0, -1.0),
    (1.0, 1.0, -1.0),
    (-1.0, 1.0, -1.0),
    (-1.0, -1.0, 1.0),
    (1.0, -1.0, 1.0),
    (1.0, 1.0, 1.0),
    (-1.0, 1.0, 1.0),
];

/// Normal and shear parts of the 24x24 stiffness
#[derive(Debug, Clone)]
pub struct SolidStiffness {
    pub normal: Mat,
    pub shear: Mat,
}

impl SolidStiffness {
    pub fn total(&self) -> Mat {
        &self.normal + &self.shear
    }
}

/// Shape function derivatives with respect to natural coordinates
///
/// Rows: dN/dξ, dN/dη, dN/dζ.
fn natural_derivatives(xi: f64, eta: f64, zeta: f64) -> [[f64; 8]; 3] {
    let mut dn = [[0.0; 8]; 3];
    for (i, &(xi_n, eta_n, zeta_n)) in CORNERS.iter().enumerate() {
        dn[0][i] = xi_n * (1.0 + eta * eta_n) * (1.0 + zeta * zeta_n) / 8.0;
        dn[1][i] = (1.0 + xi * xi_n) * eta_n * (1.0 + zeta * zeta_n) / 8.0;
        dn[2][i] = (1.0 + xi * xi_n) * (1.0 + eta * eta_n) * zeta_n / 8.0;
    }
    dn
}

/// Strain-displacement matrix and Jacobian determinant at a natural point
///
/// Strains in Voigt order [exx, eyy, ezz, gxy, gyz, gzx].
fn strain_displacement(coords: &[[f64; 3]; 8], xi: f64, eta: f64, zeta: f64) -> FEAResult<(SMatrix<f64, 6, 24>, f64)> {
    let dn = natural_derivatives(xi, eta, zeta);

    let mut j = Mat3::zeros();
    for (i, c) in coords.iter().enumerate() {
        for row in 0..3 {
            for col in 0..3 {
                j[(row, col)] += dn[row][i] * c[col];
            }
        }
    }
    let det = j.determinant();
    if det <= 0.0 {
        return Err(FEAError::InvalidGeometry(format!(
            "hexahedron has a non-positive Jacobian ({det:e}); check node ordering"
        )));
    }
    let j_inv = j
        .try_inverse()
        .ok_or_else(|| FEAError::InvalidGeometry("singular hexahedron Jacobian".to_string()))?;

    let mut b = SMatrix::<f64, 6, 24>::zeros();
    for i in 0..8 {
        let d = j_inv * Vec3::new(dn[0][i], dn[1][i], dn[2][i]);
        let col = i * 3;

        b[(0, col)] = d[0];
        b[(1, col + 1)] = d[1];
        b[(2, col + 2)] = d[2];

        b[(3, col)] = d[1];
        b[(3, col + 1)] = d[0];

        b[(4, col + 1)] = d[2];
        b[(4, col + 2)] = d[1];

        b[(5, col + 2)] = d[0];
        b[(5, col)] = d[2];
    }
    Ok((b, det))
}

/// Isotropic 3D elasticity matrix split into normal and shear blocks
fn constitutive(e: f64, nu: f64) -> (Matrix6<f64>, Matrix6<f64>) {
    let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let mut normal = Matrix6::zeros();
    for i in 0..3 {
        for k in 0..3 {
            normal[(i, k)] = factor * if i == k { 1.0 - nu } else { nu };
        }
    }
    let mut shear = Matrix6::zeros();
    for i in 3..6 {
        shear[(i, i)] = factor * (1.0 - 2.0 * nu) / 2.0;
    }
    (normal, shear)
}

/// Stiffness of an 8-node hexahedron, split into normal and shear parts
pub fn hexahedron_stiffness(coords: &[[f64; 3]; 8], e: f64, nu: f64) -> FEAResult<SolidStiffness> {
    let (d_normal, d_shear) = constitutive(e, nu);
    let mut normal = SMatrix::<f64, 24, 24>::zeros();
    let mut shear = SMatrix::<f64, 24, 24>::zeros();

    for &zeta in &[-GAUSS_2, GAUSS_2] {
        for &eta in &[-GAUSS_2, GAUSS_2] {
            for &xi in &[-GAUSS_2, GAUSS_2] {
                let (b, det) = strain_displacement(coords, xi, eta, zeta)?;
                let bt = b.transpose();
                normal += bt * d_normal * b * det;
                shear += bt * d_shear * b * det;
            }
        }
    }

    Ok(SolidStiffness {
        normal: super::to_dynamic(&normal),
        shear: super::to_dynamic(&shear),
    })
}

/// Volume by 2×2×2 Gauss integration of det(J)
pub fn hexahedron_volume(coords: &[[f64; 3]; 8]) -> FEAResult<f64> {
    let mut volume = 0.0;
    for &zeta in &[-GAUSS_2, GAUSS_2] {
        for &eta in &[-GAUSS_2, GAUSS_2] {
            for &xi in &[-GAUSS_2, GAUSS_2] {
                volume += strain_displacement(coords, xi, eta, zeta)?.1;
            }
        }
    }
    Ok(volume)
}

/// Stress at the element center, Voigt order [sx, sy, sz, txy, tyz, tzx]
pub fn hexahedron_center_stress(coords: &[[f64; 3]; 8], e: f64, nu: f64, u: &Vec) -> FEAResult<[f64; 6]> {
    let (b, _) = strain_displacement(coords, 0.0, 0.0, 0.0)?;
    let (d_normal, d_shear) = constitutive(e, nu);
    let u24 = SMatrix::<f64, 24, 1>::from_column_slice(u.as_slice());
    let sigma = (d_normal + d_shear) * (b * u24);
    let mut out = [0.0; 6];
    for (i, value) in out.iter_mut().enumerate() {
        *value = sigma[i];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube(scale: [f64; 3]) -> [[f64; 3]; 8] {
        let mut coords = [[0.0; 3]; 8];
        for (i, &(xi, eta, zeta)) in CORNERS.iter().enumerate() {
            coords[i] = [
                scale[0] * (xi + 1.0) / 2.0,
                scale[1] * (eta + 1.0) / 2.0,
                scale[2] * (zeta + 1.0) / 2.0,
            ];
        }
        coords
    }

    #[test]
    fn test_partition_of_unity_derivatives() {
        let dn = natural_derivatives(0.3, -0.2, 0.7);
        for row in dn.iter() {
            assert_relative_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_volume() {
        let coords = unit_cube([2.0, 3.0, 0.5]);
        assert_relative_eq!(hexahedron_volume(&coords).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_element_rejected() {
        let mut coords = unit_cube([1.0, 1.0, 1.0]);
        coords.swap(0, 4);
        coords.swap(1, 5);
        coords.swap(2, 6);
        coords.swap(3, 7);
        assert!(matches!(
            hexahedron_stiffness(&coords, 1.0, 0.3),
            Err(FEAError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_rigid_modes_have_no_force() {
        let coords = unit_cube([1.0, 2.0, 1.5]);
        let k = hexahedron_stiffness(&coords, 210e9, 0.3).unwrap().total();

        // Translation along y and a small rotation about z
        let mut u = Vec::zeros(24);
        for (i, c) in coords.iter().enumerate() {
            u[i * 3 + 1] = 1.0 + 0.01 * c[0];
            u[i * 3] = -0.01 * c[1];
        }
        let f = &k * &u;
        assert!(f.norm() < 1e-6 * 210e9, "residual force {}", f.norm());
    }

    #[test]
    fn test_uniaxial_center_stress() {
        let coords = unit_cube([1.0, 1.0, 1.0]);
        let (e, nu, strain) = (1000.0, 0.3, 1e-3);
        let mut u = Vec::zeros(24);
        for (i, c) in coords.iter().enumerate() {
            u[i * 3] = strain * c[0];
            u[i * 3 + 1] = -nu * strain * c[1];
            u[i * 3 + 2] = -nu * strain * c[2];
        }
        let s = hexahedron_center_stress(&coords, e, nu, &u).unwrap();
        assert_relative_eq!(s[0], e * strain, epsilon = 1e-9);
        assert_relative_eq!(s[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(s[3], 0.0, epsilon = 1e-9);
    }
}
