//! Flat shell element math
//!
//! A 4-node flat quadrilateral built from two uncoupled parts:
//! - Membrane (in-plane) stiffness: bilinear isoparametric plane stress, 2x2 Gauss
//! - Mindlin plate bending: 2x2 Gauss for curvature; transverse shear from
//!   MITC4 assumed covariant strains tied at the edge midpoints (free of
//!   shear locking and of spurious zero-energy modes)
//! - Drilling DOF (RZ) stabilized with a weak spring
//!
//! Local DOF order per node: DX, DY, DZ, RX, RY, RZ (24 in total). Nodes are
//! ordered around the quad; natural coordinates of nodes 1..4 are
//! (-1,-1), (1,-1), (1,1), (-1,1).

use super::{block_rotation, vec_between, Mat, Mat3, Vec, Vec3, GAUSS_2, SHEAR_CORRECTION};
use crate::error::{FEAError, FEAResult};

/// Natural coordinates of the four corner nodes
const CORNERS: [(f64, f64); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

/// Membrane, transverse shear and bending (incl. drilling) parts of the
/// local 24x24 stiffness
#[derive(Debug, Clone)]
pub struct ShellStiffness {
    pub membrane: Mat,
    pub shear: Mat,
    pub bending: Mat,
}

impl ShellStiffness {
    pub fn total(&self) -> Mat {
        &self.membrane + &self.shear + &self.bending
    }
}

/// Local plane frame of a flat quad
#[derive(Debug, Clone)]
pub struct ShellFrame {
    /// Rows are the local x, y, z axes in global coordinates
    pub rotation: Mat3,
    /// In-plane coordinates of the nodes relative to the centroid
    pub local: [[f64; 2]; 4],
}

impl ShellFrame {
    /// Build the frame: x along edge 1→2, z normal to the mid-plane, y = z × x
    pub fn new(coords: &[[f64; 3]; 4]) -> FEAResult<Self> {
        let diag_a = vec_between(&coords[0], &coords[2]);
        let diag_b = vec_between(&coords[1], &coords[3]);
        let normal = diag_a.cross(&diag_b);
        let size = diag_a.norm().max(diag_b.norm());
        if normal.norm() <= 1e-12 * size * size || size == 0.0 {
            return Err(FEAError::InvalidGeometry(
                "flat shell is degenerate (zero area)".to_string(),
            ));
        }
        let z = normal.normalize();

        let edge = vec_between(&coords[0], &coords[1]);
        let in_plane = edge - z * edge.dot(&z);
        if in_plane.norm() <= 1e-12 * size {
            return Err(FEAError::InvalidGeometry(
                "flat shell has a collapsed first edge".to_string(),
            ));
        }
        let x = in_plane.normalize();
        let y = z.cross(&x);

        let centroid = coords.iter().fold(Vec3::zeros(), |acc, c| {
            acc + Vec3::new(c[0], c[1], c[2]) / 4.0
        });

        let mut local = [[0.0; 2]; 4];
        let mut warp = 0.0_f64;
        for (i, c) in coords.iter().enumerate() {
            let p = Vec3::new(c[0], c[1], c[2]) - centroid;
            local[i] = [p.dot(&x), p.dot(&y)];
            warp = warp.max(p.dot(&z).abs());
        }
        if warp > 1e-6 * size {
            log::warn!("flat shell is warped by {warp:e}; nodes are projected onto its mid-plane");
        }

        Ok(Self {
            rotation: Mat3::new(
                x[0], x[1], x[2],
                y[0], y[1], y[2],
                z[0], z[1], z[2],
            ),
            local,
        })
    }

    /// 24x24 global-to-local transformation
    pub fn transformation(&self) -> Mat {
        block_rotation(&self.rotation, 8)
    }

    /// Area of the quad
    pub fn area(&self) -> f64 {
        let p = &self.local;
        // Shoelace formula
        let mut twice = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += p[i][0] * p[j][1] - p[j][0] * p[i][1];
        }
        0.5 * twice.abs()
    }
}

fn shape_functions(r: f64, s: f64) -> [f64; 4] {
    let mut n = [0.0; 4];
    for (i, &(ri, si)) in CORNERS.iter().enumerate() {
        n[i] = (1.0 + r * ri) * (1.0 + s * si) / 4.0;
    }
    n
}

fn natural_derivatives(r: f64, s: f64) -> ([f64; 4], [f64; 4]) {
    let mut dn_dr = [0.0; 4];
    let mut dn_ds = [0.0; 4];
    for (i, &(ri, si)) in CORNERS.iter().enumerate() {
        dn_dr[i] = ri * (1.0 + s * si) / 4.0;
        dn_ds[i] = si * (1.0 + r * ri) / 4.0;
    }
    (dn_dr, dn_ds)
}

/// J = [dx/dr  dy/dr]
///     [dx/ds  dy/ds]
fn jacobian(local: &[[f64; 2]; 4], dn_dr: &[f64; 4], dn_ds: &[f64; 4]) -> [[f64; 2]; 2] {
    let mut j = [[0.0; 2]; 2];
    for i in 0..4 {
        j[0][0] += dn_dr[i] * local[i][0];
        j[0][1] += dn_dr[i] * local[i][1];
        j[1][0] += dn_ds[i] * local[i][0];
        j[1][1] += dn_ds[i] * local[i][1];
    }
    j
}

fn checked_det(j: &[[f64; 2]; 2]) -> FEAResult<f64> {
    let det = j[0][0] * j[1][1] - j[0][1] * j[1][0];
    if det <= 0.0 {
        return Err(FEAError::InvalidGeometry(format!(
            "flat shell has a non-positive Jacobian ({det:e}); check node ordering"
        )));
    }
    Ok(det)
}

/// Physical shape function derivatives and the Jacobian determinant
fn shape_derivatives(local: &[[f64; 2]; 4], r: f64, s: f64) -> FEAResult<([f64; 4], [f64; 4], f64)> {
    let (dn_dr, dn_ds) = natural_derivatives(r, s);
    let j = jacobian(local, &dn_dr, &dn_ds);
    let det = checked_det(&j)?;

    let mut dn_dx = [0.0; 4];
    let mut dn_dy = [0.0; 4];
    for i in 0..4 {
        dn_dx[i] = (j[1][1] * dn_dr[i] - j[0][1] * dn_ds[i]) / det;
        dn_dy[i] = (-j[1][0] * dn_dr[i] + j[0][0] * dn_ds[i]) / det;
    }
    Ok((dn_dx, dn_dy, det))
}

/// Isotropic plane stress matrix scaled by `factor`
fn plane_stress(e: f64, nu: f64, factor: f64) -> Mat {
    let c = factor * e / (1.0 - nu * nu);
    Mat::from_row_slice(
        3,
        3,
        &[
            c, nu * c, 0.0,
            nu * c, c, 0.0,
            0.0, 0.0, c * (1.0 - nu) / 2.0,
        ],
    )
}

/// Membrane strains [ex, ey, gxy] from the 24 local DOFs
fn membrane_b(dn_dx: &[f64; 4], dn_dy: &[f64; 4]) -> Mat {
    let mut b = Mat::zeros(3, 24);
    for i in 0..4 {
        let u = i * 6;
        let v = u + 1;
        b[(0, u)] = dn_dx[i];
        b[(1, v)] = dn_dy[i];
        b[(2, u)] = dn_dy[i];
        b[(2, v)] = dn_dx[i];
    }
    b
}

/// Curvatures [kx, ky, kxy] from the 24 local DOFs
fn curvature_b(dn_dx: &[f64; 4], dn_dy: &[f64; 4]) -> Mat {
    let mut b = Mat::zeros(3, 24);
    for i in 0..4 {
        let rx = i * 6 + 3;
        let ry = i * 6 + 4;
        // kx = d(ry)/dx, ky = -d(rx)/dy, kxy = d(ry)/dy - d(rx)/dx
        b[(0, ry)] = dn_dx[i];
        b[(1, rx)] = -dn_dy[i];
        b[(2, rx)] = -dn_dx[i];
        b[(2, ry)] = dn_dy[i];
    }
    b
}

/// Covariant transverse shear strains [grz, gsz] at a point, from the 24
/// local DOFs
///
/// With gxz = dw/dx + ry and gyz = dw/dy - rx, the covariant components are
/// `g_r = dw/dr + ry·dx/dr - rx·dy/dr` and likewise for `s`.
fn covariant_shear_b(local: &[[f64; 2]; 4], r: f64, s: f64) -> [[f64; 24]; 2] {
    let n = shape_functions(r, s);
    let (dn_dr, dn_ds) = natural_derivatives(r, s);
    let j = jacobian(local, &dn_dr, &dn_ds);
    let mut b = [[0.0; 24]; 2];
    for i in 0..4 {
        let w = i * 6 + 2;
        let rx = w + 1;
        let ry = w + 2;
        b[0][w] = dn_dr[i];
        b[0][rx] = -n[i] * j[0][1];
        b[0][ry] = n[i] * j[0][0];
        b[1][w] = dn_ds[i];
        b[1][rx] = -n[i] * j[1][1];
        b[1][ry] = n[i] * j[1][0];
    }
    b
}

/// MITC4 shear strain tying points: `g_r` at (0, ±1), `g_s` at (±1, 0)
struct ShearTying {
    r_top: [f64; 24],
    r_bottom: [f64; 24],
    s_right: [f64; 24],
    s_left: [f64; 24],
}

impl ShearTying {
    fn new(local: &[[f64; 2]; 4]) -> Self {
        Self {
            r_top: covariant_shear_b(local, 0.0, 1.0)[0],
            r_bottom: covariant_shear_b(local, 0.0, -1.0)[0],
            s_right: covariant_shear_b(local, 1.0, 0.0)[1],
            s_left: covariant_shear_b(local, -1.0, 0.0)[1],
        }
    }

    /// Cartesian shear strains [gxz, gyz] at (r, s) from the interpolated
    /// covariant components
    fn b_matrix(&self, local: &[[f64; 2]; 4], r: f64, s: f64) -> FEAResult<(Mat, f64)> {
        let (dn_dr, dn_ds) = natural_derivatives(r, s);
        let j = jacobian(local, &dn_dr, &dn_ds);
        let det = checked_det(&j)?;

        let mut b = Mat::zeros(2, 24);
        for k in 0..24 {
            let g_r = 0.5 * (1.0 + s) * self.r_top[k] + 0.5 * (1.0 - s) * self.r_bottom[k];
            let g_s = 0.5 * (1.0 + r) * self.s_right[k] + 0.5 * (1.0 - r) * self.s_left[k];
            // [gxz, gyz] = J^-1 · [g_r, g_s]
            b[(0, k)] = (j[1][1] * g_r - j[0][1] * g_s) / det;
            b[(1, k)] = (-j[1][0] * g_r + j[0][0] * g_s) / det;
        }
        Ok((b, det))
    }
}

/// Local stiffness of a flat shell, split by deformation mode
pub fn shell_local_stiffness(frame: &ShellFrame, t: f64, e: f64, nu: f64) -> FEAResult<ShellStiffness> {
    let dm = plane_stress(e, nu, t);
    let db = plane_stress(e, nu, t.powi(3) / 12.0);
    let g = e / (2.0 * (1.0 + nu));
    let ds = Mat::identity(2, 2) * (SHEAR_CORRECTION * g * t);

    let tying = ShearTying::new(&frame.local);
    let mut membrane = Mat::zeros(24, 24);
    let mut bending = Mat::zeros(24, 24);
    let mut shear = Mat::zeros(24, 24);
    for &r in &[-GAUSS_2, GAUSS_2] {
        for &s in &[-GAUSS_2, GAUSS_2] {
            let (dn_dx, dn_dy, det) = shape_derivatives(&frame.local, r, s)?;
            let bm = membrane_b(&dn_dx, &dn_dy);
            membrane += bm.transpose() * &dm * &bm * det;
            let bk = curvature_b(&dn_dx, &dn_dy);
            bending += bk.transpose() * &db * &bk * det;
            let (bs, det) = tying.b_matrix(&frame.local, r, s)?;
            shear += bs.transpose() * &ds * &bs * det;
        }
    }

    // Weak spring for the drilling DOF
    let mut min_rot = f64::MAX;
    for node in 0..4 {
        for dof in [3, 4] {
            let k = (bending[(node * 6 + dof, node * 6 + dof)]).abs();
            if k > 1e-10 && k < min_rot {
                min_rot = k;
            }
        }
    }
    if min_rot == f64::MAX {
        let max_mem = (0..24).map(|i| membrane[(i, i)].abs()).fold(0.0, f64::max);
        min_rot = max_mem / 100.0;
    }
    let k_rz = min_rot / 1000.0;
    for node in 0..4 {
        bending[(node * 6 + 5, node * 6 + 5)] += k_rz;
    }

    Ok(ShellStiffness {
        membrane,
        shear,
        bending,
    })
}

/// Center-point surface stresses in the local frame
///
/// Returns Voigt components [sx, sy, sz, txy, tyz, tzx] on whichever face
/// (top or bottom) has the larger von Mises stress.
pub fn shell_center_stress(frame: &ShellFrame, t: f64, e: f64, nu: f64, u_local: &Vec) -> FEAResult<[f64; 6]> {
    let (dn_dx, dn_dy, _) = shape_derivatives(&frame.local, 0.0, 0.0)?;
    let membrane = plane_stress(e, nu, 1.0) * (membrane_b(&dn_dx, &dn_dy) * u_local);
    let moments = plane_stress(e, nu, t.powi(3) / 12.0) * (curvature_b(&dn_dx, &dn_dy) * u_local);
    let bending = moments * (6.0 / (t * t));

    let face = |sign: f64| {
        [
            membrane[0] + sign * bending[0],
            membrane[1] + sign * bending[1],
            0.0,
            membrane[2] + sign * bending[2],
            0.0,
            0.0,
        ]
    };
    let top = face(1.0);
    let bottom = face(-1.0);
    if super::von_mises(&top) >= super::von_mises(&bottom) {
        Ok(top)
    } else {
        Ok(bottom)
    }
}
