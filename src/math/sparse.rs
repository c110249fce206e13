//! Sparse matrix utilities for efficient FEA solves
//!
//! FEA stiffness matrices are typically 95-99% sparse. Assembly goes through
//! COO triplets; solves run on CSR storage, either through a skyline Cholesky
//! factorization or a Jacobi-preconditioned Krylov method.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::NumericalFailure;

/// Relative pivot size below which a factorization is considered singular
const SINGULAR_PIVOT: f64 = 1e-10;

/// Sparse matrix builder using COO format
/// More efficient for incremental assembly
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        // Estimate: 6 DOFs per node, ~10 connections per node
        let estimated_nnz = size * 60;
        Self {
            size,
            entries: Vec::with_capacity(estimated_nnz),
        }
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value.abs() > 1e-15 {
            self.entries.push((row, col, value));
        }
    }

    /// Scatter an element matrix into the global matrix
    ///
    /// `dofs[i]` is the global equation of local row/column `i`; `None`
    /// marks a constrained DOF whose row and column are dropped.
    pub fn add_element_matrix(&mut self, dofs: &[Option<usize>], k_elem: &DMatrix<f64>) {
        for (i, di) in dofs.iter().enumerate() {
            let Some(di) = *di else { continue };
            for (j, dj) in dofs.iter().enumerate() {
                if let Some(dj) = *dj {
                    self.add(di, dj, k_elem[(i, j)]);
                }
            }
        }
    }

    /// Convert to CSR format for efficient solves
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }

    /// Convert to dense matrix (for comparison/debugging)
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(self.size, self.size);
        for &(row, col, val) in &self.entries {
            mat[(row, col)] += val;
        }
        mat
    }

    /// Number of stored triplets (before duplicates are summed)
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Skyline Cholesky factorization for symmetric positive definite matrices
///
/// Suited to FEA stiffness matrices: SPD and banded once the equations are
/// reordered with [`reverse_cuthill_mckee`].
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    size: usize,
    // For each row, the lower profile from the first non-zero to the diagonal
    skyline: Vec<Vec<f64>>,
    // Distance from the diagonal to the first non-zero in each row
    heights: Vec<usize>,
}

impl SkylineCholesky {
    /// Factorize a symmetric CSR matrix
    pub fn factor(csr: &CsrMatrix<f64>) -> Result<Self, NumericalFailure> {
        let size = csr.nrows();

        let mut heights = vec![0usize; size];
        for (row, col, _val) in csr.triplet_iter() {
            if col < row {
                heights[row] = heights[row].max(row - col);
            }
        }

        let mut skyline: Vec<Vec<f64>> = heights.iter().map(|&h| vec![0.0; h + 1]).collect();
        for (row, col, &val) in csr.triplet_iter() {
            if col <= row {
                let idx = col + heights[row] - row;
                skyline[row][idx] += val;
            }
        }

        let mut factor = Self {
            size,
            skyline,
            heights,
        };
        factor.factorize()?;
        Ok(factor)
    }

    fn factorize(&mut self) -> Result<(), NumericalFailure> {
        for i in 0..self.size {
            let hi = self.heights[i];
            let start_i = i - hi;

            for j in start_i..i {
                let start_j = j - self.heights[j];
                let start = start_i.max(start_j);
                let mut sum = 0.0;
                for k in start..j {
                    sum += self.get(i, k) * self.get(j, k);
                }

                let diag_j = self.get(j, j);
                let idx = j - start_i;
                self.skyline[i][idx] = (self.skyline[i][idx] - sum) / diag_j;
            }

            let mut sum = 0.0;
            for j in start_i..i {
                let val = self.get(i, j);
                sum += val * val;
            }

            let original = self.skyline[i][hi];
            let diag = original - sum;
            if diag.abs() <= SINGULAR_PIVOT * original.abs() || original == 0.0 {
                return Err(NumericalFailure::SingularMatrix);
            }
            if diag < 0.0 {
                return Err(NumericalFailure::NotPositiveDefinite {
                    equation: i,
                    pivot: diag,
                });
            }
            self.skyline[i][hi] = diag.sqrt();
        }

        Ok(())
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        let start = row - self.heights[row];
        if col < start {
            return 0.0;
        }
        self.skyline[row][col - start]
    }

    /// Solve L * L^T * x = b
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();

        // Forward substitution: L * y = b
        for i in 0..self.size {
            let start = i - self.heights[i];
            let mut sum = 0.0;
            for j in start..i {
                sum += self.get(i, j) * x[j];
            }
            x[i] = (x[i] - sum) / self.get(i, i);
        }

        // Backward substitution: L^T * x = y
        for i in (0..self.size).rev() {
            x[i] /= self.get(i, i);
            let start = i - self.heights[i];
            for j in start..i {
                x[j] -= self.get(i, j) * x[i];
            }
        }

        x
    }

    /// Total number of stored profile entries
    pub fn profile(&self) -> usize {
        self.heights.iter().map(|h| h + 1).sum()
    }
}

/// Diagonal of a CSR matrix, with zeros replaced by one for use as a
/// Jacobi preconditioner
fn jacobi_diagonal(csr: &CsrMatrix<f64>) -> DVector<f64> {
    let mut diag = DVector::<f64>::zeros(csr.nrows());
    for (row, col, &val) in csr.triplet_iter() {
        if row == col {
            diag[row] += val;
        }
    }
    for d in diag.iter_mut() {
        if d.abs() < 1e-15 {
            *d = 1.0;
        }
    }
    diag
}

/// Solve a sparse SPD system with Jacobi-preconditioned Conjugate Gradient
///
/// Converged when ‖r‖ ≤ tol·‖b‖.
pub fn solve_pcg(
    csr: &CsrMatrix<f64>,
    b: &DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> Result<DVector<f64>, NumericalFailure> {
    let n = csr.nrows();
    let b_norm = b.norm();
    let mut x = DVector::zeros(n);
    if b_norm == 0.0 {
        return Ok(x);
    }
    let threshold = tol * b_norm;
    let diag = jacobi_diagonal(csr);

    let mut r = b.clone();
    let mut z = r.component_div(&diag);
    let mut p = z.clone();
    let mut r_dot_z = r.dot(&z);

    for iter in 0..max_iter {
        let ap = sparse_matvec(csr, &p);
        let p_dot_ap = p.dot(&ap);
        if p_dot_ap <= 0.0 {
            // Direction of zero or negative curvature
            return Err(NumericalFailure::SingularMatrix);
        }

        let alpha = r_dot_z / p_dot_ap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        let r_norm = r.norm();
        if r_norm <= threshold {
            log::debug!("CG converged in {} iterations", iter + 1);
            return Ok(x);
        }

        z = r.component_div(&diag);
        let r_dot_z_new = r.dot(&z);
        let beta = r_dot_z_new / r_dot_z;
        r_dot_z = r_dot_z_new;
        p = &z + beta * &p;
    }

    Err(NumericalFailure::IterativeNotConverged {
        solver: "CG".to_string(),
        iterations: max_iter,
        residual: r.norm() / b_norm,
    })
}

/// Solve a sparse system with Jacobi-preconditioned BiCGSTAB
///
/// Converged when ‖r‖ ≤ tol·‖b‖.
pub fn solve_bicgstab(
    csr: &CsrMatrix<f64>,
    b: &DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> Result<DVector<f64>, NumericalFailure> {
    let n = csr.nrows();
    let b_norm = b.norm();
    let mut x = DVector::zeros(n);
    if b_norm == 0.0 {
        return Ok(x);
    }
    let threshold = tol * b_norm;
    let diag = jacobi_diagonal(csr);

    let mut r = b.clone();
    let r_hat = r.clone();
    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v = DVector::zeros(n);
    let mut p = DVector::zeros(n);

    let not_converged = |iterations: usize, r: &DVector<f64>| NumericalFailure::IterativeNotConverged {
        solver: "BiCGSTAB".to_string(),
        iterations,
        residual: r.norm() / b_norm,
    };

    for iter in 0..max_iter {
        let rho_new = r_hat.dot(&r);
        if rho_new.abs() < 1e-300 {
            return Err(not_converged(iter, &r));
        }
        let beta = (rho_new / rho) * (alpha / omega);
        p = &r + beta * (&p - omega * &v);

        let y = p.component_div(&diag);
        v = sparse_matvec(csr, &y);
        let r_hat_v = r_hat.dot(&v);
        if r_hat_v.abs() < 1e-300 {
            return Err(not_converged(iter, &r));
        }
        alpha = rho_new / r_hat_v;

        let s = &r - alpha * &v;
        if s.norm() <= threshold {
            x.axpy(alpha, &y, 1.0);
            log::debug!("BiCGSTAB converged in {} iterations", iter + 1);
            return Ok(x);
        }

        let z = s.component_div(&diag);
        let t = sparse_matvec(csr, &z);
        let t_dot_t = t.dot(&t);
        if t_dot_t == 0.0 {
            return Err(not_converged(iter, &r));
        }
        omega = t.dot(&s) / t_dot_t;

        x.axpy(alpha, &y, 1.0);
        x.axpy(omega, &z, 1.0);
        r = &s - omega * &t;

        if r.norm() <= threshold {
            log::debug!("BiCGSTAB converged in {} iterations", iter + 1);
            return Ok(x);
        }
        if omega == 0.0 {
            return Err(not_converged(iter, &r));
        }
        rho = rho_new;
    }

    Err(not_converged(max_iter, &r))
}

/// Sparse matrix-vector multiplication
#[inline]
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = csr.nrows();
    let mut y = DVector::zeros(n);

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..n {
        let start = row_offsets[row];
        let end = row_offsets[row + 1];

        let mut sum = 0.0;
        for idx in start..end {
            sum += values[idx] * x[col_indices[idx]];
        }
        y[row] = sum;
    }

    y
}

/// Bandwidth reduction using Reverse Cuthill-McKee algorithm
///
/// Returns `perm` with `perm[new] = old`.
pub fn reverse_cuthill_mckee(csr: &CsrMatrix<f64>) -> Vec<usize> {
    let n = csr.nrows();
    if n == 0 {
        return vec![];
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (row, col, &val) in csr.triplet_iter() {
        if val.abs() > 1e-15 && row != col {
            adj[row].push(col);
        }
    }

    let degrees: Vec<usize> = adj.iter().map(|v| v.len()).collect();
    for neighbors in &mut adj {
        neighbors.sort_by_key(|&i| (degrees[i], i));
    }

    let mut visited = vec![false; n];
    let mut result = Vec::with_capacity(n);
    let mut queue = std::collections::VecDeque::new();

    // Start from node with minimum degree
    let start = (0..n).min_by_key(|&i| degrees[i]).unwrap_or(0);
    queue.push_back(start);
    visited[start] = true;

    while let Some(node) = queue.pop_front() {
        result.push(node);

        for &neighbor in &adj[node] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                queue.push_back(neighbor);
            }
        }

        // Disconnected components
        if queue.is_empty() && result.len() < n {
            if let Some(next) = (0..n).find(|&i| !visited[i]) {
                queue.push_back(next);
                visited[next] = true;
            }
        }
    }

    result.reverse();
    result
}

/// Create inverse permutation
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (new_idx, &old_idx) in perm.iter().enumerate() {
        inv[old_idx] = new_idx;
    }
    inv
}

/// Reorder rows and columns of a square matrix: B[new_i, new_j] = A[perm[new_i], perm[new_j]]
pub fn permute_symmetric(csr: &CsrMatrix<f64>, perm: &[usize]) -> CsrMatrix<f64> {
    let inv = inverse_permutation(perm);
    let mut coo = CooMatrix::new(csr.nrows(), csr.ncols());
    for (row, col, &val) in csr.triplet_iter() {
        coo.push(inv[row], inv[col], val);
    }
    CsrMatrix::from(&coo)
}
