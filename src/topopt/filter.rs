//! Sensitivity filter over element centers

use nalgebra_sparse::CsrMatrix;

use crate::math::{sparse_matvec, SparseMatrixBuilder, Vec as FEVec};

/// Lower bound on the density used when normalizing filtered sensitivities
const MIN_FILTER_DENSITY: f64 = 1e-3;

/// Cone-weighted neighbourhood filter, built once per optimization run
///
/// `H(i,j) = max(0, r_min - |c_i - c_j|)`, `Hs(i) = Σ_j H(i,j)`.
#[derive(Debug, Clone)]
pub struct DensityFilter {
    h: CsrMatrix<f64>,
    hs: FEVec,
}

impl DensityFilter {
    /// Build the filter from element centers
    ///
    /// A non-positive radius gives the identity filter.
    pub fn new(centers: &[[f64; 3]], r_min: f64) -> Self {
        let n = centers.len();
        let mut builder = SparseMatrixBuilder::new(n);
        let mut hs = FEVec::zeros(n);

        if r_min <= 0.0 {
            for i in 0..n {
                builder.add(i, i, 1.0);
                hs[i] = 1.0;
            }
        } else {
            for (i, ci) in centers.iter().enumerate() {
                for (j, cj) in centers.iter().enumerate() {
                    let distance = ((ci[0] - cj[0]).powi(2) + (ci[1] - cj[1]).powi(2) + (ci[2] - cj[2]).powi(2)).sqrt();
                    let weight = r_min - distance;
                    if weight > 0.0 {
                        builder.add(i, j, weight);
                        hs[i] += weight;
                    }
                }
            }
        }

        let h = builder.to_csr();
        log::debug!("Filter matrix: {} elements, {} non-zeros", n, h.nnz());
        Self { h, hs }
    }

    /// Sigmund's density-weighted sensitivity filter
    ///
    /// `dc(i) ← Σ_j H(i,j)·x(j)·dc(j) / (Hs(i)·max(1e-3, x(i)))`. With an
    /// identity `H` this reduces to `x·dc / max(1e-3, x)`.
    pub fn apply(&self, dc: &FEVec, x: &FEVec) -> FEVec {
        let mut filtered = sparse_matvec(&self.h, &dc.component_mul(x));
        for i in 0..filtered.len() {
            filtered[i] /= self.hs[i] * x[i].max(MIN_FILTER_DENSITY);
        }
        filtered
    }

    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.h
    }

    pub fn row_sums(&self) -> &FEVec {
        &self.hs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_small_radius_is_identity() {
        let centers = [[0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [2.5, 0.5, 0.0]];
        let filter = DensityFilter::new(&centers, 0.5);
        assert_eq!(filter.matrix().nnz(), 3);
        for (i, j, &v) in filter.matrix().triplet_iter() {
            assert_eq!(i, j);
            assert_relative_eq!(v, 0.5);
        }

        let dc = FEVec::from_vec(vec![-2.0, -4.0, -8.0]);
        let x = FEVec::from_vec(vec![0.5, 1e-6, 1.0]);
        let filtered = filter.apply(&dc, &x);
        assert_relative_eq!(filtered[0], -2.0);
        assert_relative_eq!(filtered[1], -4.0 * 1e-6 / 1e-3);
        assert_relative_eq!(filtered[2], -8.0);
    }

    #[test]
    fn test_weights_and_row_sums() {
        let centers = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0]];
        let filter = DensityFilter::new(&centers, 1.5);
        let hs = filter.row_sums();
        assert_relative_eq!(hs[0], 1.5 + 0.5);
        assert_relative_eq!(hs[1], 0.5 + 1.5);
        assert_relative_eq!(hs[2], 1.5);

        // Uniform sensitivity at full density is preserved
        let dc = FEVec::from_element(3, -1.0);
        let x = FEVec::from_element(3, 1.0);
        let filtered = filter.apply(&dc, &x);
        for v in filtered.iter() {
            assert_relative_eq!(*v, -1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_radius() {
        let filter = DensityFilter::new(&[[0.0; 3], [1.0, 0.0, 0.0]], 0.0);
        let dc = FEVec::from_vec(vec![-3.0, -1.0]);
        let x = FEVec::from_vec(vec![1.0, 0.5]);
        let filtered = filter.apply(&dc, &x);
        assert_relative_eq!(filtered[0], -3.0);
        assert_relative_eq!(filtered[1], -1.0);
    }

    #[test]
    fn test_density_weighted_average() {
        let centers = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let filter = DensityFilter::new(&centers, 2.0);
        // H = [[2, 1], [1, 2]], Hs = [3, 3]
        let dc = FEVec::from_vec(vec![-1.0, -4.0]);
        let x = FEVec::from_vec(vec![0.5, 0.25]);
        let filtered = filter.apply(&dc, &x);
        assert_relative_eq!(filtered[0], (2.0 * 0.5 * -1.0 + 0.25 * -4.0) / (3.0 * 0.5), epsilon = 1e-12);
        assert_relative_eq!(filtered[1], (0.5 * -1.0 + 2.0 * 0.25 * -4.0) / (3.0 * 0.25), epsilon = 1e-12);

        // A constant field at uniform density passes through unchanged
        let uniform = filter.apply(&FEVec::from_element(2, -3.0), &FEVec::from_element(2, 0.4));
        for v in uniform.iter() {
            assert_relative_eq!(*v, -3.0, epsilon = 1e-12);
        }
    }
}
