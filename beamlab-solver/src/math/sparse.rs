//! Sparse matrix utilities for the global stiffness solve
//!
//! A beam mesh couples each node only to its neighbours, so the global
//! stiffness is banded with a half-bandwidth of three. Storage and solvers
//! here exploit that: COO assembly into CSR, a skyline Cholesky for the
//! direct path and a Jacobi-preconditioned CG when iteration is requested.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{BeamError, BeamResult};

/// Sparse matrix builder using COO format
/// More efficient for incremental assembly
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        // 2 DOFs per node, each row couples to at most 6 columns
        Self {
            size,
            entries: Vec::with_capacity(size * 8),
        }
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value.abs() > 1e-15 {
            self.entries.push((row, col, value));
        }
    }

    /// Add values from a small fixed-size matrix
    pub fn add_element_matrix<const N: usize>(
        &mut self,
        dofs: &[usize; N],
        k_elem: &[[f64; N]; N],
    ) {
        for (i, &di) in dofs.iter().enumerate() {
            for (j, &dj) in dofs.iter().enumerate() {
                self.add(di, dj, k_elem[i][j]);
            }
        }
    }

    /// Convert to CSR format; duplicate entries are summed
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }


    /// Number of stored (unmerged) entries
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

/// Cholesky factor of a symmetric positive definite matrix in skyline storage
///
/// Row `i` stores the lower triangle from its first non-zero column up to the
/// diagonal. Banded stiffness matrices keep every row short.
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    size: usize,
    skyline: Vec<Vec<f64>>,
    heights: Vec<usize>,
}

impl SkylineCholesky {
    /// Factor a symmetric matrix given in CSR form
    ///
    /// Only the lower triangle is read. Fails with `Unstable` when a pivot is
    /// not positive, which for a stiffness matrix means a mechanism.
    pub fn factor(csr: &CsrMatrix<f64>) -> BeamResult<Self> {
        let size = csr.nrows();
        if csr.ncols() != size {
            return Err(BeamError::InvalidInput(format!(
                "cannot factor a {}x{} matrix",
                size,
                csr.ncols()
            )));
        }

        // Row heights (distance from the diagonal to the first non-zero)
        let mut heights = vec![0usize; size];
        for (row, col, _) in csr.triplet_iter() {
            if col < row {
                heights[row] = heights[row].max(row - col);
            }
        }

        let mut skyline: Vec<Vec<f64>> = heights.iter().map(|&h| vec![0.0; h + 1]).collect();
        for (row, col, &val) in csr.triplet_iter() {
            if col <= row {
                let idx = col - (row - heights[row]);
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

    fn factorize(&mut self) -> BeamResult<()> {
        for i in 0..self.size {
            let hi = self.heights[i];
            let start_i = i - hi;

            for j in start_i..i {
                let start = start_i.max(j - self.heights[j]);
                let sum: f64 = (start..j).map(|k| self.get(i, k) * self.get(j, k)).sum();

                let diag_j = self.get(j, j);
                if diag_j.abs() < 1e-15 {
                    return Err(BeamError::Unstable(format!(
                        "zero pivot at DOF {j} during factorization"
                    )));
                }
                let idx = j - start_i;
                self.skyline[i][idx] = (self.skyline[i][idx] - sum) / diag_j;
            }

            let sum: f64 = (start_i..i).map(|j| self.get(i, j).powi(2)).sum();
            let diag = self.skyline[i][hi] - sum;
            if !diag.is_finite() || diag <= 0.0 {
                return Err(BeamError::Unstable(format!(
                    "stiffness is not positive definite at DOF {i}"
                )));
            }
            self.skyline[i][hi] = diag.sqrt();
        }
        Ok(())
    }

    /// Entry of the lower factor L (zero outside the profile)
    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        let start = row - self.heights[row];
        if col < start || col > row {
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
            let sum: f64 = (start..i).map(|j| self.get(i, j) * x[j]).sum();
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
}

/// Result of an iterative solve
#[derive(Debug, Clone)]
pub struct PcgOutcome {
    pub solution: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Final residual norm relative to ||b||
    pub relative_residual: f64,
}

/// Solve sparse linear system using Preconditioned Conjugate Gradient
///
/// Uses Jacobi (diagonal) preconditioner. Convergence is declared when
/// ||r|| <= tol * ||b||.
pub fn solve_pcg(
    csr: &CsrMatrix<f64>,
    b: &DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> BeamResult<PcgOutcome> {
    let n = csr.nrows();

    let mut diag = DVector::<f64>::from_element(n, 1.0);
    for (row, col, &val) in csr.triplet_iter() {
        if row == col && val.abs() > 1e-15 {
            diag[row] = val;
        }
    }

    let mut x = DVector::<f64>::zeros(n);
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(PcgOutcome {
            solution: x,
            iterations: 0,
            converged: true,
            relative_residual: 0.0,
        });
    }

    let mut r = b.clone();
    let mut z = r.component_div(&diag);
    let mut p = z.clone();
    let mut r_dot_z = r.dot(&z);
    let mut relative_residual = 1.0;

    for iter in 0..max_iter {
        let ap = sparse_matvec(csr, &p);
        let p_dot_ap = p.dot(&ap);
        if !p_dot_ap.is_finite() || p_dot_ap <= 0.0 {
            return Err(BeamError::Unstable(
                "conjugate gradient breakdown: stiffness is not positive definite".to_string(),
            ));
        }

        let alpha = r_dot_z / p_dot_ap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        relative_residual = r.norm() / b_norm;
        if relative_residual <= tol {
            return Ok(PcgOutcome {
                solution: x,
                iterations: iter + 1,
                converged: true,
                relative_residual,
            });
        }

        z = r.component_div(&diag);
        let r_dot_z_new = r.dot(&z);
        let beta = r_dot_z_new / r_dot_z;
        r_dot_z = r_dot_z_new;
        p = &z + beta * &p;
    }

    Ok(PcgOutcome {
        solution: x,
        iterations: max_iter,
        converged: false,
        relative_residual,
    })
}

/// Sparse matrix-vector multiplication
#[inline]
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    DVector::from_fn(csr.nrows(), |row, _| {
        (row_offsets[row]..row_offsets[row + 1])
            .map(|idx| values[idx] * x[col_indices[idx]])
            .sum()
    })
}
