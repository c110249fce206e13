//! Analysis types and options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FEAError;

/// Linear solver used for K·u = F
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverKind {
    /// Skyline Cholesky factorization
    #[default]
    Direct,
    /// Jacobi-preconditioned BiCGSTAB
    BiCgStab,
    /// Jacobi-preconditioned conjugate gradient
    ConjugateGradient,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Direct => "direct",
            SolverKind::BiCgStab => "BiCGSTAB",
            SolverKind::ConjugateGradient => "CG",
        }
    }

    pub fn is_iterative(&self) -> bool {
        !matches!(self, SolverKind::Direct)
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = FEAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" | "cholesky" | "SimplicialLLT" | "SimplicialLDLT" => Ok(SolverKind::Direct),
            "BiCGSTAB" | "bicgstab" => Ok(SolverKind::BiCgStab),
            "CG" | "cg" => Ok(SolverKind::ConjugateGradient),
            _ => Err(FEAError::UnknownSolver(s.to_string())),
        }
    }
}

/// Options for a linear static solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Linear solver
    pub solver: SolverKind,
    /// Relative residual tolerance for iterative solvers
    pub tolerance: f64,
    /// Iteration cap for iterative solvers (0 = 10·n)
    pub max_iterations: usize,
    /// Reorder equations with reverse Cuthill-McKee before factorizing
    pub reorder: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            solver: SolverKind::Direct,
            tolerance: 1e-10,
            max_iterations: 0,
            reorder: true,
        }
    }
}

impl AnalysisOptions {
    /// Options for a named solver
    pub fn with_solver_name(name: &str) -> Result<Self, FEAError> {
        Ok(Self::default().with_solver(name.parse()?))
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Enable or disable bandwidth reordering
    pub fn with_reordering(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Effective iteration cap for a system of `n` equations
    pub fn iteration_cap(&self, n: usize) -> usize {
        if self.max_iterations == 0 {
            (10 * n).max(100)
        } else {
            self.max_iterations
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_names() {
        for name in ["direct", "SimplicialLLT", "SimplicialLDLT", "cholesky"] {
            assert_eq!(name.parse::<SolverKind>().unwrap(), SolverKind::Direct);
        }
        assert_eq!("BiCGSTAB".parse::<SolverKind>().unwrap(), SolverKind::BiCgStab);
        assert_eq!("CG".parse::<SolverKind>().unwrap(), SolverKind::ConjugateGradient);
        assert!(matches!(
            "SparseLU".parse::<SolverKind>(),
            Err(FEAError::UnknownSolver(name)) if name == "SparseLU"
        ));
    }

    #[test]
    fn test_options_builder() {
        let options = AnalysisOptions::with_solver_name("CG")
            .unwrap()
            .with_tolerance(1e-8)
            .with_max_iter(50);
        assert_eq!(options.solver, SolverKind::ConjugateGradient);
        assert_eq!(options.iteration_cap(1000), 50);
        assert_eq!(AnalysisOptions::default().iteration_cap(5), 100);
    }
}
