//! Error types for the FE engine and the topology optimizer
//!
//! Configuration mistakes and bookkeeping violations are reported through
//! [`FEAError`] directly. Numerical and convergence failures are collected in
//! [`NumericalFailure`] so callers running automated searches can branch on
//! them (e.g. substitute a penalty value) instead of treating them as bugs.

use thiserror::Error;

/// Numerical or convergence failure of an otherwise well-formed problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalFailure {
    #[error("Singular stiffness matrix - structure may be under-constrained")]
    SingularMatrix,

    #[error("Stiffness matrix not positive definite: pivot {pivot:e} at equation {equation}")]
    NotPositiveDefinite { equation: usize, pivot: f64 },

    #[error("{solver} did not converge after {iterations} iterations (residual {residual:e})")]
    IterativeNotConverged {
        solver: String,
        iterations: usize,
        residual: f64,
    },

    #[error("Optimality criteria bisection did not converge after {0} steps")]
    BisectionNotConverged(usize),

    #[error("Topology optimization did not converge after {iterations} iterations (last change {change:e})")]
    OptimizationNotConverged { iterations: usize, change: f64 },
}

/// Main error type for FEA operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Invalid {kind} structure: missing [{}], not applicable [{}]", .missing.join(", "), .extraneous.join(", "))]
    InvalidStructure {
        kind: String,
        missing: Vec<String>,
        extraneous: Vec<String>,
    },

    #[error("Parameter '{0}' supplied more than once")]
    DuplicateParameter(String),

    #[error("Parameter '{parameter}' is not applicable to a {kind} structure")]
    ParameterNotApplicable { kind: String, parameter: String },

    #[error("Parameter '{0}' has not been assigned")]
    ParameterNotAssigned(String),

    #[error("Invalid degree of freedom {0} (expected 0-5)")]
    InvalidDof(usize),

    #[error("Unknown solver '{0}'")]
    UnknownSolver(String),

    #[error("Node {0} not found in model")]
    NodeNotFound(usize),

    #[error("Element {0} not found in model")]
    ElementNotFound(usize),

    #[error("Element ID {0} already exists")]
    DuplicateElement(usize),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Element {element} requires DOF {dof} that node {node} does not carry")]
    SignatureMismatch { element: usize, node: usize, dof: usize },

    #[error("Freedom table of node {0} has not been generated")]
    FreedomTableNotGenerated(usize),

    #[error("DOF {dof} of node {node} is not used by any element")]
    InactiveDof { node: usize, dof: usize },

    #[error("DOF {dof} of node {node} is constrained")]
    ConstrainedDof { node: usize, dof: usize },

    #[error("Invalid model state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Numerical(#[from] NumericalFailure),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl FEAError {
    /// True for numerical/convergence failures an outer search may recover from
    pub fn is_numerical(&self) -> bool {
        matches!(self, FEAError::Numerical(_))
    }

    /// The numerical failure, if this is one
    pub fn numerical(&self) -> Option<&NumericalFailure> {
        match self {
            FEAError::Numerical(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for FEA operations
pub type FEAResult<T> = Result<T, FEAError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_structure_lists_everything() {
        let err = FEAError::InvalidStructure {
            kind: "truss".to_string(),
            missing: vec!["A".to_string(), "E".to_string()],
            extraneous: vec!["width".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("A, E"));
        assert!(msg.contains("width"));
    }

    #[test]
    fn test_numerical_is_distinguishable() {
        let err: FEAError = NumericalFailure::SingularMatrix.into();
        assert!(err.is_numerical());
        assert_eq!(err.numerical(), Some(&NumericalFailure::SingularMatrix));
        assert!(!FEAError::InvalidDof(7).is_numerical());
    }
}
