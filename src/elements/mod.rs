//! Structural elements module
//!
//! Every element kind implements [`Formulation`]; [`Element`] wraps one of
//! them in the closed [`ElementKind`] enum and carries the state shared by all
//! kinds (density, effective modulus, DOF map, cached response).

mod beam;
mod element;
mod flat_shell;
mod hexahedron;
mod node;
mod structure;
mod truss;

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

use crate::error::FEAResult;
use crate::math::{Mat, Vec as FEVec};

pub use beam::Beam;
pub use element::Element;
pub use flat_shell::FlatShell;
pub use hexahedron::Hexahedron;
pub use node::{Node, NodeId, ALL_DOFS, DOFS_PER_NODE, TRANSLATIONS};
pub(crate) use node::check_dof;
pub use structure::{
    Structure, StructureKind, DEFAULT_E_RELATIVE_LOWER_BOUND, E_RELATIVE_LOWER_BOUND,
};
pub use truss::Truss;

/// Capability interface shared by all element formulations
///
/// Matrices and displacement vectors are expressed over the element's active
/// local DOFs: for each node in order, each DOF set in the freedom signature.
/// Everything is evaluated at the nominal modulus E0.
pub trait Formulation {
    /// DOFs this element uses at each of its nodes
    fn freedom_signature(&self) -> [bool; DOFS_PER_NODE];

    /// Original stiffness in global coordinates
    fn stiffness(&self) -> &Mat;

    /// Geometric volume (independent of density)
    fn volume(&self) -> f64;

    /// Strain energy ½·dᵀ·K·d split by deformation mode
    fn energy_split(&self, d: &FEVec) -> EnergySplit;

    /// Stress at the element center
    fn stress_at_center(&self, d: &FEVec) -> FEAResult<CenterStress>;
}

/// Closed set of element formulations
#[derive(Debug, Clone)]
pub enum ElementKind {
    Truss(Truss),
    Beam(Beam),
    FlatShell(FlatShell),
    Hexahedron(Hexahedron),
}

impl ElementKind {
    pub fn formulation(&self) -> &dyn Formulation {
        match self {
            ElementKind::Truss(e) => e,
            ElementKind::Beam(e) => e,
            ElementKind::FlatShell(e) => e,
            ElementKind::Hexahedron(e) => e,
        }
    }

    pub fn structure_kind(&self) -> StructureKind {
        match self {
            ElementKind::Truss(_) => StructureKind::Truss,
            ElementKind::Beam(_) => StructureKind::Beam,
            ElementKind::FlatShell(_) => StructureKind::FlatShell,
            ElementKind::Hexahedron(_) => StructureKind::QuadHexahedron,
        }
    }
}

/// SIMP stiffness interpolation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// E = Emin + xᵖ·(E0 − Emin)
    #[default]
    ModifiedSimp,
    /// E = xᵖ·E0
    Simp,
}

impl Interpolation {
    /// Effective modulus for density `x`
    pub fn modulus(&self, x: f64, penal: f64, e0: f64, e_min: f64) -> f64 {
        match self {
            Interpolation::ModifiedSimp => e_min + x.powf(penal) * (e0 - e_min),
            Interpolation::Simp => x.powf(penal) * e0,
        }
    }

    /// dE/dx at density `x`
    pub fn derivative(&self, x: f64, penal: f64, e0: f64, e_min: f64) -> f64 {
        let slope = penal * x.powf(penal - 1.0);
        match self {
            Interpolation::ModifiedSimp => slope * (e0 - e_min),
            Interpolation::Simp => slope * e0,
        }
    }
}

/// Strain energy split by deformation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySplit {
    pub axial: f64,
    pub shear: f64,
    pub bend: f64,
}

impl EnergySplit {
    pub fn total(&self) -> f64 {
        self.axial + self.shear + self.bend
    }
}

impl Add for EnergySplit {
    type Output = EnergySplit;

    fn add(self, rhs: EnergySplit) -> EnergySplit {
        EnergySplit {
            axial: self.axial + rhs.axial,
            shear: self.shear + rhs.shear,
            bend: self.bend + rhs.bend,
        }
    }
}

impl AddAssign for EnergySplit {
    fn add_assign(&mut self, rhs: EnergySplit) {
        *self = *self + rhs;
    }
}

impl Mul<f64> for EnergySplit {
    type Output = EnergySplit;

    fn mul(self, factor: f64) -> EnergySplit {
        EnergySplit {
            axial: self.axial * factor,
            shear: self.shear * factor,
            bend: self.bend * factor,
        }
    }
}

/// Stress recovered at the element center
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CenterStress {
    /// Voigt components [sx, sy, sz, txy, tyz, tzx] in the element's local frame
    pub components: [f64; 6],
    /// Von Mises equivalent stress
    pub von_mises: f64,
}

impl CenterStress {
    pub fn from_components(components: [f64; 6]) -> Self {
        Self {
            components,
            von_mises: crate::math::von_mises(&components),
        }
    }

    /// Scale by the ratio of effective to nominal modulus
    pub fn scaled(&self, factor: f64) -> Self {
        let mut components = self.components;
        for c in components.iter_mut() {
            *c *= factor;
        }
        Self {
            components,
            von_mises: self.von_mises * factor.abs(),
        }
    }
}

