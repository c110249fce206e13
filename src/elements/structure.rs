//! Structure configuration - a validated material/section assignment

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FEAError, FEAResult};

/// Default lower bound on the relative Young's modulus (Emin / E0)
pub const DEFAULT_E_RELATIVE_LOWER_BOUND: f64 = 1e-6;

/// Name of the optional lower-bound parameter shared by all kinds
pub const E_RELATIVE_LOWER_BOUND: &str = "ERelativeLowerBound";

/// Kind of structural member a configuration describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    /// Axial member (translations only)
    Truss,
    /// Rectangular-section beam (all 6 DOFs)
    Beam,
    /// Flat quadrilateral shell (membrane + bending)
    FlatShell,
    /// 8-node solid block
    QuadHexahedron,
}

impl StructureKind {
    /// Parameters a configuration of this kind must carry
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            StructureKind::Truss => &["A", "E"],
            StructureKind::Beam => &["width", "height", "poisson", "E"],
            StructureKind::FlatShell => &["thickness", "poisson", "E"],
            StructureKind::QuadHexahedron => &["poisson", "E"],
        }
    }

    /// Whether `name` may be supplied for this kind
    pub fn accepts(&self, name: &str) -> bool {
        name == E_RELATIVE_LOWER_BOUND || self.required_parameters().contains(&name)
    }

    /// Number of nodes an element of this kind connects
    pub fn node_count(&self) -> usize {
        match self {
            StructureKind::Truss | StructureKind::Beam => 2,
            StructureKind::FlatShell => 4,
            StructureKind::QuadHexahedron => 8,
        }
    }

    /// Canonical name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            StructureKind::Truss => "truss",
            StructureKind::Beam => "beam",
            StructureKind::FlatShell => "flat_shell",
            StructureKind::QuadHexahedron => "quad_hexahedron",
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StructureKind {
    type Err = FEAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truss" => Ok(StructureKind::Truss),
            "beam" => Ok(StructureKind::Beam),
            "flat_shell" | "flatshell" | "shell" => Ok(StructureKind::FlatShell),
            "quad_hexahedron" | "hexahedron" | "solid" => Ok(StructureKind::QuadHexahedron),
            _ => Err(FEAError::InvalidInput(format!("unknown structure type '{s}'"))),
        }
    }
}

/// A validated structure configuration
///
/// Holds exactly the parameters its kind requires, plus an optional
/// `ERelativeLowerBound`. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    kind: StructureKind,
    parameters: BTreeMap<String, f64>,
}

impl Structure {
    /// Validate and build a configuration from `(name, value)` pairs
    ///
    /// Every missing and every extraneous parameter is reported in one error.
    pub fn new(kind: StructureKind, parameters: &[(&str, f64)]) -> FEAResult<Self> {
        let mut map = BTreeMap::new();
        for &(name, value) in parameters {
            if map.insert(name.to_string(), value).is_some() {
                return Err(FEAError::DuplicateParameter(name.to_string()));
            }
        }

        let missing: Vec<String> = kind
            .required_parameters()
            .iter()
            .filter(|name| !map.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        let extraneous: Vec<String> = map
            .keys()
            .filter(|name| !kind.accepts(name))
            .cloned()
            .collect();

        if !missing.is_empty() || !extraneous.is_empty() {
            return Err(FEAError::InvalidStructure {
                kind: kind.to_string(),
                missing,
                extraneous,
            });
        }

        for (name, &value) in &map {
            validate_value(name, value)?;
        }

        Ok(Self { kind, parameters: map })
    }

    /// Convenience constructor for a truss
    pub fn truss(area: f64, e: f64) -> FEAResult<Self> {
        Self::new(StructureKind::Truss, &[("A", area), ("E", e)])
    }

    /// Convenience constructor for a rectangular beam
    pub fn beam(width: f64, height: f64, poisson: f64, e: f64) -> FEAResult<Self> {
        Self::new(
            StructureKind::Beam,
            &[("width", width), ("height", height), ("poisson", poisson), ("E", e)],
        )
    }

    /// Convenience constructor for a flat shell
    pub fn flat_shell(thickness: f64, poisson: f64, e: f64) -> FEAResult<Self> {
        Self::new(
            StructureKind::FlatShell,
            &[("thickness", thickness), ("poisson", poisson), ("E", e)],
        )
    }

    /// Convenience constructor for a solid block
    pub fn quad_hexahedron(poisson: f64, e: f64) -> FEAResult<Self> {
        Self::new(StructureKind::QuadHexahedron, &[("poisson", poisson), ("E", e)])
    }

    /// Return a copy with an explicit relative lower bound on E
    pub fn with_relative_lower_bound(&self, bound: f64) -> FEAResult<Self> {
        validate_value(E_RELATIVE_LOWER_BOUND, bound)?;
        let mut structure = self.clone();
        structure
            .parameters
            .insert(E_RELATIVE_LOWER_BOUND.to_string(), bound);
        Ok(structure)
    }

    /// The structure kind
    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    /// Query a parameter by name
    ///
    /// Fails if the parameter does not belong to this kind, or if it belongs
    /// but was never assigned.
    pub fn get(&self, name: &str) -> FEAResult<f64> {
        if !self.kind.accepts(name) {
            return Err(FEAError::ParameterNotApplicable {
                kind: self.kind.to_string(),
                parameter: name.to_string(),
            });
        }
        self.parameters
            .get(name)
            .copied()
            .ok_or_else(|| FEAError::ParameterNotAssigned(name.to_string()))
    }

    /// Young's modulus
    pub fn youngs_modulus(&self) -> FEAResult<f64> {
        self.get("E")
    }

    /// Poisson's ratio
    pub fn poisson(&self) -> FEAResult<f64> {
        self.get("poisson")
    }

    /// Cross-sectional area (truss)
    pub fn area(&self) -> FEAResult<f64> {
        self.get("A")
    }

    /// Section width (beam)
    pub fn width(&self) -> FEAResult<f64> {
        self.get("width")
    }

    /// Section height (beam)
    pub fn height(&self) -> FEAResult<f64> {
        self.get("height")
    }

    /// Shell thickness
    pub fn thickness(&self) -> FEAResult<f64> {
        self.get("thickness")
    }

    /// Relative lower bound on E, defaulting when unassigned
    pub fn relative_lower_bound(&self) -> f64 {
        self.parameters
            .get(E_RELATIVE_LOWER_BOUND)
            .copied()
            .unwrap_or(DEFAULT_E_RELATIVE_LOWER_BOUND)
    }
}

fn validate_value(name: &str, value: f64) -> FEAResult<()> {
    if !value.is_finite() {
        return Err(FEAError::InvalidInput(format!(
            "parameter '{name}' must be finite, got {value}"
        )));
    }
    let valid = match name {
        "poisson" => value > -1.0 && value < 0.5,
        E_RELATIVE_LOWER_BOUND => (0.0..1.0).contains(&value),
        _ => value > 0.0,
    };
    if !valid {
        return Err(FEAError::InvalidInput(format!(
            "parameter '{name}' out of range: {value}"
        )));
    }
    Ok(())
}
