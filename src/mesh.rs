//! Structured mesher - subdivides line, quad and hexahedron members into an FEModel

use serde::{Deserialize, Serialize};

use crate::elements::{check_dof, NodeId, Structure, StructureKind};
use crate::error::{FEAError, FEAResult};
use crate::model::FEModel;
use crate::results::Region;

/// Grid that generated points are rounded to
pub const SNAP_TOLERANCE: f64 = 1e-9;

/// Member geometry by corner points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MemberShape {
    Line([[f64; 3]; 2]),
    /// Corners in counter-clockwise order
    Quad([[f64; 3]; 4]),
    /// Bottom face counter-clockwise, then the top face in the same order
    Hexahedron([[f64; 3]; 8]),
}

impl MemberShape {
    fn corner_count(&self) -> usize {
        match self {
            MemberShape::Line(_) => 2,
            MemberShape::Quad(_) => 4,
            MemberShape::Hexahedron(_) => 8,
        }
    }

    /// Point at parametric coordinates in [0, 1]
    fn point_at(&self, s: f64, t: f64, u: f64) -> [f64; 3] {
        let mut p = [0.0; 3];
        let mut add = |corner: &[f64; 3], weight: f64| {
            for axis in 0..3 {
                p[axis] += weight * corner[axis];
            }
        };
        match self {
            MemberShape::Line(c) => {
                add(&c[0], 1.0 - s);
                add(&c[1], s);
            }
            MemberShape::Quad(c) => {
                add(&c[0], (1.0 - s) * (1.0 - t));
                add(&c[1], s * (1.0 - t));
                add(&c[2], s * t);
                add(&c[3], (1.0 - s) * t);
            }
            MemberShape::Hexahedron(c) => {
                add(&c[0], (1.0 - s) * (1.0 - t) * (1.0 - u));
                add(&c[1], s * (1.0 - t) * (1.0 - u));
                add(&c[2], s * t * (1.0 - u));
                add(&c[3], (1.0 - s) * t * (1.0 - u));
                add(&c[4], (1.0 - s) * (1.0 - t) * u);
                add(&c[5], s * (1.0 - t) * u);
                add(&c[6], s * t * u);
                add(&c[7], (1.0 - s) * t * u);
            }
        }
        p
    }
}

#[derive(Debug, Clone)]
struct Member {
    shape: MemberShape,
    structure: Structure,
}

#[derive(Debug, Clone)]
struct LoadSpec {
    case: String,
    dof: usize,
    magnitude: f64,
}

/// Where a constraint or load is applied
#[derive(Debug, Clone)]
enum Target {
    Point([f64; 3]),
    Region(Region),
}

/// Collects members, supports and loads, then meshes them into an [`FEModel`]
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    members: Vec<Member>,
    constraints: Vec<(Target, Vec<usize>)>,
    loads: Vec<(Target, LoadSpec)>,
    mesh_size: usize,
}

/// Round a coordinate so that points computed along shared edges coincide
fn snap(point: [f64; 3]) -> [f64; 3] {
    point.map(|v| {
        // recip() of 1e-9 is one ulp short of 1e9, which would shift integers
        let scale = SNAP_TOLERANCE.recip().round();
        let snapped = (v * scale).round() / scale;
        if snapped == 0.0 {
            0.0
        } else {
            snapped
        }
    })
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            mesh_size: 1,
            ..Default::default()
        }
    }

    fn add_member(&mut self, shape: MemberShape, structure: &Structure) -> FEAResult<&mut Self> {
        if structure.kind().node_count() != shape.corner_count() {
            return Err(FEAError::InvalidInput(format!(
                "{} structure cannot be meshed on a member with {} corners",
                structure.kind(),
                shape.corner_count()
            )));
        }
        self.members.push(Member {
            shape,
            structure: structure.clone(),
        });
        Ok(self)
    }

    /// Add a line member (truss or beam)
    pub fn add_line(&mut self, a: [f64; 3], b: [f64; 3], structure: &Structure) -> FEAResult<&mut Self> {
        self.add_member(MemberShape::Line([a, b]), structure)
    }

    /// Add a quadrilateral surface member (flat shell)
    pub fn add_quad(&mut self, corners: [[f64; 3]; 4], structure: &Structure) -> FEAResult<&mut Self> {
        self.add_member(MemberShape::Quad(corners), structure)
    }

    /// Add a hexahedral volume member
    pub fn add_hexahedron(&mut self, corners: [[f64; 3]; 8], structure: &Structure) -> FEAResult<&mut Self> {
        self.add_member(MemberShape::Hexahedron(corners), structure)
    }

    /// Constrain DOFs at the mesh node located at `point`
    pub fn constrain_point(&mut self, point: [f64; 3], dofs: &[usize]) -> FEAResult<&mut Self> {
        dofs.iter().try_for_each(|&dof| check_dof(dof))?;
        self.constraints.push((Target::Point(point), dofs.to_vec()));
        Ok(self)
    }

    /// Constrain DOFs at every mesh node inside `region`
    pub fn constrain_region(&mut self, region: Region, dofs: &[usize]) -> FEAResult<&mut Self> {
        dofs.iter().try_for_each(|&dof| check_dof(dof))?;
        self.constraints.push((Target::Region(region), dofs.to_vec()));
        Ok(self)
    }

    /// Nodal load at the mesh node located at `point`
    pub fn load_point(&mut self, point: [f64; 3], case: &str, dof: usize, magnitude: f64) -> FEAResult<&mut Self> {
        check_dof(dof)?;
        self.loads.push((
            Target::Point(point),
            LoadSpec {
                case: case.to_string(),
                dof,
                magnitude,
            },
        ));
        Ok(self)
    }

    /// The same nodal load on every mesh node inside `region`
    pub fn load_region(&mut self, region: Region, case: &str, dof: usize, magnitude: f64) -> FEAResult<&mut Self> {
        check_dof(dof)?;
        self.loads.push((
            Target::Region(region),
            LoadSpec {
                case: case.to_string(),
                dof,
                magnitude,
            },
        ));
        Ok(self)
    }

    pub fn mesh_size(&self) -> usize {
        self.mesh_size
    }

    /// Record the subdivision count and mesh with it
    pub fn set_mesh_size(&mut self, n: usize) -> FEAResult<FEModel> {
        self.mesh_size = n;
        self.mesh(n)
    }

    /// Subdivide every member into `n` parts per parametric direction
    pub fn mesh(&self, n: usize) -> FEAResult<FEModel> {
        if n == 0 {
            return Err(FEAError::InvalidInput("mesh size must be at least 1".to_string()));
        }

        let mut model = FEModel::new();
        let mut next_id = 0;
        for member in &self.members {
            next_id = mesh_member(&mut model, member, n, next_id)?;
        }

        for (target, dofs) in &self.constraints {
            for node in self.resolve(&model, target)? {
                model.add_constraints(node, dofs)?;
            }
        }
        for (target, load) in &self.loads {
            for node in self.resolve(&model, target)? {
                model.add_load(node, &load.case, load.dof, load.magnitude)?;
            }
        }

        log::debug!(
            "Meshed {} members into {} nodes and {} elements",
            self.members.len(),
            model.nodes().len(),
            model.elements().len()
        );
        Ok(model)
    }

    fn resolve(&self, model: &FEModel, target: &Target) -> FEAResult<Vec<NodeId>> {
        match target {
            Target::Point(point) => {
                let [x, y, z] = snap(*point);
                let node = model.find_node(x, y, z).ok_or_else(|| {
                    FEAError::InvalidInput(format!("no mesh node at {point:?}"))
                })?;
                Ok(vec![node])
            }
            Target::Region(region) => {
                let nodes: Vec<NodeId> = model
                    .nodes()
                    .iter()
                    .filter(|node| region.contains(&node.coords()))
                    .map(|node| node.id())
                    .collect();
                if nodes.is_empty() {
                    log::warn!("region {:?}..{:?} contains no mesh nodes", region.min, region.max);
                }
                Ok(nodes)
            }
        }
    }
}

/// Mesh one member, returning the next free element id
fn mesh_member(model: &mut FEModel, member: &Member, n: usize, mut next_id: usize) -> FEAResult<usize> {
    let step = 1.0 / n as f64;
    let node_at = |model: &mut FEModel, i: usize, j: usize, k: usize| -> FEAResult<NodeId> {
        let [x, y, z] = snap(member.shape.point_at(i as f64 * step, j as f64 * step, k as f64 * step));
        model.add_node(x, y, z)
    };

    match member.structure.kind() {
        StructureKind::Truss | StructureKind::Beam => {
            for i in 0..n {
                let nodes = [node_at(model, i, 0, 0)?, node_at(model, i + 1, 0, 0)?];
                model.create_element(next_id, &member.structure, &nodes)?;
                next_id += 1;
            }
        }
        StructureKind::FlatShell => {
            for j in 0..n {
                for i in 0..n {
                    let nodes = [
                        node_at(model, i, j, 0)?,
                        node_at(model, i + 1, j, 0)?,
                        node_at(model, i + 1, j + 1, 0)?,
                        node_at(model, i, j + 1, 0)?,
                    ];
                    model.create_element(next_id, &member.structure, &nodes)?;
                    next_id += 1;
                }
            }
        }
        StructureKind::QuadHexahedron => {
            for k in 0..n {
                for j in 0..n {
                    for i in 0..n {
                        let nodes = [
                            node_at(model, i, j, k)?,
                            node_at(model, i + 1, j, k)?,
                            node_at(model, i + 1, j + 1, k)?,
                            node_at(model, i, j + 1, k)?,
                            node_at(model, i, j, k + 1)?,
                            node_at(model, i + 1, j, k + 1)?,
                            node_at(model, i + 1, j + 1, k + 1)?,
                            node_at(model, i, j + 1, k + 1)?,
                        ];
                        model.create_element(next_id, &member.structure, &nodes)?;
                        next_id += 1;
                    }
                }
            }
        }
    }
    Ok(next_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Structure {
        Structure::flat_shell(0.1, 0.3, 1000.0).unwrap()
    }

    #[test]
    fn test_snap_merges_near_points() {
        assert_eq!(snap([0.1 + 0.2, 0.0, -0.0]), snap([0.3, 0.0, 0.0]));
    }

    #[test]
    fn test_snap_keeps_grid_values() {
        for v in [1.0, 2.0, 10.0, 12.5, -3.0, 1234.0] {
            assert_eq!(snap([v, v, v]), [v, v, v]);
        }
    }

    #[test]
    fn test_corners_found_by_exact_position() {
        let corners = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 2.0, 0.0], [0.0, 2.0, 0.0]];
        let mut builder = MeshBuilder::new();
        builder.add_quad(corners, &shell()).unwrap();
        let model = builder.mesh(4).unwrap();
        for [x, y, z] in corners {
            assert!(model.find_node(x, y, z).is_some(), "no node at ({x}, {y}, {z})");
        }
        assert!(model.find_node(2.5, 0.5, 0.0).is_some());
    }

    #[test]
    fn test_invalid_dof_rejected() {
        let mut builder = MeshBuilder::new();
        assert!(matches!(
            builder.constrain_point([0.0; 3], &[6]),
            Err(FEAError::InvalidDof(6))
        ));
        assert!(matches!(
            builder.load_point([0.0; 3], "c", 9, 1.0),
            Err(FEAError::InvalidDof(9))
        ));
    }

    #[test]
    fn test_adjacent_quads_share_edge() {
        let mut builder = MeshBuilder::new();
        builder
            .add_quad([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]], &shell())
            .unwrap()
            .add_quad([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [1.0, 1.0, 0.0]], &shell())
            .unwrap();
        let model = builder.mesh(3).unwrap();
        assert_eq!(model.elements().len(), 18);
        // 7 x 4 grid; the shared edge holds 4 nodes
        assert_eq!(model.nodes().len(), 28);
    }

    #[test]
    fn test_line_subdivision() {
        let truss = Structure::truss(1.0, 1.0).unwrap();
        let mut builder = MeshBuilder::new();
        builder.add_line([0.0, 0.0, 0.0], [3.0, 0.0, 0.0], &truss).unwrap();
        let model = builder.set_mesh_size(3).unwrap();
        assert_eq!(builder.mesh_size(), 3);
        assert_eq!(model.nodes().len(), 4);
        assert!(model.find_node(2.0, 0.0, 0.0).is_some());
    }

    #[test]
    fn test_hexahedron_grid() {
        let solid = Structure::quad_hexahedron(0.3, 1000.0).unwrap();
        let corners = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        let mut builder = MeshBuilder::new();
        builder.add_hexahedron(corners, &solid).unwrap();
        let model = builder.mesh(2).unwrap();
        assert_eq!(model.elements().len(), 8);
        assert_eq!(model.nodes().len(), 27);
        let total: f64 = model.elements().iter().map(|e| e.volume()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_structure_shape_mismatch() {
        let mut builder = MeshBuilder::new();
        assert!(builder.add_line([0.0; 3], [1.0, 0.0, 0.0], &shell()).is_err());
    }

    #[test]
    fn test_missing_point_fails() {
        let truss = Structure::truss(1.0, 1.0).unwrap();
        let mut builder = MeshBuilder::new();
        builder
            .add_line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], &truss)
            .unwrap()
            .constrain_point([0.5, 0.5, 0.0], &[0])
            .unwrap();
        assert!(matches!(builder.mesh(1), Err(FEAError::InvalidInput(_))));
    }
}
