//! FE Model - node/element arena, global assembly and linear solve

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisOptions, SolverKind};
use crate::elements::{Element, Interpolation, Node, NodeId, Structure, DOFS_PER_NODE};
use crate::error::{FEAError, FEAResult, NumericalFailure};
use crate::math::{self, Vec as FEVec};
use crate::results::{AnalysisSummary, ElementResult, NodeDisplacement, Region, StructuralResults};
use crate::topopt::{Algorithm, OptimizationReport, TopOptSettings, TopologyOptimizer};

/// Assembly state of one analysis cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblyState {
    #[default]
    Idle,
    GsmGenerated,
    Solved,
    ResponseComputed,
}

/// The main 3D finite element model
///
/// Owns every node and element. Elements refer to nodes by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct FEModel {
    nodes: Vec<Node>,
    node_lookup: HashMap<[u64; 3], NodeId>,
    elements: Vec<Element>,
    element_lookup: HashMap<usize, usize>,
    load_cases: BTreeSet<String>,

    dof_count: usize,
    gsm: Option<CsrMatrix<f64>>,
    loads: BTreeMap<String, FEVec>,
    displacements: BTreeMap<String, FEVec>,
    state: AssemblyState,
}

/// Exact-position key; -0.0 and 0.0 map to the same node
fn position_key(position: &[f64; 3]) -> [u64; 3] {
    position.map(|v| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() })
}

impl FEModel {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a node, or return the existing one at exactly this position
    pub fn add_node(&mut self, x: f64, y: f64, z: f64) -> FEAResult<NodeId> {
        let position = [x, y, z];
        if position.iter().any(|v| !v.is_finite()) {
            return Err(FEAError::InvalidGeometry(format!(
                "node position must be finite, got {position:?}"
            )));
        }
        let key = position_key(&position);
        if let Some(&id) = self.node_lookup.get(&key) {
            return Ok(id);
        }

        let id = NodeId(self.nodes.len());
        let mut node = Node::new(x, y, z);
        node.id = id.0;
        self.nodes.push(node);
        self.node_lookup.insert(key, id);
        self.state = AssemblyState::Idle;
        Ok(id)
    }

    /// Look up a node by exact position
    pub fn find_node(&self, x: f64, y: f64, z: f64) -> Option<NodeId> {
        self.node_lookup.get(&position_key(&[x, y, z])).copied()
    }

    /// Construct an element from a structure configuration and append it
    pub fn create_element(&mut self, id: usize, structure: &Structure, nodes: &[NodeId]) -> FEAResult<()> {
        if self.element_lookup.contains_key(&id) {
            return Err(FEAError::DuplicateElement(id));
        }
        let element = Element::new(id, structure, nodes.to_vec(), &mut self.nodes)?;
        self.push_element(element);
        Ok(())
    }

    /// Append an element built against this model's node arena
    pub fn add_element(&mut self, element: Element) -> FEAResult<()> {
        if self.element_lookup.contains_key(&element.id()) {
            return Err(FEAError::DuplicateElement(element.id()));
        }
        for node_id in element.nodes() {
            if node_id.0 >= self.nodes.len() {
                return Err(FEAError::NodeNotFound(node_id.0));
            }
        }
        let signature = element.freedom_signature();
        for node_id in element.nodes() {
            self.nodes[node_id.0].update_freedom_signature(&signature);
        }
        self.push_element(element);
        Ok(())
    }

    fn push_element(&mut self, element: Element) {
        self.element_lookup.insert(element.id(), self.elements.len());
        self.elements.push(element);
        self.state = AssemblyState::Idle;
    }

    /// Fix a DOF of a node
    pub fn add_constraint(&mut self, node: NodeId, dof: usize) -> FEAResult<()> {
        self.node_mut(node)?.add_constraint(dof)?;
        self.state = AssemblyState::Idle;
        Ok(())
    }

    /// Fix several DOFs of a node
    pub fn add_constraints(&mut self, node: NodeId, dofs: &[usize]) -> FEAResult<()> {
        for &dof in dofs {
            self.add_constraint(node, dof)?;
        }
        Ok(())
    }

    /// Add a nodal load for a load case (summed with earlier loads)
    pub fn add_load(&mut self, node: NodeId, case: &str, dof: usize, magnitude: f64) -> FEAResult<()> {
        self.node_mut(node)?.add_load(case, dof, magnitude)?;
        self.load_cases.insert(case.to_string());
        self.state = AssemblyState::Idle;
        Ok(())
    }

    /// Set every element's density
    pub fn update_densities(&mut self, densities: &[f64], penal: f64, rule: Interpolation) -> FEAResult<()> {
        if densities.len() != self.elements.len() {
            return Err(FEAError::InvalidInput(format!(
                "expected {} densities, got {}",
                self.elements.len(),
                densities.len()
            )));
        }
        for (element, &x) in self.elements.iter_mut().zip(densities) {
            element.update_density(x, penal, rule)?;
        }
        self.state = AssemblyState::Idle;
        Ok(())
    }

    // ========================
    // Assembly & Solve
    // ========================

    /// Number the DOFs and assemble the global stiffness matrix and load vectors
    pub fn generate_gsm(&mut self) -> FEAResult<()> {
        let mut next = 0;
        for node in &mut self.nodes {
            node.generate_freedom_table(&mut next);
        }
        self.dof_count = next;

        let mut builder = math::SparseMatrixBuilder::new(self.dof_count);
        for element in &mut self.elements {
            element.generate_freedom_table(&self.nodes)?;
            builder.add_element_matrix(element.dof_map()?, element.stiffness());
        }
        self.gsm = Some(builder.to_csr());

        self.loads.clear();
        for case in &self.load_cases {
            let mut f = FEVec::zeros(self.dof_count);
            for node in &self.nodes {
                let Some(load) = node.load(case) else { continue };
                for (dof, &magnitude) in load.iter().enumerate() {
                    match node.global_dof(dof) {
                        Ok(index) => f[index] += magnitude,
                        Err(_) if magnitude != 0.0 => log::warn!(
                            "load {magnitude} on DOF {dof} of node {} ({case}) is not on a free DOF and is ignored",
                            node.id
                        ),
                        Err(_) => {}
                    }
                }
            }
            self.loads.insert(case.clone(), f);
        }

        log::debug!(
            "Assembled {} equations from {} nodes and {} elements",
            self.dof_count,
            self.nodes.len(),
            self.elements.len()
        );
        self.state = AssemblyState::GsmGenerated;
        Ok(())
    }

    fn assembled_matrix(&self) -> FEAResult<&CsrMatrix<f64>> {
        if self.state == AssemblyState::Idle {
            return Err(FEAError::InvalidState(
                "generate_gsm must run before solving".to_string(),
            ));
        }
        self.gsm
            .as_ref()
            .ok_or_else(|| FEAError::InvalidState("global stiffness matrix missing".to_string()))
    }

    /// Solve K·u = F for every load case with a named solver
    pub fn solve(&mut self, solver: &str) -> FEAResult<()> {
        let options = AnalysisOptions::with_solver_name(solver)?;
        self.solve_with(&options)
    }

    /// Solve K·u = F for every load case
    pub fn solve_with(&mut self, options: &AnalysisOptions) -> FEAResult<()> {
        let k = self.assembled_matrix()?;
        let n = self.dof_count;

        let mut solutions = BTreeMap::new();
        match options.solver {
            SolverKind::Direct => {
                let direct = DirectSolver::factor(k, options.reorder)?;
                for (case, f) in &self.loads {
                    solutions.insert(case.clone(), direct.solve(f));
                }
            }
            SolverKind::BiCgStab | SolverKind::ConjugateGradient => {
                let cap = options.iteration_cap(n);
                for (case, f) in &self.loads {
                    let u = if options.solver == SolverKind::BiCgStab {
                        math::solve_bicgstab(k, f, options.tolerance, cap)?
                    } else {
                        math::solve_pcg(k, f, options.tolerance, cap)?
                    };
                    solutions.insert(case.clone(), u);
                }
            }
        }

        for u in solutions.values() {
            if u.iter().any(|v| !v.is_finite()) {
                return Err(NumericalFailure::SingularMatrix.into());
            }
        }

        for node in &mut self.nodes {
            node.displacements.clear();
            for (case, u) in &solutions {
                let mut values = [0.0; DOFS_PER_NODE];
                for (dof, value) in values.iter_mut().enumerate() {
                    if let Some(index) = node.freedom_table[dof] {
                        *value = u[index];
                    }
                }
                node.displacements.insert(case.clone(), values);
            }
        }

        log::debug!("Solved {} load case(s) with the {} solver", solutions.len(), options.solver);
        self.displacements = solutions;
        self.state = AssemblyState::Solved;
        Ok(())
    }

    /// Whether the assembled system is singular (under-constrained)
    ///
    /// An empty system counts as singular.
    pub fn is_singular(&self) -> FEAResult<bool> {
        let k = self.assembled_matrix()?;
        if self.dof_count == 0 {
            return Ok(true);
        }
        match DirectSolver::factor(k, true) {
            Ok(_) => Ok(false),
            Err(FEAError::Numerical(
                NumericalFailure::SingularMatrix | NumericalFailure::NotPositiveDefinite { .. },
            )) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Compute per-element strain energy for every solved load case
    pub fn compute_response(&mut self) -> FEAResult<()> {
        if self.state != AssemblyState::Solved {
            return Err(FEAError::InvalidState(format!(
                "compute_response requires a solved system (state is {:?})",
                self.state
            )));
        }
        let cases: Vec<String> = self.displacements.keys().cloned().collect();
        for element in &mut self.elements {
            for case in &cases {
                element.compute_response(case, &self.nodes)?;
            }
        }
        self.state = AssemblyState::ResponseComputed;
        Ok(())
    }

    /// Drop cached energies and displacements; geometry and densities stay
    pub fn clear_response(&mut self) {
        for element in &mut self.elements {
            element.clear_response();
        }
        for node in &mut self.nodes {
            node.clear_response();
        }
        self.displacements.clear();
        self.state = AssemblyState::Idle;
    }

    /// Full linear static analysis: clear, assemble, solve, compute response
    pub fn analyze(&mut self, solver: &str) -> FEAResult<StructuralResults> {
        let options = AnalysisOptions::with_solver_name(solver)?;
        self.analyze_with(&options)
    }

    pub fn analyze_with(&mut self, options: &AnalysisOptions) -> FEAResult<StructuralResults> {
        self.clear_response();
        self.generate_gsm()?;
        self.solve_with(options)?;
        self.compute_response()?;
        Ok(self.results())
    }

    /// Run a topology optimization with default output settings
    pub fn topology_optimization(&mut self, algorithm: Algorithm, settings: TopOptSettings) -> FEAResult<OptimizationReport> {
        TopologyOptimizer::new(algorithm, settings)?.run(self)
    }

    // ========================
    // Result Methods
    // ========================

    /// Aggregate energies and volume over all elements
    pub fn results(&self) -> StructuralResults {
        let mut results = StructuralResults::default();
        for element in &self.elements {
            results.accumulate(&element.energy_split(), element.volume(), element.density());
        }
        results
    }

    /// Aggregate energies and volume over elements whose center lies in `region`
    pub fn results_in_region(&self, region: &Region) -> StructuralResults {
        let mut results = StructuralResults::default();
        for element in self.elements.iter().filter(|e| region.contains(&e.center())) {
            results.accumulate(&element.energy_split(), element.volume(), element.density());
        }
        results
    }

    /// Per-element density, energy and center stress for visualization
    pub fn element_results(&self) -> FEAResult<Vec<ElementResult>> {
        let first_case = self.displacements.keys().next();
        self.elements
            .iter()
            .map(|element| {
                let stress = match first_case {
                    Some(case) => element.center_stress(case)?,
                    None => None,
                };
                Ok(ElementResult {
                    id: element.id(),
                    kind: element.structure_kind().to_string(),
                    density: element.density(),
                    energy: element.energy(),
                    center: element.center(),
                    stress,
                })
            })
            .collect()
    }

    /// Displacement of a node for a load case
    pub fn node_displacement(&self, node: NodeId, case: &str) -> FEAResult<NodeDisplacement> {
        let disp = self
            .node(node)?
            .displacement(case)
            .ok_or_else(|| FEAError::InvalidState(format!("no displacements for load case '{case}'")))?;
        Ok(NodeDisplacement::from_array(disp))
    }

    /// Summary of the last analysis
    pub fn summary(&self) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            num_nodes: self.nodes.len(),
            num_elements: self.elements.len(),
            free_dofs: self.dof_count,
            load_cases: self.displacements.keys().cloned().collect(),
            ..Default::default()
        };
        for node in &self.nodes {
            for disp in node.displacements.values() {
                let magnitude = NodeDisplacement::from_array(*disp).translation_magnitude();
                if magnitude > summary.max_displacement {
                    summary.max_displacement = magnitude;
                    summary.max_disp_node = Some(node.id);
                }
            }
        }
        summary
    }

    // ========================
    // Accessors
    // ========================

    pub fn node(&self, id: NodeId) -> FEAResult<&Node> {
        self.nodes.get(id.0).ok_or(FEAError::NodeNotFound(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> FEAResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(FEAError::NodeNotFound(id.0))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: usize) -> FEAResult<&Element> {
        self.element_lookup
            .get(&id)
            .map(|&index| &self.elements[index])
            .ok_or(FEAError::ElementNotFound(id))
    }

    pub fn load_cases(&self) -> impl Iterator<Item = &str> {
        self.load_cases.iter().map(String::as_str)
    }

    /// Number of free equations from the last assembly
    pub fn dof_count(&self) -> usize {
        self.dof_count
    }

    pub fn global_stiffness(&self) -> Option<&CsrMatrix<f64>> {
        self.gsm.as_ref()
    }

    /// Assembled load vector for a load case
    pub fn load_vector(&self, case: &str) -> Option<&FEVec> {
        self.loads.get(case)
    }

    /// Global displacement vector for a load case
    pub fn displacement_vector(&self, case: &str) -> Option<&FEVec> {
        self.displacements.get(case)
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Total geometric volume of all elements
    pub fn total_volume(&self) -> f64 {
        self.elements.iter().map(Element::volume).sum()
    }
}

/// Skyline Cholesky factor with optional reverse Cuthill-McKee ordering
struct DirectSolver {
    factor: math::SkylineCholesky,
    /// `perm[new] = old`
    permutation: Option<Vec<usize>>,
}

impl DirectSolver {
    fn factor(k: &CsrMatrix<f64>, reorder: bool) -> FEAResult<Self> {
        if !reorder {
            return Ok(Self {
                factor: math::SkylineCholesky::factor(k)?,
                permutation: None,
            });
        }
        let perm = math::reverse_cuthill_mckee(k);
        let permuted = math::permute_symmetric(k, &perm);
        let factor = math::SkylineCholesky::factor(&permuted)?;
        log::debug!("Skyline profile after reordering: {} entries", factor.profile());
        Ok(Self {
            factor,
            permutation: Some(perm),
        })
    }

    fn solve(&self, f: &FEVec) -> FEVec {
        match &self.permutation {
            None => self.factor.solve(f),
            Some(perm) => {
                let f_perm = FEVec::from_fn(f.len(), |i, _| f[perm[i]]);
                let y = self.factor.solve(&f_perm);
                let mut u = FEVec::zeros(f.len());
                for (new, &old) in perm.iter().enumerate() {
                    u[old] = y[new];
                }
                u
            }
        }
    }
}
