use fea_topopt::prelude::*;

/// Truss and beam sharing a node: the beam end needs all six DOFs
fn mixed_frame() -> (FEModel, [NodeId; 3]) {
    let mut model = FEModel::new();
    let a = model.add_node(0.0, 0.0, 0.0).unwrap();
    let b = model.add_node(2.0, 0.0, 0.0).unwrap();
    let c = model.add_node(2.0, 0.0, 1.5).unwrap();

    let beam = Structure::beam(0.2, 0.3, 0.3, 30e9).unwrap();
    let bar = Structure::truss(1e-3, 200e9).unwrap();
    model.create_element(10, &beam, &[a, b]).unwrap();
    model.create_element(11, &bar, &[b, c]).unwrap();
    model.create_element(12, &bar, &[a, c]).unwrap();

    model.add_constraints(a, &[0, 1, 2, 3, 4, 5]).unwrap();
    model.add_constraints(c, &[0, 1, 2]).unwrap();
    model.add_load(b, "service", 2, -5000.0).unwrap();
    (model, [a, b, c])
}

#[test]
fn shared_nodes_take_the_union_signature() {
    let (mut model, [a, b, c]) = mixed_frame();
    assert_eq!(model.node(a).unwrap().freedom_signature(), [true; 6]);
    assert_eq!(model.node(b).unwrap().freedom_signature(), [true; 6]);
    assert_eq!(
        model.node(c).unwrap().freedom_signature(),
        [true, true, true, false, false, false]
    );

    model.generate_gsm().unwrap();
    // Only node b carries free equations
    assert_eq!(model.dof_count(), 6);
    assert!(model.node(c).unwrap().global_dof(3).is_err());
    assert_eq!(model.global_stiffness().unwrap().nrows(), 6);
}

#[test]
fn dof_numbering_is_deterministic() {
    let (mut model, nodes) = mixed_frame();
    model.generate_gsm().unwrap();
    let first: Vec<Vec<Option<usize>>> = nodes
        .iter()
        .map(|&n| (0..6).map(|d| model.node(n).unwrap().global_dof(d).ok()).collect())
        .collect();
    let dofs = model.element(11).unwrap().dof_map().unwrap().to_vec();

    model.generate_gsm().unwrap();
    let second: Vec<Vec<Option<usize>>> = nodes
        .iter()
        .map(|&n| (0..6).map(|d| model.node(n).unwrap().global_dof(d).ok()).collect())
        .collect();
    assert_eq!(first, second);
    assert_eq!(dofs, model.element(11).unwrap().dof_map().unwrap());
    assert_eq!(first[1], (0..6).map(Some).collect::<Vec<_>>());
}

#[test]
fn solve_requires_assembly() {
    let (mut model, _) = mixed_frame();
    let err = model.solve("direct").unwrap_err();
    assert!(matches!(err, FEAError::InvalidState(_)));
    assert!(!err.is_numerical());
    assert!(model.is_singular().is_err());
}

#[test]
fn mutation_returns_to_idle() {
    let (mut model, [_, b, _]) = mixed_frame();
    model.analyze("direct").unwrap();
    assert_eq!(model.state(), AssemblyState::ResponseComputed);

    model.add_load(b, "service", 0, 100.0).unwrap();
    assert_eq!(model.state(), AssemblyState::Idle);
    assert!(matches!(model.solve("direct"), Err(FEAError::InvalidState(_))));
}

#[test]
fn unknown_solver_is_reported() {
    let (mut model, _) = mixed_frame();
    let err = model.analyze("PardisoLU").unwrap_err();
    assert!(matches!(err, FEAError::UnknownSolver(ref name) if name == "PardisoLU"));
}

#[test]
fn mechanism_is_singular() {
    // Bar pinned at one end only: free to swing
    let mut model = FEModel::new();
    let a = model.add_node(0.0, 0.0, 0.0).unwrap();
    let b = model.add_node(1.0, 0.0, 0.0).unwrap();
    model
        .create_element(0, &Structure::truss(1.0, 1.0).unwrap(), &[a, b])
        .unwrap();
    model.add_constraints(a, &[0, 1, 2]).unwrap();
    model.add_load(b, "swing", 1, 1.0).unwrap();

    model.generate_gsm().unwrap();
    assert!(model.is_singular().unwrap());

    let err = model.solve("direct").unwrap_err();
    assert!(err.is_numerical());
    assert!(matches!(
        err.numerical(),
        Some(NumericalFailure::SingularMatrix | NumericalFailure::NotPositiveDefinite { .. })
    ));

    model.add_constraints(b, &[1, 2]).unwrap();
    model.generate_gsm().unwrap();
    assert!(!model.is_singular().unwrap());
}

#[test]
fn fully_constrained_model_is_empty_system() {
    let mut model = FEModel::new();
    let a = model.add_node(0.0, 0.0, 0.0).unwrap();
    let b = model.add_node(1.0, 0.0, 0.0).unwrap();
    model
        .create_element(0, &Structure::truss(1.0, 1.0).unwrap(), &[a, b])
        .unwrap();
    model.add_constraints(a, &[0, 1, 2]).unwrap();
    model.add_constraints(b, &[0, 1, 2]).unwrap();
    model.add_load(b, "held", 0, 1.0).unwrap();

    model.generate_gsm().unwrap();
    assert_eq!(model.dof_count(), 0);
    assert!(model.is_singular().unwrap());

    let results = model.analyze("direct").unwrap();
    assert_eq!(results.total_strain_energy, 0.0);
    assert_eq!(model.node_displacement(b, "held").unwrap().dx, 0.0);
}

#[test]
fn density_update_is_idempotent() {
    let (mut model, _) = mixed_frame();
    let densities = [0.3, 0.7, 1.0];
    model
        .update_densities(&densities, 3.0, Interpolation::ModifiedSimp)
        .unwrap();
    let first: Vec<_> = model.elements().iter().map(|e| e.stiffness().clone()).collect();

    model
        .update_densities(&densities, 3.0, Interpolation::ModifiedSimp)
        .unwrap();
    for (element, k) in model.elements().iter().zip(&first) {
        assert_eq!(element.stiffness(), k);
    }

    assert!(model
        .update_densities(&[0.5, 1.2, 0.5], 3.0, Interpolation::Simp)
        .is_err());
    assert!(model.update_densities(&[0.5], 3.0, Interpolation::Simp).is_err());
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut model = FEModel::new();
    let a = model.add_node(0.0, 0.0, 0.0).unwrap();
    let b = model.add_node(1.0, 0.0, 0.0).unwrap();
    let bar = Structure::truss(1.0, 1.0).unwrap();

    assert!(matches!(model.add_constraint(a, 6), Err(FEAError::InvalidDof(6))));
    assert!(matches!(model.add_load(a, "x", 7, 1.0), Err(FEAError::InvalidDof(7))));
    assert!(matches!(
        model.add_constraint(NodeId(99), 0),
        Err(FEAError::NodeNotFound(99))
    ));
    assert!(matches!(
        model.create_element(0, &bar, &[a, a]),
        Err(FEAError::InvalidGeometry(_))
    ));
    assert!(model.create_element(0, &bar, &[a]).is_err());

    model.create_element(0, &bar, &[a, b]).unwrap();
    assert!(matches!(
        model.create_element(0, &bar, &[b, a]),
        Err(FEAError::DuplicateElement(0))
    ));
    assert!(matches!(model.element(5), Err(FEAError::ElementNotFound(5))));
}

#[test]
fn load_on_constrained_dof_is_ignored() {
    let (mut model, [a, b, _]) = mixed_frame();
    model.add_load(a, "service", 2, -1e6).unwrap();
    model.generate_gsm().unwrap();
    let f = model.load_vector("service").unwrap();
    assert_eq!(f.iter().filter(|v| **v != 0.0).count(), 1);
    let index = model.node(b).unwrap().global_dof(2).unwrap();
    assert_eq!(f[index], -5000.0);
}
