//! Network construction and validation through the public API.

use bayesnet_core::{ModelError, Network, TableLayout, Variable};

fn binary(builder: &mut bayesnet_core::NetworkBuilder, names: &[&str]) {
    for name in names {
        builder.add_variable(Variable::new(*name, 2).unwrap()).unwrap();
    }
}

#[test]
fn column_summing_to_095_is_not_normalized() {
    let mut b = Network::builder();
    binary(&mut b, &["A", "B"]);
    b.add_edge("A", "B").unwrap();
    b.add_cpd::<&str>("A", &[], vec![0.5, 0.5]).unwrap();
    // Column A=1 sums to 0.15 + 0.8 = 0.95.
    b.add_cpd("B", &["A"], vec![0.8, 0.15, 0.2, 0.8]).unwrap();
    match b.build() {
        Err(ModelError::NotNormalized {
            variable,
            parent_assignment,
            sum,
        }) => {
            assert_eq!(variable, "B");
            assert_eq!(parent_assignment, vec![("A".to_string(), 1)]);
            assert!((sum - 0.95).abs() < 1e-12);
        }
        other => panic!("expected NotNormalized, got {:?}", other),
    }
}

#[test]
fn cycle_is_rejected_with_its_members() {
    let mut b = Network::builder();
    binary(&mut b, &["Root", "X", "Y"]);
    b.add_edge("Root", "X").unwrap();
    b.add_edge("X", "Y").unwrap();
    b.add_edge("Y", "X").unwrap();
    b.add_cpd::<&str>("Root", &[], vec![0.5, 0.5]).unwrap();
    b.add_cpd("X", &["Root", "Y"], vec![0.5; 8]).unwrap();
    b.add_cpd("Y", &["X"], vec![0.5; 4]).unwrap();
    match b.build() {
        Err(ModelError::CycleDetected(names)) => {
            assert!(names.contains(&"X".to_string()));
            assert!(names.contains(&"Y".to_string()));
            assert!(!names.contains(&"Root".to_string()));
        }
        other => panic!("expected CycleDetected, got {:?}", other),
    }
}

#[test]
fn missing_cpd_and_scope_mismatch() {
    let mut b = Network::builder();
    binary(&mut b, &["A", "B"]);
    b.add_edge("A", "B").unwrap();
    b.add_cpd::<&str>("A", &[], vec![0.5, 0.5]).unwrap();
    assert_eq!(b.clone().build().unwrap_err(), ModelError::MissingCpd("B".into()));

    b.add_cpd::<&str>("B", &[], vec![0.5, 0.5]).unwrap();
    assert!(matches!(
        b.build(),
        Err(ModelError::CpdScopeMismatch { variable, .. }) if variable == "B"
    ));
}

#[test]
fn wrong_table_size_is_reported() {
    let mut b = Network::builder();
    binary(&mut b, &["A", "B"]);
    b.add_edge("A", "B").unwrap();
    b.add_cpd::<&str>("A", &[], vec![0.5, 0.5]).unwrap();
    b.add_cpd("B", &["A"], vec![0.5, 0.5, 0.5]).unwrap();
    assert_eq!(
        b.build().unwrap_err(),
        ModelError::TableSizeMismatch {
            variable: "B".into(),
            expected: 4,
            found: 3,
        }
    );
}

#[test]
fn layouts_describe_the_same_cpd() {
    let build = |layout: TableLayout, table: Vec<f64>| {
        let mut b = Network::builder();
        b.add_variable(Variable::new("P", 2).unwrap()).unwrap();
        b.add_variable(Variable::new("X", 3).unwrap()).unwrap();
        b.add_edge("P", "X").unwrap();
        b.add_cpd::<&str>("P", &[], vec![0.4, 0.6]).unwrap();
        b.add_cpd_with_layout("X", &["P"], table, layout).unwrap();
        b.build().unwrap()
    };
    // P(X | P=0) = [0.1, 0.2, 0.7], P(X | P=1) = [0.5, 0.3, 0.2]
    let state_major = build(TableLayout::StateMajor, vec![0.1, 0.5, 0.2, 0.3, 0.7, 0.2]);
    let parent_major = build(TableLayout::ParentMajor, vec![0.1, 0.2, 0.7, 0.5, 0.3, 0.2]);
    assert_eq!(state_major.cpds(), parent_major.cpds());
}

#[test]
fn topological_order_breaks_ties_by_declaration() {
    let mut b = Network::builder();
    binary(&mut b, &["Late", "Early", "Child"]);
    b.add_edge("Early", "Child").unwrap();
    b.add_edge("Late", "Child").unwrap();
    b.add_cpd::<&str>("Late", &[], vec![0.5, 0.5]).unwrap();
    b.add_cpd::<&str>("Early", &[], vec![0.5, 0.5]).unwrap();
    b.add_cpd("Child", &["Early", "Late"], vec![0.5; 8]).unwrap();
    let net = b.build().unwrap();
    let names: Vec<String> = net
        .topological_order()
        .iter()
        .map(|&v| net.variables().name(v))
        .collect();
    assert_eq!(names, vec!["Late", "Early", "Child"]);
}
