//! Loading the demo model definitions.

use bayesnet_core::{
    load_network, DefinitionError, Evidence, ModelDefinition, ModelError, VariableElimination,
};
use bayesnet_tests::{brute_force, demos_dir, max_abs_diff};
use std::fs;

#[test]
fn all_demo_models_build() {
    let mut found = 0usize;
    for entry in fs::read_dir(demos_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) == Some("requests") {
            continue;
        }
        found += 1;
        let net = load_network(&path)
            .unwrap_or_else(|e| panic!("{} failed: {}", path.display(), e));
        assert!(!net.is_empty());
    }
    assert!(found >= 3, "expected the demo models, found {}", found);
}

#[test]
fn sprinkler_posterior_matches_enumeration() {
    let net = load_network(demos_dir().join("sprinkler.json")).unwrap();
    let evidence = Evidence::new().observe("WetGrass", "true");
    let got = VariableElimination::new(&net)
        .query(&["Rain"], &evidence)
        .unwrap();
    let expected = brute_force(&net, &["Rain"], &evidence).unwrap();
    assert!(max_abs_diff(got.values(), &expected) < 1e-9);
    // Wet grass makes rain more likely than its 0.5 prior.
    assert!(got.probability_of(&["true"]).unwrap() > 0.5);
}

#[test]
fn attribution_hypothesis_responds_to_evidence() {
    let net = load_network(demos_dir().join("attribution.json")).unwrap();
    let ve = VariableElimination::new(&net);
    let prior = ve.query(&["Hypothesis"], &Evidence::new()).unwrap();
    let evidence = Evidence::new()
        .observe("Incident", "yes")
        .observe("Motive", "strong");
    let posterior = ve.query(&["Hypothesis"], &evidence).unwrap();
    let expected = brute_force(&net, &["Hypothesis"], &evidence).unwrap();
    assert!(max_abs_diff(posterior.values(), &expected) < 1e-9);
    // actor_a has the strongest motive and capability.
    assert!(
        posterior.probability_of(&["actor_a"]).unwrap()
            > prior.probability_of(&["actor_a"]).unwrap()
    );
}

#[test]
fn invalid_definition_surfaces_model_error() {
    let source = r#"{
        "variables": [{"name": "A", "cardinality": 2}],
        "cpds": [{"variable": "A", "table": [0.5, 0.45]}]
    }"#;
    let def = ModelDefinition::from_json_str(source).unwrap();
    assert!(matches!(
        def.build(),
        Err(ModelError::NotNormalized { variable, .. }) if variable == "A"
    ));
    let err: DefinitionError = def.build().unwrap_err().into();
    assert!(err.to_string().contains("'A'"));
}

#[test]
fn load_network_reports_io_and_model_errors() {
    let missing = demos_dir().join("no_such_model.json");
    assert!(matches!(
        load_network(&missing),
        Err(DefinitionError::Io { .. })
    ));

    let path = std::env::temp_dir().join(format!("bayesnet-unnormalized-{}.json", std::process::id()));
    fs::write(
        &path,
        r#"{"variables": [{"name": "A", "cardinality": 2}],
            "cpds": [{"variable": "A", "table": [0.5, 0.45]}]}"#,
    )
    .unwrap();
    let result = load_network(&path);
    fs::remove_file(&path).unwrap();
    assert!(matches!(
        result,
        Err(DefinitionError::Model(ModelError::NotNormalized { .. }))
    ));
}
