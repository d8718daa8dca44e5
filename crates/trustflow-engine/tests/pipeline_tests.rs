use approx::assert_abs_diff_eq;
use chrono::NaiveDate;

use trustflow_engine::{
    AnalysisInputs, DependencyEdge, DeveloperProjectEvent, DevtoolingCalculator, EngineError,
    LinkType, MetricWeights, ProjectRecord, ProjectTable, SimulationConfig,
};

fn month(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn config() -> SimulationConfig {
    SimulationConfig {
        onchain_project_pretrust_weights: MetricWeights::new([("fees", 1.0)]),
        devtooling_project_pretrust_weights: MetricWeights::new([("stars", 1.0)]),
        event_type_weights: [("COMMIT_CODE", 1.0), ("STARRED", 1.0), ("NPM", 1.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        link_type_weights: LinkType::ALL.into_iter().map(|l| (l, 1.0)).collect(),
        ..SimulationConfig::default()
    }
}

fn event(developer: &str, project: &str, event_type: &str, m: NaiveDate) -> DeveloperProjectEvent {
    DeveloperProjectEvent {
        developer_id: developer.to_string(),
        developer_name: format!("{developer}-name"),
        project_id: project.to_string(),
        event_type: event_type.to_string(),
        event_month: m,
    }
}

/// A (fees 100) and B (fees 10) are onchain; T (stars 5) is the only devtooling project.
/// A depends on T; developer d1 commits to A and stars T.
fn scenario() -> AnalysisInputs {
    let mut onchain = ProjectTable::new(["fees"]);
    onchain.push(ProjectRecord::new("A", "Project A").with_metric("fees", 100.0));
    onchain.push(ProjectRecord::new("B", "Project B").with_metric("fees", 10.0));
    let mut devtooling = ProjectTable::new(["stars"]);
    devtooling.push(ProjectRecord::new("T", "Tool T").with_metric("stars", 5.0));

    AnalysisInputs {
        onchain_projects: onchain,
        devtooling_projects: devtooling,
        project_dependencies: vec![DependencyEdge {
            onchain_builder_project_id: "A".to_string(),
            devtooling_project_id: "T".to_string(),
            dependency_source: "NPM".to_string(),
        }],
        developers_to_projects: vec![
            event("d1", "A", "COMMIT_CODE", month(2024, 1)),
            event("d1", "T", "STARRED", month(2024, 1)),
        ],
    }
}

#[test]
fn test_end_to_end_scenario() {
    let calculator = DevtoolingCalculator::new(config()).unwrap();
    let analysis = calculator.run_analysis(&scenario()).unwrap();

    let onchain = &analysis.onchain_projects_pretrust_scores;
    assert_abs_diff_eq!(onchain.get("A").unwrap(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(onchain.get("B").unwrap(), 0.0, epsilon = 1e-12);

    assert_eq!(analysis.devtooling_project_results.len(), 1);
    let t = &analysis.devtooling_project_results[0];
    assert_eq!(t.project_id, "T");
    assert_eq!(t.total_dependents, 1);
    assert_eq!(t.developer_links, 1);
    assert!(t.is_eligible);
    assert_abs_diff_eq!(t.v_aggregated, 1.0, epsilon = 1e-12);

    let flow = &analysis.detailed_value_flow_graph;
    assert!(flow.converged);
    assert!(flow.mismatches.is_empty());
    assert_eq!(flow.edges.len(), 1);
    assert_eq!(flow.edges[0].onchain_project_id, "A");
    assert_eq!(flow.edges[0].devtooling_project_id, "T");
    assert_abs_diff_eq!(flow.edges[0].contribution, 1.0, epsilon = 1e-9);
    assert!(flow.edges.iter().all(|e| e.onchain_project_id != "B"));
}

#[test]
fn test_stage_results_are_all_populated() {
    let analysis = DevtoolingCalculator::new(config())
        .unwrap()
        .run_analysis(&scenario())
        .unwrap();

    assert_eq!(analysis.graph.edges.len(), 3);
    assert_eq!(analysis.weighted_edges.len(), 3);
    assert_eq!(analysis.developer_reputation.len(), 1);
    assert_eq!(analysis.developer_reputation[0].developer_id, "d1");
    assert_eq!(
        analysis.developer_reputation[0].developer_name.as_deref(),
        Some("d1-name")
    );
    assert_abs_diff_eq!(analysis.project_openrank_scores.scores.sum(), 1.0, epsilon = 1e-9);
    assert!(analysis.project_openrank_scores.converged);
}

#[test]
fn test_inputs_are_not_modified() {
    let inputs = scenario();
    let before = inputs.clone();
    DevtoolingCalculator::new(config())
        .unwrap()
        .run_analysis(&inputs)
        .unwrap();
    assert_eq!(inputs, before);
}

#[test]
fn test_zero_link_weights_fail_with_no_edges() {
    let mut cfg = config();
    cfg.link_type_weights.clear();
    let err = DevtoolingCalculator::new(cfg)
        .unwrap()
        .run_analysis(&scenario())
        .unwrap_err();
    assert_eq!(err, EngineError::NoEdges);
}

#[test]
fn test_unknown_metric_column_fails_before_any_stage() {
    let mut cfg = config();
    cfg.onchain_project_pretrust_weights = MetricWeights::new([("gas", 1.0)]);
    let err = DevtoolingCalculator::new(cfg)
        .unwrap()
        .run_analysis(&scenario())
        .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let mut cfg = config();
    cfg.alpha = -0.1;
    assert!(matches!(
        DevtoolingCalculator::new(cfg),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn test_developer_id_colliding_with_project_id_is_an_error() {
    let mut inputs = scenario();
    inputs
        .developers_to_projects
        .push(event("B", "T", "STARRED", month(2024, 1)));
    let err = DevtoolingCalculator::new(config())
        .unwrap()
        .run_analysis(&inputs)
        .unwrap_err();
    assert_eq!(err, EngineError::NodeIdCollision { id: "B".to_string() });
}

#[test]
fn test_ineligible_projects_keep_raw_score() {
    let mut inputs = scenario();
    inputs
        .devtooling_projects
        .push(ProjectRecord::new("U", "Tool U").with_metric("stars", 50.0));
    inputs
        .developers_to_projects
        .push(event("d1", "U", "STARRED", month(2024, 1)));

    let mut cfg = config();
    cfg.eligibility_thresholds.num_projects_with_package_links = 1;
    cfg.eligibility_thresholds.num_onchain_developers_with_links = 2;

    let analysis = DevtoolingCalculator::new(cfg)
        .unwrap()
        .run_analysis(&inputs)
        .unwrap();
    let results = &analysis.devtooling_project_results;
    assert_eq!(results[0].project_id, "T");
    assert_abs_diff_eq!(results[0].v_aggregated, 1.0, epsilon = 1e-12);

    let u = results.iter().find(|r| r.project_id == "U").unwrap();
    assert!(!u.is_eligible);
    assert!(u.v > 0.0);
    assert_eq!(u.v_aggregated, 0.0);
}
