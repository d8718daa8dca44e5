use approx::assert_abs_diff_eq;

use trustflow_engine::{allocate_with_constraints, AllocationConfig, AllocationError, ScoreEntry};

fn scores(values: &[(&str, f64)]) -> Vec<ScoreEntry> {
    values.iter().map(|(id, v)| ScoreEntry::new(*id, *v)).collect()
}

#[test]
fn test_unconstrained_allocation_is_proportional() {
    let config = AllocationConfig::new(1000.0, 0.0, 1.0);
    let out = allocate_with_constraints(&scores(&[("a", 0.25), ("b", 0.75)]), &config).unwrap();
    assert_eq!(out[0].project_id, "b");
    assert_eq!(out[0].amount, 750.0);
    assert_eq!(out[1].amount, 250.0);
}

#[test]
fn test_cap_redistributes_excess() {
    let config = AllocationConfig::new(100.0, 0.0, 0.4);
    let out = allocate_with_constraints(
        &scores(&[("big", 0.7), ("mid", 0.2), ("small", 0.1)]),
        &config,
    )
    .unwrap();
    let total: f64 = out.iter().map(|a| a.amount).sum();
    assert_abs_diff_eq!(total, 100.0, epsilon = 0.05);
    assert!(out.iter().all(|a| a.amount <= 40.0 + 1e-9));
    assert_eq!(out[0].project_id, "big");
    assert_eq!(out[0].amount, 40.0);
}

#[test]
fn test_projects_below_minimum_are_dropped() {
    let config = AllocationConfig::new(1000.0, 50.0, 1.0);
    let out = allocate_with_constraints(
        &scores(&[("a", 0.6), ("b", 0.38), ("c", 0.02)]),
        &config,
    )
    .unwrap();
    let c = out.iter().find(|a| a.project_id == "c").unwrap();
    assert_eq!(c.amount, 0.0);
    let total: f64 = out.iter().map(|a| a.amount).sum();
    assert_abs_diff_eq!(total, 1000.0, epsilon = 0.05);
    assert_eq!(out.last().unwrap().project_id, "c");
}

#[test]
fn test_amounts_are_rounded() {
    let config = AllocationConfig::new(100.0, 0.0, 1.0);
    let out = allocate_with_constraints(
        &scores(&[("a", 1.0 / 3.0), ("b", 1.0 / 3.0), ("c", 1.0 / 3.0)]),
        &config,
    )
    .unwrap();
    assert!(out.iter().all(|a| a.amount == 33.33));
    let order: Vec<&str> = out.iter().map(|a| a.project_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn test_unnormalized_scores_are_rejected() {
    let config = AllocationConfig::new(100.0, 0.0, 1.0);
    let err = allocate_with_constraints(&scores(&[("a", 0.5), ("b", 0.4)]), &config).unwrap_err();
    assert!(matches!(err, AllocationError::NotNormalized { .. }));
}

#[test]
fn test_invalid_share_is_rejected() {
    let config = AllocationConfig::new(100.0, 0.0, 0.0);
    let err = allocate_with_constraints(&scores(&[("a", 1.0)]), &config).unwrap_err();
    assert_eq!(
        err,
        AllocationError::InvalidSetting {
            setting: "max_share_per_project",
            value: 0.0
        }
    );
}
