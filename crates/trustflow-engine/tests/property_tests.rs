//! Property tests for the numeric stages.
//!
//! Invariants checked:
//! - project pretrust is a probability vector whenever it is defined
//! - raising eligibility thresholds never admits more projects
//! - older edges never weigh more than newer ones
//! - proportional fitting meets both margins on fully connected, consistent targets
//! - EigenTrust scores always sum to 1

use proptest::prelude::*;

use trustflow_engine::config::TimeDecay;
use trustflow_engine::eigentrust::{EigenTrust, PretrustEntry, TrustEdge};
use trustflow_engine::pretrust::compute_project_pretrust;
use trustflow_engine::value_flow::{fit_biproportional, ConnectivityMatrix};
use trustflow_engine::weighting::decay_factor;
use trustflow_engine::{
    EligibilityThresholds, FittingSettings, LinkType, MetricWeights, ProjectKind, ProjectRecord,
    ProjectTable,
};

const NODES: [&str; 6] = ["n0", "n1", "n2", "n3", "n4", "n5"];

fn positive_matrix() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
    (1usize..5, 1usize..5).prop_flat_map(|(rows, cols)| {
        (
            Just(rows),
            Just(cols),
            prop::collection::vec(0.1f64..10.0, rows * cols),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn pretrust_sums_to_one(
        rows in prop::collection::vec((0.0f64..1e6, 0.0f64..1e3), 1..20),
        w in 0.01f64..1.0,
    ) {
        let mut table = ProjectTable::new(["fees", "txs"]);
        for (k, (fees, txs)) in rows.iter().enumerate() {
            table.push(
                ProjectRecord::new(format!("p{k}"), format!("P{k}"))
                    .with_metric("fees", *fees)
                    .with_metric("txs", *txs),
            );
        }
        let weights = MetricWeights::new([("fees", w), ("txs", 1.0 - w + 0.01)]);
        let scores = compute_project_pretrust(&table, &weights, ProjectKind::Onchain).unwrap();

        prop_assert_eq!(scores.len(), rows.len());
        prop_assert!((scores.sum() - 1.0).abs() < 1e-9);
        prop_assert!(scores.iter().all(|e| e.v >= 0.0));
    }

    #[test]
    fn eligibility_is_monotone_in_thresholds(
        dependents in 0usize..20,
        developers in 0usize..20,
        a in 0usize..20,
        b in 0usize..20,
        extra_a in 0usize..5,
        extra_b in 0usize..5,
    ) {
        let low = EligibilityThresholds {
            num_projects_with_package_links: a,
            num_onchain_developers_with_links: b,
        };
        let high = EligibilityThresholds {
            num_projects_with_package_links: a + extra_a,
            num_onchain_developers_with_links: b + extra_b,
        };
        if high.is_eligible(dependents, developers) {
            prop_assert!(low.is_eligible(dependents, developers));
        }
    }

    #[test]
    fn decay_is_non_increasing_in_age(
        rate in 0.0f64..5.0,
        younger in 0.0f64..10.0,
        gap in 0.0f64..10.0,
    ) {
        let rates = TimeDecay {
            commit_to_onchain_repo: rate,
            event_to_devtooling_repo: rate,
        };
        for link in LinkType::ALL {
            let new = decay_factor(link, younger, &rates);
            let old = decay_factor(link, younger + gap, &rates);
            prop_assert!(old <= new);
            prop_assert!(old > 0.0 && new <= 1.0);
        }
    }

    #[test]
    fn fitting_meets_consistent_margins(
        (rows, cols, counts) in positive_matrix(),
        truth in prop::collection::vec(0.1f64..10.0, 16),
    ) {
        // Margins of a positive matrix are always reachable from a fully connected one.
        let cell = |i: usize, j: usize| truth[(i * cols + j) % truth.len()];
        let total: f64 = (0..rows).flat_map(|i| (0..cols).map(move |j| (i, j))).map(|(i, j)| cell(i, j)).sum();
        let row_targets: Vec<f64> = (0..rows).map(|i| (0..cols).map(|j| cell(i, j)).sum::<f64>() / total).collect();
        let col_targets: Vec<f64> = (0..cols).map(|j| (0..rows).map(|i| cell(i, j)).sum::<f64>() / total).collect();

        let matrix = ConnectivityMatrix {
            onchain_ids: (0..rows).map(|i| format!("o{i}")).collect(),
            devtooling_ids: (0..cols).map(|j| format!("d{j}")).collect(),
            counts,
        };
        let settings = FittingSettings::default();
        let fit = fit_biproportional(&matrix, &row_targets, &col_targets, &settings);
        prop_assert!(fit.converged);

        for j in 0..cols {
            let sum: f64 = (0..rows).map(|i| fit.contributions[i * cols + j]).sum();
            prop_assert!((sum - col_targets[j]).abs() < 1e-9);
        }
        for i in 0..rows {
            let sum: f64 = fit.contributions[i * cols..(i + 1) * cols].iter().sum();
            prop_assert!((sum - row_targets[i]).abs() <= settings.tolerance);
        }
    }

    #[test]
    fn eigentrust_scores_sum_to_one(
        arcs in prop::collection::vec((0usize..6, 0usize..6, 0.01f64..5.0), 1..20),
        seed in 0usize..6,
        alpha in 0.05f64..1.0,
    ) {
        let edges: Vec<TrustEdge<'_>> = arcs
            .iter()
            .map(|&(i, j, v)| TrustEdge { i: NODES[i], j: NODES[j], v })
            .collect();
        let seed_node = NODES[arcs[seed % arcs.len()].0];
        let pretrust = vec![PretrustEntry { i: seed_node, v: 1.0 }];

        let result = EigenTrust::new(alpha).run(&edges, &pretrust).unwrap();
        prop_assert!((result.scores.sum() - 1.0).abs() < 1e-9);
        prop_assert!(result.scores.iter().all(|e| e.v >= 0.0));
    }
}
