use approx::assert_abs_diff_eq;
use std::collections::HashMap;

use trustflow_engine::eigentrust::{EigenTrust, PretrustEntry, TrustEdge};
use trustflow_engine::EngineError;

fn edges() -> Vec<TrustEdge<'static>> {
    vec![
        TrustEdge { i: "a", j: "b", v: 2.0 },
        TrustEdge { i: "a", j: "c", v: 1.0 },
        TrustEdge { i: "b", j: "c", v: 1.0 },
        TrustEdge { i: "c", j: "a", v: 0.5 },
        TrustEdge { i: "c", j: "d", v: 0.5 },
        // Parallel arc, summed with the first one.
        TrustEdge { i: "a", j: "b", v: 1.0 },
    ]
}

fn pretrust() -> Vec<PretrustEntry<'static>> {
    vec![PretrustEntry { i: "a", v: 3.0 }, PretrustEntry { i: "d", v: 1.0 }]
}

#[test]
fn test_scores_form_a_distribution_over_nodes() {
    let result = EigenTrust::new(0.2).run(&edges(), &pretrust()).unwrap();
    let ids: Vec<&str> = result.scores.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert!(result.converged);
    assert_abs_diff_eq!(result.scores.sum(), 1.0, epsilon = 1e-9);
    assert!(result.scores.iter().all(|e| e.v >= 0.0));
}

#[test]
fn test_scores_satisfy_the_fixed_point() {
    let alpha = 0.3;
    let result = EigenTrust::new(alpha).run(&edges(), &pretrust()).unwrap();
    let s: HashMap<&str, f64> = result.scores.to_map();
    let p: HashMap<&str, f64> = [("a", 0.75), ("b", 0.0), ("c", 0.0), ("d", 0.25)].into();

    // Out-sums: a = 4, b = 1, c = 1, d dangling.
    let dangling = s["d"];
    let incoming = |node: &str| -> f64 {
        match node {
            "a" => s["c"] * 0.5,
            "b" => s["a"] * 3.0 / 4.0,
            "c" => s["a"] * 1.0 / 4.0 + s["b"],
            "d" => s["c"] * 0.5,
            _ => unreachable!(),
        }
    };
    for node in ["a", "b", "c", "d"] {
        let expected = (1.0 - alpha) * (incoming(node) + dangling * p[node]) + alpha * p[node];
        assert_abs_diff_eq!(s[node], expected, epsilon = 1e-8);
    }
}

#[test]
fn test_alpha_one_returns_normalized_pretrust() {
    let pretrust = vec![
        PretrustEntry { i: "a", v: 3.0 },
        PretrustEntry { i: "d", v: 1.0 },
        // Not a graph node.
        PretrustEntry { i: "zz", v: 10.0 },
    ];
    let result = EigenTrust::new(1.0).run(&edges(), &pretrust).unwrap();
    assert_abs_diff_eq!(result.scores.get("a").unwrap(), 0.75, epsilon = 1e-12);
    assert_abs_diff_eq!(result.scores.get("b").unwrap(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.scores.get("d").unwrap(), 0.25, epsilon = 1e-12);
    assert!(result.scores.get("zz").is_none());
}

#[test]
fn test_empty_edges_fail() {
    assert_eq!(
        EigenTrust::new(0.2).run(&[], &pretrust()),
        Err(EngineError::NoEdges)
    );
    let zero = vec![TrustEdge { i: "a", j: "b", v: 0.0 }];
    assert_eq!(
        EigenTrust::new(0.2).run(&zero, &pretrust()),
        Err(EngineError::NoEdges)
    );
}

#[test]
fn test_pretrust_outside_graph_fails() {
    assert_eq!(
        EigenTrust::new(0.2).run(&edges(), &[]),
        Err(EngineError::NoPretrust)
    );
    let foreign = vec![PretrustEntry { i: "nobody", v: 1.0 }];
    assert_eq!(
        EigenTrust::new(0.2).run(&edges(), &foreign),
        Err(EngineError::NoPretrust)
    );
}

#[test]
fn test_iteration_cap_returns_last_iterate() {
    let engine = EigenTrust {
        alpha: 0.01,
        max_iterations: 2,
        tolerance: 1e-15,
    };
    let result = engine.run(&edges(), &pretrust()).unwrap();
    assert!(!result.converged);
    assert_eq!(result.iterations, 2);
    assert_abs_diff_eq!(result.scores.sum(), 1.0, epsilon = 1e-9);
}
