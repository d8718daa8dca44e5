//! EigenTrust propagation.
//!
//! Power iteration of
//!
//! ```text
//! s ← (1 − α) · Pᵀ s + α · p
//! ```
//!
//! where `P` is the row-normalized local-trust matrix (parallel edges summed) and `p` the
//! normalized pretrust vector. Nodes without outgoing trust hand their mass back to `p`,
//! so every iterate stays a probability distribution over the graph's nodes.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::PropagationSettings;
use crate::error::{EngineError, Result};
use crate::model::{DeveloperReputation, ScoreEntry, ScoreVector};
use crate::weighting::WeightedEdge;

/// One local-trust arc `i → j` with weight `v > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustEdge<'a> {
    pub i: &'a str,
    pub j: &'a str,
    pub v: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PretrustEntry<'a> {
    pub i: &'a str,
    pub v: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScores {
    /// One score per edge endpoint, ascending by node id.
    pub scores: ScoreVector,
    pub iterations: usize,
    /// L1 change of the last iteration.
    pub residual: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenTrust {
    pub alpha: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl EigenTrust {
    pub fn new(alpha: f64) -> Self {
        let defaults = PropagationSettings::default();
        Self {
            alpha,
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
        }
    }

    pub fn with_settings(alpha: f64, settings: PropagationSettings) -> Self {
        Self {
            alpha,
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
        }
    }

    /// Runs propagation.
    ///
    /// # Errors
    /// `NoEdges` if `edges` has no positive arc and `NoPretrust` if no positive pretrust
    /// lands on a graph node. Both are checked before iterating.
    pub fn run(&self, edges: &[TrustEdge<'_>], pretrust: &[PretrustEntry<'_>]) -> Result<TrustScores> {
        if edges.is_empty() {
            return Err(EngineError::NoEdges);
        }
        if pretrust.is_empty() {
            return Err(EngineError::NoPretrust);
        }

        let active: Vec<&TrustEdge<'_>> = edges
            .iter()
            .filter(|e| e.v.is_finite() && e.v > 0.0)
            .collect();
        if active.is_empty() {
            return Err(EngineError::NoEdges);
        }

        let nodes: Vec<&str> = active
            .iter()
            .flat_map(|e| [e.i, e.j])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: AHashMap<&str, usize> =
            nodes.iter().enumerate().map(|(k, id)| (*id, k)).collect();
        let n = nodes.len();

        let mut local: AHashMap<(usize, usize), f64> = AHashMap::new();
        for e in &active {
            *local.entry((index[e.i], index[e.j])).or_default() += e.v;
        }
        let mut out_adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for (&(u, v), &w) in &local {
            out_adj[u].push((v, w));
        }
        let out_sum: Vec<f64> = out_adj
            .iter_mut()
            .map(|targets| {
                targets.sort_by_key(|(v, _)| *v);
                targets.iter().map(|(_, w)| w).sum()
            })
            .collect();

        let mut p = vec![0.0f64; n];
        let mut discarded = 0usize;
        for entry in pretrust {
            if !(entry.v.is_finite() && entry.v > 0.0) {
                continue;
            }
            match index.get(entry.i) {
                Some(&k) => p[k] += entry.v,
                None => discarded += 1,
            }
        }
        let p_total: f64 = p.iter().sum();
        if !(p_total > 0.0) {
            return Err(EngineError::NoPretrust);
        }
        for x in &mut p {
            *x /= p_total;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "pretrust entries outside the graph were ignored");
        }

        let alpha = self.alpha;
        let mut s = p.clone();
        let mut residual = f64::INFINITY;
        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;
            let mut next = vec![0.0f64; n];
            let mut dangling_mass = 0.0;

            for u in 0..n {
                if out_adj[u].is_empty() {
                    dangling_mass += s[u];
                    continue;
                }
                let share = s[u] / out_sum[u];
                for &(v, w) in &out_adj[u] {
                    next[v] += share * w;
                }
            }

            for k in 0..n {
                next[k] = (1.0 - alpha) * (next[k] + dangling_mass * p[k]) + alpha * p[k];
            }

            residual = next.iter().zip(&s).map(|(a, b)| (a - b).abs()).sum();
            s = next;
            if residual <= self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::warn!(
                iterations,
                residual,
                tolerance = self.tolerance,
                "EigenTrust did not converge; using last iterate"
            );
        }

        let scores = nodes
            .iter()
            .zip(s)
            .map(|(id, v)| ScoreEntry::new(*id, v))
            .collect();

        Ok(TrustScores {
            scores: ScoreVector::new(scores),
            iterations,
            residual,
            converged,
        })
    }
}

/// Pipeline stage: propagates trust over the active weighted edges, seeded with onchain
/// pretrust, devtooling pretrust and developer reputation (positive entries only).
pub fn propagate_trust(
    weighted_edges: &[WeightedEdge],
    onchain_pretrust: &ScoreVector,
    devtooling_pretrust: &ScoreVector,
    developer_reputation: &[DeveloperReputation],
    alpha: f64,
    settings: PropagationSettings,
) -> Result<TrustScores> {
    let edges: Vec<TrustEdge<'_>> = weighted_edges
        .iter()
        .filter(|e| e.is_active())
        .map(|e| TrustEdge {
            i: &e.edge.i,
            j: &e.edge.j,
            v: e.v_final,
        })
        .collect();

    let pretrust: Vec<PretrustEntry<'_>> = onchain_pretrust
        .iter()
        .chain(devtooling_pretrust.iter())
        .map(|e| PretrustEntry { i: &e.id, v: e.v })
        .chain(developer_reputation.iter().map(|r| PretrustEntry {
            i: &r.developer_id,
            v: r.reputation,
        }))
        .filter(|e| e.v > 0.0)
        .collect();

    let result = EigenTrust::with_settings(alpha, settings).run(&edges, &pretrust)?;
    tracing::info!(
        nodes = result.scores.len(),
        iterations = result.iterations,
        converged = result.converged,
        "propagated trust"
    );
    Ok(result)
}
