//! Graph metrics
//!
//! A snapshot of one session: how many nodes of each kind exist, how many
//! are live, how many call edges were wired and how many of them are taken,
//! and how large the intern tables have grown.

use anyhow::Result;
use seanode_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub mode: String,
    pub total_nodes: usize,
    /// Node count per kind name.
    pub nodes_by_kind: BTreeMap<String, usize>,
    pub live_nodes: usize,
    pub dead_nodes: usize,
    pub calls: CallMetrics,
    pub interning: InternMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallMetrics {
    pub call_sites: usize,
    pub functions: usize,
    pub wired_edges: usize,
    pub live_edges: usize,
    /// Call sites with no live edge.
    pub unresolved_calls: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InternMetrics {
    pub types: usize,
    pub bit_sets: usize,
}

impl CallMetrics {
    pub fn dead_edges(&self) -> usize {
        self.wired_edges - self.live_edges
    }

    /// Share of wired edges that are taken, in percent.
    pub fn live_edge_rate(&self) -> f64 {
        if self.wired_edges == 0 {
            return 100.0;
        }
        self.live_edges as f64 / self.wired_edges as f64 * 100.0
    }
}

impl GraphMetrics {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn count(&self, kind: &str) -> usize {
        self.nodes_by_kind.get(kind).copied().unwrap_or(0)
    }
}

/// Collects [`GraphMetrics`] from a session.
pub struct MetricsCollector {
    include_constants: bool,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            include_constants: true,
        }
    }

    /// Leave constant nodes out of the kind and liveness counts.
    pub fn without_constants(mut self) -> Self {
        self.include_constants = false;
        self
    }

    pub fn collect(&self, session: &Session) -> Result<GraphMetrics> {
        let g = session.graph();
        let mut metrics = GraphMetrics {
            mode: session.mode().name().to_string(),
            ..GraphMetrics::default()
        };

        for n in g.ids() {
            let kind = g.kind(n);
            if !self.include_constants && matches!(kind, NodeKind::Con(_)) {
                continue;
            }
            metrics.total_nodes += 1;
            *metrics.nodes_by_kind.entry(kind.name().to_string()).or_default() += 1;
            if g.live(n) == Ty::ANY {
                metrics.dead_nodes += 1;
            } else {
                metrics.live_nodes += 1;
            }
            match kind {
                NodeKind::Call { .. } => {
                    metrics.calls.call_sites += 1;
                    let edges = session.callees(n);
                    if !edges.iter().any(|&(ce, _)| session.edge_live(ce)) {
                        metrics.calls.unresolved_calls += 1;
                    }
                }
                NodeKind::CEProj => {
                    metrics.calls.wired_edges += 1;
                    if session.edge_live(n) {
                        metrics.calls.live_edges += 1;
                    }
                }
                NodeKind::Fun(_) => metrics.calls.functions += 1,
                _ => {}
            }
        }

        metrics.interning = InternMetrics {
            types: session.types().len(),
            bit_sets: session.types().bits().len(),
        };
        debug!(
            "Collected metrics: {} nodes, {} live, {} of {} edges live",
            metrics.total_nodes, metrics.live_nodes, metrics.calls.live_edges, metrics.calls.wired_edges
        );
        Ok(metrics)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
