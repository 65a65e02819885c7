//! Call graph of an analyzed session
//!
//! Functions and call sites become petgraph nodes. A function points at the
//! calls made from its body, and a call points at each callee whose wired
//! edge is live. Calls made outside any function are the roots.

use anyhow::{bail, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use seanode_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallGraphNode {
    Function { node: u32, name: String, fidx: u32 },
    CallSite { node: u32 },
}

pub struct CallGraph {
    graph: DiGraph<CallGraphNode, ()>,
    index: HashMap<NodeId, NodeIndex>,
    /// Session node of each graph node, by graph index.
    ids: Vec<NodeId>,
    roots: Vec<NodeIndex>,
}

/// The function whose body contains `n`, found by walking control inputs.
/// `None` for code outside every function.
pub fn enclosing_fun(g: &Graph, n: NodeId) -> Option<NodeId> {
    let mut cur = n;
    // Control chains are acyclic; the bound only guards malformed graphs.
    for _ in 0..g.len() {
        match g.kind(cur) {
            NodeKind::Fun(_) => return Some(cur),
            NodeKind::Start => return None,
            NodeKind::Proj(_) | NodeKind::CallEpi | NodeKind::Call { .. } => {
                cur = g.def(cur, 0)?;
            }
            _ => return None,
        }
    }
    None
}

impl CallGraph {
    /// Build from a session that has been through global analysis.
    pub fn build(session: &Session) -> Result<Self> {
        if session.mode() != Mode::Opto {
            bail!("call graph needs global analysis to have run");
        }
        let g = session.graph();
        let mut cg = CallGraph {
            graph: DiGraph::new(),
            index: HashMap::new(),
            ids: Vec::new(),
            roots: Vec::new(),
        };

        for n in g.ids() {
            let weight = match g.kind(n) {
                NodeKind::Fun(info) => CallGraphNode::Function {
                    node: n.index() as u32,
                    name: info.name.clone(),
                    fidx: info.fidx,
                },
                NodeKind::Call { .. } => CallGraphNode::CallSite {
                    node: n.index() as u32,
                },
                _ => continue,
            };
            let idx = cg.graph.add_node(weight);
            cg.index.insert(n, idx);
            cg.ids.push(n);
        }

        let calls: Vec<NodeId> = g
            .ids()
            .filter(|&n| matches!(g.kind(n), NodeKind::Call { .. }))
            .collect();
        for call in calls {
            let ci = cg.index[&call];
            match enclosing_fun(g, call).and_then(|f| cg.index.get(&f)) {
                Some(&fi) => {
                    cg.graph.add_edge(fi, ci, ());
                }
                None => cg.roots.push(ci),
            }
            for (ce, fun) in session.callees(call) {
                if !session.edge_live(ce) {
                    continue;
                }
                if let Some(&fi) = cg.index.get(&fun) {
                    cg.graph.add_edge(ci, fi, ());
                }
            }
        }
        Ok(cg)
    }

    pub fn graph(&self) -> &DiGraph<CallGraphNode, ()> {
        &self.graph
    }

    pub fn function_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|w| matches!(w, CallGraphNode::Function { .. }))
            .count()
    }

    /// Functions a call site can reach through live edges.
    pub fn callees(&self, call: NodeId) -> Vec<NodeId> {
        let Some(&ci) = self.index.get(&call) else {
            return Vec::new();
        };
        let mut out: Vec<NodeId> = self
            .graph
            .edges_directed(ci, Direction::Outgoing)
            .map(|e| self.ids[e.target().index()])
            .collect();
        out.sort();
        out
    }

    /// Names of every function reachable from calls outside any function,
    /// sorted.
    pub fn reachable_functions(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut seen = vec![false; self.graph.node_count()];
        for &root in &self.roots {
            let mut dfs = Dfs::new(&self.graph, root);
            while let Some(nx) = dfs.next(&self.graph) {
                if std::mem::replace(&mut seen[nx.index()], true) {
                    continue;
                }
                if let CallGraphNode::Function { name, .. } = &self.graph[nx] {
                    names.push(name.clone());
                }
            }
        }
        names.sort();
        names
    }

    /// Functions that can call themselves, directly or through others.
    pub fn recursive_functions(&self) -> Vec<String> {
        let mut names: Vec<String> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .flatten()
            .filter_map(|nx| match &self.graph[nx] {
                CallGraphNode::Function { name, .. } => Some(name.clone()),
                CallGraphNode::CallSite { .. } => None,
            })
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_con(s: &mut Session, v: i64) -> NodeId {
        let t = s.types_mut().make_int(v);
        s.con(t)
    }

    #[test]
    fn test_needs_global_analysis() {
        let s = Session::new();
        assert!(CallGraph::build(&s).is_err());
    }

    #[test]
    fn test_nested_calls() {
        let mut s = Session::new();
        let leaf = s.new_fun("leaf", 1, false).unwrap();
        let ret = s.new_ret(leaf.fun, leaf.fun, leaf.mem, leaf.args[0]).unwrap();
        let leaf_fp = s.new_fun_ptr(ret, None).unwrap();

        // outer(x) = leaf(x)
        let outer = s.new_fun("outer", 1, false).unwrap();
        let inner = s.new_call(outer.fun, outer.mem, &[outer.args[0]], leaf_fp, None);
        let ret = s.new_ret(outer.fun, inner.ctrl, inner.mem, inner.val).unwrap();
        let outer_fp = s.new_fun_ptr(ret, None).unwrap();

        // Never called
        let unused = s.new_fun("unused", 0, false).unwrap();
        let ret = s.new_ret(unused.fun, unused.fun, unused.mem, unused.mem).unwrap();
        s.new_fun_ptr(ret, None).unwrap();

        let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
        let one = int_con(&mut s, 1);
        let site = s.new_call(ctrl, mem, &[one], outer_fp, None);
        s.keep(site.val);
        s.gcp().unwrap();

        assert_eq!(enclosing_fun(s.graph(), inner.call), Some(outer.fun));
        assert_eq!(enclosing_fun(s.graph(), site.call), None);

        let cg = CallGraph::build(&s).unwrap();
        assert_eq!(cg.function_count(), 3);
        assert_eq!(cg.callees(site.call), vec![outer.fun]);
        assert_eq!(cg.callees(inner.call), vec![leaf.fun]);
        assert_eq!(cg.reachable_functions(), vec!["leaf", "outer"]);
        assert!(cg.recursive_functions().is_empty());
    }

    #[test]
    fn test_self_recursion() {
        let mut s = Session::new();
        // rec(x) = rec(x), with the inner name resolved after the body
        let rec = s.new_fun("rec", 1, false).unwrap();
        let stub = s.forward_ref("rec", None).unwrap();
        let inner = s.new_call(rec.fun, rec.mem, &[rec.args[0]], stub, None);
        let ret = s.new_ret(rec.fun, inner.ctrl, inner.mem, inner.val).unwrap();
        let fp = s.new_fun_ptr(ret, None).unwrap();
        s.merge_ref_def(stub, fp).unwrap();

        let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
        let one = int_con(&mut s, 1);
        let site = s.new_call(ctrl, mem, &[one], fp, None);
        s.keep(site.val);
        s.gcp().unwrap();

        let cg = CallGraph::build(&s).unwrap();
        assert_eq!(cg.callees(inner.call), vec![rec.fun]);
        assert_eq!(cg.recursive_functions(), vec!["rec"]);
        assert_eq!(cg.reachable_functions(), vec!["rec"]);
    }
}
