//! Backward liveness
//!
//! Liveness is a value in the same lattice, flowing from uses to defs:
//! `ANY` is dead, `ALL` is fully live, and all-`ANY` memory means the node
//! is needed only for its identity (a function pointer needs its `Ret` to
//! name the function, not to run it).

use crate::node::{fptr, Graph, NodeId, NodeKind};
use crate::types::{Ty, TypeStore};
use crate::wiring;
use fnv::FnvHashSet;
use std::collections::VecDeque;

/// What `user` needs from its input at `slot`.
pub(crate) fn live_use(g: &Graph, ts: &TypeStore, user: NodeId, slot: usize) -> Ty {
    let ul = g.live(user);
    if ul == Ty::ANY {
        return Ty::ANY;
    }
    match g.kind(user) {
        NodeKind::FunPtr { .. } if slot == fptr::RET => ts.any_mem(),
        NodeKind::FunPtr { .. } if slot == fptr::DISPLAY => {
            if ul == Ty::ALL && wiring::display_used(g, user) {
                Ty::ALL
            } else {
                Ty::ANY
            }
        }
        _ if ul == Ty::ALL => Ty::ALL,
        // Identity-only users need nothing from their inputs.
        _ => Ty::ANY,
    }
}

/// Recompute every node's liveness from the roots. Returns the step count.
pub(crate) fn compute(g: &mut Graph, ts: &mut TypeStore) -> usize {
    let ids: Vec<NodeId> = g.ids().collect();
    for &n in &ids {
        g.set_live(n, Ty::ANY);
    }

    let mut worklist: VecDeque<NodeId> = VecDeque::new();
    let mut in_worklist: FnvHashSet<NodeId> = FnvHashSet::default();
    for &n in &ids {
        if is_root(g, n) {
            g.set_live(n, Ty::ALL);
            worklist.push_back(n);
            in_worklist.insert(n);
        }
    }

    let mut steps = 0;
    while let Some(n) = worklist.pop_front() {
        in_worklist.remove(&n);
        steps += 1;
        let defs: Vec<(usize, NodeId)> = g
            .node(n)
            .defs()
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (i, d)))
            .collect();
        for (slot, d) in defs {
            let want = live_use(g, ts, n, slot);
            let old = g.live(d);
            let new = ts.meet(old, want);
            if new != old {
                g.set_live(d, new);
                if in_worklist.insert(d) {
                    worklist.push_back(d);
                }
            }
        }
    }
    steps
}

/// Kept nodes, and the return of every function that may run.
fn is_root(g: &Graph, n: NodeId) -> bool {
    let node = g.node(n);
    if node.is_kept() || matches!(node.kind(), NodeKind::Start) {
        return true;
    }
    match node.kind() {
        NodeKind::Ret { .. } => g
            .def(n, crate::node::ret::FUN)
            .is_some_and(|f| g.val(f) == Ty::CTRL),
        _ => false,
    }
}
