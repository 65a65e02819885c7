//! Sea-of-nodes program graph
//!
//! Nodes live in an arena and are named by [`NodeId`]. A node owns its input
//! slots (`defs`, nullable); the reverse edges (`uses`) are maintained by the
//! graph on every edit and can be rebuilt from the defs at any time. Nodes
//! that lose their last use and are not kept go back to a free list.
//!
//! Nodes whose identity is their inputs are hash-consed (common
//! subexpression elimination). Function, call and wiring nodes are not:
//! every call-to-callee edge stays distinct even when structurally equal.

mod kind;

pub use kind::{fptr, load, ret, FunInfo, NodeKind};

use crate::error::{AnalysisError, Result};
use crate::types::Ty;
use fnv::{FnvBuildHasher, FnvHashMap};
use indexmap::IndexMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

pub type Defs = SmallVec<[Option<NodeId>; 4]>;

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    defs: Defs,
    uses: SmallVec<[NodeId; 4]>,
    val: Ty,
    live: Ty,
    keep: u32,
    dead: bool,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn defs(&self) -> &[Option<NodeId>] {
        &self.defs
    }

    pub fn def(&self, i: usize) -> Option<NodeId> {
        self.defs.get(i).copied().flatten()
    }

    pub fn uses(&self) -> &[NodeId] {
        &self.uses
    }

    pub fn val(&self) -> Ty {
        self.val
    }

    pub fn live(&self) -> Ty {
        self.live
    }

    pub fn is_kept(&self) -> bool {
        self.keep > 0
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }
}

/// Structural identity of a hash-consable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OpKey {
    Con(Ty),
    Proj(u32),
    Load(String),
    MemMerge(SmallVec<[u32; 4]>),
    FunPtr(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    op: OpKey,
    defs: Defs,
}

#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    cse: FnvHashMap<NodeKey, NodeId>,
    funs: IndexMap<u32, NodeId, FnvBuildHasher>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.cse.clear();
        self.funs.clear();
    }

    /// Arena size, dead slots included.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(|n| !n.dead)
    }

    /// Ids of every live node, ascending.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.dead)
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Mutable kind; the node leaves the hash-cons table first.
    pub(crate) fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        self.cse_remove(id);
        &mut self.nodes[id.index()].kind
    }

    pub fn def(&self, id: NodeId, i: usize) -> Option<NodeId> {
        self.node(id).def(i)
    }

    pub fn val(&self, id: NodeId) -> Ty {
        self.node(id).val
    }

    pub(crate) fn set_val(&mut self, id: NodeId, t: Ty) {
        self.nodes[id.index()].val = t;
    }

    pub fn live(&self, id: NodeId) -> Ty {
        self.node(id).live
    }

    pub(crate) fn set_live(&mut self, id: NodeId, t: Ty) {
        self.nodes[id.index()].live = t;
    }

    /// Value of input `i`, or `ANY` for an empty slot.
    pub fn def_val(&self, id: NodeId, i: usize) -> Ty {
        self.def(id, i).map_or(Ty::ANY, |d| self.val(d))
    }

    /// Add a node; the caller computes its first value.
    pub fn add(&mut self, kind: NodeKind, defs: &[Option<NodeId>], val: Ty) -> NodeId {
        let node = Node {
            kind,
            defs: defs.iter().copied().collect(),
            uses: SmallVec::new(),
            val,
            live: Ty::ALL,
            keep: 0,
            dead: false,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id.index()] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId((self.nodes.len() - 1) as u32)
            }
        };
        for d in defs.iter().copied().flatten() {
            self.nodes[d.index()].uses.push(id);
        }
        id
    }

    fn drop_use(&mut self, def: NodeId, user: NodeId) {
        let uses = &mut self.nodes[def.index()].uses;
        if let Some(i) = uses.iter().position(|&u| u == user) {
            uses.swap_remove(i);
        }
    }

    /// Replace input `i`. The old input is not reclaimed here.
    pub fn set_def(&mut self, n: NodeId, i: usize, d: Option<NodeId>) {
        let old = self.node(n).def(i);
        if old == d {
            return;
        }
        self.cse_remove(n);
        if let Some(old) = old {
            self.drop_use(old, n);
        }
        let defs = &mut self.nodes[n.index()].defs;
        if defs.len() <= i {
            defs.resize(i + 1, None);
        }
        defs[i] = d;
        if let Some(d) = d {
            self.nodes[d.index()].uses.push(n);
        }
    }

    pub fn add_def(&mut self, n: NodeId, d: Option<NodeId>) {
        self.cse_remove(n);
        self.nodes[n.index()].defs.push(d);
        if let Some(d) = d {
            self.nodes[d.index()].uses.push(n);
        }
    }

    /// Root a node so it survives losing every use.
    pub fn keep(&mut self, n: NodeId) {
        self.nodes[n.index()].keep += 1;
    }

    pub fn unkeep(&mut self, n: NodeId) {
        let node = &mut self.nodes[n.index()];
        node.keep = node.keep.saturating_sub(1);
    }

    fn cse_key(&self, n: NodeId) -> Option<NodeKey> {
        let node = self.node(n);
        let op = match &node.kind {
            NodeKind::Con(t) => OpKey::Con(*t),
            NodeKind::Proj(i) => OpKey::Proj(*i),
            // Position is not identity: a shared load reports where it was first built
            NodeKind::Load { fld, .. } => OpKey::Load(fld.clone()),
            NodeKind::MemMerge { aliases } => OpKey::MemMerge(aliases.clone()),
            NodeKind::FunPtr { mid_def, referr: None, .. } => OpKey::FunPtr(*mid_def),
            _ => return None,
        };
        Some(NodeKey {
            op,
            defs: node.defs.clone(),
        })
    }

    /// An existing node structurally equal to `n`, if any.
    pub fn cse_find(&self, n: NodeId) -> Option<NodeId> {
        let key = self.cse_key(n)?;
        self.cse.get(&key).copied().filter(|&m| m != n && self.contains(m))
    }

    /// Publish `n` for hash-consing unless an equal node already is.
    pub fn cse_insert(&mut self, n: NodeId) {
        if let Some(key) = self.cse_key(n) {
            self.cse.entry(key).or_insert(n);
        }
    }

    fn cse_remove(&mut self, n: NodeId) {
        if let Some(key) = self.cse_key(n) {
            if self.cse.get(&key) == Some(&n) {
                self.cse.remove(&key);
            }
        }
    }

    fn free_node(&mut self, n: NodeId) -> Defs {
        self.cse_remove(n);
        if let NodeKind::Fun(info) = &self.nodes[n.index()].kind {
            if self.funs.get(&info.fidx) == Some(&n) {
                self.funs.shift_remove(&info.fidx);
            }
        }
        let node = &mut self.nodes[n.index()];
        node.dead = true;
        let defs = std::mem::take(&mut node.defs);
        for d in defs.iter().copied().flatten() {
            self.drop_use(d, n);
        }
        self.free.push(n);
        defs
    }

    /// Discard a freshly built node that lost to CSE or a rewrite. Its
    /// inputs stay, whatever their use count.
    pub fn unhook(&mut self, n: NodeId) {
        let node = self.node(n);
        if node.dead || !node.uses.is_empty() || node.keep > 0 {
            return;
        }
        self.free_node(n);
    }

    /// Reclaim `n` if unused and not kept, then any inputs that become
    /// unused in turn. Constants and the start node are left for reuse.
    pub fn kill(&mut self, n: NodeId) {
        let mut stack = vec![n];
        while let Some(n) = stack.pop() {
            let node = self.node(n);
            if node.dead || !node.uses.is_empty() || node.keep > 0 {
                continue;
            }
            for d in self.free_node(n).into_iter().flatten() {
                if !matches!(self.kind(d), NodeKind::Con(_) | NodeKind::Start) {
                    stack.push(d);
                }
            }
        }
    }

    /// Redirect every use of `old` to `new`, hand over its keep count and
    /// reclaim `old`.
    pub fn subsume(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let users: SmallVec<[NodeId; 8]> = self.node(old).uses.iter().copied().collect();
        for u in users {
            let slots: SmallVec<[usize; 4]> = self
                .node(u)
                .defs
                .iter()
                .enumerate()
                .filter(|(_, d)| **d == Some(old))
                .map(|(i, _)| i)
                .collect();
            for i in slots {
                self.set_def(u, i, Some(new));
            }
        }
        let keep = std::mem::take(&mut self.nodes[old.index()].keep);
        self.nodes[new.index()].keep += keep;
        self.kill(old);
    }

    pub fn register_fun(&mut self, fidx: u32, fun: NodeId) {
        self.funs.insert(fidx, fun);
    }

    pub(crate) fn unregister_fun(&mut self, fidx: u32) -> Option<NodeId> {
        self.funs.shift_remove(&fidx)
    }

    pub fn fun_by_fidx(&self, fidx: u32) -> Option<NodeId> {
        self.funs.get(&fidx).copied()
    }

    /// Every registered function, in registration order.
    pub fn funs(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        self.funs.iter().map(|(&f, &n)| (f, n))
    }

    /// First use of `n` with the given kind tag.
    pub fn find_use(&self, n: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        self.node(n).uses.iter().copied().find(|&u| pred(self.kind(u)))
    }

    /// Check that the use lists match what the defs imply.
    pub fn verify_uses(&self) -> Result<()> {
        let mut expect: FnvHashMap<(NodeId, NodeId), i64> = FnvHashMap::default();
        for n in self.ids() {
            for d in self.node(n).defs.iter().copied().flatten() {
                if !self.contains(d) {
                    return Err(AnalysisError::Invariant(format!("{n} points at dead node {d}")));
                }
                *expect.entry((d, n)).or_default() += 1;
            }
        }
        for d in self.ids() {
            for &u in &self.node(d).uses {
                *expect.entry((d, u)).or_default() -= 1;
            }
        }
        match expect.into_iter().find(|&(_, count)| count != 0) {
            Some(((d, u), _)) => Err(AnalysisError::Invariant(format!(
                "use list of {d} disagrees with defs of {u}"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn con(g: &mut Graph, t: Ty) -> NodeId {
        let n = g.add(NodeKind::Con(t), &[], t);
        match g.cse_find(n) {
            Some(old) => {
                g.unhook(n);
                old
            }
            None => {
                g.cse_insert(n);
                n
            }
        }
    }

    #[test]
    fn test_uses_follow_defs() {
        let mut g = Graph::new();
        let a = con(&mut g, Ty::CTRL);
        let b = con(&mut g, Ty::SCALAR);
        let p = g.add(NodeKind::Proj(0), &[Some(a)], Ty::ALL);
        assert_eq!(g.node(a).uses(), &[p]);
        g.set_def(p, 0, Some(b));
        assert!(g.node(a).uses().is_empty());
        assert_eq!(g.node(b).uses(), &[p]);
        g.add_def(p, None);
        assert_eq!(g.node(p).defs().len(), 2);
        g.verify_uses().unwrap();
    }

    #[test]
    fn test_constants_are_hash_consed() {
        let mut g = Graph::new();
        let a = con(&mut g, Ty::CTRL);
        let b = con(&mut g, Ty::CTRL);
        assert_eq!(a, b);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_wiring_nodes_never_cse() {
        let mut g = Graph::new();
        let c = con(&mut g, Ty::CTRL);
        let e1 = g.add(NodeKind::CEProj, &[Some(c)], Ty::CTRL);
        g.cse_insert(e1);
        let e2 = g.add(NodeKind::CEProj, &[Some(c)], Ty::CTRL);
        assert_eq!(g.cse_find(e2), None);
        assert_ne!(e1, e2);
    }

    #[test]
    fn test_free_slots_are_reused() {
        let mut g = Graph::new();
        let c = con(&mut g, Ty::CTRL);
        let p = g.add(NodeKind::Proj(1), &[Some(c)], Ty::ALL);
        g.kill(p);
        assert!(!g.contains(p));
        assert!(g.contains(c));
        let q = g.add(NodeKind::Proj(2), &[Some(c)], Ty::ALL);
        assert_eq!(p, q);
        g.verify_uses().unwrap();
    }

    #[test]
    fn test_kill_skips_kept_and_used() {
        let mut g = Graph::new();
        let c = con(&mut g, Ty::CTRL);
        let p = g.add(NodeKind::Proj(0), &[Some(c)], Ty::ALL);
        let q = g.add(NodeKind::Proj(0), &[Some(p)], Ty::ALL);
        g.kill(p);
        assert!(g.contains(p));
        g.keep(q);
        g.kill(q);
        assert!(g.contains(q));
        g.unkeep(q);
        g.kill(q);
        assert!(!g.contains(q));
        assert!(!g.contains(p));
    }

    #[test]
    fn test_subsume_moves_uses_and_keep() {
        let mut g = Graph::new();
        let a = con(&mut g, Ty::CTRL);
        let b = con(&mut g, Ty::XCTRL);
        let old = g.add(NodeKind::Proj(0), &[Some(a)], Ty::ALL);
        let new = g.add(NodeKind::Proj(0), &[Some(b)], Ty::ALL);
        let user = g.add(NodeKind::CallEpi, &[Some(old), Some(old)], Ty::ALL);
        g.keep(old);
        g.subsume(old, new);
        assert!(!g.contains(old));
        assert_eq!(g.node(user).defs(), &[Some(new), Some(new)]);
        assert!(g.node(new).is_kept());
        g.verify_uses().unwrap();
    }

    #[test]
    fn test_killing_fun_unregisters() {
        let mut g = Graph::new();
        let info = FunInfo::new("f", 2, Some(0), false);
        let f = g.add(NodeKind::Fun(info), &[None], Ty::ALL);
        g.register_fun(2, f);
        assert_eq!(g.fun_by_fidx(2), Some(f));
        g.kill(f);
        assert_eq!(g.fun_by_fidx(2), None);
    }
}
