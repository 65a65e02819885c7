//! Call-graph wiring
//!
//! A call starts out connected to nothing: its epilog assumes the worst.
//! During global analysis, once a call's function pointer names a known set
//! of function indices, every matching function is *wired* to the call:
//!
//! - a `CEProj` edge is added to the callee's `Fun` (the callee is reachable
//!   from this call when the edge is live),
//! - each `Parm` gains the call's matching argument,
//! - the call's `CallEpi` gains the callee's `Ret`.
//!
//! Wiring only ever adds edges. Whether an edge is taken is a value
//! (`good_call`) that is recomputed as the call's inputs settle.
//!
//! Forward references are stub functions standing in for a name used before
//! its definition; [`Session::merge_ref_def`] folds a stub into the real
//! definition.

use crate::bits::{BitsKind, SplitTree, NIL_BIT};
use crate::error::{ErrMsg, Result, SrcPos};
use crate::gvn::{Mode, Transfer};
use crate::node::{fptr, ret, FunInfo, Graph, NodeId, NodeKind};
use crate::session::{wrong_kind, Session};
use crate::types::{Ty, TypeStore};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Can a call whose current value is `call_val` reach function `fidx`?
pub fn good_call(
    ts: &TypeStore,
    call_val: Ty,
    thunk: bool,
    fidx: u32,
    nargs: Option<u32>,
) -> bool {
    let Some(elems) = ts.as_tuple(call_val) else {
        return !ts.above_center(call_val);
    };
    if elems.first() != Some(&Ty::CTRL) {
        return false;
    }
    if thunk {
        return true;
    }
    let bits = ts.bits();
    let fidxs = match elems.last().and_then(|&f| ts.as_funptr(f)) {
        Some((fidxs, _, _)) => fidxs,
        None if elems.last().is_some_and(|&f| ts.above_center(f)) => return true,
        None => bits.all(BitsKind::Fun),
    };
    if bits.above_center(fidxs) {
        return true;
    }
    if !bits.test_recur(fidxs, fidx) {
        return false;
    }
    match nargs {
        Some(n) => n as usize == elems.len().saturating_sub(3),
        None => true,
    }
}

/// A member index is covered when every function it may name is registered.
fn covered(g: &Graph, tree: &SplitTree, allx: u32, m: u32) -> bool {
    if m == allx {
        return false;
    }
    if g.fun_by_fidx(m).is_some() {
        return true;
    }
    tree.is_closed(m) && tree.kids(m).iter().all(|&k| covered(g, tree, allx, k))
}

/// Control edge from a call into one callee.
pub(crate) fn ceproj_value(g: &Graph, ts: &TypeStore, n: NodeId) -> Ty {
    let Some(call) = g.def(n, 0) else {
        return Ty::XCTRL;
    };
    let Some(NodeKind::Fun(info)) = g.node(n).uses().first().map(|&f| g.kind(f)) else {
        return Ty::CTRL;
    };
    if good_call(ts, g.val(call), info.thunk, info.fidx, info.nargs) {
        Ty::CTRL
    } else {
        Ty::XCTRL
    }
}

/// What comes back from a call: the meet of the returns of every callee it
/// can reach. Unknown callees fall to the bottom tuple.
pub(crate) fn call_epi_value(g: &Graph, ts: &mut TypeStore, mode: Mode, n: NodeId) -> Ty {
    let any_mem = ts.any_mem();
    let all_mem = ts.all_mem();
    let top = ts.make_tuple(&[Ty::XCTRL, any_mem, Ty::XSCALAR]);
    let bot = ts.make_tuple(&[Ty::CTRL, all_mem, Ty::SCALAR]);

    let Some(call) = g.def(n, 0) else {
        return bot;
    };
    let cv = g.val(call);
    let (ctrl, fp) = match ts.as_tuple(cv) {
        Some(elems) if elems.len() >= 3 => (elems[0], elems[elems.len() - 1]),
        _ if ts.above_center(cv) => return top,
        _ => return bot,
    };
    if ts.above_center(ctrl) {
        return top;
    }
    if ctrl != Ty::CTRL || mode == Mode::Parse {
        return bot;
    }
    let fidxs = match ts.as_funptr(fp) {
        Some((fidxs, _, _)) => fidxs,
        None if ts.above_center(fp) => return top,
        None => return bot,
    };
    let bits = ts.bits();
    if bits.above_center(fidxs) {
        return top;
    }
    let members: SmallVec<[u32; 4]> = bits
        .get(fidxs)
        .ids()
        .iter()
        .copied()
        .filter(|&m| m != NIL_BIT)
        .collect();
    if members.is_empty() {
        return top;
    }
    let tree = bits.tree(BitsKind::Fun);
    let allx = bits.allx(BitsKind::Fun);
    if !members.iter().all(|&m| covered(g, tree, allx, m)) {
        return bot;
    }

    let mut acc = top;
    for r in g.node(n).defs().iter().skip(1).copied().flatten() {
        let NodeKind::Ret { fidx, nargs } = g.kind(r) else {
            continue;
        };
        let thunk = is_thunk(g, r);
        if good_call(ts, cv, thunk, *fidx, *nargs) {
            acc = ts.meet(acc, g.val(r));
        }
    }
    acc
}

/// True if the function returning through `rt` is a thunk.
fn is_thunk(g: &Graph, rt: NodeId) -> bool {
    matches!(
        g.def(rt, ret::FUN).map(|f| g.kind(f)),
        Some(NodeKind::Fun(FunInfo { thunk: true, .. }))
    )
}

/// True if some live edge out of `call` enters a thunk.
pub(crate) fn reaches_thunk(g: &Graph, call: NodeId) -> bool {
    g.node(call).uses().iter().any(|&ce| {
        matches!(g.kind(ce), NodeKind::CEProj)
            && g.val(ce) == Ty::CTRL
            && matches!(
                g.node(ce).uses().first().map(|&f| g.kind(f)),
                Some(NodeKind::Fun(FunInfo { thunk: true, .. }))
            )
    })
}

/// True if the closure environment of a function pointer is needed: the
/// pointer escapes, or is used as anything but the target of a call.
pub(crate) fn display_used(g: &Graph, fp: NodeId) -> bool {
    let node = g.node(fp);
    node.is_kept()
        || node.uses().iter().any(|&u| match g.kind(u) {
            NodeKind::Call { .. } => {
                let defs = g.node(u).defs();
                defs[..defs.len().saturating_sub(1)].contains(&Some(fp))
            }
            _ => true,
        })
}

fn is_wired(g: &Graph, call: NodeId, fun: NodeId) -> bool {
    g.node(fun)
        .defs()
        .iter()
        .copied()
        .flatten()
        .any(|d| matches!(g.kind(d), NodeKind::CEProj) && g.def(d, 0) == Some(call))
}

impl Session {
    /// Wire `call` to every registered function its pointer may name.
    pub(crate) fn discover_callees(&mut self, call: NodeId) {
        let cv = self.graph.val(call);
        let fp = match self.types.as_tuple(cv) {
            Some(elems) if elems.len() >= 3 && elems[0] == Ty::CTRL => elems[elems.len() - 1],
            _ => return,
        };
        let Some((fidxs, _, _)) = self.types.as_funptr(fp) else {
            return;
        };
        let bits = self.types.bits();
        if bits.above_center(fidxs) {
            return;
        }
        let targets: Vec<NodeId> = self
            .graph
            .funs()
            .filter(|&(fidx, _)| bits.test_recur(fidxs, fidx))
            .map(|(_, fun)| fun)
            .filter(|&fun| !is_wired(&self.graph, call, fun))
            .collect();
        for fun in targets {
            self.wire(call, fun);
        }
    }

    fn wire(&mut self, call: NodeId, fun: NodeId) {
        let ce = self.graph.add(NodeKind::CEProj, &[Some(call)], Ty::ANY);
        self.graph.add_def(fun, Some(ce));
        let slot = self.graph.node(fun).defs().len();

        // Arguments, by parameter index
        let nslots = self.graph.node(call).defs().len();
        let mut parms: SmallVec<[(NodeId, u32); 4]> = self
            .graph
            .node(fun)
            .uses()
            .iter()
            .filter_map(|&u| match self.graph.kind(u) {
                NodeKind::Parm(idx) => Some((u, *idx)),
                _ => None,
            })
            .collect();
        parms.sort_unstable();
        parms.dedup();
        for (parm, idx) in parms {
            let idx = idx as usize;
            let arg = if idx + 1 < nslots {
                self.graph.def(call, idx)
            } else {
                None
            };
            self.graph.set_def(parm, slot, arg);
            self.worklist.push(parm);
        }

        // Returns flow back through the epilog
        let epi = self.graph.find_use(call, NodeKind::is_call_epi);
        let rt = self.graph.find_use(fun, NodeKind::is_ret);
        if let (Some(epi), Some(rt)) = (epi, rt) {
            self.graph.add_def(epi, Some(rt));
            self.worklist.push(epi);
        }

        self.worklist.push(ce);
        self.worklist.push(fun);
        self.wired += 1;
        trace!("Wired {} -> {}", call, fun);
    }

    /// A stub for `name`, used before its definition. The stub is a function
    /// taking any arguments and returning anything, reachable from unknown
    /// callers, and reports "Unknown ref" unless a definition replaces it.
    pub fn forward_ref(&mut self, name: &str, pos: Option<SrcPos>) -> Result<NodeId> {
        let fidx = self.types.new_fidx()?;
        let unknown = self.con(Ty::CTRL);
        let mut info = FunInfo::new(name, fidx, None, false);
        info.forward = true;
        let fun = self.build(NodeKind::Fun(info), &[Some(unknown)]);
        self.graph.register_fun(fidx, fun);

        let all_mem = self.types.all_mem();
        let mem = self.con(all_mem);
        let val = self.con(Ty::SCALAR);
        let all_call = self.types.all_call();
        let rpc = self.con(all_call);
        let rt = self.build(
            NodeKind::Ret { fidx, nargs: None },
            &[Some(fun), Some(mem), Some(val), Some(rpc), Some(fun)],
        );

        let nall = self.types.bits().nall(BitsKind::Alias);
        let disp_ty = self.types.make_memptr(nall, Ty::USED);
        let disp = self.con(disp_ty);
        let kind = NodeKind::FunPtr {
            name: name.to_string(),
            mid_def: false,
            referr: Some(ErrMsg::forward_ref(name, pos)),
        };
        let fp = self.build(kind, &[Some(rt), Some(disp)]);
        debug!("Forward reference '{}' fidx={}", name, fidx);
        Ok(fp)
    }

    /// Replace the forward-reference stub `stub` by the function pointer
    /// `def`. The definition takes over the stub's function index, so every
    /// value already naming the stub now names the definition.
    pub fn merge_ref_def(&mut self, stub: NodeId, def: NodeId) -> Result<()> {
        if stub == def
            || !matches!(self.graph.kind(stub), NodeKind::FunPtr { referr: Some(_), .. })
        {
            return Err(wrong_kind(stub, "forward reference"));
        }
        if !matches!(self.graph.kind(def), NodeKind::FunPtr { referr: None, .. }) {
            return Err(wrong_kind(def, "function pointer"));
        }
        let stub_fidx = self
            .graph
            .def(stub, fptr::RET)
            .and_then(|r| match self.graph.kind(r) {
                NodeKind::Ret { fidx, .. } => Some(*fidx),
                _ => None,
            })
            .ok_or_else(|| wrong_kind(stub, "forward reference"))?;
        let def_ret = self
            .graph
            .def(def, fptr::RET)
            .filter(|&r| self.graph.kind(r).is_ret())
            .ok_or_else(|| wrong_kind(def, "function pointer"))?;
        let def_fun = self
            .graph
            .def(def_ret, ret::FUN)
            .filter(|&f| self.graph.kind(f).is_fun())
            .ok_or_else(|| wrong_kind(def_ret, "function return"))?;

        // Move the stub's index onto the definition
        let mut old_fidx = stub_fidx;
        if let NodeKind::Fun(info) = self.graph.kind_mut(def_fun) {
            old_fidx = std::mem::replace(&mut info.fidx, stub_fidx);
            info.forward = false;
        }
        if let NodeKind::Ret { fidx, .. } = self.graph.kind_mut(def_ret) {
            *fidx = stub_fidx;
        }
        self.graph.unregister_fun(old_fidx);
        self.graph.unregister_fun(stub_fidx);
        self.graph.register_fun(stub_fidx, def_fun);

        let users: SmallVec<[NodeId; 8]> = self.graph.node(stub).uses().iter().copied().collect();
        self.graph.subsume(stub, def);

        let v = self.graph.value(def, &mut self.types, self.mode);
        self.graph.set_val(def, v);
        for u in users {
            self.worklist.push(u);
        }
        let uses: SmallVec<[NodeId; 8]> = self.graph.node(def).uses().iter().copied().collect();
        for u in uses {
            self.worklist.push(u);
        }
        debug!(
            "Merged forward reference into fidx={} (was {})",
            stub_fidx, old_fidx
        );
        self.iter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_val(ts: &mut TypeStore, fidx: u32, nargs: usize) -> Ty {
        let fidxs = ts.bits_mut().make(BitsKind::Fun, fidx);
        let fp = ts.make_funptr(fidxs, crate::types::Arity::N(nargs as u32), Ty::XSCALAR);
        let mem = ts.all_mem();
        let mut elems = vec![Ty::CTRL, mem];
        elems.extend(std::iter::repeat(Ty::SCALAR).take(nargs));
        elems.push(fp);
        ts.make_tuple(&elems)
    }

    #[test]
    fn test_good_call_rules() {
        let mut ts = TypeStore::new();
        let f = ts.new_fidx().unwrap();
        let g = ts.new_fidx().unwrap();
        let cv = call_val(&mut ts, f, 1);
        assert!(good_call(&ts, cv, false, f, Some(1)));
        assert!(!good_call(&ts, cv, false, g, Some(1)));
        assert!(!good_call(&ts, cv, false, f, Some(2)));
        assert!(good_call(&ts, cv, false, f, None));
        assert!(!good_call(&ts, Ty::ANY, false, f, Some(1)));
        assert!(good_call(&ts, Ty::ALL, false, f, Some(1)));
    }

    #[test]
    fn test_good_call_dead_control() {
        let mut ts = TypeStore::new();
        let f = ts.new_fidx().unwrap();
        let mem = ts.all_mem();
        let dead = ts.make_tuple(&[Ty::XCTRL, mem, Ty::SCALAR]);
        assert!(!good_call(&ts, dead, true, f, None));
        let thunk = ts.make_tuple(&[Ty::CTRL, mem, Ty::SCALAR]);
        assert!(good_call(&ts, thunk, true, f, Some(5)));
    }

    #[test]
    fn test_good_call_split_parent() {
        let mut ts = TypeStore::new();
        let f = ts.new_fidx().unwrap();
        let (kid, _) = ts.bits_mut().split(BitsKind::Fun, f).unwrap();
        let cv = call_val(&mut ts, f, 0);
        assert!(good_call(&ts, cv, false, kid, Some(0)));
    }

    #[test]
    fn test_display_used() {
        let mut s = Session::new();
        let f = s.new_fun("f", 0, false).unwrap();
        let ret = s.new_ret(f.fun, f.fun, f.mem, f.mem).unwrap();
        let d = s.con(Ty::SCALAR);
        let fp = s.new_fun_ptr(ret, Some(d)).unwrap();
        let ctrl = s.start_ctrl();
        let mem = s.start_mem();
        s.new_call(ctrl, mem, &[], fp, None);
        assert!(!display_used(s.graph(), fp));
        s.new_call(ctrl, mem, &[fp], fp, None);
        assert!(display_used(s.graph(), fp));
    }
}
