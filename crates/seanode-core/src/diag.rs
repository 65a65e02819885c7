//! Deferred diagnostics
//!
//! Errors are read off the graph once values have settled, so a node that
//! looks wrong halfway through analysis but turns out fine (or dead) says
//! nothing. Anything still above center is not known to be wrong yet.

use crate::bits::NIL_BIT;
use crate::error::{ErrKind, ErrMsg, SrcPos};
use crate::node::{load, Graph, NodeId, NodeKind};
use crate::session::Session;
use crate::types::{Arity, Ty, TypeStore};
use crate::wiring::reaches_thunk;

/// The diagnostic for one node, if its current inputs are wrong.
pub(crate) fn node_err(g: &Graph, ts: &mut TypeStore, n: NodeId) -> Option<ErrMsg> {
    match g.kind(n) {
        NodeKind::FunPtr { referr, .. } => referr.clone(),
        NodeKind::Load { fld, pos } => load_err(g, ts, n, fld, *pos),
        NodeKind::Call { pos, .. } => call_err(g, ts, n, *pos),
        _ => None,
    }
}

fn load_err(
    g: &Graph,
    ts: &mut TypeStore,
    n: NodeId,
    fld: &str,
    pos: Option<SrcPos>,
) -> Option<ErrMsg> {
    let adr_node = g.def(n, load::ADR)?;
    // An unresolved name already reports itself.
    if matches!(g.kind(adr_node), NodeKind::FunPtr { referr: Some(_), .. }) {
        return None;
    }
    let adr = g.val(adr_node);
    let mem = g.def_val(n, load::MEM);
    if ts.above_center(adr) || ts.above_center(mem) {
        return None;
    }
    let unknown = || {
        ErrMsg::new(
            ErrKind::UnknownField,
            format!("Unknown field '.{fld}'"),
            pos,
        )
    };
    let Some((aliases, _)) = ts.as_memptr(adr) else {
        return Some(unknown());
    };
    if ts.bits().test(aliases, NIL_BIT) {
        return Some(ErrMsg::new(
            ErrKind::NilDeref,
            format!("Struct might be nil when reading field '.{fld}'"),
            pos,
        ));
    }
    let obj = ts.mem_ld(mem, aliases);
    if ts.above_center(obj) {
        return None;
    }
    match ts.as_struct(obj) {
        Some(st) if st.find(fld).is_some() => None,
        _ => Some(unknown()),
    }
}

fn call_err(
    g: &Graph,
    ts: &TypeStore,
    n: NodeId,
    pos: Option<SrcPos>,
) -> Option<ErrMsg> {
    let elems = ts.as_tuple(g.val(n))?;
    if elems.len() < 3 || elems[0] != Ty::CTRL {
        return None;
    }
    let fp = elems[elems.len() - 1];
    let supplied = elems.len() - 3;
    match ts.as_funptr(fp) {
        None if ts.above_center(fp) => None,
        None => Some(ErrMsg::new(
            ErrKind::NotCallable,
            format!(
                "A function is being called, but {} is not a function",
                ts.str(fp)
            ),
            pos,
        )),
        Some((fidxs, _, _)) if ts.bits().above_center(fidxs) => None,
        Some((_, Arity::N(want), _)) if want as usize != supplied && !reaches_thunk(g, n) => {
            Some(ErrMsg::new(
                ErrKind::ArgCount,
                format!("Passing {supplied} arguments to a function which takes {want} arguments"),
                pos,
            ))
        }
        Some(_) => None,
    }
}

impl Session {
    /// Every diagnostic on a live node, in node order.
    pub fn errors(&mut self) -> Vec<(NodeId, ErrMsg)> {
        let ids: Vec<NodeId> = self.graph.ids().collect();
        ids.into_iter()
            .filter(|&n| self.graph.live(n) != Ty::ANY)
            .filter_map(|n| node_err(&self.graph, &mut self.types, n).map(|e| (n, e)))
            .collect()
    }
}
