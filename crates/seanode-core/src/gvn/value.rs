//! Forward transfer functions
//!
//! Each function reads only the current values of a node's inputs. All of
//! them are monotone: lowering an input never raises the result.

use super::Mode;
use crate::bits::BitsKind;
use crate::node::{fptr, load, Graph, NodeId, NodeKind};
use crate::types::{Arity, Ty, Tys, TypeStore};
use crate::wiring;

pub(crate) fn value(g: &Graph, ts: &mut TypeStore, mode: Mode, n: NodeId) -> Ty {
    match g.kind(n) {
        NodeKind::Start => {
            let mem = ts.all_mem();
            ts.make_tuple(&[Ty::CTRL, mem])
        }
        NodeKind::Con(t) => *t,
        NodeKind::Proj(i) => proj(ts, g.def_val(n, 0), *i as usize),
        NodeKind::Fun(_) => fun(g, ts, n),
        NodeKind::Parm(_) => parm(g, ts, n),
        NodeKind::Ret { .. } => {
            let (c, m, v) = (g.def_val(n, 0), g.def_val(n, 1), g.def_val(n, 2));
            ts.make_tuple(&[c, m, v])
        }
        NodeKind::FunPtr { .. } => fun_ptr(g, ts, n),
        NodeKind::Call { .. } => {
            let elems: Tys = g
                .node(n)
                .defs()
                .iter()
                .map(|d| d.map_or(Ty::ANY, |d| g.val(d)))
                .collect();
            ts.make_tuple(&elems)
        }
        NodeKind::CallEpi => wiring::call_epi_value(g, ts, mode, n),
        NodeKind::CEProj => wiring::ceproj_value(g, ts, n),
        NodeKind::New { alias, flds } => new_obj(g, ts, n, *alias, flds),
        NodeKind::MemMerge { aliases } => {
            let base = g.def_val(n, 0);
            let mut mem = match ts.as_mem(base) {
                Some(_) => base,
                None if ts.above_center(base) => ts.any_mem(),
                None => ts.all_mem(),
            };
            for (i, &alias) in aliases.iter().enumerate() {
                let obj = ts.to_obj(g.def_val(n, 1 + i));
                mem = ts.mem_st(mem, alias, obj);
            }
            mem
        }
        NodeKind::Load { fld, .. } => load_value(g, ts, n, fld),
    }
}

fn proj(ts: &TypeStore, t: Ty, i: usize) -> Ty {
    match ts.as_tuple(t) {
        Some(elems) => elems.get(i).copied().unwrap_or(Ty::ALL),
        None if ts.above_center(t) => Ty::ANY,
        None => Ty::ALL,
    }
}

/// Reachable if any caller's control is.
fn fun(g: &Graph, ts: &mut TypeStore, n: NodeId) -> Ty {
    let mut acc = Ty::XCTRL;
    for d in g.node(n).defs().iter().copied().flatten() {
        acc = ts.meet(acc, g.val(d));
    }
    acc
}

/// Meet of the arguments from every caller whose control is live. Input
/// `i + 1` pairs with fun input `i`.
fn parm(g: &Graph, ts: &mut TypeStore, n: NodeId) -> Ty {
    let Some(f) = g.def(n, 0) else {
        return Ty::ALL;
    };
    if ts.above_center(g.val(f)) {
        return Ty::ANY;
    }
    let mut acc = Ty::ANY;
    for (i, c) in g.node(f).defs().iter().enumerate() {
        let Some(c) = c else { continue };
        if ts.above_center(g.val(*c)) {
            continue;
        }
        if let Some(arg) = g.def(n, i + 1) {
            acc = ts.meet(acc, g.val(arg));
        }
    }
    acc
}

fn fun_ptr(g: &Graph, ts: &mut TypeStore, n: NodeId) -> Ty {
    let Some(ret) = g.def(n, fptr::RET) else {
        return Ty::ALL;
    };
    let NodeKind::Ret { fidx, nargs } = g.kind(ret) else {
        return Ty::ALL;
    };
    let (fidx, nargs) = (*fidx, *nargs);
    let fidxs = ts.bits_mut().make(BitsKind::Fun, fidx);
    let disp = match g.def(n, fptr::DISPLAY) {
        Some(d) => ts.to_scalar(g.val(d)),
        None => Ty::XSCALAR,
    };
    ts.make_funptr(fidxs, Arity::from_nargs(nargs), disp)
}

fn new_obj(g: &Graph, ts: &mut TypeStore, n: NodeId, alias: u32, flds: &[String]) -> Ty {
    if ts.above_center(g.def_val(n, 0)) {
        return ts.make_tuple(&[Ty::UNUSED, Ty::XSCALAR]);
    }
    // Field values are clamped to scalars so no field ever reads as absent.
    let fields: Vec<(&str, Ty)> = flds
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), ts.to_scalar(g.def_val(n, 1 + i))))
        .collect();
    let obj = ts.make_struct(false, &fields);
    let aliases = ts.bits_mut().make(BitsKind::Alias, alias);
    let ptr = ts.make_memptr(aliases, obj);
    ts.make_tuple(&[obj, ptr])
}

fn load_value(g: &Graph, ts: &mut TypeStore, n: NodeId, fld: &str) -> Ty {
    if let Some(c) = g.def(n, load::CTRL) {
        if ts.above_center(g.val(c)) {
            return Ty::XSCALAR;
        }
    }
    let adr = g.def_val(n, load::ADR);
    if ts.above_center(adr) {
        return Ty::XSCALAR;
    }
    let Some((aliases, _)) = ts.as_memptr(adr) else {
        return Ty::SCALAR;
    };
    let mem = g.def_val(n, load::MEM);
    if ts.as_mem(mem).is_none() {
        return if ts.above_center(mem) {
            Ty::XSCALAR
        } else {
            Ty::SCALAR
        };
    }
    let obj = ts.mem_ld(mem, aliases);
    match ts.as_struct(obj) {
        Some(st) => {
            let t = st.get(fld);
            ts.to_scalar(t)
        }
        None if ts.above_center(obj) => Ty::XSCALAR,
        None => Ty::SCALAR,
    }
}
