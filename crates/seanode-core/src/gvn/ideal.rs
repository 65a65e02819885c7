//! Local rewrites
//!
//! A rewrite never changes what a node computes, only how. Rewrites that
//! depend on liveness (display pruning) run only in opto mode, after the
//! liveness pass.

use super::Mode;
use crate::bits::{BitsKind, NIL_BIT};
use crate::node::{fptr, load, Graph, NodeId, NodeKind};
use crate::types::TypeStore;
use crate::wiring;

/// Outcome of a successful `ideal` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Every use of the node can use this node instead.
    Replace(NodeId),
    /// The input at this slot is not needed; clear it.
    DropDef(usize),
}

pub(crate) fn ideal(g: &Graph, ts: &TypeStore, mode: Mode, n: NodeId) -> Option<Rewrite> {
    match g.kind(n) {
        NodeKind::Load { fld, .. } => {
            if let Some(m) = forward_store(g, ts, n, fld) {
                return Some(Rewrite::Replace(m));
            }
            drop_nil_check(g, ts, n)
        }
        NodeKind::FunPtr { .. } if mode == Mode::Opto => {
            let disp = g.def(n, fptr::DISPLAY)?;
            if g.contains(disp) && !wiring::display_used(g, n) {
                Some(Rewrite::DropDef(fptr::DISPLAY))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Load of a field from the object a `New` just stored: use the stored value.
/// The memory chain is walked through merges that do not touch the alias.
fn forward_store(g: &Graph, ts: &TypeStore, n: NodeId, fld: &str) -> Option<NodeId> {
    let adr = g.def(n, load::ADR)?;
    let NodeKind::Proj(1) = g.kind(adr) else {
        return None;
    };
    let alloc = g.def(adr, 0)?;
    let NodeKind::New { alias, flds } = g.kind(alloc) else {
        return None;
    };
    let tree = ts.bits().tree(BitsKind::Alias);
    let mut mem = g.def(n, load::MEM)?;
    loop {
        let NodeKind::MemMerge { aliases } = g.kind(mem) else {
            return None;
        };
        match aliases.iter().position(|&a| tree.is_parent(a, *alias)) {
            Some(i) => {
                if aliases[i] != *alias {
                    return None;
                }
                let obj = g.def(mem, 1 + i)?;
                if g.kind(obj) != &NodeKind::Proj(0) || g.def(obj, 0) != Some(alloc) {
                    return None;
                }
                let slot = flds.iter().position(|f| f == fld)?;
                return g.def(alloc, 1 + slot);
            }
            None => mem = g.def(mem, 0)?,
        }
    }
}

/// A pointer that can no longer be nil needs no control dependence.
fn drop_nil_check(g: &Graph, ts: &TypeStore, n: NodeId) -> Option<Rewrite> {
    g.def(n, load::CTRL)?;
    let (aliases, _) = ts.as_memptr(g.def_val(n, load::ADR))?;
    let bits = ts.bits();
    if bits.above_center(aliases) || bits.get(aliases).is_empty() || bits.test(aliases, NIL_BIT) {
        return None;
    }
    Some(Rewrite::DropDef(load::CTRL))
}
