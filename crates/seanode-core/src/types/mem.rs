//! Abstract memory: a map from alias to object with a default
//!
//! Lookups walk the alias split tree, so an entry for an alias also covers
//! every alias split from it. An entry equal to what its ancestors already
//! imply is redundant and dropped, which keeps the map canonical.

use super::{Ty, TypeKind, TypeStore};
use crate::bits::{Bits, BitsKind, NIL_BIT};
use smallvec::SmallVec;

pub type MemObjs = SmallVec<[(u32, Ty); 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemType {
    dflt: Ty,
    objs: MemObjs,
}

impl MemType {
    pub fn dflt(&self) -> Ty {
        self.dflt
    }

    /// Explicit (alias, object) entries, ascending by alias.
    pub fn objs(&self) -> &[(u32, Ty)] {
        &self.objs
    }

    pub(crate) fn into_objs(self) -> MemObjs {
        self.objs
    }
}

impl TypeStore {
    /// Memory with every alias holding `dflt`, except for `objs`.
    pub fn make_mem(&mut self, dflt: Ty, objs: &[(u32, Ty)]) -> Ty {
        let mut buf = self.objs_buf();
        buf.extend(objs.iter().copied().filter(|&(alias, _)| alias != NIL_BIT));
        self.finish_mem(dflt, buf)
    }

    fn finish_mem(&mut self, dflt: Ty, mut objs: MemObjs) -> Ty {
        objs.sort_unstable_by_key(|&(alias, _)| alias);
        objs.dedup_by_key(|&mut (alias, _)| alias);
        let tree = self.bits.tree(BitsKind::Alias);
        let drop: SmallVec<[u32; 4]> = objs
            .iter()
            .filter(|&&(alias, obj)| lookup(tree, dflt, &objs, tree.parent(alias)) == obj)
            .map(|&(alias, _)| alias)
            .collect();
        objs.retain(|(alias, _)| !drop.contains(alias));
        self.intern(TypeKind::Mem(MemType { dflt, objs }))
    }

    pub fn as_mem(&self, t: Ty) -> Option<&MemType> {
        match self.kind(t) {
            TypeKind::Mem(m) => Some(m),
            _ => None,
        }
    }

    /// The object at one alias.
    pub fn mem_at(&self, mem: Ty, alias: u32) -> Ty {
        match self.as_mem(mem) {
            Some(m) => lookup(self.bits.tree(BitsKind::Alias), m.dflt, &m.objs, alias),
            None if self.above_center(mem) => Ty::UNUSED,
            None => Ty::USED,
        }
    }

    /// Load through a pointer's alias set: the meet of every object the
    /// aliases (and anything split from them) may hold. High or empty alias
    /// sets load nothing yet.
    pub fn mem_ld(&mut self, mem: Ty, aliases: Bits) -> Ty {
        let Some(m) = self.as_mem(mem).cloned() else {
            return if self.above_center(mem) {
                Ty::UNUSED
            } else {
                Ty::USED
            };
        };
        if self.bits.above_center(aliases) {
            return Ty::UNUSED;
        }
        let members: SmallVec<[u32; 4]> = self
            .bits
            .get(aliases)
            .ids()
            .iter()
            .copied()
            .filter(|&a| a != NIL_BIT)
            .collect();
        let mut acc = Ty::UNUSED;
        for a in members {
            let tree = self.bits.tree(BitsKind::Alias);
            let mut objs: SmallVec<[Ty; 4]> = SmallVec::new();
            objs.push(lookup(tree, m.dflt, &m.objs, a));
            objs.extend(
                m.objs
                    .iter()
                    .filter(|&&(k, _)| k != a && tree.is_parent(a, k))
                    .map(|&(_, obj)| obj),
            );
            for obj in objs {
                acc = self.meet(acc, obj);
            }
        }
        acc
    }

    /// Overwrite one alias (and everything split from it) with `obj`.
    pub fn mem_st(&mut self, mem: Ty, alias: u32, obj: Ty) -> Ty {
        let Some(m) = self.as_mem(mem).cloned() else {
            return mem;
        };
        let mut objs = self.objs_buf();
        let tree = self.bits.tree(BitsKind::Alias);
        objs.extend(
            m.objs
                .iter()
                .copied()
                .filter(|&(k, _)| !tree.is_parent(alias, k)),
        );
        objs.push((alias, obj));
        self.finish_mem(m.dflt, objs)
    }

    pub(super) fn meet_mem(&mut self, a: &MemType, b: &MemType) -> Ty {
        let dflt = self.meet(a.dflt, b.dflt);
        let mut keys: SmallVec<[u32; 8]> = a.objs.iter().chain(&b.objs).map(|&(k, _)| k).collect();
        keys.sort_unstable();
        keys.dedup();
        let mut objs = self.objs_buf();
        for k in keys {
            let tree = self.bits.tree(BitsKind::Alias);
            let oa = lookup(tree, a.dflt, &a.objs, k);
            let ob = lookup(tree, b.dflt, &b.objs, k);
            let obj = self.meet(oa, ob);
            objs.push((k, obj));
        }
        self.finish_mem(dflt, objs)
    }

    pub(super) fn dual_mem(&self, m: &MemType) -> MemType {
        MemType {
            dflt: self.dual(m.dflt),
            objs: m.objs.iter().map(|&(k, obj)| (k, self.dual(obj))).collect(),
        }
    }
}

/// Walk from `alias` toward the root until an explicit entry is found.
fn lookup(tree: &crate::bits::SplitTree, dflt: Ty, objs: &[(u32, Ty)], alias: u32) -> Ty {
    let mut k = alias;
    while k != NIL_BIT {
        if let Ok(i) = objs.binary_search_by_key(&k, |&(a, _)| a) {
            return objs[i].1;
        }
        k = tree.parent(k);
    }
    dflt
}
