//! Capability bit-sets: hash-consed sets of alias, function or call-site ids
//!
//! A set is either below center (`Low`, "may be any of these"), above center
//! (`High`, "free choice among these") or `EMPTY`, which sits on the center
//! and is its own dual:
//!
//! ```text
//!        ANY = ~[0,ALLX]
//!           ...  High sets, meet = intersection
//!          EMPTY
//!           ...  Low sets, meet = union
//!        ALL =  [0,ALLX]
//! ```
//!
//! Ids live in a per-kind [`SplitTree`]; an id stands for itself and all of
//! its descendants, so members are canonicalized against the tree.

mod tree;

pub use tree::SplitTree;

use crate::error::Result;
use fnv::FnvBuildHasher;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::Write;

/// The nil choice; also the root sentinel of every split tree.
pub const NIL_BIT: u32 = 0;

/// Which universe of ids a bit-set draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BitsKind {
    /// Allocation sites.
    Alias,
    /// Function indices (fidx).
    Fun,
    /// Return program counters, one per call site.
    Rpc,
}

impl BitsKind {
    pub const ALL_KINDS: [BitsKind; 3] = [BitsKind::Alias, BitsKind::Fun, BitsKind::Rpc];

    fn index(self) -> usize {
        match self {
            BitsKind::Alias => 0,
            BitsKind::Fun => 1,
            BitsKind::Rpc => 2,
        }
    }
}

/// Handle to an interned bit-set. Equal handles mean equal sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bits(u32);

type Ids = SmallVec<[u32; 4]>;

/// The interned content behind a [`Bits`] handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitsSet {
    kind: BitsKind,
    above: bool,
    ids: Ids,
}

impl BitsSet {
    pub fn kind(&self) -> BitsKind {
        self.kind
    }

    pub fn above_center(&self) -> bool {
        self.above
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Canonical members, ascending.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }
}

#[derive(Debug, Clone, Copy)]
struct KindConsts {
    allx: u32,
    all: Bits,
    any: Bits,
    nall: Bits,
    nil: Bits,
    xnil: Bits,
    empty: Bits,
}

/// Split trees plus the intern table for all three kinds of bit-sets.
#[derive(Debug)]
pub struct BitsTable {
    trees: [SplitTree; 3],
    table: IndexSet<BitsSet, FnvBuildHasher>,
    duals: Vec<Bits>,
    pool: Vec<Ids>,
    consts: Vec<KindConsts>,
    init_len: usize,
}

impl BitsTable {
    pub fn new() -> Self {
        let mut table = Self {
            trees: BitsKind::ALL_KINDS.map(SplitTree::new),
            table: IndexSet::with_hasher(FnvBuildHasher::default()),
            duals: Vec::new(),
            pool: Vec::new(),
            consts: Vec::new(),
            init_len: 0,
        };
        for kind in BitsKind::ALL_KINDS {
            let tree = &mut table.trees[kind.index()];
            // A fresh tree always accepts its one root split.
            let allx = tree.new_id(NIL_BIT).unwrap_or(1);
            let nall = table.make_set(kind, false, &[allx]);
            let all = table.make_set(kind, false, &[NIL_BIT, allx]);
            let any = table.dual(all);
            let nil = table.make(kind, NIL_BIT);
            let xnil = table.dual(nil);
            let empty = table.make_set(kind, false, &[]);
            table.consts.push(KindConsts {
                allx,
                all,
                any,
                nall,
                nil,
                xnil,
                empty,
            });
        }
        table.init0();
        table
    }

    fn init0(&mut self) {
        for tree in &mut self.trees {
            tree.init0();
        }
        self.init_len = self.table.len();
    }

    /// Drop everything created since construction.
    pub fn reset(&mut self) {
        for tree in &mut self.trees {
            tree.reset_to_init0();
        }
        self.table.truncate(self.init_len);
        self.duals.truncate(self.init_len);
        self.pool.clear();
    }

    fn consts(&self, kind: BitsKind) -> &KindConsts {
        &self.consts[kind.index()]
    }

    pub fn allx(&self, kind: BitsKind) -> u32 {
        self.consts(kind).allx
    }
    pub fn all(&self, kind: BitsKind) -> Bits {
        self.consts(kind).all
    }
    pub fn any(&self, kind: BitsKind) -> Bits {
        self.consts(kind).any
    }
    /// Every id, but no nil.
    pub fn nall(&self, kind: BitsKind) -> Bits {
        self.consts(kind).nall
    }
    pub fn nil(&self, kind: BitsKind) -> Bits {
        self.consts(kind).nil
    }
    pub fn xnil(&self, kind: BitsKind) -> Bits {
        self.consts(kind).xnil
    }
    pub fn empty(&self, kind: BitsKind) -> Bits {
        self.consts(kind).empty
    }

    pub fn tree(&self, kind: BitsKind) -> &SplitTree {
        &self.trees[kind.index()]
    }

    pub fn new_id(&mut self, kind: BitsKind, par: u32) -> Result<u32> {
        self.trees[kind.index()].new_id(par)
    }

    pub fn split(&mut self, kind: BitsKind, par: u32) -> Result<(u32, u32)> {
        self.trees[kind.index()].split(par)
    }

    pub fn is_parent(&self, kind: BitsKind, par: u32, kid: u32) -> bool {
        self.tree(kind).is_parent(par, kid)
    }

    pub fn parent(&self, kind: BitsKind, kid: u32) -> u32 {
        self.tree(kind).parent(kid)
    }

    pub fn get(&self, bits: Bits) -> &BitsSet {
        &self.table[bits.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn scratch(&mut self) -> Ids {
        self.pool.pop().unwrap_or_default()
    }

    fn intern(&mut self, set: BitsSet) -> Bits {
        if let Some(idx) = self.table.get_index_of(&set) {
            let mut ids = set.ids;
            ids.clear();
            self.pool.push(ids);
            return Bits(idx as u32);
        }
        let dual = BitsSet {
            kind: set.kind,
            above: !set.ids.is_empty() && !set.above,
            ids: set.ids.clone(),
        };
        let (idx, _) = self.table.insert_full(set);
        let this = Bits(idx as u32);
        self.duals.push(this);
        if self.table[idx] != dual {
            let (didx, _) = self.table.insert_full(dual);
            self.duals[idx] = Bits(didx as u32);
            self.duals.push(this);
        }
        this
    }

    /// Make a canonical set. An empty id list always yields `EMPTY`.
    pub fn make_set(&mut self, kind: BitsKind, above: bool, ids: &[u32]) -> Bits {
        let mut scratch = self.scratch();
        scratch.extend_from_slice(ids);
        self.finish(kind, above, scratch)
    }

    fn finish(&mut self, kind: BitsKind, above: bool, mut ids: Ids) -> Bits {
        canonicalize(&self.trees[kind.index()], &mut ids);
        let above = above && !ids.is_empty();
        self.intern(BitsSet { kind, above, ids })
    }

    /// A single low bit.
    pub fn make(&mut self, kind: BitsKind, bit: u32) -> Bits {
        self.make_set(kind, false, &[bit])
    }

    /// Add a bit, keeping the set's side of center.
    pub fn or(&mut self, bits: Bits, bit: u32) -> Bits {
        let set = self.get(bits);
        let (kind, above) = (set.kind, set.above);
        let mut ids = self.scratch();
        ids.extend_from_slice(&self.get(bits).ids);
        ids.push(bit);
        self.finish(kind, above, ids)
    }

    pub fn dual(&self, bits: Bits) -> Bits {
        self.duals[bits.0 as usize]
    }

    pub fn above_center(&self, bits: Bits) -> bool {
        self.get(bits).above
    }

    /// Direct membership, no tree walk.
    pub fn test(&self, bits: Bits, bit: u32) -> bool {
        self.get(bits).ids.binary_search(&bit).is_ok()
    }

    /// True if `id` is a member or descends from one.
    pub fn test_recur(&self, bits: Bits, id: u32) -> bool {
        let set = self.get(bits);
        let tree = self.tree(set.kind);
        set.ids.iter().any(|&m| tree.is_parent(m, id))
    }

    /// The single member, if there is exactly one.
    pub fn getbit(&self, bits: Bits) -> Option<u32> {
        match self.get(bits).ids.as_slice() {
            [bit] => Some(*bit),
            _ => None,
        }
    }

    pub fn meet(&mut self, a: Bits, b: Bits) -> Bits {
        if a == b {
            return a;
        }
        let (sa, sb) = (self.get(a), self.get(b));
        debug_assert_eq!(sa.kind, sb.kind, "meet across bit-set kinds");
        if sa.kind != sb.kind {
            return self.all(sa.kind);
        }
        let kind = sa.kind;
        if sa.ids.is_empty() {
            return if sb.above { a } else { b };
        }
        if sb.ids.is_empty() {
            return if sa.above { b } else { a };
        }
        match (sa.above, sb.above) {
            (false, false) => {
                let mut ids = self.scratch();
                ids.extend_from_slice(&self.get(a).ids);
                ids.extend_from_slice(&self.get(b).ids);
                self.finish(kind, false, ids)
            }
            (true, true) => {
                let mut ids = self.scratch();
                let tree = self.tree(kind);
                let (sa, sb) = (self.get(a), self.get(b));
                ids.extend(
                    sa.ids
                        .iter()
                        .copied()
                        .filter(|&x| sb.ids.iter().any(|&y| tree.is_parent(y, x))),
                );
                ids.extend(
                    sb.ids
                        .iter()
                        .copied()
                        .filter(|&y| sa.ids.iter().any(|&x| tree.is_parent(x, y))),
                );
                self.finish(kind, true, ids)
            }
            (true, false) => b,
            (false, true) => a,
        }
    }

    /// Printable form: `[1,4]` below center, `~[1+4]` above, `[]` for empty.
    pub fn str(&self, bits: Bits) -> String {
        let set = self.get(bits);
        let kind = set.kind;
        if bits == self.all(kind) {
            return "[ALL]".to_string();
        }
        if bits == self.any(kind) {
            return "~[ALL]".to_string();
        }
        let mut out = String::new();
        if set.above {
            out.push('~');
        }
        out.push('[');
        let sep = if set.above { '+' } else { ',' };
        for (i, id) in set.ids.iter().enumerate() {
            if i > 0 {
                out.push(sep);
            }
            let _ = write!(out, "{id}");
        }
        out.push(']');
        out
    }
}

impl Default for BitsTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort, drop members covered by an ancestor, and fold complete kid pairs of
/// closed parents back into the parent.
fn canonicalize(tree: &SplitTree, ids: &mut Ids) {
    ids.sort_unstable();
    ids.dedup();
    if ids.len() < 2 {
        return;
    }
    let covered: Ids = ids
        .iter()
        .copied()
        .filter(|&k| ids.iter().any(|&p| p != k && tree.is_parent(p, k)))
        .collect();
    ids.retain(|k| !covered.contains(k));
    loop {
        let full = ids.iter().copied().find_map(|k| {
            let par = tree.parent(k);
            let complete = k != NIL_BIT
                && par != NIL_BIT
                && tree.is_closed(par)
                && tree.kids(par).iter().all(|kid| ids.contains(kid));
            complete.then_some(par)
        });
        let Some(par) = full else { break };
        ids.retain(|k| !tree.kids(par).contains(k));
        ids.push(par);
        ids.sort_unstable();
    }
}
