//! Interned value lattice
//!
//! Every abstract value is hash-consed into a [`TypeStore`] and handled as a
//! [`Ty`]: equal handles mean equal values. The lattice is a lifted sum of
//! disjoint families under a shared top (`ANY`) and bottom (`ALL`):
//!
//! ```text
//!                          ANY
//!      ~Ctrl      ~Scalar        ~Obj      Mem     (a,b,..)
//!        |     int flt * fn #   struct []   |        |
//!      Ctrl        Scalar         Obj      Mem     (a,b,..)
//!                          ALL
//! ```
//!
//! Meeting values from different families falls to `ALL`. Inside a family
//! every composite type meets field-wise, so the lattice is total and never
//! reports an error from `meet` or `dual`.

mod display;
mod mem;
mod num;
mod obj;

pub use mem::{MemObjs, MemType};
pub use num::{FltCon, Num, NumCon, FLT_WIDTHS, INT_WIDTHS};
pub use obj::{field_order, AryType, Field, Fields, StructType, DISPLAY_FIELD};

use crate::bits::{Bits, BitsKind, BitsTable};
use crate::error::{AnalysisError, Result};
use fnv::{FnvBuildHasher, FnvHashMap};
use indexmap::IndexSet;
use smallvec::SmallVec;

/// Handle to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ty(u32);

impl Ty {
    pub const ALL: Ty = Ty(0);
    pub const ANY: Ty = Ty(1);
    pub const CTRL: Ty = Ty(2);
    pub const XCTRL: Ty = Ty(3);
    pub const SCALAR: Ty = Ty(4);
    pub const XSCALAR: Ty = Ty(5);
    pub const USED: Ty = Ty(6);
    pub const UNUSED: Ty = Ty(7);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub type Tys = SmallVec<[Ty; 4]>;

/// Formal argument count carried by a function pointer: a flat lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Accepts any count.
    Any,
    N(u32),
    /// Conflicting counts.
    All,
}

impl Arity {
    pub fn meet(self, other: Self) -> Self {
        match (self, other) {
            (Arity::Any, x) | (x, Arity::Any) => x,
            (Arity::N(a), Arity::N(b)) if a == b => Arity::N(a),
            _ => Arity::All,
        }
    }

    pub fn dual(self) -> Self {
        match self {
            Arity::Any => Arity::All,
            Arity::All => Arity::Any,
            n => n,
        }
    }

    /// `None` marks a forward reference, which takes any shape.
    pub fn from_nargs(nargs: Option<u32>) -> Self {
        nargs.map_or(Arity::Any, Arity::N)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    All,
    Any,
    Ctrl,
    XCtrl,
    Scalar,
    XScalar,
    Int(Num<i64>),
    Flt(Num<FltCon>),
    MemPtr { aliases: Bits, obj: Ty },
    FunPtr { fidxs: Bits, nargs: Arity, disp: Ty },
    Rpc(Bits),
    Used,
    Unused,
    Struct(StructType),
    Ary(AryType),
    Mem(MemType),
    Tuple(Tys),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Top,
    Bottom,
    Ctrl,
    Scalar,
    Obj,
    Mem,
    Tuple(usize),
}

impl TypeKind {
    fn family(&self) -> Family {
        match self {
            TypeKind::Any => Family::Top,
            TypeKind::All => Family::Bottom,
            TypeKind::Ctrl | TypeKind::XCtrl => Family::Ctrl,
            TypeKind::Scalar
            | TypeKind::XScalar
            | TypeKind::Int(_)
            | TypeKind::Flt(_)
            | TypeKind::MemPtr { .. }
            | TypeKind::FunPtr { .. }
            | TypeKind::Rpc(_) => Family::Scalar,
            TypeKind::Used | TypeKind::Unused | TypeKind::Struct(_) | TypeKind::Ary(_) => {
                Family::Obj
            }
            TypeKind::Mem(_) => Family::Mem,
            TypeKind::Tuple(ts) => Family::Tuple(ts.len()),
        }
    }
}

/// Types used everywhere, interned at startup.
#[derive(Debug, Clone, Copy)]
struct Consts {
    all_mem: Ty,
    any_mem: Ty,
    int64: Ty,
    bool_: Ty,
    flt64: Ty,
    nil: Ty,
    all_call: Ty,
}

#[derive(Debug, Default)]
struct Pool {
    tys: Vec<Tys>,
    flds: Vec<Fields>,
    objs: Vec<MemObjs>,
}

/// Intern table, dual links, meet cache and the bit-set engine.
#[derive(Debug)]
pub struct TypeStore {
    bits: BitsTable,
    table: IndexSet<TypeKind, FnvBuildHasher>,
    duals: Vec<Ty>,
    cache: FnvHashMap<(Ty, Ty), Ty>,
    pool: Pool,
    consts: Consts,
    init_len: usize,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut ts = Self {
            bits: BitsTable::new(),
            table: IndexSet::with_hasher(FnvBuildHasher::default()),
            duals: Vec::new(),
            cache: FnvHashMap::default(),
            pool: Pool::default(),
            consts: Consts {
                all_mem: Ty::ALL,
                any_mem: Ty::ALL,
                int64: Ty::ALL,
                bool_: Ty::ALL,
                flt64: Ty::ALL,
                nil: Ty::ALL,
                all_call: Ty::ALL,
            },
            init_len: 0,
        };
        for kind in [TypeKind::All, TypeKind::Ctrl, TypeKind::Scalar, TypeKind::Used] {
            ts.intern(kind);
        }
        debug_assert_eq!(ts.kind(Ty::UNUSED), &TypeKind::Unused);
        let all_mem = ts.make_mem(Ty::USED, &[]);
        let nil_bits = ts.bits.nil(BitsKind::Alias);
        let all_rpc = ts.bits.all(BitsKind::Rpc);
        let consts = Consts {
            all_mem,
            any_mem: ts.dual(all_mem),
            int64: ts.int_width(64, false),
            bool_: ts.int_width(1, false),
            flt64: ts.flt_width(64, false),
            nil: ts.make_memptr(nil_bits, Ty::USED),
            all_call: ts.make_rpc(all_rpc),
        };
        ts.consts = consts;
        ts.init_len = ts.table.len();
        ts
    }

    /// Drop every type and bit-set created since construction.
    pub fn reset(&mut self) {
        self.table.truncate(self.init_len);
        self.duals.truncate(self.init_len);
        self.cache.clear();
        self.bits.reset();
    }

    pub fn bits(&self) -> &BitsTable {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut BitsTable {
        &mut self.bits
    }

    /// A fresh allocation site.
    pub fn new_alias(&mut self) -> Result<u32> {
        let allx = self.bits.allx(BitsKind::Alias);
        self.bits.new_id(BitsKind::Alias, allx)
    }

    /// A fresh function index.
    pub fn new_fidx(&mut self) -> Result<u32> {
        let allx = self.bits.allx(BitsKind::Fun);
        self.bits.new_id(BitsKind::Fun, allx)
    }

    /// A fresh call-site id.
    pub fn new_rpc(&mut self) -> Result<u32> {
        let allx = self.bits.allx(BitsKind::Rpc);
        self.bits.new_id(BitsKind::Rpc, allx)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn kind(&self, t: Ty) -> &TypeKind {
        &self.table[t.index()]
    }

    pub fn all_mem(&self) -> Ty {
        self.consts.all_mem
    }
    pub fn any_mem(&self) -> Ty {
        self.consts.any_mem
    }
    pub fn int64(&self) -> Ty {
        self.consts.int64
    }
    pub fn bool_ty(&self) -> Ty {
        self.consts.bool_
    }
    pub fn flt64(&self) -> Ty {
        self.consts.flt64
    }
    /// The nil pointer.
    pub fn nil(&self) -> Ty {
        self.consts.nil
    }
    /// Any call site.
    pub fn all_call(&self) -> Ty {
        self.consts.all_call
    }

    // Scratch buffers come from the pool and go back on an intern hit.
    pub(crate) fn tys_buf(&mut self) -> Tys {
        self.pool.tys.pop().unwrap_or_default()
    }
    pub(crate) fn flds_buf(&mut self) -> Fields {
        self.pool.flds.pop().unwrap_or_default()
    }
    pub(crate) fn objs_buf(&mut self) -> MemObjs {
        self.pool.objs.pop().unwrap_or_default()
    }

    fn recycle(&mut self, kind: TypeKind) {
        match kind {
            TypeKind::Tuple(mut ts) => {
                ts.clear();
                self.pool.tys.push(ts);
            }
            TypeKind::Struct(st) => {
                let mut flds = st.into_fields();
                flds.clear();
                self.pool.flds.push(flds);
            }
            TypeKind::Mem(m) => {
                let mut objs = m.into_objs();
                objs.clear();
                self.pool.objs.push(objs);
            }
            _ => {}
        }
    }

    /// Return the canonical handle for `kind`. A new entry is published
    /// together with its dual, so every interned type has a dual link.
    fn intern(&mut self, kind: TypeKind) -> Ty {
        if let Some(idx) = self.table.get_index_of(&kind) {
            self.recycle(kind);
            return Ty(idx as u32);
        }
        let dual = self.dual_kind(&kind);
        let (idx, _) = self.table.insert_full(kind);
        let this = Ty(idx as u32);
        self.duals.push(this);
        if self.table[idx] != dual {
            let (didx, _) = self.table.insert_full(dual);
            self.duals[idx] = Ty(didx as u32);
            self.duals.push(this);
        }
        this
    }

    fn dual_kind(&self, kind: &TypeKind) -> TypeKind {
        match kind {
            TypeKind::All => TypeKind::Any,
            TypeKind::Any => TypeKind::All,
            TypeKind::Ctrl => TypeKind::XCtrl,
            TypeKind::XCtrl => TypeKind::Ctrl,
            TypeKind::Scalar => TypeKind::XScalar,
            TypeKind::XScalar => TypeKind::Scalar,
            TypeKind::Used => TypeKind::Unused,
            TypeKind::Unused => TypeKind::Used,
            TypeKind::Int(n) => TypeKind::Int(n.dual()),
            TypeKind::Flt(n) => TypeKind::Flt(n.dual()),
            TypeKind::MemPtr { aliases, obj } => TypeKind::MemPtr {
                aliases: self.bits.dual(*aliases),
                obj: self.dual(*obj),
            },
            TypeKind::FunPtr { fidxs, nargs, disp } => TypeKind::FunPtr {
                fidxs: self.bits.dual(*fidxs),
                nargs: nargs.dual(),
                disp: self.dual(*disp),
            },
            TypeKind::Rpc(bits) => TypeKind::Rpc(self.bits.dual(*bits)),
            TypeKind::Struct(st) => TypeKind::Struct(StructType::from_parts(
                !st.any(),
                st.fields()
                    .iter()
                    .map(|f| Field::new(f.name.clone(), self.dual(f.ty)))
                    .collect(),
            )),
            TypeKind::Ary(a) => TypeKind::Ary(AryType {
                len: self.dual(a.len),
                elem: self.dual(a.elem),
                stor: self.dual(a.stor),
            }),
            TypeKind::Mem(m) => TypeKind::Mem(self.dual_mem(m)),
            TypeKind::Tuple(ts) => TypeKind::Tuple(ts.iter().map(|&t| self.dual(t)).collect()),
        }
    }

    pub fn dual(&self, t: Ty) -> Ty {
        self.duals[t.index()]
    }

    /// Least upper bound, through the dual.
    pub fn join(&mut self, a: Ty, b: Ty) -> Ty {
        let (da, db) = (self.dual(a), self.dual(b));
        let m = self.meet(da, db);
        self.dual(m)
    }

    /// True if `a` is at or below `b`.
    pub fn isa(&mut self, a: Ty, b: Ty) -> bool {
        self.meet(a, b) == a
    }

    pub fn above_center(&self, t: Ty) -> bool {
        match self.kind(t) {
            TypeKind::Any | TypeKind::XCtrl | TypeKind::XScalar | TypeKind::Unused => true,
            TypeKind::All | TypeKind::Ctrl | TypeKind::Scalar | TypeKind::Used => false,
            TypeKind::Int(n) => n.above_center(),
            TypeKind::Flt(n) => n.above_center(),
            TypeKind::MemPtr { aliases: bits, .. }
            | TypeKind::FunPtr { fidxs: bits, .. }
            | TypeKind::Rpc(bits) => self.bits.above_center(*bits),
            TypeKind::Struct(st) => st.any(),
            TypeKind::Ary(a) => self.above_center(a.stor),
            TypeKind::Mem(m) => self.above_center(m.dflt()),
            TypeKind::Tuple(ts) => !ts.is_empty() && ts.iter().all(|&t| self.above_center(t)),
        }
    }

    pub fn is_scalar(&self, t: Ty) -> bool {
        self.kind(t).family() == Family::Scalar
    }

    pub fn is_obj(&self, t: Ty) -> bool {
        self.kind(t).family() == Family::Obj
    }

    /// Clamp into the scalar family: `ANY` to `~Scalar`, anything else
    /// outside the family to `Scalar`. Monotone.
    pub fn to_scalar(&self, t: Ty) -> Ty {
        if self.is_scalar(t) {
            t
        } else if t == Ty::ANY {
            Ty::XSCALAR
        } else {
            Ty::SCALAR
        }
    }

    /// Clamp into the object family, like [`TypeStore::to_scalar`].
    pub fn to_obj(&self, t: Ty) -> Ty {
        if self.is_obj(t) {
            t
        } else if t == Ty::ANY {
            Ty::UNUSED
        } else {
            Ty::USED
        }
    }

    pub fn meet(&mut self, a: Ty, b: Ty) -> Ty {
        if a == b {
            return a;
        }
        if a == Ty::ALL || b == Ty::ALL {
            return Ty::ALL;
        }
        if a == Ty::ANY {
            return b;
        }
        if b == Ty::ANY {
            return a;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&t) = self.cache.get(&key) {
            return t;
        }
        let t = self.xmeet(key.0, key.1);
        self.cache.insert(key, t);
        t
    }

    fn xmeet(&mut self, a: Ty, b: Ty) -> Ty {
        let (ka, kb) = (self.kind(a).clone(), self.kind(b).clone());
        if ka.family() != kb.family() {
            return Ty::ALL;
        }
        match (ka, kb) {
            (TypeKind::Ctrl, _) | (_, TypeKind::Ctrl) => Ty::CTRL,
            (TypeKind::Scalar, _) | (_, TypeKind::Scalar) => Ty::SCALAR,
            (TypeKind::XScalar, _) => b,
            (_, TypeKind::XScalar) => a,
            (TypeKind::Int(x), TypeKind::Int(y)) => self.intern(TypeKind::Int(x.meet(y))),
            (TypeKind::Flt(x), TypeKind::Flt(y)) => self.intern(TypeKind::Flt(x.meet(y))),
            (
                TypeKind::MemPtr { aliases: a0, obj: o0 },
                TypeKind::MemPtr { aliases: a1, obj: o1 },
            ) => {
                let aliases = self.bits.meet(a0, a1);
                let obj = self.meet(o0, o1);
                self.intern(TypeKind::MemPtr { aliases, obj })
            }
            (
                TypeKind::FunPtr { fidxs: f0, nargs: n0, disp: d0 },
                TypeKind::FunPtr { fidxs: f1, nargs: n1, disp: d1 },
            ) => {
                let fidxs = self.bits.meet(f0, f1);
                let disp = self.meet(d0, d1);
                self.intern(TypeKind::FunPtr {
                    fidxs,
                    nargs: n0.meet(n1),
                    disp,
                })
            }
            (TypeKind::Rpc(x), TypeKind::Rpc(y)) => {
                let bits = self.bits.meet(x, y);
                self.intern(TypeKind::Rpc(bits))
            }
            // Scalar sub-kinds that differ
            (TypeKind::Int(_) | TypeKind::Flt(_) | TypeKind::MemPtr { .. }, _)
            | (TypeKind::FunPtr { .. } | TypeKind::Rpc(_), _) => Ty::SCALAR,
            (TypeKind::Used, _) | (_, TypeKind::Used) => Ty::USED,
            (TypeKind::Unused, _) => b,
            (_, TypeKind::Unused) => a,
            (TypeKind::Struct(x), TypeKind::Struct(y)) => self.meet_struct(&x, &y),
            (TypeKind::Ary(x), TypeKind::Ary(y)) => {
                let len = self.meet(x.len, y.len);
                let elem = self.meet(x.elem, y.elem);
                let stor = self.meet(x.stor, y.stor);
                self.intern(TypeKind::Ary(AryType { len, elem, stor }))
            }
            (TypeKind::Struct(_) | TypeKind::Ary(_), _) => Ty::USED,
            (TypeKind::Mem(x), TypeKind::Mem(y)) => self.meet_mem(&x, &y),
            (TypeKind::Tuple(x), TypeKind::Tuple(y)) => {
                let mut ts = self.tys_buf();
                for (&p, &q) in x.iter().zip(y.iter()) {
                    let t = self.meet(p, q);
                    ts.push(t);
                }
                self.intern(TypeKind::Tuple(ts))
            }
            // Families matched above; anything left is a bug in `family`.
            _ => Ty::ALL,
        }
    }

    fn meet_struct(&mut self, a: &StructType, b: &StructType) -> Ty {
        let any = a.any() && b.any();
        let mut names: SmallVec<[&str; 8]> = a
            .fields()
            .iter()
            .chain(b.fields())
            .map(|f| f.name.as_str())
            .collect();
        names.sort_by(|x, y| field_order(x, y));
        names.dedup();
        let mut flds = self.flds_buf();
        for name in names {
            let t = self.meet(a.get(name), b.get(name));
            flds.push(Field::new(name, t));
        }
        self.finish_struct(any, flds)
    }

    fn finish_struct(&mut self, any: bool, flds: Fields) -> Ty {
        let mut st = StructType::from_parts(any, flds);
        st.canonicalize();
        self.intern(TypeKind::Struct(st))
    }

    // ---- constructors ----

    pub fn make_int(&mut self, c: i64) -> Ty {
        self.intern(TypeKind::Int(Num::Con(c)))
    }

    /// An integer width class; `above` picks the optimistic side.
    pub fn int_width(&mut self, width: u8, above: bool) -> Ty {
        let w = INT_WIDTHS.iter().copied().find(|&w| w >= width).unwrap_or(64);
        self.intern(TypeKind::Int(if above { Num::High(w) } else { Num::Low(w) }))
    }

    pub fn make_flt(&mut self, f: f64) -> Ty {
        self.intern(TypeKind::Flt(Num::Con(FltCon::new(f))))
    }

    pub fn flt_width(&mut self, width: u8, above: bool) -> Ty {
        let w = FLT_WIDTHS.iter().copied().find(|&w| w >= width).unwrap_or(64);
        self.intern(TypeKind::Flt(if above { Num::High(w) } else { Num::Low(w) }))
    }

    pub fn make_memptr(&mut self, aliases: Bits, obj: Ty) -> Ty {
        self.intern(TypeKind::MemPtr { aliases, obj })
    }

    pub fn make_funptr(&mut self, fidxs: Bits, nargs: Arity, disp: Ty) -> Ty {
        self.intern(TypeKind::FunPtr { fidxs, nargs, disp })
    }

    pub fn make_rpc(&mut self, bits: Bits) -> Ty {
        self.intern(TypeKind::Rpc(bits))
    }

    pub fn make_struct(&mut self, any: bool, fields: &[(&str, Ty)]) -> Ty {
        let mut flds = self.flds_buf();
        flds.extend(fields.iter().map(|&(name, ty)| Field::new(name, ty)));
        self.finish_struct(any, flds)
    }

    /// Intern a struct assembled with the [`StructType`] field helpers.
    pub fn make_struct_from(&mut self, st: StructType) -> Ty {
        let any = st.any();
        self.finish_struct(any, st.into_fields())
    }

    pub fn make_ary(&mut self, len: Ty, elem: Ty, stor: Ty) -> Ty {
        self.intern(TypeKind::Ary(AryType { len, elem, stor }))
    }

    pub fn make_tuple(&mut self, elems: &[Ty]) -> Ty {
        let mut ts = self.tys_buf();
        ts.extend_from_slice(elems);
        self.intern(TypeKind::Tuple(ts))
    }

    // ---- accessors ----

    pub fn as_struct(&self, t: Ty) -> Option<&StructType> {
        match self.kind(t) {
            TypeKind::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn as_ary(&self, t: Ty) -> Option<AryType> {
        match self.kind(t) {
            TypeKind::Ary(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_tuple(&self, t: Ty) -> Option<&[Ty]> {
        match self.kind(t) {
            TypeKind::Tuple(ts) => Some(ts),
            _ => None,
        }
    }

    /// `(fidxs, nargs, display)` of a function pointer.
    pub fn as_funptr(&self, t: Ty) -> Option<(Bits, Arity, Ty)> {
        match self.kind(t) {
            TypeKind::FunPtr { fidxs, nargs, disp } => Some((*fidxs, *nargs, *disp)),
            _ => None,
        }
    }

    /// `(aliases, obj)` of a memory pointer.
    pub fn as_memptr(&self, t: Ty) -> Option<(Bits, Ty)> {
        match self.kind(t) {
            TypeKind::MemPtr { aliases, obj } => Some((*aliases, *obj)),
            _ => None,
        }
    }

    /// Element load; arrays are not index-sensitive.
    pub fn ary_ld(&self, ary: Ty, _idx: Ty) -> Ty {
        match self.kind(ary) {
            TypeKind::Ary(a) => a.elem,
            _ if self.above_center(ary) => Ty::ANY,
            _ => Ty::ALL,
        }
    }

    /// Element store into an array type. Not supported by this lattice.
    pub fn ary_update(&mut self, _ary: Ty, _idx: Ty, _val: Ty) -> Result<Ty> {
        Err(AnalysisError::Unimplemented("array update"))
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_constants() {
        let ts = TypeStore::new();
        assert_eq!(ts.kind(Ty::ALL), &TypeKind::All);
        assert_eq!(ts.kind(Ty::ANY), &TypeKind::Any);
        assert_eq!(ts.kind(Ty::XCTRL), &TypeKind::XCtrl);
        assert_eq!(ts.kind(Ty::XSCALAR), &TypeKind::XScalar);
        assert_eq!(ts.dual(Ty::USED), Ty::UNUSED);
        assert_eq!(ts.dual(ts.all_mem()), ts.any_mem());
    }

    #[test]
    fn test_interning_reuses_handles() {
        let mut ts = TypeStore::new();
        let a = ts.make_tuple(&[Ty::CTRL, Ty::SCALAR]);
        let len = ts.len();
        let b = ts.make_tuple(&[Ty::CTRL, Ty::SCALAR]);
        assert_eq!(a, b);
        assert_eq!(ts.len(), len);
        assert!(!ts.pool.tys.is_empty());
    }

    #[test]
    fn test_family_mismatch_falls_to_all() {
        let mut ts = TypeStore::new();
        let int = ts.int64();
        assert_eq!(ts.meet(Ty::CTRL, int), Ty::ALL);
        let ary = ts.make_ary(int, int, Ty::USED);
        let fun = ts.bits().all(BitsKind::Fun);
        let fptr = ts.make_funptr(fun, Arity::N(1), Ty::SCALAR);
        assert_eq!(ts.meet(ary, fptr), Ty::ALL);
        let pair = ts.make_tuple(&[Ty::CTRL, Ty::CTRL]);
        let one = ts.make_tuple(&[Ty::CTRL]);
        assert_eq!(ts.meet(pair, one), Ty::ALL);
    }

    #[test]
    fn test_scalar_sub_kinds() {
        let mut ts = TypeStore::new();
        let i = ts.make_int(3);
        let f = ts.make_flt(1.5);
        assert_eq!(ts.meet(i, f), Ty::SCALAR);
        assert_eq!(ts.meet(i, Ty::XSCALAR), i);
        let nil = ts.nil();
        assert_eq!(ts.meet(nil, Ty::SCALAR), Ty::SCALAR);
    }

    #[test]
    fn test_struct_meet_pointwise() {
        let mut ts = TypeStore::new();
        let (one, two) = (ts.make_int(1), ts.make_int(2));
        let lo_x = ts.make_struct(false, &[("x", one)]);
        let lo_xy = ts.make_struct(false, &[("x", two), ("y", one)]);
        let m = ts.meet(lo_x, lo_xy);
        let st = ts.as_struct(m).unwrap();
        assert_eq!(st.fields().len(), 1);
        assert_eq!(ts.str(st.get("x")), "int8");

        let hi_x = ts.make_struct(true, &[("x", one)]);
        let hi_y = ts.make_struct(true, &[("y", two)]);
        let m = ts.meet(hi_x, hi_y);
        let st = ts.as_struct(m).unwrap();
        assert!(st.any());
        assert_eq!(st.find("x"), Some(one));
        assert_eq!(st.find("y"), Some(two));

        let m = ts.meet(hi_y, lo_x);
        let st = ts.as_struct(m).unwrap();
        assert!(!st.any());
        assert_eq!(st.find("x"), Some(one));
        assert_eq!(st.find("y"), None);
    }

    #[test]
    fn test_struct_dual() {
        let mut ts = TypeStore::new();
        let int = ts.int64();
        let lo = ts.make_struct(false, &[("x", int)]);
        let hi = ts.dual(lo);
        let st = ts.as_struct(hi).unwrap();
        assert!(st.any());
        assert_eq!(st.find("x"), Some(ts.dual(int)));
        assert!(ts.above_center(hi));
    }

    #[test]
    fn test_array_meet_keeps_storage() {
        let mut ts = TypeStore::new();
        let int8 = ts.int_width(8, false);
        let len = ts.int64();
        let a = ts.make_ary(len, int8, Ty::USED);
        let b = ts.make_ary(len, Ty::SCALAR, Ty::USED);
        let m = ts.meet(a, b);
        let ary = ts.as_ary(m).unwrap();
        assert_eq!(ary.elem, Ty::SCALAR);
        assert_eq!(ary.stor, Ty::USED);
        assert_eq!(ts.ary_ld(m, len), Ty::SCALAR);
    }

    #[test]
    fn test_array_update_unimplemented() {
        let mut ts = TypeStore::new();
        let len = ts.int64();
        let a = ts.make_ary(len, len, Ty::USED);
        let err = ts.ary_update(a, len, len).unwrap_err();
        assert!(matches!(err, AnalysisError::Unimplemented(_)));
    }

    #[test]
    fn test_funptr_field_wise() {
        let mut ts = TypeStore::new();
        let f1 = ts.new_fidx().unwrap();
        let f2 = ts.new_fidx().unwrap();
        let b1 = ts.bits_mut().make(BitsKind::Fun, f1);
        let b2 = ts.bits_mut().make(BitsKind::Fun, f2);
        let nil = ts.nil();
        let p1 = ts.make_funptr(b1, Arity::N(1), nil);
        let p2 = ts.make_funptr(b2, Arity::N(2), nil);
        let m = ts.meet(p1, p2);
        let (fidxs, nargs, disp) = ts.as_funptr(m).unwrap();
        assert!(ts.bits().test(fidxs, f1) && ts.bits().test(fidxs, f2));
        assert_eq!(nargs, Arity::All);
        assert_eq!(disp, nil);
    }

    #[test]
    fn test_meet_cache_is_symmetric() {
        let mut ts = TypeStore::new();
        let (a, b) = (ts.make_int(5), ts.make_flt(2.0));
        let m1 = ts.meet(a, b);
        let cached = ts.cache.len();
        let m2 = ts.meet(b, a);
        assert_eq!(m1, m2);
        assert_eq!(ts.cache.len(), cached);
    }

    #[test]
    fn test_reset_truncates() {
        let mut ts = TypeStore::new();
        let before = ts.len();
        ts.make_int(42);
        ts.new_alias().unwrap();
        ts.reset();
        assert_eq!(ts.len(), before);
        assert_eq!(ts.new_alias().unwrap(), 2);
    }
}
