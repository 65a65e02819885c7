//! Generated types for property tests
//!
//! [`TypeSpec`] describes a type independently of any store and
//! [`TypeSpec::build`] interns it into a [`TypeCtx`]. The same description
//! is drawn by QuickCheck ([`Arbitrary`]) and by proptest ([`strategy`]), so
//! every crate checks the lattice on one shared set of shapes.

use crate::bits::BitsKind;
use crate::types::{Arity, Ty, TypeStore};
use proptest::prelude::*;
use quickcheck::{Arbitrary, Gen};

const FIELDS: [&str; 3] = ["^", "x", "y"];
const INT_WIDTHS: [u8; 5] = [1, 8, 16, 32, 64];
const FLT_WIDTHS: [u8; 2] = [32, 64];
pub const MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Any,
    All,
    Ctrl { high: bool },
    Scalar { high: bool },
    Int(i64),
    IntWidth { width: u8, high: bool },
    Flt(i8),
    FltWidth { width: u8, high: bool },
    MemPtr { aliases: Vec<usize>, nil: bool, high: bool, used: bool },
    FunPtr { fidxs: Vec<usize>, high: bool, nargs: Option<u8> },
    Rpc { rpcs: Vec<usize>, high: bool },
    Obj { high: bool },
    Struct { any: bool, fields: Vec<(usize, TypeSpec)> },
    Ary { len: u8, high: bool, elem: Box<TypeSpec> },
    Mem { high: bool, objs: Vec<(usize, TypeSpec)> },
    Tuple(Vec<TypeSpec>),
}

/// A type store with a few alias classes, function indices and return
/// points to draw from, each with one split so parent/child sets show up.
pub struct TypeCtx {
    pub types: TypeStore,
    aliases: Vec<u32>,
    fidxs: Vec<u32>,
    rpcs: Vec<u32>,
}

impl TypeCtx {
    pub const ALIASES: usize = 5;
    pub const FIDXS: usize = 3;
    pub const RPCS: usize = 3;

    pub fn new() -> Self {
        let mut types = TypeStore::new();
        let mut aliases = Vec::with_capacity(Self::ALIASES);
        let mut fidxs = Vec::with_capacity(Self::FIDXS);
        let mut rpcs = Vec::with_capacity(Self::RPCS);
        // Fresh ids in a fresh store cannot run out
        for _ in 0..3 {
            aliases.extend(types.new_alias());
        }
        if let Some(&a) = aliases.first() {
            if let Ok((b, c)) = types.bits_mut().split(BitsKind::Alias, a) {
                aliases.extend([b, c]);
            }
        }
        for _ in 0..2 {
            fidxs.extend(types.new_fidx());
            rpcs.extend(types.new_rpc());
        }
        if let Some(&f) = fidxs.first() {
            if let Ok((g, _)) = types.bits_mut().split(BitsKind::Fun, f) {
                fidxs.push(g);
            }
        }
        if let Some(&r) = rpcs.first() {
            if let Ok((k, _)) = types.bits_mut().split(BitsKind::Rpc, r) {
                rpcs.push(k);
            }
        }
        Self {
            types,
            aliases,
            fidxs,
            rpcs,
        }
    }

    fn alias(&self, i: usize) -> u32 {
        self.aliases[i % self.aliases.len()]
    }

    fn fidx(&self, i: usize) -> u32 {
        self.fidxs[i % self.fidxs.len()]
    }

    fn rpc(&self, i: usize) -> u32 {
        self.rpcs[i % self.rpcs.len()]
    }
}

impl Default for TypeCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSpec {
    /// Names of every variant, in declaration order.
    pub const VARIANTS: [&'static str; 16] = [
        "Any", "All", "Ctrl", "Scalar", "Int", "IntWidth", "Flt", "FltWidth", "MemPtr", "FunPtr",
        "Rpc", "Obj", "Struct", "Ary", "Mem", "Tuple",
    ];

    pub fn variant(&self) -> &'static str {
        match self {
            TypeSpec::Any => "Any",
            TypeSpec::All => "All",
            TypeSpec::Ctrl { .. } => "Ctrl",
            TypeSpec::Scalar { .. } => "Scalar",
            TypeSpec::Int(_) => "Int",
            TypeSpec::IntWidth { .. } => "IntWidth",
            TypeSpec::Flt(_) => "Flt",
            TypeSpec::FltWidth { .. } => "FltWidth",
            TypeSpec::MemPtr { .. } => "MemPtr",
            TypeSpec::FunPtr { .. } => "FunPtr",
            TypeSpec::Rpc { .. } => "Rpc",
            TypeSpec::Obj { .. } => "Obj",
            TypeSpec::Struct { .. } => "Struct",
            TypeSpec::Ary { .. } => "Ary",
            TypeSpec::Mem { .. } => "Mem",
            TypeSpec::Tuple(_) => "Tuple",
        }
    }

    /// Direct children of a composite.
    pub fn children(&self) -> Vec<&TypeSpec> {
        match self {
            TypeSpec::Struct { fields, .. } => fields.iter().map(|(_, f)| f).collect(),
            TypeSpec::Mem { objs, .. } => objs.iter().map(|(_, o)| o).collect(),
            TypeSpec::Ary { elem, .. } => vec![elem.as_ref()],
            TypeSpec::Tuple(elems) => elems.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Nesting depth; leaves are 0.
    pub fn depth(&self) -> usize {
        match self {
            TypeSpec::Struct { .. } | TypeSpec::Ary { .. } | TypeSpec::Mem { .. } | TypeSpec::Tuple(_) => {
                1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn build(&self, cx: &mut TypeCtx) -> Ty {
        match self {
            TypeSpec::Any => Ty::ANY,
            TypeSpec::All => Ty::ALL,
            TypeSpec::Ctrl { high: true } => Ty::XCTRL,
            TypeSpec::Ctrl { high: false } => Ty::CTRL,
            TypeSpec::Scalar { high: true } => Ty::XSCALAR,
            TypeSpec::Scalar { high: false } => Ty::SCALAR,
            TypeSpec::Int(c) => cx.types.make_int(*c),
            TypeSpec::IntWidth { width, high } => cx.types.int_width(*width, *high),
            TypeSpec::Flt(f) => cx.types.make_flt(f64::from(*f)),
            TypeSpec::FltWidth { width, high } => cx.types.flt_width(*width, *high),
            TypeSpec::MemPtr {
                aliases,
                nil,
                high,
                used,
            } => {
                let mut ids: Vec<u32> = aliases.iter().map(|&i| cx.alias(i)).collect();
                if *nil {
                    ids.push(0);
                }
                let bits = cx.types.bits_mut().make_set(BitsKind::Alias, *high, &ids);
                let obj = if *used { Ty::USED } else { Ty::UNUSED };
                cx.types.make_memptr(bits, obj)
            }
            TypeSpec::FunPtr { fidxs, high, nargs } => {
                let ids: Vec<u32> = fidxs.iter().map(|&i| cx.fidx(i)).collect();
                let bits = cx.types.bits_mut().make_set(BitsKind::Fun, *high, &ids);
                let arity = match nargs {
                    None if *high => Arity::Any,
                    None => Arity::All,
                    Some(n) => Arity::N(u32::from(*n)),
                };
                cx.types.make_funptr(bits, arity, Ty::XSCALAR)
            }
            TypeSpec::Rpc { rpcs, high } => {
                let ids: Vec<u32> = rpcs.iter().map(|&i| cx.rpc(i)).collect();
                let bits = cx.types.bits_mut().make_set(BitsKind::Rpc, *high, &ids);
                cx.types.make_rpc(bits)
            }
            TypeSpec::Obj { high: true } => Ty::UNUSED,
            TypeSpec::Obj { high: false } => Ty::USED,
            TypeSpec::Struct { any, fields } => {
                let mut flds = Vec::with_capacity(fields.len());
                for (i, f) in fields {
                    let t = f.build(cx);
                    flds.push((FIELDS[i % FIELDS.len()], t));
                }
                cx.types.make_struct(*any, &flds)
            }
            TypeSpec::Ary { len, high, elem } => {
                let len = cx.types.make_int(i64::from(*len));
                let elem = elem.build(cx);
                let elem = cx.types.to_scalar(elem);
                let stor = if *high { Ty::UNUSED } else { Ty::USED };
                cx.types.make_ary(len, elem, stor)
            }
            TypeSpec::Mem { high, objs } => {
                let mut entries = Vec::with_capacity(objs.len());
                for (i, o) in objs {
                    let t = o.build(cx);
                    entries.push((cx.alias(*i), cx.types.to_obj(t)));
                }
                let dflt = if *high { Ty::UNUSED } else { Ty::USED };
                cx.types.make_mem(dflt, &entries)
            }
            TypeSpec::Tuple(elems) => {
                let tys: Vec<Ty> = elems.iter().map(|e| e.build(cx)).collect();
                cx.types.make_tuple(&tys)
            }
        }
    }
}

// ---- QuickCheck ----

fn small_ids(g: &mut Gen, bound: usize) -> Vec<usize> {
    let len = usize::arbitrary(g) % 3;
    (0..len).map(|_| usize::arbitrary(g) % bound).collect()
}

fn qc_leaf(g: &mut Gen) -> TypeSpec {
    match u8::arbitrary(g) % 12 {
        0 => TypeSpec::Any,
        1 => TypeSpec::All,
        2 => TypeSpec::Ctrl {
            high: bool::arbitrary(g),
        },
        3 => TypeSpec::Scalar {
            high: bool::arbitrary(g),
        },
        4 => TypeSpec::Int(i64::from(i16::arbitrary(g))),
        5 => TypeSpec::IntWidth {
            width: *g.choose(&INT_WIDTHS).unwrap_or(&64),
            high: bool::arbitrary(g),
        },
        6 => TypeSpec::Flt(i8::arbitrary(g) % 8),
        7 => TypeSpec::FltWidth {
            width: *g.choose(&FLT_WIDTHS).unwrap_or(&64),
            high: bool::arbitrary(g),
        },
        8 => TypeSpec::MemPtr {
            aliases: small_ids(g, TypeCtx::ALIASES),
            nil: bool::arbitrary(g),
            high: bool::arbitrary(g),
            used: bool::arbitrary(g),
        },
        9 => TypeSpec::FunPtr {
            fidxs: small_ids(g, TypeCtx::FIDXS),
            high: bool::arbitrary(g),
            nargs: Option::<u8>::arbitrary(g).map(|n| n % 3),
        },
        10 => TypeSpec::Rpc {
            rpcs: small_ids(g, TypeCtx::RPCS),
            high: bool::arbitrary(g),
        },
        _ => TypeSpec::Obj {
            high: bool::arbitrary(g),
        },
    }
}

fn qc_gen(g: &mut Gen, depth: usize) -> TypeSpec {
    if depth >= MAX_DEPTH || u8::arbitrary(g) % 3 != 0 {
        return qc_leaf(g);
    }
    let len = usize::arbitrary(g) % 3;
    match u8::arbitrary(g) % 4 {
        0 => TypeSpec::Struct {
            any: bool::arbitrary(g),
            fields: (0..len)
                .map(|_| (usize::arbitrary(g) % FIELDS.len(), qc_gen(g, depth + 1)))
                .collect(),
        },
        1 => TypeSpec::Ary {
            len: u8::arbitrary(g) % 8,
            high: bool::arbitrary(g),
            elem: Box::new(qc_gen(g, depth + 1)),
        },
        2 => TypeSpec::Mem {
            high: bool::arbitrary(g),
            objs: (0..len)
                .map(|_| (usize::arbitrary(g) % TypeCtx::ALIASES, qc_gen(g, depth + 1)))
                .collect(),
        },
        _ => TypeSpec::Tuple((0..=len).map(|_| qc_gen(g, depth + 1)).collect()),
    }
}

impl Arbitrary for TypeSpec {
    fn arbitrary(g: &mut Gen) -> Self {
        qc_gen(g, 0)
    }

    /// Shrink toward the children of a composite, then toward `ANY`.
    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let mut out: Vec<TypeSpec> = self.children().into_iter().cloned().collect();
        match self {
            TypeSpec::MemPtr {
                aliases,
                nil,
                high,
                used,
            } if !aliases.is_empty() => out.push(TypeSpec::MemPtr {
                aliases: aliases[1..].to_vec(),
                nil: *nil,
                high: *high,
                used: *used,
            }),
            TypeSpec::Rpc { rpcs, high } if !rpcs.is_empty() => out.push(TypeSpec::Rpc {
                rpcs: rpcs[1..].to_vec(),
                high: *high,
            }),
            _ => {}
        }
        if *self != TypeSpec::Any {
            out.push(TypeSpec::Any);
        }
        Box::new(out.into_iter())
    }
}

// ---- proptest ----

fn pt_scalar_leaf() -> impl Strategy<Value = TypeSpec> {
    prop_oneof![
        any::<bool>().prop_map(|high| TypeSpec::Scalar { high }),
        (-3i64..300).prop_map(TypeSpec::Int),
        (prop::sample::select(INT_WIDTHS.to_vec()), any::<bool>())
            .prop_map(|(width, high)| TypeSpec::IntWidth { width, high }),
        (-4i8..4).prop_map(TypeSpec::Flt),
        (prop::sample::select(FLT_WIDTHS.to_vec()), any::<bool>())
            .prop_map(|(width, high)| TypeSpec::FltWidth { width, high }),
        (
            prop::collection::vec(0..TypeCtx::ALIASES, 0..3),
            any::<bool>(),
            any::<bool>(),
            any::<bool>()
        )
            .prop_map(|(aliases, nil, high, used)| TypeSpec::MemPtr {
                aliases,
                nil,
                high,
                used
            }),
        (
            prop::collection::vec(0..TypeCtx::FIDXS, 0..3),
            any::<bool>(),
            prop::option::of(0u8..3)
        )
            .prop_map(|(fidxs, high, nargs)| TypeSpec::FunPtr { fidxs, high, nargs }),
        (prop::collection::vec(0..TypeCtx::RPCS, 0..3), any::<bool>())
            .prop_map(|(rpcs, high)| TypeSpec::Rpc { rpcs, high }),
    ]
}

fn pt_leaf() -> impl Strategy<Value = TypeSpec> {
    prop_oneof![
        1 => Just(TypeSpec::Any),
        1 => Just(TypeSpec::All),
        1 => any::<bool>().prop_map(|high| TypeSpec::Ctrl { high }),
        1 => any::<bool>().prop_map(|high| TypeSpec::Obj { high }),
        8 => pt_scalar_leaf(),
    ]
}

/// The proptest strategy for [`TypeSpec`], nesting at most [`MAX_DEPTH`].
pub fn strategy() -> impl Strategy<Value = TypeSpec> {
    pt_leaf().prop_recursive(MAX_DEPTH as u32, 24, 3, |inner| {
        prop_oneof![
            (
                any::<bool>(),
                prop::collection::vec((0..FIELDS.len(), inner.clone()), 0..3)
            )
                .prop_map(|(any, fields)| TypeSpec::Struct { any, fields }),
            (0u8..8, any::<bool>(), inner.clone()).prop_map(|(len, high, elem)| TypeSpec::Ary {
                len,
                high,
                elem: Box::new(elem)
            }),
            (
                any::<bool>(),
                prop::collection::vec((0..TypeCtx::ALIASES, inner.clone()), 0..3)
            )
                .prop_map(|(high, objs)| TypeSpec::Mem { high, objs }),
            prop::collection::vec(inner, 1..3).prop_map(TypeSpec::Tuple),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;
    use std::collections::BTreeSet;

    fn collect_variants(s: &TypeSpec, seen: &mut BTreeSet<&'static str>) {
        seen.insert(s.variant());
        for c in s.children() {
            collect_variants(c, seen);
        }
    }

    fn all_variants() -> BTreeSet<&'static str> {
        TypeSpec::VARIANTS.into_iter().collect()
    }

    #[test]
    fn test_ctx_has_split_ids() {
        let cx = TypeCtx::new();
        assert_eq!(cx.aliases.len(), TypeCtx::ALIASES);
        assert_eq!(cx.fidxs.len(), TypeCtx::FIDXS);
        assert_eq!(cx.rpcs.len(), TypeCtx::RPCS);
        let tree = cx.types.bits().tree(BitsKind::Alias);
        assert!(tree.is_parent(cx.aliases[0], cx.aliases[3]));
        let tree = cx.types.bits().tree(BitsKind::Rpc);
        assert!(tree.is_parent(cx.rpcs[0], cx.rpcs[2]));
    }

    #[test]
    fn test_build_is_interned() {
        let mut cx = TypeCtx::new();
        let spec = TypeSpec::Struct {
            any: false,
            fields: vec![(1, TypeSpec::Int(3)), (2, TypeSpec::Scalar { high: false })],
        };
        assert_eq!(spec.build(&mut cx), spec.build(&mut cx));
    }

    #[test]
    fn test_build_new_kinds() {
        let mut cx = TypeCtx::new();
        let ary = TypeSpec::Ary {
            len: 3,
            high: false,
            elem: Box::new(TypeSpec::IntWidth {
                width: 8,
                high: false,
            }),
        }
        .build(&mut cx);
        assert_eq!(cx.types.str(ary), "[3]int8");
        let f32 = TypeSpec::FltWidth {
            width: 32,
            high: false,
        }
        .build(&mut cx);
        assert!(!cx.types.above_center(f32));
        let rpc = TypeSpec::Rpc {
            rpcs: vec![0],
            high: false,
        }
        .build(&mut cx);
        assert_eq!(cx.types.meet(rpc, f32), Ty::SCALAR);
    }

    #[test]
    fn test_variant_names_match() {
        assert_eq!(all_variants().len(), TypeSpec::VARIANTS.len());
        assert_eq!(TypeSpec::Rpc { rpcs: vec![], high: true }.variant(), "Rpc");
        assert_eq!(TypeSpec::Tuple(vec![]).variant(), "Tuple");
    }

    #[test]
    fn test_quickcheck_covers_every_variant() {
        let mut g = Gen::new(20);
        let mut seen = BTreeSet::new();
        for _ in 0..3000 {
            let s = TypeSpec::arbitrary(&mut g);
            assert!(s.depth() <= MAX_DEPTH);
            collect_variants(&s, &mut seen);
        }
        assert_eq!(seen, all_variants());
    }

    #[test]
    fn test_proptest_covers_every_variant() {
        let mut runner = TestRunner::deterministic();
        let strat = strategy();
        let mut seen = BTreeSet::new();
        for _ in 0..3000 {
            let s = strat.new_tree(&mut runner).unwrap().current();
            collect_variants(&s, &mut seen);
        }
        assert_eq!(seen, all_variants());
    }

    #[test]
    fn test_shrink_reaches_any() {
        let spec = TypeSpec::Tuple(vec![TypeSpec::Int(1), TypeSpec::All]);
        let shrunk: Vec<TypeSpec> = spec.shrink().collect();
        assert!(shrunk.contains(&TypeSpec::Int(1)));
        assert!(shrunk.contains(&TypeSpec::Any));
        assert_eq!(TypeSpec::Any.shrink().count(), 0);
    }

    proptest! {
        #[test]
        fn test_dual_is_involution(a in strategy()) {
            let mut cx = TypeCtx::new();
            let x = a.build(&mut cx);
            prop_assert_eq!(cx.types.dual(cx.types.dual(x)), x);
        }

        #[test]
        fn test_meet_extremes(a in strategy()) {
            let mut cx = TypeCtx::new();
            let x = a.build(&mut cx);
            prop_assert_eq!(cx.types.meet(x, Ty::ALL), Ty::ALL);
            prop_assert_eq!(cx.types.meet(x, Ty::ANY), x);
            prop_assert_eq!(cx.types.meet(x, x), x);
        }

        #[test]
        fn test_meet_commutes(a in strategy(), b in strategy()) {
            let mut cx = TypeCtx::new();
            let (x, y) = (a.build(&mut cx), b.build(&mut cx));
            let xy = cx.types.meet(x, y);
            let yx = cx.types.meet(y, x);
            prop_assert_eq!(xy, yx);
        }

        #[test]
        fn test_meet_associates(a in strategy(), b in strategy(), c in strategy()) {
            let mut cx = TypeCtx::new();
            let (x, y, z) = (a.build(&mut cx), b.build(&mut cx), c.build(&mut cx));
            let yz = cx.types.meet(y, z);
            let left = cx.types.meet(x, yz);
            let xy = cx.types.meet(x, y);
            let right = cx.types.meet(xy, z);
            prop_assert_eq!(
                left,
                right,
                "{} / {} / {}",
                cx.types.str(x),
                cx.types.str(y),
                cx.types.str(z)
            );
        }

        #[test]
        fn test_dual_reverses_order(a in strategy(), b in strategy()) {
            let mut cx = TypeCtx::new();
            let (x, y) = (a.build(&mut cx), b.build(&mut cx));
            let m = cx.types.meet(x, y);
            let (dx, dm) = (cx.types.dual(x), cx.types.dual(m));
            prop_assert_eq!(cx.types.meet(dx, dm), dx);
        }

        #[test]
        fn test_absorption(a in strategy(), b in strategy()) {
            let mut cx = TypeCtx::new();
            let (x, y) = (a.build(&mut cx), b.build(&mut cx));
            let j = cx.types.join(x, y);
            prop_assert_eq!(cx.types.meet(x, j), x, "{} / {}", cx.types.str(x), cx.types.str(y));
        }
    }
}
