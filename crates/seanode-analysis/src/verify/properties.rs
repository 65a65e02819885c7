//! Lattice laws
//!
//! Each law takes the interned inputs and reports whether it held. Inputs
//! are built in one shared [`TypeCtx`], so handles compare by identity.

use super::TypeCtx;
use seanode_core::prelude::*;

pub struct LatticeLaw {
    pub name: &'static str,
    pub description: &'static str,
    /// Number of generated inputs.
    pub arity: usize,
    pub check: fn(&mut TypeCtx, &[Ty]) -> bool,
}

pub const LAWS: &[LatticeLaw] = &[
    LatticeLaw {
        name: "dual_involution",
        description: "dual(dual(x)) == x",
        arity: 1,
        check: dual_involution,
    },
    LatticeLaw {
        name: "meet_idempotent",
        description: "meet(x, x) == x",
        arity: 1,
        check: meet_idempotent,
    },
    LatticeLaw {
        name: "meet_extremes",
        description: "meet(x, ALL) == ALL and meet(x, ANY) == x",
        arity: 1,
        check: meet_extremes,
    },
    LatticeLaw {
        name: "meet_commutative",
        description: "meet(x, y) == meet(y, x)",
        arity: 2,
        check: meet_commutative,
    },
    LatticeLaw {
        name: "meet_associative",
        description: "meet(x, meet(y, z)) == meet(meet(x, y), z)",
        arity: 3,
        check: meet_associative,
    },
    LatticeLaw {
        name: "dual_reverses_order",
        description: "x isa y implies dual(y) isa dual(x)",
        arity: 2,
        check: dual_reverses_order,
    },
];

pub fn law(name: &str) -> Option<&'static LatticeLaw> {
    LAWS.iter().find(|l| l.name == name)
}

fn dual_involution(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    let ts = &cx.types;
    ts.dual(ts.dual(t[0])) == t[0]
}

fn meet_idempotent(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    cx.types.meet(t[0], t[0]) == t[0]
}

fn meet_extremes(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    cx.types.meet(t[0], Ty::ALL) == Ty::ALL && cx.types.meet(t[0], Ty::ANY) == t[0]
}

fn meet_commutative(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    cx.types.meet(t[0], t[1]) == cx.types.meet(t[1], t[0])
}

fn meet_associative(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    let ts = &mut cx.types;
    let yz = ts.meet(t[1], t[2]);
    let left = ts.meet(t[0], yz);
    let xy = ts.meet(t[0], t[1]);
    let right = ts.meet(xy, t[2]);
    left == right
}

fn dual_reverses_order(cx: &mut TypeCtx, t: &[Ty]) -> bool {
    let ts = &mut cx.types;
    // meet(x, y) is below x, so dual(x) is below its dual
    let m = ts.meet(t[0], t[1]);
    let (dx, dm) = (ts.dual(t[0]), ts.dual(m));
    ts.isa(dx, dm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::TypeSpec;

    #[test]
    fn test_law_lookup() {
        assert_eq!(law("meet_associative").map(|l| l.arity), Some(3));
        assert!(law("meet_distributive").is_none());
    }

    #[test]
    fn test_laws_hold_on_fixed_types() {
        let mut cx = TypeCtx::new();
        let five = cx.types.make_int(5);
        let int8 = cx.types.int_width(8, false);
        let inputs = [five, int8, Ty::SCALAR];
        for l in LAWS {
            assert!((l.check)(&mut cx, &inputs[..l.arity]), "{} failed", l.name);
        }
    }

    #[test]
    fn test_laws_hold_on_arrays_and_return_points() {
        let mut cx = TypeCtx::new();
        let ary = TypeSpec::Ary {
            len: 3,
            high: false,
            elem: Box::new(TypeSpec::FltWidth {
                width: 32,
                high: false,
            }),
        }
        .build(&mut cx);
        let rpc = TypeSpec::Rpc {
            rpcs: vec![0, 1],
            high: true,
        }
        .build(&mut cx);
        let flt = TypeSpec::FltWidth {
            width: 64,
            high: true,
        }
        .build(&mut cx);
        for inputs in [[ary, rpc, flt], [rpc, flt, ary], [flt, ary, rpc]] {
            for l in LAWS {
                assert!((l.check)(&mut cx, &inputs[..l.arity]), "{} failed", l.name);
            }
        }
    }

    #[test]
    fn test_cross_family_meet_is_all() {
        let mut cx = TypeCtx::new();
        assert!(meet_commutative(&mut cx, &[Ty::CTRL, Ty::SCALAR]));
        assert_eq!(cx.types.meet(Ty::CTRL, Ty::SCALAR), Ty::ALL);
    }
}
