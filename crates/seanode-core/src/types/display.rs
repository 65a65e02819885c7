//! Printable form of types, used by diagnostics, tracing and tests

use super::{Arity, Num, NumCon, Ty, TypeKind, TypeStore};
use crate::bits::BitsKind;
use std::fmt::Write;

impl TypeStore {
    pub fn str(&self, t: Ty) -> String {
        let mut out = String::new();
        self.write_ty(&mut out, t);
        out
    }

    fn write_ty(&self, out: &mut String, t: Ty) {
        match self.kind(t) {
            TypeKind::All => out.push_str("ALL"),
            TypeKind::Any => out.push_str("ANY"),
            TypeKind::Ctrl => out.push_str("Ctrl"),
            TypeKind::XCtrl => out.push_str("~Ctrl"),
            TypeKind::Scalar => out.push_str("Scalar"),
            TypeKind::XScalar => out.push_str("~Scalar"),
            TypeKind::Used => out.push_str("Obj"),
            TypeKind::Unused => out.push_str("~Obj"),
            TypeKind::Int(n) => write_num(out, "int", *n, |c| c.to_string()),
            TypeKind::Flt(n) => write_num(out, "flt", *n, |c| format!("{:?}", c.get())),
            TypeKind::MemPtr { aliases, obj } => {
                out.push('*');
                out.push_str(&self.bits().str(*aliases));
                self.write_ty(out, *obj);
            }
            TypeKind::FunPtr { fidxs, nargs, .. } => {
                out.push_str("fn");
                out.push_str(&self.bits().str(*fidxs));
                match nargs {
                    Arity::Any => out.push_str("(~*)"),
                    Arity::All => out.push_str("(*)"),
                    Arity::N(n) => {
                        let _ = write!(out, "({n})");
                    }
                }
            }
            TypeKind::Rpc(bits) => {
                out.push('#');
                out.push_str(&self.bits().str(*bits));
            }
            TypeKind::Struct(st) => {
                if st.any() {
                    out.push('~');
                }
                out.push('{');
                for (i, f) in st.fields().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&f.name);
                    out.push('=');
                    self.write_ty(out, f.ty);
                }
                out.push('}');
            }
            TypeKind::Ary(a) => {
                out.push('[');
                self.write_ty(out, a.len);
                out.push(']');
                self.write_ty(out, a.elem);
                if a.stor != Ty::USED {
                    out.push('/');
                    self.write_ty(out, a.stor);
                }
            }
            TypeKind::Mem(m) => {
                out.push_str("Mem[");
                self.write_ty(out, m.dflt());
                for &(alias, obj) in m.objs() {
                    let _ = write!(out, ",{alias}:");
                    self.write_ty(out, obj);
                }
                out.push(']');
            }
            TypeKind::Tuple(ts) => {
                out.push('(');
                for (i, &e) in ts.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_ty(out, e);
                }
                out.push(')');
            }
        }
    }

    /// Printable form of a function-id set, for log lines.
    pub fn fidxs_str(&self, t: Ty) -> String {
        match self.kind(t) {
            TypeKind::FunPtr { fidxs, .. } => self.bits().str(*fidxs),
            _ => self.bits().str(self.bits().all(BitsKind::Fun)),
        }
    }
}

fn write_num<C: NumCon>(out: &mut String, name: &str, n: Num<C>, con: impl Fn(C) -> String) {
    match n {
        Num::High(w) => {
            let _ = write!(out, "~{name}{w}");
        }
        Num::Low(w) => {
            let _ = write!(out, "{name}{w}");
        }
        Num::Con(c) => out.push_str(&con(c)),
    }
}
