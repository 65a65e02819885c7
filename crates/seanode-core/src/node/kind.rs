//! The closed set of node kinds and their input layouts

use crate::error::{ErrMsg, SrcPos};
use crate::types::Ty;
use smallvec::SmallVec;

/// Identity of a function entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunInfo {
    pub name: String,
    pub fidx: u32,
    /// Formal argument count; `None` accepts any shape (forward references).
    pub nargs: Option<u32>,
    /// Deferred body: calls into it are taken whatever the arguments.
    pub thunk: bool,
    /// Placeholder for a name used before its definition.
    pub forward: bool,
}

impl FunInfo {
    pub fn new(name: impl Into<String>, fidx: u32, nargs: Option<u32>, thunk: bool) -> Self {
        Self {
            name: name.into(),
            fidx,
            nargs,
            thunk,
            forward: false,
        }
    }
}

/// Node kinds. Input layouts:
///
/// | kind | inputs |
/// |---|---|
/// | `Start` | none |
/// | `Con` | none |
/// | `Proj` | tuple producer |
/// | `Fun` | one control per caller; slot 0 is the unknown caller |
/// | `Parm` | fun, default, then one value per caller (pairs with fun slot `i-1`) |
/// | `Ret` | ctrl, mem, val, rpc, fun |
/// | `FunPtr` | ret, display |
/// | `Call` | ctrl, mem, args.., function pointer |
/// | `CallEpi` | call, then one ret per wired callee |
/// | `CEProj` | call (its single use is the callee `Fun`) |
/// | `New` | ctrl, then one value per field |
/// | `MemMerge` | base memory, then one object per alias |
/// | `Load` | ctrl (optional), mem, address |
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start,
    Con(Ty),
    Proj(u32),
    Fun(FunInfo),
    /// Parameter `idx`: 1 is memory, 2.. are arguments, matching call slots.
    Parm(u32),
    Ret {
        fidx: u32,
        nargs: Option<u32>,
    },
    FunPtr {
        name: String,
        /// Recursive reference made while the body is still being parsed.
        mid_def: bool,
        /// Deferred "undefined reference" error of a forward-reference stub.
        referr: Option<ErrMsg>,
    },
    Call {
        pos: Option<SrcPos>,
    },
    CallEpi,
    CEProj,
    New {
        alias: u32,
        flds: Vec<String>,
    },
    MemMerge {
        aliases: SmallVec<[u32; 4]>,
    },
    Load {
        fld: String,
        pos: Option<SrcPos>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::Con(_) => "Con",
            NodeKind::Proj(_) => "Proj",
            NodeKind::Fun(_) => "Fun",
            NodeKind::Parm(_) => "Parm",
            NodeKind::Ret { .. } => "Ret",
            NodeKind::FunPtr { .. } => "FunPtr",
            NodeKind::Call { .. } => "Call",
            NodeKind::CallEpi => "CallEpi",
            NodeKind::CEProj => "CEProj",
            NodeKind::New { .. } => "New",
            NodeKind::MemMerge { .. } => "MemMerge",
            NodeKind::Load { .. } => "Load",
        }
    }

    pub fn is_fun(&self) -> bool {
        matches!(self, NodeKind::Fun(_))
    }

    pub fn is_ret(&self) -> bool {
        matches!(self, NodeKind::Ret { .. })
    }

    pub fn is_fun_ptr(&self) -> bool {
        matches!(self, NodeKind::FunPtr { .. })
    }

    pub fn is_call_epi(&self) -> bool {
        matches!(self, NodeKind::CallEpi)
    }

    /// Values fixed at construction; never reset by global analysis.
    pub fn is_const(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::Con(_))
    }
}

/// Slot layout of `Ret` inputs.
pub mod ret {
    pub const CTRL: usize = 0;
    pub const MEM: usize = 1;
    pub const VAL: usize = 2;
    pub const RPC: usize = 3;
    pub const FUN: usize = 4;
}

/// Slot layout of `FunPtr` inputs.
pub mod fptr {
    pub const RET: usize = 0;
    pub const DISPLAY: usize = 1;
}

/// Slot layout of `Load` inputs.
pub mod load {
    pub const CTRL: usize = 0;
    pub const MEM: usize = 1;
    pub const ADR: usize = 2;
}
