//! # Seanode Core
//!
//! Analysis core for a sea-of-nodes compiler: an interned type lattice, a
//! node graph with hash-consing, a value-numbering worklist engine and
//! call-graph discovery.
//!
//! ## Modules
//!
//! - **[`bits`]** - Hierarchical bit-sets for alias classes, function
//!   indices and call sites
//! - **[`types`]** - The interned value lattice (`meet`, `dual`, memory)
//! - **[`node`]** - The program graph
//! - **[`gvn`]** - Parse-time and global worklist analysis
//! - **[`session`]** - One compilation: builds nodes and runs analysis
//!
//! ## Quick Start
//!
//! ```rust
//! use seanode_core::prelude::*;
//!
//! let mut s = Session::new();
//! let f = s.new_fun("id", 1, false).unwrap();
//! let ret = s.new_ret(f.fun, f.fun, f.mem, f.args[0]).unwrap();
//! let fp = s.new_fun_ptr(ret, None).unwrap();
//!
//! let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
//! let seven = s.types_mut().make_int(7);
//! let arg = s.con(seven);
//! let site = s.new_call(ctrl, mem, &[arg], fp, None);
//! s.keep(site.val);
//!
//! s.gcp().unwrap();
//! assert_eq!(s.type_str(site.val), "7");
//! ```

pub mod bits;
pub mod config;
mod diag;
pub mod error;
pub mod gvn;
pub mod node;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;
pub mod wiring;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bits::{Bits, BitsKind, BitsTable};
    pub use crate::config::{AnalysisConfig, WorklistOrder};
    pub use crate::error::{AnalysisError, ErrKind, ErrMsg, Result, SrcPos};
    pub use crate::gvn::{GvnStats, Mode};
    pub use crate::node::{Graph, NodeId, NodeKind};
    pub use crate::session::{Alloc, CallSite, FunParts, Session};
    pub use crate::types::{Arity, Ty, TypeStore};
}
