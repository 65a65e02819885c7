//! Error types for the analysis core
//!
//! Two families live here:
//! - [`AnalysisError`]: misuse of the API or a broken internal invariant.
//!   These abort the current compilation run.
//! - [`ErrMsg`]: semantic diagnostics attached to graph nodes and reported
//!   only once the fixed point has been reached.
//!
//! Shape mismatches inside the lattice are neither; `meet` absorbs them.

use crate::bits::BitsKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal errors raised by the lattice, the graph or the worklist driver.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// An operation that the lattice deliberately leaves unimplemented.
    #[error("unimplemented lattice operation: {0}")]
    Unimplemented(&'static str),

    /// Id 0 is split exactly once, at startup, to make the "all" id.
    #[error("{kind:?} id 0 is reserved for the initial all-id split")]
    ReservedSplit { kind: BitsKind },

    /// The id is not known to the split tree.
    #[error("{kind:?} id {id} does not exist")]
    UnknownId { kind: BitsKind, id: u32 },

    /// The id was already partitioned by `split` and takes no more kids.
    #[error("{kind:?} id {id} is fully split and cannot take new kids")]
    ClosedParent { kind: BitsKind, id: u32 },

    /// Only leaves can be split into a pair of kids.
    #[error("{kind:?} id {id} already has kids")]
    NotALeaf { kind: BitsKind, id: u32 },

    /// Tried to return to parse mode after global analysis started.
    #[error("cannot return to parse mode once global analysis has started")]
    ModeRegression,

    /// The worklist did not drain within the configured budget.
    #[error("{mode} worklist did not converge within {limit} steps")]
    IterationLimit { mode: &'static str, limit: usize },

    /// A node was used in a way its kind does not allow.
    #[error("node {node} is not a {expected}")]
    WrongNodeKind { node: u32, expected: &'static str },

    /// Interning or pool bookkeeping is corrupt.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Opaque source position threaded from the parser for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrcPos {
    pub line: u32,
    pub col: u32,
}

impl SrcPos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SrcPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Category of a semantic diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrKind {
    /// A name used before (and never) defined.
    ForwardRef,
    /// A load whose address may still be nil.
    NilDeref,
    /// A load of a field the struct does not have.
    UnknownField,
    /// No candidate callee takes the supplied number of arguments.
    ArgCount,
    /// The call target is not a function.
    NotCallable,
}

/// A deferred diagnostic attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrMsg {
    pub kind: ErrKind,
    pub msg: String,
    pub pos: Option<SrcPos>,
}

impl ErrMsg {
    pub fn new(kind: ErrKind, msg: impl Into<String>, pos: Option<SrcPos>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            pos,
        }
    }

    pub fn forward_ref(name: &str, pos: Option<SrcPos>) -> Self {
        Self::new(ErrKind::ForwardRef, format!("Unknown ref '{name}'"), pos)
    }
}

impl fmt::Display for ErrMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{pos}: {}", self.msg),
            None => write!(f, "{}", self.msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errmsg_display_with_position() {
        let err = ErrMsg::forward_ref("fact", Some(SrcPos::new(3, 7)));
        assert_eq!(err.to_string(), "3:7: Unknown ref 'fact'");
        assert_eq!(err.kind, ErrKind::ForwardRef);
    }

    #[test]
    fn test_errmsg_display_without_position() {
        let err = ErrMsg::new(ErrKind::UnknownField, "Unknown field '.x'", None);
        assert_eq!(err.to_string(), "Unknown field '.x'");
    }

    #[test]
    fn test_analysis_error_messages() {
        let err = AnalysisError::ClosedParent {
            kind: BitsKind::Alias,
            id: 4,
        };
        assert_eq!(err.to_string(), "Alias id 4 is fully split and cannot take new kids");
        let err = AnalysisError::Unimplemented("array update");
        assert!(err.to_string().contains("array update"));
    }
}
