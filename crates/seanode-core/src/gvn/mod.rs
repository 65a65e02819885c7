//! Worklist engine for value numbering
//!
//! Two modes share one worklist:
//! - **Parse**: pessimistic. Every node starts at its computed value and may
//!   be rewritten (`ideal`) or merged with an equal node (CSE) as it is built.
//! - **Opto**: optimistic global analysis. Values restart at `ANY` and only
//!   fall, call edges are discovered as function pointers resolve, and a
//!   backward liveness pass marks what the program actually needs.
//!
//! Per-kind transfer functions live in [`value`], [`ideal`] and [`live`];
//! [`driver`] runs them to a fixed point.

mod driver;
pub(crate) mod ideal;
pub(crate) mod live;
pub(crate) mod value;

pub use ideal::Rewrite;

use crate::config::WorklistOrder;
use crate::node::{Graph, NodeId};
use crate::types::{Ty, TypeStore};
use fnv::FnvHashSet;
use serde::Serialize;
use std::collections::VecDeque;

/// Analysis mode. Moves one way only: parse, then opto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    Parse,
    Opto,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Parse => "parse",
            Mode::Opto => "opto",
        }
    }
}

/// Pending nodes, each queued at most once.
#[derive(Debug, Default)]
pub struct Worklist {
    queue: VecDeque<NodeId>,
    queued: FnvHashSet<NodeId>,
    order: WorklistOrder,
}

impl Worklist {
    pub fn new(order: WorklistOrder) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    pub fn push(&mut self, n: NodeId) {
        if self.queued.insert(n) {
            self.queue.push_back(n);
        }
    }

    pub fn pop(&mut self) -> Option<NodeId> {
        let n = match self.order {
            WorklistOrder::Fifo => self.queue.pop_front(),
            WorklistOrder::Lifo => self.queue.pop_back(),
        }?;
        self.queued.remove(&n);
        Some(n)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }
}

/// Per-node transfer functions, dispatched over the node kind.
pub trait Transfer {
    /// Forward value from the current input values.
    fn value(&self, n: NodeId, types: &mut TypeStore, mode: Mode) -> Ty;

    /// A local rewrite that keeps the node's meaning, if one applies.
    fn ideal(&self, n: NodeId, types: &TypeStore, mode: Mode) -> Option<Rewrite>;

    /// What `user` needs from its input at `slot`.
    fn live_use(&self, user: NodeId, slot: usize, types: &TypeStore) -> Ty;
}

impl Transfer for Graph {
    fn value(&self, n: NodeId, types: &mut TypeStore, mode: Mode) -> Ty {
        value::value(self, types, mode, n)
    }

    fn ideal(&self, n: NodeId, types: &TypeStore, mode: Mode) -> Option<Rewrite> {
        ideal::ideal(self, types, mode, n)
    }

    fn live_use(&self, user: NodeId, slot: usize, types: &TypeStore) -> Ty {
        live::live_use(self, types, user, slot)
    }
}

/// Counters reported by one global analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GvnStats {
    /// Worklist steps across every drain.
    pub steps: usize,
    /// Call-to-callee edges added by wiring discovery.
    pub wired: usize,
    /// Rewrites applied by the final sweep.
    pub rewrites: usize,
    /// Steps taken by the liveness pass.
    pub live_steps: usize,
}
