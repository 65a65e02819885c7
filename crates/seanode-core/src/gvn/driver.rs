//! Fixed-point driver: `iter` drains the worklist, `gcp` runs global analysis

use super::{live, GvnStats, Mode, Rewrite, Transfer};
use crate::error::{AnalysisError, Result};
use crate::node::{NodeId, NodeKind};
use crate::session::Session;
use crate::types::Ty;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

impl Session {
    pub fn worklist_len(&self) -> usize {
        self.worklist.len()
    }

    /// Queue a node for another visit.
    pub fn push(&mut self, n: NodeId) {
        self.worklist.push(n);
    }

    /// Drain the worklist in the current mode. Returns the number of steps.
    pub fn iter(&mut self) -> Result<usize> {
        let limit = self.config.max_iterations;
        let mut steps = 0;
        while let Some(n) = self.worklist.pop() {
            if !self.graph.contains(n) {
                continue;
            }
            steps += 1;
            if steps > limit {
                warn!(
                    "{} worklist still has {} nodes after {} steps",
                    self.mode.name(),
                    self.worklist.len() + 1,
                    limit
                );
                self.worklist.clear();
                return Err(AnalysisError::IterationLimit {
                    mode: self.mode.name(),
                    limit,
                });
            }
            match self.mode {
                Mode::Parse => self.xform_parse(n),
                Mode::Opto => self.xform_opto(n),
            }
        }
        debug!("{} worklist drained in {} steps", self.mode.name(), steps);
        Ok(steps)
    }

    fn xform_parse(&mut self, n: NodeId) {
        self.update_value(n);
        if let Some(rw) = self.graph.ideal(n, &self.types, Mode::Parse) {
            self.apply(n, rw);
            return;
        }
        match self.graph.cse_find(n) {
            Some(m) => self.apply(n, Rewrite::Replace(m)),
            None => self.graph.cse_insert(n),
        }
    }

    fn xform_opto(&mut self, n: NodeId) {
        if self.graph.kind(n).is_const() {
            return;
        }
        self.update_value(n);
        if matches!(self.graph.kind(n), NodeKind::Call { .. }) {
            self.discover_callees(n);
        }
    }

    /// Recompute a value; in opto mode it may only fall. Changed values
    /// requeue the users.
    fn update_value(&mut self, n: NodeId) -> bool {
        let old = self.graph.val(n);
        let mut new = self.graph.value(n, &mut self.types, self.mode);
        if self.mode == Mode::Opto {
            new = self.types.meet(old, new);
        }
        if new == old {
            return false;
        }
        if self.config.trace_values {
            trace!(
                "{} {} : {} -> {}",
                n,
                self.graph.kind(n).name(),
                self.types.str(old),
                self.types.str(new)
            );
        }
        self.graph.set_val(n, new);
        self.push_uses(n);
        true
    }

    /// Users of `n`, plus the parameters of any function `n` is a caller
    /// control of: parameters read their function's inputs directly.
    fn push_uses(&mut self, n: NodeId) {
        let uses: SmallVec<[NodeId; 8]> = self.graph.node(n).uses().iter().copied().collect();
        for u in uses {
            self.worklist.push(u);
            if self.graph.kind(u).is_fun() {
                for &p in self.graph.node(u).uses() {
                    if matches!(self.graph.kind(p), NodeKind::Parm(_)) {
                        self.worklist.push(p);
                    }
                }
            }
        }
    }

    fn apply(&mut self, n: NodeId, rw: Rewrite) {
        match rw {
            Rewrite::Replace(m) => {
                trace!("{} replaced by {}", n, m);
                self.push_uses(n);
                self.worklist.push(m);
                self.graph.subsume(n, m);
            }
            Rewrite::DropDef(i) => {
                trace!("{} drops input {}", n, i);
                let old = self.graph.def(n, i);
                self.graph.set_def(n, i, None);
                self.worklist.push(n);
                if let Some(old) = old.filter(|&d| !self.graph.kind(d).is_const()) {
                    self.graph.kill(old);
                }
            }
        }
    }

    /// Global optimistic analysis. Values restart at `ANY` and fall to the
    /// fixed point while calls are wired to their callees; then liveness is
    /// computed, a last round of rewrites is applied and the worklist is
    /// drained again.
    ///
    /// The session stays in opto mode afterwards.
    pub fn gcp(&mut self) -> Result<GvnStats> {
        if self.mode == Mode::Parse {
            self.iter()?;
        }
        self.mode = Mode::Opto;
        let wired_before = self.wired;

        // Functions nobody outside can see lose their unknown caller
        let xctrl = self.con(Ty::XCTRL);
        let funs: Vec<NodeId> = self.graph.funs().map(|(_, f)| f).collect();
        for fun in funs {
            if !self.escapes(fun) {
                self.graph.set_def(fun, 0, Some(xctrl));
            }
        }

        let ids: Vec<NodeId> = self.graph.ids().collect();
        for &n in &ids {
            if !self.graph.kind(n).is_const() {
                self.graph.set_val(n, Ty::ANY);
            }
            self.worklist.push(n);
        }
        let mut steps = self.iter()?;

        let live_steps = live::compute(&mut self.graph, &mut self.types);
        let rewrites = self.sweep();
        steps += self.iter()?;

        let stats = GvnStats {
            steps,
            wired: self.wired - wired_before,
            rewrites,
            live_steps,
        };
        debug!(
            "Global analysis: {} steps, {} edges wired, {} rewrites",
            stats.steps, stats.wired, stats.rewrites
        );
        Ok(stats)
    }

    /// A function may be called from outside the graph: its pointer is kept,
    /// or it is an unresolved forward reference.
    fn escapes(&self, fun: NodeId) -> bool {
        if matches!(self.graph.kind(fun), NodeKind::Fun(info) if info.forward) {
            return true;
        }
        let Some(rt) = self.graph.find_use(fun, NodeKind::is_ret) else {
            return false;
        };
        self.graph
            .node(rt)
            .uses()
            .iter()
            .any(|&u| self.graph.kind(u).is_fun_ptr() && self.graph.node(u).is_kept())
    }

    /// One `ideal` pass over every live node, in id order.
    fn sweep(&mut self) -> usize {
        let ids: Vec<NodeId> = self.graph.ids().collect();
        let mut count = 0;
        for n in ids {
            if !self.graph.contains(n) || self.graph.live(n) == Ty::ANY {
                continue;
            }
            if let Some(rw) = self.graph.ideal(n, &self.types, Mode::Opto) {
                self.apply(n, rw);
                count += 1;
            }
        }
        count
    }
}
