//! Compilation session
//!
//! A [`Session`] owns everything one compilation needs: the type store, the
//! node graph, the worklist and the current [`Mode`]. Nodes are built through
//! it so each one is valued, simplified and hash-consed as it appears.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result, SrcPos};
use crate::gvn::{Mode, Rewrite, Transfer, Worklist};
use crate::node::{FunInfo, Graph, Node, NodeId, NodeKind};
use crate::types::{Ty, TypeStore};
use smallvec::SmallVec;
use tracing::debug;

/// The nodes of a freshly built function entry.
#[derive(Debug, Clone)]
pub struct FunParts {
    pub fidx: u32,
    pub fun: NodeId,
    /// Incoming memory.
    pub mem: NodeId,
    pub args: Vec<NodeId>,
}

/// A call and the projections of its epilog.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub call: NodeId,
    pub epi: NodeId,
    pub ctrl: NodeId,
    pub mem: NodeId,
    pub val: NodeId,
}

/// An allocation: the `New` node, its alias and its two projections.
#[derive(Debug, Clone, Copy)]
pub struct Alloc {
    pub new: NodeId,
    pub alias: u32,
    pub obj: NodeId,
    pub ptr: NodeId,
}

#[derive(Debug)]
pub struct Session {
    pub(crate) types: TypeStore,
    pub(crate) graph: Graph,
    pub(crate) mode: Mode,
    pub(crate) config: AnalysisConfig,
    pub(crate) worklist: Worklist,
    pub(crate) wired: usize,
    start: NodeId,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        let mut graph = Graph::new();
        let mut types = TypeStore::new();
        let start = graph.add(NodeKind::Start, &[], Ty::ALL);
        let v = graph.value(start, &mut types, Mode::Parse);
        graph.set_val(start, v);
        graph.keep(start);
        Self {
            types,
            graph,
            mode: Mode::Parse,
            worklist: Worklist::new(config.worklist_order),
            config,
            wired: 0,
            start,
        }
    }

    /// Forget every node, type and id, and return to parse mode.
    pub fn reset(&mut self) {
        self.types.reset();
        self.graph.reset();
        self.worklist.clear();
        self.mode = Mode::Parse;
        self.wired = 0;
        let start = self.graph.add(NodeKind::Start, &[], Ty::ALL);
        let v = self.graph.value(start, &mut self.types, Mode::Parse);
        self.graph.set_val(start, v);
        self.graph.keep(start);
        self.start = start;
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeStore {
        &mut self.types
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Only legal before global analysis has started.
    pub fn set_parse_mode(&mut self) -> Result<()> {
        match self.mode {
            Mode::Parse => Ok(()),
            Mode::Opto => Err(AnalysisError::ModeRegression),
        }
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn start_ctrl(&mut self) -> NodeId {
        self.proj(self.start, 0)
    }

    pub fn start_mem(&mut self) -> NodeId {
        self.proj(self.start, 1)
    }

    pub fn node(&self, n: NodeId) -> &Node {
        self.graph.node(n)
    }

    pub fn val(&self, n: NodeId) -> Ty {
        self.graph.val(n)
    }

    pub fn live(&self, n: NodeId) -> Ty {
        self.graph.live(n)
    }

    pub fn type_str(&self, n: NodeId) -> String {
        self.types.str(self.graph.val(n))
    }

    pub fn keep(&mut self, n: NodeId) {
        self.graph.keep(n);
    }

    pub fn unkeep(&mut self, n: NodeId) {
        self.graph.unkeep(n);
    }

    /// Add a node and give it a value. In parse mode it is simplified and
    /// hash-consed on the spot, so the returned id may be an older node.
    pub(crate) fn build(&mut self, kind: NodeKind, defs: &[Option<NodeId>]) -> NodeId {
        let n = self.graph.add(kind, defs, Ty::ANY);
        let v = self.graph.value(n, &mut self.types, self.mode);
        self.graph.set_val(n, v);
        match self.mode {
            Mode::Parse => self.peephole(n),
            Mode::Opto => {
                self.worklist.push(n);
                n
            }
        }
    }

    fn peephole(&mut self, n: NodeId) -> NodeId {
        // Each DropDef clears a filled slot, so this stops.
        while let Some(rw) = self.graph.ideal(n, &self.types, Mode::Parse) {
            match rw {
                Rewrite::Replace(m) => {
                    self.graph.unhook(n);
                    return m;
                }
                Rewrite::DropDef(i) => {
                    self.graph.set_def(n, i, None);
                    let v = self.graph.value(n, &mut self.types, Mode::Parse);
                    self.graph.set_val(n, v);
                }
            }
        }
        if let Some(m) = self.graph.cse_find(n) {
            self.graph.unhook(n);
            return m;
        }
        self.graph.cse_insert(n);
        n
    }

    /// The constant node for `t`; one per type in every mode.
    pub fn con(&mut self, t: Ty) -> NodeId {
        let n = self.graph.add(NodeKind::Con(t), &[], t);
        match self.graph.cse_find(n) {
            Some(m) => {
                self.graph.unhook(n);
                m
            }
            None => {
                self.graph.cse_insert(n);
                n
            }
        }
    }

    pub fn proj(&mut self, src: NodeId, idx: u32) -> NodeId {
        self.build(NodeKind::Proj(idx), &[Some(src)])
    }

    /// A function entry with a fresh index, a memory parameter and `nargs`
    /// argument parameters. Its only caller so far is the unknown one.
    pub fn new_fun(&mut self, name: &str, nargs: u32, thunk: bool) -> Result<FunParts> {
        let fidx = self.types.new_fidx()?;
        let unknown = self.con(Ty::CTRL);
        let info = FunInfo::new(name, fidx, Some(nargs), thunk);
        let fun = self.build(NodeKind::Fun(info), &[Some(unknown)]);
        self.graph.register_fun(fidx, fun);
        let all_mem = self.types.all_mem();
        let dflt_mem = self.con(all_mem);
        let mem = self.build(NodeKind::Parm(1), &[Some(fun), Some(dflt_mem)]);
        let dflt = self.con(Ty::SCALAR);
        let args = (0..nargs)
            .map(|i| self.build(NodeKind::Parm(2 + i), &[Some(fun), Some(dflt)]))
            .collect();
        debug!("New function '{}' fidx={} nargs={}", name, fidx, nargs);
        Ok(FunParts { fidx, fun, mem, args })
    }

    pub fn new_ret(&mut self, fun: NodeId, ctrl: NodeId, mem: NodeId, val: NodeId) -> Result<NodeId> {
        let NodeKind::Fun(info) = self.graph.kind(fun) else {
            return Err(wrong_kind(fun, "function entry"));
        };
        let (fidx, nargs) = (info.fidx, info.nargs);
        let all_call = self.types.all_call();
        let rpc = self.con(all_call);
        Ok(self.build(
            NodeKind::Ret { fidx, nargs },
            &[Some(ctrl), Some(mem), Some(val), Some(rpc), Some(fun)],
        ))
    }

    /// A pointer to the function returning through `ret`. `display` is the
    /// closure environment, if any.
    pub fn new_fun_ptr(&mut self, ret: NodeId, display: Option<NodeId>) -> Result<NodeId> {
        let NodeKind::Ret { .. } = self.graph.kind(ret) else {
            return Err(wrong_kind(ret, "function return"));
        };
        let name = self
            .graph
            .def(ret, crate::node::ret::FUN)
            .and_then(|f| match self.graph.kind(f) {
                NodeKind::Fun(info) => Some(info.name.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let kind = NodeKind::FunPtr {
            name,
            mid_def: false,
            referr: None,
        };
        Ok(self.build(kind, &[Some(ret), display]))
    }

    /// Mark or clear a function pointer as a recursive reference made while
    /// its function is still being defined.
    pub fn set_mid_def(&mut self, fptr: NodeId, on: bool) -> Result<()> {
        match self.graph.kind_mut(fptr) {
            NodeKind::FunPtr { mid_def, .. } => *mid_def = on,
            _ => return Err(wrong_kind(fptr, "function pointer")),
        }
        // The edit took the pointer out of the hash-cons table
        self.graph.cse_insert(fptr);
        Ok(())
    }

    pub fn new_call(
        &mut self,
        ctrl: NodeId,
        mem: NodeId,
        args: &[NodeId],
        fptr: NodeId,
        pos: Option<SrcPos>,
    ) -> CallSite {
        let mut defs: SmallVec<[Option<NodeId>; 8]> = SmallVec::new();
        defs.push(Some(ctrl));
        defs.push(Some(mem));
        defs.extend(args.iter().map(|&a| Some(a)));
        defs.push(Some(fptr));
        let call = self.build(NodeKind::Call { pos }, &defs);
        let epi = self.build(NodeKind::CallEpi, &[Some(call)]);
        CallSite {
            call,
            epi,
            ctrl: self.proj(epi, 0),
            mem: self.proj(epi, 1),
            val: self.proj(epi, 2),
        }
    }

    /// Allocate a struct with a fresh alias.
    pub fn new_struct(&mut self, ctrl: NodeId, fields: &[(&str, NodeId)]) -> Result<Alloc> {
        let alias = self.types.new_alias()?;
        let mut defs: SmallVec<[Option<NodeId>; 8]> = SmallVec::new();
        defs.push(Some(ctrl));
        defs.extend(fields.iter().map(|&(_, n)| Some(n)));
        let kind = NodeKind::New {
            alias,
            flds: fields.iter().map(|&(name, _)| name.to_string()).collect(),
        };
        let new = self.build(kind, &defs);
        Ok(Alloc {
            new,
            alias,
            obj: self.proj(new, 0),
            ptr: self.proj(new, 1),
        })
    }

    /// Memory equal to `base` except at the given aliases.
    pub fn mem_merge(&mut self, base: NodeId, entries: &[(u32, NodeId)]) -> NodeId {
        let mut entries: SmallVec<[(u32, NodeId); 4]> = entries.iter().copied().collect();
        entries.sort_by_key(|&(alias, _)| alias);
        let mut defs: SmallVec<[Option<NodeId>; 8]> = SmallVec::new();
        defs.push(Some(base));
        defs.extend(entries.iter().map(|&(_, obj)| Some(obj)));
        let aliases = entries.iter().map(|&(alias, _)| alias).collect();
        self.build(NodeKind::MemMerge { aliases }, &defs)
    }

    /// Read field `fld` through `adr`. `ctrl` guards a possibly-nil address.
    pub fn load(
        &mut self,
        ctrl: Option<NodeId>,
        mem: NodeId,
        adr: NodeId,
        fld: &str,
        pos: Option<SrcPos>,
    ) -> NodeId {
        let kind = NodeKind::Load {
            fld: fld.to_string(),
            pos,
        };
        self.build(kind, &[ctrl, Some(mem), Some(adr)])
    }

    /// Wired call edges of `call` as `(edge, callee)` pairs.
    pub fn callees(&self, call: NodeId) -> Vec<(NodeId, NodeId)> {
        self.graph
            .node(call)
            .uses()
            .iter()
            .copied()
            .filter(|&u| matches!(self.graph.kind(u), NodeKind::CEProj))
            .filter_map(|ce| self.graph.node(ce).uses().first().map(|&f| (ce, f)))
            .collect()
    }

    /// True if a wired call edge may be taken.
    pub fn edge_live(&self, ceproj: NodeId) -> bool {
        self.graph.val(ceproj) == Ty::CTRL
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn wrong_kind(n: NodeId, expected: &'static str) -> AnalysisError {
    AnalysisError::WrongNodeKind {
        node: n.index() as u32,
        expected,
    }
}
