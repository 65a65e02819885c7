//! Split tree shared by every bit-set of one kind
//!
//! Each id starts as a leaf. `new_id(par)` hangs one more kid off an open
//! parent (a fresh allocation site, a fresh function); `split(par)`
//! partitions a leaf into exactly two kids (cloning) and closes it. Id 0 is
//! the root sentinel and doubles as the nil bit; it is split exactly once to
//! create the "all" id.

use super::BitsKind;
use crate::error::{AnalysisError, Result};
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub struct SplitTree {
    kind: BitsKind,
    parents: Vec<u32>,
    kids: Vec<SmallVec<[u32; 2]>>,
    closed: Vec<bool>,
    init_len: usize,
    init_closed: Vec<bool>,
}

impl SplitTree {
    pub fn new(kind: BitsKind) -> Self {
        Self {
            kind,
            parents: vec![0],
            kids: vec![SmallVec::new()],
            closed: vec![false],
            init_len: 1,
            init_closed: vec![false],
        }
    }

    pub fn kind(&self) -> BitsKind {
        self.kind
    }

    /// Number of ids handed out so far, the root included.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.len() <= 1
    }

    pub fn contains(&self, id: u32) -> bool {
        (id as usize) < self.parents.len()
    }

    fn check(&self, id: u32) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(AnalysisError::UnknownId { kind: self.kind, id })
        }
    }

    fn push(&mut self, par: u32) -> u32 {
        let id = self.parents.len() as u32;
        self.parents.push(par);
        self.kids.push(SmallVec::new());
        self.closed.push(false);
        self.kids[par as usize].push(id);
        id
    }

    /// Hang a fresh leaf off `par` and return it.
    pub fn new_id(&mut self, par: u32) -> Result<u32> {
        self.check(par)?;
        if par == 0 && self.parents.len() > 1 {
            return Err(AnalysisError::ReservedSplit { kind: self.kind });
        }
        if self.closed[par as usize] {
            return Err(AnalysisError::ClosedParent { kind: self.kind, id: par });
        }
        Ok(self.push(par))
    }

    /// Partition the leaf `par` into two fresh kids. `par` is closed afterwards.
    pub fn split(&mut self, par: u32) -> Result<(u32, u32)> {
        self.check(par)?;
        if par == 0 {
            return Err(AnalysisError::ReservedSplit { kind: self.kind });
        }
        if !self.kids[par as usize].is_empty() {
            return Err(AnalysisError::NotALeaf { kind: self.kind, id: par });
        }
        let a = self.push(par);
        let b = self.push(par);
        self.closed[par as usize] = true;
        Ok((a, b))
    }

    /// True if `kid` equals `par` or descends from it. Nil is nobody's parent.
    pub fn is_parent(&self, par: u32, kid: u32) -> bool {
        if par == 0 {
            return kid == 0;
        }
        let mut k = kid;
        while k != 0 && self.contains(k) {
            if k == par {
                return true;
            }
            k = self.parents[k as usize];
        }
        false
    }

    pub fn parent(&self, kid: u32) -> u32 {
        self.parents.get(kid as usize).copied().unwrap_or(0)
    }

    pub fn kids(&self, par: u32) -> &[u32] {
        self.kids.get(par as usize).map_or(&[], |k| k.as_slice())
    }

    pub fn is_split(&self, id: u32) -> bool {
        !self.kids(id).is_empty()
    }

    /// True once `split` partitioned this id.
    pub fn is_closed(&self, id: u32) -> bool {
        self.closed.get(id as usize).copied().unwrap_or(false)
    }

    /// Record the current tree as the state `reset_to_init0` returns to.
    pub fn init0(&mut self) {
        self.init_len = self.parents.len();
        self.init_closed = self.closed.clone();
    }

    pub fn reset_to_init0(&mut self) {
        let len = self.init_len;
        self.parents.truncate(len);
        self.kids.truncate(len);
        for kids in &mut self.kids {
            kids.retain(|k| (*k as usize) < len);
        }
        self.closed.clone_from(&self.init_closed);
    }
}
