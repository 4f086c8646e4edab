//! Basic blocks: instruction sequence, predecessors, and terminator.

use crate::ir::entities::{Block, Inst};
use crate::ir::lifetime::Lifetime;
use smallvec::SmallVec;
use std::collections::HashMap;

/// How a block ends.
///
/// `Unknown` only exists while a block is still being built; every block
/// reachable from a function's entry must have moved to one of the other
/// three variants before any pass runs. The transition is one-way and set
/// exactly once — see `BlockData::set_terminator`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Terminator {
    /// Still being built; must not be reached by any pass.
    Unknown,
    /// The function's entry block (also carries a terminator edge to its
    /// first real successor via the instruction stream's control flow;
    /// `Entry` here only tags the block's role).
    Entry,
    /// The function's unique exit block.
    Exit,
    /// Unconditional jump to `target`.
    Jmp(Block),
    /// Conditional jump: `cond` true goes to the first block, false to the
    /// second (mirrors `InstData::Branch`).
    Branch(Block, Block),
}

/// A basic block: a maximal straight-line instruction sequence ending in
/// exactly one terminator.
pub struct BlockData {
    /// Block label, for emission and diagnostics.
    pub label: String,
    pub(crate) first: Option<Inst>,
    pub(crate) last: Option<Inst>,
    /// Blocks with an edge into this one.
    pub predecessors: SmallVec<[Block; 4]>,
    /// Per-value lifetime, keyed by `Value::id()`.
    pub lifetime_map: HashMap<usize, Lifetime>,
    terminator: Terminator,
}

impl BlockData {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        BlockData {
            label: label.into(),
            first: None,
            last: None,
            predecessors: SmallVec::new(),
            lifetime_map: HashMap::new(),
            terminator: Terminator::Unknown,
        }
    }

    /// The block's terminator.
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Move this block to a terminal state. Panics (invariant violation)
    /// if called twice with different non-`Unknown` values — the
    /// terminator state machine is one-way and set once.
    pub fn set_terminator(&mut self, t: Terminator) {
        debug_assert!(
            matches!(self.terminator, Terminator::Unknown),
            "block `{}` terminator set twice",
            self.label
        );
        debug_assert!(
            !matches!(t, Terminator::Unknown),
            "block `{}` terminator set back to Unknown",
            self.label
        );
        self.terminator = t;
    }

    /// The first instruction, if the block is non-empty.
    pub fn first_inst(&self) -> Option<Inst> {
        self.first
    }

    /// The last instruction, if the block is non-empty.
    pub fn last_inst(&self) -> Option<Inst> {
        self.last
    }

    /// Forcibly overwrite the terminator, bypassing the one-way state
    /// machine check in [`BlockData::set_terminator`]. Used only by
    /// passes that split a block in two (memcpy loop expansion): the
    /// original block's terminator is retargeted to the new block, which
    /// is not the "finalized once" transition `set_terminator` guards.
    pub(crate) fn force_terminator(&mut self, t: Terminator) {
        self.terminator = t;
    }
}
