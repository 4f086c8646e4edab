//! Per-block value lifetimes.
//!
//! A value's lifetime is the half-open instruction range `[start, end)`
//! within one block during which it is considered alive: `start` is its
//! defining instruction (or the block's first instruction, for a value
//! live on entry), `end` is its last use. The `contains` predicate can
//! optionally include `end` itself, since spill/regalloc often need to
//! know "is this value live *at* its last use" rather than strictly
//! before it.

use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;

/// The instruction range `[start, end]` a value is alive for, within a
/// single block.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Lifetime {
    /// Defining (or block-entry) instruction.
    pub start: Inst,
    /// Last using instruction.
    pub end: Inst,
}

impl Lifetime {
    /// A lifetime covering just one instruction (def with no further use
    /// in this block).
    pub fn point(inst: Inst) -> Self {
        Lifetime {
            start: inst,
            end: inst,
        }
    }

    /// Extend `end` forward to `inst` if `inst` comes later, walking the
    /// block's instruction order starting from the current `end`.
    pub fn extend_to(&mut self, func: &Function, block: Block, inst: Inst) {
        if inst == self.end || func.inst_precedes(block, inst, self.end) {
            return;
        }
        self.end = inst;
    }

    /// Does this lifetime cover `at`? When `inclusive_end` is false, a
    /// lifetime that ends exactly at `at` is considered not to cover it
    /// (used when checking "is still live after this point").
    pub fn contains(&self, func: &Function, block: Block, at: Inst, inclusive_end: bool) -> bool {
        if at == self.start {
            return true;
        }
        if at == self.end {
            return inclusive_end;
        }
        if func.inst_precedes(block, at, self.start) {
            return false;
        }
        func.inst_precedes(block, at, self.end)
    }
}

/// Compute lifetimes for every value used in `block`, and mark values read
/// or defined by more than one block as `lives_across_blocks`.
///
/// This is lifetime analysis proper. The ABI and isel
/// passes rewrite the instruction stream extensively (copies in, copies
/// out, pointer-arithmetic and memcpy expansion), so rather than maintain
/// `lifetime_map` incrementally through both of those passes, the spill
/// pass (`crate::spill::run`) recomputes it fresh, once, over the
/// post-isel instruction stream before making any pressure decisions —
/// this function and `mark_cross_block_values` are its first step. Neither
/// the register allocator nor the emitter mutate the instruction list in
/// ways that move a value's def or last use, so lifetimes computed at the
/// start of spill stay valid for the rest of the pipeline.
pub fn compute_block_lifetimes(func: &mut Function, block: Block) {
    use std::collections::HashMap;

    let mut first_seen: HashMap<usize, Inst> = HashMap::new();
    let mut last_seen: HashMap<usize, Inst> = HashMap::new();

    let insts: Vec<Inst> = func.block_insts(block).collect();
    for &inst in &insts {
        if func.inst(inst).skip {
            continue;
        }
        for operand in func.inst(inst).data.operands() {
            if operand.is_volatile() {
                continue;
            }
            let id = operand.id();
            first_seen.entry(id).or_insert(inst);
            last_seen.insert(id, inst);
        }
    }

    let block_data = func.block_mut(block);
    block_data.lifetime_map.clear();
    for (&id, &start) in &first_seen {
        let end = last_seen[&id];
        block_data.lifetime_map.insert(id, Lifetime { start, end });
    }
}

/// Mark every value appearing in more than one of `func`'s blocks as
/// `lives_across_blocks`. Must run after `compute_block_lifetimes` has been
/// called for every block.
pub fn mark_cross_block_values(func: &Function) {
    use std::collections::HashMap;

    let mut seen_in: HashMap<usize, Block> = HashMap::new();
    let mut cross: Vec<usize> = Vec::new();

    for block in func.blocks() {
        for inst in func.block_insts(block) {
            if func.inst(inst).skip {
                continue;
            }
            for operand in func.inst(inst).data.operands() {
                if operand.is_volatile() {
                    continue;
                }
                let id = operand.id();
                match seen_in.get(&id) {
                    Some(&seen_block) if seen_block != block => cross.push(id),
                    Some(_) => {}
                    None => {
                        seen_in.insert(id, block);
                    }
                }
            }
        }
    }

    let cross: std::collections::HashSet<usize> = cross.into_iter().collect();
    for block in func.blocks() {
        for inst in func.block_insts(block) {
            if func.inst(inst).skip {
                continue;
            }
            for operand in func.inst(inst).data.operands() {
                if cross.contains(&operand.id()) {
                    operand.set_lives_across_blocks(true);
                }
            }
        }
    }
}
