//! `Function` — blocks, instructions, and the per-function state every
//! pass reads or mutates.

use crate::entity::PrimaryMap;
use crate::ir::block::{BlockData, Terminator};
use crate::ir::entities::{Block, Inst};
use crate::ir::instruction::{InstData, InstNode};
use crate::ir::types::Type;
use crate::ir::value::Value;
use crate::isa::CallConv;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

/// A function's calling convention and type signature.
#[derive(Clone, Debug)]
pub struct Signature {
    /// Return type (`void`'s `Type` when there is no return value).
    pub ret: Type,
    /// Parameter types, in declaration order.
    pub params: Vec<Type>,
    /// Whether this function accepts trailing variadic arguments.
    pub variadic: bool,
    /// Calling convention used both for this function's own entry/exit
    /// and, when it's the callee type of a `call`, for the call site.
    pub call_conv: CallConv,
}

/// Attributes that alter lowering or emission but don't affect the IR's
/// structure (e.g. whether a function is externally visible).
#[derive(Clone, Debug, Default)]
pub struct FunctionAttributes {
    /// Emit a `.globl`/equivalent directive; `false` for file-local
    /// helpers.
    pub exported: bool,
}

/// A function: an ordered set of blocks and the instructions inside them.
///
/// Blocks and instructions live in two flat arenas (`blocks`, `insts`)
/// owned by the function; a block's instruction list is realized as an
/// index-linked doubly-linked list over the `insts` arena (`InstNode::prev`
/// /`next`), the same representation `cranelift_codegen`'s `Layout` uses
/// for its EBB/instruction lists, so that inserting or removing an
/// instruction never invalidates another instruction's `Inst` handle.
pub struct Function {
    /// Name, used for the `call`-target/label namespace and diagnostics.
    pub name: String,
    /// Calling convention and type signature.
    pub sig: Signature,
    /// Emission-affecting attributes.
    pub attributes: FunctionAttributes,
    /// Parameter names, parallel to `sig.params`.
    pub arg_names: Vec<String>,
    /// Parameter values, parallel to `sig.params`; unlocated until the ABI
    /// pass runs.
    pub arg_values: Vec<Value>,
    /// Accumulates offsets handed out to spilt values; also the running
    /// cursor isel uses for stack-materialized temporaries. Offsets are
    /// always positive bytes below the frame pointer — one convention,
    /// enforced everywhere.
    stack_use: Cell<i32>,
    uniq_counter: Cell<u32>,
    blocks: PrimaryMap<Block, BlockData>,
    insts: PrimaryMap<Inst, InstNode>,
    entry: Block,
    exit: Option<Block>,
    /// The local holding this function's stret pointer, stashed here by
    /// the ABI pass's entry lowering so its own return lowering can find it
    /// again without threading it through every call in between.
    stret_value: Option<Value>,
    /// Stack-frame offset of each `alloca` result, keyed by `Value::id()`.
    /// An alloca's result value is located like any other register-class
    /// value (it holds a computed address); this side table is the only
    /// place its backing slot's offset lives, populated by
    /// `isel::assign_alloca_slots` for every alloca the function contains,
    /// including ones synthesized mid-pass (spill slots, memcpy loop
    /// state).
    alloca_offsets: RefCell<HashMap<usize, i32>>,
    /// Largest outgoing stack-argument area any call site in this function
    /// needs, bumped by `abi::lower_call` as it lowers each call. Folded
    /// into the prologue's frame size alongside `stack_use`.
    call_arg_area: Cell<i32>,
    /// Whether this function ever calls out, set by `abi::lower_call`.
    /// Drives the emitter's 16- vs 8-byte frame-size rounding (a leaf
    /// function's frame only needs to keep the stack 16-byte aligned at
    /// its own entry, already guaranteed by the caller).
    has_calls: Cell<bool>,
}

impl Function {
    /// Create an empty function with one (empty, `Unknown`-terminated)
    /// entry block.
    pub fn new(name: impl Into<String>, sig: Signature) -> Self {
        let mut blocks = PrimaryMap::new();
        let entry = blocks.push(BlockData::new("entry"));
        Function {
            name: name.into(),
            sig,
            attributes: FunctionAttributes::default(),
            arg_names: Vec::new(),
            arg_values: Vec::new(),
            stack_use: Cell::new(0),
            uniq_counter: Cell::new(0),
            blocks,
            insts: PrimaryMap::new(),
            entry,
            exit: None,
            stret_value: None,
            alloca_offsets: RefCell::new(HashMap::new()),
            call_arg_area: Cell::new(0),
            has_calls: Cell::new(false),
        }
    }

    /// The entry block.
    pub fn entry(&self) -> Block {
        self.entry
    }

    /// The exit block, if one has been declared (see
    /// `Function::set_exit`).
    pub fn exit(&self) -> Option<Block> {
        self.exit
    }

    /// Declare `block` as this function's unique exit block.
    pub fn set_exit(&mut self, block: Block) {
        self.exit = Some(block);
    }

    /// The stret pointer local stashed by the ABI pass's entry lowering,
    /// if this function returns an in-memory aggregate.
    pub fn stret_value(&self) -> Option<Value> {
        self.stret_value.clone()
    }

    /// Record the stret pointer local for later return-site lowering.
    pub fn set_stret_value(&mut self, v: Option<Value>) {
        self.stret_value = v;
    }

    /// The stack-frame offset assigned to an alloca's result value, if any.
    pub fn alloca_offset(&self, v: &Value) -> Option<i32> {
        self.alloca_offsets.borrow().get(&v.id()).copied()
    }

    /// Record the stack-frame offset backing an alloca's result value.
    pub fn set_alloca_offset(&self, v: &Value, offset: i32) {
        self.alloca_offsets.borrow_mut().insert(v.id(), offset);
    }

    /// Generate a fresh, function-unique numeric suffix, for naming
    /// locals/blocks a pass introduces (ABI temps, spill slots, isel
    /// scratch values).
    pub fn next_uniq(&self) -> u32 {
        let n = self.uniq_counter.get();
        self.uniq_counter.set(n + 1);
        n
    }

    /// Generate a fresh name of the form `{prefix}{n}`.
    pub fn fresh_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_uniq())
    }

    /// Hand out a fresh stack offset (positive bytes below the frame
    /// pointer) for a value of the given size/align, bumping `stack_use`.
    pub fn alloc_stack_slot(&self, size: u32, align: u32) -> i32 {
        let align = align.max(1);
        let mut off = self.stack_use.get();
        off = align_up(off, align as i32);
        off += size as i32;
        self.stack_use.set(off);
        off
    }

    /// The maximum byte offset handed out by `alloc_stack_slot` so far —
    /// the sum of alloca sizes plus spill area, maintained incrementally
    /// rather than recomputed.
    pub fn stack_use(&self) -> i32 {
        self.stack_use.get()
    }

    /// Force the running stack-use cursor to at least `min`. Used by the
    /// emitter's prologue sizing once the maximum spill area used by any
    /// call site is known.
    pub fn bump_stack_use(&self, min: i32) {
        if min > self.stack_use.get() {
            self.stack_use.set(min);
        }
    }

    /// Largest outgoing stack-argument area any call site has needed so
    /// far.
    pub fn call_arg_area(&self) -> i32 {
        self.call_arg_area.get()
    }

    /// Record that some call site needs at least `min` bytes of outgoing
    /// stack-argument space.
    pub fn bump_call_arg_area(&self, min: i32) {
        if min > self.call_arg_area.get() {
            self.call_arg_area.set(min);
        }
    }

    /// Whether this function contains any `call`.
    pub fn has_calls(&self) -> bool {
        self.has_calls.get()
    }

    /// Record that this function calls out.
    pub fn set_has_calls(&self) {
        self.has_calls.set(true);
    }

    /// Create a new, empty block (`Unknown` terminator) not yet linked
    /// into any control-flow edge.
    pub fn create_block(&mut self, label: impl Into<String>) -> Block {
        self.blocks.push(BlockData::new(label))
    }

    /// Borrow a block's data.
    pub fn block(&self, b: Block) -> &BlockData {
        &self.blocks[b]
    }

    /// Mutably borrow a block's data.
    pub fn block_mut(&mut self, b: Block) -> &mut BlockData {
        &mut self.blocks[b]
    }

    /// Iterate every block in this function, in arena (declaration) order.
    /// For control-flow order use `crate::ir::function::dfs_order`.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.blocks.keys()
    }

    /// Borrow an instruction's node.
    pub fn inst(&self, i: Inst) -> &InstNode {
        &self.insts[i]
    }

    /// Mutably borrow an instruction's node.
    pub fn inst_mut(&mut self, i: Inst) -> &mut InstNode {
        &mut self.insts[i]
    }

    /// Append `data` to the end of `block`'s instruction list.
    pub fn append_inst(&mut self, block: Block, data: InstData) -> Inst {
        let node = InstNode::new(data, block);
        let inst = self.insts.push(node);
        let last = self.blocks[block].last;
        self.insts[inst].prev = last;
        match last {
            Some(prev) => self.insts[prev].next = Some(inst),
            None => self.blocks[block].first = Some(inst),
        }
        self.blocks[block].last = Some(inst);
        inst
    }

    /// Insert `data` immediately before `before`. Guarantees the new
    /// instruction precedes `before` and that no existing instruction
    /// between `before`'s old predecessor and `before` is reordered.
    pub fn insert_before(&mut self, before: Inst, data: InstData) -> Inst {
        let block = self.insts[before].block;
        let prev = self.insts[before].prev;
        let mut node = InstNode::new(data, block);
        node.prev = prev;
        node.next = Some(before);
        let inst = self.insts.push(node);
        self.insts[before].prev = Some(inst);
        match prev {
            Some(p) => self.insts[p].next = Some(inst),
            None => self.blocks[block].first = Some(inst),
        }
        inst
    }

    /// Insert `data` immediately after `after`.
    pub fn insert_after(&mut self, after: Inst, data: InstData) -> Inst {
        let block = self.insts[after].block;
        let next = self.insts[after].next;
        let mut node = InstNode::new(data, block);
        node.prev = Some(after);
        node.next = next;
        let inst = self.insts.push(node);
        self.insts[after].next = Some(inst);
        match next {
            Some(n) => self.insts[n].prev = Some(inst),
            None => self.blocks[block].last = Some(inst),
        }
        inst
    }

    /// The block `inst` belongs to.
    pub fn inst_block(&self, inst: Inst) -> Block {
        self.insts[inst].block
    }

    /// Iterate a block's instructions in list order.
    pub fn block_insts(&self, block: Block) -> BlockInstIter<'_> {
        BlockInstIter {
            func: self,
            next: self.blocks[block].first,
        }
    }

    /// Does `a` come at or before `b` when walking `block`'s instruction
    /// list from the start? Used by `Lifetime::contains`.
    pub fn inst_precedes(&self, block: Block, a: Inst, b: Inst) -> bool {
        for i in self.block_insts(block) {
            if i == a {
                return true;
            }
            if i == b {
                return false;
            }
        }
        false
    }

    /// Split `block` so that `at` and every instruction after it move into
    /// a freshly created block, which inherits `block`'s terminator (and
    /// the predecessor edges that go with it); `block` itself keeps
    /// everything before `at` and is left with no terminator, which the
    /// caller must set (typically a `Jmp` into the control flow the split
    /// was performed for). Mirrors a loop-expansion pass splitting the
    /// block a `memcpy` was found in so a new loop can be threaded in
    /// before the remainder of the original block runs.
    pub fn split_before(&mut self, block: Block, at: Inst) -> Block {
        debug_assert_eq!(self.insts[at].block, block, "split point not in `block`");
        let new_block = self.create_block(self.fresh_name("split"));

        let before = self.insts[at].prev;
        let old_last = self.blocks[block].last;
        self.insts[at].prev = None;
        self.blocks[new_block].first = Some(at);
        self.blocks[new_block].last = old_last;
        self.blocks[block].last = before;
        match before {
            Some(p) => self.insts[p].next = None,
            None => self.blocks[block].first = None,
        }

        let mut cur = Some(at);
        while let Some(i) = cur {
            self.insts[i].block = new_block;
            cur = self.insts[i].next;
        }

        let terminator = self.blocks[block].terminator();
        self.blocks[new_block].force_terminator(terminator);
        self.blocks[block].force_terminator(Terminator::Unknown);
        for succ in successors(terminator) {
            for pred in self.blocks[succ].predecessors.iter_mut() {
                if *pred == block {
                    *pred = new_block;
                }
            }
        }
        new_block
    }

    /// Depth-first traversal of this function's blocks starting at
    /// `entry`, following `Jmp`/`Branch` terminator edges; each reachable
    /// block is visited exactly once. Panics if a visited block's
    /// terminator is still `Unknown`: every block reachable from the entry
    /// must be finalized before any pass walks the function.
    pub fn dfs_blocks(&self) -> Vec<Block> {
        let mut order = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut stack = vec![self.entry];
        while let Some(b) = stack.pop() {
            if !visited.insert(b) {
                continue;
            }
            order.push(b);
            match self.blocks[b].terminator() {
                Terminator::Unknown => crate::result::panic_invariant(
                    "block traversal hit an unfinalized terminator",
                    &self.blocks[b].label,
                ),
                Terminator::Entry | Terminator::Exit => {}
                Terminator::Jmp(t) => stack.push(t),
                Terminator::Branch(t, f) => {
                    stack.push(f);
                    stack.push(t);
                }
            }
        }
        order
    }
}

/// Iterator over a block's instructions in list order.
pub struct BlockInstIter<'a> {
    func: &'a Function,
    next: Option<Inst>,
}

impl<'a> Iterator for BlockInstIter<'a> {
    type Item = Inst;

    fn next(&mut self) -> Option<Inst> {
        let cur = self.next?;
        self.next = self.func.insts[cur].next;
        Some(cur)
    }
}

fn align_up(offset: i32, align: i32) -> i32 {
    (offset + align - 1) & !(align - 1)
}

/// The blocks `t` transfers control to, if any.
fn successors(t: Terminator) -> smallvec::SmallVec<[Block; 2]> {
    let mut out = smallvec::SmallVec::new();
    match t {
        Terminator::Unknown | Terminator::Entry | Terminator::Exit => {}
        Terminator::Jmp(b) => out.push(b),
        Terminator::Branch(a, b) => {
            out.push(a);
            out.push(b);
        }
    }
    out
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn {} ({} blocks)", self.name, self.blocks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::InstData;
    use crate::ir::types::{Prim, TypeInterner};

    fn sig(ty: Type) -> Signature {
        Signature {
            ret: ty,
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        }
    }

    #[test]
    fn insert_before_preserves_order() {
        let mut ty = TypeInterner::new(8, 8);
        let i4 = ty.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let v1 = Value::literal(i4, 1);
        let v2 = Value::literal(i4, 2);
        let i_ret = f.append_inst(entry, InstData::Return { value: Some(v1) });
        let i_mid = f.insert_before(i_ret, InstData::Return { value: Some(v2) });
        let order: Vec<_> = f.block_insts(entry).collect();
        assert_eq!(order, vec![i_mid, i_ret]);
    }

    #[test]
    fn dfs_blocks_visits_each_block_once() {
        let mut ty = TypeInterner::new(8, 8);
        let i4 = ty.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let b2 = f.create_block("b2");
        f.block_mut(entry).set_terminator(Terminator::Jmp(b2));
        f.block_mut(b2).set_terminator(Terminator::Exit);
        let order = f.dfs_blocks();
        assert_eq!(order, vec![entry, b2]);
    }
}
