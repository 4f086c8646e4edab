//! Entity references used inside a [`crate::ir::function::Function`].
//!
//! Blocks and instructions are referenced by opaque, `Copy` indices rather
//! than Rust references, the same way `cranelift_entity` keys are used
//! throughout this crate: a `Block`/`Inst` is a lightweight `u32` wrapping
//! an index into the owning function's tables, so the IR can be mutated
//! (instructions inserted, blocks reordered) without invalidating existing
//! handles.
//!
//! [`crate::ir::value::Value`] is deliberately *not* an entity reference:
//! it is reference-counted (see that module), because values, unlike
//! blocks and instructions, are shared directly between instructions and
//! need their own identity and lifetime independent of any single owning
//! table.

use crate::entity::entity_impl;

/// A reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");
