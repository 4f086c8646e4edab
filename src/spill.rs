//! Spill pass.
//!
//! Runs once per function, after instruction selection and before register
//! allocation. Two passes, in order:
//!
//! 1. [`spill_cross_block_values`] unconditionally spills every value marked
//!    `lives_across_blocks` by [`crate::ir::lifetime::mark_cross_block_values`]
//!    at its defining instruction: the register allocator that runs after
//!    this pass is block-local, so a value read in more than one block has
//!    no register home that would stay valid across the edge, and memory is
//!    the only safe one.
//! 2. [`spill_under_pressure`] walks each block in isolation, tracking a
//!    running live-register count, and spills a value whenever a new
//!    definition would push that count past `target.scratch_reg_count() -
//!    1`. When the value forcing the spill cannot itself move (a pinned ABI
//!    temp), the most recently defined still-live, movable value is spilt in
//!    its place instead — this crate's `fallback` victim.
//!
//! Both passes rewrite a spilt value the same way: a fresh pointer-typed
//! `alloca` immediately before its definition, a `store` immediately after,
//! and every later read rewritten into a fresh `load` immediately before the
//! instruction that needs it — see [`spill_value`].
//!
//! Lifetimes are recomputed three times: once at the very start (so the
//! cross-block pass has accurate lifetime/liveness data to work from), again
//! after the cross-block pass rewrites the instruction stream (so the
//! pressure pass sees the post-rewrite shape), and a final time once both
//! passes are done. `crate::ir::lifetime`'s own doc comment promises that
//! nothing downstream of this pass needs to recompute again, so regalloc
//! consumes `block.lifetime_map` exactly as this pass leaves it.

use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instruction::InstData;
use crate::ir::lifetime;
use crate::ir::types::TypeInterner;
use crate::ir::value::Value;
use crate::isa::Target;
use log::{debug, trace};
use std::collections::HashSet;

/// Run both spill passes over `func`.
pub fn run(func: &mut Function, types: &mut TypeInterner, target: &Target) {
    debug!("spill: running on {}", func.name);
    recompute_lifetimes(func);

    spill_cross_block_values(func, types);

    recompute_lifetimes(func);

    for block in func.blocks().collect::<Vec<_>>() {
        spill_under_pressure(func, types, target, block);
    }

    recompute_lifetimes(func);
    trace!("spill: {} done, stack_use={}", func.name, func.stack_use());
}

fn recompute_lifetimes(func: &mut Function) {
    for block in func.blocks().collect::<Vec<_>>() {
        lifetime::compute_block_lifetimes(func, block);
    }
    lifetime::mark_cross_block_values(func);
}

// ---------------------------------------------------------------------
// Pass 1: unconditional cross-block spill
// ---------------------------------------------------------------------

fn spill_cross_block_values(func: &mut Function, types: &mut TypeInterner) {
    let mut seen = HashSet::new();
    let mut targets: Vec<Value> = Vec::new();
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if func.inst(inst).skip {
                continue;
            }
            for operand in func.inst(inst).data.operands() {
                if operand.is_volatile() || operand.is_on_stack() || !operand.lives_across_blocks() {
                    continue;
                }
                if seen.insert(operand.id()) {
                    targets.push(operand.retain());
                }
            }
        }
    }

    let all_blocks: Vec<Block> = func.blocks().collect();
    for v in &targets {
        if !v.can_move() {
            // A pinned ABI/backend temp never legitimately crosses a block
            // boundary; if one somehow does, its pin already says where it
            // lives, so there's nothing for this pass to do.
            continue;
        }
        let (def_block, def_inst) = match find_def(func, v.id()) {
            Some(x) => x,
            None => crate::result::panic_invariant(
                "spill: a value crossing blocks has no defining instruction",
                &func.name,
            ),
        };
        trace!("spill: {} crosses blocks, spilling unconditionally", func.name);
        spill_value(func, types, v, def_block, def_inst, &all_blocks);
    }
}

/// Find the instruction that defines the value identified by `id`, if any.
fn find_def(func: &Function, id: usize) -> Option<(Block, Inst)> {
    for block in func.blocks() {
        for inst in func.block_insts(block) {
            if func.inst(inst).skip {
                continue;
            }
            if let Some(r) = func.inst(inst).data.result() {
                if r.id() == id {
                    return Some((block, inst));
                }
            }
        }
    }
    None
}

/// Spill `v`, defined at `def_inst` in `def_block`: insert `alloca`/`store`
/// around the definition, then rewrite every later read of `v` within
/// `scan_blocks` into a fresh `load`.
fn spill_value(
    func: &mut Function,
    types: &mut TypeInterner,
    v: &Value,
    _def_block: Block,
    def_inst: Inst,
    scan_blocks: &[Block],
) {
    let ptr_ty = types.intern_ptr(v.ty());
    let slot = Value::alloca(ptr_ty, func.fresh_name("spill"));
    func.insert_before(def_inst, InstData::Alloca { result: slot.retain() });
    let size = types.size_of(v.ty()).max(1);
    let align = types.align_of(v.ty()).max(1);
    let off = func.alloc_stack_slot(size, align);
    func.set_alloca_offset(&slot, off);
    let store_inst = func.insert_after(
        def_inst,
        InstData::Store {
            from: v.retain(),
            ptr: slot.retain(),
        },
    );

    for &block in scan_blocks {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if inst == def_inst || inst == store_inst || func.inst(inst).skip {
                continue;
            }
            if !func.inst(inst).data.operands().iter().any(|o| o.id() == v.id()) {
                continue;
            }
            let loaded = Value::from_inst(v.ty(), func.fresh_name("reload"));
            func.insert_before(
                inst,
                InstData::Load {
                    ptr: slot.retain(),
                    result: loaded.retain(),
                },
            );
            crate::isel::replace_operand_value(&mut func.inst_mut(inst).data, v.id(), &loaded);
        }
    }
}

// ---------------------------------------------------------------------
// Pass 2: block-local pressure spill
// ---------------------------------------------------------------------

fn spill_under_pressure(func: &mut Function, types: &mut TypeInterner, target: &Target, block: Block) {
    let limit = target.scratch_reg_count().saturating_sub(1);
    // `live` pairs each currently-live, register-class value with the
    // instruction that defined it, so a value picked for eviction (either
    // itself or the fallback) can have its `alloca`/`store` inserted at the
    // right point.
    let mut live: Vec<(Value, Inst)> = Vec::new();
    let mut fallback: Option<(Value, Inst)> = None;

    let insts: Vec<Inst> = func.block_insts(block).collect();
    for inst in insts {
        if func.inst(inst).skip {
            continue;
        }
        let ends_here = |v: &Value| -> bool {
            func.block(block)
                .lifetime_map
                .get(&v.id())
                .map_or(false, |lt| lt.end == inst)
        };
        live.retain(|(v, _)| !ends_here(v));
        if let Some((v, _)) = &fallback {
            if ends_here(v) {
                fallback = None;
            }
        }

        let result = match func.inst(inst).data.result() {
            Some(r) => r.retain(),
            None => continue,
        };
        if result.is_volatile() || result.is_on_stack() {
            continue;
        }

        if live.len() < limit {
            live.push((result.clone(), inst));
            fallback = Some((result, inst));
            continue;
        }

        if result.can_move() {
            trace!("spill: {} pressure-spilling its own new definition", func.name);
            spill_value(func, types, &result, block, inst, &[block]);
            // Spilt immediately: never occupies a live register slot.
        } else if let Some((victim, victim_def)) = fallback.take() {
            trace!("spill: {} pressure-spilling the fallback victim", func.name);
            spill_value(func, types, &victim, block, victim_def, &[block]);
            live.retain(|(v, _)| v.id() != victim.id());
            live.push((result.clone(), inst));
            fallback = Some((result, inst));
        } else {
            // No movable value anywhere to evict (e.g. the very first
            // definition in a block already exceeds pressure). Let it
            // through: the allocator either finds a spare register anyway
            // or fails loudly.
            live.push((result.clone(), inst));
            fallback = Some((result, inst));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::function::{Function, Signature};
    use crate::ir::types::{Prim, TypeInterner};
    use crate::ir::value::Location;
    use crate::isa::CallConv;

    fn sig(ret: Type) -> Signature {
        Signature {
            ret,
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        }
    }

    use crate::ir::types::Type;

    fn target() -> Target {
        Target::parse("x86_64-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn cross_block_value_is_spilt_and_reloaded() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let b2 = f.create_block("b2");

        let v = Value::from_inst(i4, "v");
        builder::binary(
            &mut f,
            &types,
            entry,
            crate::ir::BinOp::Add,
            &Value::literal(i4, 1),
            &Value::literal(i4, 1),
            v.clone(),
        );
        builder::jump(&mut f, &types, entry, b2);
        builder::ret(&mut f, &types, b2, Some(&v));

        run(&mut f, &mut types, &target());

        let mut saw_store = false;
        let mut saw_load = false;
        for block in f.blocks() {
            for inst in f.block_insts(block) {
                match &f.inst(inst).data {
                    InstData::Store { from, .. } if from.same_value(&v) => saw_store = true,
                    InstData::Load { .. } => saw_load = true,
                    _ => {}
                }
            }
        }
        assert!(saw_store, "cross-block value must be stored at its def");
        assert!(saw_load, "cross-block value's use in the other block must be a reload");
    }

    #[test]
    fn value_confined_to_one_block_is_left_alone() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let v = Value::from_inst(i4, "v");
        builder::binary(
            &mut f,
            &types,
            entry,
            crate::ir::BinOp::Add,
            &Value::literal(i4, 1),
            &Value::literal(i4, 1),
            v.clone(),
        );
        builder::ret(&mut f, &types, entry, Some(&v));

        run(&mut f, &mut types, &target());

        assert_eq!(v.location(), Location::any_reg());
    }
}
