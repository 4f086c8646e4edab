//! Register allocator.
//!
//! Runs once per function, after the spill pass, over each block
//! independently: nothing here ever looks at another block's
//! `regusemarks` or lifetime map. Three passes per block:
//!
//! 1. [`mark_pinned_registers`] walks every operand already pinned to a
//!    specific physical register — ABI temps from `crate::abi`/`crate::isel`
//!    — and marks that register occupied on every instruction covered by the
//!    pin's lifetime.
//! 2. The clobber pass folds each instruction's own `clobbers` list into its
//!    `regusemarks` (e.g. the div family's implicit D-register kill).
//! 3. [`allocate_block`]'s allocation walk assigns every still-unlocated
//!    value's definition a physical register: either by mirroring the
//!    register of an ABI temp it's copied from (skipping a redundant move),
//!    or by scanning the target's scratch pool for the first register free
//!    across the value's whole lifetime.
//!
//! A register counts as "free across a lifetime" if no covered instruction
//! has it in `regusemarks` — except a pinned value's own register may
//! overlap with the lifetime of a value being mirrored onto it, as long as
//! every such overlap instruction falls inside an `implicit_use` bracket that
//! covers the pinned value — an explicit carve-out for exactly that case.
//!
//! By construction (`crate::spill::run`'s cross-block pass and
//! `isa::AbiRegs::scratch_gpr` excluding every callee-saved register), every
//! value reaching this pass is either block-local or already has a fixed
//! location, and every register this pass hands out is safe to clobber
//! without saving/restoring it — callee-save bookkeeping reduces to nothing
//! beyond the frame pointer itself.

use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instruction::InstData;
use crate::ir::lifetime::Lifetime;
use crate::ir::value::{Location, Place, PhysReg, Value, ValueKind};
use crate::isa::Target;
use log::{debug, trace};
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

/// Allocate registers for every block of `func`.
pub fn run(func: &mut Function, target: &Target) {
    debug!("regalloc: running on {}", func.name);
    for block in func.blocks().collect::<Vec<_>>() {
        allocate_block(func, target, block);
    }
}

fn allocate_block(func: &mut Function, target: &Target, block: Block) {
    let order: Vec<Inst> = func.block_insts(block).collect();
    let mut pos: HashMap<Inst, usize> = HashMap::new();
    for (i, &inst) in order.iter().enumerate() {
        pos.insert(inst, i);
    }

    mark_pinned_registers(func, block, &order, &pos);

    for &inst in &order {
        let clobbers = func.inst(inst).clobbers;
        let node = func.inst_mut(inst);
        node.regusemarks = node.regusemarks.union(clobbers);
    }

    let implicit = implicit_use_cover(func, &order);

    for &inst in &order {
        if func.inst(inst).skip {
            continue;
        }
        let result = match func.inst(inst).data.result() {
            Some(r) => r.retain(),
            None => continue,
        };
        if result.is_volatile() || !matches!(result.location().place, Place::AnyReg) {
            continue;
        }
        let lifetime = match func.block(block).lifetime_map.get(&result.id()).copied() {
            Some(lt) => lt,
            None => Lifetime::point(inst),
        };
        let range = pos[&lifetime.start]..=pos[&lifetime.end];

        if try_mirror(func, &order, &pos, range.clone(), inst, &result, &implicit) {
            continue;
        }

        let chosen = target
            .abi
            .scratch_gpr
            .iter()
            .copied()
            .find(|&r| is_free(func, &order, range.clone(), r));

        match chosen {
            Some(r) => {
                trace!("regalloc: {} assigning {:?} a scratch register", func.name, result);
                result.set_location(Location::specific_reg(r));
                mark_busy(func, &order, range, r);
            }
            None => crate::result::panic_invariant(
                "regalloc: no scratch register is free across this value's lifetime",
                &func.name,
            ),
        }
    }
}

/// If `inst` defines `result` via a plain copy from an ABI temp, and that
/// temp's register is free across `range` except inside brackets that cover
/// the temp itself, pin `result` to the same register and report success.
fn try_mirror(
    func: &mut Function,
    order: &[Inst],
    _pos: &HashMap<Inst, usize>,
    range: RangeInclusive<usize>,
    inst: Inst,
    result: &Value,
    implicit: &HashMap<Inst, HashSet<usize>>,
) -> bool {
    let (from_id, r) = match &func.inst(inst).data {
        InstData::Copy { from, .. } if matches!(from.kind(), ValueKind::AbiTemp) => match from.location().place {
            Place::SpecificReg(r) => (from.id(), r),
            _ => return false,
        },
        _ => return false,
    };
    if !can_mirror(func, order, range.clone(), r, from_id, implicit) {
        return false;
    }
    trace!("regalloc: mirroring an ABI temp's register into its copy destination");
    result.set_location(Location::specific_reg(r));
    mark_busy(func, order, range, r);
    true
}

fn can_mirror(
    func: &Function,
    order: &[Inst],
    range: RangeInclusive<usize>,
    r: PhysReg,
    abi_temp_id: usize,
    implicit: &HashMap<Inst, HashSet<usize>>,
) -> bool {
    for &i in &order[*range.start()..=*range.end()] {
        if !func.inst(i).regusemarks.contains(r) {
            continue;
        }
        let excused = implicit.get(&i).map_or(false, |ids| ids.contains(&abi_temp_id));
        if !excused {
            return false;
        }
    }
    true
}

fn is_free(func: &Function, order: &[Inst], range: RangeInclusive<usize>, r: PhysReg) -> bool {
    order[*range.start()..=*range.end()]
        .iter()
        .all(|&i| !func.inst(i).regusemarks.contains(r))
}

fn mark_busy(func: &mut Function, order: &[Inst], range: RangeInclusive<usize>, r: PhysReg) {
    for &i in &order[*range.start()..=*range.end()] {
        func.inst_mut(i).regusemarks.insert(r);
    }
}

/// For every value pinned to a specific register, mark that register
/// occupied on every instruction its lifetime covers.
fn mark_pinned_registers(func: &mut Function, block: Block, order: &[Inst], pos: &HashMap<Inst, usize>) {
    let mut seen_ids: HashSet<usize> = HashSet::new();
    let mut todo: Vec<(Lifetime, PhysReg)> = Vec::new();
    for &inst in order {
        if func.inst(inst).skip {
            continue;
        }
        for operand in func.inst(inst).data.operands() {
            if operand.is_volatile() {
                continue;
            }
            if let Place::SpecificReg(r) = operand.location().place {
                if seen_ids.insert(operand.id()) {
                    if let Some(lt) = func.block(block).lifetime_map.get(&operand.id()).copied() {
                        todo.push((lt, r));
                    }
                }
            }
        }
    }
    for (lt, r) in todo {
        let range = pos[&lt.start]..=pos[&lt.end];
        mark_busy(func, order, range, r);
    }
}

/// For every instruction in `order`, the set of value ids currently inside
/// an `implicit_use_start`/`implicit_use_end` bracket (inclusive of both
/// ends).
fn implicit_use_cover(func: &Function, order: &[Inst]) -> HashMap<Inst, HashSet<usize>> {
    let mut active: HashSet<usize> = HashSet::new();
    let mut open: HashMap<u32, Vec<usize>> = HashMap::new();
    let mut result: HashMap<Inst, HashSet<usize>> = HashMap::new();

    for &inst in order {
        if let InstData::ImplicitUseStart { id, values } = &func.inst(inst).data {
            let ids: Vec<usize> = values.iter().map(|v| v.id()).collect();
            for &vid in &ids {
                active.insert(vid);
            }
            open.insert(*id, ids);
        }
        result.insert(inst, active.clone());
        if let InstData::ImplicitUseEnd { id } = &func.inst(inst).data {
            if let Some(ids) = open.remove(id) {
                for vid in ids {
                    active.remove(&vid);
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::function::{Function, Signature};
    use crate::ir::lifetime;
    use crate::ir::types::{Prim, Type, TypeInterner};
    use crate::ir::value::Place;
    use crate::isa::x86_64::registers::RAX;
    use crate::isa::CallConv;

    fn sig(ret: Type) -> Signature {
        Signature {
            ret,
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        }
    }

    fn target() -> Target {
        Target::parse("x86_64-unknown-linux-gnu").unwrap()
    }

    fn prepare(f: &mut Function, block: Block) {
        lifetime::compute_block_lifetimes(f, block);
        lifetime::mark_cross_block_values(f);
    }

    #[test]
    fn mirrors_abi_temp_register_into_copy_destination() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let abi_temp = Value::abi_temp(i4, RAX);
        let dest = Value::from_inst(i4, "dest");
        builder::copy(&mut f, &types, entry, &abi_temp, dest.clone());
        builder::ret(&mut f, &types, entry, Some(&dest));

        prepare(&mut f, entry);
        run(&mut f, &target());

        assert!(dest.is_reg_specific(RAX));
    }

    #[test]
    fn allocates_a_scratch_register_for_an_ordinary_value() {
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

        prepare(&mut f, entry);
        run(&mut f, &target());

        assert!(!matches!(v.location().place, Place::AnyReg));
        assert!(v.is_reg());
    }
}
