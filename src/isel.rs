//! Instruction selection pass.
//!
//! Runs once per function, after the ABI pass and before spilling. Three
//! phases, in order:
//!
//! **A. Pointer-arithmetic lowering** ([`lower_pointer_arith`]) rewrites
//! `ptradd`/`ptrsub` and array-indexed `elem` into raw byte-level address
//! arithmetic (`ptrtoint`/multiply/`add`-or-`sub`/`inttoptr`). Field-indexed
//! `elem` is left alone; the emitter resolves its constant offset directly.
//!
//! **B. CISC operand reservation** ([`reserve_cisc`]) pins the div/mod and
//! shift families to their fixed x86 registers, synthesizing the
//! sign/zero-extension and register-zeroing code each needs.
//!
//! Memcpy expansion ([`expand_memcpys`]) runs next, lowering small copies to
//! a load/store pair and large copies to a real runtime loop (new basic
//! blocks via [`crate::ir::function::Function::split_before`]).
//!
//! **C. Generic operand satisfaction** ([`satisfy_operands`]) matches each
//! remaining instruction's current operand categories against
//! [`crate::isa::x86_64::tables::rows_for`] and inserts whatever copies/
//! stack slots the closest-matching row still requires.
//!
//! Stack slots for every `alloca` in the function — the ones already in the
//! IR plus the ones this pass's memcpy expansion synthesizes — are assigned
//! last, by [`assign_alloca_slots`].
//!
//! This pass does not reprocess instructions it inserts: each phase walks a
//! snapshot of the instructions present when it starts. A conversion copy
//! synthesized by phase C is built to always be directly emittable (a fresh
//! register-class temporary on one side), so it never itself needs a trip
//! back through phase C.

use crate::ir::block::Terminator;
use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instruction::{CallTarget, ElemIndex, InstData};
use crate::ir::types::{Prim, Type, TypeInterner};
use crate::ir::value::{operand_category, Constraint, Location, OperandClass, Value};
use crate::ir::{BinOp, CmpOp, RegMask};
use crate::isa::x86_64::tables::{rows_for, ConstraintRow, GenericOpcode};
use crate::isa::Target;
use log::{debug, trace};
use smallvec::{smallvec, SmallVec};

/// Run every isel phase over `func`.
pub fn run(func: &mut Function, types: &mut TypeInterner, target: &Target) {
    debug!("isel: lowering {}", func.name);
    lower_pointer_arith(func, types);
    elide_noop_extends(func, types);
    reserve_cisc(func, types, target);
    expand_memcpys(func, types);
    assign_alloca_slots(func, types);
    satisfy_operands(func, types);
    trace!("isel: {} done, stack_use={}", func.name, func.stack_use());
}

/// A forward-only insertion cursor: each `push` lands immediately after the
/// previous one (or appends to `block` if nothing has been pushed yet).
/// Used to build an ordered chain of freshly synthesized instructions.
struct Cursor {
    block: Block,
    after: Option<Inst>,
}

impl Cursor {
    fn push(&mut self, func: &mut Function, data: InstData) -> Inst {
        let inst = match self.after {
            Some(a) => func.insert_after(a, data),
            None => func.append_inst(self.block, data),
        };
        self.after = Some(inst);
        inst
    }
}

/// Compute `base` reinterpreted/offset as `ptr(elem_ty) + byte_offset`, via
/// `ptrtoint`/`add`/`inttoptr`. `byte_offset == 0` with a different `elem_ty`
/// than `base`'s own pointee is a pure pointer-type reinterpretation (the
/// cast step memcpy expansion uses); nonzero `byte_offset` additionally
/// advances the address.
fn relocate_ptr(
    func: &mut Function,
    types: &mut TypeInterner,
    cur: &mut Cursor,
    base: &Value,
    elem_ty: Type,
    byte_offset: i64,
) -> Value {
    let iptr_ty = types.primitive_less_or_equal(types.ptr_size(), false);
    let as_int = Value::from_inst(iptr_ty, func.fresh_name("isel.addr"));
    cur.push(
        func,
        InstData::PtrToInt {
            from: base.retain(),
            result: as_int.retain(),
        },
    );
    let addr = if byte_offset == 0 {
        as_int
    } else {
        let summed = Value::from_inst(iptr_ty, func.fresh_name("isel.addr"));
        cur.push(
            func,
            InstData::Binary {
                op: BinOp::Add,
                lhs: as_int,
                rhs: Value::literal(iptr_ty, byte_offset as i128),
                result: summed.retain(),
            },
        );
        summed
    };
    let ptr_ty = types.intern_ptr(elem_ty);
    let result = Value::from_inst(ptr_ty, func.fresh_name("isel.addr"));
    cur.push(
        func,
        InstData::IntToPtr {
            from: addr,
            result: result.retain(),
        },
    );
    result
}

// ---------------------------------------------------------------------
// Phase A: pointer-arithmetic lowering
// ---------------------------------------------------------------------

/// Rewrite every `ptradd`/`ptrsub`/array-indexed `elem` in `func` into raw
/// byte-level arithmetic. Field-indexed `elem` is left untouched.
fn lower_pointer_arith(func: &mut Function, types: &mut TypeInterner) {
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            lower_pointer_arith_inst(func, types, inst);
        }
    }
}

fn lower_pointer_arith_inst(func: &mut Function, types: &mut TypeInterner, inst: Inst) {
    match func.inst(inst).data.clone() {
        InstData::PtrAdd { base, offset, result } => {
            let pointee = types
                .deref(base.ty())
                .unwrap_or_else(|| crate::result::panic_invariant("ptradd base is not a pointer", &func.name));
            let step = types.size_of(pointee);
            let base_int = relocate_ptr_to_int(func, types, inst, &base);
            let iptr_ty = types.primitive_less_or_equal(types.ptr_size(), false);
            let offset_casted = widen_to(func, types, inst, &offset, iptr_ty);
            let scaled = if step == 1 {
                offset_casted
            } else {
                let tmp = Value::from_inst(iptr_ty, func.fresh_name("ptradd.mul"));
                func.insert_before(
                    inst,
                    InstData::Binary {
                        op: BinOp::Mul,
                        lhs: offset_casted,
                        rhs: Value::literal(iptr_ty, step as i128),
                        result: tmp.retain(),
                    },
                );
                tmp
            };
            let summed = Value::from_inst(iptr_ty, func.fresh_name("ptradd.sum"));
            func.insert_before(
                inst,
                InstData::Binary {
                    op: BinOp::Add,
                    lhs: base_int,
                    rhs: scaled,
                    result: summed.retain(),
                },
            );
            func.inst_mut(inst).data = InstData::IntToPtr { from: summed, result };
        }
        InstData::PtrSub { base, offset, result } => {
            let pointee = types
                .deref(base.ty())
                .unwrap_or_else(|| crate::result::panic_invariant("ptrsub base is not a pointer", &func.name));
            let step = types.size_of(pointee);
            let base_int = relocate_ptr_to_int(func, types, inst, &base);
            let offset_int = relocate_ptr_to_int(func, types, inst, &offset);
            if step == 1 {
                func.inst_mut(inst).data = InstData::Binary {
                    op: BinOp::Sub,
                    lhs: base_int,
                    rhs: offset_int,
                    result,
                };
            } else {
                let diff = Value::from_inst(result.ty(), func.fresh_name("ptrsub.diff"));
                func.insert_before(
                    inst,
                    InstData::Binary {
                        op: BinOp::Sub,
                        lhs: base_int,
                        rhs: offset_int,
                        result: diff.retain(),
                    },
                );
                func.inst_mut(inst).data = InstData::Binary {
                    op: BinOp::UDiv,
                    lhs: diff,
                    rhs: Value::literal(result.ty(), step as i128),
                    result,
                };
            }
        }
        InstData::Elem { base, index: ElemIndex::ArrayIndex(index), result } => {
            let pointee = types
                .deref(result.ty())
                .unwrap_or_else(|| crate::result::panic_invariant("elem result is not a pointer", &func.name));
            let step = types.size_of(pointee);
            if step == 1 {
                return;
            }
            let tmp = Value::from_inst(index.ty(), func.fresh_name("elem.mul"));
            func.insert_before(
                inst,
                InstData::Binary {
                    op: BinOp::Mul,
                    lhs: index.retain(),
                    rhs: Value::literal(index.ty(), step as i128),
                    result: tmp.retain(),
                },
            );
            func.inst_mut(inst).data = InstData::Elem {
                base,
                index: ElemIndex::ArrayIndex(tmp),
                result,
            };
        }
        _ => {}
    }
}

/// `ptrtoint base`, inserted immediately before `anchor`.
fn relocate_ptr_to_int(func: &mut Function, types: &mut TypeInterner, anchor: Inst, base: &Value) -> Value {
    let iptr_ty = types.primitive_less_or_equal(types.ptr_size(), false);
    let as_int = Value::from_inst(iptr_ty, func.fresh_name("isel.addr"));
    func.insert_before(
        anchor,
        InstData::PtrToInt {
            from: base.retain(),
            result: as_int.retain(),
        },
    );
    as_int
}

/// Cast `v` to `target_ty` if its size differs, via sign-extend/truncate,
/// inserted immediately before `anchor`.
fn widen_to(func: &mut Function, types: &mut TypeInterner, anchor: Inst, v: &Value, target_ty: Type) -> Value {
    let have = types.size_of(v.ty());
    let want = types.size_of(target_ty);
    if have == want {
        return v.retain();
    }
    let result = Value::from_inst(target_ty, func.fresh_name("isel.cast"));
    if have < want {
        func.insert_before(
            anchor,
            InstData::Extend {
                signed: true,
                from: v.retain(),
                result: result.retain(),
            },
        );
    } else {
        func.insert_before(
            anchor,
            InstData::Truncate {
                from: v.retain(),
                result: result.retain(),
            },
        );
    }
    result
}

/// A `zext`/`sext` whose source and destination are the same size is a
/// no-op: skip the instruction and splice every later reference to its
/// result directly onto its source instead.
fn elide_noop_extends(func: &mut Function, types: &TypeInterner) {
    let mut replacements: Vec<(usize, Value)> = Vec::new();
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if let InstData::Extend { from, result, .. } = &func.inst(inst).data {
                if types.size_of(from.ty()) == types.size_of(result.ty()) {
                    replacements.push((result.id(), from.retain()));
                    func.inst_mut(inst).skip = true;
                }
            }
        }
    }
    if replacements.is_empty() {
        return;
    }
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            for (old_id, new) in &replacements {
                replace_operand_value(&mut func.inst_mut(inst).data, *old_id, new);
            }
        }
    }
}

/// Overwrite every occurrence of the value identified by `old_id` within
/// `data`'s operands with `new`.
pub(crate) fn replace_operand_value(data: &mut InstData, old_id: usize, new: &Value) {
    let maybe_replace = |v: &mut Value| {
        if v.id() == old_id {
            *v = new.retain();
        }
    };
    match data {
        InstData::Load { ptr, result } => {
            maybe_replace(ptr);
            maybe_replace(result);
        }
        InstData::Store { from, ptr } => {
            maybe_replace(from);
            maybe_replace(ptr);
        }
        InstData::Alloca { result } => maybe_replace(result),
        InstData::Elem { base, index, result } => {
            maybe_replace(base);
            if let ElemIndex::ArrayIndex(i) = index {
                maybe_replace(i);
            }
            maybe_replace(result);
        }
        InstData::PtrAdd { base, offset, result } | InstData::PtrSub { base, offset, result } => {
            maybe_replace(base);
            maybe_replace(offset);
            maybe_replace(result);
        }
        InstData::Binary { lhs, rhs, result, .. } | InstData::Cmp { lhs, rhs, result, .. } => {
            maybe_replace(lhs);
            maybe_replace(rhs);
            maybe_replace(result);
        }
        InstData::Copy { from, to } => {
            maybe_replace(from);
            maybe_replace(to);
        }
        InstData::Memcpy { dst, src, .. } => {
            maybe_replace(dst);
            maybe_replace(src);
        }
        InstData::Extend { from, result, .. } | InstData::Truncate { from, result } => {
            maybe_replace(from);
            maybe_replace(result);
        }
        InstData::PtrToInt { from, result } | InstData::IntToPtr { from, result } => {
            maybe_replace(from);
            maybe_replace(result);
        }
        InstData::Return { value: Some(v) } => maybe_replace(v),
        InstData::Return { value: None } => {}
        InstData::Branch { cond, .. } => maybe_replace(cond),
        InstData::Jump { .. } | InstData::Label { .. } => {}
        InstData::JumpIndirect { target } => maybe_replace(target),
        InstData::Call { result, callee, args } => {
            if let CallTarget::Indirect(f) = callee {
                maybe_replace(f);
            }
            for a in args {
                maybe_replace(&mut a.value);
            }
            if let Some(r) = result {
                maybe_replace(r);
            }
        }
        InstData::Asm { operands, .. } => {
            for o in operands {
                maybe_replace(o);
            }
        }
        InstData::ImplicitUseStart { values, .. } => {
            for v in values {
                maybe_replace(v);
            }
        }
        InstData::ImplicitUseEnd { .. } => {}
    }
}

// ---------------------------------------------------------------------
// Phase B: CISC operand reservation
// ---------------------------------------------------------------------

/// Pin every div/mod/shift instruction's fixed-register operands.
fn reserve_cisc(func: &mut Function, types: &mut TypeInterner, target: &Target) {
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if let InstData::Binary { op, lhs, rhs, result } = func.inst(inst).data.clone() {
                if op.is_div_family() {
                    reserve_div(func, types, target, inst, op, &lhs, &rhs, &result);
                } else if op.is_shift() {
                    reserve_shift(func, types, target, inst, op, &lhs, &rhs, &result);
                }
            }
        }
    }
}

fn reserve_div(
    func: &mut Function,
    types: &TypeInterner,
    target: &Target,
    inst: Inst,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    result: &Value,
) {
    let abi = &target.abi;
    let opty = lhs.ty();
    let optysz = types.size_of(opty);
    let is_div = matches!(op, BinOp::SDiv | BinOp::UDiv);
    let is_signed = op.is_signed_div();

    let pinned_lhs = Value::abi_temp(opty, abi.div_a);
    func.insert_before(
        inst,
        InstData::Copy {
            from: lhs.retain(),
            to: pinned_lhs.retain(),
        },
    );

    if optysz >= 4 {
        let d = Value::abi_temp(opty, abi.div_d);
        if is_signed {
            let mnemonic = if optysz == 8 { "cqto" } else { "cltd" };
            let asm = func.insert_before(
                inst,
                InstData::Asm {
                    template: mnemonic.to_string(),
                    operands: vec![],
                },
            );
            let mut clobbers = RegMask::new();
            clobbers.insert(abi.div_d);
            func.inst_mut(asm).clobbers = clobbers;
        } else {
            func.insert_before(
                inst,
                InstData::Copy {
                    from: Value::literal(opty, 0),
                    to: d.retain(),
                },
            );
            let id = func.next_uniq();
            func.insert_before(
                inst,
                InstData::ImplicitUseStart {
                    id,
                    values: vec![d.retain()],
                },
            );
            func.insert_after(inst, InstData::ImplicitUseEnd { id });
        }
    }

    let target_reg = if is_div { abi.div_a } else { abi.div_d };
    let pinned_result = Value::abi_temp(result.ty(), target_reg);
    func.insert_after(
        inst,
        InstData::Copy {
            from: pinned_result.retain(),
            to: result.retain(),
        },
    );

    func.inst_mut(inst).data = InstData::Binary {
        op,
        lhs: pinned_lhs,
        rhs: rhs.retain(),
        result: pinned_result,
    };
}

fn reserve_shift(
    func: &mut Function,
    types: &mut TypeInterner,
    target: &Target,
    inst: Inst,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    result: &Value,
) {
    use crate::ir::value::ValueKind;

    let i1 = types.intern_primitive(Prim::I1);

    let new_rhs = match rhs.kind() {
        ValueKind::Literal(bits) => {
            // Compile-time truncation: no instruction needed, just a
            // narrower literal of the same bits.
            Value::literal(i1, *bits)
        }
        _ => {
            let narrowed = if types.size_of(rhs.ty()) > types.size_of(i1) {
                let t = Value::from_inst(i1, func.fresh_name("shift.trunc"));
                func.insert_before(
                    inst,
                    InstData::Truncate {
                        from: rhs.retain(),
                        result: t.retain(),
                    },
                );
                t
            } else {
                rhs.retain()
            };
            let pinned = Value::abi_temp(narrowed.ty(), target.abi.shift_c);
            func.insert_before(
                inst,
                InstData::Copy {
                    from: narrowed,
                    to: pinned.retain(),
                },
            );
            pinned
        }
    };

    func.inst_mut(inst).data = InstData::Binary {
        op,
        lhs: lhs.retain(),
        rhs: new_rhs,
        result: result.retain(),
    };
}

// ---------------------------------------------------------------------
// Memcpy expansion
// ---------------------------------------------------------------------

/// Expand every still-unexpanded `memcpy` in `func`.
fn expand_memcpys(func: &mut Function, types: &mut TypeInterner) {
    let mut blocks: Vec<Block> = func.blocks().collect();
    let mut i = 0;
    while i < blocks.len() {
        let block = blocks[i];
        i += 1;
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if func.inst(inst).skip {
                continue;
            }
            let (dst, src, len) = match &func.inst(inst).data {
                InstData::Memcpy { dst, src, len } => (dst.retain(), src.retain(), *len),
                _ => continue,
            };
            if let Some(new_block) = expand_memcpy(func, types, block, inst, &dst, &src, len) {
                blocks.push(new_block);
            }
        }
    }
}

fn expand_memcpy(
    func: &mut Function,
    types: &mut TypeInterner,
    block: Block,
    inst: Inst,
    dst: &Value,
    src: &Value,
    len: u64,
) -> Option<Block> {
    if len == 0 {
        func.inst_mut(inst).skip = true;
        return None;
    }
    let ptr_size = types.ptr_size() as u64;
    if len <= ptr_size {
        let mut cur = Cursor { block, after: Some(inst) };
        expand_memcpy_small(func, types, &mut cur, dst, src, len as u32);
        func.inst_mut(inst).skip = true;
        None
    } else {
        Some(expand_memcpy_large(func, types, block, inst, dst, src, len))
    }
}

/// `len <= ptr_size`: cast both pointers to the largest primitive that fits
/// `len` bytes and do one load/store through it.
fn expand_memcpy_small(
    func: &mut Function,
    types: &mut TypeInterner,
    cur: &mut Cursor,
    dst: &Value,
    src: &Value,
    len: u32,
) {
    let prim = types.primitive_less_or_equal(len, false);
    let dcasted = relocate_ptr(func, types, cur, dst, prim, 0);
    let scasted = relocate_ptr(func, types, cur, src, prim, 0);
    let loaded = Value::from_inst(prim, func.fresh_name("memcpy.v"));
    cur.push(
        func,
        InstData::Load {
            ptr: scasted,
            result: loaded.retain(),
        },
    );
    cur.push(func, InstData::Store { from: loaded, ptr: dcasted });
}

/// `len > ptr_size`: a real runtime loop copying one pointer-sized word at a
/// time, plus a small-copy tail for the remainder. Returns the block
/// holding whatever came after the original `memcpy` (the loop's successor).
fn expand_memcpy_large(
    func: &mut Function,
    types: &mut TypeInterner,
    block: Block,
    inst: Inst,
    dst: &Value,
    src: &Value,
    len: u64,
) -> Block {
    let ptr_size = types.ptr_size();
    let sizet = types.primitive_less_or_equal(ptr_size, false);
    let sizet_ptr = types.intern_ptr(sizet);
    let sizet_ptrptr = types.intern_ptr(sizet_ptr);
    let i1 = types.intern_primitive(Prim::I1);

    let blk_init = func.create_block(func.fresh_name("memcpy.init"));
    let blk_loop = func.create_block(func.fresh_name("memcpy.loop"));
    let blk_copy = func.create_block(func.fresh_name("memcpy.copy"));

    let blk_fin = func.split_before(block, inst);
    func.append_inst(block, InstData::Jump { target: blk_init });
    func.block_mut(block).set_terminator(Terminator::Jmp(blk_init));
    func.block_mut(blk_init).predecessors.push(block);

    let cnt = Value::alloca(sizet_ptr, func.fresh_name("memcpy.cnt"));
    let a = Value::alloca(sizet_ptrptr, func.fresh_name("memcpy.a"));
    let b = Value::alloca(sizet_ptrptr, func.fresh_name("memcpy.b"));
    func.append_inst(blk_init, InstData::Alloca { result: cnt.retain() });
    func.append_inst(blk_init, InstData::Alloca { result: a.retain() });
    func.append_inst(blk_init, InstData::Alloca { result: b.retain() });
    func.append_inst(
        blk_init,
        InstData::Store {
            from: Value::literal(sizet, len as i128),
            ptr: cnt.retain(),
        },
    );
    let mut cur = Cursor { block: blk_init, after: func.block(blk_init).last_inst() };
    let a_casted = relocate_ptr(func, types, &mut cur, dst, sizet, 0);
    let b_casted = relocate_ptr(func, types, &mut cur, src, sizet, 0);
    cur.push(func, InstData::Store { from: a_casted, ptr: a.retain() });
    cur.push(func, InstData::Store { from: b_casted, ptr: b.retain() });
    cur.push(func, InstData::Jump { target: blk_loop });
    func.block_mut(blk_init).set_terminator(Terminator::Jmp(blk_loop));
    func.block_mut(blk_loop).predecessors.push(blk_init);

    let lcnt = Value::from_inst(sizet, func.fresh_name("memcpy.lcnt"));
    let done = Value::from_inst(i1, func.fresh_name("memcpy.done"));
    let mut cur = Cursor { block: blk_loop, after: None };
    cur.push(
        func,
        InstData::Load {
            ptr: cnt.retain(),
            result: lcnt.retain(),
        },
    );
    cur.push(
        func,
        InstData::Cmp {
            op: CmpOp::Ule,
            lhs: lcnt,
            rhs: Value::literal(sizet, ptr_size as i128),
            result: done.retain(),
        },
    );
    cur.push(
        func,
        InstData::Branch {
            cond: done,
            if_true: blk_fin,
            if_false: blk_copy,
        },
    );
    func.block_mut(blk_loop).set_terminator(Terminator::Branch(blk_fin, blk_copy));
    func.block_mut(blk_fin).predecessors.push(blk_loop);
    func.block_mut(blk_copy).predecessors.push(blk_loop);

    let p = Value::from_inst(sizet_ptr, func.fresh_name("memcpy.p"));
    let q = Value::from_inst(sizet_ptr, func.fresh_name("memcpy.q"));
    let tmp = Value::from_inst(sizet, func.fresh_name("memcpy.tmp"));
    let to_sub = Value::from_inst(sizet, func.fresh_name("memcpy.tosub"));
    let subbed = Value::from_inst(sizet, func.fresh_name("memcpy.subbed"));
    let mut cur = Cursor { block: blk_copy, after: None };
    cur.push(
        func,
        InstData::Load {
            ptr: a.retain(),
            result: p.retain(),
        },
    );
    cur.push(
        func,
        InstData::Load {
            ptr: b.retain(),
            result: q.retain(),
        },
    );
    cur.push(
        func,
        InstData::Load {
            ptr: q.retain(),
            result: tmp.retain(),
        },
    );
    cur.push(func, InstData::Store { from: tmp, ptr: p.retain() });
    let p2 = relocate_ptr(func, types, &mut cur, &p, sizet, ptr_size as i64);
    let q2 = relocate_ptr(func, types, &mut cur, &q, sizet, ptr_size as i64);
    cur.push(func, InstData::Store { from: p2, ptr: a.retain() });
    cur.push(func, InstData::Store { from: q2, ptr: b.retain() });
    cur.push(
        func,
        InstData::Load {
            ptr: cnt.retain(),
            result: to_sub.retain(),
        },
    );
    cur.push(
        func,
        InstData::Binary {
            op: BinOp::Sub,
            lhs: to_sub,
            rhs: Value::literal(sizet, ptr_size as i128),
            result: subbed.retain(),
        },
    );
    cur.push(func, InstData::Store { from: subbed, ptr: cnt.retain() });
    cur.push(func, InstData::Jump { target: blk_loop });
    func.block_mut(blk_copy).set_terminator(Terminator::Jmp(blk_loop));
    func.block_mut(blk_loop).predecessors.push(blk_copy);

    let remainder = (len % ptr_size as u64) as u32;
    if remainder > 0 {
        let loaded_a = Value::from_inst(sizet_ptr, func.fresh_name("memcpy.fin.a"));
        let loaded_b = Value::from_inst(sizet_ptr, func.fresh_name("memcpy.fin.b"));
        let mut cur = Cursor { block: blk_fin, after: Some(inst) };
        cur.push(
            func,
            InstData::Load {
                ptr: a.retain(),
                result: loaded_a.retain(),
            },
        );
        cur.push(
            func,
            InstData::Load {
                ptr: b.retain(),
                result: loaded_b.retain(),
            },
        );
        expand_memcpy_small(func, types, &mut cur, &loaded_a, &loaded_b, remainder);
    }
    func.inst_mut(inst).skip = true;
    blk_fin
}

// ---------------------------------------------------------------------
// Alloca stack-slot assignment
// ---------------------------------------------------------------------

/// Assign a stack-frame offset to every `alloca` result that doesn't already
/// have one: the user-written ones, plus the ones memcpy expansion just
/// synthesized. The spill pass calls this same path inline for the allocas
/// it synthesizes, so by the time the emitter runs, every alloca result has
/// an offset recorded in `func`'s side table.
pub(crate) fn assign_alloca_slots(func: &mut Function, types: &mut TypeInterner) {
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if let InstData::Alloca { result } = func.inst(inst).data.clone() {
                if func.alloca_offset(&result).is_some() {
                    continue;
                }
                let pointee = types
                    .deref(result.ty())
                    .unwrap_or_else(|| crate::result::panic_invariant("alloca result is not a pointer", &func.name));
                let size = types.size_of(pointee).max(1);
                let align = types.align_of(pointee).max(1);
                let off = func.alloc_stack_slot(size, align);
                func.set_alloca_offset(&result, off);
            }
        }
    }
}

// ---------------------------------------------------------------------
// Phase C: generic operand satisfaction
// ---------------------------------------------------------------------

/// The generic opcode a target's instruction table dispatches on, for the
/// subset of `InstData` variants phase C's tables cover.
fn generic_opcode(data: &InstData) -> Option<GenericOpcode> {
    match data {
        InstData::Load { .. } => Some(GenericOpcode::Load),
        InstData::Store { .. } => Some(GenericOpcode::Store),
        InstData::Binary { .. } => Some(GenericOpcode::Binary),
        InstData::Cmp { .. } => Some(GenericOpcode::Cmp),
        InstData::Copy { .. } => Some(GenericOpcode::Copy),
        InstData::Extend { .. } => Some(GenericOpcode::Extend),
        InstData::Truncate { .. } => Some(GenericOpcode::Truncate),
        InstData::PtrToInt { .. } | InstData::IntToPtr { .. } => Some(GenericOpcode::PtrCast),
        _ => None,
    }
}

struct Slot {
    value: Value,
    deref: bool,
    is_input: bool,
}

/// Every operand slot of `data`, in the same order `rows_for` lists them
/// (inputs first, then the output, matching every row in `tables.rs`).
fn slots_for(data: &InstData) -> SmallVec<[Slot; 3]> {
    let mut out: SmallVec<[Slot; 3]> = SmallVec::new();
    // x86 can read a second arithmetic/compare operand directly out of
    // memory if it's already spilt; the first operand and load/store's own
    // address operand always need a plain register.
    match data {
        InstData::Load { ptr, result } => {
            out.push(Slot { value: ptr.retain(), deref: false, is_input: true });
            out.push(Slot { value: result.retain(), deref: false, is_input: false });
        }
        InstData::Store { from, ptr } => {
            out.push(Slot { value: from.retain(), deref: false, is_input: true });
            out.push(Slot { value: ptr.retain(), deref: false, is_input: true });
        }
        InstData::Binary { lhs, rhs, result, .. } | InstData::Cmp { lhs, rhs, result, .. } => {
            out.push(Slot { value: lhs.retain(), deref: false, is_input: true });
            out.push(Slot { value: rhs.retain(), deref: true, is_input: true });
            out.push(Slot { value: result.retain(), deref: false, is_input: false });
        }
        InstData::Copy { from, to } => {
            out.push(Slot { value: from.retain(), deref: false, is_input: true });
            out.push(Slot { value: to.retain(), deref: false, is_input: false });
        }
        InstData::Extend { from, result, .. } | InstData::Truncate { from, result } => {
            out.push(Slot { value: from.retain(), deref: false, is_input: true });
            out.push(Slot { value: result.retain(), deref: false, is_input: false });
        }
        InstData::PtrToInt { from, result } | InstData::IntToPtr { from, result } => {
            out.push(Slot { value: from.retain(), deref: false, is_input: true });
            out.push(Slot { value: result.retain(), deref: false, is_input: false });
        }
        _ => {}
    }
    out
}

fn convertible(from: OperandClass, to: OperandClass) -> bool {
    match to {
        OperandClass::Int => from == OperandClass::Int,
        _ => true,
    }
}

/// Run phase C over every instruction present in `func` right now.
fn satisfy_operands(func: &mut Function, types: &mut TypeInterner) {
    for block in func.blocks().collect::<Vec<_>>() {
        for inst in func.block_insts(block).collect::<Vec<_>>() {
            if func.inst(inst).skip {
                continue;
            }
            satisfy_operands_inst(func, types, inst);
        }
    }
}

fn satisfy_operands_inst(func: &mut Function, types: &mut TypeInterner, inst: Inst) {
    let op = match generic_opcode(&func.inst(inst).data) {
        Some(o) => o,
        None => return,
    };
    let slots = slots_for(&func.inst(inst).data);
    let categories: SmallVec<[OperandClass; 3]> =
        slots.iter().map(|s| operand_category(&s.value, s.deref).class).collect();

    let rows = rows_for(op);
    let mut best: Option<(&ConstraintRow, u32)> = None;
    'rows: for row in rows {
        if row.ops.len() != categories.len() {
            continue;
        }
        let mut conversions = 0u32;
        for (slot_req, &cat) in row.ops.iter().zip(categories.iter()) {
            if slot_req.class != cat {
                if convertible(cat, slot_req.class) {
                    conversions += 1;
                } else {
                    continue 'rows;
                }
            }
        }
        if best.map_or(true, |(_, c)| conversions < c) {
            best = Some((row, conversions));
        }
    }
    let (row, conversions) = match best {
        Some(b) => b,
        None => crate::result::panic_invariant(
            "isel: no operand-constraint row satisfies this instruction",
            &func.inst(inst).data.opcode_name(),
        ),
    };
    if conversions == 0 {
        return;
    }
    trace!(
        "isel: {} conversions for {}",
        conversions,
        func.inst(inst).data.opcode_name()
    );

    for (slot_req, slot) in row.ops.iter().zip(slots.iter()) {
        let cat = operand_category(&slot.value, slot.deref).class;
        if cat == slot_req.class {
            continue;
        }
        if slot.is_input {
            convert_input(func, types, inst, &slot.value, slot_req.class);
        } else {
            convert_output(func, types, inst, &slot.value, slot_req.class);
        }
    }
}

fn convert_input(func: &mut Function, types: &mut TypeInterner, inst: Inst, value: &Value, target_class: OperandClass) {
    match target_class {
        OperandClass::Reg => {
            let tmp = Value::from_inst(value.ty(), func.fresh_name("isel.in"));
            func.insert_before(
                inst,
                InstData::Copy {
                    from: value.retain(),
                    to: tmp.retain(),
                },
            );
            replace_operand_value(&mut func.inst_mut(inst).data, value.id(), &tmp);
        }
        OperandClass::MemContents | OperandClass::MemPtr => {
            let off = fresh_stack_slot(func, types, value.ty());
            let tmp = Value::from_inst(value.ty(), func.fresh_name("isel.mem"));
            tmp.set_location(Location::spilt(off));
            func.insert_before(
                inst,
                InstData::Copy {
                    from: value.retain(),
                    to: tmp.retain(),
                },
            );
            replace_operand_value(&mut func.inst_mut(inst).data, value.id(), &tmp);
        }
        OperandClass::Int => crate::result::panic_invariant(
            "isel: cannot convert a non-literal operand to an immediate",
            &func.inst(inst).data.opcode_name(),
        ),
    }
}

fn convert_output(func: &mut Function, types: &mut TypeInterner, inst: Inst, value: &Value, target_class: OperandClass) {
    match target_class {
        OperandClass::Reg => {
            let tmp = Value::from_inst(value.ty(), func.fresh_name("isel.out"));
            replace_operand_value(&mut func.inst_mut(inst).data, value.id(), &tmp);
            func.insert_after(
                inst,
                InstData::Copy {
                    from: tmp,
                    to: value.retain(),
                },
            );
        }
        OperandClass::MemContents | OperandClass::MemPtr => {
            let off = fresh_stack_slot(func, types, value.ty());
            let tmp = Value::from_inst(value.ty(), func.fresh_name("isel.out"));
            tmp.set_location(Location::spilt(off));
            replace_operand_value(&mut func.inst_mut(inst).data, value.id(), &tmp);
            func.insert_after(
                inst,
                InstData::Copy {
                    from: tmp,
                    to: value.retain(),
                },
            );
        }
        OperandClass::Int => {
            crate::result::panic_invariant("isel: an instruction's output can never be an immediate", &"output")
        }
    }
}

fn fresh_stack_slot(func: &Function, types: &TypeInterner, ty: Type) -> i32 {
    let size = types.size_of(ty).max(1);
    let align = types.align_of(ty).max(1);
    func.alloc_stack_slot(size, align)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::function::{Function, Signature};
    use crate::ir::types::{Prim, TypeInterner};
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

    #[test]
    fn ptradd_with_unit_step_emits_no_multiply() {
        let mut types = TypeInterner::new(8, 8);
        let i1 = types.intern_primitive(Prim::I1);
        let ptr_i1 = types.intern_ptr(i1);
        let i8 = types.intern_primitive(Prim::I8);
        let mut f = Function::new("f", sig(ptr_i1));
        let entry = f.entry();
        let base = Value::from_inst(ptr_i1, "base");
        let offset = Value::literal(i8, 3);
        let result = Value::from_inst(ptr_i1, "result");
        builder::ptradd(&mut f, &types, entry, &base, &offset, result.clone());
        builder::ret(&mut f, &types, entry, None);

        lower_pointer_arith(&mut f, &mut types);

        // Only ptrtoint/add/inttoptr, no multiply, since size_of(i1) == 1.
        let mut saw_mul = false;
        for inst in f.block_insts(entry) {
            if let InstData::Binary { op: BinOp::Mul, .. } = f.inst(inst).data {
                saw_mul = true;
            }
        }
        assert!(!saw_mul);
    }

    #[test]
    fn ptradd_scales_by_element_size() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let ptr_i4 = types.intern_ptr(i4);
        let i8 = types.intern_primitive(Prim::I8);
        let mut f = Function::new("f", sig(ptr_i4));
        let entry = f.entry();
        let base = Value::from_inst(ptr_i4, "base");
        let offset = Value::literal(i8, 3);
        let result = Value::from_inst(ptr_i4, "result");
        builder::ptradd(&mut f, &types, entry, &base, &offset, result.clone());
        builder::ret(&mut f, &types, entry, None);

        lower_pointer_arith(&mut f, &mut types);

        let mut saw_mul_by_4 = false;
        for inst in f.block_insts(entry) {
            if let InstData::Binary {
                op: BinOp::Mul,
                rhs,
                ..
            } = &f.inst(inst).data
            {
                if let crate::ir::value::ValueKind::Literal(4) = rhs.kind() {
                    saw_mul_by_4 = true;
                }
            }
        }
        assert!(saw_mul_by_4);
    }

    #[test]
    fn ptrsub_divides_by_pointee_size() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let ptr_i4 = types.intern_ptr(i4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let base = Value::from_inst(ptr_i4, "base");
        let offset = Value::from_inst(ptr_i4, "offset");
        let result = Value::from_inst(i4, "result");
        builder::ptrsub(&mut f, &types, entry, &base, &offset, result.clone());
        builder::ret(&mut f, &types, entry, None);

        lower_pointer_arith(&mut f, &mut types);

        let mut saw_udiv = false;
        for inst in f.block_insts(entry) {
            if let InstData::Binary { op: BinOp::UDiv, .. } = f.inst(inst).data {
                saw_udiv = true;
            }
        }
        assert!(saw_udiv);
    }

    #[test]
    fn memcpy_zero_len_is_skipped_entirely() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let ptr_i4 = types.intern_ptr(i4);
        let mut f = Function::new("f", sig(types.void()));
        let entry = f.entry();
        let dst = Value::from_inst(ptr_i4, "dst");
        let src = Value::from_inst(ptr_i4, "src");
        let inst = builder::memcpy(&mut f, &types, entry, &dst, &src, 0);
        builder::ret(&mut f, &types, entry, None);

        expand_memcpys(&mut f, &mut types);

        assert!(f.inst(inst).skip);
    }

    #[test]
    fn memcpy_small_emits_one_load_and_one_store() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let ptr_i4 = types.intern_ptr(i4);
        let mut f = Function::new("f", sig(types.void()));
        let entry = f.entry();
        let dst = Value::from_inst(ptr_i4, "dst");
        let src = Value::from_inst(ptr_i4, "src");
        builder::memcpy(&mut f, &types, entry, &dst, &src, 4);
        builder::ret(&mut f, &types, entry, None);

        expand_memcpys(&mut f, &mut types);

        let mut loads = 0;
        let mut stores = 0;
        for inst in f.block_insts(entry) {
            match f.inst(inst).data {
                InstData::Load { .. } => loads += 1,
                InstData::Store { .. } => stores += 1,
                _ => {}
            }
        }
        assert_eq!(loads, 1);
        assert_eq!(stores, 1);
    }

    #[test]
    fn memcpy_large_splits_into_loop_blocks() {
        let mut types = TypeInterner::new(8, 8);
        let i1 = types.intern_primitive(Prim::I1);
        let ptr_i1 = types.intern_ptr(i1);
        let arr = types.intern_array(i1, 40);
        let ptr_arr = types.intern_ptr(arr);
        let mut f = Function::new("f", sig(types.void()));
        let entry = f.entry();
        let dst = Value::from_inst(ptr_arr, "dst");
        let src = Value::from_inst(ptr_arr, "src");
        let _ = ptr_i1;
        builder::memcpy(&mut f, &types, entry, &dst, &src, 40);
        builder::ret(&mut f, &types, entry, None);

        let blocks_before = f.blocks().count();
        expand_memcpys(&mut f, &mut types);
        let blocks_after = f.blocks().count();
        assert!(blocks_after > blocks_before);
    }

    #[test]
    fn div_reserves_a_and_d_registers() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("f", sig(i4));
        let entry = f.entry();
        let a = Value::from_inst(i4, "a");
        let b = Value::from_inst(i4, "b");
        let q = Value::from_inst(i4, "q");
        builder::binary(&mut f, &types, entry, BinOp::SDiv, &a, &b, q.clone());
        builder::ret(&mut f, &types, entry, Some(&q));

        let target = target();
        reserve_cisc(&mut f, &mut types, &target);

        let mut saw_cltd = false;
        for inst in f.block_insts(entry) {
            if let InstData::Asm { template, .. } = &f.inst(inst).data {
                if template == "cltd" {
                    saw_cltd = true;
                }
            }
        }
        assert!(saw_cltd);
    }

    #[test]
    fn assign_alloca_slots_gives_every_alloca_an_offset() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let ptr_i4 = types.intern_ptr(i4);
        let mut f = Function::new("f", sig(types.void()));
        let entry = f.entry();
        let slot = Value::alloca(ptr_i4, "slot");
        builder::alloca(&mut f, &types, entry, slot.clone());
        builder::ret(&mut f, &types, entry, None);

        assign_alloca_slots(&mut f, &mut types);

        assert!(f.alloca_offset(&slot).is_some());
    }
}
