//! ABI lowering pass.
//!
//! Runs once per function, before instruction selection. Classifies the
//! function's own parameters/return and every call site's arguments/return
//! System V–style, and rewrites:
//!
//! - the entry block's prologue: incoming arguments are copied out of their
//!   ABI registers (or loaded off the caller's stack) into the function's
//!   own parameter values;
//! - every `call`: outgoing arguments are copied into ABI registers (or
//!   stored to a fresh outgoing stack area) before the call, the call's
//!   in-IR argument list is cleared, the call is clobbered with the
//!   registers it used, and the return value is unpacked afterward;
//! - every `ret`: the returned value is copied into the return register(s),
//!   or, for an in-memory return, memcpy'd through the stashed stret
//!   pointer.
//!
//! A struct/array-typed value that ends up needing a concrete stack address
//! (splitting it across eightbyte registers, reading it off the caller's
//! stack) gets one computed on the fly with `ptrtoint`/`add`/`inttoptr`
//! against a value pinned to the frame or stack pointer, rather than this
//! pass inventing a new address-of instruction.

use crate::ir::entities::{Block, Inst};
use crate::ir::value::PhysReg;
use crate::ir::{BinOp, Function, InstData, Location, Type, TypeData, TypeInterner, Value};
use crate::isa::{AbiRegs, Target};
use log::{debug, trace};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum EightbyteClass {
    Int,
    Sse,
}

impl EightbyteClass {
    fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (None, x) | (x, None) => x,
            (Some(EightbyteClass::Int), _) | (_, Some(EightbyteClass::Int)) => {
                Some(EightbyteClass::Int)
            }
            (Some(EightbyteClass::Sse), Some(EightbyteClass::Sse)) => Some(EightbyteClass::Sse),
        }
    }
}

enum Classification {
    Registers(Vec<EightbyteClass>),
    Memory,
}

/// Classify `ty` System V–style: in memory if its size is 0 or exceeds 16
/// bytes, otherwise one class per eightbyte, merging every scalar leaf's
/// class (`Int` dominates `Sse`). An eightbyte with no leaves at all (pure
/// trailing padding) classifies `Int`: the merge identity is the neutral
/// element, and `Int` is what a lone `Int` merges to.
fn classify(types: &TypeInterner, ty: Type) -> Classification {
    let size = types.size_of(ty);
    if size == 0 || size > 16 {
        return Classification::Memory;
    }
    let n_eightbytes = ((size + 7) / 8).max(1) as usize;
    let mut eightbytes: Vec<Option<EightbyteClass>> = vec![None; n_eightbytes];
    classify_leaves(types, ty, 0, &mut eightbytes);
    Classification::Registers(
        eightbytes
            .into_iter()
            .map(|c| c.unwrap_or(EightbyteClass::Int))
            .collect(),
    )
}

fn classify_leaves(types: &TypeInterner, ty: Type, base_offset: u32, out: &mut [Option<EightbyteClass>]) {
    match types.data(types.resolve(ty)) {
        TypeData::Struct(fields) => {
            let mut offset = 0u32;
            for &f in fields {
                let a = types.align_of(f).max(1);
                offset = (offset + a - 1) & !(a - 1);
                classify_leaves(types, f, base_offset + offset, out);
                offset += types.size_of(f);
            }
        }
        TypeData::Array(elem, n) => {
            let elem_size = types.size_of(*elem);
            for i in 0..*n {
                classify_leaves(types, *elem, base_offset + (i as u32) * elem_size, out);
            }
        }
        _ => {
            let class = if types.is_float(ty) {
                EightbyteClass::Sse
            } else {
                EightbyteClass::Int
            };
            let idx = (base_offset / 8) as usize;
            if idx < out.len() {
                out[idx] = EightbyteClass::merge(out[idx], Some(class));
            }
        }
    }
}

fn is_aggregate(types: &TypeInterner, ty: Type) -> bool {
    matches!(
        types.data(types.resolve(ty)),
        TypeData::Struct(_) | TypeData::Array(_, _)
    )
}

/// Hands out argument registers/stack slots in order: one int/sse cursor
/// each, plus a running byte offset for whatever spills to the stack.
struct RegCursor<'a> {
    abi: &'a AbiRegs,
    int_idx: usize,
    sse_idx: usize,
    stack_off: i32,
}

impl<'a> RegCursor<'a> {
    fn new(abi: &'a AbiRegs) -> Self {
        RegCursor {
            abi,
            int_idx: 0,
            sse_idx: 0,
            stack_off: 0,
        }
    }

    fn take(&mut self, class: EightbyteClass) -> Option<PhysReg> {
        match class {
            EightbyteClass::Int => {
                let r = self.abi.int_args.get(self.int_idx).copied();
                if r.is_some() {
                    self.int_idx += 1;
                }
                r
            }
            EightbyteClass::Sse => {
                let r = self.abi.sse_args.get(self.sse_idx).copied();
                if r.is_some() {
                    self.sse_idx += 1;
                }
                r
            }
        }
    }

    fn take_stack(&mut self, size: u32) -> i32 {
        let off = self.stack_off;
        self.stack_off += align_up(size, 8) as i32;
        off
    }
}

fn align_up(v: u32, align: u32) -> u32 {
    (v + align - 1) & !(align - 1)
}

/// Insertion cursor chaining `insert_before` calls against a fixed anchor
/// so repeated prologue/pre-call insertions land in call order, or
/// appending to `block` when there's no anchor (an empty block, or a
/// post-call/post-return point with nothing after it yet).
struct InsCursor {
    block: Block,
    anchor: Option<Inst>,
}

impl InsCursor {
    fn push(&self, func: &mut Function, data: InstData) -> Inst {
        match self.anchor {
            Some(before) => func.insert_before(before, data),
            None => func.append_inst(self.block, data),
        }
    }
}

/// Compute `base + byte_offset` as a fresh pointer value of type
/// `ptr(elem_ty)`, via `ptrtoint`/`add`/`inttoptr` over `base`.
fn offset_ptr(
    func: &mut Function,
    types: &mut TypeInterner,
    cursor: &InsCursor,
    base: &Value,
    elem_ty: Type,
    byte_offset: i64,
) -> Value {
    let iptr_ty = types.primitive_less_or_equal(types.ptr_size(), false);
    let as_int = Value::from_inst(iptr_ty, func.fresh_name("addr"));
    cursor.push(
        func,
        InstData::PtrToInt {
            from: base.retain(),
            result: as_int.retain(),
        },
    );
    let summed = Value::from_inst(iptr_ty, func.fresh_name("addr"));
    cursor.push(
        func,
        InstData::Binary {
            op: BinOp::Add,
            lhs: as_int,
            rhs: Value::literal(iptr_ty, byte_offset as i128),
            result: summed.retain(),
        },
    );
    let ptr_ty = types.intern_ptr(elem_ty);
    let result = Value::from_inst(ptr_ty, func.fresh_name("addr"));
    cursor.push(
        func,
        InstData::IntToPtr {
            from: summed,
            result: result.retain(),
        },
    );
    result
}

/// A value standing for "whatever `reg` currently holds," used as the base
/// of `offset_ptr` computations against the frame or stack pointer.
fn reg_value(types: &mut TypeInterner, reg: PhysReg) -> Value {
    let void = types.void();
    let ptr_ty = types.intern_ptr(void);
    Value::abi_temp(ptr_ty, reg)
}

/// Run the ABI pass over `func`: lower its own entry/returns and every call
/// site it contains.
pub fn run(func: &mut Function, types: &mut TypeInterner, target: &Target) {
    debug!("abi: lowering {}", func.name);
    lower_entry(func, types, target);

    let blocks: Vec<Block> = func.blocks().collect();
    for block in blocks {
        let insts: Vec<Inst> = func.block_insts(block).collect();
        for inst in insts {
            match &func.inst(inst).data {
                InstData::Call { .. } => lower_call(func, types, target, block, inst),
                InstData::Return { .. } => lower_return(func, types, target, block, inst),
                _ => {}
            }
        }
    }
    trace!("abi: {} done, stack_use={}", func.name, func.stack_use());
}

fn lower_entry(func: &mut Function, types: &mut TypeInterner, target: &Target) {
    let entry = func.entry();
    let cursor = InsCursor {
        block: entry,
        anchor: func.block(entry).first_inst(),
    };
    let mut cur = RegCursor::new(&target.abi);
    let mut implicit_values: Vec<Value> = Vec::new();

    let ret_ty = func.sig.ret;
    let stret = if let Classification::Memory = classify(types, ret_ty) {
        let reg = cur
            .take(EightbyteClass::Int)
            .unwrap_or_else(|| crate::result::panic_invariant("no register for stret pointer", &func.name));
        let ptr_ty = types.intern_ptr(ret_ty);
        let incoming = Value::abi_temp(ptr_ty, reg);
        let local = Value::from_inst(ptr_ty, func.fresh_name("stret"));
        cursor.push(
            func,
            InstData::Copy {
                from: incoming.retain(),
                to: local.retain(),
            },
        );
        implicit_values.push(incoming);
        Some(local)
    } else {
        None
    };
    func.set_stret_value(stret);

    let param_types = func.sig.params.clone();
    for (i, &pty) in param_types.iter().enumerate() {
        let argval = func.arg_values[i].clone();
        unpack_incoming(func, types, &cursor, &mut cur, &mut implicit_values, pty, &argval);
    }

    wrap_implicit_use(func, &cursor, implicit_values);
    trace!("abi: entry prologue for {} done", func.name);
}

fn unpack_incoming(
    func: &mut Function,
    types: &mut TypeInterner,
    cursor: &InsCursor,
    cur: &mut RegCursor,
    implicit_values: &mut Vec<Value>,
    pty: Type,
    argval: &Value,
) {
    let aggregate = is_aggregate(types, pty);
    match classify(types, pty) {
        Classification::Memory => {
            let off = cur.take_stack(types.size_of(pty).max(8));
            load_incoming_stack_arg(func, types, cursor, cur.abi, pty, off, argval);
        }
        Classification::Registers(classes) if !aggregate && classes.len() == 1 => {
            match cur.take(classes[0]) {
                Some(reg) => {
                    let incoming = Value::abi_temp(pty, reg);
                    cursor.push(
                        func,
                        InstData::Copy {
                            from: incoming.retain(),
                            to: argval.retain(),
                        },
                    );
                    implicit_values.push(incoming);
                }
                None => {
                    let off = cur.take_stack(8);
                    load_incoming_stack_arg(func, types, cursor, cur.abi, pty, off, argval);
                }
            }
        }
        Classification::Registers(classes) => {
            let size = types.size_of(pty);
            let align = types.align_of(pty).max(1);
            let base_off = func.alloc_stack_slot(size, align);
            argval.set_location(Location::spilt(base_off));
            let rbp = reg_value(types, cur.abi.frame_ptr);
            for (eb, class) in classes.iter().enumerate() {
                let remaining = size.saturating_sub((eb as u32) * 8).min(8);
                let prim = types.primitive_less_or_equal(remaining, *class == EightbyteClass::Sse);
                let byte_off = slot_byte_offset(base_off, eb as i32);
                match cur.take(*class) {
                    Some(reg) => {
                        let incoming = Value::abi_temp(prim, reg);
                        let dest = offset_ptr(func, types, cursor, &rbp, prim, byte_off);
                        cursor.push(
                            func,
                            InstData::Store {
                                from: incoming.retain(),
                                ptr: dest,
                            },
                        );
                        implicit_values.push(incoming);
                    }
                    None => {
                        let stack_off = cur.take_stack(8);
                        let word = load_from_incoming_stack(func, types, cursor, cur.abi, prim, stack_off);
                        let dest = offset_ptr(func, types, cursor, &rbp, prim, byte_off);
                        cursor.push(func, InstData::Store { from: word, ptr: dest });
                    }
                }
            }
        }
    }
}

/// `rbp - slot_offset + eightbyte_index*8`: a stable, increasing-with-index
/// address for each eightbyte of a stack-resident struct/array value.
/// `slot_offset` is whatever `Function::alloc_stack_slot` handed back.
fn slot_byte_offset(slot_offset: i32, eightbyte_index: i32) -> i64 {
    (-(slot_offset) + eightbyte_index * 8) as i64
}

/// The caller's incoming stack argument area starts 16 bytes above the
/// frame pointer (past the saved frame pointer and return address).
fn load_from_incoming_stack(
    func: &mut Function,
    types: &mut TypeInterner,
    cursor: &InsCursor,
    abi: &AbiRegs,
    ty: Type,
    stack_off: i32,
) -> Value {
    let rbp = reg_value(types, abi.frame_ptr);
    let src = offset_ptr(func, types, cursor, &rbp, ty, (stack_off + 16) as i64);
    let word = Value::from_inst(ty, func.fresh_name("argword"));
    cursor.push(
        func,
        InstData::Load {
            ptr: src,
            result: word.retain(),
        },
    );
    word
}

/// Load an incoming scalar/pointer argument off the caller's stack and
/// copy it into `argval`, mirroring the register path's copy.
fn load_incoming_stack_arg(
    func: &mut Function,
    types: &mut TypeInterner,
    cursor: &InsCursor,
    abi: &AbiRegs,
    ty: Type,
    stack_off: i32,
    argval: &Value,
) {
    let word = load_from_incoming_stack(func, types, cursor, abi, ty, stack_off);
    cursor.push(
        func,
        InstData::Copy {
            from: word,
            to: argval.retain(),
        },
    );
}

fn wrap_implicit_use(func: &mut Function, cursor: &InsCursor, values: Vec<Value>) {
    if values.is_empty() {
        return;
    }
    let id = func.next_uniq();
    cursor.push(
        func,
        InstData::ImplicitUseStart {
            id,
            values: values.iter().map(Value::retain).collect(),
        },
    );
    cursor.push(func, InstData::ImplicitUseEnd { id });
}

fn lower_call(func: &mut Function, types: &mut TypeInterner, target: &Target, block: Block, call: Inst) {
    let (args, result) = match &func.inst(call).data {
        InstData::Call { args, result, .. } => (args.clone(), result.clone()),
        _ => unreachable!(),
    };
    let cursor = InsCursor {
        block,
        anchor: Some(call),
    };
    let mut cur = RegCursor::new(&target.abi);
    let mut clobbers = crate::ir::RegMask::new();
    for r in target.abi.int_args.iter().chain(target.abi.sse_args.iter()) {
        clobbers.insert(*r);
    }

    let ret_ty = result.as_ref().map(Value::ty);
    let stret_slot = ret_ty.and_then(|rty| {
        if let Classification::Memory = classify(types, rty) {
            let reg = cur
                .take(EightbyteClass::Int)
                .unwrap_or_else(|| crate::result::panic_invariant("no register for call stret", &func.name));
            let size = types.size_of(rty);
            let align = types.align_of(rty).max(1);
            let off = func.alloc_stack_slot(size, align);
            let rbp = reg_value(types, cur.abi.frame_ptr);
            let slot_ptr = offset_ptr(func, types, &cursor, &rbp, rty, slot_byte_offset(off, 0));
            let ptr_ty = types.intern_ptr(rty);
            let pinned = Value::abi_temp(ptr_ty, reg);
            cursor.push(
                func,
                InstData::Copy {
                    from: slot_ptr.retain(),
                    to: pinned,
                },
            );
            Some(slot_ptr)
        } else {
            None
        }
    });

    for arg in &args {
        pack_outgoing(func, types, &cursor, &mut cur, arg.value.ty(), &arg.value);
    }
    func.set_has_calls();
    func.bump_call_arg_area(cur.stack_off);

    if let InstData::Call { args, .. } = &mut func.inst_mut(call).data {
        args.clear();
    }
    let existing_clobbers = func.inst(call).clobbers;
    func.inst_mut(call).clobbers = existing_clobbers.union(clobbers);

    if let (Some(result), Some(rty)) = (&result, ret_ty) {
        unpack_return(func, types, target, &cursor, call, rty, result, stret_slot);
    }
}

fn pack_outgoing(
    func: &mut Function,
    types: &mut TypeInterner,
    cursor: &InsCursor,
    cur: &mut RegCursor,
    aty: Type,
    value: &Value,
) {
    let aggregate = is_aggregate(types, aty);
    match classify(types, aty) {
        Classification::Memory => {
            let off = cur.take_stack(types.size_of(aty).max(8));
            let rsp = reg_value(types, cur.abi.stack_ptr);
            let dest = offset_ptr(func, types, cursor, &rsp, aty, off as i64);
            cursor.push(
                func,
                InstData::Memcpy {
                    dst: dest,
                    src: value.retain(),
                    len: types.size_of(aty) as u64,
                },
            );
        }
        Classification::Registers(classes) if !aggregate && classes.len() == 1 => match cur.take(classes[0]) {
            Some(reg) => {
                let pinned = Value::abi_temp(aty, reg);
                cursor.push(
                    func,
                    InstData::Copy {
                        from: value.retain(),
                        to: pinned,
                    },
                );
            }
            None => {
                let off = cur.take_stack(8);
                let rsp = reg_value(types, cur.abi.stack_ptr);
                let dest = offset_ptr(func, types, cursor, &rsp, aty, off as i64);
                cursor.push(
                    func,
                    InstData::Store {
                        from: value.retain(),
                        ptr: dest,
                    },
                );
            }
        },
        Classification::Registers(classes) => {
            let size = types.size_of(aty);
            for (eb, class) in classes.iter().enumerate() {
                let remaining = size.saturating_sub((eb as u32) * 8).min(8);
                let prim = types.primitive_less_or_equal(remaining, *class == EightbyteClass::Sse);
                let src = offset_ptr(func, types, cursor, value, prim, (eb as i64) * 8);
                let word = Value::from_inst(prim, func.fresh_name("argword"));
                cursor.push(
                    func,
                    InstData::Load {
                        ptr: src,
                        result: word.retain(),
                    },
                );
                match cur.take(*class) {
                    Some(reg) => {
                        let pinned = Value::abi_temp(prim, reg);
                        cursor.push(
                            func,
                            InstData::Copy {
                                from: word,
                                to: pinned,
                            },
                        );
                    }
                    None => {
                        let off = cur.take_stack(8);
                        let rsp = reg_value(types, cur.abi.stack_ptr);
                        let dest = offset_ptr(func, types, cursor, &rsp, prim, off as i64);
                        cursor.push(func, InstData::Store { from: word, ptr: dest });
                    }
                }
            }
        }
    }
}

fn unpack_return(
    func: &mut Function,
    types: &mut TypeInterner,
    target: &Target,
    cursor: &InsCursor,
    call: Inst,
    rty: Type,
    result: &Value,
    stret_slot: Option<Value>,
) {
    let after = InsCursor {
        block: cursor.block,
        anchor: func.inst(call).next,
    };
    let aggregate = is_aggregate(types, rty);
    match classify(types, rty) {
        Classification::Memory => {
            let slot = stret_slot.expect("in-memory return must have a stret slot");
            after.push(
                func,
                InstData::Memcpy {
                    dst: result.retain(),
                    src: slot,
                    len: types.size_of(rty) as u64,
                },
            );
        }
        Classification::Registers(classes) if !aggregate && classes.len() == 1 => {
            let mut rcur = RegCursor::new(&target.abi);
            let reg = rcur
                .take(classes[0])
                .unwrap_or_else(|| crate::result::panic_invariant("no register for call return", &func.name));
            let incoming = Value::abi_temp(rty, reg);
            after.push(
                func,
                InstData::Copy {
                    from: incoming,
                    to: result.retain(),
                },
            );
        }
        Classification::Registers(classes) => {
            let size = types.size_of(rty);
            let align = types.align_of(rty).max(1);
            let base_off = func.alloc_stack_slot(size, align);
            result.set_location(Location::spilt(base_off));
            let rbp = reg_value(types, target.abi.frame_ptr);
            let mut rcur = RegCursor::new(&target.abi);
            for (eb, class) in classes.iter().enumerate() {
                let remaining = size.saturating_sub((eb as u32) * 8).min(8);
                let prim = types.primitive_less_or_equal(remaining, *class == EightbyteClass::Sse);
                let reg = rcur
                    .take(*class)
                    .unwrap_or_else(|| crate::result::panic_invariant("no register for call return", &func.name));
                let incoming = Value::abi_temp(prim, reg);
                let dest = offset_ptr(func, types, &after, &rbp, prim, slot_byte_offset(base_off, eb as i32));
                after.push(
                    func,
                    InstData::Store {
                        from: incoming,
                        ptr: dest,
                    },
                );
            }
        }
    }
}

fn lower_return(func: &mut Function, types: &mut TypeInterner, target: &Target, block: Block, ret: Inst) {
    let value = match &func.inst(ret).data {
        InstData::Return { value } => value.clone(),
        _ => unreachable!(),
    };
    let value = match value {
        Some(v) => v,
        None => return,
    };
    let cursor = InsCursor {
        block,
        anchor: Some(ret),
    };
    let rty = func.sig.ret;
    let aggregate = is_aggregate(types, rty);
    match classify(types, rty) {
        Classification::Memory => {
            let stret = func
                .stret_value()
                .unwrap_or_else(|| crate::result::panic_invariant("in-memory return without a stret pointer", &func.name));
            cursor.push(
                func,
                InstData::Memcpy {
                    dst: stret,
                    src: value,
                    len: types.size_of(rty) as u64,
                },
            );
        }
        Classification::Registers(classes) if !aggregate && classes.len() == 1 => {
            let mut cur = RegCursor::new(&target.abi);
            let reg = cur
                .take(classes[0])
                .unwrap_or_else(|| crate::result::panic_invariant("no register for return value", &func.name));
            let pinned = Value::abi_temp(rty, reg);
            cursor.push(
                func,
                InstData::Copy {
                    from: value,
                    to: pinned,
                },
            );
        }
        Classification::Registers(classes) => {
            let size = types.size_of(rty);
            let mut cur = RegCursor::new(&target.abi);
            for (eb, class) in classes.iter().enumerate() {
                let remaining = size.saturating_sub((eb as u32) * 8).min(8);
                let prim = types.primitive_less_or_equal(remaining, *class == EightbyteClass::Sse);
                let src = offset_ptr(func, types, &cursor, &value, prim, (eb as i64) * 8);
                let word = Value::from_inst(prim, func.fresh_name("retword"));
                cursor.push(
                    func,
                    InstData::Load {
                        ptr: src,
                        result: word.retain(),
                    },
                );
                let reg = cur
                    .take(*class)
                    .unwrap_or_else(|| crate::result::panic_invariant("no register for return value", &func.name));
                let pinned = Value::abi_temp(prim, reg);
                cursor.push(
                    func,
                    InstData::Copy {
                        from: word,
                        to: pinned,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Prim;

    #[test]
    fn scalar_fits_one_eightbyte_int() {
        let mut ty = TypeInterner::new(8, 8);
        let i4 = ty.intern_primitive(Prim::I4);
        match classify(&ty, i4) {
            Classification::Registers(classes) => assert_eq!(classes, vec![EightbyteClass::Int]),
            Classification::Memory => panic!("i4 must classify as registers"),
        }
    }

    #[test]
    fn large_struct_is_in_memory() {
        let mut ty = TypeInterner::new(8, 8);
        let i4 = ty.intern_primitive(Prim::I4);
        let ptr = ty.intern_ptr(i4);
        let s = ty.intern_struct(vec![i4, i4, ptr, ptr]);
        assert_eq!(ty.size_of(s), 24);
        assert!(matches!(classify(&ty, s), Classification::Memory));
    }

    #[test]
    fn two_int_fields_merge_to_one_int_eightbyte() {
        let mut ty = TypeInterner::new(8, 8);
        let i4 = ty.intern_primitive(Prim::I4);
        let s = ty.intern_struct(vec![i4, i4]);
        match classify(&ty, s) {
            Classification::Registers(classes) => assert_eq!(classes, vec![EightbyteClass::Int]),
            Classification::Memory => panic!("{{i4,i4}} must fit in one eightbyte"),
        }
    }

    #[test]
    fn mixed_float_and_int_eightbytes_classify_independently() {
        let mut ty = TypeInterner::new(8, 8);
        let f8 = ty.intern_primitive(Prim::F8);
        let i8 = ty.intern_primitive(Prim::I8);
        let s = ty.intern_struct(vec![f8, i8]);
        match classify(&ty, s) {
            Classification::Registers(classes) => {
                assert_eq!(classes, vec![EightbyteClass::Sse, EightbyteClass::Int])
            }
            Classification::Memory => panic!("{{f8,i8}} must fit two eightbytes"),
        }
    }

    #[test]
    fn nine_byte_array_still_fits_two_eightbytes() {
        let mut ty = TypeInterner::new(8, 8);
        let i1 = ty.intern_primitive(Prim::I1);
        let arr = ty.intern_array(i1, 9);
        match classify(&ty, arr) {
            Classification::Registers(classes) => assert_eq!(classes.len(), 2),
            Classification::Memory => panic!("9-byte array must still fit two eightbytes"),
        }
    }
}
