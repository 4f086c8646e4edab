//! Smart constructors for instructions.
//!
//! Every function here validates its operands against the type universe
//! before appending the instruction, and retains every operand by cloning
//! the caller's `Value` handle into the instruction rather than moving it —
//! the caller keeps its own handle; construction always retains every
//! operand it's handed.
//! Builders that don't need a fresh result value take `result` by value
//! since the caller typically has no further use for the handle it just
//! created for this purpose; operand values are always taken by
//! reference.

use crate::ir::block::Terminator;
use crate::ir::entities::{Block, Inst};
use crate::ir::function::Function;
use crate::ir::instruction::{BinOp, CallArg, CallTarget, CmpOp, ElemIndex, InstData};
use crate::ir::types::TypeInterner;
use crate::ir::value::Value;

fn push(func: &mut Function, block: Block, types: &TypeInterner, data: InstData) -> Inst {
    data.validate(types);
    func.append_inst(block, data)
}

/// `result = load ptr`
pub fn load(func: &mut Function, types: &TypeInterner, block: Block, ptr: &Value, result: Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Load {
            ptr: ptr.retain(),
            result,
        },
    )
}

/// `store from, ptr`
pub fn store(func: &mut Function, types: &TypeInterner, block: Block, from: &Value, ptr: &Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Store {
            from: from.retain(),
            ptr: ptr.retain(),
        },
    )
}

/// `result = alloca`
pub fn alloca(func: &mut Function, types: &TypeInterner, block: Block, result: Value) -> Inst {
    push(func, block, types, InstData::Alloca { result })
}

/// `result = elem base, field` for a struct member.
pub fn elem_field(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    base: &Value,
    field: u32,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Elem {
            base: base.retain(),
            index: ElemIndex::Field(field),
            result,
        },
    )
}

/// `result = elem base, index` for an array element.
pub fn elem_array(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    base: &Value,
    index: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Elem {
            base: base.retain(),
            index: ElemIndex::ArrayIndex(index.retain()),
            result,
        },
    )
}

/// `result = ptradd base, offset`
pub fn ptradd(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    base: &Value,
    offset: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::PtrAdd {
            base: base.retain(),
            offset: offset.retain(),
            result,
        },
    )
}

/// `result = ptrsub base, offset` — pointer difference; `offset` is a
/// pointer of the same type as `base`, `result` is an integer element
/// count.
pub fn ptrsub(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    base: &Value,
    offset: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::PtrSub {
            base: base.retain(),
            offset: offset.retain(),
            result,
        },
    )
}

/// `result = <op> lhs, rhs`
pub fn binary(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Binary {
            op,
            lhs: lhs.retain(),
            rhs: rhs.retain(),
            result,
        },
    )
}

/// `result = cmp.<op> lhs, rhs`
pub fn cmp(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    op: CmpOp,
    lhs: &Value,
    rhs: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Cmp {
            op,
            lhs: lhs.retain(),
            rhs: rhs.retain(),
            result,
        },
    )
}

/// `to = copy from`
pub fn copy(func: &mut Function, types: &TypeInterner, block: Block, from: &Value, to: Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Copy {
            from: from.retain(),
            to,
        },
    )
}

/// `memcpy dst, src, len`
pub fn memcpy(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    dst: &Value,
    src: &Value,
    len: u64,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Memcpy {
            dst: dst.retain(),
            src: src.retain(),
            len,
        },
    )
}

/// `result = zext from` / `result = sext from`
pub fn extend(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    signed: bool,
    from: &Value,
    result: Value,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Extend {
            signed,
            from: from.retain(),
            result,
        },
    )
}

/// `result = trunc from`
pub fn truncate(func: &mut Function, types: &TypeInterner, block: Block, from: &Value, result: Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Truncate {
            from: from.retain(),
            result,
        },
    )
}

/// `result = ptrtoint from`
pub fn ptrtoint(func: &mut Function, types: &TypeInterner, block: Block, from: &Value, result: Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::PtrToInt {
            from: from.retain(),
            result,
        },
    )
}

/// `result = inttoptr from`
pub fn inttoptr(func: &mut Function, types: &TypeInterner, block: Block, from: &Value, result: Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::IntToPtr {
            from: from.retain(),
            result,
        },
    )
}

/// `ret [value]`. Also sets `block`'s terminator to `Exit`.
pub fn ret(func: &mut Function, types: &TypeInterner, block: Block, value: Option<&Value>) -> Inst {
    let inst = push(
        func,
        block,
        types,
        InstData::Return {
            value: value.map(Value::retain),
        },
    );
    func.block_mut(block).set_terminator(Terminator::Exit);
    inst
}

/// `br cond, if_true, if_false`. Also sets `block`'s terminator and
/// records the predecessor edge on both successors.
pub fn branch(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    cond: &Value,
    if_true: Block,
    if_false: Block,
) -> Inst {
    let inst = push(
        func,
        block,
        types,
        InstData::Branch {
            cond: cond.retain(),
            if_true,
            if_false,
        },
    );
    func.block_mut(block)
        .set_terminator(Terminator::Branch(if_true, if_false));
    func.block_mut(if_true).predecessors.push(block);
    func.block_mut(if_false).predecessors.push(block);
    inst
}

/// `jmp target`. Also sets `block`'s terminator and records the
/// predecessor edge.
pub fn jump(func: &mut Function, types: &TypeInterner, block: Block, target: Block) -> Inst {
    let inst = push(func, block, types, InstData::Jump { target });
    func.block_mut(block).set_terminator(Terminator::Jmp(target));
    func.block_mut(target).predecessors.push(block);
    inst
}

/// `jmp *target`
pub fn jump_indirect(func: &mut Function, types: &TypeInterner, block: Block, target: &Value) -> Inst {
    push(
        func,
        block,
        types,
        InstData::JumpIndirect {
            target: target.retain(),
        },
    )
}

/// `[result =] call name(args...)`
pub fn call_direct(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    name: impl Into<String>,
    args: &[Value],
    result: Option<Value>,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Call {
            result,
            callee: CallTarget::Direct(name.into()),
            args: args
                .iter()
                .map(|a| CallArg { value: a.retain() })
                .collect(),
        },
    )
}

/// `[result =] call *callee(args...)`
pub fn call_indirect(
    func: &mut Function,
    types: &TypeInterner,
    block: Block,
    callee: &Value,
    args: &[Value],
    result: Option<Value>,
) -> Inst {
    push(
        func,
        block,
        types,
        InstData::Call {
            result,
            callee: CallTarget::Indirect(callee.retain()),
            args: args
                .iter()
                .map(|a| CallArg { value: a.retain() })
                .collect(),
        },
    )
}
