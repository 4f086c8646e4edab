//! Per-opcode operand-constraint tables.
//!
//! Each row lists, for every operand slot of a generic opcode, the
//! [`OperandClass`] x86-64 accepts there and whether the slot is
//! read/written. `isel::satisfy_operands` picks the row requiring the
//! fewest conversions for the instruction's *current* operand categories.

use crate::ir::OperandClass;

/// One operand slot's requirement within a [`ConstraintRow`].
#[derive(Copy, Clone, Debug)]
pub struct OperandConstraint {
    /// The category this slot must end up in.
    pub class: OperandClass,
    /// The instruction reads this slot.
    pub input: bool,
    /// The instruction writes this slot.
    pub output: bool,
}

const fn inp(class: OperandClass) -> OperandConstraint {
    OperandConstraint {
        class,
        input: true,
        output: false,
    }
}
const fn out(class: OperandClass) -> OperandConstraint {
    OperandConstraint {
        class,
        input: false,
        output: true,
    }
}

/// One legal combination of operand categories for a generic opcode.
#[derive(Debug)]
pub struct ConstraintRow {
    /// Per-slot requirements, in operand order.
    pub ops: &'static [OperandConstraint],
}

/// The shapes this crate's generic operand-satisfaction phase (isel phase
/// C) dispatches on. Opcodes handled entirely by phase A (pointer
/// arithmetic) or phase B (CISC reservation) — `ptradd`/`ptrsub`, the
/// div/shift family — don't appear here; by the time phase C runs they've
/// already been rewritten into the opcodes below plus fixed-register
/// copies.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum GenericOpcode {
    /// `result = load ptr`
    Load,
    /// `store from, ptr`
    Store,
    /// Any two-input, one-output arithmetic op (add/sub/mul/and/or/xor and
    /// the already-reserved div/shift once their fixed operand has been
    /// pinned).
    Binary,
    /// `result = cmp.<op> lhs, rhs`
    Cmp,
    /// `to = copy from`
    Copy,
    /// `result = zext/sext from`
    Extend,
    /// `result = trunc from`
    Truncate,
    /// `result = ptrtoint/inttoptr from`
    PtrCast,
}

// x86-64 can read a memory operand directly as an arithmetic/compare
// source (`addl (%rax), %ebx`), but never as a destination of a
// register-producing op, and never two memory operands at once — hence a
// row for "rhs already in memory" but never one with both operands in
// memory.
static BINARY_ROWS: &[ConstraintRow] = &[
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), inp(OperandClass::Reg), out(OperandClass::Reg)],
    },
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), inp(OperandClass::Int), out(OperandClass::Reg)],
    },
    ConstraintRow {
        ops: &[
            inp(OperandClass::Reg),
            inp(OperandClass::MemContents),
            out(OperandClass::Reg),
        ],
    },
];

static CMP_ROWS: &[ConstraintRow] = &[
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), inp(OperandClass::Reg), out(OperandClass::Reg)],
    },
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), inp(OperandClass::Int), out(OperandClass::Reg)],
    },
];

static LOAD_ROWS: &[ConstraintRow] = &[ConstraintRow {
    ops: &[inp(OperandClass::Reg), out(OperandClass::Reg)],
}];

static STORE_ROWS: &[ConstraintRow] = &[
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), inp(OperandClass::Reg)],
    },
    ConstraintRow {
        ops: &[inp(OperandClass::Int), inp(OperandClass::Reg)],
    },
];

static COPY_ROWS: &[ConstraintRow] = &[
    ConstraintRow {
        ops: &[inp(OperandClass::Reg), out(OperandClass::Reg)],
    },
    ConstraintRow {
        ops: &[inp(OperandClass::Int), out(OperandClass::Reg)],
    },
];

static UNARY_ROWS: &[ConstraintRow] = &[ConstraintRow {
    ops: &[inp(OperandClass::Reg), out(OperandClass::Reg)],
}];

/// The legal operand-category rows for `op`, most to try in order.
pub fn rows_for(op: GenericOpcode) -> &'static [ConstraintRow] {
    match op {
        GenericOpcode::Load => LOAD_ROWS,
        GenericOpcode::Store => STORE_ROWS,
        GenericOpcode::Binary => BINARY_ROWS,
        GenericOpcode::Cmp => CMP_ROWS,
        GenericOpcode::Copy => COPY_ROWS,
        GenericOpcode::Extend | GenericOpcode::Truncate | GenericOpcode::PtrCast => UNARY_ROWS,
    }
}
