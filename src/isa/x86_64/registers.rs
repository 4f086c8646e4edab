//! x86-64 register file.
//!
//! Register numbering follows a fixed convention (`rax=0, rcx=1, rdx=2,
//! rbx=3, rsp=4, rbp=5, rsi=6, rdi=7, r8..r15=8..15, xmm0..xmm15=16..31`):
//! not alphabetical, and not the DWARF numbering, but the one this crate's
//! tables (division's A/D registers, shift's C register) are written
//! against.

use crate::ir::PhysReg;

/// General-purpose integer registers, in unit-numbering order.
pub const RAX: PhysReg = PhysReg(0);
/// `%rcx`, the fixed shift-count register.
pub const RCX: PhysReg = PhysReg(1);
/// `%rdx`, the fixed division remainder/high-half register.
pub const RDX: PhysReg = PhysReg(2);
/// `%rbx`
pub const RBX: PhysReg = PhysReg(3);
/// `%rsp`, the stack pointer. Never allocatable.
pub const RSP: PhysReg = PhysReg(4);
/// `%rbp`, the frame pointer. Never allocatable.
pub const RBP: PhysReg = PhysReg(5);
/// `%rsi`
pub const RSI: PhysReg = PhysReg(6);
/// `%rdi`
pub const RDI: PhysReg = PhysReg(7);
/// `%r8`
pub const R8: PhysReg = PhysReg(8);
/// `%r9`
pub const R9: PhysReg = PhysReg(9);
/// `%r10`
pub const R10: PhysReg = PhysReg(10);
/// `%r11`
pub const R11: PhysReg = PhysReg(11);
/// `%r12`
pub const R12: PhysReg = PhysReg(12);
/// `%r13`
pub const R13: PhysReg = PhysReg(13);
/// `%r14`
pub const R14: PhysReg = PhysReg(14);
/// `%r15`
pub const R15: PhysReg = PhysReg(15);

/// First SSE register unit.
pub const XMM0_BASE: u16 = 16;

/// `%xmm{n}`, `n` in `0..16`.
pub const fn xmm(n: u16) -> PhysReg {
    PhysReg(XMM0_BASE + n)
}

/// Every general-purpose register this crate's allocator ever marks or
/// assigns, `rsp`/`rbp` included (they're excluded from the scratch/
/// callee-save pools below, but still need a name for diagnostics).
pub const GPRS: [PhysReg; 16] = [
    RAX, RCX, RDX, RBX, RSP, RBP, RSI, RDI, R8, R9, R10, R11, R12, R13, R14, R15,
];

/// Render a register for AT&T-syntax assembly, sized to `bytes` (1, 2, 4,
/// or 8). SSE registers ignore the size suffix convention integer
/// registers use (`%xmm0` is always written the same way).
pub fn name(reg: PhysReg, bytes: u32) -> &'static str {
    if reg.0 >= XMM0_BASE {
        return XMM_NAMES[(reg.0 - XMM0_BASE) as usize];
    }
    let idx = reg.0 as usize;
    match bytes {
        1 => BYTE_NAMES[idx],
        2 => WORD_NAMES[idx],
        4 => LONG_NAMES[idx],
        8 => QUAD_NAMES[idx],
        _ => panic!("x86-64: no register name for a {}-byte operand", bytes),
    }
}

const QUAD_NAMES: [&str; 16] = [
    "%rax", "%rcx", "%rdx", "%rbx", "%rsp", "%rbp", "%rsi", "%rdi", "%r8", "%r9", "%r10", "%r11",
    "%r12", "%r13", "%r14", "%r15",
];
const LONG_NAMES: [&str; 16] = [
    "%eax", "%ecx", "%edx", "%ebx", "%esp", "%ebp", "%esi", "%edi", "%r8d", "%r9d", "%r10d",
    "%r11d", "%r12d", "%r13d", "%r14d", "%r15d",
];
const WORD_NAMES: [&str; 16] = [
    "%ax", "%cx", "%dx", "%bx", "%sp", "%bp", "%si", "%di", "%r8w", "%r9w", "%r10w", "%r11w",
    "%r12w", "%r13w", "%r14w", "%r15w",
];
const BYTE_NAMES: [&str; 16] = [
    "%al", "%cl", "%dl", "%bl", "%spl", "%bpl", "%sil", "%dil", "%r8b", "%r9b", "%r10b", "%r11b",
    "%r12b", "%r13b", "%r14b", "%r15b",
];
const XMM_NAMES: [&str; 16] = [
    "%xmm0", "%xmm1", "%xmm2", "%xmm3", "%xmm4", "%xmm5", "%xmm6", "%xmm7", "%xmm8", "%xmm9",
    "%xmm10", "%xmm11", "%xmm12", "%xmm13", "%xmm14", "%xmm15",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_names() {
        assert_eq!(name(RAX, 8), "%rax");
        assert_eq!(name(RAX, 4), "%eax");
        assert_eq!(name(RAX, 1), "%al");
        assert_eq!(name(R8, 8), "%r8");
        assert_eq!(name(R8, 4), "%r8d");
        assert_eq!(name(xmm(0), 8), "%xmm0");
    }
}
