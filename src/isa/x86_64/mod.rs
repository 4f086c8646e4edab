//! x86-64/System V target support: register file, ABI assignment, and the
//! per-opcode instruction tables isel and the emitter both consult.

pub mod registers;
pub mod tables;

use crate::isa::AbiRegs;
use registers::*;
use smallvec::smallvec;

/// The System V register assignment this crate's ABI pass, isel pass, and
/// emitter all share.
pub fn abi_regs() -> AbiRegs {
    AbiRegs {
        int_args: smallvec![RDI, RSI, RDX, RCX, R8, R9],
        sse_args: smallvec![xmm(0), xmm(1), xmm(2), xmm(3), xmm(4), xmm(5), xmm(6), xmm(7)],
        int_rets: smallvec![RAX, RDX],
        sse_rets: smallvec![xmm(0), xmm(1)],
        scratch_gpr: smallvec![RAX, RCX, RDX, RSI, RDI, R8, R9, R10],
        callee_save_gpr: smallvec![RBX, R12, R13, R14, R15],
        div_a: RAX,
        div_d: RDX,
        shift_c: RCX,
        frame_ptr: RBP,
        stack_ptr: RSP,
        emit_scratch: R11,
    }
}

/// The instruction-suffix letter x86 AT&T syntax uses for an operand of
/// `bytes` size (`b`/`w`/`l`/`q`), used whenever the mnemonic needs an
/// explicit size suffix because none of its operands is a
/// size-disambiguating register.
pub fn size_suffix(bytes: u32) -> char {
    match bytes {
        1 => 'b',
        2 => 'w',
        4 => 'l',
        8 => 'q',
        _ => panic!("x86-64: no instruction suffix for a {}-byte operand", bytes),
    }
}
