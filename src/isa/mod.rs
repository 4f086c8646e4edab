//! Target descriptors.
//!
//! A [`Target`] is parsed from a `<arch>-<sys>` triple and
//! bundles everything the passes need that varies by architecture or
//! operating system: pointer size/alignment, the ABI's register
//! assignment, and the per-opcode instruction table isel/the emitter
//! consult. [`CallConv`] is the one piece of this that a function carries
//! independently of any single `Target` (a function's signature names a
//! calling convention; the `Target` says how that convention maps to
//! registers).

pub mod call_conv;
pub mod ir_echo;
pub mod x86_64;

pub use call_conv::CallConv;

use crate::ir::PhysReg;
use crate::result::{CodegenError, CodegenResult};
use smallvec::SmallVec;
use std::str::FromStr;
use target_lexicon::{Architecture, OperatingSystem, Triple};

/// Which concrete back-end a [`Target`] dispatches to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Arch {
    /// The real x86-64/System V back-end.
    X86_64,
    /// A target-agnostic echo back-end that re-serializes the lowered IR
    /// textually instead of emitting assembly, used by the round-trip
    /// test without needing a textual IR parser in this crate.
    IrEcho,
}

/// Operating-system-specific assembly syntax conventions.
#[derive(Clone, Debug)]
pub struct SysConv {
    /// Prefixed onto every global/function symbol in emitted assembly
    /// (`_` on Darwin, empty on Linux).
    pub label_prefix: &'static str,
    /// Section directive for read-only data.
    pub rodata_section: &'static str,
    /// Directive used to mark a symbol weak.
    pub weak_directive: &'static str,
    /// Whether `.align` takes a power of two (Darwin) or a byte count
    /// (Linux).
    pub align_is_pow2: bool,
    /// Whether symbols get a leading underscore (Darwin) or not (Linux).
    pub leading_underscore: bool,
    /// Whether to emit position-independent references by default.
    pub pic: bool,
}

impl SysConv {
    fn for_os(os: OperatingSystem) -> Self {
        match os {
            OperatingSystem::Darwin | OperatingSystem::MacOSX { .. } => SysConv {
                label_prefix: "_",
                rodata_section: ".cstring",
                weak_directive: ".weak_reference",
                align_is_pow2: true,
                leading_underscore: true,
                pic: true,
            },
            _ => SysConv {
                label_prefix: "",
                rodata_section: ".rodata",
                weak_directive: ".weak",
                align_is_pow2: false,
                leading_underscore: false,
                pic: false,
            },
        }
    }
}

/// The System V–style register assignment an ABI pass classifies
/// arguments/returns against.
#[derive(Clone, Debug)]
pub struct AbiRegs {
    /// Integer/pointer argument registers, in order.
    pub int_args: SmallVec<[PhysReg; 6]>,
    /// SSE argument registers, in order.
    pub sse_args: SmallVec<[PhysReg; 8]>,
    /// Integer return registers (first and second eightbyte).
    pub int_rets: SmallVec<[PhysReg; 2]>,
    /// SSE return registers (first and second eightbyte).
    pub sse_rets: SmallVec<[PhysReg; 2]>,
    /// Scratch (caller-saved, allocator-assignable) general-purpose
    /// registers, excluding anything reserved for fixed-register CISC
    /// operands (A/D/C) or the ABI's own argument/return registers'
    /// special status — those remain allocatable, just preferentially
    /// avoided by `isel::reserve_cisc_operands`.
    pub scratch_gpr: SmallVec<[PhysReg; 10]>,
    /// Callee-saved general-purpose registers, permanently excluded from
    /// the allocator's pool (marked busy for the whole function rather than
    /// spilled around).
    pub callee_save_gpr: SmallVec<[PhysReg; 5]>,
    /// The fixed dividend/quotient register (`%rax`).
    pub div_a: PhysReg,
    /// The fixed remainder/high-half register (`%rdx`).
    pub div_d: PhysReg,
    /// The fixed shift-count register (`%rcx`).
    pub shift_c: PhysReg,
    /// The frame pointer.
    pub frame_ptr: PhysReg,
    /// The stack pointer.
    pub stack_ptr: PhysReg,
    /// A register reserved exclusively for the emitter's own scratch needs
    /// (materializing an immediate divisor, rendering an addressing mode
    /// whose base/index is itself spilt) — never a candidate in
    /// `scratch_gpr`, so the allocator can never hand it to an IR value.
    /// A single register reserved by the emitter and used only inside one
    /// instruction's rendering, rather than a process-wide hardcoded
    /// register with a boolean reservation flag.
    pub emit_scratch: PhysReg,
}

/// A fully resolved target descriptor.
#[derive(Clone, Debug)]
pub struct Target {
    /// The parsed triple, kept around for diagnostics.
    pub triple: Triple,
    /// Which back-end this target dispatches to.
    pub arch: Arch,
    /// OS-specific syntax conventions.
    pub sys: SysConv,
    /// ABI register assignment.
    pub abi: AbiRegs,
    /// Default calling convention for this triple.
    pub call_conv: CallConv,
    ptr_size: u32,
    ptr_align: u32,
}

impl Target {
    /// Parse a `<arch>-<sys>` triple into a target descriptor.
    pub fn parse(triple: &str) -> CodegenResult<Target> {
        if triple == "ir" {
            return Ok(Target::ir_echo());
        }
        let parsed = Triple::from_str(triple).map_err(|e| CodegenError::BadTriple {
            triple: triple.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.architecture {
            Architecture::X86_64 => Ok(Target::x86_64(parsed)),
            _ => Err(CodegenError::UnsupportedTarget {
                triple: triple.to_string(),
            }),
        }
    }

    fn x86_64(triple: Triple) -> Target {
        let sys = SysConv::for_os(triple.operating_system);
        let call_conv = CallConv::triple_default(&triple);
        let abi = x86_64::abi_regs();
        Target {
            triple,
            arch: Arch::X86_64,
            sys,
            abi,
            call_conv,
            ptr_size: 8,
            ptr_align: 8,
        }
    }

    fn ir_echo() -> Target {
        Target {
            triple: Triple::unknown(),
            arch: Arch::IrEcho,
            sys: SysConv::for_os(OperatingSystem::Unknown),
            abi: x86_64::abi_regs(),
            call_conv: CallConv::SystemV,
            ptr_size: 8,
            ptr_align: 8,
        }
    }

    /// Pointer size in bytes.
    pub fn ptr_size(&self) -> u32 {
        self.ptr_size
    }

    /// Pointer alignment in bytes.
    pub fn ptr_align(&self) -> u32 {
        self.ptr_align
    }

    /// Number of scratch registers available to the allocator — the
    /// `scratch_reg_count` the spill pass budgets pressure against.
    pub fn scratch_reg_count(&self) -> usize {
        self.abi.scratch_gpr.len()
    }
}
