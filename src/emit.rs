//! Assembly emitter.
//!
//! Runs last, once per function, after ABI lowering, instruction selection,
//! spilling, and register allocation have all completed: every operand
//! reaching this pass already carries a concrete [`Place`] — `SpecificReg`
//! or `Spilt` — or is one of the handful of kinds that never need one
//! (literal, undef, global, label). Unlike `isel`, this pass never rewrites
//! the instruction stream or reaches for `tables::rows_for` — by
//! construction there is exactly one way left to render each instruction,
//! so matching each opcode against its one remaining shape directly, rather
//! than re-running row selection, is enough.
//!
//! Walks blocks in DFS order from entry, same as every other pass, and
//! renders one assembly line (or none, for a `skip`ped instruction) per
//! `InstData`.

use crate::ir::entities::Block;
use crate::ir::function::Function;
use crate::ir::instruction::{BinOp, CallTarget, CmpOp, ElemIndex, InstData};
use crate::ir::types::{Type, TypeData, TypeInterner};
use crate::ir::value::{Place, Value, ValueKind};
use crate::isa::x86_64::{registers, size_suffix};
use crate::isa::{Arch, Target};
use crate::result::panic_invariant;
use crate::unit::{GlobalData, Init};
use log::debug;

/// Render `func`'s lowered instruction stream as a sequence of assembly
/// lines. `func` must already have been through `abi`/`isel`/`spill`/
/// `regalloc` — see [`crate::context::Context::compile`].
pub fn emit_function(func: &Function, types: &TypeInterner, target: &Target) -> Vec<String> {
    if target.arch == Arch::IrEcho {
        return crate::isa::ir_echo::render_function(func, types)
            .lines()
            .map(str::to_string)
            .collect();
    }
    debug!("emit: rendering {}", func.name);
    let mut e = Emitter {
        func,
        types,
        target,
        out: Vec::new(),
    };
    e.emit_function();
    e.out
}

/// Render one global's declaration and initializer directives. Unlike
/// `emit_function` this never touches
/// `target.arch`: a global's byte layout doesn't depend on the back-end,
/// only on `target.sys`'s assembler syntax.
pub fn emit_global(global: &GlobalData, types: &TypeInterner, target: &Target) -> Vec<String> {
    let mut out = Vec::new();
    let label = symbol(target, &global.name);
    if global.exported {
        out.push(format!("\t.globl {}", label));
    }
    if global.weak {
        out.push(format!("\t{} {}", target.sys.weak_directive, label));
    }
    if global.constant {
        out.push(format!("\t.section {}", target.sys.rodata_section));
    }
    let align = types.align_of(global.ty).max(1);
    out.push(format!(
        "\t.align {}",
        if target.sys.align_is_pow2 {
            align.trailing_zeros()
        } else {
            align
        }
    ));
    out.push(format!("{}:", label));
    match &global.init {
        Some(init) => emit_init(init, types, &mut out),
        None => out.push(format!("\t.space {}", types.size_of(global.ty))),
    }
    out
}

fn symbol(target: &Target, name: &str) -> String {
    format!("{}{}", target.sys.label_prefix, name)
}

fn emit_init(init: &Init, types: &TypeInterner, out: &mut Vec<String>) {
    match init {
        Init::Int { ty, bits } => {
            let size = types.size_of(*ty).max(1);
            let directive = match size {
                1 => ".byte",
                2 => ".word",
                4 => ".long",
                8 => ".quad",
                n => panic_invariant("emit: no scalar directive for this initializer width", &n),
            };
            out.push(format!("\t{} {}", directive, bits));
        }
        Init::Str(bytes) => out.push(format!("\t.ascii \"{}\"", escape_ascii(bytes))),
        Init::Ptr { symbol: target_sym, addend } => {
            if *addend == 0 {
                out.push(format!("\t.quad {}", target_sym));
            } else {
                out.push(format!("\t.quad {}+{}", target_sym, addend));
            }
        }
        Init::Array { elems, .. } => {
            for e in elems {
                emit_init(e, types, out);
            }
        }
        Init::Struct { ty, fields } => emit_struct_init(*ty, fields, types, out),
        Init::Zero(n) => out.push(format!("\t.space {}", n)),
    }
}

/// Walk a struct initializer's fields in order, inserting `.space` padding
/// wherever a field's offset leaves a gap since the previous field ended,
/// plus trailing padding up to the struct's own size.
fn emit_struct_init(ty: Type, fields: &[Init], types: &TypeInterner, out: &mut Vec<String>) {
    let field_tys = match types.data(types.resolve(ty)) {
        TypeData::Struct(tys) => tys.clone(),
        _ => panic_invariant("emit: struct initializer's type is not a struct", &"init"),
    };
    let offsets = types.field_offsets(ty);
    let total = types.size_of(ty);
    let mut cursor = 0u32;
    for (i, field_init) in fields.iter().enumerate() {
        let off = offsets[i];
        if off > cursor {
            out.push(format!("\t.space {}", off - cursor));
        }
        emit_init(field_init, types, out);
        cursor = off + types.size_of(field_tys[i]);
    }
    if total > cursor {
        out.push(format!("\t.space {}", total - cursor));
    }
}

/// Escape a byte string for `.ascii`, following
/// `original_source/string.c`'s `dump_escaped_string`: quote the `"`
/// character, pass printable bytes through, and render everything else as
/// a three-digit octal escape.
fn escape_ascii(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            0x20..=0x7e => s.push(b as char),
            _ => s.push_str(&format!("\\{:03o}", b)),
        }
    }
    s
}

fn setcc_mnemonic(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "sete",
        CmpOp::Ne => "setne",
        CmpOp::Slt => "setl",
        CmpOp::Sle => "setle",
        CmpOp::Sgt => "setg",
        CmpOp::Sge => "setge",
        CmpOp::Ult => "setb",
        CmpOp::Ule => "setbe",
        CmpOp::Ugt => "seta",
        CmpOp::Uge => "setae",
    }
}

fn binop_mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "imul",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::AShr => "sar",
        BinOp::LShr => "shr",
        BinOp::SDiv | BinOp::UDiv | BinOp::SRem | BinOp::URem => {
            panic_invariant("emit: div-family op has no two-operand mnemonic", &op)
        }
    }
}

struct Emitter<'a> {
    func: &'a Function,
    types: &'a TypeInterner,
    target: &'a Target,
    out: Vec<String>,
}

impl<'a> Emitter<'a> {
    fn emit_function(&mut self) {
        let label = symbol(self.target, &self.func.name);
        if self.func.attributes.exported {
            self.out.push(format!("\t.globl {}", label));
        }
        self.out.push(format!(
            "\t.align {}",
            if self.target.sys.align_is_pow2 { 4 } else { 16 }
        ));
        self.out.push(format!("{}:", label));
        self.emit_prologue();
        for block in self.func.dfs_blocks() {
            if block != self.func.entry() {
                self.out.push(format!("{}:", self.block_label(block)));
            }
            for inst in self.func.block_insts(block) {
                let node = self.func.inst(inst);
                if node.skip {
                    continue;
                }
                self.emit_inst(&node.data);
            }
        }
    }

    fn block_label(&self, b: Block) -> String {
        format!(".L{}_{}", self.func.name, self.func.block(b).label)
    }

    /// Frame size: alloca/spill area plus the largest outgoing call-argument
    /// area any call site needs, rounded up to 16 bytes if the function
    /// calls out (to keep the callee's own entry SysV-aligned) or to the
    /// target's pointer alignment otherwise.
    fn frame_size(&self) -> i32 {
        let used = self.func.stack_use() + self.func.call_arg_area();
        let align = if self.func.has_calls() {
            16
        } else {
            self.target.ptr_align() as i32
        };
        align_up(used, align)
    }

    fn emit_prologue(&mut self) {
        let fp = registers::name(self.target.abi.frame_ptr, 8);
        let sp = registers::name(self.target.abi.stack_ptr, 8);
        self.out.push(format!("\tpush {}", fp));
        self.out.push(format!("\tmov {}, {}", sp, fp));
        let frame = self.frame_size();
        if frame > 0 {
            self.out.push(format!("\tsub ${}, {}", frame, sp));
        }
    }

    fn emit_epilogue(&mut self) {
        let fp = registers::name(self.target.abi.frame_ptr, 8);
        let sp = registers::name(self.target.abi.stack_ptr, 8);
        self.out.push(format!("\tmov {}, {}", fp, sp));
        self.out.push(format!("\tpop {}", fp));
        self.out.push("\tret".to_string());
    }

    /// The physical register a value's location must already name. Every
    /// operand reaching this pass that isn't volatile and isn't on the
    /// stack has one by construction: the allocator assigns every such
    /// value a concrete register before this pass ever runs.
    fn reg(&self, v: &Value) -> crate::ir::PhysReg {
        match v.location().place {
            Place::SpecificReg(r) => r,
            other => panic_invariant("emit: operand has no concrete register at emission", &format!("{:?}", other)),
        }
    }

    fn bytes_of(&self, v: &Value) -> u32 {
        self.types.size_of(v.ty()).max(1)
    }

    /// Render `v` as an assembly operand sized to `bytes` (spec.md §4.8's
    /// operand-rendering table): a literal or undef is an immediate, a
    /// global or block label is RIP-relative, and everything else reads
    /// its current `Place`.
    fn operand(&self, v: &Value, bytes: u32) -> String {
        match v.kind() {
            ValueKind::Literal(bits) => format!("${}", bits),
            ValueKind::Undef => "$0".to_string(),
            ValueKind::Global(name) => format!("{}(%rip)", symbol(self.target, name)),
            ValueKind::Label(block) => format!("{}(%rip)", self.block_label(*block)),
            _ => match v.location().place {
                Place::SpecificReg(r) => registers::name(r, bytes).to_string(),
                Place::Spilt(off) => format!("-{}({})", off, registers::name(self.target.abi.frame_ptr, 8)),
                other => panic_invariant("emit: value has no concrete location at emission", &format!("{:?}", other)),
            },
        }
    }

    /// Render `v` dereferenced: the memory address a pointer-typed operand
    /// points at, parenthesized (spec.md §4.8: "dereference → parenthesize").
    fn addr(&self, v: &Value) -> String {
        format!("({})", registers::name(self.reg(v), 8))
    }

    fn emit_inst(&mut self, data: &InstData) {
        match data {
            InstData::Load { ptr, result } => {
                let bytes = self.bytes_of(result);
                let suffix = size_suffix(bytes);
                let addr = self.addr(ptr);
                let dst = self.operand(result, bytes);
                self.out.push(format!("\tmov{} {}, {}", suffix, addr, dst));
            }
            InstData::Store { from, ptr } => {
                let bytes = self.bytes_of(from);
                let suffix = size_suffix(bytes);
                let src = self.operand(from, bytes);
                let addr = self.addr(ptr);
                self.out.push(format!("\tmov{} {}, {}", suffix, src, addr));
            }
            InstData::Alloca { result } => {
                let off = self
                    .func
                    .alloca_offset(result)
                    .unwrap_or_else(|| panic_invariant("emit: alloca has no assigned stack slot", &"alloca"));
                let fp = registers::name(self.target.abi.frame_ptr, 8);
                let dst = registers::name(self.reg(result), 8);
                self.out.push(format!("\tlea -{}({}), {}", off, fp, dst));
            }
            InstData::Elem { base, index, result } => self.emit_elem(base, index, result),
            InstData::PtrAdd { .. } => {
                panic_invariant("emit: ptradd must be rewritten by isel before emission", &"ptradd")
            }
            InstData::PtrSub { .. } => {
                panic_invariant("emit: ptrsub must be rewritten by isel before emission", &"ptrsub")
            }
            InstData::Binary { op, lhs, rhs, result } => self.emit_binary(*op, lhs, rhs, result),
            InstData::Cmp { op, lhs, rhs, result } => self.emit_cmp(*op, lhs, rhs, result),
            InstData::Copy { from, to } => self.emit_copy(from, to),
            InstData::Memcpy { .. } => {
                panic_invariant("emit: memcpy must be expanded by isel before emission", &"memcpy")
            }
            InstData::Extend { signed, from, result } => self.emit_extend(*signed, from, result),
            InstData::Truncate { from, result } => self.emit_truncate(from, result),
            InstData::PtrToInt { from, result } | InstData::IntToPtr { from, result } => {
                let src = self.operand(from, 8);
                let dst = self.operand(result, 8);
                if src != dst {
                    self.out.push(format!("\tmovq {}, {}", src, dst));
                }
            }
            InstData::Return { .. } => self.emit_epilogue(),
            InstData::Branch { cond, if_true, if_false } => {
                let bytes = self.bytes_of(cond);
                let suffix = size_suffix(bytes);
                let reg = self.operand(cond, bytes);
                self.out.push(format!("\ttest{} {}, {}", suffix, reg, reg));
                self.out.push(format!("\tjne {}", self.block_label(*if_true)));
                self.out.push(format!("\tjmp {}", self.block_label(*if_false)));
            }
            InstData::Jump { target } => self.out.push(format!("\tjmp {}", self.block_label(*target))),
            InstData::JumpIndirect { target } => {
                let reg = registers::name(self.reg(target), 8);
                self.out.push(format!("\tjmp *{}", reg));
            }
            // The symbolic address of a block taken as a standalone value
            // is materialized wherever it's read (a `Copy`'s `from`, a
            // `JumpIndirect`'s `target`); the marker instruction itself has
            // no result and needs no code of its own.
            InstData::Label { .. } => {}
            InstData::Call { callee, args, .. } => self.emit_call(callee, args),
            InstData::Asm { template, operands } => self.emit_asm(template, operands),
            InstData::ImplicitUseStart { .. } | InstData::ImplicitUseEnd { .. } => {}
        }
    }

    fn emit_elem(&mut self, base: &Value, index: &ElemIndex, result: &Value) {
        let field = match index {
            ElemIndex::Field(n) => *n,
            ElemIndex::ArrayIndex(_) => {
                panic_invariant("emit: array-indexed elem must be rewritten by isel before emission", &"elem")
            }
        };
        let pointee = self
            .types
            .deref(base.ty())
            .unwrap_or_else(|| panic_invariant("emit: elem base is not a pointer", &"elem"));
        let offsets = self.types.field_offsets(pointee);
        let off = offsets[field as usize];
        let base_reg = registers::name(self.reg(base), 8);
        let dst = registers::name(self.reg(result), 8);
        if off == 0 {
            self.out.push(format!("\tlea ({}), {}", base_reg, dst));
        } else {
            self.out.push(format!("\tlea {}({}), {}", off, base_reg, dst));
        }
    }

    /// x86 ALU instructions are two-address: synthesize `mov lhs, result`
    /// first whenever `result` doesn't already share `lhs`'s register
    /// (regalloc leaves them distinct unless it happened to mirror them),
    /// then render the real operation against `result` in place.
    fn emit_binary(&mut self, op: BinOp, lhs: &Value, rhs: &Value, result: &Value) {
        if op.is_div_family() {
            let mnemonic = if op.is_signed_div() { "idiv" } else { "div" };
            let bytes = self.bytes_of(lhs);
            let suffix = size_suffix(bytes);
            let rhs_str = self.operand(rhs, bytes);
            self.out.push(format!("\t{}{} {}", mnemonic, suffix, rhs_str));
            return;
        }
        let bytes = self.bytes_of(result);
        let suffix = size_suffix(bytes);
        let lhs_reg = self.reg(lhs);
        let result_reg = self.reg(result);
        if lhs_reg != result_reg {
            self.out.push(format!(
                "\tmov{} {}, {}",
                suffix,
                registers::name(lhs_reg, bytes),
                registers::name(result_reg, bytes)
            ));
        }
        if op.is_shift() {
            let rhs_str = self.operand(rhs, 1);
            let mnemonic = match op {
                BinOp::Shl => "shl",
                BinOp::AShr => "sar",
                BinOp::LShr => "shr",
                _ => unreachable!("is_shift"),
            };
            self.out.push(format!(
                "\t{}{} {}, {}",
                mnemonic,
                suffix,
                rhs_str,
                registers::name(result_reg, bytes)
            ));
        } else {
            let rhs_str = self.operand(rhs, bytes);
            self.out.push(format!(
                "\t{}{} {}, {}",
                binop_mnemonic(op),
                suffix,
                rhs_str,
                registers::name(result_reg, bytes)
            ));
        }
    }

    fn emit_cmp(&mut self, op: CmpOp, lhs: &Value, rhs: &Value, result: &Value) {
        let bytes = self.bytes_of(lhs);
        let suffix = size_suffix(bytes);
        let lhs_str = self.operand(lhs, bytes);
        let rhs_str = self.operand(rhs, bytes);
        self.out.push(format!("\tcmp{} {}, {}", suffix, rhs_str, lhs_str));
        let result_reg = registers::name(self.reg(result), 1);
        self.out.push(format!("\t{} {}", setcc_mnemonic(op), result_reg));
    }

    fn emit_copy(&mut self, from: &Value, to: &Value) {
        let bytes = self.bytes_of(to);
        match from.kind() {
            ValueKind::Global(name) => {
                let dst = registers::name(self.reg(to), 8);
                self.out.push(format!("\tlea {}(%rip), {}", symbol(self.target, name), dst));
            }
            ValueKind::Label(block) => {
                let dst = registers::name(self.reg(to), 8);
                self.out.push(format!("\tlea {}(%rip), {}", self.block_label(*block), dst));
            }
            _ => {
                let suffix = size_suffix(bytes);
                let src = self.operand(from, bytes);
                let dst = self.operand(to, bytes);
                if src != dst {
                    self.out.push(format!("\tmov{} {}, {}", suffix, src, dst));
                }
            }
        }
    }

    fn emit_extend(&mut self, signed: bool, from: &Value, result: &Value) {
        let from_bytes = self.bytes_of(from);
        let to_bytes = self.bytes_of(result);
        let from_reg = self.reg(from);
        let to_reg = self.reg(result);
        if !signed && from_bytes == 4 && to_bytes == 8 {
            // A plain 32-bit write already zero-extends into the full
            // 64-bit register on x86-64; `movzlq` isn't an encodable
            // mnemonic, so this is the one extend combination rendered as
            // an ordinary `mov` instead of `movz`/`movs`.
            self.out.push(format!(
                "\tmovl {}, {}",
                registers::name(from_reg, 4),
                registers::name(to_reg, 4)
            ));
            return;
        }
        let mnemonic = format!(
            "mov{}{}{}",
            if signed { "s" } else { "z" },
            size_suffix(from_bytes),
            size_suffix(to_bytes)
        );
        self.out.push(format!(
            "\t{} {}, {}",
            mnemonic,
            registers::name(from_reg, from_bytes),
            registers::name(to_reg, to_bytes)
        ));
    }

    fn emit_truncate(&mut self, from: &Value, result: &Value) {
        let to_bytes = self.bytes_of(result);
        let suffix = size_suffix(to_bytes);
        let src = registers::name(self.reg(from), to_bytes);
        let dst = registers::name(self.reg(result), to_bytes);
        if src != dst {
            self.out.push(format!("\tmov{} {}, {}", suffix, src, dst));
        }
    }

    /// By the time a call reaches emission the ABI pass has cleared its
    /// in-IR argument list (spec.md §8: "for every call instruction after
    /// the ABI pass, the call's in-IR argument list is empty") and already
    /// materialized every argument/return value around it as ordinary
    /// `Copy`/`Store`/`Load` instructions, so this renders just the call
    /// site itself.
    fn emit_call(&mut self, callee: &CallTarget, args: &[crate::ir::CallArg]) {
        debug_assert!(args.is_empty(), "call still has unlowered in-IR arguments at emission");
        match callee {
            CallTarget::Direct(name) => self.out.push(format!("\tcall {}", symbol(self.target, name))),
            CallTarget::Indirect(v) => {
                let reg = registers::name(self.reg(v), 8);
                self.out.push(format!("\tcall *{}", reg));
            }
        }
    }

    fn emit_asm(&mut self, template: &str, operands: &[Value]) {
        if operands.is_empty() {
            self.out.push(format!("\t{}", template));
            return;
        }
        let mut rendered = template.to_string();
        for (i, op) in operands.iter().enumerate() {
            let bytes = self.bytes_of(op);
            rendered = rendered.replace(&format!("{{{}}}", i), &self.operand(op, bytes));
        }
        self.out.push(format!("\t{}", rendered));
    }
}

fn align_up(n: i32, align: i32) -> i32 {
    if align <= 0 {
        n
    } else {
        (n + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::function::{Function, Signature};
    use crate::ir::types::Prim;
    use crate::ir::Value;
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

    fn lower(func: &mut Function, types: &mut TypeInterner, target: &Target) {
        crate::abi::run(func, types, target);
        crate::isel::run(func, types, target);
        crate::spill::run(func, types, target);
        crate::regalloc::run(func, target);
    }

    #[test]
    fn return_of_a_literal_emits_prologue_mov_and_ret() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("five", sig(i4));
        let entry = f.entry();
        let five = Value::literal(i4, 5);
        let result = Value::from_inst(i4, "result");
        builder::copy(&mut f, &types, entry, &five, result.clone());
        builder::ret(&mut f, &types, entry, Some(&result));

        lower(&mut f, &mut types, &target());
        let lines = emit_function(&f, &types, &target());

        assert_eq!(lines.first().unwrap(), "five:");
        assert!(lines.iter().any(|l| l.contains("push %rbp")));
        assert!(lines.iter().any(|l| l.trim_start() == "ret"));
        assert!(lines.iter().any(|l| l.contains("mov") && l.contains("$5")));
    }

    #[test]
    fn equality_compare_emits_cmp_and_setcc() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let i1 = types.intern_primitive(Prim::I1);
        let mut f = Function::new("eq", sig(i1));
        let entry = f.entry();
        let a = Value::from_inst(i4, "a");
        builder::copy(&mut f, &types, entry, &Value::literal(i4, 1), a.clone());
        let result = Value::from_inst(i1, "result");
        builder::cmp(
            &mut f,
            &types,
            entry,
            crate::ir::CmpOp::Eq,
            &a,
            &Value::literal(i4, 1),
            result.clone(),
        );
        builder::ret(&mut f, &types, entry, Some(&result));

        lower(&mut f, &mut types, &target());
        let lines = emit_function(&f, &types, &target());

        assert!(lines.iter().any(|l| l.starts_with("\tcmp")));
        assert!(lines.iter().any(|l| l.starts_with("\tsete")));
    }

    #[test]
    fn signed_division_emits_cltd_or_cqto_then_idiv() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let mut f = Function::new("sdiv", sig(i4));
        let entry = f.entry();
        let a = Value::from_inst(i4, "a");
        builder::copy(&mut f, &types, entry, &Value::literal(i4, 10), a.clone());
        let b = Value::from_inst(i4, "b");
        builder::copy(&mut f, &types, entry, &Value::literal(i4, 3), b.clone());
        let result = Value::from_inst(i4, "result");
        builder::binary(&mut f, &types, entry, BinOp::SDiv, &a, &b, result.clone());
        builder::ret(&mut f, &types, entry, Some(&result));

        lower(&mut f, &mut types, &target());
        let lines = emit_function(&f, &types, &target());

        assert!(lines.iter().any(|l| l.trim_start() == "cltd"));
        assert!(lines.iter().any(|l| l.starts_with("\tidivl")));
    }

    #[test]
    fn struct_field_access_renders_as_lea() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let pair = types.intern_struct(vec![i4, i4]);
        let ptr_pair = types.intern_ptr(pair);
        let mut f = Function::new("field", sig(i4));
        let entry = f.entry();
        let slot = Value::alloca(ptr_pair, "slot");
        f.append_inst(entry, InstData::Alloca { result: slot.retain() });
        let field_ptr = Value::from_inst(types.intern_ptr(i4), "fp");
        f.append_inst(
            entry,
            InstData::Elem {
                base: slot.retain(),
                index: ElemIndex::Field(1),
                result: field_ptr.retain(),
            },
        );
        let loaded = Value::from_inst(i4, "loaded");
        builder::ret(&mut f, &types, entry, None);
        let _ = (&field_ptr, &loaded);

        lower(&mut f, &mut types, &target());
        let lines = emit_function(&f, &types, &target());
        assert!(lines.iter().any(|l| l.starts_with("\tlea")));
    }

    #[test]
    fn global_initializer_pads_between_struct_fields() {
        let mut types = TypeInterner::new(8, 8);
        let i1 = types.intern_primitive(Prim::I1);
        let i8 = types.intern_primitive(Prim::I8);
        let s = types.intern_struct(vec![i1, i8]);
        let init = Init::Struct {
            ty: s,
            fields: vec![Init::Int { ty: i1, bits: 1 }, Init::Int { ty: i8, bits: 2 }],
        };
        let global = GlobalData {
            name: "g".to_string(),
            ty: s,
            init: Some(init),
            exported: true,
            constant: false,
            weak: false,
        };
        let lines = emit_global(&global, &types, &target());
        assert!(lines.iter().any(|l| l.contains(".byte 1")));
        assert!(lines.iter().any(|l| l.contains(".space 7")));
        assert!(lines.iter().any(|l| l.contains(".quad 2")));
    }

    #[test]
    fn string_initializer_escapes_quotes() {
        let mut types = TypeInterner::new(8, 8);
        let i1 = types.intern_primitive(Prim::I1);
        let arr = types.intern_array(i1, 2);
        let global = GlobalData {
            name: "s".to_string(),
            ty: arr,
            init: Some(Init::Str(b"a\"b".to_vec())),
            exported: false,
            constant: true,
            weak: false,
        };
        let lines = emit_global(&global, &types, &target());
        assert!(lines.iter().any(|l| l.contains("a\\\"b")));
    }
}
