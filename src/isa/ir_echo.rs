//! A target-agnostic "echo" back-end.
//!
//! Instead of assembly, this renders the already-lowered instruction
//! stream back into a textual IR grammar
//! (`$name = <ret-type>(<arg-type> $arg, …) { … }`). It exists purely so
//! this crate's own round-trip test can exercise "emit, then compare
//! structurally" without a textual IR parser, which is an external
//! collaborator this crate doesn't implement.

use crate::ir::{Function, InstData, TypeInterner};
use std::fmt::Write;

/// Render `func`'s current instruction stream in the textual IR grammar.
/// Value names come from `Value::name()`; unnamed values (temporaries
/// produced mid-pass that were never given a name) render as `%_`.
pub fn render_function(func: &Function, types: &TypeInterner) -> String {
    let mut out = String::new();
    let params: Vec<String> = func
        .sig
        .params
        .iter()
        .zip(func.arg_names.iter())
        .map(|(ty, name)| format!("{} ${}", types.display(*ty), name))
        .collect();
    writeln!(
        out,
        "${} = {}({}{}) {{",
        func.name,
        types.display(func.sig.ret),
        params.join(", "),
        if func.sig.variadic { ", ..." } else { "" }
    )
    .unwrap();

    for block in func.dfs_blocks() {
        writeln!(out, "{}:", func.block(block).label).unwrap();
        for inst in func.block_insts(block) {
            let node = func.inst(inst);
            if node.skip {
                continue;
            }
            render_inst(&mut out, &node.data);
        }
    }
    writeln!(out, "}}").unwrap();
    out
}

fn vname(v: &crate::ir::Value) -> String {
    format!("%{}", v.name().unwrap_or("_"))
}

fn render_inst(out: &mut String, data: &InstData) {
    match data {
        InstData::Load { ptr, result } => {
            writeln!(out, "  {} = load {}", vname(result), vname(ptr)).unwrap()
        }
        InstData::Store { from, ptr } => {
            writeln!(out, "  store {}, {}", vname(from), vname(ptr)).unwrap()
        }
        InstData::Alloca { result } => writeln!(out, "  {} = alloca", vname(result)).unwrap(),
        InstData::Elem { base, result, .. } => {
            writeln!(out, "  {} = elem {}", vname(result), vname(base)).unwrap()
        }
        InstData::PtrAdd { base, offset, result } => writeln!(
            out,
            "  {} = ptradd {}, {}",
            vname(result),
            vname(base),
            vname(offset)
        )
        .unwrap(),
        InstData::PtrSub { base, offset, result } => writeln!(
            out,
            "  {} = ptrsub {}, {}",
            vname(result),
            vname(base),
            vname(offset)
        )
        .unwrap(),
        InstData::Binary { op, lhs, rhs, result } => {
            writeln!(out, "  {} = {} {}, {}", vname(result), op, vname(lhs), vname(rhs)).unwrap()
        }
        InstData::Cmp { op, lhs, rhs, result } => writeln!(
            out,
            "  {} = cmp.{} {}, {}",
            vname(result),
            op,
            vname(lhs),
            vname(rhs)
        )
        .unwrap(),
        InstData::Copy { from, to } => {
            writeln!(out, "  {} = copy {}", vname(to), vname(from)).unwrap()
        }
        InstData::Memcpy { dst, src, len } => {
            writeln!(out, "  memcpy {}, {}, {}", vname(dst), vname(src), len).unwrap()
        }
        InstData::Extend { signed, from, result } => writeln!(
            out,
            "  {} = {} {}",
            vname(result),
            if *signed { "sext" } else { "zext" },
            vname(from)
        )
        .unwrap(),
        InstData::Truncate { from, result } => {
            writeln!(out, "  {} = trunc {}", vname(result), vname(from)).unwrap()
        }
        InstData::PtrToInt { from, result } => {
            writeln!(out, "  {} = ptrtoint {}", vname(result), vname(from)).unwrap()
        }
        InstData::IntToPtr { from, result } => {
            writeln!(out, "  {} = inttoptr {}", vname(result), vname(from)).unwrap()
        }
        InstData::Return { value: Some(v) } => writeln!(out, "  ret {}", vname(v)).unwrap(),
        InstData::Return { value: None } => writeln!(out, "  ret").unwrap(),
        InstData::Branch { cond, if_true, if_false } => {
            writeln!(out, "  br {}, {:?}, {:?}", vname(cond), if_true, if_false).unwrap()
        }
        InstData::Jump { target } => writeln!(out, "  jmp {:?}", target).unwrap(),
        InstData::JumpIndirect { target } => {
            writeln!(out, "  jmp *{}", vname(target)).unwrap()
        }
        InstData::Label { block } => writeln!(out, "  label {:?}", block).unwrap(),
        InstData::Call { result, callee, args } => {
            let callee_s = match callee {
                crate::ir::CallTarget::Direct(name) => format!("${}", name),
                crate::ir::CallTarget::Indirect(v) => format!("*{}", vname(v)),
            };
            let args_s: Vec<_> = args.iter().map(|a| vname(&a.value)).collect();
            match result {
                Some(r) => writeln!(out, "  {} = call {}({})", vname(r), callee_s, args_s.join(", ")).unwrap(),
                None => writeln!(out, "  call {}({})", callee_s, args_s.join(", ")).unwrap(),
            }
        }
        InstData::Asm { template, .. } => writeln!(out, "  asm \"{}\"", template).unwrap(),
        InstData::ImplicitUseStart { id, values } => {
            let vs: Vec<_> = values.iter().map(vname).collect();
            writeln!(out, "  implicit_use_start #{} [{}]", id, vs.join(", ")).unwrap()
        }
        InstData::ImplicitUseEnd { id } => writeln!(out, "  implicit_use_end #{}", id).unwrap(),
    }
}
