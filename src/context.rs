//! Per-function compilation driver.
//!
//! A thin wrapper that owns one [`Function`] and runs the fixed pass
//! pipeline over it. There is no optimization pipeline or verifier pass to
//! select between — this crate's pipeline is unconditional and always the
//! same five passes, so `compile` takes no `OptLevel`/flags argument.

use crate::ir::{Function, TypeInterner};
use crate::isa::Target;
use crate::unit::Unit;
use log::debug;

/// Owns a single function through ABI lowering, instruction selection,
/// spilling, register allocation, and emission, in that fixed order.
pub struct Context {
    /// The function under compilation.
    pub func: Function,
}

impl Context {
    /// Start a fresh compilation context over `func`.
    pub fn for_function(func: Function) -> Self {
        Context { func }
    }

    /// Run every pass over `self.func` in order and return its rendered
    /// assembly, one instruction/directive per line.
    ///
    /// `self.func` must already be finalized (every block given a real
    /// terminator) — the `under construction → finalized` transition is
    /// the caller's responsibility, not this crate's.
    pub fn compile(&mut self, types: &mut TypeInterner, target: &Target) -> Vec<String> {
        debug!("context: compiling {}", self.func.name);
        crate::abi::run(&mut self.func, types, target);
        crate::isel::run(&mut self.func, types, target);
        crate::spill::run(&mut self.func, types, target);
        crate::regalloc::run(&mut self.func, target);
        crate::emit::emit_function(&self.func, types, target)
    }
}

/// Compile every function in `unit` in declaration order, returning each
/// function's rendered assembly lines followed by every global's
/// initializer directives — the top-level driver a front end calls once
/// it has finished building a unit, and the seam this crate's own
/// integration tests drive end to end.
pub fn compile_unit(unit: &mut Unit, target: &Target) -> Vec<String> {
    debug!("context: compiling unit ({} functions)", unit.functions.len());
    let mut out = Vec::new();
    let funcs = std::mem::take(&mut unit.functions);
    let mut compiled = Vec::with_capacity(funcs.len());
    for func in funcs {
        let mut ctx = Context::for_function(func);
        out.extend(ctx.compile(&mut unit.types, target));
        compiled.push(ctx.func);
    }
    unit.functions = compiled;
    for global in &unit.globals {
        out.extend(crate::emit::emit_global(global, &unit.types, target));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder;
    use crate::ir::function::Signature;
    use crate::ir::types::Prim;
    use crate::ir::Value;
    use crate::isa::CallConv;

    fn target() -> Target {
        Target::parse("x86_64-unknown-linux-gnu").unwrap()
    }

    #[test]
    fn compile_runs_every_pass_and_renders_a_return() {
        let mut types = TypeInterner::new(8, 8);
        let i4 = types.intern_primitive(Prim::I4);
        let sig = Signature {
            ret: i4,
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        };
        let mut func = Function::new("five", sig);
        let entry = func.entry();
        let five = Value::literal(i4, 5);
        let result = Value::from_inst(i4, "result");
        builder::copy(&mut func, &types, entry, &five, result.clone());
        builder::ret(&mut func, &types, entry, Some(&result));

        let mut ctx = Context::for_function(func);
        let lines = ctx.compile(&mut types, &target());

        assert!(lines.iter().any(|l| l.contains("ret")));
        assert!(lines.iter().any(|l| l.contains("push")));
    }

    #[test]
    fn compile_unit_renders_functions_then_globals() {
        let mut unit = Unit::new(8, 8);
        let i4 = unit.types.intern_primitive(Prim::I4);
        let sig = Signature {
            ret: i4,
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        };
        let mut func = Function::new("five", sig);
        let entry = func.entry();
        let five = Value::literal(i4, 5);
        let result = Value::from_inst(i4, "result");
        builder::copy(&mut func, &unit.types, entry, &five, result.clone());
        builder::ret(&mut func, &unit.types, entry, Some(&result));
        unit.declare_function(func).unwrap();

        unit.declare_global(crate::unit::GlobalData {
            name: "counter".to_string(),
            ty: i4,
            init: Some(crate::unit::Init::Int { ty: i4, bits: 0 }),
            exported: true,
            constant: false,
            weak: false,
        })
        .unwrap();

        let lines = compile_unit(&mut unit, &target());
        let five_pos = lines.iter().position(|l| l.contains("five:")).unwrap();
        let counter_pos = lines.iter().position(|l| l.contains("counter:")).unwrap();
        assert!(five_pos < counter_pos);
    }
}
