//! Compilation unit: the type universe, global variable table, and
//! function list a whole translation unit shares.
//!
//! [`GlobalData`]/[`Init`] model a tagged initializer plus `internal`/
//! `constant`/`weak` linkage flags; a front end owns parsing and type
//! checking, handing this module just enough book-keeping — one shared
//! name namespace across globals and functions — to drive
//! [`crate::context::compile_unit`] over more than one function.

use crate::ir::{Function, Type, TypeInterner};
use crate::result::{CodegenError, CodegenResult};
use std::collections::HashSet;

/// One leaf or nested node of a global's initializer. A pure type-renaming
/// alias for diagnostics carries no byte-layout information of its own, so
/// a front end resolves it away before handing an initializer to this
/// crate — it has no variant here.
#[derive(Clone, Debug)]
pub enum Init {
    /// A scalar integer leaf, `bits` truncated to `ty`'s width at emission.
    Int {
        /// The leaf's type, used to pick the emitted directive's width.
        ty: Type,
        /// The constant value.
        bits: i128,
    },
    /// A byte string, emitted with `.ascii`.
    Str(Vec<u8>),
    /// A pointer to another symbol, optionally offset (`&sym + addend`).
    Ptr {
        /// The target symbol's name.
        symbol: String,
        /// Byte offset added to the symbol's address.
        addend: i64,
    },
    /// `elem_ty`-typed elements, tightly packed (arrays never pad between
    /// elements).
    Array {
        /// The array's element type.
        elem_ty: Type,
        /// Per-element initializers, in order.
        elems: Vec<Init>,
    },
    /// Field initializers for a struct-typed global, in declaration order.
    /// `ty` lets the emitter recover each field's offset to pad between
    /// members.
    Struct {
        /// The struct's own type.
        ty: Type,
        /// Per-field initializers, in declaration order.
        fields: Vec<Init>,
    },
    /// `n` bytes of zero, used for tail padding and uninitialized globals.
    Zero(u32),
}

/// A global variable declaration: name, type, optional initializer, and
/// the linkage flags carried alongside every top-level initializer.
#[derive(Clone, Debug)]
pub struct GlobalData {
    /// The global's linker-visible name.
    pub name: String,
    /// The global's type; its size/alignment drive the emitted directives.
    pub ty: Type,
    /// The initializer, or `None` for a zero-initialized (BSS-like) global.
    pub init: Option<Init>,
    /// Emit a `.globl`/equivalent directive.
    pub exported: bool,
    /// Place the global in a read-only section.
    pub constant: bool,
    /// Emit the target's weak-symbol directive.
    pub weak: bool,
}

/// A compilation unit: the type universe, every global, and every function
/// declared against it, under one shared symbol namespace.
pub struct Unit {
    /// The type universe every global and function in this unit is typed
    /// against.
    pub types: TypeInterner,
    /// Global variable declarations, in declaration order.
    pub globals: Vec<GlobalData>,
    /// Function definitions, in declaration order.
    pub functions: Vec<Function>,
    names: HashSet<String>,
}

impl Unit {
    /// Create an empty unit over a fresh type universe sized for `ptr_size`/
    /// `ptr_align` bytes.
    pub fn new(ptr_size: u32, ptr_align: u32) -> Self {
        Unit {
            types: TypeInterner::new(ptr_size, ptr_align),
            globals: Vec::new(),
            functions: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Declare a global, failing if its name already names a global or
    /// function in this unit.
    pub fn declare_global(&mut self, global: GlobalData) -> CodegenResult<()> {
        self.claim_name(&global.name)?;
        self.globals.push(global);
        Ok(())
    }

    /// Declare a function, failing if its name already names a global or
    /// function in this unit.
    pub fn declare_function(&mut self, func: Function) -> CodegenResult<()> {
        self.claim_name(&func.name)?;
        self.functions.push(func);
        Ok(())
    }

    fn claim_name(&mut self, name: &str) -> CodegenResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(CodegenError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Look up a declared global by name.
    pub fn global(&self, name: &str) -> Option<&GlobalData> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Look up a declared function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Signature;
    use crate::ir::Function;
    use crate::isa::CallConv;

    fn sig(unit: &Unit) -> Signature {
        Signature {
            ret: unit.types.void(),
            params: vec![],
            variadic: false,
            call_conv: CallConv::SystemV,
        }
    }

    #[test]
    fn duplicate_global_name_is_rejected() {
        let mut unit = Unit::new(8, 8);
        let i4 = unit.types.intern_primitive(crate::ir::Prim::I4);
        let g = GlobalData {
            name: "counter".to_string(),
            ty: i4,
            init: None,
            exported: false,
            constant: false,
            weak: false,
        };
        assert!(unit.declare_global(g.clone()).is_ok());
        assert!(unit.declare_global(g).is_err());
    }

    #[test]
    fn function_and_global_share_one_namespace() {
        let mut unit = Unit::new(8, 8);
        let sig = sig(&unit);
        unit.declare_function(Function::new("thing", sig)).unwrap();
        let i4 = unit.types.intern_primitive(crate::ir::Prim::I4);
        let g = GlobalData {
            name: "thing".to_string(),
            ty: i4,
            init: None,
            exported: false,
            constant: false,
            weak: false,
        };
        match unit.declare_global(g) {
            Err(CodegenError::DuplicateSymbol { name }) => assert_eq!(name, "thing"),
            other => panic!("expected DuplicateSymbol, got {:?}", other),
        }
    }

    #[test]
    fn struct_initializer_carries_its_type_for_padding() {
        let mut unit = Unit::new(8, 8);
        let i1 = unit.types.intern_primitive(crate::ir::Prim::I1);
        let i8 = unit.types.intern_primitive(crate::ir::Prim::I8);
        let s = unit.types.intern_struct(vec![i1, i8]);
        let init = Init::Struct {
            ty: s,
            fields: vec![Init::Int { ty: i1, bits: 1 }, Init::Int { ty: i8, bits: 2 }],
        };
        let g = GlobalData {
            name: "g".to_string(),
            ty: s,
            init: Some(init),
            exported: true,
            constant: false,
            weak: false,
        };
        unit.declare_global(g).unwrap();
        assert_eq!(unit.globals.len(), 1);
    }
}
