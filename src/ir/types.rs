//! Hash-consed types.
//!
//! Every [`Type`] handed out by a [`TypeInterner`] is a `Copy` index into
//! that interner's table. Two types compare equal exactly when they were
//! interned from an equal description, so type equality is index equality
//! rather than structural comparison, and every pointer type has a unique
//! back-edge to its pointee.

use crate::entity::{entity_impl, PrimaryMap};
use std::collections::HashMap;
use std::fmt;

/// An opaque reference to an interned type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);
entity_impl!(Type, "t");

/// The primitive scalar kinds. Widths are in bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Prim {
    /// 1-byte integer (bool/char width).
    I1,
    /// 2-byte integer.
    I2,
    /// 4-byte integer.
    I4,
    /// 8-byte integer.
    I8,
    /// 4-byte (single precision) float.
    F4,
    /// 8-byte (double precision) float.
    F8,
}

impl Prim {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            Prim::I1 => 1,
            Prim::I2 => 2,
            Prim::I4 => 4,
            Prim::I8 | Prim::F8 => 8,
            Prim::F4 => 4,
        }
    }

    /// True for `F4`/`F8`.
    pub fn is_float(self) -> bool {
        match self {
            Prim::F4 | Prim::F8 => true,
            _ => false,
        }
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Prim::I1 => "i1",
            Prim::I2 => "i2",
            Prim::I4 => "i4",
            Prim::I8 => "i8",
            Prim::F4 => "f4",
            Prim::F8 => "f8",
        };
        f.write_str(s)
    }
}

/// The structural description of an interned type.
///
/// `Alias` is the only variant whose equality is *not* identity-after-
/// interning on its own: `TypeInterner::intern` resolves an alias's
/// `actual` for the purposes of deduplicating other types built on top of
/// it, but an alias still prints as its name rather than its target.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeData {
    /// The empty type. Size and alignment are both zero.
    Void,
    /// A primitive scalar.
    Primitive(Prim),
    /// Pointer to `Type`.
    Ptr(Type),
    /// `n` contiguous elements of `Type`.
    Array(Type, u64),
    /// Fields laid out in declaration order, each padded to its own
    /// alignment; the struct's alignment is the max field alignment.
    Struct(Vec<Type>),
    /// A function signature: not itself sized.
    Func {
        /// Return type (`Type` for `void` included, never absent).
        ret: Type,
        /// Parameter types, in order.
        params: Vec<Type>,
        /// Whether trailing arguments beyond `params` are accepted.
        variadic: bool,
    },
    /// A named type standing for `actual`. Equality for the purposes of
    /// interning resolves through to `actual`; `Display` renders `name`.
    Alias {
        /// The alias's own name.
        name: String,
        /// What it actually refers to.
        actual: Type,
    },
}

/// A per-unit hash-consing table for [`Type`]s.
///
/// Pointer size and alignment are target properties but are stored here so
/// that `size_of`/`align_of` can be computed without threading a target
/// reference through every type query; `Unit::new` populates them from the
/// chosen `TargetIsa`.
pub struct TypeInterner {
    table: PrimaryMap<Type, TypeData>,
    lookup: HashMap<TypeData, Type>,
    ptr_size: u32,
    ptr_align: u32,
    void: Type,
}

impl TypeInterner {
    /// Create an interner for a target with the given pointer size/align
    /// (bytes). Both must be powers of two; `ptr_align` must not exceed
    /// `ptr_size`.
    pub fn new(ptr_size: u32, ptr_align: u32) -> Self {
        debug_assert!(ptr_size.is_power_of_two());
        debug_assert!(ptr_align.is_power_of_two() && ptr_align <= ptr_size);
        let mut table = PrimaryMap::new();
        let mut lookup = HashMap::new();
        let void = table.push(TypeData::Void);
        lookup.insert(TypeData::Void, void);
        Self {
            table,
            lookup,
            ptr_size,
            ptr_align,
            void,
        }
    }

    fn intern_data(&mut self, data: TypeData) -> Type {
        if let Some(&t) = self.lookup.get(&data) {
            return t;
        }
        let t = self.table.push(data.clone());
        self.lookup.insert(data, t);
        t
    }

    /// The canonical `void` type.
    pub fn void(&self) -> Type {
        self.void
    }

    /// Intern a primitive scalar type.
    pub fn intern_primitive(&mut self, p: Prim) -> Type {
        self.intern_data(TypeData::Primitive(p))
    }

    /// Intern `ptr(t)`.
    pub fn intern_ptr(&mut self, t: Type) -> Type {
        self.intern_data(TypeData::Ptr(t))
    }

    /// Intern `array(t, n)`.
    pub fn intern_array(&mut self, t: Type, n: u64) -> Type {
        self.intern_data(TypeData::Array(t, n))
    }

    /// Intern a struct of the given field types, in order.
    pub fn intern_struct(&mut self, fields: Vec<Type>) -> Type {
        self.intern_data(TypeData::Struct(fields))
    }

    /// Intern a function signature.
    pub fn intern_func(&mut self, ret: Type, params: Vec<Type>, variadic: bool) -> Type {
        self.intern_data(TypeData::Func {
            ret,
            params,
            variadic,
        })
    }

    /// Declare `name` as an alias for `actual`, returning a fresh `Type`
    /// (aliases are never deduplicated against one another by name: two
    /// aliases with the same name and target are still distinct `Type`s,
    /// matching how a parser would intern two distinct named-type
    /// declarations).
    pub fn alias(&mut self, name: impl Into<String>, actual: Type) -> Type {
        let data = TypeData::Alias {
            name: name.into(),
            actual,
        };
        let t = self.table.push(data);
        t
    }

    /// Look up a type's structural description.
    pub fn data(&self, t: Type) -> &TypeData {
        &self.table[t]
    }

    /// Resolve through any chain of aliases to the first non-alias type.
    pub fn resolve(&self, t: Type) -> Type {
        let mut cur = t;
        loop {
            match &self.table[cur] {
                TypeData::Alias { actual, .. } => cur = *actual,
                _ => return cur,
            }
        }
    }

    /// The pointee of a pointer type, or `None` for non-pointers (after
    /// resolving aliases).
    pub fn deref(&self, t: Type) -> Option<Type> {
        match self.data(self.resolve(t)) {
            TypeData::Ptr(inner) => Some(*inner),
            _ => None,
        }
    }

    /// True if `t` resolves to a pointer type.
    pub fn is_ptr(&self, t: Type) -> bool {
        self.deref(t).is_some()
    }

    /// True if `t` resolves to an integer primitive.
    pub fn is_int(&self, t: Type) -> bool {
        match self.data(self.resolve(t)) {
            TypeData::Primitive(p) => !p.is_float(),
            TypeData::Ptr(_) => false,
            _ => false,
        }
    }

    /// True if `t` resolves to a floating-point primitive.
    pub fn is_float(&self, t: Type) -> bool {
        match self.data(self.resolve(t)) {
            TypeData::Primitive(p) => p.is_float(),
            _ => false,
        }
    }

    /// Byte size. `void` and function types are zero/non-sized.
    pub fn size_of(&self, t: Type) -> u32 {
        match self.data(self.resolve(t)) {
            TypeData::Void => 0,
            TypeData::Primitive(p) => p.size(),
            TypeData::Ptr(_) => self.ptr_size,
            TypeData::Array(elem, n) => self.size_of(*elem) * (*n as u32),
            TypeData::Struct(fields) => self.struct_layout(fields).1,
            TypeData::Func { .. } => 0,
            TypeData::Alias { .. } => unreachable!("resolved above"),
        }
    }

    /// Byte alignment. `void` and function types are zero/non-sized.
    pub fn align_of(&self, t: Type) -> u32 {
        match self.data(self.resolve(t)) {
            TypeData::Void => 0,
            TypeData::Primitive(p) => p.size(),
            TypeData::Ptr(_) => self.ptr_align,
            TypeData::Array(elem, _) => self.align_of(*elem),
            TypeData::Struct(fields) => self.struct_layout(fields).0,
            TypeData::Func { .. } => 0,
            TypeData::Alias { .. } => unreachable!("resolved above"),
        }
    }

    /// Byte offset of each field plus the struct's `(align, size)`: fields
    /// laid out in order, each padded up to its own alignment, overall
    /// alignment is the max field alignment and the final size is padded
    /// up to that alignment too.
    pub fn struct_layout(&self, fields: &[Type]) -> (u32, u32) {
        let mut offset = 0u32;
        let mut max_align = 1u32;
        for &f in fields {
            let a = self.align_of(f).max(1);
            let s = self.size_of(f);
            offset = align_up(offset, a);
            offset += s;
            max_align = max_align.max(a);
        }
        (max_align, align_up(offset, max_align))
    }

    /// Offsets of every field of a struct type, in declaration order.
    pub fn field_offsets(&self, t: Type) -> Vec<u32> {
        match self.data(self.resolve(t)) {
            TypeData::Struct(fields) => {
                let mut offset = 0u32;
                let mut offsets = Vec::with_capacity(fields.len());
                for &f in fields {
                    let a = self.align_of(f).max(1);
                    offset = align_up(offset, a);
                    offsets.push(offset);
                    offset += self.size_of(f);
                }
                offsets
            }
            _ => panic!("field_offsets on non-struct type"),
        }
    }

    /// Pick the largest primitive type (integer if `is_fp` is false,
    /// float otherwise) that fits within `bytes`. Used by memcpy
    /// expansion and two-eightbyte struct classification.
    pub fn primitive_less_or_equal(&mut self, bytes: u32, is_fp: bool) -> Type {
        let p = if is_fp {
            if bytes >= 8 {
                Prim::F8
            } else {
                Prim::F4
            }
        } else if bytes >= 8 {
            Prim::I8
        } else if bytes >= 4 {
            Prim::I4
        } else if bytes >= 2 {
            Prim::I2
        } else {
            Prim::I1
        };
        self.intern_primitive(p)
    }

    /// Pointer size in bytes for this target.
    pub fn ptr_size(&self) -> u32 {
        self.ptr_size
    }

    /// Pointer alignment in bytes for this target.
    pub fn ptr_align(&self) -> u32 {
        self.ptr_align
    }

    /// Render `t` for diagnostics, resolving aliases to their name.
    pub fn display(&self, t: Type) -> String {
        match self.data(t) {
            TypeData::Void => "void".to_string(),
            TypeData::Primitive(p) => p.to_string(),
            TypeData::Ptr(inner) => format!("ptr({})", self.display(*inner)),
            TypeData::Array(inner, n) => format!("[{}; {}]", self.display(*inner), n),
            TypeData::Struct(fields) => {
                let parts: Vec<_> = fields.iter().map(|&f| self.display(f)).collect();
                format!("{{{}}}", parts.join(", "))
            }
            TypeData::Func {
                ret,
                params,
                variadic,
            } => {
                let parts: Vec<_> = params.iter().map(|&f| self.display(f)).collect();
                format!(
                    "{}({}{}){}",
                    "fn",
                    parts.join(", "),
                    if *variadic { ", ..." } else { "" },
                    format!(" -> {}", self.display(*ret))
                )
            }
            TypeData::Alias { name, .. } => name.clone(),
        }
    }
}

fn align_up(offset: u32, align: u32) -> u32 {
    if align == 0 {
        offset
    } else {
        (offset + align - 1) & !(align - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interner() -> TypeInterner {
        TypeInterner::new(8, 8)
    }

    #[test]
    fn interning_is_identity() {
        let mut ty = interner();
        let a = ty.intern_primitive(Prim::I4);
        let b = ty.intern_primitive(Prim::I4);
        assert_eq!(a, b);
        let pa = ty.intern_ptr(a);
        let pb = ty.intern_ptr(b);
        assert_eq!(pa, pb);
    }

    #[test]
    fn struct_layout_pads_fields() {
        let mut ty = interner();
        let i4 = ty.intern_primitive(Prim::I4);
        let ptr = ty.intern_ptr(i4);
        // { i4, i4, ptr, ptr } -> 4 + 4 + 8 + 8 = 24, align 8
        let s = ty.intern_struct(vec![i4, i4, ptr, ptr]);
        assert_eq!(ty.size_of(s), 24);
        assert_eq!(ty.align_of(s), 8);
        assert_eq!(ty.field_offsets(s), vec![0, 4, 8, 16]);
    }

    #[test]
    fn struct_layout_pads_between_misaligned_fields() {
        let mut ty = interner();
        let i1 = ty.intern_primitive(Prim::I1);
        let i8 = ty.intern_primitive(Prim::I8);
        // { i1, i8 } -> i1 at 0, padding to 8, i8 at 8, size 16
        let s = ty.intern_struct(vec![i1, i8]);
        assert_eq!(ty.field_offsets(s), vec![0, 8]);
        assert_eq!(ty.size_of(s), 16);
    }

    #[test]
    fn void_is_zero_sized() {
        let ty = interner();
        assert_eq!(ty.size_of(ty.void()), 0);
        assert_eq!(ty.align_of(ty.void()), 0);
    }

    #[test]
    fn primitive_less_or_equal_picks_largest_fit() {
        let mut ty = interner();
        let i4 = ty.intern_primitive(Prim::I4);
        assert_eq!(ty.primitive_less_or_equal(4, false), i4);
        assert_eq!(ty.primitive_less_or_equal(7, false), i4);
        let i8 = ty.intern_primitive(Prim::I8);
        assert_eq!(ty.primitive_less_or_equal(8, false), i8);
    }

    #[test]
    fn alias_resolves_for_queries_but_keeps_its_own_name() {
        let mut ty = interner();
        let i4 = ty.intern_primitive(Prim::I4);
        let named = ty.alias("MyInt", i4);
        assert_ne!(named, i4);
        assert_eq!(ty.resolve(named), i4);
        assert_eq!(ty.size_of(named), 4);
        assert_eq!(ty.display(named), "MyInt");
    }
}
