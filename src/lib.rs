//! Back-end core for a compiler.
//!
//! This crate ingests a typed, three-address intermediate representation
//! organized into functions of basic blocks, and lowers it through a
//! sequence of machine-specific passes into assembly for a target
//! architecture. It does not parse source text, optimize at the SSA level,
//! or link; it picks up where a front end and its IR builder leave off and
//! stops at a stream of assembly lines.
//!
//! Passes run in a fixed order for every function:
//!
//! ABI lowering (`abi`) → instruction selection (`isel`) → spilling
//! (`spill`) → register allocation (`regalloc`) → emission (`emit`).
//!
//! See [`Context::compile`] for the entry point that drives all five passes
//! over a single [`ir::Function`].

#![deny(missing_docs)]
#![warn(unused_import_braces)]

#[macro_use]
extern crate failure_derive;

pub use cranelift_entity as entity;

pub mod abi;
pub mod emit;
pub mod ir;
pub mod isa;
pub mod isel;
pub mod regalloc;
pub mod result;
pub mod spill;
pub mod unit;

mod context;

pub use crate::context::Context;
pub use crate::result::{CodegenError, CodegenResult};
pub use crate::unit::Unit;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
