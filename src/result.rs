//! Error types returned by the fallible edges of the back-end.
//!
//! Almost everything in this crate treats a violated invariant as a
//! compiler bug: passes `panic!`/`debug_assert!` rather than returning
//! `Err` (see the crate-level docs and `ir` module for the invariants they
//! enforce). `CodegenError` exists only for the handful of entry points
//! that accept data from outside those invariants, e.g. parsing a target
//! triple or declaring a global under a name that already exists.

use std::fmt;

/// A result alias used by every fallible entry point in this crate.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// Errors that can be returned from the boundary of this crate.
///
/// This is deliberately small: internal inconsistencies found while
/// lowering a function that is already known to be well-formed are
/// compiler bugs, not `CodegenError`s, and are reported by panicking
/// (see `result::panic_invariant`).
#[derive(Fail, Debug)]
pub enum CodegenError {
    /// The string handed to [`crate::isa::Target::parse`] is not a
    /// recognized `<arch>-<sys>` target triple.
    #[fail(display = "invalid target triple `{}`: {}", triple, reason)]
    BadTriple {
        /// The triple string that failed to parse.
        triple: String,
        /// Why `target-lexicon` or this crate rejected it.
        reason: String,
    },

    /// The requested target triple parses, but this crate has no
    /// instruction-selection/ABI tables for it.
    #[fail(display = "unsupported target `{}`", triple)]
    UnsupportedTarget {
        /// The triple that parsed but isn't implemented.
        triple: String,
    },

    /// A global or function was declared twice under the same name in one
    /// [`crate::unit::Unit`].
    #[fail(display = "duplicate symbol `{}`", name)]
    DuplicateSymbol {
        /// The symbol name that collided.
        name: String,
    },
}

/// Abort with a diagnostic identifying the back-end invariant that was
/// violated.
///
/// Every call site names the invariant in `what`; this is the core's only
/// failure mode once a [`crate::ir::Function`] has been accepted by a pass,
/// per the "no recoverable error class inside the core" rule in this
/// crate's specification.
#[cold]
pub fn panic_invariant(what: &str, detail: &dyn fmt::Display) -> ! {
    panic!("ir-codegen: invariant violated: {}: {}", what, detail)
}
