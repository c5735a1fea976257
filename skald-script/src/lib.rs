//! skald-script
//!
//! A small, self-contained dynamically-typed script VM: lexer, parser,
//! bytecode compiler and stack interpreter.
//!
//! The crate exposes a stack-oriented embedding surface: a value stack you
//! push arguments onto, a protected call that restores the stack on failure,
//! a global table, and a flat type-name registry used to resolve field
//! access on wrapped native objects. The host-facing bridge built on top of
//! this lives in the `skald` crate.

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod vm;

use std::rc::Rc;

pub use bytecode::Function;
pub use error::{ParseError, RuntimeError};
pub use value::{fmt_num, NativeFn, Table, TableRef, Value};
pub use vm::Vm;

/// Compile a source chunk into a callable zero-argument [`Function`].
///
/// `chunk_name` is used in error tracebacks (typically the file stem).
pub fn compile(src: &str, chunk_name: &str) -> Result<Rc<Function>, ParseError> {
    let stmts = parser::parse(src)?;
    compiler::compile(&stmts, chunk_name)
}
