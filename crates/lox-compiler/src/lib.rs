// SPDX-License-Identifier: MIT

//! # Lox Compiler
//!
//! Turns Lox source text into a [`lox_core::Function`] ready for
//! `lox-vm::Vm::interpret`: a hand-written scanner, a single-pass
//! Pratt/precedence-climbing parser, and code generation straight into a
//! [`lox_core::Chunk`] with no intermediate AST.
//!
//! There is no separate syntax specification to port from — this crate's
//! only contract is the opcode/stack shape `lox-vm`'s dispatch loop
//! requires (see that crate's `vm.rs`). One syntax extension beyond
//! standard Lox: `obj[expr]` for a computed property name, compiling to
//! `GET_PROPERTY_VAR`/`SET_PROPERTY_VAR` where `obj.name` can only ever
//! reach the constant-name opcodes.

mod lexer;
mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{CompileError, Compiler};

use lox_core::{Heap, ObjRef};

/// Compile `source` into a top-level script [`lox_core::Function`],
/// allocated into `heap`. On failure returns every diagnostic collected
/// during the (error-recovering) parse, not just the first.
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef, Vec<CompileError>> {
    Compiler::compile(source, heap)
}
