// SPDX-License-Identifier: MIT

//! Runtime errors and the backtrace reporter. See `SPEC_FULL.md` §4.9/§7.

use std::fmt;

/// A runtime error raised by the dispatch loop or the call protocol.
///
/// Every variant corresponds to one of the "user-level failures" listed in
/// `spec.md` §7 — arity mismatches, type mismatches, undefined names, a
/// non-callable callee, stack overflow, or a native function reporting its
/// own failure. None of these represent an engine bug; an unreachable
/// opcode or allocator failure is not modeled here because it aborts the
/// process instead of unwinding as a runtime error.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A binary arithmetic/comparison op's operands were not both numbers.
    OperandsMustBeNumbers,
    /// `+` with operands that are neither both numbers nor both strings.
    OperandsMustBeNumbersOrStrings,
    /// Unary `-` on a non-number.
    OperandMustBeNumber,
    /// Reading or assigning an undefined global.
    UndefinedGlobal(String),
    /// Accessing a property on something other than an Instance.
    OnlyInstancesHaveProperties,
    /// `GET_PROPERTY`/`GET_PROPERTY_VAR` found neither a field nor a method.
    UndefinedProperty(String),
    /// `GET_PROPERTY_VAR`/`SET_PROPERTY_VAR`'s computed name was not a string.
    PropertyNameMustBeString,
    /// Calling a non-Closure, non-Class, non-BoundMethod, non-Native value.
    NotCallable,
    /// Wrong number of arguments passed to a closure or native.
    ArityMismatch { expected: u8, got: u8 },
    /// `OP_INHERIT` where the superclass expression is not a Class.
    SuperclassMustBeAClass,
    /// A native function reported failure through the native ABI.
    Native { name: String, message: String },
    /// Too many nested call frames.
    StackOverflow,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::OperandsMustBeNumbers => write!(f, "Operands must be numbers."),
            RuntimeError::OperandsMustBeNumbersOrStrings => {
                write!(f, "Operands must be two numbers or two strings.")
            }
            RuntimeError::OperandMustBeNumber => write!(f, "Operand must be a number."),
            RuntimeError::UndefinedGlobal(name) => write!(f, "Undefined variable '{name}'."),
            RuntimeError::OnlyInstancesHaveProperties => {
                write!(f, "Only instances have properties.")
            }
            RuntimeError::UndefinedProperty(name) => write!(f, "Undefined property '{name}'."),
            RuntimeError::PropertyNameMustBeString => {
                write!(f, "Property name must be a string.")
            }
            RuntimeError::NotCallable => write!(f, "Can only call functions and classes."),
            RuntimeError::ArityMismatch { expected, got } => {
                write!(f, "Expected {expected} arguments but got {got}.")
            }
            RuntimeError::SuperclassMustBeAClass => write!(f, "Superclass must be a class."),
            RuntimeError::Native { name, message } => write!(f, "{message}\nin native '{name}'"),
            RuntimeError::StackOverflow => write!(f, "Stack overflow."),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// One entry of a formatted backtrace: the source line and the enclosing
/// function's name (`"script"` for the top-level frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub line: u32,
    pub function_name: String,
}

/// Format a runtime error plus its backtrace the way the reference
/// implementation does: the message first, then `[line L] in NAME` for
/// every frame, top (innermost) to bottom.
#[must_use]
pub fn format_report(error: &RuntimeError, trace: &[TraceLine]) -> String {
    let mut out = format!("{error}\n");
    for entry in trace {
        out.push_str(&format!("[line {}] in {}\n", entry.line, entry.function_name));
    }
    out
}
