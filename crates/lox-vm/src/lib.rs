// SPDX-License-Identifier: MIT

//! # Lox VM
//!
//! The stack-based dispatch loop: call frames, the upvalue manager, the
//! ~30-opcode decode-execute loop, the native-function calling convention,
//! and the runtime error reporter.
//!
//! This crate consumes `lox-core`'s [`lox_core::Heap`] and [`lox_core::Value`]
//! but owns all of the mutator's transient state (the value stack, the
//! frame stack, the open-upvalue list, globals). It implements
//! [`lox_core::GcRoots`] over that state and decides when to call
//! [`lox_core::gc::collect`] — always at a well-defined safe point between
//! instructions, never mid-allocation.

mod error;
mod frame;
mod native;
mod upvalues;
mod vm;

pub use error::{RuntimeError, TraceLine};
pub use frame::CallFrame;
pub use native::NativeResult;
pub use upvalues::UpvalueManager;
pub use vm::{InterpretResult, RuntimeFailure, Vm};
