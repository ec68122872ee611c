// SPDX-License-Identifier: MIT

//! # Lox Core
//!
//! Value representation, bytecode chunks, the heap of tagged objects, the
//! open-addressed hash table used for globals/fields/methods/interning, and
//! the tracing mark-sweep collector.
//!
//! This crate is deliberately VM-agnostic: it knows nothing about call
//! frames, the value stack, or the dispatch loop (those live in `lox-vm`).
//! It owns the object graph and the collector; the VM supplies roots at
//! collection points and otherwise just allocates through [`Heap`].

mod chunk;
mod gc;
mod heap;
mod table;
mod value;

pub use chunk::{Chunk, OpCode};
pub use gc::{collect, CollectStats, GcRoots};
pub use heap::{
    BoundMethod, Class, Closure, Function, Heap, Instance, NativeFn, NativeFnPtr, ObjRef, Obj,
    Upvalue, UpvalueState,
};
pub use table::Table;
pub use value::Value;
